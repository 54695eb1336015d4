//! Session lifecycle and concurrency tests.
//!
//! Covers idempotent teardown, post-destroy fail-fast behavior, lens flip
//! sequencing, orientation/quirk resolution, torch degradation, and the
//! destroy-vs-delivery race. The stub runtime counts frame acquisitions
//! against releases so every test can assert that no native frame resource
//! leaked.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use arcam_feed::{
    CaptureConfig, CaptureError, CaptureSessionManager, DeviceProfile, FixedOrientation,
    FrameSink, LensFacing, Orientation, RepackedFrame, ResolutionPreset, SessionState,
    StubRuntime, StubRuntimeConfig,
};

#[derive(Default)]
struct SinkProbe {
    frames: AtomicUsize,
    released: AtomicUsize,
    last_front: AtomicBool,
    frame_after_release: AtomicBool,
}

struct ProbeSink(Arc<SinkProbe>);

impl FrameSink for ProbeSink {
    fn on_frame_ready(&mut self, frame: &RepackedFrame<'_>) {
        if self.0.released.load(Ordering::SeqCst) > 0 {
            self.0.frame_after_release.store(true, Ordering::SeqCst);
        }
        self.0.frames.fetch_add(1, Ordering::SeqCst);
        self.0.last_front.store(frame.front_facing, Ordering::SeqCst);
    }

    fn release(&mut self) {
        self.0.released.fetch_add(1, Ordering::SeqCst);
    }
}

fn make_manager(
    stub: StubRuntimeConfig,
    orientation: Orientation,
    device: DeviceProfile,
) -> (CaptureSessionManager<StubRuntime>, Arc<SinkProbe>) {
    let probe = Arc::new(SinkProbe::default());
    let manager = CaptureSessionManager::new(
        StubRuntime::new(stub),
        device,
        Box::new(FixedOrientation(orientation)),
        Box::new(ProbeSink(probe.clone())),
    );
    (manager, probe)
}

fn generic_device() -> DeviceProfile {
    DeviceProfile::new("generic", "devkit")
}

#[test]
fn start_binds_and_streams_frames() {
    let (mut manager, probe) = make_manager(
        StubRuntimeConfig::default(),
        Orientation::Landscape,
        generic_device(),
    );
    manager.start(CaptureConfig::default()).unwrap();
    assert_eq!(manager.state(), SessionState::Bound);

    manager.runtime_mut().deliver_frames(3);
    let stats = manager.stats();
    assert_eq!(stats.delivered, 3);
    assert_eq!(stats.repacked, 3);
    assert_eq!(stats.dropped, 0);
    assert_eq!(probe.frames.load(Ordering::SeqCst), 3);

    // Every delivered frame's native resource was closed.
    assert_eq!(
        manager.runtime().frames_created(),
        manager.runtime().frames_released()
    );
}

#[test]
fn portrait_orientation_swaps_capture_size() {
    let (mut manager, _probe) = make_manager(
        StubRuntimeConfig::default(),
        Orientation::Portrait,
        generic_device(),
    );
    manager.start(CaptureConfig::default()).unwrap();
    assert_eq!(manager.capture_size(), Some((720, 1280)));
    let request = manager.runtime().last_bind_request().unwrap();
    assert_eq!((request.width, request.height), (720, 1280));
}

#[test]
fn landscape_orientation_keeps_capture_size() {
    let (mut manager, _probe) = make_manager(
        StubRuntimeConfig::default(),
        Orientation::Landscape,
        generic_device(),
    );
    manager.start(CaptureConfig::default()).unwrap();
    assert_eq!(manager.capture_size(), Some((1280, 720)));
}

#[test]
fn quirky_device_is_clamped_to_safe_resolution() {
    let (mut manager, _probe) = make_manager(
        StubRuntimeConfig::default(),
        Orientation::Landscape,
        DeviceProfile::new("Xiaomi", "Redmi Note 11"),
    );
    let config = CaptureConfig {
        preset: ResolutionPreset::P1920x1080,
        ..CaptureConfig::default()
    };
    manager.start(config).unwrap();
    assert_eq!(manager.capture_size(), Some((1280, 720)));
}

#[test]
fn restart_is_idempotent() {
    let (mut manager, probe) = make_manager(
        StubRuntimeConfig::default(),
        Orientation::Landscape,
        generic_device(),
    );
    manager.start(CaptureConfig::default()).unwrap();
    manager.start(CaptureConfig::default()).unwrap();
    assert_eq!(manager.state(), SessionState::Bound);

    manager.runtime_mut().deliver_frames(1);
    assert_eq!(probe.frames.load(Ordering::SeqCst), 1);
}

#[test]
fn destroy_twice_is_idempotent() {
    let (mut manager, probe) = make_manager(
        StubRuntimeConfig::default(),
        Orientation::Landscape,
        generic_device(),
    );
    manager.start(CaptureConfig::default()).unwrap();

    manager.destroy();
    assert_eq!(manager.state(), SessionState::Destroyed);
    assert_eq!(probe.released.load(Ordering::SeqCst), 1);

    manager.destroy();
    assert_eq!(manager.state(), SessionState::Destroyed);
    assert_eq!(probe.released.load(Ordering::SeqCst), 1);
}

#[test]
fn control_calls_after_destroy_fail_fast() {
    let (mut manager, _probe) = make_manager(
        StubRuntimeConfig::default(),
        Orientation::Landscape,
        generic_device(),
    );
    manager.start(CaptureConfig::default()).unwrap();
    manager.destroy();

    assert!(matches!(
        manager.start(CaptureConfig::default()),
        Err(CaptureError::Destroyed)
    ));
    assert!(matches!(
        manager.flip_lens(),
        Err(CaptureError::Destroyed)
    ));
    assert!(!manager.toggle_torch());
}

#[test]
fn delivery_after_destroy_releases_frame_without_sink_call() {
    let (mut manager, probe) = make_manager(
        StubRuntimeConfig::default(),
        Orientation::Landscape,
        generic_device(),
    );
    manager.start(CaptureConfig::default()).unwrap();
    let handle = manager.runtime().delivery_handle().unwrap();

    manager.destroy();
    handle.deliver_one(0);

    assert_eq!(probe.frames.load(Ordering::SeqCst), 0);
    assert!(!probe.frame_after_release.load(Ordering::SeqCst));
    assert_eq!(
        manager.runtime().frames_created(),
        manager.runtime().frames_released()
    );
}

#[test]
fn provider_failure_leaves_session_unbound() {
    let (mut manager, probe) = make_manager(
        StubRuntimeConfig {
            fail_provider: true,
            ..StubRuntimeConfig::default()
        },
        Orientation::Landscape,
        generic_device(),
    );
    let result = manager.start(CaptureConfig::default());
    assert!(matches!(result, Err(CaptureError::Provider(_))));
    assert_eq!(manager.state(), SessionState::Unbound);
    assert_eq!(manager.capture_size(), None);
    assert_eq!(probe.released.load(Ordering::SeqCst), 0);
}

#[test]
fn bind_failure_leaves_session_unbound() {
    let (mut manager, _probe) = make_manager(
        StubRuntimeConfig {
            fail_bind: true,
            ..StubRuntimeConfig::default()
        },
        Orientation::Landscape,
        generic_device(),
    );
    assert!(matches!(
        manager.start(CaptureConfig::default()),
        Err(CaptureError::Provider(_))
    ));
    assert_eq!(manager.state(), SessionState::Unbound);
}

#[test]
fn invalid_config_is_rejected_before_binding() {
    let (mut manager, _probe) = make_manager(
        StubRuntimeConfig::default(),
        Orientation::Landscape,
        generic_device(),
    );
    let config = CaptureConfig {
        pool_slots: 1,
        ..CaptureConfig::default()
    };
    assert!(matches!(
        manager.start(config),
        Err(CaptureError::Configuration(_))
    ));
    assert_eq!(manager.state(), SessionState::Unbound);
}

#[test]
fn first_frame_after_flip_reports_new_facing() {
    let (mut manager, probe) = make_manager(
        StubRuntimeConfig::default(),
        Orientation::Landscape,
        generic_device(),
    );
    manager.start(CaptureConfig::default()).unwrap();
    manager.runtime_mut().deliver_frames(1);
    assert!(probe.last_front.load(Ordering::SeqCst));

    assert_eq!(manager.flip_lens().unwrap(), LensFacing::Rear);
    assert_eq!(manager.lens_facing(), LensFacing::Rear);

    manager.runtime_mut().deliver_frames(1);
    assert!(!probe.last_front.load(Ordering::SeqCst));
    assert_eq!(probe.frames.load(Ordering::SeqCst), 2);
}

#[test]
fn flip_without_start_binds_with_defaults() {
    let (mut manager, _probe) = make_manager(
        StubRuntimeConfig::default(),
        Orientation::Landscape,
        generic_device(),
    );
    assert_eq!(manager.flip_lens().unwrap(), LensFacing::Rear);
    assert_eq!(manager.state(), SessionState::Bound);
    assert_eq!(manager.capture_size(), Some((1280, 720)));
}

#[test]
fn torch_toggles_when_supported_and_degrades_when_not() {
    let (mut manager, _probe) = make_manager(
        StubRuntimeConfig::default(),
        Orientation::Landscape,
        generic_device(),
    );
    manager.start(CaptureConfig::default()).unwrap();
    assert!(manager.toggle_torch());
    assert!(!manager.toggle_torch());

    let (mut torchless, _probe) = make_manager(
        StubRuntimeConfig {
            torch: false,
            ..StubRuntimeConfig::default()
        },
        Orientation::Landscape,
        generic_device(),
    );
    torchless.start(CaptureConfig::default()).unwrap();
    assert!(!torchless.toggle_torch());
}

#[test]
fn torch_is_false_before_start() {
    let (mut manager, _probe) = make_manager(
        StubRuntimeConfig::default(),
        Orientation::Landscape,
        generic_device(),
    );
    assert!(!manager.toggle_torch());
}

#[test]
fn destroy_racing_a_frame_burst_leaks_nothing() {
    let (mut manager, probe) = make_manager(
        StubRuntimeConfig::default(),
        Orientation::Landscape,
        generic_device(),
    );
    manager.start(CaptureConfig::default()).unwrap();
    let handle = manager.runtime().delivery_handle().unwrap();

    let burst = thread::spawn(move || {
        for seq in 0..500 {
            handle.deliver_one(seq);
        }
    });

    thread::sleep(Duration::from_millis(2));
    manager.destroy();
    burst.join().unwrap();

    assert_eq!(manager.state(), SessionState::Destroyed);
    assert!(!probe.frame_after_release.load(Ordering::SeqCst));
    assert_eq!(probe.released.load(Ordering::SeqCst), 1);
    assert_eq!(
        manager.runtime().frames_created(),
        manager.runtime().frames_released()
    );
}

#[test]
fn streaming_runtime_delivers_until_destroy() {
    let (mut manager, probe) = make_manager(
        StubRuntimeConfig {
            auto_stream: true,
            ..StubRuntimeConfig::default()
        },
        Orientation::Landscape,
        generic_device(),
    );
    let config = CaptureConfig {
        frame_rate: 120,
        ..CaptureConfig::default()
    };
    manager.start(config).unwrap();

    // Wait for the streaming thread to push at least one frame through.
    for _ in 0..100 {
        if probe.frames.load(Ordering::SeqCst) > 0 {
            break;
        }
        thread::sleep(Duration::from_millis(5));
    }
    assert!(probe.frames.load(Ordering::SeqCst) > 0);

    manager.destroy();
    assert_eq!(manager.state(), SessionState::Destroyed);
    assert!(!probe.frame_after_release.load(Ordering::SeqCst));
}
