//! Capture session manager.
//!
//! Owns the camera binding and the renderer handoff: resolves the physical
//! capture size from preset + orientation + device quirks, allocates the
//! buffer pool, binds a [`FrameAnalyzer`] to the camera runtime, and exposes
//! the control surface (start, lens flip, torch, destroy).
//!
//! Two actors touch a session: the control thread issues start/flip/
//! destroy/torch, and the runtime's delivery thread drives the analyzer.
//! The control thread mutates the binding and lens/torch state; the
//! delivery thread mutates only the claimed pool slot and rotation index.
//! The lifecycle flags are the only synchronization between them.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;

use crate::camera::{BindRequest, CameraControl, CameraRuntime};
use crate::config::CaptureConfig;
use crate::error::CaptureError;
use crate::guard::LifecycleGuard;
use crate::pool::FramePool;
use crate::quirk::{resolve_quirk, DeviceProfile, DeviceQuirk};
use crate::repack::{repack, RepackedFrame, SourceFrame};
use crate::sink::{FrameSink, SinkCell};
use crate::{LensFacing, Orientation, PixelFormat, ResolutionPreset, SessionState};

/// Where the manager reads device orientation at every (re)start.
pub trait OrientationSource: Send {
    fn current(&self) -> Orientation;
}

/// Fixed orientation, for tests and headless deployments.
pub struct FixedOrientation(pub Orientation);

impl OrientationSource for FixedOrientation {
    fn current(&self) -> Orientation {
        self.0
    }
}

// -------------------- Stats --------------------

/// Frame counters, updated from the delivery thread with relaxed atomics
/// and read from the control thread.
#[derive(Debug, Default)]
pub struct SessionStats {
    delivered: AtomicU64,
    repacked: AtomicU64,
    dropped: AtomicU64,
}

impl SessionStats {
    fn record_delivered(&self) {
        self.delivered.fetch_add(1, Ordering::Relaxed);
    }

    fn record_repacked(&self) {
        self.repacked.fetch_add(1, Ordering::Relaxed);
    }

    fn record_dropped(&self) {
        self.dropped.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> StatsSnapshot {
        StatsSnapshot {
            delivered: self.delivered.load(Ordering::Relaxed),
            repacked: self.repacked.load(Ordering::Relaxed),
            dropped: self.dropped.load(Ordering::Relaxed),
        }
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct StatsSnapshot {
    pub delivered: u64,
    pub repacked: u64,
    pub dropped: u64,
}

// -------------------- Frame analyzer --------------------

/// Per-frame pipeline stage, driven by the camera runtime's delivery
/// thread: lifecycle check, pool claim, repack, sink handoff.
///
/// Per-frame failures are absorbed here; they are logged, counted, and the
/// frame is dropped without stopping the stream. The inbound frame's native
/// resource is released on every path (bound to its `Drop`).
pub struct FrameAnalyzer {
    guard: Arc<LifecycleGuard>,
    sink: Arc<SinkCell>,
    pool: FramePool,
    quirk: DeviceQuirk,
    lens_front: Arc<AtomicBool>,
    stats: Arc<SessionStats>,
}

impl FrameAnalyzer {
    pub(crate) fn new(
        guard: Arc<LifecycleGuard>,
        sink: Arc<SinkCell>,
        pool: FramePool,
        quirk: DeviceQuirk,
        lens_front: Arc<AtomicBool>,
        stats: Arc<SessionStats>,
    ) -> Self {
        Self {
            guard,
            sink,
            pool,
            quirk,
            lens_front,
            stats,
        }
    }

    pub fn deliver(&mut self, frame: SourceFrame) {
        if self.guard.is_destroyed() {
            // Dropping the frame releases its native resource.
            return;
        }
        self.stats.record_delivered();

        if frame.format != PixelFormat::Yuv420 {
            log::warn!("dropping frame with unsupported format {:?}", frame.format);
            self.stats.record_dropped();
            return;
        }

        let slot = match self.pool.acquire_next_slot() {
            Ok(slot) => slot,
            Err(err) => {
                log::error!("dropping frame: {}", err);
                self.stats.record_dropped();
                return;
            }
        };
        let written = match repack(&frame, slot.bytes, self.quirk) {
            Ok(written) => written,
            Err(err) => {
                log::warn!("dropping frame: {}", err);
                self.stats.record_dropped();
                return;
            }
        };

        let repacked = RepackedFrame {
            data: &slot.bytes[..written],
            width: frame.width,
            height: frame.height,
            rotation_degrees: frame.rotation_degrees,
            front_facing: self.lens_front.load(Ordering::SeqCst),
            format: PixelFormat::Yuv420,
            chroma_pixel_stride: frame.planes[1].pixel_stride,
        };

        // A destroy issued while repacking wins: the sink is never called
        // after its release.
        if self.guard.is_destroyed() {
            return;
        }
        self.stats.record_repacked();
        self.sink.deliver(&repacked);
    }
}

// -------------------- Session manager --------------------

/// Physical capture size: landscape keeps the preset's width×height,
/// portrait swaps them, and a device quirk may clamp the result.
fn resolve_capture_size(
    preset: ResolutionPreset,
    orientation: Orientation,
    quirk: DeviceQuirk,
) -> (u32, u32) {
    let (mut width, mut height) = if orientation.is_landscape() {
        (preset.width(), preset.height())
    } else {
        (preset.height(), preset.width())
    };
    if let Some((max_width, max_height)) = quirk.max_resolution {
        let (cap_width, cap_height) = if orientation.is_landscape() {
            (max_width, max_height)
        } else {
            (max_height, max_width)
        };
        if width > cap_width || height > cap_height {
            width = width.min(cap_width);
            height = height.min(cap_height);
            log::info!("capture size clamped to {}x{} for device quirk", width, height);
        }
    }
    (width, height)
}

pub struct CaptureSessionManager<R: CameraRuntime> {
    runtime: R,
    device: DeviceProfile,
    orientation: Box<dyn OrientationSource>,
    sink: Arc<SinkCell>,
    guard: Arc<LifecycleGuard>,
    stats: Arc<SessionStats>,
    lens_front: Arc<AtomicBool>,
    lens_facing: LensFacing,
    camera: Option<Box<dyn CameraControl>>,
    config: Option<CaptureConfig>,
    capture_size: Option<(u32, u32)>,
    starting: bool,
}

impl<R: CameraRuntime> CaptureSessionManager<R> {
    pub fn new(
        runtime: R,
        device: DeviceProfile,
        orientation: Box<dyn OrientationSource>,
        sink: Box<dyn FrameSink>,
    ) -> Self {
        Self {
            runtime,
            device,
            orientation,
            sink: Arc::new(SinkCell::new(sink)),
            guard: Arc::new(LifecycleGuard::new()),
            stats: Arc::new(SessionStats::default()),
            lens_front: Arc::new(AtomicBool::new(true)),
            lens_facing: LensFacing::Front,
            camera: None,
            config: None,
            capture_size: None,
            starting: false,
        }
    }

    /// Start (or restart) capture with `config`. Idempotent: an already
    /// bound session is unbound first. Configuration and provider failures
    /// surface to the caller and leave the session unbound.
    pub fn start(&mut self, config: CaptureConfig) -> Result<(), CaptureError> {
        if self.guard.is_destroyed() {
            log::warn!("start requested after destruction");
            return Err(CaptureError::Destroyed);
        }
        self.lens_facing = config.lens_facing;
        self.restart(config)
    }

    /// Toggle the lens-facing selector and rebind. A full unbind + rebind,
    /// not an in-place switch: sensors differ in orientation and plane
    /// layout by facing.
    pub fn flip_lens(&mut self) -> Result<LensFacing, CaptureError> {
        if self.guard.is_destroyed() {
            log::warn!("lens flip requested after destruction");
            return Err(CaptureError::Destroyed);
        }
        self.lens_facing = self.lens_facing.toggled();
        log::info!("flipping lens to {:?}", self.lens_facing);
        let config = self.config.clone().unwrap_or_default();
        self.restart(config)?;
        Ok(self.lens_facing)
    }

    /// Toggle the torch and return the resulting state. Returns false
    /// without error when the bound camera has no flash unit, no camera is
    /// bound, or the session is destroyed.
    pub fn toggle_torch(&mut self) -> bool {
        if self.guard.is_destroyed() {
            return false;
        }
        let Some(camera) = self.camera.as_mut() else {
            return false;
        };
        if !camera.has_torch() {
            return false;
        }
        let enable = !camera.torch_enabled();
        camera.set_torch(enable);
        camera.torch_enabled()
    }

    /// Tear the session down. Idempotent; only the first call does work.
    /// Does not wait for an in-flight frame delivery: the destroyed flag is
    /// raised first, and a racing delivery observes it and aborts.
    pub fn destroy(&mut self) {
        if !self.guard.begin_destroy() {
            log::warn!("capture session already destroyed");
            return;
        }
        log::info!("destroying capture session");
        self.runtime.unbind_all();
        self.guard.clear_started();
        self.camera = None;
        self.sink.release();
        self.config = None;
        self.capture_size = None;
        log::info!("capture session destroyed");
    }

    pub fn state(&self) -> SessionState {
        if self.guard.is_destroyed() {
            SessionState::Destroyed
        } else if self.guard.is_started() {
            SessionState::Bound
        } else if self.starting {
            SessionState::Starting
        } else {
            SessionState::Unbound
        }
    }

    pub fn stats(&self) -> StatsSnapshot {
        self.stats.snapshot()
    }

    pub fn lens_facing(&self) -> LensFacing {
        self.lens_facing
    }

    /// Resolved capture size of the current binding.
    pub fn capture_size(&self) -> Option<(u32, u32)> {
        self.capture_size
    }

    pub fn runtime(&self) -> &R {
        &self.runtime
    }

    pub fn runtime_mut(&mut self) -> &mut R {
        &mut self.runtime
    }

    fn restart(&mut self, config: CaptureConfig) -> Result<(), CaptureError> {
        config.validate()?;
        if self.guard.is_started() {
            log::warn!("capture already started, unbinding first");
            self.unbind();
        }

        let orientation = self.orientation.current();
        let quirk = resolve_quirk(&self.device);
        let (width, height) = resolve_capture_size(config.preset, orientation, quirk);
        let pool = FramePool::sized(width, height, config.pool_slots);

        self.starting = true;
        let outcome = self.bind(config, quirk, width, height, pool);
        self.starting = false;
        if let Err(err) = &outcome {
            log::error!("camera start failed: {}", err);
        }
        outcome
    }

    fn bind(
        &mut self,
        config: CaptureConfig,
        quirk: DeviceQuirk,
        width: u32,
        height: u32,
        pool: FramePool,
    ) -> Result<(), CaptureError> {
        self.runtime.acquire_provider()?;
        // The provider wait may have raced a destroy.
        if self.guard.is_destroyed() {
            log::warn!("camera provider became ready after destruction");
            return Err(CaptureError::Destroyed);
        }

        self.lens_front
            .store(self.lens_facing.is_front(), Ordering::SeqCst);
        let analyzer = FrameAnalyzer::new(
            self.guard.clone(),
            self.sink.clone(),
            pool,
            quirk,
            self.lens_front.clone(),
            self.stats.clone(),
        );
        let request = BindRequest {
            lens_facing: self.lens_facing,
            width,
            height,
            target_fps: config.frame_rate,
        };
        let camera = self.runtime.bind(&request, analyzer)?;

        self.camera = Some(camera);
        self.capture_size = Some((width, height));
        self.config = Some(config);
        self.guard.set_started();
        log::info!(
            "camera started at {}x{} facing {:?}",
            width,
            height,
            self.lens_facing
        );
        Ok(())
    }

    fn unbind(&mut self) {
        self.runtime.unbind_all();
        self.camera = None;
        self.guard.clear_started();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn landscape_keeps_preset_dimensions() {
        let size = resolve_capture_size(
            ResolutionPreset::P1280x720,
            Orientation::Landscape,
            DeviceQuirk::default(),
        );
        assert_eq!(size, (1280, 720));
        let size = resolve_capture_size(
            ResolutionPreset::P1280x720,
            Orientation::ReverseLandscape,
            DeviceQuirk::default(),
        );
        assert_eq!(size, (1280, 720));
    }

    #[test]
    fn portrait_swaps_preset_dimensions() {
        let size = resolve_capture_size(
            ResolutionPreset::P1280x720,
            Orientation::Portrait,
            DeviceQuirk::default(),
        );
        assert_eq!(size, (720, 1280));
    }

    #[test]
    fn quirk_clamps_resolved_size() {
        let quirk = DeviceQuirk {
            swap_chroma_order: true,
            max_resolution: Some((1280, 720)),
        };
        let landscape =
            resolve_capture_size(ResolutionPreset::P1920x1080, Orientation::Landscape, quirk);
        assert_eq!(landscape, (1280, 720));
        let portrait =
            resolve_capture_size(ResolutionPreset::P1920x1080, Orientation::Portrait, quirk);
        assert_eq!(portrait, (720, 1280));
    }

    #[test]
    fn clamp_leaves_smaller_presets_alone() {
        let quirk = DeviceQuirk {
            swap_chroma_order: true,
            max_resolution: Some((1280, 720)),
        };
        let size = resolve_capture_size(ResolutionPreset::P640x480, Orientation::Landscape, quirk);
        assert_eq!(size, (640, 480));
    }
}
