//! Synthetic camera backend.
//!
//! Generates deterministic multi-plane frames with padded row strides and
//! interleaved chroma, the shapes real sensors deliver. Used by the test
//! suite and by `arcamd` when no platform backend is compiled in. Frame
//! acquisitions and releases are counted so tests can assert that every
//! delivered frame's native resource was closed.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::Duration;

use crate::camera::{BindRequest, CameraControl, CameraRuntime};
use crate::error::ProviderError;
use crate::repack::{Plane, SourceFrame};
use crate::session::FrameAnalyzer;
use crate::PixelFormat;

#[derive(Clone, Debug)]
pub struct StubRuntimeConfig {
    /// Whether the stub camera reports a flash unit.
    pub torch: bool,
    /// Fail provider acquisition (retryable start failure).
    pub fail_provider: bool,
    /// Fail binding after a successful provider acquisition.
    pub fail_bind: bool,
    /// Stream frames from a generator thread at the bound request's target
    /// rate. When false, frames are injected manually.
    pub auto_stream: bool,
    /// Extra pad bytes appended to every plane row.
    pub row_padding: usize,
    /// Pixel stride of the generated chroma planes (2 = semi-planar).
    pub chroma_pixel_stride: usize,
    /// Rotation reported on every generated frame.
    pub rotation_degrees: u32,
}

impl Default for StubRuntimeConfig {
    fn default() -> Self {
        Self {
            torch: true,
            fail_provider: false,
            fail_bind: false,
            auto_stream: false,
            row_padding: 8,
            chroma_pixel_stride: 2,
            rotation_degrees: 90,
        }
    }
}

/// Builds deterministic source frames for one binding.
#[derive(Clone)]
pub struct FrameFactory {
    width: u32,
    height: u32,
    row_padding: usize,
    chroma_pixel_stride: usize,
    rotation_degrees: u32,
    created: Arc<AtomicUsize>,
    released: Arc<AtomicUsize>,
}

impl FrameFactory {
    pub fn make_frame(&self, seq: u64) -> SourceFrame {
        self.created.fetch_add(1, Ordering::SeqCst);

        let width = self.width as usize;
        let height = self.height as usize;
        let chroma_width = width / 2;
        let chroma_height = height / 2;

        let luma_row_stride = width + self.row_padding;
        let mut luma = vec![0u8; luma_row_stride * height];
        for row in 0..height {
            for col in 0..width {
                luma[row * luma_row_stride + col] = ((row + col) as u64 + seq) as u8;
            }
        }

        let chroma_row_stride = chroma_width * self.chroma_pixel_stride + self.row_padding;
        let mut chroma_a = vec![0u8; chroma_row_stride * chroma_height];
        let mut chroma_b = vec![0u8; chroma_row_stride * chroma_height];
        for row in 0..chroma_height {
            for col in 0..chroma_width {
                let index = row * chroma_row_stride + col * self.chroma_pixel_stride;
                chroma_a[index] = (0x20u64 + seq + col as u64) as u8;
                chroma_b[index] = (0x10u64 + seq + col as u64) as u8;
            }
        }

        let released = self.released.clone();
        SourceFrame::new(
            self.width,
            self.height,
            self.rotation_degrees,
            PixelFormat::Yuv420,
            [
                Plane::new(luma, luma_row_stride, 1),
                Plane::new(chroma_a, chroma_row_stride, self.chroma_pixel_stride),
                Plane::new(chroma_b, chroma_row_stride, self.chroma_pixel_stride),
            ],
        )
        .with_release(move || {
            released.fetch_add(1, Ordering::SeqCst);
        })
    }
}

/// Cloneable handle through which frames reach the bound analyzer. Safe to
/// drive from any thread; deliveries are serialized in arrival order.
#[derive(Clone)]
pub struct DeliveryHandle {
    analyzer: Arc<Mutex<FrameAnalyzer>>,
    factory: FrameFactory,
}

impl DeliveryHandle {
    pub fn deliver_one(&self, seq: u64) {
        let frame = self.factory.make_frame(seq);
        match self.analyzer.lock() {
            Ok(mut analyzer) => analyzer.deliver(frame),
            // Dropping the frame still releases its native resource.
            Err(_) => log::error!("analyzer lock poisoned, dropping frame {}", seq),
        }
    }
}

struct StubBinding {
    stop: Arc<AtomicBool>,
    join: Option<thread::JoinHandle<()>>,
    handle: DeliveryHandle,
    seq: u64,
}

pub struct StubRuntime {
    config: StubRuntimeConfig,
    provider_ready: bool,
    binding: Option<StubBinding>,
    retired: Vec<thread::JoinHandle<()>>,
    created: Arc<AtomicUsize>,
    released: Arc<AtomicUsize>,
    last_bind: Option<BindRequest>,
}

impl StubRuntime {
    pub fn new(config: StubRuntimeConfig) -> Self {
        Self {
            config,
            provider_ready: false,
            binding: None,
            retired: Vec::new(),
            created: Arc::new(AtomicUsize::new(0)),
            released: Arc::new(AtomicUsize::new(0)),
            last_bind: None,
        }
    }

    pub fn frames_created(&self) -> usize {
        self.created.load(Ordering::SeqCst)
    }

    pub fn frames_released(&self) -> usize {
        self.released.load(Ordering::SeqCst)
    }

    /// Parameters of the most recent bind, for assertions on resolved
    /// resolution and lens selection.
    pub fn last_bind_request(&self) -> Option<&BindRequest> {
        self.last_bind.as_ref()
    }

    pub fn is_bound(&self) -> bool {
        self.binding.is_some()
    }

    /// Handle for driving deliveries from another thread. None until bound.
    pub fn delivery_handle(&self) -> Option<DeliveryHandle> {
        self.binding.as_ref().map(|binding| binding.handle.clone())
    }

    /// Inject `count` frames on the calling thread.
    pub fn deliver_frames(&mut self, count: usize) {
        let Some(binding) = self.binding.as_mut() else {
            log::warn!("frame injection with no bound camera");
            return;
        };
        for _ in 0..count {
            let seq = binding.seq;
            binding.seq += 1;
            binding.handle.deliver_one(seq);
        }
    }
}

impl Default for StubRuntime {
    fn default() -> Self {
        Self::new(StubRuntimeConfig::default())
    }
}

impl CameraRuntime for StubRuntime {
    fn acquire_provider(&mut self) -> Result<(), ProviderError> {
        if self.config.fail_provider {
            return Err(ProviderError::Unavailable(
                "stub provider configured to fail".into(),
            ));
        }
        self.provider_ready = true;
        Ok(())
    }

    fn bind(
        &mut self,
        request: &BindRequest,
        analyzer: FrameAnalyzer,
    ) -> Result<Box<dyn CameraControl>, ProviderError> {
        if !self.provider_ready {
            return Err(ProviderError::Unavailable("provider not acquired".into()));
        }
        if self.config.fail_bind {
            return Err(ProviderError::BindRejected(
                "stub bind configured to fail".into(),
            ));
        }

        self.unbind_all();

        let factory = FrameFactory {
            width: request.width,
            height: request.height,
            row_padding: self.config.row_padding,
            chroma_pixel_stride: self.config.chroma_pixel_stride.max(1),
            rotation_degrees: self.config.rotation_degrees,
            created: self.created.clone(),
            released: self.released.clone(),
        };
        let handle = DeliveryHandle {
            analyzer: Arc::new(Mutex::new(analyzer)),
            factory,
        };

        let stop = Arc::new(AtomicBool::new(false));
        let join = self.config.auto_stream.then(|| {
            let handle = handle.clone();
            let stop = stop.clone();
            let interval =
                Duration::from_millis((1000 / u64::from(request.target_fps.max(1))).max(1));
            thread::spawn(move || {
                let mut seq = 0u64;
                while !stop.load(Ordering::SeqCst) {
                    handle.deliver_one(seq);
                    seq += 1;
                    thread::sleep(interval);
                }
            })
        });

        log::info!(
            "stub camera bound: {}x{} facing {:?} at {} fps",
            request.width,
            request.height,
            request.lens_facing,
            request.target_fps
        );
        self.binding = Some(StubBinding {
            stop,
            join,
            handle,
            seq: 0,
        });
        self.last_bind = Some(request.clone());
        Ok(Box::new(StubCamera {
            supported: self.config.torch,
            enabled: false,
        }))
    }

    fn unbind_all(&mut self) {
        if let Some(mut binding) = self.binding.take() {
            binding.stop.store(true, Ordering::SeqCst);
            // No join here: unbinding must not wait for an in-flight
            // delivery. The thread is reaped when the runtime drops.
            if let Some(join) = binding.join.take() {
                self.retired.push(join);
            }
        }
    }
}

impl Drop for StubRuntime {
    fn drop(&mut self) {
        self.unbind_all();
        for join in self.retired.drain(..) {
            let _ = join.join();
        }
    }
}

struct StubCamera {
    supported: bool,
    enabled: bool,
}

impl CameraControl for StubCamera {
    fn has_torch(&self) -> bool {
        self.supported
    }

    fn torch_enabled(&self) -> bool {
        self.supported && self.enabled
    }

    fn set_torch(&mut self, enabled: bool) {
        if self.supported {
            self.enabled = enabled;
            log::debug!("stub torch {}", if enabled { "on" } else { "off" });
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::repack::required_len;

    fn factory(width: u32, height: u32) -> FrameFactory {
        FrameFactory {
            width,
            height,
            row_padding: 8,
            chroma_pixel_stride: 2,
            rotation_degrees: 90,
            created: Arc::new(AtomicUsize::new(0)),
            released: Arc::new(AtomicUsize::new(0)),
        }
    }

    #[test]
    fn generated_frames_carry_padded_strides() {
        let factory = factory(8, 8);
        let frame = factory.make_frame(0);
        assert_eq!(frame.width, 8);
        assert_eq!(frame.planes[0].row_stride, 16);
        assert_eq!(frame.planes[0].pixel_stride, 1);
        assert_eq!(frame.planes[1].row_stride, 4 * 2 + 8);
        assert_eq!(frame.planes[1].pixel_stride, 2);
        assert_eq!(frame.format, PixelFormat::Yuv420);
    }

    #[test]
    fn generated_frames_repack_cleanly() {
        let factory = factory(8, 8);
        let frame = factory.make_frame(3);
        let mut dest = vec![0u8; required_len(8, 8)];
        let written =
            crate::repack::repack(&frame, &mut dest, crate::quirk::DeviceQuirk::default())
                .unwrap();
        assert_eq!(written, required_len(8, 8));
        // First luma sample of frame seq=3 is 3; default order puts
        // chroma-B first.
        assert_eq!(dest[0], 3);
        assert_eq!(dest[64], 0x13);
        assert_eq!(dest[65], 0x23);
    }

    #[test]
    fn factory_counts_creations_and_releases() {
        let factory = factory(8, 8);
        let frame = factory.make_frame(0);
        assert_eq!(factory.created.load(Ordering::SeqCst), 1);
        assert_eq!(factory.released.load(Ordering::SeqCst), 0);
        frame.release();
        assert_eq!(factory.released.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn provider_failure_is_reported() {
        let mut runtime = StubRuntime::new(StubRuntimeConfig {
            fail_provider: true,
            ..StubRuntimeConfig::default()
        });
        assert!(matches!(
            runtime.acquire_provider(),
            Err(ProviderError::Unavailable(_))
        ));
    }

    #[test]
    fn torch_is_a_no_op_without_flash_unit() {
        let mut camera = StubCamera {
            supported: false,
            enabled: false,
        };
        camera.set_torch(true);
        assert!(!camera.has_torch());
        assert!(!camera.torch_enabled());
    }
}
