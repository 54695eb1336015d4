//! Renderer-facing frame sink.
//!
//! The sink stands in for the rendering SDK's frame intake. It receives each
//! repacked frame as a borrow valid for the duration of one callback, and is
//! released exactly once when the session is destroyed. Deliveries arriving
//! after release are dropped silently.

use std::sync::Mutex;

use crate::repack::RepackedFrame;

/// Consumer of repacked frames. Implementations run on the frame-delivery
/// thread and must do short, bounded work per call.
pub trait FrameSink: Send {
    /// One call per successfully repacked frame, in arrival order. Never
    /// called after [`FrameSink::release`].
    fn on_frame_ready(&mut self, frame: &RepackedFrame<'_>);

    /// Release the renderer-facing resource. Called exactly once at destroy.
    fn release(&mut self) {}
}

/// Shared cell holding the sink across the control and delivery threads.
///
/// The mutex is held only for the bounded duration of one sink call or the
/// one-shot release; the delivery path checks the lifecycle flags before
/// ever reaching for it.
pub struct SinkCell {
    inner: Mutex<Option<Box<dyn FrameSink>>>,
}

impl SinkCell {
    pub fn new(sink: Box<dyn FrameSink>) -> Self {
        Self {
            inner: Mutex::new(Some(sink)),
        }
    }

    /// Forward a frame to the sink, unless it was already released.
    pub fn deliver(&self, frame: &RepackedFrame<'_>) {
        let Ok(mut guard) = self.inner.lock() else {
            log::error!("frame sink lock poisoned, dropping frame");
            return;
        };
        if let Some(sink) = guard.as_mut() {
            sink.on_frame_ready(frame);
        }
    }

    /// Release the sink's underlying resource. Idempotent: only the first
    /// call reaches the sink.
    pub fn release(&self) {
        let Ok(mut guard) = self.inner.lock() else {
            log::error!("frame sink lock poisoned during release");
            return;
        };
        if let Some(mut sink) = guard.take() {
            sink.release();
        }
    }

    pub fn is_released(&self) -> bool {
        self.inner.lock().map(|guard| guard.is_none()).unwrap_or(true)
    }
}

/// Sink that logs frame metadata; the daemon's stand-in renderer.
#[derive(Default)]
pub struct LogSink {
    frames: u64,
}

impl FrameSink for LogSink {
    fn on_frame_ready(&mut self, frame: &RepackedFrame<'_>) {
        self.frames += 1;
        log::debug!(
            "frame {}: {}x{} rot={} front={} format={:?} chroma_stride={} ({} bytes)",
            self.frames,
            frame.width,
            frame.height,
            frame.rotation_degrees,
            frame.front_facing,
            frame.format,
            frame.chroma_pixel_stride,
            frame.data.len()
        );
    }

    fn release(&mut self) {
        log::info!("renderer sink released after {} frames", self.frames);
    }
}
