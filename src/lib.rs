//! AR camera feed core.
//!
//! This crate implements the real-time pipeline that feeds an augmented
//! reality renderer with camera frames:
//!
//! 1. **Acquire**: a bound camera runtime delivers raw multi-plane frames on
//!    a dedicated delivery thread.
//! 2. **Repack**: each frame is converted into one contiguous planar buffer
//!    (full-resolution luma followed by interleaved half-resolution chroma),
//!    honoring per-plane row/pixel strides and device-specific chroma order.
//! 3. **Hand off**: the filled pool slot is lent to the renderer-facing sink
//!    for the duration of one callback.
//!
//! Teardown is guarded by atomic lifecycle flags: `destroy` is idempotent,
//! never waits for an in-flight frame, and a racing delivery observes the
//! destroyed flag and releases its frame without touching freed resources.
//!
//! # Module Structure
//!
//! - `camera`: runtime boundary (provider acquisition, binding, torch) and
//!   the synthetic stub backend
//! - `config`: capture configuration and daemon config layering
//! - `pool`: rotating pool of preallocated frame buffers
//! - `repack`: source frame model and the plane repacker
//! - `session`: capture session manager and the per-frame analyzer
//! - `sink`: renderer-facing frame sink
//! - `guard`: lifecycle safety flags

pub mod camera;
pub mod config;
pub mod error;
pub mod guard;
pub mod pool;
pub mod quirk;
pub mod repack;
pub mod session;
pub mod sink;

pub use camera::{BindRequest, CameraControl, CameraRuntime, StubRuntime, StubRuntimeConfig};
pub use config::{ArcamdConfig, CaptureConfig};
pub use error::{CaptureError, PoolError, ProviderError, RepackError};
pub use guard::LifecycleGuard;
pub use pool::{FramePool, DEFAULT_POOL_SLOTS};
pub use quirk::{resolve_quirk, DeviceProfile, DeviceQuirk};
pub use repack::{repack, required_len, Plane, RepackedFrame, SourceFrame};
pub use session::{
    CaptureSessionManager, FixedOrientation, FrameAnalyzer, OrientationSource, SessionStats,
    StatsSnapshot,
};
pub use sink::{FrameSink, LogSink, SinkCell};

// -------------------- Shared vocabulary --------------------

/// Which physical camera is bound.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum LensFacing {
    Front,
    Rear,
}

impl LensFacing {
    pub fn toggled(self) -> Self {
        match self {
            LensFacing::Front => LensFacing::Rear,
            LensFacing::Rear => LensFacing::Front,
        }
    }

    pub fn is_front(self) -> bool {
        matches!(self, LensFacing::Front)
    }
}

/// Device orientation at (re)start time. Reverse-landscape counts as
/// landscape for resolution selection.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Orientation {
    Portrait,
    Landscape,
    ReversePortrait,
    ReverseLandscape,
}

impl Orientation {
    pub fn is_landscape(self) -> bool {
        matches!(self, Orientation::Landscape | Orientation::ReverseLandscape)
    }
}

/// Capture resolution presets, named in landscape orientation.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ResolutionPreset {
    P640x480,
    P1280x720,
    P1920x1080,
}

impl ResolutionPreset {
    pub fn width(self) -> u32 {
        match self {
            ResolutionPreset::P640x480 => 640,
            ResolutionPreset::P1280x720 => 1280,
            ResolutionPreset::P1920x1080 => 1920,
        }
    }

    pub fn height(self) -> u32 {
        match self {
            ResolutionPreset::P640x480 => 480,
            ResolutionPreset::P1280x720 => 720,
            ResolutionPreset::P1920x1080 => 1080,
        }
    }
}

/// Pixel layout of a source frame, and the tag forwarded to the renderer.
///
/// The repacker consumes `Yuv420` (planar luma plus two chroma planes, each
/// with independent strides). Other layouts are dropped at the delivery
/// boundary.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PixelFormat {
    Yuv420,
    Nv12,
    Rgb24,
}

/// Session lifecycle state. `Destroyed` is terminal.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SessionState {
    Unbound,
    Starting,
    Bound,
    Destroyed,
}
