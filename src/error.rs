//! Error taxonomy for the capture pipeline.
//!
//! Session-level failures (`CaptureError`) surface to the control caller;
//! per-frame failures (`RepackError`, `PoolError`) are absorbed by the
//! delivery path, which logs them and drops the single frame so the stream
//! never halts on one bad frame.

use thiserror::Error;

use crate::{LensFacing, PixelFormat};

/// Failure to obtain or bind the platform capture provider. Reported to the
/// start caller; the session remains unbound and the caller may retry.
#[derive(Debug, Error)]
pub enum ProviderError {
    #[error("camera provider unavailable: {0}")]
    Unavailable(String),
    #[error("no camera matches lens facing {0:?}")]
    NoMatchingCamera(LensFacing),
    #[error("camera bind rejected: {0}")]
    BindRejected(String),
}

/// Session-level errors returned from the control surface.
#[derive(Debug, Error)]
pub enum CaptureError {
    /// Invalid capture configuration; fatal to `start`.
    #[error("invalid capture configuration: {0}")]
    Configuration(String),
    #[error(transparent)]
    Provider(#[from] ProviderError),
    /// The session was destroyed; all further control calls fail fast.
    #[error("capture session destroyed")]
    Destroyed,
}

/// Per-frame repack failures. The frame is dropped; the stream continues.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum RepackError {
    #[error("destination buffer too small: required {required} bytes, capacity {capacity}")]
    BufferTooSmall { required: usize, capacity: usize },
    #[error("unsupported source pixel format {0:?}")]
    UnsupportedFormat(PixelFormat),
}

/// Buffer pool misuse. Acquiring from an unsized pool is a configuration
/// error and fatal to session start.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum PoolError {
    #[error("frame pool has not been sized for a capture resolution")]
    NotSized,
}
