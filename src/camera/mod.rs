//! Camera runtime boundary.
//!
//! The platform camera subsystem is an external collaborator reached
//! through [`CameraRuntime`]: the session manager acquires the capture
//! provider, binds a [`FrameAnalyzer`] to a lens selection and resolution,
//! and receives a [`CameraControl`] for torch operations. The crate ships
//! one backend, the synthetic [`stub::StubRuntime`]; platform backends
//! implement the same traits.

use crate::error::ProviderError;
use crate::session::FrameAnalyzer;
use crate::LensFacing;

pub mod stub;

pub use stub::{StubRuntime, StubRuntimeConfig};

/// Resolved bind parameters for one camera session.
#[derive(Clone, Debug)]
pub struct BindRequest {
    pub lens_facing: LensFacing,
    /// Capture width after orientation/quirk resolution.
    pub width: u32,
    /// Capture height after orientation/quirk resolution.
    pub height: u32,
    pub target_fps: u32,
}

/// Control surface of a bound camera.
pub trait CameraControl: Send {
    /// Whether the bound camera has a flash unit usable as a torch.
    fn has_torch(&self) -> bool;

    fn torch_enabled(&self) -> bool;

    /// Enable or disable the torch. No-op on cameras without one.
    fn set_torch(&mut self, enabled: bool);
}

/// A camera backend: provider acquisition, binding, and unbinding.
pub trait CameraRuntime: Send {
    /// Acquire the platform capture provider. Backends that wait on an
    /// out-of-process handshake complete it on their own executor and
    /// return once the provider is ready; the caller re-checks its
    /// lifecycle flags afterwards, so a destroy issued during the wait is
    /// still observed.
    fn acquire_provider(&mut self) -> Result<(), ProviderError>;

    /// Bind `analyzer` to a camera matching `request`, unbinding any
    /// previous binding first. Frames flow to the analyzer on the
    /// backend's delivery thread until [`CameraRuntime::unbind_all`].
    fn bind(
        &mut self,
        request: &BindRequest,
        analyzer: FrameAnalyzer,
    ) -> Result<Box<dyn CameraControl>, ProviderError>;

    /// Stop frame delivery. Must not wait for an in-flight delivery to
    /// finish; a racing delivery is expected to observe the session's
    /// lifecycle flags and abort on its own.
    fn unbind_all(&mut self);
}
