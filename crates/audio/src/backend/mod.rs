//! The device API the audio system drives.
//!
//! The shape follows the classic positional-audio device model: a device is
//! opened, a context is created on it and made current, and listener state is
//! written into whichever context is current. Every call is fallible and is
//! checked at the call site.

use thiserror::Error;
use tracing::warn;

pub mod mock;
#[cfg(feature = "rodio_backend")]
pub mod rodio_output;

/// Failure reported by a backend call.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BackendError {
    /// No output device matched the request.
    #[error("device not found: {0}")]
    DeviceNotFound(String),
    /// A listener or context call was made with no current context.
    #[error("no current context")]
    NoCurrentContext,
    /// The handle passed in isn't live on this backend.
    #[error("invalid handle: {0}")]
    InvalidHandle(String),
    /// A parameter was outside the accepted range.
    #[error("invalid value: {0}")]
    InvalidValue(String),
    /// The call isn't supported by the driver.
    #[error("unsupported: {0}")]
    Unsupported(String),
    /// Driver-level failure.
    #[error("driver error: {0}")]
    Driver(String),
}

/// A positional audio device API.
///
/// Handles are owned values: closing a device or destroying a context consumes
/// it, so a handle can't be released twice.
pub trait AudioBackend {
    /// An open output device.
    type Device;
    /// A rendering context on a device.
    type Context;

    /// Short label for logs.
    fn name(&self) -> &'static str;

    /// Open a device by name, or the default output device for `None`.
    fn open_device(&mut self, name: Option<&str>) -> Result<Self::Device, BackendError>;

    /// Close a device. Its contexts must be destroyed first.
    fn close_device(&mut self, device: Self::Device) -> Result<(), BackendError>;

    /// Create a rendering context on `device`.
    fn create_context(&mut self, device: &Self::Device) -> Result<Self::Context, BackendError>;

    /// Make `context` current, or unbind the current context with `None`.
    fn make_context_current(&mut self, context: Option<&Self::Context>)
        -> Result<(), BackendError>;

    /// Destroy a context. It must not be current.
    fn destroy_context(&mut self, context: Self::Context) -> Result<(), BackendError>;

    /// Listener position in world space.
    fn set_listener_position(&mut self, position: [f32; 3]) -> Result<(), BackendError>;

    /// Listener orientation as a forward vector followed by an up vector.
    fn set_listener_orientation(&mut self, orientation: [f32; 6]) -> Result<(), BackendError>;

    /// Listener master gain.
    fn set_listener_gain(&mut self, gain: f32) -> Result<(), BackendError>;

    /// Speed of sound in world units per second.
    fn set_speed_of_sound(&mut self, speed: f32) -> Result<(), BackendError>;
}

/// Device and context acquired by a successful init.
///
/// Both are `None` before init and after shutdown.
pub struct BackendHandle<B: AudioBackend> {
    pub(crate) device: Option<B::Device>,
    pub(crate) context: Option<B::Context>,
}

impl<B: AudioBackend> Default for BackendHandle<B> {
    fn default() -> Self {
        Self {
            device: None,
            context: None,
        }
    }
}

impl<B: AudioBackend> BackendHandle<B> {
    /// Whether a device is open.
    pub fn has_device(&self) -> bool {
        self.device.is_some()
    }

    /// Whether a context exists.
    pub fn has_context(&self) -> bool {
        self.context.is_some()
    }

    /// Unbind and destroy the context, then close the device.
    ///
    /// Each step only runs for handles that are present, so releasing an empty
    /// handle is a no-op. Failures are logged and teardown continues.
    pub fn release(&mut self, backend: &mut B) {
        if let Some(context) = self.context.take() {
            if let Err(err) = backend.make_context_current(None) {
                warn!(backend = backend.name(), %err, "Couldn't unbind the audio context");
            }
            if let Err(err) = backend.destroy_context(context) {
                warn!(backend = backend.name(), %err, "Couldn't destroy the audio context");
            }
        }

        if let Some(device) = self.device.take() {
            if let Err(err) = backend.close_device(device) {
                warn!(backend = backend.name(), %err, "Couldn't close the audio device");
            }
        }
    }
}
