//! Error types for the audio system.

use std::fmt;

use thiserror::Error;

use crate::backend::BackendError;

/// Listener property pushed to the backend every frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ListenerProperty {
    /// Ear position.
    Position,
    /// Forward/up basis.
    Orientation,
    /// Master gain.
    Gain,
}

impl fmt::Display for ListenerProperty {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ListenerProperty::Position => write!(f, "position"),
            ListenerProperty::Orientation => write!(f, "orientation"),
            ListenerProperty::Gain => write!(f, "gain"),
        }
    }
}

/// Failures surfaced by [`crate::AudioSystem`].
///
/// Everything except [`AudioError::ListenerUpdate`] aborts initialization.
#[derive(Debug, Error)]
pub enum AudioError {
    /// The output device couldn't be opened.
    #[error("output device couldn't be opened: {0}")]
    DeviceOpen(#[source] BackendError),
    /// The device refused to create a context.
    #[error("couldn't create a context: {0}")]
    ContextCreate(#[source] BackendError),
    /// The context couldn't be made current.
    #[error("couldn't make the context current: {0}")]
    ContextActivate(#[source] BackendError),
    /// The backend rejected the speed of sound. Usually outdated drivers.
    #[error("speed of sound was rejected, audio drivers may be outdated: {0}")]
    PropagationConfig(#[source] BackendError),
    /// One listener property failed to apply this frame.
    #[error("couldn't update the listener's {property}: {source}")]
    ListenerUpdate {
        /// Which property was rejected.
        property: ListenerProperty,
        /// Backend failure.
        #[source]
        source: BackendError,
    },
    /// The sample update thread couldn't be spawned.
    #[error("failed to spawn the sample update thread: {0}")]
    WorkerSpawn(#[from] std::io::Error),
}

impl AudioError {
    /// Whether this error leaves the system un-initialized.
    pub fn is_fatal(&self) -> bool {
        !matches!(self, AudioError::ListenerUpdate { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn listener_failures_are_not_fatal() {
        let err = AudioError::ListenerUpdate {
            property: ListenerProperty::Gain,
            source: BackendError::InvalidValue("gain".into()),
        };
        assert!(!err.is_fatal());
        assert_eq!(
            err.to_string(),
            "couldn't update the listener's gain: invalid value: gain"
        );

        assert!(AudioError::DeviceOpen(BackendError::DeviceNotFound("x".into())).is_fatal());
        assert!(AudioError::PropagationConfig(BackendError::NoCurrentContext).is_fatal());
    }
}
