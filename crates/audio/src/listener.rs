//! Per-frame listener synchronization.
//!
//! The listener follows the local player's ears and eyes. Before a player
//! exists it sits at the origin with a fixed orientation so the backend always
//! has a defined pose.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};

use glam::Vec3;
use sonance_camera::EyeAngles;
use tracing::{trace, warn};

use crate::backend::AudioBackend;
use crate::error::{AudioError, ListenerProperty};

/// Setting read for the listener gain.
pub const VOLUME_CVAR: &str = "volume";

/// Lookup of named float settings.
pub trait ConVars {
    /// Current value of `name`, if the setting exists.
    fn find_float(&self, name: &str) -> Option<f32>;
}

impl ConVars for HashMap<String, f32> {
    fn find_float(&self, name: &str) -> Option<f32> {
        self.get(name).copied()
    }
}

impl<T: ConVars + ?Sized> ConVars for Arc<T> {
    fn find_float(&self, name: &str) -> Option<f32> {
        (**self).find_float(name)
    }
}

impl<T: ConVars + ?Sized> ConVars for Mutex<T> {
    fn find_float(&self, name: &str) -> Option<f32> {
        self.lock()
            .unwrap_or_else(PoisonError::into_inner)
            .find_float(name)
    }
}

/// What the audio system needs to know about the local player.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PlayerView {
    /// Where the player hears from.
    pub ear_position: Vec3,
    /// Where the player looks.
    pub eye_angles: EyeAngles,
}

/// Source of the local player.
pub trait PlayerSource {
    /// The local player, or `None` before one is spawned.
    fn local_player(&self) -> Option<PlayerView>;
}

/// No player, ever. The listener stays on its fallback pose.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoPlayer;

impl PlayerSource for NoPlayer {
    fn local_player(&self) -> Option<PlayerView> {
        None
    }
}

impl PlayerSource for Option<PlayerView> {
    fn local_player(&self) -> Option<PlayerView> {
        *self
    }
}

impl<T: PlayerSource + ?Sized> PlayerSource for Arc<T> {
    fn local_player(&self) -> Option<PlayerView> {
        (**self).local_player()
    }
}

impl<T: PlayerSource + ?Sized> PlayerSource for Mutex<T> {
    fn local_player(&self) -> Option<PlayerView> {
        self.lock()
            .unwrap_or_else(PoisonError::into_inner)
            .local_player()
    }
}

/// Listener pose and gain for one frame.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ListenerState {
    /// Ear position.
    pub position: Vec3,
    /// Look direction.
    pub forward: Vec3,
    /// Up vector.
    pub up: Vec3,
    /// Master gain.
    pub gain: f32,
}

impl ListenerState {
    /// Forward used while no player exists.
    pub const FALLBACK_FORWARD: Vec3 = Vec3::NEG_Z;

    /// Origin, facing away from the viewer, with a zero up vector.
    pub fn fallback(gain: f32) -> Self {
        Self {
            position: Vec3::ZERO,
            forward: Self::FALLBACK_FORWARD,
            up: Vec3::ZERO,
            gain,
        }
    }

    /// Pose for `player`, or the fallback when there is none.
    pub fn from_player(player: Option<&PlayerView>, gain: f32) -> Self {
        match player {
            Some(player) => {
                let basis = player.eye_angles.basis();
                Self {
                    position: player.ear_position,
                    forward: basis.forward,
                    up: basis.up,
                    gain,
                }
            }
            None => Self::fallback(gain),
        }
    }

    /// Read the player and volume from the collaborators.
    pub fn capture(player: &dyn PlayerSource, cvars: &dyn ConVars) -> Self {
        let gain = cvars.find_float(VOLUME_CVAR).unwrap_or(0.0);
        Self::from_player(player.local_player().as_ref(), gain)
    }

    /// Orientation as forward followed by up.
    pub fn orientation(&self) -> [f32; 6] {
        [
            self.forward.x,
            self.forward.y,
            self.forward.z,
            self.up.x,
            self.up.y,
            self.up.z,
        ]
    }

    /// Write position, orientation and gain, each independently.
    ///
    /// A rejected property is logged and skipped; the other writes still
    /// happen. The next frame retries all three.
    pub fn apply<B: AudioBackend>(&self, backend: &mut B) -> Vec<AudioError> {
        let mut failures = Vec::new();

        if let Err(source) = backend.set_listener_position(self.position.to_array()) {
            warn!(%source, "Couldn't update the listener's position");
            failures.push(AudioError::ListenerUpdate {
                property: ListenerProperty::Position,
                source,
            });
        }

        if let Err(source) = backend.set_listener_orientation(self.orientation()) {
            warn!(%source, "Couldn't update the listener's orientation");
            failures.push(AudioError::ListenerUpdate {
                property: ListenerProperty::Orientation,
                source,
            });
        }

        if let Err(source) = backend.set_listener_gain(self.gain) {
            warn!(%source, gain = self.gain, "Couldn't set the listener's gain");
            failures.push(AudioError::ListenerUpdate {
                property: ListenerProperty::Gain,
                source,
            });
        }

        failures
    }
}

/// Outcome of one listener sync.
#[derive(Debug)]
pub struct ListenerReport {
    /// The state that was pushed.
    pub state: ListenerState,
    /// Properties the backend rejected this frame.
    pub failures: Vec<AudioError>,
}

impl ListenerReport {
    /// Whether every property was applied.
    pub fn is_clean(&self) -> bool {
        self.failures.is_empty()
    }

    /// Whether `property` was rejected.
    pub fn failed(&self, property: ListenerProperty) -> bool {
        self.failures.iter().any(|err| {
            matches!(err, AudioError::ListenerUpdate { property: p, .. } if *p == property)
        })
    }
}

/// Capture the listener and push it to `backend`.
///
/// `elapsed` is `None` for the priming sync done at init.
pub fn sync_listener<B: AudioBackend>(
    backend: &mut B,
    player: &dyn PlayerSource,
    cvars: &dyn ConVars,
    elapsed: Option<f32>,
) -> ListenerReport {
    let state = ListenerState::capture(player, cvars);
    trace!(?elapsed, position = ?state.position, gain = state.gain, "Listener sync");
    let failures = state.apply(backend);
    ListenerReport { state, failures }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::mock::{BackendCall, BackendOp, MockBackend};

    fn bound_backend() -> MockBackend {
        let mut backend = MockBackend::new();
        let device = backend.open_device(None).unwrap();
        let context = backend.create_context(&device).unwrap();
        backend.make_context_current(Some(&context)).unwrap();
        backend.clear_calls();
        backend
    }

    fn volume(value: f32) -> HashMap<String, f32> {
        HashMap::from([(VOLUME_CVAR.to_string(), value)])
    }

    #[test]
    fn missing_player_uses_fallback_pose() {
        let mut backend = bound_backend();
        let report = sync_listener(&mut backend, &NoPlayer, &volume(0.8), Some(0.016));

        assert!(report.is_clean());
        let listener = backend.listener();
        assert_eq!(listener.position, [0.0, 0.0, 0.0]);
        assert_eq!(listener.orientation, [0.0, 0.0, -1.0, 0.0, 0.0, 0.0]);
        assert_eq!(listener.gain, 0.8);
    }

    #[test]
    fn fallback_ignores_previous_frame() {
        let mut backend = bound_backend();
        let player = Mutex::new(Some(PlayerView {
            ear_position: Vec3::new(5.0, 64.0, -3.0),
            eye_angles: EyeAngles::from_degrees(10.0, 45.0, 0.0),
        }));
        sync_listener(&mut backend, &player, &volume(1.0), Some(0.016));
        assert_eq!(backend.listener().position, [5.0, 64.0, -3.0]);

        *player.lock().unwrap() = None;
        let report = sync_listener(&mut backend, &player, &volume(1.0), Some(0.016));
        assert_eq!(report.state, ListenerState::fallback(1.0));
        assert_eq!(backend.listener().position, [0.0, 0.0, 0.0]);
        assert_eq!(
            backend.listener().orientation,
            [0.0, 0.0, -1.0, 0.0, 0.0, 0.0]
        );
    }

    #[test]
    fn player_pose_drives_listener() {
        let mut backend = bound_backend();
        let player = Some(PlayerView {
            ear_position: Vec3::new(1.0, 2.0, 3.0),
            eye_angles: EyeAngles::default(),
        });
        sync_listener(&mut backend, &player, &volume(0.5), None);

        let listener = backend.listener();
        assert_eq!(listener.position, [1.0, 2.0, 3.0]);
        let o = listener.orientation;
        assert!((o[0] - 1.0).abs() < 1e-5 && o[1].abs() < 1e-5 && o[2].abs() < 1e-5);
        assert!(o[3].abs() < 1e-5 && (o[4] - 1.0).abs() < 1e-5 && o[5].abs() < 1e-5);
    }

    #[test]
    fn missing_volume_means_silence() {
        let state = ListenerState::capture(&NoPlayer, &HashMap::<String, f32>::new());
        assert_eq!(state.gain, 0.0);
    }

    #[test]
    fn one_rejected_property_does_not_block_the_others() {
        let mut backend = bound_backend();
        backend.fail(BackendOp::ListenerPosition);

        let report = sync_listener(&mut backend, &NoPlayer, &volume(0.3), Some(0.016));
        assert!(report.failed(ListenerProperty::Position));
        assert!(!report.failed(ListenerProperty::Orientation));
        assert!(!report.failed(ListenerProperty::Gain));
        assert_eq!(backend.listener().gain, 0.3);

        let calls = backend.calls();
        assert_eq!(calls.len(), 3);
        assert!(matches!(calls[0], BackendCall::ListenerPosition(_)));
        assert!(matches!(calls[1], BackendCall::ListenerOrientation(_)));
        assert!(matches!(calls[2], BackendCall::ListenerGain(_)));
    }

    #[test]
    fn every_property_can_fail_in_one_frame() {
        let mut backend = MockBackend::new();
        let report = sync_listener(&mut backend, &NoPlayer, &volume(1.0), Some(0.016));
        assert_eq!(report.failures.len(), 3);
    }
}
