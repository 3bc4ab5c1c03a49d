//! Player and settings sources the test can change between frames.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use glam::Vec3;
use sonance_audio::{ConVars, PlayerSource, PlayerView, VOLUME_CVAR};
use sonance_camera::EyeAngles;

/// A local player that can be spawned, moved and removed.
#[derive(Debug, Clone, Default)]
pub struct SharedPlayer {
    view: Arc<Mutex<Option<PlayerView>>>,
}

impl SharedPlayer {
    /// No player yet.
    pub fn absent() -> Self {
        Self::default()
    }

    /// Spawn or move the player.
    pub fn place(&self, ear_position: Vec3, eye_angles: EyeAngles) {
        *self.view.lock().unwrap() = Some(PlayerView {
            ear_position,
            eye_angles,
        });
    }

    /// Remove the player.
    pub fn despawn(&self) {
        *self.view.lock().unwrap() = None;
    }
}

impl PlayerSource for SharedPlayer {
    fn local_player(&self) -> Option<PlayerView> {
        *self.view.lock().unwrap()
    }
}

/// Named float settings that the test can edit while the system runs.
#[derive(Debug, Clone, Default)]
pub struct SharedConVars {
    values: Arc<Mutex<HashMap<String, f32>>>,
}

impl SharedConVars {
    /// A store with only `volume` set.
    pub fn with_volume(volume: f32) -> Self {
        let store = Self::default();
        store.set(VOLUME_CVAR, volume);
        store
    }

    /// Set `name`.
    pub fn set(&self, name: &str, value: f32) {
        self.values.lock().unwrap().insert(name.to_owned(), value);
    }

    /// Remove `name`.
    pub fn unset(&self, name: &str) {
        self.values.lock().unwrap().remove(name);
    }
}

impl ConVars for SharedConVars {
    fn find_float(&self, name: &str) -> Option<f32> {
        self.values.lock().unwrap().get(name).copied()
    }
}
