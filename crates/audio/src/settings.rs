//! Audio settings and volume controls.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::listener::{ConVars, VOLUME_CVAR};

/// Speed of sound in world units per second (metres, at sea level).
pub const DEFAULT_SPEED_OF_SOUND: f32 = 343.3;

/// Audio system settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AudioSettings {
    /// Master volume (0.0 to 1.0)
    pub volume: f32,
    /// Whether audio is muted
    pub muted: bool,
    /// Output device name; `None` opens the default device.
    pub device: Option<String>,
    /// Propagation speed handed to the backend at init.
    pub speed_of_sound: f32,
    /// Sample update thread pacing.
    pub worker: WorkerSettings,
}

impl Default for AudioSettings {
    fn default() -> Self {
        Self {
            volume: 1.0,
            muted: false,
            device: None,
            speed_of_sound: DEFAULT_SPEED_OF_SOUND,
            worker: WorkerSettings::default(),
        }
    }
}

impl AudioSettings {
    /// Create new audio settings with default values.
    pub fn new() -> Self {
        Self::default()
    }

    /// Volume after mute is applied.
    pub fn effective_volume(&self) -> f32 {
        if self.muted {
            0.0
        } else {
            self.volume
        }
    }

    /// Set master volume (clamped to 0.0-1.0).
    pub fn set_volume(&mut self, volume: f32) {
        self.volume = volume.clamp(0.0, 1.0);
    }

    /// Toggle mute state.
    pub fn toggle_mute(&mut self) {
        self.muted = !self.muted;
    }
}

impl ConVars for AudioSettings {
    fn find_float(&self, name: &str) -> Option<f32> {
        match name {
            VOLUME_CVAR => Some(self.effective_volume()),
            "speed_of_sound" => Some(self.speed_of_sound),
            _ => None,
        }
    }
}

/// How the sample update thread paces its sweeps.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct WorkerSettings {
    /// Wait between sweeps while samples are playing. Zero sweeps back to back.
    pub update_interval_ms: u64,
    /// Wait after a sweep that left no samples.
    pub idle_wait_ms: u64,
}

impl Default for WorkerSettings {
    fn default() -> Self {
        Self {
            update_interval_ms: 0,
            idle_wait_ms: 10,
        }
    }
}

impl WorkerSettings {
    /// Wait between sweeps with live samples.
    pub fn update_interval(&self) -> Duration {
        Duration::from_millis(self.update_interval_ms)
    }

    /// Wait after an empty sweep.
    pub fn idle_wait(&self) -> Duration {
        Duration::from_millis(self.idle_wait_ms)
    }
}
