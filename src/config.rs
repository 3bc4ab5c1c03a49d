use anyhow::Result;
use serde::{Deserialize, Serialize};
use sonance_audio::AudioSettings;
use std::{fs, path::Path};
use tracing::warn;

pub const DEFAULT_CONFIG_PATH: &str = "config/audio.toml";

/// Everything the harness reads from `config/audio.toml`.
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct AppConfig {
    pub audio: AudioSettings,
    pub demo: DemoSettings,
}

/// How the headless loop runs.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct DemoSettings {
    /// Frames to run before shutting down.
    pub frames: u32,
    /// Fixed frame rate of the loop.
    pub tick_rate_hz: f32,
    /// Sleep between frames so samples play in real time.
    pub realtime: bool,
    /// Radius of the player's orbit around the origin.
    pub orbit_radius: f32,
    /// Degrees of orbit per second.
    pub orbit_speed_deg: f32,
    /// Ear height above the ground.
    pub ear_height: f32,
    /// Start a new sample every this many frames. Zero disables.
    pub sample_every_frames: u32,
    /// Length of each generated sample in seconds.
    pub sample_seconds: f32,
    /// Sound file under the game directory's `sound/` folder.
    pub sound: Option<String>,
}

impl Default for DemoSettings {
    fn default() -> Self {
        Self {
            frames: 600,
            tick_rate_hz: 60.0,
            realtime: false,
            orbit_radius: 8.0,
            orbit_speed_deg: 45.0,
            ear_height: 1.6,
            sample_every_frames: 30,
            sample_seconds: 0.5,
            sound: None,
        }
    }
}

impl DemoSettings {
    /// Seconds per frame.
    pub fn frame_time(&self) -> f32 {
        1.0 / self.tick_rate_hz.max(1.0)
    }
}

impl AppConfig {
    /// Load configuration from the default path.
    pub fn load() -> Self {
        Self::load_from_path(Path::new(DEFAULT_CONFIG_PATH))
    }

    /// Load configuration from an explicit path, falling back to defaults on errors.
    pub fn load_from_path(path: &Path) -> Self {
        match fs::read_to_string(path) {
            Ok(contents) => match toml::from_str::<AppConfig>(&contents) {
                Ok(cfg) => cfg,
                Err(err) => {
                    warn!("Failed to parse {}: {err}. Using defaults", path.display());
                    AppConfig::default()
                }
            },
            Err(err) => {
                if path != Path::new(DEFAULT_CONFIG_PATH)
                    || err.kind() != std::io::ErrorKind::NotFound
                {
                    warn!("Failed to read {}: {err}. Using defaults", path.display());
                } else {
                    warn!(
                        "Audio config not found at {}. Using defaults",
                        path.display()
                    );
                }
                AppConfig::default()
            }
        }
    }

    /// Save configuration to an explicit path.
    pub fn save_to_path(&self, path: &Path) -> Result<()> {
        let toml = toml::to_string_pretty(self)?;
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(path, toml)?;
        Ok(())
    }
}
