//! sonance - positional audio sync harness
//!
//! Runs the audio system headless: a scripted player orbits the origin while
//! short samples start and finish around them, then prints a one-line summary.

mod config;
mod demo;

use anyhow::{Context, Result};
use config::AppConfig;
use demo::{Harness, PlayerSlot, RunSummary};
use sonance_audio::{sound_path, AudioSystem, BackendOp, MockBackend};
use std::{env, path::PathBuf, sync::Arc};
use tracing::info;

fn main() -> Result<()> {
    // Initialize tracing with WARN level by default (can be overridden via RUST_LOG env var)
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
        )
        .init();

    info!("Starting sonance v{}", env!("CARGO_PKG_VERSION"));

    let cli = CliOptions::parse(env::args().skip(1));
    let mut config = match &cli.config {
        Some(path) => AppConfig::load_from_path(path),
        None => AppConfig::load(),
    };
    cli.apply(&mut config);

    if let Some(path) = &cli.save_config {
        config
            .save_to_path(path)
            .with_context(|| format!("saving config to {}", path.display()))?;
        info!(path = %path.display(), "Saved audio config");
    }

    let player: Option<PlayerSlot> = (!cli.no_player).then(PlayerSlot::default);
    let harness = Harness::new(config.demo.clone(), player.clone());

    let summary = match cli.backend {
        BackendKind::Mock => run_mock(&cli, &config, &harness, player)?,
        #[cfg(feature = "rodio_backend")]
        BackendKind::Rodio => run_rodio(&cli, &config, &harness, player)?,
    };
    println!("{summary}");
    Ok(())
}

fn run_mock(
    cli: &CliOptions,
    config: &AppConfig,
    harness: &Harness,
    player: Option<PlayerSlot>,
) -> Result<RunSummary> {
    let backend = MockBackend::new();
    for op in &cli.fail {
        backend.fail(*op);
    }
    if let Some(relative) = &config.demo.sound {
        tracing::warn!(
            path = %sound_path(&cli.game_dir, relative).display(),
            "Sound files need the rodio backend; playing timed samples instead"
        );
    }

    let mut audio = AudioSystem::new(
        backend,
        config.audio.clone(),
        player_source(player),
        config.audio.clone(),
    );
    harness.run(&mut audio, demo::timed_samples(config.demo.sample_seconds))
}

#[cfg(feature = "rodio_backend")]
fn run_rodio(
    cli: &CliOptions,
    config: &AppConfig,
    harness: &Harness,
    player: Option<PlayerSlot>,
) -> Result<RunSummary> {
    use sonance_audio::{RodioBackend, RodioSample, Sample};

    if !cli.fail.is_empty() {
        tracing::warn!("--fail only applies to the mock backend");
    }

    let bytes = match &config.demo.sound {
        Some(relative) => {
            let path = sound_path(&cli.game_dir, relative);
            match std::fs::read(&path) {
                Ok(bytes) => Some(bytes),
                Err(err) => {
                    tracing::error!(path = %path.display(), %err, "Couldn't read sound file");
                    None
                }
            }
        }
        None => None,
    };

    let mut audio = AudioSystem::new(
        RodioBackend::new(),
        config.audio.clone(),
        player_source(player),
        config.audio.clone(),
    );
    let length = config.demo.sample_seconds;
    harness.run(&mut audio, move |audio, emitter| {
        let sample: Box<dyn Sample> = match &bytes {
            Some(bytes) if audio.is_initialized() => {
                match RodioSample::from_bytes(audio.backend(), bytes.clone(), emitter, 1.0) {
                    Ok(sample) => Box::new(sample),
                    Err(err) => {
                        tracing::warn!(%err, "Couldn't start sound; skipping");
                        return Ok(None);
                    }
                }
            }
            _ => Box::new(demo::TimedSample::new(length)),
        };
        Ok(Some(sample))
    })
}

fn player_source(player: Option<PlayerSlot>) -> PlayerSlot {
    player.unwrap_or_else(|| Arc::new(Default::default()))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum BackendKind {
    Mock,
    #[cfg(feature = "rodio_backend")]
    Rodio,
}

impl BackendKind {
    fn parse(raw: &str) -> Option<Self> {
        match raw {
            "mock" => Some(BackendKind::Mock),
            #[cfg(feature = "rodio_backend")]
            "rodio" => Some(BackendKind::Rodio),
            _ => None,
        }
    }
}

fn parse_backend_op(raw: &str) -> Option<BackendOp> {
    match raw {
        "open-device" => Some(BackendOp::OpenDevice),
        "create-context" => Some(BackendOp::CreateContext),
        "make-current" => Some(BackendOp::MakeContextCurrent),
        "listener-position" => Some(BackendOp::ListenerPosition),
        "listener-orientation" => Some(BackendOp::ListenerOrientation),
        "listener-gain" => Some(BackendOp::ListenerGain),
        "speed-of-sound" => Some(BackendOp::SpeedOfSound),
        _ => None,
    }
}

#[derive(Debug, Clone)]
struct CliOptions {
    config: Option<PathBuf>,
    save_config: Option<PathBuf>,
    backend: BackendKind,
    device: Option<String>,
    frames: Option<u32>,
    sound: Option<String>,
    game_dir: PathBuf,
    no_player: bool,
    realtime: bool,
    volume: Option<f32>,
    fail: Vec<BackendOp>,
}

impl CliOptions {
    fn parse<I: Iterator<Item = String>>(mut args: I) -> Self {
        let mut opts = CliOptions {
            config: None,
            save_config: None,
            backend: BackendKind::Mock,
            device: None,
            frames: None,
            sound: None,
            game_dir: PathBuf::from("."),
            no_player: false,
            realtime: false,
            volume: None,
            fail: Vec::new(),
        };

        while let Some(arg) = args.next() {
            match arg.as_str() {
                "--no-player" => opts.no_player = true,
                "--realtime" => opts.realtime = true,
                "--config" => {
                    if let Some(path) = args.next() {
                        opts.config = Some(PathBuf::from(path));
                    } else {
                        tracing::error!("--config requires a file path");
                    }
                }
                "--save-config" => {
                    if let Some(path) = args.next() {
                        opts.save_config = Some(PathBuf::from(path));
                    } else {
                        tracing::error!("--save-config requires a file path");
                    }
                }
                "--backend" => {
                    if let Some(raw) = args.next() {
                        match BackendKind::parse(&raw) {
                            Some(kind) => opts.backend = kind,
                            None => tracing::error!(value = %raw, "Unknown --backend"),
                        }
                    } else {
                        tracing::error!("--backend requires a name");
                    }
                }
                "--device" => {
                    if let Some(name) = args.next() {
                        opts.device = Some(name);
                    } else {
                        tracing::error!("--device requires a device name");
                    }
                }
                "--frames" => {
                    if let Some(raw) = args.next() {
                        match raw.parse::<u32>() {
                            Ok(value) => opts.frames = Some(value),
                            Err(err) => {
                                tracing::error!(%err, value = %raw, "--frames must be an integer");
                            }
                        }
                    } else {
                        tracing::error!("--frames requires an integer");
                    }
                }
                "--volume" => {
                    if let Some(raw) = args.next() {
                        match raw.parse::<f32>() {
                            Ok(value) => opts.volume = Some(value),
                            Err(err) => {
                                tracing::error!(%err, value = %raw, "--volume must be a number");
                            }
                        }
                    } else {
                        tracing::error!("--volume requires a number");
                    }
                }
                "--sound" => {
                    if let Some(relative) = args.next() {
                        opts.sound = Some(relative);
                    } else {
                        tracing::error!("--sound requires a path under the sound directory");
                    }
                }
                "--game-dir" => {
                    if let Some(path) = args.next() {
                        opts.game_dir = PathBuf::from(path);
                    } else {
                        tracing::error!("--game-dir requires a directory path");
                    }
                }
                "--fail" => {
                    if let Some(raw) = args.next() {
                        match parse_backend_op(&raw) {
                            Some(op) => opts.fail.push(op),
                            None => tracing::error!(value = %raw, "Unknown --fail operation"),
                        }
                    } else {
                        tracing::error!("--fail requires an operation name");
                    }
                }
                other => tracing::warn!(arg = other, "Ignoring unknown argument"),
            }
        }

        opts
    }

    /// Command-line values win over the config file.
    fn apply(&self, config: &mut AppConfig) {
        if let Some(device) = &self.device {
            config.audio.device = Some(device.clone());
        }
        if let Some(volume) = self.volume {
            config.audio.set_volume(volume);
        }
        if let Some(frames) = self.frames {
            config.demo.frames = frames;
        }
        if let Some(sound) = &self.sound {
            config.demo.sound = Some(sound.clone());
        }
        if self.realtime {
            config.demo.realtime = true;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(args: &[&str]) -> CliOptions {
        CliOptions::parse(args.iter().map(|arg| arg.to_string()))
    }

    #[test]
    fn defaults_without_flags() {
        let cli = parse(&[]);
        assert_eq!(cli.backend, BackendKind::Mock);
        assert!(!cli.no_player);
        assert!(cli.fail.is_empty());
        assert_eq!(cli.game_dir, PathBuf::from("."));
    }

    #[test]
    fn flags_override_config() {
        let cli = parse(&[
            "--frames",
            "12",
            "--device",
            "Generic Hardware",
            "--volume",
            "2.0",
            "--sound",
            "ambient/wind.ogg",
            "--realtime",
        ]);
        let mut config = AppConfig::default();
        cli.apply(&mut config);

        assert_eq!(config.demo.frames, 12);
        assert_eq!(config.audio.device.as_deref(), Some("Generic Hardware"));
        assert_eq!(config.audio.volume, 1.0);
        assert_eq!(config.demo.sound.as_deref(), Some("ambient/wind.ogg"));
        assert!(config.demo.realtime);
    }

    #[test]
    fn bad_values_are_ignored() {
        let cli = parse(&["--frames", "many", "--fail", "everything", "--backend", "openal"]);
        assert_eq!(cli.frames, None);
        assert!(cli.fail.is_empty());
        assert_eq!(cli.backend, BackendKind::Mock);
    }

    #[test]
    fn fail_flags_accumulate() {
        let cli = parse(&["--fail", "open-device", "--fail", "listener-gain"]);
        assert_eq!(cli.fail, vec![BackendOp::OpenDevice, BackendOp::ListenerGain]);
    }
}
