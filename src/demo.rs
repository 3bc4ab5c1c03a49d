//! Headless game loop: a player circles the origin while short sounds start
//! and finish around them.

use std::sync::{Arc, Mutex, PoisonError};
use std::thread;
use std::time::{Duration, Instant};

use anyhow::Result;
use glam::Vec3;
use sonance_audio::{AudioBackend, AudioSystem, GameSystem, PlayerView, Sample};
use sonance_camera::Camera;
use tracing::{debug, info, warn};

use crate::config::DemoSettings;

/// The local player as the audio system sees it. Empty until spawned.
pub type PlayerSlot = Arc<Mutex<Option<PlayerView>>>;

/// Circle around the origin at ear height, always facing the centre.
#[derive(Debug, Clone, Copy)]
pub struct Orbit {
    radius: f32,
    speed: f32,
    height: f32,
}

impl Orbit {
    pub fn from_settings(demo: &DemoSettings) -> Self {
        Self {
            radius: demo.orbit_radius,
            speed: demo.orbit_speed_deg.to_radians(),
            height: demo.ear_height,
        }
    }

    /// Camera `time` seconds into the orbit.
    pub fn camera_at(&self, time: f32) -> Camera {
        let angle = self.speed * time;
        let mut camera = Camera::new(Vec3::new(
            self.radius * angle.cos(),
            self.height,
            self.radius * angle.sin(),
        ));
        camera.look_at(Vec3::new(0.0, self.height, 0.0));
        camera
    }
}

/// A sound of fixed length that needs no decoding.
#[derive(Debug)]
pub struct TimedSample {
    length: f32,
    played: f32,
}

impl TimedSample {
    pub fn new(length: f32) -> Self {
        Self {
            length: length.max(0.0),
            played: 0.0,
        }
    }
}

impl Sample for TimedSample {
    fn is_ready(&self) -> bool {
        true
    }

    fn update(&mut self, dt: f32) {
        if dt > 0.0 {
            self.played += dt;
        }
    }

    fn is_finished(&self) -> bool {
        self.played >= self.length
    }
}

/// What a run did, printed when the harness exits.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RunSummary {
    pub frames: u32,
    pub audio_up: bool,
    pub samples_started: u32,
    pub samples_left: usize,
    pub listener_failures: usize,
    pub worker_sweeps: u64,
}

impl std::fmt::Display for RunSummary {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "frames={} audio={} samples_started={} samples_left={} listener_failures={} worker_sweeps={}",
            self.frames,
            if self.audio_up { "ok" } else { "unavailable" },
            self.samples_started,
            self.samples_left,
            self.listener_failures,
            self.worker_sweeps,
        )
    }
}

/// Fixed-step loop driving one audio system.
pub struct Harness {
    demo: DemoSettings,
    orbit: Orbit,
    player: Option<PlayerSlot>,
}

impl Harness {
    /// `player` is `None` to run without ever spawning a player.
    pub fn new(demo: DemoSettings, player: Option<PlayerSlot>) -> Self {
        Self {
            orbit: Orbit::from_settings(&demo),
            demo,
            player,
        }
    }

    /// Init, run the configured frames, shut down.
    ///
    /// `spawn` is asked for a new sample every `sample_every_frames` frames,
    /// given the emitter position. Returning `Ok(None)` skips that slot.
    pub fn run<B, F>(&self, audio: &mut AudioSystem<B>, mut spawn: F) -> Result<RunSummary>
    where
        B: AudioBackend,
        F: FnMut(&AudioSystem<B>, Vec3) -> Result<Option<Box<dyn Sample>>>,
    {
        let mut summary = RunSummary {
            audio_up: GameSystem::init(audio),
            ..RunSummary::default()
        };
        if !summary.audio_up {
            warn!(system = audio.name(), "Running without audio");
        }

        let frame_time = self.demo.frame_time();
        let frame_budget = Duration::from_secs_f32(frame_time);
        let sender = audio.sample_sender();

        for frame in 0..self.demo.frames {
            let started = Instant::now();
            let time = frame as f32 * frame_time;
            self.place_player(time);

            let every = self.demo.sample_every_frames;
            if every > 0 && frame % every == 0 {
                let emitter = self.emitter_for(frame / every);
                if let Some(sample) = spawn(audio, emitter)? {
                    sender.add(sample);
                    summary.samples_started += 1;
                    debug!(frame, ?emitter, "Started sample");
                }
            }

            if let Some(report) = audio.update(frame_time) {
                summary.listener_failures += report.failures.len();
            }
            summary.frames += 1;

            if self.demo.realtime {
                if let Some(rest) = frame_budget.checked_sub(started.elapsed()) {
                    thread::sleep(rest);
                }
            }
        }

        summary.worker_sweeps = audio.worker_sweeps().unwrap_or(0);
        summary.samples_left = audio.sample_count();
        GameSystem::shutdown(audio);
        info!(%summary, "Run finished");
        Ok(summary)
    }

    fn place_player(&self, time: f32) {
        let Some(slot) = &self.player else {
            return;
        };
        let camera = self.orbit.camera_at(time);
        *slot.lock().unwrap_or_else(PoisonError::into_inner) = Some(PlayerView {
            ear_position: camera.position,
            eye_angles: camera.angles,
        });
    }

    /// Emitters step around a ring at ground level.
    fn emitter_for(&self, index: u32) -> Vec3 {
        let angle = index as f32 * std::f32::consts::FRAC_PI_3;
        Vec3::new(angle.cos(), 0.0, angle.sin()) * (self.orbit.radius * 0.5)
    }
}

/// Spawner that starts a [`TimedSample`] of the configured length.
pub fn timed_samples<B: AudioBackend>(
    length: f32,
) -> impl FnMut(&AudioSystem<B>, Vec3) -> Result<Option<Box<dyn Sample>>> {
    move |_, _| Ok(Some(Box::new(TimedSample::new(length)) as Box<dyn Sample>))
}
