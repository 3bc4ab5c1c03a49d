//! The background worker driving samples while the main thread runs frames.

use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use sonance_audio::{AudioSettings, AudioSystem, MockBackend, NoPlayer, Sample, WorkerState};
use sonance_testkit::{init_tracing, wait_until, ScriptedSample, SharedConVars};

const PATIENCE: Duration = Duration::from_secs(5);

fn running_system() -> AudioSystem<MockBackend> {
    init_tracing();
    let mut audio = AudioSystem::new(
        MockBackend::new(),
        AudioSettings::default(),
        NoPlayer,
        SharedConVars::with_volume(1.0),
    );
    audio.init().unwrap();
    audio
}

#[test]
fn worker_advances_and_retires_samples() {
    let mut audio = running_system();
    let (sample, probe) = ScriptedSample::finishing_after(3);
    audio.add(sample);

    assert!(wait_until(PATIENCE, || probe.is_dropped()));
    assert_eq!(probe.advances(), 3);
    assert_eq!(probe.drops(), 1);
    assert!(wait_until(PATIENCE, || audio.sample_count() == 0));
    audio.shutdown();
}

#[test]
fn worker_reports_sweeps() {
    let mut audio = running_system();
    let first = audio.worker_sweeps().unwrap();
    assert!(wait_until(PATIENCE, || audio
        .worker_sweeps()
        .is_some_and(|n| n > first)));

    audio.shutdown();
    assert_eq!(audio.worker_sweeps(), None);
}

#[test]
fn unready_sample_waits_for_readiness() {
    let mut audio = running_system();
    let (sample, probe) = ScriptedSample::pending();
    audio.add(sample);

    let before = audio.worker_sweeps().unwrap();
    assert!(wait_until(PATIENCE, || audio
        .worker_sweeps()
        .is_some_and(|n| n > before + 2)));
    assert_eq!(probe.advances(), 0);

    probe.set_ready(true);
    assert!(wait_until(PATIENCE, || probe.advances() > 0));
    audio.shutdown();
}

#[test]
fn no_advance_after_shutdown_returns() {
    let mut audio = running_system();
    let (sample, probe) = ScriptedSample::new();
    audio.add(sample);
    assert!(wait_until(PATIENCE, || probe.advances() > 0));

    audio.shutdown();
    assert_eq!(audio.worker_state(), WorkerState::Stopped);
    assert_eq!(probe.drops(), 1);

    let advances = probe.advances();
    thread::sleep(Duration::from_millis(30));
    assert_eq!(probe.advances(), advances);
}

#[test]
fn samples_added_from_other_threads_all_play_out() {
    let mut audio = running_system();
    let sender = audio.sample_sender();

    let producers: Vec<_> = (0..4)
        .map(|_| {
            let sender = sender.clone();
            thread::spawn(move || {
                (0..25)
                    .map(|i| {
                        let (sample, probe) = ScriptedSample::finishing_after(1 + i % 3);
                        assert!(sender.add(sample));
                        probe
                    })
                    .collect::<Vec<_>>()
            })
        })
        .collect();
    let probes: Vec<_> = producers
        .into_iter()
        .flat_map(|producer| producer.join().unwrap())
        .collect();

    assert!(wait_until(PATIENCE, || probes
        .iter()
        .all(|probe| probe.is_dropped())));
    for probe in &probes {
        assert_eq!(probe.drops(), 1);
        assert!(probe.advances() >= 1);
    }
    audio.shutdown();
}

#[test]
fn main_thread_frames_run_alongside_worker() {
    let mut audio = running_system();
    let probes: Vec<_> = (0..8)
        .map(|_| {
            let (sample, probe) = ScriptedSample::new();
            audio.add(sample);
            probe
        })
        .collect();

    for _ in 0..100 {
        assert!(audio.update(1.0 / 60.0).unwrap().is_clean());
    }
    assert!(wait_until(PATIENCE, || probes
        .iter()
        .all(|probe| probe.advances() > 0)));

    audio.shutdown();
    assert!(probes.iter().all(|probe| probe.drops() == 1));
}

#[test]
fn worker_restarts_after_reinit() {
    let mut audio = running_system();
    audio.shutdown();
    assert!(!audio.is_worker_alive());

    audio.init().unwrap();
    assert!(audio.is_worker_alive());
    let (sample, probe) = ScriptedSample::finishing_after(1);
    audio.add(sample);
    assert!(wait_until(PATIENCE, || probe.is_dropped()));
    audio.shutdown();
}

/// Ready sample whose decoder fails on the first advance.
struct FailingSample {
    drops: Arc<AtomicU32>,
}

impl Sample for FailingSample {
    fn is_ready(&self) -> bool {
        true
    }

    fn update(&mut self, _dt: f32) {
        panic!("decoder failed mid-stream");
    }

    fn is_finished(&self) -> bool {
        false
    }
}

impl Drop for FailingSample {
    fn drop(&mut self) {
        self.drops.fetch_add(1, Ordering::SeqCst);
    }
}

#[test]
fn shutdown_releases_samples_after_a_sample_kills_the_worker() {
    let mut audio = running_system();
    let (sample, probe) = ScriptedSample::pending();
    audio.add(sample);
    let failing_drops = Arc::new(AtomicU32::new(0));
    audio.add(FailingSample {
        drops: Arc::clone(&failing_drops),
    });

    assert!(wait_until(PATIENCE, || !audio.is_worker_alive()));
    assert_eq!(audio.worker_state(), WorkerState::Stopped);

    audio.shutdown();
    assert_eq!(probe.drops(), 1);
    assert_eq!(failing_drops.load(Ordering::SeqCst), 1);
    assert_eq!(audio.sample_count(), 0);
    assert!(!audio.handle().has_device());
}
