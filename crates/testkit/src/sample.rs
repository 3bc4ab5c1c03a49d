//! Samples whose readiness and completion are controlled by the test.

use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::{Arc, Mutex};

use sonance_audio::Sample;

/// Shared view into a [`ScriptedSample`], kept by the test after the sample
/// has been handed to the registry.
#[derive(Debug, Default)]
pub struct SampleProbe {
    ready: AtomicBool,
    finished: AtomicBool,
    advances: AtomicU32,
    drops: AtomicU32,
    finish_after: Mutex<Option<u32>>,
    elapsed: Mutex<f32>,
}

impl SampleProbe {
    /// Mark the sample ready or not.
    pub fn set_ready(&self, ready: bool) {
        self.ready.store(ready, Ordering::SeqCst);
    }

    /// Mark the sample finished.
    pub fn finish(&self) {
        self.finished.store(true, Ordering::SeqCst);
    }

    /// Whether the sample reports ready.
    pub fn is_ready(&self) -> bool {
        self.ready.load(Ordering::SeqCst)
    }

    /// Whether the sample reports finished.
    pub fn is_finished(&self) -> bool {
        self.finished.load(Ordering::SeqCst)
    }

    /// Times the sample has been advanced.
    pub fn advances(&self) -> u32 {
        self.advances.load(Ordering::SeqCst)
    }

    /// Times the sample has been dropped. Anything but 0 or 1 is a bug.
    pub fn drops(&self) -> u32 {
        self.drops.load(Ordering::SeqCst)
    }

    /// Whether the sample has been released.
    pub fn is_dropped(&self) -> bool {
        self.drops() > 0
    }

    /// Seconds of advance received so far.
    pub fn elapsed(&self) -> f32 {
        *self.elapsed.lock().unwrap()
    }
}

/// A sample driven entirely by its [`SampleProbe`].
#[derive(Debug)]
pub struct ScriptedSample {
    probe: Arc<SampleProbe>,
}

impl ScriptedSample {
    /// A ready, unfinished sample and its probe.
    pub fn new() -> (Self, Arc<SampleProbe>) {
        let probe = Arc::new(SampleProbe::default());
        probe.set_ready(true);
        (
            Self {
                probe: Arc::clone(&probe),
            },
            probe,
        )
    }

    /// A sample that finishes on its `advances`-th advance.
    pub fn finishing_after(advances: u32) -> (Self, Arc<SampleProbe>) {
        let (sample, probe) = Self::new();
        *probe.finish_after.lock().unwrap() = Some(advances);
        if advances == 0 {
            probe.finish();
        }
        (sample, probe)
    }

    /// A sample that isn't ready yet.
    pub fn pending() -> (Self, Arc<SampleProbe>) {
        let (sample, probe) = Self::new();
        probe.set_ready(false);
        (sample, probe)
    }
}

impl Sample for ScriptedSample {
    fn is_ready(&self) -> bool {
        self.probe.is_ready()
    }

    fn update(&mut self, dt: f32) {
        let advances = self.probe.advances.fetch_add(1, Ordering::SeqCst) + 1;
        *self.probe.elapsed.lock().unwrap() += dt;
        if let Some(limit) = *self.probe.finish_after.lock().unwrap() {
            if advances >= limit {
                self.probe.finish();
            }
        }
    }

    fn is_finished(&self) -> bool {
        self.probe.is_finished()
    }
}

impl Drop for ScriptedSample {
    fn drop(&mut self) {
        self.probe.drops.fetch_add(1, Ordering::SeqCst);
    }
}
