//! Thread-guarded collection of active samples.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex, MutexGuard};

use tracing::{trace, warn};

/// A playable sound unit driven by the update worker.
///
/// Decoding and streaming live behind this trait; the registry only relies on
/// these three calls. Dropping a sample releases it.
pub trait Sample: Send {
    /// Whether the sample has data and can be advanced.
    fn is_ready(&self) -> bool;

    /// Advance playback by `dt` seconds.
    fn update(&mut self, dt: f32);

    /// Whether playback is over and the sample can be released.
    fn is_finished(&self) -> bool;
}

impl<S: Sample + ?Sized> Sample for Box<S> {
    fn is_ready(&self) -> bool {
        (**self).is_ready()
    }

    fn update(&mut self, dt: f32) {
        (**self).update(dt)
    }

    fn is_finished(&self) -> bool {
        (**self).is_finished()
    }
}

/// Active samples, newest first.
///
/// Every access takes the same lock; a sweep holds it for the whole pass so
/// no other thread sees a half-swept collection.
#[derive(Default)]
pub struct SampleRegistry {
    samples: Mutex<VecDeque<Box<dyn Sample>>>,
}

impl SampleRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, VecDeque<Box<dyn Sample>>> {
        // A sample that panicked mid-sweep poisons the lock. The collection
        // itself is still consistent, and shutdown must be able to clear it.
        match self.samples.lock() {
            Ok(samples) => samples,
            Err(poisoned) => {
                warn!("Sample registry lock was poisoned; recovering");
                self.samples.clear_poison();
                poisoned.into_inner()
            }
        }
    }

    /// Register a sample at the front. Always succeeds.
    pub fn add(&self, sample: Box<dyn Sample>) -> bool {
        self.lock().push_front(sample);
        true
    }

    /// Advance every ready sample by `dt` and drop the finished ones.
    ///
    /// A ready sample is advanced before its finished flag is read, so a
    /// sample that completes during this advance is still removed in the same
    /// sweep. Returns the number of samples left.
    pub fn sweep(&self, dt: f32) -> usize {
        let mut samples = self.lock();
        let before = samples.len();

        samples.retain_mut(|sample| {
            if sample.is_ready() {
                sample.update(dt);
            }
            !sample.is_finished()
        });

        let remaining = samples.len();
        if remaining != before {
            trace!(removed = before - remaining, remaining, "Swept finished samples");
        }
        remaining
    }

    /// Drop every sample. Returns how many were released.
    pub fn clear(&self) -> usize {
        let mut samples = self.lock();
        let count = samples.len();
        samples.clear();
        count
    }

    /// Number of registered samples.
    pub fn len(&self) -> usize {
        self.lock().len()
    }

    /// Whether no samples are registered.
    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }
}

/// Cloneable handle for registering samples from any thread.
#[derive(Clone)]
pub struct SampleSender {
    registry: Arc<SampleRegistry>,
}

impl SampleSender {
    pub(crate) fn new(registry: Arc<SampleRegistry>) -> Self {
        Self { registry }
    }

    /// Register a sample. Always succeeds.
    pub fn add<S: Sample + 'static>(&self, sample: S) -> bool {
        self.registry.add(Box::new(sample))
    }
}
