//! Background thread that keeps samples advancing.
//!
//! The worker runs one sweep per loop iteration and checks its control channel
//! between sweeps. Stopping is cooperative: [`UpdateWorker::stop`] sends an
//! exit call and blocks until the thread acknowledges it, so no sweep is in
//! flight once it returns.

use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::mpsc::{self, Receiver, RecvTimeoutError, Sender, SyncSender, TryRecvError};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Instant;

use tracing::{debug, error, info, warn};

use crate::error::AudioError;
use crate::settings::WorkerSettings;

/// Default thread name.
pub const WORKER_THREAD_NAME: &str = "audio-update";

/// Lifecycle of the update thread.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum WorkerState {
    /// Not spawned yet.
    NotStarted = 0,
    /// Sweeping.
    Running = 1,
    /// Exit has been requested but not yet acknowledged.
    ExitRequested = 2,
    /// Thread has left its loop.
    Stopped = 3,
}

impl From<u8> for WorkerState {
    fn from(value: u8) -> Self {
        match value {
            1 => WorkerState::Running,
            2 => WorkerState::ExitRequested,
            3 => WorkerState::Stopped,
            _ => WorkerState::NotStarted,
        }
    }
}

/// Calls the owner can make into the running thread.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WorkerCall {
    /// Leave the loop. Replies `1`.
    Exit,
    /// Replies with the number of sweeps done so far.
    SweepCount,
}

struct Call {
    call: WorkerCall,
    reply: SyncSender<u64>,
}

enum Flow {
    Continue,
    Exit,
}

/// Owner-side handle of the update thread.
pub struct UpdateWorker {
    name: String,
    settings: WorkerSettings,
    state: Arc<AtomicU8>,
    control: Option<Sender<Call>>,
    join: Option<JoinHandle<()>>,
}

impl UpdateWorker {
    /// A worker that hasn't been started.
    pub fn new(name: impl Into<String>, settings: WorkerSettings) -> Self {
        Self {
            name: name.into(),
            settings,
            state: Arc::new(AtomicU8::new(WorkerState::NotStarted as u8)),
            control: None,
            join: None,
        }
    }

    /// Current lifecycle state.
    pub fn state(&self) -> WorkerState {
        WorkerState::from(self.state.load(Ordering::Acquire))
    }

    /// Whether the thread is still in its loop.
    pub fn is_alive(&self) -> bool {
        let looping = matches!(
            self.state(),
            WorkerState::Running | WorkerState::ExitRequested
        );
        looping && self.join.as_ref().is_some_and(|join| !join.is_finished())
    }

    /// Spawn the thread. `sweep` is called with the seconds elapsed since the
    /// previous sweep and returns how many samples are left.
    ///
    /// Does nothing if the thread is already alive. A worker that has stopped
    /// can be started again.
    pub fn start<F>(&mut self, sweep: F) -> Result<(), AudioError>
    where
        F: FnMut(f32) -> usize + Send + 'static,
    {
        if self.is_alive() {
            return Ok(());
        }
        self.reap();

        let (tx, rx) = mpsc::channel::<Call>();
        let state = Arc::clone(&self.state);
        let settings = self.settings;

        state.store(WorkerState::Running as u8, Ordering::Release);
        let spawned = thread::Builder::new()
            .name(self.name.clone())
            .spawn(move || run(rx, state, settings, sweep));

        match spawned {
            Ok(join) => {
                info!(thread = %self.name, "Sample update thread started");
                self.control = Some(tx);
                self.join = Some(join);
                Ok(())
            }
            Err(err) => {
                self.state
                    .store(WorkerState::NotStarted as u8, Ordering::Release);
                Err(AudioError::WorkerSpawn(err))
            }
        }
    }

    /// Send `call` and block until the thread replies.
    ///
    /// Returns `None` if the thread is gone.
    pub fn call(&self, call: WorkerCall) -> Option<u64> {
        let control = self.control.as_ref()?;
        let (reply, response) = mpsc::sync_channel(1);
        control.send(Call { call, reply }).ok()?;
        response.recv().ok()
    }

    /// Ask the thread to exit, wait for the acknowledgement, then join it.
    ///
    /// Safe to call at any time; a worker that isn't running is left alone.
    pub fn stop(&mut self) {
        if self.join.is_none() {
            return;
        }

        if self.is_alive() {
            self.state
                .store(WorkerState::ExitRequested as u8, Ordering::Release);
            match self.call(WorkerCall::Exit) {
                Some(_) => debug!(thread = %self.name, "Sample update thread acknowledged exit"),
                None => warn!(thread = %self.name, "Sample update thread exited without acknowledging"),
            }
        }

        self.reap();
        info!(thread = %self.name, "Sample update thread stopped");
    }

    fn reap(&mut self) {
        self.control = None;
        if let Some(join) = self.join.take() {
            if join.join().is_err() {
                error!(thread = %self.name, "Sample update thread panicked");
            }
            self.state.store(WorkerState::Stopped as u8, Ordering::Release);
        }
    }
}

impl Drop for UpdateWorker {
    fn drop(&mut self) {
        self.stop();
    }
}

/// Marks the shared state stopped when the loop exits, including by panic.
struct StoppedOnExit(Arc<AtomicU8>);

impl Drop for StoppedOnExit {
    fn drop(&mut self) {
        self.0.store(WorkerState::Stopped as u8, Ordering::Release);
    }
}

fn run<F>(rx: Receiver<Call>, state: Arc<AtomicU8>, settings: WorkerSettings, mut sweep: F)
where
    F: FnMut(f32) -> usize,
{
    let _stopped = StoppedOnExit(state);
    let update_interval = settings.update_interval();
    let idle_wait = settings.idle_wait();

    let mut sweeps: u64 = 0;
    let mut last = Instant::now();

    loop {
        match rx.try_recv() {
            Ok(call) => {
                if let Flow::Exit = answer(call, sweeps) {
                    break;
                }
            }
            Err(TryRecvError::Empty) => {}
            Err(TryRecvError::Disconnected) => break,
        }

        let now = Instant::now();
        let dt = now.duration_since(last).as_secs_f32();
        last = now;

        let remaining = sweep(dt);
        sweeps += 1;

        let wait = if remaining == 0 {
            idle_wait
        } else {
            update_interval
        };
        if wait.is_zero() {
            continue;
        }

        match rx.recv_timeout(wait) {
            Ok(call) => {
                if let Flow::Exit = answer(call, sweeps) {
                    break;
                }
            }
            Err(RecvTimeoutError::Timeout) => {}
            Err(RecvTimeoutError::Disconnected) => break,
        }
    }

    debug!(sweeps, "Sample update loop finished");
}

fn answer(call: Call, sweeps: u64) -> Flow {
    match call.call {
        WorkerCall::Exit => {
            let _ = call.reply.send(1);
            Flow::Exit
        }
        WorkerCall::SweepCount => {
            let _ = call.reply.send(sweeps);
            Flow::Continue
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;
    use std::time::Duration;

    fn fast() -> WorkerSettings {
        WorkerSettings {
            update_interval_ms: 0,
            idle_wait_ms: 1,
        }
    }

    #[test]
    fn starts_not_started() {
        let worker = UpdateWorker::new("test", fast());
        assert_eq!(worker.state(), WorkerState::NotStarted);
        assert!(!worker.is_alive());
        assert_eq!(worker.call(WorkerCall::SweepCount), None);
    }

    #[test]
    fn sweeps_until_stopped() {
        let count = Arc::new(AtomicUsize::new(0));
        let mut worker = UpdateWorker::new("test", fast());
        let seen = Arc::clone(&count);
        worker
            .start(move |_dt| {
                seen.fetch_add(1, Ordering::SeqCst);
                0
            })
            .unwrap();
        assert!(worker.is_alive());
        assert_eq!(worker.state(), WorkerState::Running);

        let deadline = Instant::now() + Duration::from_secs(5);
        while worker.call(WorkerCall::SweepCount).unwrap_or(0) < 3 {
            assert!(Instant::now() < deadline, "worker never swept");
            thread::sleep(Duration::from_millis(1));
        }

        worker.stop();
        assert_eq!(worker.state(), WorkerState::Stopped);
        assert!(!worker.is_alive());

        let after = count.load(Ordering::SeqCst);
        thread::sleep(Duration::from_millis(10));
        assert_eq!(count.load(Ordering::SeqCst), after);
    }

    #[test]
    fn stop_is_idempotent() {
        let mut worker = UpdateWorker::new("test", fast());
        worker.stop();
        worker.start(|_| 0).unwrap();
        worker.stop();
        worker.stop();
        assert_eq!(worker.state(), WorkerState::Stopped);
    }

    #[test]
    fn start_twice_keeps_one_thread() {
        let starts = Arc::new(AtomicUsize::new(0));
        let mut worker = UpdateWorker::new("test", fast());
        for _ in 0..2 {
            let starts = Arc::clone(&starts);
            let mut first = true;
            worker
                .start(move |_| {
                    if first {
                        starts.fetch_add(1, Ordering::SeqCst);
                        first = false;
                    }
                    0
                })
                .unwrap();
        }
        worker.call(WorkerCall::SweepCount);
        worker.stop();
        assert_eq!(starts.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn can_restart_after_stop() {
        let mut worker = UpdateWorker::new("test", fast());
        worker.start(|_| 0).unwrap();
        worker.stop();
        worker.start(|_| 0).unwrap();
        assert!(worker.is_alive());
        worker.stop();
    }

    #[test]
    fn panicking_sweep_does_not_hang_stop() {
        let mut worker = UpdateWorker::new("test", fast());
        worker.start(|_| panic!("sample blew up")).unwrap();

        let deadline = Instant::now() + Duration::from_secs(5);
        while worker.is_alive() {
            assert!(Instant::now() < deadline, "worker never died");
            thread::sleep(Duration::from_millis(1));
        }
        worker.stop();
        assert_eq!(worker.state(), WorkerState::Stopped);
    }

    #[test]
    fn elapsed_time_is_a_delta() {
        let mut worker = UpdateWorker::new(
            "test",
            WorkerSettings {
                update_interval_ms: 0,
                idle_wait_ms: 5,
            },
        );
        let max_dt = Arc::new(std::sync::Mutex::new(0.0_f32));
        let seen = Arc::clone(&max_dt);
        let started = Instant::now();
        worker
            .start(move |dt| {
                let mut max = seen.lock().unwrap();
                *max = max.max(dt);
                0
            })
            .unwrap();

        let deadline = Instant::now() + Duration::from_secs(5);
        while worker.call(WorkerCall::SweepCount).unwrap_or(0) < 10 {
            assert!(Instant::now() < deadline, "worker never swept");
            thread::sleep(Duration::from_millis(1));
        }
        worker.stop();
        let total = started.elapsed().as_secs_f32();
        // Ten sweeps split the run, so no single delta covers all of it.
        let max_dt = *max_dt.lock().unwrap();
        assert!(max_dt > 0.0);
        assert!(max_dt < total, "max dt {max_dt} vs run {total}");
    }
}
