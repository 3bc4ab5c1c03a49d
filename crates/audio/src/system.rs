//! The audio game system: backend lifecycle, listener sync and sample worker.

use std::sync::Arc;

use tracing::{debug, info, warn};

use crate::backend::{AudioBackend, BackendError, BackendHandle};
use crate::error::AudioError;
use crate::listener::{sync_listener, ConVars, ListenerReport, ListenerState, PlayerSource};
use crate::registry::{Sample, SampleRegistry, SampleSender};
use crate::settings::AudioSettings;
use crate::worker::{UpdateWorker, WorkerCall, WorkerState, WORKER_THREAD_NAME};

/// Frame time passed for the priming listener sync at init: no time has elapsed.
pub const NO_ELAPSED_TIME: f32 = -1.0;

/// Something the host loop initializes, ticks every frame, and shuts down.
pub trait GameSystem {
    /// Label for logs.
    fn name(&self) -> &str;

    /// Bring the system up. `false` means the host should run without it.
    fn init(&mut self) -> bool;

    /// Release everything. Must be safe to call more than once.
    fn shutdown(&mut self);

    /// Per-frame tick on the main thread.
    fn update(&mut self, frametime: f32);
}

/// Drives a positional audio backend from the game loop.
///
/// The main thread calls [`AudioSystem::update`] once per frame to move the
/// listener. A background worker sweeps the sample registry continuously.
/// Samples can be added from any thread.
pub struct AudioSystem<B: AudioBackend> {
    backend: B,
    handle: BackendHandle<B>,
    registry: Arc<SampleRegistry>,
    worker: UpdateWorker,
    player: Box<dyn PlayerSource>,
    cvars: Box<dyn ConVars>,
    settings: AudioSettings,
    initialized: bool,
    listener: Option<ListenerState>,
}

impl<B: AudioBackend> AudioSystem<B> {
    /// Create an un-initialized system.
    ///
    /// `player` supplies the listener pose and `cvars` the `volume` setting.
    pub fn new(
        backend: B,
        settings: AudioSettings,
        player: impl PlayerSource + 'static,
        cvars: impl ConVars + 'static,
    ) -> Self {
        let worker = UpdateWorker::new(WORKER_THREAD_NAME, settings.worker);
        Self {
            backend,
            handle: BackendHandle::default(),
            registry: Arc::new(SampleRegistry::new()),
            worker,
            player: Box::new(player),
            cvars: Box::new(cvars),
            settings,
            initialized: false,
            listener: None,
        }
    }

    /// Open the device, set up the context and start the sample worker.
    ///
    /// On failure everything acquired so far is released and the system stays
    /// un-initialized. Calling this on an initialized system does nothing.
    pub fn init(&mut self) -> Result<(), AudioError> {
        if self.initialized {
            return Ok(());
        }
        let backend_name = self.backend.name();

        let device = self
            .backend
            .open_device(self.settings.device.as_deref())
            .map_err(|err| {
                warn!(backend = backend_name, %err, "Audio device couldn't be opened. Initialization failed.");
                AudioError::DeviceOpen(err)
            })?;
        self.handle.device = Some(device);

        let context = match self.create_context() {
            Ok(context) => context,
            Err(err) => {
                warn!(backend = backend_name, %err, "Couldn't create an audio context. Initialization failed.");
                self.handle.release(&mut self.backend);
                return Err(AudioError::ContextCreate(err));
            }
        };

        if let Err(err) = self.backend.make_context_current(Some(&context)) {
            warn!(backend = backend_name, %err, "Couldn't make the audio context current.");
            if let Err(err) = self.backend.destroy_context(context) {
                warn!(backend = backend_name, %err, "Couldn't destroy the audio context");
            }
            self.handle.release(&mut self.backend);
            return Err(AudioError::ContextActivate(err));
        }
        self.handle.context = Some(context);

        // Silence until the first sync reads the real volume.
        if let Err(err) = self.backend.set_listener_gain(0.0) {
            warn!(backend = backend_name, %err, "Couldn't zero the listener gain; continuing");
        }

        if let Err(err) = self.backend.set_speed_of_sound(self.settings.speed_of_sound) {
            warn!(
                backend = backend_name,
                %err,
                speed = self.settings.speed_of_sound,
                "Speed of sound was rejected; audio drivers need updating"
            );
            self.handle.release(&mut self.backend);
            return Err(AudioError::PropagationConfig(err));
        }

        self.initialized = true;
        self.update(NO_ELAPSED_TIME);

        if !self.worker.is_alive() {
            let registry = Arc::clone(&self.registry);
            if let Err(err) = self.worker.start(move |dt| registry.sweep(dt)) {
                warn!(%err, "Sample update thread couldn't start");
                self.initialized = false;
                self.listener = None;
                self.handle.release(&mut self.backend);
                return Err(err);
            }
        }

        info!(
            backend = backend_name,
            device = self.settings.device.as_deref().unwrap_or("default"),
            "Audio system initialized"
        );
        Ok(())
    }

    fn create_context(&mut self) -> Result<B::Context, BackendError> {
        match self.handle.device.as_ref() {
            Some(device) => self.backend.create_context(device),
            None => Err(BackendError::InvalidHandle("no open device".into())),
        }
    }

    /// Stop the worker, release every sample, then tear down the backend.
    ///
    /// Safe to call when never initialized, after a failed init, or twice.
    pub fn shutdown(&mut self) {
        self.worker.stop();

        let released = self.registry.clear();
        self.handle.release(&mut self.backend);

        if self.initialized {
            info!(released, "Audio system shut down");
        } else if released > 0 {
            debug!(released, "Released samples registered before init");
        }
        self.initialized = false;
        self.listener = None;
    }

    /// Main-thread tick: push the listener pose and gain.
    ///
    /// Never touches the sample registry. A negative `frametime` means no time
    /// has elapsed. Returns `None` while the system isn't initialized.
    pub fn update(&mut self, frametime: f32) -> Option<ListenerReport> {
        if !self.initialized {
            return None;
        }
        let elapsed = (frametime >= 0.0).then_some(frametime);
        let report = sync_listener(
            &mut self.backend,
            self.player.as_ref(),
            self.cvars.as_ref(),
            elapsed,
        );
        self.listener = Some(report.state);
        Some(report)
    }

    /// Sweep the registry once: advance ready samples and drop finished ones.
    ///
    /// The worker does this continuously; calling it directly is for hosts
    /// that drive samples themselves. Returns the number of samples left.
    pub fn update_samples(&self, update_time: f32) -> usize {
        self.registry.sweep(update_time)
    }

    /// Register a sample. Always returns `true`.
    pub fn add<S: Sample + 'static>(&self, sample: S) -> bool {
        self.registry.add(Box::new(sample))
    }

    /// Handle for adding samples from other threads.
    pub fn sample_sender(&self) -> SampleSender {
        SampleSender::new(Arc::clone(&self.registry))
    }

    /// Number of registered samples.
    pub fn sample_count(&self) -> usize {
        self.registry.len()
    }

    /// Whether init succeeded and shutdown hasn't run since.
    pub fn is_initialized(&self) -> bool {
        self.initialized
    }

    /// Lifecycle state of the sample worker.
    pub fn worker_state(&self) -> WorkerState {
        self.worker.state()
    }

    /// Whether the sample worker is running.
    pub fn is_worker_alive(&self) -> bool {
        self.worker.is_alive()
    }

    /// Sweeps the worker has done since it was started, if it is running.
    pub fn worker_sweeps(&self) -> Option<u64> {
        self.worker.call(WorkerCall::SweepCount)
    }

    /// Device and context currently held.
    pub fn handle(&self) -> &BackendHandle<B> {
        &self.handle
    }

    /// Listener state pushed by the last update.
    pub fn listener(&self) -> Option<&ListenerState> {
        self.listener.as_ref()
    }

    /// The backend.
    pub fn backend(&self) -> &B {
        &self.backend
    }

    /// Settings the system was created with.
    pub fn settings(&self) -> &AudioSettings {
        &self.settings
    }
}

impl<B: AudioBackend> GameSystem for AudioSystem<B> {
    fn name(&self) -> &str {
        "audio"
    }

    fn init(&mut self) -> bool {
        AudioSystem::init(self).is_ok()
    }

    fn shutdown(&mut self) {
        AudioSystem::shutdown(self)
    }

    fn update(&mut self, frametime: f32) {
        AudioSystem::update(self, frametime);
    }
}

impl<B: AudioBackend> Drop for AudioSystem<B> {
    fn drop(&mut self) {
        self.shutdown();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::mock::{BackendCall, BackendOp, MockBackend};
    use crate::listener::{NoPlayer, VOLUME_CVAR};
    use std::collections::HashMap;

    fn system(backend: &MockBackend) -> AudioSystem<MockBackend> {
        let cvars = HashMap::from([(VOLUME_CVAR.to_string(), 0.75)]);
        AudioSystem::new(backend.clone(), AudioSettings::default(), NoPlayer, cvars)
    }

    #[test]
    fn init_primes_listener_and_starts_worker() {
        let backend = MockBackend::new();
        let mut audio = system(&backend);

        audio.init().unwrap();
        assert!(audio.is_initialized());
        assert!(audio.is_worker_alive());
        assert_eq!(audio.worker_state(), WorkerState::Running);
        assert_eq!(backend.listener().gain, 0.75);
        assert_eq!(backend.listener().speed_of_sound, 343.3);

        let calls = backend.calls();
        let zero_gain = calls
            .iter()
            .position(|c| *c == BackendCall::ListenerGain(0.0))
            .unwrap();
        let speed = calls
            .iter()
            .position(|c| matches!(c, BackendCall::SpeedOfSound(_)))
            .unwrap();
        let primed = calls
            .iter()
            .position(|c| *c == BackendCall::ListenerGain(0.75))
            .unwrap();
        assert!(zero_gain < speed && speed < primed);

        audio.shutdown();
        assert_eq!(backend.open_devices(), 0);
        assert_eq!(backend.live_contexts(), 0);
    }

    #[test]
    fn gain_failure_at_init_is_not_fatal() {
        let backend = MockBackend::new();
        backend.fail(BackendOp::ListenerGain);
        let mut audio = system(&backend);

        assert!(audio.init().is_ok());
        let report = audio.update(0.016).unwrap();
        assert_eq!(report.failures.len(), 1);
    }

    #[test]
    fn speed_of_sound_failure_is_fatal_and_releases_backend() {
        let backend = MockBackend::new();
        backend.fail(BackendOp::SpeedOfSound);
        let mut audio = system(&backend);

        assert!(matches!(audio.init(), Err(AudioError::PropagationConfig(_))));
        assert!(!audio.is_initialized());
        assert_eq!(audio.worker_state(), WorkerState::NotStarted);
        assert_eq!(backend.open_devices(), 0);
        assert_eq!(backend.live_contexts(), 0);
        assert_eq!(backend.current_context(), None);
    }

    #[test]
    fn update_before_init_is_a_no_op() {
        let backend = MockBackend::new();
        let mut audio = system(&backend);
        assert!(audio.update(0.016).is_none());
        assert!(backend.calls().is_empty());
    }

    #[test]
    fn negative_frametime_still_syncs() {
        let backend = MockBackend::new();
        let mut audio = system(&backend);
        audio.init().unwrap();
        let report = audio.update(NO_ELAPSED_TIME).unwrap();
        assert!(report.is_clean());
        assert_eq!(audio.listener(), Some(&ListenerState::fallback(0.75)));
    }

    #[test]
    fn configured_device_name_is_requested() {
        let backend = MockBackend::new();
        let settings = AudioSettings {
            device: Some("Generic Hardware".into()),
            ..AudioSettings::default()
        };
        let mut audio = AudioSystem::new(backend.clone(), settings, NoPlayer, HashMap::new());
        audio.init().unwrap();
        assert_eq!(
            backend.calls()[0],
            BackendCall::OpenDevice(Some("Generic Hardware".into()))
        );
    }

    #[test]
    fn reinit_while_initialized_is_ignored() {
        let backend = MockBackend::new();
        let mut audio = system(&backend);
        audio.init().unwrap();
        audio.init().unwrap();
        assert_eq!(
            backend.count_calls(|c| matches!(c, BackendCall::OpenDevice(_))),
            1
        );
    }

    #[test]
    fn drop_shuts_down() {
        let backend = MockBackend::new();
        {
            let mut audio = system(&backend);
            audio.init().unwrap();
        }
        assert_eq!(backend.open_devices(), 0);
        assert_eq!(backend.live_contexts(), 0);
    }

    #[test]
    fn game_system_capability() {
        let backend = MockBackend::new();
        backend.fail(BackendOp::OpenDevice);
        let mut audio: Box<dyn GameSystem> = Box::new(system(&backend));
        assert_eq!(audio.name(), "audio");
        assert!(!audio.init());
        audio.update(0.016);
        audio.shutdown();

        backend.recover(BackendOp::OpenDevice);
        assert!(audio.init());
        audio.shutdown();
    }
}
