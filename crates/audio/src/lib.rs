//! Positional audio core for sonance.
//!
//! Keeps a 3D audio backend in step with the game: the listener follows the
//! local player every frame, and a background thread advances active samples
//! and drops them when they finish.
//!
//! # Architecture
//!
//! - [`AudioSystem`] - Owns the backend device/context, the sample registry and the worker
//! - [`SampleRegistry`] - Lock-guarded list of active [`Sample`]s, newest first
//! - [`UpdateWorker`] - Background thread that sweeps the registry until told to stop
//! - [`ListenerState`] - Listener pose and gain pushed to the backend each frame
//! - [`AudioBackend`] - The device API; [`MockBackend`] records calls for headless runs
//!
//! # Example
//!
//! ```ignore
//! let mut audio = AudioSystem::new(MockBackend::new(), AudioSettings::default(), NoPlayer, settings);
//! audio.init()?;
//! audio.add(sample);
//! audio.update(frame_time);
//! audio.shutdown();
//! ```

pub mod backend;
mod error;
mod listener;
mod paths;
mod registry;
mod settings;
mod system;
mod worker;

pub use backend::mock::{BackendCall, BackendOp, MockBackend, MockListener};
#[cfg(feature = "rodio_backend")]
pub use backend::rodio_output::{RodioBackend, RodioSample};
pub use backend::{AudioBackend, BackendError, BackendHandle};
pub use error::{AudioError, ListenerProperty};
pub use listener::{
    sync_listener, ConVars, ListenerReport, ListenerState, NoPlayer, PlayerSource, PlayerView,
    VOLUME_CVAR,
};
pub use paths::{sound_path, SOUND_DIR};
pub use registry::{Sample, SampleRegistry, SampleSender};
pub use settings::{AudioSettings, WorkerSettings, DEFAULT_SPEED_OF_SOUND};
pub use system::{AudioSystem, GameSystem, NO_ELAPSED_TIME};
pub use worker::{UpdateWorker, WorkerCall, WorkerState, WORKER_THREAD_NAME};
