//! In-memory backend for headless runs and tests.
//!
//! Every call is recorded, and any operation can be made to fail on demand.
//! `MockBackend` is a cheap handle over shared state, so a clone kept by a test
//! still observes the backend after it has been moved into an audio system.

use std::collections::HashSet;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use super::{AudioBackend, BackendError};
use crate::settings::DEFAULT_SPEED_OF_SOUND;

/// Operations that can be made to fail.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BackendOp {
    /// `open_device`
    OpenDevice,
    /// `create_context`
    CreateContext,
    /// `make_context_current` with a context
    MakeContextCurrent,
    /// `set_listener_position`
    ListenerPosition,
    /// `set_listener_orientation`
    ListenerOrientation,
    /// `set_listener_gain`
    ListenerGain,
    /// `set_speed_of_sound`
    SpeedOfSound,
}

/// A recorded backend call.
#[derive(Debug, Clone, PartialEq)]
pub enum BackendCall {
    /// Device open with the requested name.
    OpenDevice(Option<String>),
    /// Device close by id.
    CloseDevice(u32),
    /// Context creation on a device id.
    CreateContext(u32),
    /// Bind (`Some`) or unbind (`None`) a context id.
    MakeContextCurrent(Option<u32>),
    /// Context destruction by id.
    DestroyContext(u32),
    /// Listener position write.
    ListenerPosition([f32; 3]),
    /// Listener orientation write.
    ListenerOrientation([f32; 6]),
    /// Listener gain write.
    ListenerGain(f32),
    /// Speed of sound write.
    SpeedOfSound(f32),
}

/// Listener state as last applied by the mock.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MockListener {
    /// Last accepted position.
    pub position: [f32; 3],
    /// Last accepted orientation.
    pub orientation: [f32; 6],
    /// Last accepted gain.
    pub gain: f32,
    /// Last accepted speed of sound.
    pub speed_of_sound: f32,
}

impl Default for MockListener {
    fn default() -> Self {
        // Device defaults: at the origin looking down -Z with +Y up.
        Self {
            position: [0.0; 3],
            orientation: [0.0, 0.0, -1.0, 0.0, 1.0, 0.0],
            gain: 1.0,
            speed_of_sound: DEFAULT_SPEED_OF_SOUND,
        }
    }
}

/// Handle to an open mock device.
#[derive(Debug)]
pub struct MockDevice {
    id: u32,
}

impl MockDevice {
    /// Backend-assigned id.
    pub fn id(&self) -> u32 {
        self.id
    }
}

/// Handle to a live mock context.
#[derive(Debug)]
pub struct MockContext {
    id: u32,
}

impl MockContext {
    /// Backend-assigned id.
    pub fn id(&self) -> u32 {
        self.id
    }
}

#[derive(Default)]
struct MockState {
    calls: Vec<BackendCall>,
    failures: HashSet<BackendOp>,
    next_id: u32,
    devices: HashSet<u32>,
    contexts: HashSet<u32>,
    current: Option<u32>,
    listener: MockListener,
}

impl MockState {
    fn allocate_id(&mut self) -> u32 {
        self.next_id += 1;
        self.next_id
    }

    fn check(&self, op: BackendOp) -> Result<(), BackendError> {
        if self.failures.contains(&op) {
            Err(BackendError::Driver(format!("injected failure: {op:?}")))
        } else {
            Ok(())
        }
    }

    fn require_current(&self) -> Result<(), BackendError> {
        match self.current {
            Some(_) => Ok(()),
            None => Err(BackendError::NoCurrentContext),
        }
    }
}

/// Recording backend with fault injection.
#[derive(Clone, Default)]
pub struct MockBackend {
    state: Arc<Mutex<MockState>>,
}

impl MockBackend {
    /// A backend where every operation succeeds.
    pub fn new() -> Self {
        Self::default()
    }

    fn state(&self) -> MutexGuard<'_, MockState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Make `op` fail until [`MockBackend::recover`] is called.
    pub fn fail(&self, op: BackendOp) {
        self.state().failures.insert(op);
    }

    /// Stop failing `op`.
    pub fn recover(&self, op: BackendOp) {
        self.state().failures.remove(&op);
    }

    /// Every call made so far, in order.
    pub fn calls(&self) -> Vec<BackendCall> {
        self.state().calls.clone()
    }

    /// Forget recorded calls.
    pub fn clear_calls(&self) {
        self.state().calls.clear();
    }

    /// Number of recorded calls matching `pred`.
    pub fn count_calls(&self, pred: impl Fn(&BackendCall) -> bool) -> usize {
        self.state().calls.iter().filter(|call| pred(call)).count()
    }

    /// Listener state as last applied.
    pub fn listener(&self) -> MockListener {
        self.state().listener
    }

    /// Devices currently open.
    pub fn open_devices(&self) -> usize {
        self.state().devices.len()
    }

    /// Contexts currently alive.
    pub fn live_contexts(&self) -> usize {
        self.state().contexts.len()
    }

    /// Id of the current context.
    pub fn current_context(&self) -> Option<u32> {
        self.state().current
    }
}

impl AudioBackend for MockBackend {
    type Device = MockDevice;
    type Context = MockContext;

    fn name(&self) -> &'static str {
        "mock"
    }

    fn open_device(&mut self, name: Option<&str>) -> Result<MockDevice, BackendError> {
        let mut state = self.state();
        state.calls.push(BackendCall::OpenDevice(name.map(str::to_owned)));
        if state.failures.contains(&BackendOp::OpenDevice) {
            return Err(BackendError::DeviceNotFound(
                name.unwrap_or("default").to_owned(),
            ));
        }
        let id = state.allocate_id();
        state.devices.insert(id);
        Ok(MockDevice { id })
    }

    fn close_device(&mut self, device: MockDevice) -> Result<(), BackendError> {
        let mut state = self.state();
        state.calls.push(BackendCall::CloseDevice(device.id));
        if !state.devices.remove(&device.id) {
            return Err(BackendError::InvalidHandle(format!("device {}", device.id)));
        }
        Ok(())
    }

    fn create_context(&mut self, device: &MockDevice) -> Result<MockContext, BackendError> {
        let mut state = self.state();
        state.calls.push(BackendCall::CreateContext(device.id));
        state.check(BackendOp::CreateContext)?;
        if !state.devices.contains(&device.id) {
            return Err(BackendError::InvalidHandle(format!("device {}", device.id)));
        }
        let id = state.allocate_id();
        state.contexts.insert(id);
        Ok(MockContext { id })
    }

    fn make_context_current(&mut self, context: Option<&MockContext>) -> Result<(), BackendError> {
        let mut state = self.state();
        state
            .calls
            .push(BackendCall::MakeContextCurrent(context.map(MockContext::id)));
        match context {
            Some(context) => {
                state.check(BackendOp::MakeContextCurrent)?;
                if !state.contexts.contains(&context.id) {
                    return Err(BackendError::InvalidHandle(format!("context {}", context.id)));
                }
                state.current = Some(context.id);
            }
            None => state.current = None,
        }
        Ok(())
    }

    fn destroy_context(&mut self, context: MockContext) -> Result<(), BackendError> {
        let mut state = self.state();
        state.calls.push(BackendCall::DestroyContext(context.id));
        if state.current == Some(context.id) {
            return Err(BackendError::InvalidValue(format!(
                "context {} is still current",
                context.id
            )));
        }
        if !state.contexts.remove(&context.id) {
            return Err(BackendError::InvalidHandle(format!("context {}", context.id)));
        }
        Ok(())
    }

    fn set_listener_position(&mut self, position: [f32; 3]) -> Result<(), BackendError> {
        let mut state = self.state();
        state.calls.push(BackendCall::ListenerPosition(position));
        state.check(BackendOp::ListenerPosition)?;
        state.require_current()?;
        state.listener.position = position;
        Ok(())
    }

    fn set_listener_orientation(&mut self, orientation: [f32; 6]) -> Result<(), BackendError> {
        let mut state = self.state();
        state.calls.push(BackendCall::ListenerOrientation(orientation));
        state.check(BackendOp::ListenerOrientation)?;
        state.require_current()?;
        state.listener.orientation = orientation;
        Ok(())
    }

    fn set_listener_gain(&mut self, gain: f32) -> Result<(), BackendError> {
        let mut state = self.state();
        state.calls.push(BackendCall::ListenerGain(gain));
        state.check(BackendOp::ListenerGain)?;
        state.require_current()?;
        if gain < 0.0 || !gain.is_finite() {
            return Err(BackendError::InvalidValue(format!("gain {gain}")));
        }
        state.listener.gain = gain;
        Ok(())
    }

    fn set_speed_of_sound(&mut self, speed: f32) -> Result<(), BackendError> {
        let mut state = self.state();
        state.calls.push(BackendCall::SpeedOfSound(speed));
        state.check(BackendOp::SpeedOfSound)?;
        state.require_current()?;
        if speed <= 0.0 || !speed.is_finite() {
            return Err(BackendError::InvalidValue(format!("speed of sound {speed}")));
        }
        state.listener.speed_of_sound = speed;
        Ok(())
    }
}
