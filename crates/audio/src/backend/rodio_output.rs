//! Real output through rodio.
//!
//! rodio has no global listener, so the context owns one and samples created
//! against it read the latest pose on every sweep to place their two ears.

use std::io::Cursor;
use std::sync::{Arc, Mutex, PoisonError};

use ::rodio::cpal::traits::{DeviceTrait, HostTrait};
use ::rodio::{Decoder, OutputStream, OutputStreamHandle, SpatialSink};
use glam::Vec3;
use tracing::debug;

use super::{AudioBackend, BackendError};
use crate::registry::Sample;

/// Distance between the ears in world units.
pub const EAR_SPACING: f32 = 0.2;

#[derive(Debug, Clone, Copy)]
struct Pose {
    position: Vec3,
    forward: Vec3,
    up: Vec3,
    gain: f32,
}

impl Default for Pose {
    fn default() -> Self {
        Self {
            position: Vec3::ZERO,
            forward: Vec3::NEG_Z,
            up: Vec3::Y,
            gain: 1.0,
        }
    }
}

impl Pose {
    fn ears(&self) -> ([f32; 3], [f32; 3]) {
        let right = self.forward.cross(self.up).normalize_or_zero() * (EAR_SPACING * 0.5);
        (
            (self.position - right).to_array(),
            (self.position + right).to_array(),
        )
    }
}

#[derive(Default)]
struct SharedListener {
    pose: Mutex<Pose>,
}

impl SharedListener {
    fn get(&self) -> Pose {
        *self.pose.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn edit(&self, f: impl FnOnce(&mut Pose)) {
        f(&mut self.pose.lock().unwrap_or_else(PoisonError::into_inner));
    }
}

/// An open output stream.
pub struct RodioDevice {
    _stream: OutputStream,
    handle: OutputStreamHandle,
    name: String,
}

impl RodioDevice {
    /// Name reported by the host.
    pub fn name(&self) -> &str {
        &self.name
    }
}

/// A listener bound to an output stream.
pub struct RodioContext {
    id: u32,
    listener: Arc<SharedListener>,
    handle: OutputStreamHandle,
}

struct Bound {
    id: u32,
    listener: Arc<SharedListener>,
    handle: OutputStreamHandle,
}

/// Backend that plays through the host's audio output.
#[derive(Default)]
pub struct RodioBackend {
    current: Option<Bound>,
    next_context: u32,
    speed_of_sound: Option<f32>,
}

impl RodioBackend {
    /// A backend with nothing open.
    pub fn new() -> Self {
        Self::default()
    }

    /// Speed of sound last accepted.
    pub fn speed_of_sound(&self) -> Option<f32> {
        self.speed_of_sound
    }

    fn bound(&self) -> Result<&Bound, BackendError> {
        self.current.as_ref().ok_or(BackendError::NoCurrentContext)
    }
}

impl AudioBackend for RodioBackend {
    type Device = RodioDevice;
    type Context = RodioContext;

    fn name(&self) -> &'static str {
        "rodio"
    }

    fn open_device(&mut self, name: Option<&str>) -> Result<RodioDevice, BackendError> {
        let host = ::rodio::cpal::default_host();
        let device = match name {
            Some(wanted) => host
                .output_devices()
                .map_err(|err| BackendError::Driver(err.to_string()))?
                .find(|device| device.name().map(|n| n == wanted).unwrap_or(false))
                .ok_or_else(|| BackendError::DeviceNotFound(wanted.to_owned()))?,
            None => host
                .default_output_device()
                .ok_or_else(|| BackendError::DeviceNotFound("default".into()))?,
        };
        let device_name = device.name().unwrap_or_else(|_| "<unknown>".into());

        let (stream, handle) = OutputStream::try_from_device(&device)
            .map_err(|err| BackendError::Driver(err.to_string()))?;
        debug!(device = %device_name, "Opened output stream");

        Ok(RodioDevice {
            _stream: stream,
            handle,
            name: device_name,
        })
    }

    fn close_device(&mut self, device: RodioDevice) -> Result<(), BackendError> {
        debug!(device = %device.name, "Closing output stream");
        drop(device);
        Ok(())
    }

    fn create_context(&mut self, device: &RodioDevice) -> Result<RodioContext, BackendError> {
        self.next_context += 1;
        Ok(RodioContext {
            id: self.next_context,
            listener: Arc::new(SharedListener::default()),
            handle: device.handle.clone(),
        })
    }

    fn make_context_current(&mut self, context: Option<&RodioContext>) -> Result<(), BackendError> {
        self.current = context.map(|context| Bound {
            id: context.id,
            listener: Arc::clone(&context.listener),
            handle: context.handle.clone(),
        });
        Ok(())
    }

    fn destroy_context(&mut self, context: RodioContext) -> Result<(), BackendError> {
        if self.current.as_ref().map(|bound| bound.id) == Some(context.id) {
            return Err(BackendError::InvalidValue(format!(
                "context {} is still current",
                context.id
            )));
        }
        Ok(())
    }

    fn set_listener_position(&mut self, position: [f32; 3]) -> Result<(), BackendError> {
        self.bound()?
            .listener
            .edit(|pose| pose.position = Vec3::from_array(position));
        Ok(())
    }

    fn set_listener_orientation(&mut self, orientation: [f32; 6]) -> Result<(), BackendError> {
        let forward = Vec3::new(orientation[0], orientation[1], orientation[2]);
        let up = Vec3::new(orientation[3], orientation[4], orientation[5]);
        self.bound()?.listener.edit(|pose| {
            pose.forward = forward;
            pose.up = up;
        });
        Ok(())
    }

    fn set_listener_gain(&mut self, gain: f32) -> Result<(), BackendError> {
        if gain < 0.0 || !gain.is_finite() {
            return Err(BackendError::InvalidValue(format!("gain {gain}")));
        }
        self.bound()?.listener.edit(|pose| pose.gain = gain);
        Ok(())
    }

    fn set_speed_of_sound(&mut self, speed: f32) -> Result<(), BackendError> {
        self.bound()?;
        if speed <= 0.0 || !speed.is_finite() {
            return Err(BackendError::InvalidValue(format!("speed of sound {speed}")));
        }
        self.speed_of_sound = Some(speed);
        Ok(())
    }
}

/// A decoded sound playing at a fixed point in the world.
pub struct RodioSample {
    sink: SpatialSink,
    listener: Arc<SharedListener>,
    emitter: Vec3,
    volume: f32,
}

impl RodioSample {
    /// Decode `bytes` (wav or ogg) and start playing it at `emitter` on the
    /// backend's current context.
    pub fn from_bytes(
        backend: &RodioBackend,
        bytes: Vec<u8>,
        emitter: Vec3,
        volume: f32,
    ) -> Result<Self, BackendError> {
        let bound = backend.bound()?;
        let pose = bound.listener.get();
        let (left, right) = pose.ears();

        let source = Decoder::new(Cursor::new(bytes))
            .map_err(|err| BackendError::InvalidValue(format!("undecodable sound: {err}")))?;
        let sink = SpatialSink::try_new(&bound.handle, emitter.to_array(), left, right)
            .map_err(|err| BackendError::Driver(err.to_string()))?;
        sink.set_volume(volume * pose.gain);
        sink.append(source);

        Ok(Self {
            sink,
            listener: Arc::clone(&bound.listener),
            emitter,
            volume,
        })
    }

    /// Where the sound plays from.
    pub fn emitter(&self) -> Vec3 {
        self.emitter
    }
}

impl Sample for RodioSample {
    fn is_ready(&self) -> bool {
        true
    }

    fn update(&mut self, _dt: f32) {
        let pose = self.listener.get();
        let (left, right) = pose.ears();
        self.sink.set_left_ear_position(left);
        self.sink.set_right_ear_position(right);
        self.sink.set_volume(self.volume * pose.gain);
    }

    fn is_finished(&self) -> bool {
        self.sink.empty()
    }
}
