#![warn(missing_docs)]
//! First-person view orientation: eye angles and the basis vectors derived from them.
//!
//! World space is right-handed with +Y up. A zero yaw/pitch looks down +X.

use glam::{Quat, Vec3};

/// Pitch is kept just shy of straight up/down so the basis never degenerates.
pub const PITCH_LIMIT: f32 = std::f32::consts::FRAC_PI_2 - 0.01;

/// Euler eye angles in radians.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct EyeAngles {
    /// Vertical rotation around the local right axis. Positive looks up.
    pub pitch: f32,
    /// Horizontal rotation around +Y.
    pub yaw: f32,
    /// Rotation around the forward axis.
    pub roll: f32,
}

/// Orthonormal view basis.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Basis {
    /// Direction the eye is looking.
    pub forward: Vec3,
    /// Local +X of the view.
    pub right: Vec3,
    /// Local +Y of the view.
    pub up: Vec3,
}

impl EyeAngles {
    /// Angles from radians.
    pub const fn new(pitch: f32, yaw: f32, roll: f32) -> Self {
        Self { pitch, yaw, roll }
    }

    /// Angles from degrees, the unit most entity code stores them in.
    pub fn from_degrees(pitch: f32, yaw: f32, roll: f32) -> Self {
        Self::new(pitch.to_radians(), yaw.to_radians(), roll.to_radians())
    }

    /// Direction the eye is looking.
    pub fn forward(&self) -> Vec3 {
        Vec3::new(
            self.yaw.cos() * self.pitch.cos(),
            self.pitch.sin(),
            self.yaw.sin() * self.pitch.cos(),
        )
        .normalize()
    }

    /// Forward, right and up vectors, with roll applied around forward.
    pub fn basis(&self) -> Basis {
        let forward = self.forward();
        // Horizontal right; only degenerate at |pitch| == 90deg, which rotate() never reaches.
        let flat_right = Vec3::new(-self.yaw.sin(), 0.0, self.yaw.cos());
        let flat_up = flat_right.cross(forward).normalize();

        let roll = Quat::from_axis_angle(forward, self.roll);
        Basis {
            forward,
            right: (roll * flat_right).normalize(),
            up: (roll * flat_up).normalize(),
        }
    }

    /// Add to yaw and pitch.
    ///
    /// # Arguments
    /// * `delta_yaw` - Horizontal rotation delta in radians
    /// * `delta_pitch` - Vertical rotation delta in radians
    pub fn rotate(&mut self, delta_yaw: f32, delta_pitch: f32) {
        self.yaw += delta_yaw;
        self.pitch += delta_pitch;

        self.pitch = self.pitch.clamp(-PITCH_LIMIT, PITCH_LIMIT);

        // Normalize yaw to [0, 2π]
        self.yaw = self.yaw.rem_euclid(std::f32::consts::TAU);
    }

    /// Angles that look along `direction`. Roll is zero.
    pub fn looking_along(direction: Vec3) -> Self {
        let dir = direction.normalize_or_zero();
        if dir == Vec3::ZERO {
            return Self::default();
        }
        let pitch = dir.y.clamp(-1.0, 1.0).asin().clamp(-PITCH_LIMIT, PITCH_LIMIT);
        let yaw = dir.z.atan2(dir.x).rem_euclid(std::f32::consts::TAU);
        Self::new(pitch, yaw, 0.0)
    }
}

/// First-person viewpoint: where the eye is and where it looks.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Camera {
    /// Eye position in world space.
    pub position: Vec3,
    /// Eye orientation.
    pub angles: EyeAngles,
}

impl Camera {
    /// Create a camera at `position` looking down +X.
    pub fn new(position: Vec3) -> Self {
        Self {
            position,
            angles: EyeAngles::default(),
        }
    }

    /// Get the forward direction vector.
    pub fn forward(&self) -> Vec3 {
        self.angles.forward()
    }

    /// Get the view basis.
    pub fn basis(&self) -> Basis {
        self.angles.basis()
    }

    /// Move the camera forward by the given distance.
    pub fn move_forward(&mut self, distance: f32) {
        let forward = self.forward();
        self.position += forward * distance;
    }

    /// Move the camera right by the given distance.
    pub fn move_right(&mut self, distance: f32) {
        let right = self.basis().right;
        self.position += right * distance;
    }

    /// Move the camera up by the given distance (world Y axis).
    pub fn move_up(&mut self, distance: f32) {
        self.position.y += distance;
    }

    /// Turn to face `target`. No-op when already standing on it.
    pub fn look_at(&mut self, target: Vec3) {
        let dir = target - self.position;
        if dir.length_squared() > f32::EPSILON {
            self.angles = EyeAngles::looking_along(dir);
        }
    }
}
