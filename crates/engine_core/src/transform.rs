//! Transform component: spatial state mirrored into and out of physics bodies.

use glam::{EulerRot, Quat, Vec3};
use serde::{Deserialize, Serialize};

/// Position, orientation and velocities of an entity.
///
/// Forward is negative Z, right is positive X and up is positive Y.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Transform {
    pub position: Vec3,
    pub rotation: Quat,
    pub linear_velocity: Vec3,
    pub angular_velocity: Vec3,
}

impl Default for Transform {
    fn default() -> Self {
        Self {
            position: Vec3::ZERO,
            rotation: Quat::IDENTITY,
            linear_velocity: Vec3::ZERO,
            angular_velocity: Vec3::ZERO,
        }
    }
}

impl Transform {
    /// Create a new transform at the given position.
    pub fn from_position(position: Vec3) -> Self {
        Self {
            position,
            ..Default::default()
        }
    }

    /// Create a new transform with position and rotation.
    pub fn from_position_rotation(position: Vec3, rotation: Quat) -> Self {
        Self {
            position,
            rotation,
            ..Default::default()
        }
    }

    /// Get the forward direction (negative Z in right-handed coordinates).
    pub fn forward(&self) -> Vec3 {
        self.rotation * -Vec3::Z
    }

    /// Get the right direction (positive X).
    pub fn right(&self) -> Vec3 {
        self.rotation * Vec3::X
    }

    /// Get the up direction (positive Y).
    pub fn up(&self) -> Vec3 {
        self.rotation * Vec3::Y
    }

    /// Forward and right vectors of the heading only, flattened onto the XZ plane.
    pub fn yaw_basis(&self) -> (Vec3, Vec3) {
        let (yaw, _, _) = self.yaw_pitch_roll();
        let heading = Quat::from_rotation_y(yaw);
        (heading * -Vec3::Z, heading * Vec3::X)
    }

    /// Decompose the rotation into (yaw, pitch, roll) in radians.
    pub fn yaw_pitch_roll(&self) -> (f32, f32, f32) {
        self.rotation.to_euler(EulerRot::YXZ)
    }

    /// Rebuild the rotation from (yaw, pitch, roll) in radians.
    pub fn set_yaw_pitch_roll(&mut self, yaw: f32, pitch: f32, roll: f32) {
        self.rotation = Quat::from_euler(EulerRot::YXZ, yaw, pitch, roll).normalize();
    }

    /// Orient so that forward points along `direction`.
    pub fn look_along(&mut self, direction: Vec3) {
        if direction.length_squared() > 1e-8 {
            self.rotation = Quat::from_rotation_arc(-Vec3::Z, direction.normalize());
        }
    }
}
