//! Physics component attached to simulated entities.

use serde::{Deserialize, Serialize};

use crate::backend::BodyHandle;

/// Per-vehicle flight and body parameters.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PhysicsTuning {
    pub mass: f32,
    /// Linear damping handed to the body.
    pub linear_drag: f32,
    /// Angular damping handed to the body.
    pub angular_drag: f32,
    pub max_speed: f32,
    pub max_angular_speed: f32,
    pub max_angular_acceleration: f32,
    /// Horizontal move speed for drones, thrust modifier for planes.
    pub thrust: f32,
    pub lift: f32,
    /// Rotation rate from control input.
    pub torque: f32,
    pub gravity_scale: f32,
}

impl Default for PhysicsTuning {
    fn default() -> Self {
        Self {
            mass: 1.0,
            linear_drag: 0.0,
            angular_drag: 0.0,
            max_speed: 50.0,
            max_angular_speed: 3.0,
            max_angular_acceleration: 6.0,
            thrust: 20.0,
            lift: 0.0,
            torque: 2.0,
            gravity_scale: 1.0,
        }
    }
}

/// Links an entity to its body in the [`crate::PhysicsWorld`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PhysicsComponent {
    pub body: BodyHandle,
    pub tuning: PhysicsTuning,
}

impl PhysicsComponent {
    pub fn new(body: BodyHandle, tuning: PhysicsTuning) -> Self {
        Self { body, tuning }
    }
}
