//! Control input for vehicles: the client's per-tick message and its server-side buffer.

pub mod system;

pub use system::*;

use glam::{Vec2, Vec3};
use serde::{Deserialize, Serialize};

/// Weapon switch request carried by one input.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum WeaponSelect {
    Next,
    Previous,
    /// Direct selection; wrapped modulo the weapon count.
    Index(usize),
}

/// One tick of control input. Sent by clients and stored on the vehicle entity.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ControlInput {
    pub forward: bool,
    pub backward: bool,
    pub left: bool,
    pub right: bool,
    pub up: bool,
    pub down: bool,
    pub pitch_up: bool,
    pub pitch_down: bool,
    pub yaw_left: bool,
    pub yaw_right: bool,
    pub roll_left: bool,
    pub roll_right: bool,
    pub fire: bool,
    pub zoom: bool,
    pub weapon_select: Option<WeaponSelect>,
    pub mouse_delta: Vec2,
    pub tick: u64,
    /// Client clock in milliseconds when the input was sampled.
    pub timestamp: u64,
    /// World-space point the shot should travel toward.
    pub aim_point: Option<Vec3>,
    /// Client-chosen id for the projectile this input fires.
    pub projectile_id: Option<String>,
}

impl ControlInput {
    pub fn at_tick(tick: u64) -> Self {
        Self {
            tick,
            ..Default::default()
        }
    }

    /// Reset the one-shot fields after a tick has consumed them.
    pub fn clear_transients(&mut self) {
        self.mouse_delta = Vec2::ZERO;
        self.weapon_select = None;
        self.projectile_id = None;
    }

    /// Movement axes as (right, up, forward), each in [-1, 1].
    pub fn movement_axes(&self) -> Vec3 {
        Vec3::new(
            axis(self.right, self.left),
            axis(self.up, self.down),
            axis(self.forward, self.backward),
        )
    }

    /// Rotation axes as (pitch, yaw, roll), each in [-1, 1].
    pub fn rotation_axes(&self) -> Vec3 {
        Vec3::new(
            axis(self.pitch_up, self.pitch_down),
            axis(self.yaw_left, self.yaw_right),
            axis(self.roll_left, self.roll_right),
        )
    }
}

fn axis(positive: bool, negative: bool) -> f32 {
    match (positive, negative) {
        (true, false) => 1.0,
        (false, true) => -1.0,
        _ => 0.0,
    }
}
