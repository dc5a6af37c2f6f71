//! Flight, damage and loadout constants.

use engine_core::VehicleKind;
use physics::PhysicsTuning;

use crate::weapons::{ProjectileKind, Weapon};

/// Rate at which the per-tick plane constants were tuned.
pub const REFERENCE_TICK_RATE: f32 = 60.0;

// Drone altitude hold
pub const DRONE_KP: f32 = 4.0;
pub const DRONE_KD: f32 = 4.0;
pub const DRONE_KI: f32 = 0.05;
/// Anti-windup bound of the altitude integral.
pub const DRONE_INTEGRAL_LIMIT: f32 = 20.0;
pub const DRONE_VERTICAL_SPEED: f32 = 8.0;
pub const DRONE_PITCH_LIMIT: f32 = std::f32::consts::PI / 2.5;
/// Fraction of roll kept each tick while stabilizing.
pub const DRONE_ROLL_DAMPING: f32 = 0.9;

/// Fraction of angular velocity kept each tick, both airframes.
pub const ANGULAR_DAMPING_PER_TICK: f32 = 0.95;
/// Radians per mouse count.
pub const MOUSE_SENSITIVITY: f32 = 0.002;

// Plane flight model, per tick at the reference rate
pub const PLANE_POWER_STEP: f32 = 0.01;
pub const PLANE_SPEED_MODIFIER: f32 = 0.05;
pub const PLANE_DRAG_FACTOR: f32 = 0.003;
pub const PLANE_LIFT_FACTOR: f32 = 0.005;
pub const PLANE_MAX_LIFT: f32 = 0.05;
/// Extra sink while below flying speed.
pub const PLANE_STALL_SINK: f32 = 0.1;
/// Forward speed at which control authority saturates.
pub const PLANE_FULL_CONTROL_SPEED: f32 = 10.0;
pub const PLANE_ALIGNMENT_FACTOR: f32 = 0.002;
pub const PLANE_ALIGNMENT_MIN_SPEED: f32 = 1.0;
/// Speed-scaled share of angular decay per tick.
pub const PLANE_SPEED_ANGULAR_DAMPING: f32 = 0.0005;
pub const PLANE_START_POWER: f32 = 0.5;

// Collision damage
pub const LIGHT_IMPACT_SPEED: f32 = 10.0;
pub const MEDIUM_IMPACT_SPEED: f32 = 15.0;
pub const LIGHT_DAMAGE_FACTOR: f32 = 0.05;
pub const MEDIUM_DAMAGE_FACTOR: f32 = 0.1;
pub const HEAVY_DAMAGE_FACTOR: f32 = 0.2;
pub const ENVIRONMENT_DAMAGE_MULTIPLIER: f32 = 1.5;

pub const VEHICLE_MAX_HEALTH: f32 = 100.0;

pub fn vehicle_tuning(kind: VehicleKind) -> PhysicsTuning {
    match kind {
        VehicleKind::Drone => PhysicsTuning {
            mass: 1.0,
            linear_drag: 0.3,
            angular_drag: 1.0,
            max_speed: 30.0,
            max_angular_speed: 3.0,
            max_angular_acceleration: 6.0,
            thrust: 20.0,
            lift: 0.0,
            torque: 2.0,
            gravity_scale: 1.0,
        },
        VehicleKind::Plane => PhysicsTuning {
            mass: 2.0,
            linear_drag: 0.0,
            angular_drag: 0.5,
            max_speed: 60.0,
            max_angular_speed: 2.5,
            max_angular_acceleration: 4.0,
            thrust: PLANE_SPEED_MODIFIER,
            lift: PLANE_LIFT_FACTOR,
            torque: 1.5,
            gravity_scale: 0.0,
        },
    }
}

pub fn loadout(kind: VehicleKind) -> Vec<Weapon> {
    match kind {
        VehicleKind::Drone => vec![
            Weapon::new("mg", "Machine Gun", ProjectileKind::Bullet)
                .with_damage(8.0)
                .with_fire_rate(5.0, 10.0)
                .with_heat(0.08, 0.5)
                .with_ballistics(120.0, 300.0),
            Weapon::new("missile", "Missile", ProjectileKind::Missile)
                .with_damage(35.0)
                .with_fire_rate(0.5, 1.0)
                .with_heat(0.5, 0.25)
                .with_ballistics(60.0, 500.0),
        ],
        VehicleKind::Plane => vec![
            Weapon::new("cannon", "Cannon", ProjectileKind::Bullet)
                .with_damage(12.0)
                .with_fire_rate(4.0, 8.0)
                .with_heat(0.06, 0.4)
                .with_ballistics(150.0, 400.0),
            Weapon::new("laser", "Laser", ProjectileKind::Laser)
                .with_damage(20.0)
                .with_fire_rate(1.0, 2.0)
                .with_heat(0.3, 0.3)
                .with_ballistics(250.0, 350.0),
        ],
    }
}
