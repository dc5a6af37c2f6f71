//! Drone flight model: PID altitude hold, direct translation and stabilized attitude.

use engine_core::Vec3;
use input::ControlInput;

use crate::tuning::{
    ANGULAR_DAMPING_PER_TICK, DRONE_INTEGRAL_LIMIT, DRONE_KD, DRONE_KI, DRONE_KP,
    DRONE_PITCH_LIMIT, DRONE_ROLL_DAMPING, DRONE_VERTICAL_SPEED, MOUSE_SENSITIVITY,
};
use crate::vehicle::{FlightContext, FlightModel};

#[derive(Debug, Clone, Default, PartialEq)]
pub struct DroneController {
    /// Altitude held by the PID; anchored to the current height on first update.
    pub target_altitude: Option<f32>,
    pub integral_error: f32,
    /// Set while vertical input drives the drone this tick.
    pub vertical_override: bool,
}

impl DroneController {
    pub fn holding(altitude: f32) -> Self {
        Self {
            target_altitude: Some(altitude),
            ..Default::default()
        }
    }

    /// Vertical acceleration requested by the altitude PID, excluding hover thrust.
    pub fn pid_acceleration(&mut self, altitude: f32, vertical_speed: f32, dt: f32) -> f32 {
        let target = *self.target_altitude.get_or_insert(altitude);
        let error = target - altitude;
        self.integral_error = (self.integral_error + error * dt)
            .clamp(-DRONE_INTEGRAL_LIMIT, DRONE_INTEGRAL_LIMIT);
        DRONE_KP * error + DRONE_KD * -vertical_speed + DRONE_KI * self.integral_error
    }
}

impl FlightModel for DroneController {
    fn apply_input(&mut self, ctx: &mut FlightContext<'_>, input: &ControlInput) {
        let dt = ctx.dt;
        let tuning = ctx.tuning;
        let transform = &mut *ctx.transform;
        let movement = input.movement_axes();

        let (forward, right) = transform.yaw_basis();
        transform.linear_velocity +=
            (forward * movement.z + right * movement.x) * tuning.thrust * dt;

        if movement.y != 0.0 {
            transform.linear_velocity.y = movement.y * DRONE_VERTICAL_SPEED;
            self.target_altitude = Some(transform.position.y + transform.linear_velocity.y * dt);
            self.integral_error = 0.0;
            self.vertical_override = true;
        }

        let rotation = input.rotation_axes();
        let (mut yaw, mut pitch, mut roll) = transform.yaw_pitch_roll();
        yaw += rotation.y * tuning.torque * dt;
        pitch += rotation.x * tuning.torque * dt;
        roll *= DRONE_ROLL_DAMPING;

        if input.mouse_delta != engine_core::Vec2::ZERO {
            yaw -= input.mouse_delta.x * MOUSE_SENSITIVITY;
            pitch -= input.mouse_delta.y * MOUSE_SENSITIVITY;
            roll = 0.0;
        }

        pitch = pitch.clamp(-DRONE_PITCH_LIMIT, DRONE_PITCH_LIMIT);
        transform.set_yaw_pitch_roll(yaw, pitch, roll);
    }

    fn update(&mut self, ctx: &mut FlightContext<'_>) {
        let dt = ctx.dt;
        let hover = ctx.gravity;
        let transform = &mut *ctx.transform;

        if self.vertical_override {
            self.vertical_override = false;
            transform.linear_velocity.y += hover * dt;
        } else {
            let accel = self.pid_acceleration(
                transform.position.y,
                transform.linear_velocity.y,
                dt,
            );
            transform.linear_velocity.y += (accel + hover) * dt;
        }

        transform.angular_velocity *= ANGULAR_DAMPING_PER_TICK;

        let horizontal = Vec3::new(transform.linear_velocity.x, 0.0, transform.linear_velocity.z);
        let max_speed = ctx.tuning.max_speed;
        if horizontal.length() > max_speed {
            let capped = horizontal.normalize() * max_speed;
            transform.linear_velocity.x = capped.x;
            transform.linear_velocity.z = capped.z;
        }
    }
}
