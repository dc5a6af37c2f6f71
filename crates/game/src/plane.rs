//! Plane flight model: throttle-driven thrust, drag and lift with airspeed-scaled control.
//!
//! Constants are per tick at [`REFERENCE_TICK_RATE`]; every update rescales them
//! by `dt` so the model behaves the same at other tick rates.

use input::ControlInput;

use crate::tuning::{
    ANGULAR_DAMPING_PER_TICK, MOUSE_SENSITIVITY, PLANE_ALIGNMENT_FACTOR,
    PLANE_ALIGNMENT_MIN_SPEED, PLANE_DRAG_FACTOR, PLANE_FULL_CONTROL_SPEED, PLANE_MAX_LIFT,
    PLANE_POWER_STEP, PLANE_SPEED_ANGULAR_DAMPING, PLANE_STALL_SINK, PLANE_START_POWER,
    REFERENCE_TICK_RATE,
};
use crate::vehicle::{FlightContext, FlightModel};

#[derive(Debug, Clone, PartialEq)]
pub struct PlaneController {
    /// Throttle in [0, 1].
    pub engine_power: f32,
    /// Drag coefficient applied on the previous tick.
    pub last_drag: f32,
}

impl Default for PlaneController {
    fn default() -> Self {
        Self {
            engine_power: PLANE_START_POWER,
            last_drag: 0.0,
        }
    }
}

/// Share of control authority available at a forward airspeed, in [0, 1].
pub fn flight_mode_influence(forward_speed: f32) -> f32 {
    (forward_speed / PLANE_FULL_CONTROL_SPEED).clamp(0.0, 1.0)
}

fn reference_ticks(dt: f32) -> f32 {
    dt * REFERENCE_TICK_RATE
}

impl FlightModel for PlaneController {
    fn apply_input(&mut self, ctx: &mut FlightContext<'_>, input: &ControlInput) {
        let ticks = reference_ticks(ctx.dt);
        let tuning = ctx.tuning;
        let transform = &mut *ctx.transform;

        let throttle = input.movement_axes().z;
        self.engine_power =
            (self.engine_power + throttle * PLANE_POWER_STEP * ticks).clamp(0.0, 1.0);

        let forward = transform.forward();
        let right = transform.right();
        let up = transform.up();
        let influence = flight_mode_influence(transform.linear_velocity.dot(forward));
        let authority = influence * self.engine_power;
        if authority <= 0.0 {
            return;
        }

        let rotation = input.rotation_axes();
        let mut torque = (right * rotation.x + up * rotation.y - forward * rotation.z)
            * tuning.torque
            * ctx.dt;
        torque -= (up * input.mouse_delta.x + right * input.mouse_delta.y)
            * MOUSE_SENSITIVITY
            * REFERENCE_TICK_RATE
            * ctx.dt;
        let torque =
            (torque * authority).clamp_length_max(tuning.max_angular_acceleration * ctx.dt);
        transform.angular_velocity += torque;
    }

    fn update(&mut self, ctx: &mut FlightContext<'_>) {
        let ticks = reference_ticks(ctx.dt);
        let tuning = ctx.tuning;
        let transform = &mut *ctx.transform;
        let power = self.engine_power;

        let forward = transform.forward();
        let up = transform.up();
        let mut velocity = transform.linear_velocity;
        let speed = velocity.length();

        let thrust = (speed * self.last_drag + tuning.thrust) * power;
        velocity += forward * thrust * ticks;

        let drag_coefficient = PLANE_DRAG_FACTOR * power;
        let drag = (speed * drag_coefficient * ticks).min(speed);
        if speed > 0.0 {
            velocity -= transform.linear_velocity / speed * drag;
        }
        self.last_drag = drag_coefficient;

        let lift = (speed * tuning.lift * power).clamp(0.0, PLANE_MAX_LIFT);
        velocity += up * lift * ticks;

        let influence = flight_mode_influence(velocity.dot(forward));
        velocity.y -= (PLANE_MAX_LIFT + PLANE_STALL_SINK * (1.0 - influence)) * ticks;

        if speed > PLANE_ALIGNMENT_MIN_SPEED {
            let heading = transform.linear_velocity / speed;
            transform.angular_velocity +=
                forward.cross(heading) * PLANE_ALIGNMENT_FACTOR * REFERENCE_TICK_RATE * ticks;
        }

        let decay = (1.0 - (1.0 - ANGULAR_DAMPING_PER_TICK) - speed * PLANE_SPEED_ANGULAR_DAMPING)
            .clamp(0.0, 1.0);
        transform.angular_velocity *= decay.powf(ticks);
        transform.angular_velocity = transform
            .angular_velocity
            .clamp_length_max(tuning.max_angular_speed);

        transform.linear_velocity = velocity.clamp_length_max(tuning.max_speed);
    }
}

impl PlaneController {
    /// Controller for a plane already in powered flight.
    pub fn at_full_power() -> Self {
        Self {
            engine_power: 1.0,
            last_drag: PLANE_DRAG_FACTOR,
        }
    }

    /// Forward airspeed and the matching control influence.
    pub fn airspeed(transform: &engine_core::Transform) -> (f32, f32) {
        let forward_speed = transform.linear_velocity.dot(transform.forward());
        (forward_speed, flight_mode_influence(forward_speed))
    }

    /// Vertical acceleration from lift minus sink at a given level-flight speed, per tick.
    pub fn level_climb_rate(&self, speed: f32, lift_factor: f32) -> f32 {
        let lift = (speed * lift_factor * self.engine_power).clamp(0.0, PLANE_MAX_LIFT);
        lift - PLANE_MAX_LIFT - PLANE_STALL_SINK * (1.0 - flight_mode_influence(speed))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tuning::{vehicle_tuning, PLANE_LIFT_FACTOR};
    use engine_core::{Transform, Vec3, VehicleKind};
    use physics::PhysicsTuning;

    const DT: f32 = 1.0 / 60.0;

    fn tick(
        plane: &mut PlaneController,
        transform: &mut Transform,
        tuning: &PhysicsTuning,
        input: &ControlInput,
    ) {
        let mut ctx = FlightContext {
            transform: &mut *transform,
            tuning,
            dt: DT,
            gravity: 0.0,
        };
        plane.apply_input(&mut ctx, input);
        plane.update(&mut ctx);
        transform.position += transform.linear_velocity * DT;
        let spin = transform.angular_velocity * DT;
        transform.rotation =
            (engine_core::Quat::from_scaled_axis(spin) * transform.rotation).normalize();
    }

    fn cruising(speed: f32) -> Transform {
        let mut transform = Transform::from_position(Vec3::new(0.0, 100.0, 0.0));
        transform.linear_velocity = Vec3::new(0.0, 0.0, -speed);
        transform
    }

    #[test]
    fn influence_saturates() {
        assert_eq!(flight_mode_influence(-5.0), 0.0);
        assert_eq!(flight_mode_influence(5.0), 0.5);
        assert_eq!(flight_mode_influence(40.0), 1.0);
    }

    #[test]
    fn throttle_stays_in_range() {
        let tuning = vehicle_tuning(VehicleKind::Plane);
        let mut plane = PlaneController::default();
        let mut transform = cruising(20.0);
        let throttle_up = ControlInput {
            forward: true,
            ..Default::default()
        };
        for _ in 0..200 {
            tick(&mut plane, &mut transform, &tuning, &throttle_up);
        }
        assert_eq!(plane.engine_power, 1.0);

        let throttle_down = ControlInput {
            backward: true,
            ..Default::default()
        };
        for _ in 0..200 {
            tick(&mut plane, &mut transform, &tuning, &throttle_down);
        }
        assert_eq!(plane.engine_power, 0.0);
    }

    #[test]
    fn stalled_plane_cannot_turn() {
        let tuning = vehicle_tuning(VehicleKind::Plane);
        let mut plane = PlaneController::default();
        let mut transform = Transform::from_position(Vec3::new(0.0, 100.0, 0.0));
        let yaw = ControlInput {
            yaw_left: true,
            ..Default::default()
        };
        let mut ctx = FlightContext {
            transform: &mut transform,
            tuning: &tuning,
            dt: DT,
            gravity: 0.0,
        };
        plane.apply_input(&mut ctx, &yaw);
        assert_eq!(transform.angular_velocity, Vec3::ZERO);
    }

    #[test]
    fn flying_plane_turns_with_input() {
        let tuning = vehicle_tuning(VehicleKind::Plane);
        let mut plane = PlaneController::at_full_power();
        let mut transform = cruising(30.0);
        let yaw = ControlInput {
            yaw_left: true,
            ..Default::default()
        };
        for _ in 0..30 {
            tick(&mut plane, &mut transform, &tuning, &yaw);
        }
        let (heading, _, _) = transform.yaw_pitch_roll();
        assert!(heading > 0.05, "heading {heading}");
        assert!(transform.angular_velocity.length() <= tuning.max_angular_speed + 1e-4);
    }

    #[test]
    fn full_power_accelerates_up_to_max_speed() {
        let tuning = vehicle_tuning(VehicleKind::Plane);
        let mut plane = PlaneController::at_full_power();
        let mut transform = cruising(20.0);
        let idle = ControlInput::default();
        let mut previous = 20.0;
        for _ in 0..60 {
            tick(&mut plane, &mut transform, &tuning, &idle);
        }
        let (speed, influence) = PlaneController::airspeed(&transform);
        assert!(speed > previous);
        assert_eq!(influence, 1.0);
        previous = speed;
        for _ in 0..1200 {
            tick(&mut plane, &mut transform, &tuning, &idle);
        }
        assert!(transform.linear_velocity.length() <= tuning.max_speed + 1e-3);
        assert!(transform.linear_velocity.length() >= previous);
    }

    #[test]
    fn slow_plane_sinks_faster_than_fast_one() {
        let plane = PlaneController::at_full_power();
        let stalled = plane.level_climb_rate(0.0, PLANE_LIFT_FACTOR);
        let flying = plane.level_climb_rate(20.0, PLANE_LIFT_FACTOR);
        assert!(stalled < flying);
        assert!(stalled < 0.0);
        assert!(flying.abs() < 1e-6);
    }
}
