//! Vehicle component, flight-model dispatch and the per-tick flight system.

use engine_core::{EntityStore, EntityTag, GameStatus, SimResult, Transform, VehicleKind};
use input::{ControlInput, WeaponSelect};
use physics::{PhysicsComponent, PhysicsTuning, PhysicsWorld};

use crate::drone::DroneController;
use crate::health::Destroyed;
use crate::plane::PlaneController;
use crate::weapons::Weapon;

/// A player-controlled airframe and its weapons.
#[derive(Debug, Clone)]
pub struct Vehicle {
    pub kind: VehicleKind,
    pub weapons: Vec<Weapon>,
    /// Always a valid index into `weapons` when any exist.
    pub active_weapon: usize,
}

impl Vehicle {
    pub fn new(kind: VehicleKind, weapons: Vec<Weapon>) -> Self {
        Self {
            kind,
            weapons,
            active_weapon: 0,
        }
    }

    pub fn active(&self) -> Option<&Weapon> {
        self.weapons.get(self.active_weapon)
    }

    pub fn active_mut(&mut self) -> Option<&mut Weapon> {
        self.weapons.get_mut(self.active_weapon)
    }

    pub fn next_weapon(&mut self) {
        if !self.weapons.is_empty() {
            self.active_weapon = (self.active_weapon + 1) % self.weapons.len();
        }
    }

    pub fn previous_weapon(&mut self) {
        if !self.weapons.is_empty() {
            let count = self.weapons.len();
            self.active_weapon = (self.active_weapon + count - 1) % count;
        }
    }

    /// Select by index, wrapping out-of-range values.
    pub fn select_weapon(&mut self, index: usize) {
        if !self.weapons.is_empty() {
            self.active_weapon = index % self.weapons.len();
        }
    }

    pub fn apply_selection(&mut self, select: WeaponSelect) {
        match select {
            WeaponSelect::Next => self.next_weapon(),
            WeaponSelect::Previous => self.previous_weapon(),
            WeaponSelect::Index(index) => self.select_weapon(index),
        }
    }
}

/// What a flight model may read and change in one tick.
pub struct FlightContext<'a> {
    pub transform: &'a mut Transform,
    pub tuning: &'a PhysicsTuning,
    pub dt: f32,
    /// Downward acceleration the body experiences from the physics engine.
    pub gravity: f32,
}

/// Per-variant flight behaviour: input first, then the autonomous update.
pub trait FlightModel {
    fn apply_input(&mut self, ctx: &mut FlightContext<'_>, input: &ControlInput);

    fn update(&mut self, ctx: &mut FlightContext<'_>);
}

/// Per-entity flight state for either airframe.
#[derive(Debug, Clone, PartialEq)]
pub enum FlightController {
    Drone(DroneController),
    Plane(PlaneController),
}

impl FlightController {
    pub fn for_kind(kind: VehicleKind) -> Self {
        match kind {
            VehicleKind::Drone => FlightController::Drone(DroneController::default()),
            VehicleKind::Plane => FlightController::Plane(PlaneController::default()),
        }
    }

    /// Run one tick: input, then update.
    pub fn step(&mut self, ctx: &mut FlightContext<'_>, input: &ControlInput) {
        self.apply_input(ctx, input);
        self.update(ctx);
    }
}

impl FlightModel for FlightController {
    fn apply_input(&mut self, ctx: &mut FlightContext<'_>, input: &ControlInput) {
        match self {
            FlightController::Drone(drone) => drone.apply_input(ctx, input),
            FlightController::Plane(plane) => plane.apply_input(ctx, input),
        }
    }

    fn update(&mut self, ctx: &mut FlightContext<'_>) {
        match self {
            FlightController::Drone(drone) => drone.update(ctx),
            FlightController::Plane(plane) => plane.update(ctx),
        }
    }
}

/// Drives every living vehicle's flight model and pushes the result into physics.
#[derive(Debug, Default)]
pub struct FlightSystem;

impl FlightSystem {
    pub fn update(
        &mut self,
        store: &mut EntityStore,
        physics: &mut PhysicsWorld,
        dt: f32,
        gravity: f32,
    ) -> SimResult<()> {
        let idle = ControlInput::default();
        let mut pushes: Vec<(String, Transform)> = Vec::new();

        for (_, (tag, controller, transform, body, input, status, destroyed)) in store
            .world_mut()
            .query_mut::<(
                &EntityTag,
                &mut FlightController,
                &mut Transform,
                &PhysicsComponent,
                Option<&ControlInput>,
                Option<&GameStatus>,
                Option<&Destroyed>,
            )>()
        {
            if destroyed.is_some() || status.is_some_and(GameStatus::is_dead) {
                continue;
            }
            let mut ctx = FlightContext {
                transform,
                tuning: &body.tuning,
                dt,
                gravity: gravity * body.tuning.gravity_scale,
            };
            controller.step(&mut ctx, input.unwrap_or(&idle));
            pushes.push((tag.id.clone(), *ctx.transform));
        }

        pushes.sort_by(|a, b| a.0.cmp(&b.0));
        for (id, transform) in pushes {
            if let Err(err) = physics.push_transform(&id, &transform) {
                log::debug!("flight: {err}");
            }
        }
        Ok(())
    }
}
