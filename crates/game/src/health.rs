//! Deferred destruction and respawn of vehicles.

use engine_core::{
    EntityKind, EntityStore, EntityTag, GameStatus, SimResult, Team, Transform, Vec3,
    VehicleKind,
};
use physics::PhysicsWorld;

use crate::config::SimConfig;
use crate::drone::DroneController;
use crate::events::{EventQueue, GameEvent};
use crate::plane::PlaneController;
use crate::tuning::PLANE_FULL_CONTROL_SPEED;
use crate::vehicle::{FlightController, Vehicle};

/// Marks a vehicle that reached zero health. It neither flies nor fires until respawn.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Destroyed {
    pub at_tick: u64,
    pub respawn_tick: u64,
}

/// Spawn pose above a team's base, facing the arena centre.
pub fn spawn_transform(config: &SimConfig, team: Team, offset: Vec3) -> Transform {
    let base = config.team_bases.base(team);
    let mut transform =
        Transform::from_position(base + Vec3::Y * config.spawn_altitude + offset);
    let toward_centre = Vec3::new(-base.x, 0.0, -base.z);
    if toward_centre.length_squared() > 1e-6 {
        let yaw = (-toward_centre.x).atan2(-toward_centre.z);
        transform.set_yaw_pitch_roll(yaw, 0.0, 0.0);
    }
    transform
}

/// Fresh flight state for a vehicle entering the arena. Planes start in
/// powered flight at twice their full-control speed.
pub fn launch(kind: VehicleKind, transform: &mut Transform) -> FlightController {
    match kind {
        VehicleKind::Drone => {
            FlightController::Drone(DroneController::holding(transform.position.y))
        }
        VehicleKind::Plane => {
            transform.linear_velocity = transform.forward() * PLANE_FULL_CONTROL_SPEED * 2.0;
            FlightController::Plane(PlaneController::at_full_power())
        }
    }
}

#[derive(Debug, Default)]
pub struct HealthSystem;

impl HealthSystem {
    pub fn update(
        &mut self,
        store: &mut EntityStore,
        physics: &mut PhysicsWorld,
        tick: u64,
        config: &SimConfig,
        events: &mut EventQueue,
    ) -> SimResult<()> {
        let mut fallen = Vec::new();
        let mut revived = Vec::new();
        for (_, (tag, status, destroyed)) in store
            .world()
            .query::<(&EntityTag, &GameStatus, Option<&Destroyed>)>()
            .iter()
        {
            if tag.kind != EntityKind::Vehicle {
                continue;
            }
            match destroyed {
                None if status.is_dead() => fallen.push(tag.id.clone()),
                Some(destroyed) if tick >= destroyed.respawn_tick => revived.push(tag.id.clone()),
                _ => {}
            }
        }
        fallen.sort();
        revived.sort();

        for id in fallen {
            let marked = store.insert(
                &id,
                Destroyed {
                    at_tick: tick,
                    respawn_tick: tick + config.respawn_ticks,
                },
            );
            if let Err(err) = marked {
                log::warn!("{id} skipped: {err}");
                continue;
            }
            log::info!("{id} destroyed at tick {tick}");
            events.push(GameEvent::VehicleDestroyed { id });
        }

        for id in revived {
            if let Err(err) = self.respawn(store, physics, &id, config) {
                log::warn!("{id} respawn skipped: {err}");
                continue;
            }
            log::info!("{id} respawned at tick {tick}");
            events.push(GameEvent::VehicleRespawned { id });
        }
        Ok(())
    }

    fn respawn(
        &self,
        store: &mut EntityStore,
        physics: &mut PhysicsWorld,
        id: &str,
        config: &SimConfig,
    ) -> SimResult<()> {
        store.remove::<Destroyed>(id)?;
        let team = {
            let mut status = store.get_mut::<GameStatus>(id)?;
            status.restore();
            status.has_flag = false;
            status.team
        };
        let kind = store.get::<Vehicle>(id)?.kind;
        let mut transform = spawn_transform(config, team, Vec3::ZERO);
        let controller = launch(kind, &mut transform);
        *store.get_mut::<Transform>(id)? = transform;
        store.insert(id, controller)?;
        physics.push_transform(id, &transform)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tuning;
    use physics::BackendKind;

    fn setup() -> (EntityStore, PhysicsWorld, SimConfig) {
        let config = SimConfig {
            respawn_ticks: 10,
            ..Default::default()
        };
        let mut store = EntityStore::new();
        let mut physics = PhysicsWorld::new(BackendKind::Simple.create());
        let transform = Transform::from_position(Vec3::new(30.0, 40.0, 0.0));
        let kind = VehicleKind::Drone;
        physics
            .create_vehicle_body("blue", kind, &transform, &tuning::vehicle_tuning(kind))
            .unwrap();
        store
            .spawn(
                "blue",
                EntityKind::Vehicle,
                (
                    transform,
                    GameStatus::new(Team::Blue, 100.0),
                    Vehicle::new(kind, tuning::loadout(kind)),
                    FlightController::for_kind(kind),
                ),
            )
            .unwrap();
        (store, physics, config)
    }

    #[test]
    fn dead_vehicle_is_destroyed_then_respawned_at_base() {
        let (mut store, mut physics, config) = setup();
        store.get_mut::<GameStatus>("blue").unwrap().take_damage(500.0);
        let mut events = EventQueue::default();
        let mut system = HealthSystem;

        system
            .update(&mut store, &mut physics, 5, &config, &mut events)
            .unwrap();
        let destroyed = *store.get::<Destroyed>("blue").unwrap();
        assert_eq!(destroyed.respawn_tick, 15);
        assert_eq!(events.len(), 1);

        system
            .update(&mut store, &mut physics, 14, &config, &mut events)
            .unwrap();
        assert!(store.has::<Destroyed>("blue"));

        system
            .update(&mut store, &mut physics, 15, &config, &mut events)
            .unwrap();
        assert!(!store.has::<Destroyed>("blue"));
        let status = store.get::<GameStatus>("blue").unwrap();
        assert_eq!(status.health, status.max_health);
        let expected = config.team_bases.blue + Vec3::Y * config.spawn_altitude;
        assert_eq!(store.get::<Transform>("blue").unwrap().position, expected);
        assert_eq!(physics.body_state("blue").unwrap().position, expected);
        assert_eq!(events.len(), 2);
    }

    #[test]
    fn spawn_faces_the_centre() {
        let config = SimConfig::default();
        let red = spawn_transform(&config, Team::Red, Vec3::ZERO);
        let blue = spawn_transform(&config, Team::Blue, Vec3::ZERO);
        assert!(red.forward().z > 0.99);
        assert!(blue.forward().z < -0.99);
    }
}
