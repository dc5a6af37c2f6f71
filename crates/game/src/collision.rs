//! Contact classification and response.
//!
//! The physics world reports each new touching pair once. This system decides
//! what the pair means and routes it: crash damage, projectile impact records
//! or flag pickup. Destruction itself is left to the health system.

use engine_core::{EntityKind, EntityStore, GameStatus, SimResult};
use physics::{CollisionGroup, CollisionGroups, ContactEvent};
use serde::{Deserialize, Serialize};

use crate::events::{EventQueue, GameEvent};
use crate::flags;
use crate::health::Destroyed;
use crate::projectiles::{Impact, Projectile};
use crate::tuning::{
    ENVIRONMENT_DAMAGE_MULTIPLIER, HEAVY_DAMAGE_FACTOR, LIGHT_DAMAGE_FACTOR, LIGHT_IMPACT_SPEED,
    MEDIUM_DAMAGE_FACTOR, MEDIUM_IMPACT_SPEED,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CollisionType {
    VehicleEnvironment,
    VehicleVehicle,
    VehicleProjectile,
    VehicleFlag,
    ProjectileEnvironment,
    Other,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CollisionSeverity {
    Light,
    Medium,
    Heavy,
}

impl CollisionSeverity {
    pub fn damage_factor(self) -> f32 {
        match self {
            CollisionSeverity::Light => LIGHT_DAMAGE_FACTOR,
            CollisionSeverity::Medium => MEDIUM_DAMAGE_FACTOR,
            CollisionSeverity::Heavy => HEAVY_DAMAGE_FACTOR,
        }
    }
}

/// Classify a pair by group membership. Environment takes priority.
pub fn classify_collision(a: &CollisionGroups, b: &CollisionGroups) -> CollisionType {
    let either = |group: CollisionGroup| a.contains(group) || b.contains(group);
    let vehicles = a.is_vehicle() as u8 + b.is_vehicle() as u8;

    if either(CollisionGroup::Environment) {
        if either(CollisionGroup::Projectiles) {
            CollisionType::ProjectileEnvironment
        } else if vehicles > 0 {
            CollisionType::VehicleEnvironment
        } else {
            CollisionType::Other
        }
    } else if vehicles == 2 {
        CollisionType::VehicleVehicle
    } else if vehicles == 1 && either(CollisionGroup::Projectiles) {
        CollisionType::VehicleProjectile
    } else if vehicles == 1 && either(CollisionGroup::Flags) {
        CollisionType::VehicleFlag
    } else {
        CollisionType::Other
    }
}

pub fn determine_collision_severity(impact_speed: f32) -> CollisionSeverity {
    if impact_speed < LIGHT_IMPACT_SPEED {
        CollisionSeverity::Light
    } else if impact_speed < MEDIUM_IMPACT_SPEED {
        CollisionSeverity::Medium
    } else {
        CollisionSeverity::Heavy
    }
}

pub fn collision_damage(impact_speed: f32, with_environment: bool) -> f32 {
    let damage = impact_speed * determine_collision_severity(impact_speed).damage_factor();
    if with_environment {
        damage * ENVIRONMENT_DAMAGE_MULTIPLIER
    } else {
        damage
    }
}

/// Orient a contact so that `entity_a` satisfies `pick`.
fn oriented(contact: &ContactEvent, pick: impl Fn(&CollisionGroups) -> bool) -> ContactEvent {
    if pick(&contact.groups_a) {
        contact.clone()
    } else {
        contact.flipped()
    }
}

#[derive(Debug, Default)]
pub struct CollisionSystem;

impl CollisionSystem {
    pub fn update(
        &mut self,
        store: &mut EntityStore,
        contacts: &[ContactEvent],
        friendly_fire: bool,
        events: &mut EventQueue,
    ) -> SimResult<()> {
        for contact in contacts {
            if !store.contains(&contact.entity_a) || !store.contains(&contact.entity_b) {
                log::debug!(
                    "contact {} / {} refers to a removed entity",
                    contact.entity_a,
                    contact.entity_b
                );
                continue;
            }
            match classify_collision(&contact.groups_a, &contact.groups_b) {
                CollisionType::VehicleEnvironment => {
                    let contact = oriented(contact, CollisionGroups::is_vehicle);
                    let speed = contact.relative_speed;
                    self.crash(store, &contact.entity_a, &contact.entity_b, speed, true, events);
                }
                CollisionType::VehicleVehicle => {
                    if !friendly_fire && same_team(store, &contact.entity_a, &contact.entity_b) {
                        continue;
                    }
                    let speed = contact.relative_speed;
                    self.crash(store, &contact.entity_a, &contact.entity_b, speed, false, events);
                    self.crash(store, &contact.entity_b, &contact.entity_a, speed, false, events);
                }
                CollisionType::VehicleProjectile | CollisionType::ProjectileEnvironment => {
                    let contact =
                        oriented(contact, |groups| groups.contains(CollisionGroup::Projectiles));
                    record_impact(store, &contact);
                }
                CollisionType::VehicleFlag => {
                    let contact = oriented(contact, |groups| groups.contains(CollisionGroup::Flags));
                    match flags::try_pickup(store, &contact.entity_a, &contact.entity_b) {
                        Ok(true) => events.push(GameEvent::FlagPickedUp {
                            flag: contact.entity_a.clone(),
                            carrier: contact.entity_b.clone(),
                        }),
                        Ok(false) => {}
                        Err(err) => log::warn!("flag contact skipped: {err}"),
                    }
                }
                CollisionType::Other => {}
            }
        }
        Ok(())
    }

    fn crash(
        &self,
        store: &EntityStore,
        vehicle: &str,
        other: &str,
        impact_speed: f32,
        with_environment: bool,
        events: &mut EventQueue,
    ) {
        if store.has::<Destroyed>(vehicle) {
            return;
        }
        let mut status = match store.get_mut::<GameStatus>(vehicle) {
            Ok(status) => status,
            Err(err) => {
                log::debug!("collision: {err}");
                return;
            }
        };
        if status.is_dead() {
            return;
        }
        let damage = collision_damage(impact_speed, with_environment);
        status.take_damage(damage);
        events.push(GameEvent::Crash {
            vehicle: vehicle.to_string(),
            other: other.to_string(),
            severity: determine_collision_severity(impact_speed),
            damage,
        });
    }
}

fn same_team(store: &EntityStore, a: &str, b: &str) -> bool {
    match (store.get::<GameStatus>(a), store.get::<GameStatus>(b)) {
        (Ok(a), Ok(b)) => a.team == b.team,
        _ => false,
    }
}

/// Store the first impact on the projectile in `entity_a`.
fn record_impact(store: &EntityStore, contact: &ContactEvent) {
    let mut projectile = match store.get_mut::<Projectile>(&contact.entity_a) {
        Ok(projectile) => projectile,
        Err(err) => {
            log::debug!("collision: {err}");
            return;
        }
    };
    if projectile.impact.is_some() || projectile.source_id == contact.entity_b {
        return;
    }
    projectile.impact = Some(Impact {
        position: contact.point,
        normal: contact.normal,
        target_id: contact.entity_b.clone(),
        target_kind: store
            .kind_of(&contact.entity_b)
            .unwrap_or(EntityKind::Environment),
    });
}

#[cfg(test)]
mod tests {
    use super::*;
    use engine_core::{Team, Transform, Vec3};
    use physics::BackendKind;
    use physics::PhysicsWorld;

    use crate::projectiles::{spawn_projectile, ProjectileSpawn};
    use crate::weapons::ProjectileKind;

    fn contact(a: &str, ga: CollisionGroups, b: &str, gb: CollisionGroups, speed: f32) -> ContactEvent {
        ContactEvent {
            entity_a: a.to_string(),
            entity_b: b.to_string(),
            groups_a: ga,
            groups_b: gb,
            point: Vec3::new(0.0, 1.0, 0.0),
            normal: Vec3::Y,
            relative_speed: speed,
        }
    }

    fn vehicle(store: &mut EntityStore, id: &str, team: Team) {
        store
            .spawn(
                id,
                EntityKind::Vehicle,
                (Transform::default(), GameStatus::new(team, 100.0)),
            )
            .unwrap();
    }

    fn health(store: &EntityStore, id: &str) -> f32 {
        store.get::<GameStatus>(id).unwrap().health
    }

    #[test]
    fn severity_boundaries() {
        assert_eq!(determine_collision_severity(4.0), CollisionSeverity::Light);
        assert_eq!(determine_collision_severity(10.0), CollisionSeverity::Medium);
        assert_eq!(determine_collision_severity(15.0), CollisionSeverity::Heavy);
    }

    #[test]
    fn environment_crashes_hurt_more() {
        assert!((collision_damage(4.0, false) - 0.2).abs() < 1e-6);
        assert!((collision_damage(4.0, true) - 0.3).abs() < 1e-6);
        assert!((collision_damage(20.0, false) - 4.0).abs() < 1e-6);
    }

    #[test]
    fn classification_priority() {
        let env = CollisionGroup::environment();
        let drone = CollisionGroup::drone();
        let plane = CollisionGroup::plane();
        let shot = CollisionGroup::projectile();
        let flag = CollisionGroup::flag();
        assert_eq!(classify_collision(&drone, &env), CollisionType::VehicleEnvironment);
        assert_eq!(classify_collision(&env, &shot), CollisionType::ProjectileEnvironment);
        assert_eq!(classify_collision(&drone, &plane), CollisionType::VehicleVehicle);
        assert_eq!(classify_collision(&shot, &plane), CollisionType::VehicleProjectile);
        assert_eq!(classify_collision(&flag, &drone), CollisionType::VehicleFlag);
        assert_eq!(classify_collision(&flag, &shot), CollisionType::Other);
    }

    #[test]
    fn ground_crash_damages_vehicle() {
        let mut store = EntityStore::new();
        vehicle(&mut store, "red", Team::Red);
        store
            .spawn("ground", EntityKind::Environment, ())
            .unwrap();
        let contacts = [contact(
            "ground",
            CollisionGroup::environment(),
            "red",
            CollisionGroup::drone(),
            20.0,
        )];
        let mut events = EventQueue::default();
        CollisionSystem
            .update(&mut store, &contacts, false, &mut events)
            .unwrap();
        assert!((health(&store, "red") - 94.0).abs() < 1e-4);
        assert_eq!(events.len(), 1);
    }

    #[test]
    fn teammates_ram_without_damage() {
        let mut store = EntityStore::new();
        vehicle(&mut store, "a", Team::Red);
        vehicle(&mut store, "b", Team::Red);
        vehicle(&mut store, "c", Team::Blue);
        let contacts = [
            contact("a", CollisionGroup::drone(), "b", CollisionGroup::plane(), 20.0),
            contact("a", CollisionGroup::drone(), "c", CollisionGroup::drone(), 20.0),
        ];
        CollisionSystem
            .update(&mut store, &contacts, false, &mut EventQueue::default())
            .unwrap();
        assert_eq!(health(&store, "b"), 100.0);
        assert_eq!(health(&store, "a"), 96.0);
        assert_eq!(health(&store, "c"), 96.0);
    }

    #[test]
    fn flag_contact_hands_the_flag_to_one_enemy() {
        let mut store = EntityStore::new();
        vehicle(&mut store, "red-1", Team::Red);
        vehicle(&mut store, "red-2", Team::Red);
        vehicle(&mut store, "blue-1", Team::Blue);
        store
            .spawn(
                "flag-blue",
                EntityKind::Flag,
                (Transform::default(), GameStatus::flag(Team::Blue)),
            )
            .unwrap();

        let flag = CollisionGroup::flag();
        let contacts = [
            contact("blue-1", CollisionGroup::drone(), "flag-blue", flag, 1.0),
            contact("red-1", CollisionGroup::drone(), "flag-blue", flag, 1.0),
            contact("flag-blue", flag, "red-2", CollisionGroup::plane(), 1.0),
        ];
        let mut events = EventQueue::default();
        CollisionSystem
            .update(&mut store, &contacts, false, &mut events)
            .unwrap();

        let status = store.get::<GameStatus>("flag-blue").unwrap();
        assert_eq!(status.carried_by.as_deref(), Some("red-1"));
        assert!(!status.at_base);
        assert!(store.get::<GameStatus>("red-1").unwrap().has_flag);
        assert!(!store.get::<GameStatus>("red-2").unwrap().has_flag);
        assert_eq!(events.len(), 1);
        assert!(matches!(
            events.iter().next().unwrap(),
            GameEvent::FlagPickedUp { carrier, .. } if carrier == "red-1"
        ));
    }

    #[test]
    fn contacts_with_removed_entities_are_dropped() {
        let mut store = EntityStore::new();
        vehicle(&mut store, "red", Team::Red);
        vehicle(&mut store, "gone", Team::Blue);
        store.despawn("gone");
        let contacts = [
            contact("red", CollisionGroup::drone(), "gone", CollisionGroup::drone(), 30.0),
            contact("ghost", CollisionGroup::environment(), "red", CollisionGroup::drone(), 30.0),
        ];
        let mut events = EventQueue::default();
        CollisionSystem
            .update(&mut store, &contacts, false, &mut events)
            .unwrap();
        assert_eq!(health(&store, "red"), 100.0);
        assert!(events.is_empty());
    }

    #[test]
    fn first_impact_wins_and_source_is_ignored() {
        let mut store = EntityStore::new();
        let mut physics = PhysicsWorld::new(BackendKind::Simple.create());
        vehicle(&mut store, "red", Team::Red);
        vehicle(&mut store, "blue", Team::Blue);
        store
            .spawn("ground", EntityKind::Environment, ())
            .unwrap();
        spawn_projectile(
            &mut store,
            &mut physics,
            ProjectileSpawn {
                id: "p".into(),
                kind: ProjectileKind::Bullet,
                source: "red".into(),
                team: Some(Team::Red),
                damage: 10.0,
                range: 100.0,
                position: Vec3::ZERO,
                velocity: Vec3::NEG_Z,
                tick: 0,
                timestamp: 0,
            },
        )
        .unwrap();

        let shot = CollisionGroup::projectile();
        let contacts = [
            contact("red", CollisionGroup::drone(), "p", shot, 50.0),
            contact("p", shot, "blue", CollisionGroup::drone(), 50.0),
            contact("ground", CollisionGroup::environment(), "p", shot, 50.0),
        ];
        CollisionSystem
            .update(&mut store, &contacts, false, &mut EventQueue::default())
            .unwrap();

        let projectile = store.get::<Projectile>("p").unwrap();
        let impact = projectile.impact.as_ref().unwrap();
        assert_eq!(impact.target_id, "blue");
        assert_eq!(impact.target_kind, EntityKind::Vehicle);
        assert_eq!(health(&store, "blue"), 100.0);
    }
}
