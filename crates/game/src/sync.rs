//! Server-side state publication in the network schema.
//!
//! [`StateSync`] keeps one persistent [`NetworkEntity`] per replicated entity
//! and refreshes it from the store every tick, reporting which ids appeared
//! or vanished since the previous publish.

use std::collections::BTreeMap;

use engine_core::{
    EntityKind, EntityStore, EntityTag, GameStatus, Quat, Team, TickState, Transform, Vec3,
    VehicleKind,
};
use serde::{Deserialize, Serialize};

use crate::events::GameEvent;
use crate::flags::TeamScores;
use crate::projectiles::Projectile;
use crate::vehicle::Vehicle;
use crate::weapons::{ProjectileKind, Weapon};

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct NetVec3 {
    pub x: f32,
    pub y: f32,
    pub z: f32,
}

impl From<Vec3> for NetVec3 {
    fn from(v: Vec3) -> Self {
        Self {
            x: v.x,
            y: v.y,
            z: v.z,
        }
    }
}

impl From<NetVec3> for Vec3 {
    fn from(v: NetVec3) -> Self {
        Vec3::new(v.x, v.y, v.z)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct NetQuat {
    pub x: f32,
    pub y: f32,
    pub z: f32,
    pub w: f32,
}

impl Default for NetQuat {
    fn default() -> Self {
        Quat::IDENTITY.into()
    }
}

impl From<Quat> for NetQuat {
    fn from(q: Quat) -> Self {
        Self {
            x: q.x,
            y: q.y,
            z: q.z,
            w: q.w,
        }
    }
}

impl From<NetQuat> for Quat {
    fn from(q: NetQuat) -> Self {
        Quat::from_xyzw(q.x, q.y, q.z, q.w).normalize()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NetworkWeapon {
    pub id: String,
    pub name: String,
    pub projectile_type: ProjectileKind,
    pub damage: f32,
    pub min_fire_rate: f32,
    pub max_fire_rate: f32,
    pub heat_per_shot: f32,
    pub heat_dissipation_rate: f32,
    pub heat_accumulator: f32,
    pub is_on_cooldown: bool,
    pub projectile_speed: f32,
    pub range: f32,
}

impl From<&Weapon> for NetworkWeapon {
    fn from(weapon: &Weapon) -> Self {
        Self {
            id: weapon.id.clone(),
            name: weapon.name.clone(),
            projectile_type: weapon.projectile_kind,
            damage: weapon.damage,
            min_fire_rate: weapon.min_fire_rate,
            max_fire_rate: weapon.max_fire_rate,
            heat_per_shot: weapon.heat_per_shot,
            heat_dissipation_rate: weapon.heat_dissipation_rate,
            heat_accumulator: weapon.heat_accumulator,
            is_on_cooldown: weapon.is_on_cooldown,
            projectile_speed: weapon.projectile_speed,
            range: weapon.range,
        }
    }
}

/// One replicated entity. Fields that do not apply to its kind stay empty.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NetworkEntity {
    pub id: String,
    #[serde(rename = "type")]
    pub kind: EntityKind,
    pub team: Option<Team>,
    pub position: NetVec3,
    pub quaternion: NetQuat,
    pub linear_velocity: NetVec3,
    pub angular_velocity: NetVec3,
    pub health: Option<f32>,
    pub max_health: Option<f32>,
    pub has_flag: bool,
    pub carried_by: Option<String>,
    pub at_base: bool,
    pub vehicle_type: Option<VehicleKind>,
    pub weapons: Vec<NetworkWeapon>,
    pub active_weapon_index: Option<usize>,
    pub projectile_type: Option<ProjectileKind>,
    pub damage: Option<f32>,
    pub range: Option<f32>,
    pub distance_traveled: Option<f32>,
    pub source_id: Option<String>,
    pub tick: u64,
    pub timestamp: u64,
    pub last_processed_input_tick: Option<u64>,
    pub last_processed_input_timestamp: Option<u64>,
}

impl NetworkEntity {
    pub fn new(id: &str, kind: EntityKind) -> Self {
        Self {
            id: id.to_string(),
            kind,
            team: None,
            position: NetVec3::default(),
            quaternion: NetQuat::default(),
            linear_velocity: NetVec3::default(),
            angular_velocity: NetVec3::default(),
            health: None,
            max_health: None,
            has_flag: false,
            carried_by: None,
            at_base: false,
            vehicle_type: None,
            weapons: Vec::new(),
            active_weapon_index: None,
            projectile_type: None,
            damage: None,
            range: None,
            distance_traveled: None,
            source_id: None,
            tick: 0,
            timestamp: 0,
            last_processed_input_tick: None,
            last_processed_input_timestamp: None,
        }
    }

    pub fn transform(&self) -> Transform {
        Transform {
            position: self.position.into(),
            rotation: self.quaternion.into(),
            linear_velocity: self.linear_velocity.into(),
            angular_velocity: self.angular_velocity.into(),
        }
    }

    fn set_transform(&mut self, transform: &Transform) {
        self.position = transform.position.into();
        self.quaternion = transform.rotation.into();
        self.linear_velocity = transform.linear_velocity.into();
        self.angular_velocity = transform.angular_velocity.into();
    }

    fn set_status(&mut self, status: &GameStatus) {
        self.team = Some(status.team);
        self.has_flag = status.has_flag;
        self.carried_by = status.carried_by.clone();
        self.at_base = status.at_base;
        if self.kind == EntityKind::Vehicle {
            self.health = Some(status.health);
            self.max_health = Some(status.max_health);
        }
    }

    fn set_vehicle(&mut self, vehicle: &Vehicle) {
        self.vehicle_type = Some(vehicle.kind);
        self.weapons = vehicle.weapons.iter().map(NetworkWeapon::from).collect();
        self.active_weapon_index = Some(vehicle.active_weapon);
    }

    fn set_projectile(&mut self, projectile: &Projectile) {
        self.team = projectile.team;
        self.projectile_type = Some(projectile.kind);
        self.damage = Some(projectile.damage);
        self.range = Some(projectile.range);
        self.distance_traveled = Some(projectile.distance_traveled);
        self.source_id = Some(projectile.source_id.clone());
    }

    fn set_tick(&mut self, tick: &TickState) {
        self.tick = tick.tick;
        self.timestamp = tick.timestamp;
        self.last_processed_input_tick = tick.last_processed_input_tick;
        self.last_processed_input_timestamp = tick.last_processed_input_timestamp;
    }
}

/// Ids that entered or left the replicated set in one publish.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SyncDelta {
    pub added: Vec<String>,
    pub removed: Vec<String>,
}

#[derive(Debug, Default)]
pub struct StateSync {
    entities: BTreeMap<String, NetworkEntity>,
}

impl StateSync {
    /// Refresh the schema from the store. Static environment is not replicated.
    pub fn publish(&mut self, store: &EntityStore) -> SyncDelta {
        let mut delta = SyncDelta::default();
        let mut live = Vec::new();

        for (_, (tag, transform, status, vehicle, projectile, tick)) in store
            .world()
            .query::<(
                &EntityTag,
                &Transform,
                Option<&GameStatus>,
                Option<&Vehicle>,
                Option<&Projectile>,
                Option<&TickState>,
            )>()
            .iter()
        {
            if tag.kind == EntityKind::Environment {
                continue;
            }
            let entity = self.entities.entry(tag.id.clone()).or_insert_with(|| {
                delta.added.push(tag.id.clone());
                NetworkEntity::new(&tag.id, tag.kind)
            });
            entity.set_transform(transform);
            if let Some(status) = status {
                entity.set_status(status);
            }
            if let Some(vehicle) = vehicle {
                entity.set_vehicle(vehicle);
            }
            if let Some(projectile) = projectile {
                entity.set_projectile(projectile);
            }
            if let Some(tick) = tick {
                entity.set_tick(tick);
            }
            live.push(tag.id.clone());
        }

        live.sort();
        self.entities.retain(|id, _| {
            let keep = live.binary_search(id).is_ok();
            if !keep {
                delta.removed.push(id.clone());
            }
            keep
        });
        delta.added.sort();
        delta
    }

    pub fn get(&self, id: &str) -> Option<&NetworkEntity> {
        self.entities.get(id)
    }

    /// All replicated entities in id order.
    pub fn entities(&self) -> impl Iterator<Item = &NetworkEntity> {
        self.entities.values()
    }

    pub fn len(&self) -> usize {
        self.entities.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entities.is_empty()
    }
}

/// Everything a client needs after one server tick.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WorldSnapshot {
    pub tick: u64,
    pub timestamp: u64,
    pub entities: Vec<NetworkEntity>,
    pub events: Vec<GameEvent>,
    pub scores: TeamScores,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tuning;

    fn store_with_vehicle() -> EntityStore {
        let mut store = EntityStore::new();
        let kind = VehicleKind::Plane;
        store
            .spawn(
                "pilot",
                EntityKind::Vehicle,
                (
                    Transform::from_position(Vec3::new(1.0, 2.0, 3.0)),
                    GameStatus::new(Team::Blue, 100.0),
                    Vehicle::new(kind, tuning::loadout(kind)),
                    TickState {
                        tick: 7,
                        timestamp: 116,
                        last_processed_input_tick: Some(6),
                        last_processed_input_timestamp: Some(1000),
                    },
                ),
            )
            .unwrap();
        store
            .spawn("ground", EntityKind::Environment, (Transform::default(),))
            .unwrap();
        store
    }

    #[test]
    fn publish_tracks_added_and_removed() {
        let mut store = store_with_vehicle();
        let mut sync = StateSync::default();

        let delta = sync.publish(&store);
        assert_eq!(delta.added, vec!["pilot".to_string()]);
        assert!(delta.removed.is_empty());
        assert_eq!(sync.len(), 1);

        store.get_mut::<Transform>("pilot").unwrap().position = Vec3::new(5.0, 5.0, 5.0);
        let delta = sync.publish(&store);
        assert_eq!(delta, SyncDelta::default());
        assert_eq!(sync.get("pilot").unwrap().position, NetVec3 { x: 5.0, y: 5.0, z: 5.0 });

        store.despawn("pilot");
        let delta = sync.publish(&store);
        assert_eq!(delta.removed, vec!["pilot".to_string()]);
        assert!(sync.is_empty());
    }

    #[test]
    fn schema_uses_wire_names() {
        let store = store_with_vehicle();
        let mut sync = StateSync::default();
        sync.publish(&store);
        let json = serde_json::to_value(sync.get("pilot").unwrap()).unwrap();

        assert_eq!(json["type"], "Vehicle");
        assert_eq!(json["team"], "Blue");
        assert_eq!(json["position"]["y"], 2.0);
        assert_eq!(json["quaternion"]["w"], 1.0);
        assert_eq!(json["maxHealth"], 100.0);
        assert_eq!(json["hasFlag"], false);
        assert_eq!(json["vehicleType"], "Plane");
        assert_eq!(json["activeWeaponIndex"], 0);
        assert_eq!(json["weapons"][1]["projectileType"], "Laser");
        assert_eq!(json["weapons"][0]["heatDissipationRate"], 0.4_f32 as f64);
        assert_eq!(json["lastProcessedInputTick"], 6);
        assert!(json["sourceId"].is_null());
    }

    #[test]
    fn network_entity_round_trips_transform() {
        let mut entity = NetworkEntity::new("x", EntityKind::Projectile);
        let mut transform = Transform::from_position(Vec3::new(3.0, -1.0, 9.0));
        transform.look_along(Vec3::new(1.0, 0.0, -1.0));
        transform.linear_velocity = Vec3::new(0.0, 4.0, 0.0);
        entity.set_transform(&transform);
        let back = entity.transform();
        assert_eq!(back.position, transform.position);
        assert!(back.rotation.angle_between(transform.rotation) < 1e-5);
        assert_eq!(back.linear_velocity, transform.linear_velocity);
    }
}
