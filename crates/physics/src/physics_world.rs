//! Physics world: the single owner of the rigid-body simulation.
//!
//! Bodies are registered under entity ids. Every other system reads and writes
//! bodies through this type, never through the backend directly.

use std::collections::{HashMap, HashSet};

use engine_core::{SimError, SimResult, Transform, VehicleKind};
use glam::{Quat, Vec3};
use serde::{Deserialize, Serialize};

use crate::backend::{BodyDesc, BodyHandle, BodyKind, BodyState, ColliderShape, PhysicsBackend, RawContact};
use crate::body::PhysicsTuning;
use crate::collision::{CollisionGroup, CollisionGroups};
use crate::rapier_backend::RapierBackend;
use crate::sphere_backend::SimpleBackend;

pub const DRONE_RADIUS: f32 = 1.0;
pub const PLANE_HALF_EXTENTS: Vec3 = Vec3::new(1.5, 0.5, 2.0);
pub const PROJECTILE_RADIUS: f32 = 0.2;
pub const PROJECTILE_MASS: f32 = 0.05;
pub const FLAG_SENSOR_RADIUS: f32 = 1.5;

/// Which engine a [`PhysicsWorld`] runs on.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum BackendKind {
    #[default]
    Rapier,
    Simple,
}

impl BackendKind {
    pub fn create(self) -> Box<dyn PhysicsBackend> {
        match self {
            BackendKind::Rapier => Box::new(RapierBackend::new()),
            BackendKind::Simple => Box::new(SimpleBackend::new()),
        }
    }
}

/// Static level geometry handed in by the host.
#[derive(Debug, Clone, PartialEq)]
pub struct EnvironmentMesh {
    pub position: Vec3,
    pub rotation: Quat,
    /// Local-space vertices; collision uses their convex hull.
    pub vertices: Vec<Vec3>,
}

/// A contact between two entities that began during the last step.
#[derive(Debug, Clone, PartialEq)]
pub struct ContactEvent {
    pub entity_a: String,
    pub entity_b: String,
    pub groups_a: CollisionGroups,
    pub groups_b: CollisionGroups,
    pub point: Vec3,
    /// Points from `entity_a` toward `entity_b`.
    pub normal: Vec3,
    /// Closing speed along the normal, from velocities before the step.
    pub relative_speed: f32,
}

impl ContactEvent {
    /// Swap sides so `entity_a` becomes `entity_b`.
    pub fn flipped(&self) -> Self {
        Self {
            entity_a: self.entity_b.clone(),
            entity_b: self.entity_a.clone(),
            groups_a: self.groups_b,
            groups_b: self.groups_a,
            point: self.point,
            normal: -self.normal,
            relative_speed: self.relative_speed,
        }
    }
}

struct BodyOwner {
    id: String,
    groups: CollisionGroups,
}

pub struct PhysicsWorld {
    backend: Box<dyn PhysicsBackend>,
    bodies: HashMap<String, BodyHandle>,
    owners: HashMap<BodyHandle, BodyOwner>,
    substeps: u32,
    max_step_dt: f32,
    contacts: Vec<ContactEvent>,
}

impl PhysicsWorld {
    pub fn new(backend: Box<dyn PhysicsBackend>) -> Self {
        log::debug!("physics world using {} backend", backend.name());
        Self {
            backend,
            bodies: HashMap::new(),
            owners: HashMap::new(),
            substeps: 1,
            max_step_dt: 0.1,
            contacts: Vec::new(),
        }
    }

    pub fn with_substeps(mut self, substeps: u32) -> Self {
        self.substeps = substeps.max(1);
        self
    }

    pub fn with_max_step_dt(mut self, max_step_dt: f32) -> Self {
        self.max_step_dt = max_step_dt;
        self
    }

    pub fn with_gravity(mut self, gravity: f32) -> Self {
        self.backend.set_gravity(Vec3::new(0.0, -gravity, 0.0));
        self
    }

    pub fn backend_name(&self) -> &'static str {
        self.backend.name()
    }

    /// Register a body for an entity id.
    pub fn add_body(&mut self, id: &str, desc: &BodyDesc) -> SimResult<BodyHandle> {
        if self.bodies.contains_key(id) {
            return Err(SimError::DuplicateEntity(id.to_string()));
        }
        let handle = self.backend.insert(desc);
        self.bodies.insert(id.to_string(), handle);
        self.owners.insert(
            handle,
            BodyOwner {
                id: id.to_string(),
                groups: desc.groups,
            },
        );
        Ok(handle)
    }

    /// Remove the entity's body. Returns false if it had none.
    pub fn remove_body(&mut self, id: &str) -> bool {
        let Some(handle) = self.bodies.remove(id) else {
            return false;
        };
        self.owners.remove(&handle);
        self.backend.remove(handle)
    }

    pub fn body_of(&self, id: &str) -> Option<BodyHandle> {
        self.bodies.get(id).copied()
    }

    pub fn has_body(&self, id: &str) -> bool {
        self.bodies.contains_key(id)
    }

    pub fn body_count(&self) -> usize {
        self.bodies.len()
    }

    pub fn create_vehicle_body(
        &mut self,
        id: &str,
        kind: VehicleKind,
        transform: &Transform,
        tuning: &PhysicsTuning,
    ) -> SimResult<BodyHandle> {
        let (shape, groups) = match kind {
            VehicleKind::Drone => (
                ColliderShape::Ball {
                    radius: DRONE_RADIUS,
                },
                CollisionGroup::drone(),
            ),
            VehicleKind::Plane => (
                ColliderShape::Cuboid {
                    half_extents: PLANE_HALF_EXTENTS,
                },
                CollisionGroup::plane(),
            ),
        };
        let mut desc = BodyDesc::new(BodyKind::Dynamic, shape, groups)
            .at(transform.position, transform.rotation);
        desc.linear_velocity = transform.linear_velocity;
        desc.mass = tuning.mass;
        desc.linear_damping = tuning.linear_drag;
        desc.angular_damping = tuning.angular_drag;
        desc.gravity_scale = tuning.gravity_scale;
        self.add_body(id, &desc)
    }

    pub fn create_projectile_body(
        &mut self,
        id: &str,
        position: Vec3,
        velocity: Vec3,
    ) -> SimResult<BodyHandle> {
        let mut desc = BodyDesc::new(
            BodyKind::Dynamic,
            ColliderShape::Ball {
                radius: PROJECTILE_RADIUS,
            },
            CollisionGroup::projectile(),
        )
        .at(position, Quat::IDENTITY);
        desc.linear_velocity = velocity;
        desc.mass = PROJECTILE_MASS;
        desc.gravity_scale = 0.0;
        desc.ccd = true;
        self.add_body(id, &desc)
    }

    /// Flags are kinematic sensors moved by writing their transform.
    pub fn create_flag_body(&mut self, id: &str, position: Vec3) -> SimResult<BodyHandle> {
        let mut desc = BodyDesc::new(
            BodyKind::KinematicPositionBased,
            ColliderShape::Ball {
                radius: FLAG_SENSOR_RADIUS,
            },
            CollisionGroup::flag(),
        )
        .at(position, Quat::IDENTITY);
        desc.sensor = true;
        desc.gravity_scale = 0.0;
        self.add_body(id, &desc)
    }

    /// One fixed environment body per mesh, registered as `{prefix}-{index}`.
    pub fn create_mesh_collider_bodies(
        &mut self,
        prefix: &str,
        meshes: &[EnvironmentMesh],
    ) -> SimResult<Vec<String>> {
        let mut ids = Vec::with_capacity(meshes.len());
        for (index, mesh) in meshes.iter().enumerate() {
            let id = format!("{prefix}-{index}");
            let desc = BodyDesc::new(
                BodyKind::Fixed,
                ColliderShape::ConvexHull {
                    points: mesh.vertices.clone(),
                },
                CollisionGroup::environment(),
            )
            .at(mesh.position, mesh.rotation);
            self.add_body(&id, &desc)?;
            ids.push(id);
        }
        Ok(ids)
    }

    /// Flat ground at y = 0.
    pub fn create_ground(&mut self, id: &str) -> SimResult<BodyHandle> {
        let desc = BodyDesc::new(
            BodyKind::Fixed,
            ColliderShape::GroundPlane,
            CollisionGroup::environment(),
        );
        self.add_body(id, &desc)
    }

    /// Advance the simulation. `dt` is capped and split into sub-steps.
    pub fn step(&mut self, dt: f32) {
        let dt = dt.min(self.max_step_dt);
        if dt <= 0.0 {
            return;
        }

        let velocities: HashMap<BodyHandle, Vec3> = self
            .owners
            .keys()
            .filter_map(|handle| {
                self.backend
                    .state(*handle)
                    .map(|state| (*handle, state.linear_velocity))
            })
            .collect();

        let sub_dt = dt / self.substeps as f32;
        let mut raw: Vec<RawContact> = Vec::new();
        for _ in 0..self.substeps {
            self.backend.step(sub_dt, &mut raw);
        }

        let mut seen: HashSet<(String, String)> = HashSet::new();
        for contact in raw {
            let (owner_a, owner_b) = match (self.owners.get(&contact.a), self.owners.get(&contact.b))
            {
                (Some(a), Some(b)) => (a, b),
                (None, _) | (_, None) => {
                    let missing = if self.owners.contains_key(&contact.a) {
                        contact.b
                    } else {
                        contact.a
                    };
                    log::debug!("{}", SimError::InvalidCollisionPair(missing.0));
                    continue;
                }
            };

            let key = if owner_a.id <= owner_b.id {
                (owner_a.id.clone(), owner_b.id.clone())
            } else {
                (owner_b.id.clone(), owner_a.id.clone())
            };
            if !seen.insert(key) {
                continue;
            }

            let velocity_a = velocities.get(&contact.a).copied().unwrap_or(Vec3::ZERO);
            let velocity_b = velocities.get(&contact.b).copied().unwrap_or(Vec3::ZERO);
            let relative_speed = if contact.normal.length_squared() > 0.0 {
                (velocity_a - velocity_b).dot(contact.normal).abs()
            } else {
                (velocity_a - velocity_b).length()
            };

            self.contacts.push(ContactEvent {
                entity_a: owner_a.id.clone(),
                entity_b: owner_b.id.clone(),
                groups_a: owner_a.groups,
                groups_b: owner_b.groups,
                point: contact.point,
                normal: contact.normal,
                relative_speed,
            });
        }
    }

    /// Take every contact produced since the last drain.
    pub fn drain_contacts(&mut self) -> Vec<ContactEvent> {
        std::mem::take(&mut self.contacts)
    }

    pub fn body_state(&self, id: &str) -> SimResult<BodyState> {
        let handle = self
            .body_of(id)
            .ok_or_else(|| SimError::MissingBody(id.to_string()))?;
        self.backend
            .state(handle)
            .ok_or_else(|| SimError::MissingBody(id.to_string()))
    }

    /// Copy the body's state into `transform`.
    pub fn pull_transform(&self, id: &str, transform: &mut Transform) -> SimResult<()> {
        let state = self.body_state(id)?;
        transform.position = state.position;
        transform.rotation = state.rotation;
        transform.linear_velocity = state.linear_velocity;
        transform.angular_velocity = state.angular_velocity;
        Ok(())
    }

    /// Write `transform` into the body.
    pub fn push_transform(&mut self, id: &str, transform: &Transform) -> SimResult<()> {
        let handle = self
            .body_of(id)
            .ok_or_else(|| SimError::MissingBody(id.to_string()))?;
        self.backend.set_state(
            handle,
            &BodyState {
                position: transform.position,
                rotation: transform.rotation,
                linear_velocity: transform.linear_velocity,
                angular_velocity: transform.angular_velocity,
            },
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn simple_world() -> PhysicsWorld {
        PhysicsWorld::new(BackendKind::Simple.create()).with_gravity(0.0)
    }

    #[test]
    fn duplicate_body_ids_are_rejected() {
        let mut world = simple_world();
        world.create_flag_body("flag-red", Vec3::ZERO).unwrap();
        let err = world.create_flag_body("flag-red", Vec3::ONE).unwrap_err();
        assert!(matches!(err, SimError::DuplicateEntity(_)));
        assert!(world.remove_body("flag-red"));
        assert!(!world.remove_body("flag-red"));
    }

    #[test]
    fn contacts_map_to_entities_once() {
        let mut world = simple_world();
        let tuning = PhysicsTuning::default();
        let mut left = Transform::from_position(Vec3::new(-1.02, 0.0, 0.0));
        left.linear_velocity = Vec3::new(6.0, 0.0, 0.0);
        let right = Transform::from_position(Vec3::new(1.02, 0.0, 0.0));
        world
            .create_vehicle_body("a", VehicleKind::Drone, &left, &tuning)
            .unwrap();
        world
            .create_vehicle_body("b", VehicleKind::Drone, &right, &tuning)
            .unwrap();

        world.step(1.0 / 60.0);
        let contacts = world.drain_contacts();
        assert_eq!(contacts.len(), 1);
        let contact = &contacts[0];
        assert_eq!(contact.entity_a, "a");
        assert_eq!(contact.entity_b, "b");
        assert!(contact.groups_a.contains(CollisionGroup::Drones));
        assert!((contact.relative_speed - 6.0).abs() < 1e-4);

        // Consumed exactly once.
        assert!(world.drain_contacts().is_empty());
    }

    #[test]
    fn contacts_with_unregistered_bodies_are_dropped() {
        let mut backend = SimpleBackend::new();
        backend.set_gravity(Vec3::ZERO);
        backend.insert(&BodyDesc::new(
            BodyKind::Dynamic,
            ColliderShape::Ball { radius: 1.0 },
            CollisionGroup::drone(),
        ));
        let mut world = PhysicsWorld::new(Box::new(backend));
        let overlapping = Transform::from_position(Vec3::new(0.5, 0.0, 0.0));
        world
            .create_vehicle_body("a", VehicleKind::Drone, &overlapping, &PhysicsTuning::default())
            .unwrap();

        world.step(1.0 / 60.0);
        assert!(world.drain_contacts().is_empty());
    }

    #[test]
    fn step_is_capped_and_split() {
        let mut world = simple_world().with_substeps(4).with_max_step_dt(0.05);
        let mut t = Transform::from_position(Vec3::ZERO);
        t.linear_velocity = Vec3::new(10.0, 0.0, 0.0);
        world
            .create_projectile_body("p", t.position, t.linear_velocity)
            .unwrap();
        world.step(1.0);
        world.pull_transform("p", &mut t).unwrap();
        assert!((t.position.x - 0.5).abs() < 1e-4);
    }

    #[test]
    fn push_then_pull_round_trips() {
        let mut world = simple_world();
        let tuning = PhysicsTuning::default();
        let mut t = Transform::from_position(Vec3::new(0.0, 5.0, 0.0));
        world
            .create_vehicle_body("d", VehicleKind::Drone, &t, &tuning)
            .unwrap();
        t.position = Vec3::new(3.0, 4.0, 5.0);
        t.linear_velocity = Vec3::Y;
        world.push_transform("d", &t).unwrap();
        let mut pulled = Transform::default();
        world.pull_transform("d", &mut pulled).unwrap();
        assert_eq!(pulled, t);
        assert!(matches!(
            world.pull_transform("nobody", &mut pulled),
            Err(SimError::MissingBody(_))
        ));
    }

    #[test]
    fn mesh_colliders_register_each_mesh() {
        let mut world = simple_world();
        let mut cube = Vec::new();
        for x in [-1.0, 1.0] {
            for y in [-1.0, 1.0] {
                for z in [-1.0, 1.0] {
                    cube.push(Vec3::new(x, y, z));
                }
            }
        }
        let mesh = EnvironmentMesh {
            position: Vec3::new(0.0, 1.0, 0.0),
            rotation: Quat::IDENTITY,
            vertices: cube,
        };
        let ids = world
            .create_mesh_collider_bodies("rock", &[mesh.clone(), mesh])
            .unwrap();
        assert_eq!(ids, vec!["rock-0", "rock-1"]);
        assert_eq!(world.body_count(), 2);
    }
}
