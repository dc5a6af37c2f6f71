//! Rapier3D implementation of [`PhysicsBackend`].

use std::collections::HashMap;
use std::sync::Mutex;

use glam::{Quat, Vec3};
use rapier3d::na::{Isometry3, Point3, Quaternion, Translation3, UnitQuaternion};
use rapier3d::prelude::*;

use crate::backend::{BodyDesc, BodyHandle, BodyKind, BodyState, ColliderShape, PhysicsBackend, RawContact};

/// Collision-start events captured during one pipeline step.
#[derive(Default)]
struct ContactCollector {
    started: Mutex<Vec<PendingContact>>,
}

struct PendingContact {
    collider1: ColliderHandle,
    collider2: ColliderHandle,
    point: Option<Vec3>,
    normal: Option<Vec3>,
}

impl EventHandler for ContactCollector {
    fn handle_collision_event(
        &self,
        _bodies: &RigidBodySet,
        colliders: &ColliderSet,
        event: CollisionEvent,
        contact_pair: Option<&ContactPair>,
    ) {
        let CollisionEvent::Started(collider1, collider2, _) = event else {
            return;
        };

        let mut point = None;
        let mut normal = None;
        if let Some(pair) = contact_pair {
            if let Some((manifold, contact)) = pair.find_deepest_contact() {
                // Manifold normal points away from the pair's first collider.
                let flip = if pair.collider1 == collider1 { 1.0 } else { -1.0 };
                let n = manifold.data.normal;
                normal = Some(Vec3::new(n.x, n.y, n.z) * flip);
                if let Some(first) = colliders.get(pair.collider1) {
                    let p = first.position() * contact.local_p1;
                    point = Some(Vec3::new(p.x, p.y, p.z));
                }
            }
        }

        if let Ok(mut started) = self.started.lock() {
            started.push(PendingContact {
                collider1,
                collider2,
                point,
                normal,
            });
        }
    }

    fn handle_contact_force_event(
        &self,
        _dt: Real,
        _bodies: &RigidBodySet,
        _colliders: &ColliderSet,
        _contact_pair: &ContactPair,
        _total_force_magnitude: Real,
    ) {
    }
}

struct RapierBody {
    rigid_body: RigidBodyHandle,
    kind: BodyKind,
}

/// Production backend backed by a full Rapier pipeline.
pub struct RapierBackend {
    rigid_body_set: RigidBodySet,
    collider_set: ColliderSet,
    gravity: Vector<Real>,
    integration_parameters: IntegrationParameters,
    physics_pipeline: PhysicsPipeline,
    island_manager: IslandManager,
    broad_phase: DefaultBroadPhase,
    narrow_phase: NarrowPhase,
    impulse_joint_set: ImpulseJointSet,
    multibody_joint_set: MultibodyJointSet,
    ccd_solver: CCDSolver,
    collector: ContactCollector,
    bodies: HashMap<BodyHandle, RapierBody>,
    collider_owner: HashMap<ColliderHandle, BodyHandle>,
    next_handle: u64,
}

impl Default for RapierBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl RapierBackend {
    pub fn new() -> Self {
        Self {
            rigid_body_set: RigidBodySet::new(),
            collider_set: ColliderSet::new(),
            gravity: vector![0.0, -9.81, 0.0],
            integration_parameters: IntegrationParameters::default(),
            physics_pipeline: PhysicsPipeline::new(),
            island_manager: IslandManager::new(),
            broad_phase: DefaultBroadPhase::new(),
            narrow_phase: NarrowPhase::new(),
            impulse_joint_set: ImpulseJointSet::new(),
            multibody_joint_set: MultibodyJointSet::new(),
            ccd_solver: CCDSolver::new(),
            collector: ContactCollector::default(),
            bodies: HashMap::new(),
            collider_owner: HashMap::new(),
            next_handle: 1,
        }
    }

    fn collider_builder(shape: &ColliderShape) -> ColliderBuilder {
        match shape {
            ColliderShape::Ball { radius } => ColliderBuilder::ball(*radius),
            ColliderShape::Cuboid { half_extents } => {
                ColliderBuilder::cuboid(half_extents.x, half_extents.y, half_extents.z)
            }
            ColliderShape::ConvexHull { points } => {
                let hull: Vec<Point3<Real>> =
                    points.iter().map(|p| Point3::new(p.x, p.y, p.z)).collect();
                ColliderBuilder::convex_hull(&hull).unwrap_or_else(|| {
                    // Degenerate hull (flat or too few points): fall back to its bounding box.
                    log::warn!("convex hull of {} points is degenerate, using AABB", points.len());
                    let (min, max) = bounds(points);
                    let half = ((max - min) * 0.5).max(Vec3::splat(0.01));
                    let center = (min + max) * 0.5;
                    ColliderBuilder::cuboid(half.x, half.y, half.z)
                        .translation(vector![center.x, center.y, center.z])
                })
            }
            ColliderShape::GroundPlane => ColliderBuilder::halfspace(Vector::y_axis()),
        }
    }
}

fn bounds(points: &[Vec3]) -> (Vec3, Vec3) {
    if points.is_empty() {
        return (Vec3::ZERO, Vec3::ZERO);
    }
    points.iter().fold(
        (Vec3::splat(f32::MAX), Vec3::splat(f32::MIN)),
        |(min, max), p| (min.min(*p), max.max(*p)),
    )
}

fn isometry(position: Vec3, rotation: Quat) -> Isometry3<Real> {
    Isometry3::from_parts(
        Translation3::new(position.x, position.y, position.z),
        UnitQuaternion::from_quaternion(Quaternion::new(
            rotation.w, rotation.x, rotation.y, rotation.z,
        )),
    )
}

impl PhysicsBackend for RapierBackend {
    fn name(&self) -> &'static str {
        "rapier"
    }

    fn insert(&mut self, desc: &BodyDesc) -> BodyHandle {
        let builder = match desc.kind {
            BodyKind::Dynamic => RigidBodyBuilder::dynamic(),
            BodyKind::KinematicPositionBased => RigidBodyBuilder::kinematic_position_based(),
            BodyKind::Fixed => RigidBodyBuilder::fixed(),
        };
        let v = desc.linear_velocity;
        let rigid_body = builder
            .position(isometry(desc.position, desc.rotation))
            .linvel(vector![v.x, v.y, v.z])
            .linear_damping(desc.linear_damping)
            .angular_damping(desc.angular_damping)
            .gravity_scale(desc.gravity_scale)
            .ccd_enabled(desc.ccd)
            .build();
        let rigid_body = self.rigid_body_set.insert(rigid_body);

        let collider = Self::collider_builder(&desc.shape)
            .sensor(desc.sensor)
            .mass(desc.mass)
            .collision_groups(desc.groups.to_interaction_groups())
            .active_events(ActiveEvents::COLLISION_EVENTS)
            .build();
        let collider =
            self.collider_set
                .insert_with_parent(collider, rigid_body, &mut self.rigid_body_set);

        let handle = BodyHandle(self.next_handle);
        self.next_handle += 1;
        self.bodies.insert(
            handle,
            RapierBody {
                rigid_body,
                kind: desc.kind,
            },
        );
        self.collider_owner.insert(collider, handle);
        handle
    }

    fn remove(&mut self, handle: BodyHandle) -> bool {
        let Some(body) = self.bodies.remove(&handle) else {
            return false;
        };
        self.collider_owner.retain(|_, owner| *owner != handle);
        self.rigid_body_set.remove(
            body.rigid_body,
            &mut self.island_manager,
            &mut self.collider_set,
            &mut self.impulse_joint_set,
            &mut self.multibody_joint_set,
            true,
        );
        true
    }

    fn contains(&self, handle: BodyHandle) -> bool {
        self.bodies.contains_key(&handle)
    }

    fn state(&self, handle: BodyHandle) -> Option<BodyState> {
        let body = self.bodies.get(&handle)?;
        let rb = self.rigid_body_set.get(body.rigid_body)?;
        let pos = rb.translation();
        let rot = rb.rotation();
        let lin = rb.linvel();
        let ang = rb.angvel();
        Some(BodyState {
            position: Vec3::new(pos.x, pos.y, pos.z),
            rotation: Quat::from_xyzw(rot.i, rot.j, rot.k, rot.w),
            linear_velocity: Vec3::new(lin.x, lin.y, lin.z),
            angular_velocity: Vec3::new(ang.x, ang.y, ang.z),
        })
    }

    fn set_state(&mut self, handle: BodyHandle, state: &BodyState) {
        let Some(body) = self.bodies.get(&handle) else {
            return;
        };
        let Some(rb) = self.rigid_body_set.get_mut(body.rigid_body) else {
            return;
        };
        let iso = isometry(state.position, state.rotation);
        match body.kind {
            BodyKind::KinematicPositionBased => rb.set_next_kinematic_position(iso),
            BodyKind::Fixed => rb.set_position(iso, true),
            BodyKind::Dynamic => {
                let lin = state.linear_velocity;
                let ang = state.angular_velocity;
                rb.set_position(iso, true);
                rb.set_linvel(vector![lin.x, lin.y, lin.z], true);
                rb.set_angvel(vector![ang.x, ang.y, ang.z], true);
            }
        }
    }

    fn set_gravity(&mut self, gravity: Vec3) {
        self.gravity = vector![gravity.x, gravity.y, gravity.z];
    }

    fn step(&mut self, dt: f32, contacts: &mut Vec<RawContact>) {
        self.integration_parameters.dt = dt;
        self.physics_pipeline.step(
            &self.gravity,
            &self.integration_parameters,
            &mut self.island_manager,
            &mut self.broad_phase,
            &mut self.narrow_phase,
            &mut self.rigid_body_set,
            &mut self.collider_set,
            &mut self.impulse_joint_set,
            &mut self.multibody_joint_set,
            &mut self.ccd_solver,
            None,
            &(),
            &self.collector,
        );

        let started = match self.collector.started.lock() {
            Ok(mut started) => std::mem::take(&mut *started),
            Err(_) => return,
        };
        for pending in started {
            let (Some(&a), Some(&b)) = (
                self.collider_owner.get(&pending.collider1),
                self.collider_owner.get(&pending.collider2),
            ) else {
                continue;
            };
            let state_a = self.state(a).unwrap_or_default();
            let state_b = self.state(b).unwrap_or_default();
            // Sensors report no manifold; fall back to the centre line.
            let normal = pending
                .normal
                .unwrap_or_else(|| (state_b.position - state_a.position).normalize_or_zero());
            let point = pending
                .point
                .unwrap_or((state_a.position + state_b.position) * 0.5);
            contacts.push(RawContact {
                a,
                b,
                point,
                normal,
            });
        }
    }

    fn body_count(&self) -> usize {
        self.bodies.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::collision::CollisionGroup;

    #[test]
    fn ball_falls_onto_ground_and_reports_contact() {
        let mut backend = RapierBackend::new();
        backend.insert(&BodyDesc::new(
            BodyKind::Fixed,
            ColliderShape::GroundPlane,
            CollisionGroup::environment(),
        ));
        let ball = backend.insert(
            &BodyDesc::new(
                BodyKind::Dynamic,
                ColliderShape::Ball { radius: 0.5 },
                CollisionGroup::drone(),
            )
            .at(Vec3::new(0.0, 2.0, 0.0), Quat::IDENTITY),
        );

        let mut contacts = Vec::new();
        for _ in 0..120 {
            backend.step(1.0 / 60.0, &mut contacts);
        }
        let state = backend.state(ball).unwrap();
        assert!(state.position.y < 2.0);
        assert!(state.position.y > 0.0);
        assert!(contacts.iter().any(|c| c.a == ball || c.b == ball));
    }

    #[test]
    fn removed_bodies_are_forgotten() {
        let mut backend = RapierBackend::new();
        let ball = backend.insert(&BodyDesc::new(
            BodyKind::Dynamic,
            ColliderShape::Ball { radius: 0.5 },
            CollisionGroup::drone(),
        ));
        assert!(backend.remove(ball));
        assert!(!backend.contains(ball));
        assert!(!backend.remove(ball));
        assert_eq!(backend.body_count(), 0);
    }
}
