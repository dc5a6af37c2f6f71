//! Lightweight deterministic backend: spheres, axis-aligned boxes and a ground plane.
//!
//! Rotations are integrated but shapes ignore them; boxes stay axis aligned.
//! Good enough for headless tests and client-side prediction where
//! reproducibility matters more than contact fidelity.

use std::collections::{BTreeMap, BTreeSet};

use glam::{Quat, Vec3};

use crate::backend::{BodyDesc, BodyHandle, BodyKind, BodyState, ColliderShape, PhysicsBackend, RawContact};

/// Semi-implicit Euler step shared with client prediction.
///
/// Damping follows the `1 / (1 + dt * d)` form used by Rapier.
pub fn integrate(
    state: &mut BodyState,
    gravity: Vec3,
    gravity_scale: f32,
    linear_damping: f32,
    angular_damping: f32,
    dt: f32,
) {
    state.linear_velocity += gravity * gravity_scale * dt;
    state.linear_velocity *= 1.0 / (1.0 + dt * linear_damping);
    state.angular_velocity *= 1.0 / (1.0 + dt * angular_damping);
    state.position += state.linear_velocity * dt;
    let spin = state.angular_velocity * dt;
    if spin.length_squared() > 0.0 {
        state.rotation = (Quat::from_scaled_axis(spin) * state.rotation).normalize();
    }
}

#[derive(Debug, Clone, Copy)]
enum Volume {
    Sphere { center: Vec3, radius: f32 },
    Aabb { min: Vec3, max: Vec3 },
    Ground { height: f32 },
}

struct SimpleBody {
    desc: BodyDesc,
    state: BodyState,
    /// Local-space bounds of a hull, cached at insertion.
    hull_bounds: Option<(Vec3, Vec3)>,
}

impl SimpleBody {
    fn volume(&self) -> Volume {
        let p = self.state.position;
        match &self.desc.shape {
            ColliderShape::Ball { radius } => Volume::Sphere {
                center: p,
                radius: *radius,
            },
            ColliderShape::Cuboid { half_extents } => Volume::Aabb {
                min: p - *half_extents,
                max: p + *half_extents,
            },
            ColliderShape::ConvexHull { .. } => {
                let (min, max) = self.hull_bounds.unwrap_or((Vec3::ZERO, Vec3::ZERO));
                Volume::Aabb {
                    min: p + min,
                    max: p + max,
                }
            }
            ColliderShape::GroundPlane => Volume::Ground { height: p.y },
        }
    }

    fn inverse_mass(&self) -> f32 {
        if self.desc.kind == BodyKind::Dynamic && self.desc.mass > 0.0 {
            1.0 / self.desc.mass
        } else {
            0.0
        }
    }
}

/// Overlap of two volumes: (normal from first to second, penetration depth, contact point).
fn overlap(a: Volume, b: Volume) -> Option<(Vec3, f32, Vec3)> {
    match (a, b) {
        (
            Volume::Sphere {
                center: ca,
                radius: ra,
            },
            Volume::Sphere {
                center: cb,
                radius: rb,
            },
        ) => {
            let delta = cb - ca;
            let distance = delta.length();
            let depth = ra + rb - distance;
            (depth >= 0.0).then(|| {
                let normal = if distance > 1e-6 { delta / distance } else { Vec3::Y };
                (normal, depth, ca + normal * ra)
            })
        }
        (Volume::Sphere { center, radius }, Volume::Aabb { min, max }) => {
            let closest = center.clamp(min, max);
            let delta = closest - center;
            let distance = delta.length();
            if distance > radius {
                return None;
            }
            let normal = if distance > 1e-6 {
                delta / distance
            } else {
                // Centre inside the box: push out along the box's centre line.
                ((min + max) * 0.5 - center).normalize_or(Vec3::NEG_Y)
            };
            Some((normal, radius - distance, closest))
        }
        (Volume::Aabb { min: amin, max: amax }, Volume::Aabb { min: bmin, max: bmax }) => {
            let overlap = amax.min(bmax) - amin.max(bmin);
            if overlap.min_element() < 0.0 {
                return None;
            }
            let centre_delta = (bmin + bmax) * 0.5 - (amin + amax) * 0.5;
            let (axis, depth) = if overlap.x <= overlap.y && overlap.x <= overlap.z {
                (Vec3::X * centre_delta.x.signum(), overlap.x)
            } else if overlap.y <= overlap.z {
                (Vec3::Y * centre_delta.y.signum(), overlap.y)
            } else {
                (Vec3::Z * centre_delta.z.signum(), overlap.z)
            };
            let point = (amin.max(bmin) + amax.min(bmax)) * 0.5;
            Some((axis, depth, point))
        }
        (Volume::Sphere { center, radius }, Volume::Ground { height }) => {
            let depth = height - (center.y - radius);
            (depth >= 0.0).then(|| {
                (
                    Vec3::NEG_Y,
                    depth,
                    Vec3::new(center.x, height, center.z),
                )
            })
        }
        (Volume::Aabb { min, max }, Volume::Ground { height }) => {
            let depth = height - min.y;
            (depth >= 0.0).then(|| {
                let c = (min + max) * 0.5;
                (Vec3::NEG_Y, depth, Vec3::new(c.x, height, c.z))
            })
        }
        (Volume::Ground { .. }, Volume::Ground { .. }) => None,
        (first, second) => {
            overlap(second, first).map(|(normal, depth, point)| (-normal, depth, point))
        }
    }
}

/// Deterministic backend with ordered storage and no broad phase.
pub struct SimpleBackend {
    bodies: BTreeMap<BodyHandle, SimpleBody>,
    gravity: Vec3,
    touching: BTreeSet<(BodyHandle, BodyHandle)>,
    next_handle: u64,
}

impl Default for SimpleBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl SimpleBackend {
    pub fn new() -> Self {
        Self {
            bodies: BTreeMap::new(),
            gravity: Vec3::new(0.0, -9.81, 0.0),
            touching: BTreeSet::new(),
            next_handle: 1,
        }
    }

    fn pair_allowed(a: &BodyDesc, b: &BodyDesc) -> bool {
        a.groups.interacts_with(&b.groups)
            && (a.kind == BodyKind::Dynamic || b.kind == BodyKind::Dynamic)
    }

    fn resolve(&mut self, a: BodyHandle, b: BodyHandle, normal: Vec3, depth: f32) {
        let (inv_a, inv_b, vel_a, vel_b) = match (self.bodies.get(&a), self.bodies.get(&b)) {
            (Some(body_a), Some(body_b)) => (
                body_a.inverse_mass(),
                body_b.inverse_mass(),
                body_a.state.linear_velocity,
                body_b.state.linear_velocity,
            ),
            _ => return,
        };
        let total = inv_a + inv_b;
        if total <= 0.0 {
            return;
        }
        let approach = (vel_b - vel_a).dot(normal);
        let impulse = if approach < 0.0 { -approach / total } else { 0.0 };

        if let Some(body) = self.bodies.get_mut(&a) {
            body.state.position -= normal * depth * (inv_a / total);
            body.state.linear_velocity -= normal * impulse * inv_a;
        }
        if let Some(body) = self.bodies.get_mut(&b) {
            body.state.position += normal * depth * (inv_b / total);
            body.state.linear_velocity += normal * impulse * inv_b;
        }
    }
}

impl PhysicsBackend for SimpleBackend {
    fn name(&self) -> &'static str {
        "simple"
    }

    fn insert(&mut self, desc: &BodyDesc) -> BodyHandle {
        let handle = BodyHandle(self.next_handle);
        self.next_handle += 1;
        let hull_bounds = match &desc.shape {
            ColliderShape::ConvexHull { points } if !points.is_empty() => Some(points.iter().fold(
                (Vec3::splat(f32::MAX), Vec3::splat(f32::MIN)),
                |(min, max), p| (min.min(*p), max.max(*p)),
            )),
            _ => None,
        };
        self.bodies.insert(
            handle,
            SimpleBody {
                state: BodyState {
                    position: desc.position,
                    rotation: desc.rotation,
                    linear_velocity: desc.linear_velocity,
                    angular_velocity: Vec3::ZERO,
                },
                desc: desc.clone(),
                hull_bounds,
            },
        );
        handle
    }

    fn remove(&mut self, handle: BodyHandle) -> bool {
        self.touching.retain(|(a, b)| *a != handle && *b != handle);
        self.bodies.remove(&handle).is_some()
    }

    fn contains(&self, handle: BodyHandle) -> bool {
        self.bodies.contains_key(&handle)
    }

    fn state(&self, handle: BodyHandle) -> Option<BodyState> {
        self.bodies.get(&handle).map(|body| body.state)
    }

    fn set_state(&mut self, handle: BodyHandle, state: &BodyState) {
        if let Some(body) = self.bodies.get_mut(&handle) {
            body.state = *state;
        }
    }

    fn set_gravity(&mut self, gravity: Vec3) {
        self.gravity = gravity;
    }

    fn step(&mut self, dt: f32, contacts: &mut Vec<RawContact>) {
        let gravity = self.gravity;
        for body in self.bodies.values_mut() {
            if body.desc.kind != BodyKind::Dynamic {
                continue;
            }
            integrate(
                &mut body.state,
                gravity,
                body.desc.gravity_scale,
                body.desc.linear_damping,
                body.desc.angular_damping,
                dt,
            );
        }

        let handles: Vec<BodyHandle> = self.bodies.keys().copied().collect();
        let mut now_touching = BTreeSet::new();
        for (i, &a) in handles.iter().enumerate() {
            for &b in &handles[i + 1..] {
                let (Some(body_a), Some(body_b)) = (self.bodies.get(&a), self.bodies.get(&b))
                else {
                    continue;
                };
                if !Self::pair_allowed(&body_a.desc, &body_b.desc) {
                    continue;
                }
                let sensor = body_a.desc.sensor || body_b.desc.sensor;
                let Some((normal, depth, point)) = overlap(body_a.volume(), body_b.volume())
                else {
                    continue;
                };

                now_touching.insert((a, b));
                if !self.touching.contains(&(a, b)) {
                    contacts.push(RawContact {
                        a,
                        b,
                        point,
                        normal,
                    });
                }
                if !sensor {
                    self.resolve(a, b, normal, depth);
                }
            }
        }
        self.touching = now_touching;
    }

    fn body_count(&self) -> usize {
        self.bodies.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::collision::{CollisionGroup, CollisionGroups};

    fn ball(position: Vec3, groups: CollisionGroups) -> BodyDesc {
        BodyDesc::new(BodyKind::Dynamic, ColliderShape::Ball { radius: 1.0 }, groups)
            .at(position, Quat::IDENTITY)
    }

    #[test]
    fn integrate_applies_gravity_and_damping() {
        let mut state = BodyState::default();
        integrate(&mut state, Vec3::new(0.0, -10.0, 0.0), 1.0, 0.0, 0.0, 0.1);
        assert!((state.linear_velocity.y + 1.0).abs() < 1e-6);
        assert!((state.position.y + 0.1).abs() < 1e-6);

        let mut damped = BodyState {
            linear_velocity: Vec3::X * 10.0,
            ..Default::default()
        };
        integrate(&mut damped, Vec3::ZERO, 1.0, 1.0, 0.0, 1.0);
        assert!((damped.linear_velocity.x - 5.0).abs() < 1e-6);
    }

    #[test]
    fn resting_ball_stops_on_ground() {
        let mut backend = SimpleBackend::new();
        backend.insert(&BodyDesc::new(
            BodyKind::Fixed,
            ColliderShape::GroundPlane,
            CollisionGroup::environment(),
        ));
        let handle = backend.insert(&ball(Vec3::new(0.0, 3.0, 0.0), CollisionGroup::drone()));
        let mut contacts = Vec::new();
        for _ in 0..240 {
            backend.step(1.0 / 60.0, &mut contacts);
        }
        let state = backend.state(handle).unwrap();
        assert!((state.position.y - 1.0).abs() < 0.05);
        // A continuous resting contact is reported once.
        assert_eq!(contacts.len(), 1);
    }

    #[test]
    fn filtered_groups_pass_through() {
        let mut backend = SimpleBackend::new();
        backend.set_gravity(Vec3::ZERO);
        let a = backend.insert(&ball(Vec3::ZERO, CollisionGroup::projectile()));
        backend.insert(&ball(Vec3::new(0.5, 0.0, 0.0), CollisionGroup::projectile()));
        let mut contacts = Vec::new();
        backend.step(1.0 / 60.0, &mut contacts);
        assert!(contacts.is_empty());
        assert_eq!(backend.state(a).unwrap().position, Vec3::ZERO);
    }

    #[test]
    fn sensors_report_without_pushing() {
        let mut backend = SimpleBackend::new();
        backend.set_gravity(Vec3::ZERO);
        let mut flag = BodyDesc::new(
            BodyKind::KinematicPositionBased,
            ColliderShape::Ball { radius: 1.0 },
            CollisionGroup::flag(),
        );
        flag.sensor = true;
        let flag = backend.insert(&flag);
        let drone = backend.insert(&ball(Vec3::new(1.5, 0.0, 0.0), CollisionGroup::drone()));
        let mut contacts = Vec::new();
        backend.step(1.0 / 60.0, &mut contacts);
        assert_eq!(contacts.len(), 1);
        assert_eq!(contacts[0].a, flag);
        assert_eq!(contacts[0].b, drone);
        assert!((contacts[0].normal - Vec3::X).length() < 1e-5);
        assert_eq!(backend.state(drone).unwrap().position.x, 1.5);
    }

    #[test]
    fn box_and_sphere_separate() {
        let mut backend = SimpleBackend::new();
        backend.set_gravity(Vec3::ZERO);
        backend.insert(
            &BodyDesc::new(
                BodyKind::Fixed,
                ColliderShape::Cuboid {
                    half_extents: Vec3::splat(1.0),
                },
                CollisionGroup::environment(),
            )
            .at(Vec3::ZERO, Quat::IDENTITY),
        );
        let mut desc = ball(Vec3::new(1.8, 0.0, 0.0), CollisionGroup::drone());
        desc.linear_velocity = Vec3::new(-5.0, 0.0, 0.0);
        let drone = backend.insert(&desc);
        let mut contacts = Vec::new();
        backend.step(1.0 / 60.0, &mut contacts);
        let state = backend.state(drone).unwrap();
        assert_eq!(contacts.len(), 1);
        assert!(state.position.x >= 2.0 - 1e-4);
        assert!(state.linear_velocity.x.abs() < 1e-4);
    }
}
