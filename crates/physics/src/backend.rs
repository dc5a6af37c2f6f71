//! Backend-neutral description of bodies and the capability trait physics engines implement.

use glam::{Quat, Vec3};

use crate::collision::CollisionGroups;

/// Opaque handle of a body inside a backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct BodyHandle(pub u64);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BodyKind {
    Dynamic,
    /// Moved only by writing its position; pushes dynamic bodies but is never pushed.
    KinematicPositionBased,
    Fixed,
}

#[derive(Debug, Clone, PartialEq)]
pub enum ColliderShape {
    Ball { radius: f32 },
    Cuboid { half_extents: Vec3 },
    /// Convex hull of local-space points.
    ConvexHull { points: Vec<Vec3> },
    /// Infinite plane facing +Y through the body position.
    GroundPlane,
}

/// Everything a backend needs to create a body and its single collider.
#[derive(Debug, Clone)]
pub struct BodyDesc {
    pub kind: BodyKind,
    pub shape: ColliderShape,
    pub position: Vec3,
    pub rotation: Quat,
    pub linear_velocity: Vec3,
    pub groups: CollisionGroups,
    pub sensor: bool,
    pub mass: f32,
    pub linear_damping: f32,
    pub angular_damping: f32,
    pub gravity_scale: f32,
    pub ccd: bool,
}

impl BodyDesc {
    pub fn new(kind: BodyKind, shape: ColliderShape, groups: CollisionGroups) -> Self {
        Self {
            kind,
            shape,
            position: Vec3::ZERO,
            rotation: Quat::IDENTITY,
            linear_velocity: Vec3::ZERO,
            groups,
            sensor: false,
            mass: 1.0,
            linear_damping: 0.0,
            angular_damping: 0.0,
            gravity_scale: 1.0,
            ccd: false,
        }
    }

    pub fn at(mut self, position: Vec3, rotation: Quat) -> Self {
        self.position = position;
        self.rotation = rotation;
        self
    }
}

/// Kinematic state read from or written to a body.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BodyState {
    pub position: Vec3,
    pub rotation: Quat,
    pub linear_velocity: Vec3,
    pub angular_velocity: Vec3,
}

impl Default for BodyState {
    fn default() -> Self {
        Self {
            position: Vec3::ZERO,
            rotation: Quat::IDENTITY,
            linear_velocity: Vec3::ZERO,
            angular_velocity: Vec3::ZERO,
        }
    }
}

/// A pair of bodies that started touching during a step.
///
/// `normal` points from `a` toward `b`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RawContact {
    pub a: BodyHandle,
    pub b: BodyHandle,
    pub point: Vec3,
    pub normal: Vec3,
}

/// Capability interface of a rigid-body engine.
pub trait PhysicsBackend: Send {
    fn name(&self) -> &'static str;

    fn insert(&mut self, desc: &BodyDesc) -> BodyHandle;

    /// Remove a body. Returns false if the handle was unknown.
    fn remove(&mut self, handle: BodyHandle) -> bool;

    fn contains(&self, handle: BodyHandle) -> bool;

    fn state(&self, handle: BodyHandle) -> Option<BodyState>;

    fn set_state(&mut self, handle: BodyHandle, state: &BodyState);

    fn set_gravity(&mut self, gravity: Vec3);

    /// Advance by `dt`, appending contacts for pairs that began touching.
    fn step(&mut self, dt: f32, contacts: &mut Vec<RawContact>);

    fn body_count(&self) -> usize;
}
