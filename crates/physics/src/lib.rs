//! Rigid-body physics for Skyflag.
//!
//! The [`PhysicsWorld`] owns a [`PhysicsBackend`] (Rapier3D in production,
//! a small deterministic integrator for tests and prediction) and maps its
//! bodies and contacts onto entity ids.

pub mod backend;
pub mod body;
pub mod collision;
pub mod physics_world;
pub mod rapier_backend;
pub mod sphere_backend;

pub use backend::*;
pub use body::*;
pub use collision::*;
pub use physics_world::*;
pub use rapier_backend::RapierBackend;
pub use sphere_backend::{integrate, SimpleBackend};

// Re-export Rapier for downstream crates
pub use rapier3d;
