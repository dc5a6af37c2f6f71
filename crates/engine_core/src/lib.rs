//! Core simulation types for Skyflag.
//!
//! This crate provides the foundational types used across all simulation systems:
//! - The entity store (hecs world addressed by network ids)
//! - Transform and gameplay components
//! - Fixed-step time management
//! - The shared error taxonomy

pub mod components;
pub mod error;
pub mod store;
pub mod time;
pub mod transform;

pub use components::*;
pub use error::*;
pub use store::*;
pub use time::*;
pub use transform::*;

// Re-export commonly used types
pub use glam::{Quat, Vec2, Vec3};
pub use hecs::{Entity, World};
