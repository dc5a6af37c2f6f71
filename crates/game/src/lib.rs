//! Skyflag gameplay: flight models, weapons, capture-the-flag rules and the
//! authoritative room that runs them in a fixed per-tick order.

pub mod client;
pub mod collision;
pub mod config;
pub mod drone;
pub mod events;
pub mod flags;
pub mod health;
pub mod plane;
pub mod projectiles;
pub mod room;
pub mod sync;
pub mod tuning;
pub mod vehicle;
pub mod weapons;

pub use client::{ClientMirror, InterpolationBuffer, Prediction};
pub use config::SimConfig;
pub use events::GameEvent;
pub use flags::TeamScores;
pub use room::{JoinOptions, Room};
pub use sync::{NetworkEntity, StateSync, WorldSnapshot};
