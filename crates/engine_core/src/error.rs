//! Error taxonomy shared by every simulation system.
//!
//! None of these cross a tick boundary: systems return them, the room logs
//! them at the system boundary and the tick carries on.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum SimError {
    /// An entity lacks a component a system expects. The entity is skipped.
    #[error("entity `{id}` is missing component {component}")]
    MissingComponent { id: String, component: &'static str },

    #[error("no entity with id `{0}`")]
    UnknownEntity(String),

    #[error("entity id `{0}` is already in use")]
    DuplicateEntity(String),

    /// A contact referenced a body that no entity owns. The event is dropped.
    #[error("contact references unregistered body {0}")]
    InvalidCollisionPair(u64),

    #[error("entity `{0}` has no physics body")]
    MissingBody(String),
}

impl SimError {
    pub fn missing<T>(id: &str) -> Self {
        SimError::MissingComponent {
            id: id.to_string(),
            component: std::any::type_name::<T>(),
        }
    }
}

pub type SimResult<T> = Result<T, SimError>;
