//! Collision groups and filtering.

use rapier3d::prelude::{Group, InteractionGroups};

/// Collision groups for different entity types.
#[repr(u32)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CollisionGroup {
    /// Static environment (ground, level meshes)
    Environment = 1 << 0,
    Drones = 1 << 1,
    Planes = 1 << 2,
    Projectiles = 1 << 3,
    /// Flag sensors
    Flags = 1 << 4,
}

const ALL_GROUPS: u32 = CollisionGroup::Environment as u32
    | CollisionGroup::Drones as u32
    | CollisionGroup::Planes as u32
    | CollisionGroup::Projectiles as u32
    | CollisionGroup::Flags as u32;

/// Membership and filter masks of one collider.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct CollisionGroups {
    pub memberships: u32,
    pub filter: u32,
}

impl CollisionGroup {
    pub fn bits(self) -> u32 {
        self as u32
    }

    /// Environment collides with everything.
    pub fn environment() -> CollisionGroups {
        CollisionGroups::new(Self::Environment.bits(), ALL_GROUPS)
    }

    /// Drones collide with every group.
    pub fn drone() -> CollisionGroups {
        CollisionGroups::new(Self::Drones.bits(), ALL_GROUPS)
    }

    pub fn plane() -> CollisionGroups {
        CollisionGroups::new(Self::Planes.bits(), ALL_GROUPS)
    }

    /// Projectiles never hit other projectiles or flags.
    pub fn projectile() -> CollisionGroups {
        CollisionGroups::new(
            Self::Projectiles.bits(),
            Self::Environment.bits() | Self::Drones.bits() | Self::Planes.bits(),
        )
    }

    /// Flags only sense vehicles.
    pub fn flag() -> CollisionGroups {
        CollisionGroups::new(Self::Flags.bits(), Self::Drones.bits() | Self::Planes.bits())
    }
}

impl CollisionGroups {
    pub const fn new(memberships: u32, filter: u32) -> Self {
        Self {
            memberships,
            filter,
        }
    }

    pub fn contains(&self, group: CollisionGroup) -> bool {
        self.memberships & group.bits() != 0
    }

    /// Two colliders interact only when each one's filter accepts the other's memberships.
    pub fn interacts_with(&self, other: &CollisionGroups) -> bool {
        self.memberships & other.filter != 0 && other.memberships & self.filter != 0
    }

    pub fn is_vehicle(&self) -> bool {
        self.contains(CollisionGroup::Drones) || self.contains(CollisionGroup::Planes)
    }

    pub fn to_interaction_groups(self) -> InteractionGroups {
        InteractionGroups::new(
            Group::from_bits_retain(self.memberships),
            Group::from_bits_retain(self.filter),
        )
    }
}
