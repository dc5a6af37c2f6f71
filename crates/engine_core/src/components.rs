//! Common ECS components used across the simulation.

use serde::{Deserialize, Serialize};

/// Broad category of an entity, mirrored into the network schema as `type`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EntityKind {
    Vehicle,
    Projectile,
    Flag,
    Checkpoint,
    Environment,
}

/// Airframe type of a vehicle; selects its flight model and body shape.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum VehicleKind {
    #[default]
    Drone,
    Plane,
}

/// Identity component. Every entity in the store carries exactly one.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EntityTag {
    pub id: String,
    pub kind: EntityKind,
}

/// The two competing teams.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Team {
    #[default]
    Red,
    Blue,
}

impl Team {
    pub const ALL: [Team; 2] = [Team::Red, Team::Blue];

    pub fn opponent(self) -> Team {
        match self {
            Team::Red => Team::Blue,
            Team::Blue => Team::Red,
        }
    }
}

/// Health and capture-the-flag state for vehicles and flags.
///
/// For a vehicle, `has_flag` marks it as a carrier. For a flag, `carried_by`
/// names the carrying vehicle and `at_base` is set while it rests at home.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GameStatus {
    pub health: f32,
    pub max_health: f32,
    pub team: Team,
    pub has_flag: bool,
    pub carried_by: Option<String>,
    pub at_base: bool,
}

impl GameStatus {
    pub fn new(team: Team, max_health: f32) -> Self {
        Self {
            health: max_health,
            max_health,
            team,
            has_flag: false,
            carried_by: None,
            at_base: false,
        }
    }

    /// Status for a flag resting at its team's base.
    pub fn flag(team: Team) -> Self {
        Self {
            at_base: true,
            ..Self::new(team, 0.0)
        }
    }

    /// Subtract damage, never dropping below zero. Returns true if this hit emptied health.
    pub fn take_damage(&mut self, amount: f32) -> bool {
        let was_alive = self.health > 0.0;
        self.health = (self.health - amount.max(0.0)).max(0.0);
        was_alive && self.health <= 0.0
    }

    pub fn restore(&mut self) {
        self.health = self.max_health;
    }

    pub fn is_dead(&self) -> bool {
        self.health <= 0.0
    }
}

/// Tick bookkeeping used for reconciliation.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TickState {
    /// Last simulation tick this entity was stepped in.
    pub tick: u64,
    /// Simulation timestamp (ms) of that tick.
    pub timestamp: u64,
    /// Tick of the newest input applied to this entity.
    pub last_processed_input_tick: Option<u64>,
    /// Client timestamp carried by that input.
    pub last_processed_input_timestamp: Option<u64>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn damage_clamps_to_zero() {
        let mut status = GameStatus::new(Team::Red, 100.0);
        status.take_damage(30.0);
        assert_eq!(status.health, 70.0);
        let killed = status.take_damage(500.0);
        assert!(killed);
        assert_eq!(status.health, 0.0);
        assert!(status.is_dead());
    }

    #[test]
    fn damage_on_dead_does_not_report_kill_twice() {
        let mut status = GameStatus::new(Team::Blue, 10.0);
        assert!(status.take_damage(10.0));
        assert!(!status.take_damage(5.0));
        assert_eq!(status.health, 0.0);
    }

    #[test]
    fn restore_refills_to_max() {
        let mut status = GameStatus::new(Team::Red, 100.0);
        status.take_damage(100.0);
        status.restore();
        assert_eq!(status.health, 100.0);
        assert!(!status.is_dead());
    }

    #[test]
    fn opponent_is_symmetric() {
        for team in Team::ALL {
            assert_eq!(team.opponent().opponent(), team);
            assert_ne!(team.opponent(), team);
        }
    }
}
