//! Gameplay events raised during a tick and shipped with the snapshot.

use engine_core::{Team, VehicleKind};
use serde::{Deserialize, Serialize};

use crate::collision::CollisionSeverity;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase", rename_all_fields = "camelCase")]
pub enum GameEvent {
    PlayerJoined {
        id: String,
        team: Team,
        vehicle: VehicleKind,
    },
    PlayerLeft {
        id: String,
    },
    ProjectileFired {
        projectile: String,
        source: String,
        weapon: String,
    },
    Hit {
        projectile: String,
        source: String,
        target: String,
        damage: f32,
    },
    Crash {
        vehicle: String,
        other: String,
        severity: CollisionSeverity,
        damage: f32,
    },
    VehicleDestroyed {
        id: String,
    },
    VehicleRespawned {
        id: String,
    },
    FlagPickedUp {
        flag: String,
        carrier: String,
    },
    FlagCaptured {
        flag: String,
        carrier: String,
        team: Team,
    },
    FlagReturned {
        flag: String,
    },
}

/// Events gathered over one tick.
#[derive(Debug, Default)]
pub struct EventQueue {
    events: Vec<GameEvent>,
}

impl EventQueue {
    pub fn push(&mut self, event: GameEvent) {
        self.events.push(event);
    }

    pub fn drain(&mut self) -> Vec<GameEvent> {
        std::mem::take(&mut self.events)
    }

    pub fn iter(&self) -> impl Iterator<Item = &GameEvent> {
        self.events.iter()
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn events_serialize_tagged() {
        let event = GameEvent::FlagCaptured {
            flag: "flag-blue".into(),
            carrier: "pilot".into(),
            team: Team::Red,
        };
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["type"], "flagCaptured");
        assert_eq!(json["carrier"], "pilot");
        assert_eq!(json["team"], "Red");
    }
}
