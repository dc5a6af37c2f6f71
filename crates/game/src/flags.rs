//! Capture-the-flag state: pickup, carry, capture and return.
//!
//! A flag is always in one of two states: resting at its home base, or
//! carried by exactly one living enemy vehicle.

use engine_core::{
    EntityKind, EntityStore, EntityTag, GameStatus, SimResult, Team, Transform, Vec3,
};
use physics::PhysicsWorld;
use serde::{Deserialize, Serialize};

use crate::config::SimConfig;
use crate::events::{EventQueue, GameEvent};
use crate::health::Destroyed;

/// Home position of a flag entity.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Flag {
    pub home: Vec3,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TeamScores {
    pub red: u32,
    pub blue: u32,
}

impl TeamScores {
    pub fn score(&self, team: Team) -> u32 {
        match team {
            Team::Red => self.red,
            Team::Blue => self.blue,
        }
    }

    pub fn add(&mut self, team: Team) {
        match team {
            Team::Red => self.red += 1,
            Team::Blue => self.blue += 1,
        }
    }
}

fn can_carry(store: &EntityStore, vehicle: &str, flag_team: Team) -> SimResult<bool> {
    if store.kind_of(vehicle) != Some(EntityKind::Vehicle) || store.has::<Destroyed>(vehicle) {
        return Ok(false);
    }
    let status = store.get::<GameStatus>(vehicle)?;
    Ok(!status.is_dead() && !status.has_flag && status.team != flag_team)
}

/// Hand an uncarried flag to a vehicle if it is allowed to take it.
pub fn try_pickup(store: &EntityStore, flag_id: &str, vehicle_id: &str) -> SimResult<bool> {
    let flag_team = {
        let flag = store.get::<GameStatus>(flag_id)?;
        if flag.carried_by.is_some() {
            return Ok(false);
        }
        flag.team
    };
    if !can_carry(store, vehicle_id, flag_team)? {
        return Ok(false);
    }

    store.get_mut::<GameStatus>(vehicle_id)?.has_flag = true;
    let mut flag = store.get_mut::<GameStatus>(flag_id)?;
    flag.carried_by = Some(vehicle_id.to_string());
    flag.at_base = false;
    log::info!("{vehicle_id} picked up {flag_id}");
    Ok(true)
}

/// Put a flag back on its base and release its carrier, if any.
pub fn return_flag(store: &EntityStore, flag_id: &str) -> SimResult<()> {
    let home = store.get::<Flag>(flag_id)?.home;
    let carrier = {
        let mut flag = store.get_mut::<GameStatus>(flag_id)?;
        flag.at_base = true;
        flag.carried_by.take()
    };
    if let Some(carrier) = carrier {
        if let Ok(mut status) = store.get_mut::<GameStatus>(&carrier) {
            status.has_flag = false;
        }
    }
    *store.get_mut::<Transform>(flag_id)? = Transform::from_position(home);
    Ok(())
}

struct Carrier {
    position: Vec3,
    team: Team,
}

/// The carrier's position and team while it can still hold the flag.
fn live_carrier(store: &EntityStore, id: &str) -> Option<Carrier> {
    if store.has::<Destroyed>(id) {
        return None;
    }
    let status = store.get::<GameStatus>(id).ok()?;
    if status.is_dead() || !status.has_flag {
        return None;
    }
    let position = store.get::<Transform>(id).ok()?.position;
    Some(Carrier {
        position,
        team: status.team,
    })
}

#[derive(Debug, Default)]
pub struct FlagSystem;

impl FlagSystem {
    pub fn update(
        &mut self,
        store: &mut EntityStore,
        physics: &mut PhysicsWorld,
        config: &SimConfig,
        scores: &mut TeamScores,
        events: &mut EventQueue,
    ) -> SimResult<()> {
        for flag_id in store.ids_with::<&Flag>() {
            if let Err(err) = self.update_flag(store, physics, config, scores, events, &flag_id) {
                log::warn!("flag {flag_id} skipped: {err}");
            }
        }
        Ok(())
    }

    fn update_flag(
        &self,
        store: &EntityStore,
        physics: &mut PhysicsWorld,
        config: &SimConfig,
        scores: &mut TeamScores,
        events: &mut EventQueue,
        flag_id: &str,
    ) -> SimResult<()> {
        let carried_by = store.get::<GameStatus>(flag_id)?.carried_by.clone();
        match carried_by {
            Some(carrier_id) => match live_carrier(store, &carrier_id) {
                None => {
                    return_flag(store, flag_id)?;
                    log::info!("{flag_id} returned, carrier {carrier_id} lost it");
                    events.push(GameEvent::FlagReturned {
                        flag: flag_id.to_string(),
                    });
                }
                Some(carrier) => {
                    store.get_mut::<Transform>(flag_id)?.position = carrier.position;
                    let base = config.team_bases.base(carrier.team);
                    if carrier.position.distance(base) <= config.return_radius {
                        return_flag(store, flag_id)?;
                        scores.add(carrier.team);
                        log::info!(
                            "{carrier_id} captured {flag_id} for {:?} (red {} / blue {})",
                            carrier.team,
                            scores.red,
                            scores.blue
                        );
                        events.push(GameEvent::FlagCaptured {
                            flag: flag_id.to_string(),
                            carrier: carrier_id,
                            team: carrier.team,
                        });
                    }
                }
            },
            None => {
                if let Some(vehicle) = self.nearest_taker(store, flag_id, config)? {
                    if try_pickup(store, flag_id, &vehicle)? {
                        events.push(GameEvent::FlagPickedUp {
                            flag: flag_id.to_string(),
                            carrier: vehicle,
                        });
                    }
                }
            }
        }

        let transform = *store.get::<Transform>(flag_id)?;
        if let Err(err) = physics.push_transform(flag_id, &transform) {
            log::debug!("flags: {err}");
        }
        Ok(())
    }

    /// Closest eligible enemy vehicle within the capture radius, ties broken by id.
    fn nearest_taker(
        &self,
        store: &EntityStore,
        flag_id: &str,
        config: &SimConfig,
    ) -> SimResult<Option<String>> {
        let flag_team = store.get::<GameStatus>(flag_id)?.team;
        let flag_position = store.get::<Transform>(flag_id)?.position;

        let mut best: Option<(f32, String)> = None;
        for (_, (tag, transform, status, destroyed)) in store
            .world()
            .query::<(&EntityTag, &Transform, &GameStatus, Option<&Destroyed>)>()
            .iter()
        {
            if tag.kind != EntityKind::Vehicle
                || destroyed.is_some()
                || status.is_dead()
                || status.has_flag
                || status.team == flag_team
            {
                continue;
            }
            let distance = transform.position.distance(flag_position);
            if distance > config.capture_radius {
                continue;
            }
            let closer = match &best {
                None => true,
                Some((best_distance, best_id)) => {
                    distance < *best_distance || (distance == *best_distance && tag.id < *best_id)
                }
            };
            if closer {
                best = Some((distance, tag.id.clone()));
            }
        }
        Ok(best.map(|(_, id)| id))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use physics::BackendKind;

    struct Arena {
        store: EntityStore,
        physics: PhysicsWorld,
        config: SimConfig,
        scores: TeamScores,
        events: EventQueue,
    }

    impl Arena {
        fn new() -> Self {
            let config = SimConfig::default();
            let mut store = EntityStore::new();
            let mut physics = PhysicsWorld::new(BackendKind::Simple.create());
            for team in Team::ALL {
                let id = format!("flag-{team:?}").to_lowercase();
                let home = config.team_bases.base(team);
                physics.create_flag_body(&id, home).unwrap();
                store
                    .spawn(
                        id.as_str(),
                        EntityKind::Flag,
                        (Transform::from_position(home), GameStatus::flag(team), Flag { home }),
                    )
                    .unwrap();
            }
            Self {
                store,
                physics,
                config,
                scores: TeamScores::default(),
                events: EventQueue::default(),
            }
        }

        fn vehicle(&mut self, id: &str, team: Team, position: Vec3) {
            self.store
                .spawn(
                    id,
                    EntityKind::Vehicle,
                    (Transform::from_position(position), GameStatus::new(team, 100.0)),
                )
                .unwrap();
        }

        fn tick(&mut self) {
            FlagSystem
                .update(
                    &mut self.store,
                    &mut self.physics,
                    &self.config,
                    &mut self.scores,
                    &mut self.events,
                )
                .unwrap();
        }

        fn carrier(&self, flag: &str) -> Option<String> {
            self.store.get::<GameStatus>(flag).unwrap().carried_by.clone()
        }
    }

    #[test]
    fn pickup_within_capture_radius_only() {
        let mut arena = Arena::new();
        let blue_home = arena.config.team_bases.blue;
        arena.vehicle("far", Team::Red, blue_home + Vec3::new(10.0, 0.0, 0.0));
        arena.tick();
        assert_eq!(arena.carrier("flag-blue"), None);

        arena.vehicle("near", Team::Red, blue_home + Vec3::new(0.0, 2.0, 0.0));
        arena.tick();
        assert_eq!(arena.carrier("flag-blue").as_deref(), Some("near"));
        assert!(arena.store.get::<GameStatus>("near").unwrap().has_flag);
        assert!(!arena.store.get::<GameStatus>("flag-blue").unwrap().at_base);
    }

    #[test]
    fn own_team_never_picks_up() {
        let mut arena = Arena::new();
        let blue_home = arena.config.team_bases.blue;
        arena.vehicle("defender", Team::Blue, blue_home);
        arena.tick();
        assert_eq!(arena.carrier("flag-blue"), None);
        assert!(!try_pickup(&arena.store, "flag-blue", "defender").unwrap());
    }

    #[test]
    fn nearest_vehicle_wins() {
        let mut arena = Arena::new();
        let blue_home = arena.config.team_bases.blue;
        arena.vehicle("a", Team::Red, blue_home + Vec3::new(4.0, 0.0, 0.0));
        arena.vehicle("b", Team::Red, blue_home + Vec3::new(0.0, 0.0, 1.0));
        arena.tick();
        assert_eq!(arena.carrier("flag-blue").as_deref(), Some("b"));
    }

    #[test]
    fn carried_flag_follows_and_scores_at_home_base() {
        let mut arena = Arena::new();
        let blue_home = arena.config.team_bases.blue;
        arena.vehicle("runner", Team::Red, blue_home);
        arena.tick();
        assert_eq!(arena.carrier("flag-blue").as_deref(), Some("runner"));

        let midfield = Vec3::new(0.0, 20.0, 0.0);
        arena.store.get_mut::<Transform>("runner").unwrap().position = midfield;
        arena.tick();
        assert_eq!(arena.store.get::<Transform>("flag-blue").unwrap().position, midfield);
        assert_eq!(arena.physics.body_state("flag-blue").unwrap().position, midfield);

        let red_home = arena.config.team_bases.red;
        arena.store.get_mut::<Transform>("runner").unwrap().position =
            red_home + Vec3::new(0.0, 5.0, 0.0);
        arena.tick();
        assert_eq!(arena.scores.score(Team::Red), 1);
        assert_eq!(arena.carrier("flag-blue"), None);
        let flag = arena.store.get::<GameStatus>("flag-blue").unwrap();
        assert!(flag.at_base);
        assert!(!arena.store.get::<GameStatus>("runner").unwrap().has_flag);
        assert_eq!(arena.store.get::<Transform>("flag-blue").unwrap().position, blue_home);
    }

    #[test]
    fn second_enemy_cannot_take_a_carried_flag() {
        let mut arena = Arena::new();
        let blue_home = arena.config.team_bases.blue;
        arena.vehicle("first", Team::Red, blue_home);
        arena.tick();
        assert_eq!(arena.carrier("flag-blue").as_deref(), Some("first"));

        arena.vehicle("second", Team::Red, blue_home);
        arena.tick();
        assert!(!try_pickup(&arena.store, "flag-blue", "second").unwrap());
        assert_eq!(arena.carrier("flag-blue").as_deref(), Some("first"));
        assert!(!arena.store.get::<GameStatus>("second").unwrap().has_flag);
    }

    #[test]
    fn broken_flag_does_not_stop_the_others() {
        let mut arena = Arena::new();
        arena
            .store
            .spawn(
                "flag-a",
                EntityKind::Flag,
                (Transform::default(), Flag { home: Vec3::ZERO }),
            )
            .unwrap();
        let blue_home = arena.config.team_bases.blue;
        arena.vehicle("runner", Team::Red, blue_home);
        arena.tick();
        assert_eq!(arena.carrier("flag-blue").as_deref(), Some("runner"));
    }

    #[test]
    fn flag_returns_when_carrier_is_destroyed() {
        let mut arena = Arena::new();
        let blue_home = arena.config.team_bases.blue;
        arena.vehicle("runner", Team::Red, blue_home);
        arena.tick();
        arena.store.get_mut::<Transform>("runner").unwrap().position = Vec3::ZERO;
        arena.tick();

        arena
            .store
            .insert(
                "runner",
                Destroyed {
                    at_tick: 3,
                    respawn_tick: 100,
                },
            )
            .unwrap();
        arena.tick();
        assert_eq!(arena.carrier("flag-blue"), None);
        assert_eq!(arena.store.get::<Transform>("flag-blue").unwrap().position, blue_home);
        assert!(!arena.store.get::<GameStatus>("runner").unwrap().has_flag);
        assert_eq!(arena.scores, TeamScores::default());
    }
}
