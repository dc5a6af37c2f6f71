//! A match room: owns the world, the physics engine and the per-tick system order.

use engine_core::{
    EntityKind, EntityStore, EntityTag, GameStatus, SimError, SimResult, Team, TickState, Time,
    Transform, Vec3, VehicleKind,
};
use input::{ControlInput, InputSystem};
use physics::{EnvironmentMesh, PhysicsComponent, PhysicsTuning, PhysicsWorld};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};

use crate::collision::CollisionSystem;
use crate::config::SimConfig;
use crate::events::{EventQueue, GameEvent};
use crate::flags::{self, Flag, FlagSystem, TeamScores};
use crate::health::{launch, spawn_transform, HealthSystem};
use crate::projectiles::ProjectileSystem;
use crate::sync::{StateSync, WorldSnapshot};
use crate::tuning::{self, VEHICLE_MAX_HEALTH};
use crate::vehicle::{FlightSystem, Vehicle};
use crate::weapons::{WeaponSystem, WeaponTick};

pub const GROUND_ID: &str = "ground";

/// Horizontal spread of spawn points around a base.
const SPAWN_JITTER: f32 = 5.0;

pub fn flag_id(team: Team) -> &'static str {
    match team {
        Team::Red => "flag-red",
        Team::Blue => "flag-blue",
    }
}

/// What a client asks for when joining.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct JoinOptions {
    /// Requested team; the smaller team is chosen when absent.
    pub team: Option<Team>,
    pub vehicle: VehicleKind,
}

pub struct Room {
    config: SimConfig,
    time: Time,
    store: EntityStore,
    physics: PhysicsWorld,
    input: InputSystem,
    flight: FlightSystem,
    collisions: CollisionSystem,
    weapons: WeaponSystem,
    projectiles: ProjectileSystem,
    health: HealthSystem,
    flags: FlagSystem,
    sync: StateSync,
    events: EventQueue,
    scores: TeamScores,
    rng: StdRng,
    environment_batches: usize,
}

fn run_system(name: &str, result: SimResult<()>) {
    if let Err(err) = result {
        log::error!("{name} system failed: {err}");
    }
}

impl Room {
    pub fn new(config: SimConfig) -> SimResult<Self> {
        let config = config.sanitized();
        let physics = PhysicsWorld::new(config.physics_backend.create())
            .with_substeps(config.physics_substeps)
            .with_max_step_dt(config.max_step_dt)
            .with_gravity(config.gravity);
        let mut room = Self {
            time: Time::new(config.tick_rate),
            store: EntityStore::new(),
            physics,
            input: InputSystem::new(config.input_buffer_capacity),
            flight: FlightSystem,
            collisions: CollisionSystem,
            weapons: WeaponSystem::default(),
            projectiles: ProjectileSystem,
            health: HealthSystem,
            flags: FlagSystem,
            sync: StateSync::default(),
            events: EventQueue::default(),
            scores: TeamScores::default(),
            rng: StdRng::seed_from_u64(config.seed),
            environment_batches: 0,
            config,
        };

        room.physics.create_ground(GROUND_ID)?;
        room.store
            .spawn(GROUND_ID, EntityKind::Environment, (Transform::default(),))?;

        for team in Team::ALL {
            let id = flag_id(team);
            let home = room.config.team_bases.base(team);
            let body = room.physics.create_flag_body(id, home)?;
            let tuning = PhysicsTuning {
                gravity_scale: 0.0,
                ..Default::default()
            };
            room.store.spawn(
                id,
                EntityKind::Flag,
                (
                    Transform::from_position(home),
                    GameStatus::flag(team),
                    Flag { home },
                    PhysicsComponent::new(body, tuning),
                    TickState::default(),
                ),
            )?;
        }

        log::info!(
            "room ready: {} Hz, {} physics",
            room.config.tick_rate,
            room.physics.backend_name()
        );
        Ok(room)
    }

    pub fn config(&self) -> &SimConfig {
        &self.config
    }

    pub fn store(&self) -> &EntityStore {
        &self.store
    }

    pub fn store_mut(&mut self) -> &mut EntityStore {
        &mut self.store
    }

    pub fn physics(&self) -> &PhysicsWorld {
        &self.physics
    }

    pub fn physics_mut(&mut self) -> &mut PhysicsWorld {
        &mut self.physics
    }

    pub fn scores(&self) -> TeamScores {
        self.scores
    }

    /// Last completed tick.
    pub fn tick_count(&self) -> u64 {
        self.time.tick()
    }

    pub fn sync(&self) -> &StateSync {
        &self.sync
    }

    pub fn team_size(&self, team: Team) -> usize {
        self.store
            .world()
            .query::<(&EntityTag, &GameStatus)>()
            .iter()
            .filter(|(_, (tag, status))| tag.kind == EntityKind::Vehicle && status.team == team)
            .count()
    }

    fn balanced_team(&self) -> Team {
        if self.team_size(Team::Blue) < self.team_size(Team::Red) {
            Team::Blue
        } else {
            Team::Red
        }
    }

    /// Spawn a vehicle for a client at its team's base.
    pub fn join(&mut self, client_id: &str, options: JoinOptions) -> SimResult<Team> {
        if self.store.contains(client_id) {
            return Err(SimError::DuplicateEntity(client_id.to_string()));
        }
        let team = options.team.unwrap_or_else(|| self.balanced_team());
        let kind = options.vehicle;

        let offset = Vec3::new(
            self.rng.gen_range(-SPAWN_JITTER..SPAWN_JITTER),
            0.0,
            self.rng.gen_range(-SPAWN_JITTER..SPAWN_JITTER),
        );
        let mut transform = spawn_transform(&self.config, team, offset);
        let controller = launch(kind, &mut transform);
        let tuning = tuning::vehicle_tuning(kind);
        let body = self
            .physics
            .create_vehicle_body(client_id, kind, &transform, &tuning)?;

        let tick = self.time.tick();
        let spawned = self.store.spawn(
            client_id,
            EntityKind::Vehicle,
            (
                transform,
                PhysicsComponent::new(body, tuning),
                Vehicle::new(kind, tuning::loadout(kind)),
                controller,
                GameStatus::new(team, VEHICLE_MAX_HEALTH),
                ControlInput::at_tick(tick),
                TickState {
                    tick,
                    timestamp: Time::tick_to_ms(tick, self.config.tick_rate),
                    ..Default::default()
                },
            ),
        );
        if let Err(err) = spawned {
            self.physics.remove_body(client_id);
            return Err(err);
        }

        log::info!("{client_id} joined {team:?} flying a {kind:?}");
        self.events.push(GameEvent::PlayerJoined {
            id: client_id.to_string(),
            team,
            vehicle: kind,
        });
        Ok(team)
    }

    /// Remove a client's vehicle. A carried flag goes home.
    pub fn leave(&mut self, client_id: &str) -> bool {
        if self.store.kind_of(client_id) != Some(EntityKind::Vehicle) {
            return false;
        }
        for team in Team::ALL {
            let flag = flag_id(team);
            let carried = self
                .store
                .get::<GameStatus>(flag)
                .is_ok_and(|status| status.carried_by.as_deref() == Some(client_id));
            if carried {
                if let Err(err) = flags::return_flag(&self.store, flag) {
                    log::warn!("could not return {flag}: {err}");
                }
                self.events.push(GameEvent::FlagReturned {
                    flag: flag.to_string(),
                });
            }
        }
        self.physics.remove_body(client_id);
        self.input.remove_entity(client_id);
        self.store.despawn(client_id);
        log::info!("{client_id} left");
        self.events.push(GameEvent::PlayerLeft {
            id: client_id.to_string(),
        });
        true
    }

    /// Queue a client's input for the next tick.
    pub fn add_input(&mut self, client_id: &str, input: ControlInput) {
        if self.store.kind_of(client_id) != Some(EntityKind::Vehicle) {
            log::debug!("input from unknown client {client_id} dropped");
            return;
        }
        self.input.add_input(client_id, input);
    }

    /// Register static level geometry. Returns the new entity ids.
    pub fn add_environment_meshes(&mut self, meshes: &[EnvironmentMesh]) -> SimResult<Vec<String>> {
        self.environment_batches += 1;
        let prefix = format!("env-{}", self.environment_batches);
        let ids = self.physics.create_mesh_collider_bodies(&prefix, meshes)?;
        for (id, mesh) in ids.iter().zip(meshes) {
            self.store.spawn(
                id.as_str(),
                EntityKind::Environment,
                (Transform::from_position_rotation(mesh.position, mesh.rotation),),
            )?;
        }
        Ok(ids)
    }

    /// Run one fixed step and return the resulting snapshot.
    pub fn tick(&mut self) -> WorldSnapshot {
        let tick = self.time.tick() + 1;
        let tick_rate = self.config.tick_rate;
        let timestamp = Time::tick_to_ms(tick, tick_rate);
        let dt = self.config.dt();

        run_system("input", self.input.update(&mut self.store));
        run_system(
            "flight",
            self.flight
                .update(&mut self.store, &mut self.physics, dt, self.config.gravity),
        );

        self.physics.step(dt);
        for (_, (tag, transform, _)) in self
            .store
            .world_mut()
            .query_mut::<(&EntityTag, &mut Transform, &PhysicsComponent)>()
        {
            if let Err(err) = self.physics.pull_transform(&tag.id, transform) {
                log::debug!("physics: {err}");
            }
        }

        let contacts = self.physics.drain_contacts();
        run_system(
            "collision",
            self.collisions.update(
                &mut self.store,
                &contacts,
                self.config.friendly_fire,
                &mut self.events,
            ),
        );
        run_system(
            "weapon",
            self.weapons.update(
                &mut self.store,
                &mut self.physics,
                &WeaponTick {
                    tick,
                    tick_rate,
                    timestamp,
                    dt,
                    muzzle_offset: self.config.muzzle_offset,
                },
                &mut self.events,
            ),
        );
        run_system(
            "projectile",
            self.projectiles.update(
                &mut self.store,
                &mut self.physics,
                dt,
                self.config.friendly_fire,
                &mut self.events,
            ),
        );
        run_system(
            "health",
            self.health.update(
                &mut self.store,
                &mut self.physics,
                tick,
                &self.config,
                &mut self.events,
            ),
        );
        run_system(
            "flag",
            self.flags.update(
                &mut self.store,
                &mut self.physics,
                &self.config,
                &mut self.scores,
                &mut self.events,
            ),
        );

        for (_, input) in self.store.world_mut().query_mut::<&mut ControlInput>() {
            input.clear_transients();
        }
        for (_, state) in self.store.world_mut().query_mut::<&mut TickState>() {
            state.tick = tick;
            state.timestamp = timestamp;
        }
        self.time.advance_tick();

        self.sync.publish(&self.store);
        WorldSnapshot {
            tick,
            timestamp,
            entities: self.sync.entities().cloned().collect(),
            events: self.events.drain(),
            scores: self.scores,
        }
    }
}
