//! Weapon heat/cooldown state machine and the firing system.

use engine_core::{EntityStore, EntityTag, GameStatus, SimResult, Team, Transform, Vec3};
use input::ControlInput;
use physics::PhysicsWorld;
use serde::{Deserialize, Serialize};

use crate::events::{EventQueue, GameEvent};
use crate::health::Destroyed;
use crate::projectiles::{spawn_projectile, ProjectileSpawn};
use crate::vehicle::Vehicle;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ProjectileKind {
    Bullet,
    Missile,
    Laser,
}

/// One weapon on a vehicle.
///
/// Fire rate falls linearly from `max_fire_rate` at zero heat to
/// `min_fire_rate` at full heat.
#[derive(Debug, Clone, PartialEq)]
pub struct Weapon {
    pub id: String,
    pub name: String,
    pub projectile_kind: ProjectileKind,
    pub damage: f32,
    /// Shots per second at full heat.
    pub min_fire_rate: f32,
    /// Shots per second when cold.
    pub max_fire_rate: f32,
    pub heat_per_shot: f32,
    /// Heat shed per second.
    pub heat_dissipation_rate: f32,
    pub projectile_speed: f32,
    pub range: f32,
    /// In [0, 1].
    pub heat_accumulator: f32,
    pub is_on_cooldown: bool,
    pub last_fire_tick: Option<u64>,
}

impl Weapon {
    pub fn new(id: &str, name: &str, projectile_kind: ProjectileKind) -> Self {
        Self {
            id: id.to_string(),
            name: name.to_string(),
            projectile_kind,
            damage: 10.0,
            min_fire_rate: 1.0,
            max_fire_rate: 1.0,
            heat_per_shot: 0.0,
            heat_dissipation_rate: 0.0,
            projectile_speed: 100.0,
            range: 100.0,
            heat_accumulator: 0.0,
            is_on_cooldown: false,
            last_fire_tick: None,
        }
    }

    pub fn with_damage(mut self, damage: f32) -> Self {
        self.damage = damage;
        self
    }

    pub fn with_fire_rate(mut self, min: f32, max: f32) -> Self {
        self.min_fire_rate = min;
        self.max_fire_rate = max;
        self
    }

    pub fn with_heat(mut self, per_shot: f32, dissipation: f32) -> Self {
        self.heat_per_shot = per_shot;
        self.heat_dissipation_rate = dissipation;
        self
    }

    pub fn with_ballistics(mut self, speed: f32, range: f32) -> Self {
        self.projectile_speed = speed;
        self.range = range;
        self
    }

    /// Shots per second at the current heat.
    pub fn current_fire_rate(&self) -> f32 {
        self.max_fire_rate - (self.max_fire_rate - self.min_fire_rate) * self.heat_accumulator
    }

    /// Ticks that must pass between shots at the current heat.
    pub fn cooldown_ticks(&self, tick_rate: u32) -> u64 {
        let rate = self.current_fire_rate();
        if rate <= 0.0 {
            return u64::MAX;
        }
        (tick_rate as f32 / rate).ceil() as u64
    }

    pub fn cooldown_elapsed(&self, tick: u64, tick_rate: u32) -> bool {
        match self.last_fire_tick {
            None => true,
            Some(last) => tick.saturating_sub(last) >= self.cooldown_ticks(tick_rate),
        }
    }

    /// Fire if the cooldown allows it. Returns true when a shot left the barrel.
    pub fn try_fire(&mut self, tick: u64, tick_rate: u32) -> bool {
        if !self.cooldown_elapsed(tick, tick_rate) {
            return false;
        }
        self.is_on_cooldown = true;
        self.last_fire_tick = Some(tick);
        self.heat_accumulator = (self.heat_accumulator + self.heat_per_shot).min(1.0);
        true
    }

    /// Shed heat and clear the cooldown flag once enough ticks have passed.
    pub fn cool(&mut self, tick: u64, tick_rate: u32, dt: f32) {
        self.heat_accumulator = (self.heat_accumulator - self.heat_dissipation_rate * dt).max(0.0);
        if self.is_on_cooldown && self.cooldown_elapsed(tick, tick_rate) {
            self.is_on_cooldown = false;
        }
    }
}

/// Applies weapon selection, heat decay and firing for every vehicle.
#[derive(Debug, Default)]
pub struct WeaponSystem {
    next_projectile: u64,
}

pub struct WeaponTick {
    pub tick: u64,
    pub tick_rate: u32,
    pub timestamp: u64,
    pub dt: f32,
    pub muzzle_offset: f32,
}

struct FireRequest {
    source: String,
    team: Option<Team>,
    weapon: Weapon,
    position: Vec3,
    direction: Vec3,
    id: Option<String>,
}

impl WeaponSystem {
    pub fn update(
        &mut self,
        store: &mut EntityStore,
        physics: &mut PhysicsWorld,
        clock: &WeaponTick,
        events: &mut EventQueue,
    ) -> SimResult<()> {
        let mut requests = Vec::new();

        for (_, (tag, vehicle, transform, input, status, destroyed)) in store
            .world_mut()
            .query_mut::<(
                &EntityTag,
                &mut Vehicle,
                &Transform,
                Option<&ControlInput>,
                Option<&GameStatus>,
                Option<&Destroyed>,
            )>()
        {
            let alive = destroyed.is_none() && !status.is_some_and(GameStatus::is_dead);

            if let (true, Some(select)) = (alive, input.and_then(|i| i.weapon_select)) {
                vehicle.apply_selection(select);
            }
            for weapon in &mut vehicle.weapons {
                weapon.cool(clock.tick, clock.tick_rate, clock.dt);
            }

            let Some(input) = input.filter(|input| alive && input.fire) else {
                continue;
            };
            let Some(weapon) = vehicle.active_mut() else {
                continue;
            };
            if !weapon.try_fire(clock.tick, clock.tick_rate) {
                continue;
            }

            let forward = transform.forward();
            let direction = input
                .aim_point
                .map(|point| (point - transform.position).normalize_or(forward))
                .unwrap_or(forward);
            requests.push(FireRequest {
                source: tag.id.clone(),
                team: status.map(|s| s.team),
                weapon: weapon.clone(),
                position: transform.position + direction * clock.muzzle_offset,
                direction,
                id: input.projectile_id.clone(),
            });
        }

        requests.sort_by(|a, b| a.source.cmp(&b.source));
        for request in requests {
            let id = match request.id {
                Some(id) if store.contains(&id) => {
                    log::debug!("projectile {id} already exists, skipping duplicate shot");
                    continue;
                }
                Some(id) => id,
                None => self.generate_id(store, &request.source),
            };
            let spawned = spawn_projectile(
                store,
                physics,
                ProjectileSpawn {
                    id: id.clone(),
                    kind: request.weapon.projectile_kind,
                    source: request.source.clone(),
                    team: request.team,
                    damage: request.weapon.damage,
                    range: request.weapon.range,
                    position: request.position,
                    velocity: request.direction * request.weapon.projectile_speed,
                    tick: clock.tick,
                    timestamp: clock.timestamp,
                },
            );
            if let Err(err) = spawned {
                log::warn!("shot from {} skipped: {err}", request.source);
                continue;
            }
            events.push(GameEvent::ProjectileFired {
                projectile: id,
                source: request.source,
                weapon: request.weapon.id,
            });
        }
        Ok(())
    }

    fn generate_id(&mut self, store: &EntityStore, source: &str) -> String {
        loop {
            self.next_projectile += 1;
            let id = format!("{source}-shot-{}", self.next_projectile);
            if !store.contains(&id) {
                return id;
            }
        }
    }
}
