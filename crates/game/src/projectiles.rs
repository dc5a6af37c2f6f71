//! Projectile lifecycle: spawning, range exhaustion and impact consumption.

use engine_core::{
    EntityKind, EntityStore, EntityTag, GameStatus, SimResult, Team, TickState, Transform, Vec3,
};
use physics::{PhysicsComponent, PhysicsTuning, PhysicsWorld, PROJECTILE_MASS};

use crate::events::{EventQueue, GameEvent};
use crate::health::Destroyed;
use crate::weapons::ProjectileKind;

/// Where and what a projectile struck.
#[derive(Debug, Clone, PartialEq)]
pub struct Impact {
    pub position: Vec3,
    pub normal: Vec3,
    pub target_id: String,
    pub target_kind: EntityKind,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Projectile {
    pub kind: ProjectileKind,
    pub damage: f32,
    pub range: f32,
    /// Only ever grows.
    pub distance_traveled: f32,
    pub source_id: String,
    pub team: Option<Team>,
    /// First impact reported by the collision system, consumed next projectile pass.
    pub impact: Option<Impact>,
}

impl Projectile {
    pub fn out_of_range(&self) -> bool {
        self.distance_traveled >= self.range
    }
}

pub struct ProjectileSpawn {
    pub id: String,
    pub kind: ProjectileKind,
    pub source: String,
    pub team: Option<Team>,
    pub damage: f32,
    pub range: f32,
    pub position: Vec3,
    pub velocity: Vec3,
    pub tick: u64,
    pub timestamp: u64,
}

/// Create the projectile entity and its body.
pub fn spawn_projectile(
    store: &mut EntityStore,
    physics: &mut PhysicsWorld,
    spawn: ProjectileSpawn,
) -> SimResult<()> {
    let mut transform = Transform::from_position(spawn.position);
    transform.look_along(spawn.velocity);
    transform.linear_velocity = spawn.velocity;

    let projectile = Projectile {
        kind: spawn.kind,
        damage: spawn.damage,
        range: spawn.range,
        distance_traveled: 0.0,
        source_id: spawn.source,
        team: spawn.team,
        impact: None,
    };
    let tick = TickState {
        tick: spawn.tick,
        timestamp: spawn.timestamp,
        ..Default::default()
    };
    store.spawn(
        spawn.id.as_str(),
        EntityKind::Projectile,
        (transform, projectile, tick),
    )?;

    match physics.create_projectile_body(&spawn.id, spawn.position, spawn.velocity) {
        Ok(body) => {
            let tuning = PhysicsTuning {
                mass: PROJECTILE_MASS,
                linear_drag: 0.0,
                angular_drag: 0.0,
                gravity_scale: 0.0,
                ..Default::default()
            };
            store.insert(&spawn.id, PhysicsComponent::new(body, tuning))
        }
        Err(err) => {
            store.despawn(&spawn.id);
            Err(err)
        }
    }
}

/// Advances traveled distance and removes spent projectiles.
#[derive(Debug, Default)]
pub struct ProjectileSystem;

struct Spent {
    id: String,
    source: String,
    team: Option<Team>,
    damage: f32,
    impact: Option<Impact>,
}

impl ProjectileSystem {
    pub fn update(
        &mut self,
        store: &mut EntityStore,
        physics: &mut PhysicsWorld,
        dt: f32,
        friendly_fire: bool,
        events: &mut EventQueue,
    ) -> SimResult<()> {
        let mut spent = Vec::new();
        for (_, (tag, projectile, transform)) in store
            .world_mut()
            .query_mut::<(&EntityTag, &mut Projectile, &Transform)>()
        {
            let impact = projectile.impact.take();
            if impact.is_none() {
                projectile.distance_traveled += transform.linear_velocity.length() * dt;
                if !projectile.out_of_range() {
                    continue;
                }
            }
            spent.push(Spent {
                id: tag.id.clone(),
                source: projectile.source_id.clone(),
                team: projectile.team,
                damage: projectile.damage,
                impact,
            });
        }
        spent.sort_by(|a, b| a.id.cmp(&b.id));

        for projectile in spent {
            if let Some(impact) = &projectile.impact {
                let hits_vehicle = impact.target_kind == EntityKind::Vehicle
                    && impact.target_id != projectile.source;
                if hits_vehicle {
                    match apply_damage(store, &impact.target_id, &projectile, friendly_fire) {
                        Ok(true) => events.push(GameEvent::Hit {
                            projectile: projectile.id.clone(),
                            source: projectile.source.clone(),
                            target: impact.target_id.clone(),
                            damage: projectile.damage,
                        }),
                        Ok(false) => {}
                        Err(err) => log::warn!("projectile {} skipped: {err}", projectile.id),
                    }
                }
            } else {
                log::debug!("projectile {} reached its range", projectile.id);
            }
            physics.remove_body(&projectile.id);
            store.despawn(&projectile.id);
        }
        Ok(())
    }
}

/// Returns whether damage was dealt.
fn apply_damage(
    store: &EntityStore,
    target: &str,
    projectile: &Spent,
    friendly_fire: bool,
) -> SimResult<bool> {
    if !store.contains(target) || store.has::<Destroyed>(target) {
        return Ok(false);
    }
    let mut status = store.get_mut::<GameStatus>(target)?;
    if status.is_dead() {
        return Ok(false);
    }
    if projectile.team == Some(status.team) && !friendly_fire {
        return Ok(false);
    }
    status.take_damage(projectile.damage);
    Ok(true)
}
