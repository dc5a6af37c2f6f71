//! Client-side mirror of the server world.
//!
//! Remote entities are rendered slightly in the past from an
//! [`InterpolationBuffer`]. The local vehicle is predicted from its own inputs
//! and reconciled against every authoritative snapshot.

use std::collections::{HashMap, HashSet, VecDeque};

use engine_core::{
    EntityKind, EntityStore, GameStatus, Quat, SimResult, Team, TickState, Transform, Vec3,
    VehicleKind,
};
use input::ControlInput;
use physics::{integrate, BodyState, PhysicsTuning};

use crate::config::SimConfig;
use crate::health::launch;
use crate::sync::{NetworkEntity, SyncDelta, WorldSnapshot};
use crate::tuning;
use crate::vehicle::{FlightContext, FlightController};

#[derive(Debug, Clone, Copy, PartialEq)]
struct Sample {
    timestamp: u64,
    position: Vec3,
    rotation: Quat,
}

/// Bounded, time-ordered pose history of one remote entity.
#[derive(Debug, Clone)]
pub struct InterpolationBuffer {
    samples: VecDeque<Sample>,
    capacity: usize,
}

impl InterpolationBuffer {
    pub fn new(capacity: usize) -> Self {
        Self {
            samples: VecDeque::with_capacity(capacity),
            capacity: capacity.max(2),
        }
    }

    /// Record a pose. Samples not newer than the latest one are ignored.
    pub fn push(&mut self, timestamp: u64, position: Vec3, rotation: Quat) {
        if self
            .samples
            .back()
            .is_some_and(|last| timestamp <= last.timestamp)
        {
            return;
        }
        self.samples.push_back(Sample {
            timestamp,
            position,
            rotation,
        });
        while self.samples.len() > self.capacity {
            self.samples.pop_front();
        }
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    /// Pose at `render_time`, clamped to the oldest and newest samples.
    pub fn sample(&self, render_time: u64) -> Option<(Vec3, Quat)> {
        let first = self.samples.front()?;
        let last = self.samples.back()?;
        if render_time <= first.timestamp {
            return Some((first.position, first.rotation));
        }
        if render_time >= last.timestamp {
            return Some((last.position, last.rotation));
        }

        let newer = self
            .samples
            .iter()
            .position(|s| s.timestamp > render_time)?;
        let a = self.samples[newer - 1];
        let b = self.samples[newer];
        let t = (render_time - a.timestamp) as f32 / (b.timestamp - a.timestamp) as f32;
        Some((
            a.position.lerp(b.position, t),
            a.rotation.slerp(b.rotation, t),
        ))
    }
}

#[derive(Debug, Clone)]
struct PendingInput {
    input: ControlInput,
    /// Controller state before this input was applied.
    controller: FlightController,
}

/// Local prediction of the player's own vehicle.
#[derive(Debug, Clone)]
pub struct Prediction {
    controller: FlightController,
    transform: Transform,
    tuning: PhysicsTuning,
    pending: VecDeque<PendingInput>,
    dt: f32,
    gravity: f32,
}

impl Prediction {
    /// Start predicting from a server pose, with the flight state the server launches with.
    pub fn new(kind: VehicleKind, transform: Transform, config: &SimConfig) -> Self {
        let mut launched = transform;
        let controller = launch(kind, &mut launched);
        Self {
            controller,
            transform,
            tuning: tuning::vehicle_tuning(kind),
            pending: VecDeque::new(),
            dt: config.dt(),
            gravity: config.gravity,
        }
    }

    pub fn transform(&self) -> &Transform {
        &self.transform
    }

    pub fn pending(&self) -> usize {
        self.pending.len()
    }

    /// Apply an input locally and remember it until the server acknowledges it.
    pub fn predict(&mut self, input: ControlInput) -> Transform {
        self.pending.push_back(PendingInput {
            input: input.clone(),
            controller: self.controller.clone(),
        });
        self.simulate(&input);
        self.transform
    }

    /// Snap to the server's state and replay every input it has not processed yet.
    pub fn reconcile(&mut self, server: &NetworkEntity) {
        if let Some(acked) = server.last_processed_input_tick {
            while self.pending.front().is_some_and(|p| p.input.tick <= acked) {
                self.pending.pop_front();
            }
        }
        if let Some(first) = self.pending.front() {
            self.controller = first.controller.clone();
        }
        self.transform = server.transform();

        let replay: Vec<PendingInput> = self.pending.drain(..).collect();
        for entry in replay {
            self.pending.push_back(PendingInput {
                input: entry.input.clone(),
                controller: self.controller.clone(),
            });
            self.simulate(&entry.input);
        }
    }

    /// One tick of flight model and integration, mirroring the server's order.
    fn simulate(&mut self, input: &ControlInput) {
        let gravity = self.gravity * self.tuning.gravity_scale;
        let mut ctx = FlightContext {
            transform: &mut self.transform,
            tuning: &self.tuning,
            dt: self.dt,
            gravity,
        };
        self.controller.step(&mut ctx, input);

        let mut state = BodyState {
            position: self.transform.position,
            rotation: self.transform.rotation,
            linear_velocity: self.transform.linear_velocity,
            angular_velocity: self.transform.angular_velocity,
        };
        integrate(
            &mut state,
            Vec3::new(0.0, -self.gravity, 0.0),
            self.tuning.gravity_scale,
            self.tuning.linear_drag,
            self.tuning.angular_drag,
            self.dt,
        );
        self.transform.position = state.position;
        self.transform.rotation = state.rotation;
        self.transform.linear_velocity = state.linear_velocity;
        self.transform.angular_velocity = state.angular_velocity;
    }
}

/// Local store of proxies built from server snapshots.
pub struct ClientMirror {
    store: EntityStore,
    buffers: HashMap<String, InterpolationBuffer>,
    local_id: Option<String>,
    prediction: Option<Prediction>,
    interpolation_delay_ms: u64,
    history_capacity: usize,
    config: SimConfig,
    last_tick: Option<u64>,
}

impl ClientMirror {
    pub fn new(local_id: Option<String>, config: &SimConfig) -> Self {
        Self {
            store: EntityStore::new(),
            buffers: HashMap::new(),
            local_id,
            prediction: None,
            interpolation_delay_ms: config.interpolation_delay_ms,
            history_capacity: config.history_capacity,
            config: config.clone(),
            last_tick: None,
        }
    }

    pub fn store(&self) -> &EntityStore {
        &self.store
    }

    pub fn prediction_mut(&mut self) -> Option<&mut Prediction> {
        self.prediction.as_mut()
    }

    /// Apply a snapshot. Stale snapshots (not newer than the last one) are ignored.
    pub fn apply_snapshot(&mut self, snapshot: &WorldSnapshot) -> SimResult<SyncDelta> {
        let mut delta = SyncDelta::default();
        if self.last_tick.is_some_and(|last| snapshot.tick <= last) {
            log::debug!("ignoring stale snapshot for tick {}", snapshot.tick);
            return Ok(delta);
        }
        self.last_tick = Some(snapshot.tick);

        let capacity = self.history_capacity;
        let mut seen: HashSet<&str> = HashSet::with_capacity(snapshot.entities.len());
        for entity in &snapshot.entities {
            seen.insert(entity.id.as_str());
            let is_local = self.local_id.as_deref() == Some(entity.id.as_str());

            if !self.store.contains(&entity.id) {
                self.spawn_proxy(entity)?;
                delta.added.push(entity.id.clone());
            } else {
                self.refresh_proxy(entity)?;
            }

            if is_local {
                self.reconcile_local(entity);
            } else {
                self.buffers
                    .entry(entity.id.clone())
                    .or_insert_with(|| InterpolationBuffer::new(capacity))
                    .push(
                        snapshot.timestamp,
                        entity.position.into(),
                        entity.quaternion.into(),
                    );
            }
        }

        for id in self.store.ids() {
            if !seen.contains(id.as_str()) {
                self.store.despawn(&id);
                self.buffers.remove(&id);
                delta.removed.push(id);
            }
        }
        Ok(delta)
    }

    /// Move remote proxies to their interpolated pose at `now_ms − delay`.
    pub fn sample(&mut self, now_ms: u64) {
        let render_time = now_ms.saturating_sub(self.interpolation_delay_ms);
        for (id, buffer) in &self.buffers {
            let Some((position, rotation)) = buffer.sample(render_time) else {
                continue;
            };
            if let Ok(mut transform) = self.store.get_mut::<Transform>(id) {
                transform.position = position;
                transform.rotation = rotation;
            }
        }
        if let (Some(id), Some(prediction)) = (&self.local_id, &self.prediction) {
            if let Ok(mut transform) = self.store.get_mut::<Transform>(id) {
                *transform = *prediction.transform();
            }
        }
    }

    /// Predict the local vehicle one tick ahead. Returns its new transform.
    pub fn predict(&mut self, input: ControlInput) -> Option<Transform> {
        self.prediction.as_mut().map(|p| p.predict(input))
    }

    pub fn transform_of(&self, id: &str) -> Option<Transform> {
        self.store.get::<Transform>(id).ok().map(|t| *t)
    }

    fn spawn_proxy(&mut self, entity: &NetworkEntity) -> SimResult<()> {
        let transform = entity.transform();
        self.store
            .spawn(entity.id.as_str(), entity.kind, (transform, entity.clone()))?;
        self.refresh_proxy(entity)
    }

    fn refresh_proxy(&mut self, entity: &NetworkEntity) -> SimResult<()> {
        let id = entity.id.as_str();
        self.store.insert(id, entity.clone())?;
        self.store.insert(
            id,
            TickState {
                tick: entity.tick,
                timestamp: entity.timestamp,
                last_processed_input_tick: entity.last_processed_input_tick,
                last_processed_input_timestamp: entity.last_processed_input_timestamp,
            },
        )?;
        if entity.kind == EntityKind::Vehicle || entity.kind == EntityKind::Flag {
            let mut status = GameStatus::new(
                entity.team.unwrap_or(Team::Red),
                entity.max_health.unwrap_or(0.0),
            );
            status.health = entity.health.unwrap_or(0.0);
            status.has_flag = entity.has_flag;
            status.carried_by = entity.carried_by.clone();
            status.at_base = entity.at_base;
            self.store.insert(id, status)?;
        }
        if entity.kind == EntityKind::Projectile {
            *self.store.get_mut::<Transform>(id)? = entity.transform();
        }
        Ok(())
    }

    fn reconcile_local(&mut self, entity: &NetworkEntity) {
        match &mut self.prediction {
            Some(prediction) => prediction.reconcile(entity),
            None => {
                let kind = entity.vehicle_type.unwrap_or_default();
                self.prediction = Some(Prediction::new(kind, entity.transform(), &self.config));
            }
        }
        if let Some(prediction) = &self.prediction {
            if let Ok(mut transform) = self.store.get_mut::<Transform>(&entity.id) {
                *transform = *prediction.transform();
            }
        }
    }
}
