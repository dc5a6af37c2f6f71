//! Tick-ordered input buffering.

use std::collections::{HashMap, VecDeque};

use engine_core::{EntityStore, SimResult, TickState};

use crate::ControlInput;

pub const DEFAULT_INPUT_CAPACITY: usize = 64;

/// Per-entity bounded queues of inputs waiting for the next tick.
#[derive(Debug)]
pub struct InputSystem {
    buffers: HashMap<String, VecDeque<ControlInput>>,
    capacity: usize,
}

impl Default for InputSystem {
    fn default() -> Self {
        Self::new(DEFAULT_INPUT_CAPACITY)
    }
}

impl InputSystem {
    pub fn new(capacity: usize) -> Self {
        Self {
            buffers: HashMap::new(),
            capacity: capacity.max(1),
        }
    }

    /// Queue an input for an entity, evicting the oldest once the buffer is full.
    pub fn add_input(&mut self, id: &str, input: ControlInput) {
        let buffer = self.buffers.entry(id.to_string()).or_default();
        buffer.push_back(input);
        while buffer.len() > self.capacity {
            if let Some(dropped) = buffer.pop_front() {
                log::debug!("input buffer for {id} full, dropped tick {}", dropped.tick);
            }
        }
    }

    /// Number of inputs queued for an entity.
    pub fn pending(&self, id: &str) -> usize {
        self.buffers.get(id).map_or(0, VecDeque::len)
    }

    pub fn remove_entity(&mut self, id: &str) {
        self.buffers.remove(id);
    }

    /// Apply buffered inputs in tick order, skipping ticks already processed.
    ///
    /// Several fresh inputs in one update are merged: the newest one's held
    /// keys win, `fire` is set if any of them fired, the last weapon selection
    /// wins and mouse deltas add up.
    pub fn update(&mut self, store: &mut EntityStore) -> SimResult<()> {
        let mut ids: Vec<String> = self.buffers.keys().cloned().collect();
        ids.sort();

        for id in ids {
            let Some(mut buffer) = self.buffers.remove(&id) else {
                continue;
            };
            if !store.contains(&id) {
                log::debug!("dropping {} inputs for unknown entity {id}", buffer.len());
                continue;
            }

            buffer.make_contiguous().sort_by_key(|input| input.tick);

            let tick_state = match store.get::<TickState>(&id) {
                Ok(state) => *state,
                Err(_) => TickState::default(),
            };
            let mut last = tick_state.last_processed_input_tick;

            let mut merged: Option<ControlInput> = None;
            for input in buffer.drain(..) {
                if last.is_some_and(|last| input.tick <= last) {
                    continue;
                }
                last = Some(input.tick);
                merged = Some(match merged {
                    None => input,
                    Some(previous) => merge(previous, input),
                });
            }

            let Some(applied) = merged else {
                continue;
            };
            let updated = TickState {
                last_processed_input_tick: Some(applied.tick),
                last_processed_input_timestamp: Some(applied.timestamp),
                ..tick_state
            };
            store.insert(&id, updated)?;
            store.insert(&id, applied)?;
        }
        Ok(())
    }
}

fn merge(previous: ControlInput, newer: ControlInput) -> ControlInput {
    ControlInput {
        fire: previous.fire || newer.fire,
        weapon_select: newer.weapon_select.or(previous.weapon_select),
        mouse_delta: previous.mouse_delta + newer.mouse_delta,
        aim_point: newer.aim_point.or(previous.aim_point),
        projectile_id: newer.projectile_id.or(previous.projectile_id),
        ..newer
    }
}
