//! Fixed-step simulation clock.
//!
//! Simulation time is counted in ticks. Timestamps derived from the tick
//! count are what ends up in snapshots, so two runs with the same inputs
//! produce identical timestamps regardless of wall-clock jitter.

use std::time::{Duration, Instant};

/// Tick counter plus a wall-clock accumulator for driving a real-time loop.
#[derive(Debug)]
pub struct Time {
    tick_rate: u32,
    fixed_timestep: Duration,
    tick: u64,
    last_frame: Instant,
    accumulator: Duration,
    /// Longest wall-clock frame fed into the accumulator; keeps a stalled
    /// host from queueing a burst of catch-up ticks.
    max_frame_time: Duration,
}

impl Default for Time {
    fn default() -> Self {
        Self::new(60)
    }
}

impl Time {
    pub fn new(tick_rate: u32) -> Self {
        let tick_rate = tick_rate.max(1);
        Self {
            tick_rate,
            fixed_timestep: Duration::from_secs_f64(1.0 / tick_rate as f64),
            tick: 0,
            last_frame: Instant::now(),
            accumulator: Duration::ZERO,
            max_frame_time: Duration::from_millis(250),
        }
    }

    /// Sample the wall clock and feed the elapsed time into the accumulator.
    pub fn update(&mut self) {
        let now = Instant::now();
        let delta = now - self.last_frame;
        self.last_frame = now;
        self.advance_by(delta);
    }

    /// Feed an explicit duration into the accumulator.
    pub fn advance_by(&mut self, delta: Duration) {
        self.accumulator += delta.min(self.max_frame_time);
    }

    /// Consume one fixed step from the accumulator if enough time has built up.
    pub fn should_fixed_update(&mut self) -> bool {
        if self.accumulator >= self.fixed_timestep {
            self.accumulator -= self.fixed_timestep;
            true
        } else {
            false
        }
    }

    /// Time left until the next fixed step is due.
    pub fn until_next_tick(&self) -> Duration {
        self.fixed_timestep.saturating_sub(self.accumulator)
    }

    /// Move the tick counter forward by one and return the new tick.
    pub fn advance_tick(&mut self) -> u64 {
        self.tick += 1;
        self.tick
    }

    pub fn tick(&self) -> u64 {
        self.tick
    }

    pub fn tick_rate(&self) -> u32 {
        self.tick_rate
    }

    /// Simulation timestamp in milliseconds for the current tick.
    pub fn timestamp_ms(&self) -> u64 {
        Self::tick_to_ms(self.tick, self.tick_rate)
    }

    pub fn tick_to_ms(tick: u64, tick_rate: u32) -> u64 {
        tick * 1000 / tick_rate.max(1) as u64
    }

    /// Number of whole ticks covering `seconds`, rounding up.
    pub fn seconds_to_ticks(&self, seconds: f32) -> u64 {
        (seconds.max(0.0) * self.tick_rate as f32).ceil() as u64
    }
}
