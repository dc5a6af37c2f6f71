//! Simulation configuration. Loaded from skyflag.ron at startup.

use engine_core::{Team, Vec3};
use physics::BackendKind;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

pub const CONFIG_FILE: &str = "skyflag.ron";

/// Home positions of both teams' flags.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TeamBases {
    pub red: Vec3,
    pub blue: Vec3,
}

impl Default for TeamBases {
    fn default() -> Self {
        Self {
            red: Vec3::new(0.0, 2.0, -120.0),
            blue: Vec3::new(0.0, 2.0, 120.0),
        }
    }
}

impl TeamBases {
    pub fn base(&self, team: Team) -> Vec3 {
        match team {
            Team::Red => self.red,
            Team::Blue => self.blue,
        }
    }
}

/// Room and simulation settings. Every field falls back to its default when absent.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SimConfig {
    /// Fixed simulation rate in Hz.
    pub tick_rate: u32,
    pub physics_backend: BackendKind,
    pub physics_substeps: u32,
    /// Longest step handed to physics in one tick, in seconds.
    pub max_step_dt: f32,
    /// Downward acceleration in m/s².
    pub gravity: f32,
    /// Distance at which a vehicle picks up an enemy flag.
    pub capture_radius: f32,
    /// Distance from its own base at which a carrier scores.
    pub return_radius: f32,
    pub respawn_ticks: u64,
    pub friendly_fire: bool,
    pub input_buffer_capacity: usize,
    /// Client render delay behind the newest snapshot, in milliseconds.
    pub interpolation_delay_ms: u64,
    pub history_capacity: usize,
    /// Distance in front of the vehicle where projectiles spawn.
    pub muzzle_offset: f32,
    /// Height above the base at which vehicles spawn.
    pub spawn_altitude: f32,
    pub team_bases: TeamBases,
    /// Seed for spawn placement jitter.
    pub seed: u64,
}

impl Default for SimConfig {
    fn default() -> Self {
        Self {
            tick_rate: 60,
            physics_backend: BackendKind::Rapier,
            physics_substeps: 1,
            max_step_dt: 0.1,
            gravity: 9.81,
            capture_radius: 5.0,
            return_radius: 10.0,
            respawn_ticks: 180,
            friendly_fire: false,
            input_buffer_capacity: 64,
            interpolation_delay_ms: 100,
            history_capacity: 32,
            muzzle_offset: 3.0,
            spawn_altitude: 15.0,
            team_bases: TeamBases::default(),
            seed: 42,
        }
    }
}

impl SimConfig {
    /// Load config from `skyflag.ron`. If the file is missing or invalid, returns default config.
    pub fn load() -> Self {
        Self::load_from(&config_path())
    }

    pub fn load_from(path: &Path) -> Self {
        if let Ok(data) = std::fs::read_to_string(path) {
            match ron::from_str::<SimConfig>(&data) {
                Ok(c) => return c.sanitized(),
                Err(e) => log::warn!("Invalid config at {:?}: {}, using defaults", path, e),
            }
        } else {
            log::warn!("No config at {:?}, using defaults", path);
        }
        Self::default()
    }

    /// Clamp values that would stall or divide the fixed step.
    pub fn sanitized(mut self) -> Self {
        if self.tick_rate == 0 {
            log::warn!("tick_rate 0 is invalid, using 1");
            self.tick_rate = 1;
        }
        self.physics_substeps = self.physics_substeps.max(1);
        self
    }

    /// Fixed timestep in seconds.
    pub fn dt(&self) -> f32 {
        1.0 / self.tick_rate.max(1) as f32
    }
}

fn config_path() -> PathBuf {
    std::env::current_dir()
        .unwrap_or_else(|_| PathBuf::from("."))
        .join(CONFIG_FILE)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partial_config_keeps_defaults() {
        let config: SimConfig =
            ron::from_str("(tick_rate: 30, physics_backend: Simple, friendly_fire: true)").unwrap();
        assert_eq!(config.tick_rate, 30);
        assert_eq!(config.physics_backend, BackendKind::Simple);
        assert!(config.friendly_fire);
        assert_eq!(config.capture_radius, 5.0);
        assert_eq!(config.input_buffer_capacity, 64);
    }

    #[test]
    fn missing_file_falls_back_to_defaults() {
        let config = SimConfig::load_from(Path::new("/nonexistent/skyflag.ron"));
        assert_eq!(config.tick_rate, 60);
        assert!((config.dt() - 1.0 / 60.0).abs() < 1e-9);
    }

    #[test]
    fn config_file_loads_and_zero_tick_rate_is_clamped() {
        let path = std::env::temp_dir().join(format!("skyflag-test-{}.ron", std::process::id()));
        std::fs::write(&path, "(tick_rate: 0, respawn_ticks: 90)").unwrap();
        let loaded = SimConfig::load_from(&path);
        let _ = std::fs::remove_file(&path);
        assert_eq!(loaded.respawn_ticks, 90);
        assert_eq!(loaded.tick_rate, 1);
        assert_eq!(loaded.team_bases, TeamBases::default());
    }
}
