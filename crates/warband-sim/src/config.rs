//! Simulation configuration.
//!
//! Run length, clock rates, warband setup and the movement tuning handed to
//! the core. Loaded from a TOML file, falling back to defaults.

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use tracing::{info, warn};
use warband_ai::{MoveState, MovementConfig};
use warband_common::ConfigResult;

/// Simulation parameters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SimConfig {
    // === Run ===
    /// Fixed updates to simulate
    pub ticks: u32,
    /// Fixed updates per simulated second
    pub tick_rate: u32,
    /// Frames per simulated second feeding the fixed-step clock
    pub frame_rate: u32,

    // === Warbands ===
    /// Followers behind each leader
    pub followers_per_band: u32,
    /// Distance between the two leaders at spawn
    pub band_separation: f32,
    /// Let leaders start battles
    pub allow_confrontation: bool,

    // === Agents ===
    /// Ground speed of every agent
    pub agent_speed: f32,
    /// Ticks of contact needed to kill an NPC
    pub hits_to_kill: u32,

    // === Player ===
    /// Spawn a player who walks across the field
    pub player_enabled: bool,
    /// Player walking speed
    pub player_speed: f32,
    /// Reach of the player's attack
    pub player_attack_radius: f32,
    /// Ticks between player attacks
    pub player_attack_interval: u32,

    // === Movement ===
    /// Tuning handed to the movement core
    pub movement: MovementConfig,
}

impl Default for SimConfig {
    fn default() -> Self {
        Self {
            ticks: 1200,
            tick_rate: 20,
            frame_rate: 60,

            followers_per_band: 4,
            band_separation: 40.0,
            allow_confrontation: true,

            agent_speed: 4.0,
            hits_to_kill: 20,

            player_enabled: true,
            player_speed: 2.0,
            player_attack_radius: 4.0,
            player_attack_interval: 10,

            movement: MovementConfig {
                default_state: MoveState::Null,
                follow_throttle: 1.0,
                location_timeout_ticks: 200,
                ..MovementConfig::default()
            },
        }
    }
}

impl SimConfig {
    /// Load configuration from a specific path.
    /// Returns default config if file doesn't exist or is invalid.
    pub fn load_from<P: AsRef<Path>>(path: P) -> Self {
        let path = path.as_ref();

        if !path.exists() {
            info!("Config file not found, using defaults");
            return Self::default();
        }

        match fs::read_to_string(path) {
            Ok(contents) => match toml::from_str::<Self>(&contents) {
                Ok(mut config) => {
                    config.validate();
                    info!("Loaded config from {}", path.display());
                    config
                },
                Err(e) => {
                    warn!("Failed to parse config file: {e}");
                    Self::default()
                },
            },
            Err(e) => {
                warn!("Failed to read config file: {e}");
                Self::default()
            },
        }
    }

    /// Save configuration to a specific path.
    pub fn save_to<P: AsRef<Path>>(&self, path: P) -> ConfigResult<()> {
        let path = path.as_ref();

        // Create parent directories if needed
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(path, toml::to_string_pretty(self)?)?;

        info!("Saved config to {}", path.display());
        Ok(())
    }

    /// Validate and clamp configuration values to sensible ranges.
    pub fn validate(&mut self) {
        // Run
        self.ticks = self.ticks.clamp(1, 1_000_000);
        self.tick_rate = self.tick_rate.clamp(1, 240);
        self.frame_rate = self.frame_rate.clamp(self.tick_rate, 480);

        // Warbands
        self.followers_per_band = self.followers_per_band.min(32);
        self.band_separation = self.band_separation.clamp(1.0, 1000.0);

        // Agents
        self.agent_speed = self.agent_speed.clamp(0.1, 50.0);
        self.hits_to_kill = self.hits_to_kill.max(1);

        // Player
        self.player_speed = self.player_speed.clamp(0.0, 50.0);
        self.player_attack_radius = self.player_attack_radius.clamp(0.5, 50.0);
        self.player_attack_interval = self.player_attack_interval.max(1);

        self.movement.validate();
    }

    /// Seconds covered by one fixed update.
    #[must_use]
    pub fn fixed_dt(&self) -> f32 {
        1.0 / self.tick_rate.max(1) as f32
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_default_config() {
        let config = SimConfig::default();
        assert_eq!(config.tick_rate, 20);
        assert!((config.fixed_dt() - 0.05).abs() < f32::EPSILON);
        assert!(config.movement.check().is_ok());
    }

    #[test]
    fn test_config_validation() {
        let mut config = SimConfig {
            tick_rate: 0,
            frame_rate: 1,
            hits_to_kill: 0,
            ..SimConfig::default()
        };
        config.validate();

        assert_eq!(config.tick_rate, 1);
        assert!(config.frame_rate >= config.tick_rate);
        assert_eq!(config.hits_to_kill, 1);
    }

    #[test]
    fn test_config_save_load() {
        let temp_dir = TempDir::new().expect("Failed to create temp dir");
        let path = temp_dir.path().join("warband.toml");

        let config = SimConfig {
            followers_per_band: 2,
            player_enabled: false,
            ..SimConfig::default()
        };
        config.save_to(&path).expect("Failed to save config");

        let loaded = SimConfig::load_from(&path);
        assert_eq!(loaded.followers_per_band, 2);
        assert!(!loaded.player_enabled);
        assert_eq!(loaded.movement, config.movement);
    }

    #[test]
    fn test_nested_movement_section() {
        let temp_dir = TempDir::new().expect("Failed to create temp dir");
        let path = temp_dir.path().join("warband.toml");
        fs::write(&path, "ticks = 50\n\n[movement]\nbattle_radius = 10.0\n").expect("write");

        let loaded = SimConfig::load_from(&path);
        assert_eq!(loaded.ticks, 50);
        assert!((loaded.movement.battle_radius - 10.0).abs() < f32::EPSILON);
        assert!((loaded.movement.attack_radius - 2.0).abs() < f32::EPSILON);
    }
}
