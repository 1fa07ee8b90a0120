//! Movement tuning shared by every NPC.
//!
//! Built once at startup (defaults, a TOML file, or code) and handed to the
//! manager. Nothing in the core mutates it afterwards.

use crate::formation::FormationLayout;
use crate::state::MoveState;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use tracing::{info, warn};
use warband_common::{ConfigError, ConfigResult};

/// Movement tuning parameters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MovementConfig {
    // === Radii ===
    /// Opposing leaders within this distance are paired for a rendezvous
    pub engagement_radius: f32,
    /// A leader on the march this close to an opposing leader or agent starts
    /// a battle. This gate uses its own radius, not `engagement_radius`, so
    /// leaders can pair up from far off and only fight once they meet.
    pub battle_radius: f32,
    /// Close enough to hit
    pub attack_radius: f32,
    /// Player targets farther than this are dropped
    pub disengage_radius: f32,
    /// Distance at which a destination counts as reached
    pub arrival_tolerance: f32,

    // === Timers ===
    /// Seconds between follow move commands
    pub follow_throttle: f32,
    /// Ticks without arrival before a location command is considered stale
    pub location_timeout_ticks: u32,

    // === Behavior ===
    /// State NPCs return to when nothing else applies
    pub default_state: MoveState,
    /// Formation slot layout behind a leader
    pub formation: FormationLayout,
}

impl Default for MovementConfig {
    fn default() -> Self {
        Self {
            engagement_radius: 30.0,
            battle_radius: 8.0,
            attack_radius: 2.0,
            disengage_radius: 25.0,
            arrival_tolerance: 1.0,

            follow_throttle: 50.0,
            location_timeout_ticks: 600,

            default_state: MoveState::Null,
            formation: FormationLayout::default(),
        }
    }
}

impl MovementConfig {
    /// Parses a config from TOML. Missing keys take their defaults.
    pub fn from_toml_str(contents: &str) -> ConfigResult<Self> {
        let mut config: Self = toml::from_str(contents)?;
        config.validate();
        Ok(config)
    }

    /// Load configuration from a path.
    /// Returns default config if the file doesn't exist or is invalid.
    pub fn load_from<P: AsRef<Path>>(path: P) -> Self {
        let path = path.as_ref();

        if !path.exists() {
            info!("Movement config not found, using defaults");
            return Self::default();
        }

        match fs::read_to_string(path) {
            Ok(contents) => match Self::from_toml_str(&contents) {
                Ok(config) => {
                    info!("Loaded movement config from {}", path.display());
                    config
                },
                Err(e) => {
                    warn!("Failed to parse movement config: {e}");
                    Self::default()
                },
            },
            Err(e) => {
                warn!("Failed to read movement config: {e}");
                Self::default()
            },
        }
    }

    /// Save configuration to a path.
    pub fn save_to<P: AsRef<Path>>(&self, path: P) -> ConfigResult<()> {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(path, toml::to_string_pretty(self)?)?;
        Ok(())
    }

    /// Clamp values into ranges the state machine can work with.
    pub fn validate(&mut self) {
        self.arrival_tolerance = self.arrival_tolerance.clamp(0.05, 10.0);
        self.attack_radius = self.attack_radius.max(self.arrival_tolerance);
        // Radii must nest: attack <= battle <= engagement.
        self.battle_radius = self.battle_radius.max(self.attack_radius);
        self.engagement_radius = self.engagement_radius.max(self.battle_radius);
        self.disengage_radius = self.disengage_radius.max(self.attack_radius);

        self.follow_throttle = self.follow_throttle.max(0.0);
        self.location_timeout_ticks = self.location_timeout_ticks.max(1);
        self.formation.validate();
    }

    /// Rejects configs that cannot be fixed by clamping.
    pub fn check(&self) -> ConfigResult<()> {
        let radii = [
            ("engagement_radius", self.engagement_radius),
            ("battle_radius", self.battle_radius),
            ("attack_radius", self.attack_radius),
            ("disengage_radius", self.disengage_radius),
            ("follow_throttle", self.follow_throttle),
        ];
        for (field, value) in radii {
            if !value.is_finite() {
                return Err(ConfigError::Invalid {
                    field,
                    reason: format!("{value} is not finite"),
                });
            }
        }
        if matches!(self.default_state, MoveState::Flee | MoveState::MoveToPlayer) {
            return Err(ConfigError::Invalid {
                field: "default_state",
                reason: format!("{} cannot be a default state", self.default_state),
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_default_config() {
        let config = MovementConfig::default();
        assert_eq!(config.default_state, MoveState::Null);
        assert!((config.follow_throttle - 50.0).abs() < f32::EPSILON);
        assert!(config.attack_radius < config.battle_radius);
        assert!(config.battle_radius < config.engagement_radius);
    }

    #[test]
    fn test_config_validation_nests_radii() {
        let mut config = MovementConfig {
            engagement_radius: 1.0,
            battle_radius: 0.5,
            attack_radius: 3.0,
            ..MovementConfig::default()
        };
        config.validate();

        assert!((config.battle_radius - 3.0).abs() < f32::EPSILON);
        assert!((config.engagement_radius - 3.0).abs() < f32::EPSILON);
    }

    #[test]
    fn test_partial_toml_uses_defaults() {
        let config = MovementConfig::from_toml_str(
            "default_state = \"MoveToLocation\"\nfollow_throttle = 2.5\n",
        )
        .expect("parse");

        assert_eq!(config.default_state, MoveState::MoveToLocation);
        assert!((config.follow_throttle - 2.5).abs() < f32::EPSILON);
        assert!((config.attack_radius - 2.0).abs() < f32::EPSILON);
    }

    #[test]
    fn test_bad_toml_is_error() {
        let result = MovementConfig::from_toml_str("follow_throttle = \"soon\"");
        assert!(matches!(result, Err(ConfigError::Parse(_))));
    }

    #[test]
    fn test_check_rejects_flee_default() {
        let config = MovementConfig {
            default_state: MoveState::Flee,
            ..MovementConfig::default()
        };
        assert!(config.check().is_err());
        assert!(MovementConfig::default().check().is_ok());
    }

    #[test]
    fn test_config_save_load() {
        let temp_dir = TempDir::new().expect("Failed to create temp dir");
        let path = temp_dir.path().join("movement.toml");

        let config = MovementConfig {
            battle_radius: 12.0,
            default_state: MoveState::Follow,
            ..MovementConfig::default()
        };
        config.save_to(&path).expect("Failed to save config");

        let loaded = MovementConfig::load_from(&path);
        assert_eq!(loaded, config);
    }

    #[test]
    fn test_config_load_missing_file() {
        let config = MovementConfig::load_from("/nonexistent/path/movement.toml");
        assert_eq!(config, MovementConfig::default());
    }
}
