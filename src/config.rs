// Configuration module for reading Arena.toml
// Holds the tunables for the round loop, AI agents, pathfinding and game rules

use serde::Deserialize;
use std::fs;
use std::path::Path;
use std::time::Duration;

use crate::strategy::StrategyKind;

/// Main configuration structure containing all tunable parameters
#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    pub timing: TimingConfig,
    pub agents: AgentsConfig,
    pub pathfinding: PathfindingConfig,
    pub rules: RulesConfig,
    pub debug: DebugConfig,
}

/// Round loop pacing
#[derive(Debug, Deserialize, Clone)]
pub struct TimingConfig {
    pub tick_interval_ms: u64,
    pub max_ticks: u64,
}

impl TimingConfig {
    pub fn tick_interval(&self) -> Duration {
        Duration::from_millis(self.tick_interval_ms)
    }
}

/// AI agent scheduling and supervision
#[derive(Debug, Deserialize, Clone)]
pub struct AgentsConfig {
    pub think_interval_ms: u64,
    pub shutdown_grace_ms: u64,
    pub default_strategy: StrategyKind,
}

impl AgentsConfig {
    pub fn think_interval(&self) -> Duration {
        Duration::from_millis(self.think_interval_ms)
    }

    pub fn shutdown_grace(&self) -> Duration {
        Duration::from_millis(self.shutdown_grace_ms)
    }
}

/// Weights for the pathfinding strategy
#[derive(Debug, Deserialize, Clone)]
pub struct PathfindingConfig {
    /// Extra reachable cells required beyond the snake's own length
    pub space_safety_margin: usize,
    pub weight_space: i32,
    pub weight_apple_distance: i32,
    /// Penalty for entering a cell another head can also reach next tick
    pub head_contest_penalty: i32,
    pub keep_direction_bonus: i32,
}

/// Simulation rules not carried by the level
#[derive(Debug, Deserialize, Clone)]
pub struct RulesConfig {
    pub effect_lifetime_ticks: u32,
    /// Fixed RNG seed for reproducible rounds; random when absent
    #[serde(default)]
    pub seed: Option<u64>,
}

/// Round log configuration
#[derive(Debug, Deserialize, Clone)]
pub struct DebugConfig {
    pub enabled: bool,
    pub log_file_path: String,
}

impl Config {
    /// Loads configuration from a TOML file
    ///
    /// # Arguments
    /// * `path` - Path to the Arena.toml configuration file
    ///
    /// # Returns
    /// * `Result<Config, String>` - Parsed configuration or error message
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, String> {
        let contents = fs::read_to_string(path.as_ref())
            .map_err(|e| format!("Failed to read config file: {}", e))?;

        toml::from_str(&contents).map_err(|e| format!("Failed to parse config file: {}", e))
    }

    /// Loads default configuration from Arena.toml in the project root
    pub fn load_default() -> Result<Self, String> {
        Self::from_file("Arena.toml")
    }

    /// Creates a configuration with hardcoded default values as fallback
    /// This should match the constants defined in Arena.toml
    pub fn default_hardcoded() -> Self {
        Config {
            timing: TimingConfig {
                tick_interval_ms: 67,
                max_ticks: 3000,
            },
            agents: AgentsConfig {
                think_interval_ms: 30,
                shutdown_grace_ms: 250,
                default_strategy: StrategyKind::Pathfinding,
            },
            pathfinding: PathfindingConfig {
                space_safety_margin: 2,
                weight_space: 10,
                weight_apple_distance: 25,
                head_contest_penalty: 5000,
                keep_direction_bonus: 5,
            },
            rules: RulesConfig {
                effect_lifetime_ticks: 6,
                seed: None,
            },
            debug: DebugConfig {
                enabled: false,
                log_file_path: "arena_round.jsonl".to_string(),
            },
        }
    }

    /// Attempts to load from file, falls back to hardcoded defaults on error
    pub fn load_or_default() -> Self {
        Self::load_default().unwrap_or_else(|e| {
            log::warn!("Could not load Arena.toml ({}), using hardcoded defaults", e);
            Self::default_hardcoded()
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_can_be_created() {
        let config = Config::default_hardcoded();
        assert_eq!(config.timing.tick_interval(), Duration::from_millis(67));
        assert_eq!(config.agents.default_strategy, StrategyKind::Pathfinding);
    }

    #[test]
    fn test_arena_toml_can_be_parsed() {
        let result = Config::from_file("Arena.toml");
        assert!(
            result.is_ok(),
            "Failed to parse Arena.toml: {:?}",
            result.err()
        );
    }

    #[test]
    fn test_all_config_values_match_hardcoded_defaults() {
        let file_config = Config::from_file("Arena.toml").expect("Arena.toml should be parseable");
        let hardcoded = Config::default_hardcoded();

        assert_eq!(file_config.timing.tick_interval_ms, hardcoded.timing.tick_interval_ms);
        assert_eq!(file_config.timing.max_ticks, hardcoded.timing.max_ticks);
        assert_eq!(file_config.agents.think_interval_ms, hardcoded.agents.think_interval_ms);
        assert_eq!(file_config.agents.shutdown_grace_ms, hardcoded.agents.shutdown_grace_ms);
        assert_eq!(file_config.agents.default_strategy, hardcoded.agents.default_strategy);
        assert_eq!(
            file_config.pathfinding.space_safety_margin,
            hardcoded.pathfinding.space_safety_margin
        );
        assert_eq!(file_config.pathfinding.weight_space, hardcoded.pathfinding.weight_space);
        assert_eq!(
            file_config.pathfinding.weight_apple_distance,
            hardcoded.pathfinding.weight_apple_distance
        );
        assert_eq!(
            file_config.pathfinding.head_contest_penalty,
            hardcoded.pathfinding.head_contest_penalty
        );
        assert_eq!(
            file_config.pathfinding.keep_direction_bonus,
            hardcoded.pathfinding.keep_direction_bonus
        );
        assert_eq!(
            file_config.rules.effect_lifetime_ticks,
            hardcoded.rules.effect_lifetime_ticks
        );
        assert_eq!(file_config.rules.seed, hardcoded.rules.seed);
        assert_eq!(file_config.debug.enabled, hardcoded.debug.enabled);
        assert_eq!(file_config.debug.log_file_path, hardcoded.debug.log_file_path);
    }

    #[test]
    fn test_invalid_toml_returns_error() {
        let result = Config::from_file("nonexistent.toml");
        assert!(result.is_err());
    }
}
