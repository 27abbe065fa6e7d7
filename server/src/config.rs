//! Server and game-rule configuration.
//!
//! Every field has a default, so a config file only needs the values it
//! changes. Command-line flags are applied on top in `main`.

use serde::{Deserialize, Serialize};
use shared::Action;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("failed to parse config file: {0}")]
    Parse(#[from] serde_json::Error),
    #[error("invalid config: {0}")]
    Invalid(String),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct UniverseConfig {
    pub width: u32,
    pub height: u32,
    pub trading_post_count: usize,
    /// Placement attempts allowed per requested post before giving up.
    pub placement_attempts_per_post: usize,
    pub seed: Option<u64>,
}

impl Default for UniverseConfig {
    fn default() -> Self {
        Self {
            width: 50,
            height: 50,
            trading_post_count: 150,
            placement_attempts_per_post: 20,
            seed: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EnergyConfig {
    pub max_energy: u32,
    /// Game milliseconds per regenerated energy point.
    pub regen_interval_ms: u64,
    pub move_cost: u32,
    pub trade_cost: u32,
}

impl EnergyConfig {
    pub fn base_cost(&self, action: Action) -> u32 {
        match action {
            Action::Move => self.move_cost,
            Action::Trade => self.trade_cost,
        }
    }
}

impl Default for EnergyConfig {
    fn default() -> Self {
        Self {
            max_energy: 2400,
            regen_interval_ms: 36_000,
            move_cost: 10,
            trade_cost: 5,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EconomyConfig {
    pub starting_credits: u64,
    pub decay_factor: f64,
    pub min_efficiency: f64,
    pub full_regen_duration_ms: u64,
    pub cargo_upgrade_base_cost: u64,
    pub cargo_upgrade_cost_multiplier: f64,
    pub cargo_capacity_per_upgrade: u32,
    pub cargo_bonus_per_unit: f64,
}

impl Default for EconomyConfig {
    fn default() -> Self {
        Self {
            starting_credits: 1000,
            decay_factor: 0.85,
            min_efficiency: 0.05,
            full_regen_duration_ms: 24 * 60 * 60 * 1000,
            cargo_upgrade_base_cost: 1000,
            cargo_upgrade_cost_multiplier: 1.5,
            cargo_capacity_per_upgrade: 5,
            cargo_bonus_per_unit: 0.02,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub max_clients: usize,
    pub heartbeat_interval_secs: u64,
    /// Heartbeats a client may miss before it is dropped.
    pub missed_heartbeats: u32,
    pub status_interval_secs: u64,
}

impl ServerConfig {
    pub fn heartbeat_interval(&self) -> Duration {
        Duration::from_secs(self.heartbeat_interval_secs)
    }

    /// Silence after which a connection counts as dead.
    pub fn client_timeout(&self) -> Duration {
        self.heartbeat_interval() * self.missed_heartbeats
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            max_clients: 64,
            heartbeat_interval_secs: 20,
            missed_heartbeats: 3,
            status_interval_secs: 60,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GameConfig {
    pub universe: UniverseConfig,
    pub energy: EnergyConfig,
    pub economy: EconomyConfig,
    pub server: ServerConfig,
    /// Game time runs this many times faster than wall time.
    pub time_acceleration: f64,
}

impl Default for GameConfig {
    fn default() -> Self {
        Self {
            universe: UniverseConfig::default(),
            energy: EnergyConfig::default(),
            economy: EconomyConfig::default(),
            server: ServerConfig::default(),
            time_acceleration: 1.0,
        }
    }
}

impl GameConfig {
    pub fn from_json(text: &str) -> Result<Self, ConfigError> {
        let config: GameConfig = serde_json::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_json(&text)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let universe = &self.universe;
        if universe.width == 0 || universe.height == 0 {
            return Err(ConfigError::Invalid(format!(
                "grid must be at least 1x1, got {}x{}",
                universe.width, universe.height
            )));
        }

        let economy = &self.economy;
        if !(economy.min_efficiency > 0.0 && economy.min_efficiency <= 1.0) {
            return Err(ConfigError::Invalid(format!(
                "min_efficiency must be in (0, 1], got {}",
                economy.min_efficiency
            )));
        }
        if !(economy.decay_factor > 0.0 && economy.decay_factor <= 1.0) {
            return Err(ConfigError::Invalid(format!(
                "decay_factor must be in (0, 1], got {}",
                economy.decay_factor
            )));
        }
        if economy.full_regen_duration_ms == 0 {
            return Err(ConfigError::Invalid(
                "full_regen_duration_ms must be positive".to_string(),
            ));
        }

        if self.energy.regen_interval_ms == 0 {
            return Err(ConfigError::Invalid(
                "regen_interval_ms must be positive".to_string(),
            ));
        }

        if !(self.time_acceleration > 0.0 && self.time_acceleration.is_finite()) {
            return Err(ConfigError::Invalid(format!(
                "time_acceleration must be positive, got {}",
                self.time_acceleration
            )));
        }

        if self.server.heartbeat_interval_secs == 0 || self.server.status_interval_secs == 0 {
            return Err(ConfigError::Invalid(
                "server intervals must be positive".to_string(),
            ));
        }
        if self.server.missed_heartbeats == 0 {
            return Err(ConfigError::Invalid(
                "missed_heartbeats must be at least 1".to_string(),
            ));
        }

        Ok(())
    }
}
