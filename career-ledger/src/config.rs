//! Configuration for the career ledger

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::str::FromStr;

/// Ledger configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Directory holding save files
    pub data_dir: PathBuf,

    /// Save file name inside `data_dir`
    pub save_file: String,

    /// Reconciliation configuration
    pub reconciliation: ReconciliationConfig,

    /// Actor configuration
    pub actor: ActorConfig,

    /// Collect Prometheus metrics
    pub metrics_enabled: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("./data/career"),
            save_file: "career_ledger.sfs".to_string(),
            reconciliation: ReconciliationConfig::default(),
            actor: ActorConfig::default(),
            metrics_enabled: true,
        }
    }
}

/// Reconciliation configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReconciliationConfig {
    /// Drifts strictly smaller than this are absorbed without a correction
    /// entry. The same threshold applies to every resource.
    pub epsilon: Decimal,
}

impl Default for ReconciliationConfig {
    fn default() -> Self {
        Self {
            epsilon: crate::ledger::DEFAULT_EPSILON,
        }
    }
}

/// Actor configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ActorConfig {
    /// Bounded mailbox size
    pub mailbox_capacity: usize,
}

impl Default for ActorConfig {
    fn default() -> Self {
        Self {
            mailbox_capacity: 1000,
        }
    }
}

impl Config {
    /// Load from file
    pub fn from_file(path: impl AsRef<std::path::Path>) -> crate::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_toml(&content)
    }

    /// Parse from TOML text
    pub fn from_toml(content: &str) -> crate::Result<Self> {
        let config: Config = toml::from_str(content)
            .map_err(|e| crate::Error::Config(format!("Failed to parse config: {}", e)))?;
        config.validate()?;
        Ok(config)
    }

    /// Load from environment variables
    pub fn from_env() -> crate::Result<Self> {
        let mut config = Config::default();

        if let Ok(data_dir) = std::env::var("CAREER_LEDGER_DATA_DIR") {
            config.data_dir = PathBuf::from(data_dir);
        }

        if let Ok(save_file) = std::env::var("CAREER_LEDGER_SAVE_FILE") {
            config.save_file = save_file;
        }

        if let Ok(epsilon) = std::env::var("CAREER_LEDGER_EPSILON") {
            config.reconciliation.epsilon = Decimal::from_str(epsilon.trim()).map_err(|e| {
                crate::Error::Config(format!("Invalid CAREER_LEDGER_EPSILON '{}': {}", epsilon, e))
            })?;
        }

        config.validate()?;
        Ok(config)
    }

    /// Check value ranges
    pub fn validate(&self) -> crate::Result<()> {
        if self.reconciliation.epsilon.is_sign_negative() {
            return Err(crate::Error::Config(
                "reconciliation.epsilon must not be negative".to_string(),
            ));
        }
        if self.actor.mailbox_capacity == 0 {
            return Err(crate::Error::Config(
                "actor.mailbox_capacity must be at least 1".to_string(),
            ));
        }
        if self.save_file.trim().is_empty() {
            return Err(crate::Error::Config("save_file must not be empty".to_string()));
        }
        Ok(())
    }
}
