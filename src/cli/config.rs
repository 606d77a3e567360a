//! CLI Configuration.
//!
//! Configuration for the operator tool: liquidation parameters, log filter
//! and output format. Loaded from JSON, then overridden by `MUSD_*`
//! environment variables.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;

use super::output::OutputFormat;
use crate::core::config::LiquidationParams;
use crate::utils::constants::MIN_LIQUIDATION_AMOUNT;

// ═══════════════════════════════════════════════════════════════════════════════
// CORE CONFIGURATION
// ═══════════════════════════════════════════════════════════════════════════════

/// Operator configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CoreConfig {
    /// Liquidation engine parameters
    pub liquidation: LiquidationParams,
    /// Tracing filter directive
    pub log_filter: String,
    /// Report format
    pub output: OutputFormat,
}

impl Default for CoreConfig {
    fn default() -> Self {
        Self {
            liquidation: LiquidationParams::default(),
            log_filter: "info".into(),
            output: OutputFormat::Text,
        }
    }
}

impl CoreConfig {
    /// Load from file
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content =
            std::fs::read_to_string(path).map_err(|e| ConfigError::Io(e.to_string()))?;

        serde_json::from_str(&content).map_err(|e| ConfigError::Parse(e.to_string()))
    }

    /// Load from `path` if given, else defaults; then apply the environment
    pub fn resolve(path: Option<&Path>) -> Result<Self, ConfigError> {
        let mut config = match path {
            Some(path) => Self::load(path)?,
            None => Self::default(),
        };
        config.apply_env(|key| std::env::var(key).ok())?;
        config.validate()?;
        Ok(config)
    }

    /// Save to file
    pub fn save(&self, path: &Path) -> Result<(), ConfigError> {
        let content = serde_json::to_string_pretty(self)
            .map_err(|e| ConfigError::Serialize(e.to_string()))?;

        // Ensure parent directory exists
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent).map_err(|e| ConfigError::Io(e.to_string()))?;
            }
        }

        std::fs::write(path, content).map_err(|e| ConfigError::Io(e.to_string()))
    }

    /// Apply `MUSD_*` overrides read through `lookup`
    pub fn apply_env<F>(&mut self, lookup: F) -> Result<(), ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(value) = lookup("MUSD_CLOSE_FACTOR_BPS") {
            self.liquidation.close_factor_bps = parse_bps("MUSD_CLOSE_FACTOR_BPS", &value)?;
        }

        if let Some(value) = lookup("MUSD_FULL_LIQUIDATION_THRESHOLD_BPS") {
            self.liquidation.full_liquidation_threshold_bps =
                parse_bps("MUSD_FULL_LIQUIDATION_THRESHOLD_BPS", &value)?;
        }

        if let Some(value) = lookup("MUSD_LOG") {
            self.log_filter = value;
        }

        if let Some(value) = lookup("MUSD_OUTPUT") {
            self.output = value.parse()?;
        }

        Ok(())
    }

    /// Dust floor for a single liquidation
    pub fn min_liquidation_amount(&self) -> u128 {
        MIN_LIQUIDATION_AMOUNT
    }

    /// Get default config file path
    pub fn default_path() -> PathBuf {
        default_data_dir().join("config.json")
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.liquidation
            .validate()
            .map_err(|e| ConfigError::Validation(e.to_string()))?;

        if self.log_filter.trim().is_empty() {
            return Err(ConfigError::Validation("log filter cannot be empty".into()));
        }

        Ok(())
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// CONFIG ERROR
// ═══════════════════════════════════════════════════════════════════════════════

/// Configuration error
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    /// IO error
    #[error("IO error: {0}")]
    Io(String),
    /// Parse error
    #[error("Parse error: {0}")]
    Parse(String),
    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialize(String),
    /// Validation error
    #[error("Validation error: {0}")]
    Validation(String),
}

// ═══════════════════════════════════════════════════════════════════════════════
// HELPER FUNCTIONS
// ═══════════════════════════════════════════════════════════════════════════════

fn parse_bps(key: &str, value: &str) -> Result<u64, ConfigError> {
    value
        .trim()
        .parse()
        .map_err(|_| ConfigError::Parse(format!("{} is not a bps value: {}", key, value)))
}

/// Get default data directory
fn default_data_dir() -> PathBuf {
    if let Ok(home) = std::env::var("HOME") {
        return PathBuf::from(home).join(".musd");
    }

    PathBuf::from(".musd")
}

// ═══════════════════════════════════════════════════════════════════════════════
// TESTS
// ═══════════════════════════════════════════════════════════════════════════════
