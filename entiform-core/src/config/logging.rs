//! Logging configuration

use anyhow::{bail, Result};
use serde::{Deserialize, Serialize};
use std::env;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Env: ENTIFORM_LOG_LEVEL
    pub level: String,
    /// `human`, `json` or `compact`
    /// Env: ENTIFORM_LOG_FORMAT
    pub format: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: "human".to_string(),
        }
    }
}

impl LoggingConfig {
    pub fn merge(&mut self, other: Self) {
        *self = other;
    }

    pub fn apply_env_vars(&mut self) {
        if let Ok(level) = env::var("ENTIFORM_LOG_LEVEL") {
            self.level = level;
        }
        if let Ok(format) = env::var("ENTIFORM_LOG_FORMAT") {
            self.format = format;
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.level.parse::<log::LevelFilter>().is_err() {
            bail!("Invalid log level: {}", self.level);
        }
        let format = self.format.to_lowercase();
        if !matches!(format.as_str(), "human" | "json" | "compact") {
            bail!(
                "Invalid log format: {} (expected human, json or compact)",
                self.format
            );
        }
        Ok(())
    }
}
