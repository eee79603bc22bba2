//! Entity runtime configuration

use anyhow::{bail, Result};
use serde::{Deserialize, Serialize};
use std::env;

/// Timings and user-facing texts used by the CRUD runtime
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RuntimeConfig {
    /// Pause before and after the validate-inputs broadcast
    /// Env: ENTIFORM_VALIDATION_SETTLE_MS
    /// Default: 50
    pub validation_settle_ms: u64,

    /// Pause between showing the loading screen and the save request
    /// Env: ENTIFORM_SAVE_SETTLE_MS
    /// Default: 400
    pub save_settle_ms: u64,

    /// Shown when an error carries no message of its own
    pub unknown_error_message: String,

    /// Toast shown after a successful save
    pub save_success_message: String,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            validation_settle_ms: 50,
            save_settle_ms: 400,
            unknown_error_message: "Error desconocido".to_string(),
            save_success_message: "Guardado con éxito.".to_string(),
        }
    }
}

impl RuntimeConfig {
    /// No pauses at all; handy for tests and batch jobs
    pub fn immediate() -> Self {
        Self {
            validation_settle_ms: 0,
            save_settle_ms: 0,
            ..Self::default()
        }
    }

    pub fn merge(&mut self, other: Self) {
        *self = other;
    }

    pub fn apply_env_vars(&mut self) {
        if let Ok(ms) = env::var("ENTIFORM_VALIDATION_SETTLE_MS") {
            if let Ok(v) = ms.parse() {
                self.validation_settle_ms = v;
            }
        }

        if let Ok(ms) = env::var("ENTIFORM_SAVE_SETTLE_MS") {
            if let Ok(v) = ms.parse() {
                self.save_settle_ms = v;
            }
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.unknown_error_message.trim().is_empty() {
            bail!("unknown_error_message cannot be empty");
        }
        Ok(())
    }
}
