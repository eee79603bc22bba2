//! Configuration system for Entiform
//!
//! Values are resolved in the following order (highest priority wins):
//!
//! 1. **Code** (fields set after loading)
//! 2. **Environment Variables** (`ENTIFORM_*`)
//! 3. **Config File** (`entiform.toml`)
//! 4. **Defaults**
//!
//! # Example
//!
//! ```no_run
//! use entiform_core::config::EntiformConfig;
//!
//! let config = EntiformConfig::load()?;
//! config.validate()?;
//! # Ok::<(), anyhow::Error>(())
//! ```
//!
//! A complete file:
//!
//! ```toml
//! [api]
//! base_url = "https://erp.example.com/api"
//! timeout_ms = 10000
//! retry_attempts = 2
//! auth_token_key = "ERP_TOKEN"
//!
//! [runtime]
//! validation_settle_ms = 50
//! save_settle_ms = 400
//!
//! [logging]
//! level = "debug"
//! format = "json"
//! ```

pub mod api;
pub mod logging;
pub mod runtime;

pub use api::ApiConfig;
pub use logging::LoggingConfig;
pub use runtime::RuntimeConfig;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Default config file name
pub const CONFIG_FILE: &str = "entiform.toml";

/// Complete Entiform configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct EntiformConfig {
    pub api: ApiConfig,
    pub runtime: RuntimeConfig,
    pub logging: LoggingConfig,
}

impl EntiformConfig {
    /// Load `entiform.toml` (if present) and environment overrides
    pub fn load() -> Result<Self> {
        Self::load_from(CONFIG_FILE)
    }

    pub fn load_from(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let mut config = Self::default();

        if path.exists() {
            let file_config = Self::from_file(path)
                .with_context(|| format!("Failed to load config from {}", path.display()))?;
            config.merge(file_config);
        }

        config.apply_env_vars();
        Ok(config)
    }

    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let content = std::fs::read_to_string(path.as_ref())
            .with_context(|| {
                format!("Failed to read config file: {}", path.as_ref().display())
            })?;

        toml::from_str(&content)
            .with_context(|| {
                format!("Failed to parse TOML config: {}", path.as_ref().display())
            })
    }

    /// Merge another config into this one (other takes priority)
    pub fn merge(&mut self, other: Self) {
        self.api.merge(other.api);
        self.runtime.merge(other.runtime);
        self.logging.merge(other.logging);
    }

    pub fn apply_env_vars(&mut self) {
        self.api.apply_env_vars();
        self.runtime.apply_env_vars();
        self.logging.apply_env_vars();
    }

    pub fn validate(&self) -> Result<()> {
        self.api.validate().context("[api]")?;
        self.runtime.validate().context("[runtime]")?;
        self.logging.validate().context("[logging]")?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_default_config() {
        let config = EntiformConfig::default();
        assert_eq!(config.api.timeout_ms, 30_000);
        assert_eq!(config.runtime.validation_settle_ms, 50);
        assert_eq!(config.runtime.save_settle_ms, 400);
        assert_eq!(config.runtime.unknown_error_message, "Error desconocido");
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_partial_file_keeps_defaults() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(
            file,
            "[api]\nbase_url = \"https://erp.example.com/api\"\nretry_attempts = 1"
        )
        .unwrap();

        let config = EntiformConfig::load_from(file.path()).unwrap();
        assert_eq!(config.api.base_url, "https://erp.example.com/api");
        assert_eq!(config.api.retry_attempts, 1);
        assert_eq!(config.api.retry_delay_ms, 200);
        assert_eq!(config.runtime.unknown_error_message, "Error desconocido");
    }

    #[test]
    fn test_missing_file_is_not_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let config = EntiformConfig::load_from(dir.path().join("absent.toml"));
        assert!(config.is_ok());
    }

    #[test]
    fn test_invalid_toml_reports_path() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "[api\nbase_url = ").unwrap();
        let err = EntiformConfig::from_file(file.path()).unwrap_err();
        assert!(format!("{:#}", err).contains("Failed to parse TOML config"));
    }

    #[test]
    fn test_env_overrides_file() {
        std::env::set_var("ENTIFORM_SAVE_SETTLE_MS", "5");
        let mut config = EntiformConfig::default();
        config.apply_env_vars();
        std::env::remove_var("ENTIFORM_SAVE_SETTLE_MS");
        assert_eq!(config.runtime.save_settle_ms, 5);
    }

    #[test]
    fn test_validation_errors() {
        let mut config = EntiformConfig::default();
        config.logging.level = "loud".to_string();
        assert!(config.validate().is_err());

        let mut config = EntiformConfig::default();
        config.api.base_url = "not a url".to_string();
        assert!(config.validate().is_err());
    }
}
