//! Entiform logging
//!
//! A small `log::Log` implementation so the runtime's `log::debug!`,
//! `log::warn!` and `log::error!` calls land somewhere useful without pulling
//! in a separate logger crate. Hosts that already install their own logger
//! simply never call [`init_logging`].
//!
//! ```rust,no_run
//! use entiform_core::config::LoggingConfig;
//!
//! entiform_core::logging::init_logging(&LoggingConfig::default()).unwrap();
//! log::info!("runtime ready");
//! ```

pub mod formatter;

pub use formatter::{LogEntry, LogFormat};

use anyhow::{anyhow, Result};
use indexmap::IndexMap;
use serde_json::Value;
use std::io::Write;
use std::sync::OnceLock;

use crate::config::LoggingConfig;

/// Outcome of the first install, replayed to later callers
static INSTALLED: OnceLock<Result<(), String>> = OnceLock::new();

/// Resolved logger settings
#[derive(Debug, Clone)]
pub struct LogSettings {
    pub level: log::LevelFilter,
    pub format: LogFormat,
    pub context: IndexMap<String, Value>,
    /// Write to stderr instead of stdout
    pub stderr: bool,
}

impl LogSettings {
    pub fn from_config(config: &LoggingConfig) -> Result<Self> {
        let level = config
            .level
            .parse::<log::LevelFilter>()
            .map_err(|_| anyhow!("Invalid log level: {}", config.level))?;
        let format = config.format.parse::<LogFormat>().map_err(|e| anyhow!(e))?;
        Ok(Self {
            level,
            format,
            context: IndexMap::new(),
            stderr: false,
        })
    }

    pub fn with_context_field(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.context.insert(key.into(), value.into());
        self
    }
}

/// Install the Entiform logger from configuration.
///
/// Safe to call more than once; only the first call installs anything, and
/// every later call returns that first call's result.
pub fn init_logging(config: &LoggingConfig) -> Result<()> {
    init_logging_with(LogSettings::from_config(config)?)
}

pub fn init_logging_with(settings: LogSettings) -> Result<()> {
    install_once(&INSTALLED, || {
        let level = settings.level;
        log::set_boxed_logger(Box::new(EntiformLogger { settings }))
            .map(|()| log::set_max_level(level))
            .map_err(|e| format!("logger already installed: {}", e))
    })
}

fn install_once(
    slot: &OnceLock<Result<(), String>>,
    install: impl FnOnce() -> Result<(), String>,
) -> Result<()> {
    slot.get_or_init(install).clone().map_err(|e| anyhow!(e))
}

struct EntiformLogger {
    settings: LogSettings,
}

impl log::Log for EntiformLogger {
    fn enabled(&self, metadata: &log::Metadata) -> bool {
        metadata.level() <= self.settings.level
    }

    fn log(&self, record: &log::Record) {
        if !self.enabled(record.metadata()) {
            return;
        }
        let entry = LogEntry::from_record(record, &self.settings.context);
        let line = self.settings.format.format_entry(&entry);
        if self.settings.stderr {
            let _ = writeln!(std::io::stderr(), "{}", line);
        } else {
            let _ = writeln!(std::io::stdout(), "{}", line);
        }
    }

    fn flush(&self) {
        let _ = std::io::stdout().flush();
        let _ = std::io::stderr().flush();
    }
}
