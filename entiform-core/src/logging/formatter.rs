//! Log formatting options for different output styles

use chrono::{DateTime, Utc};
use indexmap::IndexMap;
use serde_json::Value;

/// One log line before formatting
#[derive(Debug, Clone)]
pub struct LogEntry {
    pub timestamp: DateTime<Utc>,
    pub level: log::Level,
    pub target: String,
    pub message: String,
    /// Context fields attached to every line (service name, tenant, ...)
    pub fields: IndexMap<String, Value>,
}

impl LogEntry {
    pub fn from_record(record: &log::Record, fields: &IndexMap<String, Value>) -> Self {
        Self {
            timestamp: Utc::now(),
            level: record.level(),
            target: record.target().to_string(),
            message: record.args().to_string(),
            fields: fields.clone(),
        }
    }
}

/// How logs should be formatted
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub enum LogFormat {
    /// Example: 2024-01-15 10:30:00.120 INFO  [entiform_core::crud] saved Product
    #[default]
    Human,

    /// Example: {"timestamp":"2024-01-15T10:30:00Z","level":"INFO","target":"...","message":"..."}
    Json,

    /// Example: I entiform_core::crud: saved Product
    Compact,
}

impl std::str::FromStr for LogFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "human" => Ok(LogFormat::Human),
            "json" => Ok(LogFormat::Json),
            "compact" => Ok(LogFormat::Compact),
            other => Err(format!("unknown log format: {}", other)),
        }
    }
}

impl LogFormat {
    pub fn format_entry(&self, entry: &LogEntry) -> String {
        match self {
            LogFormat::Human => format_human(entry),
            LogFormat::Json => format_json(entry),
            LogFormat::Compact => format_compact(entry),
        }
    }
}

fn format_human(entry: &LogEntry) -> String {
    let timestamp = entry.timestamp.format("%Y-%m-%d %H:%M:%S%.3f");
    let mut line =
        format!(
            "{} {:5} [{}] {}",
            timestamp,
            entry.level.as_str(),
            entry.target,
            entry.message
        );

    for (key, value) in &entry.fields {
        match value {
            Value::String(s) => line.push_str(&format!(" {}={}", key, s)),
            other => line.push_str(&format!(" {}={}", key, other)),
        }
    }
    line
}

fn format_json(entry: &LogEntry) -> String {
    let mut json = serde_json::Map::new();
    json.insert(
        "timestamp".to_string(),
        Value::String(entry.timestamp.to_rfc3339()),
    );
    json.insert(
        "level".to_string(),
        Value::String(entry.level.as_str().to_string()),
    );
    json.insert("target".to_string(), Value::String(entry.target.clone()));
    json.insert("message".to_string(), Value::String(entry.message.clone()));

    for (key, value) in &entry.fields {
        json.insert(key.clone(), value.clone());
    }

    serde_json::to_string(&json).unwrap_or_else(|_| "Failed to serialize log entry".to_string())
}

fn format_compact(entry: &LogEntry) -> String {
    let initial = entry.level.as_str().chars().next().unwrap_or('?');
    format!("{} {}: {}", initial, entry.target, entry.message)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry() -> LogEntry {
        let mut fields = IndexMap::new();
        fields.insert("service".to_string(), Value::String("erp".to_string()));
        LogEntry {
            timestamp: Utc::now(),
            level: log::Level::Warn,
            target: "entiform_core::crud".to_string(),
            message: "save aborted".to_string(),
            fields,
        }
    }

    #[test]
    fn test_json_format() {
        let line = LogFormat::Json.format_entry(&entry());
        let parsed: Value = serde_json::from_str(&line).unwrap();
        assert_eq!(parsed["level"], "WARN");
        assert_eq!(parsed["message"], "save aborted");
        assert_eq!(parsed["service"], "erp");
    }

    #[test]
    fn test_human_format() {
        let line = LogFormat::Human.format_entry(&entry());
        let expected = "WARN  [entiform_core::crud] save aborted service=erp";
        assert!(line.contains(expected));
    }

    #[test]
    fn test_compact_format() {
        assert_eq!(
            LogFormat::Compact.format_entry(&entry()),
            "W entiform_core::crud: save aborted"
        );
    }

    #[test]
    fn test_parse() {
        assert_eq!("JSON".parse::<LogFormat>(), Ok(LogFormat::Json));
        assert!("logfmt".parse::<LogFormat>().is_err());
    }
}
