//! Value transformers between API payloads and entity values
//!
//! Entity values are plain json. Dates are kept as RFC 3339 strings, decimals
//! as numbers, nested entities as maps of their persistent properties.

use chrono::{DateTime, NaiveDate, SecondsFormat, Utc};
use indexmap::IndexMap;
use serde_json::{Map, Number, Value};

use crate::metadata::EntityTypeRef;

#[derive(Debug, Clone)]
pub enum Transformer {
    /// ISO 8601 string on both sides, normalized to UTC
    Date,
    /// Fixed-decimal string on the wire, number in the entity
    Decimal { decimals: usize },
    /// `true`, `"true"`, `"1"` and `1` all read as true
    Boolean,
    /// Only the listed values survive the trip in
    Enum(Vec<Value>),
    Entity(EntityTypeRef),
    ArrayOfEntities(EntityTypeRef),
}

impl Transformer {
    pub fn to_api(&self, value: &Value) -> Value {
        match self {
            Transformer::Date => {
                parse_date(value)
                    .map(|d| Value::String(format_date(&d)))
                    .unwrap_or(Value::Null)
            }
            Transformer::Decimal { decimals } => match value.as_f64() {
                Some(n) => Value::String(format!("{:.*}", decimals, n)),
                None => Value::Null,
            },
            Transformer::Boolean => match value {
                Value::Bool(_) => value.clone(),
                _ => Value::Null,
            },
            Transformer::Enum(_) => value.clone(),
            Transformer::Entity(ty) => match value {
                Value::Object(map) => Value::Object(entity_to_api(ty, map)),
                _ => Value::Null,
            },
            Transformer::ArrayOfEntities(ty) => match value {
                Value::Array(items) => Value::Array(
                    items
                        .iter()
                        .filter_map(Value::as_object)
                        .map(|map| Value::Object(entity_to_api(ty, map)))
                        .collect(),
                ),
                _ => Value::Null,
            },
        }
    }

    pub fn from_api(&self, value: &Value) -> Value {
        match self {
            Transformer::Date => {
                parse_date(value)
                    .map(|d| Value::String(format_date(&d)))
                    .unwrap_or(Value::Null)
            }
            Transformer::Decimal { .. } => {
                let parsed = match value {
                    Value::Number(n) => n.as_f64(),
                    Value::String(s) => s.trim().parse::<f64>().ok(),
                    _ => None,
                };
                parsed
                    .and_then(Number::from_f64)
                    .map(Value::Number)
                    .unwrap_or(Value::Null)
            }
            Transformer::Boolean => match value {
                Value::Bool(b) => Value::Bool(*b),
                Value::String(s) => Value::Bool(s.eq_ignore_ascii_case("true") || s == "1"),
                Value::Number(n) => Value::Bool(n.as_f64() == Some(1.0)),
                _ => Value::Null,
            },
            Transformer::Enum(allowed) => {
                if allowed.contains(value) {
                    value.clone()
                } else {
                    Value::Null
                }
            }
            Transformer::Entity(ty) => match value {
                Value::Object(map) => Value::Object(ty.resolve().to_internal(map)),
                _ => Value::Null,
            },
            Transformer::ArrayOfEntities(ty) => match value {
                Value::Array(items) => {
                    let ty = ty.resolve();
                    Value::Array(
                        items
                            .iter()
                            .filter_map(Value::as_object)
                            .map(|map| Value::Object(ty.to_internal(map)))
                            .collect(),
                    )
                }
                _ => Value::Null,
            },
        }
    }
}

fn entity_to_api(ty: &EntityTypeRef, map: &Map<String, Value>) -> Map<String, Value> {
    let ty = ty.resolve();
    let persistent = crate::entity::snapshot::capture(map, &ty.declared_keys());
    ty.to_external(&persistent)
}

/// Read a date from an RFC 3339 timestamp or a plain `YYYY-MM-DD` date
pub fn parse_date(value: &Value) -> Option<DateTime<Utc>> {
    let text = value.as_str()?.trim();
    if text.is_empty() {
        return None;
    }
    if let Ok(parsed) = DateTime::parse_from_rfc3339(text) {
        return Some(parsed.with_timezone(&Utc));
    }
    NaiveDate::parse_from_str(text, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .map(|dt| dt.and_utc())
}

pub fn format_date(date: &DateTime<Utc>) -> String {
    date.to_rfc3339_opts(SecondsFormat::Millis, true)
}

/// Per-key transformers; keys without one pass through untouched
#[derive(Debug, Clone, Default)]
pub struct TransformationSchema {
    transformers: IndexMap<String, Transformer>,
}

impl TransformationSchema {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, key: impl Into<String>, transformer: Transformer) -> Self {
        self.transformers.insert(key.into(), transformer);
        self
    }

    pub fn get(&self, key: &str) -> Option<&Transformer> {
        self.transformers.get(key)
    }

    pub fn apply_from_api(&self, data: &Map<String, Value>) -> Map<String, Value> {
        data.iter()
            .map(|(key, value)| {
                let out = self.get(key)
                    .map(|t| t.from_api(value))
                    .unwrap_or_else(|| value.clone());
                (key.clone(), out)
            })
            .collect()
    }

    pub fn apply_to_api(&self, data: &Map<String, Value>) -> Map<String, Value> {
        data.iter()
            .map(|(key, value)| {
                let out = self.get(key)
                    .map(|t| t.to_api(value))
                    .unwrap_or_else(|| value.clone());
                (key.clone(), out)
            })
            .collect()
    }
}
