//! Value types stored in the metadata facets

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use std::sync::Arc;

use super::EntityType;

/// Reference to an entity type that may not be built yet.
///
/// Self-referencing types (a `Product` holding a list of `Product`) register
/// the element type lazily through a function pointer, which is only called
/// once the registry is read.
#[derive(Clone)]
pub enum EntityTypeRef {
    Resolved(Arc<EntityType>),
    Lazy(fn() -> Arc<EntityType>),
}

impl EntityTypeRef {
    pub fn resolve(&self) -> Arc<EntityType> {
        match self {
            EntityTypeRef::Resolved(ty) => Arc::clone(ty),
            EntityTypeRef::Lazy(f) => f(),
        }
    }
}

impl From<Arc<EntityType>> for EntityTypeRef {
    fn from(ty: Arc<EntityType>) -> Self {
        EntityTypeRef::Resolved(ty)
    }
}

impl From<fn() -> Arc<EntityType>> for EntityTypeRef {
    fn from(f: fn() -> Arc<EntityType>) -> Self {
        EntityTypeRef::Lazy(f)
    }
}

impl fmt::Debug for EntityTypeRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EntityTypeRef::Resolved(ty) => write!(f, "EntityTypeRef({})", ty.id()),
            EntityTypeRef::Lazy(_) => f.write_str("EntityTypeRef(<lazy>)"),
        }
    }
}

/// Declared type of a property
#[derive(Debug, Clone)]
pub enum PropertyType {
    String,
    Number,
    Boolean,
    Date,
    /// Closed set of allowed values
    Enum(Vec<String>),
    /// Single nested entity
    Entity(EntityTypeRef),
    /// Collection; the element type lives in its own facet
    Collection,
    /// Anything else (maps, opaque json)
    Any,
}

impl PropertyType {
    pub fn is_collection(&self) -> bool {
        matches!(self, PropertyType::Collection)
    }

    pub fn name(&self) -> &'static str {
        match self {
            PropertyType::String => "string",
            PropertyType::Number => "number",
            PropertyType::Boolean => "boolean",
            PropertyType::Date => "date",
            PropertyType::Enum(_) => "enum",
            PropertyType::Entity(_) => "entity",
            PropertyType::Collection => "collection",
            PropertyType::Any => "any",
        }
    }
}

/// Input flavour for string properties
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StringType {
    #[default]
    Text,
    Textarea,
    Email,
    Password,
    Telephone,
    Url,
}

/// Layout of a row inside a view group
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ViewGroupRow {
    Single,
    Pair,
    Triple,
}

/// Side a mask is anchored to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MaskSide {
    Start,
    End,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Mask {
    pub mask: String,
    pub side: MaskSide,
}

/// Display format: either a `{value}` template or a formatter function
#[derive(Clone)]
pub enum DisplayFormat {
    Template(String),
    Function(Arc<dyn Fn(&Value) -> String + Send + Sync>),
}

impl DisplayFormat {
    pub fn function<F>(f: F) -> Self
    where
        F: Fn(&Value) -> String + Send + Sync + 'static,
    {
        DisplayFormat::Function(Arc::new(f))
    }

    /// Render `value`; absent and null render as the empty string
    pub fn apply(&self, value: Option<&Value>) -> String {
        match self {
            DisplayFormat::Function(f) => f(value.unwrap_or(&Value::Null)),
            DisplayFormat::Template(template) => {
                template.replacen("{value}", &plain_text(value), 1)
            }
        }
    }
}

impl fmt::Debug for DisplayFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DisplayFormat::Template(t) => f.debug_tuple("Template").field(t).finish(),
            DisplayFormat::Function(_) => f.write_str("Function(<fn>)"),
        }
    }
}

impl From<&str> for DisplayFormat {
    fn from(template: &str) -> Self {
        DisplayFormat::Template(template.to_string())
    }
}

/// String form of a value as a UI would print it
pub fn plain_text(value: Option<&Value>) -> String {
    match value {
        None | Some(Value::Null) => String::new(),
        Some(Value::String(s)) => s.clone(),
        Some(other) => other.to_string(),
    }
}

/// HTTP verbs an entity may be allowed to use
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum HttpMethod {
    Get,
    Post,
    Put,
    Patch,
    Delete,
}

impl HttpMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            HttpMethod::Get => "GET",
            HttpMethod::Post => "POST",
            HttpMethod::Put => "PUT",
            HttpMethod::Patch => "PATCH",
            HttpMethod::Delete => "DELETE",
        }
    }

    /// Repeating the request has the same effect as sending it once
    pub fn is_idempotent(&self) -> bool {
        matches!(self, HttpMethod::Get | HttpMethod::Put | HttpMethod::Delete)
    }
}

impl fmt::Display for HttpMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for HttpMethod {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_uppercase().as_str() {
            "GET" => Ok(HttpMethod::Get),
            "POST" => Ok(HttpMethod::Post),
            "PUT" => Ok(HttpMethod::Put),
            "PATCH" => Ok(HttpMethod::Patch),
            "DELETE" => Ok(HttpMethod::Delete),
            other => Err(format!("unknown http method: {}", other)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_template_format() {
        let format = DisplayFormat::from("{value} Pz.");
        assert_eq!(format.apply(Some(&json!(12))), "12 Pz.");
        assert_eq!(format.apply(None), " Pz.");
    }

    #[test]
    fn test_function_format() {
        let format = DisplayFormat::function(|v| format!("${:.2}", v.as_f64().unwrap_or(0.0)));
        assert_eq!(format.apply(Some(&json!(3.5))), "$3.50");
    }

    #[test]
    fn test_http_method_parse() {
        assert_eq!("put".parse::<HttpMethod>(), Ok(HttpMethod::Put));
        assert!("TRACE".parse::<HttpMethod>().is_err());
    }
}
