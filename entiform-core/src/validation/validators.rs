//! Reusable property validators
//!
//! Each constructor returns a check that is attached to a property with
//! [`crate::metadata::PropertyBuilder::check`] (or
//! [`crate::metadata::PropertyBuilder::async_check`] for remote checks).
//! Blank values always pass; whether a value must be present is the job of
//! the required rule.
//!
//! ```rust,ignore
//! EntityType::builder("Customer")
//!     .property("email", |p| p.display_name("Email").check(Validators::email()))
//!     .property("age", |p| p.display_name("Edad").check(Validators::range(18.0, 99.0)))
//!     .property("code", |p| {
//!         p.display_name("Código")
//!             .async_check(AsyncValidators::unique(client.clone(), "/api/customers/unique"))
//!     })
//! ```

use chrono::{DateTime, Utc};
use futures::future::{self, BoxFuture, FutureExt};
use lazy_static::lazy_static;
use regex::Regex;
use serde_json::Value;
use std::fmt;
use std::sync::Arc;

use crate::client::{ApiClient, ApiRequest};
use crate::entity::Entity;
use crate::metadata::types::plain_text;
use crate::metadata::{AsyncRule, Condition, Rule};
use crate::persistence::transform::parse_date;

lazy_static! {
    static ref EMAIL: Regex = Regex::new(r"^[^\s@]+@[^\s@]+\.[^\s@]+$").expect("email regex");
    static ref PHONE: Regex = Regex::new(r"^[\d\s\-\+\(\)]+$").expect("phone regex");
}

type ValuePredicate = Arc<dyn Fn(Option<&Value>) -> bool + Send + Sync>;
type AsyncValuePredicate =
    Arc<dyn Fn(&Entity, &str) -> BoxFuture<'static, anyhow::Result<bool>> + Send + Sync>;

/// Synchronous check over a single property value
#[derive(Clone)]
pub struct ValueCheck {
    predicate: ValuePredicate,
    message: String,
}

impl ValueCheck {
    pub fn new<F>(predicate: F, message: impl Into<String>) -> Self
    where
        F: Fn(Option<&Value>) -> bool + Send + Sync + 'static,
    {
        Self {
            predicate: Arc::new(predicate),
            message: message.into(),
        }
    }

    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = message.into();
        self
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    pub fn check(&self, value: Option<&Value>) -> bool {
        (self.predicate)(value)
    }

    /// Bind the check to property `key`
    pub fn into_rule(self, key: &str) -> Rule {
        let key = key.to_string();
        let predicate = self.predicate;
        Rule::new(
            Condition::when(move |entity| predicate(entity.get(&key))),
            Some(self.message),
        )
    }
}

impl fmt::Debug for ValueCheck {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ValueCheck")
            .field("message", &self.message)
            .finish_non_exhaustive()
    }
}

/// Asynchronous check that may read the whole entity
#[derive(Clone)]
pub struct AsyncValueCheck {
    predicate: AsyncValuePredicate,
    message: String,
}

impl AsyncValueCheck {
    pub fn new<F>(predicate: F, message: impl Into<String>) -> Self
    where
        F: Fn(&Entity, &str) -> BoxFuture<'static, anyhow::Result<bool>> + Send + Sync + 'static,
    {
        Self {
            predicate: Arc::new(predicate),
            message: message.into(),
        }
    }

    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = message.into();
        self
    }

    pub fn into_rule(self, key: &str) -> AsyncRule {
        let key = key.to_string();
        let predicate = self.predicate;
        AsyncRule::new(move |entity| predicate(entity, &key), Some(self.message))
    }
}

impl fmt::Debug for AsyncValueCheck {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AsyncValueCheck")
            .field("message", &self.message)
            .finish_non_exhaustive()
    }
}

/// Absent, null, blank string or empty array
pub fn is_blank(value: Option<&Value>) -> bool {
    match value {
        None | Some(Value::Null) => true,
        Some(Value::String(s)) => s.trim().is_empty(),
        Some(Value::Array(items)) => items.is_empty(),
        Some(_) => false,
    }
}

fn string_check<F>(predicate: F, message: String) -> ValueCheck
where
    F: Fn(&str) -> bool + Send + Sync + 'static,
{
    ValueCheck::new(
        move |value| match value {
            None | Some(Value::Null) => true,
            Some(Value::String(s)) => s.is_empty() || predicate(s),
            Some(Value::Number(n)) => predicate(&n.to_string()),
            Some(_) => false,
        },
        message,
    )
}

fn number_check<F>(predicate: F, message: String) -> ValueCheck
where
    F: Fn(f64) -> bool + Send + Sync + 'static,
{
    ValueCheck::new(
        move |value| match value {
            None | Some(Value::Null) => true,
            Some(Value::Number(n)) => n.as_f64().map(&predicate).unwrap_or(false),
            Some(Value::String(s)) if s.trim().is_empty() => true,
            Some(Value::String(s)) => s.trim().parse::<f64>().map(&predicate).unwrap_or(false),
            Some(_) => false,
        },
        message,
    )
}

fn date_check<F>(predicate: F, message: String) -> ValueCheck
where
    F: Fn(DateTime<Utc>) -> bool + Send + Sync + 'static,
{
    ValueCheck::new(
        move |value| {
            if is_blank(value) {
                return true;
            }
            value.and_then(parse_date).map(&predicate).unwrap_or(false)
        },
        message,
    )
}

/// Catalog of synchronous validators
pub struct Validators;

impl Validators {
    pub fn email() -> ValueCheck {
        string_check(
            |s| EMAIL.is_match(s),
            "Formato de email inválido".to_string(),
        )
    }

    /// At least `min` characters
    pub fn min_length(min: usize) -> ValueCheck {
        string_check(
            move |s| s.chars().count() >= min,
            format!("Debe tener al menos {} caracteres", min),
        )
    }

    pub fn max_length(max: usize) -> ValueCheck {
        string_check(
            move |s| s.chars().count() <= max,
            format!("Debe tener máximo {} caracteres", max),
        )
    }

    /// Inclusive on both ends
    pub fn range(min: f64, max: f64) -> ValueCheck {
        number_check(
            move |n| n >= min && n <= max,
            format!("Debe estar entre {} y {}", min, max),
        )
    }

    pub fn min(minimum: f64) -> ValueCheck {
        number_check(
            move |n| n >= minimum,
            format!("Debe ser mayor o igual a {}", minimum),
        )
    }

    pub fn max(maximum: f64) -> ValueCheck {
        number_check(
            move |n| n <= maximum,
            format!("Debe ser menor o igual a {}", maximum),
        )
    }

    pub fn pattern(regex: Regex) -> ValueCheck {
        string_check(move |s| regex.is_match(s), "Formato inválido".to_string())
    }

    /// Absolute URL
    pub fn url() -> ValueCheck {
        string_check(|s| url::Url::parse(s).is_ok(), "URL inválida".to_string())
    }

    /// Digits, spaces, `-+()` only, with at least ten digits
    pub fn phone() -> ValueCheck {
        string_check(
            |s| PHONE.is_match(s) && s.chars().filter(char::is_ascii_digit).count() >= 10,
            "Número de teléfono inválido".to_string(),
        )
    }

    pub fn not_future() -> ValueCheck {
        date_check(
            |d| d <= Utc::now(),
            "La fecha no puede ser futura".to_string(),
        )
    }

    pub fn not_past() -> ValueCheck {
        date_check(
            |d| d >= Utc::now(),
            "La fecha no puede ser pasada".to_string(),
        )
    }
}

/// Catalog of remote validators
pub struct AsyncValidators;

impl AsyncValidators {
    /// `GET {endpoint}?value=..&id=..` must answer `{"isUnique": true}`.
    ///
    /// `id` carries the entity's unique-key value so the server can ignore
    /// the record being edited.
    pub fn unique(client: Arc<dyn ApiClient>, endpoint: impl Into<String>) -> AsyncValueCheck {
        let endpoint = endpoint.into();
        AsyncValueCheck::new(
            move |entity, key| {
                let value = entity.get(key).cloned();
                if is_blank(value.as_ref()) {
                    return future::ready(Ok(true)).boxed();
                }
                let request = ApiRequest::get(endpoint.clone())
                    .with_query("value", plain_text(value.as_ref()))
                    .with_query("id", plain_text(entity.unique_property_value()));
                let client = Arc::clone(&client);
                async move {
                    let response = client
                        .send(request)
                        .await
                        .map_err(|e| anyhow::anyhow!("uniqueness check failed: {}", e))?;
                    let unique = response.body.get("isUnique") == Some(&Value::Bool(true));
                    Ok::<_, anyhow::Error>(unique)
                }
                .boxed()
            },
            "Este valor ya existe",
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn passes(check: &ValueCheck, value: Value) -> bool {
        check.check(Some(&value))
    }

    #[test]
    fn test_blank_values_pass() {
        for check in [
            Validators::email(),
            Validators::min_length(3),
            Validators::phone(),
            Validators::not_past(),
        ] {
            assert!(check.check(None));
            assert!(passes(&check, Value::Null));
            assert!(passes(&check, json!("")));
        }
        assert!(Validators::min(1.0).check(None));
    }

    #[test]
    fn test_email() {
        let check = Validators::email();
        assert!(passes(&check, json!("ana@example.com")));
        assert!(!passes(&check, json!("ana@example")));
        assert!(!passes(&check, json!("ana example@x.com")));
        assert_eq!(check.message(), "Formato de email inválido");
    }

    #[test]
    fn test_lengths_count_characters() {
        assert!(passes(&Validators::min_length(3), json!("año")));
        assert!(!passes(&Validators::max_length(2), json!("año")));
        assert_eq!(
            Validators::min_length(3).message(),
            "Debe tener al menos 3 caracteres"
        );
    }

    #[test]
    fn test_numeric_bounds() {
        let range = Validators::range(1.0, 10.0);
        assert!(passes(&range, json!(1)));
        assert!(passes(&range, json!(10.0)));
        assert!(!passes(&range, json!(10.5)));
        assert!(passes(&range, json!("5")));
        assert!(!passes(&range, json!("five")));
        assert!(passes(&Validators::min(0.0), json!(0)));
        assert!(!passes(&Validators::max(3.0), json!(4)));
    }

    #[test]
    fn test_phone_needs_ten_digits() {
        let check = Validators::phone();
        assert!(passes(&check, json!("+52 (55) 1234-5678")));
        assert!(!passes(&check, json!("555-1234")));
        assert!(!passes(&check, json!("55 1234 5678 ext")));
    }

    #[test]
    fn test_url_and_pattern() {
        assert!(passes(&Validators::url(), json!("https://example.com/a")));
        assert!(!passes(&Validators::url(), json!("example.com")));
        let sku = Validators::pattern(Regex::new(r"^[A-Z]{3}-\d{3}$").unwrap());
        assert!(passes(&sku, json!("ABC-123")));
        assert!(!passes(&sku, json!("abc-123")));
    }

    #[test]
    fn test_dates() {
        assert!(passes(&Validators::not_future(), json!("2000-01-01")));
        let far_future = json!("2999-01-01T00:00:00Z");
        assert!(!passes(&Validators::not_future(), far_future));
        assert!(passes(&Validators::not_past(), json!("2999-01-01")));
        assert!(!passes(&Validators::not_past(), json!("garbage")));
    }

    #[test]
    fn test_with_message_overrides_default() {
        let check = Validators::email().with_message("Correo inválido");
        assert_eq!(check.message(), "Correo inválido");
    }
}
