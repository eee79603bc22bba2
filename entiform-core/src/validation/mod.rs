//! Validation engine
//!
//! Three kinds of rules can be registered per property: a required
//! condition, a synchronous validation and an asynchronous validation. A
//! property without rules is always valid.
//!
//! [`ValidationPass`] runs a full pass over an entity the way a form submit
//! does: it raises the shared [`ValidityFlag`], tells mounted inputs to check
//! themselves, evaluates every rule (async ones side by side) and combines the
//! inputs' verdict with its own.

pub mod validators;

use futures::future::join_all;
use serde::Serialize;
use std::time::Duration;

use crate::entity::Entity;
use crate::metadata::{Facet, FacetValue};
use crate::ui::{Signal, SignalBus, UiService, ValidityFlag};

pub use validators::{is_blank, AsyncValidators, AsyncValueCheck, ValueCheck, Validators};

const INVALID_VALUE: &str = "Valor inválido";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    Required,
    Rule,
    Async,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ValidationFailure {
    pub key: String,
    pub kind: FailureKind,
    pub message: String,
}

/// Result of a full validation pass
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ValidationOutcome {
    /// Inputs' verdict AND the engine's own result
    pub valid: bool,
    pub failures: Vec<ValidationFailure>,
}

impl ValidationOutcome {
    pub fn is_valid(&self) -> bool {
        self.valid
    }

    /// First failure message for `key`
    pub fn message_for(&self, key: &str) -> Option<&str> {
        self.failures
            .iter()
            .find(|f| f.key == key)
            .map(|f| f.message.as_str())
    }

    pub fn failed_keys(&self) -> Vec<&str> {
        let mut keys: Vec<&str> = Vec::new();
        for failure in &self.failures {
            if !keys.contains(&failure.key.as_str()) {
                keys.push(&failure.key);
            }
        }
        keys
    }
}

/// Everything an input component needs to render one property
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct InputMetadata {
    pub property_name: String,
    pub required: bool,
    pub disabled: bool,
    pub read_only: bool,
    pub validated: bool,
    pub required_message: Option<String>,
    pub validated_message: Option<String>,
    pub help_text: Option<String>,
}

impl Entity {
    /// Evaluate the required condition; no condition means not required
    pub fn is_required(&self, key: &str) -> bool {
        self.entity_type()
            .facet(Facet::Required, key)
            .and_then(FacetValue::as_rule)
            .map(|rule| rule.condition.evaluate(self))
            .unwrap_or(false)
    }

    pub fn required_message(&self, key: &str) -> Option<String> {
        self.entity_type()
            .facet(Facet::Required, key)
            .and_then(FacetValue::as_rule)
            .and_then(|rule| rule.message.clone())
    }

    /// A value counts as present unless blank (see [`is_blank`]); `0` and `false` are present
    pub fn is_present(&self, key: &str) -> bool {
        !is_blank(self.get(key))
    }

    /// Evaluate the sync validation; no rule means valid
    pub fn is_valid(&self, key: &str) -> bool {
        self.entity_type()
            .facet(Facet::Validation, key)
            .and_then(FacetValue::as_rule)
            .map(|rule| rule.condition.evaluate(self))
            .unwrap_or(true)
    }

    pub fn validation_message(&self, key: &str) -> Option<String> {
        self.entity_type()
            .facet(Facet::Validation, key)
            .and_then(FacetValue::as_rule)
            .and_then(|rule| rule.message.clone())
    }

    /// Await the async validation; no rule means valid, a failing predicate means invalid
    pub async fn is_async_valid(&self, key: &str) -> bool {
        let rule = match self.entity_type().facet(Facet::AsyncValidation, key) {
            Some(FacetValue::AsyncRule(rule)) => rule.clone(),
            _ => return true,
        };
        match rule.evaluate(self).await {
            Ok(valid) => valid,
            Err(e) => {
                log::error!(
                    "async validation for {}.{} failed: {:#}",
                    self.entity_type().id(),
                    key,
                    e
                );
                false
            }
        }
    }

    pub fn async_validation_message(&self, key: &str) -> Option<String> {
        match self.entity_type().facet(Facet::AsyncValidation, key) {
            Some(FacetValue::AsyncRule(rule)) => rule.message.clone(),
            _ => None,
        }
    }

    pub fn has_async_validation(&self, key: &str) -> bool {
        matches!(
            self.entity_type().facet(Facet::AsyncValidation, key),
            Some(FacetValue::AsyncRule(_))
        )
    }

    /// Required and sync-rule failures for `key`, without touching any port
    pub fn check_property(&self, key: &str) -> Option<ValidationFailure> {
        if self.is_required(key) && !self.is_present(key) {
            let message = self.required_message(key).unwrap_or_else(|| {
                let name = self.entity_type().property_display_name(key).unwrap_or(key);
                format!("{} es obligatorio", name)
            });
            return Some(ValidationFailure {
                key: key.to_string(),
                kind: FailureKind::Required,
                message,
            });
        }

        if !self.is_valid(key) {
            let message = self
                .validation_message(key)
                .unwrap_or_else(|| INVALID_VALUE.to_string());
            return Some(ValidationFailure {
                key: key.to_string(),
                kind: FailureKind::Rule,
                message,
            });
        }

        None
    }

    pub fn input_metadata(&self, key: &str) -> InputMetadata {
        let ty = self.entity_type();
        InputMetadata {
            property_name: ty.property_display_name(key).unwrap_or(key).to_string(),
            required: self.is_required(key),
            disabled: self.is_disabled(key),
            read_only: self.is_read_only(key),
            validated: self.is_valid(key),
            required_message: self.required_message(key),
            validated_message: self.validation_message(key),
            help_text: ty.help_text(key).map(str::to_string),
        }
    }
}

/// One "validate all" run against the injected ports
pub struct ValidationPass<'a> {
    pub ui: &'a dyn UiService,
    pub signals: &'a dyn SignalBus,
    pub flag: &'a ValidityFlag,
    /// Pause before and after the broadcast so inputs can react
    pub settle: Duration,
}

impl ValidationPass<'_> {
    pub async fn run(&self, entity: &Entity) -> ValidationOutcome {
        self.flag.reset();
        self.ui.show_loading_menu();
        settle(self.settle).await;

        self.signals.emit(&Signal::ValidateInputs {
            flag: self.flag.clone(),
        });

        let keys = entity.entity_type().declared_keys();
        let mut failures: Vec<ValidationFailure> =
            keys.iter()
                .filter_map(|key| entity.check_property(key))
                .collect();

        let async_keys: Vec<&String> = keys
            .iter()
            .filter(|k| entity.has_async_validation(k))
            .collect();
        let verdicts = join_all(async_keys.iter().map(|key| entity.is_async_valid(key))).await;
        for (key, valid) in async_keys.into_iter().zip(verdicts) {
            if !valid {
                failures.push(ValidationFailure {
                    key: key.clone(),
                    kind: FailureKind::Async,
                    message: entity
                        .async_validation_message(key)
                        .unwrap_or_else(|| INVALID_VALUE.to_string()),
                });
            }
        }

        settle(self.settle).await;

        let valid = self.flag.is_valid() && failures.is_empty();
        if !valid {
            log::debug!(
                "{} failed validation: flag={} failures={:?}",
                entity.entity_type().id(),
                self.flag.is_valid(),
                failures
            );
        }
        self.signals.emit(&Signal::ValidationSettled { valid });
        entity.entity_type().hooks().on_validated(entity);
        self.ui.hide_loading_menu();

        ValidationOutcome { valid, failures }
    }
}

async fn settle(duration: Duration) {
    if !duration.is_zero() {
        tokio::time::sleep(duration).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metadata::{Condition, EntityType};
    use crate::ui::{EventBus, LogUi};
    use futures::FutureExt;
    use serde_json::{json, Value};
    use std::sync::Arc;

    fn customer() -> Arc<EntityType> {
        EntityType::builder("Customer")
            .property("name", |p| p.display_name("Nombre").required(true))
            .property("email", |p| {
                p.display_name("Email")
                    .required_with_message(true, "El email es obligatorio")
                    .check(Validators::email())
            })
            .property("discount", |p| {
                p.display_name("Descuento").validation(
                    Condition::when(|e| {
                        e.get("discount").and_then(Value::as_f64).unwrap_or(0.0) <= 50.0
                    }),
                    "Máximo 50%",
                )
            })
            .property("vip", |p| {
                p.display_name("VIP")
                    .required(Condition::when(|e| e.get("discount").is_some()))
            })
            .build()
    }

    fn entity(value: Value) -> Entity {
        Entity::new(&customer(), value.as_object().cloned().unwrap_or_default())
    }

    #[test]
    fn test_default_pass_law() {
        let ty = EntityType::builder("Bare")
            .property("a", |p| p.display_name("A"))
            .build();
        let e = Entity::empty(&ty);
        assert!(!e.is_required("a"));
        assert!(e.is_valid("a"));
        assert!(!e.is_disabled("a"));
        assert!(!e.is_read_only("a"));
        assert!(e.check_property("a").is_none());
    }

    #[tokio::test]
    async fn test_async_default_is_valid() {
        let ty = EntityType::builder("Bare")
            .property("a", |p| p.display_name("A"))
            .build();
        assert!(Entity::empty(&ty).is_async_valid("a").await);
    }

    #[test]
    fn test_required_presence() {
        let e = entity(json!({"name": "  ", "email": "a@b.co"}));
        let failure = e.check_property("name").unwrap();
        assert_eq!(failure.kind, FailureKind::Required);
        assert_eq!(failure.message, "Nombre es obligatorio");

        let e = entity(json!({"name": "Ana", "discount": 0, "vip": false}));
        assert!(e.check_property("vip").is_none());
        assert_eq!(
            e.check_property("email").unwrap().message,
            "El email es obligatorio"
        );
    }

    #[test]
    fn test_conditional_required_reads_instance() {
        assert!(!entity(json!({})).is_required("vip"));
        assert!(entity(json!({"discount": 10})).is_required("vip"));
    }

    #[test]
    fn test_sync_rules() {
        let e = entity(json!({"email": "nope", "discount": 80}));
        assert_eq!(
            e.check_property("email").unwrap().message,
            "Formato de email inválido"
        );
        assert_eq!(e.check_property("discount").unwrap().message, "Máximo 50%");
    }

    #[tokio::test]
    async fn test_async_error_fails_closed() {
        let ty = EntityType::builder("Remote")
            .property("code", |p| {
                p.display_name("Código").async_validation(
                    |_| async { Err::<bool, _>(anyhow::anyhow!("backend down")) }.boxed(),
                    "No disponible",
                )
            })
            .build();
        let e = Entity::empty(&ty);
        assert!(!e.is_async_valid("code").await);
        assert_eq!(
            e.async_validation_message("code").as_deref(),
            Some("No disponible")
        );
    }

    #[tokio::test]
    async fn test_pass_combines_flag_and_rules() {
        let bus = EventBus::new();
        let flag = ValidityFlag::new();
        let pass = ValidationPass {
            ui: &LogUi,
            signals: &bus,
            flag: &flag,
            settle: Duration::ZERO,
        };
        let ana = entity(json!({"name": "Ana", "email": "ana@example.com"}));

        let outcome = pass.run(&ana).await;
        assert!(outcome.is_valid());

        bus.subscribe(|signal| {
            if let Signal::ValidateInputs { flag } = signal {
                flag.invalidate();
            }
        });
        let outcome = pass.run(&ana).await;
        assert!(!outcome.is_valid());
        assert!(outcome.failures.is_empty());
    }

    #[tokio::test]
    async fn test_pass_collects_every_failure() {
        let bus = EventBus::new();
        let flag = ValidityFlag::new();
        let pass = ValidationPass {
            ui: &LogUi,
            signals: &bus,
            flag: &flag,
            settle: Duration::ZERO,
        };

        let outcome = pass.run(&entity(json!({"discount": 90}))).await;
        assert!(!outcome.is_valid());
        assert_eq!(
            outcome.failed_keys(),
            vec!["name", "email", "discount", "vip"]
        );
        assert_eq!(outcome.message_for("discount"), Some("Máximo 50%"));
    }

    #[test]
    fn test_input_metadata() {
        let meta = entity(json!({})).input_metadata("email");
        assert_eq!(meta.property_name, "Email");
        assert!(meta.required);
        assert!(meta.validated);
        assert_eq!(
            meta.required_message.as_deref(),
            Some("El email es obligatorio")
        );
        assert_eq!(
            meta.validated_message.as_deref(),
            Some("Formato de email inválido")
        );
    }
}
