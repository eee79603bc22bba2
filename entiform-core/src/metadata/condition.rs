//! Conditions attached to facets: constants or functions of the instance

use futures::future::BoxFuture;
use std::fmt;
use std::sync::Arc;

use crate::entity::Entity;

pub type Predicate = Arc<dyn Fn(&Entity) -> bool + Send + Sync>;

/// Async predicates read what they need from the entity up front and return
/// an owned future, so several of them can be polled side by side.
pub type AsyncPredicate =
    Arc<dyn Fn(&Entity) -> BoxFuture<'static, anyhow::Result<bool>> + Send + Sync>;

/// Either a fixed answer or a function of the owning instance
#[derive(Clone)]
pub enum Condition {
    Constant(bool),
    Predicate(Predicate),
}

impl Condition {
    pub fn when<F>(f: F) -> Self
    where
        F: Fn(&Entity) -> bool + Send + Sync + 'static,
    {
        Condition::Predicate(Arc::new(f))
    }

    pub fn evaluate(&self, entity: &Entity) -> bool {
        match self {
            Condition::Constant(value) => *value,
            Condition::Predicate(predicate) => predicate(entity),
        }
    }
}

impl From<bool> for Condition {
    fn from(value: bool) -> Self {
        Condition::Constant(value)
    }
}

impl fmt::Debug for Condition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Condition::Constant(value) => write!(f, "Constant({})", value),
            Condition::Predicate(_) => f.write_str("Predicate(<fn>)"),
        }
    }
}

/// A condition plus the message shown when it does not hold
#[derive(Debug, Clone)]
pub struct Rule {
    pub condition: Condition,
    pub message: Option<String>,
}

impl Rule {
    pub fn new(condition: impl Into<Condition>, message: Option<String>) -> Self {
        Self {
            condition: condition.into(),
            message,
        }
    }
}

#[derive(Clone)]
pub struct AsyncRule {
    predicate: AsyncPredicate,
    pub message: Option<String>,
}

impl AsyncRule {
    pub fn new<F>(predicate: F, message: Option<String>) -> Self
    where
        F: Fn(&Entity) -> BoxFuture<'static, anyhow::Result<bool>> + Send + Sync + 'static,
    {
        Self {
            predicate: Arc::new(predicate),
            message,
        }
    }

    pub async fn evaluate(&self, entity: &Entity) -> anyhow::Result<bool> {
        (self.predicate)(entity).await
    }
}

impl fmt::Debug for AsyncRule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AsyncRule")
            .field("message", &self.message)
            .finish_non_exhaustive()
    }
}
