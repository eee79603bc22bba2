//! Entity instances
//!
//! An [`Entity`] is a bag of property values (a json map, where an absent key
//! means "undefined") tied to its [`EntityType`], plus the runtime state the
//! CRUD orchestrator needs: `loading`, `saving` and the snapshot used for
//! dirty-state detection.

pub mod snapshot;

use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::{Map, Value};
use std::fmt;
use std::sync::Arc;
use uuid::Uuid;

use crate::metadata::{types::plain_text, EntityType, Facet, FacetValue};
use crate::{EntityError, Result};

/// Struct-backed entity types (usually derived with `#[derive(EntityModel)]`)
pub trait EntityModel: Serialize + DeserializeOwned {
    /// The registered metadata for this type
    fn entity_type() -> Arc<EntityType>;

    /// Wrap a copy of this value into a runtime entity
    fn to_entity(&self) -> Result<Entity> {
        Entity::from_model(self)
    }
}

/// Runtime instance of an entity type
#[derive(Clone)]
pub struct Entity {
    ty: Arc<EntityType>,
    values: Map<String, Value>,
    original_state: Map<String, Value>,
    loading: bool,
    saving: bool,
    null: bool,
    object_id: Uuid,
}

impl Entity {
    /// Build an instance from partial data and snapshot it immediately
    pub fn new(ty: &Arc<EntityType>, data: Map<String, Value>) -> Self {
        let mut entity = Self {
            ty: Arc::clone(ty),
            values: data,
            original_state: Map::new(),
            loading: false,
            saving: false,
            null: false,
            object_id: Uuid::new_v4(),
        };
        entity.refresh_snapshot();
        entity
    }

    /// Build an instance from a json object
    pub fn from_value(ty: &Arc<EntityType>, data: Value) -> Result<Self> {
        match data {
            Value::Object(map) => Ok(Self::new(ty, map)),
            other => Err(EntityError::InvalidData(format!(
                "expected a json object for {}, got {}",
                ty.id(),
                json_kind(&other)
            ))),
        }
    }

    /// Fresh instance with no values set
    pub fn empty(ty: &Arc<EntityType>) -> Self {
        Self::new(ty, Map::new())
    }

    /// Placeholder standing for "no entity"; [`Entity::is_null`] is true
    pub fn null(ty: &Arc<EntityType>) -> Self {
        let mut entity = Self::empty(ty);
        entity.null = true;
        entity
    }

    pub fn from_model<T: EntityModel>(model: &T) -> Result<Self> {
        Self::from_value(&T::entity_type(), serde_json::to_value(model)?)
    }

    /// Deserialize the current values into a typed model
    pub fn to_model<T: DeserializeOwned>(&self) -> Result<T> {
        Ok(serde_json::from_value(Value::Object(self.values.clone()))?)
    }

    pub fn entity_type(&self) -> &Arc<EntityType> {
        &self.ty
    }

    /// Identifier used by UI layers to track this instance across views
    pub fn object_id(&self) -> Uuid {
        self.object_id
    }

    pub fn is_null(&self) -> bool {
        self.null
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.values.get(key)
    }

    pub fn get_str(&self, key: &str) -> Option<&str> {
        self.values.get(key).and_then(Value::as_str)
    }

    pub fn get_as<T: DeserializeOwned>(&self, key: &str) -> Option<T> {
        self.values
            .get(key)
            .and_then(|v| serde_json::from_value(v.clone()).ok())
    }

    pub fn set(&mut self, key: &str, value: impl Into<Value>) {
        self.values.insert(key.to_string(), value.into());
    }

    /// Make `key` undefined again
    pub fn unset(&mut self, key: &str) -> Option<Value> {
        self.values.remove(key)
    }

    /// Copy every entry of `data` onto this instance
    pub fn merge(&mut self, data: Map<String, Value>) {
        for (key, value) in data {
            self.values.insert(key, value);
        }
    }

    pub fn values(&self) -> &Map<String, Value> {
        &self.values
    }

    /// All values, declared or not
    pub fn to_object(&self) -> Map<String, Value> {
        self.values.clone()
    }

    /// Values of declared properties only
    pub fn to_persistent_object(&self) -> Map<String, Value> {
        snapshot::capture(&self.values, &self.ty.declared_keys())
    }

    pub fn original_state(&self) -> &Map<String, Value> {
        &self.original_state
    }

    /// True iff declared-property values differ from the last snapshot
    pub fn is_dirty(&self) -> bool {
        !snapshot::maps_equal(&self.original_state, &self.to_persistent_object())
    }

    /// Revert declared properties to the snapshot
    pub fn reset_changes(&mut self) {
        for key in self.ty.declared_keys() {
            match self.original_state.get(&key) {
                Some(value) => {
                    self.values.insert(key, value.clone());
                }
                None => {
                    self.values.remove(&key);
                }
            }
        }
    }

    pub(crate) fn refresh_snapshot(&mut self) {
        self.original_state = self.to_persistent_object();
    }

    pub fn set_loading(&mut self) {
        self.loading = true;
    }

    pub fn clear_loading_state(&mut self) {
        self.loading = false;
    }

    pub fn is_loading(&self) -> bool {
        self.loading
    }

    pub fn is_saving(&self) -> bool {
        self.saving
    }

    pub(crate) fn set_saving(&mut self, saving: bool) {
        self.saving = saving;
    }

    fn value_of(&self, key: Option<&str>) -> Option<&Value> {
        key.and_then(|k| self.values.get(k))
    }

    pub fn primary_property_value(&self) -> Option<&Value> {
        self.value_of(self.ty.primary_property())
    }

    pub fn unique_property_value(&self) -> Option<&Value> {
        self.value_of(self.ty.unique_property())
    }

    pub fn default_property_value(&self) -> Option<&Value> {
        self.value_of(self.ty.default_property())
    }

    /// True iff the primary key is absent or null; `0` and `""` are not new
    pub fn is_new(&self) -> bool {
        matches!(self.primary_property_value(), None | Some(Value::Null))
    }

    pub fn is_disabled(&self, key: &str) -> bool {
        self.evaluate_condition(Facet::Disabled, key)
    }

    pub fn is_read_only(&self, key: &str) -> bool {
        self.evaluate_condition(Facet::ReadOnly, key)
    }

    fn evaluate_condition(&self, facet: Facet, key: &str) -> bool {
        self.ty
            .facet(facet, key)
            .and_then(FacetValue::as_condition)
            .map(|condition| condition.evaluate(self))
            .unwrap_or(false)
    }

    /// Value rendered through its display format, or its plain string form
    pub fn formatted_value(&self, key: &str) -> String {
        let value = self.values.get(key);
        match self.ty.display_format(key) {
            Some(format) => format.apply(value),
            None => plain_text(value),
        }
    }
}

impl fmt::Debug for Entity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Entity")
            .field("type", &self.ty.id())
            .field("values", &self.values)
            .field("loading", &self.loading)
            .field("saving", &self.saving)
            .finish()
    }
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
