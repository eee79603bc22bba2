//! Persistence key mapping
//!
//! Properties may be stored under a different name on the wire
//! (`#[property(persistent_key = "product_name")]`). Mapping is the identity
//! for every property that declares no override, and for every key that is
//! not a declared property at all.

pub mod transform;

use indexmap::IndexMap;
use serde_json::{Map, Value};

use crate::metadata::{EntityType, Facet, FacetValue};

pub use transform::{TransformationSchema, Transformer};

impl EntityType {
    /// External name of `key`; `key` itself when no override is registered
    pub fn persistent_key_for(&self, key: &str) -> String {
        self.facet(Facet::PersistentKey, key)
            .and_then(FacetValue::as_text)
            .unwrap_or(key)
            .to_string()
    }

    /// Internal property whose override equals `external`, if any.
    ///
    /// With colliding overrides the property declared last wins.
    pub fn property_key_for(&self, external: &str) -> Option<String> {
        self.facet_entries(Facet::PersistentKey)
            .into_iter()
            .filter(|(_, value)| value.as_text() == Some(external))
            .map(|(key, _)| key)
            .last()
    }

    /// Rename every key to its external name
    pub fn to_external(&self, data: &Map<String, Value>) -> Map<String, Value> {
        data.iter()
            .map(|(key, value)| (self.persistent_key_for(key), value.clone()))
            .collect()
    }

    /// Rename every external key back to its property name; unknown keys pass through
    pub fn to_internal(&self, payload: &Map<String, Value>) -> Map<String, Value> {
        let reverse: IndexMap<String, String> = self
            .facet_entries(Facet::PersistentKey)
            .into_iter()
            .filter_map(|(key, value)| {
                value.as_text().map(|ext| (ext.to_string(), key))
            })
            .collect();

        payload
            .iter()
            .map(|(external, value)| {
                let key = reverse
                    .get(external)
                    .cloned()
                    .unwrap_or_else(|| external.clone());
                (key, value.clone())
            })
            .collect()
    }

    /// External names claimed by more than one property, with the claimants.
    ///
    /// Registration does not reject such mappings; a non-empty result means
    /// `to_internal(to_external(x))` loses data for this type.
    pub fn mapping_collisions(&self) -> Vec<(String, Vec<String>)> {
        let mut claims: IndexMap<String, Vec<String>> = IndexMap::new();
        for key in self.declared_keys() {
            claims
                .entry(self.persistent_key_for(&key))
                .or_default()
                .push(key);
        }
        claims
            .into_iter()
            .filter(|(_, keys)| keys.len() > 1)
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::sync::Arc;

    fn product() -> Arc<EntityType> {
        EntityType::builder("Product")
            .property("id", |p| p.display_name("ID"))
            .property("name", |p| {
                p.display_name("Name").persistent_key("product_name")
            })
            .property("stock", |p| {
                p.display_name("Stock").persistent_key("qty_on_hand")
            })
            .build()
    }

    fn map(value: Value) -> Map<String, Value> {
        value.as_object().cloned().unwrap_or_default()
    }

    #[test]
    fn test_to_external_renames_overridden_keys() {
        let external =
            product().to_external(&map(json!({"id": 1, "name": "Chair", "extra": true})));
        assert_eq!(
            Value::Object(external),
            json!({"id": 1, "product_name": "Chair", "extra": true})
        );
    }

    #[test]
    fn test_to_internal_inverts_and_keeps_unknown_keys() {
        let internal = product().to_internal(&map(json!({
            "product_name": "Chair",
            "qty_on_hand": 4,
            "created": "x"
        })));
        assert_eq!(
            Value::Object(internal),
            json!({"name": "Chair", "stock": 4, "created": "x"})
        );
    }

    #[test]
    fn test_round_trip_for_injective_mapping() {
        let ty = product();
        let original = map(json!({"id": 7, "name": "Lamp", "stock": 0}));
        assert_eq!(ty.to_internal(&ty.to_external(&original)), original);
        assert!(ty.mapping_collisions().is_empty());
    }

    #[test]
    fn test_collisions_are_reported() {
        let ty = EntityType::builder("Clashing")
            .property("a", |p| p.display_name("A").persistent_key("code"))
            .property("b", |p| p.display_name("B").persistent_key("code"))
            .property("code", |p| p.display_name("Code"))
            .build();
        let collisions = ty.mapping_collisions();
        assert_eq!(
            collisions,
            vec![("code".to_string(), vec!["a".into(), "b".into(), "code".into()])]
        );

        let original = map(json!({"a": 1, "b": 2}));
        assert_ne!(ty.to_internal(&ty.to_external(&original)), original);
    }

    #[test]
    fn test_subtype_override_does_not_leak() {
        let parent = product();
        let child = EntityType::builder("Special")
            .extends(Arc::clone(&parent))
            .property("name", |p| p.persistent_key("special_name"))
            .build();
        assert_eq!(child.persistent_key_for("name"), "special_name");
        assert_eq!(child.persistent_key_for("stock"), "qty_on_hand");
        assert_eq!(parent.persistent_key_for("name"), "product_name");
    }
}
