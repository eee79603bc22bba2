//! Metadata registry for entity types
//!
//! Every entity type owns a set of per-facet stores (`facet -> property -> value`)
//! plus its class-level metadata. Stores are filled once through
//! [`EntityTypeBuilder`] and are read-only afterwards. A type built with
//! [`EntityTypeBuilder::extends`] sees everything its parent registered,
//! unless it registers the same facet for the same property itself; its own
//! registrations never leak back into the parent.
//!
//! # Example
//!
//! ```rust,ignore
//! use entiform_core::metadata::{EntityType, PropertyType, HttpMethod};
//!
//! let product = EntityType::builder("Product")
//!     .module_name("Products")
//!     .module_icon("box")
//!     .primary_property("id")
//!     .unique_property("id")
//!     .default_property("name")
//!     .api_endpoint("/api/products")
//!     .api_methods([HttpMethod::Get, HttpMethod::Post, HttpMethod::Put])
//!     .persistent()
//!     .property("id", |p| p.display_name("ID").property_type(PropertyType::Number).index(1))
//!     .property("name", |p| {
//!         p.display_name("Name").property_type(PropertyType::String).required(true)
//!     })
//!     .build();
//! ```

pub mod condition;
pub mod types;

pub use condition::{AsyncPredicate, AsyncRule, Condition, Predicate, Rule};
pub use types::{
    DisplayFormat, EntityTypeRef, HttpMethod, Mask, MaskSide, PropertyType, StringType,
    ViewGroupRow,
};

use futures::future::BoxFuture;
use indexmap::{IndexMap, IndexSet};
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use crate::entity::Entity;
use crate::lifecycle::{EntityHooks, NoHooks};

/// One independent kind of per-property metadata
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Facet {
    DisplayName,
    PropertyType,
    ElementType,
    Required,
    Validation,
    AsyncValidation,
    Disabled,
    ReadOnly,
    DisplayFormat,
    HelpText,
    CssClass,
    ViewGroup,
    ViewGroupRow,
    TabOrder,
    PropertyIndex,
    HideInList,
    HideInDetail,
    PersistentKey,
    StringType,
    Mask,
}

/// Value stored under a `(facet, property)` pair
#[derive(Debug, Clone)]
pub enum FacetValue {
    Text(String),
    Order(i64),
    Flag(bool),
    Type(PropertyType),
    Element(EntityTypeRef),
    Rule(Rule),
    AsyncRule(AsyncRule),
    Condition(Condition),
    Format(DisplayFormat),
    Row(ViewGroupRow),
    StringType(StringType),
    Mask(Mask),
}

impl FacetValue {
    pub fn as_text(&self) -> Option<&str> {
        match self {
            FacetValue::Text(text) => Some(text),
            _ => None,
        }
    }

    pub fn as_order(&self) -> Option<i64> {
        match self {
            FacetValue::Order(order) => Some(*order),
            _ => None,
        }
    }

    pub fn as_flag(&self) -> Option<bool> {
        match self {
            FacetValue::Flag(flag) => Some(*flag),
            _ => None,
        }
    }

    pub fn as_rule(&self) -> Option<&Rule> {
        match self {
            FacetValue::Rule(rule) => Some(rule),
            _ => None,
        }
    }

    pub fn as_condition(&self) -> Option<&Condition> {
        match self {
            FacetValue::Condition(condition) => Some(condition),
            _ => None,
        }
    }
}

/// Class-level metadata (one per entity type, not per property)
#[derive(Debug, Clone, Default)]
pub struct ClassMetadata {
    pub module_name: Option<String>,
    pub module_icon: Option<String>,
    pub module_permission: Option<String>,
    pub primary_property: Option<String>,
    pub unique_property: Option<String>,
    pub default_property: Option<String>,
    pub api_endpoint: Option<String>,
    pub api_methods: Option<Vec<HttpMethod>>,
    pub persistent: Option<bool>,
    pub list_component: Option<String>,
    pub detail_component: Option<String>,
    pub default_component: Option<String>,
    pub custom_components: Option<IndexMap<String, String>>,
}

/// Registered entity type: class metadata plus per-facet property stores
pub struct EntityType {
    id: String,
    parent: Option<Arc<EntityType>>,
    class: ClassMetadata,
    facets: HashMap<Facet, IndexMap<String, FacetValue>>,
    declared: Vec<String>,
    hooks: Arc<dyn EntityHooks>,
}

impl EntityType {
    pub fn builder(id: impl Into<String>) -> EntityTypeBuilder {
        EntityTypeBuilder::new(id)
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn parent(&self) -> Option<&Arc<EntityType>> {
        self.parent.as_ref()
    }

    /// True if `self` is `other` or inherits from it
    pub fn is_a(&self, other: &EntityType) -> bool {
        if std::ptr::eq(self, other) {
            return true;
        }
        self.parent.as_ref().map(|p| p.is_a(other)).unwrap_or(false)
    }

    pub fn hooks(&self) -> &Arc<dyn EntityHooks> {
        &self.hooks
    }

    /// Look up one facet value, falling through to the parent chain
    pub fn facet(&self, facet: Facet, key: &str) -> Option<&FacetValue> {
        self.facets
            .get(&facet)
            .and_then(|store| store.get(key))
            .or_else(|| self.parent.as_ref().and_then(|p| p.facet(facet, key)))
    }

    /// Every property that registered `facet`, in declaration order
    pub fn facet_entries(&self, facet: Facet) -> Vec<(String, &FacetValue)> {
        self.declared_keys()
            .into_iter()
            .filter_map(|key| self.facet(facet, &key).map(|value| (key, value)))
            .collect()
    }

    /// Declared property keys; inherited keys first, then this type's own
    pub fn declared_keys(&self) -> Vec<String> {
        self.declared_key_set().into_iter().collect()
    }

    fn declared_key_set(&self) -> IndexSet<String> {
        let mut keys = self.parent
            .as_ref()
            .map(|p| p.declared_key_set())
            .unwrap_or_default();
        keys.extend(self.declared.iter().cloned());
        keys
    }

    /// Declaration position of every declared key
    pub fn declaration_positions(&self) -> HashMap<String, usize> {
        self.declared_key_set()
            .into_iter()
            .enumerate()
            .map(|(position, key)| (key, position))
            .collect()
    }

    /// Position of `key` in declaration order (used as sort tiebreak)
    pub fn declaration_position(&self, key: &str) -> Option<usize> {
        self.declared_keys().iter().position(|k| k == key)
    }

    pub fn is_declared(&self, key: &str) -> bool {
        let inherited = || self.parent.as_ref().is_some_and(|p| p.is_declared(key));
        self.declared.iter().any(|k| k == key) || inherited()
    }

    fn class_field<T: ?Sized>(&self, f: fn(&ClassMetadata) -> Option<&T>) -> Option<&T> {
        f(&self.class).or_else(|| self.parent.as_ref().and_then(|p| p.class_field(f)))
    }

    pub fn module_name(&self) -> Option<&str> {
        self.class_field(|c| c.module_name.as_deref())
    }

    pub fn module_icon(&self) -> Option<&str> {
        self.class_field(|c| c.module_icon.as_deref())
    }

    pub fn module_permission(&self) -> Option<&str> {
        self.class_field(|c| c.module_permission.as_deref())
    }

    pub fn primary_property(&self) -> Option<&str> {
        self.class_field(|c| c.primary_property.as_deref())
    }

    pub fn unique_property(&self) -> Option<&str> {
        self.class_field(|c| c.unique_property.as_deref())
    }

    pub fn default_property(&self) -> Option<&str> {
        self.class_field(|c| c.default_property.as_deref())
    }

    pub fn api_endpoint(&self) -> Option<&str> {
        self.class_field(|c| c.api_endpoint.as_deref())
    }

    /// Allowed verbs; `None` when the type never declared any
    pub fn api_methods(&self) -> Option<&[HttpMethod]> {
        self.class_field(|c| c.api_methods.as_deref())
    }

    /// An undeclared verb set allows everything
    pub fn is_api_method_allowed(&self, method: HttpMethod) -> bool {
        self.api_methods()
            .map(|methods| methods.contains(&method))
            .unwrap_or(true)
    }

    pub fn is_persistent(&self) -> bool {
        self.class_field(|c| c.persistent.as_ref())
            .copied()
            .unwrap_or(false)
    }

    pub fn list_component(&self) -> &str {
        self.class_field(|c| c.list_component.as_deref())
            .unwrap_or(DEFAULT_LIST_COMPONENT)
    }

    pub fn detail_component(&self) -> &str {
        self.class_field(|c| c.detail_component.as_deref())
            .unwrap_or(DEFAULT_DETAIL_COMPONENT)
    }

    pub fn default_component(&self) -> &str {
        self.class_field(|c| c.default_component.as_deref())
            .unwrap_or(DEFAULT_LIST_COMPONENT)
    }

    pub fn custom_components(&self) -> Option<&IndexMap<String, String>> {
        self.class_field(|c| c.custom_components.as_ref())
    }
}

/// Component used when a type declares no list view of its own
pub const DEFAULT_LIST_COMPONENT: &str = "default_listview";
/// Component used when a type declares no detail view of its own
pub const DEFAULT_DETAIL_COMPONENT: &str = "default_detailview";

impl fmt::Debug for EntityType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EntityType")
            .field("id", &self.id)
            .field("parent", &self.parent.as_ref().map(|p| p.id().to_string()))
            .field("class", &self.class)
            .field("declared", &self.declared)
            .finish_non_exhaustive()
    }
}

/// Static-init builder for an [`EntityType`]
pub struct EntityTypeBuilder {
    id: String,
    parent: Option<Arc<EntityType>>,
    class: ClassMetadata,
    facets: HashMap<Facet, IndexMap<String, FacetValue>>,
    declared: Vec<String>,
    hooks: Option<Arc<dyn EntityHooks>>,
}

impl EntityTypeBuilder {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            parent: None,
            class: ClassMetadata::default(),
            facets: HashMap::new(),
            declared: Vec::new(),
            hooks: None,
        }
    }

    /// Inherit metadata (and hooks, unless overridden) from `parent`
    pub fn extends(mut self, parent: Arc<EntityType>) -> Self {
        self.parent = Some(parent);
        self
    }

    pub fn module_name(mut self, name: impl Into<String>) -> Self {
        self.class.module_name = Some(name.into());
        self
    }

    pub fn module_icon(mut self, icon: impl Into<String>) -> Self {
        self.class.module_icon = Some(icon.into());
        self
    }

    pub fn module_permission(mut self, permission: impl Into<String>) -> Self {
        self.class.module_permission = Some(permission.into());
        self
    }

    pub fn primary_property(mut self, key: impl Into<String>) -> Self {
        self.class.primary_property = Some(key.into());
        self
    }

    pub fn unique_property(mut self, key: impl Into<String>) -> Self {
        self.class.unique_property = Some(key.into());
        self
    }

    pub fn default_property(mut self, key: impl Into<String>) -> Self {
        self.class.default_property = Some(key.into());
        self
    }

    pub fn api_endpoint(mut self, path: impl Into<String>) -> Self {
        self.class.api_endpoint = Some(path.into());
        self
    }

    pub fn api_methods(mut self, methods: impl IntoIterator<Item = HttpMethod>) -> Self {
        self.class.api_methods = Some(methods.into_iter().collect());
        self
    }

    pub fn persistent(mut self) -> Self {
        self.class.persistent = Some(true);
        self
    }

    pub fn list_component(mut self, component: impl Into<String>) -> Self {
        self.class.list_component = Some(component.into());
        self
    }

    pub fn detail_component(mut self, component: impl Into<String>) -> Self {
        self.class.detail_component = Some(component.into());
        self
    }

    pub fn default_component(mut self, component: impl Into<String>) -> Self {
        self.class.default_component = Some(component.into());
        self
    }

    pub fn custom_component(
        mut self,
        name: impl Into<String>,
        component: impl Into<String>,
    ) -> Self {
        self.class
            .custom_components
            .get_or_insert_with(IndexMap::new)
            .insert(name.into(), component.into());
        self
    }

    pub fn hooks(mut self, hooks: impl EntityHooks + 'static) -> Self {
        self.hooks = Some(Arc::new(hooks));
        self
    }

    /// Declare a property and register its facets
    pub fn property<F>(mut self, key: &str, configure: F) -> Self
    where
        F: FnOnce(PropertyBuilder) -> PropertyBuilder,
    {
        let builder = configure(PropertyBuilder::new(key));
        self.declare(key);
        for (facet, value) in builder.entries {
            self.define(key, facet, value);
        }
        self
    }

    /// Store `value` under `(facet, key)`; a later call for the same pair wins
    pub fn define(&mut self, key: &str, facet: Facet, value: FacetValue) -> &mut Self {
        self.declare(key);
        self.facets
            .entry(facet)
            .or_default()
            .insert(key.to_string(), value);
        self
    }

    fn declare(&mut self, key: &str) {
        if !self.declared.iter().any(|k| k == key) {
            self.declared.push(key.to_string());
        }
    }

    pub fn build(self) -> Arc<EntityType> {
        let hooks = match (self.hooks, &self.parent) {
            (Some(hooks), _) => hooks,
            (None, Some(parent)) => Arc::clone(&parent.hooks),
            (None, None) => Arc::new(NoHooks) as Arc<dyn EntityHooks>,
        };

        log::debug!(
            "registered entity type {} ({} properties, parent: {:?})",
            self.id,
            self.declared.len(),
            self.parent.as_ref().map(|p| p.id())
        );

        Arc::new(EntityType {
            id: self.id,
            parent: self.parent,
            class: self.class,
            facets: self.facets,
            declared: self.declared,
            hooks,
        })
    }
}

/// Collects the facets of one property inside [`EntityTypeBuilder::property`]
pub struct PropertyBuilder {
    key: String,
    entries: Vec<(Facet, FacetValue)>,
}

impl PropertyBuilder {
    fn new(key: &str) -> Self {
        Self {
            key: key.to_string(),
            entries: Vec::new(),
        }
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    fn with(mut self, facet: Facet, value: FacetValue) -> Self {
        self.entries.retain(|(f, _)| *f != facet);
        self.entries.push((facet, value));
        self
    }

    pub fn display_name(self, name: impl Into<String>) -> Self {
        self.with(Facet::DisplayName, FacetValue::Text(name.into()))
    }

    pub fn property_type(self, ty: PropertyType) -> Self {
        self.with(Facet::PropertyType, FacetValue::Type(ty))
    }

    /// Collection whose elements are entities of `element`
    pub fn collection_of(self, element: impl Into<EntityTypeRef>) -> Self {
        self.property_type(PropertyType::Collection)
            .with(Facet::ElementType, FacetValue::Element(element.into()))
    }

    pub fn required(self, condition: impl Into<Condition>) -> Self {
        self.with(
            Facet::Required,
            FacetValue::Rule(Rule::new(condition, None)),
        )
    }

    pub fn required_with_message(
        self,
        condition: impl Into<Condition>,
        message: impl Into<String>,
    ) -> Self {
        self.with(
            Facet::Required,
            FacetValue::Rule(Rule::new(condition, Some(message.into()))),
        )
    }

    pub fn validation(self, condition: impl Into<Condition>, message: impl Into<String>) -> Self {
        self.with(
            Facet::Validation,
            FacetValue::Rule(Rule::new(condition, Some(message.into()))),
        )
    }

    pub fn validation_rule(self, rule: Rule) -> Self {
        self.with(Facet::Validation, FacetValue::Rule(rule))
    }

    /// Attach a value check from [`crate::validation::validators`]
    pub fn check(self, check: crate::validation::validators::ValueCheck) -> Self {
        let rule = check.into_rule(&self.key);
        self.validation_rule(rule)
    }

    pub fn async_validation<F>(self, predicate: F, message: impl Into<String>) -> Self
    where
        F: Fn(&Entity) -> BoxFuture<'static, anyhow::Result<bool>> + Send + Sync + 'static,
    {
        self.async_rule(AsyncRule::new(predicate, Some(message.into())))
    }

    /// Attach a remote check such as [`crate::validation::validators::AsyncValidators::unique`]
    pub fn async_check(self, check: crate::validation::validators::AsyncValueCheck) -> Self {
        let rule = check.into_rule(&self.key);
        self.async_rule(rule)
    }

    pub fn async_rule(self, rule: AsyncRule) -> Self {
        self.with(Facet::AsyncValidation, FacetValue::AsyncRule(rule))
    }

    pub fn disabled(self, condition: impl Into<Condition>) -> Self {
        self.with(Facet::Disabled, FacetValue::Condition(condition.into()))
    }

    pub fn read_only(self, condition: impl Into<Condition>) -> Self {
        self.with(Facet::ReadOnly, FacetValue::Condition(condition.into()))
    }

    pub fn display_format(self, format: impl Into<DisplayFormat>) -> Self {
        self.with(Facet::DisplayFormat, FacetValue::Format(format.into()))
    }

    pub fn help_text(self, text: impl Into<String>) -> Self {
        self.with(Facet::HelpText, FacetValue::Text(text.into()))
    }

    pub fn css_class(self, class: impl Into<String>) -> Self {
        self.with(Facet::CssClass, FacetValue::Text(class.into()))
    }

    pub fn view_group(self, group: impl Into<String>) -> Self {
        self.with(Facet::ViewGroup, FacetValue::Text(group.into()))
    }

    pub fn view_group_row(self, row: ViewGroupRow) -> Self {
        self.with(Facet::ViewGroupRow, FacetValue::Row(row))
    }

    pub fn tab_order(self, order: i64) -> Self {
        self.with(Facet::TabOrder, FacetValue::Order(order))
    }

    /// Display-order index used by [`EntityType::ordered_keys`]
    pub fn index(self, index: i64) -> Self {
        self.with(Facet::PropertyIndex, FacetValue::Order(index))
    }

    pub fn hide_in_list(self) -> Self {
        self.with(Facet::HideInList, FacetValue::Flag(true))
    }

    pub fn hide_in_detail(self) -> Self {
        self.with(Facet::HideInDetail, FacetValue::Flag(true))
    }

    /// External (wire/storage) name of this property
    pub fn persistent_key(self, key: impl Into<String>) -> Self {
        self.with(Facet::PersistentKey, FacetValue::Text(key.into()))
    }

    pub fn string_type(self, ty: StringType) -> Self {
        self.with(Facet::StringType, FacetValue::StringType(ty))
    }

    pub fn mask(self, mask: impl Into<String>, side: MaskSide) -> Self {
        self.with(
            Facet::Mask,
            FacetValue::Mask(Mask {
                mask: mask.into(),
                side,
            }),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn base() -> Arc<EntityType> {
        EntityType::builder("Base")
            .module_name("Base module")
            .primary_property("id")
            .property("id", |p| {
                p.display_name("ID").property_type(PropertyType::Number)
            })
            .property("name", |p| {
                p.display_name("Name")
                    .help_text("base help")
                    .css_class("wide")
            })
            .build()
    }

    #[test]
    fn test_facet_lookup_falls_through_to_parent() {
        let parent = base();
        let child = EntityType::builder("Child")
            .extends(Arc::clone(&parent))
            .property("name", |p| p.help_text("child help"))
            .property("extra", |p| p.display_name("Extra"))
            .build();

        let help = child
            .facet(Facet::HelpText, "name")
            .and_then(FacetValue::as_text);
        assert_eq!(help, Some("child help"));
        let css = child
            .facet(Facet::CssClass, "name")
            .and_then(FacetValue::as_text);
        assert_eq!(css, Some("wide"));
        assert_eq!(child.module_name(), Some("Base module"));
        assert_eq!(child.primary_property(), Some("id"));

        // Child registrations stay on the child
        let parent_help = parent
            .facet(Facet::HelpText, "name")
            .and_then(FacetValue::as_text);
        assert_eq!(parent_help, Some("base help"));
        assert!(parent.facet(Facet::DisplayName, "extra").is_none());
    }

    #[test]
    fn test_declared_keys_are_not_duplicated() {
        let child = EntityType::builder("Child")
            .extends(base())
            .property("name", |p| p.display_name("Full name"))
            .property("extra", |p| p.display_name("Extra"))
            .build();
        assert_eq!(child.declared_keys(), vec!["id", "name", "extra"]);

        let positions = child.declaration_positions();
        assert_eq!(positions.get("name"), Some(&1));
        assert_eq!(positions.get("extra"), Some(&2));
        assert_eq!(child.declaration_position("extra"), Some(2));
    }

    #[test]
    fn test_later_define_wins() {
        let mut builder = EntityType::builder("T");
        builder.define("a", Facet::CssClass, FacetValue::Text("one".into()));
        builder.define("a", Facet::CssClass, FacetValue::Text("two".into()));
        let ty = builder.build();
        assert_eq!(
            ty.facet(Facet::CssClass, "a").and_then(FacetValue::as_text),
            Some("two")
        );
    }

    #[test]
    fn test_api_methods_default_to_all_allowed() {
        let open = base();
        assert!(open.is_api_method_allowed(HttpMethod::Delete));

        let restricted = EntityType::builder("R")
            .api_methods([HttpMethod::Get])
            .build();
        assert!(restricted.is_api_method_allowed(HttpMethod::Get));
        assert!(!restricted.is_api_method_allowed(HttpMethod::Post));
    }

    #[test]
    fn test_is_a() {
        let parent = base();
        let child = EntityType::builder("Child")
            .extends(Arc::clone(&parent))
            .build();
        assert!(child.is_a(&parent));
        assert!(!parent.is_a(&child));
    }

    #[test]
    fn test_component_defaults() {
        let ty = EntityType::builder("T")
            .detail_component("product_detail")
            .build();
        assert_eq!(ty.list_component(), DEFAULT_LIST_COMPONENT);
        assert_eq!(ty.detail_component(), "product_detail");
        assert!(ty.custom_components().is_none());
    }
}
