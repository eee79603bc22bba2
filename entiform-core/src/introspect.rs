//! Property introspection
//!
//! Read-side helpers over the metadata registry: which properties a type
//! declares, in which order, with which type, and bulk views of the
//! presentation facets a UI layer needs to lay out a form or a table.

use indexmap::IndexMap;
use std::cmp::Ordering;
use std::sync::Arc;

use crate::metadata::{
    DisplayFormat, EntityType, Facet, FacetValue, Mask, PropertyType, StringType, ViewGroupRow,
};

impl EntityType {
    /// Every property with a display name (key → display name), in declaration order
    pub fn all_properties(&self) -> IndexMap<String, String> {
        self.facet_entries(Facet::DisplayName)
            .into_iter()
            .filter_map(|(key, value)| {
                value.as_text().map(|name| (key, name.to_string()))
            })
            .collect()
    }

    /// Like [`EntityType::all_properties`] but without collection properties
    pub fn properties(&self) -> IndexMap<String, String> {
        self.all_properties()
            .into_iter()
            .filter(|(key, _)| !self.is_collection(key))
            .collect()
    }

    pub fn property_display_name(&self, key: &str) -> Option<&str> {
        self.facet(Facet::DisplayName, key)
            .and_then(FacetValue::as_text)
    }

    pub fn property_type(&self, key: &str) -> Option<&PropertyType> {
        match self.facet(Facet::PropertyType, key) {
            Some(FacetValue::Type(ty)) => Some(ty),
            _ => None,
        }
    }

    pub fn is_collection(&self, key: &str) -> bool {
        self.property_type(key)
            .map(PropertyType::is_collection)
            .unwrap_or(false)
    }

    /// Element type of a collection-of-entities property; `None` otherwise
    pub fn collection_element_type(&self, key: &str) -> Option<Arc<EntityType>> {
        if !self.is_collection(key) {
            return None;
        }
        match self.facet(Facet::ElementType, key) {
            Some(FacetValue::Element(element)) => Some(element.resolve()),
            _ => None,
        }
    }

    /// Scalar property keys sorted by display-order index.
    ///
    /// Unindexed keys come last. Equal indices and unindexed keys keep their
    /// declaration order.
    pub fn ordered_keys(&self) -> Vec<String> {
        let keys = self.properties().into_keys().collect();
        self.sort_by_facet(keys, Facet::PropertyIndex)
    }

    /// Collection keys sorted by tab order, same tiebreak rules
    pub fn ordered_collection_keys(&self) -> Vec<String> {
        let keys = self
            .all_properties()
            .into_keys()
            .filter(|key| self.is_collection(key))
            .collect();
        self.sort_by_facet(keys, Facet::TabOrder)
    }

    fn sort_by_facet(&self, keys: Vec<String>, facet: Facet) -> Vec<String> {
        let positions = self.declaration_positions();
        let mut ranked: Vec<(Option<i64>, usize, String)> = keys
            .into_iter()
            .map(|key| {
                let order = self.facet(facet, &key).and_then(FacetValue::as_order);
                let position = positions.get(&key).copied().unwrap_or(usize::MAX);
                (order, position, key)
            })
            .collect();

        ranked.sort_by(|a, b| {
            let by_order = match (a.0, b.0) {
                (Some(x), Some(y)) => x.cmp(&y),
                (Some(_), None) => Ordering::Less,
                (None, Some(_)) => Ordering::Greater,
                (None, None) => Ordering::Equal,
            };
            by_order.then(a.1.cmp(&b.1))
        });

        ranked.into_iter().map(|(_, _, key)| key).collect()
    }

    fn text_entries(&self, facet: Facet) -> IndexMap<String, String> {
        self.facet_entries(facet)
            .into_iter()
            .filter_map(|(key, value)| {
                value.as_text().map(|text| (key, text.to_string()))
            })
            .collect()
    }

    fn order_entries(&self, facet: Facet) -> IndexMap<String, i64> {
        self.facet_entries(facet)
            .into_iter()
            .filter_map(|(key, value)| value.as_order().map(|order| (key, order)))
            .collect()
    }

    pub fn css_classes(&self) -> IndexMap<String, String> {
        self.text_entries(Facet::CssClass)
    }

    pub fn view_groups(&self) -> IndexMap<String, String> {
        self.text_entries(Facet::ViewGroup)
    }

    pub fn view_group_rows(&self) -> IndexMap<String, ViewGroupRow> {
        self.facet_entries(Facet::ViewGroupRow)
            .into_iter()
            .filter_map(|(key, value)| match value {
                FacetValue::Row(row) => Some((key, *row)),
                _ => None,
            })
            .collect()
    }

    /// String type of every scalar property; text unless declared otherwise
    pub fn string_types(&self) -> IndexMap<String, StringType> {
        self.properties()
            .into_keys()
            .map(|key| {
                let ty = self.string_type(&key);
                (key, ty)
            })
            .collect()
    }

    pub fn string_type(&self, key: &str) -> StringType {
        match self.facet(Facet::StringType, key) {
            Some(FacetValue::StringType(ty)) => *ty,
            _ => StringType::default(),
        }
    }

    pub fn masks(&self) -> IndexMap<String, Mask> {
        self.facet_entries(Facet::Mask)
            .into_iter()
            .filter_map(|(key, value)| match value {
                FacetValue::Mask(mask) => Some((key, mask.clone())),
                _ => None,
            })
            .collect()
    }

    pub fn tab_orders(&self) -> IndexMap<String, i64> {
        self.order_entries(Facet::TabOrder)
    }

    pub fn property_indices(&self) -> IndexMap<String, i64> {
        self.order_entries(Facet::PropertyIndex)
    }

    pub fn help_text(&self, key: &str) -> Option<&str> {
        self.facet(Facet::HelpText, key)
            .and_then(FacetValue::as_text)
    }

    pub fn help_texts(&self) -> IndexMap<String, String> {
        self.text_entries(Facet::HelpText)
    }

    pub fn display_format(&self, key: &str) -> Option<&DisplayFormat> {
        match self.facet(Facet::DisplayFormat, key) {
            Some(FacetValue::Format(format)) => Some(format),
            _ => None,
        }
    }

    pub fn is_hidden_in_list(&self, key: &str) -> bool {
        self.facet(Facet::HideInList, key)
            .and_then(FacetValue::as_flag)
            .unwrap_or(false)
    }

    pub fn is_hidden_in_detail(&self, key: &str) -> bool {
        self.facet(Facet::HideInDetail, key)
            .and_then(FacetValue::as_flag)
            .unwrap_or(false)
    }

    /// Ordered keys shown as list columns
    pub fn list_keys(&self) -> Vec<String> {
        self.ordered_keys()
            .into_iter()
            .filter(|key| !self.is_hidden_in_list(key))
            .collect()
    }

    /// Ordered keys shown in the detail form
    pub fn detail_keys(&self) -> Vec<String> {
        self.ordered_keys()
            .into_iter()
            .filter(|key| !self.is_hidden_in_detail(key))
            .collect()
    }
}
