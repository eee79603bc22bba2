//! Procedural macros for the Entiform framework
//!
//! This crate provides `#[derive(EntityModel)]`, which turns attribute
//! annotations on a plain serde struct into the entity type metadata that
//! `entiform-core` reads at runtime.

use proc_macro::TokenStream;

mod entity_model;

/// Derive macro registering a struct as an entity type
///
/// Struct-level `#[entity(...)]` keys: `id`, `extends`, `module_name`, `icon`,
/// `permission`, `endpoint`, `methods(get, post, put, patch, delete)`,
/// `primary`, `unique`, `default`, `persistent`, `list_component`,
/// `detail_component`, `default_component`, `hooks`.
///
/// Field-level `#[property(...)]` keys: `name`, `index`, `tab_order`,
/// `required`, `required_if`, `required_message`, `validate`,
/// `validate_message`, `check`, `async_validate`, `async_message`,
/// `disabled`, `disabled_if`, `readonly`, `readonly_if`, `help`, `css`,
/// `group`, `row`, `format`, `format_with`, `string_type`, `mask`,
/// `mask_side`, `persistent_key`, `hide_in_list`, `hide_in_detail`,
/// `entity`, `entities`, `options`.
///
/// Keys taking a function (`required_if`, `validate`, `format_with`, ...)
/// expect a path in a string literal. `check` and `hooks` take an expression,
/// written either bare (`check = Validators::min_length(3)`) or inside a
/// string literal (`check = "Validators::min_length(3)"`).
///
/// # Example
///
/// ```rust,ignore
/// use entiform_core::prelude::*;
/// use serde::{Deserialize, Serialize};
///
/// fn has_discount(e: &Entity) -> bool {
///     e.get("discount").is_some()
/// }
///
/// #[derive(EntityModel, Serialize, Deserialize)]
/// #[entity(module_name = "Productos", endpoint = "/api/products",
///          methods(get, post, put, delete), primary = "id", unique = "id")]
/// struct Product {
///     #[property(name = "ID", index = 1, readonly)]
///     id: Option<i64>,
///     #[property(name = "Nombre", index = 2, required, check = "Validators::min_length(3)")]
///     name: String,
///     #[property(name = "Motivo", required_if = "has_discount", hide_in_list)]
///     reason: Option<String>,
///     #[property(name = "Líneas", entities)]
///     lines: Vec<ProductLine>,
/// }
/// ```
#[proc_macro_derive(EntityModel, attributes(entity, property))]
pub fn derive_entity_model(input: TokenStream) -> TokenStream {
    entity_model::derive_entity_model(input.into()).into()
}
