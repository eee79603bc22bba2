//! `#[derive(EntityModel)]` implementation
//!
//! Struct-level `#[entity(...)]` and field-level `#[property(...)]` attributes
//! are turned into a chain of `EntityTypeBuilder` calls that runs once per
//! type, the first time `entity_type()` is called.

use proc_macro2::TokenStream;
use quote::{format_ident, quote};
use syn::meta::ParseNestedMeta;
use syn::{
    parse2, Attribute, Data, DeriveInput, Error, Expr, Fields, GenericArgument, LitInt, LitStr,
    Path, PathArguments, Type,
};

/// Parsed `#[entity(...)]`
#[derive(Default)]
struct EntityAttributes {
    id: Option<String>,
    extends: Option<Path>,
    module_name: Option<String>,
    icon: Option<String>,
    permission: Option<String>,
    endpoint: Option<String>,
    methods: Vec<syn::Ident>,
    primary: Option<String>,
    unique: Option<String>,
    default: Option<String>,
    persistent: bool,
    list_component: Option<String>,
    detail_component: Option<String>,
    default_component: Option<String>,
    hooks: Option<Expr>,
}

/// Parsed `#[property(...)]` on one field
#[derive(Default)]
struct PropertyAttributes {
    name: Option<String>,
    index: Option<i64>,
    tab_order: Option<i64>,
    required: bool,
    required_if: Option<Path>,
    required_message: Option<String>,
    validate: Option<Path>,
    validate_message: Option<String>,
    checks: Vec<Expr>,
    async_validate: Option<Path>,
    async_message: Option<String>,
    disabled: bool,
    disabled_if: Option<Path>,
    readonly: bool,
    readonly_if: Option<Path>,
    help: Option<String>,
    css: Option<String>,
    group: Option<String>,
    row: Option<syn::Ident>,
    format: Option<String>,
    format_with: Option<Path>,
    string_type: Option<syn::Ident>,
    mask: Option<String>,
    mask_side: Option<syn::Ident>,
    persistent_key: Option<String>,
    hide_in_list: bool,
    hide_in_detail: bool,
    entity: bool,
    entities: bool,
    options: Vec<String>,
}

fn lit_string(meta: &ParseNestedMeta) -> syn::Result<String> {
    Ok(meta.value()?.parse::<LitStr>()?.value())
}

fn lit_path(meta: &ParseNestedMeta) -> syn::Result<Path> {
    meta.value()?.parse::<LitStr>()?.parse::<Path>()
}

/// A bare expression, or a string literal holding one
fn lit_expr(meta: &ParseNestedMeta) -> syn::Result<Expr> {
    match meta.value()?.parse::<Expr>()? {
        Expr::Lit(syn::ExprLit {
            lit: syn::Lit::Str(text),
            ..
        }) => text.parse::<Expr>(),
        expr => Ok(expr),
    }
}

fn lit_i64(meta: &ParseNestedMeta) -> syn::Result<i64> {
    meta.value()?.parse::<LitInt>()?.base10_parse::<i64>()
}

fn lit_ident(meta: &ParseNestedMeta) -> syn::Result<syn::Ident> {
    meta.value()?.parse::<LitStr>()?.parse::<syn::Ident>()
}

fn parse_entity_attributes(attrs: &[Attribute]) -> syn::Result<EntityAttributes> {
    let mut entity = EntityAttributes::default();
    for attr in attrs.iter().filter(|a| a.path().is_ident("entity")) {
        attr.parse_nested_meta(|meta| {
            let key = meta.path
                .get_ident()
                .map(|i| i.to_string())
                .unwrap_or_default();
            match key.as_str() {
                "id" => entity.id = Some(lit_string(&meta)?),
                "extends" => entity.extends = Some(lit_path(&meta)?),
                "module_name" => entity.module_name = Some(lit_string(&meta)?),
                "icon" => entity.icon = Some(lit_string(&meta)?),
                "permission" => entity.permission = Some(lit_string(&meta)?),
                "endpoint" => entity.endpoint = Some(lit_string(&meta)?),
                "methods" => meta.parse_nested_meta(|method| {
                    let ident = method.path.require_ident()?;
                    entity.methods.push(ident.clone());
                    Ok(())
                })?,
                "primary" => entity.primary = Some(lit_string(&meta)?),
                "unique" => entity.unique = Some(lit_string(&meta)?),
                "default" => entity.default = Some(lit_string(&meta)?),
                "persistent" => entity.persistent = true,
                "list_component" => entity.list_component = Some(lit_string(&meta)?),
                "detail_component" => entity.detail_component = Some(lit_string(&meta)?),
                "default_component" => entity.default_component = Some(lit_string(&meta)?),
                "hooks" => entity.hooks = Some(lit_expr(&meta)?),
                _ => return Err(meta.error(format!("unknown entity attribute `{}`", key))),
            }
            Ok(())
        })?;
    }
    Ok(entity)
}

fn parse_property_attributes(attrs: &[Attribute]) -> syn::Result<PropertyAttributes> {
    let mut prop = PropertyAttributes::default();
    for attr in attrs.iter().filter(|a| a.path().is_ident("property")) {
        attr.parse_nested_meta(|meta| {
            let key = meta.path
                .get_ident()
                .map(|i| i.to_string())
                .unwrap_or_default();
            match key.as_str() {
                "name" => prop.name = Some(lit_string(&meta)?),
                "index" => prop.index = Some(lit_i64(&meta)?),
                "tab_order" => prop.tab_order = Some(lit_i64(&meta)?),
                "required" => prop.required = true,
                "required_if" => prop.required_if = Some(lit_path(&meta)?),
                "required_message" => prop.required_message = Some(lit_string(&meta)?),
                "validate" => prop.validate = Some(lit_path(&meta)?),
                "validate_message" => prop.validate_message = Some(lit_string(&meta)?),
                "check" => prop.checks.push(lit_expr(&meta)?),
                "async_validate" => prop.async_validate = Some(lit_path(&meta)?),
                "async_message" => prop.async_message = Some(lit_string(&meta)?),
                "disabled" => prop.disabled = true,
                "disabled_if" => prop.disabled_if = Some(lit_path(&meta)?),
                "readonly" => prop.readonly = true,
                "readonly_if" => prop.readonly_if = Some(lit_path(&meta)?),
                "help" => prop.help = Some(lit_string(&meta)?),
                "css" => prop.css = Some(lit_string(&meta)?),
                "group" => prop.group = Some(lit_string(&meta)?),
                "row" => prop.row = Some(lit_ident(&meta)?),
                "format" => prop.format = Some(lit_string(&meta)?),
                "format_with" => prop.format_with = Some(lit_path(&meta)?),
                "string_type" => prop.string_type = Some(lit_ident(&meta)?),
                "mask" => prop.mask = Some(lit_string(&meta)?),
                "mask_side" => prop.mask_side = Some(lit_ident(&meta)?),
                "persistent_key" => prop.persistent_key = Some(lit_string(&meta)?),
                "hide_in_list" => prop.hide_in_list = true,
                "hide_in_detail" => prop.hide_in_detail = true,
                "entity" => prop.entity = true,
                "entities" => prop.entities = true,
                "options" => {
                    prop.options = lit_string(&meta)?
                        .split(',')
                        .map(|s| s.trim().to_string())
                        .filter(|s| !s.is_empty())
                        .collect()
                }
                _ => return Err(meta.error(format!("unknown property attribute `{}`", key))),
            }
            Ok(())
        })?;
    }
    Ok(prop)
}

/// Strip one `Option<...>` layer
fn unwrap_option(ty: &Type) -> &Type {
    single_argument(ty, "Option").unwrap_or(ty)
}

/// `T` from `Wrapper<T>` when the last path segment is `wrapper`
fn single_argument<'a>(ty: &'a Type, wrapper: &str) -> Option<&'a Type> {
    let Type::Path(path) = ty else { return None };
    let segment = path.path.segments.last()?;
    if segment.ident != wrapper {
        return None;
    }
    let PathArguments::AngleBracketed(args) = &segment.arguments else { return None };
    match args.args.first()? {
        GenericArgument::Type(inner) => Some(inner),
        _ => None,
    }
}

fn last_ident(ty: &Type) -> Option<String> {
    match ty {
        Type::Path(path) => path.path.segments.last().map(|s| s.ident.to_string()),
        Type::Reference(reference) => last_ident(&reference.elem),
        _ => None,
    }
}

/// Infer the `PropertyType` expression from the Rust field type
fn property_type_tokens(ty: &Type, prop: &PropertyAttributes) -> TokenStream {
    let meta = quote!(::entiform_core::metadata);
    let inner = unwrap_option(ty);

    if !prop.options.is_empty() {
        let options = &prop.options;
        return quote!(#meta::PropertyType::Enum(vec![#(#options.to_string()),*]));
    }
    if prop.entity {
        return quote! {
            #meta::PropertyType::Entity(#meta::EntityTypeRef::Lazy(
                <#inner as ::entiform_core::entity::EntityModel>::entity_type
            ))
        };
    }
    if single_argument(inner, "Vec").is_some() {
        return quote!(#meta::PropertyType::Collection);
    }

    match last_ident(inner).as_deref() {
        Some("String" | "str" | "char") => quote!(#meta::PropertyType::String),
        Some(
            "i8" | "i16" | "i32" | "i64" | "i128" | "isize" | "u8" | "u16" | "u32" | "u64" | "u128"
            | "usize" | "f32" | "f64",
        ) => quote!(#meta::PropertyType::Number),
        Some("bool") => quote!(#meta::PropertyType::Boolean),
        Some("NaiveDate" | "NaiveDateTime" | "DateTime") => quote!(#meta::PropertyType::Date),
        _ => quote!(#meta::PropertyType::Any),
    }
}

fn string_type_tokens(ident: &syn::Ident) -> syn::Result<TokenStream> {
    let variant = match ident.to_string().as_str() {
        "text" => "Text",
        "textarea" => "Textarea",
        "email" => "Email",
        "password" => "Password",
        "telephone" | "tel" => "Telephone",
        "url" => "Url",
        other => {
            return Err(Error::new(
                ident.span(),
                format!("unknown string_type `{}`", other),
            ))
        }
    };
    let variant = format_ident!("{}", variant);
    Ok(quote!(::entiform_core::metadata::StringType::#variant))
}

fn row_tokens(ident: &syn::Ident) -> syn::Result<TokenStream> {
    let variant = match ident.to_string().as_str() {
        "single" => "Single",
        "pair" => "Pair",
        "triple" => "Triple",
        other => return Err(Error::new(ident.span(), format!("unknown row `{}`", other))),
    };
    let variant = format_ident!("{}", variant);
    Ok(quote!(::entiform_core::metadata::ViewGroupRow::#variant))
}

fn method_tokens(ident: &syn::Ident) -> syn::Result<TokenStream> {
    let variant = match ident.to_string().as_str() {
        "get" => "Get",
        "post" => "Post",
        "put" => "Put",
        "patch" => "Patch",
        "delete" => "Delete",
        other => {
            return Err(Error::new(
                ident.span(),
                format!("unknown http method `{}`", other),
            ))
        }
    };
    let variant = format_ident!("{}", variant);
    Ok(quote!(::entiform_core::metadata::HttpMethod::#variant))
}

/// Builder calls for one property, applied inside `.property(key, |p| ...)`
fn property_calls(ty: &Type, prop: &PropertyAttributes) -> syn::Result<TokenStream> {
    let meta = quote!(::entiform_core::metadata);
    let mut calls = Vec::new();

    if let Some(name) = &prop.name {
        calls.push(quote!(.display_name(#name)));
    }

    if prop.entities {
        let Some(element) = single_argument(unwrap_option(ty), "Vec") else {
            return Err(Error::new_spanned(ty, "`entities` needs a Vec<T> field"));
        };
        calls.push(quote! {
            .collection_of(#meta::EntityTypeRef::Lazy(
                <#element as ::entiform_core::entity::EntityModel>::entity_type
            ))
        });
    } else {
        let property_type = property_type_tokens(ty, prop);
        calls.push(quote!(.property_type(#property_type)));
    }

    if let Some(index) = prop.index {
        calls.push(quote!(.index(#index)));
    }
    if let Some(order) = prop.tab_order {
        calls.push(quote!(.tab_order(#order)));
    }

    let required = match (&prop.required_if, prop.required) {
        (Some(path), _) => Some(quote!(#meta::Condition::when(#path))),
        (None, true) => Some(quote!(true)),
        (None, false) => None,
    };
    match (required, &prop.required_message) {
        (Some(condition), Some(message)) => {
            calls.push(quote!(.required_with_message(#condition, #message)))
        }
        (Some(condition), None) => calls.push(quote!(.required(#condition))),
        (None, Some(_)) => {
            return Err(Error::new(
                proc_macro2::Span::call_site(),
                "`required_message` needs `required` or `required_if`",
            ))
        }
        (None, None) => {}
    }

    if let Some(path) = &prop.validate {
        let message = match &prop.validate_message {
            Some(message) => quote!(Some(#message.to_string())),
            None => quote!(None),
        };
        calls.push(quote! {
            .validation_rule(#meta::Rule::new(#meta::Condition::when(#path), #message))
        });
    }
    for check in &prop.checks {
        calls.push(quote!(.check(#check)));
    }
    if let Some(path) = &prop.async_validate {
        let message = match &prop.async_message {
            Some(message) => quote!(Some(#message.to_string())),
            None => quote!(None),
        };
        calls.push(quote!(.async_rule(#meta::AsyncRule::new(#path, #message))));
    }

    match (&prop.disabled_if, prop.disabled) {
        (Some(path), _) => calls.push(quote!(.disabled(#meta::Condition::when(#path)))),
        (None, true) => calls.push(quote!(.disabled(true))),
        (None, false) => {}
    }
    match (&prop.readonly_if, prop.readonly) {
        (Some(path), _) => calls.push(quote!(.read_only(#meta::Condition::when(#path)))),
        (None, true) => calls.push(quote!(.read_only(true))),
        (None, false) => {}
    }

    if let Some(help) = &prop.help {
        calls.push(quote!(.help_text(#help)));
    }
    if let Some(css) = &prop.css {
        calls.push(quote!(.css_class(#css)));
    }
    if let Some(group) = &prop.group {
        calls.push(quote!(.view_group(#group)));
    }
    if let Some(row) = &prop.row {
        let row = row_tokens(row)?;
        calls.push(quote!(.view_group_row(#row)));
    }
    if let Some(path) = &prop.format_with {
        calls.push(quote!(.display_format(#meta::DisplayFormat::function(#path))));
    } else if let Some(template) = &prop.format {
        calls.push(quote!(.display_format(#template)));
    }
    if let Some(string_type) = &prop.string_type {
        let string_type = string_type_tokens(string_type)?;
        calls.push(quote!(.string_type(#string_type)));
    }
    if let Some(mask) = &prop.mask {
        let side = match prop.mask_side.as_ref().map(|s| s.to_string()).as_deref() {
            None | Some("start") => quote!(#meta::MaskSide::Start),
            Some("end") => quote!(#meta::MaskSide::End),
            Some(other) => {
                return Err(Error::new_spanned(
                    prop.mask_side.as_ref(),
                    format!("unknown mask_side `{}`", other),
                ))
            }
        };
        calls.push(quote!(.mask(#mask, #side)));
    }
    if let Some(key) = &prop.persistent_key {
        calls.push(quote!(.persistent_key(#key)));
    }
    if prop.hide_in_list {
        calls.push(quote!(.hide_in_list()));
    }
    if prop.hide_in_detail {
        calls.push(quote!(.hide_in_detail()));
    }

    Ok(quote!(p #(#calls)*))
}

fn class_calls(entity: &EntityAttributes) -> syn::Result<Vec<TokenStream>> {
    let mut calls = Vec::new();
    if let Some(parent) = &entity.extends {
        calls.push(quote!(
            .extends(<#parent as ::entiform_core::entity::EntityModel>::entity_type())
        ));
    }
    let text_calls = [
        (&entity.module_name, quote!(module_name)),
        (&entity.icon, quote!(module_icon)),
        (&entity.permission, quote!(module_permission)),
        (&entity.endpoint, quote!(api_endpoint)),
        (&entity.primary, quote!(primary_property)),
        (&entity.unique, quote!(unique_property)),
        (&entity.default, quote!(default_property)),
        (&entity.list_component, quote!(list_component)),
        (&entity.detail_component, quote!(detail_component)),
        (&entity.default_component, quote!(default_component)),
    ];
    for (value, method) in text_calls {
        if let Some(value) = value {
            calls.push(quote!(.#method(#value)));
        }
    }
    if !entity.methods.is_empty() {
        let methods = entity
            .methods
            .iter()
            .map(method_tokens)
            .collect::<syn::Result<Vec<_>>>()?;
        calls.push(quote!(.api_methods([#(#methods),*])));
    }
    if entity.persistent {
        calls.push(quote!(.persistent()));
    }
    if let Some(hooks) = &entity.hooks {
        calls.push(quote!(.hooks(#hooks)));
    }
    Ok(calls)
}

pub fn derive_entity_model(input: TokenStream) -> TokenStream {
    match expand(input) {
        Ok(tokens) => tokens,
        Err(err) => err.to_compile_error(),
    }
}

fn expand(input: TokenStream) -> syn::Result<TokenStream> {
    let input = parse2::<DeriveInput>(input)?;
    let name = &input.ident;

    if !input.generics.params.is_empty() {
        return Err(Error::new_spanned(
            &input.generics,
            "EntityModel cannot be derived for generic types",
        ));
    }

    let fields = match &input.data {
        Data::Struct(data) => match &data.fields {
            Fields::Named(named) => &named.named,
            _ => {
                return Err(Error::new_spanned(
                    name,
                    "EntityModel needs a struct with named fields",
                ))
            }
        },
        _ => {
            return Err(Error::new_spanned(
                name,
                "EntityModel can only be derived for structs",
            ))
        }
    };

    let entity = parse_entity_attributes(&input.attrs)?;
    let type_id = entity.id.clone().unwrap_or_else(|| name.to_string());
    let class = class_calls(&entity)?;

    let mut properties = Vec::new();
    for field in fields {
        let Some(ident) = &field.ident else { continue };
        let key = ident.to_string();
        let key = key.strip_prefix("r#").unwrap_or(&key).to_string();
        let prop = parse_property_attributes(&field.attrs)?;
        let calls = property_calls(&field.ty, &prop)?;
        properties.push(quote!(.property(#key, |p| #calls)));
    }

    Ok(quote! {
        impl ::entiform_core::entity::EntityModel for #name {
            fn entity_type() -> ::std::sync::Arc<::entiform_core::metadata::EntityType> {
                static ENTITY_TYPE: ::std::sync::OnceLock<
                    ::std::sync::Arc<::entiform_core::metadata::EntityType>,
                > = ::std::sync::OnceLock::new();
                ::std::sync::Arc::clone(ENTITY_TYPE.get_or_init(|| {
                    ::entiform_core::metadata::EntityType::builder(#type_id)
                        #(#class)*
                        #(#properties)*
                        .build()
                }))
            }
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn expand_str(tokens: TokenStream) -> String {
        derive_entity_model(tokens).to_string()
    }

    #[test]
    fn test_expands_class_and_property_calls() {
        let out = expand_str(quote! {
            #[entity(
                module_name = "Productos",
                endpoint = "/api/products",
                methods(get, post),
                primary = "id"
            )]
            struct Product {
                #[property(name = "ID", index = 1)]
                id: Option<i64>,
                #[property(name = "Nombre", required, persistent_key = "product_name")]
                name: String,
            }
        });
        assert!(out.contains("module_name (\"Productos\")"));
        assert!(out.contains("HttpMethod :: Post"));
        assert!(out.contains("PropertyType :: Number"));
        assert!(out.contains("persistent_key (\"product_name\")"));
        assert!(out.contains("required (true)"));
    }

    #[test]
    fn test_vec_with_entities_uses_collection_of() {
        let out = expand_str(quote! {
            struct Order {
                #[property(entities)]
                lines: Vec<OrderLine>,
            }
        });
        assert!(out.contains("collection_of"));
        assert!(out.contains(
            "< OrderLine as :: entiform_core :: entity :: EntityModel > :: entity_type"
        ));
    }

    #[test]
    fn test_unknown_attribute_is_a_compile_error() {
        let out = expand_str(quote! {
            struct Broken {
                #[property(colour = "red")]
                name: String,
            }
        });
        assert!(out.contains("compile_error"));
        assert!(out.contains("unknown property attribute"));
    }

    #[test]
    fn test_check_accepts_bare_and_quoted_expressions() {
        let out = expand_str(quote! {
            struct Product {
                #[property(check = Validators::min_length(3), check = "Validators::max_length(9)")]
                name: String,
            }
        });
        assert!(!out.contains("compile_error"));
        assert!(out.contains("check (Validators :: min_length (3))"));
        assert!(out.contains("check (Validators :: max_length (9))"));
    }

    #[test]
    fn test_enums_are_rejected() {
        let out = expand_str(quote! {
            enum Status { Open, Closed }
        });
        assert!(out.contains("compile_error"));
    }

    #[test]
    fn test_string_type_mapping() {
        let ident = syn::Ident::new("tel", proc_macro2::Span::call_site());
        let tokens = string_type_tokens(&ident).unwrap().to_string();
        assert!(tokens.contains("Telephone"));
        let bad = syn::Ident::new("colour", proc_macro2::Span::call_site());
        assert!(string_type_tokens(&bad).is_err());
    }
}
