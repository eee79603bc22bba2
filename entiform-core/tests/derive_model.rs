//! `#[derive(EntityModel)]` registers the same metadata the builder would

#![cfg(feature = "macros")]

use entiform_core::metadata::{HttpMethod, MaskSide, PropertyType, StringType, ViewGroupRow};
use entiform_core::prelude::*;
use entiform_core::testing::{RecordingClient, RecordingUi};
use serde::{Deserialize, Serialize};
use serde_json::json;

fn has_discount(entity: &Entity) -> bool {
    let discount = entity.get("discount").and_then(|v| v.as_f64());
    discount.unwrap_or(0.0) > 0.0
}

fn euros(value: &serde_json::Value) -> String {
    format!("{:.2} €", value.as_f64().unwrap_or(0.0))
}

#[derive(EntityModel, Serialize, Deserialize, Debug, Clone, PartialEq)]
#[entity(
    module_name = "Líneas",
    icon = "list",
    primary = "sku",
    unique = "sku",
    default = "sku",
    endpoint = "/api/lines"
)]
struct OrderLine {
    #[property(name = "SKU")]
    sku: String,
    #[property(name = "Cantidad")]
    quantity: u32,
}

#[derive(EntityModel, Serialize, Deserialize, Debug, Clone, PartialEq)]
#[entity(
    module_name = "Pedidos",
    icon = "cart",
    permission = "orders.read",
    endpoint = "/api/orders",
    methods(get, post, put, delete),
    primary = "id",
    unique = "id",
    default = "customer",
    persistent
)]
struct Order {
    #[property(name = "ID", index = 1, readonly)]
    id: Option<i64>,

    #[property(
        name = "Cliente",
        index = 2,
        required,
        persistent_key = "customer_name",
        check = "Validators::min_length(3)"
    )]
    customer: String,

    #[property(name = "Email", index = 3, string_type = "email", group = "Contacto", row = "pair")]
    email: Option<String>,

    #[property(name = "Descuento", tab_order = 2, format_with = "euros", hide_in_list)]
    discount: Option<f64>,

    #[property(
        name = "Motivo",
        required_if = "has_discount",
        required_message = "Indique el motivo"
    )]
    reason: Option<String>,

    #[property(name = "Estado", options = "abierto, cerrado")]
    status: String,

    #[property(name = "Tarjeta", mask = "****", mask_side = "end", hide_in_detail)]
    card: Option<String>,

    #[property(name = "Líneas", entities, tab_order = 1)]
    lines: Vec<OrderLine>,
}

#[test]
fn test_class_metadata() {
    let ty = Order::entity_type();
    assert_eq!(ty.id(), "Order");
    assert_eq!(ty.module_name(), Some("Pedidos"));
    assert_eq!(ty.module_icon(), Some("cart"));
    assert_eq!(ty.module_permission(), Some("orders.read"));
    assert_eq!(ty.api_endpoint(), Some("/api/orders"));
    assert!(ty.is_api_method_allowed(HttpMethod::Delete));
    assert!(!ty.is_api_method_allowed(HttpMethod::Patch));
    assert!(ty.is_persistent());
    assert_eq!(ty.default_property(), Some("customer"));
}

#[test]
fn test_entity_type_is_registered_once() {
    assert!(Arc::ptr_eq(&Order::entity_type(), &Order::entity_type()));
}

#[test]
fn test_property_metadata() {
    let ty = Order::entity_type();

    assert_eq!(ty.property_display_name("customer"), Some("Cliente"));
    assert!(matches!(ty.property_type("id"), Some(PropertyType::Number)));
    let customer = ty.property_type("customer");
    assert!(matches!(customer, Some(PropertyType::String)));
    assert!(
        matches!(ty.property_type("status"), Some(PropertyType::Enum(values)) if values.len() == 2)
    );
    assert!(ty.is_collection("lines"));
    assert_eq!(
        ty.collection_element_type("lines")
            .map(|t| t.id().to_string()),
        Some("OrderLine".into())
    );

    assert_eq!(ty.string_type("email"), StringType::Email);
    assert_eq!(ty.view_group_rows().get("email"), Some(&ViewGroupRow::Pair));
    assert_eq!(ty.masks().get("card").map(|m| m.side), Some(MaskSide::End));
    assert!(ty.is_hidden_in_list("discount"));
    assert!(ty.is_hidden_in_detail("card"));

    assert_eq!(ty.ordered_keys()[..3], ["id", "customer", "email"]);
    assert_eq!(ty.ordered_collection_keys(), vec!["lines"]);
    assert!(!ty.properties().contains_key("lines"));
}

#[test]
fn test_conditions_and_checks() {
    let order = Order {
        id: Some(1),
        customer: "Al".into(),
        email: None,
        discount: Some(5.0),
        reason: None,
        status: "abierto".into(),
        card: None,
        lines: vec![],
    }
    .to_entity()
    .unwrap();

    assert!(order.is_read_only("id"));
    assert!(!order.is_read_only("customer"));
    assert!(order.is_required("reason"));
    assert_eq!(
        order.check_property("reason").map(|f| f.message),
        Some("Indique el motivo".into())
    );
    assert!(!order.is_valid("customer"));
    assert_eq!(order.formatted_value("discount"), "5.00 €");
}

#[test]
fn test_persistent_key_mapping() {
    let ty = Order::entity_type();
    assert_eq!(ty.persistent_key_for("customer"), "customer_name");
    assert_eq!(
        ty.property_key_for("customer_name").as_deref(),
        Some("customer")
    );
}

#[tokio::test]
async fn test_typed_fetch() {
    let client = Arc::new(RecordingClient::new());
    client.respond_with(json!({
        "id": 4,
        "customer_name": "Ana",
        "status": "cerrado",
        "lines": [{ "sku": "A-1", "quantity": 2 }]
    }));
    let runtime = EntityRuntime::new(
        client.clone(),
        Arc::new(RecordingUi::new()),
        Arc::new(EventBus::new()),
    );

    let order: Order = runtime.get_model("4").await.unwrap();
    assert_eq!(order.customer, "Ana");
    assert_eq!(
        order.lines,
        vec![OrderLine {
            sku: "A-1".into(),
            quantity: 2,
        }]
    );
    assert_eq!(client.last_request().unwrap().path, "/api/orders/4");
}
