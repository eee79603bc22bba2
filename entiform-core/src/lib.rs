//! Entiform Framework - Core
//!
//! A declarative, metadata-driven entity framework.
//!
//! # Overview
//!
//! Business objects declare their display names, types, validation rules,
//! visibility, ordering and REST mapping once, as metadata attached to the
//! type and to each property. A generic runtime reads that metadata to drive
//! CRUD operations, input validation and key translation between the
//! in-memory entity and its wire representation.
//!
//! # Quick Start
//!
//! ```rust,ignore
//! use entiform_core::prelude::*;
//! use serde::{Deserialize, Serialize};
//!
//! #[derive(EntityModel, Serialize, Deserialize, Clone, Debug)]
//! #[entity(module_name = "Productos", icon = "box", endpoint = "/api/products",
//!          methods(get, post, put, delete), primary = "id", unique = "id", default = "name")]
//! struct Product {
//!     #[property(name = "ID", index = 1)]
//!     id: Option<i64>,
//!     #[property(name = "Nombre", index = 2, required, persistent_key = "product_name")]
//!     name: String,
//! }
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let config = EntiformConfig::load()?;
//!     let bus = Arc::new(EventBus::new());
//!     let runtime = EntityRuntime::from_config(&config, Arc::new(LogUi), bus)?;
//!
//!     let mut product = Product { id: None, name: "Silla".into() }.to_entity()?;
//!     runtime.save(&mut product).await?;
//!     Ok(())
//! }
//! ```
//!
//! # Architecture
//!
//! - [`metadata`] - per-type facet registry with inheritance
//! - [`introspect`] - property enumeration, ordering and bulk facet readers
//! - [`validation`] - required / sync / async rules and the validate-all pass
//! - [`persistence`] - internal ↔ external key mapping and value transformers
//! - [`entity`] - runtime instances with dirty-state tracking
//! - [`lifecycle`] - overridable CRUD hooks
//! - [`crud`] - the orchestrator (`EntityRuntime`)
//! - [`client`], [`ui`] - injected ports for HTTP and user interaction

extern crate self as entiform_core;

pub mod client;
pub mod config;
pub mod crud;
pub mod entity;
pub mod introspect;
pub mod lifecycle;
pub mod logging;
pub mod metadata;
pub mod persistence;
pub mod testing;
pub mod ui;
pub mod validation;

// Re-export the derive macro so users only need one crate
#[cfg(feature = "macros")]
pub use entiform_macros::EntityModel;

pub mod prelude;

pub use client::{ApiClient, ApiError};
pub use crud::{AbortReason, EntityRuntime, Outcome};
pub use entity::{Entity, EntityModel};
pub use metadata::EntityType;

// Main result type for the framework
pub type Result<T> = std::result::Result<T, EntityError>;

/// Main error type for Entiform
#[derive(thiserror::Error, Debug)]
pub enum EntityError {
    /// Type-level operation on an entity type without `api_endpoint`
    #[error("api endpoint not defined for {0}")]
    MissingEndpoint(String),

    #[error("configuration error: {0}")]
    Configuration(String),

    /// Payload with an unexpected shape
    #[error("invalid data: {0}")]
    InvalidData(String),

    #[error(transparent)]
    Api(#[from] ApiError),

    #[error(transparent)]
    Serialization(#[from] serde_json::Error),
}
