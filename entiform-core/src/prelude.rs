//! Prelude module for convenient imports.
//!
//! ```rust,ignore
//! use entiform_core::prelude::*;
//! ```

// === Metadata ===
pub use crate::metadata::{
    Condition, DisplayFormat, EntityType, EntityTypeBuilder, HttpMethod, MaskSide, PropertyType,
    StringType, ViewGroupRow,
};

// === Entities and hooks ===
// Brings both the trait and, with the `macros` feature, the derive
pub use crate::EntityModel;
pub use crate::entity::Entity;
pub use crate::lifecycle::EntityHooks;

// === Runtime ===
pub use crate::crud::{AbortReason, EntityRuntime, Outcome};
pub use crate::validation::{AsyncValidators, ValidationOutcome, Validators};

// === Ports ===
pub use crate::client::{ApiClient, ApiError, ApiRequest, ApiResponse, HttpApiClient};
pub use crate::ui::{ConfMenuKind, ConfirmationMenu, EventBus, LogUi, ToastKind, UiService};

// === Configuration ===
pub use crate::config::EntiformConfig;

pub use crate::{EntityError, Result};
pub use std::sync::Arc;
