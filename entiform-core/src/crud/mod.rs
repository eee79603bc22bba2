//! CRUD lifecycle orchestration
//!
//! [`EntityRuntime`] drives every persistence operation of an entity through
//! the same sequence:
//!
//! 1. configuration checks (module, persistence, allowed verb); a failure
//!    opens an error dialog and aborts without touching the network
//! 2. operation-specific guards (`is_new`, validation, re-entrancy)
//! 3. `before_*` hook, `on_*` hook, request
//! 4. on success: merge the response, refresh the snapshot, `after_*` hook
//! 5. on failure: `*_failed` hook, error dialog, error returned
//!
//! Aborts are not errors: they come back as [`Outcome::Aborted`] with the
//! entity untouched.

use serde_json::{Map, Value};
use std::ops::{Deref, DerefMut};
use std::sync::Arc;
use std::time::Duration;

use crate::client::{ApiClient, ApiRequest, HttpApiClient};
use crate::config::{EntiformConfig, RuntimeConfig};
use crate::entity::{Entity, EntityModel};
use crate::metadata::types::plain_text;
use crate::metadata::{EntityType, HttpMethod};
use crate::ui::{ConfirmationMenu, SignalBus, ToastKind, UiService, ValidityFlag};
use crate::validation::{ValidationOutcome, ValidationPass};
use crate::{EntityError, Result};

/// Why an operation stopped before issuing its request
#[derive(Debug, Clone, PartialEq)]
pub enum AbortReason {
    ModuleConfiguration(Vec<String>),
    PersistenceConfiguration(Vec<String>),
    MethodNotAllowed(HttpMethod),
    ValidationFailed(ValidationOutcome),
    /// update/delete on an entity that was never saved
    NotPersisted,
    /// save/update while a previous save is still in flight
    AlreadySaving,
}

#[derive(Debug, Clone, PartialEq)]
#[must_use]
pub enum Outcome {
    Completed,
    Aborted(AbortReason),
}

impl Outcome {
    pub fn is_completed(&self) -> bool {
        matches!(self, Outcome::Completed)
    }

    pub fn abort_reason(&self) -> Option<&AbortReason> {
        match self {
            Outcome::Aborted(reason) => Some(reason),
            Outcome::Completed => None,
        }
    }
}

/// Runtime shared by every entity of an application
pub struct EntityRuntime {
    client: Arc<dyn ApiClient>,
    ui: Arc<dyn UiService>,
    signals: Arc<dyn SignalBus>,
    flag: ValidityFlag,
    config: RuntimeConfig,
}

impl EntityRuntime {
    pub fn new(
        client: Arc<dyn ApiClient>,
        ui: Arc<dyn UiService>,
        signals: Arc<dyn SignalBus>,
    ) -> Self {
        Self {
            client,
            ui,
            signals,
            flag: ValidityFlag::new(),
            config: RuntimeConfig::default(),
        }
    }

    /// Runtime backed by [`HttpApiClient`] built from `config.api`
    pub fn from_config(
        config: &EntiformConfig,
        ui: Arc<dyn UiService>,
        signals: Arc<dyn SignalBus>,
    ) -> Result<Self> {
        let client = HttpApiClient::new(&config.api)?;
        let runtime = Self::new(Arc::new(client), ui, signals);
        Ok(runtime.with_config(config.runtime.clone()))
    }

    pub fn with_config(mut self, config: RuntimeConfig) -> Self {
        self.config = config;
        self
    }

    /// Share an existing validity flag (e.g. the one the input layer watches)
    pub fn with_validity_flag(mut self, flag: ValidityFlag) -> Self {
        self.flag = flag;
        self
    }

    pub fn client(&self) -> &Arc<dyn ApiClient> {
        &self.client
    }

    pub fn validity_flag(&self) -> &ValidityFlag {
        &self.flag
    }

    pub fn config(&self) -> &RuntimeConfig {
        &self.config
    }

    pub async fn validate_all(&self, entity: &Entity) -> ValidationOutcome {
        let pass = ValidationPass {
            ui: self.ui.as_ref(),
            signals: self.signals.as_ref(),
            flag: &self.flag,
            settle: Duration::from_millis(self.config.validation_settle_ms),
        };
        pass.run(entity).await
    }

    // ---- configuration checks -------------------------------------------

    pub fn module_configuration_errors(ty: &EntityType) -> Vec<String> {
        let mut errors = Vec::new();
        if ty.module_name().is_none() {
            errors.push("El módulo no tiene definido module_name".to_string());
        }
        if ty.module_icon().is_none() {
            errors.push("El módulo no tiene definido module_icon".to_string());
        }
        if ty.default_property().is_none() {
            errors.push("El módulo no tiene definido default_property".to_string());
        }
        if ty.primary_property().is_none() {
            errors.push("El módulo no tiene definido primary_property".to_string());
        }
        errors
    }

    pub fn persistence_configuration_errors(ty: &EntityType) -> Vec<String> {
        let mut errors = Vec::new();
        if ty.unique_property().is_none() {
            errors.push("La entidad no tiene definido unique_property".to_string());
        }
        if ty.api_endpoint().is_none() {
            errors.push("La entidad no tiene definido api_endpoint".to_string());
        }
        if ty.api_methods().is_none() {
            errors.push("La entidad no tiene definido api_methods".to_string());
        }
        errors
    }

    /// Show a dialog and return false if module metadata is incomplete
    pub fn validate_module_configuration(&self, ty: &EntityType) -> bool {
        self.check_module(ty).is_none()
    }

    pub fn validate_persistence_configuration(&self, ty: &EntityType) -> bool {
        self.check_persistence(ty).is_none()
    }

    pub fn validate_api_method(&self, ty: &EntityType, method: HttpMethod) -> bool {
        self.check_method(ty, method).is_none()
    }

    fn check_module(&self, ty: &EntityType) -> Option<AbortReason> {
        let errors = Self::module_configuration_errors(ty);
        if errors.is_empty() {
            return None;
        }
        self.ui.open_confirmation_menu(ConfirmationMenu::error(
            "Error de configuración del módulo",
            errors.join("\n"),
        ));
        Some(AbortReason::ModuleConfiguration(errors))
    }

    fn check_persistence(&self, ty: &EntityType) -> Option<AbortReason> {
        if let Some(reason) = self.check_module(ty) {
            return Some(reason);
        }
        let errors = Self::persistence_configuration_errors(ty);
        if errors.is_empty() {
            return None;
        }
        self.ui.open_confirmation_menu(ConfirmationMenu::error(
            "Error de configuración de persistencia",
            errors.join("\n"),
        ));
        Some(AbortReason::PersistenceConfiguration(errors))
    }

    fn check_method(&self, ty: &EntityType, method: HttpMethod) -> Option<AbortReason> {
        if ty.is_api_method_allowed(method) {
            return None;
        }
        self.ui.open_confirmation_menu(ConfirmationMenu::error(
            "Método no permitido",
            format!("El método {} no está permitido en esta entidad", method),
        ));
        Some(AbortReason::MethodNotAllowed(method))
    }

    fn check_operation(&self, ty: &EntityType, method: HttpMethod) -> Option<AbortReason> {
        self.check_persistence(ty)
            .or_else(|| self.check_method(ty, method))
    }

    fn abort(&self, entity: &Entity, operation: &str, reason: AbortReason) -> Outcome {
        log::warn!(
            "{} of {} aborted: {:?}",
            operation,
            entity.entity_type().id(),
            reason
        );
        Outcome::Aborted(reason)
    }

    // ---- instance operations --------------------------------------------

    /// Create (POST) or replace (PUT) the entity depending on [`Entity::is_new`]
    pub async fn save(&self, entity: &mut Entity) -> Result<Outcome> {
        if entity.is_saving() {
            return Ok(self.abort(entity, "save", AbortReason::AlreadySaving));
        }

        let ty = Arc::clone(entity.entity_type());
        let method = if entity.is_new() { HttpMethod::Post } else { HttpMethod::Put };
        if let Some(reason) = self.check_operation(&ty, method) {
            return Ok(self.abort(entity, "save", reason));
        }

        let validation = self.validate_all(entity).await;
        if !validation.is_valid() {
            let reason = AbortReason::ValidationFailed(validation);
            return Ok(self.abort(entity, "save", reason));
        }

        let create = entity.is_new();
        let path = if create { self.base(&ty)? } else { self.item_path(entity)? };
        let hooks = Arc::clone(ty.hooks());
        let mut entity = InFlight::start(entity, self.ui.as_ref());
        hooks.before_save(&mut entity);
        entity.show_loading();
        if self.config.save_settle_ms > 0 {
            tokio::time::sleep(Duration::from_millis(self.config.save_settle_ms)).await;
        }
        hooks.on_saving(&mut entity);

        let payload = self.payload(&entity);
        let request = if create {
            ApiRequest::post(path, payload)
        } else {
            ApiRequest::put(path, payload)
        };

        match self.client.send(request).await {
            Ok(response) => {
                self.merge_response(&mut entity, response.body);
                entity.clear_saving();
                hooks.after_save(&mut entity);
                entity.hide_loading();
                let message = &self.config.save_success_message;
                self.ui.show_toast(message, ToastKind::Success);
                log::debug!("saved {}", ty.id());
                Ok(Outcome::Completed)
            }
            Err(e) => {
                entity.clear_saving();
                entity.hide_loading();
                hooks.save_failed(&mut entity);
                Err(self.report("Error al guardar", e.into()))
            }
        }
    }

    /// Always PUT; the entity must have been saved before
    pub async fn update(&self, entity: &mut Entity) -> Result<Outcome> {
        if entity.is_saving() {
            return Ok(self.abort(entity, "update", AbortReason::AlreadySaving));
        }

        let ty = Arc::clone(entity.entity_type());
        if let Some(reason) = self.check_operation(&ty, HttpMethod::Put) {
            return Ok(self.abort(entity, "update", reason));
        }

        if entity.is_new() {
            self.ui.open_confirmation_menu(ConfirmationMenu::error(
                "Error al actualizar",
                "No se puede actualizar un elemento que no ha sido guardado",
            ));
            return Ok(self.abort(entity, "update", AbortReason::NotPersisted));
        }

        let path = self.item_path(entity)?;
        let hooks = Arc::clone(ty.hooks());
        let mut entity = InFlight::start(entity, self.ui.as_ref());
        hooks.before_update(&mut entity);
        hooks.on_updating(&mut entity);

        let request = ApiRequest::put(path, self.payload(&entity));
        match self.client.send(request).await {
            Ok(response) => {
                self.merge_response(&mut entity, response.body);
                entity.clear_saving();
                hooks.after_update(&mut entity);
                Ok(Outcome::Completed)
            }
            Err(e) => {
                entity.clear_saving();
                hooks.update_failed(&mut entity);
                Err(self.report("Error al actualizar", e.into()))
            }
        }
    }

    pub async fn delete(&self, entity: &mut Entity) -> Result<Outcome> {
        let ty = Arc::clone(entity.entity_type());
        if let Some(reason) = self.check_operation(&ty, HttpMethod::Delete) {
            return Ok(self.abort(entity, "delete", reason));
        }

        if entity.is_new() {
            self.ui.open_confirmation_menu(ConfirmationMenu::error(
                "Error al eliminar",
                "No se puede eliminar un elemento que no ha sido guardado",
            ));
            return Ok(self.abort(entity, "delete", AbortReason::NotPersisted));
        }

        let path = self.item_path(entity)?;
        let hooks = Arc::clone(ty.hooks());
        hooks.before_delete(entity);
        hooks.on_deleting(entity);

        match self.client.send(ApiRequest::delete(path)).await {
            Ok(_) => {
                hooks.after_delete(entity);
                log::debug!("deleted {}", ty.id());
                Ok(Outcome::Completed)
            }
            Err(e) => {
                hooks.delete_failed(entity);
                Err(self.report("Error al eliminar", e.into()))
            }
        }
    }

    /// Re-fetch the list this entity belongs to
    pub async fn refresh(&self, entity: &mut Entity, filter: &str) -> Result<Vec<Entity>> {
        let ty = Arc::clone(entity.entity_type());
        let hooks = Arc::clone(ty.hooks());
        match self.get_element_list(&ty, filter).await {
            Ok(list) => {
                hooks.after_refresh(entity);
                Ok(list)
            }
            Err(e) => {
                hooks.refresh_failed(entity);
                Err(e)
            }
        }
    }

    // ---- type-level fetches ---------------------------------------------

    pub async fn get_element(&self, ty: &Arc<EntityType>, id: &str) -> Result<Entity> {
        let endpoint = ty
            .api_endpoint()
            .ok_or_else(|| EntityError::MissingEndpoint(ty.id().to_string()))?;
        let path = format!("{}/{}", endpoint, urlencoding::encode(id));

        let fetched = match self.client.send(ApiRequest::get(path)).await {
            Ok(response) => match response.body {
                Value::Object(map) => Ok(Entity::new(ty, ty.to_internal(&map))),
                other => Err(EntityError::InvalidData(format!(
                    "expected an object from {}, got {}",
                    endpoint, other
                ))),
            },
            Err(e) => Err(e.into()),
        };

        match fetched {
            Ok(mut instance) => {
                ty.hooks().after_get_element(&mut instance);
                Ok(instance)
            }
            Err(e) => {
                let mut placeholder = Entity::empty(ty);
                ty.hooks().get_element_failed(&mut placeholder);
                Err(self.report("Error al obtener elemento", e))
            }
        }
    }

    /// `GET {endpoint}?filter=..`; `after_get_element_list` runs on the first element only
    pub async fn get_element_list(
        &self,
        ty: &Arc<EntityType>,
        filter: &str,
    ) -> Result<Vec<Entity>> {
        let endpoint = ty
            .api_endpoint()
            .ok_or_else(|| EntityError::MissingEndpoint(ty.id().to_string()))?;
        let request = ApiRequest::get(endpoint).with_query("filter", filter);

        let fetched = match self.client.send(request).await {
            Ok(response) => match response.body {
                Value::Array(items) => items
                    .into_iter()
                    .map(|item| match item {
                        Value::Object(map) => Ok(Entity::new(ty, ty.to_internal(&map))),
                        other => Err(EntityError::InvalidData(format!(
                            "expected list items to be objects, got {}",
                            other
                        ))),
                    })
                    .collect::<Result<Vec<_>>>(),
                other => Err(EntityError::InvalidData(format!(
                    "expected an array from {}, got {}",
                    endpoint, other
                ))),
            },
            Err(e) => Err(e.into()),
        };

        match fetched {
            Ok(mut list) => {
                if let Some(first) = list.first_mut() {
                    ty.hooks().after_get_element_list(first);
                }
                Ok(list)
            }
            Err(e) => {
                let mut placeholder = Entity::empty(ty);
                ty.hooks().get_element_list_failed(&mut placeholder);
                Err(self.report("Error al obtener lista", e))
            }
        }
    }

    /// [`EntityRuntime::get_element`] deserialized into a typed model
    pub async fn get_model<T: EntityModel>(&self, id: &str) -> Result<T> {
        self.get_element(&T::entity_type(), id).await?.to_model()
    }

    pub async fn get_model_list<T: EntityModel>(&self, filter: &str) -> Result<Vec<T>> {
        self.get_element_list(&T::entity_type(), filter)
            .await?
            .iter()
            .map(Entity::to_model::<T>)
            .collect()
    }

    // ---- helpers ----------------------------------------------------------

    fn base(&self, ty: &EntityType) -> Result<String> {
        ty.api_endpoint()
            .map(str::to_string)
            .ok_or_else(|| EntityError::MissingEndpoint(ty.id().to_string()))
    }

    fn item_path(&self, entity: &Entity) -> Result<String> {
        let base = self.base(entity.entity_type())?;
        let unique = plain_text(entity.unique_property_value());
        Ok(format!("{}/{}", base, urlencoding::encode(&unique)))
    }

    /// Declared properties under their external names
    fn payload(&self, entity: &Entity) -> Value {
        let object = entity.to_persistent_object();
        Value::Object(entity.entity_type().to_external(&object))
    }

    fn merge_response(&self, entity: &mut Entity, body: Value) {
        match body {
            Value::Object(map) => {
                let internal: Map<String, Value> = entity.entity_type().to_internal(&map);
                entity.merge(internal);
            }
            Value::Null => {}
            other => log::debug!("ignoring non-object response body: {}", other),
        }
        entity.refresh_snapshot();
    }

    /// Open the error dialog for `error` and hand it back
    fn report(&self, title: &str, error: EntityError) -> EntityError {
        let fallback = &self.config.unknown_error_message;
        let message = match &error {
            EntityError::Api(api) => api.user_message(fallback),
            other => {
                let text = other.to_string();
                if text.trim().is_empty() {
                    fallback.clone()
                } else {
                    text
                }
            }
        };
        log::error!("{}: {}", title, message);
        let menu = ConfirmationMenu::error(title, message);
        self.ui.open_confirmation_menu(menu);
        error
    }
}

/// Holds an entity's `saving` flag, and the loading menu once shown, for
/// one save/update request. Dropping it releases both, so a cancelled
/// future leaves the entity usable.
struct InFlight<'a> {
    entity: &'a mut Entity,
    ui: &'a dyn UiService,
    loading: bool,
}

impl<'a> InFlight<'a> {
    fn start(entity: &'a mut Entity, ui: &'a dyn UiService) -> Self {
        entity.set_saving(true);
        Self {
            entity,
            ui,
            loading: false,
        }
    }

    fn show_loading(&mut self) {
        self.ui.show_loading_menu();
        self.loading = true;
    }

    fn hide_loading(&mut self) {
        if std::mem::take(&mut self.loading) {
            self.ui.hide_loading_menu();
        }
    }

    fn clear_saving(&mut self) {
        self.entity.set_saving(false);
    }
}

impl Deref for InFlight<'_> {
    type Target = Entity;

    fn deref(&self) -> &Entity {
        self.entity
    }
}

impl DerefMut for InFlight<'_> {
    fn deref_mut(&mut self) -> &mut Entity {
        self.entity
    }
}

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        if self.entity.is_saving() {
            log::debug!(
                "{} request dropped before completion",
                self.entity.entity_type().id()
            );
            self.clear_saving();
        }
        self.hide_loading();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{RecordingClient, RecordingUi};
    use crate::ui::EventBus;
    use serde_json::json;

    fn ticket_type() -> Arc<EntityType> {
        EntityType::builder("Ticket")
            .module_name("Tickets")
            .module_icon("ticket")
            .primary_property("code")
            .unique_property("code")
            .default_property("title")
            .api_endpoint("/api/tickets")
            .api_methods([HttpMethod::Get, HttpMethod::Post, HttpMethod::Put])
            .property("code", |p| p.display_name("Código"))
            .property("title", |p| {
                p.display_name("Título").persistent_key("ticket_title")
            })
            .build()
    }

    fn runtime() -> (Arc<RecordingClient>, Arc<RecordingUi>, EntityRuntime) {
        let client = Arc::new(RecordingClient::new());
        let ui = Arc::new(RecordingUi::new());
        let runtime = EntityRuntime::new(client.clone(), ui.clone(), Arc::new(EventBus::new()))
            .with_config(RuntimeConfig::immediate());
        (client, ui, runtime)
    }

    #[tokio::test]
    async fn test_save_in_flight_blocks_second_save() {
        let (client, _ui, runtime) = runtime();
        let ty = ticket_type();
        let mut ticket = Entity::empty(&ty);
        ticket.set("title", "Impresora");
        ticket.set_saving(true);

        let outcome = runtime.save(&mut ticket).await.unwrap();
        assert_eq!(outcome, Outcome::Aborted(AbortReason::AlreadySaving));
        let outcome = runtime.update(&mut ticket).await.unwrap();
        assert_eq!(outcome, Outcome::Aborted(AbortReason::AlreadySaving));
        assert_eq!(client.request_count(), 0);
    }

    #[test]
    fn test_configuration_error_lists() {
        let bare = EntityType::builder("Bare").build();
        assert_eq!(EntityRuntime::module_configuration_errors(&bare).len(), 4);
        assert_eq!(
            EntityRuntime::persistence_configuration_errors(&bare).len(),
            3
        );
        let ticket = ticket_type();
        let module_errors = EntityRuntime::module_configuration_errors(&ticket);
        let persistence_errors = EntityRuntime::persistence_configuration_errors(&ticket);
        assert!(module_errors.is_empty());
        assert!(persistence_errors.is_empty());
    }

    #[test]
    fn test_validate_api_method_opens_dialog() {
        let (_client, ui, runtime) = runtime();
        let ty = ticket_type();
        assert!(runtime.validate_api_method(&ty, HttpMethod::Get));
        assert!(!runtime.validate_api_method(&ty, HttpMethod::Delete));
        assert_eq!(ui.menu_titles(), vec!["Método no permitido"]);
        assert_eq!(
            ui.menus()[0].message,
            "El método DELETE no está permitido en esta entidad"
        );
    }

    #[test]
    fn test_payload_uses_external_keys() {
        let (_client, _ui, runtime) = runtime();
        let ty = ticket_type();
        let mut ticket = Entity::empty(&ty);
        ticket.set("title", "Impresora");
        ticket.set("scratch", "not declared");
        assert_eq!(
            runtime.payload(&ticket),
            json!({ "ticket_title": "Impresora" })
        );
    }

    #[test]
    fn test_non_object_response_still_refreshes_snapshot() {
        let (_client, _ui, runtime) = runtime();
        let ty = ticket_type();
        let mut ticket = Entity::empty(&ty);
        ticket.set("title", "Impresora");
        assert!(ticket.is_dirty());
        runtime.merge_response(&mut ticket, json!("created"));
        assert_eq!(ticket.get_str("title"), Some("Impresora"));
        assert!(!ticket.is_dirty());
    }
}
