//! UI port
//!
//! The runtime never renders anything itself. It reports configuration
//! problems, failures and successes through a [`UiService`] supplied by the
//! host application, and broadcasts validation signals through a
//! [`signals::SignalBus`].

pub mod signals;

use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;

pub use signals::{EventBus, Signal, SignalBus, ValidityFlag};

/// Severity of a confirmation dialog
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum ConfMenuKind {
    Info,
    Success,
    Warning,
    Error,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum ToastKind {
    Success,
    Error,
    Warning,
    Info,
}

pub type ConfirmationAction = Arc<dyn Fn() + Send + Sync>;

/// Blocking dialog request
#[derive(Clone)]
pub struct ConfirmationMenu {
    pub kind: ConfMenuKind,
    pub title: String,
    pub message: String,
    pub confirmation_action: Option<ConfirmationAction>,
    pub accept_button_text: Option<String>,
    pub cancel_button_text: Option<String>,
}

impl ConfirmationMenu {
    pub fn new(kind: ConfMenuKind, title: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            kind,
            title: title.into(),
            message: message.into(),
            confirmation_action: None,
            accept_button_text: None,
            cancel_button_text: None,
        }
    }

    /// Error dialog with the stock "Aceptar" / "Cerrar" buttons
    pub fn error(title: impl Into<String>, message: impl Into<String>) -> Self {
        Self::new(ConfMenuKind::Error, title, message).with_buttons("Aceptar", "Cerrar")
    }

    pub fn with_buttons(mut self, accept: impl Into<String>, cancel: impl Into<String>) -> Self {
        self.accept_button_text = Some(accept.into());
        self.cancel_button_text = Some(cancel.into());
        self
    }

    pub fn on_confirm<F>(mut self, action: F) -> Self
    where
        F: Fn() + Send + Sync + 'static,
    {
        self.confirmation_action = Some(Arc::new(action));
        self
    }

    /// Run the accept action, if any
    pub fn confirm(&self) {
        if let Some(action) = &self.confirmation_action {
            action();
        }
    }
}

impl fmt::Debug for ConfirmationMenu {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConfirmationMenu")
            .field("kind", &self.kind)
            .field("title", &self.title)
            .field("message", &self.message)
            .field("has_action", &self.confirmation_action.is_some())
            .field("accept_button_text", &self.accept_button_text)
            .field("cancel_button_text", &self.cancel_button_text)
            .finish()
    }
}

/// Narrow set of UI capabilities the runtime calls back into
pub trait UiService: Send + Sync {
    fn open_confirmation_menu(&self, menu: ConfirmationMenu);

    fn show_toast(&self, message: &str, kind: ToastKind);

    fn show_loading_menu(&self) {}

    fn hide_loading_menu(&self) {}
}

/// UI port that only logs; used when no UI is attached (batch jobs, tests)
#[derive(Debug, Default, Clone, Copy)]
pub struct LogUi;

impl UiService for LogUi {
    fn open_confirmation_menu(&self, menu: ConfirmationMenu) {
        match menu.kind {
            ConfMenuKind::Error => log::error!("{}: {}", menu.title, menu.message),
            ConfMenuKind::Warning => log::warn!("{}: {}", menu.title, menu.message),
            _ => log::info!("{}: {}", menu.title, menu.message),
        }
    }

    fn show_toast(&self, message: &str, kind: ToastKind) {
        log::info!("[{:?}] {}", kind, message);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicBool, Ordering};

    #[test]
    fn test_error_menu_uses_stock_buttons() {
        let menu = ConfirmationMenu::error("Error al guardar", "boom");
        assert_eq!(menu.kind, ConfMenuKind::Error);
        assert_eq!(menu.accept_button_text.as_deref(), Some("Aceptar"));
        assert_eq!(menu.cancel_button_text.as_deref(), Some("Cerrar"));
        assert!(menu.confirmation_action.is_none());
    }

    #[test]
    fn test_confirm_runs_action() {
        let fired = Arc::new(AtomicBool::new(false));
        let flag = Arc::clone(&fired);
        let menu = ConfirmationMenu::new(ConfMenuKind::Warning, "Salir", "¿Descartar cambios?")
            .on_confirm(move || flag.store(true, Ordering::SeqCst));
        menu.confirm();
        assert!(fired.load(Ordering::SeqCst));
    }

    #[test]
    fn test_kinds_serialize_uppercase() {
        assert_eq!(
            serde_json::to_string(&ToastKind::Success).unwrap(),
            "\"SUCCESS\""
        );
        assert_eq!(
            serde_json::to_string(&ConfMenuKind::Error).unwrap(),
            "\"ERROR\""
        );
    }
}
