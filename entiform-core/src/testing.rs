//! Recording test doubles for the runtime's ports

use async_trait::async_trait;
use serde_json::Value;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Mutex, MutexGuard};
use std::time::Duration;

use crate::client::{ApiClient, ApiError, ApiRequest, ApiResponse};
use crate::ui::{ConfirmationMenu, ToastKind, UiService};

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex
        .lock()
        .unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// [`ApiClient`] that records requests and replays scripted responses.
///
/// Once the script is exhausted every request is answered with its own body
/// (or `null`), which is what a typical REST backend echoes on create/update.
#[derive(Debug, Default)]
pub struct RecordingClient {
    requests: Mutex<Vec<ApiRequest>>,
    script: Mutex<VecDeque<Result<ApiResponse, ApiError>>>,
    latency: Option<Duration>,
}

impl RecordingClient {
    pub fn new() -> Self {
        Self::default()
    }

    /// Sleep this long (on the tokio clock) before answering
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = Some(latency);
        self
    }

    pub fn respond_with(&self, body: Value) -> &Self {
        lock(&self.script).push_back(Ok(ApiResponse::ok(body)));
        self
    }

    pub fn fail_with(&self, error: ApiError) -> &Self {
        lock(&self.script).push_back(Err(error));
        self
    }

    pub fn requests(&self) -> Vec<ApiRequest> {
        lock(&self.requests).clone()
    }

    pub fn request_count(&self) -> usize {
        lock(&self.requests).len()
    }

    pub fn last_request(&self) -> Option<ApiRequest> {
        lock(&self.requests).last().cloned()
    }
}

#[async_trait]
impl ApiClient for RecordingClient {
    async fn send(&self, request: ApiRequest) -> Result<ApiResponse, ApiError> {
        lock(&self.requests).push(request.clone());
        if let Some(latency) = self.latency {
            tokio::time::sleep(latency).await;
        }
        let scripted = lock(&self.script).pop_front();
        scripted.unwrap_or_else(|| Ok(ApiResponse::ok(request.body.unwrap_or(Value::Null))))
    }
}

/// [`UiService`] that keeps every dialog and toast it was asked to show
#[derive(Debug, Default)]
pub struct RecordingUi {
    menus: Mutex<Vec<ConfirmationMenu>>,
    toasts: Mutex<Vec<(String, ToastKind)>>,
    loading_shown: AtomicUsize,
    loading_hidden: AtomicUsize,
}

impl RecordingUi {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn menus(&self) -> Vec<ConfirmationMenu> {
        lock(&self.menus).clone()
    }

    pub fn menu_titles(&self) -> Vec<String> {
        lock(&self.menus).iter().map(|m| m.title.clone()).collect()
    }

    pub fn toasts(&self) -> Vec<(String, ToastKind)> {
        lock(&self.toasts).clone()
    }

    /// (shown, hidden) loading-screen counts
    pub fn loading_counts(&self) -> (usize, usize) {
        (self.loading_shown.load(Ordering::SeqCst), self.loading_hidden.load(Ordering::SeqCst))
    }
}

impl UiService for RecordingUi {
    fn open_confirmation_menu(&self, menu: ConfirmationMenu) {
        lock(&self.menus).push(menu);
    }

    fn show_toast(&self, message: &str, kind: ToastKind) {
        lock(&self.toasts).push((message.to_string(), kind));
    }

    fn show_loading_menu(&self) {
        self.loading_shown.fetch_add(1, Ordering::SeqCst);
    }

    fn hide_loading_menu(&self) {
        self.loading_hidden.fetch_add(1, Ordering::SeqCst);
    }
}
