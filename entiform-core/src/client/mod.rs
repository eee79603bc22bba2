//! REST client port
//!
//! The CRUD runtime talks to the backend only through [`ApiClient`]. The
//! production implementation is [`http::HttpApiClient`] (reqwest); tests plug
//! in [`crate::testing::RecordingClient`].

pub mod http;

use async_trait::async_trait;
use serde_json::Value;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::RwLock;

use crate::metadata::HttpMethod;

pub use http::HttpApiClient;

/// One REST call, relative to the client's base URL
#[derive(Debug, Clone, PartialEq)]
pub struct ApiRequest {
    pub method: HttpMethod,
    pub path: String,
    pub query: Vec<(String, String)>,
    pub body: Option<Value>,
}

impl ApiRequest {
    pub fn new(method: HttpMethod, path: impl Into<String>) -> Self {
        Self {
            method,
            path: path.into(),
            query: Vec::new(),
            body: None,
        }
    }

    pub fn get(path: impl Into<String>) -> Self {
        Self::new(HttpMethod::Get, path)
    }

    pub fn post(path: impl Into<String>, body: Value) -> Self {
        Self::new(HttpMethod::Post, path).with_body(body)
    }

    pub fn put(path: impl Into<String>, body: Value) -> Self {
        Self::new(HttpMethod::Put, path).with_body(body)
    }

    pub fn delete(path: impl Into<String>) -> Self {
        Self::new(HttpMethod::Delete, path)
    }

    pub fn with_query(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.query.push((key.into(), value.into()));
        self
    }

    pub fn with_body(mut self, body: Value) -> Self {
        self.body = Some(body);
        self
    }

    /// Path plus url-encoded query string, as it would appear on the wire
    pub fn target(&self) -> String {
        if self.query.is_empty() {
            return self.path.clone();
        }
        let query: Vec<String> = self
            .query
            .iter()
            .map(|(k, v)| {
                format!("{}={}", urlencoding::encode(k), urlencoding::encode(v))
            })
            .collect();
        format!("{}?{}", self.path, query.join("&"))
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ApiResponse {
    pub status: u16,
    pub body: Value,
}

impl ApiResponse {
    pub fn ok(body: Value) -> Self {
        Self { status: 200, body }
    }
}

/// Transport-level failures
#[derive(thiserror::Error, Debug, Clone, PartialEq)]
pub enum ApiError {
    /// The server answered with a non-success status
    #[error("request failed with status code {status}")]
    Status { status: u16, body: Value },

    #[error("timeout of {0}ms exceeded")]
    Timeout(u64),

    /// The connection could not be established; the server never saw the request
    #[error("connection failed: {0}")]
    Connect(String),

    #[error("{0}")]
    Transport(String),

    #[error("invalid response body: {0}")]
    Decode(String),

    #[error("invalid request: {0}")]
    InvalidRequest(String),
}

impl ApiError {
    pub fn status(&self) -> Option<u16> {
        match self {
            ApiError::Status { status, .. } => Some(*status),
            _ => None,
        }
    }

    /// Non-empty `message` field of the error body, if the server sent one
    pub fn server_message(&self) -> Option<&str> {
        match self {
            ApiError::Status { body, .. } => {
                body.get("message")
                    .and_then(Value::as_str)
                    .filter(|m| !m.is_empty())
            }
            _ => None,
        }
    }

    /// Message for the user: server message, else the transport message,
    /// else `fallback`
    pub fn user_message(&self, fallback: &str) -> String {
        if let Some(message) = self.server_message() {
            return message.to_string();
        }
        let own = self.to_string();
        if own.trim().is_empty() {
            fallback.to_string()
        } else {
            own
        }
    }

    /// Connection-level failures worth retrying; server answers never are
    pub fn is_retryable(&self) -> bool {
        match self {
            ApiError::Timeout(_) | ApiError::Transport(_) | ApiError::Connect(_) => true,
            ApiError::Status { .. } | ApiError::Decode(_) | ApiError::InvalidRequest(_) => false,
        }
    }

    /// Whether `method` may be resent after this error. Non-idempotent
    /// requests are only resent when they never reached the server.
    pub fn is_retryable_for(&self, method: HttpMethod) -> bool {
        if method.is_idempotent() {
            self.is_retryable()
        } else {
            matches!(self, ApiError::Connect(_))
        }
    }
}

#[async_trait]
pub trait ApiClient: Send + Sync {
    async fn send(&self, request: ApiRequest) -> Result<ApiResponse, ApiError>;
}

/// Source of the bearer token attached to every request
pub trait TokenStore: Send + Sync {
    fn token(&self) -> Option<String>;

    /// Forget the token (called on HTTP 401)
    fn clear(&self);
}

/// Token held in memory, set by the host after login
#[derive(Debug, Default)]
pub struct MemoryTokenStore {
    token: RwLock<Option<String>>,
}

impl MemoryTokenStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_token(token: impl Into<String>) -> Self {
        Self {
            token: RwLock::new(Some(token.into())),
        }
    }

    pub fn set(&self, token: impl Into<String>) {
        if let Ok(mut slot) = self.token.write() {
            *slot = Some(token.into());
        }
    }
}

impl TokenStore for MemoryTokenStore {
    fn token(&self) -> Option<String> {
        self.token.read().ok().and_then(|t| t.clone())
    }

    fn clear(&self) {
        if let Ok(mut slot) = self.token.write() {
            *slot = None;
        }
    }
}

/// Token read from an environment variable; cleared tokens stay cleared
#[derive(Debug)]
pub struct EnvTokenStore {
    key: String,
    cleared: AtomicBool,
}

impl EnvTokenStore {
    pub fn new(key: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            cleared: AtomicBool::new(false),
        }
    }
}

impl TokenStore for EnvTokenStore {
    fn token(&self) -> Option<String> {
        if self.cleared.load(Ordering::SeqCst) {
            return None;
        }
        std::env::var(&self.key).ok().filter(|t| !t.is_empty())
    }

    fn clear(&self) {
        self.cleared.store(true, Ordering::SeqCst);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_target_encodes_query() {
        let request = ApiRequest::get("/api/products").with_query("filter", "name=a b");
        assert_eq!(request.target(), "/api/products?filter=name%3Da%20b");
        assert_eq!(
            ApiRequest::delete("/api/products/3").target(),
            "/api/products/3"
        );
    }

    #[test]
    fn test_user_message_prefers_server_message() {
        let err = ApiError::Status {
            status: 409,
            body: json!({"message": "Código duplicado"}),
        };
        assert_eq!(err.user_message("Error desconocido"), "Código duplicado");
    }

    #[test]
    fn test_user_message_falls_back_to_transport_message() {
        let err = ApiError::Status {
            status: 500,
            body: json!({"message": ""}),
        };
        assert_eq!(
            err.user_message("Error desconocido"),
            "request failed with status code 500"
        );

        let err = ApiError::Transport(String::new());
        assert_eq!(err.user_message("Error desconocido"), "Error desconocido");
    }

    #[test]
    fn test_retryable() {
        assert!(ApiError::Timeout(10).is_retryable());
        let unavailable = ApiError::Status {
            status: 503,
            body: Value::Null,
        };
        assert!(!unavailable.is_retryable());
    }

    #[test]
    fn test_post_is_only_retried_before_reaching_the_server() {
        assert!(ApiError::Timeout(10).is_retryable_for(HttpMethod::Get));
        assert!(ApiError::Timeout(10).is_retryable_for(HttpMethod::Put));
        assert!(!ApiError::Timeout(10).is_retryable_for(HttpMethod::Post));
        let reset = ApiError::Transport("reset".into());
        assert!(!reset.is_retryable_for(HttpMethod::Patch));
        let refused = ApiError::Connect("refused".into());
        assert!(refused.is_retryable_for(HttpMethod::Post));
    }

    #[test]
    fn test_memory_token_store() {
        let store = MemoryTokenStore::with_token("abc");
        assert_eq!(store.token().as_deref(), Some("abc"));
        store.clear();
        assert!(store.token().is_none());
        store.set("def");
        assert_eq!(store.token().as_deref(), Some("def"));
    }
}
