//! reqwest-backed [`ApiClient`]

use async_trait::async_trait;
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;

use super::{ApiClient, ApiError, ApiRequest, ApiResponse, EnvTokenStore, TokenStore};
use crate::config::ApiConfig;
use crate::metadata::HttpMethod;

/// JSON REST client with bearer auth, timeout and bounded retry.
///
/// Only connection-level failures are retried, and POST/PATCH only when the
/// connection was never established. Any HTTP answer from the server is
/// returned as is. A 401 clears the token store before the error is returned.
pub struct HttpApiClient {
    client: reqwest::Client,
    base_url: String,
    timeout_ms: u64,
    retry_attempts: u32,
    retry_delay: Duration,
    tokens: Option<Arc<dyn TokenStore>>,
}

impl HttpApiClient {
    pub fn new(config: &ApiConfig) -> Result<Self, ApiError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_millis(config.timeout_ms))
            .build()
            .map_err(|e| ApiError::InvalidRequest(e.to_string()))?;

        let tokens = config
            .auth_token_key
            .as_ref()
            .map(|key| {
                Arc::new(EnvTokenStore::new(key.clone())) as Arc<dyn TokenStore>
            });

        Ok(Self {
            client,
            base_url: config.base_url.clone(),
            timeout_ms: config.timeout_ms,
            retry_attempts: config.retry_attempts,
            retry_delay: Duration::from_millis(config.retry_delay_ms),
            tokens,
        })
    }

    /// Replace the token source (e.g. with a [`super::MemoryTokenStore`])
    pub fn with_token_store(mut self, tokens: Arc<dyn TokenStore>) -> Self {
        self.tokens = Some(tokens);
        self
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url_for(&self, request: &ApiRequest) -> Result<url::Url, ApiError> {
        let raw = if self.base_url.is_empty() {
            request.path.clone()
        } else {
            format!(
                "{}/{}",
                self.base_url.trim_end_matches('/'),
                request.path.trim_start_matches('/')
            )
        };
        let mut url = url::Url::parse(&raw)
            .map_err(|e| ApiError::InvalidRequest(format!("{}: {}", raw, e)))?;
        if !request.query.is_empty() {
            let mut pairs = url.query_pairs_mut();
            for (key, value) in &request.query {
                pairs.append_pair(key, value);
            }
        }
        Ok(url)
    }

    async fn send_once(&self, request: &ApiRequest) -> Result<ApiResponse, ApiError> {
        let url = self.url_for(request)?;
        let mut builder = self.client.request(to_reqwest_method(request.method), url);

        if let Some(token) = self.tokens.as_ref().and_then(|t| t.token()) {
            builder = builder.bearer_auth(token);
        }
        if let Some(body) = &request.body {
            builder = builder.json(body);
        }

        let response = builder.send().await.map_err(|e| self.transport_error(e))?;
        let status = response.status().as_u16();
        if status == 401 {
            if let Some(tokens) = &self.tokens {
                log::warn!("401 from {}, clearing auth token", request.path);
                tokens.clear();
            }
        }
        let text = response.text().await.map_err(|e| self.transport_error(e))?;

        if (200..300).contains(&status) {
            let body = if text.trim().is_empty() {
                Value::Null
            } else {
                serde_json::from_str(&text).map_err(|e| ApiError::Decode(e.to_string()))?
            };
            return Ok(ApiResponse { status, body });
        }
        Err(ApiError::Status {
            status,
            body: error_body(text),
        })
    }

    fn transport_error(&self, error: reqwest::Error) -> ApiError {
        if error.is_connect() {
            ApiError::Connect(error.to_string())
        } else if error.is_timeout() {
            ApiError::Timeout(self.timeout_ms)
        } else {
            ApiError::Transport(error.to_string())
        }
    }
}

#[async_trait]
impl ApiClient for HttpApiClient {
    async fn send(&self, request: ApiRequest) -> Result<ApiResponse, ApiError> {
        let mut attempt = 0;
        loop {
            log::debug!(
                "{} {} (attempt {})",
                request.method,
                request.target(),
                attempt + 1
            );
            match self.send_once(&request).await {
                Err(e) if e.is_retryable_for(request.method) && attempt < self.retry_attempts => {
                    attempt += 1;
                    log::warn!(
                        "{} {} failed: {}, retrying",
                        request.method,
                        request.path,
                        e
                    );
                    tokio::time::sleep(self.retry_delay * attempt).await;
                }
                Err(e) => {
                    log::error!("{} {} failed: {}", request.method, request.path, e);
                    return Err(e);
                }
                ok => return ok,
            }
        }
    }
}

/// Error bodies keep their raw text when the server did not send JSON
fn error_body(text: String) -> Value {
    if text.trim().is_empty() {
        return Value::Null;
    }
    serde_json::from_str(&text).unwrap_or(Value::String(text))
}

fn to_reqwest_method(method: HttpMethod) -> reqwest::Method {
    match method {
        HttpMethod::Get => reqwest::Method::GET,
        HttpMethod::Post => reqwest::Method::POST,
        HttpMethod::Put => reqwest::Method::PUT,
        HttpMethod::Patch => reqwest::Method::PATCH,
        HttpMethod::Delete => reqwest::Method::DELETE,
    }
}
