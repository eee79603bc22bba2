//! REST client configuration

use anyhow::{bail, Result};
use serde::{Deserialize, Serialize};
use std::env;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ApiConfig {
    /// Base URL every entity endpoint is relative to
    /// Env: ENTIFORM_API_BASE_URL
    /// Default: "http://localhost:8080"
    pub base_url: String,

    /// Request timeout in milliseconds
    /// Env: ENTIFORM_API_TIMEOUT_MS
    /// Default: 30000
    pub timeout_ms: u64,

    /// Extra attempts for connection-level failures
    /// Env: ENTIFORM_API_RETRY_ATTEMPTS
    /// Default: 3
    pub retry_attempts: u32,

    /// Base delay between retries, multiplied by the attempt number
    /// Default: 200
    pub retry_delay_ms: u64,

    /// Environment variable holding the bearer token
    /// Env: ENTIFORM_AUTH_TOKEN_KEY
    /// Default: None (no auth header)
    pub auth_token_key: Option<String>,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:8080".to_string(),
            timeout_ms: 30_000,
            retry_attempts: 3,
            retry_delay_ms: 200,
            auth_token_key: None,
        }
    }
}

impl ApiConfig {
    /// Merge another config into this one (other takes priority)
    pub fn merge(&mut self, other: Self) {
        self.base_url = other.base_url;
        self.timeout_ms = other.timeout_ms;
        self.retry_attempts = other.retry_attempts;
        self.retry_delay_ms = other.retry_delay_ms;
        if other.auth_token_key.is_some() {
            self.auth_token_key = other.auth_token_key;
        }
    }

    pub fn apply_env_vars(&mut self) {
        if let Ok(url) = env::var("ENTIFORM_API_BASE_URL") {
            self.base_url = url;
        }

        if let Ok(timeout) = env::var("ENTIFORM_API_TIMEOUT_MS") {
            if let Ok(t) = timeout.parse() {
                self.timeout_ms = t;
            }
        }

        if let Ok(attempts) = env::var("ENTIFORM_API_RETRY_ATTEMPTS") {
            if let Ok(a) = attempts.parse() {
                self.retry_attempts = a;
            }
        }

        if let Ok(key) = env::var("ENTIFORM_AUTH_TOKEN_KEY") {
            self.auth_token_key = Some(key);
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.timeout_ms == 0 {
            bail!("Invalid api timeout: must be greater than 0");
        }

        if !self.base_url.is_empty() {
            if let Err(e) = url::Url::parse(&self.base_url) {
                bail!("Invalid api base_url '{}': {}", self.base_url, e);
            }
        }

        if self.retry_attempts > 10 {
            bail!("Invalid retry_attempts: at most 10 retries are allowed");
        }

        Ok(())
    }
}
