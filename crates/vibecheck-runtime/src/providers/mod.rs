//! Judge adapters for vision-capable backends.
//!
//! This module defines the [`Judge`] trait and includes implementations
//! for Anthropic and OpenAI. An adapter turns (image, specification,
//! options) into a raw backend reply. Adapters never retry; that is the
//! job of [`ResilientEvaluator`](crate::resilience::ResilientEvaluator).
//!
//! ## Security
//!
//! All adapters use the [`secrets`] module for credential handling.

use async_trait::async_trait;
use serde_json::Value as JsonValue;
use std::collections::BTreeMap;
use std::time::Duration;
use thiserror::Error;
use vibecheck_core::EvaluationOptions;

mod factory;
pub mod secrets;

#[cfg(feature = "anthropic")]
mod anthropic;

#[cfg(feature = "openai")]
mod openai;

pub use factory::{JudgeFactory, JudgeFactoryRegistry};
pub use secrets::{ApiCredential, CredentialSource, CredentialSpec};

#[cfg(feature = "anthropic")]
pub use anthropic::{AnthropicJudge, AnthropicJudgeFactory, ANTHROPIC_API_KEY_ENV};

#[cfg(feature = "openai")]
pub use openai::{OpenAiJudge, OpenAiJudgeFactory, OPENAI_API_KEY_ENV};

/// Errors from judge adapters.
#[derive(Error, Debug)]
pub enum JudgeError {
    #[error("HTTP request failed: {0}")]
    Http(String),

    #[error("Rate limit exceeded, retry after {retry_after:?}")]
    RateLimited { retry_after: Option<Duration> },

    #[error("API error: {status} - {message}")]
    Api { status: u16, message: String },

    #[error("Invalid response from judge: {0}")]
    InvalidResponse(String),

    #[error("Could not build judge request: {0}")]
    InvalidRequest(String),

    #[error("Authentication failed: {0}")]
    Auth(String),

    #[error("Timeout after {0:?}")]
    Timeout(Duration),

    #[error("Judge not configured: {0}")]
    NotConfigured(String),
}

impl JudgeError {
    /// Transport failures and server-side errors are worth another attempt.
    /// Credential, configuration and other client errors (4xx apart from
    /// 408, 409 and 429) are not.
    pub fn is_retryable(&self) -> bool {
        match self {
            JudgeError::Http(_)
            | JudgeError::RateLimited { .. }
            | JudgeError::InvalidResponse(_)
            | JudgeError::Timeout(_) => true,
            JudgeError::Api { status, .. } => {
                !(400..500).contains(status) || matches!(status, 408 | 409 | 429)
            }
            JudgeError::InvalidRequest(_) | JudgeError::Auth(_) | JudgeError::NotConfigured(_) => {
                false
            }
        }
    }

    /// Server-requested delay before the next attempt, if any.
    pub fn retry_after(&self) -> Option<Duration> {
        match self {
            JudgeError::RateLimited { retry_after } => *retry_after,
            _ => None,
        }
    }
}

/// An image ready to embed in a judge request.
#[derive(Debug, Clone, PartialEq)]
pub struct ImageData {
    /// Base64-encoded image bytes
    pub base64: String,

    /// MIME type, e.g. "image/png"
    pub media_type: String,
}

impl ImageData {
    pub fn new(base64: impl Into<String>, media_type: impl Into<String>) -> Self {
        Self {
            base64: base64.into(),
            media_type: media_type.into(),
        }
    }

    /// `data:` URL form used by OpenAI-style APIs.
    pub fn data_url(&self) -> String {
        format!("data:{};base64,{}", self.media_type, self.base64)
    }
}

/// Raw reply from a judge, before normalization.
#[derive(Debug, Clone)]
pub struct JudgeReply {
    /// Text segment expected to hold the verdict JSON
    pub text: String,

    /// Model that produced the reply
    pub model: String,

    /// Token usage
    pub usage: TokenUsage,

    /// Stop reason
    pub stop_reason: Option<String>,
}

/// Token usage from a judge call.
#[derive(Debug, Clone, Default)]
pub struct TokenUsage {
    /// Tokens in the prompt, image included
    pub prompt_tokens: u32,

    /// Tokens in the reply
    pub completion_tokens: u32,
}

impl TokenUsage {
    /// Total tokens used.
    pub fn total(&self) -> u32 {
        self.prompt_tokens + self.completion_tokens
    }
}

/// A vision-capable backend that judges an image against a specification.
#[async_trait]
pub trait Judge: Send + Sync {
    /// Send one evaluation request. Fails with [`JudgeError::Auth`] before
    /// any network call when no credential is available.
    async fn evaluate(
        &self,
        image: &ImageData,
        specification: &str,
        options: &EvaluationOptions,
    ) -> Result<JudgeReply, JudgeError>;

    /// Check whether the judge has what it needs to make calls.
    async fn health_check(&self) -> bool;

    /// Provider name for logs.
    fn name(&self) -> &str;

    /// Backend defaults, the lowest option layer.
    fn default_options(&self) -> EvaluationOptions {
        EvaluationOptions::default()
    }
}

/// Connection settings shared by the HTTP adapters.
#[derive(Debug, Clone, PartialEq)]
pub struct JudgeSettings {
    /// API root, without trailing slash
    pub base_url: String,

    /// Default model identifier
    pub model: String,

    /// Reply token cap
    pub max_tokens: u32,

    /// Per-attempt transport timeout
    pub timeout: Duration,
}

impl JudgeSettings {
    /// Read `base_url`, `model`, `max_tokens` and `timeout` from JSON
    /// settings, keeping `defaults` for anything absent.
    pub fn from_config(config: &JsonValue, defaults: JudgeSettings) -> Result<Self, JudgeError> {
        let mut settings = defaults;

        if let Some(url) = config["base_url"].as_str() {
            if !url.starts_with("http://") && !url.starts_with("https://") {
                return Err(JudgeError::NotConfigured(
                    "base_url must start with http:// or https://".to_string(),
                ));
            }
            settings.base_url = url.trim_end_matches('/').to_string();
        }

        if let Some(model) = config["model"].as_str() {
            settings.model = model.to_string();
        }

        if let Some(max_tokens) = config["max_tokens"].as_u64() {
            settings.max_tokens = u32::try_from(max_tokens).map_err(|_| {
                JudgeError::NotConfigured(format!("max_tokens out of range: {}", max_tokens))
            })?;
        }

        match &config["timeout"] {
            JsonValue::Null => {}
            JsonValue::String(s) => {
                settings.timeout = humantime::parse_duration(s).map_err(|e| {
                    JudgeError::NotConfigured(format!("invalid timeout '{}': {}", s, e))
                })?;
            }
            JsonValue::Number(n) => {
                let secs = n.as_u64().ok_or_else(|| {
                    JudgeError::NotConfigured(format!("invalid timeout: {}", n))
                })?;
                settings.timeout = Duration::from_secs(secs);
            }
            other => {
                return Err(JudgeError::NotConfigured(format!(
                    "invalid timeout: {}",
                    other
                )))
            }
        }

        Ok(settings)
    }
}

/// Overlay per-call model parameters onto a serialized request body.
///
/// Keys such as `model`, `max_tokens` or `temperature` replace the
/// adapter's defaults; unknown keys pass through to the backend.
pub fn apply_model_parameters(body: &mut JsonValue, parameters: &BTreeMap<String, JsonValue>) {
    if let JsonValue::Object(map) = body {
        for (key, value) in parameters {
            map.insert(key.clone(), value.clone());
        }
    }
}

#[cfg(any(feature = "anthropic", feature = "openai"))]
mod http {
    use super::JudgeError;
    use serde::Deserialize;
    use std::time::Duration;

    /// Error envelope shared by Anthropic and OpenAI.
    #[derive(Debug, Deserialize)]
    struct ApiErrorBody {
        error: ApiErrorDetail,
    }

    #[derive(Debug, Deserialize)]
    struct ApiErrorDetail {
        message: String,
    }

    pub(super) fn build_client(timeout: Duration) -> Result<reqwest::Client, JudgeError> {
        reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| JudgeError::NotConfigured(format!("failed to build HTTP client: {}", e)))
    }

    pub(super) fn map_send_error(err: reqwest::Error, timeout: Duration) -> JudgeError {
        if err.is_timeout() {
            JudgeError::Timeout(timeout)
        } else {
            JudgeError::Http(err.to_string())
        }
    }

    /// Turn a non-success response into the matching [`JudgeError`].
    pub(super) async fn check_status(
        response: reqwest::Response,
    ) -> Result<reqwest::Response, JudgeError> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        if status.as_u16() == 429 {
            let retry_after = response
                .headers()
                .get("retry-after")
                .and_then(|v| v.to_str().ok())
                .and_then(|v| v.trim().parse::<u64>().ok())
                .map(Duration::from_secs);
            return Err(JudgeError::RateLimited { retry_after });
        }

        let body = response.text().await.unwrap_or_default();
        let message = serde_json::from_str::<ApiErrorBody>(&body)
            .map(|b| b.error.message)
            .unwrap_or(body);

        if status.as_u16() == 401 || status.as_u16() == 403 {
            return Err(JudgeError::Auth(message));
        }

        Err(JudgeError::Api {
            status: status.as_u16(),
            message,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn defaults() -> JudgeSettings {
        JudgeSettings {
            base_url: "https://api.example.com/v1".to_string(),
            model: "vision-1".to_string(),
            max_tokens: 1024,
            timeout: Duration::from_secs(30),
        }
    }

    #[test]
    fn test_retryable_classification() {
        assert!(JudgeError::Http("reset".into()).is_retryable());
        assert!(JudgeError::Timeout(Duration::from_secs(1)).is_retryable());
        assert!(JudgeError::Api {
            status: 500,
            message: "boom".into()
        }
        .is_retryable());
        assert!(JudgeError::RateLimited { retry_after: None }.is_retryable());
        assert!(!JudgeError::Auth("no key".into()).is_retryable());
        assert!(!JudgeError::NotConfigured("x".into()).is_retryable());
        assert!(!JudgeError::InvalidRequest("x".into()).is_retryable());
    }

    #[test]
    fn test_client_errors_are_permanent() {
        let api = |status| JudgeError::Api {
            status,
            message: "Invalid image data".into(),
        };
        assert!(!api(400).is_retryable());
        assert!(!api(404).is_retryable());
        assert!(!api(413).is_retryable());
        assert!(api(408).is_retryable());
        assert!(api(409).is_retryable());
        assert!(api(429).is_retryable());
        assert!(api(503).is_retryable());
    }

    #[test]
    fn test_data_url() {
        let image = ImageData::new("AAAA", "image/png");
        assert_eq!(image.data_url(), "data:image/png;base64,AAAA");
    }

    #[test]
    fn test_settings_from_config() {
        let config = json!({
            "base_url": "http://localhost:8080/v1/",
            "model": "vision-2",
            "max_tokens": 256,
            "timeout": "5s"
        });
        let settings = JudgeSettings::from_config(&config, defaults()).unwrap();
        assert_eq!(settings.base_url, "http://localhost:8080/v1");
        assert_eq!(settings.model, "vision-2");
        assert_eq!(settings.max_tokens, 256);
        assert_eq!(settings.timeout, Duration::from_secs(5));
    }

    #[test]
    fn test_settings_keep_defaults() {
        let settings = JudgeSettings::from_config(&JsonValue::Null, defaults()).unwrap();
        assert_eq!(settings, defaults());

        let settings = JudgeSettings::from_config(&json!({"timeout": 12}), defaults()).unwrap();
        assert_eq!(settings.timeout, Duration::from_secs(12));
    }

    #[test]
    fn test_settings_reject_bad_values() {
        assert!(JudgeSettings::from_config(&json!({"base_url": "ftp://x"}), defaults()).is_err());
        assert!(JudgeSettings::from_config(&json!({"timeout": "soon"}), defaults()).is_err());
        assert!(JudgeSettings::from_config(&json!({"timeout": true}), defaults()).is_err());
    }

    #[test]
    fn test_apply_model_parameters() {
        let mut body = json!({"model": "default", "max_tokens": 100});
        let mut params = BTreeMap::new();
        params.insert("model".to_string(), json!("override"));
        params.insert("temperature".to_string(), json!(0.1));

        apply_model_parameters(&mut body, &params);
        assert_eq!(body["model"], "override");
        assert_eq!(body["max_tokens"], 100);
        assert_eq!(body["temperature"], 0.1);
    }
}
