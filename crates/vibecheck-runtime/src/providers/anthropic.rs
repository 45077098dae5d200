//! Anthropic Claude judge.
//!
//! Sends the screenshot as a base64 image block next to the specification
//! text, with the judging rubric as the system prompt.

use super::{
    apply_model_parameters,
    factory::JudgeFactory,
    http,
    secrets::{ApiCredential, CredentialSpec},
    ImageData, Judge, JudgeError, JudgeReply, JudgeSettings, TokenUsage,
};
use crate::prompts::{specification_prompt, JUDGE_SYSTEM_PROMPT};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use std::sync::Arc;
use std::time::Duration;
use vibecheck_core::EvaluationOptions;

/// Environment variable name for Anthropic API key.
pub const ANTHROPIC_API_KEY_ENV: &str = "ANTHROPIC_API_KEY";

const DEFAULT_BASE_URL: &str = "https://api.anthropic.com/v1";
const DEFAULT_MODEL: &str = "claude-sonnet-4-5";
const API_VERSION: &str = "2023-06-01";
const CREDENTIAL: CredentialSpec = CredentialSpec::new("Anthropic API key", ANTHROPIC_API_KEY_ENV);

/// Anthropic Claude judge.
pub struct AnthropicJudge {
    credential: Option<ApiCredential>,
    settings: JudgeSettings,
    client: reqwest::Client,
}

impl std::fmt::Debug for AnthropicJudge {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AnthropicJudge")
            .field("credential", &self.credential)
            .field("settings", &self.settings)
            .finish()
    }
}

impl AnthropicJudge {
    /// Create a judge with an explicit API key and default settings.
    pub fn new(api_key: impl Into<String>) -> Result<Self, JudgeError> {
        let credential = ApiCredential::explicit(api_key, &CREDENTIAL);
        Self::with_parts(credential, Self::default_settings())
    }

    /// Create from JSON settings: `api_key` (falls back to
    /// `ANTHROPIC_API_KEY`), `base_url`, `model`, `max_tokens`, `timeout`.
    pub fn from_config(config: &JsonValue) -> Result<Self, JudgeError> {
        let settings = JudgeSettings::from_config(config, Self::default_settings())?;
        let credential = ApiCredential::resolve(config, &CREDENTIAL);
        Self::with_parts(credential, settings)
    }

    fn with_parts(
        credential: Option<ApiCredential>,
        settings: JudgeSettings,
    ) -> Result<Self, JudgeError> {
        let client = http::build_client(settings.timeout)?;
        Ok(Self {
            credential,
            settings,
            client,
        })
    }

    pub fn default_settings() -> JudgeSettings {
        JudgeSettings {
            base_url: DEFAULT_BASE_URL.to_string(),
            model: DEFAULT_MODEL.to_string(),
            max_tokens: 1024,
            timeout: Duration::from_secs(60),
        }
    }

    /// Set custom base URL.
    pub fn with_base_url(mut self, url: impl Into<String>) -> Self {
        self.settings.base_url = url.into();
        self
    }

    pub fn settings(&self) -> &JudgeSettings {
        &self.settings
    }

    fn request_body(
        &self,
        image: &ImageData,
        specification: &str,
        options: &EvaluationOptions,
    ) -> Result<JsonValue, JudgeError> {
        let request = AnthropicRequest {
            model: self.settings.model.clone(),
            max_tokens: self.settings.max_tokens,
            system: JUDGE_SYSTEM_PROMPT.trim().to_string(),
            messages: vec![AnthropicMessage {
                role: "user",
                content: vec![
                    ContentBlock::Image {
                        source: ImageSource {
                            type_: "base64",
                            media_type: image.media_type.clone(),
                            data: image.base64.clone(),
                        },
                    },
                    ContentBlock::Text {
                        text: specification_prompt(specification),
                    },
                ],
            }],
        };

        let mut body = serde_json::to_value(&request)
            .map_err(|e| JudgeError::InvalidRequest(e.to_string()))?;
        apply_model_parameters(&mut body, &options.model_parameters);
        Ok(body)
    }
}

/// Anthropic API request format.
#[derive(Debug, Serialize)]
struct AnthropicRequest {
    model: String,
    max_tokens: u32,
    system: String,
    messages: Vec<AnthropicMessage>,
}

#[derive(Debug, Serialize)]
struct AnthropicMessage {
    role: &'static str,
    content: Vec<ContentBlock>,
}

#[derive(Debug, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum ContentBlock {
    Image { source: ImageSource },
    Text { text: String },
}

#[derive(Debug, Serialize)]
struct ImageSource {
    #[serde(rename = "type")]
    type_: &'static str,
    media_type: String,
    data: String,
}

/// Anthropic API response format.
#[derive(Debug, Deserialize)]
struct AnthropicResponse {
    content: Vec<ContentBlockResponse>,
    model: String,
    stop_reason: Option<String>,
    #[serde(default)]
    usage: AnthropicUsage,
}

#[derive(Debug, Deserialize)]
struct ContentBlockResponse {
    text: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct AnthropicUsage {
    #[serde(default)]
    input_tokens: u32,
    #[serde(default)]
    output_tokens: u32,
}

#[async_trait]
impl Judge for AnthropicJudge {
    async fn evaluate(
        &self,
        image: &ImageData,
        specification: &str,
        options: &EvaluationOptions,
    ) -> Result<JudgeReply, JudgeError> {
        let credential = self
            .credential
            .as_ref()
            .ok_or_else(|| CREDENTIAL.missing())?;

        let body = self.request_body(image, specification, options)?;
        tracing::debug!(judge = "anthropic", model = %body["model"], "Sending judge request");

        // Expose the credential only at the point of use
        let response = self
            .client
            .post(format!("{}/messages", self.settings.base_url))
            .header("x-api-key", credential.expose())
            .header("anthropic-version", API_VERSION)
            .header("content-type", "application/json")
            .json(&body)
            .send()
            .await
            .map_err(|e| http::map_send_error(e, self.settings.timeout))?;

        let response = http::check_status(response).await?;

        let body: AnthropicResponse = response
            .json()
            .await
            .map_err(|e| JudgeError::InvalidResponse(e.to_string()))?;

        let text = body
            .content
            .into_iter()
            .filter_map(|block| block.text)
            .collect::<Vec<_>>()
            .join("");

        let usage = TokenUsage {
            prompt_tokens: body.usage.input_tokens,
            completion_tokens: body.usage.output_tokens,
        };
        tracing::debug!(
            judge = "anthropic",
            model = %body.model,
            tokens = usage.total(),
            "Judge replied"
        );

        Ok(JudgeReply {
            text,
            model: body.model,
            usage,
            stop_reason: body.stop_reason,
        })
    }

    async fn health_check(&self) -> bool {
        self.credential.is_some()
    }

    fn name(&self) -> &str {
        "anthropic"
    }

    fn default_options(&self) -> EvaluationOptions {
        EvaluationOptions {
            max_retries: 3,
            ..EvaluationOptions::default()
        }
    }
}

/// Factory for Anthropic judges.
///
/// ## Settings
/// ```json
/// {
///   "api_key": "sk-ant-...",        // Optional, falls back to ANTHROPIC_API_KEY env
///   "base_url": "https://...",       // Optional, custom API endpoint
///   "model": "claude-sonnet-4-5",    // Optional
///   "max_tokens": 1024,              // Optional
///   "timeout": "60s"                 // Optional, per attempt
/// }
/// ```
pub struct AnthropicJudgeFactory;

impl JudgeFactory for AnthropicJudgeFactory {
    fn provider(&self) -> &'static str {
        "anthropic"
    }

    fn build(&self, settings: &JsonValue) -> Result<Arc<dyn Judge>, JudgeError> {
        Ok(Arc::new(AnthropicJudge::from_config(settings)?))
    }

    fn validate(&self, settings: &JsonValue) -> Result<(), JudgeError> {
        JudgeSettings::from_config(settings, AnthropicJudge::default_settings()).map(|_| ())
    }

    fn default_settings(&self) -> JsonValue {
        serde_json::json!({
            "model": DEFAULT_MODEL,
            "max_tokens": 1024
        })
    }
}
