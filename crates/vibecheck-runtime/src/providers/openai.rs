//! OpenAI chat-completions judge.
//!
//! The screenshot travels as a `data:` URL in an `image_url` content part;
//! JSON mode is requested so the reply is the verdict object itself.

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

/// Environment variable name for OpenAI API key.
pub const OPENAI_API_KEY_ENV: &str = "OPENAI_API_KEY";

const DEFAULT_BASE_URL: &str = "https://api.openai.com/v1";
const DEFAULT_MODEL: &str = "gpt-4o";
const CREDENTIAL: CredentialSpec = CredentialSpec::new("OpenAI API key", OPENAI_API_KEY_ENV);

/// OpenAI vision judge.
pub struct OpenAiJudge {
    credential: Option<ApiCredential>,
    settings: JudgeSettings,
    client: reqwest::Client,
}

impl std::fmt::Debug for OpenAiJudge {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OpenAiJudge")
            .field("credential", &self.credential)
            .field("settings", &self.settings)
            .finish()
    }
}

impl OpenAiJudge {
    pub fn new(api_key: impl Into<String>) -> Result<Self, JudgeError> {
        let credential = ApiCredential::explicit(api_key, &CREDENTIAL);
        Self::with_parts(credential, Self::default_settings())
    }

    /// Create from JSON settings; `api_key` falls back to `OPENAI_API_KEY`.
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
        let request = ChatRequest {
            model: self.settings.model.clone(),
            max_tokens: self.settings.max_tokens,
            messages: vec![
                ChatMessage {
                    role: "system",
                    content: MessageContent::Text(JUDGE_SYSTEM_PROMPT.trim().to_string()),
                },
                ChatMessage {
                    role: "user",
                    content: MessageContent::Parts(vec![
                        ContentPart::Text {
                            text: specification_prompt(specification),
                        },
                        ContentPart::ImageUrl {
                            image_url: ImageUrl {
                                url: image.data_url(),
                            },
                        },
                    ]),
                },
            ],
            response_format: ResponseFormat {
                type_: "json_object",
            },
        };

        let mut body = serde_json::to_value(&request)
            .map_err(|e| JudgeError::InvalidRequest(e.to_string()))?;
        apply_model_parameters(&mut body, &options.model_parameters);
        Ok(body)
    }
}

#[derive(Debug, Serialize)]
struct ChatRequest {
    model: String,
    max_tokens: u32,
    messages: Vec<ChatMessage>,
    response_format: ResponseFormat,
}

#[derive(Debug, Serialize)]
struct ChatMessage {
    role: &'static str,
    content: MessageContent,
}

#[derive(Debug, Serialize)]
#[serde(untagged)]
enum MessageContent {
    Text(String),
    Parts(Vec<ContentPart>),
}

#[derive(Debug, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum ContentPart {
    Text { text: String },
    ImageUrl { image_url: ImageUrl },
}

#[derive(Debug, Serialize)]
struct ImageUrl {
    url: String,
}

#[derive(Debug, Serialize)]
struct ResponseFormat {
    #[serde(rename = "type")]
    type_: &'static str,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    model: String,
    choices: Vec<Choice>,
    #[serde(default)]
    usage: ChatUsage,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: ChoiceMessage,
    finish_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ChoiceMessage {
    content: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct ChatUsage {
    #[serde(default)]
    prompt_tokens: u32,
    #[serde(default)]
    completion_tokens: u32,
}

#[async_trait]
impl Judge for OpenAiJudge {
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
        tracing::debug!(judge = "openai", model = %body["model"], "Sending judge request");

        let response = self
            .client
            .post(format!("{}/chat/completions", self.settings.base_url))
            .bearer_auth(credential.expose())
            .json(&body)
            .send()
            .await
            .map_err(|e| http::map_send_error(e, self.settings.timeout))?;

        let response = http::check_status(response).await?;

        let body: ChatResponse = response
            .json()
            .await
            .map_err(|e| JudgeError::InvalidResponse(e.to_string()))?;

        let choice = body
            .choices
            .into_iter()
            .next()
            .ok_or_else(|| JudgeError::InvalidResponse("reply has no choices".to_string()))?;

        let usage = TokenUsage {
            prompt_tokens: body.usage.prompt_tokens,
            completion_tokens: body.usage.completion_tokens,
        };
        tracing::debug!(
            judge = "openai",
            model = %body.model,
            tokens = usage.total(),
            "Judge replied"
        );

        Ok(JudgeReply {
            text: choice.message.content.unwrap_or_default(),
            model: body.model,
            usage,
            stop_reason: choice.finish_reason,
        })
    }

    async fn health_check(&self) -> bool {
        self.credential.is_some()
    }

    fn name(&self) -> &str {
        "openai"
    }

    fn default_options(&self) -> EvaluationOptions {
        EvaluationOptions {
            max_retries: 2,
            ..EvaluationOptions::default()
        }
    }
}

/// Factory for OpenAI judges. Settings as for Anthropic; `api_key`
/// falls back to `OPENAI_API_KEY`.
pub struct OpenAiJudgeFactory;

impl JudgeFactory for OpenAiJudgeFactory {
    fn provider(&self) -> &'static str {
        "openai"
    }

    fn build(&self, settings: &JsonValue) -> Result<Arc<dyn Judge>, JudgeError> {
        Ok(Arc::new(OpenAiJudge::from_config(settings)?))
    }

    fn validate(&self, settings: &JsonValue) -> Result<(), JudgeError> {
        JudgeSettings::from_config(settings, OpenAiJudge::default_settings()).map(|_| ())
    }

    fn default_settings(&self) -> JsonValue {
        serde_json::json!({
            "model": DEFAULT_MODEL,
            "max_tokens": 1024
        })
    }
}
