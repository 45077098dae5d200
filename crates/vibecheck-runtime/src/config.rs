//! Session configuration.
//!
//! A [`SessionConfig`] is built once per test session from defaults merged
//! with user overrides, then cloned for every test so one test's
//! `configure` call never leaks into its siblings.
//!
//! ```yaml
//! default_judge: openai
//! artifacts_dir: target/vibe-artifacts
//! evaluation:
//!   confidence_threshold: 0.9
//!   backoff_base: 500ms
//!   max_backoff: 10s
//! judges:
//!   openai:
//!     provider: openai
//!     settings:
//!       model: gpt-4o
//!       timeout: 30s
//! ```

use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use thiserror::Error;

use vibecheck_core::EvaluationOverrides;

/// Default directory for captured artifacts.
pub const DEFAULT_ARTIFACTS_DIR: &str = "vibe-artifacts";

/// Errors from loading session configuration.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid YAML config: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("Invalid JSON config: {0}")]
    Json(#[from] serde_json::Error),
}

/// One named judge: which factory builds it and with what settings.
#[derive(Clone, Serialize, Deserialize, PartialEq)]
pub struct JudgeConfig {
    /// Factory provider type, e.g. "anthropic"
    pub provider: String,

    /// Provider settings (`api_key`, `base_url`, `model`, `max_tokens`, `timeout`)
    #[serde(default = "empty_settings")]
    pub settings: JsonValue,
}

fn empty_settings() -> JsonValue {
    JsonValue::Object(Default::default())
}

impl JudgeConfig {
    pub fn new(provider: impl Into<String>) -> Self {
        Self {
            provider: provider.into(),
            settings: empty_settings(),
        }
    }

    pub fn with_settings(mut self, settings: JsonValue) -> Self {
        self.settings = settings;
        self
    }
}

impl std::fmt::Debug for JudgeConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut settings = self.settings.clone();
        if let Some(key) = settings.get_mut("api_key") {
            *key = JsonValue::String("[REDACTED]".to_string());
        }
        f.debug_struct("JudgeConfig")
            .field("provider", &self.provider)
            .field("settings", &settings)
            .finish()
    }
}

/// Session-scoped configuration.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct SessionConfig {
    /// Judge used when a check names none. When unset, the first judge by
    /// name becomes the default.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub default_judge: Option<String>,

    /// Judges to register, by name
    pub judges: BTreeMap<String, JudgeConfig>,

    /// Session layer of the option merge
    pub evaluation: EvaluationOverrides,

    /// Where captured artifacts are written
    pub artifacts_dir: PathBuf,
}

impl Default for SessionConfig {
    fn default() -> Self {
        let mut judges = BTreeMap::new();
        judges.insert("anthropic".to_string(), JudgeConfig::new("anthropic"));
        judges.insert("openai".to_string(), JudgeConfig::new("openai"));

        Self {
            default_judge: None,
            judges,
            evaluation: EvaluationOverrides::default(),
            artifacts_dir: PathBuf::from(DEFAULT_ARTIFACTS_DIR),
        }
    }
}

impl SessionConfig {
    pub fn from_yaml(yaml: &str) -> Result<Self, ConfigError> {
        Ok(serde_yaml::from_str(yaml)?)
    }

    pub fn from_json(json: &str) -> Result<Self, ConfigError> {
        Ok(serde_json::from_str(json)?)
    }

    /// Load from a file; `.json` files are read as JSON, anything else as YAML.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;

        let is_json = path
            .extension()
            .and_then(|e| e.to_str())
            .is_some_and(|e| e.eq_ignore_ascii_case("json"));

        if is_json {
            Self::from_json(&content)
        } else {
            Self::from_yaml(&content)
        }
    }

    /// Merge overrides into the session evaluation layer. Later calls win
    /// field by field.
    pub fn configure(&mut self, overrides: &EvaluationOverrides) {
        self.evaluation = self.evaluation.merged(overrides);
    }

    pub fn with_judge(mut self, name: impl Into<String>, judge: JudgeConfig) -> Self {
        self.judges.insert(name.into(), judge);
        self
    }
}
