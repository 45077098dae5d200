//! Judge API credentials.
//!
//! Each backend declares a [`CredentialSpec`]: a label for messages, the
//! settings key and the environment variable it reads. Settings win over
//! the environment. Blank values count as missing. A missing credential is
//! logged when the judge is built and only becomes [`JudgeError::Auth`]
//! when the judge is asked to evaluate.

use secrecy::{ExposeSecret, SecretString};
use serde_json::Value as JsonValue;
use std::fmt;

use super::JudgeError;

/// Where a backend looks for its API key.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CredentialSpec {
    /// Human-readable name, e.g. "Anthropic API key"
    pub label: &'static str,

    /// Key inside judge settings
    pub settings_key: &'static str,

    /// Fallback environment variable
    pub env_var: &'static str,
}

impl CredentialSpec {
    /// A spec reading `api_key` from settings, then `env_var`.
    pub const fn new(label: &'static str, env_var: &'static str) -> Self {
        Self {
            label,
            settings_key: "api_key",
            env_var,
        }
    }

    /// The error returned when a call is attempted without a credential.
    pub fn missing(&self) -> JudgeError {
        JudgeError::Auth(format!(
            "{} required: set '{}' in judge settings or the {} environment variable",
            self.label, self.settings_key, self.env_var
        ))
    }

    fn settings_value<'a>(&self, settings: &'a JsonValue) -> Option<&'a str> {
        settings[self.settings_key]
            .as_str()
            .filter(|v| !v.trim().is_empty())
    }

    fn env_value(&self) -> Option<String> {
        std::env::var(self.env_var)
            .ok()
            .filter(|v| !v.trim().is_empty())
    }
}

/// Where a credential came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CredentialSource {
    Settings,
    Environment,
    Explicit,
}

impl CredentialSource {
    pub fn as_str(self) -> &'static str {
        match self {
            CredentialSource::Settings => "judge settings",
            CredentialSource::Environment => "environment",
            CredentialSource::Explicit => "explicit",
        }
    }
}

impl fmt::Display for CredentialSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// An API key held as a [`SecretString`]. Neither `Debug` nor `Display`
/// prints the value.
pub struct ApiCredential {
    secret: SecretString,
    source: CredentialSource,
    label: &'static str,
}

impl ApiCredential {
    /// Wrap a key passed in code. Blank keys give `None`.
    pub fn explicit(value: impl Into<String>, spec: &CredentialSpec) -> Option<Self> {
        let value = value.into();
        if value.trim().is_empty() {
            return None;
        }
        Some(Self::wrap(value, CredentialSource::Explicit, spec))
    }

    /// Find the credential for `spec`, logging a warning when there is none.
    pub fn resolve(settings: &JsonValue, spec: &CredentialSpec) -> Option<Self> {
        let found = spec
            .settings_value(settings)
            .map(|v| Self::wrap(v.to_string(), CredentialSource::Settings, spec))
            .or_else(|| {
                spec.env_value()
                    .map(|v| Self::wrap(v, CredentialSource::Environment, spec))
            });

        match &found {
            Some(credential) => {
                tracing::debug!(credential = spec.label, source = %credential.source, "Credential resolved");
            }
            None => {
                tracing::warn!(
                    credential = spec.label,
                    env_var = spec.env_var,
                    "Credential not found; judge calls will fail until it is set"
                );
            }
        }
        found
    }

    fn wrap(value: String, source: CredentialSource, spec: &CredentialSpec) -> Self {
        Self {
            secret: SecretString::from(value),
            source,
            label: spec.label,
        }
    }

    /// The raw key, for an outgoing request header only.
    pub fn expose(&self) -> &str {
        self.secret.expose_secret()
    }

    pub fn source(&self) -> CredentialSource {
        self.source
    }
}

impl fmt::Debug for ApiCredential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ApiCredential")
            .field("label", &self.label)
            .field("source", &self.source)
            .field("secret", &format_args!("<redacted>"))
            .finish()
    }
}

impl fmt::Display for ApiCredential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.label, self.source)
    }
}
