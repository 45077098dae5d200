//! Judge factories: build adapters from JSON settings by provider name.
//!
//! Session config names judges and says which provider builds each one.
//! The factory registry turns `(provider, settings)` into a live judge.
//!
//! ```ignore
//! let factories = JudgeFactoryRegistry::with_defaults();
//! let judge = factories.build("anthropic", &json!({"model": "claude-sonnet-4-5"}))?;
//! ```

use std::collections::BTreeMap;
use std::sync::Arc;

use serde_json::Value as JsonValue;

use super::{Judge, JudgeError};

/// Builds judges for one provider.
pub trait JudgeFactory: Send + Sync {
    /// Provider name used in session config, e.g. "anthropic".
    fn provider(&self) -> &'static str;

    fn build(&self, settings: &JsonValue) -> Result<Arc<dyn Judge>, JudgeError>;

    /// Check settings without building a client.
    fn validate(&self, settings: &JsonValue) -> Result<(), JudgeError>;

    /// Settings a fresh config would start from.
    fn default_settings(&self) -> JsonValue {
        JsonValue::Object(Default::default())
    }
}

/// Factories by provider name.
#[derive(Default)]
pub struct JudgeFactoryRegistry {
    factories: BTreeMap<&'static str, Arc<dyn JudgeFactory>>,
}

impl JudgeFactoryRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every provider compiled into this build.
    pub fn with_defaults() -> Self {
        #[allow(unused_mut)]
        let mut factories = Self::new();
        #[cfg(feature = "anthropic")]
        factories.register(Arc::new(super::AnthropicJudgeFactory));
        #[cfg(feature = "openai")]
        factories.register(Arc::new(super::OpenAiJudgeFactory));
        factories
    }

    /// Add a factory. A later factory for the same provider replaces the earlier one.
    pub fn register(&mut self, factory: Arc<dyn JudgeFactory>) {
        self.factories.insert(factory.provider(), factory);
    }

    pub fn build(&self, provider: &str, settings: &JsonValue) -> Result<Arc<dyn Judge>, JudgeError> {
        self.lookup(provider)?.build(settings)
    }

    pub fn validate(&self, provider: &str, settings: &JsonValue) -> Result<(), JudgeError> {
        self.lookup(provider)?.validate(settings)
    }

    pub fn providers(&self) -> Vec<&'static str> {
        self.factories.keys().copied().collect()
    }

    pub fn supports(&self, provider: &str) -> bool {
        self.factories.contains_key(provider)
    }

    pub fn default_settings(&self, provider: &str) -> Option<JsonValue> {
        self.factories.get(provider).map(|f| f.default_settings())
    }

    fn lookup(&self, provider: &str) -> Result<&Arc<dyn JudgeFactory>, JudgeError> {
        self.factories.get(provider).ok_or_else(|| {
            JudgeError::NotConfigured(format!(
                "no judge provider '{}' (compiled in: {})",
                provider,
                self.providers().join(", ")
            ))
        })
    }
}

impl std::fmt::Debug for JudgeFactoryRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_list().entries(self.factories.keys()).finish()
    }
}
