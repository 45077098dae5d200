//! Named judges and the default-judge pointer.
//!
//! Built once per session and shared read-only across checks. The only
//! mutation after setup is [`JudgeRegistry::set_default`], which callers
//! must not race with in-flight checks.

use parking_lot::RwLock;
use std::collections::BTreeMap;
use std::sync::Arc;
use thiserror::Error;

use crate::config::SessionConfig;
use crate::providers::{JudgeError, JudgeFactoryRegistry};
use crate::resilience::ResilientEvaluator;

/// A judge name that could not be resolved.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum UnknownJudgeError {
    #[error("Unknown judge '{name}'. Available: {available:?}")]
    Named {
        name: String,
        available: Vec<String>,
    },

    #[error("No default judge registered")]
    NoDefault,
}

/// Errors from building a registry out of session configuration.
#[derive(Error, Debug)]
pub enum RegistryError {
    #[error("Failed to build judge '{name}': {source}")]
    Judge {
        name: String,
        #[source]
        source: JudgeError,
    },

    #[error(transparent)]
    UnknownJudge(#[from] UnknownJudgeError),
}

/// A registered evaluator.
#[derive(Debug, Clone)]
pub struct JudgeRegistration {
    /// Registry key; may differ from the provider's own name
    pub name: String,
    pub evaluator: Arc<ResilientEvaluator>,
}

/// Name → evaluator map with a default pointer.
#[derive(Debug, Default)]
pub struct JudgeRegistry {
    judges: BTreeMap<String, JudgeRegistration>,
    default: RwLock<Option<String>>,
}

impl JudgeRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build every judge named in `session` through `factories`.
    ///
    /// `session.default_judge`, when set, must name one of the judges.
    pub fn from_config(
        session: &SessionConfig,
        factories: &JudgeFactoryRegistry,
    ) -> Result<Self, RegistryError> {
        let mut registry = Self::new();

        for (name, judge) in &session.judges {
            let backend = factories
                .build(&judge.provider, &judge.settings)
                .map_err(|source| RegistryError::Judge {
                    name: name.clone(),
                    source,
                })?;
            registry.register(name.clone(), ResilientEvaluator::new(backend), false);
        }

        if let Some(name) = &session.default_judge {
            registry.set_default(name)?;
        }

        tracing::debug!(
            judges = ?registry.names(),
            default = ?registry.default_name(),
            "Judge registry built"
        );

        Ok(registry)
    }

    /// Register `evaluator` under `name`, replacing any previous entry.
    ///
    /// The first registration becomes the default even when `is_default`
    /// is false.
    pub fn register(
        &mut self,
        name: impl Into<String>,
        evaluator: ResilientEvaluator,
        is_default: bool,
    ) {
        let name = name.into();
        let default = self.default.get_mut();
        if is_default || default.is_none() {
            *default = Some(name.clone());
        }

        self.judges.insert(
            name.clone(),
            JudgeRegistration {
                name,
                evaluator: Arc::new(evaluator),
            },
        );
    }

    /// Point the default at an already-registered judge.
    pub fn set_default(&self, name: &str) -> Result<(), UnknownJudgeError> {
        if !self.judges.contains_key(name) {
            return Err(self.unknown(name));
        }
        *self.default.write() = Some(name.to_string());
        Ok(())
    }

    /// Look up a judge by name, or the default when `name` is `None`.
    pub fn resolve(&self, name: Option<&str>) -> Result<JudgeRegistration, UnknownJudgeError> {
        let name = match name {
            Some(name) => name.to_string(),
            None => self
                .default
                .read()
                .clone()
                .ok_or(UnknownJudgeError::NoDefault)?,
        };

        self.judges
            .get(&name)
            .cloned()
            .ok_or_else(|| self.unknown(&name))
    }

    pub fn names(&self) -> Vec<&str> {
        self.judges.keys().map(|s| s.as_str()).collect()
    }

    pub fn default_name(&self) -> Option<String> {
        self.default.read().clone()
    }

    pub fn is_default(&self, name: &str) -> bool {
        self.default.read().as_deref() == Some(name)
    }

    pub fn registrations(&self) -> impl Iterator<Item = &JudgeRegistration> {
        self.judges.values()
    }

    pub fn is_empty(&self) -> bool {
        self.judges.is_empty()
    }

    fn unknown(&self, name: &str) -> UnknownJudgeError {
        UnknownJudgeError::Named {
            name: name.to_string(),
            available: self.judges.keys().cloned().collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::JudgeConfig;
    use crate::providers::{ImageData, Judge, JudgeFactory, JudgeReply};
    use async_trait::async_trait;
    use serde_json::Value as JsonValue;
    use vibecheck_core::EvaluationOptions;

    struct NamedJudge(&'static str);

    #[async_trait]
    impl Judge for NamedJudge {
        async fn evaluate(
            &self,
            _image: &ImageData,
            _specification: &str,
            _options: &EvaluationOptions,
        ) -> Result<JudgeReply, JudgeError> {
            Err(JudgeError::NotConfigured("test judge".to_string()))
        }

        async fn health_check(&self) -> bool {
            true
        }

        fn name(&self) -> &str {
            self.0
        }
    }

    struct TestFactory;

    impl JudgeFactory for TestFactory {
        fn provider(&self) -> &'static str {
            "test"
        }

        fn build(&self, settings: &JsonValue) -> Result<Arc<dyn Judge>, JudgeError> {
            if settings["broken"].as_bool() == Some(true) {
                return Err(JudgeError::NotConfigured("broken".to_string()));
            }
            Ok(Arc::new(NamedJudge("test")))
        }

        fn validate(&self, _settings: &JsonValue) -> Result<(), JudgeError> {
            Ok(())
        }
    }

    fn evaluator(name: &'static str) -> ResilientEvaluator {
        ResilientEvaluator::new(Arc::new(NamedJudge(name)))
    }

    fn factories() -> JudgeFactoryRegistry {
        let mut factories = JudgeFactoryRegistry::new();
        factories.register(Arc::new(TestFactory));
        factories
    }

    fn session(judges: &[&str]) -> SessionConfig {
        SessionConfig {
            judges: judges
                .iter()
                .map(|n| (n.to_string(), JudgeConfig::new("test")))
                .collect(),
            ..Default::default()
        }
    }

    #[test]
    fn test_first_registration_becomes_default() {
        let mut registry = JudgeRegistry::new();
        registry.register("anthropic", evaluator("anthropic"), false);
        registry.register("openai", evaluator("openai"), false);

        assert_eq!(registry.default_name().as_deref(), Some("anthropic"));
        assert_eq!(registry.resolve(None).unwrap().name, "anthropic");
        assert_eq!(registry.resolve(Some("openai")).unwrap().name, "openai");
    }

    #[test]
    fn test_explicit_default_wins() {
        let mut registry = JudgeRegistry::new();
        registry.register("anthropic", evaluator("anthropic"), false);
        registry.register("openai", evaluator("openai"), true);

        assert!(registry.is_default("openai"));
        assert_eq!(registry.resolve(None).unwrap().name, "openai");
    }

    #[test]
    fn test_reregistration_replaces() {
        let mut registry = JudgeRegistry::new();
        registry.register("main", evaluator("first"), false);
        registry.register("main", evaluator("second"), false);

        assert_eq!(registry.names(), vec!["main"]);
        let main = registry.resolve(Some("main")).unwrap();
        assert_eq!(main.name, "main");
        assert_eq!(main.evaluator.judge_name(), "second");
    }

    #[test]
    fn test_set_default() {
        let mut registry = JudgeRegistry::new();
        registry.register("a", evaluator("a"), false);
        registry.register("b", evaluator("b"), false);

        registry.set_default("b").unwrap();
        assert_eq!(registry.resolve(None).unwrap().name, "b");

        let err = registry.set_default("c").unwrap_err();
        assert_eq!(
            err,
            UnknownJudgeError::Named {
                name: "c".to_string(),
                available: vec!["a".to_string(), "b".to_string()],
            }
        );
        assert!(registry.is_default("b"));
    }

    #[test]
    fn test_unknown_name_lists_available() {
        let mut registry = JudgeRegistry::new();
        registry.register("anthropic", evaluator("anthropic"), false);

        let err = registry.resolve(Some("gemini")).unwrap_err();
        assert!(err.to_string().contains("gemini"));
        assert!(err.to_string().contains("anthropic"));
    }

    #[test]
    fn test_empty_registry_has_no_default() {
        let registry = JudgeRegistry::new();
        assert!(registry.is_empty());
        assert_eq!(registry.resolve(None).unwrap_err(), UnknownJudgeError::NoDefault);
    }

    #[test]
    fn test_from_config() {
        let registry = JudgeRegistry::from_config(&session(&["beta", "alpha"]), &factories()).unwrap();
        assert_eq!(registry.names(), vec!["alpha", "beta"]);
        assert_eq!(registry.default_name().as_deref(), Some("alpha"));

        let mut config = session(&["alpha", "beta"]);
        config.default_judge = Some("beta".to_string());
        let registry = JudgeRegistry::from_config(&config, &factories()).unwrap();
        assert_eq!(registry.default_name().as_deref(), Some("beta"));

        // Keys come from config, not from the provider's judge name
        let beta = registry.resolve(None).unwrap();
        assert_eq!(beta.name, "beta");
        assert_eq!(beta.evaluator.judge_name(), "test");
    }

    #[test]
    fn test_from_config_unknown_default_fails() {
        let mut config = session(&["alpha"]);
        config.default_judge = Some("missing".to_string());

        let result = JudgeRegistry::from_config(&config, &factories());
        assert!(matches!(
            result,
            Err(RegistryError::UnknownJudge(UnknownJudgeError::Named { .. }))
        ));
    }

    #[test]
    fn test_from_config_unknown_provider_fails() {
        let config = session(&[]).with_judge("x", JudgeConfig::new("nope"));
        let result = JudgeRegistry::from_config(&config, &factories());
        assert!(matches!(result, Err(RegistryError::Judge { .. })));

        let config = session(&[]).with_judge(
            "broken",
            JudgeConfig::new("test").with_settings(serde_json::json!({"broken": true})),
        );
        assert!(JudgeRegistry::from_config(&config, &factories()).is_err());
    }
}
