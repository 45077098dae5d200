//! Evaluation options and their layered overrides.
//!
//! Options are resolved from three layers in increasing precedence:
//! backend defaults < session configuration < per-call options.
//! Each layer is an [`EvaluationOverrides`]; merging always produces a new
//! value and never mutates a layer in place.

use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use std::collections::BTreeMap;
use std::time::Duration;
use thiserror::Error;

/// Default minimum confidence for a passing check.
pub const DEFAULT_CONFIDENCE_THRESHOLD: f64 = 0.8;

/// Default total number of attempts against a judge.
pub const DEFAULT_MAX_RETRIES: u32 = 3;

/// Default base unit for exponential backoff.
pub const DEFAULT_BACKOFF_BASE: Duration = Duration::from_secs(1);

/// Default ceiling on any single wait between attempts.
pub const DEFAULT_MAX_BACKOFF: Duration = Duration::from_secs(30);

/// Errors from validating resolved options.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum OptionsError {
    #[error("confidence_threshold must be within [0, 1], got {0}")]
    InvalidThreshold(f64),

    #[error("max_retries must be at least 1")]
    ZeroRetries,
}

/// Fully resolved options for one evaluation.
#[derive(Debug, Clone, PartialEq)]
pub struct EvaluationOptions {
    /// Minimum confidence for a pass
    pub confidence_threshold: f64,

    /// Total attempts against the judge, including the first
    pub max_retries: u32,

    /// Attach the judge's raw reply to the verdict
    pub include_raw_reply: bool,

    /// Backend-specific request overrides (model, max_tokens, temperature, ...)
    pub model_parameters: BTreeMap<String, JsonValue>,

    /// Judge to use; registry default when absent
    pub judge_name: Option<String>,

    /// Base delay for exponential backoff between attempts
    pub backoff_base: Duration,

    /// Longest single wait between attempts, server `retry-after` included
    pub max_backoff: Duration,
}

impl Default for EvaluationOptions {
    fn default() -> Self {
        Self {
            confidence_threshold: DEFAULT_CONFIDENCE_THRESHOLD,
            max_retries: DEFAULT_MAX_RETRIES,
            include_raw_reply: false,
            model_parameters: BTreeMap::new(),
            judge_name: None,
            backoff_base: DEFAULT_BACKOFF_BASE,
            max_backoff: DEFAULT_MAX_BACKOFF,
        }
    }
}

impl EvaluationOptions {
    /// Apply one override layer on top of these options.
    pub fn with_overrides(&self, overrides: &EvaluationOverrides) -> Self {
        let mut model_parameters = self.model_parameters.clone();
        for (key, value) in &overrides.model_parameters {
            model_parameters.insert(key.clone(), value.clone());
        }

        Self {
            confidence_threshold: overrides
                .confidence_threshold
                .unwrap_or(self.confidence_threshold),
            max_retries: overrides.max_retries.unwrap_or(self.max_retries),
            include_raw_reply: overrides.include_raw_reply.unwrap_or(self.include_raw_reply),
            model_parameters,
            judge_name: overrides
                .judge_name
                .clone()
                .or_else(|| self.judge_name.clone()),
            backoff_base: overrides.backoff_base.unwrap_or(self.backoff_base),
            max_backoff: overrides.max_backoff.unwrap_or(self.max_backoff),
        }
    }

    /// Resolve options from backend defaults, session layer and per-call layer.
    pub fn resolve(
        backend: &EvaluationOptions,
        session: &EvaluationOverrides,
        call: &EvaluationOverrides,
    ) -> Self {
        backend.with_overrides(session).with_overrides(call)
    }

    /// Check the invariants the evaluator and decision engine rely on.
    pub fn validate(&self) -> Result<(), OptionsError> {
        if !(0.0..=1.0).contains(&self.confidence_threshold) {
            return Err(OptionsError::InvalidThreshold(self.confidence_threshold));
        }
        if self.max_retries == 0 {
            return Err(OptionsError::ZeroRetries);
        }
        Ok(())
    }
}

/// A partial layer of evaluation options.
///
/// Absent fields defer to the layer below. `model_parameters` merge key by key.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EvaluationOverrides {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub confidence_threshold: Option<f64>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_retries: Option<u32>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub include_raw_reply: Option<bool>,

    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub model_parameters: BTreeMap<String, JsonValue>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub judge_name: Option<String>,

    #[serde(with = "humantime_opt", skip_serializing_if = "Option::is_none")]
    pub backoff_base: Option<Duration>,

    #[serde(with = "humantime_opt", skip_serializing_if = "Option::is_none")]
    pub max_backoff: Option<Duration>,
}

impl EvaluationOverrides {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn confidence_threshold(mut self, threshold: f64) -> Self {
        self.confidence_threshold = Some(threshold);
        self
    }

    pub fn max_retries(mut self, attempts: u32) -> Self {
        self.max_retries = Some(attempts);
        self
    }

    pub fn include_raw_reply(mut self, include: bool) -> Self {
        self.include_raw_reply = Some(include);
        self
    }

    pub fn model_parameter(mut self, key: impl Into<String>, value: JsonValue) -> Self {
        self.model_parameters.insert(key.into(), value);
        self
    }

    pub fn judge(mut self, name: impl Into<String>) -> Self {
        self.judge_name = Some(name.into());
        self
    }

    pub fn backoff_base(mut self, base: Duration) -> Self {
        self.backoff_base = Some(base);
        self
    }

    pub fn max_backoff(mut self, ceiling: Duration) -> Self {
        self.max_backoff = Some(ceiling);
        self
    }

    /// Combine two layers; fields set in `later` win.
    pub fn merged(&self, later: &EvaluationOverrides) -> Self {
        let mut model_parameters = self.model_parameters.clone();
        for (key, value) in &later.model_parameters {
            model_parameters.insert(key.clone(), value.clone());
        }

        Self {
            confidence_threshold: later.confidence_threshold.or(self.confidence_threshold),
            max_retries: later.max_retries.or(self.max_retries),
            include_raw_reply: later.include_raw_reply.or(self.include_raw_reply),
            model_parameters,
            judge_name: later.judge_name.clone().or_else(|| self.judge_name.clone()),
            backoff_base: later.backoff_base.or(self.backoff_base),
            max_backoff: later.max_backoff.or(self.max_backoff),
        }
    }
}

mod humantime_opt {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(value: &Option<Duration>, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        match value {
            Some(duration) => {
                serializer.serialize_str(&humantime::format_duration(*duration).to_string())
            }
            None => serializer.serialize_none(),
        }
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Option<Duration>, D::Error>
    where
        D: Deserializer<'de>,
    {
        let raw: Option<String> = Option::deserialize(deserializer)?;
        raw.map(|s| humantime::parse_duration(&s).map_err(serde::de::Error::custom))
            .transpose()
    }
}
