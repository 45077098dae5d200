//! Normalized judge output.

use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use std::fmt;
use thiserror::Error;

/// Errors from constructing a verdict.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum VerdictError {
    #[error("confidence {0} is outside [0, 1]")]
    ConfidenceOutOfRange(f64),
}

/// Pass/fail signal from a judge.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Outcome {
    Pass,
    Fail,
}

impl Outcome {
    /// Map the judge's `verdict` field. Only "yes" passes.
    pub fn from_verdict_field(value: Option<&str>) -> Self {
        match value {
            Some(v) if v.trim().eq_ignore_ascii_case("yes") => Outcome::Pass,
            _ => Outcome::Fail,
        }
    }

    pub fn is_pass(self) -> bool {
        matches!(self, Outcome::Pass)
    }
}

impl fmt::Display for Outcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Outcome::Pass => write!(f, "PASS"),
            Outcome::Fail => write!(f, "FAIL"),
        }
    }
}

/// A typed judgement of one artifact against one specification.
///
/// Fields are private: a verdict is immutable once produced. Builder
/// methods consume `self` and are only used while normalizing.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Verdict {
    outcome: Outcome,
    confidence: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    reasoning: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    fail_reason: Option<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    suggestions: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    raw_reply: Option<JsonValue>,
}

impl Verdict {
    /// Create a verdict, rejecting confidences outside `[0, 1]`.
    pub fn new(outcome: Outcome, confidence: f64) -> Result<Self, VerdictError> {
        if !(0.0..=1.0).contains(&confidence) {
            return Err(VerdictError::ConfidenceOutOfRange(confidence));
        }
        Ok(Self {
            outcome,
            confidence,
            reasoning: None,
            fail_reason: None,
            suggestions: Vec::new(),
            raw_reply: None,
        })
    }

    /// A failing verdict with zero confidence, used when a reply cannot be read.
    pub fn degraded(reasoning: impl Into<String>) -> Self {
        Self {
            outcome: Outcome::Fail,
            confidence: 0.0,
            reasoning: Some(reasoning.into()),
            fail_reason: None,
            suggestions: Vec::new(),
            raw_reply: None,
        }
    }

    pub fn with_reasoning(mut self, reasoning: impl Into<String>) -> Self {
        self.reasoning = Some(reasoning.into());
        self
    }

    pub fn with_fail_reason(mut self, fail_reason: impl Into<String>) -> Self {
        self.fail_reason = Some(fail_reason.into());
        self
    }

    pub fn with_suggestions(mut self, suggestions: Vec<String>) -> Self {
        self.suggestions = suggestions;
        self
    }

    pub fn with_raw_reply(mut self, raw: JsonValue) -> Self {
        self.raw_reply = Some(raw);
        self
    }

    pub fn outcome(&self) -> Outcome {
        self.outcome
    }

    pub fn confidence(&self) -> f64 {
        self.confidence
    }

    pub fn reasoning(&self) -> Option<&str> {
        self.reasoning.as_deref()
    }

    pub fn fail_reason(&self) -> Option<&str> {
        self.fail_reason.as_deref()
    }

    pub fn suggestions(&self) -> &[String] {
        &self.suggestions
    }

    pub fn raw_reply(&self) -> Option<&JsonValue> {
        self.raw_reply.as_ref()
    }
}
