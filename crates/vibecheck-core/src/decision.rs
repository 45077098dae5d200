//! Decision engine: verdict + threshold -> pass/fail.
//!
//! The policy is fixed. A check fails when the judge said no OR when its
//! confidence is below the threshold; either condition alone fails.

use std::fmt::Write as _;
use std::path::{Path, PathBuf};
use thiserror::Error;

use crate::verdict::{Outcome, Verdict};

/// Result of applying the decision policy.
#[derive(Debug, Clone, PartialEq)]
pub struct Decision {
    /// Whether the check passed
    pub pass: bool,

    /// Multi-line explanation, present only on failure
    pub message: Option<String>,
}

/// The check ran correctly and the UI did not meet its specification.
#[derive(Error, Debug, Clone)]
#[error("{message}")]
pub struct CheckFailure {
    /// Human-readable explanation from the decision engine
    pub message: String,

    /// The verdict that failed
    pub verdict: Verdict,

    /// Where the artifact was written
    pub artifact_path: PathBuf,
}

/// Applies the confidence-threshold policy to verdicts.
#[derive(Debug, Default, Clone, Copy)]
pub struct DecisionEngine;

impl DecisionEngine {
    pub fn new() -> Self {
        Self
    }

    /// Whether `verdict` passes at `threshold`.
    pub fn passes(&self, verdict: &Verdict, threshold: f64) -> bool {
        verdict.outcome() == Outcome::Pass && verdict.confidence() >= threshold
    }

    /// Decide a verdict, building the failure message when it fails.
    ///
    /// `specification` and `artifact_path` only feed the message.
    pub fn decide(
        &self,
        verdict: &Verdict,
        threshold: f64,
        specification: &str,
        artifact_path: &Path,
    ) -> Decision {
        if self.passes(verdict, threshold) {
            return Decision {
                pass: true,
                message: None,
            };
        }

        Decision {
            pass: false,
            message: Some(failure_message(
                verdict,
                threshold,
                specification,
                artifact_path,
            )),
        }
    }

    /// Decide and convert a failing decision into a [`CheckFailure`].
    pub fn enforce(
        &self,
        verdict: Verdict,
        threshold: f64,
        specification: &str,
        artifact_path: &Path,
    ) -> Result<Verdict, CheckFailure> {
        let decision = self.decide(&verdict, threshold, specification, artifact_path);
        match decision.message {
            None => Ok(verdict),
            Some(message) => Err(CheckFailure {
                message,
                verdict,
                artifact_path: artifact_path.to_path_buf(),
            }),
        }
    }
}

fn failure_message(
    verdict: &Verdict,
    threshold: f64,
    specification: &str,
    artifact_path: &Path,
) -> String {
    let mut message = String::new();

    // Writing into a String cannot fail
    let _ = writeln!(message, "Visual check failed.");
    let _ = writeln!(message);
    let _ = writeln!(message, "Specification: {}", specification);
    let _ = writeln!(message, "Verdict: {}", verdict.outcome());
    let _ = writeln!(
        message,
        "Confidence: {:.1}% (threshold: {:.1}%)",
        verdict.confidence() * 100.0,
        threshold * 100.0
    );

    if verdict.confidence() < threshold {
        let _ = writeln!(message, "Confidence is below the required threshold.");
    }
    if let Some(reasoning) = verdict.reasoning() {
        let _ = writeln!(message);
        let _ = writeln!(message, "Reasoning: {}", reasoning);
    }
    if let Some(fail_reason) = verdict.fail_reason() {
        let _ = writeln!(message);
        let _ = writeln!(message, "Fail reason: {}", fail_reason);
    }
    if !verdict.suggestions().is_empty() {
        let _ = writeln!(message);
        let _ = writeln!(message, "Suggestions:");
        for suggestion in verdict.suggestions() {
            let _ = writeln!(message, "  - {}", suggestion);
        }
    }

    let _ = writeln!(message);
    let _ = write!(message, "Artifact: {}", artifact_path.display());
    message
}
