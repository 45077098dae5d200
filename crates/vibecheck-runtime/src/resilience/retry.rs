//! Retry with exponential backoff around a judge.
//!
//! Per call: attempt `n` asks the judge; a reply is normalized and returned
//! whatever its outcome. A retryable judge error sleeps
//! `backoff_base * 2^(n-1)` and tries again until `max_retries` total
//! attempts have been made. A server `retry-after` can stretch a wait, and
//! no single wait exceeds `max_backoff`. Non-retryable errors end the call
//! at once.
//! Malformed replies are already folded into failing verdicts by the
//! normalizer and are never retried.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;

use vibecheck_core::{normalize, EvaluationOptions, Verdict};

use crate::files;
use crate::providers::{Judge, JudgeError};

/// One artifact to evaluate against one specification.
#[derive(Debug, Clone)]
pub struct EvaluationRequest {
    /// Previously captured image; must exist when the call starts
    pub artifact_path: PathBuf,

    /// Natural-language description of the expected visual state
    pub specification: String,

    /// Resolved options
    pub options: EvaluationOptions,
}

/// Terminal failures from the resilient evaluator.
#[derive(Error, Debug)]
pub enum EvaluationError {
    #[error("Artifact not found: {}", path.display())]
    ArtifactMissing { path: PathBuf },

    #[error("Failed to read artifact {}: {source}", path.display())]
    ArtifactUnreadable {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Judge '{judge}' has no usable credential: {source}")]
    Auth {
        judge: String,
        #[source]
        source: JudgeError,
    },

    #[error("Judge '{judge}' rejected the request: {source}")]
    Rejected {
        judge: String,
        #[source]
        source: JudgeError,
    },

    #[error("Judge '{judge}' failed after {attempts} attempt(s): {source}")]
    Exhausted {
        judge: String,
        attempts: u32,
        #[source]
        source: JudgeError,
    },
}

impl EvaluationError {
    /// Whether the failure was a missing or invalid credential.
    pub fn is_auth(&self) -> bool {
        matches!(self, EvaluationError::Auth { .. })
    }
}

/// Uncapped delay before the attempt after attempt `attempt` (1-based).
/// Saturates at `Duration::MAX`.
pub fn backoff_delay(base: Duration, attempt: u32) -> Duration {
    if base.is_zero() {
        return Duration::ZERO;
    }
    1u32.checked_shl(attempt.saturating_sub(1))
        .map_or(Duration::MAX, |factor| base.saturating_mul(factor))
}

/// Wait before the next attempt: the backoff, stretched to the server's
/// `retry-after` when longer, never above `options.max_backoff`.
pub fn retry_delay(
    options: &EvaluationOptions,
    attempt: u32,
    retry_after: Option<Duration>,
) -> Duration {
    let backoff = backoff_delay(options.backoff_base, attempt);
    retry_after
        .map_or(backoff, |ra| ra.max(backoff))
        .min(options.max_backoff)
}

/// A judge plus the retry policy that turns its failures into one result.
pub struct ResilientEvaluator {
    judge: Arc<dyn Judge>,
}

impl ResilientEvaluator {
    pub fn new(judge: Arc<dyn Judge>) -> Self {
        Self { judge }
    }

    pub fn judge_name(&self) -> &str {
        self.judge.name()
    }

    /// Backend defaults of the wrapped judge.
    pub fn default_options(&self) -> EvaluationOptions {
        self.judge.default_options()
    }

    pub async fn health_check(&self) -> bool {
        self.judge.health_check().await
    }

    /// Evaluate with retries. `options.max_retries` counts total attempts.
    pub async fn evaluate_with_retry(
        &self,
        request: &EvaluationRequest,
    ) -> Result<Verdict, EvaluationError> {
        let path = &request.artifact_path;
        if !files::exists(path).await {
            return Err(EvaluationError::ArtifactMissing { path: path.clone() });
        }

        let image = files::load_image(path)
            .await
            .map_err(|source| EvaluationError::ArtifactUnreadable {
                path: path.clone(),
                source,
            })?;

        let options = &request.options;
        let max_attempts = options.max_retries.max(1);
        let judge = self.judge.name();

        let mut attempt = 1;
        loop {
            match self
                .judge
                .evaluate(&image, &request.specification, options)
                .await
            {
                Ok(reply) => {
                    let verdict = normalize(&reply.text, options.include_raw_reply);
                    tracing::debug!(
                        judge,
                        attempt,
                        model = %reply.model,
                        outcome = %verdict.outcome(),
                        confidence = verdict.confidence(),
                        "Judge evaluation complete"
                    );
                    return Ok(verdict);
                }
                Err(source @ JudgeError::Auth(_)) => {
                    tracing::warn!(judge, error = %source, "Judge credential rejected");
                    return Err(EvaluationError::Auth {
                        judge: judge.to_string(),
                        source,
                    });
                }
                Err(source) if !source.is_retryable() => {
                    tracing::warn!(judge, attempt, error = %source, "Judge rejected request");
                    return Err(EvaluationError::Rejected {
                        judge: judge.to_string(),
                        source,
                    });
                }
                Err(source) if attempt >= max_attempts => {
                    tracing::warn!(
                        judge,
                        attempts = attempt,
                        error = %source,
                        "Judge failed, retries exhausted"
                    );
                    return Err(EvaluationError::Exhausted {
                        judge: judge.to_string(),
                        attempts: attempt,
                        source,
                    });
                }
                Err(source) => {
                    let delay = retry_delay(options, attempt, source.retry_after());
                    tracing::warn!(
                        judge,
                        attempt,
                        max_attempts,
                        delay = ?delay,
                        error = %source,
                        "Judge call failed, retrying"
                    );
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
            }
        }
    }
}

impl std::fmt::Debug for ResilientEvaluator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ResilientEvaluator")
            .field("judge", &self.judge.name())
            .finish()
    }
}
