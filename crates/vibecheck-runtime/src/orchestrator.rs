//! Check orchestrator: capture, evaluate, decide.
//!
//! The orchestrator owns the session-wide pieces (judge registry, capture
//! collaborator, session configuration). Each test opens a [`CheckScope`],
//! which holds its own copy of the session so `configure` calls stay local
//! to that test.
//!
//! # Execution Flow
//! 1. Name the artifact from the test title, optional name and timestamp
//! 2. Ensure the artifact directory exists and claim an unused file in it
//! 3. Capture the target into the artifact path
//! 4. Merge options: backend defaults < session < per-call
//! 5. Resolve the judge
//! 6. Evaluate with retries
//! 7. Apply the decision policy; fail with a [`CheckFailure`] or return the verdict

use std::path::PathBuf;
use std::sync::Arc;
use thiserror::Error;

use vibecheck_core::{
    artifact, CheckFailure, DecisionEngine, EvaluationOptions, EvaluationOverrides,
    OptionsError, Verdict,
};

use crate::capture::{Capture, CaptureError};
use crate::config::SessionConfig;
use crate::files;
use crate::providers::JudgeFactoryRegistry;
use crate::registry::{JudgeRegistry, RegistryError, UnknownJudgeError};
use crate::resilience::{EvaluationError, EvaluationRequest};

/// Errors from a check.
///
/// Only [`CheckError::Failed`] means the UI did not meet its specification;
/// every other variant is an infrastructure problem.
#[derive(Error, Debug)]
pub enum CheckError {
    #[error(transparent)]
    Failed(#[from] CheckFailure),

    #[error("Artifact capture failed: {0}")]
    Capture(#[from] CaptureError),

    #[error("Failed to prepare artifact file in {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error(transparent)]
    UnknownJudge(#[from] UnknownJudgeError),

    #[error(transparent)]
    Evaluation(#[from] EvaluationError),

    #[error("Invalid evaluation options: {0}")]
    InvalidOptions(#[from] OptionsError),
}

impl CheckError {
    /// Whether the check ran and the UI failed it.
    pub fn is_check_failure(&self) -> bool {
        matches!(self, CheckError::Failed(_))
    }

    pub fn as_check_failure(&self) -> Option<&CheckFailure> {
        match self {
            CheckError::Failed(failure) => Some(failure),
            _ => None,
        }
    }
}

/// Per-call options for a check.
#[derive(Debug, Clone, Default)]
pub struct CheckOptions {
    /// Extra artifact name component
    pub name: Option<String>,

    /// Per-call layer of the option merge
    pub evaluation: EvaluationOverrides,
}

impl CheckOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn evaluation(mut self, overrides: EvaluationOverrides) -> Self {
        self.evaluation = overrides;
        self
    }
}

/// A passing check.
#[derive(Debug, Clone)]
pub struct CheckOutcome {
    pub verdict: Verdict,

    /// Where the captured artifact was written
    pub artifact_path: PathBuf,

    /// Registry name of the judge that produced the verdict
    pub judge: String,
}

/// Session-wide check entry point.
pub struct CheckOrchestrator<C: Capture> {
    registry: Arc<JudgeRegistry>,
    capture: Arc<C>,
    session: SessionConfig,
}

impl<C: Capture> CheckOrchestrator<C> {
    pub fn new(registry: Arc<JudgeRegistry>, capture: C, session: SessionConfig) -> Self {
        Self {
            registry,
            capture: Arc::new(capture),
            session,
        }
    }

    /// Build the registry from `session` and wrap it in an orchestrator.
    pub fn from_config(
        session: SessionConfig,
        factories: &JudgeFactoryRegistry,
        capture: C,
    ) -> Result<Self, RegistryError> {
        let registry = JudgeRegistry::from_config(&session, factories)?;
        Ok(Self::new(Arc::new(registry), capture, session))
    }

    /// Open a scope for one test. The scope starts from a copy of the
    /// session configuration.
    pub fn scope(&self, title: impl Into<String>) -> CheckScope<C> {
        CheckScope {
            title: title.into(),
            registry: Arc::clone(&self.registry),
            capture: Arc::clone(&self.capture),
            session: self.session.clone(),
            decision: DecisionEngine::new(),
        }
    }

    pub fn session(&self) -> &SessionConfig {
        &self.session
    }

    pub fn registry(&self) -> &Arc<JudgeRegistry> {
        &self.registry
    }
}

/// One test's view of the session.
pub struct CheckScope<C: Capture> {
    title: String,
    registry: Arc<JudgeRegistry>,
    capture: Arc<C>,
    session: SessionConfig,
    decision: DecisionEngine,
}

impl<C: Capture> CheckScope<C> {
    pub fn title(&self) -> &str {
        &self.title
    }

    /// Merge overrides into this scope's session layer.
    pub fn configure(&mut self, overrides: &EvaluationOverrides) {
        self.session.configure(overrides);
    }

    pub fn config(&self) -> &SessionConfig {
        &self.session
    }

    /// Capture `target`, judge it against `specification` and apply the
    /// decision policy.
    pub async fn check(
        &self,
        target: &C::Target,
        specification: &str,
        options: CheckOptions,
    ) -> Result<CheckOutcome, CheckError> {
        let name = artifact::artifact_name_now(&self.title, options.name.as_deref());
        let dir = &self.session.artifacts_dir;
        files::ensure_dir(dir).await.map_err(|source| CheckError::Io {
            path: dir.clone(),
            source,
        })?;

        let artifact_path = files::reserve_artifact(dir, &name)
            .await
            .map_err(|source| CheckError::Io {
                path: dir.clone(),
                source,
            })?;
        if let Err(err) = self.capture.capture(target, &artifact_path).await {
            if let Err(cleanup) = files::remove_if_exists(&artifact_path).await {
                tracing::warn!(
                    artifact = %artifact_path.display(),
                    error = %cleanup,
                    "Failed to remove unused artifact file"
                );
            }
            return Err(err.into());
        }
        tracing::debug!(artifact = %artifact_path.display(), "Artifact captured");

        let layered = self.session.evaluation.merged(&options.evaluation);
        let registration = self.registry.resolve(layered.judge_name.as_deref())?;
        let evaluator = &registration.evaluator;

        let resolved = EvaluationOptions::resolve(
            &evaluator.default_options(),
            &self.session.evaluation,
            &options.evaluation,
        );
        resolved.validate()?;

        let request = EvaluationRequest {
            artifact_path: artifact_path.clone(),
            specification: specification.to_string(),
            options: resolved,
        };
        let verdict = evaluator.evaluate_with_retry(&request).await?;

        let threshold = request.options.confidence_threshold;
        let judge = registration.name;
        match self
            .decision
            .enforce(verdict, threshold, specification, &artifact_path)
        {
            Ok(verdict) => {
                tracing::info!(
                    judge = %judge,
                    confidence = verdict.confidence(),
                    threshold,
                    artifact = %artifact_path.display(),
                    "Visual check passed"
                );
                Ok(CheckOutcome {
                    verdict,
                    artifact_path,
                    judge,
                })
            }
            Err(failure) => {
                tracing::info!(
                    judge = %judge,
                    outcome = %failure.verdict.outcome(),
                    confidence = failure.verdict.confidence(),
                    threshold,
                    artifact = %artifact_path.display(),
                    "Visual check failed"
                );
                Err(failure.into())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::providers::{ImageData, Judge, JudgeError, JudgeReply, TokenUsage};
    use crate::resilience::ResilientEvaluator;
    use async_trait::async_trait;
    use parking_lot::Mutex;
    use std::path::Path;
    use vibecheck_core::Outcome;

    /// Writes fixed bytes for any label.
    struct StubCapture;

    #[async_trait]
    impl Capture for StubCapture {
        type Target = str;

        async fn capture(&self, target: &str, destination: &Path) -> Result<(), CaptureError> {
            if target == "offscreen" {
                return Err(CaptureError::TargetUnavailable(target.to_string()));
            }
            tokio::fs::write(destination, b"\x89PNG")
                .await
                .map_err(|source| CaptureError::Io {
                    path: destination.to_path_buf(),
                    source,
                })
        }
    }

    /// Replies with fixed text and records the options of the last call.
    struct FixedJudge {
        name: &'static str,
        reply: &'static str,
        seen: Mutex<Option<EvaluationOptions>>,
    }

    impl FixedJudge {
        fn new(name: &'static str, reply: &'static str) -> Arc<Self> {
            Arc::new(Self {
                name,
                reply,
                seen: Mutex::new(None),
            })
        }
    }

    #[async_trait]
    impl Judge for FixedJudge {
        async fn evaluate(
            &self,
            _image: &ImageData,
            _specification: &str,
            options: &EvaluationOptions,
        ) -> Result<JudgeReply, JudgeError> {
            *self.seen.lock() = Some(options.clone());
            Ok(JudgeReply {
                text: self.reply.to_string(),
                model: "fixed".to_string(),
                usage: TokenUsage::default(),
                stop_reason: None,
            })
        }

        async fn health_check(&self) -> bool {
            true
        }

        fn name(&self) -> &str {
            self.name
        }

        fn default_options(&self) -> EvaluationOptions {
            EvaluationOptions {
                max_retries: 2,
                ..Default::default()
            }
        }
    }

    fn orchestrator(
        judges: Vec<Arc<FixedJudge>>,
        dir: &Path,
    ) -> CheckOrchestrator<StubCapture> {
        let mut registry = JudgeRegistry::new();
        for judge in judges {
            let name = judge.name;
            registry.register(name, ResilientEvaluator::new(judge), false);
        }
        with_registry(registry, dir)
    }

    fn with_registry(registry: JudgeRegistry, dir: &Path) -> CheckOrchestrator<StubCapture> {
        let session = SessionConfig {
            artifacts_dir: dir.join("artifacts"),
            ..Default::default()
        };
        CheckOrchestrator::new(Arc::new(registry), StubCapture, session)
    }

    #[tokio::test]
    async fn test_passing_check_returns_verdict_and_artifact() {
        let dir = tempfile::tempdir().unwrap();
        let judge = FixedJudge::new("main", r#"{"confidence":0.95,"verdict":"yes"}"#);
        let orchestrator = orchestrator(vec![judge], dir.path());

        let outcome = orchestrator
            .scope("Login page")
            .check("viewport", "A login form", CheckOptions::new().name("form"))
            .await
            .unwrap();

        assert_eq!(outcome.verdict.outcome(), Outcome::Pass);
        assert_eq!(outcome.verdict.confidence(), 0.95);
        assert_eq!(outcome.judge, "main");
        assert!(outcome.artifact_path.exists());

        let file_name = outcome.artifact_path.file_name().unwrap().to_str().unwrap();
        assert!(file_name.starts_with("login-page-form-"));
        assert!(file_name.ends_with(".png"));
    }

    #[tokio::test]
    async fn test_judge_says_no() {
        let dir = tempfile::tempdir().unwrap();
        let judge = FixedJudge::new(
            "main",
            r#"{"confidence":0.9,"verdict":"no","failReason":"missing button"}"#,
        );
        let orchestrator = orchestrator(vec![judge], dir.path());

        let err = orchestrator
            .scope("Checkout")
            .check("viewport", "A pay button", CheckOptions::new())
            .await
            .unwrap_err();

        assert!(err.is_check_failure());
        let failure = err.as_check_failure().unwrap();
        assert!(failure.message.contains("missing button"));
        assert!(failure.message.contains("A pay button"));
        assert!(failure.artifact_path.exists());
    }

    #[tokio::test]
    async fn test_threshold_breach_despite_yes() {
        let dir = tempfile::tempdir().unwrap();
        let judge = FixedJudge::new("main", r#"{"confidence":0.7,"verdict":"yes"}"#);
        let orchestrator = orchestrator(vec![judge], dir.path());

        let err = orchestrator
            .scope("Header")
            .check("viewport", "A logo", CheckOptions::new())
            .await
            .unwrap_err();

        assert!(err.is_check_failure());
        assert!(err.to_string().contains("70.0%"));
        assert!(err.to_string().contains("80.0%"));
    }

    #[tokio::test]
    async fn test_per_call_threshold() {
        let dir = tempfile::tempdir().unwrap();
        let judge = FixedJudge::new("main", r#"{"confidence":0.6,"verdict":"yes"}"#);
        let orchestrator = orchestrator(vec![judge], dir.path());

        let outcome = orchestrator
            .scope("Footer")
            .check(
                "viewport",
                "Copyright text",
                CheckOptions::new().evaluation(EvaluationOverrides::new().confidence_threshold(0.5)),
            )
            .await
            .unwrap();
        assert_eq!(outcome.verdict.confidence(), 0.6);
    }

    #[tokio::test]
    async fn test_scope_configuration_does_not_leak() {
        let dir = tempfile::tempdir().unwrap();
        let judge = FixedJudge::new("main", r#"{"confidence":0.75,"verdict":"yes"}"#);
        let orchestrator = orchestrator(vec![judge], dir.path());

        let mut lenient = orchestrator.scope("lenient");
        lenient.configure(&EvaluationOverrides::new().confidence_threshold(0.7));
        assert!(lenient
            .check("viewport", "Anything", CheckOptions::new())
            .await
            .is_ok());

        let strict = orchestrator.scope("strict");
        assert_eq!(strict.config().evaluation.confidence_threshold, None);
        let err = strict
            .check("viewport", "Anything", CheckOptions::new())
            .await
            .unwrap_err();
        assert!(err.is_check_failure());
    }

    #[tokio::test]
    async fn test_option_layers_reach_the_judge() {
        let dir = tempfile::tempdir().unwrap();
        let judge = FixedJudge::new("main", r#"{"confidence":0.95,"verdict":"yes"}"#);
        let orchestrator = orchestrator(vec![judge.clone()], dir.path());

        let mut scope = orchestrator.scope("layers");
        scope.configure(
            &EvaluationOverrides::new()
                .model_parameter("temperature", serde_json::json!(0.0))
                .model_parameter("model", serde_json::json!("session-model")),
        );
        scope
            .check(
                "viewport",
                "Anything",
                CheckOptions::new().evaluation(
                    EvaluationOverrides::new().model_parameter("model", serde_json::json!("call-model")),
                ),
            )
            .await
            .unwrap();

        let seen = judge.seen.lock().clone().unwrap();
        assert_eq!(seen.max_retries, 2);
        assert_eq!(seen.model_parameters["model"], "call-model");
        assert_eq!(seen.model_parameters["temperature"], 0.0);
    }

    #[tokio::test]
    async fn test_judge_selection_precedence() {
        let dir = tempfile::tempdir().unwrap();
        let first = FixedJudge::new("first", r#"{"confidence":0.95,"verdict":"yes"}"#);
        let second = FixedJudge::new("second", r#"{"confidence":0.95,"verdict":"yes"}"#);
        let third = FixedJudge::new("third", r#"{"confidence":0.95,"verdict":"yes"}"#);
        let orchestrator = orchestrator(vec![first, second, third], dir.path());

        let mut scope = orchestrator.scope("selection");
        let default = scope
            .check("viewport", "x", CheckOptions::new())
            .await
            .unwrap();
        assert_eq!(default.judge, "first");

        scope.configure(&EvaluationOverrides::new().judge("second"));
        let session = scope
            .check("viewport", "x", CheckOptions::new())
            .await
            .unwrap();
        assert_eq!(session.judge, "second");

        let call = scope
            .check(
                "viewport",
                "x",
                CheckOptions::new().evaluation(EvaluationOverrides::new().judge("third")),
            )
            .await
            .unwrap();
        assert_eq!(call.judge, "third");
    }

    #[tokio::test]
    async fn test_unknown_judge_is_infrastructure_error() {
        let dir = tempfile::tempdir().unwrap();
        let judge = FixedJudge::new("main", r#"{"confidence":0.95,"verdict":"yes"}"#);
        let orchestrator = orchestrator(vec![judge], dir.path());

        let err = orchestrator
            .scope("unknown")
            .check(
                "viewport",
                "x",
                CheckOptions::new().evaluation(EvaluationOverrides::new().judge("gemini")),
            )
            .await
            .unwrap_err();
        assert!(matches!(err, CheckError::UnknownJudge(_)));
        assert!(!err.is_check_failure());
    }

    #[tokio::test]
    async fn test_invalid_options_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let judge = FixedJudge::new("main", r#"{"confidence":0.95,"verdict":"yes"}"#);
        let orchestrator = orchestrator(vec![judge], dir.path());

        let err = orchestrator
            .scope("invalid")
            .check(
                "viewport",
                "x",
                CheckOptions::new().evaluation(EvaluationOverrides::new().max_retries(0)),
            )
            .await
            .unwrap_err();
        assert!(matches!(err, CheckError::InvalidOptions(OptionsError::ZeroRetries)));
    }

    #[tokio::test]
    async fn test_back_to_back_checks_keep_separate_artifacts() {
        let dir = tempfile::tempdir().unwrap();
        let judge = FixedJudge::new("main", r#"{"confidence":0.95,"verdict":"yes"}"#);
        let orchestrator = orchestrator(vec![judge], dir.path());
        let scope = orchestrator.scope("Dashboard");

        let mut paths = Vec::new();
        for _ in 0..20 {
            let outcome = scope
                .check("viewport", "A chart", CheckOptions::new())
                .await
                .unwrap();
            paths.push(outcome.artifact_path);
        }

        let unique: std::collections::BTreeSet<_> = paths.iter().collect();
        assert_eq!(unique.len(), paths.len());
        assert!(paths.iter().all(|p| p.exists()));
    }

    #[tokio::test]
    async fn test_outcome_reports_registry_name() {
        let dir = tempfile::tempdir().unwrap();
        let judge = FixedJudge::new("openai", r#"{"confidence":0.95,"verdict":"yes"}"#);
        let mut registry = JudgeRegistry::new();
        registry.register("fast", ResilientEvaluator::new(judge), false);
        let orchestrator = with_registry(registry, dir.path());

        let outcome = orchestrator
            .scope("naming")
            .check("viewport", "x", CheckOptions::new())
            .await
            .unwrap();
        assert_eq!(outcome.judge, "fast");
    }

    #[tokio::test]
    async fn test_capture_failure() {
        let dir = tempfile::tempdir().unwrap();
        let judge = FixedJudge::new("main", r#"{"confidence":0.95,"verdict":"yes"}"#);
        let orchestrator = orchestrator(vec![judge.clone()], dir.path());

        let err = orchestrator
            .scope("capture")
            .check("offscreen", "x", CheckOptions::new())
            .await
            .unwrap_err();
        assert!(matches!(err, CheckError::Capture(_)));
        assert!(judge.seen.lock().is_none());

        // The claimed file is released when capture fails
        let leftover = std::fs::read_dir(dir.path().join("artifacts")).unwrap().count();
        assert_eq!(leftover, 0);
    }

    #[tokio::test]
    async fn test_malformed_reply_fails_check() {
        let dir = tempfile::tempdir().unwrap();
        let judge = FixedJudge::new("main", "I think it looks fine");
        let orchestrator = orchestrator(vec![judge], dir.path());

        let err = orchestrator
            .scope("malformed")
            .check("viewport", "x", CheckOptions::new())
            .await
            .unwrap_err();
        let failure = err.as_check_failure().unwrap();
        assert_eq!(failure.verdict.confidence(), 0.0);
        assert!(failure.message.contains("Failed to parse judge reply"));
    }
}
