//! # vibecheck-runtime
//!
//! Async side of vibecheck: judge adapters, retries, the judge registry
//! and the check orchestrator.
//!
//! `vibecheck-core` decides; this crate talks to the network and the
//! filesystem. Provider adapters are behind cargo features (`anthropic`,
//! `openai`, both on by default).
//!
//! ## Example
//!
//! ```rust,ignore
//! use vibecheck_runtime::{
//!     CheckOptions, CheckOrchestrator, FileCapture, JudgeFactoryRegistry, SessionConfig,
//! };
//!
//! let orchestrator = CheckOrchestrator::from_config(
//!     SessionConfig::default(),
//!     &JudgeFactoryRegistry::with_defaults(),
//!     FileCapture,
//! )?;
//!
//! let scope = orchestrator.scope("Login page renders");
//! let outcome = scope
//!     .check(Path::new("login.png"), "A login form with a blue submit button", CheckOptions::new())
//!     .await?;
//! println!("confidence {}", outcome.verdict.confidence());
//! ```

pub mod capture;
pub mod config;
pub mod files;
pub mod orchestrator;
pub mod prompts;
pub mod providers;
pub mod registry;
pub mod resilience;

pub use capture::{Capture, CaptureError, FileCapture};
pub use config::{ConfigError, JudgeConfig, SessionConfig, DEFAULT_ARTIFACTS_DIR};
pub use orchestrator::{CheckError, CheckOptions, CheckOrchestrator, CheckOutcome, CheckScope};
pub use providers::{
    ApiCredential, CredentialSource, CredentialSpec, ImageData, Judge, JudgeError, JudgeFactory,
    JudgeFactoryRegistry, JudgeReply, JudgeSettings, TokenUsage,
};
pub use registry::{JudgeRegistration, JudgeRegistry, RegistryError, UnknownJudgeError};
pub use resilience::{EvaluationError, EvaluationRequest, ResilientEvaluator};

#[cfg(feature = "anthropic")]
pub use providers::{AnthropicJudge, AnthropicJudgeFactory};

#[cfg(feature = "openai")]
pub use providers::{OpenAiJudge, OpenAiJudgeFactory};
