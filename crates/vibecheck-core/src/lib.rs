//! # vibecheck-core
//!
//! Deterministic pieces of visual assertion checking.
//!
//! A visual check asks a vision-capable judge whether a captured artifact
//! satisfies a natural-language specification. This crate holds everything
//! in that pipeline that does not touch the network or the filesystem:
//!
//! - [`Verdict`]: the typed judgement (outcome, confidence, explanation)
//! - [`normalize`]: judge reply text to verdict, degrading on malformed input
//! - [`DecisionEngine`]: the confidence-threshold pass/fail policy
//! - [`EvaluationOptions`]: layered option resolution
//! - [`artifact`]: deterministic artifact naming
//!
//! Network calls, retries and capture live in `vibecheck-runtime`.
//!
//! ## Example
//!
//! ```rust
//! use std::path::Path;
//! use vibecheck_core::{normalize, DecisionEngine};
//!
//! let verdict = normalize(r#"{"confidence": 0.95, "verdict": "yes"}"#, false);
//! let decision = DecisionEngine::new().decide(
//!     &verdict,
//!     0.8,
//!     "A blue submit button",
//!     Path::new("artifacts/home-1.png"),
//! );
//! assert!(decision.pass);
//! ```

pub mod artifact;
pub mod decision;
pub mod normalizer;
pub mod options;
pub mod verdict;

// Re-export main types at crate root
pub use decision::{CheckFailure, Decision, DecisionEngine};
pub use normalizer::{normalize, try_normalize, MalformedReply};
pub use options::{
    EvaluationOptions, EvaluationOverrides, OptionsError, DEFAULT_BACKOFF_BASE,
    DEFAULT_CONFIDENCE_THRESHOLD, DEFAULT_MAX_BACKOFF, DEFAULT_MAX_RETRIES,
};
pub use verdict::{Outcome, Verdict, VerdictError};
