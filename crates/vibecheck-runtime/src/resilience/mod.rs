//! Resilience patterns for judge calls.
//!
//! This module provides:
//! - Retry with exponential backoff
//! - Rate-limit hints that stretch the backoff, up to a ceiling

mod retry;

pub use retry::{
    backoff_delay, retry_delay, EvaluationError, EvaluationRequest, ResilientEvaluator,
};
