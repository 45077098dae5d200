//! Response normalization: judge reply text to [`Verdict`].
//!
//! Judges are asked for a JSON object but often wrap it in prose or code
//! fences. The normalizer takes the first well-formed JSON object in the
//! text, falling back to parsing the whole reply.
//!
//! A reply that cannot be read never raises. It resolves to a degraded
//! failing verdict (confidence 0) whose reasoning carries the parse error
//! and the raw text, so one bad reply fails its check without aborting
//! the run. Malformed replies are not retried.

use serde_json::{Map, Value as JsonValue};
use thiserror::Error;

use crate::verdict::{Outcome, Verdict};

/// Why a reply could not be turned into a verdict.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum MalformedReply {
    #[error("no JSON object found in reply: {0}")]
    NoJsonObject(String),

    #[error("reply JSON has no confidence field")]
    MissingConfidence,

    #[error("confidence is not a number: {0}")]
    NonNumericConfidence(String),

    #[error("confidence {0} is outside [0, 1]")]
    ConfidenceOutOfRange(f64),
}

/// Normalize reply text, degrading to a failing verdict on malformed input.
pub fn normalize(raw: &str, include_raw_reply: bool) -> Verdict {
    match try_normalize(raw) {
        Ok((verdict, payload)) => {
            if include_raw_reply {
                verdict.with_raw_reply(JsonValue::Object(payload))
            } else {
                verdict
            }
        }
        Err(err) => {
            tracing::warn!(error = %err, "Judge reply could not be normalized, failing verdict");
            let verdict = Verdict::degraded(format!(
                "Failed to parse judge reply: {}. Raw reply: {}",
                err, raw
            ));
            if include_raw_reply {
                verdict.with_raw_reply(JsonValue::String(raw.to_string()))
            } else {
                verdict
            }
        }
    }
}

/// Strict normalization. Returns the verdict and the parsed payload.
pub fn try_normalize(raw: &str) -> Result<(Verdict, Map<String, JsonValue>), MalformedReply> {
    let payload = extract_json_object(raw)?;

    let confidence = match payload.get("confidence") {
        None | Some(JsonValue::Null) => return Err(MalformedReply::MissingConfidence),
        Some(value) => parse_confidence(value)?,
    };

    let outcome = Outcome::from_verdict_field(payload.get("verdict").and_then(JsonValue::as_str));

    let mut verdict = Verdict::new(outcome, confidence)
        .map_err(|_| MalformedReply::ConfidenceOutOfRange(confidence))?;

    if let Some(reasoning) = non_empty_str(&payload, &["reasoning"]) {
        verdict = verdict.with_reasoning(reasoning);
    }
    if let Some(fail_reason) = non_empty_str(&payload, &["failReason", "fail_reason"]) {
        verdict = verdict.with_fail_reason(fail_reason);
    }
    if let Some(JsonValue::Array(items)) = payload.get("suggestions") {
        let suggestions: Vec<String> = items
            .iter()
            .filter_map(JsonValue::as_str)
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(String::from)
            .collect();
        verdict = verdict.with_suggestions(suggestions);
    }

    Ok((verdict, payload))
}

/// Find the first JSON object embedded in `text`.
///
/// Each `{` is tried as the start of a JSON value; the streaming
/// deserializer stops at the end of the first complete value, so trailing
/// prose is ignored.
pub fn extract_json_object(text: &str) -> Result<Map<String, JsonValue>, MalformedReply> {
    for (start, _) in text.match_indices('{') {
        let mut stream =
            serde_json::Deserializer::from_str(&text[start..]).into_iter::<JsonValue>();
        if let Some(Ok(JsonValue::Object(map))) = stream.next() {
            return Ok(map);
        }
    }

    match serde_json::from_str::<JsonValue>(text.trim()) {
        Ok(JsonValue::Object(map)) => Ok(map),
        Ok(other) => Err(MalformedReply::NoJsonObject(format!(
            "expected an object, found {}",
            json_kind(&other)
        ))),
        Err(err) => Err(MalformedReply::NoJsonObject(err.to_string())),
    }
}

fn parse_confidence(value: &JsonValue) -> Result<f64, MalformedReply> {
    let confidence = match value {
        JsonValue::Number(n) => n
            .as_f64()
            .ok_or_else(|| MalformedReply::NonNumericConfidence(n.to_string()))?,
        // Some models quote numbers
        JsonValue::String(s) => s
            .trim()
            .parse::<f64>()
            .map_err(|_| MalformedReply::NonNumericConfidence(s.clone()))?,
        other => return Err(MalformedReply::NonNumericConfidence(other.to_string())),
    };

    if !(0.0..=1.0).contains(&confidence) {
        return Err(MalformedReply::ConfidenceOutOfRange(confidence));
    }
    Ok(confidence)
}

fn non_empty_str<'a>(payload: &'a Map<String, JsonValue>, keys: &[&str]) -> Option<&'a str> {
    keys.iter()
        .filter_map(|k| payload.get(*k))
        .filter_map(JsonValue::as_str)
        .map(str::trim)
        .find(|s| !s.is_empty())
}

fn json_kind(value: &JsonValue) -> &'static str {
    match value {
        JsonValue::Null => "null",
        JsonValue::Bool(_) => "a boolean",
        JsonValue::Number(_) => "a number",
        JsonValue::String(_) => "a string",
        JsonValue::Array(_) => "an array",
        JsonValue::Object(_) => "an object",
    }
}
