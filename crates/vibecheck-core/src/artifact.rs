//! Artifact naming.
//!
//! Names are derived from the test title, an optional caller-supplied name
//! and a millisecond timestamp: `<title>-<name>-<millis>`. Title and name
//! are lowercased and every run of characters outside `[a-z0-9]` collapses
//! to a single `-`. When a file of that name already exists the caller
//! picks the next candidate from [`artifact_file_candidate`], which adds a
//! `-<n>` suffix.

use chrono::Utc;
use lazy_static::lazy_static;
use regex::Regex;

/// Maximum length of the sanitized title/name prefix, before the timestamp.
pub const MAX_PREFIX_LEN: usize = 100;

/// Extension used for captured artifacts.
pub const ARTIFACT_EXTENSION: &str = "png";

lazy_static! {
    static ref UNSAFE_RUN: Regex = Regex::new(r"[^a-z0-9]+").unwrap();
}

/// Lowercase `input` and reduce it to `[a-z0-9-]`, without leading or trailing dashes.
pub fn sanitize(input: &str) -> String {
    let lowered = input.to_lowercase();
    UNSAFE_RUN
        .replace_all(&lowered, "-")
        .trim_matches('-')
        .to_string()
}

/// Build an artifact name for an explicit timestamp.
pub fn artifact_name(title: &str, custom_name: Option<&str>, timestamp_millis: i64) -> String {
    let parts: Vec<String> = std::iter::once(title)
        .chain(custom_name)
        .map(sanitize)
        .filter(|part| !part.is_empty())
        .collect();

    let mut prefix = parts.join("-");
    if prefix.len() > MAX_PREFIX_LEN {
        // Sanitized text is ASCII, so byte truncation is char-safe
        prefix.truncate(MAX_PREFIX_LEN);
        prefix = prefix.trim_end_matches('-').to_string();
    }

    if prefix.is_empty() {
        format!("artifact-{}", timestamp_millis)
    } else {
        format!("{}-{}", prefix, timestamp_millis)
    }
}

/// Build an artifact name stamped with the current time.
pub fn artifact_name_now(title: &str, custom_name: Option<&str>) -> String {
    artifact_name(title, custom_name, Utc::now().timestamp_millis())
}

/// File name (with extension) for an artifact name.
pub fn artifact_file_name(name: &str) -> String {
    format!("{}.{}", name, ARTIFACT_EXTENSION)
}

/// The `n`th file name to try for `name`: the plain name first, then
/// `<name>-1.png`, `<name>-2.png` and so on.
pub fn artifact_file_candidate(name: &str, n: u32) -> String {
    if n == 0 {
        artifact_file_name(name)
    } else {
        format!("{}-{}.{}", name, n, ARTIFACT_EXTENSION)
    }
}
