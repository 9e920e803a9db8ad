//! JSON salvage: recover a result payload from a noisy LLM reply.
//!
//! ## Why salvage at all?
//!
//! Even with a system prompt demanding "JSON only", chat models routinely
//! wrap their answer in prose ("Here is the extraction you asked for:"),
//! fence it in a triple-backtick code block, or append a closing remark
//! after the payload. Rejecting those replies outright would burn a retry
//! attempt on output that actually contains everything we need.
//!
//! ## Candidate order
//!
//! Candidates are tried in a fixed priority order; the first one that
//! parses into a result object wins:
//!
//! 1. the whole reply, trimmed — the well-behaved case;
//! 2. the content of the first fenced code block (triple backticks with an
//!    optional `json` tag);
//! 3. the substring from the first `{` to the last `}` inclusive — the
//!    prose-wrapped case.
//!
//! A candidate is skipped when it is empty or identical to one already
//! tried, so a reply that is exactly one JSON object is parsed once, not
//! three times.
//!
//! Key matching is case-insensitive (`Fields`, `fields`, and `FIELDS` all
//! deserialize): object keys are lowercased recursively before the typed
//! decode, which mirrors how tolerant the original wire consumers were.

use crate::result::DocumentExtractionResult;
use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::Value;
use thiserror::Error;

// (?s) lets the block span lines; (?i) accepts `JSON` as well as `json`.
static RE_FENCED_BLOCK: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?si)```(?:json)?\s*(.*?)```").unwrap());

/// The reply contained no salvageable JSON.
#[derive(Debug, Error)]
pub enum SalvageError {
    /// No candidate substring was even worth attempting.
    #[error("no JSON content found in LLM response")]
    NoContent,

    /// Every candidate failed to parse; carries the last parser error.
    #[error("LLM response contained no parseable JSON: {0}")]
    NoValidJson(String),
}

/// Try to recover a [`DocumentExtractionResult`] from raw assistant text.
pub fn try_parse(raw: &str) -> Result<DocumentExtractionResult, SalvageError> {
    let mut tried: Vec<&str> = Vec::new();
    let mut last_error: Option<String> = None;

    for candidate in candidates(raw) {
        let candidate = candidate.trim();
        if candidate.is_empty() || tried.contains(&candidate) {
            continue;
        }
        tried.push(candidate);

        match parse_candidate(candidate) {
            Ok(result) => return Ok(result),
            Err(e) => last_error = Some(e),
        }
    }

    match last_error {
        Some(e) => Err(SalvageError::NoValidJson(e)),
        None => Err(SalvageError::NoContent),
    }
}

/// Candidate substrings in priority order. Borrows from `raw`; empty and
/// duplicate entries are filtered by the caller.
fn candidates(raw: &str) -> Vec<&str> {
    let mut out = vec![raw.trim()];

    if let Some(caps) = RE_FENCED_BLOCK.captures(raw) {
        if let Some(m) = caps.get(1) {
            out.push(m.as_str().trim());
        }
    }

    if let (Some(start), Some(end)) = (raw.find('{'), raw.rfind('}')) {
        if start < end {
            out.push(&raw[start..=end]);
        }
    }

    out
}

/// Parse one candidate: must be a JSON object, keys normalised to
/// lowercase before the typed decode.
fn parse_candidate(candidate: &str) -> Result<DocumentExtractionResult, String> {
    let value: Value = serde_json::from_str(candidate).map_err(|e| e.to_string())?;
    if !value.is_object() {
        return Err("top-level JSON value is not an object".to_string());
    }
    serde_json::from_value(lowercase_keys(value)).map_err(|e| e.to_string())
}

fn lowercase_keys(value: Value) -> Value {
    match value {
        Value::Object(map) => Value::Object(
            map.into_iter()
                .map(|(k, v)| (k.to_lowercase(), lowercase_keys(v)))
                .collect(),
        ),
        Value::Array(items) => Value::Array(items.into_iter().map(lowercase_keys).collect()),
        other => other,
    }
}
