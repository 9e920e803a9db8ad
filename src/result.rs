//! Result types produced by the extraction pipeline.
//!
//! [`DocumentExtractionResult`] is the single shape every extraction
//! collapses into — success or failure, validation error or exhausted
//! retries. Callers branch on `success` and never have to catch anything.
//!
//! The wire format matches what the LLM is instructed to emit:
//!
//! ```json
//! {
//!   "success": true,
//!   "fields": [
//!     { "name": "Invoice No", "value": "INV-042", "confidence": 0.91 }
//!   ],
//!   "rawText": "…full OCR text…"
//! }
//! ```
//!
//! Models are unreliable JSON emitters, so deserialization is deliberately
//! lenient: `value`, `rawText`, and `errorMessage` may be absent,
//! `confidence` defaults to 0.0, and key casing is normalised by the
//! salvage parser before the typed decode (see
//! [`crate::pipeline::salvage`]).

use serde::{Deserialize, Serialize};

/// A single named field recovered from the document.
///
/// Immutable once produced; `confidence` is the model's self-reported
/// certainty in `[0.0, 1.0]`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExtractedField {
    /// Field name, e.g. `"Invoice No"`. Non-empty for well-formed output.
    pub name: String,

    /// Field value as transcribed from the document, if the model found one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<String>,

    /// Model-reported confidence in `[0.0, 1.0]`. Defaults to 0.0 when the
    /// model omits it.
    #[serde(default)]
    pub confidence: f64,
}

/// Outcome of one document-extraction request.
///
/// Invariants:
/// * `success == true` implies `error_message` is `None`.
/// * `success == false` implies `fields` is empty and `error_message` is
///   `Some`.
///
/// `raw_text`, when present, holds the OCR-derived source text so callers
/// can audit exactly what was fed to the model. The pipeline backfills it
/// when the LLM response leaves it out.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DocumentExtractionResult {
    #[serde(default)]
    pub success: bool,

    #[serde(default)]
    pub fields: Vec<ExtractedField>,

    // The salvage parser lowercases keys before the typed decode, so the
    // camelCase wire names need their lowercased spellings as aliases.
    #[serde(
        default,
        rename = "rawText",
        alias = "rawtext",
        skip_serializing_if = "Option::is_none"
    )]
    pub raw_text: Option<String>,

    #[serde(
        default,
        rename = "errorMessage",
        alias = "errormessage",
        skip_serializing_if = "Option::is_none"
    )]
    pub error_message: Option<String>,
}

impl DocumentExtractionResult {
    /// A failed result carrying `message`. Upholds the shape invariant:
    /// no fields, no raw text.
    pub fn failure(message: impl Into<String>) -> Self {
        Self {
            success: false,
            fields: Vec::new(),
            raw_text: None,
            error_message: Some(message.into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn failure_upholds_invariant() {
        let r = DocumentExtractionResult::failure("boom");
        assert!(!r.success);
        assert!(r.fields.is_empty());
        assert_eq!(r.error_message.as_deref(), Some("boom"));
        assert!(r.raw_text.is_none());
    }

    #[test]
    fn serializes_camel_case_and_skips_none() {
        let r = DocumentExtractionResult {
            success: true,
            fields: vec![ExtractedField {
                name: "Invoice No".into(),
                value: Some("INV-042".into()),
                confidence: 0.91,
            }],
            raw_text: None,
            error_message: None,
        };
        let json = serde_json::to_string(&r).unwrap();
        assert!(json.contains("\"success\":true"));
        assert!(json.contains("\"Invoice No\""));
        assert!(!json.contains("rawText"));
        assert!(!json.contains("errorMessage"));
    }

    #[test]
    fn confidence_defaults_to_zero() {
        let f: ExtractedField = serde_json::from_str(r#"{"name":"Total"}"#).unwrap();
        assert_eq!(f.name, "Total");
        assert!(f.value.is_none());
        assert_eq!(f.confidence, 0.0);
    }

    #[test]
    fn round_trips_field_for_field() {
        let original = DocumentExtractionResult {
            success: true,
            fields: vec![
                ExtractedField {
                    name: "Party A".into(),
                    value: Some("Acme Ltd".into()),
                    confidence: 0.8,
                },
                ExtractedField {
                    name: "Signature Date".into(),
                    value: None,
                    confidence: 0.2,
                },
            ],
            raw_text: Some("contract body".into()),
            error_message: None,
        };
        let json = serde_json::to_string(&original).unwrap();
        let back: DocumentExtractionResult = serde_json::from_str(&json).unwrap();
        assert_eq!(back, original);
    }
}
