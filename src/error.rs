//! Error types for the scanfields library.
//!
//! [`ExtractionError`] covers everything that can stop an extraction before
//! the LLM stage: input validation, OCR configuration, PDF loading, and the
//! OCR pass itself. LLM-side failures never surface here — the field
//! extraction client collapses them into a failed
//! [`crate::result::DocumentExtractionResult`] so that one boundary shape
//! covers every expected failure mode (see [`crate::extract`]).
//!
//! Underlying pdfium/tesseract diagnostics are carried as `detail` strings
//! for logging; the top-level entry points replace them with generic
//! messages before they reach a caller-facing result, so engine internals
//! and document content never leak outward.

use std::path::PathBuf;
use thiserror::Error;

/// All errors returned by the OCR stage and request validation.
#[derive(Debug, Error)]
pub enum ExtractionError {
    // ── Validation errors ─────────────────────────────────────────────────
    /// The supplied PDF buffer was empty.
    #[error("PDF input is empty.\nUpload a non-empty PDF document.")]
    EmptyInput,

    /// The file name failed validation (empty or too long).
    #[error("Invalid file name: {reason}")]
    InvalidFileName { reason: String },

    /// The instruction prompt failed validation (empty, too short, too long).
    #[error("Invalid prompt: {reason}")]
    InvalidPrompt { reason: String },

    // ── Configuration errors ──────────────────────────────────────────────
    /// The Tesseract traineddata directory or a language file is missing.
    #[error(
        "OCR language data not found: '{path}'\n\
         Install the traineddata files for the configured languages and point\n\
         the tessdata path at their directory."
    )]
    OcrDataMissing { path: PathBuf },

    /// Builder validation failed.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    // ── Document errors ───────────────────────────────────────────────────
    /// The buffer is not a loadable PDF, or the document has zero pages.
    #[error("Failed to load PDF document: {detail}")]
    DocumentLoad { detail: String },

    /// Rasterisation or text recognition failed on some page.
    #[error("OCR processing failed: {detail}")]
    OcrProcessing { detail: String },

    // ── Control flow ──────────────────────────────────────────────────────
    /// The caller cancelled the request; observed at a page boundary or
    /// around an LLM attempt.
    #[error("extraction was cancelled")]
    Canceled,

    // ── Catch-all ─────────────────────────────────────────────────────────
    /// Unexpected internal error (e.g. a blocking task panicked).
    #[error("Internal error: {0}")]
    Internal(String),
}

impl ExtractionError {
    /// True for request-validation failures — the kind an HTTP adapter maps
    /// to a client-error status rather than a server error.
    pub fn is_validation(&self) -> bool {
        matches!(
            self,
            ExtractionError::EmptyInput
                | ExtractionError::InvalidFileName { .. }
                | ExtractionError::InvalidPrompt { .. }
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_input_mentions_empty() {
        let msg = ExtractionError::EmptyInput.to_string();
        assert!(msg.to_lowercase().contains("empty"), "got: {msg}");
    }

    #[test]
    fn validation_classification() {
        assert!(ExtractionError::EmptyInput.is_validation());
        assert!(ExtractionError::InvalidPrompt {
            reason: "too short".into()
        }
        .is_validation());
        assert!(!ExtractionError::Canceled.is_validation());
        assert!(!ExtractionError::OcrProcessing {
            detail: "x".into()
        }
        .is_validation());
    }

    #[test]
    fn ocr_data_missing_display_carries_path() {
        let e = ExtractionError::OcrDataMissing {
            path: PathBuf::from("./tessdata/eng.traineddata"),
        };
        assert!(e.to_string().contains("eng.traineddata"));
    }
}
