//! Top-level extraction entry points.
//!
//! [`extract_fields`] is the primary operation: validate the request, OCR
//! the PDF, hand the text and instruction to the LLM, and return one
//! [`DocumentExtractionResult`] whatever happened. Expected failures never
//! escape as errors from this boundary — an HTTP adapter sitting above
//! this crate only ever has to branch on `success` and, for status
//! mapping, on whether the message came from request validation.
//!
//! [`extract_text`] exposes the OCR half on its own for callers that want
//! the page text without a model pass.
//!
//! Failure messages are deliberately generic for engine-level problems:
//! pdfium and Tesseract diagnostics (which can quote document bytes) go to
//! the log, never into the result.

use crate::config::ExtractionConfig;
use crate::error::ExtractionError;
use crate::pipeline::llm::{self, OllamaChatClient};
use crate::pipeline::ocr;
use crate::result::DocumentExtractionResult;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

/// Maximum accepted file-name length, matching common filesystem limits.
const MAX_FILE_NAME_CHARS: usize = 255;
/// Instruction prompt length bounds.
const MIN_PROMPT_CHARS: usize = 10;
const MAX_PROMPT_CHARS: usize = 4000;

/// Extract structured fields from a scanned PDF.
///
/// This is the primary entry point for the library.
///
/// # Arguments
/// * `pdf`       — raw PDF bytes
/// * `file_name` — original file name, used for logging and validation only
/// * `prompt`    — the caller's extraction instruction (10–4000 chars)
/// * `config`    — pipeline configuration
///
/// # Returns
/// Always a [`DocumentExtractionResult`]; check `success`. Validation
/// failures carry their specific message, engine failures a generic one.
pub async fn extract_fields(
    pdf: &[u8],
    file_name: &str,
    prompt: &str,
    config: &ExtractionConfig,
) -> DocumentExtractionResult {
    extract_fields_with_cancel(pdf, file_name, prompt, config, &CancellationToken::new()).await
}

/// [`extract_fields`] with caller-controlled cancellation.
///
/// Cancellation is observed at page boundaries during OCR and around each
/// LLM attempt and backoff delay; once observed, held resources are
/// released and a failed result is returned promptly.
pub async fn extract_fields_with_cancel(
    pdf: &[u8],
    file_name: &str,
    prompt: &str,
    config: &ExtractionConfig,
    cancel: &CancellationToken,
) -> DocumentExtractionResult {
    if let Err(e) = validate_request(pdf, file_name, prompt) {
        warn!(file = file_name, error = %e, "request validation failed");
        return DocumentExtractionResult::failure(e.to_string());
    }

    info!(file = file_name, bytes = pdf.len(), "starting document extraction");

    let ocr_text = match ocr::extract_text(pdf, config, cancel).await {
        Ok(text) => text,
        Err(e) => return failure_from(e),
    };

    if ocr_text.trim().is_empty() {
        warn!(file = file_name, "OCR returned no text");
        return DocumentExtractionResult::failure("OCR did not return any text");
    }
    debug!(chars = ocr_text.len(), "OCR text ready");

    let client = match OllamaChatClient::new(config) {
        Ok(client) => client,
        Err(e) => return failure_from(e),
    };

    llm::extract_fields(&client, &ocr_text, prompt, config, cancel).await
}

/// Synchronous wrapper around [`extract_fields`].
///
/// Creates a temporary tokio runtime internally; for callers that are not
/// already async.
pub fn extract_fields_sync(
    pdf: &[u8],
    file_name: &str,
    prompt: &str,
    config: &ExtractionConfig,
) -> DocumentExtractionResult {
    match tokio::runtime::Runtime::new() {
        Ok(rt) => rt.block_on(extract_fields(pdf, file_name, prompt, config)),
        Err(e) => {
            error!(error = %e, "failed to create tokio runtime");
            DocumentExtractionResult::failure("Document extraction failed")
        }
    }
}

/// OCR a PDF to plain text, page texts concatenated in page order.
///
/// # Errors
/// * [`ExtractionError::EmptyInput`] — empty buffer, checked before any
///   engine work
/// * [`ExtractionError::OcrDataMissing`] — traineddata path/language file
///   absent
/// * [`ExtractionError::DocumentLoad`] — not a valid PDF, or zero pages
/// * [`ExtractionError::OcrProcessing`] — rasterisation or recognition
///   failed
pub async fn extract_text(
    pdf: &[u8],
    config: &ExtractionConfig,
) -> Result<String, ExtractionError> {
    ocr::extract_text(pdf, config, &CancellationToken::new()).await
}

/// [`extract_text`] with caller-controlled cancellation; aborts with
/// [`ExtractionError::Canceled`] at the next page boundary.
pub async fn extract_text_with_cancel(
    pdf: &[u8],
    config: &ExtractionConfig,
    cancel: &CancellationToken,
) -> Result<String, ExtractionError> {
    ocr::extract_text(pdf, config, cancel).await
}

// ── Internal helpers ─────────────────────────────────────────────────────

/// Re-validate the inbound request; the web layer above is expected to
/// enforce the same rules, but the core does not trust it to.
fn validate_request(pdf: &[u8], file_name: &str, prompt: &str) -> Result<(), ExtractionError> {
    if pdf.is_empty() {
        return Err(ExtractionError::EmptyInput);
    }

    if file_name.trim().is_empty() {
        return Err(ExtractionError::InvalidFileName {
            reason: "file name is required".to_string(),
        });
    }
    if file_name.chars().count() > MAX_FILE_NAME_CHARS {
        return Err(ExtractionError::InvalidFileName {
            reason: format!("file name must be {MAX_FILE_NAME_CHARS} characters or fewer"),
        });
    }

    if prompt.trim().is_empty() {
        return Err(ExtractionError::InvalidPrompt {
            reason: "prompt is required".to_string(),
        });
    }
    let prompt_chars = prompt.chars().count();
    if prompt_chars < MIN_PROMPT_CHARS {
        return Err(ExtractionError::InvalidPrompt {
            reason: format!("prompt must be at least {MIN_PROMPT_CHARS} characters"),
        });
    }
    if prompt_chars > MAX_PROMPT_CHARS {
        return Err(ExtractionError::InvalidPrompt {
            reason: format!("prompt must be {MAX_PROMPT_CHARS} characters or fewer"),
        });
    }

    Ok(())
}

/// Collapse an [`ExtractionError`] into the failed-result shape, logging
/// engine detail instead of surfacing it.
fn failure_from(error: ExtractionError) -> DocumentExtractionResult {
    let message = match &error {
        ExtractionError::EmptyInput
        | ExtractionError::InvalidFileName { .. }
        | ExtractionError::InvalidPrompt { .. } => error.to_string(),
        ExtractionError::OcrDataMissing { path } => {
            error!(path = %path.display(), "OCR language data missing");
            "OCR engine is not configured correctly".to_string()
        }
        ExtractionError::InvalidConfig(detail) => {
            error!(%detail, "invalid extraction configuration");
            "OCR engine is not configured correctly".to_string()
        }
        ExtractionError::DocumentLoad { detail } => {
            error!(%detail, "failed to load PDF document");
            "Document could not be read as a PDF".to_string()
        }
        ExtractionError::OcrProcessing { detail } => {
            error!(%detail, "OCR processing failed");
            "OCR processing failed".to_string()
        }
        ExtractionError::Canceled => "Extraction was cancelled".to_string(),
        ExtractionError::Internal(detail) => {
            error!(%detail, "internal extraction error");
            "Document extraction failed".to_string()
        }
    };
    DocumentExtractionResult::failure(message)
}
