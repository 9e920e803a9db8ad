//! # scanfields
//!
//! Extract structured fields from scanned PDF documents using Tesseract
//! OCR and a locally-hosted LLM chat endpoint.
//!
//! ## Why this crate?
//!
//! Scanned contracts, invoices, and forms carry no text layer — only page
//! images. Classic extraction (regexes over pdftotext output) gets nothing
//! from them. This crate rasterises each page, recognises the text with
//! Tesseract, and then asks a local model (Ollama by default) to pull out
//! exactly the fields the caller describes in plain language, returning a
//! typed list of `name / value / confidence` entries.
//!
//! ## Pipeline Overview
//!
//! ```text
//! PDF bytes
//!  │
//!  ├─ 1. Validate  non-empty input, file name, prompt bounds
//!  ├─ 2. Render    rasterise pages via pdfium (blocking, spawn_blocking)
//!  ├─ 3. OCR       Tesseract per page, text assembled in page order
//!  ├─ 4. LLM       chat completion with retry/backoff (1 s, 2 s)
//!  └─ 5. Salvage   recover JSON from the model's reply, however wrapped
//! ```
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use scanfields::{extract_fields, ExtractionConfig};
//!
//! #[tokio::main]
//! async fn main() {
//!     let pdf = std::fs::read("contract.pdf").expect("read PDF");
//!     let config = ExtractionConfig::builder()
//!         .language("tur+eng")
//!         .model("llama3.1")
//!         .build()
//!         .unwrap();
//!
//!     let result = extract_fields(
//!         &pdf,
//!         "contract.pdf",
//!         "Extract the contract parties, start date, and total amount.",
//!         &config,
//!     )
//!     .await;
//!
//!     for field in &result.fields {
//!         println!(
//!             "{} = {} ({:.0}%)",
//!             field.name,
//!             field.value.as_deref().unwrap_or("-"),
//!             field.confidence * 100.0
//!         );
//!     }
//! }
//! ```
//!
//! ## Failure model
//!
//! [`extract_fields`] never returns an error: validation problems, OCR
//! failures, LLM outages, and unparseable model output all collapse into
//! `DocumentExtractionResult { success: false, error_message: Some(..) }`.
//! Only the OCR-only entry point [`extract_text`] uses a typed error
//! ([`ExtractionError`]) since its callers want to distinguish causes.
//!
//! ## Runtime requirements
//!
//! * a pdfium shared library reachable by `pdfium-render`;
//! * Tesseract + Leptonica system libraries (via `leptess`) and a
//!   traineddata directory for the configured languages;
//! * a chat endpoint speaking the Ollama `/api/chat` protocol
//!   (`http://localhost:11434` by default).

// ── Modules ──────────────────────────────────────────────────────────────

pub mod config;
pub mod error;
pub mod extract;
pub mod pipeline;
pub mod prompts;
pub mod result;

// ── Re-exports ───────────────────────────────────────────────────────────

pub use config::{ExtractionConfig, ExtractionConfigBuilder};
pub use error::ExtractionError;
pub use extract::{
    extract_fields, extract_fields_sync, extract_fields_with_cancel, extract_text,
    extract_text_with_cancel,
};
pub use pipeline::llm::{ChatClient, ChatError, ChatMessage, OllamaChatClient};
pub use pipeline::ocr::{OcrEngine, OcrEngineError, TesseractOcrEngine};
pub use pipeline::salvage::SalvageError;
pub use result::{DocumentExtractionResult, ExtractedField};
