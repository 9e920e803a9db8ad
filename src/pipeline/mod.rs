//! Pipeline stages for document-field extraction.
//!
//! Each submodule implements exactly one transformation step. Keeping the
//! stages separate makes each independently testable and lets us swap an
//! engine adapter (different OCR backend, different chat endpoint) without
//! touching the others.
//!
//! ## Data Flow
//!
//! ```text
//! render ──▶ ocr ──▶ llm ──▶ salvage
//! (pdfium)  (tesseract) (chat+retry) (defensive parse)
//! ```
//!
//! 1. [`render`]  — rasterise each PDF page at the configured DPI; blocking
//!    pdfium work, driven from inside `spawn_blocking`
//! 2. [`ocr`]     — recognise page text and assemble the document text in
//!    page order; owns the [`ocr::OcrEngine`] capability trait
//! 3. [`llm`]     — drive the chat-completion call with retry/backoff; the
//!    only stage with network I/O; owns the [`llm::ChatClient`] trait
//! 4. [`salvage`] — recover a JSON payload from the model's unreliable
//!    reply text

pub mod llm;
pub mod ocr;
pub mod render;
pub mod salvage;
