//! OCR: recognise text on rasterised pages and assemble the document text.
//!
//! The engine sits behind the [`OcrEngine`] capability trait with one
//! production adapter ([`TesseractOcrEngine`], via `leptess`) so the page
//! loop can be exercised with an in-memory fake. Pages are rendered
//! lazily, recognised sequentially in page order, and each image is
//! dropped before the next page is touched — a scanned contract at
//! 300 DPI runs tens of megabytes per page, so holding the whole document
//! in pixel form is never acceptable.
//!
//! The whole pass (pdfium load, per-page render, recognition) runs inside
//! a single `spawn_blocking` closure: both pdfium and Tesseract are
//! blocking C libraries, and sharing one closure means the engine handle
//! and document stay on one thread for their entire lifetime.

use crate::config::ExtractionConfig;
use crate::error::ExtractionError;
use crate::pipeline::render;
use image::DynamicImage;
use pdfium_render::prelude::*;
use std::io::Cursor;
use thiserror::Error;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

/// Error from a single recognition call; carries engine detail for logging.
#[derive(Debug, Error)]
#[error("{0}")]
pub struct OcrEngineError(pub String);

/// Capability interface over a text-recognition engine.
///
/// `recognize` takes `&mut self` because real engines (Tesseract) mutate
/// internal state per image.
pub trait OcrEngine {
    /// Recognise the text on one page image.
    fn recognize(&mut self, image: &DynamicImage) -> Result<String, OcrEngineError>;
}

/// Production adapter over Tesseract via `leptess`.
///
/// One engine instance is created per OCR pass and reused across pages;
/// engine construction (loading traineddata) dominates per-page cost for
/// short documents, so per-page engines would be wasteful.
pub struct TesseractOcrEngine {
    engine: leptess::LepTess,
    dpi: u32,
}

impl TesseractOcrEngine {
    /// Initialise Tesseract with the configured traineddata path and
    /// language set.
    pub fn new(config: &ExtractionConfig) -> Result<Self, OcrEngineError> {
        let datapath = config.tessdata_path.to_string_lossy();
        let engine = leptess::LepTess::new(Some(datapath.as_ref()), &config.language)
            .map_err(|e| OcrEngineError(format!("tesseract init failed: {e}")))?;
        Ok(Self {
            engine,
            dpi: config.dpi,
        })
    }
}

impl OcrEngine for TesseractOcrEngine {
    fn recognize(&mut self, image: &DynamicImage) -> Result<String, OcrEngineError> {
        // Tesseract ingests encoded image bytes, not raw pixel buffers;
        // PNG keeps the rendered text lossless.
        let mut png = Vec::new();
        image
            .write_to(&mut Cursor::new(&mut png), image::ImageFormat::Png)
            .map_err(|e| OcrEngineError(format!("page image encoding failed: {e}")))?;

        self.engine
            .set_image_from_mem(&png)
            .map_err(|e| OcrEngineError(format!("tesseract rejected page image: {e}")))?;
        self.engine.set_source_resolution(self.dpi as i32);

        self.engine
            .get_utf8_text()
            .map_err(|e| OcrEngineError(format!("tesseract recognition failed: {e}")))
    }
}

/// Verify the traineddata directory and one `<lang>.traineddata` file per
/// configured language exist. Fails closed before any document work.
pub(crate) fn validate_ocr_data(config: &ExtractionConfig) -> Result<(), ExtractionError> {
    if !config.tessdata_path.is_dir() {
        return Err(ExtractionError::OcrDataMissing {
            path: config.tessdata_path.clone(),
        });
    }
    for lang in config.languages() {
        let data_file = config.tessdata_path.join(format!("{lang}.traineddata"));
        if !data_file.is_file() {
            return Err(ExtractionError::OcrDataMissing { path: data_file });
        }
    }
    Ok(())
}

/// Run OCR over every page of `pdf` and return the page texts concatenated
/// in page order, one line separator after each non-blank page.
///
/// See [`crate::extract_text`] for the public contract; this is the
/// blocking-side implementation behind `spawn_blocking`.
pub(crate) async fn extract_text(
    pdf: &[u8],
    config: &ExtractionConfig,
    cancel: &CancellationToken,
) -> Result<String, ExtractionError> {
    if pdf.is_empty() {
        return Err(ExtractionError::EmptyInput);
    }
    validate_ocr_data(config)?;

    let pdf = pdf.to_vec();
    let config = config.clone();
    let cancel = cancel.clone();

    tokio::task::spawn_blocking(move || extract_text_blocking(&pdf, &config, &cancel))
        .await
        .map_err(|e| ExtractionError::Internal(format!("OCR task panicked: {e}")))?
}

fn extract_text_blocking(
    pdf: &[u8],
    config: &ExtractionConfig,
    cancel: &CancellationToken,
) -> Result<String, ExtractionError> {
    let pdfium = Pdfium::default();
    let document = render::load_document(&pdfium, pdf)?;
    let pages = document.pages();
    info!(pages = pages.len(), dpi = config.dpi, "starting OCR pass");

    let mut engine =
        TesseractOcrEngine::new(config).map_err(|e| ExtractionError::OcrProcessing {
            detail: e.to_string(),
        })?;

    let rendered = pages
        .iter()
        .enumerate()
        .map(|(idx, page)| render::render_page(&page, idx, config.dpi, config.grayscale));

    ocr_pages(&mut engine, rendered, cancel)
}

/// The page loop: cancellation check, render, recognise, append. Generic
/// over the engine and the page source so it is testable without pdfium
/// or tesseract.
fn ocr_pages<E: OcrEngine>(
    engine: &mut E,
    pages: impl Iterator<Item = Result<DynamicImage, ExtractionError>>,
    cancel: &CancellationToken,
) -> Result<String, ExtractionError> {
    let mut text = String::new();
    let mut recognized_pages = 0usize;

    for (idx, page) in pages.enumerate() {
        if cancel.is_cancelled() {
            return Err(ExtractionError::Canceled);
        }

        let image = page?;
        let page_text = engine
            .recognize(&image)
            .map_err(|e| ExtractionError::OcrProcessing {
                detail: format!("page {}: {e}", idx + 1),
            })?;

        if !page_text.trim().is_empty() {
            text.push_str(page_text.trim_end());
            text.push('\n');
            recognized_pages += 1;
        } else {
            debug!(page = idx + 1, "page produced no text, skipping");
        }
        // page image dropped here, before the next page is rendered
    }

    info!(
        recognized_pages,
        text_len = text.len(),
        "OCR pass complete"
    );
    Ok(text)
}
