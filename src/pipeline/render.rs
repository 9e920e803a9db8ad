//! PDF rasterisation: render pages to `DynamicImage` via pdfium.
//!
//! ## Blocking by design
//!
//! The `pdfium-render` crate wraps the pdfium C++ library, which keeps
//! thread-local state and must not be driven from async contexts. These
//! helpers are therefore plain blocking functions; the OCR orchestrator
//! calls them from inside one `tokio::task::spawn_blocking` closure that
//! covers the whole page loop (see [`crate::pipeline::ocr`]), so a page
//! image lives only for the duration of its own recognition pass.
//!
//! ## DPI, not pixel caps
//!
//! Recognition accuracy is a function of dots-per-inch: Tesseract wants
//! ~300 DPI for body text. Page widths are expressed in PDF points
//! (1/72 inch), so the target pixel width is `points / 72 × dpi`, and
//! pdfium scales the height proportionally.

use crate::error::ExtractionError;
use image::DynamicImage;
use pdfium_render::prelude::*;
use tracing::debug;

/// Load a PDF document from an in-memory buffer.
///
/// Fails with [`ExtractionError::DocumentLoad`] when the buffer is not a
/// valid PDF or the document has no pages.
pub(crate) fn load_document<'a>(
    pdfium: &'a Pdfium,
    pdf: &'a [u8],
) -> Result<PdfDocument<'a>, ExtractionError> {
    let document =
        pdfium
            .load_pdf_from_byte_slice(pdf, None)
            .map_err(|e| ExtractionError::DocumentLoad {
                detail: format!("{e:?}"),
            })?;

    if document.pages().len() == 0 {
        return Err(ExtractionError::DocumentLoad {
            detail: "document has no pages".to_string(),
        });
    }

    Ok(document)
}

/// Rasterise one page at the requested DPI, optionally normalised to
/// grayscale.
pub(crate) fn render_page(
    page: &PdfPage<'_>,
    page_index: usize,
    dpi: u32,
    grayscale: bool,
) -> Result<DynamicImage, ExtractionError> {
    let width_px = target_width_px(page.width().value, dpi);
    let render_config = PdfRenderConfig::new().set_target_width(width_px);

    let bitmap =
        page.render_with_config(&render_config)
            .map_err(|e| ExtractionError::OcrProcessing {
                detail: format!("rasterisation failed for page {}: {e:?}", page_index + 1),
            })?;

    let mut image = bitmap.as_image();
    if grayscale {
        image = DynamicImage::ImageLuma8(image.to_luma8());
    }

    debug!(
        page = page_index + 1,
        width = image.width(),
        height = image.height(),
        "rendered page"
    );

    Ok(image)
}

/// Pixel width for a page of `width_pts` PDF points rendered at `dpi`.
fn target_width_px(width_pts: f32, dpi: u32) -> i32 {
    ((width_pts * dpi as f32) / 72.0).round().max(1.0) as i32
}
