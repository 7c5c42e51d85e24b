//! PDF sources: text extraction with lopdf, first-page rasterisation with pdfium.

use super::image::encode_image;
use crate::config::ConversionSettings;
use crate::error::OpError;
use crate::router::ConversionRequest;
use lopdf::Document;
use pdfium_render::prelude::*;
use std::sync::OnceLock;
use tracing::{debug, info};

/// Upper bound on either edge of a rasterised page, in pixels.
const MAX_RASTER_EDGE: i32 = 10_000;

/// Process-wide pdfium instance.
///
/// Creating a `Pdfium` initialises the library and dropping one destroys it
/// for every thread, so it is bound once and never dropped.
static PDFIUM: OnceLock<Pdfium> = OnceLock::new();

/// Separator placed between the text of consecutive pages.
const PAGE_SEPARATOR: &str = "\n\n";

pub fn pdf_to_text(
    request: &ConversionRequest,
    _settings: &ConversionSettings,
) -> Result<Vec<u8>, OpError> {
    let data = std::fs::read(request.source())?;
    let document = Document::load_mem(&data)?;
    let pages = document.get_pages();
    debug!("PDF loaded: {} pages", pages.len());

    let mut segments = Vec::with_capacity(pages.len());
    for page_number in pages.keys() {
        let text = document.extract_text(&[*page_number])?;
        segments.push(text.trim_end_matches('\n').to_string());
    }

    Ok(segments.join(PAGE_SEPARATOR).into_bytes())
}

/// Render only the first page, then encode it like any other image.
pub fn pdf_to_image(
    request: &ConversionRequest,
    settings: &ConversionSettings,
) -> Result<Vec<u8>, OpError> {
    let data = std::fs::read(request.source())?;
    let pdfium = shared_pdfium(settings)?;
    let document = pdfium.load_pdf_from_byte_slice(&data, None)?;

    let pages = document.pages();
    if pages.len() == 0 {
        return Err(OpError::codec("PDF has no pages"));
    }
    let page = pages.get(0)?;

    let render_config = PdfRenderConfig::new()
        .scale_page_by_factor(settings.raster_dpi / 72.0)
        .set_maximum_width(MAX_RASTER_EDGE)
        .set_maximum_height(MAX_RASTER_EDGE);
    let bitmap = page.render_with_config(&render_config)?;
    let image = bitmap.as_image();

    debug!(
        "Rendered page 1 of {} -> {}x{} px",
        pages.len(),
        image.width(),
        image.height()
    );

    encode_image(image, request.output())
}

/// The shared pdfium instance, bound on first use.
///
/// The library path of the first successful bind is kept for the rest of
/// the process. A failed bind is retried by the next call.
fn shared_pdfium(settings: &ConversionSettings) -> Result<&'static Pdfium, OpError> {
    if let Some(pdfium) = PDFIUM.get() {
        return Ok(pdfium);
    }

    let bindings = match &settings.pdfium_library {
        Some(path) => Pdfium::bind_to_library(path),
        None => Pdfium::bind_to_system_library(),
    }?;
    // A concurrent first call may win the race; only the stored bindings
    // are ever turned into a `Pdfium`.
    Ok(PDFIUM.get_or_init(|| {
        info!("pdfium library bound");
        Pdfium::new(bindings)
    }))
}
