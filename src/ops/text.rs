//! Plain-text sources.

use super::{docx, layout};
use crate::config::ConversionSettings;
use crate::error::OpError;
use crate::router::ConversionRequest;
use std::path::Path;

pub fn text_to_pdf(
    request: &ConversionRequest,
    _settings: &ConversionSettings,
) -> Result<Vec<u8>, OpError> {
    let text = read_text(request.source())?;
    layout::render_text_pdf(text.lines())
}

/// One paragraph per input line, in order.
pub fn text_to_docx(
    request: &ConversionRequest,
    _settings: &ConversionSettings,
) -> Result<Vec<u8>, OpError> {
    let text = read_text(request.source())?;
    let paragraphs: Vec<&str> = text
        .lines()
        .map(|line| line.trim_end_matches(['\r', '\n']))
        .collect();
    docx::write_docx(&paragraphs)
}

/// Read as UTF-8, replacing invalid sequences and dropping a leading BOM.
fn read_text(path: &Path) -> Result<String, OpError> {
    let bytes = std::fs::read(path)?;
    let text = String::from_utf8_lossy(&bytes);
    Ok(text.trim_start_matches('\u{feff}').to_string())
}
