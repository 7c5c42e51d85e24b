//! DOCX (WordprocessingML) reading and writing.
//!
//! Only paragraph text is modelled. Reading walks `word/document.xml` and
//! collects the body-level `<w:p>` elements; writing produces the minimal
//! package Word needs to open a document.

use super::layout;
use crate::config::ConversionSettings;
use crate::error::OpError;
use crate::router::ConversionRequest;
use std::fs::File;
use std::io::{BufReader, Cursor, Read, Write};
use std::path::Path;
use tracing::debug;
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipArchive, ZipWriter};

const DOCUMENT_PART: &str = "word/document.xml";
const CONTENT_TYPES_PART: &str = "[Content_Types].xml";
const RELS_PART: &str = "_rels/.rels";

const CONTENT_TYPES: &str = r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<Types xmlns="http://schemas.openxmlformats.org/package/2006/content-types"><Default Extension="rels" ContentType="application/vnd.openxmlformats-package.relationships+xml"/><Default Extension="xml" ContentType="application/xml"/><Override PartName="/word/document.xml" ContentType="application/vnd.openxmlformats-officedocument.wordprocessingml.document.main+xml"/></Types>"#;

const PACKAGE_RELS: &str = r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<Relationships xmlns="http://schemas.openxmlformats.org/package/2006/relationships"><Relationship Id="rId1" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/officeDocument" Target="word/document.xml"/></Relationships>"#;

const DOCUMENT_HEAD: &str = r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<w:document xmlns:w="http://schemas.openxmlformats.org/wordprocessingml/2006/main"><w:body>"#;

const DOCUMENT_TAIL: &str = "<w:sectPr/></w:body></w:document>";

pub fn docx_to_text(
    request: &ConversionRequest,
    _settings: &ConversionSettings,
) -> Result<Vec<u8>, OpError> {
    let paragraphs = read_paragraphs(request.source())?;
    Ok(paragraphs.join("\n").into_bytes())
}

/// Lossy: only paragraph text survives, laid out like a plain-text file.
pub fn docx_to_pdf(
    request: &ConversionRequest,
    _settings: &ConversionSettings,
) -> Result<Vec<u8>, OpError> {
    let paragraphs = read_paragraphs(request.source())?;
    layout::render_text_pdf(&paragraphs)
}

/// Paragraph texts of the document body, in order.
pub fn read_paragraphs(path: &Path) -> Result<Vec<String>, OpError> {
    let file = File::open(path)?;
    let mut archive = ZipArchive::new(BufReader::new(file))?;

    let mut xml = String::new();
    archive
        .by_name(DOCUMENT_PART)
        .map_err(|_| OpError::codec(format!("DOCX package has no {}", DOCUMENT_PART)))?
        .read_to_string(&mut xml)
        .map_err(|e| OpError::codec(format!("Failed to read {}: {}", DOCUMENT_PART, e)))?;

    let paragraphs = parse_paragraphs(&xml)?;
    debug!("DOCX parsed: {} paragraphs", paragraphs.len());
    Ok(paragraphs)
}

/// Build a DOCX package with one plain paragraph per entry.
pub fn write_docx<S: AsRef<str>>(paragraphs: &[S]) -> Result<Vec<u8>, OpError> {
    let mut document = String::from(DOCUMENT_HEAD);
    for paragraph in paragraphs {
        let text = paragraph.as_ref();
        if text.is_empty() {
            document.push_str("<w:p/>");
        } else {
            document.push_str("<w:p><w:r><w:t xml:space=\"preserve\">");
            document.push_str(&escape_xml(text));
            document.push_str("</w:t></w:r></w:p>");
        }
    }
    document.push_str(DOCUMENT_TAIL);

    let mut buffer = Vec::new();
    let mut zip = ZipWriter::new(Cursor::new(&mut buffer));
    let options = SimpleFileOptions::default().compression_method(CompressionMethod::Deflated);
    for (name, contents) in [
        (CONTENT_TYPES_PART, CONTENT_TYPES),
        (RELS_PART, PACKAGE_RELS),
        (DOCUMENT_PART, document.as_str()),
    ] {
        zip.start_file(name, options)?;
        zip.write_all(contents.as_bytes())?;
    }
    zip.finish()?;

    Ok(buffer)
}

/// Scan WordprocessingML for body-level paragraphs.
///
/// Paragraphs inside tables and nested paragraphs (text boxes) are skipped.
/// `<w:tab/>` maps to a tab, `<w:br/>` and `<w:cr/>` to a newline.
fn parse_paragraphs(xml: &str) -> Result<Vec<String>, OpError> {
    let mut paragraphs = Vec::new();
    let mut current: Option<String> = None;
    let mut para_depth = 0usize;
    let mut table_depth = 0usize;
    let mut tabs_depth = 0usize;
    let mut rest = xml;

    while let Some(start) = rest.find('<') {
        let after = &rest[start + 1..];
        let end = after
            .find('>')
            .ok_or_else(|| OpError::codec(format!("Unterminated tag in {}", DOCUMENT_PART)))?;
        let tag = &after[..end];
        rest = &after[end + 1..];

        if tag.starts_with('?') || tag.starts_with('!') {
            continue;
        }

        let closing = tag.starts_with('/');
        let self_closing = tag.ends_with('/');
        let name = tag
            .trim_start_matches('/')
            .trim_end_matches('/')
            .split(char::is_whitespace)
            .next()
            .unwrap_or("");
        // Text is only collected from the paragraph currently being built.
        let direct = para_depth == 1 && current.is_some();

        match (name, closing) {
            ("w:tbl", false) if !self_closing => table_depth += 1,
            ("w:tbl", true) => table_depth = table_depth.saturating_sub(1),
            ("w:tabs", false) if !self_closing => tabs_depth += 1,
            ("w:tabs", true) => tabs_depth = tabs_depth.saturating_sub(1),
            ("w:p", false) => {
                let top_level = para_depth == 0 && table_depth == 0;
                if self_closing {
                    if top_level {
                        paragraphs.push(String::new());
                    }
                } else {
                    para_depth += 1;
                    if top_level {
                        current = Some(String::new());
                    }
                }
            }
            ("w:p", true) => {
                para_depth = para_depth.saturating_sub(1);
                if para_depth == 0 {
                    if let Some(text) = current.take() {
                        paragraphs.push(text);
                    }
                }
            }
            ("w:t", false) if !self_closing => {
                let close = rest
                    .find("</w:t>")
                    .ok_or_else(|| OpError::codec("Unterminated <w:t> element"))?;
                if direct {
                    if let Some(text) = current.as_mut() {
                        text.push_str(&decode_entities(&rest[..close]));
                    }
                }
                rest = &rest[close + "</w:t>".len()..];
            }
            ("w:tab", false) if direct && tabs_depth == 0 => {
                if let Some(text) = current.as_mut() {
                    text.push('\t');
                }
            }
            ("w:br" | "w:cr", false) if direct => {
                if let Some(text) = current.as_mut() {
                    text.push('\n');
                }
            }
            _ => {}
        }
    }

    Ok(paragraphs)
}

fn escape_xml(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&apos;"),
            // Not representable in XML 1.0
            c if (c as u32) < 0x20 && c != '\t' => {}
            c => out.push(c),
        }
    }
    out
}

fn decode_entities(raw: &str) -> String {
    if !raw.contains('&') {
        return raw.to_string();
    }

    let mut out = String::with_capacity(raw.len());
    let mut rest = raw;
    while let Some(amp) = rest.find('&') {
        out.push_str(&rest[..amp]);
        let tail = &rest[amp..];
        let decoded = tail.find(';').and_then(|semi| {
            let entity = &tail[1..semi];
            let c = match entity {
                "lt" => Some('<'),
                "gt" => Some('>'),
                "amp" => Some('&'),
                "apos" => Some('\''),
                "quot" => Some('"'),
                _ => entity
                    .strip_prefix("#x")
                    .or_else(|| entity.strip_prefix("#X"))
                    .and_then(|hex| u32::from_str_radix(hex, 16).ok())
                    .or_else(|| entity.strip_prefix('#').and_then(|dec| dec.parse().ok()))
                    .and_then(char::from_u32),
            };
            c.map(|c| (c, semi))
        });

        match decoded {
            Some((c, semi)) => {
                out.push(c);
                rest = &tail[semi + 1..];
            }
            None => {
                out.push('&');
                rest = &tail[1..];
            }
        }
    }
    out.push_str(rest);
    out
}
