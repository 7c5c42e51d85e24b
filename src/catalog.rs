//! Format identifiers and the static compatibility matrix.
//!
//! The matrix is the only authority on which conversions are legal. It is
//! built once at startup and never mutated afterwards.

use serde::{Serialize, Serializer};
use std::collections::BTreeMap;
use std::fmt;

/// Formats decoded and encoded through the `image` crate.
pub const IMAGE_FORMATS: &[&str] = &["png", "jpg", "jpeg", "bmp", "gif", "tiff", "webp", "ico"];

/// Lowercase token naming a file format, e.g. `png` or `docx`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct FormatId(String);

impl FormatId {
    /// Normalize a user-supplied token. Returns `None` for an empty token.
    pub fn parse(token: &str) -> Option<Self> {
        let token = token.trim().trim_start_matches('.').to_lowercase();
        if token.is_empty() {
            None
        } else {
            Some(Self(token))
        }
    }

    /// Derive the format from the trailing dot-suffix of a filename.
    ///
    /// `"photo.PNG"` gives `png`; `"file"` and `"file."` give `None`.
    pub fn from_filename(filename: &str) -> Option<Self> {
        let (_, ext) = filename.rsplit_once('.')?;
        Self::parse(ext)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_jpeg(&self) -> bool {
        matches!(self.as_str(), "jpg" | "jpeg")
    }

    /// Best-effort MIME type for a converted artifact.
    pub fn content_type(&self) -> &'static str {
        match self.as_str() {
            "png" => "image/png",
            "jpg" | "jpeg" => "image/jpeg",
            "bmp" => "image/bmp",
            "gif" => "image/gif",
            "tiff" => "image/tiff",
            "webp" => "image/webp",
            "ico" => "image/x-icon",
            "pdf" => "application/pdf",
            "txt" => "text/plain; charset=utf-8",
            "docx" => "application/vnd.openxmlformats-officedocument.wordprocessingml.document",
            _ => "application/octet-stream",
        }
    }
}

impl fmt::Display for FormatId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl Serialize for FormatId {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.0)
    }
}

/// Which output formats are reachable from each input format.
///
/// Not symmetric and not transitive; pairs absent from the table are
/// rejected rather than inferred.
#[derive(Debug, Clone, Serialize)]
#[serde(transparent)]
pub struct FormatCatalog {
    matrix: BTreeMap<FormatId, Vec<FormatId>>,
}

impl FormatCatalog {
    /// The built-in table of supported conversions.
    pub fn standard() -> Self {
        let table: &[(&str, &[&str])] = &[
            // Image formats
            ("png", &["jpg", "jpeg", "pdf", "bmp", "gif", "tiff", "webp", "ico"]),
            ("jpg", &["png", "pdf", "bmp", "gif", "tiff", "webp", "ico"]),
            ("jpeg", &["png", "pdf", "bmp", "gif", "tiff", "webp", "ico"]),
            ("bmp", &["png", "jpg", "jpeg", "pdf", "gif", "tiff", "webp"]),
            ("gif", &["png", "jpg", "jpeg", "pdf", "bmp", "tiff", "webp"]),
            ("tiff", &["png", "jpg", "jpeg", "pdf", "bmp", "gif", "webp"]),
            ("webp", &["png", "jpg", "jpeg", "pdf", "bmp", "gif", "tiff"]),
            ("ico", &["png", "jpg", "jpeg", "pdf", "bmp"]),
            // Document formats
            ("pdf", &["txt", "png", "jpg", "jpeg"]),
            ("txt", &["pdf", "docx"]),
            ("docx", &["txt", "pdf"]),
        ];

        let matrix = table
            .iter()
            .map(|(input, outputs)| {
                (
                    FormatId((*input).to_string()),
                    outputs.iter().map(|o| FormatId((*o).to_string())).collect(),
                )
            })
            .collect();

        Self { matrix }
    }

    /// Outputs reachable from `input`; empty for unknown inputs.
    pub fn supported_outputs(&self, input: &FormatId) -> &[FormatId] {
        self.matrix.get(input).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn is_known_input(&self, input: &FormatId) -> bool {
        self.matrix.contains_key(input)
    }

    pub fn is_reachable(&self, input: &FormatId, output: &FormatId) -> bool {
        self.supported_outputs(input).contains(output)
    }

    /// Every legal `(input, output)` pair: inputs sorted, outputs in declared order.
    pub fn pairs(&self) -> impl Iterator<Item = (&FormatId, &FormatId)> {
        self.matrix
            .iter()
            .flat_map(|(input, outputs)| outputs.iter().map(move |output| (input, output)))
    }

    /// Every format that appears anywhere in the table.
    pub fn all_formats(&self) -> Vec<FormatId> {
        let mut formats: Vec<FormatId> = self
            .matrix
            .iter()
            .flat_map(|(input, outputs)| std::iter::once(input).chain(outputs.iter()))
            .cloned()
            .collect();
        formats.sort();
        formats.dedup();
        formats
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fmt(s: &str) -> FormatId {
        FormatId::parse(s).unwrap()
    }

    #[test]
    fn test_from_filename_normalizes_case() {
        assert_eq!(FormatId::from_filename("photo.PNG"), Some(fmt("png")));
        assert_eq!(FormatId::from_filename("archive.tar.GZ"), Some(fmt("gz")));
    }

    #[test]
    fn test_from_filename_without_suffix() {
        assert_eq!(FormatId::from_filename("file"), None);
        assert_eq!(FormatId::from_filename("file."), None);
        assert_eq!(FormatId::from_filename(""), None);
    }

    #[test]
    fn test_parse_trims_leading_dot() {
        assert_eq!(FormatId::parse(".PDF"), Some(fmt("pdf")));
        assert_eq!(FormatId::parse("  "), None);
    }

    #[test]
    fn test_every_input_has_outputs() {
        let catalog = FormatCatalog::standard();
        assert_eq!(catalog.matrix.len(), 11);
        for (input, outputs) in &catalog.matrix {
            assert!(!outputs.is_empty(), "{input} has no outputs");
            assert!(!outputs.contains(input), "{input} converts to itself");
        }
    }

    #[test]
    fn test_unknown_input_has_no_outputs() {
        let catalog = FormatCatalog::standard();
        assert!(catalog.supported_outputs(&fmt("xlsx")).is_empty());
        assert!(!catalog.is_known_input(&fmt("xlsx")));
    }

    #[test]
    fn test_matrix_is_asymmetric() {
        let catalog = FormatCatalog::standard();
        assert!(catalog.is_reachable(&fmt("png"), &fmt("ico")));
        assert!(!catalog.is_reachable(&fmt("bmp"), &fmt("ico")));
        assert!(catalog.is_reachable(&fmt("pdf"), &fmt("txt")));
        assert!(catalog.is_reachable(&fmt("txt"), &fmt("pdf")));
        assert!(!catalog.is_reachable(&fmt("txt"), &fmt("jpg")));
        assert!(!catalog.is_reachable(&fmt("pdf"), &fmt("docx")));
        assert!(!catalog.is_reachable(&fmt("docx"), &fmt("png")));
    }

    #[test]
    fn test_serializes_as_plain_map() {
        let catalog = FormatCatalog::standard();
        let json = serde_json::to_value(&catalog).unwrap();
        assert_eq!(json["txt"], serde_json::json!(["pdf", "docx"]));
        assert_eq!(json["pdf"], serde_json::json!(["txt", "png", "jpg", "jpeg"]));
    }

    #[test]
    fn test_pairs_sort_inputs_and_keep_output_order() {
        let catalog = FormatCatalog::standard();
        let pairs: Vec<(&str, &str)> = catalog
            .pairs()
            .map(|(input, output)| (input.as_str(), output.as_str()))
            .collect();

        assert_eq!(pairs.first(), Some(&("bmp", "png")));
        assert_eq!(pairs.last(), Some(&("webp", "tiff")));
        let txt: Vec<&str> = pairs.iter().filter(|(i, _)| *i == "txt").map(|(_, o)| *o).collect();
        assert_eq!(txt, vec!["pdf", "docx"]);

        let inputs: Vec<&str> = pairs.iter().map(|(i, _)| *i).collect();
        let mut sorted = inputs.clone();
        sorted.sort();
        assert_eq!(inputs, sorted);
    }

    #[test]
    fn test_content_type() {
        assert_eq!(fmt("jpg").content_type(), "image/jpeg");
        assert_eq!(fmt("pdf").content_type(), "application/pdf");
        assert_eq!(fmt("zzz").content_type(), "application/octet-stream");
    }
}
