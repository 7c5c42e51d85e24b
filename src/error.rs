//! Error taxonomy for the conversion engine.
//!
//! Validation failures (`MissingInput`, `UnknownFormat`, `UnsupportedPair`)
//! are raised before any operation runs. `Codec` and `Io` come out of an
//! operation and always mean no output was produced.

use crate::catalog::FormatId;
use serde::Serialize;
use std::path::PathBuf;
use thiserror::Error;

/// Coarse category reported to clients alongside the message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    MissingInput,
    UnknownFormat,
    UnsupportedPair,
    CodecFailure,
    IoFailure,
}

#[derive(Debug, Error)]
pub enum ConversionError {
    #[error("No {what} provided")]
    MissingInput { what: &'static str },

    /// Empty `format` means the filename had no usable suffix.
    #[error("{}", unknown_format_message(format))]
    UnknownFormat { format: String },

    #[error("Cannot convert from \"{input}\" to \"{output}\"")]
    UnsupportedPair { input: FormatId, output: FormatId },

    #[error("Conversion {input} -> {output} failed: {detail}")]
    Codec {
        input: FormatId,
        output: FormatId,
        detail: String,
    },

    #[error("I/O error on '{}': {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

fn unknown_format_message(format: &str) -> String {
    if format.is_empty() {
        "Invalid file format: filename has no extension".to_string()
    } else {
        format!("Input format \"{}\" is not supported", format)
    }
}

impl ConversionError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::MissingInput { .. } => ErrorKind::MissingInput,
            Self::UnknownFormat { .. } => ErrorKind::UnknownFormat,
            Self::UnsupportedPair { .. } => ErrorKind::UnsupportedPair,
            Self::Codec { .. } => ErrorKind::CodecFailure,
            Self::Io { .. } => ErrorKind::IoFailure,
        }
    }

    /// True for errors detected before any conversion was attempted.
    pub fn is_validation(&self) -> bool {
        matches!(
            self.kind(),
            ErrorKind::MissingInput | ErrorKind::UnknownFormat | ErrorKind::UnsupportedPair
        )
    }
}

/// Failure inside a single conversion operation.
///
/// Operations don't know which pair they were dispatched for; the router
/// attaches it when converting into [`ConversionError`].
#[derive(Debug, Error)]
pub enum OpError {
    #[error("{0}")]
    Codec(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl OpError {
    pub fn codec(detail: impl Into<String>) -> Self {
        Self::Codec(detail.into())
    }
}

impl From<image::ImageError> for OpError {
    fn from(e: image::ImageError) -> Self {
        match e {
            image::ImageError::IoError(io) => Self::Io(io),
            other => Self::Codec(other.to_string()),
        }
    }
}

impl From<lopdf::Error> for OpError {
    fn from(e: lopdf::Error) -> Self {
        Self::Codec(format!("PDF error: {}", e))
    }
}

impl From<zip::result::ZipError> for OpError {
    fn from(e: zip::result::ZipError) -> Self {
        match e {
            zip::result::ZipError::Io(io) => Self::Io(io),
            other => Self::Codec(format!("DOCX package error: {}", other)),
        }
    }
}

impl From<pdfium_render::prelude::PdfiumError> for OpError {
    fn from(e: pdfium_render::prelude::PdfiumError) -> Self {
        Self::Codec(format!("pdfium: {:?}", e))
    }
}
