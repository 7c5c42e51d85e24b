//! Staging of uploaded files on local disk.
//!
//! Each upload gets its own randomly named file in the upload directory. The
//! file is removed exactly once: explicitly via [`StagedUpload::remove`], or
//! on drop if the conversion unwinds.

use crate::catalog::FormatId;
use crate::error::ConversionError;
use regex::Regex;
use std::io::{self, Write};
use std::path::Path;
use std::sync::OnceLock;
use tempfile::NamedTempFile;
use tracing::{debug, warn};
use unicode_normalization::UnicodeNormalization;

/// Name used when sanitising leaves nothing usable.
const FALLBACK_STEM: &str = "converted";

pub struct StagedUpload {
    file: NamedTempFile,
}

impl StagedUpload {
    /// Persist `data` under `dir`, keeping the format as the file suffix.
    pub fn stage(dir: &Path, format: &FormatId, data: &[u8]) -> Result<Self, ConversionError> {
        let mut file = tempfile::Builder::new()
            .prefix("upload-")
            .suffix(&format!(".{}", format))
            .tempfile_in(dir)
            .map_err(|source| ConversionError::Io {
                path: dir.to_path_buf(),
                source,
            })?;

        file.write_all(data)
            .and_then(|_| file.flush())
            .map_err(|source| ConversionError::Io {
                path: file.path().to_path_buf(),
                source,
            })?;

        debug!("Staged upload at {:?} ({} bytes)", file.path(), data.len());
        Ok(Self { file })
    }

    pub fn path(&self) -> &Path {
        self.file.path()
    }

    /// Delete the staged file. A file that is already gone is not an error.
    pub fn remove(self) {
        let path = self.file.path().to_path_buf();
        match self.file.close() {
            Ok(()) => debug!("Removed staged upload {:?}", path),
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                debug!("Staged upload {:?} was already removed", path)
            }
            Err(e) => warn!("Failed to remove staged upload {:?}: {}", path, e),
        }
    }
}

fn unsafe_chars() -> &'static Regex {
    static UNSAFE: OnceLock<Regex> = OnceLock::new();
    UNSAFE.get_or_init(|| Regex::new(r"[^A-Za-z0-9_.-]").expect("static regex is valid"))
}

/// Reduce a client filename to a safe ASCII name.
///
/// The name is NFKD-normalised so accented letters keep their base letter.
/// Path separators become spaces, whitespace runs become `_`, anything
/// outside `[A-Za-z0-9_.-]` is dropped and leading/trailing `.`/`_` trimmed.
pub fn secure_filename(name: &str) -> String {
    let ascii: String = name
        .nfkd()
        .filter(char::is_ascii)
        .map(|c| if c == '/' || c == '\\' { ' ' } else { c })
        .collect();
    let joined = ascii.split_whitespace().collect::<Vec<_>>().join("_");
    unsafe_chars()
        .replace_all(&joined, "")
        .trim_matches(|c| c == '.' || c == '_')
        .to_string()
}

/// Stem used to name the converted artifact: `"My Report.docx"` gives `My_Report`.
///
/// The extension is split off before sanitising, so a name with no usable
/// stem falls back to a fixed one instead of promoting the extension.
pub fn file_stem(name: &str) -> String {
    let raw = match name.rsplit_once('.') {
        Some((stem, _)) => stem,
        None => name,
    };
    let stem = secure_filename(raw);
    if stem.is_empty() {
        FALLBACK_STEM.to_string()
    } else {
        stem
    }
}
