//! Validation and dispatch of conversion requests.

use crate::catalog::{FormatCatalog, FormatId};
use crate::config::ConversionSettings;
use crate::error::{ConversionError, OpError};
use crate::registry::ConversionRegistry;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// A validated conversion: only [`ConversionRouter::request`] builds one.
#[derive(Debug, Clone)]
pub struct ConversionRequest {
    source: PathBuf,
    input: FormatId,
    output: FormatId,
}

impl ConversionRequest {
    pub fn source(&self) -> &Path {
        &self.source
    }

    pub fn input(&self) -> &FormatId {
        &self.input
    }

    pub fn output(&self) -> &FormatId {
        &self.output
    }
}

/// Converted bytes plus the format they are encoded in.
#[derive(Debug, Clone)]
pub struct ConversionResult {
    pub bytes: Vec<u8>,
    pub format: FormatId,
}

impl ConversionResult {
    pub fn content_type(&self) -> &'static str {
        self.format.content_type()
    }

    /// Attachment name for the result, e.g. `report.pdf`.
    pub fn file_name(&self, stem: &str) -> String {
        format!("{}.{}", stem, self.format)
    }
}

/// Owns the immutable catalog, registry and settings.
///
/// Shared read-only across requests once built.
pub struct ConversionRouter {
    catalog: FormatCatalog,
    registry: ConversionRegistry,
    settings: ConversionSettings,
}

impl ConversionRouter {
    pub fn new(
        catalog: FormatCatalog,
        registry: ConversionRegistry,
        settings: ConversionSettings,
    ) -> Self {
        debug!(
            "Router ready: {} catalog pairs, {} registered operations",
            catalog.pairs().count(),
            registry.len()
        );
        Self {
            catalog,
            registry,
            settings,
        }
    }

    /// Standard catalog and registry with the given settings.
    pub fn standard(settings: ConversionSettings) -> Self {
        Self::new(
            FormatCatalog::standard(),
            ConversionRegistry::standard(),
            settings,
        )
    }

    pub fn catalog(&self) -> &FormatCatalog {
        &self.catalog
    }

    /// Check a pair against the catalog without touching any file.
    pub fn validate(&self, input: &FormatId, output: &FormatId) -> Result<(), ConversionError> {
        if !self.catalog.is_known_input(input) {
            return Err(ConversionError::UnknownFormat {
                format: input.to_string(),
            });
        }
        if !self.catalog.is_reachable(input, output) {
            return Err(ConversionError::UnsupportedPair {
                input: input.clone(),
                output: output.clone(),
            });
        }
        Ok(())
    }

    pub fn request(
        &self,
        source: &Path,
        input: &FormatId,
        output: &FormatId,
    ) -> Result<ConversionRequest, ConversionError> {
        self.validate(input, output)?;
        Ok(ConversionRequest {
            source: source.to_path_buf(),
            input: input.clone(),
            output: output.clone(),
        })
    }

    /// Convert the file at `source`. Blocks for the duration of the codec work.
    pub fn convert(
        &self,
        source: &Path,
        input: &FormatId,
        output: &FormatId,
    ) -> Result<ConversionResult, ConversionError> {
        let request = self.request(source, input, output)?;
        self.dispatch(&request)
    }

    /// Run the operation registered for the request's pair.
    pub fn dispatch(&self, request: &ConversionRequest) -> Result<ConversionResult, ConversionError> {
        let (input, output) = (request.input(), request.output());

        // Catalog and registry are maintained separately; a legal pair with
        // no operation still fails cleanly.
        let operation = self.registry.lookup(input, output).ok_or_else(|| {
            warn!("No operation registered for {} -> {}", input, output);
            ConversionError::UnsupportedPair {
                input: input.clone(),
                output: output.clone(),
            }
        })?;

        debug!("Converting {:?}: {} -> {}", request.source(), input, output);

        let bytes = operation(request, &self.settings).map_err(|e| {
            warn!("Conversion {} -> {} failed: {}", input, output, e);
            match e {
                OpError::Codec(detail) => ConversionError::Codec {
                    input: input.clone(),
                    output: output.clone(),
                    detail,
                },
                OpError::Io(source) => ConversionError::Io {
                    path: request.source().to_path_buf(),
                    source,
                },
            }
        })?;

        // Empty text is a legitimate result; empty binary formats are not.
        if bytes.is_empty() && output.as_str() != "txt" {
            return Err(ConversionError::Codec {
                input: input.clone(),
                output: output.clone(),
                detail: "operation produced no output".to_string(),
            });
        }

        info!("Converted {} -> {} ({} bytes)", input, output, bytes.len());

        Ok(ConversionResult {
            bytes,
            format: output.clone(),
        })
    }
}
