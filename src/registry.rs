//! Flat lookup from a format pair to the operation that performs it.

use crate::catalog::{FormatId, IMAGE_FORMATS};
use crate::ops::{self, Operation};
use std::collections::HashMap;

/// Maps `(input, output)` to a conversion operation.
///
/// The registry may know more pairs than the catalog allows; the catalog
/// decides what is legal, the registry only decides how.
#[derive(Default)]
pub struct ConversionRegistry {
    operations: HashMap<(FormatId, FormatId), Operation>,
}

impl ConversionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry with every built-in operation.
    pub fn standard() -> Self {
        let mut registry = Self::new();

        // Image family
        for input in IMAGE_FORMATS {
            for output in IMAGE_FORMATS.iter().filter(|o| *o != input) {
                registry.register(input, output, ops::image::convert_image);
            }
            registry.register(input, "pdf", ops::image::image_to_pdf);
        }

        // PDF family
        registry.register("pdf", "txt", ops::pdf::pdf_to_text);
        for output in ["png", "jpg", "jpeg"] {
            registry.register("pdf", output, ops::pdf::pdf_to_image);
        }

        // Text family
        registry.register("txt", "pdf", ops::text::text_to_pdf);
        registry.register("txt", "docx", ops::text::text_to_docx);

        // DOCX family
        registry.register("docx", "txt", ops::docx::docx_to_text);
        registry.register("docx", "pdf", ops::docx::docx_to_pdf);

        registry
    }

    /// Register (or replace) the operation for a pair.
    pub fn register(&mut self, input: &str, output: &str, operation: Operation) {
        match (FormatId::parse(input), FormatId::parse(output)) {
            (Some(input), Some(output)) => {
                self.operations.insert((input, output), operation);
            }
            _ => tracing::warn!("Ignoring registration with empty format: {:?} -> {:?}", input, output),
        }
    }

    pub fn lookup(&self, input: &FormatId, output: &FormatId) -> Option<Operation> {
        self.operations
            .get(&(input.clone(), output.clone()))
            .copied()
    }

    pub fn len(&self) -> usize {
        self.operations.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::FormatCatalog;

    #[test]
    fn test_every_catalog_pair_has_an_operation() {
        let catalog = FormatCatalog::standard();
        let registry = ConversionRegistry::standard();

        for (input, output) in catalog.pairs() {
            assert!(
                registry.lookup(input, output).is_some(),
                "no operation registered for {input} -> {output}"
            );
        }
    }

    #[test]
    fn test_unregistered_pair() {
        let registry = ConversionRegistry::standard();
        let txt = FormatId::parse("txt").unwrap();
        let jpg = FormatId::parse("jpg").unwrap();
        assert!(registry.lookup(&txt, &jpg).is_none());
    }

    #[test]
    fn test_register_ignores_empty_format() {
        let mut registry = ConversionRegistry::new();
        registry.register("", "pdf", ops::text::text_to_pdf);
        assert_eq!(registry.len(), 0);
    }
}
