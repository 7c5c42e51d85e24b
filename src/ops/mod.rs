//! Conversion operations, one module per input family.
//!
//! Every operation reads the source path from the request, builds the whole
//! output in memory and only returns it on success.

pub mod docx;
pub mod image;
pub mod layout;
pub mod pdf;
pub mod text;

use crate::config::ConversionSettings;
use crate::error::OpError;
use crate::router::ConversionRequest;

/// Handle stored in the registry for a format pair.
pub type Operation = fn(&ConversionRequest, &ConversionSettings) -> Result<Vec<u8>, OpError>;
