//! Server and conversion configuration.
//!
//! Everything is read once from the environment (after `.env` is loaded) and
//! is immutable for the lifetime of the process.

use anyhow::{Context, Result};
use std::env;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::str::FromStr;

const DEFAULT_BIND_ADDR: &str = "0.0.0.0:5000";
const DEFAULT_UPLOAD_DIR: &str = "uploads";
const DEFAULT_MAX_UPLOAD_MB: usize = 50;
const DEFAULT_RASTER_DPI: f32 = 200.0;

/// Settings consulted by conversion operations.
#[derive(Debug, Clone)]
pub struct ConversionSettings {
    /// Resolution used when rasterising a PDF page.
    pub raster_dpi: f32,
    /// Explicit pdfium shared library; the system library is used when unset.
    pub pdfium_library: Option<PathBuf>,
}

impl Default for ConversionSettings {
    fn default() -> Self {
        Self {
            raster_dpi: DEFAULT_RASTER_DPI,
            pdfium_library: None,
        }
    }
}

/// Top-level configuration for the HTTP service.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub bind_addr: SocketAddr,
    /// Directory holding staged uploads while they are converted.
    pub upload_dir: PathBuf,
    pub max_upload_bytes: usize,
    pub conversion: ConversionSettings,
}

impl ServerConfig {
    /// Build the config from `CONVERTER_*` and `PDFIUM_LIB_PATH` variables.
    pub fn from_env() -> Result<Self> {
        let bind_addr = env_or("CONVERTER_BIND_ADDR", DEFAULT_BIND_ADDR.parse()?)?;
        let upload_dir = env::var("CONVERTER_UPLOAD_DIR")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from(DEFAULT_UPLOAD_DIR));
        let max_upload_mb: usize = env_or("CONVERTER_MAX_UPLOAD_MB", DEFAULT_MAX_UPLOAD_MB)?;
        let raster_dpi: f32 = env_or("CONVERTER_RASTER_DPI", DEFAULT_RASTER_DPI)?;

        if !(raster_dpi.is_finite() && raster_dpi > 0.0) {
            anyhow::bail!("CONVERTER_RASTER_DPI must be positive, got {}", raster_dpi);
        }

        let pdfium_library = env::var("PDFIUM_LIB_PATH").ok().map(PathBuf::from);

        Ok(Self {
            bind_addr,
            upload_dir,
            max_upload_bytes: max_upload_mb * 1024 * 1024,
            conversion: ConversionSettings {
                raster_dpi,
                pdfium_library,
            },
        })
    }

    /// Make sure the upload directory exists.
    pub fn prepare_dirs(&self) -> Result<()> {
        std::fs::create_dir_all(&self.upload_dir)
            .with_context(|| format!("Failed to create upload dir: {:?}", self.upload_dir))
    }
}

fn env_or<T>(key: &str, default: T) -> Result<T>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match env::var(key) {
        Ok(raw) => raw
            .trim()
            .parse()
            .with_context(|| format!("Invalid value for {}: {:?}", key, raw)),
        Err(_) => Ok(default),
    }
}
