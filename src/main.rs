//! Format Converter - file conversion server dispatching over a fixed format matrix.

mod catalog;
mod config;
mod error;
mod ops;
mod registry;
mod router;
mod routes;
mod upload;

use config::ServerConfig;
use router::ConversionRouter;
use routes::AppState;
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env file if present
    dotenvy::dotenv().ok();

    // Initialize tracing
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| "format_converter=debug,tower_http=debug".into()))
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = ServerConfig::from_env()?;
    config.prepare_dirs()?;
    info!("Staging uploads in {:?}", config.upload_dir);

    let router = ConversionRouter::standard(config.conversion.clone());
    info!(
        "Loaded {} conversions across {} formats",
        router.catalog().pairs().count(),
        router.catalog().all_formats().len()
    );

    let state = AppState {
        router: Arc::new(router),
        upload_dir: Arc::new(config.upload_dir.clone()),
    };
    let app = routes::app(state, config.max_upload_bytes);

    // Run server
    let listener = tokio::net::TcpListener::bind(config.bind_addr).await?;
    info!("Server listening on http://{}", config.bind_addr);
    axum::serve(listener, app).await?;

    Ok(())
}
