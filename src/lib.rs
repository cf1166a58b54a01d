pub mod api;
pub mod config;
pub mod jobs;
pub mod models;
pub mod pipeline;

use tracing_subscriber::EnvFilter;

use crate::api::ApiContext;
use crate::config::ServiceConfig;

/// Install the global tracing subscriber. `RUST_LOG` wins over the default.
pub fn init_tracing() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(config::default_log_filter())),
        )
        .init();
}

/// Start the service and run until Ctrl-C.
pub async fn run() -> Result<(), String> {
    let config = ServiceConfig::from_env().map_err(|e| e.to_string())?;
    tracing::info!(
        "{} starting v{} on {}",
        config::APP_NAME,
        config::APP_VERSION,
        config.bind_addr
    );

    let ranges = config.reference_ranges().map_err(|e| e.to_string())?;
    let ctx = ApiContext::from_config(&config, ranges).map_err(|e| e.to_string())?;
    let mut server = api::start_server(ctx, config.bind_addr).await?;

    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to listen for shutdown signal: {e}");
    }
    server.shutdown();
    server.stopped().await;
    Ok(())
}
