use anyhow::{Context, Result};
use std::sync::Arc;
use tokio::net::TcpListener;
use tracing_subscriber::EnvFilter;

mod config;
mod engine;
mod routes;
#[cfg(test)]
mod test_support;

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    tracing::info!(version = env!("CARGO_PKG_VERSION"), "emolensd starting");

    let config = config::Config::load()?;
    tracing::debug!(?config, "configuration loaded");

    // Model loading is blocking and must succeed before we accept traffic.
    let engine = engine::load_engine(&config).map_err(|e| {
        tracing::error!(error = %e, "failed to load models; refusing to serve");
        e
    })?;

    if let Some(dir) = &config.frontend_dir {
        tracing::info!(dir = %dir.display(), "serving static frontend");
    }

    let state = Arc::new(routes::AppState { engine });
    let app = routes::router(state, config.frontend_dir.as_deref(), config.max_body_bytes);

    let listener = TcpListener::bind(&config.bind_addr)
        .await
        .with_context(|| format!("binding {}", config.bind_addr))?;
    tracing::info!(addr = %config.bind_addr, "emolensd ready");

    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
        })
        .await?;

    tracing::info!("emolensd shutting down");

    Ok(())
}
