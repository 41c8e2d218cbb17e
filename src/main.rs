mod config;
mod error;
mod extraction;
mod handlers;
mod model;
mod page;

use crate::config::{Config, UploadLimits};
use crate::extraction::{Extractor, OpenAiExtractor};
use anyhow::Context;
use axum::{
    extract::DefaultBodyLimit,
    routing::{get, post},
    Extension, Router,
};
use envconfig::Envconfig;
use std::sync::Arc;
use tokio::{net::TcpListener, sync::Semaphore};
use tower_http::trace::TraceLayer;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

#[tokio::main(flavor = "current_thread")]
async fn main() -> anyhow::Result<()> {
    let config = Config::init_from_env().context("Failed to load config")?;

    let default_level = if config.debug { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)),
        )
        .init();

    let upstream = config.upstream();
    if upstream.api_key.is_none() {
        warn!("OPENAI_API_KEY is not set, every extraction will fail");
    }
    info!(
        "Using model {} at {} (timeout {:?})",
        upstream.model, upstream.base_url, upstream.timeout
    );

    let extractor =
        OpenAiExtractor::new(upstream).context("Could not build extraction client")?;
    let app = app(
        Arc::new(extractor),
        config.limits(),
        config.max_concurrent_extractions,
    );

    let listener = TcpListener::bind(&config.listen_address)
        .await
        .with_context(|| format!("Could not bind {}", config.listen_address))?;

    info!("Listening on {}", config.listen_address);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    Ok(())
}

fn app(extractor: Arc<dyn Extractor>, limits: UploadLimits, max_concurrent: usize) -> Router {
    let slots = Arc::new(Semaphore::new(max_concurrent.max(1)));

    Router::new()
        .route("/", get(handlers::index))
        .route("/process", post(handlers::process))
        .layer(DefaultBodyLimit::max(limits.body_limit()))
        .layer(Extension(extractor))
        .layer(Extension(limits))
        .layer(Extension(slots))
        .layer(TraceLayer::new_for_http())
}

async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        warn!("Could not listen for shutdown signal: {err}");
        std::future::pending::<()>().await;
    }
    info!("Shutting down");
}
