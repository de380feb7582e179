//! EDV server entry point.
//!
//! Parses the `start` command, bootstraps the storage provider and vault
//! collection, then serves the REST API with graceful shutdown. On shutdown
//! the provider is closed so every store handle is released.

use std::sync::Arc;

use anyhow::Context;
use axum::Router;
use axum::http::HeaderValue;
use clap::Parser;
use tokio::net::TcpListener;
use tower_http::set_header::SetResponseHeaderLayer;
use tower_http::trace::TraceLayer;
use tracing::{info, warn};

use edv_server::config::{Cli, Command, ServerConfig};
use edv_server::routes;
use edv_server::state::{AppState, build_provider};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let Cli {
        command: Command::Start(args),
    } = Cli::parse();
    let config = ServerConfig::try_from(args).context("invalid start arguments")?;

    // Initialize structured logging.
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&config.log_level)),
        )
        .json()
        .init();

    info!(storage = config.storage_backend.kind(), "EDV starting");

    let provider =
        build_provider(&config.storage_backend).context("failed to initialize storage provider")?;
    let state = Arc::new(AppState::new(provider));
    let app = build_router(Arc::clone(&state), &config);

    let listener = TcpListener::bind(&config.host_url)
        .await
        .with_context(|| format!("failed to bind to {}", config.host_url))?;

    info!(addr = %config.host_url, "EDV server listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("server error")?;

    if let Err(e) = state.vaults.close().await {
        warn!(error = %e, "failed to close storage provider");
    }

    info!("EDV server stopped");
    Ok(())
}

/// Build the Axum router with all routes and middleware.
fn build_router(state: Arc<AppState>, config: &ServerConfig) -> Router {
    routes::router(state)
        .layer(tower::limit::ConcurrencyLimitLayer::new(
            config.max_concurrent_requests,
        ))
        .layer(TraceLayer::new_for_http())
        .layer(SetResponseHeaderLayer::overriding(
            axum::http::header::X_CONTENT_TYPE_OPTIONS,
            HeaderValue::from_static("nosniff"),
        ))
        .layer(SetResponseHeaderLayer::overriding(
            axum::http::header::CACHE_CONTROL,
            HeaderValue::from_static("no-store"),
        ))
}

/// Wait for SIGINT or SIGTERM.
async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c().await.ok();
    };

    #[cfg(unix)]
    let terminate = async {
        if let Ok(mut sig) =
            tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
        {
            sig.recv().await;
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {},
        () = terminate => {},
    }

    info!("shutdown signal received, stopping server");
}
