//! swr_suspense demo server
//!
//! Serves the demo pages as JSON: one page waits for its data through a
//! suspense boundary, another reports loading state immediately, and a
//! third loads several boundaries side by side.

use std::net::SocketAddr;

use anyhow::Context;
use tokio::signal;
use tokio::task::JoinHandle;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use swr_suspense::api::{create_router, TIME_KEY};
use swr_suspense::{spawn_revalidate_task, AppState, Config};

/// Main entry point for the demo server.
///
/// # Startup Sequence
/// 1. Initialize tracing subscriber for logging
/// 2. Load configuration from environment variables
/// 3. Create the caches and mock fetcher
/// 4. Start background revalidation of the time key, if configured
/// 5. Create Axum router with all endpoints
/// 6. Start HTTP server on configured port
/// 7. Handle graceful shutdown on SIGINT/SIGTERM
#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Defaults to "info" level, can be overridden with RUST_LOG env var
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "swr_suspense=info,tower_http=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting swr_suspense demo server");

    let config = Config::from_env();
    info!(
        "Configuration loaded: port={}, time_delay={}ms, user_delay={}ms, posts_delay={}ms, stats_delay={}ms, simultaneous_delay={}ms, revalidate_interval={}s, dedupe_interval={}ms",
        config.server_port,
        config.time_delay_ms,
        config.user_delay_ms,
        config.posts_delay_ms,
        config.stats_delay_ms,
        config.simultaneous_delay_ms,
        config.revalidate_interval,
        config.dedupe_interval_ms
    );

    let state = AppState::from_config(&config);
    info!("Caches initialized");

    let revalidate_handle = config.revalidate_every().map(|interval| {
        info!("Background revalidation of '{}' started", TIME_KEY);
        spawn_revalidate_task(state.time.clone(), TIME_KEY.to_string(), interval)
    });

    let app = create_router(state.clone());

    let addr = SocketAddr::from(([0, 0, 0, 0], config.server_port));
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("failed to bind {}", addr))?;
    info!("Server listening on http://{}", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal(state, revalidate_handle))
        .await
        .context("server error")?;

    info!("Server shutdown complete");
    Ok(())
}

/// Waits for shutdown signal (Ctrl+C or SIGTERM).
///
/// On shutdown, stops background revalidation and aborts running fetches.
async fn shutdown_signal(state: AppState, revalidate_handle: Option<JoinHandle<()>>) {
    let ctrl_c = async {
        if let Err(error) = signal::ctrl_c().await {
            warn!("Failed to listen for Ctrl+C: {}", error);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(error) => {
                warn!("Failed to install SIGTERM handler: {}", error);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C, initiating shutdown...");
        }
        _ = terminate => {
            info!("Received SIGTERM, initiating shutdown...");
        }
    }

    if let Some(handle) = revalidate_handle {
        handle.abort();
        warn!("Revalidation task aborted");
    }

    let aborted = state.abort_in_flight();
    if aborted > 0 {
        warn!("Aborted {} in-flight fetches", aborted);
    }
}
