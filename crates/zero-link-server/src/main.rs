use anyhow::Result;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use zero_link_auth::{current_timestamp, OAuthFlows};

mod api;
mod config;
mod error;
mod extractors;
mod middleware;
mod request_context;
mod state;
mod stores;

use config::Config;
use state::AppState;

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                "zero_link_server=debug,zero_link_auth=debug,tower_http=debug".into()
            }),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = Config::from_env()?;
    let bind_address = config.bind_address;
    let sweep_interval = config.token_sweep_interval;
    tracing::info!(config = ?config, "Starting zero-link server");

    let state = Arc::new(AppState::new(config).await?);
    let maintenance = tokio::spawn(run_maintenance(Arc::clone(&state), sweep_interval));

    let app = api::router(state);

    let listener = tokio::net::TcpListener::bind(&bind_address).await?;
    tracing::info!("Server listening on {}", bind_address);

    // Peer addresses feed rate limiting
    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal())
    .await?;

    maintenance.abort();
    Ok(())
}

/// Periodic token refresh sweep and purge of expired pending records and sessions
async fn run_maintenance(state: Arc<AppState>, period: Duration) {
    let mut ticker = tokio::time::interval(period);
    ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

    loop {
        ticker.tick().await;

        match state.oauth.sweep_expiring_tokens().await {
            Ok(report) => tracing::info!(
                scanned = report.scanned,
                refreshed = report.refreshed,
                skipped = report.skipped,
                failed = report.failed,
                "Token sweep finished"
            ),
            Err(e) => tracing::error!(error = %e, "Token sweep failed"),
        }

        if let Err(e) = state.oauth.purge_expired_pending().await {
            tracing::error!(error = %e, "Pending record purge failed");
        }

        match state.sessions.purge_expired(current_timestamp()).await {
            Ok(purged) if purged > 0 => tracing::debug!(purged, "Purged expired sessions"),
            Ok(_) => {}
            Err(e) => tracing::error!(error = %e, "Session purge failed"),
        }
    }
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    tracing::info!("Graceful shutdown initiated");
}
