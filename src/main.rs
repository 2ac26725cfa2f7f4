//! Rajpath Server - Authoritative property-trading game server
//!
//! Serves the lobby and gameplay WebSocket, a small room HTTP API and a
//! health probe. Every room runs as its own task owning the rules engine.

mod app;
mod config;
mod game;
mod http;
mod util;
mod ws;

use std::sync::Arc;

use tokio::net::TcpListener;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use crate::app::AppState;
use crate::config::Config;
use crate::game::RoomRegistry;
use crate::http::build_router;
use crate::util::time::init_server_time;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    let config = Config::from_env()?;
    init_tracing(&config.log_level, config.log_json);
    init_server_time();

    info!(addr = %config.server_addr, "Starting Rajpath Server");
    info!(
        roll_timeout_secs = config.rules.roll_timeout.as_secs(),
        action_timeout_secs = config.rules.action_timeout.as_secs(),
        auction_secs = config.rules.auction_duration.as_secs(),
        start_money = config.rules.default_start_money,
        seeded = config.game_seed.is_some(),
        "Game rules loaded"
    );

    let addr = config.server_addr;
    let state = AppState::new(config);
    let rooms = Arc::clone(&state.rooms);
    let router = build_router(state);

    let listener = TcpListener::bind(addr).await?;
    info!("Listening on {} (ws://{}/ws)", addr, addr);

    axum::serve(listener, router)
        .with_graceful_shutdown(shutdown_signal(rooms))
        .await?;

    info!("Server shutdown complete");
    Ok(())
}

/// Initialize tracing/logging
fn init_tracing(log_level: &str, json: bool) {
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(log_level));

    let registry = tracing_subscriber::registry().with(env_filter);
    if json {
        registry
            .with(tracing_subscriber::fmt::layer().json().with_target(true))
            .init();
    } else {
        registry
            .with(tracing_subscriber::fmt::layer().with_target(true))
            .init();
    }
}

/// Resolves on Ctrl+C or SIGTERM. Rooms live in memory only, so whatever is
/// still open at that point is dropped.
async fn shutdown_signal(rooms: Arc<RoomRegistry>) {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!(error = %e, "Ctrl+C handler unavailable");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{signal, SignalKind};
        match signal(SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                warn!(error = %e, "SIGTERM handler unavailable");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => info!("Received Ctrl+C"),
        _ = terminate => info!("Received terminate signal"),
    }

    info!(
        open_rooms = rooms.active_rooms(),
        players = rooms.total_players(),
        "Shutting down, dropping open rooms"
    );
}
