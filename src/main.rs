//! Match script server - extension layering, countdown timer and
//! rate-limited IRC narration for a capture-the-flag game server
//!
//! The game engine reports sessions, flag/kill events and chat commands over
//! HTTP. This process owns:
//! - the composed behavior extensions that react to those events
//! - the `timer` / `stoptimer` admin commands
//! - the outbound relay to in-game chat (websocket feed) and IRC

mod app;
mod commands;
mod config;
mod game;
mod http;
mod relay;
mod script;
mod util;
mod ws;

use std::net::SocketAddr;
use std::sync::Arc;

use tokio::net::TcpListener;
use tokio::sync::{broadcast, mpsc};
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use crate::app::AppState;
use crate::config::Config;
use crate::game::session::Teams;
use crate::game::{MatchServer, MatchSettings};
use crate::http::build_router;
use crate::relay::irc::run_irc_bridge;
use crate::relay::RelayHub;
use crate::script::{DefaultConnection, MatchExtension};
use crate::util::time::{init_server_time, SystemClock};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment variables
    dotenvy::dotenv().ok();

    // Load configuration
    let config = Config::from_env()?;

    // Initialize tracing
    init_tracing(&config.log_level);

    // Initialize server time tracking
    init_server_time();

    info!("Starting match script server");
    info!("Server address: {}", config.server_addr);
    info!(
        admin_token = %hex::encode(&http::middleware::token_digest(&config.admin_token)[..4]),
        "Admin token fingerprint"
    );

    // Outbound relay: chat feed + IRC bridge
    let (chat_tx, _) = broadcast::channel(256);
    let (irc_tx, irc_rx) = mpsc::unbounded_channel();
    let relay = RelayHub::new(chat_tx, irc_tx);
    tokio::spawn(run_irc_bridge(irc_rx, config.irc_webhook_url.clone()));

    // Match loop with the match script layered over the base behavior
    let settings = MatchSettings {
        teams: Teams::new(config.blue_team_name.clone(), config.green_team_name.clone()),
        drain_interval: config.drain_interval,
    };
    let (match_server, match_handle) = MatchServer::new(
        settings,
        Arc::new(SystemClock::new()),
        Arc::new(relay.clone()),
        Box::new(DefaultConnection),
        vec![Box::new(MatchExtension::new())],
    );
    info!(match_id = %match_handle.id, "Match created");

    let state = AppState::new(config.clone(), match_handle, relay);
    tokio::spawn(match_server.run());

    // Build router
    let router = build_router(state);

    // Start server
    let addr: SocketAddr = config.server_addr;
    let listener = TcpListener::bind(addr).await?;

    info!("Server listening on {}", addr);
    info!("Health check: http://{}/health", addr);
    info!("Chat feed: ws://{}/ws", addr);

    axum::serve(listener, router)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("Server shutdown complete");
    Ok(())
}

/// Initialize tracing/logging
fn init_tracing(log_level: &str) {
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(log_level));

    tracing_subscriber::registry()
        .with(env_filter)
        .with(tracing_subscriber::fmt::layer().with_target(true))
        .init();
}

/// Graceful shutdown signal handler
async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("Failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C, starting graceful shutdown");
        }
        _ = terminate => {
            info!("Received terminate signal, starting graceful shutdown");
        }
    }
}
