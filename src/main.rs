//! Click Racer Server
//!
//! One authoritative race room shared by every connected client. Players
//! join a lobby over `/ws`, start a countdown, and click their cars around a
//! three-lap track while the server runs the physics at 20 ticks/s and keeps
//! a top-10 table of best finish times (also served at `/leaderboard`).

mod app;
mod config;
mod game;
mod http;
mod util;
mod ws;

use tokio::net::TcpListener;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use crate::app::AppState;
use crate::config::Config;
use crate::game::session::session_seed;
use crate::game::{GameRoom, RaceRules, RoomHandle};
use crate::http::build_router;
use crate::util::time::init_server_time;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let config = Config::from_env()?;

    init_tracing(&config.log_level);
    init_server_time();

    info!(addr = %config.server_addr, "Starting Click Racer Server");

    let room = spawn_room(&config);
    let router = build_router(AppState::new(config.clone(), room));

    let listener = TcpListener::bind(config.server_addr).await?;
    info!(
        "Accepting players on ws://{0}/ws (health at http://{0}/health)",
        config.server_addr
    );

    axum::serve(listener, router)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("Server shutdown complete");
    Ok(())
}

/// Start the race room task with the configured (or a random) seed
fn spawn_room(config: &Config) -> RoomHandle {
    let seed = session_seed(config.race_seed);
    let rules = RaceRules::default();
    info!(
        seed,
        track_length = rules.track_length,
        laps = rules.laps_to_win,
        "Race room configured"
    );

    let (room, handle) = GameRoom::new(rules, seed);
    tokio::spawn(room.run());
    handle
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

/// Resolves on Ctrl+C or SIGTERM
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
        _ = ctrl_c => info!("Ctrl+C received, draining connections"),
        _ = terminate => info!("SIGTERM received, draining connections"),
    }
}
