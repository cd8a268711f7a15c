// Framework bootstrap for the arena server runtime.

use crate::frameworks::config;
use crate::interface_adapters::protocol::JsonFrameEncoder;
use crate::interface_adapters::routes::app;
use crate::interface_adapters::state::AppState;
use crate::use_cases::{
    ActivityTracker, ArenaSimulation, BusSettings, ControlHandle, EventBus, GameLoop,
    GameLoopSettings, control_channel, run_ticker,
};

use std::net::SocketAddr;
use std::{io::Result, sync::Arc};
use tokio::sync::watch;

fn init_runtime() {
    let _ = dotenvy::dotenv();

    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));

    let json = matches!(std::env::var("LOG_FORMAT").as_deref(), Ok("json"));
    if json {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_target(false)
            .json()
            .with_current_span(true)
            .init();
    } else {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_target(false)
            .compact()
            .init();
    }

    std::panic::set_hook(Box::new(|info| {
        let backtrace = std::backtrace::Backtrace::capture();
        tracing::error!(%info, ?backtrace, "panic");
    }));
}

/// Serves `/ws` and `/stats` on `listener` until the game loop shuts down.
pub async fn run(listener: tokio::net::TcpListener) -> Result<()> {
    let address = listener.local_addr()?;
    let state = build_state();
    let shutdown = state.shutdown.clone();
    tokio::spawn(shutdown_on_ctrl_c(state.control.clone()));

    let app = app(state);
    tracing::info!(%address, "listening");

    // Serve app and report errors rather than panicking
    axum::serve(listener, app)
        .with_graceful_shutdown(wait_for_shutdown(shutdown))
        .await
        .inspect_err(|e| {
            tracing::error!(error = %e, "server error");
        })
}

pub async fn run_with_config() -> Result<()> {
    init_runtime();

    let address = SocketAddr::from(([127, 0, 0, 1], config::http_port()));

    // Bind TCP listener with error handling
    let listener = tokio::net::TcpListener::bind(address)
        .await
        .inspect_err(|e| {
            tracing::error!(%address, error = %e, "failed to bind");
        })?;

    run(listener).await
}

// Wires the bus, the game loop and its observers, then starts the ticker and
// the dispatch loop.
fn build_state() -> Arc<AppState> {
    let settings = GameLoopSettings {
        control_budget: config::control_budget(),
        leaderboard_every: config::LEADERBOARD_EVERY_FRAMES,
        stats_every: config::STATS_EVERY_FRAMES,
        max_step: config::MAX_STEP,
    };
    let tick_interval = config::tick_interval();
    let queue_capacity = config::event_queue_capacity();

    let mut bus = EventBus::new(BusSettings {
        queue_capacity,
        idle_sleep: config::IDLE_SLEEP,
    });
    let (control, control_rx) = control_channel(config::CONTROL_CHANNEL_CAPACITY);

    tracing::info!(
        tick_interval_us = tick_interval.as_micros() as u64,
        control_budget = ?settings.control_budget,
        queue_capacity,
        "game loop configured"
    );

    let game_loop = GameLoop::new(
        control_rx,
        bus.publisher(),
        ArenaSimulation::new(),
        JsonFrameEncoder,
        settings,
    );
    let shutdown = game_loop.shutdown_signal();
    let loop_stats = game_loop.stats();
    let game_loop_id = bus.register(game_loop);
    for kind in GameLoop::KINDS {
        bus.subscribe(kind, game_loop_id);
    }

    let (tracker, activity) = ActivityTracker::new();
    let tracker_id = bus.register(tracker);
    for kind in ActivityTracker::KINDS {
        bus.subscribe(kind, tracker_id);
    }

    tokio::spawn(run_ticker(bus.publisher(), tick_interval, shutdown.clone()));
    tokio::spawn(bus.run(shutdown.clone()));

    Arc::new(AppState {
        control,
        loop_stats,
        activity,
        shutdown,
        outbound_capacity: config::SESSION_OUTBOUND_CAPACITY,
    })
}

async fn wait_for_shutdown(mut shutdown: watch::Receiver<bool>) {
    // A dropped sender means the game loop is gone, which is a shutdown too.
    let _ = shutdown.wait_for(|stopped| *stopped).await;
    tracing::info!("shutting down http server");
}

async fn shutdown_on_ctrl_c(control: ControlHandle) {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::warn!(error = %e, "ctrl-c handler unavailable");
        return;
    }
    tracing::info!("ctrl-c received");
    if control.shutdown().await.is_err() {
        tracing::debug!("game loop already stopped");
    }
}
