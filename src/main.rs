//! AquaTwin Core - Simulation and Streaming Service
//!
//! Digital-twin backend for a water-distribution network: a fixed-period
//! tick loop synthesizes sensor telemetry, solves the perturbed network
//! through the hydraulic collaborator, scores leak likelihood, and fans the
//! resulting frame out to push (WebSocket) and pull (poll) subscribers.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────┐
//! │                        AQUATWIN CORE                         │
//! ├──────────────────────────────────────────────────────────────┤
//! │  ┌───────────┐   ┌──────────────┐   ┌─────────────────────┐  │
//! │  │ Command   │   │  Tick Loop   │   │  Broadcast Hub      │  │
//! │  │ API       │──▶│ signal→solve │──▶│  push + latest slot │  │
//! │  │ (Axum)    │   │ →score→frame │   │                     │  │
//! │  └───────────┘   └──────┬───────┘   └──────────┬──────────┘  │
//! │        │                ▼                      ▼             │
//! │  ┌───────────┐   ┌──────────────┐       WS / poll clients    │
//! │  │ Scenario  │   │  Telemetry   │                            │
//! │  │ Store     │   │  Event Log   │                            │
//! │  └───────────┘   └──────────────┘                            │
//! └──────────────────────────────────────────────────────────────┘
//! ```

mod config;
mod error;
mod handlers;
mod models;
mod sim;
mod telemetry;

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use axum::{
    routing::{get, post, put},
    Router,
};
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use models::Topology;
use sim::anomaly::{AnomalyScorer, ScoreWeights, Thresholds};
use sim::history::RecentHistory;
use sim::hub::BroadcastHub;
use sim::scenario::ScenarioStore;
use sim::scheduler::{EngineCore, TickScheduler};
use sim::signal::SignalGenerator;
use sim::solver::{PropagationSolver, SolverAdapter};
use telemetry::EventLog;

pub use error::{AppError, AppResult};

#[tokio::main]
async fn main() {
    // Initialize logging
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| "aquatwin_core=debug,tower_http=debug".into()))
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Load configuration
    dotenvy::dotenv().ok();
    let config = config::Config::from_env();

    tracing::info!("AquaTwin Core starting...");

    // Topology load is the one fatal precondition
    let topology = Arc::new(
        Topology::load(&config.topology_path).expect("Failed to load network topology"),
    );
    tracing::info!(
        nodes = topology.nodes.len(),
        links = topology.links.len(),
        "Topology loaded from {}",
        config.topology_path
    );

    let events = Arc::new(match &config.telemetry_dir {
        Some(dir) => EventLog::open(dir).expect("Failed to open telemetry event log"),
        None => EventLog::disabled(),
    });

    let store = Arc::new(ScenarioStore::new(Arc::clone(&topology)));
    let hub = Arc::new(BroadcastHub::new(
        config.subscriber_capacity,
        config.subscriber_max_lag,
    ));
    let history = Arc::new(RecentHistory::new(config.history_capacity));
    let scorer = Arc::new(AnomalyScorer::new(
        ScoreWeights {
            pressure: config.score_weight_pressure,
            kurtosis: config.score_weight_kurtosis,
            rms: config.score_weight_rms,
        },
        config.pressure_drop_divisor,
        Thresholds { warn: config.warn_threshold, leak: config.leak_threshold },
    ));
    let adapter = SolverAdapter::new(
        Arc::new(PropagationSolver),
        Arc::clone(&topology),
        Duration::from_millis(config.solver_timeout_ms),
    );

    let core = EngineCore::new(
        SignalGenerator::new(config.signal_seed),
        adapter,
        Arc::clone(&scorer),
        Arc::clone(&store),
        Arc::clone(&hub),
        Arc::clone(&history),
        Arc::clone(&events),
        &topology,
        Duration::from_millis(config.tick_interval_ms),
        config.solver_failure_streak,
    );
    let scheduler = Arc::new(TickScheduler::new(core));
    scheduler.start().await;

    // Build application state
    let state = AppState {
        config: config.clone(),
        topology,
        store,
        hub,
        history,
        scorer,
        scheduler: Arc::clone(&scheduler),
    };

    // Build router
    let app = create_router(state);

    // Start server
    let addr = SocketAddr::from(([0, 0, 0, 0], config.port));
    tracing::info!("Server listening on http://{}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await.unwrap();
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .unwrap();

    // Drain the in-flight tick before exiting
    scheduler.stop().await;
}

async fn shutdown_signal() {
    tokio::signal::ctrl_c()
        .await
        .expect("Failed to install Ctrl+C handler");
    tracing::info!("Shutdown signal received");
}

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    pub config: config::Config,
    pub topology: Arc<Topology>,
    pub store: Arc<ScenarioStore>,
    pub hub: Arc<BroadcastHub>,
    pub history: Arc<RecentHistory>,
    pub scorer: Arc<AnomalyScorer>,
    pub scheduler: Arc<TickScheduler>,
}

/// Create the main router with all routes
fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(handlers::health::check))
        .route("/ws", get(handlers::stream::ws))

        // Scenario commands
        .route("/api/v1/scenarios/leak", post(handlers::scenarios::inject_leak))
        .route("/api/v1/scenarios/demand-spike", post(handlers::scenarios::demand_spike))
        .route("/api/v1/scenarios/clear-leaks", post(handlers::scenarios::clear_leaks))
        .route("/api/v1/scenarios", get(handlers::scenarios::current))

        // Readings and anomalies
        .route("/api/v1/readings/recent", get(handlers::readings::recent_readings))
        .route("/api/v1/anomalies/recent", get(handlers::readings::recent_anomalies))

        // Network and frames
        .route("/api/v1/network", get(handlers::network::get))
        .route("/api/v1/frames/latest", get(handlers::stream::latest))

        // Engine control
        .route("/api/v1/engine/status", get(handlers::engine::status))
        .route("/api/v1/engine/start", post(handlers::engine::start))
        .route("/api/v1/engine/stop", post(handlers::engine::stop))
        .route("/api/v1/thresholds", put(handlers::engine::update_thresholds))

        .layer(TraceLayer::new_for_http())
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any)
        )
        .with_state(state)
}
