//! ==============================================================================
//! main.rs - dashboard host entry point
//! ==============================================================================
//!
//! purpose:
//!     runs the environmental monitoring dashboard. depending on `node.role`
//!     this process serves the sensor data backend, runs the polling
//!     controller behind the dashboard control api, or both.
//!
//! responsibilities:
//!     - load configuration and initialise logging
//!     - load the recorded dataset and open the live node store (backend)
//!     - fetch the initial history and wait for the user to start monitoring
//!       (dashboard)
//!     - serve both http routers until shutdown
//!
//! architecture:
//!
//!     ┌─────────────────────────────────────────────────────────────┐
//!     │                    dashboard host (this file)                │
//!     │  ┌──────────────────┐            ┌───────────────────────┐   │
//!     │  │ control api      │            │ data backend          │   │
//!     │  │ (port 3000)      │            │ (port 5454)           │   │
//!     │  └────────┬─────────┘            └───────────▲───────────┘   │
//!     │           │ start / login / stop             │ http          │
//!     │  ┌────────▼─────────┐  fetch     ┌───────────┴───────────┐   │
//!     │  │ polling          │ ─────────▶ │ http source           │   │
//!     │  │ controller       │            │ (validate + gap-fill) │   │
//!     │  └────────┬─────────┘            └───────────────────────┘   │
//!     │           │ render                                           │
//!     │  ┌────────▼─────────┐                                        │
//!     │  │ dashboard board  │ -> GET /api                            │
//!     │  └──────────────────┘                                        │
//!     └─────────────────────────────────────────────────────────────┘
//!
//! ==============================================================================

use anyhow::{Context, Result};
use envdash::api::{self, ApiState};
use envdash::backend::{self, dataset::Dataset, store::FileLiveStore, BackendState};
use envdash::config::DashConfig;
use envdash::render::DashboardBoard;
use envdash::{HttpSource, PollingController, PollingPolicy};
use std::sync::Arc;
use std::time::Duration;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<()> {
    // startup banner
    println!("===========================================================");
    println!("  Environmental Monitoring Dashboard Host");
    println!("===========================================================");

    // step 1: load configuration
    let config = DashConfig::load_or_default();
    config.print_summary();

    // step 2: logging, RUST_LOG wins over the config file
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&config.logging.level));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    let mut tasks = tokio::task::JoinSet::new();

    // step 3: data backend
    if config.node.role.runs_backend() {
        let app = build_backend(&config)?;
        let listener = tokio::net::TcpListener::bind(&config.backend.bind)
            .await
            .with_context(|| format!("failed to bind backend on {}", config.backend.bind))?;
        tracing::info!("data backend live at http://{}", config.backend.bind);
        tasks.spawn(async move { axum::serve(listener, app).await.context("backend server") });
    }

    // step 4: polling controller + control api
    if config.node.role.runs_dashboard() {
        let (app, controller) = build_dashboard(&config)?;
        let listener = tokio::net::TcpListener::bind(&config.dashboard.bind)
            .await
            .with_context(|| format!("failed to bind control api on {}", config.dashboard.bind))?;
        tracing::info!("dashboard api live at http://{}/api", config.dashboard.bind);
        tasks.spawn(async move { axum::serve(listener, app).await.context("control api server") });

        // first page load; live monitoring waits for an explicit start
        let initial_points = config.dashboard.initial_points;
        tokio::spawn(async move {
            if let Err(e) = controller.load_history(initial_points).await {
                tracing::warn!("initial history unavailable: {}", e);
            }
        });
    }

    // any server exiting is fatal for the host
    match tasks.join_next().await {
        Some(Ok(result)) => result,
        Some(Err(e)) => Err(e.into()),
        None => Ok(()),
    }
}

fn build_backend(config: &DashConfig) -> Result<axum::Router> {
    let dataset = Dataset::load(&config.backend.dataset_path)
        .with_context(|| format!("loading {}", config.backend.dataset_path.display()))?;
    tracing::info!(points = dataset.len(), "dataset loaded");

    let store = FileLiveStore::new(
        &config.backend.live_node_path,
        &config.backend.username,
        &config.backend.password,
    );
    let state = BackendState::new(
        dataset,
        Arc::new(store),
        Duration::from_secs(config.backend.session_ttl_seconds),
        config.backend.rate_limit_per_minute,
    );
    Ok(backend::router(state))
}

fn build_dashboard(config: &DashConfig) -> Result<(axum::Router, PollingController)> {
    let source = HttpSource::new(
        &config.dashboard.backend_url,
        Duration::from_secs(config.dashboard.request_timeout_seconds),
    )?;
    let board = DashboardBoard::new(config.logging.show_sensor_data);
    let policy = PollingPolicy {
        min_interval: Duration::from_secs(config.polling.min_interval_seconds),
        max_points: config.polling.max_points,
    };
    let controller = PollingController::new(
        Arc::new(source),
        Arc::new(board.clone()),
        Arc::new(board.clone()),
        policy,
    );

    let app = api::router(ApiState {
        controller: controller.clone(),
        board,
        default_interval: config.polling.interval(),
    });
    Ok((app, controller))
}
