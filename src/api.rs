//! ==============================================================================
//! api.rs - dashboard control api
//! ==============================================================================
//!
//! purpose:
//!     the user actions of the dashboard as http endpoints, plus the rendered
//!     view as json for programmatic access.
//!
//! routes:
//!     GET  /api                   rendered view (latest, series, alerts, ...)
//!     GET  /api/monitor           session status
//!     POST /api/monitor/start     ?points=N&interval=S   simulated monitoring
//!     POST /api/monitor/login     {username, password, interval?}  live monitoring
//!     POST /api/monitor/stop
//!
//! relationships:
//!     - uses: controller.rs (actions), render.rs (view)
//!     - used by: main.rs (dashboard / standalone role)
//!
//! ==============================================================================

use crate::controller::{PollingController, SessionStatus, StartOutcome};
use crate::error::FailureKind;
use crate::payload::Credentials;
use crate::render::{DashboardBoard, DashboardView};
use axum::{
    extract::{Query, State},
    http::StatusCode,
    response::{IntoResponse, Json, Response},
    routing::{get, post},
    Router,
};
use serde::Deserialize;
use std::time::Duration;
use tower_http::cors::CorsLayer;

#[derive(Clone)]
pub struct ApiState {
    pub controller: PollingController,
    pub board: DashboardBoard,
    /// used when a request names no interval
    pub default_interval: Duration,
}

pub fn router(state: ApiState) -> Router {
    Router::new()
        .route("/api", get(view_handler))
        .route("/api/monitor", get(status_handler))
        .route("/api/monitor/start", post(start_handler))
        .route("/api/monitor/login", post(login_handler))
        .route("/api/monitor/stop", post(stop_handler))
        .layer(CorsLayer::permissive())
        .with_state(state)
}

async fn view_handler(State(state): State<ApiState>) -> Json<DashboardView> {
    Json(state.board.view().await)
}

async fn status_handler(State(state): State<ApiState>) -> Json<SessionStatus> {
    Json(state.controller.status().await)
}

/// simulation params
#[derive(Deserialize)]
struct StartParams {
    points: Option<u64>,
    /// seconds
    interval: Option<u64>,
}

async fn start_handler(
    State(state): State<ApiState>,
    Query(params): Query<StartParams>,
) -> Json<StartOutcome> {
    let interval = params
        .interval
        .map(Duration::from_secs)
        .unwrap_or(state.default_interval);
    let points = params.points.unwrap_or(1);
    Json(state.controller.start_simulated(points, interval).await)
}

#[derive(Deserialize)]
struct LoginBody {
    username: String,
    password: String,
    interval: Option<u64>,
}

async fn login_handler(State(state): State<ApiState>, Json(body): Json<LoginBody>) -> Response {
    let interval = body
        .interval
        .map(Duration::from_secs)
        .unwrap_or(state.default_interval);
    let credentials = Credentials {
        username: body.username,
        password: body.password,
    };

    match state.controller.login(&credentials, interval).await {
        Ok(outcome) => Json(outcome).into_response(),
        Err(failure) => {
            let status = match failure.kind {
                FailureKind::Unauthorized => StatusCode::FORBIDDEN,
                FailureKind::RateLimited => StatusCode::TOO_MANY_REQUESTS,
                _ => StatusCode::BAD_GATEWAY,
            };
            (status, Json(failure)).into_response()
        }
    }
}

async fn stop_handler(State(state): State<ApiState>) -> Json<serde_json::Value> {
    let stopped = state.controller.stop().await;
    Json(serde_json::json!({ "stopped": stopped }))
}
