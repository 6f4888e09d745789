//! ==============================================================================
//! backend - data server the dashboard polls
//! ==============================================================================
//!
//! purpose:
//!     serves recorded history, simulated serial data and the authenticated
//!     live node over http.
//!
//! routes:
//!     GET  /test                      liveness probe
//!     GET  /get_init_data/:count      first `count` recorded points
//!     GET  /get_serial_data/:count    same window, grown one point per poll
//!     GET  /get_live_data             live node (login required)
//!     POST /login                     {username, password}
//!
//! rate limiting:
//!     /login and /get_live_data share one rate limiter; over the limit they
//!     answer 429 {error}.
//!
//! relationships:
//!     - uses: dataset.rs, store.rs, limiter.rs
//!     - used by: main.rs (backend / standalone role)
//!     - consumed by: source.rs (HttpSource)
//!
//! ==============================================================================

pub mod dataset;
pub mod limiter;
pub mod store;

use crate::payload::{BulkPayload, Credentials, LiveEnvelope, LoginReply};
use crate::source::NOT_LOGGED_IN;
use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Json, Response},
    routing::{get, post},
    Router,
};
use dataset::Dataset;
use limiter::RateLimiter;
use std::sync::Arc;
use std::time::Duration;
use store::{LiveStore, LoginSession, StoreError};
use tokio::sync::Mutex;
use tower_http::cors::CorsLayer;

/// shared state of the backend routes
#[derive(Clone)]
pub struct BackendState {
    dataset: Arc<Dataset>,
    store: Arc<dyn LiveStore>,
    session: Arc<Mutex<LoginSession>>,
    limiter: Arc<Mutex<RateLimiter>>,
}

impl BackendState {
    pub fn new(
        dataset: Dataset,
        store: Arc<dyn LiveStore>,
        session_ttl: Duration,
        rate_limit_per_minute: u32,
    ) -> Self {
        Self {
            dataset: Arc::new(dataset),
            store,
            session: Arc::new(Mutex::new(LoginSession::new(session_ttl))),
            limiter: Arc::new(Mutex::new(RateLimiter::per_minute(rate_limit_per_minute))),
        }
    }

    async fn rate_limited(&self) -> bool {
        !self.limiter.lock().await.try_acquire()
    }
}

pub fn router(state: BackendState) -> Router {
    Router::new()
        .route("/test", get(test_handler))
        .route("/get_init_data/:count", get(bulk_handler))
        .route("/get_serial_data/:count", get(bulk_handler))
        .route("/get_live_data", get(live_handler))
        .route("/login", post(login_handler))
        .layer(CorsLayer::permissive())
        .with_state(state)
}

fn error_reply(status: StatusCode, error: impl Into<String>) -> Response {
    (status, Json(serde_json::json!({ "error": error.into() }))).into_response()
}

async fn test_handler() -> Json<serde_json::Value> {
    Json(serde_json::json!({"status": true, "message": "Server is live"}))
}

/// history and serial share a shape; serial just asks for a growing count
async fn bulk_handler(
    State(state): State<BackendState>,
    Path(count): Path<u64>,
) -> Json<BulkPayload> {
    tracing::debug!(count, "serving dataset window");
    Json(state.dataset.window(count))
}

async fn live_handler(State(state): State<BackendState>) -> Response {
    if state.rate_limited().await {
        tracing::warn!("live data rate limited");
        return error_reply(StatusCode::TOO_MANY_REQUESTS, "Too many requests, try again later");
    }
    if !state.session.lock().await.is_valid() {
        return error_reply(StatusCode::FORBIDDEN, NOT_LOGGED_IN);
    }

    match state.store.read_node().await {
        Ok(node) => Json(LiveEnvelope { message: node }).into_response(),
        Err(e) => {
            tracing::error!("live node read failed: {}", e);
            error_reply(StatusCode::INTERNAL_SERVER_ERROR, e.to_string())
        }
    }
}

async fn login_handler(
    State(state): State<BackendState>,
    Json(credentials): Json<Credentials>,
) -> Response {
    if state.rate_limited().await {
        tracing::warn!("login rate limited");
        return error_reply(StatusCode::TOO_MANY_REQUESTS, "Too many login attempts, try again later");
    }

    match state.store.authenticate(&credentials.username, &credentials.password).await {
        Ok(()) => {
            state.session.lock().await.begin();
            tracing::info!(username = %credentials.username, "login successful");
            Json(LoginReply { status: true, message: "Login successful".to_string() }).into_response()
        }
        Err(StoreError::InvalidCredentials) => {
            tracing::warn!(username = %credentials.username, "login rejected");
            (
                StatusCode::FORBIDDEN,
                Json(LoginReply { status: false, message: "Invalid username or password".to_string() }),
            )
                .into_response()
        }
        Err(e) => error_reply(StatusCode::INTERNAL_SERVER_ERROR, e.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::dataset::DatasetRow;
    use async_trait::async_trait;
    use axum::body::Body;
    use axum::http::Request;
    use serde_json::{json, Value};
    use tower::ServiceExt;

    struct FixedStore(Value);

    #[async_trait]
    impl LiveStore for FixedStore {
        async fn authenticate(&self, username: &str, password: &str) -> Result<(), StoreError> {
            if username == "admin" && password == "secret" {
                Ok(())
            } else {
                Err(StoreError::InvalidCredentials)
            }
        }

        async fn read_node(&self) -> Result<Value, StoreError> {
            Ok(self.0.clone())
        }
    }

    fn state(rate_limit: u32) -> BackendState {
        let rows = (0..40)
            .map(|i| DatasetRow {
                temperature: 20.0 + i as f64 * 0.1,
                humidity: 50.0,
                feels_like: 21.0,
                air_quality: 120.0,
                gas_adc: 150.0,
                fire: false,
                gas: false,
            })
            .collect();
        BackendState::new(
            Dataset::from_rows(rows).unwrap(),
            Arc::new(FixedStore(json!({"-a": {"temperature": 1}, "fire_node": true}))),
            Duration::from_secs(3600),
            rate_limit,
        )
    }

    async fn call(app: &Router, request: Request<Body>) -> (StatusCode, Value) {
        let response = app.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
        (status, serde_json::from_slice(&bytes).unwrap_or(Value::Null))
    }

    fn get_req(uri: &str) -> Request<Body> {
        Request::builder().uri(uri).body(Body::empty()).unwrap()
    }

    fn login_req(username: &str, password: &str) -> Request<Body> {
        Request::builder()
            .uri("/login")
            .method("POST")
            .header("content-type", "application/json")
            .body(Body::from(json!({"username": username, "password": password}).to_string()))
            .unwrap()
    }

    #[tokio::test]
    async fn test_liveness() {
        let app = router(state(10));
        let (status, body) = call(&app, get_req("/test")).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["message"], "Server is live");
    }

    #[tokio::test]
    async fn test_init_data_window() {
        let app = router(state(10));
        let (status, body) = call(&app, get_req("/get_init_data/30")).await;
        assert_eq!(status, StatusCode::OK);
        for key in ["bs_temp", "bs_hum", "bs_feel", "bs_mq135", "bs_gas_adc"] {
            assert_eq!(body[key].as_array().unwrap().len(), 30, "{}", key);
        }
        assert_eq!(body["bs_fire"], false);
        assert_eq!(body["bs_gas"], false);

        let (_, body) = call(&app, get_req("/get_serial_data/500")).await;
        assert_eq!(body["bs_temp"].as_array().unwrap().len(), 40);
    }

    #[tokio::test]
    async fn test_live_requires_login() {
        let app = router(state(10));
        let (status, body) = call(&app, get_req("/get_live_data")).await;
        assert_eq!(status, StatusCode::FORBIDDEN);
        assert_eq!(body["error"], NOT_LOGGED_IN);

        let (status, body) = call(&app, login_req("admin", "secret")).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], true);

        let (status, body) = call(&app, get_req("/get_live_data")).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["message"]["fire_node"], true);
    }

    #[tokio::test]
    async fn test_bad_login_is_forbidden() {
        let app = router(state(10));
        let (status, body) = call(&app, login_req("admin", "wrong")).await;
        assert_eq!(status, StatusCode::FORBIDDEN);
        assert_eq!(body["status"], false);
    }

    #[tokio::test]
    async fn test_rate_limit_returns_429() {
        let app = router(state(2));
        call(&app, login_req("admin", "secret")).await;
        let (status, _) = call(&app, get_req("/get_live_data")).await;
        assert_eq!(status, StatusCode::OK);

        let (status, body) = call(&app, get_req("/get_live_data")).await;
        assert_eq!(status, StatusCode::TOO_MANY_REQUESTS);
        assert!(body["error"].as_str().unwrap().contains("Too many requests"));
    }
}
