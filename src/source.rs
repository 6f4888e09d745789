//! ==============================================================================
//! source.rs - data source selector
//! ==============================================================================
//!
//! purpose:
//!     one fetch against the backend per refresh cycle. the request shape is
//!     picked by the caller (history on first load, serial while simulating,
//!     live after login); the response is decoded into a Snapshot or a typed
//!     FetchFailure the polling controller can act on.
//!
//! relationships:
//!     - used by: controller.rs (through the DataSource trait)
//!     - uses: payload.rs (decode + gap-fill)
//!     - talks to: backend (GET /get_init_data, /get_serial_data, /get_live_data,
//!                          POST /login)
//!
//! ==============================================================================

use crate::domain::FetchMode;
use crate::error::FetchFailure;
use crate::payload::{self, BulkPayload, Credentials, ErrorBody, LiveEnvelope, LoginReply, Snapshot};
use async_trait::async_trait;
use std::time::Duration;

/// error text the backend sends when no login session exists
pub const NOT_LOGGED_IN: &str = "Unauthorized to access data";

/// one request of a refresh cycle
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FetchRequest {
    History { count: u64 },
    Serial { count: u64 },
    Live,
}

impl FetchRequest {
    pub fn mode(&self) -> FetchMode {
        match self {
            FetchRequest::History { .. } => FetchMode::InitialHistory,
            FetchRequest::Serial { .. } => FetchMode::SimulatedSerial,
            FetchRequest::Live => FetchMode::AuthenticatedLive,
        }
    }

    pub fn path(&self) -> String {
        match self {
            FetchRequest::History { count } => format!("/get_init_data/{}", count),
            FetchRequest::Serial { count } => format!("/get_serial_data/{}", count),
            FetchRequest::Live => "/get_live_data".to_string(),
        }
    }

    /// rolling window bound for the resulting series
    fn limit(&self) -> Option<usize> {
        match self {
            FetchRequest::History { count } | FetchRequest::Serial { count } => {
                Some((*count).max(1) as usize)
            }
            FetchRequest::Live => None,
        }
    }
}

#[async_trait]
pub trait DataSource: Send + Sync {
    async fn fetch(&self, request: FetchRequest) -> Result<Snapshot, FetchFailure>;

    async fn login(&self, credentials: &Credentials) -> Result<(), FetchFailure>;
}

// ==============================================================================
// status classification
// ==============================================================================

/// endpoint a non-200 status came from, 403 means different things per route
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Endpoint {
    Data,
    Live,
    Login,
}

/// map a non-success status (+ optional error text) to a failure
pub fn classify_status(endpoint: Endpoint, status: u16, error: Option<&str>) -> FetchFailure {
    let reason = error.unwrap_or("no reason given");
    match (status, endpoint) {
        (403, Endpoint::Login) => FetchFailure::unauthorized("Invalid username or password"),
        (403, _) if error == Some(NOT_LOGGED_IN) => {
            FetchFailure::unauthorized("Please log in to access live data")
        }
        (403, _) => FetchFailure::unauthorized(format!("Access denied: {}", reason)),
        (429, _) => FetchFailure::rate_limited(format!("Too many requests: {}", reason)),
        (code, _) => FetchFailure::server(format!("Unknown error (HTTP {}): {}", code, reason)),
    }
}

fn network(e: reqwest::Error) -> FetchFailure {
    FetchFailure::network(format!("Failed to connect to server: {}", e))
}

/// body read failed; a transport error mid-body is still a network failure
fn undecodable(what: &'static str) -> impl Fn(reqwest::Error) -> FetchFailure {
    move |e| {
        if e.is_timeout() || e.is_body() {
            network(e)
        } else {
            FetchFailure::server(format!("undecodable {}: {}", what, e))
        }
    }
}

// ==============================================================================
// http implementation
// ==============================================================================

#[derive(Clone)]
pub struct HttpSource {
    client: reqwest::Client,
    base_url: String,
}

impl HttpSource {
    pub fn new(base_url: &str, timeout: Duration) -> anyhow::Result<Self> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    /// turn a non-200 response into a failure, reading its error body if any
    async fn reject(endpoint: Endpoint, response: reqwest::Response) -> FetchFailure {
        let status = response.status().as_u16();
        let body: ErrorBody = response.json().await.unwrap_or_default();
        classify_status(endpoint, status, body.error.as_deref())
    }
}

#[async_trait]
impl DataSource for HttpSource {
    async fn fetch(&self, request: FetchRequest) -> Result<Snapshot, FetchFailure> {
        let url = self.url(&request.path());
        tracing::debug!(%url, mode = ?request.mode(), "fetching");

        let response = self.client.get(&url).send().await.map_err(network)?;

        let endpoint = match request {
            FetchRequest::Live => Endpoint::Live,
            _ => Endpoint::Data,
        };
        if !response.status().is_success() {
            return Err(Self::reject(endpoint, response).await);
        }

        let snapshot = match request {
            FetchRequest::Live => {
                let envelope: LiveEnvelope = response
                    .json()
                    .await
                    .map_err(undecodable("live data"))?;
                payload::decode_live_node(&envelope.message)?
            }
            _ => {
                let bulk: BulkPayload = response
                    .json()
                    .await
                    .map_err(undecodable("data"))?;
                bulk.into_snapshot(request.limit())?
            }
        };

        if snapshot.substituted > 0 {
            tracing::debug!(substituted = snapshot.substituted, "gap-filled invalid samples");
        }
        Ok(snapshot)
    }

    async fn login(&self, credentials: &Credentials) -> Result<(), FetchFailure> {
        tracing::info!(username = %credentials.username, "login attempted");

        let response = self
            .client
            .post(self.url("/login"))
            .json(credentials)
            .send()
            .await
            .map_err(network)?;

        if !response.status().is_success() {
            return Err(Self::reject(Endpoint::Login, response).await);
        }

        let reply: LoginReply = response
            .json()
            .await
            .map_err(undecodable("login reply"))?;
        if reply.status {
            Ok(())
        } else {
            Err(FetchFailure::unauthorized("Invalid username or password"))
        }
    }
}
