//! ==============================================================================
//! store.rs - live node store and login session
//! ==============================================================================
//!
//! purpose:
//!     stands in for the cloud database the live sensor node writes to. the
//!     backend logs in once with the configured account and then reads the
//!     node (a json object keyed by sample id, plus fire_node / gas_node).
//!
//! storage:
//!     FileLiveStore re-reads a json file on every request so another process
//!     (a sensor bridge, a test) can update it while the backend runs.
//!
//! ==============================================================================

use async_trait::async_trait;
use serde_json::Value;
use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;
use tokio::time::Instant;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("invalid username or password")]
    InvalidCredentials,

    #[error("failed to read live node: {0}")]
    Io(#[from] std::io::Error),

    #[error("live node is not valid json: {0}")]
    Json(#[from] serde_json::Error),
}

#[async_trait]
pub trait LiveStore: Send + Sync {
    async fn authenticate(&self, username: &str, password: &str) -> Result<(), StoreError>;

    async fn read_node(&self) -> Result<Value, StoreError>;
}

pub struct FileLiveStore {
    path: PathBuf,
    username: String,
    password: String,
}

impl FileLiveStore {
    pub fn new(path: impl Into<PathBuf>, username: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            username: username.into(),
            password: password.into(),
        }
    }
}

#[async_trait]
impl LiveStore for FileLiveStore {
    async fn authenticate(&self, username: &str, password: &str) -> Result<(), StoreError> {
        if username == self.username && password == self.password {
            Ok(())
        } else {
            Err(StoreError::InvalidCredentials)
        }
    }

    async fn read_node(&self) -> Result<Value, StoreError> {
        tracing::debug!(path = %self.path.display(), "reading live node");
        let raw = tokio::fs::read_to_string(&self.path).await?;
        Ok(serde_json::from_str(&raw)?)
    }
}

// ==============================================================================
// login session
// ==============================================================================

/// the backend's login; one account, expires after a ttl
#[derive(Debug)]
pub struct LoginSession {
    ttl: Duration,
    logged_in_at: Option<Instant>,
}

impl LoginSession {
    pub fn new(ttl: Duration) -> Self {
        Self { ttl, logged_in_at: None }
    }

    pub fn begin(&mut self) {
        self.logged_in_at = Some(Instant::now());
    }

    pub fn is_valid(&self) -> bool {
        self.logged_in_at
            .map(|at| at.elapsed() <= self.ttl)
            .unwrap_or(false)
    }
}
