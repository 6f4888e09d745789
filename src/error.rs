//! fetch failures surfaced by the data source

use serde::Serialize;
use std::fmt;
use thiserror::Error;

/// what went wrong, each kind maps to one caller action
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    /// caller must log in
    Unauthorized,
    /// caller must stop polling
    RateLimited,
    /// caller may retry
    ServerError,
    /// transport failure, caller may retry
    NetworkError,
}

impl FailureKind {
    /// only a rate limit ends the polling session
    pub fn stops_polling(&self) -> bool {
        matches!(self, FailureKind::RateLimited)
    }

    pub fn alert_title(&self) -> &'static str {
        match self {
            FailureKind::Unauthorized => "Authentication Error",
            FailureKind::RateLimited => "Rate Limited",
            FailureKind::ServerError => "Server Error",
            FailureKind::NetworkError => "Connection Error",
        }
    }
}

impl fmt::Display for FailureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            FailureKind::Unauthorized => "unauthorized",
            FailureKind::RateLimited => "rate limited",
            FailureKind::ServerError => "server error",
            FailureKind::NetworkError => "network error",
        };
        f.write_str(s)
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Error, Serialize)]
#[error("{kind}: {message}")]
pub struct FetchFailure {
    pub kind: FailureKind,
    pub message: String,
}

impl FetchFailure {
    pub fn new(kind: FailureKind, message: impl Into<String>) -> Self {
        Self { kind, message: message.into() }
    }

    pub fn unauthorized(message: impl Into<String>) -> Self {
        Self::new(FailureKind::Unauthorized, message)
    }

    pub fn rate_limited(message: impl Into<String>) -> Self {
        Self::new(FailureKind::RateLimited, message)
    }

    pub fn server(message: impl Into<String>) -> Self {
        Self::new(FailureKind::ServerError, message)
    }

    pub fn network(message: impl Into<String>) -> Self {
        Self::new(FailureKind::NetworkError, message)
    }
}

/// a response body that could not be turned into a series
#[derive(Debug, Error, PartialEq)]
pub enum PayloadError {
    #[error("parallel arrays differ in length ({0})")]
    LengthMismatch(String),

    #[error("live node is not an object")]
    NotAnObject,

    #[error("no readings in response")]
    Empty,
}

impl From<PayloadError> for FetchFailure {
    fn from(e: PayloadError) -> Self {
        FetchFailure::server(format!("malformed payload: {}", e))
    }
}
