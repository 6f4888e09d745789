//! environmental monitoring dashboard host
//!
//! polls a sensor backend (recorded history, simulated serial replay or the
//! authenticated live node), validates and gap-fills the samples, and drives
//! a rendering collaborator. the data backend itself lives in `backend`.

pub mod api;
pub mod backend;
pub mod config;
pub mod controller;
pub mod domain;
pub mod error;
pub mod payload;
pub mod render;
pub mod source;

pub use controller::{PollingController, PollingPolicy, SessionMode, SessionStatus, StartOutcome};
pub use domain::{EmergencyState, FetchMode, Reading, Series, DEFAULT_READING};
pub use error::{FailureKind, FetchFailure};
pub use payload::Snapshot;
pub use source::{DataSource, FetchRequest, HttpSource};
