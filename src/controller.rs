//! ==============================================================================
//! controller.rs - polling controller
//! ==============================================================================
//!
//! purpose:
//!     owns the live monitoring session. a session is a repeating timer that
//!     drives one fetch -> validate -> render cycle per tick.
//!
//! state machine:
//!
//! ```text
//!     ┌──────┐  start (simulated | login ok)   ┌────────┐
//!     │ idle │ ───────────────────────────────▶ │ active │
//!     │      │ ◀─────────────────────────────── │        │
//!     └──────┘   stop | 429 rate limited        └────────┘
//! ```
//!
//! transitions:
//!     - start while active and stop while idle do nothing
//!     - unauthorized / server / network failures keep the session active;
//!       the next tick retries at the same interval
//!
//! concurrency:
//!     each session runs in its own task and awaits its fetch inline, so a
//!     slow response delays the next tick instead of overlapping it (missed
//!     ticks are skipped). stop does not cancel an in-flight request; every
//!     session carries a generation number and a response whose generation
//!     is no longer current is dropped before it reaches the renderer.
//!
//! relationships:
//!     - uses: source.rs (DataSource trait)
//!     - uses: render.rs (Renderer + AlertSink traits)
//!     - used by: api.rs (user actions), main.rs (initial history load)
//!
//! ==============================================================================

use crate::error::{FailureKind, FetchFailure};
use crate::payload::{Credentials, Snapshot};
use crate::render::{Alert, AlertSink, Renderer, SCATTERS, SERIES_CHANNELS};
use crate::source::{DataSource, FetchRequest};
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{watch, Mutex};
use tokio::time::{interval_at, Instant, MissedTickBehavior};

/// polling limits
#[derive(Clone, Copy, Debug)]
pub struct PollingPolicy {
    /// floor for the refresh interval, bounds the request rate
    pub min_interval: Duration,
    /// upper bound for the simulated point counter (dataset size)
    pub max_points: u64,
}

impl Default for PollingPolicy {
    fn default() -> Self {
        Self {
            min_interval: Duration::from_secs(3),
            max_points: 1311,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionMode {
    /// serial replay of the recorded dataset
    Simulated,
    /// authenticated live node
    Live,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum StartOutcome {
    Started {
        #[serde(with = "secs")]
        interval: Duration,
    },
    AlreadyActive,
}

/// what /api/monitor reports
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum SessionStatus {
    Idle,
    Active {
        mode: SessionMode,
        #[serde(with = "secs")]
        interval: Duration,
        /// last successfully applied point count (simulated only)
        points: u64,
    },
}

mod secs {
    use serde::Serializer;
    use std::time::Duration;

    pub fn serialize<S: Serializer>(d: &Duration, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_u64(d.as_secs())
    }
}

// ==============================================================================
// session
// ==============================================================================

struct Session {
    generation: u64,
    mode: SessionMode,
    interval: Duration,
    points: u64,
    /// simulated counter ceiling, the window stops growing here
    max_points: u64,
    /// dropping or signalling this ends the timer loop
    stop_tx: watch::Sender<bool>,
}

impl Session {
    fn next_request(&self) -> FetchRequest {
        match self.mode {
            SessionMode::Simulated => FetchRequest::Serial {
                count: (self.points + 1).min(self.max_points),
            },
            SessionMode::Live => FetchRequest::Live,
        }
    }

    fn advance(&mut self) {
        if self.mode == SessionMode::Simulated {
            self.points = (self.points + 1).min(self.max_points);
        }
    }
}

#[derive(Default)]
struct State {
    session: Option<Session>,
    next_generation: u64,
}

impl State {
    fn current(&mut self, generation: u64) -> Option<&mut Session> {
        self.session.as_mut().filter(|s| s.generation == generation)
    }
}

struct Inner {
    source: Arc<dyn DataSource>,
    renderer: Arc<dyn Renderer>,
    alerts: Arc<dyn AlertSink>,
    policy: PollingPolicy,
    state: Mutex<State>,
}

// ==============================================================================
// controller - public interface
// ==============================================================================

#[derive(Clone)]
pub struct PollingController {
    inner: Arc<Inner>,
}

impl PollingController {
    pub fn new(
        source: Arc<dyn DataSource>,
        renderer: Arc<dyn Renderer>,
        alerts: Arc<dyn AlertSink>,
        policy: PollingPolicy,
    ) -> Self {
        Self {
            inner: Arc::new(Inner {
                source,
                renderer,
                alerts,
                policy,
                state: Mutex::new(State::default()),
            }),
        }
    }

    /// start a session; no-op while one is active
    pub async fn start(&self, mode: SessionMode, points: u64, interval: Duration) -> StartOutcome {
        let mut state = self.inner.state.lock().await;
        if state.session.is_some() {
            tracing::debug!("start ignored, live monitoring already active");
            return StartOutcome::AlreadyActive;
        }

        let interval = interval.max(self.inner.policy.min_interval);
        let generation = state.next_generation;
        state.next_generation += 1;

        let (stop_tx, stop_rx) = watch::channel(false);
        state.session = Some(Session {
            generation,
            mode,
            interval,
            points,
            max_points: self.inner.policy.max_points.max(1),
            stop_tx,
        });
        drop(state);

        tokio::spawn(run_session(self.inner.clone(), generation, interval, stop_rx));

        tracing::info!(?mode, interval_secs = interval.as_secs(), points, "live monitoring started");
        StartOutcome::Started { interval }
    }

    /// start replaying the recorded dataset from `points`
    pub async fn start_simulated(&self, points: u64, interval: Duration) -> StartOutcome {
        let points = points.clamp(1, self.inner.policy.max_points.max(1));
        self.start(SessionMode::Simulated, points, interval).await
    }

    /// authenticate, then start polling the live node
    pub async fn login(
        &self,
        credentials: &Credentials,
        interval: Duration,
    ) -> Result<StartOutcome, FetchFailure> {
        match self.inner.source.login(credentials).await {
            Ok(()) => Ok(self.start(SessionMode::Live, 0, interval).await),
            Err(failure) => {
                tracing::warn!(kind = %failure.kind, "login failed: {}", failure.message);
                self.inner
                    .alerts
                    .alert(Alert::new(failure.kind.alert_title(), failure.message.clone()))
                    .await;
                Err(failure)
            }
        }
    }

    /// end the session, true if one was active
    pub async fn stop(&self) -> bool {
        let mut state = self.inner.state.lock().await;
        match state.session.take() {
            Some(session) => {
                let _ = session.stop_tx.send(true);
                tracing::info!(mode = ?session.mode, "live monitoring stopped");
                true
            }
            None => false,
        }
    }

    pub async fn status(&self) -> SessionStatus {
        let state = self.inner.state.lock().await;
        match &state.session {
            Some(s) => SessionStatus::Active {
                mode: s.mode,
                interval: s.interval,
                points: s.points,
            },
            None => SessionStatus::Idle,
        }
    }

    /// one-shot history fetch for the first page load
    pub async fn load_history(&self, count: u64) -> Result<Snapshot, FetchFailure> {
        let outcome = self.inner.source.fetch(FetchRequest::History { count }).await;
        match &outcome {
            Ok(snapshot) => {
                tracing::info!(points = snapshot.series.len(), "initial history loaded");
                self.inner.apply(snapshot).await;
            }
            Err(failure) => self.inner.surface(failure).await,
        }
        outcome
    }
}

// ==============================================================================
// session loop
// ==============================================================================

async fn run_session(
    inner: Arc<Inner>,
    generation: u64,
    period: Duration,
    mut stop_rx: watch::Receiver<bool>,
) {
    // first fetch happens one interval after start
    let mut ticker = interval_at(Instant::now() + period, period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

    loop {
        tokio::select! {
            _ = ticker.tick() => {}
            _ = stop_rx.changed() => break,
        }
        if !inner.cycle(generation).await {
            break;
        }
    }
    tracing::debug!(generation, "session loop ended");
}

impl Inner {
    /// one tick; false once the session is gone
    async fn cycle(&self, generation: u64) -> bool {
        let request = {
            let mut state = self.state.lock().await;
            match state.current(generation) {
                Some(session) => session.next_request(),
                None => return false,
            }
        };

        let outcome = self.source.fetch(request).await;

        // generation check and render under one lock so stop cannot interleave
        let mut state = self.state.lock().await;
        let Some(session) = state.current(generation) else {
            tracing::debug!(generation, "discarding response of stopped session");
            return false;
        };

        match outcome {
            Ok(snapshot) => {
                session.advance();
                self.apply(&snapshot).await;
                true
            }
            Err(failure) if failure.kind.stops_polling() => {
                state.session = None;
                tracing::warn!("rate limited, live monitoring stopped");
                self.surface(&failure).await;
                false
            }
            Err(failure) => {
                self.surface(&failure).await;
                true
            }
        }
    }

    /// hand a snapshot to the renderer
    async fn apply(&self, snapshot: &Snapshot) {
        let series = &snapshot.series;
        if let Some(latest) = series.latest() {
            self.renderer.render_dashboard(latest).await;
            self.renderer.render_gauges(latest).await;
        }
        for channel in SERIES_CHANNELS {
            self.renderer.render_series(channel, &series.column(channel)).await;
        }
        for scatter in SCATTERS {
            let [x, y, z] = scatter.axes().map(|c| series.column(c));
            self.renderer.render_3d(scatter, &x, &y, &z).await;
        }
        self.renderer.render_emergency(snapshot.emergency).await;
    }

    /// log, alert and show the "no data" placeholder
    async fn surface(&self, failure: &FetchFailure) {
        match failure.kind {
            FailureKind::NetworkError | FailureKind::ServerError => {
                tracing::warn!(kind = %failure.kind, "data fetch failed: {}", failure.message)
            }
            _ => tracing::info!(kind = %failure.kind, "data fetch refused: {}", failure.message),
        }
        self.alerts
            .alert(Alert::new(failure.kind.alert_title(), failure.message.clone()))
            .await;
        self.renderer.render_unavailable().await;
    }
}
