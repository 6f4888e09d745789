//! ==============================================================================
//! render.rs - rendering collaborator and alert sink
//! ==============================================================================
//!
//! purpose:
//!     the polling controller pushes every applied snapshot through the
//!     Renderer trait and every surfaced failure through AlertSink. it never
//!     reads chart state back.
//!
//! board:
//!     DashboardBoard is the shipped implementation: it keeps the latest
//!     rendered view (gauges, series, scatter data, emergency flags, recent
//!     alerts) in shared state for the /api endpoint and logs readings.
//!
//! relationships:
//!     - used by: controller.rs (writes)
//!     - used by: api.rs (reads the view as json)
//!
//! ==============================================================================

use crate::domain::{Channel, EmergencyState, Reading};
use async_trait::async_trait;
use serde::Serialize;
use std::collections::{BTreeMap, VecDeque};
use std::sync::Arc;
use tokio::sync::RwLock;

/// alerts kept for the /api view
const ALERT_HISTORY: usize = 20;

/// a message for the user
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct Alert {
    pub title: String,
    pub message: String,
}

impl Alert {
    pub fn new(title: impl Into<String>, message: impl Into<String>) -> Self {
        Self { title: title.into(), message: message.into() }
    }
}

/// 3-d scatter plots drawn from three channels each
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ScatterId {
    /// temperature x humidity x feels-like
    TempHumFeel,
    /// feels-like x humidity x air quality
    FeelHumAq,
}

impl ScatterId {
    pub fn id(&self) -> &'static str {
        match self {
            ScatterId::TempHumFeel => "temp_hum_feel",
            ScatterId::FeelHumAq => "feel_hum_aq",
        }
    }

    pub fn axes(&self) -> [Channel; 3] {
        match self {
            ScatterId::TempHumFeel => [Channel::Temperature, Channel::Humidity, Channel::FeelsLike],
            ScatterId::FeelHumAq => [Channel::FeelsLike, Channel::Humidity, Channel::AirQuality],
        }
    }
}

/// channels drawn as 2-d time series
pub const SERIES_CHANNELS: [Channel; 4] = [
    Channel::Temperature,
    Channel::Humidity,
    Channel::AirQuality,
    Channel::FeelsLike,
];

pub const SCATTERS: [ScatterId; 2] = [ScatterId::TempHumFeel, ScatterId::FeelHumAq];

#[async_trait]
pub trait Renderer: Send + Sync {
    /// headline numbers (temperature, humidity, air quality)
    async fn render_dashboard(&self, latest: &Reading);

    /// gauge and donut charts (temperature, feels-like, air quality)
    async fn render_gauges(&self, latest: &Reading);

    async fn render_series(&self, channel: Channel, values: &[f64]);

    async fn render_3d(&self, id: ScatterId, x: &[f64], y: &[f64], z: &[f64]);

    async fn render_emergency(&self, state: EmergencyState);

    /// placeholder shown when a cycle produced no data
    async fn render_unavailable(&self);
}

#[async_trait]
pub trait AlertSink: Send + Sync {
    async fn alert(&self, alert: Alert);
}

// ==============================================================================
// dashboard board - shared view
// ==============================================================================

/// what the dashboard currently shows
#[derive(Clone, Debug, Default, Serialize)]
pub struct DashboardView {
    pub latest: Option<Reading>,
    /// "--" indicator instead of numbers
    pub placeholder: bool,
    /// wall clock of the last applied reading, "hh:mm AM"
    pub last_updated: Option<String>,
    pub series: BTreeMap<Channel, Vec<f64>>,
    pub scatter: BTreeMap<ScatterId, [Vec<f64>; 3]>,
    pub emergency: EmergencyState,
    pub alerts: VecDeque<Alert>,
}

#[derive(Clone)]
pub struct DashboardBoard {
    view: Arc<RwLock<DashboardView>>,
    show_sensor_data: bool,
}

impl DashboardBoard {
    pub fn new(show_sensor_data: bool) -> Self {
        Self {
            view: Arc::new(RwLock::new(DashboardView::default())),
            show_sensor_data,
        }
    }

    pub async fn view(&self) -> DashboardView {
        self.view.read().await.clone()
    }
}

#[async_trait]
impl Renderer for DashboardBoard {
    async fn render_dashboard(&self, latest: &Reading) {
        if self.show_sensor_data {
            tracing::info!(
                "Temp: {:.1}°C | Humidity: {:.1}% | Air: {:.0}ppm",
                latest.temperature,
                latest.humidity,
                latest.air_quality
            );
        }
        let mut view = self.view.write().await;
        view.latest = Some(*latest);
        view.placeholder = false;
        view.last_updated = Some(chrono::Local::now().format("%I:%M %p").to_string());
    }

    async fn render_gauges(&self, latest: &Reading) {
        tracing::debug!(
            temperature = latest.temperature,
            feels_like = latest.feels_like,
            air_quality = latest.air_quality,
            "gauges updated"
        );
    }

    async fn render_series(&self, channel: Channel, values: &[f64]) {
        let mut view = self.view.write().await;
        view.series.insert(channel, values.to_vec());
    }

    async fn render_3d(&self, id: ScatterId, x: &[f64], y: &[f64], z: &[f64]) {
        let mut view = self.view.write().await;
        view.scatter.insert(id, [x.to_vec(), y.to_vec(), z.to_vec()]);
    }

    async fn render_emergency(&self, state: EmergencyState) {
        let previous = {
            let mut view = self.view.write().await;
            std::mem::replace(&mut view.emergency, state)
        };
        // raise an alert only on the edge into a new emergency
        if state.is_emergency() && state != previous {
            if let (Some(title), Some(message)) = (state.title(), state.message()) {
                tracing::error!(fire = state.fire_detected, gas = state.gas_detected, "{}", title);
                self.alert(Alert::new(title, message)).await;
            }
        }
    }

    async fn render_unavailable(&self) {
        let mut view = self.view.write().await;
        view.placeholder = true;
    }
}

#[async_trait]
impl AlertSink for DashboardBoard {
    async fn alert(&self, alert: Alert) {
        tracing::warn!(title = %alert.title, "{}", alert.message);
        let mut view = self.view.write().await;
        if view.alerts.len() == ALERT_HISTORY {
            view.alerts.pop_front();
        }
        view.alerts.push_back(alert);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::DEFAULT_READING;

    #[tokio::test]
    async fn test_board_keeps_latest_view() {
        let board = DashboardBoard::new(false);
        board.render_dashboard(&DEFAULT_READING).await;
        board.render_series(Channel::Humidity, &[1.0, 2.0]).await;

        let view = board.view().await;
        assert_eq!(view.latest, Some(DEFAULT_READING));
        assert!(!view.placeholder);
        assert!(view.last_updated.is_some());
        assert_eq!(view.series.get(&Channel::Humidity), Some(&vec![1.0, 2.0]));

        board.render_unavailable().await;
        assert!(board.view().await.placeholder);
    }

    #[tokio::test]
    async fn test_emergency_alert_raised_once_per_transition() {
        let board = DashboardBoard::new(false);
        board.render_emergency(EmergencyState::new(true, false)).await;
        board.render_emergency(EmergencyState::new(true, false)).await;
        board.render_emergency(EmergencyState::new(false, false)).await;
        board.render_emergency(EmergencyState::new(true, true)).await;

        let alerts = board.view().await.alerts;
        let titles: Vec<&str> = alerts.iter().map(|a| a.title.as_str()).collect();
        assert_eq!(titles, vec!["Fire Emergency!", "Fire and Gas Emergency!"]);
    }

    #[tokio::test]
    async fn test_alert_history_is_bounded() {
        let board = DashboardBoard::new(false);
        for i in 0..(ALERT_HISTORY + 5) {
            board.alert(Alert::new("t", format!("m{}", i))).await;
        }
        let alerts = board.view().await.alerts;
        assert_eq!(alerts.len(), ALERT_HISTORY);
        assert_eq!(alerts.front().map(|a| a.message.as_str()), Some("m5"));
    }

    #[test]
    fn test_scatter_axes() {
        assert_eq!(
            ScatterId::FeelHumAq.axes(),
            [Channel::FeelsLike, Channel::Humidity, Channel::AirQuality]
        );
    }
}
