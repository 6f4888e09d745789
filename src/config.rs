//! ==============================================================================
//! config.rs - Runtime Configuration Loader
//! ==============================================================================
//!
//! purpose:
//!     defines the schema for `dashboard.toml`.
//!     loads configuration from file or falls back to defaults.
//!
//! structure:
//!     - NodeConfig: which roles this process runs (backend, dashboard, both).
//!     - BackendConfig: data server bind address, dataset, live node, account.
//!     - DashboardConfig: control api bind address and the backend to poll.
//!     - PollingConfig: refresh interval, its floor, and the simulation bounds.
//!     - LoggingConfig: log level and per-reading output.
//!
//! ==============================================================================

use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Root configuration structure
#[derive(Debug, Deserialize, Clone, Default)]
pub struct DashConfig {
    #[serde(default)]
    pub node: NodeConfig,
    #[serde(default)]
    pub backend: BackendConfig,
    #[serde(default)]
    pub dashboard: DashboardConfig,
    #[serde(default)]
    pub polling: PollingConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

#[derive(Debug, Deserialize, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// data server only
    Backend,
    /// poller + control api only
    Dashboard,
    /// both in one process
    #[default]
    Standalone,
}

impl Role {
    pub fn runs_backend(&self) -> bool {
        matches!(self, Role::Backend | Role::Standalone)
    }

    pub fn runs_dashboard(&self) -> bool {
        matches!(self, Role::Dashboard | Role::Standalone)
    }
}

#[derive(Debug, Deserialize, Clone, Default)]
pub struct NodeConfig {
    #[serde(default)]
    pub role: Role,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct BackendConfig {
    pub bind: String,
    pub dataset_path: PathBuf,
    pub live_node_path: PathBuf,
    pub username: String,
    pub password: String,
    pub session_ttl_seconds: u64,
    pub rate_limit_per_minute: u32,
}

impl Default for BackendConfig {
    fn default() -> Self {
        Self {
            bind: "0.0.0.0:5454".to_string(),
            dataset_path: PathBuf::from("data").join("readings.csv"),
            live_node_path: PathBuf::from("data").join("live_node.json"),
            username: "admin".to_string(),
            password: "admin".to_string(),
            session_ttl_seconds: 3600,
            rate_limit_per_minute: 60,
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct DashboardConfig {
    pub bind: String,
    pub backend_url: String,
    /// points requested on the first page load
    pub initial_points: u64,
    pub request_timeout_seconds: u64,
}

impl Default for DashboardConfig {
    fn default() -> Self {
        Self {
            bind: "0.0.0.0:3000".to_string(),
            backend_url: "http://127.0.0.1:5454".to_string(),
            initial_points: 30,
            request_timeout_seconds: 10,
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct PollingConfig {
    pub interval_seconds: u64,
    pub min_interval_seconds: u64,
    /// size of the recorded dataset, caps the simulated point counter
    pub max_points: u64,
}

impl Default for PollingConfig {
    fn default() -> Self {
        Self {
            interval_seconds: 5,
            min_interval_seconds: 3,
            max_points: 1311,
        }
    }
}

impl PollingConfig {
    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.interval_seconds)
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct LoggingConfig {
    pub level: String,
    pub show_sensor_data: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self { level: "info".to_string(), show_sensor_data: true }
    }
}

impl DashConfig {
    /// Load configuration from file
    pub fn load<P: AsRef<Path>>(path: P) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path.as_ref())
            .map_err(|e| anyhow::anyhow!("Failed to read config file: {}", e))?;

        let config: DashConfig = toml::from_str(&content)
            .map_err(|e| anyhow::anyhow!("Failed to parse config: {}", e))?;

        Ok(config)
    }

    /// Load with default fallback
    pub fn load_or_default() -> Self {
        let paths = [
            PathBuf::from("config").join("dashboard.toml"),
            PathBuf::from("..").join("config").join("dashboard.toml"),
        ];

        for path in &paths {
            if path.exists() {
                match Self::load(path) {
                    Ok(config) => {
                        println!("[CONFIG] Loaded from {}", path.display());
                        return config;
                    }
                    Err(e) => {
                        println!("[CONFIG] Warning: Failed to load {}: {}", path.display(), e);
                    }
                }
            }
        }

        println!("[CONFIG] Warning: No config file found - using defaults");
        Self::default()
    }

    /// Print configuration summary
    pub fn print_summary(&self) {
        println!("┌─────────────────────────────────────────┐");
        println!("│         DASHBOARD CONFIGURATION         │");
        println!("├─────────────────────────────────────────┤");
        println!("│ Role: {:?}", self.node.role);
        if self.node.role.runs_backend() {
            println!("│ Backend: {}", self.backend.bind);
            println!("│ Dataset: {}", self.backend.dataset_path.display());
        }
        if self.node.role.runs_dashboard() {
            println!("│ Control API: {}", self.dashboard.bind);
            println!("│ Polling: {}", self.dashboard.backend_url);
        }
        println!("│ Poll Interval: {}s (min {}s)", self.polling.interval_seconds, self.polling.min_interval_seconds);
        println!("│ Log Level: {}", self.logging.level);
        println!("└─────────────────────────────────────────┘");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_partial_file_keeps_defaults() {
        let config: DashConfig = toml::from_str(
            r#"
            [node]
            role = "dashboard"

            [polling]
            interval_seconds = 10
            "#,
        )
        .unwrap();

        assert_eq!(config.node.role, Role::Dashboard);
        assert!(!config.node.role.runs_backend());
        assert_eq!(config.polling.interval(), Duration::from_secs(10));
        assert_eq!(config.polling.min_interval_seconds, 3);
        assert_eq!(config.dashboard.initial_points, 30);
        assert_eq!(config.backend.session_ttl_seconds, 3600);
    }

    #[test]
    fn test_load_reports_parse_errors() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        std::io::Write::write_all(&mut file, b"[polling]\ninterval_seconds = \"soon\"\n").unwrap();
        let err = DashConfig::load(file.path()).unwrap_err();
        assert!(err.to_string().contains("Failed to parse config"));
    }

    #[test]
    fn test_shipped_config_parses() {
        let path = Path::new(env!("CARGO_MANIFEST_DIR")).join("config").join("dashboard.toml");
        let config = DashConfig::load(path).unwrap();
        assert_eq!(config.node.role, Role::Standalone);
    }
}
