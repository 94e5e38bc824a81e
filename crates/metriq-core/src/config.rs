//! Configuration management for Metriq

use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::Result;

/// Prefix for environment overrides, e.g. `METRIQ__ENGINE__MAX_TOTAL_POINTS=5000`
pub const ENV_PREFIX: &str = "METRIQ";

/// Main configuration struct
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Query evaluation configuration
    pub engine: EngineConfig,

    /// Alerting configuration
    pub alerting: AlertingConfig,

    /// Logging configuration
    pub logging: LoggingConfig,
}

impl Config {
    /// Load configuration from `.env`, an optional file and `METRIQ__*` variables.
    ///
    /// Later sources override earlier ones; every missing key keeps its default.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        // a missing .env file is normal
        let _ = dotenvy::dotenv();

        let mut builder = config::Config::builder();
        if let Some(path) = path {
            debug!(path = %path.display(), "Reading configuration file");
            builder = builder.add_source(config::File::from(path).required(true));
        }
        builder = builder.add_source(
            config::Environment::with_prefix(ENV_PREFIX)
                .prefix_separator("__")
                .separator("__"),
        );

        let config: Self = builder.build()?.try_deserialize()?;
        Ok(config)
    }
}

/// Query evaluation configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Series longer than this are down-sampled before rendering
    pub max_points_per_metric: usize,
    /// Total point budget for one rendered graph
    pub max_total_points: usize,
    /// Target length of the `bucket` function
    pub bucket_max_points: usize,
    /// Default window of the `mavg` function
    pub moving_average_window: usize,
    /// Minimum correlation magnitude reported by `corr`
    pub correlation_threshold: f64,
    /// Longest window `corr` accepts
    #[serde(with = "humantime_serde")]
    pub correlation_max_span: Duration,
    /// Offset from UTC used to resolve absolute dates in queries
    pub utc_offset_minutes: i32,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            max_points_per_metric: 2000,
            max_total_points: 20000,
            bucket_max_points: 20,
            moving_average_window: 5,
            correlation_threshold: 0.8,
            correlation_max_span: Duration::from_secs(31 * 60),
            utc_offset_minutes: 0,
        }
    }
}

/// Alerting configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AlertingConfig {
    /// Capacity of the ingestion channel
    pub channel_capacity: usize,
    /// Number of metrics handed to the engine at once
    pub batch_size: usize,
    /// Maximum time a partial batch waits before it is evaluated (ms)
    pub batch_timeout_ms: u64,
}

impl Default for AlertingConfig {
    fn default() -> Self {
        Self {
            channel_capacity: 1024,
            batch_size: 100,
            batch_timeout_ms: 1000,
        }
    }
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level
    pub level: String,
    /// Log format (json or pretty)
    pub format: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: "pretty".to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_defaults() {
        let config = Config::default();
        assert_eq!(config.engine.max_points_per_metric, 2000);
        assert_eq!(config.engine.max_total_points, 20000);
        assert_eq!(config.engine.correlation_max_span, Duration::from_secs(1860));
        assert_eq!(config.logging.format, "pretty");
    }

    #[test]
    fn test_load_from_file_keeps_missing_defaults() {
        let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        writeln!(
            file,
            "[engine]\nbucket_max_points = 40\ncorrelation_max_span = \"10m\"\n\n[logging]\nlevel = \"debug\""
        )
        .unwrap();

        let config = Config::load(Some(file.path())).unwrap();
        assert_eq!(config.engine.bucket_max_points, 40);
        assert_eq!(config.engine.correlation_max_span, Duration::from_secs(600));
        assert_eq!(config.engine.max_total_points, 20000);
        assert_eq!(config.logging.level, "debug");
        assert_eq!(config.alerting.batch_size, 100);
    }

    #[test]
    fn test_load_missing_file_fails() {
        let result = Config::load(Some(Path::new("/nonexistent/metriq.toml")));
        assert!(matches!(result, Err(crate::Error::Config(_))));
    }
}
