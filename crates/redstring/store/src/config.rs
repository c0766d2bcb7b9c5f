//! Configuration for the graph store

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Main store configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoreConfig {
    /// How long a soft-deleted instance stays restorable, in milliseconds
    #[serde(default = "default_grace_period")]
    pub grace_period_ms: u64,

    /// Interval between grace-period sweeps, in milliseconds
    #[serde(default = "default_sweep_interval")]
    pub sweep_interval_ms: u64,

    /// Default similarity threshold for duplicate detection
    #[serde(default = "default_duplicate_threshold")]
    pub duplicate_threshold: f64,

    /// Capacity of the change-batch broadcast channel
    #[serde(default = "default_channel_capacity")]
    pub notify_channel_capacity: usize,

    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            grace_period_ms: default_grace_period(),
            sweep_interval_ms: default_sweep_interval(),
            duplicate_threshold: default_duplicate_threshold(),
            notify_channel_capacity: default_channel_capacity(),
            logging: LoggingConfig::default(),
        }
    }
}

impl StoreConfig {
    /// Load configuration from file
    pub fn load(path: Option<&str>) -> Result<Self, config::ConfigError> {
        let mut builder = config::Config::builder();

        builder = builder.add_source(config::Config::try_from(&StoreConfig::default())?);

        if let Some(path) = path {
            builder = builder.add_source(config::File::with_name(path).required(false));
        }

        // Environment variables with REDSTRING_ prefix, e.g. REDSTRING_GRACE_PERIOD_MS
        builder = builder.add_source(
            config::Environment::with_prefix("REDSTRING")
                .prefix_separator("_")
                .separator("__")
                .try_parsing(true),
        );

        builder.build()?.try_deserialize()
    }

    pub fn sweep_interval(&self) -> Duration {
        Duration::from_millis(self.sweep_interval_ms.max(1))
    }

    /// Configuration with a short grace period for tests and demos
    pub fn with_grace_period_ms(mut self, grace_period_ms: u64) -> Self {
        self.grace_period_ms = grace_period_ms;
        self
    }

    pub fn with_sweep_interval_ms(mut self, sweep_interval_ms: u64) -> Self {
        self.sweep_interval_ms = sweep_interval_ms;
        self
    }
}

/// Logging configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level
    #[serde(default = "default_log_level")]
    pub level: String,

    /// JSON format
    #[serde(default)]
    pub json: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            json: false,
        }
    }
}

// Default value helpers
fn default_grace_period() -> u64 {
    300_000
}

fn default_sweep_interval() -> u64 {
    60_000
}

fn default_duplicate_threshold() -> f64 {
    0.8
}

fn default_channel_capacity() -> usize {
    256
}

fn default_log_level() -> String {
    "info".to_string()
}
