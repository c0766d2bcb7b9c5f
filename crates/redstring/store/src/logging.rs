//! Tracing subscriber setup for hosts embedding the store

use crate::config::LoggingConfig;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Install a global subscriber. `RUST_LOG` wins over the configured level.
///
/// Returns `false` if a global subscriber was already installed.
pub fn init_tracing(config: &LoggingConfig) -> bool {
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&config.level));

    if config.json {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(tracing_subscriber::fmt::layer().json())
            .try_init()
            .is_ok()
    } else {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(tracing_subscriber::fmt::layer())
            .try_init()
            .is_ok()
    }
}
