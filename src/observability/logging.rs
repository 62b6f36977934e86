//! # Logging
//!
//! Installs the global `tracing` subscriber.
//!
//! Lambda/CloudWatch adds its own timestamps, so the JSON layout keeps the
//! target and level but no ANSI colour. `RUST_LOG` always wins over the
//! configured level.

use tracing::warn;
use tracing_subscriber::EnvFilter;

use crate::config::{LogFormat, LoggingConfig};
use crate::constants::DEFAULT_LOG_FILTER;

/// Initialize the global tracing subscriber
///
/// Safe to call more than once: later calls leave the first subscriber in
/// place and log a warning.
pub fn init_logging(config: &LoggingConfig) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| default_filter(config));

    let result = match config.log_format {
        LogFormat::Json => tracing_subscriber::fmt()
            .json()
            .with_env_filter(filter)
            .with_current_span(true)
            .try_init(),
        LogFormat::Text => tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_ansi(config.log_enable_color)
            .try_init(),
    };

    if let Err(e) = result {
        warn!("Tracing subscriber init returned error (may already be initialized): {}", e);
    }
}

fn default_filter(config: &LoggingConfig) -> EnvFilter {
    let level = config.log_level.trim().to_lowercase();
    if level.is_empty() {
        return EnvFilter::new(DEFAULT_LOG_FILTER);
    }
    EnvFilter::try_new(format!("password_rotation={level}"))
        .unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_FILTER))
}

/// Log a message that contains secret values
///
/// Only emitted when both `debug` and `debug_secret` are enabled. Be very
/// careful enabling this.
#[macro_export]
macro_rules! debug_secret {
    ($config:expr, $($arg:tt)+) => {
        if $config.log_secrets() {
            tracing::debug!(sensitive = true, $($arg)+);
        }
    };
}
