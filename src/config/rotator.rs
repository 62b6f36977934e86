//! # Rotator Configuration
//!
//! Step-level settings for the four-step rotation handler.

use std::time::Duration;

use super::{env_var_or_default, env_var_or_default_bool, env_var_opt};
use crate::constants::{DEFAULT_REPLICATION_POLL_INTERVAL_MS, DEFAULT_REPLICATION_WAIT_SECS};

/// Rotator configuration
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RotatorConfig {
    /// Skip setting and verifying the password on databases but do all the
    /// other work. Only enable when knowingly fixing a Secrets Manager rotation
    /// that is blocked by a database issue.
    pub skip_database: bool,
    /// How long finishSecret waits for the relabeled secret to replicate to
    /// every replica region before failing
    pub replication_wait: Duration,
    /// Interval between replication status polls
    pub replication_poll_interval: Duration,
    /// First half of the secret logging gate; has no effect unless
    /// `debug_secret` is also set. Log verbosity comes from `LoggingConfig`.
    pub debug: bool,
    /// DANGEROUS: log secret values when `debug` is also enabled
    pub debug_secret: bool,
    /// Secrets Manager endpoint override (local stacks, contract tests)
    pub endpoint_url: Option<String>,
    /// AWS region override; the SDK default chain is used when unset
    pub region: Option<String>,
}

impl Default for RotatorConfig {
    fn default() -> Self {
        Self {
            skip_database: false,
            replication_wait: Duration::from_secs(DEFAULT_REPLICATION_WAIT_SECS),
            replication_poll_interval: Duration::from_millis(DEFAULT_REPLICATION_POLL_INTERVAL_MS),
            debug: false,
            debug_secret: false,
            endpoint_url: None,
            region: None,
        }
    }
}

impl RotatorConfig {
    /// Load configuration from environment variables with defaults
    #[must_use]
    pub fn from_env() -> Self {
        Self {
            skip_database: env_var_or_default_bool("SKIP_DATABASE", false),
            replication_wait: Duration::from_secs(env_var_or_default(
                "REPLICATION_WAIT_SECS",
                DEFAULT_REPLICATION_WAIT_SECS,
            )),
            replication_poll_interval: Duration::from_millis(env_var_or_default(
                "REPLICATION_POLL_INTERVAL_MS",
                DEFAULT_REPLICATION_POLL_INTERVAL_MS,
            )),
            debug: env_var_or_default_bool("ROTATION_DEBUG", false),
            debug_secret: env_var_or_default_bool("ROTATION_DEBUG_SECRET", false),
            endpoint_url: env_var_opt("SECRETS_MANAGER_ENDPOINT_URL"),
            region: env_var_opt("AWS_REGION"),
        }
    }

    /// True only when both debug flags are set
    #[must_use]
    pub fn log_secrets(&self) -> bool {
        self.debug && self.debug_secret
    }
}
