//! # Password Setter Configuration
//!
//! Concurrency and retry settings for the database fan-out.

use std::time::Duration;

use super::env_var_or_default;
use crate::constants::{DEFAULT_DB_PARALLEL, DEFAULT_DB_RETRY, DEFAULT_DB_RETRY_WAIT_MS};

/// Database fan-out configuration
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SetterConfig {
    /// Maximum number of database targets changed at the same time
    pub parallel: usize,
    /// Retries after a failed change/verify on one target (total tries = 1 + retry)
    pub retry: u32,
    /// Fixed wait between tries on one target
    pub retry_wait: Duration,
}

impl Default for SetterConfig {
    fn default() -> Self {
        Self {
            parallel: DEFAULT_DB_PARALLEL,
            retry: DEFAULT_DB_RETRY,
            retry_wait: Duration::from_millis(DEFAULT_DB_RETRY_WAIT_MS),
        }
    }
}

impl SetterConfig {
    /// Load configuration from environment variables with defaults
    #[must_use]
    pub fn from_env() -> Self {
        Self {
            parallel: env_var_or_default("DB_PARALLEL", DEFAULT_DB_PARALLEL),
            retry: env_var_or_default("DB_RETRY", DEFAULT_DB_RETRY),
            retry_wait: Duration::from_millis(env_var_or_default(
                "DB_RETRY_WAIT_MS",
                DEFAULT_DB_RETRY_WAIT_MS,
            )),
        }
        .normalized()
    }

    /// Clamp values that would otherwise stall the fan-out
    #[must_use]
    pub fn normalized(mut self) -> Self {
        if self.parallel == 0 {
            self.parallel = 1;
        }
        self
    }

    /// Total tries per target
    #[must_use]
    pub fn tries(&self) -> u32 {
        self.retry.saturating_add(1)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_is_sequential_without_retry() {
        let config = SetterConfig::default();
        assert_eq!(config.parallel, 1);
        assert_eq!(config.tries(), 1);
    }

    #[test]
    fn test_zero_parallel_is_normalized() {
        let config = SetterConfig {
            parallel: 0,
            ..SetterConfig::default()
        }
        .normalized();
        assert_eq!(config.parallel, 1);
    }

    #[test]
    fn test_tries_counts_first_attempt() {
        let config = SetterConfig {
            retry: 2,
            ..SetterConfig::default()
        };
        assert_eq!(config.tries(), 3);
    }
}
