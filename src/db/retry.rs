//! # Retry
//!
//! Fixed-budget, fixed-delay retry of a single database operation.

use std::future::Future;
use std::time::Duration;

use thiserror::Error;
use tokio_util::sync::CancellationToken;
use tracing::warn;

use crate::config::SetterConfig;

#[derive(Debug, Error)]
pub enum AttemptError {
    /// The last attempt failed with this error
    #[error(transparent)]
    Operation(anyhow::Error),
    /// Cancelled while waiting between attempts
    #[error("cancelled after attempt {attempts} of {tries}")]
    Cancelled { attempts: u32, tries: u32 },
    /// The loop ended without a result, only possible with a zero try budget
    #[error("no result after {tries} tries")]
    Unresolved { tries: u32 },
}

/// Try an operation up to `tries` times, waiting `wait` between tries
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub tries: u32,
    pub wait: Duration,
}

impl RetryPolicy {
    #[must_use]
    pub fn new(tries: u32, wait: Duration) -> Self {
        Self { tries, wait }
    }

    /// Run `operation` until it succeeds or the tries are used up.
    /// The operation receives the 1-based try number.
    ///
    /// If the token is already cancelled when a try fails, that try's error
    /// is returned. If it is cancelled during the wait, the result is
    /// [`AttemptError::Cancelled`]. The last try never waits.
    ///
    /// # Errors
    ///
    /// Returns the last operation error, a cancellation, or
    /// [`AttemptError::Unresolved`] when `tries` is zero.
    pub async fn run<F, Fut, T>(
        &self,
        cancel: &CancellationToken,
        mut operation: F,
    ) -> Result<T, AttemptError>
    where
        F: FnMut(u32) -> Fut,
        Fut: Future<Output = anyhow::Result<T>>,
    {
        for try_no in 1..=self.tries {
            let err = match operation(try_no).await {
                Ok(value) => return Ok(value),
                Err(err) => err,
            };

            if try_no == self.tries || cancel.is_cancelled() {
                return Err(AttemptError::Operation(err));
            }

            warn!(
                try_no = try_no,
                tries = self.tries,
                error = %err,
                wait_ms = self.wait.as_millis(),
                "Attempt failed, retrying"
            );
            tokio::select! {
                biased;
                () = cancel.cancelled() => {
                    return Err(AttemptError::Cancelled {
                        attempts: try_no,
                        tries: self.tries,
                    });
                }
                () = tokio::time::sleep(self.wait) => {}
            }
        }

        Err(AttemptError::Unresolved { tries: self.tries })
    }
}

impl From<&SetterConfig> for RetryPolicy {
    fn from(config: &SetterConfig) -> Self {
        Self::new(config.tries(), config.retry_wait)
    }
}
