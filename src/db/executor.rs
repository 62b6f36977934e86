//! # Bounded Parallel Executor
//!
//! Runs an action over a set of items with at most `max_parallel` actions in
//! flight. Waiting for a free slot races against cancellation; once
//! cancelled, nothing new is dispatched but every dispatched action runs to
//! completion before [`ExecutorError::Cancelled`] is returned.
//!
//! Actions run as futures on the calling task, so they may borrow the items
//! mutably (one item, one action, no locks). A panicking action is caught,
//! counted as a failure and its slot released.

use std::any::Any;
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use futures::stream::FuturesUnordered;
use futures::{FutureExt, StreamExt};
use thiserror::Error;
use tokio::sync::Semaphore;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error};

/// Aggregate result of one executor run
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ExecutionSummary {
    /// Items whose action was started
    pub dispatched: usize,
    /// Actions that reported failure or panicked
    pub failed: usize,
    /// Actions that panicked (also counted in `failed`)
    pub panicked: usize,
}

impl ExecutionSummary {
    #[must_use]
    pub fn all_succeeded(&self) -> bool {
        self.failed == 0
    }

    fn record(&mut self, outcome: Result<bool, Box<dyn Any + Send>>) {
        match outcome {
            Ok(true) => {}
            Ok(false) => self.failed += 1,
            Err(panic) => {
                error!(panic = panic_message(&*panic), "Action panicked");
                self.failed += 1;
                self.panicked += 1;
            }
        }
    }
}

#[derive(Debug, Error)]
pub enum ExecutorError {
    #[error("cancelled after dispatching {} items ({} failed)", .summary.dispatched, .summary.failed)]
    Cancelled { summary: ExecutionSummary },
}

/// Runs actions with a hard concurrency cap
#[derive(Debug, Clone, Copy)]
pub struct BoundedExecutor {
    max_parallel: usize,
}

impl BoundedExecutor {
    /// `max_parallel` below 1 is treated as 1
    #[must_use]
    pub fn new(max_parallel: usize) -> Self {
        Self {
            max_parallel: max_parallel.max(1),
        }
    }

    #[must_use]
    pub fn max_parallel(&self) -> usize {
        self.max_parallel
    }

    /// Run `action` for every item. The action's future resolves to `true`
    /// on success.
    ///
    /// # Errors
    ///
    /// Returns [`ExecutorError::Cancelled`] when `cancel` fired before every
    /// item was dispatched. In-flight actions have finished by then.
    pub async fn run<I, F, Fut>(
        &self,
        cancel: &CancellationToken,
        items: I,
        mut action: F,
    ) -> Result<ExecutionSummary, ExecutorError>
    where
        I: IntoIterator,
        F: FnMut(I::Item) -> Fut,
        Fut: Future<Output = bool>,
    {
        let slots = Arc::new(Semaphore::new(self.max_parallel));
        let mut in_flight = FuturesUnordered::new();
        let mut summary = ExecutionSummary::default();
        let mut cancelled = false;

        for item in items {
            // Keep driving in-flight actions while waiting for a slot.
            let permit = loop {
                tokio::select! {
                    biased;
                    () = cancel.cancelled() => break None,
                    permit = Arc::clone(&slots).acquire_owned() => break permit.ok(),
                    Some(outcome) = in_flight.next(), if !in_flight.is_empty() => {
                        summary.record(outcome);
                    }
                }
            };
            let Some(permit) = permit else {
                cancelled = true;
                break;
            };

            summary.dispatched += 1;
            let work = match std::panic::catch_unwind(AssertUnwindSafe(|| action(item))) {
                Ok(work) => work,
                Err(panic) => {
                    drop(permit);
                    summary.record(Err(panic));
                    continue;
                }
            };
            in_flight.push(async move {
                let outcome = AssertUnwindSafe(work).catch_unwind().await;
                drop(permit);
                outcome
            });
        }

        if cancelled {
            debug!(
                in_flight = in_flight.len(),
                "Cancelled, waiting for in-flight actions"
            );
        }
        while let Some(outcome) = in_flight.next().await {
            summary.record(outcome);
        }

        if cancelled {
            return Err(ExecutorError::Cancelled { summary });
        }
        Ok(summary)
    }
}

fn panic_message(panic: &(dyn Any + Send)) -> &str {
    if let Some(s) = panic.downcast_ref::<&str>() {
        s
    } else if let Some(s) = panic.downcast_ref::<String>() {
        s.as_str()
    } else {
        "unknown panic payload"
    }
}
