//! Wait for a relabeled secret to reach every replica region.
//!
//! Moving `AWSCURRENT` and then removing `AWSPENDING` while replication is
//! still in flight can leave replication stuck, so finishSecret waits in
//! between.

use std::time::Duration;

use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::info;

use super::{RotationError, Step};
use crate::constants::DEFAULT_REPLICATION_WAIT_SECS;
use crate::observability::metrics;
use crate::provider::{ReplicationState, SecretStore};

/// Poll replication status every `poll_interval` until every replica is in
/// sync, for at most `wait`. A zero `wait` means the default.
pub(crate) async fn wait_for_replication(
    store: &dyn SecretStore,
    cancel: &CancellationToken,
    secret_id: &str,
    wait: Duration,
    poll_interval: Duration,
) -> Result<(), RotationError> {
    let wait = if wait.is_zero() {
        Duration::from_secs(DEFAULT_REPLICATION_WAIT_SECS)
    } else {
        wait
    };
    info!(secret_id = secret_id, wait_ms = wait.as_millis(), "Checking secret replication status");

    let start = Instant::now();
    while start.elapsed() < wait {
        let statuses = store.replication_status(secret_id).await?;
        let mut in_sync = true;
        for status in statuses.iter().filter(|s| s.state != ReplicationState::InSync) {
            in_sync = false;
            info!(
                region = %status.region,
                state = %status.state,
                "Replication status not yet InSync"
            );
        }
        if in_sync {
            metrics::observe_replication_wait(true, start.elapsed().as_secs_f64());
            info!(
                replicas = statuses.len(),
                elapsed_ms = start.elapsed().as_millis(),
                "Secret replication sync completed"
            );
            return Ok(());
        }

        tokio::select! {
            biased;
            () = cancel.cancelled() => {
                return Err(RotationError::Cancelled { step: Step::FinishSecret });
            }
            () = tokio::time::sleep(poll_interval) => {}
        }
    }

    metrics::observe_replication_wait(false, start.elapsed().as_secs_f64());
    Err(RotationError::ReplicationTimeout {
        waited: start.elapsed(),
    })
}
