//! # Metrics
//!
//! Prometheus metrics for monitoring password rotation.
//!
//! ## Metrics Exposed
//!
//! - `password_rotation_steps_total` - Rotation steps by step and outcome
//! - `password_rotation_step_duration_seconds` - Duration of rotation steps
//! - `password_rotation_target_operations_total` - Per-target database operations by action and outcome
//! - `password_rotation_target_retries_total` - Retries of per-target database operations
//! - `password_rotation_rollbacks_total` - Rollbacks by outcome
//! - `password_rotation_replication_wait_seconds` - Time spent waiting for replica regions

use anyhow::Result;
use prometheus::{Encoder, HistogramVec, IntCounterVec, Registry, TextEncoder};
use std::sync::LazyLock;

// Metrics
pub(crate) static REGISTRY: LazyLock<Registry> = LazyLock::new(Registry::new);

static STEPS_TOTAL: LazyLock<IntCounterVec> = LazyLock::new(|| {
    IntCounterVec::new(
        prometheus::Opts::new(
            "password_rotation_steps_total",
            "Total number of rotation steps by step and outcome",
        ),
        &["step", "outcome"],
    )
    .expect("Failed to create STEPS_TOTAL metric - this should never happen")
});

static STEP_DURATION: LazyLock<HistogramVec> = LazyLock::new(|| {
    HistogramVec::new(
        prometheus::HistogramOpts::new(
            "password_rotation_step_duration_seconds",
            "Duration of rotation steps in seconds",
        )
        .buckets(vec![0.1, 0.5, 1.0, 2.0, 5.0, 10.0, 30.0, 60.0]),
        &["step"],
    )
    .expect("Failed to create STEP_DURATION metric - this should never happen")
});

static TARGET_OPERATIONS_TOTAL: LazyLock<IntCounterVec> = LazyLock::new(|| {
    IntCounterVec::new(
        prometheus::Opts::new(
            "password_rotation_target_operations_total",
            "Total number of database target operations by action and outcome",
        ),
        &["action", "outcome"],
    )
    .expect("Failed to create TARGET_OPERATIONS_TOTAL metric - this should never happen")
});

static TARGET_RETRIES_TOTAL: LazyLock<IntCounterVec> = LazyLock::new(|| {
    IntCounterVec::new(
        prometheus::Opts::new(
            "password_rotation_target_retries_total",
            "Total number of retried database target operations by action",
        ),
        &["action"],
    )
    .expect("Failed to create TARGET_RETRIES_TOTAL metric - this should never happen")
});

static ROLLBACKS_TOTAL: LazyLock<IntCounterVec> = LazyLock::new(|| {
    IntCounterVec::new(
        prometheus::Opts::new(
            "password_rotation_rollbacks_total",
            "Total number of password rollbacks by outcome",
        ),
        &["outcome"],
    )
    .expect("Failed to create ROLLBACKS_TOTAL metric - this should never happen")
});

static REPLICATION_WAIT: LazyLock<HistogramVec> = LazyLock::new(|| {
    HistogramVec::new(
        prometheus::HistogramOpts::new(
            "password_rotation_replication_wait_seconds",
            "Time spent waiting for secret replication in seconds",
        )
        .buckets(vec![0.5, 1.0, 2.0, 5.0, 10.0, 30.0]),
        &["outcome"],
    )
    .expect("Failed to create REPLICATION_WAIT metric - this should never happen")
});

#[allow(
    clippy::missing_errors_doc,
    reason = "Error documentation is provided in doc comments"
)]
/// Register all metrics with the crate registry
///
/// Returns an error if called twice (duplicate registration).
pub fn register_metrics() -> Result<()> {
    REGISTRY.register(Box::new(STEPS_TOTAL.clone()))?;
    REGISTRY.register(Box::new(STEP_DURATION.clone()))?;
    REGISTRY.register(Box::new(TARGET_OPERATIONS_TOTAL.clone()))?;
    REGISTRY.register(Box::new(TARGET_RETRIES_TOTAL.clone()))?;
    REGISTRY.register(Box::new(ROLLBACKS_TOTAL.clone()))?;
    REGISTRY.register(Box::new(REPLICATION_WAIT.clone()))?;
    Ok(())
}

/// Render registered metrics in the Prometheus text exposition format
#[allow(
    clippy::missing_errors_doc,
    reason = "Error documentation is provided in doc comments"
)]
pub fn gather_text() -> Result<String> {
    let mut buffer = Vec::new();
    TextEncoder::new().encode(&REGISTRY.gather(), &mut buffer)?;
    Ok(String::from_utf8(buffer)?)
}

pub fn record_step(step: &str, success: bool, duration: f64) {
    let outcome = if success { "success" } else { "error" };
    STEPS_TOTAL.with_label_values(&[step, outcome]).inc();
    STEP_DURATION.with_label_values(&[step]).observe(duration);
}

pub fn record_target_operation(action: &str, success: bool) {
    let outcome = if success { "success" } else { "error" };
    TARGET_OPERATIONS_TOTAL
        .with_label_values(&[action, outcome])
        .inc();
}

pub fn increment_target_retries(action: &str) {
    TARGET_RETRIES_TOTAL.with_label_values(&[action]).inc();
}

pub fn record_rollback(success: bool) {
    let outcome = if success { "success" } else { "error" };
    ROLLBACKS_TOTAL.with_label_values(&[outcome]).inc();
}

pub fn observe_replication_wait(in_sync: bool, duration: f64) {
    let outcome = if in_sync { "in_sync" } else { "timeout" };
    REPLICATION_WAIT
        .with_label_values(&[outcome])
        .observe(duration);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_metrics_render_after_registration() {
        // Registration may already have happened in another test in this binary.
        let _ = register_metrics();
        record_step("createSecret", true, 0.2);
        record_target_operation("set", false);

        let text = gather_text().expect("metrics should encode");
        assert!(text.contains("password_rotation_steps_total"));
        assert!(text.contains("password_rotation_target_operations_total"));
    }
}
