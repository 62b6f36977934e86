//! # Observability
//!
//! Observability modules for logging and metrics.
//!
//! - `logging`: tracing subscriber setup and secret-aware debug helpers
//! - `metrics`: Prometheus metrics collection

pub mod logging;
pub mod metrics;
