//! # Constants
//!
//! Shared constants used throughout the rotator.
//!
//! These values represent reasonable defaults and can be overridden via
//! configuration or environment variables where applicable.

/// Invocation field carrying the rotation run identifier
pub const CLIENT_REQUEST_TOKEN_KEY: &str = "ClientRequestToken";

/// Invocation field carrying the secret identifier
pub const SECRET_ID_KEY: &str = "SecretId";

/// Invocation field carrying the rotation step name
pub const STEP_KEY: &str = "Step";

/// Default time to wait for a relabeled secret to reach every replica region (seconds)
pub const DEFAULT_REPLICATION_WAIT_SECS: u64 = 10;

/// Default interval between replication status polls (milliseconds)
pub const DEFAULT_REPLICATION_POLL_INTERVAL_MS: u64 = 500;

/// Default number of database targets changed concurrently
pub const DEFAULT_DB_PARALLEL: usize = 1;

/// Default number of retries after a failed database operation
pub const DEFAULT_DB_RETRY: u32 = 0;

/// Default wait between database operation retries (milliseconds)
pub const DEFAULT_DB_RETRY_WAIT_MS: u64 = 0;

/// Password length used by the default credential strategy
pub const DEFAULT_PASSWORD_LENGTH: usize = 20;

/// Character set used by the default credential strategy
pub const DEFAULT_PASSWORD_CHARSET: &str =
    "ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz0123456789!@#$%^&*()-";

/// Default tracing filter when `RUST_LOG` is not set
pub const DEFAULT_LOG_FILTER: &str = "password_rotation=info";
