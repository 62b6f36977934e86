use std::time::Duration;

use thiserror::Error;

use super::Step;
use crate::db::SetterError;
use crate::provider::{StagingLabel, StoreError};
use crate::secret::DocumentError;

#[derive(Debug, Error)]
pub enum RotationError {
    #[error("invalid Step value from event: {0:?}")]
    InvalidStep(String),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error("{label} version of secret {secret_id} is unusable: {source}")]
    Document {
        secret_id: String,
        label: StagingLabel,
        #[source]
        source: DocumentError,
    },

    /// The current version already carries this run's id
    #[error("new and current secret have the same version ID: {version_id}; expected different values")]
    CurrentIsThisRun { version_id: String },

    /// A pending version from another run exists
    #[error(
        "another pending secret exists (version ID {version_id}); another process might be \
         rotating this secret, or a previous rotation failed without cleaning up"
    )]
    PendingConflict { version_id: String },

    #[error("secret setter failed: {0}")]
    SecretSetter(#[source] anyhow::Error),

    #[error(transparent)]
    PasswordSetter(#[from] SetterError),

    #[error("failed to serialize rotated secret: {0}")]
    Serialize(#[from] serde_json::Error),

    #[error("timeout after {waited:?} waiting for secret replication to reach InSync")]
    ReplicationTimeout { waited: Duration },

    #[error("{step} cancelled")]
    Cancelled { step: Step },

    /// Database password change failed; details were logged when they happened
    #[error("password rotation failed, see previous log output")]
    RotationFailed,

    /// The user handler for a non-rotation invocation failed
    #[error("handler failed: {0}")]
    Handler(#[source] anyhow::Error),
}
