//! # Secret Store Providers
//!
//! Abstract interface for the secret store that stages rotations.
//!
//! The rotator only needs four calls: read a version by staging label, write
//! a new version, move a staging label between versions, and read replication
//! status. Implementations:
//! - [`AwsSecretsManager`] for AWS Secrets Manager
//! - [`InMemorySecretStore`] for local runs and tests

use std::fmt;

use async_trait::async_trait;
use thiserror::Error;

mod memory;
mod secrets_manager;

pub use memory::{InMemorySecretStore, StoreCall};
pub use secrets_manager::AwsSecretsManager;

/// Staging labels used by the rotation protocol
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StagingLabel {
    Current,
    Pending,
    Previous,
}

impl StagingLabel {
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            StagingLabel::Current => "AWSCURRENT",
            StagingLabel::Pending => "AWSPENDING",
            StagingLabel::Previous => "AWSPREVIOUS",
        }
    }
}

impl fmt::Display for StagingLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One version of a secret as returned by a staging-label lookup
#[derive(Clone, PartialEq, Eq)]
pub struct SecretValue {
    pub version_id: String,
    pub version_stages: Vec<String>,
    /// Raw secret string; `None` when the version only has binary data
    pub secret_string: Option<String>,
}

impl SecretValue {
    #[must_use]
    pub fn has_stage(&self, label: StagingLabel) -> bool {
        self.version_stages.iter().any(|s| s == label.as_str())
    }
}

impl fmt::Debug for SecretValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SecretValue")
            .field("version_id", &self.version_id)
            .field("version_stages", &self.version_stages)
            .field("secret_string", &self.secret_string.as_ref().map(|_| "***"))
            .finish()
    }
}

/// Replication state of one replica region
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReplicationState {
    InSync,
    InProgress,
    Failed,
    Unknown(String),
}

impl fmt::Display for ReplicationState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ReplicationState::InSync => f.write_str("InSync"),
            ReplicationState::InProgress => f.write_str("InProgress"),
            ReplicationState::Failed => f.write_str("Failed"),
            ReplicationState::Unknown(s) => write!(f, "Unknown({s})"),
        }
    }
}

/// Replication status for one replica region
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReplicaStatus {
    pub region: String,
    pub state: ReplicationState,
}

impl ReplicaStatus {
    #[must_use]
    pub fn new(region: impl Into<String>, state: ReplicationState) -> Self {
        Self {
            region: region.into(),
            state,
        }
    }
}

/// Secret store errors
#[derive(Debug, Error)]
pub enum StoreError {
    /// No version of the secret carries the requested staging label
    #[error("secret {secret_id} has no version with staging label {label}")]
    NotFound {
        secret_id: String,
        label: StagingLabel,
    },
    /// The version id already exists with different content
    #[error("secret {secret_id} version {version_id} already exists with different content")]
    Conflict {
        secret_id: String,
        version_id: String,
    },
    #[error("secret store {operation} failed for {secret_id}: {source}")]
    Api {
        operation: &'static str,
        secret_id: String,
        #[source]
        source: anyhow::Error,
    },
}

impl StoreError {
    #[must_use]
    pub fn is_not_found(&self) -> bool {
        matches!(self, StoreError::NotFound { .. })
    }
}

/// Secret store used by the rotator
///
/// Implementations must treat a repeated `put_secret_value` with the same
/// version id and identical content as a no-op, and reject it when the
/// content differs.
#[async_trait]
pub trait SecretStore: Send + Sync {
    /// Get the version of a secret that carries `label`
    async fn get_secret_value(
        &self,
        secret_id: &str,
        label: StagingLabel,
    ) -> Result<SecretValue, StoreError>;

    /// Create a new version with the given id, content and staging labels
    async fn put_secret_value(
        &self,
        secret_id: &str,
        version_id: &str,
        secret_string: &str,
        labels: &[StagingLabel],
    ) -> Result<(), StoreError>;

    /// Move `label` off `remove_from_version_id` and onto `move_to_version_id`.
    /// Either side may be omitted to only remove or only attach the label.
    async fn update_version_stage(
        &self,
        secret_id: &str,
        label: StagingLabel,
        remove_from_version_id: Option<&str>,
        move_to_version_id: Option<&str>,
    ) -> Result<(), StoreError>;

    /// Replication status per replica region; empty when not replicated
    async fn replication_status(&self, secret_id: &str) -> Result<Vec<ReplicaStatus>, StoreError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_staging_label_names() {
        assert_eq!(StagingLabel::Current.to_string(), "AWSCURRENT");
        assert_eq!(StagingLabel::Pending.as_str(), "AWSPENDING");
        assert_eq!(StagingLabel::Previous.as_str(), "AWSPREVIOUS");
    }

    #[test]
    fn test_secret_value_debug_hides_secret() {
        let value = SecretValue {
            version_id: "v1".to_string(),
            version_stages: vec!["AWSCURRENT".to_string()],
            secret_string: Some(r#"{"password":"hunter2"}"#.to_string()),
        };
        let printed = format!("{value:?}");
        assert!(!printed.contains("hunter2"));
        assert!(value.has_stage(StagingLabel::Current));
        assert!(!value.has_stage(StagingLabel::Pending));
    }
}
