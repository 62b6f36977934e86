//! # In-Memory Secret Store
//!
//! Provides an in-memory secret store with versioning and staging labels
//! that follows Secrets Manager label semantics:
//!
//! - a label is attached to at most one version; attaching it elsewhere moves it
//! - moving `AWSCURRENT` labels the old current version `AWSPREVIOUS`
//! - re-putting a version id with identical content is a no-op, with
//!   different content a [`StoreError::Conflict`]
//!
//! Every call is recorded so tests can assert exactly which writes happened.
//! Replication status responses can be scripted per secret; the last scripted
//! response repeats once the script is exhausted.
//!
//! This is ephemeral - data does not persist across restarts.
//! Thread-safe using `Arc<RwLock>` for concurrent access.

use std::collections::{BTreeSet, HashMap, VecDeque};
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::{Mutex, RwLock};
use tracing::info;

use super::{ReplicaStatus, SecretStore, SecretValue, StagingLabel, StoreError};

/// A call made against the store
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoreCall {
    Get {
        secret_id: String,
        label: StagingLabel,
    },
    Put {
        secret_id: String,
        version_id: String,
        secret_string: String,
        labels: Vec<StagingLabel>,
    },
    UpdateStage {
        secret_id: String,
        label: StagingLabel,
        remove_from_version_id: Option<String>,
        move_to_version_id: Option<String>,
    },
    DescribeReplication {
        secret_id: String,
    },
}

/// Secret version with its staging labels
#[derive(Debug, Clone)]
struct StoredVersion {
    version_id: String,
    secret_string: String,
    stages: BTreeSet<String>,
}

#[derive(Debug, Default)]
struct StoredSecret {
    /// Ordered list of versions (oldest first)
    versions: Vec<StoredVersion>,
    replication: VecDeque<Vec<ReplicaStatus>>,
}

impl StoredSecret {
    fn version_mut(&mut self, version_id: &str) -> Option<&mut StoredVersion> {
        self.versions.iter_mut().find(|v| v.version_id == version_id)
    }

    fn holder_of(&self, label: StagingLabel) -> Option<&StoredVersion> {
        self.versions.iter().find(|v| v.stages.contains(label.as_str()))
    }

    /// Attach `label` to `version_id`, removing it from every other version
    fn attach(&mut self, label: StagingLabel, version_id: &str) {
        for version in &mut self.versions {
            if version.version_id == version_id {
                version.stages.insert(label.as_str().to_string());
            } else {
                version.stages.remove(label.as_str());
            }
        }
    }
}

/// In-memory secret store
#[derive(Clone, Debug, Default)]
pub struct InMemorySecretStore {
    secrets: Arc<RwLock<HashMap<String, StoredSecret>>>,
    calls: Arc<Mutex<Vec<StoreCall>>>,
}

impl InMemorySecretStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed a version directly, bypassing call recording and label moves
    pub async fn insert_version(
        &self,
        secret_id: &str,
        version_id: &str,
        secret_string: &str,
        labels: &[StagingLabel],
    ) {
        let mut secrets = self.secrets.write().await;
        let secret = secrets.entry(secret_id.to_string()).or_default();
        secret.versions.push(StoredVersion {
            version_id: version_id.to_string(),
            secret_string: secret_string.to_string(),
            stages: labels.iter().map(|l| l.as_str().to_string()).collect(),
        });
    }

    /// Script the replication status responses for a secret
    pub async fn script_replication(&self, secret_id: &str, responses: Vec<Vec<ReplicaStatus>>) {
        let mut secrets = self.secrets.write().await;
        secrets.entry(secret_id.to_string()).or_default().replication = responses.into();
    }

    /// Secret string of the version carrying `label`, if any
    pub async fn secret_string(&self, secret_id: &str, label: StagingLabel) -> Option<String> {
        let secrets = self.secrets.read().await;
        secrets
            .get(secret_id)?
            .holder_of(label)
            .map(|v| v.secret_string.clone())
    }

    /// Version id carrying `label`, if any
    pub async fn version_with_label(&self, secret_id: &str, label: StagingLabel) -> Option<String> {
        let secrets = self.secrets.read().await;
        secrets
            .get(secret_id)?
            .holder_of(label)
            .map(|v| v.version_id.clone())
    }

    /// Staging labels of a version, sorted
    pub async fn labels_of(&self, secret_id: &str, version_id: &str) -> Vec<String> {
        let secrets = self.secrets.read().await;
        secrets
            .get(secret_id)
            .and_then(|s| s.versions.iter().find(|v| v.version_id == version_id))
            .map(|v| v.stages.iter().cloned().collect())
            .unwrap_or_default()
    }

    /// All calls made so far, in order
    pub async fn calls(&self) -> Vec<StoreCall> {
        self.calls.lock().await.clone()
    }

    /// Only the write calls (put and label updates), in order
    pub async fn writes(&self) -> Vec<StoreCall> {
        self.calls
            .lock()
            .await
            .iter()
            .filter(|c| matches!(c, StoreCall::Put { .. } | StoreCall::UpdateStage { .. }))
            .cloned()
            .collect()
    }

    async fn record(&self, call: StoreCall) {
        self.calls.lock().await.push(call);
    }
}

fn not_found(secret_id: &str, label: StagingLabel) -> StoreError {
    StoreError::NotFound {
        secret_id: secret_id.to_string(),
        label,
    }
}

fn invalid_request(operation: &'static str, secret_id: &str, message: String) -> StoreError {
    StoreError::Api {
        operation,
        secret_id: secret_id.to_string(),
        source: anyhow::anyhow!(message),
    }
}

#[async_trait]
impl SecretStore for InMemorySecretStore {
    async fn get_secret_value(
        &self,
        secret_id: &str,
        label: StagingLabel,
    ) -> Result<SecretValue, StoreError> {
        self.record(StoreCall::Get {
            secret_id: secret_id.to_string(),
            label,
        })
        .await;

        let secrets = self.secrets.read().await;
        let version = secrets
            .get(secret_id)
            .and_then(|s| s.holder_of(label))
            .ok_or_else(|| not_found(secret_id, label))?;

        Ok(SecretValue {
            version_id: version.version_id.clone(),
            version_stages: version.stages.iter().cloned().collect(),
            secret_string: Some(version.secret_string.clone()),
        })
    }

    async fn put_secret_value(
        &self,
        secret_id: &str,
        version_id: &str,
        secret_string: &str,
        labels: &[StagingLabel],
    ) -> Result<(), StoreError> {
        self.record(StoreCall::Put {
            secret_id: secret_id.to_string(),
            version_id: version_id.to_string(),
            secret_string: secret_string.to_string(),
            labels: labels.to_vec(),
        })
        .await;

        let mut secrets = self.secrets.write().await;
        let secret = secrets.entry(secret_id.to_string()).or_default();

        if let Some(existing) = secret.version_mut(version_id) {
            if existing.secret_string == secret_string {
                info!("  Version {} of secret {} already stored", version_id, secret_id);
                return Ok(());
            }
            return Err(StoreError::Conflict {
                secret_id: secret_id.to_string(),
                version_id: version_id.to_string(),
            });
        }

        secret.versions.push(StoredVersion {
            version_id: version_id.to_string(),
            secret_string: secret_string.to_string(),
            stages: BTreeSet::new(),
        });
        for label in labels {
            secret.attach(*label, version_id);
        }
        info!("  Added version {} to secret: {}", version_id, secret_id);
        Ok(())
    }

    async fn update_version_stage(
        &self,
        secret_id: &str,
        label: StagingLabel,
        remove_from_version_id: Option<&str>,
        move_to_version_id: Option<&str>,
    ) -> Result<(), StoreError> {
        self.record(StoreCall::UpdateStage {
            secret_id: secret_id.to_string(),
            label,
            remove_from_version_id: remove_from_version_id.map(ToString::to_string),
            move_to_version_id: move_to_version_id.map(ToString::to_string),
        })
        .await;

        let mut secrets = self.secrets.write().await;
        let secret = secrets
            .get_mut(secret_id)
            .ok_or_else(|| not_found(secret_id, label))?;

        if let Some(from) = remove_from_version_id {
            let version = secret.version_mut(from).ok_or_else(|| {
                invalid_request(
                    "UpdateSecretVersionStage",
                    secret_id,
                    format!("version {from} does not exist"),
                )
            })?;
            if !version.stages.remove(label.as_str()) {
                return Err(invalid_request(
                    "UpdateSecretVersionStage",
                    secret_id,
                    format!("version {from} does not have staging label {label}"),
                ));
            }
        }

        if let Some(to) = move_to_version_id {
            if secret.version_mut(to).is_none() {
                return Err(invalid_request(
                    "UpdateSecretVersionStage",
                    secret_id,
                    format!("version {to} does not exist"),
                ));
            }
            secret.attach(label, to);
            if label == StagingLabel::Current {
                if let Some(from) = remove_from_version_id.filter(|from| *from != to) {
                    secret.attach(StagingLabel::Previous, from);
                }
            }
        }
        Ok(())
    }

    async fn replication_status(&self, secret_id: &str) -> Result<Vec<ReplicaStatus>, StoreError> {
        self.record(StoreCall::DescribeReplication {
            secret_id: secret_id.to_string(),
        })
        .await;

        let mut secrets = self.secrets.write().await;
        let secret = secrets
            .get_mut(secret_id)
            .ok_or_else(|| not_found(secret_id, StagingLabel::Current))?;
        let status = if secret.replication.len() > 1 {
            secret.replication.pop_front().unwrap_or_default()
        } else {
            secret.replication.front().cloned().unwrap_or_default()
        };
        Ok(status)
    }
}
