//! # AWS Secrets Manager Client
//!
//! [`SecretStore`] implementation for AWS Secrets Manager.
//!
//! Authentication uses the SDK default credential chain (Lambda execution
//! role, IRSA, environment). An endpoint override routes requests to a local
//! stack or contract-test mock server instead of AWS.

use std::time::Instant;

use async_trait::async_trait;
use aws_config::SdkConfig;
use aws_sdk_secretsmanager::types::StatusType;
use aws_sdk_secretsmanager::Client as SecretsManagerClient;
use tracing::{debug, info, info_span, Instrument};

use super::{ReplicaStatus, ReplicationState, SecretStore, SecretValue, StagingLabel, StoreError};
use crate::config::RotatorConfig;

/// AWS Secrets Manager secret store
#[derive(Debug, Clone)]
pub struct AwsSecretsManager {
    client: SecretsManagerClient,
}

impl AwsSecretsManager {
    /// Create a client from the rotator configuration
    ///
    /// Uses `region` and `endpoint_url` from the config when set, else the
    /// SDK defaults.
    pub async fn new(config: &RotatorConfig) -> Self {
        let sdk_config = create_sdk_config(config.region.as_deref(), config.endpoint_url.as_deref()).await;
        Self::from_sdk_config(&sdk_config)
    }

    /// Create a client from an already loaded SDK config
    #[must_use]
    pub fn from_sdk_config(sdk_config: &SdkConfig) -> Self {
        Self {
            client: SecretsManagerClient::new(sdk_config),
        }
    }

    /// Wrap an existing SDK client
    #[must_use]
    pub fn from_client(client: SecretsManagerClient) -> Self {
        Self { client }
    }
}

/// Load AWS SDK config using the default credential chain
async fn create_sdk_config(region: Option<&str>, endpoint_url: Option<&str>) -> SdkConfig {
    let mut builder = aws_config::defaults(aws_config::BehaviorVersion::latest());
    if let Some(region) = region {
        builder = builder.region(aws_config::Region::new(region.to_string()));
    }
    if let Some(endpoint) = endpoint_url {
        info!(endpoint = endpoint, "Using Secrets Manager endpoint override");
        builder = builder.endpoint_url(endpoint);
    }
    builder.load().await
}

fn api_error<E>(operation: &'static str, secret_id: &str, source: E) -> StoreError
where
    E: std::error::Error + Send + Sync + 'static,
{
    StoreError::Api {
        operation,
        secret_id: secret_id.to_string(),
        source: anyhow::Error::new(source),
    }
}

fn replication_state(status: Option<&StatusType>) -> ReplicationState {
    match status {
        Some(StatusType::InSync) => ReplicationState::InSync,
        Some(StatusType::InProgress) => ReplicationState::InProgress,
        Some(StatusType::Failed) => ReplicationState::Failed,
        Some(other) => ReplicationState::Unknown(other.as_str().to_string()),
        None => ReplicationState::Unknown("none".to_string()),
    }
}

#[async_trait]
impl SecretStore for AwsSecretsManager {
    async fn get_secret_value(
        &self,
        secret_id: &str,
        label: StagingLabel,
    ) -> Result<SecretValue, StoreError> {
        let span = info_span!("aws.secret.get", secret.id = secret_id, stage = label.as_str());
        let start = Instant::now();

        async move {
            let response = self
                .client
                .get_secret_value()
                .secret_id(secret_id)
                .version_stage(label.as_str())
                .send()
                .await;
            debug!(
                elapsed_ms = start.elapsed().as_millis(),
                "GetSecretValue response time"
            );

            match response {
                Ok(output) => Ok(SecretValue {
                    version_id: output.version_id().unwrap_or_default().to_string(),
                    version_stages: output.version_stages().to_vec(),
                    secret_string: output.secret_string().map(ToString::to_string),
                }),
                Err(e) => {
                    if e
                        .as_service_error()
                        .is_some_and(aws_sdk_secretsmanager::operation::get_secret_value::GetSecretValueError::is_resource_not_found_exception)
                    {
                        Err(StoreError::NotFound {
                            secret_id: secret_id.to_string(),
                            label,
                        })
                    } else {
                        Err(api_error("GetSecretValue", secret_id, e))
                    }
                }
            }
        }
        .instrument(span)
        .await
    }

    async fn put_secret_value(
        &self,
        secret_id: &str,
        version_id: &str,
        secret_string: &str,
        labels: &[StagingLabel],
    ) -> Result<(), StoreError> {
        let span = info_span!("aws.secret.put", secret.id = secret_id, version.id = version_id);

        async move {
            let mut request = self
                .client
                .put_secret_value()
                .secret_id(secret_id)
                .client_request_token(version_id)
                .secret_string(secret_string);
            for label in labels {
                request = request.version_stages(label.as_str());
            }

            match request.send().await {
                Ok(output) => {
                    info!(
                        secret_id = secret_id,
                        version_id = output.version_id().unwrap_or_default(),
                        version_stages = ?output.version_stages(),
                        "New secret version stored"
                    );
                    Ok(())
                }
                Err(e) => {
                    if e
                        .as_service_error()
                        .is_some_and(aws_sdk_secretsmanager::operation::put_secret_value::PutSecretValueError::is_resource_exists_exception)
                    {
                        Err(StoreError::Conflict {
                            secret_id: secret_id.to_string(),
                            version_id: version_id.to_string(),
                        })
                    } else {
                        Err(api_error("PutSecretValue", secret_id, e))
                    }
                }
            }
        }
        .instrument(span)
        .await
    }

    async fn update_version_stage(
        &self,
        secret_id: &str,
        label: StagingLabel,
        remove_from_version_id: Option<&str>,
        move_to_version_id: Option<&str>,
    ) -> Result<(), StoreError> {
        self.client
            .update_secret_version_stage()
            .secret_id(secret_id)
            .version_stage(label.as_str())
            .set_remove_from_version_id(remove_from_version_id.map(ToString::to_string))
            .set_move_to_version_id(move_to_version_id.map(ToString::to_string))
            .send()
            .instrument(info_span!(
                "aws.secret.update_stage",
                secret.id = secret_id,
                stage = label.as_str()
            ))
            .await
            .map_err(|e| api_error("UpdateSecretVersionStage", secret_id, e))?;
        Ok(())
    }

    async fn replication_status(&self, secret_id: &str) -> Result<Vec<ReplicaStatus>, StoreError> {
        let output = self
            .client
            .describe_secret()
            .secret_id(secret_id)
            .send()
            .await
            .map_err(|e| api_error("DescribeSecret", secret_id, e))?;

        Ok(output
            .replication_status()
            .iter()
            .map(|status| ReplicaStatus {
                region: status.region().unwrap_or_default().to_string(),
                state: replication_state(status.status()),
            })
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_replication_state_mapping() {
        assert_eq!(replication_state(Some(&StatusType::InSync)), ReplicationState::InSync);
        assert_eq!(
            replication_state(Some(&StatusType::InProgress)),
            ReplicationState::InProgress
        );
        assert_eq!(replication_state(Some(&StatusType::Failed)), ReplicationState::Failed);
        assert!(matches!(replication_state(None), ReplicationState::Unknown(_)));
    }

    #[tokio::test]
    async fn test_client_builds_with_endpoint_override() {
        let config = RotatorConfig {
            region: Some("us-east-1".to_string()),
            endpoint_url: Some("http://localhost:4566".to_string()),
            ..RotatorConfig::default()
        };
        let store = AwsSecretsManager::new(&config).await;
        assert!(format!("{store:?}").contains("AwsSecretsManager"));
    }
}
