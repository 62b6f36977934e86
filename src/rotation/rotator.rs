//! # Rotator
//!
//! Entry point and step implementations.
//!
//! The rotator is stateless between invocations except for the password
//! setter's target list (discovered once) and the time the database
//! password was last changed, used to log password downtime.

use std::sync::Arc;

use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, info_span, warn, Instrument};

use super::replication::wait_for_replication;
use super::{
    EventName, EventReceiver, NullEventReceiver, Payload, RotationError, RotationEvent,
    RotationRequest, Step,
};
use crate::config::RotatorConfig;
use crate::db::{Credential, CredentialTransition, PasswordSetter};
use crate::debug_secret;
use crate::observability::metrics;
use crate::provider::{SecretStore, SecretValue, StagingLabel};
use crate::secret::{RandomPassword, SecretDocument, SecretSetter};

/// Secrets Manager rotation handler
pub struct Rotator<P> {
    store: Arc<dyn SecretStore>,
    secret_setter: Arc<dyn SecretSetter>,
    password_setter: P,
    events: Arc<dyn EventReceiver>,
    config: RotatorConfig,
    password_changed_at: Option<Instant>,
}

impl<P: PasswordSetter> Rotator<P> {
    /// Create a rotator using [`RandomPassword`] and no event receiver
    pub fn new(store: Arc<dyn SecretStore>, password_setter: P, config: RotatorConfig) -> Self {
        Self {
            store,
            secret_setter: Arc::new(RandomPassword::default()),
            password_setter,
            events: Arc::new(NullEventReceiver),
            config,
            password_changed_at: None,
        }
    }

    #[must_use]
    pub fn with_secret_setter(mut self, secret_setter: Arc<dyn SecretSetter>) -> Self {
        self.secret_setter = secret_setter;
        self
    }

    #[must_use]
    pub fn with_event_receiver(mut self, events: Arc<dyn EventReceiver>) -> Self {
        self.events = events;
        self
    }

    #[must_use]
    pub fn password_setter(&self) -> &P {
        &self.password_setter
    }

    #[must_use]
    pub fn config(&self) -> &RotatorConfig {
        &self.config
    }

    /// Handle one invocation
    ///
    /// Secrets Manager invocations run the requested step and return `None`.
    /// Any other payload is passed to [`SecretSetter::handler`] and its
    /// response returned.
    ///
    /// # Errors
    ///
    /// Returns the step error. When setting or verifying the password fails
    /// the error is [`RotationError::RotationFailed`]; the cause was logged
    /// when it happened.
    pub async fn handle(
        &mut self,
        cancel: &CancellationToken,
        payload: &Payload,
    ) -> Result<Option<Payload>, RotationError> {
        let Some(request) = RotationRequest::from_payload(payload) else {
            debug!(keys = ?payload.keys().collect::<Vec<_>>(), "User event");
            debug_secret!(self.config, payload = ?payload, "User event payload");
            return self
                .secret_setter
                .handler(cancel, payload)
                .await
                .map(Some)
                .map_err(RotationError::Handler);
        };

        debug!(
            secret_id = %request.secret_id,
            step = %request.step,
            client_request_token = %request.client_request_token,
            "Secrets Manager event"
        );

        // Both setters must be idempotent: a warm process looks the same as a
        // resumed one.
        self.secret_setter
            .init(cancel, payload)
            .await
            .map_err(RotationError::SecretSetter)?;
        self.password_setter.init(cancel, payload).await?;

        let step: Step = request.step.parse()?;
        let span = info_span!(
            "rotation.step",
            step = step.as_str(),
            secret.id = %request.secret_id
        );
        let start = Instant::now();
        let result = self.run_step(cancel, step, &request).instrument(span).await;
        metrics::record_step(step.as_str(), result.is_ok(), start.elapsed().as_secs_f64());

        if let Err(e) = &result {
            self.events.receive(RotationEvent::error(step, e));
        }
        result.map(|()| None)
    }

    async fn run_step(
        &mut self,
        cancel: &CancellationToken,
        step: Step,
        request: &RotationRequest,
    ) -> Result<(), RotationError> {
        let start = Instant::now();
        info!("{} call", step);

        let result = if cancel.is_cancelled() {
            Err(RotationError::Cancelled { step })
        } else {
            match step {
                Step::CreateSecret => self.create_secret(request).await,
                Step::SetSecret => self.set_secret(cancel, request).await,
                Step::TestSecret => self.test_secret(cancel, request).await,
                Step::FinishSecret => self.finish_secret(cancel, request).await,
            }
        };

        info!(elapsed_ms = start.elapsed().as_millis(), "{} return", step);
        result
    }

    /// Rotate the current secret and store the result as the pending version
    ///
    /// Succeeds without writing when the pending version already belongs to
    /// this run.
    ///
    /// # Errors
    ///
    /// Fails when the current version already is this run, or when another
    /// run's pending version exists.
    pub async fn create_secret(&self, request: &RotationRequest) -> Result<(), RotationError> {
        let secret_id = request.secret_id.as_str();
        let token = request.client_request_token.as_str();
        self.emit(EventName::BeginRotation, Step::CreateSecret);

        let (current, current_doc) = self.get_secret(secret_id, StagingLabel::Current).await?;

        // Labels were changed by hand if this happens.
        if current.version_id == token {
            return Err(RotationError::CurrentIsThisRun {
                version_id: current.version_id,
            });
        }

        // Removing AWSPENDING at the end of a rotation is optional, so the
        // current version may still carry it. That is not a pending secret.
        if current.has_stage(StagingLabel::Pending) {
            debug!("Current secret has AWSPENDING stage");
        } else {
            match self.store.get_secret_value(secret_id, StagingLabel::Pending).await {
                Ok(pending) if pending.version_id == token => {
                    // Retry of this run. Rotating again would produce different
                    // values, which the store rejects for the same version id.
                    info!(version_id = %pending.version_id, "Using pending secret, will not rotate");
                    return Ok(());
                }
                Ok(pending) => {
                    return Err(RotationError::PendingConflict {
                        version_id: pending.version_id,
                    });
                }
                Err(e) if e.is_not_found() => {
                    debug!("No pending secret, will rotate current secret");
                }
                Err(e) => return Err(e.into()),
            }
        }

        let mut rotated = current_doc.clone();
        self.secret_setter
            .rotate(&mut rotated)
            .map_err(RotationError::SecretSetter)?;
        let secret_string = rotated.to_json()?;
        debug_secret!(self.config, secret = %secret_string, "New secret values");

        self.store
            .put_secret_value(secret_id, token, &secret_string, &[StagingLabel::Pending])
            .await?;
        info!(
            secret_id = secret_id,
            version_id = token,
            fields = rotated.len(),
            "New pending secret stored"
        );
        Ok(())
    }

    /// Set the pending password on every database, rolling back on failure
    ///
    /// # Errors
    ///
    /// Returns [`RotationError::RotationFailed`] when the password could not
    /// be set, whether or not the rollback succeeded.
    pub async fn set_secret(
        &mut self,
        cancel: &CancellationToken,
        request: &RotationRequest,
    ) -> Result<(), RotationError> {
        if self.config.skip_database {
            info!("SkipDatabase is enabled, not rotating password on database");
            return Ok(());
        }

        let transition = self.transition(&request.secret_id).await?;

        self.password_changed_at = Some(Instant::now());
        self.emit(EventName::BeginPasswordRotation, Step::SetSecret);
        if let Err(e) = self.password_setter.set_password(cancel, &transition).await {
            error!(error = %e, "SetPassword failed, rolling back");
            self.emit(EventName::BeginPasswordRollback, Step::SetSecret);
            return Err(self
                .rollback(cancel, request, &transition, Step::SetSecret)
                .await);
        }
        self.emit(EventName::EndPasswordRotation, Step::SetSecret);
        Ok(())
    }

    /// Verify the pending password on every database, rolling back on failure
    ///
    /// # Errors
    ///
    /// Returns [`RotationError::RotationFailed`] when verification failed.
    pub async fn test_secret(
        &mut self,
        cancel: &CancellationToken,
        request: &RotationRequest,
    ) -> Result<(), RotationError> {
        if self.config.skip_database {
            info!("SkipDatabase is enabled, not verifying password on database");
            return Ok(());
        }

        let transition = self.transition(&request.secret_id).await?;

        self.emit(EventName::BeginPasswordVerification, Step::TestSecret);
        if let Err(e) = self.password_setter.verify_password(cancel, &transition).await {
            error!(error = %e, "VerifyPassword failed, rolling back");
            self.emit(EventName::BeginPasswordRollback, Step::TestSecret);
            return Err(self
                .rollback(cancel, request, &transition, Step::TestSecret)
                .await);
        }
        self.emit(EventName::EndPasswordVerification, Step::TestSecret);
        Ok(())
    }

    /// Make the pending version current
    ///
    /// # Errors
    ///
    /// Fails when a version cannot be read, the relabel fails, or replication
    /// does not converge in time. Removing the pending label afterwards is
    /// best effort.
    pub async fn finish_secret(
        &self,
        cancel: &CancellationToken,
        request: &RotationRequest,
    ) -> Result<(), RotationError> {
        let secret_id = request.secret_id.as_str();
        let (current, _) = self.get_secret(secret_id, StagingLabel::Current).await?;
        let (pending, _) = self.get_secret(secret_id, StagingLabel::Pending).await?;

        if current.version_id == pending.version_id {
            info!(version_id = %current.version_id, "Pending secret is already current");
        } else {
            debug!(
                from_version_id = %current.version_id,
                to_version_id = %pending.version_id,
                "Moving AWSCURRENT"
            );
            // The old version gets AWSPREVIOUS from the store.
            self.store
                .update_version_stage(
                    secret_id,
                    StagingLabel::Current,
                    Some(&current.version_id),
                    Some(&pending.version_id),
                )
                .await?;
            self.emit(EventName::NewPasswordIsCurrent, Step::FinishSecret);

            if let Some(changed_at) = self.password_changed_at {
                info!(
                    downtime_ms = changed_at.elapsed().as_millis(),
                    "Password downtime"
                );
            }
        }

        wait_for_replication(
            self.store.as_ref(),
            cancel,
            secret_id,
            self.config.replication_wait,
            self.config.replication_poll_interval,
        )
        .await?;

        debug!(version_id = %pending.version_id, "Removing AWSPENDING");
        if let Err(e) = self
            .store
            .update_version_stage(
                secret_id,
                StagingLabel::Pending,
                Some(&pending.version_id),
                None,
            )
            .await
        {
            warn!(error = %e, "Failed to remove AWSPENDING, next rotation will clean it up");
        }

        self.emit(EventName::EndRotation, Step::FinishSecret);
        Ok(())
    }

    /// Undo the database change and the pending version after a failed
    /// set or test. Always returns [`RotationError::RotationFailed`].
    async fn rollback(
        &mut self,
        cancel: &CancellationToken,
        request: &RotationRequest,
        transition: &CredentialTransition,
        step: Step,
    ) -> RotationError {
        let secret_id = request.secret_id.as_str();

        if let Err(e) = self.password_setter.rollback(cancel, transition).await {
            error!(
                error = %e,
                "Rollback failed, database passwords are in an unknown state"
            );
            metrics::record_rollback(false);
            return RotationError::RotationFailed;
        }

        let pending = match self
            .store
            .get_secret_value(secret_id, StagingLabel::Pending)
            .await
        {
            Ok(pending) => pending,
            Err(e) => {
                error!(error = %e, "Rollback failed to read pending secret");
                metrics::record_rollback(false);
                return RotationError::RotationFailed;
            }
        };

        debug!(version_id = %pending.version_id, "Removing AWSPENDING");
        if let Err(e) = self
            .store
            .update_version_stage(
                secret_id,
                StagingLabel::Pending,
                Some(&pending.version_id),
                None,
            )
            .await
        {
            error!(error = %e, "Failed to remove pending secret");
            metrics::record_rollback(false);
            return RotationError::RotationFailed;
        }

        metrics::record_rollback(true);
        self.emit(EventName::EndPasswordRollback, step);
        warn!("{} failed but rollback was successful", step);
        RotationError::RotationFailed
    }

    /// Current and new database credentials from the current and pending
    /// versions
    async fn transition(&self, secret_id: &str) -> Result<CredentialTransition, RotationError> {
        let (_, pending_doc) = self.get_secret(secret_id, StagingLabel::Pending).await?;
        let (new_username, new_password) = self.secret_setter.credentials(&pending_doc);

        let (_, current_doc) = self.get_secret(secret_id, StagingLabel::Current).await?;
        let (current_username, current_password) = self.secret_setter.credentials(&current_doc);

        debug_secret!(
            self.config,
            current_username = %current_username,
            current_password = %current_password,
            new_username = %new_username,
            new_password = %new_password,
            "Database credentials"
        );
        Ok(CredentialTransition::new(
            Credential::new(current_username, current_password),
            Credential::new(new_username, new_password),
        ))
    }

    async fn get_secret(
        &self,
        secret_id: &str,
        label: StagingLabel,
    ) -> Result<(SecretValue, SecretDocument), RotationError> {
        let value = self.store.get_secret_value(secret_id, label).await?;
        debug!(
            secret_id = secret_id,
            stage = label.as_str(),
            version_id = %value.version_id,
            "Got secret"
        );

        let document = SecretDocument::parse(value.secret_string.as_deref().unwrap_or_default())
            .map_err(|source| RotationError::Document {
                secret_id: secret_id.to_string(),
                label,
                source,
            })?;
        debug_secret!(
            self.config,
            stage = label.as_str(),
            secret = ?value.secret_string,
            "Secret values"
        );
        Ok((value, document))
    }

    fn emit(&self, name: EventName, step: Step) {
        self.events.receive(RotationEvent::new(name, step));
    }
}

impl<P> std::fmt::Debug for Rotator<P> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Rotator")
            .field("config", &self.config)
            .field("password_changed_at", &self.password_changed_at)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::SetterError;
    use crate::provider::InMemorySecretStore;
    use async_trait::async_trait;

    /// Password setter that records calls and never fails
    #[derive(Debug, Default)]
    struct NoopSetter {
        inits: usize,
        sets: usize,
    }

    #[async_trait]
    impl PasswordSetter for NoopSetter {
        async fn init(
            &mut self,
            _cancel: &CancellationToken,
            _payload: &Payload,
        ) -> Result<(), SetterError> {
            self.inits += 1;
            Ok(())
        }

        async fn set_password(
            &mut self,
            _cancel: &CancellationToken,
            _transition: &CredentialTransition,
        ) -> Result<(), SetterError> {
            self.sets += 1;
            Ok(())
        }

        async fn verify_password(
            &mut self,
            _cancel: &CancellationToken,
            _transition: &CredentialTransition,
        ) -> Result<(), SetterError> {
            Ok(())
        }

        async fn rollback(
            &mut self,
            _cancel: &CancellationToken,
            _transition: &CredentialTransition,
        ) -> Result<(), SetterError> {
            Ok(())
        }
    }

    fn payload(step: &str) -> Payload {
        [
            ("ClientRequestToken", "v2"),
            ("SecretId", "db/app"),
            ("Step", step),
        ]
        .into_iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect()
    }

    async fn rotator(config: RotatorConfig) -> (Rotator<NoopSetter>, InMemorySecretStore) {
        let store = InMemorySecretStore::new();
        store
            .insert_version(
                "db/app",
                "v1",
                r#"{"password":"p1","username":"foo"}"#,
                &[StagingLabel::Current],
            )
            .await;
        let rotator = Rotator::new(Arc::new(store.clone()), NoopSetter::default(), config);
        (rotator, store)
    }

    #[tokio::test]
    async fn test_invalid_step_after_init() {
        let (mut rotator, _) = rotator(RotatorConfig::default()).await;
        let err = rotator
            .handle(&CancellationToken::new(), &payload("deleteSecret"))
            .await
            .unwrap_err();
        assert!(matches!(err, RotationError::InvalidStep(ref s) if s == "deleteSecret"));
        assert_eq!(rotator.password_setter().inits, 1);
    }

    #[tokio::test]
    async fn test_user_event_goes_to_secret_setter_handler() {
        let (mut rotator, _) = rotator(RotatorConfig::default()).await;
        let mut user = Payload::new();
        user.insert("action".to_string(), "rotate-now".to_string());
        let err = rotator
            .handle(&CancellationToken::new(), &user)
            .await
            .unwrap_err();
        assert!(matches!(err, RotationError::Handler(_)));
        assert_eq!(rotator.password_setter().inits, 0);
    }

    #[tokio::test]
    async fn test_skip_database_skips_set() {
        let config = RotatorConfig {
            skip_database: true,
            ..RotatorConfig::default()
        };
        let (mut rotator, _) = rotator(config).await;
        let cancel = CancellationToken::new();
        rotator.handle(&cancel, &payload("createSecret")).await.unwrap();
        rotator.handle(&cancel, &payload("setSecret")).await.unwrap();
        rotator.handle(&cancel, &payload("testSecret")).await.unwrap();
        assert_eq!(rotator.password_setter().sets, 0);
    }

    #[tokio::test]
    async fn test_malformed_current_secret() {
        let store = InMemorySecretStore::new();
        store
            .insert_version("db/app", "v1", "null", &[StagingLabel::Current])
            .await;
        let rotator = Rotator::new(
            Arc::new(store.clone()),
            NoopSetter::default(),
            RotatorConfig::default(),
        );
        let err = rotator
            .create_secret(&RotationRequest::new("db/app", "v2", Step::CreateSecret))
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            RotationError::Document {
                label: StagingLabel::Current,
                ..
            }
        ));
        assert!(store.writes().await.is_empty());
    }

    #[tokio::test]
    async fn test_cancelled_before_step() {
        let (mut rotator, _) = rotator(RotatorConfig::default()).await;
        let cancel = CancellationToken::new();
        cancel.cancel();
        let err = rotator
            .handle(&cancel, &payload("setSecret"))
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            RotationError::Cancelled {
                step: Step::SetSecret
            }
        ));
    }
}
