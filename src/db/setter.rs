//! # Fleet Password Setter
//!
//! [`PasswordSetter`] that changes the password on every discovered database
//! target through a [`PasswordClient`].
//!
//! ## Passes
//!
//! Each call to set, verify or rollback is one pass:
//! 1. Reset the outcome slot of that action on every target (a set pass
//!    resets all of them)
//! 2. Stamp the transition with each target's hostname
//! 3. Run the client call per target through [`RetryPolicy`], at most
//!    `parallel` targets at a time through [`BoundedExecutor`]
//! 4. Count failures once all targets have finished
//!
//! Every target writes only its own outcome slot, so a pass needs no locking.
//! Rollback only touches targets whose last set succeeded.

use std::fmt;
use std::sync::Arc;

use anyhow::anyhow;
use async_trait::async_trait;
use thiserror::Error;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, info_span, warn, Instrument};

use super::{
    BoundedExecutor, CredentialTransition, DiscoveredTarget, Discovery, ExecutorError,
    PasswordClient, PasswordSetter, RetryPolicy,
};
use crate::config::SetterConfig;
use crate::observability::metrics;
use crate::rotation::Payload;

/// Inclusion predicate over discovered targets; `true` keeps the target
pub type TargetFilter = Box<dyn Fn(&DiscoveredTarget) -> bool + Send + Sync>;

/// A per-target database action
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    Set,
    Verify,
    Rollback,
}

impl Action {
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Action::Set => "set",
            Action::Verify => "verify",
            Action::Rollback => "rollback",
        }
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Error)]
pub enum SetterError {
    #[error("target discovery failed: {0}")]
    Discovery(#[source] anyhow::Error),
    #[error("password setter used before init")]
    NotInitialized,
    #[error("password {action} failed on {failed} of {total} database targets")]
    PassFailed {
        action: Action,
        failed: usize,
        total: usize,
    },
    #[error("password {action} cancelled")]
    Cancelled { action: Action },
}

/// Result of one action on one target
#[derive(Debug, Default)]
pub struct Outcome {
    pub attempted: bool,
    pub succeeded: bool,
    pub error: Option<anyhow::Error>,
}

impl Outcome {
    fn reset(&mut self) {
        *self = Self::default();
    }

    #[must_use]
    pub fn failed(&self) -> bool {
        self.attempted && !self.succeeded
    }
}

/// One database target and the outcome of the latest pass of each action
#[derive(Debug)]
pub struct Target {
    pub hostname: String,
    pub set: Outcome,
    pub verify: Outcome,
    pub rollback: Outcome,
}

impl Target {
    fn new(hostname: &str) -> Self {
        Self {
            hostname: hostname.to_string(),
            set: Outcome::default(),
            verify: Outcome::default(),
            rollback: Outcome::default(),
        }
    }

    fn reset(&mut self) {
        self.set.reset();
        self.verify.reset();
        self.rollback.reset();
    }

    #[must_use]
    pub fn outcome(&self, action: Action) -> &Outcome {
        match action {
            Action::Set => &self.set,
            Action::Verify => &self.verify,
            Action::Rollback => &self.rollback,
        }
    }

    fn outcome_mut(&mut self, action: Action) -> &mut Outcome {
        match action {
            Action::Set => &mut self.set,
            Action::Verify => &mut self.verify,
            Action::Rollback => &mut self.rollback,
        }
    }
}

/// Changes passwords on a fleet of discovered databases
pub struct FleetPasswordSetter {
    discovery: Arc<dyn Discovery>,
    client: Arc<dyn PasswordClient>,
    filter: Option<TargetFilter>,
    config: SetterConfig,
    initialized: bool,
    targets: Vec<Target>,
}

impl FleetPasswordSetter {
    #[must_use]
    pub fn new(
        discovery: Arc<dyn Discovery>,
        client: Arc<dyn PasswordClient>,
        config: SetterConfig,
    ) -> Self {
        Self {
            discovery,
            client,
            filter: None,
            config: config.normalized(),
            initialized: false,
            targets: Vec::new(),
        }
    }

    /// Only keep discovered targets for which `filter` returns `true`
    #[must_use]
    pub fn with_filter<F>(mut self, filter: F) -> Self
    where
        F: Fn(&DiscoveredTarget) -> bool + Send + Sync + 'static,
    {
        self.filter = Some(Box::new(filter));
        self
    }

    #[must_use]
    pub fn is_initialized(&self) -> bool {
        self.initialized
    }

    /// Targets and the outcome of the latest pass of each action
    #[must_use]
    pub fn targets(&self) -> &[Target] {
        &self.targets
    }

    async fn pass(
        &mut self,
        cancel: &CancellationToken,
        action: Action,
        transition: &CredentialTransition,
    ) -> Result<(), SetterError> {
        if !self.initialized {
            return Err(SetterError::NotInitialized);
        }
        let span = info_span!(
            "password_setter.pass",
            action = action.as_str(),
            targets = self.targets.len(),
            parallel = self.config.parallel
        );
        self.run_pass(cancel, action, transition)
            .instrument(span)
            .await
    }

    async fn run_pass(
        &mut self,
        cancel: &CancellationToken,
        action: Action,
        transition: &CredentialTransition,
    ) -> Result<(), SetterError> {
        let start = Instant::now();
        for target in &mut self.targets {
            if action == Action::Set {
                target.reset();
            } else {
                target.outcome_mut(action).reset();
            }
        }

        let template = match action {
            Action::Rollback => transition.swapped(),
            Action::Set | Action::Verify => transition.clone(),
        };
        let policy = &RetryPolicy::from(&self.config);
        let executor = BoundedExecutor::new(self.config.parallel);
        let client = &*self.client;

        let mut selected: Vec<&mut Target> = Vec::with_capacity(self.targets.len());
        for target in &mut self.targets {
            if action != Action::Rollback || target.set.succeeded {
                selected.push(target);
            }
        }
        let result = executor
            .run(cancel, selected, |target| {
                let transition = template.with_hostname(&target.hostname);
                async move {
                    target.outcome_mut(action).attempted = true;
                    let attempt = policy
                        .run(cancel, |try_no| {
                            if try_no > 1 {
                                metrics::increment_target_retries(action.as_str());
                            }
                            debug!(
                                hostname = %transition.current.hostname,
                                action = action.as_str(),
                                try_no = try_no,
                                "Calling database client"
                            );
                            match action {
                                Action::Verify => client.verify_password(cancel, &transition),
                                Action::Set | Action::Rollback => {
                                    client.change_password(cancel, &transition)
                                }
                            }
                        })
                        .await;

                    let hostname = &transition.current.hostname;
                    let succeeded = match attempt {
                        Ok(()) => {
                            debug!(hostname = %hostname, action = action.as_str(), "Target succeeded");
                            true
                        }
                        Err(e) => {
                            error!(
                                hostname = %hostname,
                                action = action.as_str(),
                                error = %e,
                                "Target failed"
                            );
                            target.outcome_mut(action).error = Some(e.into());
                            false
                        }
                    };
                    target.outcome_mut(action).succeeded = succeeded;
                    metrics::record_target_operation(action.as_str(), succeeded);
                    succeeded
                }
            })
            .await;

        // A panicked worker never reached its slot; it still counts as failed.
        for target in &mut self.targets {
            let Target {
                hostname,
                set,
                verify,
                rollback,
            } = target;
            let outcome = match action {
                Action::Set => set,
                Action::Verify => verify,
                Action::Rollback => rollback,
            };
            if outcome.failed() && outcome.error.is_none() {
                outcome.error = Some(anyhow!("password {action} panicked on {hostname}"));
            }
        }

        let total = self
            .targets
            .iter()
            .filter(|t| t.outcome(action).attempted)
            .count();
        let failed = self
            .targets
            .iter()
            .filter(|t| t.outcome(action).failed())
            .count();

        if let Err(ExecutorError::Cancelled { summary }) = result {
            warn!(
                action = action.as_str(),
                dispatched = summary.dispatched,
                failed = failed,
                "Pass cancelled"
            );
            return Err(SetterError::Cancelled { action });
        }

        if failed > 0 {
            error!(
                action = action.as_str(),
                failed = failed,
                total = total,
                elapsed_ms = start.elapsed().as_millis(),
                "Pass failed"
            );
            return Err(SetterError::PassFailed {
                action,
                failed,
                total,
            });
        }

        info!(
            action = action.as_str(),
            total = total,
            elapsed_ms = start.elapsed().as_millis(),
            "Pass succeeded"
        );
        Ok(())
    }
}

impl fmt::Debug for FleetPasswordSetter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FleetPasswordSetter")
            .field("config", &self.config)
            .field("initialized", &self.initialized)
            .field("targets", &self.targets)
            .finish_non_exhaustive()
    }
}

#[async_trait]
impl PasswordSetter for FleetPasswordSetter {
    async fn init(
        &mut self,
        cancel: &CancellationToken,
        payload: &Payload,
    ) -> Result<(), SetterError> {
        if self.initialized {
            return Ok(());
        }

        let discovered = self
            .discovery
            .discover(cancel, payload)
            .await
            .map_err(SetterError::Discovery)?;

        let mut targets = Vec::with_capacity(discovered.len());
        for candidate in &discovered {
            if let Some(filter) = &self.filter {
                if !filter(candidate) {
                    debug!(target_id = %candidate.id, "Target excluded by filter");
                    continue;
                }
            }
            match candidate
                .address
                .as_deref()
                .map(str::trim)
                .filter(|a| !a.is_empty())
            {
                Some(address) => targets.push(Target::new(address)),
                None => {
                    warn!(target_id = %candidate.id, "Target has no address yet, skipping");
                }
            }
        }

        info!(
            discovered = discovered.len(),
            targets = targets.len(),
            "Database targets initialized"
        );
        self.targets = targets;
        self.initialized = true;
        Ok(())
    }

    async fn set_password(
        &mut self,
        cancel: &CancellationToken,
        transition: &CredentialTransition,
    ) -> Result<(), SetterError> {
        self.pass(cancel, Action::Set, transition).await
    }

    async fn verify_password(
        &mut self,
        cancel: &CancellationToken,
        transition: &CredentialTransition,
    ) -> Result<(), SetterError> {
        self.pass(cancel, Action::Verify, transition).await
    }

    async fn rollback(
        &mut self,
        cancel: &CancellationToken,
        transition: &CredentialTransition,
    ) -> Result<(), SetterError> {
        self.pass(cancel, Action::Rollback, transition).await
    }
}
