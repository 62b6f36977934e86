//! # Database Password Changes
//!
//! Fan-out of a password change across every database target of a secret.
//!
//! - [`PasswordClient`] changes or verifies the password on one database
//! - [`Discovery`] lists the candidate targets
//! - [`FleetPasswordSetter`] drives the client across all targets with a
//!   concurrency cap, retries and rollback of the targets it changed
//!
//! The building blocks [`BoundedExecutor`] and [`RetryPolicy`] are usable on
//! their own.

mod discovery;
mod executor;
mod retry;
mod setter;

pub use discovery::{DiscoveredTarget, Discovery, StaticDiscovery};
pub use executor::{BoundedExecutor, ExecutionSummary, ExecutorError};
pub use retry::{AttemptError, RetryPolicy};
pub use setter::{Action, FleetPasswordSetter, Outcome, SetterError, Target, TargetFilter};

use std::fmt;

use anyhow::Result;
use async_trait::async_trait;
use tokio_util::sync::CancellationToken;
use zeroize::{Zeroize, ZeroizeOnDrop};

use crate::rotation::Payload;

/// Database credential
///
/// `hostname` is empty until the credential is stamped for a specific target.
#[derive(Clone, Default, PartialEq, Eq, Zeroize, ZeroizeOnDrop)]
pub struct Credential {
    pub username: String,
    pub password: String,
    pub hostname: String,
}

impl Credential {
    #[must_use]
    pub fn new(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            password: password.into(),
            hostname: String::new(),
        }
    }
}

impl fmt::Debug for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credential")
            .field("username", &self.username)
            .field("password", &"***")
            .field("hostname", &self.hostname)
            .finish()
    }
}

/// Current and new credentials for one password change
///
/// Rollback is the same change with `current` and `new` swapped.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CredentialTransition {
    pub current: Credential,
    pub new: Credential,
}

impl CredentialTransition {
    #[must_use]
    pub fn new(current: Credential, new: Credential) -> Self {
        Self { current, new }
    }

    /// The reverse change: `new` back to `current`
    #[must_use]
    pub fn swapped(&self) -> Self {
        Self {
            current: self.new.clone(),
            new: self.current.clone(),
        }
    }

    /// Copy of this transition with both credentials pointed at `hostname`
    #[must_use]
    pub fn with_hostname(&self, hostname: &str) -> Self {
        let mut stamped = self.clone();
        stamped.current.hostname = hostname.to_string();
        stamped.new.hostname = hostname.to_string();
        stamped
    }
}

/// Changes the password on a single database
///
/// Called concurrently from multiple workers, one call per target.
#[async_trait]
pub trait PasswordClient: Send + Sync {
    /// Change the password from `transition.current` to `transition.new` on
    /// `transition.current.hostname`
    async fn change_password(
        &self,
        cancel: &CancellationToken,
        transition: &CredentialTransition,
    ) -> Result<()>;

    /// Check that `transition.new` can log in to `transition.new.hostname`
    async fn verify_password(
        &self,
        cancel: &CancellationToken,
        transition: &CredentialTransition,
    ) -> Result<()>;
}

/// Sets, verifies and rolls back a password on all database targets
#[async_trait]
pub trait PasswordSetter: Send + Sync {
    /// Discover targets. Called before every rotation step; only the first
    /// call does any work.
    async fn init(&mut self, cancel: &CancellationToken, payload: &Payload)
        -> Result<(), SetterError>;

    /// Change the password on every target
    async fn set_password(
        &mut self,
        cancel: &CancellationToken,
        transition: &CredentialTransition,
    ) -> Result<(), SetterError>;

    /// Verify the new password on every target
    async fn verify_password(
        &mut self,
        cancel: &CancellationToken,
        transition: &CredentialTransition,
    ) -> Result<(), SetterError>;

    /// Undo the last `set_password` on the targets where it succeeded.
    /// `transition` is the same value passed to `set_password`.
    async fn rollback(
        &mut self,
        cancel: &CancellationToken,
        transition: &CredentialTransition,
    ) -> Result<(), SetterError>;
}

#[async_trait]
impl<T: PasswordSetter + ?Sized> PasswordSetter for Box<T> {
    async fn init(
        &mut self,
        cancel: &CancellationToken,
        payload: &Payload,
    ) -> Result<(), SetterError> {
        (**self).init(cancel, payload).await
    }

    async fn set_password(
        &mut self,
        cancel: &CancellationToken,
        transition: &CredentialTransition,
    ) -> Result<(), SetterError> {
        (**self).set_password(cancel, transition).await
    }

    async fn verify_password(
        &mut self,
        cancel: &CancellationToken,
        transition: &CredentialTransition,
    ) -> Result<(), SetterError> {
        (**self).verify_password(cancel, transition).await
    }

    async fn rollback(
        &mut self,
        cancel: &CancellationToken,
        transition: &CredentialTransition,
    ) -> Result<(), SetterError> {
        (**self).rollback(cancel, transition).await
    }
}
