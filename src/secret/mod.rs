//! # Secret Setter
//!
//! The credential strategy: how a secret document is rotated and which
//! username/password pair it holds.
//!
//! The rotator has only one requirement for the secret: it is a JSON object
//! of string key-value pairs (see [`SecretDocument`]). A suggested minimum is
//! `{"username": "foo", "password": "bar"}`; [`RandomPassword`] rotates the
//! `password` field of exactly that shape and is used when no other
//! [`SecretSetter`] is configured.

mod document;
mod random;

pub use document::{DocumentError, SecretDocument};
pub use random::RandomPassword;

use anyhow::Result;
use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use crate::rotation::Payload;

/// User-specific secret handling
#[async_trait]
pub trait SecretSetter: Send + Sync {
    /// Called before every rotation step with the invocation payload.
    /// Must be idempotent: the rotator cannot tell a fresh process from a
    /// resumed one.
    async fn init(&self, cancel: &CancellationToken, payload: &Payload) -> Result<()>;

    /// Called instead of the rotation steps when the invocation did not come
    /// from Secrets Manager (user-invoked rotation). The payload is
    /// user-defined and the returned map is the invocation response.
    async fn handler(&self, cancel: &CancellationToken, payload: &Payload) -> Result<Payload>;

    /// Rotate the credential fields of `secret` in place. Free to change any
    /// field, not only the password.
    fn rotate(&self, secret: &mut SecretDocument) -> Result<()>;

    /// Username and password to set on the databases
    fn credentials(&self, secret: &SecretDocument) -> (String, String);
}
