//! # Random Password
//!
//! Default [`SecretSetter`]: replaces the `password` field with a random
//! string and reads credentials from `username`/`password`.

use anyhow::{bail, Result};
use async_trait::async_trait;
use rand::seq::SliceRandom;
use tokio_util::sync::CancellationToken;

use super::{SecretDocument, SecretSetter};
use crate::constants::{DEFAULT_PASSWORD_CHARSET, DEFAULT_PASSWORD_LENGTH};
use crate::rotation::Payload;

const USERNAME_KEY: &str = "username";
const PASSWORD_KEY: &str = "password";

/// Random password credential strategy
///
/// Does not support user-invoked rotation; [`SecretSetter::handler`] always
/// returns an error.
#[derive(Debug, Clone)]
pub struct RandomPassword {
    /// Number of characters in generated passwords
    pub password_length: usize,
    /// Characters generated passwords are drawn from
    pub charset: Vec<char>,
}

impl Default for RandomPassword {
    fn default() -> Self {
        Self {
            password_length: DEFAULT_PASSWORD_LENGTH,
            charset: DEFAULT_PASSWORD_CHARSET.chars().collect(),
        }
    }
}

impl RandomPassword {
    #[must_use]
    pub fn with_length(mut self, password_length: usize) -> Self {
        self.password_length = password_length;
        self
    }

    #[must_use]
    pub fn with_charset(mut self, charset: &str) -> Self {
        self.charset = charset.chars().collect();
        self
    }

    fn generate(&self) -> Result<String> {
        if self.password_length == 0 {
            bail!("password length must be greater than zero");
        }
        let mut rng = rand::thread_rng();
        (0..self.password_length)
            .map(|_| {
                self.charset
                    .choose(&mut rng)
                    .copied()
                    .ok_or_else(|| anyhow::anyhow!("password charset is empty"))
            })
            .collect()
    }
}

#[async_trait]
impl SecretSetter for RandomPassword {
    async fn init(&self, _cancel: &CancellationToken, _payload: &Payload) -> Result<()> {
        Ok(())
    }

    async fn handler(&self, _cancel: &CancellationToken, _payload: &Payload) -> Result<Payload> {
        bail!("RandomPassword does not support user-invoked password rotation")
    }

    fn rotate(&self, secret: &mut SecretDocument) -> Result<()> {
        let password = self.generate()?;
        secret.insert(PASSWORD_KEY, password);
        Ok(())
    }

    fn credentials(&self, secret: &SecretDocument) -> (String, String) {
        (
            secret.get(USERNAME_KEY).unwrap_or_default().to_string(),
            secret.get(PASSWORD_KEY).unwrap_or_default().to_string(),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn secret() -> SecretDocument {
        [("username", "test-user"), ("password", "original-password")]
            .into_iter()
            .collect()
    }

    #[test]
    fn test_default_length() {
        let mut doc = secret();
        RandomPassword::default().rotate(&mut doc).unwrap();
        assert_eq!(doc.get("password").unwrap().chars().count(), 20);
        assert_eq!(doc.get("username"), Some("test-user"));
    }

    #[test]
    fn test_custom_length() {
        let mut doc = secret();
        RandomPassword::default()
            .with_length(1)
            .rotate(&mut doc)
            .unwrap();
        assert_eq!(doc.get("password").unwrap().chars().count(), 1);
    }

    #[test]
    fn test_single_character_charset() {
        let mut doc = secret();
        RandomPassword::default()
            .with_charset("X")
            .rotate(&mut doc)
            .unwrap();
        assert_eq!(doc.get("password"), Some("X".repeat(20).as_str()));
    }

    #[test]
    fn test_empty_charset_is_an_error() {
        let mut doc = secret();
        let result = RandomPassword::default().with_charset("").rotate(&mut doc);
        assert!(result.is_err());
        assert_eq!(doc.get("password"), Some("original-password"));
    }

    #[test]
    fn test_credentials_default_to_empty() {
        let (username, password) = RandomPassword::default().credentials(&SecretDocument::new());
        assert_eq!(username, "");
        assert_eq!(password, "");
    }

    #[tokio::test]
    async fn test_handler_is_unsupported() {
        let result = RandomPassword::default()
            .handler(&CancellationToken::new(), &Payload::new())
            .await;
        assert!(result.is_err());
    }
}
