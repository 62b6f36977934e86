//! Password Rotation Library
//!
//! Implements the AWS Secrets Manager four-step rotation contract
//! (`createSecret`, `setSecret`, `testSecret`, `finishSecret`) for database
//! passwords, changing the password on a fleet of databases with a
//! concurrency cap, retries and rollback.
//!
//! The composing application supplies a [`db::PasswordClient`] for its
//! database engine and a [`db::Discovery`] for its targets, and wires them
//! into a [`rotation::Rotator`]:
//!
//! ```no_run
//! use std::sync::Arc;
//! # use password_rotation::prelude::*;
//! # async fn run(client: Arc<dyn PasswordClient>, payload: Payload) -> Result<(), RotationError> {
//! let config = RotatorConfig::from_env();
//! let store = Arc::new(AwsSecretsManager::new(&config).await);
//! let discovery = Arc::new(StaticDiscovery::from_addresses(&["db-1:3306", "db-2:3306"]));
//! let setter = FleetPasswordSetter::new(discovery, client, SetterConfig::from_env());
//!
//! let mut rotator = Rotator::new(store, setter, config);
//! rotator.handle(&CancellationToken::new(), &payload).await?;
//! # Ok(())
//! # }
//! ```
//!
//! Tests are included in the module files and in `tests/`.

pub mod config;
pub mod constants;
pub mod db;
pub mod observability;
pub mod prelude;
pub mod provider;
pub mod rotation;
pub mod secret;
