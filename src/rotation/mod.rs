//! # Rotation
//!
//! The four-step Secrets Manager rotation handler.
//!
//! Secrets Manager invokes the handler once per step with the secret id, the
//! step name and a client request token identifying the rotation run:
//!
//! 1. `createSecret` - rotate the current secret and store it as `AWSPENDING`
//! 2. `setSecret` - set the new password on every database
//! 3. `testSecret` - verify the new password on every database
//! 4. `finishSecret` - move `AWSCURRENT` to the new version
//!
//! Any step may be retried, so every step is idempotent for a given token.
//! If setting or verifying the password fails, the database change is rolled
//! back and the pending version is unlabeled.

mod error;
mod event;
mod replication;
mod request;
mod rotator;

pub use error::RotationError;
pub use event::{EventName, EventReceiver, NullEventReceiver, RotationEvent};
pub use request::{RotationRequest, Step};
pub use rotator::Rotator;

use std::collections::BTreeMap;

/// Raw invocation payload and handler response
pub type Payload = BTreeMap<String, String>;
