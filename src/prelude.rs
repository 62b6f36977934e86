//! Commonly used types.

pub use tokio_util::sync::CancellationToken;

pub use crate::config::{LoggingConfig, RotatorConfig, SetterConfig};
pub use crate::db::{
    Credential, CredentialTransition, DiscoveredTarget, Discovery, FleetPasswordSetter,
    PasswordClient, PasswordSetter, SetterError, StaticDiscovery,
};
pub use crate::observability::logging::init_logging;
pub use crate::provider::{AwsSecretsManager, InMemorySecretStore, SecretStore, StagingLabel};
pub use crate::rotation::{
    EventName, EventReceiver, NullEventReceiver, Payload, RotationError, RotationEvent,
    RotationRequest, Rotator, Step,
};
pub use crate::secret::{RandomPassword, SecretDocument, SecretSetter};
