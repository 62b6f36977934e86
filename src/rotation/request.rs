//! Invocation payload parsing.

use std::fmt;
use std::str::FromStr;

use serde::Serialize;

use super::{Payload, RotationError};
use crate::constants::{CLIENT_REQUEST_TOKEN_KEY, SECRET_ID_KEY, STEP_KEY};

/// The four Secrets Manager rotation steps
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum Step {
    CreateSecret,
    SetSecret,
    TestSecret,
    FinishSecret,
}

impl Step {
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Step::CreateSecret => "createSecret",
            Step::SetSecret => "setSecret",
            Step::TestSecret => "testSecret",
            Step::FinishSecret => "finishSecret",
        }
    }
}

impl fmt::Display for Step {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Step {
    type Err = RotationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "createSecret" => Ok(Step::CreateSecret),
            "setSecret" => Ok(Step::SetSecret),
            "testSecret" => Ok(Step::TestSecret),
            "finishSecret" => Ok(Step::FinishSecret),
            other => Err(RotationError::InvalidStep(other.to_string())),
        }
    }
}

/// A Secrets Manager rotation invocation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RotationRequest {
    /// Rotation run id; becomes the version id of the new secret version
    pub client_request_token: String,
    pub secret_id: String,
    /// Raw step name, validated when the step is dispatched
    pub step: String,
}

impl RotationRequest {
    #[must_use]
    pub fn new(secret_id: &str, client_request_token: &str, step: Step) -> Self {
        Self {
            client_request_token: client_request_token.to_string(),
            secret_id: secret_id.to_string(),
            step: step.as_str().to_string(),
        }
    }

    /// Extract the rotation fields, or `None` when the payload was not sent
    /// by Secrets Manager
    #[must_use]
    pub fn from_payload(payload: &Payload) -> Option<Self> {
        Some(Self {
            client_request_token: payload.get(CLIENT_REQUEST_TOKEN_KEY)?.clone(),
            secret_id: payload.get(SECRET_ID_KEY)?.clone(),
            step: payload.get(STEP_KEY)?.clone(),
        })
    }
}
