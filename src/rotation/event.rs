//! # Rotation Events
//!
//! Notable moments of a rotation, sent to an [`EventReceiver`] as they happen.
//! The receiver is called inline: a slow receiver slows the rotation.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::Serialize;

use super::Step;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum EventName {
    BeginRotation,
    BeginPasswordRotation,
    EndPasswordRotation,
    BeginPasswordVerification,
    EndPasswordVerification,
    NewPasswordIsCurrent,
    EndRotation,
    BeginPasswordRollback,
    EndPasswordRollback,
    Error,
}

impl EventName {
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            EventName::BeginRotation => "begin-rotation",
            EventName::BeginPasswordRotation => "begin-password-rotation",
            EventName::EndPasswordRotation => "end-password-rotation",
            EventName::BeginPasswordVerification => "begin-password-verification",
            EventName::EndPasswordVerification => "end-password-verification",
            EventName::NewPasswordIsCurrent => "new-password-is-current",
            EventName::EndRotation => "end-rotation",
            EventName::BeginPasswordRollback => "begin-password-rollback",
            EventName::EndPasswordRollback => "end-password-rollback",
            EventName::Error => "error",
        }
    }
}

impl fmt::Display for EventName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One rotation event
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RotationEvent {
    pub name: EventName,
    pub step: Step,
    pub time: DateTime<Utc>,
    /// Error text, set only for [`EventName::Error`]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl RotationEvent {
    #[must_use]
    pub fn new(name: EventName, step: Step) -> Self {
        Self {
            name,
            step,
            time: Utc::now(),
            error: None,
        }
    }

    #[must_use]
    pub fn error(step: Step, error: &dyn std::error::Error) -> Self {
        Self {
            error: Some(error.to_string()),
            ..Self::new(EventName::Error, step)
        }
    }
}

/// Receives rotation events
pub trait EventReceiver: Send + Sync {
    fn receive(&self, event: RotationEvent);
}

/// Ignores all events
#[derive(Debug, Clone, Copy, Default)]
pub struct NullEventReceiver;

impl EventReceiver for NullEventReceiver {
    fn receive(&self, _event: RotationEvent) {}
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_event_serializes_with_wire_names() {
        let event = RotationEvent::new(EventName::NewPasswordIsCurrent, Step::FinishSecret);
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["name"], "new-password-is-current");
        assert_eq!(json["step"], "finishSecret");
        assert!(json.get("error").is_none());
    }

    #[test]
    fn test_error_event_carries_message() {
        let err = std::io::Error::other("disk on fire");
        let event = RotationEvent::error(Step::SetSecret, &err);
        assert_eq!(event.name, EventName::Error);
        assert_eq!(event.error.as_deref(), Some("disk on fire"));
        assert_eq!(event.name.to_string(), "error");
    }
}
