use thiserror::Error;
use uuid::Uuid;

use crate::plant::ActionKind;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum CareError {
    #[error("care interval must be at least one day, got {0}")]
    InvalidInterval(i64),
    #[error("plant `{0}` not found")]
    UnknownPlant(Uuid),
    #[error("{kind} is not enabled for plant `{plant}`")]
    TrackDisabled { plant: Uuid, kind: ActionKind },
}

/// Failures reported by a notification backend. None of them abort a care update.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum NotificationError {
    #[error("failed to register notification `{id}`: {reason}")]
    RegistrationFailed { id: String, reason: String },
}
