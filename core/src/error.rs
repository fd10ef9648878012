use thiserror::Error;

use crate::types::ComplaintId;

#[derive(Error, Debug)]
pub enum IntakeError {
    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("{entity} '{key}' not found")]
    NotFound { entity: &'static str, key: String },

    #[error("Invalid transition for complaint {complaint_id}: {reason}")]
    InvalidTransition {
        complaint_id: ComplaintId,
        reason: String,
    },

    #[error("Complaint {complaint_id} is already closed")]
    AlreadyClosed { complaint_id: ComplaintId },

    #[error("Invalid status '{0}'")]
    InvalidStatus(String),

    #[error("Validation failed: {0}")]
    Validation(String),

    #[error("Notification delivery failed: {0}")]
    NotificationFailed(String),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl IntakeError {
    pub fn not_found(entity: &'static str, key: impl ToString) -> Self {
        Self::NotFound {
            entity,
            key: key.to_string(),
        }
    }

    pub fn invalid_transition(complaint_id: ComplaintId, reason: impl Into<String>) -> Self {
        Self::InvalidTransition {
            complaint_id,
            reason: reason.into(),
        }
    }
}

pub type IntakeResult<T> = Result<T, IntakeError>;
