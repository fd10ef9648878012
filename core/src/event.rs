//! The audit trail.
//!
//! RULE: Every engine outcome that changes state is appended to the
//! event log inside the same transaction as the change itself.

use crate::{
    complaint::ComplaintStatus,
    types::{ComplaintId, LocationId, Timestamp},
};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DiscardReason {
    AttemptsExceeded,
    CodeExpired,
}

/// Variants are appended, never removed or reordered.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum IntakeEvent {
    // ── Registry ───────────────────────────────────
    LocationRegistered {
        location_id: LocationId,
        station_code: String,
        platform_number: u32,
        sequence: u32,
    },

    // ── Submission ─────────────────────────────────
    ComplaintSubmitted {
        complaint_id: ComplaintId,
        reference: String,
        location_id: Option<LocationId>,
        parent_id: Option<ComplaintId>,
        intensity: u32,
    },
    SubmissionBlocked {
        location_id: LocationId,
        blocking_complaint_id: ComplaintId,
        scan_count: u32,
    },

    // ── Verification ───────────────────────────────
    VerificationIssued {
        complaint_id: ComplaintId,
    },
    ComplaintVerified {
        complaint_id: ComplaintId,
    },
    VerificationFailed {
        complaint_id: ComplaintId,
        attempts: u32,
    },
    ComplaintDiscarded {
        complaint_id: ComplaintId,
        reference: String,
        reason: DiscardReason,
        discarded_children: Vec<ComplaintId>,
    },

    // ── Lifecycle ──────────────────────────────────
    StatusChanged {
        complaint_id: ComplaintId,
        from: ComplaintStatus,
        to: ComplaintStatus,
        cascaded_to: Vec<ComplaintId>,
    },
    WorkerAssigned {
        complaint_id: ComplaintId,
        worker: String,
    },
    ComplaintClosed {
        complaint_id: ComplaintId,
        frozen_status: ComplaintStatus,
        cascaded_to: Vec<ComplaintId>,
        automatic: bool,
    },
}

impl IntakeEvent {
    /// Stable name for the `event_type` column.
    pub fn type_name(&self) -> &'static str {
        match self {
            Self::LocationRegistered { .. } => "location_registered",
            Self::ComplaintSubmitted { .. } => "complaint_submitted",
            Self::SubmissionBlocked { .. } => "submission_blocked",
            Self::VerificationIssued { .. } => "verification_issued",
            Self::ComplaintVerified { .. } => "complaint_verified",
            Self::VerificationFailed { .. } => "verification_failed",
            Self::ComplaintDiscarded { .. } => "complaint_discarded",
            Self::StatusChanged { .. } => "status_changed",
            Self::WorkerAssigned { .. } => "worker_assigned",
            Self::ComplaintClosed { .. } => "complaint_closed",
        }
    }

    /// The complaint this event is filed under, if any.
    pub fn complaint_id(&self) -> Option<ComplaintId> {
        match self {
            Self::LocationRegistered { .. } => None,
            Self::SubmissionBlocked {
                blocking_complaint_id,
                ..
            } => Some(*blocking_complaint_id),
            Self::ComplaintSubmitted { complaint_id, .. }
            | Self::VerificationIssued { complaint_id }
            | Self::ComplaintVerified { complaint_id }
            | Self::VerificationFailed { complaint_id, .. }
            | Self::ComplaintDiscarded { complaint_id, .. }
            | Self::StatusChanged { complaint_id, .. }
            | Self::WorkerAssigned { complaint_id, .. }
            | Self::ComplaintClosed { complaint_id, .. } => Some(*complaint_id),
        }
    }
}

/// The event log entry as persisted to SQLite.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EventLogEntry {
    pub id: Option<i64>,
    pub event_id: String,
    pub occurred_at: Timestamp,
    pub source: String,
    pub event_type: String,
    pub complaint_id: Option<ComplaintId>,
    pub payload: String, // JSON-serialized IntakeEvent
}

impl EventLogEntry {
    pub fn decode(&self) -> serde_json::Result<IntakeEvent> {
        serde_json::from_str(&self.payload)
    }
}
