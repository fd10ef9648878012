//! Escalation linker.
//!
//! Runs only after the duplicate detector let a submission through. If
//! someone is already working the same spot (an open, in-progress root
//! created inside the window) the new report becomes an intensity child
//! of that root: it inherits the root's worker and is in progress from
//! the start. Otherwise it is a fresh pending root.
//!
//! Only roots are link targets, so nesting never goes deeper than one
//! level. When several roots qualify the earliest created wins, ties
//! broken by lowest id.

use crate::{
    complaint::{ComplaintStatus, NewComplaint},
    error::IntakeResult,
    location::Location,
    store::IntakeStore,
    types::Timestamp,
};
use chrono::Duration;

#[derive(Debug, Clone, Copy)]
pub struct EscalationLinker {
    window: Duration,
}

impl EscalationLinker {
    pub fn new(window: Duration) -> Self {
        Self { window }
    }

    /// Returns `draft` with its parent, status, worker and ordinal decided.
    /// Submissions without a location are always standalone roots.
    pub fn link_or_create(
        &self,
        store: &IntakeStore,
        mut draft: NewComplaint,
        location: Option<&Location>,
        now: Timestamp,
    ) -> IntakeResult<NewComplaint> {
        draft.parent_id = None;
        draft.intensity = 0;
        draft.status = ComplaintStatus::Pending;
        draft.assigned_worker = None;

        let Some(location) = location else {
            return Ok(draft);
        };
        let Some(parent) =
            store.find_escalation_parent(location.location_id, now - self.window, now)?
        else {
            return Ok(draft);
        };

        let ordinal = store.max_child_intensity(parent.complaint_id)? + 1;
        draft.parent_id = Some(parent.complaint_id);
        draft.intensity = ordinal;
        draft.status = ComplaintStatus::InProgress;
        draft.assigned_worker = parent.assigned_worker.clone();
        log::debug!(
            "linking report at location {} under {} as #{ordinal}",
            location.location_id,
            parent.reference
        );
        Ok(draft)
    }
}
