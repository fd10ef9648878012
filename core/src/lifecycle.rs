//! Lifecycle coordinator.
//!
//! Status is one of {pending, in_progress, resolved}. Closure is a separate,
//! one-way flag that freezes the status it found. A closed complaint accepts
//! no further status or worker changes.
//!
//! Cascades run from a root to its open children only:
//!   - a root leaving (or not entering) in_progress resolves every open child
//!   - closing a root closes every open child at the child's own status
//! Assigning a worker never cascades.

use crate::{
    complaint::{ComplaintRecord, ComplaintStatus},
    error::{IntakeError, IntakeResult},
    event::IntakeEvent,
    store::IntakeStore,
    types::{ComplaintId, Timestamp},
};
use serde::Serialize;

const SOURCE: &str = "lifecycle";

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StatusChange {
    pub complaint_id: ComplaintId,
    pub from: ComplaintStatus,
    pub to: ComplaintStatus,
    /// Children force-resolved by this change.
    pub resolved_children: Vec<ComplaintId>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ClosedComplaint {
    pub complaint_id: ComplaintId,
    pub frozen_status: ComplaintStatus,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Closure {
    pub complaint_id: ComplaintId,
    pub frozen_status: ComplaintStatus,
    pub closed_at: Timestamp,
    pub closed_children: Vec<ClosedComplaint>,
}

pub struct LifecycleCoordinator;

impl LifecycleCoordinator {
    pub fn set_status(
        store: &IntakeStore,
        complaint: &ComplaintRecord,
        new_status: ComplaintStatus,
        now: Timestamp,
    ) -> IntakeResult<StatusChange> {
        if complaint.closed {
            return Err(IntakeError::invalid_transition(
                complaint.complaint_id,
                "complaint is closed",
            ));
        }

        store.update_complaint_status(complaint.complaint_id, new_status, now)?;

        let mut resolved_children = Vec::new();
        if complaint.is_root() && new_status != ComplaintStatus::InProgress {
            for child in store.open_children_of(complaint.complaint_id)? {
                if child.status != ComplaintStatus::Resolved {
                    store.update_complaint_status(child.complaint_id, ComplaintStatus::Resolved, now)?;
                    resolved_children.push(child.complaint_id);
                }
            }
        }

        store.append_event(
            SOURCE,
            &IntakeEvent::StatusChanged {
                complaint_id: complaint.complaint_id,
                from: complaint.status,
                to: new_status,
                cascaded_to: resolved_children.clone(),
            },
            now,
        )?;

        Ok(StatusChange {
            complaint_id: complaint.complaint_id,
            from: complaint.status,
            to: new_status,
            resolved_children,
        })
    }

    pub fn close(
        store: &IntakeStore,
        complaint: &ComplaintRecord,
        automatic: bool,
        now: Timestamp,
    ) -> IntakeResult<Closure> {
        if complaint.closed {
            return Err(IntakeError::AlreadyClosed {
                complaint_id: complaint.complaint_id,
            });
        }

        store.mark_complaint_closed(complaint.complaint_id, now)?;

        let mut closed_children = Vec::new();
        if complaint.is_root() {
            for child in store.open_children_of(complaint.complaint_id)? {
                store.mark_complaint_closed(child.complaint_id, now)?;
                closed_children.push(ClosedComplaint {
                    complaint_id: child.complaint_id,
                    frozen_status: child.status,
                });
            }
        }

        store.append_event(
            SOURCE,
            &IntakeEvent::ComplaintClosed {
                complaint_id: complaint.complaint_id,
                frozen_status: complaint.status,
                cascaded_to: closed_children.iter().map(|c| c.complaint_id).collect(),
                automatic,
            },
            now,
        )?;

        Ok(Closure {
            complaint_id: complaint.complaint_id,
            frozen_status: complaint.status,
            closed_at: now,
            closed_children,
        })
    }

    pub fn assign_worker(
        store: &IntakeStore,
        complaint: &ComplaintRecord,
        worker: &str,
        now: Timestamp,
    ) -> IntakeResult<()> {
        if complaint.closed {
            return Err(IntakeError::invalid_transition(
                complaint.complaint_id,
                "complaint is closed",
            ));
        }
        let worker = worker.trim();
        if worker.is_empty() {
            return Err(IntakeError::Validation("worker label is required".into()));
        }
        store.update_assigned_worker(complaint.complaint_id, worker, now)?;
        store.append_event(
            SOURCE,
            &IntakeEvent::WorkerAssigned {
                complaint_id: complaint.complaint_id,
                worker: worker.to_string(),
            },
            now,
        )?;
        Ok(())
    }
}
