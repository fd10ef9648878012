//! Escalation linker: reports at a spot already being worked become
//! numbered children of the in-progress root.

mod common;

use common::*;
use railclean_core::{
    complaint::{ComplaintStatus, NewComplaint},
    error::IntakeError,
    submission::SubmitOutcome,
    types::ComplaintId,
};

/// Root at T=0, moved to in_progress and assigned. Unverified roots don't
/// block, so follow-up scans reach the linker.
fn worked_root(h: &mut Harness, worker: &str) -> ComplaintId {
    let root = h.scan_new("9000000001");
    h.engine.change_status(root, ComplaintStatus::InProgress).unwrap();
    h.engine.assign_worker(root, worker).unwrap();
    root
}

#[test]
fn successive_reports_get_ordinals_one_and_two() {
    let mut h = harness();
    let root = worked_root(&mut h, "sweeper-07");

    h.advance_minutes(2);
    let first = h.scan("9000000002");
    h.advance_minutes(2);
    let second = h.scan("9000000003");

    match (&first, &second) {
        (
            SubmitOutcome::Created {
                parent_id: Some(p1),
                intensity: 1,
                ..
            },
            SubmitOutcome::Created {
                parent_id: Some(p2),
                intensity: 2,
                ..
            },
        ) => {
            assert_eq!(*p1, root);
            assert_eq!(*p2, root);
        }
        other => panic!("expected two linked children, got {other:?}"),
    }
}

#[test]
fn children_inherit_worker_and_start_in_progress() {
    let mut h = harness();
    let root = worked_root(&mut h, "sweeper-07");
    h.advance_minutes(1);
    let child = h.scan_new("9000000002");

    let child = h.engine.complaint(child).unwrap();
    assert_eq!(child.parent_id, Some(root));
    assert_eq!(child.status, ComplaintStatus::InProgress);
    assert_eq!(child.assigned_worker.as_deref(), Some("sweeper-07"));
    assert!(!child.verified, "children still go through OTP");
}

#[test]
fn nesting_never_exceeds_one_level() {
    let mut h = harness();
    let root = worked_root(&mut h, "sweeper-07");
    let mut ids = Vec::new();
    for i in 0..4 {
        h.advance_minutes(1);
        ids.push(h.scan_new(&format!("90000000{:02}", 10 + i)));
    }

    for (n, id) in ids.iter().enumerate() {
        let c = h.engine.complaint(*id).unwrap();
        assert_eq!(c.parent_id, Some(root), "child #{n} must hang off the root");
        assert_eq!(c.intensity, n as u32 + 1);
        assert!(h.engine.store().children_of(*id).unwrap().is_empty());
    }
    assert!(h.engine.complaint(root).unwrap().is_root());
}

#[test]
fn store_rejects_a_child_under_a_child() {
    let mut h = harness();
    let root = worked_root(&mut h, "sweeper-07");
    h.advance_minutes(1);
    let child = h.scan_new("9000000002");

    let grandchild = NewComplaint {
        station_code: STATION.into(),
        location_id: Some(h.location.location_id),
        platform_number: PLATFORM,
        reporter_name: "x".into(),
        reporter_phone: "9000000003".into(),
        description: "x".into(),
        status: ComplaintStatus::InProgress,
        assigned_worker: None,
        parent_id: Some(child),
        intensity: 1,
    };
    let err = h
        .engine
        .store()
        .insert_complaint(&grandchild, "manual-ref", h.engine.now())
        .unwrap_err();
    assert!(matches!(err, IntakeError::Database(_)), "got {err:?}");
    assert_eq!(h.engine.store().children_of(root).unwrap().len(), 1);
}

#[test]
fn pending_and_resolved_roots_are_not_targets() {
    let mut h = harness();
    let pending = h.scan_new("9000000001");
    h.advance_minutes(1);
    let next_id = h.scan_new("9000000002");
    let next = h.engine.complaint(next_id).unwrap();
    assert!(next.is_root(), "pending root {pending} must not collect children");

    h.engine.change_status(pending, ComplaintStatus::Resolved).unwrap();
    h.advance_minutes(1);
    let after_id = h.scan_new("9000000003");
    let after = h.engine.complaint(after_id).unwrap();
    assert_ne!(after.parent_id, Some(pending));
}

#[test]
fn closed_roots_are_not_targets() {
    let mut h = harness();
    let root = worked_root(&mut h, "sweeper-07");
    h.engine.close(root).unwrap();

    h.advance_minutes(1);
    let next_id = h.scan_new("9000000002");
    let next = h.engine.complaint(next_id).unwrap();
    assert!(next.is_root());
    assert_eq!(next.status, ComplaintStatus::Pending);
}

#[test]
fn roots_outside_the_window_are_not_targets() {
    let mut h = harness();
    worked_root(&mut h, "sweeper-07");

    h.advance_minutes(16);
    let next_id = h.scan_new("9000000002");
    let next = h.engine.complaint(next_id).unwrap();
    assert!(next.is_root());
    assert_eq!(next.intensity, 0);
}

/// Earliest-created root wins; equal timestamps fall back to lowest id.
#[test]
fn tie_break_prefers_earliest_then_lowest_id() {
    let mut h = harness();
    let older = h.scan_new("9000000001");
    let same_instant = h.scan_new("9000000002");
    h.advance_minutes(1);
    let younger = h.scan_new("9000000003");
    for id in [younger, same_instant, older] {
        h.engine.change_status(id, ComplaintStatus::InProgress).unwrap();
    }
    assert!(older < same_instant);

    h.advance_minutes(1);
    let child_id = h.scan_new("9000000004");
    let child = h.engine.complaint(child_id).unwrap();
    assert_eq!(child.parent_id, Some(older));
}

/// A verified in-progress root blocks the scan before linking is considered.
#[test]
fn detector_takes_precedence_over_linker() {
    let mut h = harness();
    let root = worked_root(&mut h, "sweeper-07");
    h.verify(root);

    h.advance_minutes(5);
    match h.scan("9000000002") {
        SubmitOutcome::Blocked {
            blocking_complaint_id,
            ..
        } => assert_eq!(blocking_complaint_id, root),
        other => panic!("expected Blocked, got {other:?}"),
    }
    assert!(h.engine.store().children_of(root).unwrap().is_empty());
}

/// Reports without a location are always standalone roots.
#[test]
fn platform_reports_are_never_linked() {
    let mut h = harness();
    let first = created_id(&h.engine.submit(&platform_submission("9000000001")).unwrap());
    h.engine.change_status(first, ComplaintStatus::InProgress).unwrap();

    h.advance_minutes(1);
    let outcome = h.engine.submit(&platform_submission("9000000002")).unwrap();
    assert!(matches!(
        outcome,
        SubmitOutcome::Created {
            parent_id: None,
            intensity: 0,
            ..
        }
    ));
}
