//! Several connections to one database file submitting at once.
//! The write lock taken per operation keeps references unique and
//! scan counts exact.

mod common;

use common::*;
use railclean_core::{
    clock::ManualClock,
    config::IntakeConfig,
    engine::IntakeEngine,
    notify::RecordingNotifier,
    rng::CodeRng,
    store::IntakeStore,
    submission::SubmitOutcome,
};
use std::collections::HashSet;
use std::thread;

const WORKERS: u64 = 4;
const PER_WORKER: usize = 5;

fn engine_on(path: &str, seed: u64) -> IntakeEngine {
    let store = IntakeStore::open(path).unwrap();
    IntakeEngine::new(
        store,
        IntakeConfig::default(),
        Box::new(ManualClock::new(t0())),
        Box::new(RecordingNotifier::new()),
        CodeRng::seeded(seed),
    )
    .unwrap()
}

/// Returns the temp dir (kept alive), the db path and the fixture location id.
fn seeded_db() -> (tempfile::TempDir, String, i64) {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("intake.db").to_string_lossy().into_owned();
    let store = IntakeStore::open(&path).unwrap();
    store.migrate().unwrap();
    let engine = IntakeEngine::new(
        store,
        IntakeConfig::default(),
        Box::new(ManualClock::new(t0())),
        Box::new(RecordingNotifier::new()),
        CodeRng::seeded(1),
    )
    .unwrap();
    engine.register_city(CITY, "Delhi").unwrap();
    engine.register_station(STATION, "New Delhi", CITY).unwrap();
    let location = engine.register_location(STATION, PLATFORM, "Near Washroom").unwrap();
    (dir, path, location.location_id)
}

#[test]
fn concurrent_submissions_get_unique_references() {
    let (_dir, path, location_id) = seeded_db();

    let handles: Vec<_> = (0..WORKERS)
        .map(|w| {
            let path = path.clone();
            thread::spawn(move || {
                let mut engine = engine_on(&path, 100 + w);
                (0..PER_WORKER)
                    .map(|i| {
                        let phone = format!("90000{w}{i:04}");
                        let outcome = engine.submit(&submission_at(location_id, &phone)).unwrap();
                        match outcome {
                            SubmitOutcome::Created { reference, .. } => reference,
                            other => panic!("unverified complaints never block, got {other:?}"),
                        }
                    })
                    .collect::<Vec<_>>()
            })
        })
        .collect();

    let references: Vec<String> = handles
        .into_iter()
        .flat_map(|h| h.join().unwrap())
        .collect();
    let unique: HashSet<&String> = references.iter().collect();
    let total = WORKERS as usize * PER_WORKER;
    assert_eq!(unique.len(), total, "duplicate references: {references:?}");

    let expected: HashSet<String> = (1..=total)
        .map(|n| format!("20250605-DL-NDLS-{n:04}"))
        .collect();
    assert_eq!(unique.into_iter().cloned().collect::<HashSet<_>>(), expected);
}

#[test]
fn concurrent_blocked_scans_are_all_counted() {
    let (_dir, path, location_id) = seeded_db();

    let mut first = engine_on(&path, 7);
    let blocker = match first.submit(&submission_at(location_id, "9000000001")).unwrap() {
        SubmitOutcome::Created { complaint_id, .. } => complaint_id,
        other => panic!("expected Created, got {other:?}"),
    };
    let code = first.store().get_verification(blocker).unwrap().unwrap().code;
    first.verify(blocker, &code).unwrap();

    let handles: Vec<_> = (0..WORKERS)
        .map(|w| {
            let path = path.clone();
            thread::spawn(move || {
                let mut engine = engine_on(&path, 200 + w);
                for i in 0..PER_WORKER {
                    let phone = format!("91000{w}{i:04}");
                    let outcome = engine.submit(&submission_at(location_id, &phone)).unwrap();
                    assert!(matches!(outcome, SubmitOutcome::Blocked { .. }), "got {outcome:?}");
                }
            })
        })
        .collect();
    for h in handles {
        h.join().unwrap();
    }

    let attempts = first
        .store()
        .get_scan_attempt(location_id, blocker)
        .unwrap()
        .unwrap();
    let total = WORKERS as usize * PER_WORKER;
    assert_eq!(attempts.attempt_count as usize, total);
    assert_eq!(attempts.reporter_phones.len(), total);
    assert_eq!(first.store().complaint_count().unwrap(), 1);
}
