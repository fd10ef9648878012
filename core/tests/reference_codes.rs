//! Reference codes: `YYYYMMDD-<city>-<station>-NNNN`, sequence per
//! city + station + day.

mod common;

use chrono::{Duration, TimeZone, Utc};
use common::*;
use railclean_core::config::IntakeConfig;

fn reference_of(h: &Harness, id: i64) -> String {
    h.engine.complaint(id).unwrap().reference
}

#[test]
fn daily_sequence_counts_up_per_station() {
    let mut h = harness();
    let a = h.scan_new("9000000001");
    h.advance_minutes(1);
    let b = h.scan_new("9000000002");

    assert_eq!(reference_of(&h, a), "20250605-DL-NDLS-0001");
    assert_eq!(reference_of(&h, b), "20250605-DL-NDLS-0002");
}

#[test]
fn stations_keep_separate_sequences() {
    let mut h = harness();
    h.engine.register_station("DLI", "Old Delhi", CITY).unwrap();
    let old_delhi = h.engine.register_location("DLI", 1, "Entrance Gate").unwrap();

    h.scan_new("9000000001");
    let other = created_id(
        &h.engine
            .submit(&submission_at(old_delhi.location_id, "9000000002"))
            .unwrap(),
    );
    assert_eq!(reference_of(&h, other), "20250605-DL-DLI-0001");
}

#[test]
fn a_new_day_restarts_the_sequence() {
    let mut h = harness();
    h.scan_new("9000000001");
    h.scan_new("9000000002");

    h.advance(Duration::days(1));
    let next_day = h.scan_new("9000000003");
    assert_eq!(reference_of(&h, next_day), "20250606-DL-NDLS-0001");
}

/// The day is taken in the reporting offset, not UTC.
#[test]
fn reporting_offset_decides_the_day() {
    let mut h = harness_with(IntakeConfig {
        reporting_utc_offset_minutes: 330,
        ..IntakeConfig::default()
    });
    // 20:00 UTC is 01:30 the next morning at +05:30.
    h.clock.set(Utc.with_ymd_and_hms(2025, 6, 5, 20, 0, 0).unwrap());
    let id = h.scan_new("9000000001");
    assert_eq!(reference_of(&h, id), "20250606-DL-NDLS-0001");
}

#[test]
fn platform_reports_share_the_station_sequence() {
    let mut h = harness();
    h.scan_new("9000000001");
    let id = created_id(&h.engine.submit(&platform_submission("9000000002")).unwrap());
    assert_eq!(reference_of(&h, id), "20250605-DL-NDLS-0002");
}

#[test]
fn references_resolve_back_to_complaints() {
    let mut h = harness();
    let id = h.scan_new("9000000001");
    let found = h
        .engine
        .store()
        .get_complaint_by_reference("20250605-DL-NDLS-0001")
        .unwrap()
        .expect("lookup by reference");
    assert_eq!(found.complaint_id, id);
}
