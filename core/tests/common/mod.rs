//! Shared fixture: one city, one station, one QR location, and an engine
//! whose clock, SMS outbox and code generator the test controls.
#![allow(dead_code)]

use chrono::{DateTime, Duration, TimeZone, Utc};
use railclean_core::{
    clock::ManualClock,
    config::IntakeConfig,
    engine::IntakeEngine,
    location::Location,
    notify::RecordingNotifier,
    rng::CodeRng,
    submission::{ReportTarget, Submission, SubmitOutcome},
    types::ComplaintId,
    verification_gate::VerifyOutcome,
};

pub const CITY: &str = "DL";
pub const STATION: &str = "NDLS";
pub const PLATFORM: u32 = 3;

/// 2025-06-05 10:00:00 UTC, well away from a day boundary.
pub fn t0() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2025, 6, 5, 10, 0, 0).unwrap()
}

pub struct Harness {
    pub engine: IntakeEngine,
    pub clock: ManualClock,
    pub notifier: RecordingNotifier,
    pub location: Location,
}

pub fn harness() -> Harness {
    harness_with(IntakeConfig::default())
}

pub fn harness_with(config: IntakeConfig) -> Harness {
    let _ = env_logger::builder().is_test(true).try_init();

    let clock = ManualClock::new(t0());
    let notifier = RecordingNotifier::new();
    let engine = IntakeEngine::in_memory(
        config,
        Box::new(clock.clone()),
        Box::new(notifier.clone()),
        CodeRng::seeded(0x5EED),
    )
    .expect("engine");

    engine.register_city(CITY, "Delhi").unwrap();
    engine.register_station(STATION, "New Delhi", CITY).unwrap();
    let location = engine
        .register_location(STATION, PLATFORM, "Near Washroom")
        .unwrap();

    Harness {
        engine,
        clock,
        notifier,
        location,
    }
}

pub fn submission_at(location_id: i64, phone: &str) -> Submission {
    Submission {
        target: ReportTarget::Location { location_id },
        reporter_name: "Reporter".into(),
        reporter_phone: phone.into(),
        description: "Garbage piled up near the bench".into(),
        photos: vec!["uploads/photo-1.jpg".into()],
    }
}

pub fn platform_submission(phone: &str) -> Submission {
    Submission {
        target: ReportTarget::Platform {
            station_code: STATION.into(),
            platform_number: PLATFORM,
        },
        ..submission_at(0, phone)
    }
}

pub fn created_id(outcome: &SubmitOutcome) -> ComplaintId {
    match outcome {
        SubmitOutcome::Created { complaint_id, .. } => *complaint_id,
        other => panic!("expected a created complaint, got {other:?}"),
    }
}

impl Harness {
    pub fn advance_minutes(&self, minutes: i64) {
        self.clock.advance_minutes(minutes);
    }

    pub fn advance(&self, by: Duration) {
        self.clock.advance(by);
    }

    /// Scan the fixture location.
    pub fn scan(&mut self, phone: &str) -> SubmitOutcome {
        let submission = submission_at(self.location.location_id, phone);
        self.engine.submit(&submission).unwrap()
    }

    /// Scan the fixture location and expect a new complaint.
    pub fn scan_new(&mut self, phone: &str) -> ComplaintId {
        let outcome = self.scan(phone);
        created_id(&outcome)
    }

    pub fn otp_for(&self, complaint_id: ComplaintId) -> String {
        self.engine
            .store()
            .get_verification(complaint_id)
            .unwrap()
            .expect("verification record")
            .code
    }

    /// A code guaranteed not to match the issued one.
    pub fn wrong_otp_for(&self, complaint_id: ComplaintId) -> String {
        let code = self.otp_for(complaint_id);
        if code == "000000" {
            "111111".into()
        } else {
            "000000".into()
        }
    }

    pub fn verify(&self, complaint_id: ComplaintId) {
        let code = self.otp_for(complaint_id);
        assert_eq!(
            self.engine.verify(complaint_id, &code).unwrap(),
            VerifyOutcome::Verified
        );
    }

    /// Scan, then verify with the issued code.
    pub fn scan_verified(&mut self, phone: &str) -> ComplaintId {
        let id = self.scan_new(phone);
        self.verify(id);
        id
    }
}
