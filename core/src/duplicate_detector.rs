//! Duplicate detector.
//!
//! A new scan at a location is a duplicate when a verified, still-open
//! complaint at that same location was created inside the trailing
//! window. Unverified complaints never block: their OTP may still fail.
//!
//! On a block the new complaint is not written. Instead the scan is
//! counted against (location, blocking complaint) and the reporter's
//! phone is remembered.

use crate::{
    complaint::ComplaintRecord,
    error::IntakeResult,
    location::Location,
    store::{IntakeStore, ScanAttemptRecord},
    types::Timestamp,
};
use chrono::Duration;

#[derive(Debug, Clone, Copy)]
pub struct DuplicateDetector {
    window: Duration,
}

impl DuplicateDetector {
    pub fn new(window: Duration) -> Self {
        Self { window }
    }

    pub fn window(&self) -> Duration {
        self.window
    }

    /// The earliest complaint that covers a scan of `location` at `now`.
    /// The window is inclusive: `created_at >= now - window`.
    pub fn find_blocking_complaint(
        &self,
        store: &IntakeStore,
        location: &Location,
        now: Timestamp,
    ) -> IntakeResult<Option<ComplaintRecord>> {
        store.find_blocking_complaint(location.location_id, now - self.window, now)
    }

    /// Count a rejected scan against its blocker.
    pub fn record_blocked_scan(
        &self,
        store: &IntakeStore,
        location: &Location,
        blocker: &ComplaintRecord,
        reporter_phone: &str,
        now: Timestamp,
    ) -> IntakeResult<ScanAttemptRecord> {
        let record =
            store.record_scan_attempt(location.location_id, blocker.complaint_id, reporter_phone, now)?;
        log::debug!(
            "scan at location {} blocked by {} (attempt {})",
            location.location_id,
            blocker.reference,
            record.attempt_count
        );
        Ok(record)
    }
}
