//! The intake engine.
//!
//! SUBMISSION ORDER (fixed, never reordered):
//!   1. Validate the submission
//!   2. Resolve the target to a station and, for QR scans, a location
//!   3. Duplicate detector   (may answer Blocked and stop)
//!   4. Escalation linker    (decides root or child)
//!   5. Reserve the daily reference sequence and write the complaint
//!   6. Verification gate issues a code
//!   7. Notifier delivers the code
//!
//! RULES:
//!   - Every public operation runs as one store transaction.
//!   - A failure at any step, including delivery, rolls the whole step back.
//!   - The code is delivered before COMMIT. If the commit itself then fails,
//!     the reporter holds a code for a complaint that was never stored, and
//!     verifying it answers NotFound.
//!   - All time comes from the injected clock; all codes from the CodeRng.

use crate::{
    clock::Clock,
    complaint::{format_reference, reporting_day, ComplaintRecord, ComplaintStatus, NewComplaint},
    config::IntakeConfig,
    duplicate_detector::DuplicateDetector,
    error::{IntakeError, IntakeResult},
    escalation_linker::EscalationLinker,
    event::IntakeEvent,
    lifecycle::{ClosedComplaint, Closure, LifecycleCoordinator, StatusChange},
    location::{City, Location, LocationRegistry, Station},
    notify::Notifier,
    rng::CodeRng,
    store::IntakeStore,
    submission::{ReportTarget, SubmitOutcome, Submission},
    types::{ComplaintId, LocationId, Timestamp},
    verification_gate::{VerificationGate, VerifyOutcome},
};
use serde::Serialize;
use std::time::Duration as StdDuration;

const SOURCE: &str = "intake";

/// Result of an auto-close sweep.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AutoCloseReport {
    pub cutoff: Timestamp,
    pub dry_run: bool,
    /// Everything closed (or that would be closed), cascaded children included.
    pub closed: Vec<ClosedComplaint>,
}

pub struct IntakeEngine {
    store: IntakeStore,
    config: IntakeConfig,
    clock: Box<dyn Clock>,
    notifier: Box<dyn Notifier>,
    rng: CodeRng,
    detector: DuplicateDetector,
    linker: EscalationLinker,
    gate: VerificationGate,
}

impl IntakeEngine {
    /// Wire an engine over an already-migrated store.
    pub fn new(
        store: IntakeStore,
        config: IntakeConfig,
        clock: Box<dyn Clock>,
        notifier: Box<dyn Notifier>,
        rng: CodeRng,
    ) -> IntakeResult<Self> {
        config.validate()?;
        store.set_busy_timeout(StdDuration::from_millis(config.busy_timeout_ms))?;
        let window = config.duplicate_window();
        Ok(Self {
            detector: DuplicateDetector::new(window),
            linker: EscalationLinker::new(window),
            gate: VerificationGate::new(config.otp_length, config.max_otp_attempts, config.otp_ttl()),
            store,
            config,
            clock,
            notifier,
            rng,
        })
    }

    /// Fresh migrated in-memory engine.
    pub fn in_memory(
        config: IntakeConfig,
        clock: Box<dyn Clock>,
        notifier: Box<dyn Notifier>,
        rng: CodeRng,
    ) -> IntakeResult<Self> {
        let store = IntakeStore::in_memory()?;
        store.migrate()?;
        Self::new(store, config, clock, notifier, rng)
    }

    pub fn store(&self) -> &IntakeStore {
        &self.store
    }

    pub fn config(&self) -> &IntakeConfig {
        &self.config
    }

    pub fn now(&self) -> Timestamp {
        self.clock.now()
    }

    // ── Registry ───────────────────────────────────────────────

    pub fn register_city(&self, city_code: &str, name: &str) -> IntakeResult<City> {
        self.store
            .with_transaction(|store| LocationRegistry::register_city(store, city_code, name))
    }

    pub fn register_station(
        &self,
        station_code: &str,
        name: &str,
        city_code: &str,
    ) -> IntakeResult<Station> {
        self.store.with_transaction(|store| {
            LocationRegistry::register_station(store, station_code, name, city_code)
        })
    }

    pub fn register_location(
        &self,
        station_code: &str,
        platform_number: u32,
        description: &str,
    ) -> IntakeResult<Location> {
        let now = self.clock.now();
        self.store.with_transaction(|store| {
            LocationRegistry::register_location(store, station_code, platform_number, description, now)
        })
    }

    pub fn register_default_locations(
        &self,
        station_code: &str,
        platform_number: u32,
    ) -> IntakeResult<Vec<Location>> {
        let now = self.clock.now();
        self.store.with_transaction(|store| {
            LocationRegistry::register_default_locations(store, station_code, platform_number, now)
        })
    }

    pub fn location(&self, location_id: LocationId) -> IntakeResult<Location> {
        LocationRegistry::resolve(&self.store, location_id)
    }

    // ── Submission & verification ──────────────────────────────

    pub fn submit(&mut self, submission: &Submission) -> IntakeResult<SubmitOutcome> {
        submission.validate(&self.config)?;
        let offset = self.config.reporting_offset().ok_or_else(|| {
            IntakeError::Validation("reporting offset out of range".into())
        })?;
        let now = self.clock.now();
        let detector = self.detector;
        let linker = self.linker;
        let gate = self.gate;
        let config = &self.config;
        let notifier = &self.notifier;
        let rng = &mut self.rng;

        self.store.with_transaction(|store| {
            let (station, location) = resolve_target(store, &submission.target)?;

            if let Some(location) = &location {
                if let Some(blocker) = detector.find_blocking_complaint(store, location, now)? {
                    let scan = detector.record_blocked_scan(
                        store,
                        location,
                        &blocker,
                        submission.reporter_phone.trim(),
                        now,
                    )?;
                    store.append_event(
                        SOURCE,
                        &IntakeEvent::SubmissionBlocked {
                            location_id: location.location_id,
                            blocking_complaint_id: blocker.complaint_id,
                            scan_count: scan.attempt_count,
                        },
                        now,
                    )?;
                    return Ok(SubmitOutcome::Blocked {
                        blocking_complaint_id: blocker.complaint_id,
                        blocking_reference: blocker.reference,
                        scan_count: scan.attempt_count,
                    });
                }
            }

            let platform_number = match (&location, &submission.target) {
                (Some(location), _) => location.platform_number,
                (None, ReportTarget::Platform { platform_number, .. }) => *platform_number,
                (None, ReportTarget::Location { location_id }) => {
                    return Err(IntakeError::not_found("location", location_id));
                }
            };
            let draft = NewComplaint {
                station_code: station.station_code.clone(),
                location_id: location.as_ref().map(|l| l.location_id),
                platform_number,
                reporter_name: submission.reporter_name.trim().to_string(),
                reporter_phone: submission.reporter_phone.trim().to_string(),
                description: submission.description.trim().to_string(),
                status: ComplaintStatus::Pending,
                assigned_worker: None,
                parent_id: None,
                intensity: 0,
            };
            let draft = linker.link_or_create(store, draft, location.as_ref(), now)?;

            let day = reporting_day(now, offset);
            let seq = store.reserve_reference_sequence(
                &station.city_code,
                &station.station_code,
                &day.format("%Y%m%d").to_string(),
            )?;
            let reference = format_reference(day, &station.city_code, &station.station_code, seq);

            let complaint_id = store.insert_complaint(&draft, &reference, now)?;
            store.insert_photo_refs(complaint_id, &submission.photo_refs(), now)?;
            let code = gate.issue(store, rng, complaint_id, now)?;
            store.append_event(
                SOURCE,
                &IntakeEvent::ComplaintSubmitted {
                    complaint_id,
                    reference: reference.clone(),
                    location_id: draft.location_id,
                    parent_id: draft.parent_id,
                    intensity: draft.intensity,
                },
                now,
            )?;

            notifier
                .send(&draft.reporter_phone, &config.render_otp_message(&code))
                .map_err(|e| IntakeError::NotificationFailed(e.to_string()))?;

            log::debug!("submitted {reference} (parent {:?})", draft.parent_id);
            Ok(SubmitOutcome::Created {
                complaint_id,
                reference,
                parent_id: draft.parent_id,
                intensity: draft.intensity,
            })
        })
    }

    pub fn verify(&self, complaint_id: ComplaintId, code: &str) -> IntakeResult<VerifyOutcome> {
        let now = self.clock.now();
        let gate = self.gate;
        self.store.with_transaction(|store| {
            let complaint = require_complaint(store, complaint_id)?;
            gate.check(store, &complaint, code, now)
        })
    }

    // ── Lifecycle ──────────────────────────────────────────────

    pub fn change_status(
        &self,
        complaint_id: ComplaintId,
        status: ComplaintStatus,
    ) -> IntakeResult<StatusChange> {
        let now = self.clock.now();
        self.store.with_transaction(|store| {
            let complaint = require_complaint(store, complaint_id)?;
            LifecycleCoordinator::set_status(store, &complaint, status, now)
        })
    }

    pub fn close(&self, complaint_id: ComplaintId) -> IntakeResult<Closure> {
        let now = self.clock.now();
        self.store.with_transaction(|store| {
            let complaint = require_complaint(store, complaint_id)?;
            LifecycleCoordinator::close(store, &complaint, false, now)
        })
    }

    pub fn assign_worker(&self, complaint_id: ComplaintId, worker: &str) -> IntakeResult<()> {
        let now = self.clock.now();
        self.store.with_transaction(|store| {
            let complaint = require_complaint(store, complaint_id)?;
            LifecycleCoordinator::assign_worker(store, &complaint, worker, now)
        })
    }

    /// Close every open complaint older than `auto_close_after_hours`.
    /// Roots cascade to their children exactly as a manual close does.
    pub fn auto_close_stale(&self, dry_run: bool) -> IntakeResult<AutoCloseReport> {
        let now = self.clock.now();
        let cutoff = now - self.config.auto_close_after();
        self.store.with_transaction(|store| {
            let mut closed: Vec<ClosedComplaint> = Vec::new();
            for stale in store.open_complaints_created_before(cutoff)? {
                if closed.iter().any(|c| c.complaint_id == stale.complaint_id) {
                    continue;
                }
                if dry_run {
                    closed.push(ClosedComplaint {
                        complaint_id: stale.complaint_id,
                        frozen_status: stale.status,
                    });
                    if stale.is_root() {
                        for child in store.open_children_of(stale.complaint_id)? {
                            if !closed.iter().any(|c| c.complaint_id == child.complaint_id) {
                                closed.push(ClosedComplaint {
                                    complaint_id: child.complaint_id,
                                    frozen_status: child.status,
                                });
                            }
                        }
                    }
                    continue;
                }

                let closure = LifecycleCoordinator::close(store, &stale, true, now)?;
                closed.push(ClosedComplaint {
                    complaint_id: closure.complaint_id,
                    frozen_status: closure.frozen_status,
                });
                closed.extend(closure.closed_children);
            }
            if !closed.is_empty() {
                log::info!(
                    "auto-close{}: {} complaint(s) created before {cutoff}",
                    if dry_run { " (dry run)" } else { "" },
                    closed.len()
                );
            }
            Ok(AutoCloseReport {
                cutoff,
                dry_run,
                closed,
            })
        })
    }

    // ── Queries ────────────────────────────────────────────────

    pub fn complaint(&self, complaint_id: ComplaintId) -> IntakeResult<ComplaintRecord> {
        require_complaint(&self.store, complaint_id)
    }

    /// Verified complaints, newest first.
    pub fn triage_queue(&self, station_code: Option<&str>) -> IntakeResult<Vec<ComplaintRecord>> {
        self.store.verified_complaints(station_code)
    }
}

fn require_complaint(store: &IntakeStore, complaint_id: ComplaintId) -> IntakeResult<ComplaintRecord> {
    store
        .get_complaint(complaint_id)?
        .ok_or_else(|| IntakeError::not_found("complaint", complaint_id))
}

fn resolve_target(
    store: &IntakeStore,
    target: &ReportTarget,
) -> IntakeResult<(Station, Option<Location>)> {
    let (station_code, location) = match target {
        ReportTarget::Location { location_id } => {
            let location = LocationRegistry::resolve(store, *location_id)?;
            (location.station_code.clone(), Some(location))
        }
        ReportTarget::Platform { station_code, .. } => (station_code.clone(), None),
    };
    let station = store
        .get_station(&station_code)?
        .ok_or_else(|| IntakeError::not_found("station", &station_code))?;
    Ok((station, location))
}
