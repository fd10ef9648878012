//! SQLite persistence layer.
//!
//! RULE: Only the store talks to the database.
//! Engine components call store methods; they never execute SQL directly.
//! Every engine operation runs inside `with_transaction`, which takes the
//! SQLite write lock up front (`BEGIN IMMEDIATE`) so that concurrent
//! processes submitting at the same location are serialized by the database.

use crate::{
    error::IntakeResult,
    event::{EventLogEntry, IntakeEvent},
    location::{City, Station},
    types::{from_millis, to_millis, ComplaintId, Timestamp},
};
use rusqlite::{params, Connection, OptionalExtension};
use std::time::Duration;

mod complaint;
mod location;
mod scan_attempt;
mod verification;

pub use scan_attempt::ScanAttemptRecord;
pub use verification::VerificationRecord;

const DEFAULT_BUSY_TIMEOUT: Duration = Duration::from_secs(5);

pub struct IntakeStore {
    conn: Connection,
    path: Option<String>, // None for :memory:, Some(path) for file
}

impl IntakeStore {
    pub fn open(path: &str) -> IntakeResult<Self> {
        let conn = Connection::open_with_flags(
            path,
            rusqlite::OpenFlags::SQLITE_OPEN_READ_WRITE
                | rusqlite::OpenFlags::SQLITE_OPEN_CREATE
                | rusqlite::OpenFlags::SQLITE_OPEN_URI,
        )?;
        // WAL mode only for real files (shared-memory and :memory: ignore it).
        let _ = conn.execute_batch("PRAGMA journal_mode=WAL;");
        conn.execute_batch("PRAGMA foreign_keys=ON;")?;
        conn.busy_timeout(DEFAULT_BUSY_TIMEOUT)?;
        Ok(Self {
            conn,
            path: Some(path.to_string()),
        })
    }

    /// Open an in-memory database (used in tests).
    pub fn in_memory() -> IntakeResult<Self> {
        let conn = Connection::open_in_memory()?;
        conn.execute_batch("PRAGMA foreign_keys=ON;")?;
        Ok(Self { conn, path: None })
    }

    /// Open a second connection to the same database file.
    /// For in-memory databases this returns a new, isolated database.
    pub fn reopen(&self) -> IntakeResult<Self> {
        match &self.path {
            Some(p) => Self::open(p),
            None => Self::in_memory(),
        }
    }

    pub fn set_busy_timeout(&self, timeout: Duration) -> IntakeResult<()> {
        self.conn.busy_timeout(timeout)?;
        Ok(())
    }

    /// Apply all schema migrations in order. Safe to run repeatedly.
    pub fn migrate(&self) -> IntakeResult<()> {
        self.conn
            .execute_batch(include_str!("../../../migrations/001_foundation.sql"))?;
        self.conn
            .execute_batch(include_str!("../../../migrations/002_complaints.sql"))?;
        self.conn
            .execute_batch(include_str!("../../../migrations/003_verification.sql"))?;
        self.conn
            .execute_batch(include_str!("../../../migrations/004_scan_attempts.sql"))?;
        Ok(())
    }

    /// Run `op` as one write transaction. Any error rolls everything back.
    pub fn with_transaction<T>(
        &self,
        op: impl FnOnce(&Self) -> IntakeResult<T>,
    ) -> IntakeResult<T> {
        self.conn.execute_batch("BEGIN IMMEDIATE;")?;
        let result = op(self).and_then(|value| {
            self.conn.execute_batch("COMMIT;")?;
            Ok(value)
        });
        if result.is_err() && !self.conn.is_autocommit() {
            if let Err(e) = self.conn.execute_batch("ROLLBACK;") {
                log::warn!("rollback failed: {e}");
            }
        }
        result
    }

    // ── Event log ──────────────────────────────────────────────

    pub fn append_event(
        &self,
        source: &str,
        event: &IntakeEvent,
        at: Timestamp,
    ) -> IntakeResult<()> {
        let payload = serde_json::to_string(event)?;
        self.conn.execute(
            "INSERT INTO event_log (event_id, occurred_at_ms, source, event_type, complaint_id, payload)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            params![
                uuid::Uuid::new_v4().to_string(),
                to_millis(at),
                source,
                event.type_name(),
                event.complaint_id(),
                payload,
            ],
        )?;
        Ok(())
    }

    pub fn events_for_complaint(&self, complaint_id: ComplaintId) -> IntakeResult<Vec<EventLogEntry>> {
        let mut stmt = self.conn.prepare(
            "SELECT id, event_id, occurred_at_ms, source, event_type, complaint_id, payload
             FROM event_log WHERE complaint_id = ?1
             ORDER BY id ASC",
        )?;
        let entries = stmt
            .query_map(params![complaint_id], event_row_mapper)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(entries)
    }

    pub fn events_of_type(&self, event_type: &str) -> IntakeResult<Vec<EventLogEntry>> {
        let mut stmt = self.conn.prepare(
            "SELECT id, event_id, occurred_at_ms, source, event_type, complaint_id, payload
             FROM event_log WHERE event_type = ?1
             ORDER BY id ASC",
        )?;
        let entries = stmt
            .query_map(params![event_type], event_row_mapper)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(entries)
    }

    // ── City / Station ─────────────────────────────────────────

    pub fn upsert_city(&self, city: &City) -> IntakeResult<()> {
        self.conn.execute(
            "INSERT INTO city (city_code, name) VALUES (?1, ?2)
             ON CONFLICT(city_code) DO UPDATE SET name = excluded.name",
            params![city.city_code, city.name],
        )?;
        Ok(())
    }

    pub fn get_city(&self, city_code: &str) -> IntakeResult<Option<City>> {
        let city = self
            .conn
            .query_row(
                "SELECT city_code, name FROM city WHERE city_code = ?1",
                params![city_code],
                |row| {
                    Ok(City {
                        city_code: row.get(0)?,
                        name: row.get(1)?,
                    })
                },
            )
            .optional()?;
        Ok(city)
    }

    pub fn upsert_station(&self, station: &Station) -> IntakeResult<()> {
        self.conn.execute(
            "INSERT INTO station (station_code, name, city_code) VALUES (?1, ?2, ?3)
             ON CONFLICT(station_code) DO UPDATE SET name = excluded.name, city_code = excluded.city_code",
            params![station.station_code, station.name, station.city_code],
        )?;
        Ok(())
    }

    pub fn get_station(&self, station_code: &str) -> IntakeResult<Option<Station>> {
        let station = self
            .conn
            .query_row(
                "SELECT station_code, name, city_code FROM station WHERE station_code = ?1",
                params![station_code],
                |row| {
                    Ok(Station {
                        station_code: row.get(0)?,
                        name: row.get(1)?,
                        city_code: row.get(2)?,
                    })
                },
            )
            .optional()?;
        Ok(station)
    }
}

fn event_row_mapper(row: &rusqlite::Row<'_>) -> rusqlite::Result<EventLogEntry> {
    Ok(EventLogEntry {
        id: Some(row.get(0)?),
        event_id: row.get(1)?,
        occurred_at: from_millis(row.get(2)?)?,
        source: row.get(3)?,
        event_type: row.get(4)?,
        complaint_id: row.get(5)?,
        payload: row.get(6)?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::complaint::{ComplaintStatus, NewComplaint};
    use chrono::{TimeZone, Utc};

    fn seeded() -> (IntakeStore, ComplaintId) {
        let store = IntakeStore::in_memory().unwrap();
        store.migrate().unwrap();
        store
            .upsert_city(&City {
                city_code: "DL".into(),
                name: "Delhi".into(),
            })
            .unwrap();
        store
            .upsert_station(&Station {
                station_code: "NDLS".into(),
                name: "New Delhi".into(),
                city_code: "DL".into(),
            })
            .unwrap();
        let now = Utc.with_ymd_and_hms(2025, 6, 5, 10, 0, 0).unwrap();
        let draft = NewComplaint {
            station_code: "NDLS".into(),
            location_id: None,
            platform_number: 1,
            reporter_name: "Asha".into(),
            reporter_phone: "9000000001".into(),
            description: "Spill".into(),
            status: ComplaintStatus::Pending,
            assigned_worker: None,
            parent_id: None,
            intensity: 0,
        };
        let id = store
            .insert_complaint(&draft, "20250605-DL-NDLS-0001", now)
            .unwrap();
        store.insert_verification(id, "123456", now).unwrap();
        (store, id)
    }

    fn rejected(store: &IntakeStore, sql: &str, id: ComplaintId) -> bool {
        match store.conn.execute(sql, params![id]) {
            Err(e) => e.to_string().contains("immutable") || e.to_string().contains("cannot"),
            Ok(_) => false,
        }
    }

    #[test]
    fn reference_cannot_be_rewritten() {
        let (store, id) = seeded();
        assert!(rejected(
            &store,
            "UPDATE complaint SET reference = 'other' WHERE complaint_id = ?1",
            id
        ));
    }

    #[test]
    fn closed_complaint_is_frozen_at_the_row_level() {
        let (store, id) = seeded();
        store
            .conn
            .execute(
                "UPDATE complaint SET closed = 1, closed_status = status WHERE complaint_id = ?1",
                params![id],
            )
            .unwrap();

        for sql in [
            "UPDATE complaint SET status = 'resolved' WHERE complaint_id = ?1",
            "UPDATE complaint SET assigned_worker = 'crew-b' WHERE complaint_id = ?1",
            "UPDATE complaint SET closed = 0 WHERE complaint_id = ?1",
        ] {
            assert!(rejected(&store, sql, id), "accepted: {sql}");
        }
        let after = store.get_complaint(id).unwrap().unwrap();
        assert_eq!(after.status, ComplaintStatus::Pending);
        assert!(after.closed);
    }

    #[test]
    fn otp_attempts_never_decrease() {
        let (store, id) = seeded();
        assert_eq!(store.increment_verification_attempts(id).unwrap(), 1);
        assert!(rejected(
            &store,
            "UPDATE otp_verification SET attempts = 0 WHERE complaint_id = ?1",
            id
        ));
        assert_eq!(store.get_verification(id).unwrap().unwrap().attempts, 1);
    }

    #[test]
    fn verified_otp_code_is_frozen() {
        let (store, id) = seeded();
        let now = Utc.with_ymd_and_hms(2025, 6, 5, 10, 1, 0).unwrap();
        store.mark_verification_verified(id, now).unwrap();
        assert!(rejected(
            &store,
            "UPDATE otp_verification SET code = '000000' WHERE complaint_id = ?1",
            id
        ));
        assert_eq!(store.get_verification(id).unwrap().unwrap().code, "123456");
    }
}
