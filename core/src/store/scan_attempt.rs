use super::IntakeStore;
use crate::{
    error::IntakeResult,
    types::{from_millis, to_millis, ComplaintId, LocationId, Timestamp},
};
use rusqlite::{params, OptionalExtension};
use serde::Serialize;

/// Row from the `scan_attempt` table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ScanAttemptRecord {
    pub location_id: LocationId,
    pub blocking_complaint_id: ComplaintId,
    pub attempt_count: u32,
    /// Distinct reporter phones in first-seen order, compared byte for byte.
    pub reporter_phones: Vec<String>,
    pub first_attempt_at: Timestamp,
    pub last_attempt_at: Timestamp,
}

fn scan_row_mapper(r: &rusqlite::Row<'_>) -> rusqlite::Result<(ScanAttemptRecord, String)> {
    Ok((
        ScanAttemptRecord {
            location_id: r.get(0)?,
            blocking_complaint_id: r.get(1)?,
            attempt_count: r.get(2)?,
            reporter_phones: Vec::new(),
            first_attempt_at: from_millis(r.get(4)?)?,
            last_attempt_at: from_millis(r.get(5)?)?,
        },
        r.get(3)?,
    ))
}

impl IntakeStore {
    // ── Scan attempts ──────────────────────────────────────────────

    pub fn get_scan_attempt(
        &self,
        location_id: LocationId,
        blocking_complaint_id: ComplaintId,
    ) -> IntakeResult<Option<ScanAttemptRecord>> {
        let row = self
            .conn
            .query_row(
                "SELECT location_id, blocking_complaint_id, attempt_count, reporter_phones,
                        first_attempt_at_ms, last_attempt_at_ms
                 FROM scan_attempt WHERE location_id = ?1 AND blocking_complaint_id = ?2",
                params![location_id, blocking_complaint_id],
                scan_row_mapper,
            )
            .optional()?;
        match row {
            Some((mut record, phones_json)) => {
                record.reporter_phones = serde_json::from_str(&phones_json)?;
                Ok(Some(record))
            }
            None => Ok(None),
        }
    }

    /// Create-or-increment the attempt row for (location, blocker) and add
    /// `reporter_phone` to its distinct list. Returns the updated row.
    pub fn record_scan_attempt(
        &self,
        location_id: LocationId,
        blocking_complaint_id: ComplaintId,
        reporter_phone: &str,
        now: Timestamp,
    ) -> IntakeResult<ScanAttemptRecord> {
        self.conn.execute(
            "INSERT INTO scan_attempt (location_id, blocking_complaint_id, attempt_count,
                                       reporter_phones, first_attempt_at_ms, last_attempt_at_ms)
             VALUES (?1, ?2, 1, '[]', ?3, ?3)
             ON CONFLICT(location_id, blocking_complaint_id)
             DO UPDATE SET attempt_count = attempt_count + 1, last_attempt_at_ms = excluded.last_attempt_at_ms",
            params![location_id, blocking_complaint_id, to_millis(now)],
        )?;

        let mut record = self
            .get_scan_attempt(location_id, blocking_complaint_id)?
            .ok_or_else(|| anyhow::anyhow!("scan attempt row vanished after upsert"))?;
        if !record.reporter_phones.iter().any(|p| p == reporter_phone) {
            record.reporter_phones.push(reporter_phone.to_string());
            self.conn.execute(
                "UPDATE scan_attempt SET reporter_phones = ?1
                 WHERE location_id = ?2 AND blocking_complaint_id = ?3",
                params![
                    serde_json::to_string(&record.reporter_phones)?,
                    location_id,
                    blocking_complaint_id
                ],
            )?;
        }
        Ok(record)
    }

    pub fn scan_attempts_for_location(&self, location_id: LocationId) -> IntakeResult<Vec<ScanAttemptRecord>> {
        let mut stmt = self.conn.prepare(
            "SELECT location_id, blocking_complaint_id, attempt_count, reporter_phones,
                    first_attempt_at_ms, last_attempt_at_ms
             FROM scan_attempt WHERE location_id = ?1
             ORDER BY scan_attempt_id ASC",
        )?;
        let rows = stmt
            .query_map(params![location_id], scan_row_mapper)?
            .collect::<Result<Vec<_>, _>>()?;
        rows.into_iter()
            .map(|(mut record, phones_json)| -> IntakeResult<ScanAttemptRecord> {
                record.reporter_phones = serde_json::from_str(&phones_json)?;
                Ok(record)
            })
            .collect()
    }
}
