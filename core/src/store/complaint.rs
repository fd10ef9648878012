use super::IntakeStore;
use crate::{
    complaint::{ComplaintRecord, ComplaintStatus, NewComplaint},
    error::IntakeResult,
    types::{from_millis, to_millis, ComplaintId, LocationId, Timestamp},
};
use rusqlite::types::{FromSql, FromSqlError, FromSqlResult, ToSql, ToSqlOutput, ValueRef};
use rusqlite::{params, OptionalExtension};

impl ToSql for ComplaintStatus {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        Ok(ToSqlOutput::from(self.as_str()))
    }
}

impl FromSql for ComplaintStatus {
    fn column_result(value: ValueRef<'_>) -> FromSqlResult<Self> {
        let text = value.as_str()?;
        text.parse().map_err(|e| FromSqlError::Other(Box::new(e)))
    }
}

const COMPLAINT_COLUMNS: &str = "complaint_id, reference, station_code, location_id, platform_number,
    reporter_name, reporter_phone, description, status, verified, assigned_worker,
    parent_id, intensity, closed, closed_at_ms, closed_status, created_at_ms, updated_at_ms";

// Helper function for mapping complaint rows
fn complaint_row_mapper(row: &rusqlite::Row<'_>) -> rusqlite::Result<ComplaintRecord> {
    Ok(ComplaintRecord {
        complaint_id: row.get(0)?,
        reference: row.get(1)?,
        station_code: row.get(2)?,
        location_id: row.get(3)?,
        platform_number: row.get(4)?,
        reporter_name: row.get(5)?,
        reporter_phone: row.get(6)?,
        description: row.get(7)?,
        status: row.get(8)?,
        verified: row.get::<_, i32>(9)? != 0,
        assigned_worker: row.get(10)?,
        parent_id: row.get(11)?,
        intensity: row.get(12)?,
        closed: row.get::<_, i32>(13)? != 0,
        closed_at: row.get::<_, Option<i64>>(14)?.map(from_millis).transpose()?,
        closed_status: row.get(15)?,
        created_at: from_millis(row.get(16)?)?,
        updated_at: from_millis(row.get(17)?)?,
    })
}

impl IntakeStore {
    // ── Complaint ──────────────────────────────────────────────────

    pub fn insert_complaint(
        &self,
        c: &NewComplaint,
        reference: &str,
        now: Timestamp,
    ) -> IntakeResult<ComplaintId> {
        self.conn.execute(
            "INSERT INTO complaint (
                reference, station_code, location_id, platform_number,
                reporter_name, reporter_phone, description, status, verified,
                assigned_worker, parent_id, intensity, closed, created_at_ms, updated_at_ms
             ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, 0, ?9, ?10, ?11, 0, ?12, ?12)",
            params![
                reference,
                &c.station_code,
                c.location_id,
                c.platform_number,
                &c.reporter_name,
                &c.reporter_phone,
                &c.description,
                c.status,
                c.assigned_worker.as_deref(),
                c.parent_id,
                c.intensity,
                to_millis(now),
            ],
        )?;
        Ok(self.conn.last_insert_rowid())
    }

    pub fn get_complaint(&self, complaint_id: ComplaintId) -> IntakeResult<Option<ComplaintRecord>> {
        let complaint = self
            .conn
            .query_row(
                &format!("SELECT {COMPLAINT_COLUMNS} FROM complaint WHERE complaint_id = ?1"),
                params![complaint_id],
                complaint_row_mapper,
            )
            .optional()?;
        Ok(complaint)
    }

    pub fn get_complaint_by_reference(&self, reference: &str) -> IntakeResult<Option<ComplaintRecord>> {
        let complaint = self
            .conn
            .query_row(
                &format!("SELECT {COMPLAINT_COLUMNS} FROM complaint WHERE reference = ?1"),
                params![reference],
                complaint_row_mapper,
            )
            .optional()?;
        Ok(complaint)
    }

    /// Earliest verified, open complaint at `location_id` created in `[since, now]`.
    pub fn find_blocking_complaint(
        &self,
        location_id: LocationId,
        since: Timestamp,
        now: Timestamp,
    ) -> IntakeResult<Option<ComplaintRecord>> {
        let complaint = self
            .conn
            .query_row(
                &format!(
                    "SELECT {COMPLAINT_COLUMNS} FROM complaint
                     WHERE location_id = ?1 AND verified = 1 AND closed = 0
                       AND created_at_ms >= ?2 AND created_at_ms <= ?3
                     ORDER BY created_at_ms ASC, complaint_id ASC
                     LIMIT 1"
                ),
                params![location_id, to_millis(since), to_millis(now)],
                complaint_row_mapper,
            )
            .optional()?;
        Ok(complaint)
    }

    /// Earliest open in-progress root at `location_id` created in `[since, now]`.
    pub fn find_escalation_parent(
        &self,
        location_id: LocationId,
        since: Timestamp,
        now: Timestamp,
    ) -> IntakeResult<Option<ComplaintRecord>> {
        let complaint = self
            .conn
            .query_row(
                &format!(
                    "SELECT {COMPLAINT_COLUMNS} FROM complaint
                     WHERE location_id = ?1 AND parent_id IS NULL
                       AND status = 'in_progress' AND closed = 0
                       AND created_at_ms >= ?2 AND created_at_ms <= ?3
                     ORDER BY created_at_ms ASC, complaint_id ASC
                     LIMIT 1"
                ),
                params![location_id, to_millis(since), to_millis(now)],
                complaint_row_mapper,
            )
            .optional()?;
        Ok(complaint)
    }

    /// Highest ordinal among a parent's children (0 when it has none).
    pub fn max_child_intensity(&self, parent_id: ComplaintId) -> IntakeResult<u32> {
        let max: u32 = self.conn.query_row(
            "SELECT COALESCE(MAX(intensity), 0) FROM complaint WHERE parent_id = ?1",
            params![parent_id],
            |row| row.get(0),
        )?;
        Ok(max)
    }

    pub fn children_of(&self, parent_id: ComplaintId) -> IntakeResult<Vec<ComplaintRecord>> {
        let mut stmt = self.conn.prepare(&format!(
            "SELECT {COMPLAINT_COLUMNS} FROM complaint
             WHERE parent_id = ?1
             ORDER BY intensity ASC, complaint_id ASC"
        ))?;
        let rows = stmt.query_map(params![parent_id], complaint_row_mapper)?;
        rows.collect::<Result<Vec<_>, _>>().map_err(Into::into)
    }

    pub fn open_children_of(&self, parent_id: ComplaintId) -> IntakeResult<Vec<ComplaintRecord>> {
        Ok(self
            .children_of(parent_id)?
            .into_iter()
            .filter(|c| !c.closed)
            .collect())
    }

    pub fn update_complaint_status(
        &self,
        complaint_id: ComplaintId,
        status: ComplaintStatus,
        now: Timestamp,
    ) -> IntakeResult<()> {
        self.conn.execute(
            "UPDATE complaint SET status = ?1, updated_at_ms = ?2
             WHERE complaint_id = ?3 AND closed = 0",
            params![status, to_millis(now), complaint_id],
        )?;
        Ok(())
    }

    pub fn update_assigned_worker(
        &self,
        complaint_id: ComplaintId,
        worker: &str,
        now: Timestamp,
    ) -> IntakeResult<()> {
        self.conn.execute(
            "UPDATE complaint SET assigned_worker = ?1, updated_at_ms = ?2
             WHERE complaint_id = ?3 AND closed = 0",
            params![worker, to_millis(now), complaint_id],
        )?;
        Ok(())
    }

    /// Close one complaint, freezing its current status.
    pub fn mark_complaint_closed(&self, complaint_id: ComplaintId, now: Timestamp) -> IntakeResult<()> {
        self.conn.execute(
            "UPDATE complaint SET closed = 1, closed_at_ms = ?1, closed_status = status,
                    updated_at_ms = ?1
             WHERE complaint_id = ?2 AND closed = 0",
            params![to_millis(now), complaint_id],
        )?;
        Ok(())
    }

    pub fn mark_complaint_verified(&self, complaint_id: ComplaintId, now: Timestamp) -> IntakeResult<()> {
        self.conn.execute(
            "UPDATE complaint SET verified = 1, updated_at_ms = ?1 WHERE complaint_id = ?2",
            params![to_millis(now), complaint_id],
        )?;
        Ok(())
    }

    /// Delete every child of `parent_id`, returning the deleted ids.
    pub fn delete_children(&self, parent_id: ComplaintId) -> IntakeResult<Vec<ComplaintId>> {
        let mut stmt = self
            .conn
            .prepare("DELETE FROM complaint WHERE parent_id = ?1 RETURNING complaint_id")?;
        let rows = stmt.query_map(params![parent_id], |row| row.get(0))?;
        let mut ids = rows.collect::<Result<Vec<ComplaintId>, _>>()?;
        ids.sort_unstable();
        Ok(ids)
    }

    /// Delete a complaint. Children, photos, verification and scan rows go with it.
    pub fn delete_complaint(&self, complaint_id: ComplaintId) -> IntakeResult<()> {
        self.conn.execute(
            "DELETE FROM complaint WHERE complaint_id = ?1",
            params![complaint_id],
        )?;
        Ok(())
    }

    /// Open complaints created at or before `cutoff`, oldest first.
    pub fn open_complaints_created_before(&self, cutoff: Timestamp) -> IntakeResult<Vec<ComplaintRecord>> {
        let mut stmt = self.conn.prepare(&format!(
            "SELECT {COMPLAINT_COLUMNS} FROM complaint
             WHERE closed = 0 AND created_at_ms <= ?1
             ORDER BY created_at_ms ASC, complaint_id ASC"
        ))?;
        let rows = stmt.query_map(params![to_millis(cutoff)], complaint_row_mapper)?;
        rows.collect::<Result<Vec<_>, _>>().map_err(Into::into)
    }

    /// Verified complaints, newest first, optionally for one station.
    pub fn verified_complaints(&self, station_code: Option<&str>) -> IntakeResult<Vec<ComplaintRecord>> {
        let mut stmt = self.conn.prepare(&format!(
            "SELECT {COMPLAINT_COLUMNS} FROM complaint
             WHERE verified = 1 AND (?1 IS NULL OR station_code = ?1)
             ORDER BY created_at_ms DESC, complaint_id DESC"
        ))?;
        let rows = stmt.query_map(params![station_code], complaint_row_mapper)?;
        rows.collect::<Result<Vec<_>, _>>().map_err(Into::into)
    }

    pub fn complaint_count(&self) -> IntakeResult<i64> {
        let n = self
            .conn
            .query_row("SELECT COUNT(*) FROM complaint", [], |row| row.get(0))?;
        Ok(n)
    }

    // ── Photos ─────────────────────────────────────────────────────

    pub fn insert_photo_refs(
        &self,
        complaint_id: ComplaintId,
        photo_refs: &[String],
        now: Timestamp,
    ) -> IntakeResult<()> {
        let mut stmt = self.conn.prepare(
            "INSERT INTO complaint_photo (complaint_id, photo_ref, created_at_ms) VALUES (?1, ?2, ?3)",
        )?;
        for photo_ref in photo_refs {
            stmt.execute(params![complaint_id, photo_ref, to_millis(now)])?;
        }
        Ok(())
    }

    pub fn photo_refs(&self, complaint_id: ComplaintId) -> IntakeResult<Vec<String>> {
        let mut stmt = self.conn.prepare(
            "SELECT photo_ref FROM complaint_photo WHERE complaint_id = ?1 ORDER BY photo_id ASC",
        )?;
        let rows = stmt.query_map(params![complaint_id], |row| row.get(0))?;
        rows.collect::<Result<Vec<_>, _>>().map_err(Into::into)
    }

    // ── Reference sequence ─────────────────────────────────────────

    /// Reserve the next daily sequence for (city, station, day) in one statement.
    pub fn reserve_reference_sequence(
        &self,
        city_code: &str,
        station_code: &str,
        day: &str,
    ) -> IntakeResult<u32> {
        let value: u32 = self.conn.query_row(
            "INSERT INTO reference_sequence (city_code, station_code, day, last_value)
             VALUES (?1, ?2, ?3, 1)
             ON CONFLICT(city_code, station_code, day)
             DO UPDATE SET last_value = last_value + 1
             RETURNING last_value",
            params![city_code, station_code, day],
            |row| row.get(0),
        )?;
        Ok(value)
    }
}
