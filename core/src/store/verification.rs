use super::IntakeStore;
use crate::{
    error::IntakeResult,
    types::{from_millis, to_millis, ComplaintId, Timestamp},
};
use rusqlite::{params, OptionalExtension};
use serde::Serialize;

/// Row from the `otp_verification` table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct VerificationRecord {
    pub complaint_id: ComplaintId,
    #[serde(skip_serializing)]
    pub code: String,
    pub attempts: u32,
    pub verified: bool,
    pub created_at: Timestamp,
    pub verified_at: Option<Timestamp>,
}

impl IntakeStore {
    // ── OTP verification ───────────────────────────────────────────

    pub fn insert_verification(
        &self,
        complaint_id: ComplaintId,
        code: &str,
        now: Timestamp,
    ) -> IntakeResult<()> {
        self.conn.execute(
            "INSERT INTO otp_verification (complaint_id, code, attempts, verified, created_at_ms)
             VALUES (?1, ?2, 0, 0, ?3)",
            params![complaint_id, code, to_millis(now)],
        )?;
        Ok(())
    }

    pub fn get_verification(&self, complaint_id: ComplaintId) -> IntakeResult<Option<VerificationRecord>> {
        let record = self
            .conn
            .query_row(
                "SELECT complaint_id, code, attempts, verified, created_at_ms, verified_at_ms
                 FROM otp_verification WHERE complaint_id = ?1",
                params![complaint_id],
                |r| {
                    Ok(VerificationRecord {
                        complaint_id: r.get(0)?,
                        code: r.get(1)?,
                        attempts: r.get(2)?,
                        verified: r.get::<_, i32>(3)? != 0,
                        created_at: from_millis(r.get(4)?)?,
                        verified_at: r.get::<_, Option<i64>>(5)?.map(from_millis).transpose()?,
                    })
                },
            )
            .optional()?;
        Ok(record)
    }

    /// Bump the attempt counter and return its new value.
    pub fn increment_verification_attempts(&self, complaint_id: ComplaintId) -> IntakeResult<u32> {
        let attempts: u32 = self.conn.query_row(
            "UPDATE otp_verification SET attempts = attempts + 1
             WHERE complaint_id = ?1
             RETURNING attempts",
            params![complaint_id],
            |row| row.get(0),
        )?;
        Ok(attempts)
    }

    pub fn mark_verification_verified(&self, complaint_id: ComplaintId, now: Timestamp) -> IntakeResult<()> {
        self.conn.execute(
            "UPDATE otp_verification SET verified = 1, verified_at_ms = ?1
             WHERE complaint_id = ?2 AND verified = 0",
            params![to_millis(now), complaint_id],
        )?;
        Ok(())
    }
}
