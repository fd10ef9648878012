//! Complaint records, status values, and the reference-code format.

use crate::{
    error::IntakeError,
    types::{ComplaintId, LocationId, Timestamp},
};
use chrono::{FixedOffset, NaiveDate};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Work status. Closure is a separate flag, never a status value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ComplaintStatus {
    Pending,
    InProgress,
    Resolved,
}

impl ComplaintStatus {
    pub const ALL: [ComplaintStatus; 3] = [Self::Pending, Self::InProgress, Self::Resolved];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::InProgress => "in_progress",
            Self::Resolved => "resolved",
        }
    }
}

impl fmt::Display for ComplaintStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ComplaintStatus {
    type Err = IntakeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "pending" => Ok(Self::Pending),
            "in_progress" | "in-progress" | "inprogress" => Ok(Self::InProgress),
            "resolved" => Ok(Self::Resolved),
            _ => Err(IntakeError::InvalidStatus(s.to_string())),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ComplaintRecord {
    pub complaint_id: ComplaintId,
    pub reference: String,
    pub station_code: String,
    pub location_id: Option<LocationId>,
    pub platform_number: u32,
    pub reporter_name: String,
    pub reporter_phone: String,
    pub description: String,
    pub status: ComplaintStatus,
    pub verified: bool,
    pub assigned_worker: Option<String>,
    pub parent_id: Option<ComplaintId>,
    /// 0 for roots; 1, 2, ... for children in link order.
    pub intensity: u32,
    pub closed: bool,
    pub closed_at: Option<Timestamp>,
    pub closed_status: Option<ComplaintStatus>,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

impl ComplaintRecord {
    pub fn is_root(&self) -> bool {
        self.parent_id.is_none()
    }
}

/// A complaint that has passed validation but has not been written yet.
/// The escalation linker fills in the parent fields.
#[derive(Debug, Clone, PartialEq)]
pub struct NewComplaint {
    pub station_code: String,
    pub location_id: Option<LocationId>,
    pub platform_number: u32,
    pub reporter_name: String,
    pub reporter_phone: String,
    pub description: String,
    pub status: ComplaintStatus,
    pub assigned_worker: Option<String>,
    pub parent_id: Option<ComplaintId>,
    pub intensity: u32,
}

/// `YYYYMMDD-<city>-<station>-NNNN`. Sequences past 9999 widen rather than wrap.
pub fn format_reference(day: NaiveDate, city_code: &str, station_code: &str, seq: u32) -> String {
    format!(
        "{}-{}-{}-{:04}",
        day.format("%Y%m%d"),
        city_code,
        station_code,
        seq
    )
}

/// Calendar day of `at` as seen in the reporting offset.
pub fn reporting_day(at: Timestamp, offset: FixedOffset) -> NaiveDate {
    at.with_timezone(&offset).date_naive()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};

    #[test]
    fn reference_is_zero_padded() {
        let day = NaiveDate::from_ymd_opt(2025, 6, 5).unwrap();
        assert_eq!(format_reference(day, "DL", "NDLS", 7), "20250605-DL-NDLS-0007");
        assert_eq!(format_reference(day, "DL", "NDLS", 12345), "20250605-DL-NDLS-12345");
    }

    #[test]
    fn reporting_day_follows_offset() {
        let at = Utc.with_ymd_and_hms(2025, 6, 5, 20, 0, 0).unwrap();
        let ist = FixedOffset::east_opt(330 * 60).unwrap();
        assert_eq!(reporting_day(at, ist), NaiveDate::from_ymd_opt(2025, 6, 6).unwrap());
        let utc = FixedOffset::east_opt(0).unwrap();
        assert_eq!(reporting_day(at, utc), NaiveDate::from_ymd_opt(2025, 6, 5).unwrap());
    }

    #[test]
    fn status_parsing_rejects_closed() {
        assert_eq!("IN_PROGRESS".parse::<ComplaintStatus>().unwrap(), ComplaintStatus::InProgress);
        assert!(matches!(
            "closed".parse::<ComplaintStatus>(),
            Err(IntakeError::InvalidStatus(_))
        ));
    }
}
