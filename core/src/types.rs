//! Shared primitive types used across the intake engine.

use chrono::{DateTime, Utc};

/// Wall-clock instant. Always UTC; persisted as epoch milliseconds.
pub type Timestamp = DateTime<Utc>;

/// Row id of a `complaint`.
pub type ComplaintId = i64;

/// Row id of a `location`.
pub type LocationId = i64;

/// Convert a timestamp to its stored form.
pub fn to_millis(ts: Timestamp) -> i64 {
    ts.timestamp_millis()
}

/// Convert a stored column back into a timestamp.
pub fn from_millis(ms: i64) -> rusqlite::Result<Timestamp> {
    DateTime::<Utc>::from_timestamp_millis(ms).ok_or_else(|| {
        rusqlite::Error::FromSqlConversionFailure(
            0,
            rusqlite::types::Type::Integer,
            format!("timestamp out of range: {ms}").into(),
        )
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn millis_round_trip_keeps_sub_second_precision() {
        let ts = Utc.with_ymd_and_hms(2025, 6, 5, 11, 3, 0).unwrap()
            + chrono::Duration::milliseconds(417);
        assert_eq!(from_millis(to_millis(ts)).unwrap(), ts);
    }

    #[test]
    fn out_of_range_millis_is_a_conversion_error() {
        assert!(from_millis(i64::MAX).is_err());
    }
}
