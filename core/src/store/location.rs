use super::IntakeStore;
use crate::{
    error::IntakeResult,
    location::Location,
    types::{from_millis, to_millis, LocationId, Timestamp},
};
use rusqlite::{params, OptionalExtension};

const LOCATION_COLUMNS: &str =
    "location_id, station_code, platform_number, description, sequence, created_at_ms";

fn location_row_mapper(row: &rusqlite::Row<'_>) -> rusqlite::Result<Location> {
    Ok(Location {
        location_id: row.get(0)?,
        station_code: row.get(1)?,
        platform_number: row.get(2)?,
        description: row.get(3)?,
        sequence: row.get(4)?,
        created_at: from_millis(row.get(5)?)?,
    })
}

impl IntakeStore {
    // ── Location ───────────────────────────────────────────────────

    pub fn get_location(&self, location_id: LocationId) -> IntakeResult<Option<Location>> {
        let location = self
            .conn
            .query_row(
                &format!("SELECT {LOCATION_COLUMNS} FROM location WHERE location_id = ?1"),
                params![location_id],
                location_row_mapper,
            )
            .optional()?;
        Ok(location)
    }

    pub fn find_location(
        &self,
        station_code: &str,
        platform_number: u32,
        description: &str,
    ) -> IntakeResult<Option<Location>> {
        let location = self
            .conn
            .query_row(
                &format!(
                    "SELECT {LOCATION_COLUMNS} FROM location
                     WHERE station_code = ?1 AND platform_number = ?2 AND description = ?3"
                ),
                params![station_code, platform_number, description],
                location_row_mapper,
            )
            .optional()?;
        Ok(location)
    }

    pub fn locations_for_platform(
        &self,
        station_code: &str,
        platform_number: u32,
    ) -> IntakeResult<Vec<Location>> {
        let mut stmt = self.conn.prepare(&format!(
            "SELECT {LOCATION_COLUMNS} FROM location
             WHERE station_code = ?1 AND platform_number = ?2
             ORDER BY sequence ASC"
        ))?;
        let rows = stmt.query_map(params![station_code, platform_number], location_row_mapper)?;
        rows.collect::<Result<Vec<_>, _>>().map_err(Into::into)
    }

    /// Next free sequence on a platform. Callers hold the write lock, so
    /// the read and the following insert cannot interleave with another writer.
    pub fn next_location_sequence(
        &self,
        station_code: &str,
        platform_number: u32,
    ) -> IntakeResult<u32> {
        let next: u32 = self.conn.query_row(
            "SELECT COALESCE(MAX(sequence), 0) + 1 FROM location
             WHERE station_code = ?1 AND platform_number = ?2",
            params![station_code, platform_number],
            |row| row.get(0),
        )?;
        Ok(next)
    }

    pub fn insert_location(
        &self,
        station_code: &str,
        platform_number: u32,
        description: &str,
        sequence: u32,
        now: Timestamp,
    ) -> IntakeResult<LocationId> {
        self.conn.execute(
            "INSERT INTO location (station_code, platform_number, description, sequence, created_at_ms)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![station_code, platform_number, description, sequence, to_millis(now)],
        )?;
        Ok(self.conn.last_insert_rowid())
    }
}
