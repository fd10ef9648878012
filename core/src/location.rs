//! Location registry: cities, stations, and the QR-tagged reporting points
//! on each platform.

use crate::{
    error::{IntakeError, IntakeResult},
    event::IntakeEvent,
    store::IntakeStore,
    types::{LocationId, Timestamp},
};
use serde::{Deserialize, Serialize};

/// Descriptions seeded for every new platform.
pub const DEFAULT_LOCATION_TYPES: &[&str] = &[
    "Platform End (Side 1)",
    "Platform End (Side 2)",
    "Near Washroom",
    "Entrance Gate",
    "Waiting Area",
    "Food Court",
    "Ticket Counter",
    "Information Desk",
    "Platform Middle",
    "Foot Over Bridge",
];

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct City {
    pub city_code: String,
    pub name: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Station {
    pub station_code: String,
    pub name: String,
    pub city_code: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Location {
    pub location_id: LocationId,
    pub station_code: String,
    pub platform_number: u32,
    pub description: String,
    /// Position among this platform's locations, assigned once.
    pub sequence: u32,
    pub created_at: Timestamp,
}

impl Location {
    /// Display identifier, e.g. `(3/2)` for the second point on platform 3.
    pub fn display_id(&self) -> String {
        format!("({}/{})", self.platform_number, self.sequence)
    }

    /// URL encoded into this location's QR code.
    pub fn scan_url(&self, base_url: &str) -> String {
        format!(
            "{}/submit/?station={}&platform={}&location={}",
            base_url.trim_end_matches('/'),
            self.station_code,
            self.platform_number,
            self.location_id
        )
    }
}

fn require_code(kind: &str, code: &str) -> IntakeResult<()> {
    let ok = !code.is_empty()
        && code.len() <= 10
        && code.chars().all(|c| c.is_ascii_alphanumeric());
    if ok {
        Ok(())
    } else {
        Err(IntakeError::Validation(format!(
            "{kind} code must be 1-10 ASCII letters or digits, got '{code}'"
        )))
    }
}

/// Registry operations. Each runs inside the caller's transaction.
pub struct LocationRegistry;

impl LocationRegistry {
    pub fn register_city(store: &IntakeStore, city_code: &str, name: &str) -> IntakeResult<City> {
        require_code("city", city_code)?;
        let city = City {
            city_code: city_code.to_string(),
            name: name.trim().to_string(),
        };
        store.upsert_city(&city)?;
        Ok(city)
    }

    pub fn register_station(
        store: &IntakeStore,
        station_code: &str,
        name: &str,
        city_code: &str,
    ) -> IntakeResult<Station> {
        require_code("station", station_code)?;
        store
            .get_city(city_code)?
            .ok_or_else(|| IntakeError::not_found("city", city_code))?;
        let station = Station {
            station_code: station_code.to_string(),
            name: name.trim().to_string(),
            city_code: city_code.to_string(),
        };
        store.upsert_station(&station)?;
        Ok(station)
    }

    /// Register a reporting point. Re-registering the same
    /// (station, platform, description) returns the existing location.
    pub fn register_location(
        store: &IntakeStore,
        station_code: &str,
        platform_number: u32,
        description: &str,
        now: Timestamp,
    ) -> IntakeResult<Location> {
        if platform_number == 0 {
            return Err(IntakeError::Validation(
                "platform number must be at least 1".into(),
            ));
        }
        let description = description.trim();
        if description.is_empty() {
            return Err(IntakeError::Validation(
                "location description is required".into(),
            ));
        }
        store
            .get_station(station_code)?
            .ok_or_else(|| IntakeError::not_found("station", station_code))?;

        if let Some(existing) =
            store.find_location(station_code, platform_number, description)?
        {
            return Ok(existing);
        }

        let sequence = store.next_location_sequence(station_code, platform_number)?;
        let location_id =
            store.insert_location(station_code, platform_number, description, sequence, now)?;
        store.append_event(
            "location_registry",
            &IntakeEvent::LocationRegistered {
                location_id,
                station_code: station_code.to_string(),
                platform_number,
                sequence,
            },
            now,
        )?;
        log::debug!(
            "registered location {location_id} ({platform_number}/{sequence}) at {station_code}"
        );
        Ok(Location {
            location_id,
            station_code: station_code.to_string(),
            platform_number,
            description: description.to_string(),
            sequence,
            created_at: now,
        })
    }

    /// Register every entry of `DEFAULT_LOCATION_TYPES` for one platform.
    pub fn register_default_locations(
        store: &IntakeStore,
        station_code: &str,
        platform_number: u32,
        now: Timestamp,
    ) -> IntakeResult<Vec<Location>> {
        DEFAULT_LOCATION_TYPES
            .iter()
            .map(|desc| Self::register_location(store, station_code, platform_number, desc, now))
            .collect()
    }

    pub fn resolve(store: &IntakeStore, location_id: LocationId) -> IntakeResult<Location> {
        store
            .get_location(location_id)?
            .ok_or_else(|| IntakeError::not_found("location", location_id))
    }
}
