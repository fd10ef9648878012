//! What a reporter sends, and what the engine answers.

use crate::{
    config::IntakeConfig,
    error::{IntakeError, IntakeResult},
    types::{ComplaintId, LocationId},
};
use serde::{Deserialize, Serialize};

const MAX_PHONE_LEN: usize = 15;

/// Where the report was made. A QR scan names a location; a report typed
/// in by hand only names the platform and skips duplicate detection.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ReportTarget {
    Location {
        location_id: LocationId,
    },
    Platform {
        station_code: String,
        platform_number: u32,
    },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Submission {
    pub target: ReportTarget,
    pub reporter_name: String,
    pub reporter_phone: String,
    pub description: String,
    /// Opaque references to already-stored photos.
    #[serde(default)]
    pub photos: Vec<String>,
}

impl Submission {
    pub fn validate(&self, config: &IntakeConfig) -> IntakeResult<()> {
        if self.reporter_name.trim().is_empty() {
            return Err(IntakeError::Validation("reporter name is required".into()));
        }
        if self.description.trim().is_empty() {
            return Err(IntakeError::Validation("description is required".into()));
        }
        validate_phone(self.reporter_phone.trim())?;

        let photos = self.photos.iter().filter(|p| !p.trim().is_empty()).count();
        if photos < config.min_photos {
            return Err(IntakeError::Validation(format!(
                "at least {} photo(s) required, got {photos}",
                config.min_photos
            )));
        }
        if photos > config.max_photos {
            return Err(IntakeError::Validation(format!(
                "at most {} photos allowed, got {photos}",
                config.max_photos
            )));
        }

        if let ReportTarget::Platform {
            platform_number, ..
        } = &self.target
        {
            if *platform_number == 0 {
                return Err(IntakeError::Validation(
                    "platform number must be at least 1".into(),
                ));
            }
        }
        Ok(())
    }

    /// Photo references with blanks dropped and whitespace trimmed.
    pub fn photo_refs(&self) -> Vec<String> {
        self.photos
            .iter()
            .map(|p| p.trim())
            .filter(|p| !p.is_empty())
            .map(str::to_string)
            .collect()
    }
}

fn validate_phone(phone: &str) -> IntakeResult<()> {
    let digits = phone.strip_prefix('+').unwrap_or(phone);
    if phone.is_empty()
        || phone.len() > MAX_PHONE_LEN
        || digits.is_empty()
        || !digits.bytes().all(|b| b.is_ascii_digit())
    {
        return Err(IntakeError::Validation(format!(
            "phone number must be up to {MAX_PHONE_LEN} digits with an optional leading '+', got '{phone}'"
        )));
    }
    Ok(())
}

/// `Blocked` is an answer, not an error: the location is already covered.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum SubmitOutcome {
    Created {
        complaint_id: ComplaintId,
        reference: String,
        parent_id: Option<ComplaintId>,
        intensity: u32,
    },
    Blocked {
        blocking_complaint_id: ComplaintId,
        blocking_reference: String,
        scan_count: u32,
    },
}

impl SubmitOutcome {
    pub fn complaint_id(&self) -> Option<ComplaintId> {
        match self {
            Self::Created { complaint_id, .. } => Some(*complaint_id),
            Self::Blocked { .. } => None,
        }
    }
}
