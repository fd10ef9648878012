use crate::{
    complaint::ComplaintStatus,
    engine::IntakeEngine,
    error::IntakeResult,
    submission::Submission,
    types::ComplaintId,
};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

/// Every operation the runner accepts over IPC.
/// Variants are added, never removed or reordered.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "cmd", rename_all = "snake_case")]
pub enum IntakeCommand {
    // ── Registry ──────────────────────────────────
    RegisterCity {
        city_code: String,
        name: String,
    },
    RegisterStation {
        station_code: String,
        name: String,
        city_code: String,
    },
    RegisterLocation {
        station_code: String,
        platform_number: u32,
        description: String,
    },
    RegisterDefaultLocations {
        station_code: String,
        platform_number: u32,
    },

    // ── Intake ────────────────────────────────────
    Submit(Submission),
    Verify {
        complaint_id: ComplaintId,
        code: String,
    },

    // ── Lifecycle ─────────────────────────────────
    ChangeStatus {
        complaint_id: ComplaintId,
        status: String,
    },
    Close {
        complaint_id: ComplaintId,
    },
    AssignWorker {
        complaint_id: ComplaintId,
        worker: String,
    },
    AutoClose {
        #[serde(default)]
        dry_run: bool,
    },

    // ── Queries ───────────────────────────────────
    Triage {
        #[serde(default)]
        station_code: Option<String>,
    },
    GetComplaint {
        complaint_id: ComplaintId,
    },
}

impl IntakeCommand {
    /// Run the command and render its outcome as JSON.
    pub fn apply(self, engine: &mut IntakeEngine) -> IntakeResult<Value> {
        let value = match self {
            Self::RegisterCity { city_code, name } => {
                serde_json::to_value(engine.register_city(&city_code, &name)?)?
            }
            Self::RegisterStation {
                station_code,
                name,
                city_code,
            } => serde_json::to_value(engine.register_station(&station_code, &name, &city_code)?)?,
            Self::RegisterLocation {
                station_code,
                platform_number,
                description,
            } => {
                let location = engine.register_location(&station_code, platform_number, &description)?;
                let scan_url = location.scan_url(&engine.config().scan_base_url);
                json!({
                    "location": location,
                    "display_id": location.display_id(),
                    "scan_url": scan_url,
                })
            }
            Self::RegisterDefaultLocations {
                station_code,
                platform_number,
            } => serde_json::to_value(engine.register_default_locations(&station_code, platform_number)?)?,
            Self::Submit(submission) => serde_json::to_value(engine.submit(&submission)?)?,
            Self::Verify { complaint_id, code } => {
                serde_json::to_value(engine.verify(complaint_id, &code)?)?
            }
            Self::ChangeStatus {
                complaint_id,
                status,
            } => {
                let status: ComplaintStatus = status.parse()?;
                serde_json::to_value(engine.change_status(complaint_id, status)?)?
            }
            Self::Close { complaint_id } => serde_json::to_value(engine.close(complaint_id)?)?,
            Self::AssignWorker {
                complaint_id,
                worker,
            } => {
                engine.assign_worker(complaint_id, &worker)?;
                json!({ "complaint_id": complaint_id, "assigned_worker": worker.trim() })
            }
            Self::AutoClose { dry_run } => serde_json::to_value(engine.auto_close_stale(dry_run)?)?,
            Self::Triage { station_code } => {
                serde_json::to_value(engine.triage_queue(station_code.as_deref())?)?
            }
            Self::GetComplaint { complaint_id } => {
                serde_json::to_value(engine.complaint(complaint_id)?)?
            }
        };
        Ok(value)
    }
}
