// libs/scheduling-cell/src/models.rs
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use tracing::warn;
use uuid::Uuid;

use shared_config::AppConfig;
use shared_models::SlotNumber;

use crate::error::SchedulingError;

/// Days ahead of today that a doctor's window always reaches (8 days in total).
pub const WINDOW_DAYS: i64 = 7;

pub const MAX_VISIT_TYPE_LEN: usize = 20;
pub const MAX_TREATMENT_FIELD_LEN: usize = 128;

// ==============================================================================
// RULES
// ==============================================================================

/// Which overdue bookings a sweep marks as missed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MissedSweepScope {
    /// Every overdue booking in the system, whichever doctor triggered the sweep.
    #[default]
    Global,
    /// Only overdue bookings of the doctor being swept.
    Doctor,
}

impl FromStr for MissedSweepScope {
    type Err = SchedulingError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "global" => Ok(MissedSweepScope::Global),
            "doctor" => Ok(MissedSweepScope::Doctor),
            other => Err(SchedulingError::ValidationError(format!(
                "unknown sweep scope '{}', expected 'global' or 'doctor'",
                other
            ))),
        }
    }
}

#[derive(Debug, Clone)]
pub struct SchedulingRules {
    pub release_slot_on_cancel: bool,
    pub missed_sweep_scope: MissedSweepScope,
}

impl Default for SchedulingRules {
    fn default() -> Self {
        Self {
            release_slot_on_cancel: true,
            missed_sweep_scope: MissedSweepScope::Global,
        }
    }
}

impl SchedulingRules {
    pub fn from_config(config: &AppConfig) -> Self {
        let missed_sweep_scope = config.missed_sweep_scope.parse().unwrap_or_else(|e| {
            warn!("{}; falling back to global sweep", e);
            MissedSweepScope::Global
        });

        Self {
            release_slot_on_cancel: config.release_slot_on_cancel,
            missed_sweep_scope,
        }
    }
}

// ==============================================================================
// SLOT SELECTION
// ==============================================================================

/// A slot picked on an availability page, written `"<schedule_id>_<slot>"`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SlotSelection {
    pub schedule_id: Uuid,
    pub slot: SlotNumber,
}

impl SlotSelection {
    pub fn new(schedule_id: Uuid, slot: SlotNumber) -> Self {
        Self { schedule_id, slot }
    }
}

impl FromStr for SlotSelection {
    type Err = SchedulingError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let malformed = || SchedulingError::ValidationError(format!("malformed slot selection '{}'", value));

        let (schedule_part, slot_part) = value.trim().rsplit_once('_').ok_or_else(malformed)?;
        let schedule_id = Uuid::parse_str(schedule_part).map_err(|_| malformed())?;
        let slot_number: u8 = slot_part.parse().map_err(|_| malformed())?;

        Ok(Self {
            schedule_id,
            slot: SlotNumber::try_from(slot_number)?,
        })
    }
}

impl fmt::Display for SlotSelection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}_{}", self.schedule_id, self.slot)
    }
}

// ==============================================================================
// REQUESTS
// ==============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BookAppointmentRequest {
    pub doctor_id: Uuid,
    pub patient_id: Uuid,
    pub schedule_id: Uuid,
    pub slot_number: u8,
    pub visit_type: String,
}

impl BookAppointmentRequest {
    pub fn from_selection(
        doctor_id: Uuid,
        patient_id: Uuid,
        selection: SlotSelection,
        visit_type: impl Into<String>,
    ) -> Self {
        Self {
            doctor_id,
            patient_id,
            schedule_id: selection.schedule_id,
            slot_number: selection.slot.as_u8(),
            visit_type: visit_type.into(),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RescheduleAppointmentRequest {
    pub new_schedule_id: Option<Uuid>,
    pub new_slot_number: Option<u8>,
}

impl RescheduleAppointmentRequest {
    pub fn selection(&self) -> Result<SlotSelection, SchedulingError> {
        match (self.new_schedule_id, self.new_slot_number) {
            (Some(schedule_id), Some(slot_number)) => {
                Ok(SlotSelection::new(schedule_id, SlotNumber::try_from(slot_number)?))
            }
            _ => Err(SchedulingError::ValidationError(
                "please select a slot from the available options".to_string(),
            )),
        }
    }
}

impl From<SlotSelection> for RescheduleAppointmentRequest {
    fn from(selection: SlotSelection) -> Self {
        Self {
            new_schedule_id: Some(selection.schedule_id),
            new_slot_number: Some(selection.slot.as_u8()),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TreatmentRequest {
    pub diagnosis: String,
    pub treatment: String,
    pub instruction: String,
}

impl TreatmentRequest {
    /// Trimmed `(diagnosis, treatment, instruction)`.
    pub fn validate(&self) -> Result<(String, String, String), SchedulingError> {
        Ok((
            required_text("diagnosis", &self.diagnosis, MAX_TREATMENT_FIELD_LEN)?,
            required_text("treatment", &self.treatment, MAX_TREATMENT_FIELD_LEN)?,
            required_text("instruction", &self.instruction, MAX_TREATMENT_FIELD_LEN)?,
        ))
    }
}

pub fn validate_visit_type(visit_type: &str) -> Result<String, SchedulingError> {
    required_text("visit type", visit_type, MAX_VISIT_TYPE_LEN)
}

fn required_text(field: &str, value: &str, max_len: usize) -> Result<String, SchedulingError> {
    let value = value.trim();
    if value.is_empty() {
        return Err(SchedulingError::ValidationError(format!("{} is required", field)));
    }
    if value.chars().count() > max_len {
        return Err(SchedulingError::ValidationError(format!(
            "{} must be at most {} characters",
            field, max_len
        )));
    }
    Ok(value.to_string())
}
