// libs/shared/models/src/scheduling.rs
use chrono::NaiveDate;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use thiserror::Error;
use uuid::Uuid;

// ==============================================================================
// SLOTS
// ==============================================================================

/// Bookability of one of the two daily slots of a schedule entry.
///
/// Stored as a nullable boolean (`true` = available, `false` = taken). A
/// missing or `null` flag decodes as `Available`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum SlotState {
    #[default]
    Available,
    Taken,
}

impl SlotState {
    pub fn is_available(self) -> bool {
        matches!(self, SlotState::Available)
    }

    pub fn from_flag(flag: Option<bool>) -> Self {
        match flag {
            Some(false) => SlotState::Taken,
            _ => SlotState::Available,
        }
    }
}

impl Serialize for SlotState {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_bool(self.is_available())
    }
}

impl<'de> Deserialize<'de> for SlotState {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let flag = Option::<bool>::deserialize(deserializer)?;
        Ok(SlotState::from_flag(flag))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("slot number must be 1 or 2, got {0}")]
pub struct InvalidSlotNumber(pub u8);

/// One of the two fixed daily appointment positions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub enum SlotNumber {
    First,
    Second,
}

impl SlotNumber {
    pub const ALL: [SlotNumber; 2] = [SlotNumber::First, SlotNumber::Second];

    pub fn as_u8(self) -> u8 {
        match self {
            SlotNumber::First => 1,
            SlotNumber::Second => 2,
        }
    }
}

impl TryFrom<u8> for SlotNumber {
    type Error = InvalidSlotNumber;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            1 => Ok(SlotNumber::First),
            2 => Ok(SlotNumber::Second),
            other => Err(InvalidSlotNumber(other)),
        }
    }
}

impl From<SlotNumber> for u8 {
    fn from(slot: SlotNumber) -> Self {
        slot.as_u8()
    }
}

impl fmt::Display for SlotNumber {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_u8())
    }
}

// ==============================================================================
// SCHEDULE ENTRIES
// ==============================================================================

/// One calendar day of bookable slots for one doctor.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScheduleEntry {
    pub id: Uuid,
    pub doctor_id: Uuid,
    pub date: NaiveDate,
    #[serde(default)]
    pub slot_1: SlotState,
    #[serde(default)]
    pub slot_2: SlotState,
    #[serde(default = "default_active")]
    pub active: bool,
}

fn default_active() -> bool {
    true
}

impl ScheduleEntry {
    /// A fresh entry with both slots open.
    pub fn open(doctor_id: Uuid, date: NaiveDate) -> Self {
        Self {
            id: Uuid::new_v4(),
            doctor_id,
            date,
            slot_1: SlotState::Available,
            slot_2: SlotState::Available,
            active: true,
        }
    }

    pub fn slot(&self, slot: SlotNumber) -> SlotState {
        match slot {
            SlotNumber::First => self.slot_1,
            SlotNumber::Second => self.slot_2,
        }
    }

    pub fn set_slot(&mut self, slot: SlotNumber, state: SlotState) {
        match slot {
            SlotNumber::First => self.slot_1 = state,
            SlotNumber::Second => self.slot_2 = state,
        }
    }

    /// Inactive entries accept no bookings regardless of slot state.
    pub fn is_bookable(&self, slot: SlotNumber) -> bool {
        self.active && self.slot(slot).is_available()
    }
}

// ==============================================================================
// APPOINTMENTS
// ==============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AppointmentStatus {
    Booked,
    Cancelled,
    Completed,
    Missed,
}

impl fmt::Display for AppointmentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AppointmentStatus::Booked => write!(f, "Booked"),
            AppointmentStatus::Cancelled => write!(f, "Cancelled"),
            AppointmentStatus::Completed => write!(f, "Completed"),
            AppointmentStatus::Missed => write!(f, "Missed"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Appointment {
    pub id: Uuid,
    pub patient_id: Uuid,
    pub doctor_id: Uuid,
    pub visit_type: String,
    pub date: NaiveDate,
    pub slot: SlotNumber,
    pub status: AppointmentStatus,
}

impl Appointment {
    pub fn booked(
        doctor_id: Uuid,
        patient_id: Uuid,
        visit_type: impl Into<String>,
        date: NaiveDate,
        slot: SlotNumber,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            patient_id,
            doctor_id,
            visit_type: visit_type.into(),
            date,
            slot,
            status: AppointmentStatus::Booked,
        }
    }

    /// True when this appointment currently holds `(doctor_id, date, slot)`.
    pub fn holds(&self, doctor_id: Uuid, date: NaiveDate, slot: SlotNumber) -> bool {
        self.status == AppointmentStatus::Booked
            && self.doctor_id == doctor_id
            && self.date == date
            && self.slot == slot
    }
}

// ==============================================================================
// TREATMENTS
// ==============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Treatment {
    pub id: Uuid,
    pub appointment_id: Uuid,
    pub patient_id: Uuid,
    pub doctor_id: Uuid,
    pub diagnosis: String,
    pub treatment: String,
    pub instruction: String,
}
