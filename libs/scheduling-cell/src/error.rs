use thiserror::Error;

use shared_database::DatabaseError;
use shared_models::{AppointmentStatus, InvalidSlotNumber};

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SchedulingError {
    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Selected slot is no longer available")]
    SlotUnavailable,

    #[error("Appointment cannot be modified in current status: {0}")]
    InvalidState(AppointmentStatus),

    #[error("Validation error: {0}")]
    ValidationError(String),

    #[error("Storage error: {0}")]
    StorageError(String),
}

impl From<DatabaseError> for SchedulingError {
    fn from(error: DatabaseError) -> Self {
        SchedulingError::StorageError(error.to_string())
    }
}

impl From<InvalidSlotNumber> for SchedulingError {
    fn from(error: InvalidSlotNumber) -> Self {
        SchedulingError::ValidationError(error.to_string())
    }
}

impl SchedulingError {
    /// Booking paths treat the storage-level uniqueness constraint as the
    /// final word on slot ownership.
    pub(crate) fn from_slot_write(error: DatabaseError) -> Self {
        if error.is_unique_violation() {
            SchedulingError::SlotUnavailable
        } else {
            error.into()
        }
    }
}
