// libs/shared/database/src/store.rs
//
// Storage interface for schedule entries, appointments and treatments.
//

use async_trait::async_trait;
use chrono::NaiveDate;
use uuid::Uuid;

use shared_models::{Appointment, AppointmentStatus, ScheduleEntry, SlotNumber, SlotState, Treatment};

use crate::error::DatabaseError;

/// Entry point to the persisted scheduling data.
///
/// Every engine operation runs inside one transaction obtained from
/// [`SchedulingStore::begin`]. A transaction that is dropped without
/// [`SchedulingTransaction::commit`] leaves the store untouched.
#[async_trait]
pub trait SchedulingStore: Send + Sync {
    async fn begin(&self) -> Result<Box<dyn SchedulingTransaction>, DatabaseError>;
}

/// One unit of work against the store.
///
/// Backends must enforce two constraints and report breaches as
/// [`DatabaseError::UniqueViolation`], either from the offending write or
/// from `commit`:
///
/// * one schedule entry per `(doctor_id, date)`;
/// * one `Booked` appointment per `(doctor_id, date, slot)`.
///
/// Writes to existing rows are conditional: each names the value it expects
/// to replace, and a row that no longer holds that value (or no longer
/// exists) is reported as [`DatabaseError::UniqueViolation`] as well.
///
/// Reads are not required to observe writes staged earlier in the same
/// transaction.
#[async_trait]
pub trait SchedulingTransaction: Send {
    /// Entries of one doctor, ordered by date.
    async fn schedules_for_doctor(&mut self, doctor_id: Uuid) -> Result<Vec<ScheduleEntry>, DatabaseError>;

    async fn schedule(&mut self, schedule_id: Uuid) -> Result<Option<ScheduleEntry>, DatabaseError>;

    async fn schedule_on(&mut self, doctor_id: Uuid, date: NaiveDate) -> Result<Option<ScheduleEntry>, DatabaseError>;

    async fn insert_schedule(&mut self, entry: &ScheduleEntry) -> Result<(), DatabaseError>;

    /// Flip one slot of an entry from `expected` to `state`.
    async fn set_slot(
        &mut self,
        schedule_id: Uuid,
        slot: SlotNumber,
        expected: SlotState,
        state: SlotState,
    ) -> Result<(), DatabaseError>;

    async fn delete_schedule(&mut self, schedule_id: Uuid) -> Result<(), DatabaseError>;

    async fn appointment(&mut self, appointment_id: Uuid) -> Result<Option<Appointment>, DatabaseError>;

    /// Appointments of one doctor, ordered by date then slot.
    async fn appointments_for_doctor(&mut self, doctor_id: Uuid) -> Result<Vec<Appointment>, DatabaseError>;

    /// Appointments of one patient, ordered by date then slot.
    async fn appointments_for_patient(&mut self, patient_id: Uuid) -> Result<Vec<Appointment>, DatabaseError>;

    async fn appointments_with_status(&mut self, status: AppointmentStatus) -> Result<Vec<Appointment>, DatabaseError>;

    /// Every appointment, or those on one date, ordered by date then slot.
    async fn all_appointments(&mut self, date: Option<NaiveDate>) -> Result<Vec<Appointment>, DatabaseError>;

    async fn insert_appointment(&mut self, appointment: &Appointment) -> Result<(), DatabaseError>;

    /// Move an appointment from `expected` to `status`.
    async fn set_status(
        &mut self,
        appointment_id: Uuid,
        expected: AppointmentStatus,
        status: AppointmentStatus,
    ) -> Result<(), DatabaseError>;

    /// Move a `Booked` appointment, still on the date and slot of `appointment`,
    /// to `date`/`slot`.
    async fn move_appointment(
        &mut self,
        appointment: &Appointment,
        date: NaiveDate,
        slot: SlotNumber,
    ) -> Result<(), DatabaseError>;

    async fn insert_treatment(&mut self, treatment: &Treatment) -> Result<(), DatabaseError>;

    async fn treatments_for_patient(&mut self, patient_id: Uuid) -> Result<Vec<Treatment>, DatabaseError>;

    async fn commit(self: Box<Self>) -> Result<(), DatabaseError>;
}
