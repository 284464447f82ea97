// libs/shared/database/src/memory.rs
//
// Process-local scheduling store. Transactions hold the store lock for their
// whole lifetime and work on a private copy that replaces the shared state on
// commit.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::NaiveDate;
use tokio::sync::{Mutex, OwnedMutexGuard};
use tracing::debug;
use uuid::Uuid;

use shared_models::{Appointment, AppointmentStatus, ScheduleEntry, SlotNumber, SlotState, Treatment};

use crate::error::DatabaseError;
use crate::store::{SchedulingStore, SchedulingTransaction};

const SCHEDULE_DATE_KEY: &str = "doctor_schedules_doctor_id_date_key";
const BOOKED_SLOT_KEY: &str = "appointments_booked_doctor_date_slot_key";

#[derive(Debug, Clone, Default)]
struct SchedulingState {
    schedules: HashMap<Uuid, ScheduleEntry>,
    appointments: HashMap<Uuid, Appointment>,
    treatments: Vec<Treatment>,
}

impl SchedulingState {
    fn schedule_date_taken(&self, entry: &ScheduleEntry) -> bool {
        self.schedules.values().any(|existing| {
            existing.id != entry.id
                && existing.doctor_id == entry.doctor_id
                && existing.date == entry.date
        })
    }

    fn booked_slot_taken(&self, appointment: &Appointment) -> bool {
        appointment.status == AppointmentStatus::Booked
            && self.appointments.values().any(|existing| {
                existing.id != appointment.id
                    && existing.holds(appointment.doctor_id, appointment.date, appointment.slot)
            })
    }
}

#[derive(Debug, Clone, Default)]
pub struct InMemorySchedulingStore {
    state: Arc<Mutex<SchedulingState>>,
}

impl InMemorySchedulingStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// All schedule entries, ordered by doctor then date.
    pub async fn schedules(&self) -> Vec<ScheduleEntry> {
        let state = self.state.lock().await;
        let mut entries: Vec<ScheduleEntry> = state.schedules.values().cloned().collect();
        entries.sort_by_key(|entry| (entry.doctor_id, entry.date));
        entries
    }

    /// All appointments, ordered by date then slot.
    pub async fn appointments(&self) -> Vec<Appointment> {
        let state = self.state.lock().await;
        sorted_appointments(state.appointments.values().cloned().collect())
    }

    pub async fn treatments(&self) -> Vec<Treatment> {
        self.state.lock().await.treatments.clone()
    }
}

#[async_trait]
impl SchedulingStore for InMemorySchedulingStore {
    async fn begin(&self) -> Result<Box<dyn SchedulingTransaction>, DatabaseError> {
        let guard = Arc::clone(&self.state).lock_owned().await;
        let working = (*guard).clone();
        Ok(Box::new(InMemoryTransaction { guard, working }))
    }
}

pub struct InMemoryTransaction {
    guard: OwnedMutexGuard<SchedulingState>,
    working: SchedulingState,
}

fn stale_write(target: String) -> DatabaseError {
    DatabaseError::UniqueViolation(format!("{} changed concurrently", target))
}

fn sorted_appointments(mut appointments: Vec<Appointment>) -> Vec<Appointment> {
    appointments.sort_by_key(|appointment| (appointment.date, appointment.slot, appointment.id));
    appointments
}

#[async_trait]
impl SchedulingTransaction for InMemoryTransaction {
    async fn schedules_for_doctor(&mut self, doctor_id: Uuid) -> Result<Vec<ScheduleEntry>, DatabaseError> {
        let mut entries: Vec<ScheduleEntry> = self.working.schedules.values()
            .filter(|entry| entry.doctor_id == doctor_id)
            .cloned()
            .collect();
        entries.sort_by_key(|entry| entry.date);
        Ok(entries)
    }

    async fn schedule(&mut self, schedule_id: Uuid) -> Result<Option<ScheduleEntry>, DatabaseError> {
        Ok(self.working.schedules.get(&schedule_id).cloned())
    }

    async fn schedule_on(&mut self, doctor_id: Uuid, date: NaiveDate) -> Result<Option<ScheduleEntry>, DatabaseError> {
        Ok(self.working.schedules.values()
            .find(|entry| entry.doctor_id == doctor_id && entry.date == date)
            .cloned())
    }

    async fn insert_schedule(&mut self, entry: &ScheduleEntry) -> Result<(), DatabaseError> {
        if self.working.schedules.contains_key(&entry.id) || self.working.schedule_date_taken(entry) {
            return Err(DatabaseError::UniqueViolation(SCHEDULE_DATE_KEY.to_string()));
        }
        self.working.schedules.insert(entry.id, entry.clone());
        Ok(())
    }

    async fn set_slot(
        &mut self,
        schedule_id: Uuid,
        slot: SlotNumber,
        expected: SlotState,
        state: SlotState,
    ) -> Result<(), DatabaseError> {
        match self.working.schedules.get_mut(&schedule_id) {
            Some(entry) if entry.slot(slot) == expected => {
                entry.set_slot(slot, state);
                Ok(())
            }
            _ => Err(stale_write(format!("schedule {} slot {}", schedule_id, slot))),
        }
    }

    async fn delete_schedule(&mut self, schedule_id: Uuid) -> Result<(), DatabaseError> {
        self.working.schedules.remove(&schedule_id);
        Ok(())
    }

    async fn appointment(&mut self, appointment_id: Uuid) -> Result<Option<Appointment>, DatabaseError> {
        Ok(self.working.appointments.get(&appointment_id).cloned())
    }

    async fn appointments_for_doctor(&mut self, doctor_id: Uuid) -> Result<Vec<Appointment>, DatabaseError> {
        Ok(sorted_appointments(self.working.appointments.values()
            .filter(|appointment| appointment.doctor_id == doctor_id)
            .cloned()
            .collect()))
    }

    async fn appointments_for_patient(&mut self, patient_id: Uuid) -> Result<Vec<Appointment>, DatabaseError> {
        Ok(sorted_appointments(self.working.appointments.values()
            .filter(|appointment| appointment.patient_id == patient_id)
            .cloned()
            .collect()))
    }

    async fn appointments_with_status(&mut self, status: AppointmentStatus) -> Result<Vec<Appointment>, DatabaseError> {
        Ok(sorted_appointments(self.working.appointments.values()
            .filter(|appointment| appointment.status == status)
            .cloned()
            .collect()))
    }

    async fn all_appointments(&mut self, date: Option<NaiveDate>) -> Result<Vec<Appointment>, DatabaseError> {
        Ok(sorted_appointments(self.working.appointments.values()
            .filter(|appointment| date.map_or(true, |date| appointment.date == date))
            .cloned()
            .collect()))
    }

    async fn insert_appointment(&mut self, appointment: &Appointment) -> Result<(), DatabaseError> {
        if self.working.appointments.contains_key(&appointment.id) {
            return Err(DatabaseError::UniqueViolation("appointments_pkey".to_string()));
        }
        if self.working.booked_slot_taken(appointment) {
            return Err(DatabaseError::UniqueViolation(BOOKED_SLOT_KEY.to_string()));
        }
        self.working.appointments.insert(appointment.id, appointment.clone());
        Ok(())
    }

    async fn set_status(
        &mut self,
        appointment_id: Uuid,
        expected: AppointmentStatus,
        status: AppointmentStatus,
    ) -> Result<(), DatabaseError> {
        let mut updated = match self.working.appointments.get(&appointment_id) {
            Some(current) if current.status == expected => current.clone(),
            _ => return Err(stale_write(format!("appointment {} status", appointment_id))),
        };
        updated.status = status;
        if self.working.booked_slot_taken(&updated) {
            return Err(DatabaseError::UniqueViolation(BOOKED_SLOT_KEY.to_string()));
        }
        self.working.appointments.insert(appointment_id, updated);
        Ok(())
    }

    async fn move_appointment(
        &mut self,
        appointment: &Appointment,
        date: NaiveDate,
        slot: SlotNumber,
    ) -> Result<(), DatabaseError> {
        let mut moved = match self.working.appointments.get(&appointment.id) {
            Some(current) if current.status == AppointmentStatus::Booked
                && current.date == appointment.date
                && current.slot == appointment.slot => current.clone(),
            _ => return Err(stale_write(format!("appointment {} booking", appointment.id))),
        };
        moved.date = date;
        moved.slot = slot;
        if self.working.booked_slot_taken(&moved) {
            return Err(DatabaseError::UniqueViolation(BOOKED_SLOT_KEY.to_string()));
        }
        self.working.appointments.insert(moved.id, moved);
        Ok(())
    }

    async fn insert_treatment(&mut self, treatment: &Treatment) -> Result<(), DatabaseError> {
        if self.working.treatments.iter().any(|existing| existing.id == treatment.id) {
            return Err(DatabaseError::UniqueViolation("treatments_pkey".to_string()));
        }
        self.working.treatments.push(treatment.clone());
        Ok(())
    }

    async fn treatments_for_patient(&mut self, patient_id: Uuid) -> Result<Vec<Treatment>, DatabaseError> {
        Ok(self.working.treatments.iter()
            .filter(|treatment| treatment.patient_id == patient_id)
            .cloned()
            .collect())
    }

    async fn commit(self: Box<Self>) -> Result<(), DatabaseError> {
        let InMemoryTransaction { mut guard, working } = *self;
        debug!(
            "Committing in-memory transaction: {} schedules, {} appointments",
            working.schedules.len(),
            working.appointments.len()
        );
        *guard = working;
        Ok(())
    }
}
