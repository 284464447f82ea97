// libs/scheduling-cell/src/services/availability.rs
use std::collections::HashSet;
use std::sync::Arc;
use tracing::{debug, info, warn};
use uuid::Uuid;

use shared_database::SchedulingStore;
use shared_models::{AppointmentStatus, ScheduleEntry, SlotNumber, SlotState};

use crate::error::SchedulingError;
use crate::models::SlotSelection;

/// Doctor-facing view and editing of the schedule window.
pub struct AvailabilityService {
    store: Arc<dyn SchedulingStore>,
}

impl AvailabilityService {
    pub fn new(store: Arc<dyn SchedulingStore>) -> Self {
        Self { store }
    }

    /// The doctor's schedule entries, earliest first.
    pub async fn availability(&self, doctor_id: Uuid) -> Result<Vec<ScheduleEntry>, SchedulingError> {
        let mut tx = self.store.begin().await?;
        Ok(tx.schedules_for_doctor(doctor_id).await?)
    }

    /// Replace the doctor's published slots: every listed slot opens, every
    /// other slot closes. Slots held by a booking stay taken.
    pub async fn publish_availability(
        &self,
        doctor_id: Uuid,
        open: &[SlotSelection],
    ) -> Result<Vec<ScheduleEntry>, SchedulingError> {
        debug!("Publishing {} open slots for doctor {}", open.len(), doctor_id);

        let mut tx = self.store.begin().await?;

        let entries = tx.schedules_for_doctor(doctor_id).await?;
        let known: HashSet<Uuid> = entries.iter().map(|entry| entry.id).collect();

        let requested: HashSet<SlotSelection> = open.iter().copied().collect();
        for selection in requested.iter().filter(|selection| !known.contains(&selection.schedule_id)) {
            warn!("Ignoring slot selection {} outside doctor {}'s schedule", selection, doctor_id);
        }

        let held: HashSet<_> = tx.appointments_for_doctor(doctor_id).await?
            .into_iter()
            .filter(|appointment| appointment.status == AppointmentStatus::Booked)
            .map(|appointment| (appointment.date, appointment.slot))
            .collect();

        let mut published = Vec::with_capacity(entries.len());
        for mut entry in entries {
            for slot in SlotNumber::ALL {
                let current = entry.slot(slot);
                let state = if held.contains(&(entry.date, slot)) {
                    SlotState::Taken
                } else if requested.contains(&SlotSelection::new(entry.id, slot)) {
                    SlotState::Available
                } else {
                    SlotState::Taken
                };

                if state != current {
                    tx.set_slot(entry.id, slot, current, state).await
                        .map_err(SchedulingError::from_slot_write)?;
                    entry.set_slot(slot, state);
                }
            }
            published.push(entry);
        }

        tx.commit().await
            .map_err(SchedulingError::from_slot_write)?;

        info!("Availability updated for doctor {}", doctor_id);
        Ok(published)
    }
}
