// libs/scheduling-cell/src/services/allocator.rs
use std::sync::Arc;
use tracing::{debug, info, warn};
use uuid::Uuid;

use shared_database::{DatabaseError, SchedulingStore};
use shared_models::{Appointment, AppointmentStatus, ScheduleEntry, SlotNumber, SlotState};

use crate::error::SchedulingError;
use crate::models::{validate_visit_type, BookAppointmentRequest, RescheduleAppointmentRequest};

/// Books, moves and cancels appointments against schedule slots.
pub struct SlotAllocator {
    store: Arc<dyn SchedulingStore>,
    release_slot_on_cancel: bool,
}

impl SlotAllocator {
    pub fn new(store: Arc<dyn SchedulingStore>, release_slot_on_cancel: bool) -> Self {
        Self {
            store,
            release_slot_on_cancel,
        }
    }

    /// Take an open slot and create a `Booked` appointment for it.
    pub async fn book(&self, request: BookAppointmentRequest) -> Result<Appointment, SchedulingError> {
        info!("Booking slot {} of schedule {} for patient {} with doctor {}",
              request.slot_number, request.schedule_id, request.patient_id, request.doctor_id);

        let slot = SlotNumber::try_from(request.slot_number)?;
        let visit_type = validate_visit_type(&request.visit_type)?;

        let mut tx = self.store.begin().await?;

        let entry = tx.schedule(request.schedule_id).await?
            .filter(|entry| entry.doctor_id == request.doctor_id)
            .ok_or_else(|| SchedulingError::NotFound(format!(
                "schedule {} for doctor {}", request.schedule_id, request.doctor_id
            )))?;

        if !entry.is_bookable(slot) {
            warn!("Slot {} on {} for doctor {} is no longer available", slot, entry.date, request.doctor_id);
            return Err(SchedulingError::SlotUnavailable);
        }

        let appointment = Appointment::booked(
            request.doctor_id,
            request.patient_id,
            visit_type,
            entry.date,
            slot,
        );

        tx.set_slot(entry.id, slot, SlotState::Available, SlotState::Taken).await
            .map_err(SchedulingError::from_slot_write)?;
        tx.insert_appointment(&appointment).await
            .map_err(SchedulingError::from_slot_write)?;
        tx.commit().await
            .map_err(SchedulingError::from_slot_write)?;

        info!("Appointment {} booked for {} slot {}", appointment.id, appointment.date, slot);
        Ok(appointment)
    }

    /// Move a `Booked` appointment to another slot of the same doctor.
    ///
    /// The old slot is reopened only while its day is still on the schedule.
    pub async fn reschedule(
        &self,
        appointment_id: Uuid,
        request: RescheduleAppointmentRequest,
    ) -> Result<Appointment, SchedulingError> {
        debug!("Rescheduling appointment: {}", appointment_id);

        let selection = request.selection()?;

        let mut tx = self.store.begin().await?;

        let appointment = tx.appointment(appointment_id).await?
            .ok_or_else(|| appointment_not_found(appointment_id))?;

        if appointment.status != AppointmentStatus::Booked {
            warn!("Refusing to reschedule appointment {} in status {}", appointment_id, appointment.status);
            return Err(SchedulingError::InvalidState(appointment.status));
        }

        let target = tx.schedule(selection.schedule_id).await?
            .filter(|entry| entry.doctor_id == appointment.doctor_id)
            .ok_or_else(|| SchedulingError::NotFound(format!(
                "schedule {} for doctor {}", selection.schedule_id, appointment.doctor_id
            )))?;

        if target.date == appointment.date && selection.slot == appointment.slot {
            debug!("Appointment {} already holds {}", appointment_id, selection);
            return Ok(appointment);
        }

        if !target.is_bookable(selection.slot) {
            warn!("Reschedule target {} on {} is not available", selection, target.date);
            return Err(SchedulingError::SlotUnavailable);
        }

        let previous = if target.date == appointment.date {
            Some(target.clone())
        } else {
            tx.schedule_on(appointment.doctor_id, appointment.date).await?
        };
        let release = match previous {
            Some(entry) => held_slot(&entry, appointment.slot),
            None => {
                debug!("Schedule day {} already swept, slot {} is not restored", appointment.date, appointment.slot);
                None
            }
        };

        let (date, slot) = (target.date, selection.slot);
        let original = appointment.clone();
        let written: Result<(), DatabaseError> = async move {
            if let Some((schedule_id, old_slot)) = release {
                tx.set_slot(schedule_id, old_slot, SlotState::Taken, SlotState::Available).await?;
            }
            tx.set_slot(target.id, slot, SlotState::Available, SlotState::Taken).await?;
            tx.move_appointment(&original, date, slot).await?;
            tx.commit().await
        }.await;

        if let Err(error) = written {
            return Err(match current_status(self.store.as_ref(), appointment_id, error).await? {
                Some(status) if status != AppointmentStatus::Booked => {
                    warn!("Appointment {} became {} while rescheduling", appointment_id, status);
                    SchedulingError::InvalidState(status)
                }
                _ => SchedulingError::SlotUnavailable,
            });
        }

        let mut moved = appointment;
        moved.date = date;
        moved.slot = slot;

        info!("Appointment {} rescheduled to {} slot {}", appointment_id, moved.date, moved.slot);
        Ok(moved)
    }

    /// Cancel a booking. Cancelling twice is a no-op; completed and missed
    /// appointments cannot be cancelled.
    pub async fn cancel(&self, appointment_id: Uuid) -> Result<(), SchedulingError> {
        debug!("Cancelling appointment: {}", appointment_id);

        let mut tx = self.store.begin().await?;

        let appointment = tx.appointment(appointment_id).await?
            .ok_or_else(|| appointment_not_found(appointment_id))?;

        match appointment.status {
            AppointmentStatus::Booked => {}
            AppointmentStatus::Cancelled => {
                debug!("Appointment {} is already cancelled", appointment_id);
                return Ok(());
            }
            status => {
                warn!("Refusing to cancel appointment {} in status {}", appointment_id, status);
                return Err(SchedulingError::InvalidState(status));
            }
        }

        let release = if self.release_slot_on_cancel {
            tx.schedule_on(appointment.doctor_id, appointment.date).await?
                .and_then(|entry| held_slot(&entry, appointment.slot))
        } else {
            None
        };

        let written: Result<(), DatabaseError> = async move {
            tx.set_status(appointment_id, AppointmentStatus::Booked, AppointmentStatus::Cancelled).await?;
            if let Some((schedule_id, slot)) = release {
                tx.set_slot(schedule_id, slot, SlotState::Taken, SlotState::Available).await?;
            }
            tx.commit().await
        }.await;

        if let Err(error) = written {
            return match current_status(self.store.as_ref(), appointment_id, error).await? {
                Some(AppointmentStatus::Cancelled) => {
                    debug!("Appointment {} was cancelled concurrently", appointment_id);
                    Ok(())
                }
                Some(status) if status != AppointmentStatus::Booked => {
                    warn!("Appointment {} became {} while cancelling", appointment_id, status);
                    Err(SchedulingError::InvalidState(status))
                }
                _ => Err(SchedulingError::StorageError(format!(
                    "appointment {} changed while cancelling", appointment_id
                ))),
            };
        }

        info!("Appointment {} cancelled successfully", appointment_id);
        Ok(())
    }

    /// Cancel every open booking of a doctor who stops taking patients.
    /// Slots stay taken.
    pub async fn cancel_doctor_bookings(&self, doctor_id: Uuid) -> Result<usize, SchedulingError> {
        debug!("Cancelling all bookings for doctor: {}", doctor_id);

        let mut tx = self.store.begin().await?;

        let booked: Vec<Uuid> = tx.appointments_for_doctor(doctor_id).await?
            .into_iter()
            .filter(|appointment| appointment.status == AppointmentStatus::Booked)
            .map(|appointment| appointment.id)
            .collect();

        for appointment_id in &booked {
            tx.set_status(*appointment_id, AppointmentStatus::Booked, AppointmentStatus::Cancelled).await?;
        }

        tx.commit().await?;

        info!("Cancelled {} bookings for doctor {}", booked.len(), doctor_id);
        Ok(booked.len())
    }
}

/// The slot to hand back when `slot` of `entry` is still marked taken.
fn held_slot(entry: &ScheduleEntry, slot: SlotNumber) -> Option<(Uuid, SlotNumber)> {
    (entry.slot(slot) == SlotState::Taken).then_some((entry.id, slot))
}

fn appointment_not_found(appointment_id: Uuid) -> SchedulingError {
    SchedulingError::NotFound(format!("appointment {}", appointment_id))
}

/// Explain a rejected write by reading the appointment's status afresh.
///
/// Errors other than a stale or conflicting write are passed through.
pub(crate) async fn current_status(
    store: &dyn SchedulingStore,
    appointment_id: Uuid,
    error: DatabaseError,
) -> Result<Option<AppointmentStatus>, SchedulingError> {
    if !error.is_unique_violation() {
        return Err(error.into());
    }

    debug!("Write for appointment {} was rejected: {}", appointment_id, error);
    let mut tx = store.begin().await?;
    Ok(tx.appointment(appointment_id).await?.map(|appointment| appointment.status))
}
