// libs/scheduling-cell/src/services/treatment.rs
use std::sync::Arc;
use tracing::{debug, info, warn};
use uuid::Uuid;

use shared_database::{DatabaseError, SchedulingStore};
use shared_models::{AppointmentStatus, Treatment};

use crate::error::SchedulingError;
use crate::models::TreatmentRequest;
use crate::services::allocator::current_status;

pub struct TreatmentService {
    store: Arc<dyn SchedulingStore>,
}

impl TreatmentService {
    pub fn new(store: Arc<dyn SchedulingStore>) -> Self {
        Self { store }
    }

    /// Store the doctor's notes for a booked appointment and complete it.
    pub async fn record_treatment(
        &self,
        appointment_id: Uuid,
        request: TreatmentRequest,
    ) -> Result<Treatment, SchedulingError> {
        debug!("Recording treatment for appointment: {}", appointment_id);

        let (diagnosis, treatment, instruction) = request.validate()?;

        let mut tx = self.store.begin().await?;

        let appointment = tx.appointment(appointment_id).await?
            .ok_or_else(|| SchedulingError::NotFound(format!("appointment {}", appointment_id)))?;

        if appointment.status != AppointmentStatus::Booked {
            warn!("Cannot record treatment for appointment {} in status {}", appointment_id, appointment.status);
            return Err(SchedulingError::InvalidState(appointment.status));
        }

        let record = Treatment {
            id: Uuid::new_v4(),
            appointment_id,
            patient_id: appointment.patient_id,
            doctor_id: appointment.doctor_id,
            diagnosis,
            treatment,
            instruction,
        };

        let written: Result<(), DatabaseError> = async {
            tx.set_status(appointment_id, AppointmentStatus::Booked, AppointmentStatus::Completed).await?;
            tx.insert_treatment(&record).await?;
            tx.commit().await
        }.await;

        if let Err(error) = written {
            return Err(match current_status(self.store.as_ref(), appointment_id, error).await? {
                Some(status) if status != AppointmentStatus::Booked => {
                    warn!("Appointment {} became {} before its treatment was stored", appointment_id, status);
                    SchedulingError::InvalidState(status)
                }
                _ => SchedulingError::StorageError(format!(
                    "appointment {} changed while recording treatment", appointment_id
                )),
            });
        }

        info!("Treatment {} recorded, appointment {} completed", record.id, appointment_id);
        Ok(record)
    }

    pub async fn treatment_history(&self, patient_id: Uuid) -> Result<Vec<Treatment>, SchedulingError> {
        let mut tx = self.store.begin().await?;
        Ok(tx.treatments_for_patient(patient_id).await?)
    }
}
