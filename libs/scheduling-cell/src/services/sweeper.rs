// libs/scheduling-cell/src/services/sweeper.rs
use chrono::NaiveDate;
use std::sync::Arc;
use tracing::{debug, info, warn};
use uuid::Uuid;

use shared_database::SchedulingStore;
use shared_models::AppointmentStatus;

use crate::error::SchedulingError;
use crate::models::MissedSweepScope;

/// Expires elapsed availability and marks overdue bookings as missed.
pub struct LifecycleSweeper {
    store: Arc<dyn SchedulingStore>,
    scope: MissedSweepScope,
}

impl LifecycleSweeper {
    pub fn new(store: Arc<dyn SchedulingStore>, scope: MissedSweepScope) -> Self {
        Self { store, scope }
    }

    /// Delete the doctor's entries dated before `today` and move every
    /// overdue `Booked` appointment in scope to `Missed`.
    ///
    /// Running it again on the same day changes nothing.
    pub async fn sweep(&self, doctor_id: Uuid, today: NaiveDate) -> Result<(), SchedulingError> {
        debug!("Sweeping stale schedule for doctor {} before {} ({:?} scope)", doctor_id, today, self.scope);

        let mut tx = self.store.begin().await?;

        let stale: Vec<Uuid> = tx.schedules_for_doctor(doctor_id).await?
            .into_iter()
            .filter(|entry| entry.date < today)
            .map(|entry| entry.id)
            .collect();

        for schedule_id in &stale {
            tx.delete_schedule(*schedule_id).await?;
        }

        let overdue: Vec<Uuid> = tx.appointments_with_status(AppointmentStatus::Booked).await?
            .into_iter()
            .filter(|appointment| appointment.date < today)
            .filter(|appointment| match self.scope {
                MissedSweepScope::Global => true,
                MissedSweepScope::Doctor => appointment.doctor_id == doctor_id,
            })
            .map(|appointment| appointment.id)
            .collect();

        for appointment_id in &overdue {
            tx.set_status(*appointment_id, AppointmentStatus::Booked, AppointmentStatus::Missed).await?;
        }

        // Another request resolved one of these rows first; the next sweep
        // picks up whatever is still stale.
        if let Err(e) = tx.commit().await {
            if e.is_unique_violation() {
                warn!("Sweep for doctor {} lost a race, leaving it to the next sweep: {}", doctor_id, e);
                return Ok(());
            }
            return Err(e.into());
        }

        let missed = overdue.len();
        if !stale.is_empty() || missed > 0 {
            info!(
                "Sweep for doctor {}: removed {} past schedule days, marked {} appointments missed",
                doctor_id,
                stale.len(),
                missed
            );
        }

        Ok(())
    }
}
