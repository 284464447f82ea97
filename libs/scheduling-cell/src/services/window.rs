// libs/scheduling-cell/src/services/window.rs
use chrono::{Duration, NaiveDate};
use std::sync::Arc;
use tracing::{debug, info, warn};
use uuid::Uuid;

use shared_database::{DatabaseError, SchedulingStore};
use shared_models::ScheduleEntry;

use crate::error::SchedulingError;
use crate::models::WINDOW_DAYS;

/// Keeps every doctor's schedule reaching `WINDOW_DAYS` past today.
pub struct AvailabilityWindowService {
    store: Arc<dyn SchedulingStore>,
}

impl AvailabilityWindowService {
    pub fn new(store: Arc<dyn SchedulingStore>) -> Self {
        Self { store }
    }

    /// Append open entries so the doctor's schedule covers `today ..= today + 7`.
    ///
    /// Existing entries are never modified. Returns how many entries were
    /// created; a second call on the same day creates none.
    ///
    /// Generation resumes at `max(last_date + 1, today)`, so no past day is
    /// created. A past day that is still stored is left in place until the
    /// next sweep removes it.
    pub async fn ensure_window(&self, doctor_id: Uuid, today: NaiveDate) -> Result<usize, SchedulingError> {
        debug!("Ensuring schedule window for doctor {} from {}", doctor_id, today);

        let mut tx = self.store.begin().await?;
        let existing = tx.schedules_for_doctor(doctor_id).await?;
        let horizon = today + Duration::days(WINDOW_DAYS);

        let first_missing = match existing.iter().map(|entry| entry.date).max() {
            None => today,
            Some(last_date) if (last_date - today).num_days() >= WINDOW_DAYS => {
                debug!("Doctor {} already scheduled through {}", doctor_id, last_date);
                return Ok(0);
            }
            // Days before today would only be swept again.
            Some(last_date) => (last_date + Duration::days(1)).max(today),
        };

        let mut created = 0;
        for date in first_missing.iter_days().take_while(|date| *date <= horizon) {
            let entry = ScheduleEntry::open(doctor_id, date);
            if let Err(e) = tx.insert_schedule(&entry).await {
                return top_up_failed(doctor_id, e);
            }
            created += 1;
        }

        if let Err(e) = tx.commit().await {
            return top_up_failed(doctor_id, e);
        }

        info!("Added {} schedule days for doctor {} through {}", created, doctor_id, horizon);
        Ok(created)
    }
}

/// A uniqueness clash means another request extended the window first.
fn top_up_failed(doctor_id: Uuid, error: DatabaseError) -> Result<usize, SchedulingError> {
    if error.is_unique_violation() {
        warn!("Schedule window for doctor {} was extended concurrently: {}", doctor_id, error);
        Ok(0)
    } else {
        Err(error.into())
    }
}
