// libs/shared/database/src/supabase_store.rs
//
// Scheduling store backed by Supabase. Reads go straight to PostgREST; writes
// are staged and shipped in a single call to the `apply_scheduling_changes`
// database function (sql/apply_scheduling_changes.sql), which applies them
// inside one Postgres transaction.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::NaiveDate;
use reqwest::Method;
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::json;
use tracing::{debug, info};
use uuid::Uuid;

use shared_config::AppConfig;
use shared_models::{Appointment, AppointmentStatus, ScheduleEntry, SlotNumber, SlotState, Treatment};

use crate::error::DatabaseError;
use crate::store::{SchedulingStore, SchedulingTransaction};
use crate::supabase::SupabaseClient;

pub const SCHEDULES_PATH: &str = "/rest/v1/doctor_schedules";
pub const APPOINTMENTS_PATH: &str = "/rest/v1/appointments";
pub const TREATMENTS_PATH: &str = "/rest/v1/treatments";
pub const APPLY_CHANGES_PATH: &str = "/rest/v1/rpc/apply_scheduling_changes";

/// A write waiting for commit, in the shape `apply_scheduling_changes` expects.
///
/// Updates touch a single column and carry the value they replace. The
/// function raises `unique_violation` when a row no longer holds it, which
/// rolls back the whole batch. An unset slot column counts as available.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "op", content = "data", rename_all = "snake_case")]
pub enum StagedChange {
    InsertSchedule(ScheduleEntry),
    SetSlot {
        id: Uuid,
        slot: SlotNumber,
        expected: SlotState,
        state: SlotState,
    },
    DeleteSchedule { id: Uuid },
    InsertAppointment(Appointment),
    SetStatus {
        id: Uuid,
        expected: AppointmentStatus,
        status: AppointmentStatus,
    },
    MoveAppointment {
        id: Uuid,
        from_date: NaiveDate,
        from_slot: SlotNumber,
        date: NaiveDate,
        slot: SlotNumber,
    },
    InsertTreatment(Treatment),
}

pub struct SupabaseSchedulingStore {
    supabase: Arc<SupabaseClient>,
    auth_token: Option<String>,
}

impl SupabaseSchedulingStore {
    pub fn new(config: &AppConfig) -> Self {
        Self {
            supabase: Arc::new(SupabaseClient::new(config)),
            auth_token: None,
        }
    }

    /// Run every request on behalf of the given user instead of the service role.
    pub fn with_auth_token(mut self, auth_token: impl Into<String>) -> Self {
        self.auth_token = Some(auth_token.into());
        self
    }
}

#[async_trait]
impl SchedulingStore for SupabaseSchedulingStore {
    async fn begin(&self) -> Result<Box<dyn SchedulingTransaction>, DatabaseError> {
        Ok(Box::new(SupabaseTransaction {
            supabase: Arc::clone(&self.supabase),
            auth_token: self.auth_token.clone(),
            changes: Vec::new(),
        }))
    }
}

pub struct SupabaseTransaction {
    supabase: Arc<SupabaseClient>,
    auth_token: Option<String>,
    changes: Vec<StagedChange>,
}

impl SupabaseTransaction {
    async fn fetch<T: DeserializeOwned>(&self, path: &str) -> Result<Vec<T>, DatabaseError> {
        self.supabase.request(
            Method::GET,
            path,
            self.auth_token.as_deref(),
            None,
        ).await
    }

    async fn fetch_one<T: DeserializeOwned>(&self, path: &str) -> Result<Option<T>, DatabaseError> {
        Ok(self.fetch::<T>(path).await?.into_iter().next())
    }

    fn stage(&mut self, change: StagedChange) {
        debug!("Staging change: {:?}", change);
        self.changes.push(change);
    }
}

#[async_trait]
impl SchedulingTransaction for SupabaseTransaction {
    async fn schedules_for_doctor(&mut self, doctor_id: Uuid) -> Result<Vec<ScheduleEntry>, DatabaseError> {
        let path = format!("{}?doctor_id=eq.{}&order=date.asc", SCHEDULES_PATH, doctor_id);
        self.fetch(&path).await
    }

    async fn schedule(&mut self, schedule_id: Uuid) -> Result<Option<ScheduleEntry>, DatabaseError> {
        let path = format!("{}?id=eq.{}", SCHEDULES_PATH, schedule_id);
        self.fetch_one(&path).await
    }

    async fn schedule_on(&mut self, doctor_id: Uuid, date: NaiveDate) -> Result<Option<ScheduleEntry>, DatabaseError> {
        let path = format!(
            "{}?doctor_id=eq.{}&date=eq.{}",
            SCHEDULES_PATH,
            doctor_id,
            date.format("%Y-%m-%d")
        );
        self.fetch_one(&path).await
    }

    async fn insert_schedule(&mut self, entry: &ScheduleEntry) -> Result<(), DatabaseError> {
        self.stage(StagedChange::InsertSchedule(entry.clone()));
        Ok(())
    }

    async fn set_slot(
        &mut self,
        schedule_id: Uuid,
        slot: SlotNumber,
        expected: SlotState,
        state: SlotState,
    ) -> Result<(), DatabaseError> {
        self.stage(StagedChange::SetSlot { id: schedule_id, slot, expected, state });
        Ok(())
    }

    async fn delete_schedule(&mut self, schedule_id: Uuid) -> Result<(), DatabaseError> {
        self.stage(StagedChange::DeleteSchedule { id: schedule_id });
        Ok(())
    }

    async fn appointment(&mut self, appointment_id: Uuid) -> Result<Option<Appointment>, DatabaseError> {
        let path = format!("{}?id=eq.{}", APPOINTMENTS_PATH, appointment_id);
        self.fetch_one(&path).await
    }

    async fn appointments_for_doctor(&mut self, doctor_id: Uuid) -> Result<Vec<Appointment>, DatabaseError> {
        let path = format!("{}?doctor_id=eq.{}&order=date.asc,slot.asc", APPOINTMENTS_PATH, doctor_id);
        self.fetch(&path).await
    }

    async fn appointments_for_patient(&mut self, patient_id: Uuid) -> Result<Vec<Appointment>, DatabaseError> {
        let path = format!("{}?patient_id=eq.{}&order=date.asc,slot.asc", APPOINTMENTS_PATH, patient_id);
        self.fetch(&path).await
    }

    async fn appointments_with_status(&mut self, status: AppointmentStatus) -> Result<Vec<Appointment>, DatabaseError> {
        let path = format!("{}?status=eq.{}&order=date.asc,slot.asc", APPOINTMENTS_PATH, status);
        self.fetch(&path).await
    }

    async fn all_appointments(&mut self, date: Option<NaiveDate>) -> Result<Vec<Appointment>, DatabaseError> {
        let path = match date {
            Some(date) => format!(
                "{}?date=eq.{}&order=date.asc,slot.asc",
                APPOINTMENTS_PATH,
                date.format("%Y-%m-%d")
            ),
            None => format!("{}?order=date.asc,slot.asc", APPOINTMENTS_PATH),
        };
        self.fetch(&path).await
    }

    async fn insert_appointment(&mut self, appointment: &Appointment) -> Result<(), DatabaseError> {
        self.stage(StagedChange::InsertAppointment(appointment.clone()));
        Ok(())
    }

    async fn set_status(
        &mut self,
        appointment_id: Uuid,
        expected: AppointmentStatus,
        status: AppointmentStatus,
    ) -> Result<(), DatabaseError> {
        self.stage(StagedChange::SetStatus { id: appointment_id, expected, status });
        Ok(())
    }

    async fn move_appointment(
        &mut self,
        appointment: &Appointment,
        date: NaiveDate,
        slot: SlotNumber,
    ) -> Result<(), DatabaseError> {
        self.stage(StagedChange::MoveAppointment {
            id: appointment.id,
            from_date: appointment.date,
            from_slot: appointment.slot,
            date,
            slot,
        });
        Ok(())
    }

    async fn insert_treatment(&mut self, treatment: &Treatment) -> Result<(), DatabaseError> {
        self.stage(StagedChange::InsertTreatment(treatment.clone()));
        Ok(())
    }

    async fn treatments_for_patient(&mut self, patient_id: Uuid) -> Result<Vec<Treatment>, DatabaseError> {
        let path = format!("{}?patient_id=eq.{}", TREATMENTS_PATH, patient_id);
        self.fetch(&path).await
    }

    async fn commit(self: Box<Self>) -> Result<(), DatabaseError> {
        if self.changes.is_empty() {
            debug!("Nothing staged, skipping commit");
            return Ok(());
        }

        let count = self.changes.len();
        let body = json!({ "changes": self.changes });

        self.supabase.execute(
            Method::POST,
            APPLY_CHANGES_PATH,
            self.auth_token.as_deref(),
            Some(body),
        ).await?;

        info!("Committed {} scheduling changes", count);
        Ok(())
    }
}
