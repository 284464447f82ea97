// libs/scheduling-cell/src/services/scheduling.rs
use chrono::NaiveDate;
use std::sync::Arc;
use tracing::debug;
use uuid::Uuid;

use shared_config::AppConfig;
use shared_database::{SchedulingStore, SupabaseSchedulingStore};
use shared_models::{Appointment, AppointmentStatus, ScheduleEntry, Treatment};

use crate::clock::{Clock, SystemClock};
use crate::error::SchedulingError;
use crate::models::{
    BookAppointmentRequest, RescheduleAppointmentRequest, SchedulingRules, SlotSelection,
    TreatmentRequest,
};
use crate::services::allocator::SlotAllocator;
use crate::services::availability::AvailabilityService;
use crate::services::sweeper::LifecycleSweeper;
use crate::services::treatment::TreatmentService;
use crate::services::window::AvailabilityWindowService;

/// Entry point for callers: wires the scheduling services to one store and clock.
pub struct SchedulingService {
    store: Arc<dyn SchedulingStore>,
    clock: Arc<dyn Clock>,
    window_service: AvailabilityWindowService,
    sweeper: LifecycleSweeper,
    allocator: SlotAllocator,
    availability_service: AvailabilityService,
    treatment_service: TreatmentService,
}

impl SchedulingService {
    pub fn new(config: &AppConfig) -> Self {
        Self::with_store(
            Arc::new(SupabaseSchedulingStore::new(config)),
            Arc::new(SystemClock),
            SchedulingRules::from_config(config),
        )
    }

    pub fn with_store(
        store: Arc<dyn SchedulingStore>,
        clock: Arc<dyn Clock>,
        rules: SchedulingRules,
    ) -> Self {
        Self {
            window_service: AvailabilityWindowService::new(Arc::clone(&store)),
            sweeper: LifecycleSweeper::new(Arc::clone(&store), rules.missed_sweep_scope),
            allocator: SlotAllocator::new(Arc::clone(&store), rules.release_slot_on_cancel),
            availability_service: AvailabilityService::new(Arc::clone(&store)),
            treatment_service: TreatmentService::new(Arc::clone(&store)),
            store,
            clock,
        }
    }

    pub fn today(&self) -> NaiveDate {
        self.clock.today()
    }

    // ==========================================================================
    // WINDOW & LIFECYCLE
    // ==========================================================================

    pub async fn ensure_window(&self, doctor_id: Uuid, today: NaiveDate) -> Result<usize, SchedulingError> {
        self.window_service.ensure_window(doctor_id, today).await
    }

    pub async fn sweep(&self, doctor_id: Uuid, today: NaiveDate) -> Result<(), SchedulingError> {
        self.sweeper.sweep(doctor_id, today).await
    }

    /// Give a newly registered doctor a full window starting today.
    pub async fn onboard_doctor(&self, doctor_id: Uuid) -> Result<usize, SchedulingError> {
        self.ensure_window(doctor_id, self.today()).await
    }

    /// Doctor's availability page: sweep, top up the window, list it.
    pub async fn prepare_availability(&self, doctor_id: Uuid) -> Result<Vec<ScheduleEntry>, SchedulingError> {
        let today = self.today();
        self.sweep(doctor_id, today).await?;
        self.ensure_window(doctor_id, today).await?;
        self.availability(doctor_id).await
    }

    /// Patient's booking page: sweep and list. The window is only extended
    /// from the doctor's side.
    pub async fn prepare_booking(&self, doctor_id: Uuid) -> Result<Vec<ScheduleEntry>, SchedulingError> {
        self.sweep(doctor_id, self.today()).await?;
        self.availability(doctor_id).await
    }

    // ==========================================================================
    // AVAILABILITY
    // ==========================================================================

    pub async fn availability(&self, doctor_id: Uuid) -> Result<Vec<ScheduleEntry>, SchedulingError> {
        self.availability_service.availability(doctor_id).await
    }

    pub async fn publish_availability(
        &self,
        doctor_id: Uuid,
        open: &[SlotSelection],
    ) -> Result<Vec<ScheduleEntry>, SchedulingError> {
        self.availability_service.publish_availability(doctor_id, open).await
    }

    // ==========================================================================
    // BOOKINGS
    // ==========================================================================

    pub async fn book(&self, request: BookAppointmentRequest) -> Result<Appointment, SchedulingError> {
        self.allocator.book(request).await
    }

    pub async fn reschedule(
        &self,
        appointment_id: Uuid,
        request: RescheduleAppointmentRequest,
    ) -> Result<Appointment, SchedulingError> {
        self.allocator.reschedule(appointment_id, request).await
    }

    pub async fn cancel(&self, appointment_id: Uuid) -> Result<(), SchedulingError> {
        self.allocator.cancel(appointment_id).await
    }

    pub async fn cancel_doctor_bookings(&self, doctor_id: Uuid) -> Result<usize, SchedulingError> {
        self.allocator.cancel_doctor_bookings(doctor_id).await
    }

    /// A doctor's appointments, optionally narrowed to one status and/or date.
    pub async fn doctor_appointments(
        &self,
        doctor_id: Uuid,
        status: Option<AppointmentStatus>,
        date: Option<NaiveDate>,
    ) -> Result<Vec<Appointment>, SchedulingError> {
        debug!("Fetching appointments for doctor {} ({:?}, {:?})", doctor_id, status, date);
        let mut tx = self.store.begin().await?;
        let appointments = tx.appointments_for_doctor(doctor_id).await?;
        Ok(filter_appointments(appointments, status, date))
    }

    pub async fn patient_appointments(
        &self,
        patient_id: Uuid,
        status: Option<AppointmentStatus>,
        date: Option<NaiveDate>,
    ) -> Result<Vec<Appointment>, SchedulingError> {
        debug!("Fetching appointments for patient {} ({:?}, {:?})", patient_id, status, date);
        let mut tx = self.store.begin().await?;
        let appointments = tx.appointments_for_patient(patient_id).await?;
        Ok(filter_appointments(appointments, status, date))
    }

    /// Administrator listing across every doctor and patient.
    pub async fn all_appointments(&self, date: Option<NaiveDate>) -> Result<Vec<Appointment>, SchedulingError> {
        debug!("Fetching all appointments ({:?})", date);
        let mut tx = self.store.begin().await?;
        Ok(tx.all_appointments(date).await?)
    }

    // ==========================================================================
    // TREATMENTS
    // ==========================================================================

    pub async fn record_treatment(
        &self,
        appointment_id: Uuid,
        request: TreatmentRequest,
    ) -> Result<Treatment, SchedulingError> {
        self.treatment_service.record_treatment(appointment_id, request).await
    }

    pub async fn treatment_history(&self, patient_id: Uuid) -> Result<Vec<Treatment>, SchedulingError> {
        self.treatment_service.treatment_history(patient_id).await
    }
}

fn filter_appointments(
    appointments: Vec<Appointment>,
    status: Option<AppointmentStatus>,
    date: Option<NaiveDate>,
) -> Vec<Appointment> {
    appointments
        .into_iter()
        .filter(|a| status.map_or(true, |status| a.status == status))
        .filter(|a| date.map_or(true, |date| a.date == date))
        .collect()
}
