#![allow(dead_code)]

use std::sync::Arc;

use chrono::NaiveDate;
use uuid::Uuid;

use scheduling_cell::{BookAppointmentRequest, FixedClock, SchedulingRules, SchedulingService};
use shared_database::{InMemorySchedulingStore, SchedulingStore};
use shared_models::{Appointment, ScheduleEntry, SlotNumber};

pub fn june(day: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(2024, 6, day).unwrap()
}

pub struct TestContext {
    pub store: Arc<InMemorySchedulingStore>,
    pub clock: Arc<FixedClock>,
    pub service: SchedulingService,
}

impl TestContext {
    pub fn new(today: NaiveDate) -> Self {
        Self::with_rules(today, SchedulingRules::default())
    }

    pub fn with_rules(today: NaiveDate, rules: SchedulingRules) -> Self {
        let store = Arc::new(InMemorySchedulingStore::new());
        let clock = Arc::new(FixedClock::new(today));
        let service = SchedulingService::with_store(
            Arc::clone(&store) as Arc<dyn SchedulingStore>,
            Arc::clone(&clock) as Arc<dyn scheduling_cell::Clock>,
            rules,
        );

        Self { store, clock, service }
    }

    pub async fn seed_schedule(&self, entry: ScheduleEntry) -> ScheduleEntry {
        let mut tx = self.store.begin().await.unwrap();
        tx.insert_schedule(&entry).await.unwrap();
        tx.commit().await.unwrap();
        entry
    }

    pub async fn seed_open_day(&self, doctor_id: Uuid, date: NaiveDate) -> ScheduleEntry {
        self.seed_schedule(ScheduleEntry::open(doctor_id, date)).await
    }

    pub async fn seed_appointment(&self, appointment: Appointment) -> Appointment {
        let mut tx = self.store.begin().await.unwrap();
        tx.insert_appointment(&appointment).await.unwrap();
        tx.commit().await.unwrap();
        appointment
    }

    pub async fn schedule(&self, schedule_id: Uuid) -> Option<ScheduleEntry> {
        self.store.schedules().await.into_iter().find(|entry| entry.id == schedule_id)
    }

    pub async fn appointment(&self, appointment_id: Uuid) -> Option<Appointment> {
        self.store.appointments().await.into_iter().find(|appointment| appointment.id == appointment_id)
    }

    pub async fn doctor_schedule(&self, doctor_id: Uuid) -> Vec<ScheduleEntry> {
        self.store.schedules().await.into_iter().filter(|entry| entry.doctor_id == doctor_id).collect()
    }
}

pub fn book_request(doctor_id: Uuid, patient_id: Uuid, schedule_id: Uuid, slot: SlotNumber) -> BookAppointmentRequest {
    BookAppointmentRequest {
        doctor_id,
        patient_id,
        schedule_id,
        slot_number: slot.as_u8(),
        visit_type: "In-Person".to_string(),
    }
}
