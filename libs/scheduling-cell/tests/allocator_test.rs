mod common;

use std::sync::Arc;

use assert_matches::assert_matches;
use uuid::Uuid;

use common::{book_request, june, TestContext};
use scheduling_cell::{
    BookAppointmentRequest, RescheduleAppointmentRequest, SchedulingError, SchedulingRules,
    SlotSelection,
};
use shared_models::{Appointment, AppointmentStatus, ScheduleEntry, SlotNumber, SlotState};

#[tokio::test]
async fn test_booking_an_open_slot_takes_it_and_creates_one_appointment() {
    let ctx = TestContext::new(june(10));
    let doctor_id = Uuid::new_v4();
    let patient_p = Uuid::new_v4();
    let patient_q = Uuid::new_v4();
    let entry = ctx.seed_open_day(doctor_id, june(10)).await;

    let appointment = ctx.service
        .book(book_request(doctor_id, patient_p, entry.id, SlotNumber::First))
        .await
        .unwrap();

    assert_eq!(appointment.doctor_id, doctor_id);
    assert_eq!(appointment.patient_id, patient_p);
    assert_eq!(appointment.date, june(10));
    assert_eq!(appointment.slot, SlotNumber::First);
    assert_eq!(appointment.status, AppointmentStatus::Booked);
    assert_eq!(appointment.visit_type, "In-Person");

    let after = ctx.schedule(entry.id).await.unwrap();
    assert_eq!(after.slot_1, SlotState::Taken);
    assert_eq!(after.slot_2, SlotState::Available);

    let second = ctx.service
        .book(book_request(doctor_id, patient_q, entry.id, SlotNumber::First))
        .await;
    assert_matches!(second, Err(SchedulingError::SlotUnavailable));

    assert_eq!(ctx.store.appointments().await, vec![appointment]);
}

#[tokio::test]
async fn test_booking_rejects_bad_slot_numbers_and_visit_types_without_writing() {
    let ctx = TestContext::new(june(10));
    let doctor_id = Uuid::new_v4();
    let entry = ctx.seed_open_day(doctor_id, june(10)).await;

    let mut bad_slot = book_request(doctor_id, Uuid::new_v4(), entry.id, SlotNumber::First);
    bad_slot.slot_number = 3;
    assert_matches!(ctx.service.book(bad_slot).await, Err(SchedulingError::ValidationError(_)));

    let mut no_visit_type = book_request(doctor_id, Uuid::new_v4(), entry.id, SlotNumber::First);
    no_visit_type.visit_type = "  ".to_string();
    assert_matches!(ctx.service.book(no_visit_type).await, Err(SchedulingError::ValidationError(_)));

    assert!(ctx.store.appointments().await.is_empty());
    assert_eq!(ctx.schedule(entry.id).await.unwrap(), entry);
}

#[tokio::test]
async fn test_booking_unknown_or_foreign_schedule_is_not_found() {
    let ctx = TestContext::new(june(10));
    let doctor_id = Uuid::new_v4();
    let other_doctor = Uuid::new_v4();
    let foreign = ctx.seed_open_day(other_doctor, june(10)).await;

    let unknown = ctx.service
        .book(book_request(doctor_id, Uuid::new_v4(), Uuid::new_v4(), SlotNumber::First))
        .await;
    assert_matches!(unknown, Err(SchedulingError::NotFound(_)));

    let wrong_doctor = ctx.service
        .book(book_request(doctor_id, Uuid::new_v4(), foreign.id, SlotNumber::First))
        .await;
    assert_matches!(wrong_doctor, Err(SchedulingError::NotFound(_)));
    assert_eq!(ctx.schedule(foreign.id).await.unwrap().slot_1, SlotState::Available);
}

#[tokio::test]
async fn test_inactive_day_cannot_be_booked() {
    let ctx = TestContext::new(june(10));
    let doctor_id = Uuid::new_v4();
    let mut entry = ScheduleEntry::open(doctor_id, june(11));
    entry.active = false;
    let entry = ctx.seed_schedule(entry).await;

    let result = ctx.service
        .book(book_request(doctor_id, Uuid::new_v4(), entry.id, SlotNumber::Second))
        .await;

    assert_matches!(result, Err(SchedulingError::SlotUnavailable));
}

#[tokio::test]
async fn test_uniqueness_violation_is_authoritative_over_the_pre_check() {
    let ctx = TestContext::new(june(10));
    let doctor_id = Uuid::new_v4();
    // The flag says open, but a live booking already holds the slot.
    let entry = ctx.seed_open_day(doctor_id, june(10)).await;
    ctx.seed_appointment(Appointment::booked(doctor_id, Uuid::new_v4(), "In-Person", june(10), SlotNumber::First))
        .await;

    let result = ctx.service
        .book(book_request(doctor_id, Uuid::new_v4(), entry.id, SlotNumber::First))
        .await;

    assert_matches!(result, Err(SchedulingError::SlotUnavailable));
    assert_eq!(ctx.schedule(entry.id).await.unwrap().slot_1, SlotState::Available);
    assert_eq!(ctx.store.appointments().await.len(), 1);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_bookings_of_one_slot_have_a_single_winner() {
    let ctx = Arc::new(TestContext::new(june(10)));
    let doctor_id = Uuid::new_v4();
    let entry = ctx.seed_open_day(doctor_id, june(10)).await;

    let mut handles = Vec::new();
    for _ in 0..8 {
        let ctx = Arc::clone(&ctx);
        let request = book_request(doctor_id, Uuid::new_v4(), entry.id, SlotNumber::Second);
        handles.push(tokio::spawn(async move { ctx.service.book(request).await }));
    }

    let mut booked = 0;
    for handle in handles {
        match handle.await.unwrap() {
            Ok(_) => booked += 1,
            Err(error) => assert_eq!(error, SchedulingError::SlotUnavailable),
        }
    }

    assert_eq!(booked, 1);
    assert_eq!(ctx.store.appointments().await.len(), 1);
}

#[tokio::test]
async fn test_reschedule_moves_booking_and_frees_the_old_slot() {
    let ctx = TestContext::new(june(10));
    let doctor_id = Uuid::new_v4();
    let monday = ctx.seed_open_day(doctor_id, june(10)).await;
    let tuesday = ctx.seed_open_day(doctor_id, june(11)).await;

    let booked = ctx.service
        .book(book_request(doctor_id, Uuid::new_v4(), monday.id, SlotNumber::First))
        .await
        .unwrap();

    let moved = ctx.service
        .reschedule(booked.id, SlotSelection::new(tuesday.id, SlotNumber::Second).into())
        .await
        .unwrap();

    assert_eq!(moved.id, booked.id);
    assert_eq!(moved.date, june(11));
    assert_eq!(moved.slot, SlotNumber::Second);
    assert_eq!(moved.status, AppointmentStatus::Booked);

    assert_eq!(ctx.schedule(monday.id).await.unwrap().slot_1, SlotState::Available);
    assert_eq!(ctx.schedule(tuesday.id).await.unwrap().slot_2, SlotState::Taken);
    assert_eq!(ctx.appointment(booked.id).await.unwrap(), moved);
}

#[tokio::test]
async fn test_reschedule_between_slots_of_the_same_day() {
    let ctx = TestContext::new(june(10));
    let doctor_id = Uuid::new_v4();
    let entry = ctx.seed_open_day(doctor_id, june(12)).await;

    let booked = ctx.service
        .book(book_request(doctor_id, Uuid::new_v4(), entry.id, SlotNumber::First))
        .await
        .unwrap();

    ctx.service
        .reschedule(booked.id, SlotSelection::new(entry.id, SlotNumber::Second).into())
        .await
        .unwrap();

    let after = ctx.schedule(entry.id).await.unwrap();
    assert_eq!(after.slot_1, SlotState::Available);
    assert_eq!(after.slot_2, SlotState::Taken);
}

#[tokio::test]
async fn test_reschedule_to_the_current_slot_is_a_no_op() {
    let ctx = TestContext::new(june(10));
    let doctor_id = Uuid::new_v4();
    let entry = ctx.seed_open_day(doctor_id, june(12)).await;
    let booked = ctx.service
        .book(book_request(doctor_id, Uuid::new_v4(), entry.id, SlotNumber::First))
        .await
        .unwrap();

    let same = ctx.service
        .reschedule(booked.id, SlotSelection::new(entry.id, SlotNumber::First).into())
        .await
        .unwrap();

    assert_eq!(same, booked);
    assert_eq!(ctx.schedule(entry.id).await.unwrap().slot_1, SlotState::Taken);
}

#[tokio::test]
async fn test_reschedule_of_cancelled_appointment_is_invalid_and_mutates_nothing() {
    let ctx = TestContext::new(june(10));
    let doctor_id = Uuid::new_v4();
    let entry = ctx.seed_open_day(doctor_id, june(12)).await;
    let mut cancelled = Appointment::booked(doctor_id, Uuid::new_v4(), "In-Person", june(11), SlotNumber::First);
    cancelled.status = AppointmentStatus::Cancelled;
    let cancelled = ctx.seed_appointment(cancelled).await;

    let result = ctx.service
        .reschedule(cancelled.id, SlotSelection::new(entry.id, SlotNumber::First).into())
        .await;

    assert_matches!(result, Err(SchedulingError::InvalidState(AppointmentStatus::Cancelled)));
    assert_eq!(ctx.schedule(entry.id).await.unwrap(), entry);
    assert_eq!(ctx.appointment(cancelled.id).await.unwrap(), cancelled);
}

#[tokio::test]
async fn test_reschedule_into_a_taken_slot_is_rejected() {
    let ctx = TestContext::new(june(10));
    let doctor_id = Uuid::new_v4();
    let monday = ctx.seed_open_day(doctor_id, june(10)).await;
    let tuesday = ctx.seed_open_day(doctor_id, june(11)).await;

    let mine = ctx.service
        .book(book_request(doctor_id, Uuid::new_v4(), monday.id, SlotNumber::First))
        .await
        .unwrap();
    ctx.service
        .book(book_request(doctor_id, Uuid::new_v4(), tuesday.id, SlotNumber::First))
        .await
        .unwrap();

    let result = ctx.service
        .reschedule(mine.id, SlotSelection::new(tuesday.id, SlotNumber::First).into())
        .await;

    assert_matches!(result, Err(SchedulingError::SlotUnavailable));
    assert_eq!(ctx.appointment(mine.id).await.unwrap(), mine);
    assert_eq!(ctx.schedule(monday.id).await.unwrap().slot_1, SlotState::Taken);
}

#[tokio::test]
async fn test_reschedule_without_a_selection_is_a_validation_error() {
    let ctx = TestContext::new(june(10));
    let doctor_id = Uuid::new_v4();
    let entry = ctx.seed_open_day(doctor_id, june(10)).await;
    let booked = ctx.service
        .book(book_request(doctor_id, Uuid::new_v4(), entry.id, SlotNumber::First))
        .await
        .unwrap();

    let result = ctx.service
        .reschedule(booked.id, RescheduleAppointmentRequest::default())
        .await;

    assert_matches!(result, Err(SchedulingError::ValidationError(_)));
}

#[tokio::test]
async fn test_reschedule_after_original_day_was_swept_loses_the_old_slot() {
    let ctx = TestContext::new(june(10));
    let doctor_id = Uuid::new_v4();
    let later = ctx.seed_open_day(doctor_id, june(14)).await;
    // Booked on a day that is no longer on the schedule.
    let booked = ctx.seed_appointment(
        Appointment::booked(doctor_id, Uuid::new_v4(), "In-Person", june(9), SlotNumber::Second),
    ).await;

    let moved = ctx.service
        .reschedule(booked.id, SlotSelection::new(later.id, SlotNumber::First).into())
        .await
        .unwrap();

    assert_eq!(moved.date, june(14));
    assert_eq!(ctx.doctor_schedule(doctor_id).await.len(), 1);
    assert_eq!(ctx.schedule(later.id).await.unwrap().slot_1, SlotState::Taken);
}

#[tokio::test]
async fn test_reschedule_to_another_doctors_day_is_not_found() {
    let ctx = TestContext::new(june(10));
    let doctor_id = Uuid::new_v4();
    let own = ctx.seed_open_day(doctor_id, june(10)).await;
    let foreign = ctx.seed_open_day(Uuid::new_v4(), june(11)).await;
    let booked = ctx.service
        .book(book_request(doctor_id, Uuid::new_v4(), own.id, SlotNumber::First))
        .await
        .unwrap();

    let result = ctx.service
        .reschedule(booked.id, SlotSelection::new(foreign.id, SlotNumber::First).into())
        .await;

    assert_matches!(result, Err(SchedulingError::NotFound(_)));
}

#[tokio::test]
async fn test_cancel_releases_the_slot_and_repeating_it_is_a_no_op() {
    let ctx = TestContext::new(june(10));
    let doctor_id = Uuid::new_v4();
    let entry = ctx.seed_open_day(doctor_id, june(11)).await;
    let booked = ctx.service
        .book(book_request(doctor_id, Uuid::new_v4(), entry.id, SlotNumber::Second))
        .await
        .unwrap();

    ctx.service.cancel(booked.id).await.unwrap();

    assert_eq!(ctx.appointment(booked.id).await.unwrap().status, AppointmentStatus::Cancelled);
    assert_eq!(ctx.schedule(entry.id).await.unwrap().slot_2, SlotState::Available);

    ctx.service.cancel(booked.id).await.unwrap();
    assert_eq!(ctx.appointment(booked.id).await.unwrap().status, AppointmentStatus::Cancelled);

    let rebooked = ctx.service
        .book(book_request(doctor_id, Uuid::new_v4(), entry.id, SlotNumber::Second))
        .await;
    assert!(rebooked.is_ok());
}

#[tokio::test]
async fn test_cancel_can_keep_the_slot_taken() {
    let rules = SchedulingRules {
        release_slot_on_cancel: false,
        ..SchedulingRules::default()
    };
    let ctx = TestContext::with_rules(june(10), rules);
    let doctor_id = Uuid::new_v4();
    let entry = ctx.seed_open_day(doctor_id, june(11)).await;
    let booked = ctx.service
        .book(book_request(doctor_id, Uuid::new_v4(), entry.id, SlotNumber::First))
        .await
        .unwrap();

    ctx.service.cancel(booked.id).await.unwrap();

    assert_eq!(ctx.appointment(booked.id).await.unwrap().status, AppointmentStatus::Cancelled);
    assert_eq!(ctx.schedule(entry.id).await.unwrap().slot_1, SlotState::Taken);
}

#[tokio::test]
async fn test_cancel_rejects_resolved_and_unknown_appointments() {
    let ctx = TestContext::new(june(10));
    let mut missed = Appointment::booked(Uuid::new_v4(), Uuid::new_v4(), "In-Person", june(8), SlotNumber::First);
    missed.status = AppointmentStatus::Missed;
    let missed = ctx.seed_appointment(missed).await;

    assert_matches!(
        ctx.service.cancel(missed.id).await,
        Err(SchedulingError::InvalidState(AppointmentStatus::Missed))
    );
    assert_matches!(ctx.service.cancel(Uuid::new_v4()).await, Err(SchedulingError::NotFound(_)));
}

#[tokio::test]
async fn test_cancel_doctor_bookings_cancels_only_open_bookings() {
    let ctx = TestContext::new(june(10));
    let doctor_id = Uuid::new_v4();
    let first = ctx.seed_open_day(doctor_id, june(10)).await;
    let second = ctx.seed_open_day(doctor_id, june(11)).await;

    let a = ctx.service
        .book(book_request(doctor_id, Uuid::new_v4(), first.id, SlotNumber::First))
        .await
        .unwrap();
    let b = ctx.service
        .book(book_request(doctor_id, Uuid::new_v4(), second.id, SlotNumber::Second))
        .await
        .unwrap();
    let mut done = Appointment::booked(doctor_id, Uuid::new_v4(), "In-Person", june(9), SlotNumber::First);
    done.status = AppointmentStatus::Completed;
    let done = ctx.seed_appointment(done).await;

    let cancelled = ctx.service.cancel_doctor_bookings(doctor_id).await.unwrap();

    assert_eq!(cancelled, 2);
    assert_eq!(ctx.appointment(a.id).await.unwrap().status, AppointmentStatus::Cancelled);
    assert_eq!(ctx.appointment(b.id).await.unwrap().status, AppointmentStatus::Cancelled);
    assert_eq!(ctx.appointment(done.id).await.unwrap().status, AppointmentStatus::Completed);
    assert_eq!(ctx.schedule(first.id).await.unwrap().slot_1, SlotState::Taken);
}

#[tokio::test]
async fn test_booking_from_a_form_selection() {
    let ctx = TestContext::new(june(10));
    let doctor_id = Uuid::new_v4();
    let patient_id = Uuid::new_v4();
    let entry = ctx.seed_open_day(doctor_id, june(13)).await;

    let selection: SlotSelection = format!("{}_2", entry.id).parse().unwrap();
    let request = BookAppointmentRequest::from_selection(doctor_id, patient_id, selection, "Follow-up");
    let appointment = ctx.service.book(request).await.unwrap();

    assert_eq!(appointment.slot, SlotNumber::Second);
    assert_eq!(appointment.visit_type, "Follow-up");

    let mine = ctx.service
        .patient_appointments(patient_id, Some(AppointmentStatus::Booked), None)
        .await
        .unwrap();
    assert_eq!(mine, vec![appointment]);
}
