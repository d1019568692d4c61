use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use anyhow::anyhow;
use assert_matches::assert_matches;
use async_trait::async_trait;

use appointment_cell::models::{AppointmentError, AppointmentStatus, BookAppointmentRequest};
use appointment_cell::services::{AppointmentBookingService, AppointmentStore, InMemoryAppointmentStore};
use doctor_cell::models::{AvailableSlots, Slot};
use doctor_cell::services::{AvailabilityService, CalendarStore, InMemoryCalendarStore};
use shared_utils::test_utils::{TestConfig, TestUser};

struct Harness {
    booking: AppointmentBookingService,
    calendars: Arc<InMemoryCalendarStore>,
    appointments: Arc<InMemoryAppointmentStore>,
    doctor: TestUser,
    patient: TestUser,
}

fn times(slots: &AvailableSlots, date: &str) -> Vec<String> {
    slots.day(date).map(|slot| slot.time.clone()).unwrap_or_default()
}

async fn harness() -> Harness {
    let doctor = TestUser::doctor("doc@example.com");
    let patient = TestUser::patient("pat@example.com");

    let calendars = Arc::new(InMemoryCalendarStore::new());
    calendars
        .insert_doctor(
            &doctor.id,
            AvailableSlots::new(vec![Slot {
                date: "2025-06-01".to_string(),
                time: vec!["09:00".to_string(), "10:00".to_string()],
            }]),
        )
        .await;

    let config = TestConfig::default().to_app_config();
    let appointments = Arc::new(InMemoryAppointmentStore::new());
    let availability = AvailabilityService::new(calendars.clone(), &config);
    let booking = AppointmentBookingService::new(appointments.clone(), availability, &config);

    Harness { booking, calendars, appointments, doctor, patient }
}

fn request(doctor: &TestUser, time: &str) -> BookAppointmentRequest {
    BookAppointmentRequest {
        doctor_id: doctor.id.clone(),
        date: "2025-06-01".to_string(),
        time: time.to_string(),
    }
}

#[tokio::test]
async fn booking_claims_the_slot() {
    let h = harness().await;

    let appointment = h.booking
        .book_appointment(&h.patient.to_user(), request(&h.doctor, "09:00"))
        .await
        .unwrap();

    assert_eq!(appointment.status, AppointmentStatus::Pending);
    assert_eq!(appointment.slot_date(), "2025-06-01");
    assert_eq!(appointment.slot_time(), "09:00");
    assert_eq!(appointment.patient_id, h.patient.id);

    let slots = h.calendars.load(&h.doctor.id).await.unwrap().unwrap();
    assert_eq!(times(&slots, "2025-06-01"), vec!["10:00"]);
    assert_eq!(h.appointments.len().await, 1);
}

#[tokio::test]
async fn approve_keeps_slot_claimed() {
    let h = harness().await;
    let booked = h.booking
        .book_appointment(&h.patient.to_user(), request(&h.doctor, "09:00"))
        .await
        .unwrap();

    let approved = h.booking.approve_appointment(&h.doctor.to_user(), booked.id).await.unwrap();

    assert_eq!(approved.status, AppointmentStatus::Approved);
    let slots = h.calendars.load(&h.doctor.id).await.unwrap().unwrap();
    assert_eq!(times(&slots, "2025-06-01"), vec!["10:00"]);
}

#[tokio::test]
async fn decline_restores_slot() {
    let h = harness().await;
    let booked = h.booking
        .book_appointment(&h.patient.to_user(), request(&h.doctor, "09:00"))
        .await
        .unwrap();

    let declined = h.booking.decline_appointment(&h.doctor.to_user(), booked.id).await.unwrap();

    assert_eq!(declined.status, AppointmentStatus::Declined);
    let slots = h.calendars.load(&h.doctor.id).await.unwrap().unwrap();
    assert_eq!(times(&slots, "2025-06-01"), vec!["09:00", "10:00"]);
}

#[tokio::test]
async fn second_booking_of_same_slot_is_rejected() {
    let h = harness().await;
    let other_patient = TestUser::patient("other@example.com");

    // Both patients loaded the calendar while 09:00 was still offered.
    h.booking
        .book_appointment(&h.patient.to_user(), request(&h.doctor, "09:00"))
        .await
        .unwrap();

    let result = h.booking
        .book_appointment(&other_patient.to_user(), request(&h.doctor, "09:00"))
        .await;

    assert_matches!(result, Err(AppointmentError::SlotUnavailable { ref time, .. }) if time == "09:00");
    assert_eq!(h.appointments.len().await, 1);
}

#[tokio::test]
async fn doctor_cannot_book_themselves() {
    let h = harness().await;

    let result = h.booking
        .book_appointment(&h.doctor.to_user(), request(&h.doctor, "09:00"))
        .await;

    assert_matches!(result, Err(AppointmentError::SelfBooking));
    assert!(h.appointments.is_empty().await);
    let slots = h.calendars.load(&h.doctor.id).await.unwrap().unwrap();
    assert_eq!(times(&slots, "2025-06-01"), vec!["09:00", "10:00"]);
}

#[tokio::test]
async fn unknown_doctor_is_not_found() {
    let h = harness().await;
    let stranger = TestUser::doctor("ghost@example.com");

    let result = h.booking
        .book_appointment(&h.patient.to_user(), request(&stranger, "09:00"))
        .await;

    assert_matches!(result, Err(AppointmentError::DoctorNotFound(_)));
}

#[tokio::test]
async fn malformed_slot_is_a_validation_error() {
    let h = harness().await;

    let result = h.booking
        .book_appointment(&h.patient.to_user(), request(&h.doctor, "9am"))
        .await;

    assert_matches!(result, Err(AppointmentError::Validation(_)));
}

#[tokio::test]
async fn only_the_doctor_moves_status() {
    let h = harness().await;
    let booked = h.booking
        .book_appointment(&h.patient.to_user(), request(&h.doctor, "09:00"))
        .await
        .unwrap();

    assert_matches!(
        h.booking.approve_appointment(&h.patient.to_user(), booked.id).await,
        Err(AppointmentError::Unauthorized)
    );
}

#[tokio::test]
async fn finished_requires_approval_first() {
    let h = harness().await;
    let doctor = h.doctor.to_user();
    let booked = h.booking
        .book_appointment(&h.patient.to_user(), request(&h.doctor, "09:00"))
        .await
        .unwrap();

    assert_matches!(
        h.booking.finish_appointment(&doctor, booked.id).await,
        Err(AppointmentError::InvalidStatusTransition {
            from: AppointmentStatus::Pending,
            to: AppointmentStatus::Finished
        })
    );

    h.booking.approve_appointment(&doctor, booked.id).await.unwrap();
    let finished = h.booking.finish_appointment(&doctor, booked.id).await.unwrap();
    assert_eq!(finished.status, AppointmentStatus::Finished);

    assert!(h.booking.can_rate(&h.patient.to_user(), booked.id).await.unwrap());
    assert!(!h.booking.can_rate(&doctor, booked.id).await.unwrap());
}

#[tokio::test]
async fn concurrent_status_change_is_reported() {
    let h = harness().await;
    let booked = h.booking
        .book_appointment(&h.patient.to_user(), request(&h.doctor, "09:00"))
        .await
        .unwrap();

    // Another session approved it after our read.
    h.appointments
        .transition(booked.id, AppointmentStatus::Pending, AppointmentStatus::Approved)
        .await
        .unwrap();

    assert_matches!(
        h.booking.decline_appointment(&h.doctor.to_user(), booked.id).await,
        Err(AppointmentError::InvalidStatusTransition { from: AppointmentStatus::Approved, .. })
    );
}

#[tokio::test]
async fn outsiders_cannot_read_appointments() {
    let h = harness().await;
    let booked = h.booking
        .book_appointment(&h.patient.to_user(), request(&h.doctor, "09:00"))
        .await
        .unwrap();
    let outsider = TestUser::patient("nosy@example.com");

    assert_matches!(
        h.booking.get_appointment(&outsider.to_user(), booked.id).await,
        Err(AppointmentError::Unauthorized)
    );
    assert_eq!(h.booking.list_appointments(&h.doctor.to_user()).await.unwrap().len(), 1);
    assert!(h.booking.list_appointments(&outsider.to_user()).await.unwrap().is_empty());
}

/// Reads succeed, writes fail.
struct ReadOnlyCalendar {
    inner: Arc<InMemoryCalendarStore>,
}

#[async_trait]
impl CalendarStore for ReadOnlyCalendar {
    async fn load(&self, doctor_id: &str) -> anyhow::Result<Option<AvailableSlots>> {
        self.inner.load(doctor_id).await
    }

    async fn save(&self, _doctor_id: &str, _slots: &AvailableSlots) -> anyhow::Result<()> {
        Err(anyhow!("calendar store is read-only"))
    }
}

#[tokio::test]
async fn failed_calendar_write_rolls_back_appointment() {
    let h = harness().await;
    let config = TestConfig::default().to_app_config();
    let availability = AvailabilityService::new(
        Arc::new(ReadOnlyCalendar { inner: h.calendars.clone() }),
        &config,
    );
    let booking = AppointmentBookingService::new(h.appointments.clone(), availability, &config);

    let result = booking
        .book_appointment(&h.patient.to_user(), request(&h.doctor, "09:00"))
        .await;

    assert_matches!(result, Err(AppointmentError::Store(_)));
    assert!(h.appointments.is_empty().await);
    let slots = h.calendars.load(&h.doctor.id).await.unwrap().unwrap();
    assert_eq!(times(&slots, "2025-06-01"), vec!["09:00", "10:00"]);
}

#[tokio::test]
async fn slot_withdrawn_by_doctor_cannot_be_booked() {
    let h = harness().await;
    let availability = AvailabilityService::new(h.calendars.clone(), &TestConfig::default().to_app_config());

    // The patient still sees 09:00 in a calendar loaded earlier.
    availability.remove_time(&h.doctor.id, "2025-06-01", "09:00").await.unwrap();

    let result = h.booking
        .book_appointment(&h.patient.to_user(), request(&h.doctor, "09:00"))
        .await;

    assert_matches!(result, Err(AppointmentError::SlotUnavailable { ref time, .. }) if time == "09:00");
    assert_eq!(h.appointments.len().await, 0);
}

/// Commits the write, then never answers.
struct StallingCalendar {
    inner: Arc<InMemoryCalendarStore>,
}

#[async_trait]
impl CalendarStore for StallingCalendar {
    async fn load(&self, doctor_id: &str) -> anyhow::Result<Option<AvailableSlots>> {
        self.inner.load(doctor_id).await
    }

    async fn save(&self, doctor_id: &str, slots: &AvailableSlots) -> anyhow::Result<()> {
        self.inner.save(doctor_id, slots).await?;
        tokio::time::sleep(Duration::from_secs(60)).await;
        Ok(())
    }
}

#[tokio::test(start_paused = true)]
async fn calendar_write_that_lands_after_timeout_keeps_appointment() {
    let h = harness().await;
    let config = TestConfig::default().to_app_config();
    let availability = AvailabilityService::new(
        Arc::new(StallingCalendar { inner: h.calendars.clone() }),
        &config,
    );
    let booking = AppointmentBookingService::new(h.appointments.clone(), availability, &config);

    let appointment = booking
        .book_appointment(&h.patient.to_user(), request(&h.doctor, "09:00"))
        .await
        .unwrap();

    assert_eq!(appointment.status, AppointmentStatus::Pending);
    assert_eq!(h.appointments.len().await, 1);
    let slots = h.calendars.load(&h.doctor.id).await.unwrap().unwrap();
    assert_eq!(times(&slots, "2025-06-01"), vec!["10:00"]);
}

/// Saves fail while `failing` is set.
struct FlakyCalendar {
    inner: Arc<InMemoryCalendarStore>,
    failing: AtomicBool,
}

#[async_trait]
impl CalendarStore for FlakyCalendar {
    async fn load(&self, doctor_id: &str) -> anyhow::Result<Option<AvailableSlots>> {
        self.inner.load(doctor_id).await
    }

    async fn save(&self, doctor_id: &str, slots: &AvailableSlots) -> anyhow::Result<()> {
        if self.failing.load(Ordering::SeqCst) {
            return Err(anyhow!("calendar store unavailable"));
        }
        self.inner.save(doctor_id, slots).await
    }
}

#[tokio::test]
async fn failed_release_is_reported_and_decline_can_be_retried() {
    let h = harness().await;
    let config = TestConfig::default().to_app_config();
    let calendar = Arc::new(FlakyCalendar { inner: h.calendars.clone(), failing: AtomicBool::new(false) });
    let booking = AppointmentBookingService::new(
        h.appointments.clone(),
        AvailabilityService::new(calendar.clone(), &config),
        &config,
    );
    let doctor = h.doctor.to_user();

    let booked = booking
        .book_appointment(&h.patient.to_user(), request(&h.doctor, "09:00"))
        .await
        .unwrap();

    calendar.failing.store(true, Ordering::SeqCst);
    assert_matches!(
        booking.decline_appointment(&doctor, booked.id).await,
        Err(AppointmentError::Store(_))
    );
    let stored = h.appointments.get(booked.id).await.unwrap().unwrap();
    assert_eq!(stored.status, AppointmentStatus::Declined);
    let slots = h.calendars.load(&h.doctor.id).await.unwrap().unwrap();
    assert_eq!(times(&slots, "2025-06-01"), vec!["10:00"]);

    calendar.failing.store(false, Ordering::SeqCst);
    let declined = booking.decline_appointment(&doctor, booked.id).await.unwrap();
    assert_eq!(declined.status, AppointmentStatus::Declined);
    let slots = h.calendars.load(&h.doctor.id).await.unwrap().unwrap();
    assert_eq!(times(&slots, "2025-06-01"), vec!["09:00", "10:00"]);
}

#[tokio::test]
async fn repeated_decline_leaves_rebooked_slot_claimed() {
    let h = harness().await;
    let doctor = h.doctor.to_user();
    let first = h.booking
        .book_appointment(&h.patient.to_user(), request(&h.doctor, "09:00"))
        .await
        .unwrap();
    h.booking.decline_appointment(&doctor, first.id).await.unwrap();

    let other_patient = TestUser::patient("other@example.com");
    h.booking
        .book_appointment(&other_patient.to_user(), request(&h.doctor, "09:00"))
        .await
        .unwrap();

    h.booking.decline_appointment(&doctor, first.id).await.unwrap();

    let slots = h.calendars.load(&h.doctor.id).await.unwrap().unwrap();
    assert_eq!(times(&slots, "2025-06-01"), vec!["10:00"]);
}

#[tokio::test]
async fn patient_cannot_redecline() {
    let h = harness().await;
    let booked = h.booking
        .book_appointment(&h.patient.to_user(), request(&h.doctor, "09:00"))
        .await
        .unwrap();
    h.booking.decline_appointment(&h.doctor.to_user(), booked.id).await.unwrap();

    assert_matches!(
        h.booking.decline_appointment(&h.patient.to_user(), booked.id).await,
        Err(AppointmentError::Unauthorized)
    );
}
