use std::sync::Arc;

use assert_matches::assert_matches;
use uuid::Uuid;

use appointment_cell::models::{AppointmentError, BookAppointmentRequest, PaymentStatus};
use appointment_cell::services::{
    AppointmentBookingService, InMemoryAppointmentStore, InMemoryPaymentStore, PaymentService,
};
use doctor_cell::models::{AvailableSlots, Slot};
use doctor_cell::services::{AvailabilityService, InMemoryCalendarStore};
use shared_utils::test_utils::{TestConfig, TestUser};

async fn setup() -> (AppointmentBookingService, PaymentService, TestUser, TestUser, Uuid) {
    let doctor = TestUser::doctor("doc@example.com");
    let patient = TestUser::patient("pat@example.com");
    let config = TestConfig::default().to_app_config();

    let calendars = Arc::new(InMemoryCalendarStore::new());
    calendars
        .insert_doctor(
            &doctor.id,
            AvailableSlots::new(vec![Slot { date: "2025-06-01".into(), time: vec!["09:00".into()] }]),
        )
        .await;

    let availability = AvailabilityService::new(calendars, &config);
    let booking = AppointmentBookingService::new(Arc::new(InMemoryAppointmentStore::new()), availability, &config);
    let payments = PaymentService::new(Arc::new(InMemoryPaymentStore::new()), booking.clone(), &config);

    let appointment = booking
        .book_appointment(
            &patient.to_user(),
            BookAppointmentRequest {
                doctor_id: doctor.id.clone(),
                date: "2025-06-01".into(),
                time: "09:00".into(),
            },
        )
        .await
        .unwrap();

    (booking, payments, doctor, patient, appointment.id)
}

#[tokio::test]
async fn payment_opens_only_after_finish() {
    let (booking, payments, doctor, patient, id) = setup().await;

    assert_matches!(
        payments.open_payment(&patient.to_user(), id, 40.0).await,
        Err(AppointmentError::PaymentNotEligible(_))
    );

    booking.approve_appointment(&doctor.to_user(), id).await.unwrap();
    booking.finish_appointment(&doctor.to_user(), id).await.unwrap();

    let record = payments.open_payment(&patient.to_user(), id, 40.0).await.unwrap();
    assert_eq!(record.status, PaymentStatus::Pending);
    assert_eq!(record.doctor_id, doctor.id);
    assert_eq!(record.amount, 40.0);
}

#[tokio::test]
async fn open_and_confirm_are_idempotent() {
    let (booking, payments, doctor, patient, id) = setup().await;
    booking.approve_appointment(&doctor.to_user(), id).await.unwrap();
    booking.finish_appointment(&doctor.to_user(), id).await.unwrap();

    let first = payments.open_payment(&patient.to_user(), id, 40.0).await.unwrap();
    let again = payments.open_payment(&patient.to_user(), id, 99.0).await.unwrap();
    assert_eq!(first, again);

    let paid = payments.confirm_payment(&patient.to_user(), id).await.unwrap();
    assert_eq!(paid.status, PaymentStatus::Paid);
    let paid_again = payments.confirm_payment(&patient.to_user(), id).await.unwrap();
    assert_eq!(paid_again.status, PaymentStatus::Paid);
}

#[tokio::test]
async fn doctor_cannot_confirm_payment() {
    let (booking, payments, doctor, patient, id) = setup().await;
    booking.approve_appointment(&doctor.to_user(), id).await.unwrap();
    booking.finish_appointment(&doctor.to_user(), id).await.unwrap();
    payments.open_payment(&patient.to_user(), id, 40.0).await.unwrap();

    assert_matches!(
        payments.confirm_payment(&doctor.to_user(), id).await,
        Err(AppointmentError::Unauthorized)
    );
    let record = payments.payment_for(&patient.to_user(), id).await.unwrap().unwrap();
    assert_eq!(record.status, PaymentStatus::Pending);
}

#[tokio::test]
async fn doctor_cannot_open_payment() {
    let (booking, payments, doctor, _patient, id) = setup().await;
    booking.approve_appointment(&doctor.to_user(), id).await.unwrap();
    booking.finish_appointment(&doctor.to_user(), id).await.unwrap();

    assert_matches!(
        payments.open_payment(&doctor.to_user(), id, 40.0).await,
        Err(AppointmentError::Unauthorized)
    );
}

#[tokio::test]
async fn amount_must_be_positive() {
    let (_booking, payments, _doctor, patient, id) = setup().await;

    assert_matches!(
        payments.open_payment(&patient.to_user(), id, 0.0).await,
        Err(AppointmentError::Validation(_))
    );
    assert_matches!(
        payments.open_payment(&patient.to_user(), id, f64::NAN).await,
        Err(AppointmentError::Validation(_))
    );
}

#[tokio::test]
async fn confirm_without_open_is_rejected() {
    let (_booking, payments, _doctor, patient, id) = setup().await;

    assert_matches!(
        payments.confirm_payment(&patient.to_user(), id).await,
        Err(AppointmentError::PaymentNotEligible(_))
    );
    assert_eq!(payments.payment_for(&patient.to_user(), id).await.unwrap(), None);
}
