// libs/appointment-cell/src/handlers.rs
use axum::{
    extract::{Extension, Path, State},
    http::StatusCode,
    Json,
};
use serde_json::{json, Value};
use uuid::Uuid;

use shared_models::auth::User;
use shared_models::error::AppError;

use crate::models::{Appointment, BookAppointmentRequest, OpenPaymentRequest, PaymentRecord, RatingEligibility};
use crate::router::AppointmentState;

// ==============================================================================
// BOOKING & LIFECYCLE
// ==============================================================================

#[axum::debug_handler]
pub async fn book_appointment(
    State(state): State<AppointmentState>,
    Extension(user): Extension<User>,
    Json(request): Json<BookAppointmentRequest>,
) -> Result<(StatusCode, Json<Appointment>), AppError> {
    let appointment = state.booking.book_appointment(&user, request).await?;
    Ok((StatusCode::CREATED, Json(appointment)))
}

#[axum::debug_handler]
pub async fn list_appointments(
    State(state): State<AppointmentState>,
    Extension(user): Extension<User>,
) -> Result<Json<Value>, AppError> {
    let appointments = state.booking.list_appointments(&user).await?;

    Ok(Json(json!({
        "appointments": appointments,
        "total": appointments.len()
    })))
}

#[axum::debug_handler]
pub async fn get_appointment(
    State(state): State<AppointmentState>,
    Extension(user): Extension<User>,
    Path(appointment_id): Path<Uuid>,
) -> Result<Json<Appointment>, AppError> {
    Ok(Json(state.booking.get_appointment(&user, appointment_id).await?))
}

#[axum::debug_handler]
pub async fn approve_appointment(
    State(state): State<AppointmentState>,
    Extension(user): Extension<User>,
    Path(appointment_id): Path<Uuid>,
) -> Result<Json<Appointment>, AppError> {
    Ok(Json(state.booking.approve_appointment(&user, appointment_id).await?))
}

#[axum::debug_handler]
pub async fn decline_appointment(
    State(state): State<AppointmentState>,
    Extension(user): Extension<User>,
    Path(appointment_id): Path<Uuid>,
) -> Result<Json<Appointment>, AppError> {
    Ok(Json(state.booking.decline_appointment(&user, appointment_id).await?))
}

#[axum::debug_handler]
pub async fn finish_appointment(
    State(state): State<AppointmentState>,
    Extension(user): Extension<User>,
    Path(appointment_id): Path<Uuid>,
) -> Result<Json<Appointment>, AppError> {
    Ok(Json(state.booking.finish_appointment(&user, appointment_id).await?))
}

#[axum::debug_handler]
pub async fn get_rating_eligibility(
    State(state): State<AppointmentState>,
    Extension(user): Extension<User>,
    Path(appointment_id): Path<Uuid>,
) -> Result<Json<RatingEligibility>, AppError> {
    let eligible = state.booking.can_rate(&user, appointment_id).await?;
    Ok(Json(RatingEligibility { appointment_id, eligible }))
}

// ==============================================================================
// PAYMENTS
// ==============================================================================

#[axum::debug_handler]
pub async fn get_payment(
    State(state): State<AppointmentState>,
    Extension(user): Extension<User>,
    Path(appointment_id): Path<Uuid>,
) -> Result<Json<PaymentRecord>, AppError> {
    state.payments.payment_for(&user, appointment_id).await?
        .map(Json)
        .ok_or_else(|| AppError::NotFound("No payment for this appointment".to_string()))
}

#[axum::debug_handler]
pub async fn open_payment(
    State(state): State<AppointmentState>,
    Extension(user): Extension<User>,
    Path(appointment_id): Path<Uuid>,
    Json(request): Json<OpenPaymentRequest>,
) -> Result<Json<PaymentRecord>, AppError> {
    Ok(Json(state.payments.open_payment(&user, appointment_id, request.amount).await?))
}

#[axum::debug_handler]
pub async fn confirm_payment(
    State(state): State<AppointmentState>,
    Extension(user): Extension<User>,
    Path(appointment_id): Path<Uuid>,
) -> Result<Json<PaymentRecord>, AppError> {
    Ok(Json(state.payments.confirm_payment(&user, appointment_id).await?))
}
