use axum::{
    extract::{Extension, Path, State},
    Json,
};

use shared_models::auth::User;
use shared_models::error::AppError;

use crate::models::{DoctorSlotsResponse, SlotRequest};
use crate::services::AvailabilityService;

fn require_doctor(user: &User) -> Result<(), AppError> {
    if !user.is_doctor() {
        return Err(AppError::Forbidden("Only doctors can edit availability".to_string()));
    }
    Ok(())
}

#[axum::debug_handler]
pub async fn get_doctor_slots(
    State(service): State<AvailabilityService>,
    Path(doctor_id): Path<String>,
) -> Result<Json<DoctorSlotsResponse>, AppError> {
    let available_slots = service.get_slots(&doctor_id).await?;

    Ok(Json(DoctorSlotsResponse {
        doctor_id,
        available_slots,
    }))
}

#[axum::debug_handler]
pub async fn add_own_slot(
    State(service): State<AvailabilityService>,
    Extension(user): Extension<User>,
    Json(request): Json<SlotRequest>,
) -> Result<Json<DoctorSlotsResponse>, AppError> {
    require_doctor(&user)?;

    let available_slots = service.add_time(&user.id, &request.date, &request.time).await?;

    Ok(Json(DoctorSlotsResponse {
        doctor_id: user.id,
        available_slots,
    }))
}

#[axum::debug_handler]
pub async fn remove_own_slot(
    State(service): State<AvailabilityService>,
    Extension(user): Extension<User>,
    Json(request): Json<SlotRequest>,
) -> Result<Json<DoctorSlotsResponse>, AppError> {
    require_doctor(&user)?;

    let available_slots = service.remove_time(&user.id, &request.date, &request.time).await?;

    Ok(Json(DoctorSlotsResponse {
        doctor_id: user.id,
        available_slots,
    }))
}
