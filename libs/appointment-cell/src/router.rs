// libs/appointment-cell/src/router.rs
use std::sync::Arc;

use axum::{
    Router,
    routing::{get, post},
    middleware,
};

use shared_config::AppConfig;
use shared_utils::extractor::auth_middleware;

use crate::handlers;
use crate::services::{AppointmentBookingService, PaymentService};

#[derive(Clone)]
pub struct AppointmentState {
    pub booking: AppointmentBookingService,
    pub payments: PaymentService,
}

pub fn appointment_routes(config: Arc<AppConfig>, state: AppointmentState) -> Router {
    // All appointment operations require authentication
    Router::new()
        .route("/", post(handlers::book_appointment).get(handlers::list_appointments))
        .route("/{appointment_id}", get(handlers::get_appointment))
        .route("/{appointment_id}/approve", post(handlers::approve_appointment))
        .route("/{appointment_id}/decline", post(handlers::decline_appointment))
        .route("/{appointment_id}/finish", post(handlers::finish_appointment))
        .route("/{appointment_id}/rating-eligibility", get(handlers::get_rating_eligibility))
        .route("/{appointment_id}/payment", get(handlers::get_payment).post(handlers::open_payment))
        .route("/{appointment_id}/payment/confirm", post(handlers::confirm_payment))
        .layer(middleware::from_fn_with_state(config, auth_middleware))
        .with_state(state)
}
