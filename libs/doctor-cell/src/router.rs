use std::sync::Arc;

use axum::{
    Router,
    routing::{get, post},
    middleware,
};

use shared_config::AppConfig;
use shared_utils::extractor::auth_middleware;

use crate::handlers;
use crate::services::AvailabilityService;

pub fn doctor_routes(config: Arc<AppConfig>, availability: AvailabilityService) -> Router {
    Router::new()
        .route("/me/slots", post(handlers::add_own_slot).delete(handlers::remove_own_slot))
        .route("/{doctor_id}/slots", get(handlers::get_doctor_slots))
        .layer(middleware::from_fn_with_state(config, auth_middleware))
        .with_state(availability)
}
