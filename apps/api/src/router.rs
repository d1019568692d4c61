use std::sync::Arc;

use axum::{
    Router,
    routing::get,
};

use appointment_cell::router::appointment_routes;
use doctor_cell::router::doctor_routes;
use messaging_cell::router::chat_routes;
use shared_config::AppConfig;

use crate::services::AppServices;

pub fn create_router(config: Arc<AppConfig>, services: AppServices) -> Router {
    Router::new()
        .route("/", get(|| async { "Clinic API is running!" }))
        .nest("/doctors", doctor_routes(config.clone(), services.availability))
        .nest("/appointments", appointment_routes(config.clone(), services.appointments))
        .nest("/chat", chat_routes(config, services.chat))
}
