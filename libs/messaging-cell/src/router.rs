// libs/messaging-cell/src/router.rs
use std::sync::Arc;

use axum::{
    extract::DefaultBodyLimit,
    middleware,
    routing::{get, post},
    Router,
};

use shared_config::AppConfig;
use shared_utils::extractor::auth_middleware;

use crate::handlers;
use crate::services::ChatSessionController;

const MAX_UPLOAD_BYTES: usize = 20 * 1024 * 1024;

pub fn chat_routes(config: Arc<AppConfig>, chat: ChatSessionController) -> Router {
    Router::new()
        // Direct threads, keyed by the other participant
        .route("/direct/{user_id}/messages", get(handlers::get_direct_messages).post(handlers::send_direct_message))
        .route("/direct/{user_id}/files", post(handlers::upload_direct_file))
        .route("/direct/{user_id}/stream", get(handlers::stream_direct))
        // Appointment threads, keyed by the appointment
        .route("/appointments/{appointment_id}/messages", get(handlers::get_appointment_messages).post(handlers::send_appointment_message))
        .route("/appointments/{appointment_id}/files", post(handlers::upload_appointment_file))
        .route("/appointments/{appointment_id}/stream", get(handlers::stream_appointment))
        .layer(DefaultBodyLimit::max(MAX_UPLOAD_BYTES))
        .layer(middleware::from_fn_with_state(config, auth_middleware))
        .with_state(chat)
}
