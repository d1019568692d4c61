// libs/messaging-cell/src/handlers.rs
use std::sync::Arc;

use axum::{
    body::Bytes,
    extract::{Extension, Path, State},
    http::{header::CONTENT_TYPE, HeaderMap, StatusCode},
    response::sse::{Event, KeepAlive, Sse},
    Json,
};
use futures::stream::{self, Stream};
use serde_json::{json, Value};
use tracing::debug;

use shared_models::auth::User;
use shared_models::error::AppError;

use crate::models::{ChatMessage, MessagingError, SendTextRequest, UploadProgress};
use crate::services::{ChatSessionController, FileUpload, ProgressCallback};

const FILE_NAME_HEADER: &str = "x-file-name";

// ==============================================================================
// DIRECT THREADS
// ==============================================================================

#[axum::debug_handler]
pub async fn get_direct_messages(
    State(chat): State<ChatSessionController>,
    Extension(user): Extension<User>,
    Path(user_id): Path<String>,
) -> Result<Json<Value>, AppError> {
    history(&chat, &user, &user_id, false).await
}

#[axum::debug_handler]
pub async fn send_direct_message(
    State(chat): State<ChatSessionController>,
    Extension(user): Extension<User>,
    Path(user_id): Path<String>,
    Json(request): Json<SendTextRequest>,
) -> Result<(StatusCode, Json<ChatMessage>), AppError> {
    send_text(&chat, &user, &user_id, false, &request.text).await
}

#[axum::debug_handler]
pub async fn upload_direct_file(
    State(chat): State<ChatSessionController>,
    Extension(user): Extension<User>,
    Path(user_id): Path<String>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<(StatusCode, Json<ChatMessage>), AppError> {
    send_file(&chat, &user, &user_id, false, &headers, body).await
}

pub async fn stream_direct(
    State(chat): State<ChatSessionController>,
    Extension(user): Extension<User>,
    Path(user_id): Path<String>,
) -> Result<Sse<impl Stream<Item = Result<Event, axum::Error>>>, AppError> {
    live(&chat, &user, &user_id, false).await
}

// ==============================================================================
// APPOINTMENT THREADS
// ==============================================================================

#[axum::debug_handler]
pub async fn get_appointment_messages(
    State(chat): State<ChatSessionController>,
    Extension(user): Extension<User>,
    Path(appointment_id): Path<String>,
) -> Result<Json<Value>, AppError> {
    history(&chat, &user, &appointment_id, true).await
}

#[axum::debug_handler]
pub async fn send_appointment_message(
    State(chat): State<ChatSessionController>,
    Extension(user): Extension<User>,
    Path(appointment_id): Path<String>,
    Json(request): Json<SendTextRequest>,
) -> Result<(StatusCode, Json<ChatMessage>), AppError> {
    send_text(&chat, &user, &appointment_id, true, &request.text).await
}

#[axum::debug_handler]
pub async fn upload_appointment_file(
    State(chat): State<ChatSessionController>,
    Extension(user): Extension<User>,
    Path(appointment_id): Path<String>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<(StatusCode, Json<ChatMessage>), AppError> {
    send_file(&chat, &user, &appointment_id, true, &headers, body).await
}

pub async fn stream_appointment(
    State(chat): State<ChatSessionController>,
    Extension(user): Extension<User>,
    Path(appointment_id): Path<String>,
) -> Result<Sse<impl Stream<Item = Result<Event, axum::Error>>>, AppError> {
    live(&chat, &user, &appointment_id, true).await
}

// ==============================================================================
// SHARED
// ==============================================================================

async fn history(
    chat: &ChatSessionController,
    user: &User,
    params_id: &str,
    scoped: bool,
) -> Result<Json<Value>, AppError> {
    let conversation = chat.resolve(&user.id, params_id, scoped).await?;
    let messages = chat.history(&conversation).await?;

    Ok(Json(json!({
        "participants_key": conversation.scope.participants_key,
        "appointment_id": conversation.scope.appointment_id,
        "counterparty": conversation.counterparty,
        "messages": messages,
    })))
}

async fn send_text(
    chat: &ChatSessionController,
    user: &User,
    params_id: &str,
    scoped: bool,
    text: &str,
) -> Result<(StatusCode, Json<ChatMessage>), AppError> {
    let conversation = chat.resolve(&user.id, params_id, scoped).await?;
    let message = chat.send_text(&conversation, text).await?;
    Ok((StatusCode::CREATED, Json(message)))
}

async fn send_file(
    chat: &ChatSessionController,
    user: &User,
    params_id: &str,
    scoped: bool,
    headers: &HeaderMap,
    body: Bytes,
) -> Result<(StatusCode, Json<ChatMessage>), AppError> {
    let file_name = headers
        .get(FILE_NAME_HEADER)
        .and_then(|value| value.to_str().ok())
        .map(|raw| urlencoding::decode(raw).map(|name| name.into_owned()).unwrap_or_else(|_| raw.to_string()))
        .ok_or_else(|| MessagingError::Validation(format!("{} header is required", FILE_NAME_HEADER)))?;
    let content_type = headers
        .get(CONTENT_TYPE)
        .and_then(|value| value.to_str().ok())
        .unwrap_or("application/octet-stream")
        .to_string();

    let conversation = chat.resolve(&user.id, params_id, scoped).await?;

    let label = file_name.clone();
    let on_progress: ProgressCallback = Arc::new(move |progress: UploadProgress| {
        debug!("Uploading {}: {}/{} bytes", label, progress.sent, progress.total);
    });

    let upload = FileUpload { bytes: body.to_vec(), file_name, content_type };
    let message = chat.send_file(&conversation, upload, on_progress).await?;
    Ok((StatusCode::CREATED, Json(message)))
}

/// One `snapshot` event per thread update, until the client goes away.
async fn live(
    chat: &ChatSessionController,
    user: &User,
    params_id: &str,
    scoped: bool,
) -> Result<Sse<impl Stream<Item = Result<Event, axum::Error>>>, AppError> {
    let session = chat.open(&user.id, params_id, scoped).await?;

    let updates = stream::unfold(session, |mut session| async move {
        let messages = session.next_update().await?;
        let event = Event::default().event("snapshot").json_data(&messages);
        Some((event, session))
    });

    Ok(Sse::new(updates).keep_alive(KeepAlive::default()))
}
