// libs/messaging-cell/src/models.rs
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

use appointment_cell::models::AppointmentError;
use shared_models::error::AppError;

// ==============================================================================
// STORED MESSAGES
// ==============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MessageKind {
    Text,
    Image,
    File,
}

impl fmt::Display for MessageKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MessageKind::Text => write!(f, "text"),
            MessageKind::Image => write!(f, "image"),
            MessageKind::File => write!(f, "file"),
        }
    }
}

/// Payload of a message, tagged by `type`. Each variant carries exactly the
/// fields its kind populates, so a row missing them never gets past the store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum MessageContent {
    Text { text: String },
    Image { image_url: String },
    File { file_url: String, file_name: String },
}

impl MessageContent {
    pub fn kind(&self) -> MessageKind {
        match self {
            MessageContent::Text { .. } => MessageKind::Text,
            MessageContent::Image { .. } => MessageKind::Image,
            MessageContent::File { .. } => MessageKind::File,
        }
    }

    /// Applies `f` to every free-text field.
    pub fn try_map<E>(&self, mut f: impl FnMut(&str) -> Result<String, E>) -> Result<Self, E> {
        Ok(match self {
            MessageContent::Text { text } => MessageContent::Text { text: f(text)? },
            MessageContent::Image { image_url } => MessageContent::Image { image_url: f(image_url)? },
            MessageContent::File { file_url, file_name } => MessageContent::File {
                file_url: f(file_url)?,
                file_name: f(file_name)?,
            },
        })
    }
}

/// A message as persisted. Payload fields hold ciphertext.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MessageRecord {
    pub id: Uuid,
    pub sender_id: String,
    pub participants: Vec<String>,
    pub participants_key: String,
    pub appointment_id: Option<Uuid>,
    pub created_at: DateTime<Utc>,
    #[serde(flatten)]
    pub content: MessageContent,
}

impl MessageRecord {
    pub fn kind(&self) -> MessageKind {
        self.content.kind()
    }
}

/// A message ready for the store; id and timestamp are assigned on insert.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NewMessage {
    pub sender_id: String,
    pub participants: Vec<String>,
    pub participants_key: String,
    pub appointment_id: Option<Uuid>,
    #[serde(flatten)]
    pub content: MessageContent,
}

impl NewMessage {
    pub fn into_record(self, id: Uuid, created_at: DateTime<Utc>) -> MessageRecord {
        MessageRecord {
            id,
            sender_id: self.sender_id,
            participants: self.participants,
            participants_key: self.participants_key,
            appointment_id: self.appointment_id,
            created_at,
            content: self.content,
        }
    }
}

/// One conversation thread: the participants' key plus the appointment it
/// belongs to, or `None` for the direct thread.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct MessageScope {
    pub participants_key: String,
    pub appointment_id: Option<Uuid>,
}

impl MessageScope {
    pub fn matches(&self, record: &MessageRecord) -> bool {
        record.participants_key == self.participants_key && record.appointment_id == self.appointment_id
    }
}

/// Total order within a thread.
pub fn sort_messages(records: &mut [MessageRecord]) {
    records.sort_by(|a, b| a.created_at.cmp(&b.created_at).then_with(|| a.id.cmp(&b.id)));
}

// ==============================================================================
// CLIENT-FACING MODELS
// ==============================================================================

/// Decrypted projection of a [`MessageRecord`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub id: Uuid,
    #[serde(rename = "type")]
    pub kind: MessageKind,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub image_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub file_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub file_name: Option<String>,
    pub sender_id: String,
    pub appointment_id: Option<Uuid>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SendTextRequest {
    pub text: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct UploadProgress {
    pub sent: u64,
    pub total: u64,
}

impl UploadProgress {
    pub fn fraction(&self) -> f64 {
        if self.total == 0 {
            1.0
        } else {
            self.sent as f64 / self.total as f64
        }
    }
}

// ==============================================================================
// ERROR TYPES
// ==============================================================================

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CodecError {
    #[error("MESSAGE_ENCRYPTION_SECRET is not configured")]
    MissingSecret,

    #[error("Encryption failed")]
    Encrypt,

    #[error("Ciphertext could not be decrypted")]
    Decrypt,
}

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum MessagingError {
    #[error("Validation error: {0}")]
    Validation(String),

    #[error("You cannot start a conversation with yourself")]
    SelfMessage,

    #[error("Conversation not found: {0}")]
    NotFound(String),

    #[error("Not a participant of this conversation")]
    Unauthorized,

    #[error("Store error: {0}")]
    Store(String),

    #[error("Upload failed: {0}")]
    Upload(String),

    #[error("Codec error: {0}")]
    Codec(#[from] CodecError),
}

impl From<AppointmentError> for MessagingError {
    fn from(err: AppointmentError) -> Self {
        match err {
            e @ AppointmentError::NotFound => MessagingError::NotFound(e.to_string()),
            AppointmentError::Unauthorized => MessagingError::Unauthorized,
            AppointmentError::Validation(msg) => MessagingError::Validation(msg),
            AppointmentError::Store(msg) => MessagingError::Store(msg),
            other => MessagingError::Store(other.to_string()),
        }
    }
}

impl From<MessagingError> for AppError {
    fn from(err: MessagingError) -> Self {
        match err {
            MessagingError::Validation(msg) => AppError::ValidationError(msg),
            e @ MessagingError::SelfMessage => AppError::BadRequest(e.to_string()),
            e @ MessagingError::NotFound(_) => AppError::NotFound(e.to_string()),
            e @ MessagingError::Unauthorized => AppError::Forbidden(e.to_string()),
            MessagingError::Store(msg) => AppError::Database(msg),
            MessagingError::Upload(msg) => AppError::ExternalService(msg),
            e @ MessagingError::Codec(_) => AppError::Internal(e.to_string()),
        }
    }
}
