// libs/messaging-cell/src/services/session.rs
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use appointment_cell::services::AppointmentBookingService;
use shared_config::AppConfig;
use shared_database::with_write_timeout;

use crate::models::{
    ChatMessage, MessageContent, MessageRecord, MessageScope, MessagingError, NewMessage,
};
use crate::services::adapter::{MessageStoreAdapter, Subscription};
use crate::services::blob::{BlobStorage, ProgressCallback};
use crate::services::codec::TextCodec;
use crate::services::conversation::{conversation_key, is_valid_participant, participants};

/// A resolved thread as seen by one participant.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Conversation {
    pub self_id: String,
    pub counterparty: String,
    pub scope: MessageScope,
}

/// An attachment to send.
#[derive(Debug, Clone)]
pub struct FileUpload {
    pub bytes: Vec<u8>,
    pub file_name: String,
    pub content_type: String,
}

impl FileUpload {
    pub fn is_image(&self) -> bool {
        self.content_type.starts_with("image/")
    }
}

/// Resolves conversations and moves messages between callers and the store,
/// encrypting on the way in and decrypting on the way out.
#[derive(Clone)]
pub struct ChatSessionController {
    adapter: MessageStoreAdapter,
    codec: TextCodec,
    blobs: Arc<dyn BlobStorage>,
    appointments: AppointmentBookingService,
    write_timeout: Duration,
}

impl ChatSessionController {
    pub fn new(
        adapter: MessageStoreAdapter,
        codec: TextCodec,
        blobs: Arc<dyn BlobStorage>,
        appointments: AppointmentBookingService,
        config: &AppConfig,
    ) -> Self {
        Self {
            adapter,
            codec,
            blobs,
            appointments,
            write_timeout: config.store_write_timeout(),
        }
    }

    /// Works out who `self_id` is talking to. For an appointment thread
    /// `params_id` is the appointment id and the counterparty is its other
    /// side; otherwise `params_id` is the counterparty itself.
    pub async fn resolve(
        &self,
        self_id: &str,
        params_id: &str,
        is_appointment_scoped: bool,
    ) -> Result<Conversation, MessagingError> {
        let params_id = params_id.trim();
        if params_id.is_empty() {
            return Err(MessagingError::Validation("conversation id is required".to_string()));
        }
        if !is_valid_participant(self_id) {
            return Err(MessagingError::Validation(format!("invalid user id '{}'", self_id)));
        }

        let (counterparty, appointment_id) = if is_appointment_scoped {
            let appointment_id = Uuid::parse_str(params_id)
                .map_err(|_| MessagingError::Validation(format!("invalid appointment id '{}'", params_id)))?;
            let appointment = self.appointments.find_appointment(appointment_id).await?;

            let counterparty = appointment
                .counterparty(self_id)
                .ok_or(MessagingError::Unauthorized)?
                .to_string();
            (counterparty, Some(appointment_id))
        } else {
            (params_id.to_string(), None)
        };

        if counterparty == self_id {
            return Err(MessagingError::SelfMessage);
        }
        if !is_valid_participant(&counterparty) {
            return Err(MessagingError::Validation(format!("invalid user id '{}'", counterparty)));
        }

        Ok(Conversation {
            scope: MessageScope {
                participants_key: conversation_key(self_id, &counterparty),
                appointment_id,
            },
            self_id: self_id.to_string(),
            counterparty,
        })
    }

    /// Resolves the conversation and starts following it.
    pub async fn open(
        &self,
        self_id: &str,
        params_id: &str,
        is_appointment_scoped: bool,
    ) -> Result<ChatSession, MessagingError> {
        let conversation = self.resolve(self_id, params_id, is_appointment_scoped).await?;

        let (sender, messages) = watch::channel(Vec::new());
        let codec = self.codec.clone();
        let subscription = self
            .adapter
            .subscribe(conversation.scope.clone(), move |records| {
                let projected = records.iter().map(|record| project(&codec, record)).collect();
                sender.send_replace(projected);
            })
            .await?;

        info!("User {} opened chat with {}", conversation.self_id, conversation.counterparty);
        Ok(ChatSession {
            controller: self.clone(),
            conversation,
            messages,
            subscription: Some(subscription),
        })
    }

    /// Decrypted thread contents at this moment.
    pub async fn history(&self, conversation: &Conversation) -> Result<Vec<ChatMessage>, MessagingError> {
        let records = self.adapter.snapshot(&conversation.scope).await?;
        Ok(records.iter().map(|record| project(&self.codec, record)).collect())
    }

    pub async fn send_text(&self, conversation: &Conversation, text: &str) -> Result<ChatMessage, MessagingError> {
        if text.trim().is_empty() {
            return Err(MessagingError::Validation("message text is empty".to_string()));
        }

        let content = MessageContent::Text { text: text.to_string() };
        self.append(conversation, content).await
    }

    /// Uploads the attachment, then appends a message pointing at it. Nothing
    /// is appended unless the upload succeeded.
    pub async fn send_file(
        &self,
        conversation: &Conversation,
        upload: FileUpload,
        on_progress: ProgressCallback,
    ) -> Result<ChatMessage, MessagingError> {
        if upload.bytes.is_empty() {
            return Err(MessagingError::Validation("file is empty".to_string()));
        }
        let file_name = upload.file_name.trim().to_string();
        if file_name.is_empty() {
            return Err(MessagingError::Validation("file name is required".to_string()));
        }

        let path = format!(
            "{}/{}-{}",
            conversation.scope.participants_key,
            Uuid::new_v4(),
            storage_safe(&file_name)
        );
        let is_image = upload.is_image();

        let url = with_write_timeout(
            self.write_timeout,
            "attachment upload",
            self.blobs.upload(upload.bytes, &path, &upload.content_type, on_progress),
        )
        .await
        .map_err(|e| {
            error!("Upload of {} failed: {}", path, e);
            MessagingError::Upload(e.to_string())
        })?;
        debug!("Uploaded {} for {}", path, conversation.self_id);

        let content = if is_image {
            MessageContent::Image { image_url: url }
        } else {
            MessageContent::File { file_url: url, file_name }
        };
        self.append(conversation, content).await
    }

    async fn append(&self, conversation: &Conversation, content: MessageContent) -> Result<ChatMessage, MessagingError> {
        let sealed = content.try_map(|field| self.codec.encrypt(field))?;

        let record = self
            .adapter
            .append(NewMessage {
                sender_id: conversation.self_id.clone(),
                participants: participants(&conversation.self_id, &conversation.counterparty),
                participants_key: conversation.scope.participants_key.clone(),
                appointment_id: conversation.scope.appointment_id,
                content: sealed,
            })
            .await?;

        Ok(project(&self.codec, &record))
    }
}

/// Decrypts a stored record for display.
pub fn project(codec: &TextCodec, record: &MessageRecord) -> ChatMessage {
    let mut message = ChatMessage {
        id: record.id,
        kind: record.kind(),
        text: None,
        image_url: None,
        file_url: None,
        file_name: None,
        sender_id: record.sender_id.clone(),
        appointment_id: record.appointment_id,
        created_at: record.created_at,
    };

    let open = |field: &str| codec.decrypt_or_placeholder(record.id, field);
    match &record.content {
        MessageContent::Text { text } => message.text = Some(open(text)),
        MessageContent::Image { image_url } => message.image_url = Some(open(image_url)),
        MessageContent::File { file_url, file_name } => {
            message.file_url = Some(open(file_url));
            message.file_name = Some(open(file_name));
        }
    }

    message
}

fn storage_safe(file_name: &str) -> String {
    file_name
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() || matches!(c, '.' | '-' | '_') { c } else { '_' })
        .collect()
}

/// An open conversation. Messages keep arriving on [`messages`](Self::messages)
/// until the session is closed or dropped.
pub struct ChatSession {
    controller: ChatSessionController,
    conversation: Conversation,
    messages: watch::Receiver<Vec<ChatMessage>>,
    subscription: Option<Subscription>,
}

impl fmt::Debug for ChatSession {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ChatSession")
            .field("conversation", &self.conversation)
            .field("open", &self.is_open())
            .finish_non_exhaustive()
    }
}

impl ChatSession {
    pub fn conversation(&self) -> &Conversation {
        &self.conversation
    }

    /// Live view of the thread, replaced wholesale on every update.
    pub fn messages(&self) -> watch::Receiver<Vec<ChatMessage>> {
        self.messages.clone()
    }

    /// Waits for the next thread update not yet seen through this session.
    /// The first call yields the initial snapshot. `None` once closed.
    pub async fn next_update(&mut self) -> Option<Vec<ChatMessage>> {
        self.subscription.as_ref()?;
        self.messages.changed().await.ok()?;
        Some(self.messages.borrow_and_update().clone())
    }

    pub async fn send_text(&self, text: &str) -> Result<ChatMessage, MessagingError> {
        self.controller.send_text(&self.conversation, text).await
    }

    pub async fn send_file(&self, upload: FileUpload, on_progress: ProgressCallback) -> Result<ChatMessage, MessagingError> {
        self.controller.send_file(&self.conversation, upload, on_progress).await
    }

    pub fn is_open(&self) -> bool {
        self.subscription.as_ref().is_some_and(Subscription::is_active)
    }

    pub fn close(&mut self) {
        if let Some(subscription) = self.subscription.take() {
            subscription.unsubscribe();
            debug!("Closed chat {}", self.conversation.scope.participants_key);
        } else {
            warn!("Chat {} was already closed", self.conversation.scope.participants_key);
        }
    }
}
