pub mod handlers;
pub mod models;
pub mod router;
pub mod services;

pub use models::{ChatMessage, CodecError, MessageContent, MessageKind, MessageRecord, MessageScope, MessagingError};
pub use router::chat_routes;
pub use services::{ChatSession, ChatSessionController, MessageStoreAdapter, TextCodec};
