pub mod adapter;
pub mod blob;
pub mod codec;
pub mod conversation;
pub mod session;
pub mod store;

pub use adapter::{MessageStoreAdapter, Subscription};
pub use blob::{BlobStorage, InMemoryBlobStorage, ProgressCallback, SupabaseBlobStorage};
pub use codec::{TextCodec, UNDECRYPTABLE_PLACEHOLDER};
pub use conversation::conversation_key;
pub use session::{ChatSession, ChatSessionController, Conversation, FileUpload};
pub use store::{InMemoryMessageStore, MessageStore, SupabaseMessageStore};
