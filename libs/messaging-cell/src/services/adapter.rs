// libs/messaging-cell/src/services/adapter.rs
use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::broadcast::{self, error::RecvError};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use shared_config::AppConfig;
use shared_database::with_write_timeout;

use crate::models::{sort_messages, MessageRecord, MessageScope, MessagingError, NewMessage};
use crate::services::store::MessageStore;

const EVENT_CAPACITY: usize = 1024;

/// Write path and live read path over a [`MessageStore`].
///
/// Every successful append is fanned out to subscribers in this process.
#[derive(Clone)]
pub struct MessageStoreAdapter {
    store: Arc<dyn MessageStore>,
    events: broadcast::Sender<MessageRecord>,
    write_timeout: Duration,
}

impl MessageStoreAdapter {
    pub fn new(store: Arc<dyn MessageStore>, config: &AppConfig) -> Self {
        let (events, _) = broadcast::channel(EVENT_CAPACITY);

        Self {
            store,
            events,
            write_timeout: config.store_write_timeout(),
        }
    }

    /// Persists `message`. No retry; a failure or timeout is returned as
    /// [`MessagingError::Store`].
    pub async fn append(&self, message: NewMessage) -> Result<MessageRecord, MessagingError> {
        let record = with_write_timeout(self.write_timeout, "message append", self.store.insert(&message))
            .await
            .map_err(|e| {
                error!("Failed to append message to {}: {}", message.participants_key, e);
                MessagingError::Store(e.to_string())
            })?;

        debug!("Appended message {} to {}", record.id, record.participants_key);

        // Err only means nobody is listening.
        let _ = self.events.send(record.clone());
        Ok(record)
    }

    /// Current ordered contents of a thread.
    pub async fn snapshot(&self, scope: &MessageScope) -> Result<Vec<MessageRecord>, MessagingError> {
        self.store.list(scope).await.map_err(|e| {
            error!("Failed to load messages for {}: {}", scope.participants_key, e);
            MessagingError::Store(e.to_string())
        })
    }

    /// Calls `on_update` with the full ordered thread now, then again after
    /// every insert into `scope`, until the returned [`Subscription`] is
    /// dropped or unsubscribed. Calls never overlap.
    pub async fn subscribe<F>(&self, scope: MessageScope, on_update: F) -> Result<Subscription, MessagingError>
    where
        F: Fn(Vec<MessageRecord>) + Send + Sync + 'static,
    {
        // Listen before reading so nothing inserted in between is missed.
        let mut receiver = self.events.subscribe();
        let mut messages = self.snapshot(&scope).await?;
        let mut seen: HashSet<_> = messages.iter().map(|m| m.id).collect();

        on_update(messages.clone());

        let store = self.store.clone();
        let task_scope = scope.clone();
        let handle = tokio::spawn(async move {
            loop {
                match receiver.recv().await {
                    Ok(record) => {
                        if !task_scope.matches(&record) || !seen.insert(record.id) {
                            continue;
                        }
                        messages.push(record);
                        sort_messages(&mut messages);
                        on_update(messages.clone());
                    }
                    Err(RecvError::Lagged(skipped)) => {
                        warn!("Subscriber for {} lagged by {} messages, reloading",
                              task_scope.participants_key, skipped);
                        match store.list(&task_scope).await {
                            Ok(fresh) => {
                                seen = fresh.iter().map(|m| m.id).collect();
                                messages = fresh;
                                on_update(messages.clone());
                            }
                            Err(e) => error!("Reload for {} failed: {}", task_scope.participants_key, e),
                        }
                    }
                    Err(RecvError::Closed) => break,
                }
            }
        });

        info!("Subscribed to {} (appointment {:?})", scope.participants_key, scope.appointment_id);
        Ok(Subscription { scope, handle })
    }
}

/// Handle to a live subscription. Delivery stops when it is dropped.
pub struct Subscription {
    scope: MessageScope,
    handle: JoinHandle<()>,
}

impl Subscription {
    pub fn scope(&self) -> &MessageScope {
        &self.scope
    }

    pub fn is_active(&self) -> bool {
        !self.handle.is_finished()
    }

    pub fn unsubscribe(self) {
        drop(self);
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.handle.abort();
        debug!("Unsubscribed from {}", self.scope.participants_key);
    }
}
