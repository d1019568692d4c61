// libs/messaging-cell/src/services/store.rs
use anyhow::{anyhow, Result};
use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use reqwest::Method;
use serde_json::{json, Value};
use tokio::sync::Mutex;
use tracing::{debug, warn};
use uuid::Uuid;

use shared_config::AppConfig;
use shared_database::supabase::SupabaseClient;

use crate::models::{sort_messages, MessageRecord, MessageScope, NewMessage};

/// Append-only message persistence. Records are never updated or removed.
#[async_trait]
pub trait MessageStore: Send + Sync {
    /// Persists a message; the store assigns `id` and `created_at`.
    async fn insert(&self, message: &NewMessage) -> Result<MessageRecord>;

    /// Every message in `scope`, ordered by `(created_at, id)`.
    async fn list(&self, scope: &MessageScope) -> Result<Vec<MessageRecord>>;
}

// ==============================================================================
// SUPABASE
// ==============================================================================

pub struct SupabaseMessageStore {
    supabase: SupabaseClient,
}

impl SupabaseMessageStore {
    pub fn new(config: &AppConfig) -> Self {
        Self {
            supabase: SupabaseClient::new(config),
        }
    }

    // Rows that don't match a message shape are dropped here.
    fn narrow(rows: Vec<Value>) -> Vec<MessageRecord> {
        rows.into_iter()
            .filter_map(|row| {
                let id = row.get("id").cloned().unwrap_or(Value::Null);
                serde_json::from_value::<MessageRecord>(row)
                    .inspect_err(|e| warn!("Skipping malformed message row {}: {}", id, e))
                    .ok()
            })
            .collect()
    }
}

#[async_trait]
impl MessageStore for SupabaseMessageStore {
    async fn insert(&self, message: &NewMessage) -> Result<MessageRecord> {
        debug!("Appending {} message to {}", message.content.kind(), message.participants_key);

        let rows: Vec<Value> = self.supabase.request_with_headers(
            Method::POST,
            "/rest/v1/messages",
            None,
            Some(json!(message)),
            Some(SupabaseClient::representation_headers()),
        ).await?;

        Self::narrow(rows)
            .into_iter()
            .next()
            .ok_or_else(|| anyhow!("message for {} was not stored", message.participants_key))
    }

    async fn list(&self, scope: &MessageScope) -> Result<Vec<MessageRecord>> {
        let appointment_filter = match scope.appointment_id {
            Some(id) => format!("eq.{}", id),
            None => "is.null".to_string(),
        };
        let path = format!(
            "/rest/v1/messages?participants_key=eq.{}&appointment_id={}&order=created_at.asc,id.asc",
            urlencoding::encode(&scope.participants_key),
            appointment_filter
        );

        let rows: Vec<Value> = self.supabase.request(Method::GET, &path, None, None).await?;
        let mut records = Self::narrow(rows);
        sort_messages(&mut records);
        Ok(records)
    }
}

// ==============================================================================
// IN-PROCESS
// ==============================================================================

#[derive(Default)]
struct Log {
    records: Vec<MessageRecord>,
    last_stamp: Option<DateTime<Utc>>,
}

/// Process-local message log. Timestamps are strictly increasing.
#[derive(Default)]
pub struct InMemoryMessageStore {
    log: Mutex<Log>,
}

impl InMemoryMessageStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Stores a record exactly as given. For seeding history in tests.
    pub async fn insert_raw(&self, record: MessageRecord) {
        let mut log = self.log.lock().await;
        log.last_stamp = log.last_stamp.max(Some(record.created_at));
        log.records.push(record);
    }

    pub async fn len(&self) -> usize {
        self.log.lock().await.records.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.log.lock().await.records.is_empty()
    }
}

#[async_trait]
impl MessageStore for InMemoryMessageStore {
    async fn insert(&self, message: &NewMessage) -> Result<MessageRecord> {
        let mut log = self.log.lock().await;

        let now = Utc::now();
        let stamp = match log.last_stamp {
            Some(last) if now <= last => last + Duration::microseconds(1),
            _ => now,
        };
        log.last_stamp = Some(stamp);

        let record = message.clone().into_record(Uuid::new_v4(), stamp);
        log.records.push(record.clone());
        Ok(record)
    }

    async fn list(&self, scope: &MessageScope) -> Result<Vec<MessageRecord>> {
        let mut records: Vec<MessageRecord> = self
            .log
            .lock()
            .await
            .records
            .iter()
            .filter(|record| scope.matches(record))
            .cloned()
            .collect();
        sort_messages(&mut records);
        Ok(records)
    }
}
