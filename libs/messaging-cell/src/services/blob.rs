// libs/messaging-cell/src/services/blob.rs
use std::collections::HashMap;
use std::sync::Arc;

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use futures::stream;
use tokio::sync::RwLock;
use tracing::debug;

use shared_config::AppConfig;
use shared_database::supabase::SupabaseClient;

use crate::models::UploadProgress;

const UPLOAD_CHUNK_BYTES: usize = 64 * 1024;

pub type ProgressCallback = Arc<dyn Fn(UploadProgress) + Send + Sync>;

/// Object storage for chat attachments.
#[async_trait]
pub trait BlobStorage: Send + Sync {
    /// Uploads `bytes` to `path` and returns the URL it can be fetched from.
    /// `on_progress` is called as bytes go out, ending at `sent == total`.
    async fn upload(
        &self,
        bytes: Vec<u8>,
        path: &str,
        content_type: &str,
        on_progress: ProgressCallback,
    ) -> Result<String>;
}

fn chunks(bytes: Vec<u8>) -> Vec<Vec<u8>> {
    if bytes.is_empty() {
        return vec![Vec::new()];
    }
    bytes.chunks(UPLOAD_CHUNK_BYTES).map(<[u8]>::to_vec).collect()
}

pub struct SupabaseBlobStorage {
    supabase: SupabaseClient,
    bucket: String,
}

impl SupabaseBlobStorage {
    pub fn new(config: &AppConfig) -> Self {
        Self {
            supabase: SupabaseClient::new(config),
            bucket: config.supabase_storage_bucket.clone(),
        }
    }
}

#[async_trait]
impl BlobStorage for SupabaseBlobStorage {
    async fn upload(
        &self,
        bytes: Vec<u8>,
        path: &str,
        content_type: &str,
        on_progress: ProgressCallback,
    ) -> Result<String> {
        let total = bytes.len() as u64;
        debug!("Uploading {} bytes to {}/{}", total, self.bucket, path);

        // Progress is reported as the request body pulls each chunk.
        let mut sent = 0u64;
        let body = stream::iter(chunks(bytes).into_iter().map(move |chunk| {
            sent += chunk.len() as u64;
            on_progress(UploadProgress { sent, total });
            Ok::<_, std::io::Error>(chunk)
        }));

        self.supabase
            .upload_object(&self.bucket, path, content_type, reqwest::Body::wrap_stream(body))
            .await
    }
}

#[derive(Debug, Clone)]
pub struct StoredBlob {
    pub content_type: String,
    pub bytes: Vec<u8>,
}

/// Process-local blob storage.
#[derive(Default)]
pub struct InMemoryBlobStorage {
    blobs: RwLock<HashMap<String, StoredBlob>>,
}

impl InMemoryBlobStorage {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn get(&self, path: &str) -> Option<StoredBlob> {
        self.blobs.read().await.get(path).cloned()
    }

    pub fn url_for(path: &str) -> String {
        format!("memory://chat-files/{}", path)
    }
}

#[async_trait]
impl BlobStorage for InMemoryBlobStorage {
    async fn upload(
        &self,
        bytes: Vec<u8>,
        path: &str,
        content_type: &str,
        on_progress: ProgressCallback,
    ) -> Result<String> {
        let mut blobs = self.blobs.write().await;
        if blobs.contains_key(path) {
            return Err(anyhow!("object {} already exists", path));
        }

        let total = bytes.len() as u64;
        let mut sent = 0u64;
        for chunk in chunks(bytes.clone()) {
            sent += chunk.len() as u64;
            on_progress(UploadProgress { sent, total });
        }

        blobs.insert(
            path.to_string(),
            StoredBlob { content_type: content_type.to_string(), bytes },
        );
        Ok(Self::url_for(path))
    }
}
