use std::future::Future;
use std::time::Duration;

use anyhow::{anyhow, Result};
use tracing::error;

/// Bounds a store write. Expiry is reported as an error; nothing is retried.
pub async fn with_write_timeout<T, F>(limit: Duration, operation: &str, write: F) -> Result<T>
where
    F: Future<Output = Result<T>>,
{
    match tokio::time::timeout(limit, write).await {
        Ok(result) => result,
        Err(_) => {
            error!("Store write '{}' timed out after {:?}", operation, limit);
            Err(anyhow!("{} timed out after {}s", operation, limit.as_secs()))
        }
    }
}
