//! Collection commit with a deadline and a single transient retry.

use std::time::Duration;

use tracing::{info, warn};

use crate::config::CommitConfig;
use crate::error::StoreError;
use crate::models::Chunk;
use crate::store::CollectionStore;

/// Append `chunks` to `collection` as one batch.
///
/// Each attempt is bounded by `policy.timeout_secs`. A transient failure is
/// retried once when `policy.retry_transient` is set; anything else is
/// returned as-is.
pub async fn commit(
    store: &dyn CollectionStore,
    collection: &str,
    chunks: &[Chunk],
    policy: &CommitConfig,
) -> Result<usize, StoreError> {
    match attempt(store, collection, chunks, policy.timeout_secs).await {
        Ok(n) => Ok(n),
        Err(e) if policy.retry_transient && e.is_transient() => {
            warn!(collection, error = %e, "commit failed, retrying once");
            let n = attempt(store, collection, chunks, policy.timeout_secs).await?;
            info!(collection, chunks = n, "commit succeeded on retry");
            Ok(n)
        }
        Err(e) => Err(e),
    }
}

async fn attempt(
    store: &dyn CollectionStore,
    collection: &str,
    chunks: &[Chunk],
    timeout_secs: u64,
) -> Result<usize, StoreError> {
    match tokio::time::timeout(
        Duration::from_secs(timeout_secs),
        store.add_documents(collection, chunks),
    )
    .await
    {
        Ok(result) => result,
        Err(_) => Err(StoreError::Timeout(timeout_secs)),
    }
}
