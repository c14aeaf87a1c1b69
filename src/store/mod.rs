//! Collection storage abstraction.
//!
//! The [`CollectionStore`] trait is the only contract the ingestion
//! coordinator has with the persistent collection backend. Collections are
//! created implicitly by the first successful [`add_documents`] call and are
//! append-only from the pipeline's point of view.
//!
//! | Implementation | Purpose |
//! |----------------|---------|
//! | [`sqlite::SqliteCollectionStore`] | Persistent SQLite backend with optional embeddings |
//! | [`memory::InMemoryCollectionStore`] | In-process backend for tests and dry runs |
//!
//! [`add_documents`]: CollectionStore::add_documents

pub mod memory;
pub mod sqlite;

use async_trait::async_trait;
use serde::Serialize;

use crate::error::StoreError;
use crate::models::{Chunk, Metadata};

/// Audit record for one ingestion run.
#[derive(Debug, Clone, Serialize)]
pub struct RunRecord {
    pub id: String,
    pub collection: String,
    pub started_at: i64,
    pub finished_at: i64,
    pub candidates: usize,
    pub already_processed: usize,
    pub work_items: usize,
    pub chunks_added: usize,
    pub added_sources: Vec<String>,
    pub outcome: String,
}

/// Per-collection overview used by `shelf collections`.
#[derive(Debug, Clone, Serialize)]
pub struct CollectionSummary {
    pub name: String,
    pub created_at: i64,
    pub chunk_count: i64,
    pub source_count: i64,
    pub embedded_count: i64,
    pub last_run_at: Option<i64>,
    pub last_outcome: Option<String>,
}

/// Abstract persistent collection backend.
///
/// `add_documents` is not idempotent: adding the same chunks twice stores
/// them twice (or fails on an id conflict). Deduplication is the
/// coordinator's job.
#[async_trait]
pub trait CollectionStore: Send + Sync {
    /// All stored metadata records of a collection.
    ///
    /// Returns [`StoreError::CollectionNotFound`] when the collection has
    /// never been committed to.
    async fn get_metadata(&self, collection: &str) -> Result<Vec<Metadata>, StoreError>;

    /// Append `chunks` to `collection` as one all-or-nothing batch.
    ///
    /// Returns the number of chunks written.
    async fn add_documents(&self, collection: &str, chunks: &[Chunk]) -> Result<usize, StoreError>;

    /// Append an ingestion run to the audit log.
    async fn record_run(&self, run: &RunRecord) -> Result<(), StoreError>;

    /// Overview of every collection in the store.
    async fn list_collections(&self) -> Result<Vec<CollectionSummary>, StoreError>;
}
