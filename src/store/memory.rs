//! In-memory [`CollectionStore`] implementation for tests and dry runs.
//!
//! Uses `HashMap` and `Vec` behind `std::sync::RwLock`. Nothing survives
//! the process.

use std::collections::{BTreeSet, HashMap};
use std::sync::RwLock;

use async_trait::async_trait;

use crate::error::StoreError;
use crate::models::{source_base_name, Chunk, Metadata};

use super::{CollectionStore, CollectionSummary, RunRecord};

struct StoredCollection {
    created_at: i64,
    chunks: Vec<Chunk>,
}

/// In-memory collection store.
pub struct InMemoryCollectionStore {
    collections: RwLock<HashMap<String, StoredCollection>>,
    runs: RwLock<Vec<RunRecord>>,
}

impl InMemoryCollectionStore {
    pub fn new() -> Self {
        Self {
            collections: RwLock::new(HashMap::new()),
            runs: RwLock::new(Vec::new()),
        }
    }

    /// Snapshot of the chunks stored in `collection` (empty if absent).
    pub fn chunks(&self, collection: &str) -> Vec<Chunk> {
        self.collections
            .read()
            .map(|c| {
                c.get(collection)
                    .map(|sc| sc.chunks.clone())
                    .unwrap_or_default()
            })
            .unwrap_or_default()
    }

    /// Snapshot of all recorded runs, oldest first.
    pub fn runs(&self) -> Vec<RunRecord> {
        self.runs.read().map(|r| r.clone()).unwrap_or_default()
    }
}

impl Default for InMemoryCollectionStore {
    fn default() -> Self {
        Self::new()
    }
}

fn poisoned<T>(_: T) -> StoreError {
    StoreError::Unavailable("in-memory store lock poisoned".to_string())
}

#[async_trait]
impl CollectionStore for InMemoryCollectionStore {
    async fn get_metadata(&self, collection: &str) -> Result<Vec<Metadata>, StoreError> {
        let collections = self.collections.read().map_err(poisoned)?;
        let stored = collections
            .get(collection)
            .ok_or_else(|| StoreError::CollectionNotFound(collection.to_string()))?;
        Ok(stored.chunks.iter().map(|c| c.metadata.clone()).collect())
    }

    async fn add_documents(&self, collection: &str, chunks: &[Chunk]) -> Result<usize, StoreError> {
        let mut collections = self.collections.write().map_err(poisoned)?;
        let stored = collections
            .entry(collection.to_string())
            .or_insert_with(|| StoredCollection {
                created_at: chrono::Utc::now().timestamp(),
                chunks: Vec::new(),
            });
        stored.chunks.extend_from_slice(chunks);
        Ok(chunks.len())
    }

    async fn record_run(&self, run: &RunRecord) -> Result<(), StoreError> {
        self.runs.write().map_err(poisoned)?.push(run.clone());
        Ok(())
    }

    async fn list_collections(&self) -> Result<Vec<CollectionSummary>, StoreError> {
        let collections = self.collections.read().map_err(poisoned)?;
        let runs = self.runs.read().map_err(poisoned)?;

        let mut summaries: Vec<CollectionSummary> = collections
            .iter()
            .map(|(name, stored)| {
                let sources: BTreeSet<String> = stored
                    .chunks
                    .iter()
                    .filter_map(|c| c.source().and_then(source_base_name))
                    .collect();
                let last_run = runs.iter().rev().find(|r| &r.collection == name);
                CollectionSummary {
                    name: name.clone(),
                    created_at: stored.created_at,
                    chunk_count: stored.chunks.len() as i64,
                    source_count: sources.len() as i64,
                    embedded_count: 0,
                    last_run_at: last_run.map(|r| r.finished_at),
                    last_outcome: last_run.map(|r| r.outcome.clone()),
                }
            })
            .collect();
        summaries.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(summaries)
    }
}
