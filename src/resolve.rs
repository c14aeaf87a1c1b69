//! Processed-set resolution.
//!
//! Reads every stored metadata record of a collection and projects the
//! `source` field onto its file name. The result is rebuilt on every run.
//!
//! A missing collection is the normal first-run case and resolves to an
//! empty set silently. Any other backend failure is reported as
//! [`Resolution::Degraded`] so the caller can decide whether an empty set
//! is acceptable.

use std::collections::BTreeSet;

use tracing::{debug, warn};

use crate::error::StoreError;
use crate::models::{source_base_name, Metadata, SOURCE_KEY};
use crate::store::CollectionStore;

/// Outcome of reading the processed set of a collection.
#[derive(Debug)]
pub enum Resolution {
    /// The collection exists; these identifiers are already ingested.
    Found(BTreeSet<String>),
    /// The collection does not exist yet.
    Missing,
    /// The collection could not be read.
    Degraded(StoreError),
}

impl Resolution {
    /// The processed identifiers, treating `Missing` and `Degraded` as empty.
    pub fn processed(&self) -> BTreeSet<String> {
        match self {
            Resolution::Found(set) => set.clone(),
            Resolution::Missing | Resolution::Degraded(_) => BTreeSet::new(),
        }
    }

    pub fn is_degraded(&self) -> bool {
        matches!(self, Resolution::Degraded(_))
    }
}

/// Resolve the set of source identifiers already stored in `collection`.
pub async fn resolve(store: &dyn CollectionStore, collection: &str) -> Resolution {
    match store.get_metadata(collection).await {
        Ok(records) => {
            let set = project_sources(&records);
            debug!(collection, records = records.len(), sources = set.len(), "resolved processed set");
            Resolution::Found(set)
        }
        Err(StoreError::CollectionNotFound(_)) => {
            debug!(collection, "collection does not exist yet");
            Resolution::Missing
        }
        Err(e) => {
            warn!(collection, error = %e, "could not read processed set");
            Resolution::Degraded(e)
        }
    }
}

/// Project metadata records onto the base names of their `source` values.
///
/// Records without a string `source` are skipped.
pub fn project_sources(records: &[Metadata]) -> BTreeSet<String> {
    records
        .iter()
        .filter_map(|m| m.get(SOURCE_KEY))
        .filter_map(|v| v.as_str())
        .filter_map(source_base_name)
        .collect()
}
