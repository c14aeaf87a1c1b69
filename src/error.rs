//! Typed errors for the ingestion pipeline.
//!
//! Component errors are `thiserror` enums so the coordinator can tell fatal
//! conditions from recoverable ones. The CLI converts them into `anyhow`.

use std::path::PathBuf;

use thiserror::Error;

/// Errors raised by a [`CollectionStore`](crate::store::CollectionStore).
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("collection not found: {0}")]
    CollectionNotFound(String),

    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("metadata encoding error: {0}")]
    Encoding(#[from] serde_json::Error),

    #[error("embedding failed: {0}")]
    Embedding(String),

    #[error("backend unavailable: {0}")]
    Unavailable(String),

    #[error("commit timed out after {0}s")]
    Timeout(u64),
}

impl StoreError {
    /// Whether retrying the same call might succeed.
    pub fn is_transient(&self) -> bool {
        match self {
            StoreError::Unavailable(_) | StoreError::Timeout(_) => true,
            StoreError::Database(e) => matches!(
                e,
                sqlx::Error::Io(_) | sqlx::Error::PoolTimedOut | sqlx::Error::WorkerCrashed
            ),
            _ => false,
        }
    }
}

/// Errors raised by a [`DocumentParser`](crate::parse::DocumentParser).
#[derive(Debug, Error)]
pub enum ParseError {
    #[error("failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("PDF extraction failed: {0}")]
    Pdf(String),

    #[error("PDF extraction panicked: {0}")]
    Panicked(String),
}

/// Errors raised while enumerating candidates. Always fatal for a run.
#[derive(Debug, Error)]
pub enum InventoryError {
    #[error("source location does not exist: {0}")]
    Missing(PathBuf),

    #[error("source location is not a directory: {0}")]
    NotADirectory(PathBuf),

    #[error("failed to read {path}: {source}")]
    Unreadable {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to read CSV {path}: {source}")]
    Csv {
        path: PathBuf,
        #[source]
        source: csv::Error,
    },

    #[error(
        "CSV {path} is missing required column(s) {missing:?}; found columns: {found:?}"
    )]
    MissingColumns {
        path: PathBuf,
        missing: Vec<String>,
        found: Vec<String>,
    },

    #[error("invalid exclude glob: {0}")]
    Glob(#[from] globset::Error),
}

/// Run-level errors returned by [`Ingestor::run`](crate::ingest::Ingestor::run).
#[derive(Debug, Error)]
pub enum IngestError {
    #[error(transparent)]
    Inventory(#[from] InventoryError),

    #[error("could not read processed set for collection '{collection}': {source}")]
    Resolve {
        collection: String,
        #[source]
        source: StoreError,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn transient_classification() {
        assert!(StoreError::Timeout(5).is_transient());
        assert!(StoreError::Unavailable("down".into()).is_transient());
        assert!(StoreError::Database(sqlx::Error::PoolTimedOut).is_transient());
        assert!(!StoreError::Database(sqlx::Error::RowNotFound).is_transient());
        assert!(!StoreError::CollectionNotFound("c".into()).is_transient());
        assert!(!StoreError::Embedding("bad request".into()).is_transient());
    }

    #[test]
    fn missing_columns_lists_found_columns() {
        let err = InventoryError::MissingColumns {
            path: PathBuf::from("qa.csv"),
            missing: vec!["answer".into()],
            found: vec!["question".into(), "notes".into()],
        };
        let msg = err.to_string();
        assert!(msg.contains("answer"));
        assert!(msg.contains("notes"));
    }
}
