//! SQLite-backed [`CollectionStore`].
//!
//! Chunks of all collections live in one `chunks` table keyed by
//! `(collection, id)`. A commit batch is embedded first (when an embedding
//! provider is configured) and then written in a single transaction, so a
//! failed commit leaves the collection exactly as it was.

use std::collections::BTreeSet;

use async_trait::async_trait;
use sha2::{Digest, Sha256};
use sqlx::{Row, SqlitePool};
use tracing::{debug, warn};

use crate::config::{Config, EmbeddingConfig};
use crate::db;
use crate::embedding::{create_provider, embed_batched, vec_to_blob, EmbeddingProvider};
use crate::error::StoreError;
use crate::migrate;
use crate::models::{source_base_name, Chunk, Metadata};

use super::{CollectionStore, CollectionSummary, RunRecord};

pub struct SqliteCollectionStore {
    pool: SqlitePool,
    embedding: EmbeddingConfig,
    provider: Box<dyn EmbeddingProvider>,
}

impl SqliteCollectionStore {
    /// Connect to the configured database, creating the schema if needed.
    pub async fn open(config: &Config) -> anyhow::Result<Self> {
        let pool = db::connect(config).await?;
        migrate::ensure_schema(&pool).await?;
        let provider = create_provider(&config.embedding)?;
        Ok(Self::from_pool(pool, config.embedding.clone(), provider))
    }

    pub fn from_pool(
        pool: SqlitePool,
        embedding: EmbeddingConfig,
        provider: Box<dyn EmbeddingProvider>,
    ) -> Self {
        Self {
            pool,
            embedding,
            provider,
        }
    }

    pub async fn close(self) {
        self.pool.close().await;
    }

    async fn embed(&self, chunks: &[Chunk]) -> Result<Option<Vec<Vec<f32>>>, StoreError> {
        if !self.embedding.is_enabled() {
            return Ok(None);
        }
        let texts: Vec<String> = chunks.iter().map(|c| c.content.clone()).collect();
        let vectors = embed_batched(self.provider.as_ref(), self.embedding.batch_size, &texts)
            .await
            .map_err(|e| StoreError::Embedding(format!("{:#}", e)))?;
        debug!(count = vectors.len(), model = self.provider.model_name(), "embedded batch");
        Ok(Some(vectors))
    }
}

fn content_hash(text: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(text.as_bytes());
    format!("{:x}", hasher.finalize())
}

#[async_trait]
impl CollectionStore for SqliteCollectionStore {
    async fn get_metadata(&self, collection: &str) -> Result<Vec<Metadata>, StoreError> {
        let exists: Option<i64> = sqlx::query_scalar("SELECT 1 FROM collections WHERE name = ?")
            .bind(collection)
            .fetch_optional(&self.pool)
            .await?;
        if exists.is_none() {
            return Err(StoreError::CollectionNotFound(collection.to_string()));
        }

        let rows: Vec<String> = sqlx::query_scalar(
            "SELECT metadata_json FROM chunks WHERE collection = ? ORDER BY rowid",
        )
        .bind(collection)
        .fetch_all(&self.pool)
        .await?;

        let mut records = Vec::with_capacity(rows.len());
        for raw in rows {
            match serde_json::from_str::<Metadata>(&raw) {
                Ok(metadata) => records.push(metadata),
                Err(e) => warn!(collection, error = %e, "skipping unreadable metadata record"),
            }
        }
        Ok(records)
    }

    async fn add_documents(&self, collection: &str, chunks: &[Chunk]) -> Result<usize, StoreError> {
        if chunks.is_empty() {
            return Ok(0);
        }

        let vectors = self.embed(chunks).await?;
        let model = vectors
            .as_ref()
            .map(|_| self.provider.model_name().to_string());
        let now = chrono::Utc::now().timestamp();

        let mut tx = self.pool.begin().await?;

        sqlx::query("INSERT OR IGNORE INTO collections (name, created_at) VALUES (?, ?)")
            .bind(collection)
            .bind(now)
            .execute(&mut *tx)
            .await?;

        for (i, chunk) in chunks.iter().enumerate() {
            let metadata_json = serde_json::to_string(&chunk.metadata)?;
            let blob = vectors.as_ref().map(|v| vec_to_blob(&v[i]));

            sqlx::query(
                r#"
                INSERT INTO chunks (collection, id, content, metadata_json, source, content_hash, embedding, embedding_model, created_at)
                VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)
                "#,
            )
            .bind(collection)
            .bind(&chunk.id)
            .bind(&chunk.content)
            .bind(&metadata_json)
            .bind(chunk.source())
            .bind(content_hash(&chunk.content))
            .bind(blob)
            .bind(&model)
            .bind(now)
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;
        Ok(chunks.len())
    }

    async fn record_run(&self, run: &RunRecord) -> Result<(), StoreError> {
        let added_sources_json = serde_json::to_string(&run.added_sources)?;
        sqlx::query(
            r#"
            INSERT INTO ingest_runs (id, collection, started_at, finished_at, candidates, already_processed, work_items, chunks_added, added_sources_json, outcome)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&run.id)
        .bind(&run.collection)
        .bind(run.started_at)
        .bind(run.finished_at)
        .bind(run.candidates as i64)
        .bind(run.already_processed as i64)
        .bind(run.work_items as i64)
        .bind(run.chunks_added as i64)
        .bind(&added_sources_json)
        .bind(&run.outcome)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn list_collections(&self) -> Result<Vec<CollectionSummary>, StoreError> {
        let rows = sqlx::query(
            r#"
            SELECT
                c.name,
                c.created_at,
                (SELECT COUNT(*) FROM chunks k WHERE k.collection = c.name) AS chunk_count,
                (SELECT COUNT(*) FROM chunks k WHERE k.collection = c.name AND k.embedding IS NOT NULL) AS embedded_count
            FROM collections c
            ORDER BY c.name
            "#,
        )
        .fetch_all(&self.pool)
        .await?;

        let mut summaries = Vec::with_capacity(rows.len());
        for row in &rows {
            let name: String = row.get("name");

            let sources: Vec<Option<String>> =
                sqlx::query_scalar("SELECT DISTINCT source FROM chunks WHERE collection = ?")
                    .bind(&name)
                    .fetch_all(&self.pool)
                    .await?;
            let base_names: BTreeSet<String> = sources
                .iter()
                .flatten()
                .filter_map(|s| source_base_name(s))
                .collect();

            let last_run = sqlx::query(
                "SELECT finished_at, outcome FROM ingest_runs WHERE collection = ? ORDER BY finished_at DESC, rowid DESC LIMIT 1",
            )
            .bind(&name)
            .fetch_optional(&self.pool)
            .await?;

            summaries.push(CollectionSummary {
                name,
                created_at: row.get("created_at"),
                chunk_count: row.get("chunk_count"),
                source_count: base_names.len() as i64,
                embedded_count: row.get("embedded_count"),
                last_run_at: last_run.as_ref().map(|r| r.get("finished_at")),
                last_outcome: last_run.as_ref().map(|r| r.get("outcome")),
            });
        }

        Ok(summaries)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::parse_config;
    use crate::models::{MetadataValue, SOURCE_KEY};
    use tempfile::TempDir;

    async fn open_store(tmp: &TempDir) -> SqliteCollectionStore {
        let toml = format!("[db]\npath = \"{}/shelf.sqlite\"\n", tmp.path().display());
        let config = parse_config(&toml).unwrap();
        SqliteCollectionStore::open(&config).await.unwrap()
    }

    /// Embeds each text as its length followed by ones, `returned` values long.
    struct LengthProvider {
        dims: usize,
        returned: usize,
    }

    #[async_trait]
    impl EmbeddingProvider for LengthProvider {
        fn model_name(&self) -> &str {
            "length-test"
        }
        fn dims(&self) -> usize {
            self.dims
        }
        async fn embed(&self, texts: &[String]) -> anyhow::Result<Vec<Vec<f32>>> {
            Ok(texts
                .iter()
                .map(|t| {
                    let mut v = vec![1.0; self.returned];
                    v[0] = t.len() as f32;
                    v
                })
                .collect())
        }
    }

    async fn open_embedding_store(tmp: &TempDir, provider: LengthProvider) -> SqliteCollectionStore {
        let toml = format!("[db]\npath = \"{}/shelf.sqlite\"\n", tmp.path().display());
        let config = parse_config(&toml).unwrap();
        let pool = db::connect(&config).await.unwrap();
        migrate::ensure_schema(&pool).await.unwrap();
        let embedding = EmbeddingConfig {
            provider: "length-test".into(),
            model: Some("length-test".into()),
            dims: Some(provider.dims),
            batch_size: 2,
            ..Default::default()
        };
        SqliteCollectionStore::from_pool(pool, embedding, Box::new(provider))
    }

    fn chunk(id: &str, source: &str, content: &str) -> Chunk {
        let mut c = Chunk::new(id, content);
        c.metadata.insert(SOURCE_KEY.into(), source.into());
        c.metadata.insert("page".into(), MetadataValue::Int(1));
        c
    }

    #[tokio::test]
    async fn unknown_collection_is_not_found() {
        let tmp = TempDir::new().unwrap();
        let store = open_store(&tmp).await;
        let err = store.get_metadata("books").await.unwrap_err();
        assert!(matches!(err, StoreError::CollectionNotFound(_)));
    }

    #[tokio::test]
    async fn add_then_read_back_metadata() {
        let tmp = TempDir::new().unwrap();
        let store = open_store(&tmp).await;

        let written = store
            .add_documents(
                "books",
                &[
                    chunk("1", "texts/a.pdf", "alpha"),
                    chunk("2", "texts/a.pdf", "beta"),
                ],
            )
            .await
            .unwrap();
        assert_eq!(written, 2);

        let records = store.get_metadata("books").await.unwrap();
        assert_eq!(records.len(), 2);
        assert_eq!(records[0][SOURCE_KEY], MetadataValue::from("texts/a.pdf"));
        assert_eq!(records[0]["page"], MetadataValue::Int(1));
    }

    #[tokio::test]
    async fn failed_batch_leaves_collection_unchanged() {
        let tmp = TempDir::new().unwrap();
        let store = open_store(&tmp).await;
        store
            .add_documents("books", &[chunk("1", "a.pdf", "alpha")])
            .await
            .unwrap();

        // Second chunk reuses id "1" and violates the primary key.
        let err = store
            .add_documents(
                "books",
                &[chunk("2", "b.pdf", "beta"), chunk("1", "b.pdf", "gamma")],
            )
            .await;
        assert!(err.is_err());
        assert_eq!(store.get_metadata("books").await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn summaries_count_sources_and_runs() {
        let tmp = TempDir::new().unwrap();
        let store = open_store(&tmp).await;
        store
            .add_documents(
                "books",
                &[
                    chunk("1", "dir/a.pdf", "alpha"),
                    chunk("2", "other/a.pdf", "beta"),
                    chunk("3", "dir/b.pdf", "gamma"),
                ],
            )
            .await
            .unwrap();
        store
            .record_run(&RunRecord {
                id: "run-1".into(),
                collection: "books".into(),
                started_at: 10,
                finished_at: 20,
                candidates: 2,
                already_processed: 0,
                work_items: 2,
                chunks_added: 3,
                added_sources: vec!["a.pdf".into(), "b.pdf".into()],
                outcome: "committed".into(),
            })
            .await
            .unwrap();

        let summaries = store.list_collections().await.unwrap();
        assert_eq!(summaries.len(), 1);
        let s = &summaries[0];
        assert_eq!(s.name, "books");
        assert_eq!(s.chunk_count, 3);
        assert_eq!(s.source_count, 2);
        assert_eq!(s.embedded_count, 0);
        assert_eq!(s.last_run_at, Some(20));
        assert_eq!(s.last_outcome.as_deref(), Some("committed"));
    }

    #[tokio::test]
    async fn embedded_batch_stores_vectors() {
        let tmp = TempDir::new().unwrap();
        let store = open_embedding_store(
            &tmp,
            LengthProvider {
                dims: 3,
                returned: 3,
            },
        )
        .await;

        store
            .add_documents(
                "books",
                &[
                    chunk("1", "a.pdf", "alpha"),
                    chunk("2", "a.pdf", "be"),
                    chunk("3", "b.pdf", "gamma!"),
                ],
            )
            .await
            .unwrap();

        let rows: Vec<(String, Vec<u8>, String)> = sqlx::query_as(
            "SELECT id, embedding, embedding_model FROM chunks WHERE collection = ? ORDER BY id",
        )
        .bind("books")
        .fetch_all(&store.pool)
        .await
        .unwrap();
        assert_eq!(rows.len(), 3);
        assert_eq!(rows[1].1, vec_to_blob(&[2.0, 1.0, 1.0]));
        assert_eq!(rows[2].1, vec_to_blob(&[6.0, 1.0, 1.0]));
        assert!(rows.iter().all(|(_, _, model)| model == "length-test"));

        let summaries = store.list_collections().await.unwrap();
        assert_eq!(summaries[0].embedded_count, 3);
    }

    #[tokio::test]
    async fn embedding_failure_leaves_collection_untouched() {
        let tmp = TempDir::new().unwrap();
        let store = open_embedding_store(
            &tmp,
            LengthProvider {
                dims: 3,
                returned: 2,
            },
        )
        .await;

        let err = store
            .add_documents("books", &[chunk("1", "a.pdf", "alpha")])
            .await
            .unwrap_err();
        match err {
            StoreError::Embedding(msg) => assert!(msg.contains("dimension mismatch")),
            other => panic!("unexpected error: {other}"),
        }
        assert!(matches!(
            store.get_metadata("books").await.unwrap_err(),
            StoreError::CollectionNotFound(_)
        ));
    }
}
