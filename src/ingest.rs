//! Ingestion run orchestration.
//!
//! Coordinates one run for one source profile:
//! resolve processed set → list candidates → diff → transform each new
//! item → enrich → commit once.
//!
//! Only a missing or unreadable location (and a failed read of the
//! processed set under `strict_resolve`) aborts a run with an error. Item
//! failures are recorded in the [`IngestReport`] and the run carries on; a
//! failed commit is reported through [`RunOutcome::CommitFailed`].

use std::collections::BTreeSet;

use tracing::{info, info_span, warn, Instrument};
use uuid::Uuid;

use crate::chunk::Chunker;
use crate::commit::commit;
use crate::config::{CommitConfig, SourceConfig};
use crate::error::IngestError;
use crate::inventory::list_candidates;
use crate::metadata::Enricher;
use crate::models::{Candidate, Chunk};
use crate::parse::DocumentParser;
use crate::progress::{IngestProgressEvent, IngestProgressReporter, NoProgress};
use crate::resolve::{resolve, Resolution};
use crate::store::{CollectionStore, RunRecord};
use crate::transform::{ItemOutcome, TableColumns, Transformer};

/// What to ingest and how.
#[derive(Debug, Clone)]
pub struct IngestRequest {
    /// Profile name, used for logging and the summary header.
    pub profile: String,
    pub source: SourceConfig,
    /// Process at most this many new candidates.
    pub limit: Option<usize>,
    /// Stop before the commit and report what would be added.
    pub dry_run: bool,
}

impl IngestRequest {
    pub fn new(profile: impl Into<String>, source: SourceConfig) -> Self {
        Self {
            profile: profile.into(),
            source,
            limit: None,
            dry_run: false,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ItemStatus {
    Chunked,
    Skipped,
    Failed,
}

/// Outcome of one transformed item.
#[derive(Debug, Clone, PartialEq)]
pub struct ItemReport {
    pub item: String,
    pub status: ItemStatus,
    pub chunks: usize,
    /// Skip reason or failure cause.
    pub detail: Option<String>,
}

/// How a run ended.
#[derive(Debug, Clone, PartialEq)]
pub enum RunOutcome {
    /// Every candidate was already in the collection.
    NothingToDo,
    Committed { chunks: usize },
    /// Dry run with a non-empty batch; nothing was written.
    DryRun { chunks: usize },
    /// There was work, but no item produced a chunk.
    NothingCommitted,
    CommitFailed(String),
}

impl RunOutcome {
    pub fn label(&self) -> &'static str {
        match self {
            RunOutcome::NothingToDo => "nothing_to_do",
            RunOutcome::Committed { .. } => "committed",
            RunOutcome::DryRun { .. } => "dry_run",
            RunOutcome::NothingCommitted => "nothing_committed",
            RunOutcome::CommitFailed(_) => "commit_failed",
        }
    }
}

/// Everything a run observed, in order.
#[derive(Debug, Clone)]
pub struct IngestReport {
    pub run_id: String,
    pub profile: String,
    pub collection: String,
    pub candidates: usize,
    pub already_processed: usize,
    pub work_items: usize,
    pub items: Vec<ItemReport>,
    /// Source identifiers that contributed at least one chunk, in order.
    pub added_sources: Vec<String>,
    /// Set when the processed set could not be read and was treated as empty.
    pub resolve_warning: Option<String>,
    pub outcome: RunOutcome,
}

impl IngestReport {
    fn count(&self, status: ItemStatus) -> usize {
        self.items.iter().filter(|i| i.status == status).count()
    }

    pub fn items_chunked(&self) -> usize {
        self.count(ItemStatus::Chunked)
    }

    pub fn items_skipped(&self) -> usize {
        self.count(ItemStatus::Skipped)
    }

    pub fn items_failed(&self) -> usize {
        self.count(ItemStatus::Failed)
    }

    pub fn chunks_committed(&self) -> usize {
        match self.outcome {
            RunOutcome::Committed { chunks } => chunks,
            _ => 0,
        }
    }

    pub fn success(&self) -> bool {
        matches!(
            self.outcome,
            RunOutcome::NothingToDo | RunOutcome::Committed { .. } | RunOutcome::DryRun { .. }
        )
    }

    /// Human-readable summary, one line per entry.
    pub fn summary_lines(&self) -> Vec<String> {
        let mut lines = Vec::new();
        let header = format!("ingest {} -> {}", self.profile, self.collection);
        if matches!(self.outcome, RunOutcome::DryRun { .. }) {
            lines.push(format!("{} (dry-run)", header));
        } else {
            lines.push(header);
        }
        if let Some(warning) = &self.resolve_warning {
            lines.push(format!("  warning: processed set unavailable ({})", warning));
        }
        lines.push(format!("  candidates: {}", self.candidates));
        lines.push(format!("  already processed: {}", self.already_processed));
        lines.push(format!("  work items: {}", self.work_items));
        if !self.items.is_empty() {
            lines.push(format!("  items chunked: {}", self.items_chunked()));
            lines.push(format!("  items skipped: {}", self.items_skipped()));
            lines.push(format!("  items failed: {}", self.items_failed()));
        }
        for item in self.items.iter().filter(|i| i.status == ItemStatus::Failed) {
            lines.push(format!(
                "    failed {}: {}",
                item.item,
                item.detail.as_deref().unwrap_or("unknown error")
            ));
        }

        match &self.outcome {
            RunOutcome::NothingToDo => lines.push("  nothing to do".to_string()),
            RunOutcome::Committed { chunks } => {
                lines.push(format!("  chunks committed: {}", chunks));
            }
            RunOutcome::DryRun { chunks } => {
                lines.push(format!("  chunks that would be added: {}", chunks));
            }
            RunOutcome::NothingCommitted => {
                lines.push("  chunks committed: 0".to_string());
            }
            RunOutcome::CommitFailed(cause) => {
                lines.push(format!("  commit failed: {}", cause));
            }
        }
        if !self.added_sources.is_empty() {
            let verb = if matches!(self.outcome, RunOutcome::Committed { .. }) {
                "added"
            } else {
                "would add"
            };
            lines.push(format!("  {}: {}", verb, self.added_sources.join(", ")));
        }

        lines.push(if self.success() {
            "ok".to_string()
        } else {
            "failed".to_string()
        });
        lines
    }

    pub fn print_summary(&self) {
        for line in self.summary_lines() {
            println!("{}", line);
        }
    }
}

/// Runs ingestion for source profiles against one collection backend.
pub struct Ingestor<'a> {
    store: &'a dyn CollectionStore,
    parser: &'a dyn DocumentParser,
    chunker: &'a dyn Chunker,
    progress: Box<dyn IngestProgressReporter>,
    commit_policy: CommitConfig,
}

impl<'a> Ingestor<'a> {
    pub fn new(
        store: &'a dyn CollectionStore,
        parser: &'a dyn DocumentParser,
        chunker: &'a dyn Chunker,
    ) -> Self {
        Self {
            store,
            parser,
            chunker,
            progress: Box::new(NoProgress),
            commit_policy: CommitConfig::default(),
        }
    }

    pub fn with_progress(mut self, progress: Box<dyn IngestProgressReporter>) -> Self {
        self.progress = progress;
        self
    }

    pub fn with_commit_policy(mut self, policy: CommitConfig) -> Self {
        self.commit_policy = policy;
        self
    }

    /// Run one ingestion for `request`.
    pub async fn run(&self, request: &IngestRequest) -> Result<IngestReport, IngestError> {
        let run_id = Uuid::new_v4().to_string();
        let span = info_span!(
            "ingest",
            run = %run_id,
            profile = %request.profile,
            collection = %request.source.collection
        );
        self.run_inner(run_id, request).instrument(span).await
    }

    async fn run_inner(
        &self,
        run_id: String,
        request: &IngestRequest,
    ) -> Result<IngestReport, IngestError> {
        let source = &request.source;
        let collection = source.collection.as_str();
        let started_at = chrono::Utc::now().timestamp();

        // Stage 1: processed set
        self.progress.report(IngestProgressEvent::Resolving {
            collection: collection.to_string(),
        });
        let (processed, resolve_warning) = match resolve(self.store, collection).await {
            Resolution::Degraded(e) if source.strict_resolve => {
                return Err(IngestError::Resolve {
                    collection: collection.to_string(),
                    source: e,
                });
            }
            Resolution::Degraded(e) => (BTreeSet::new(), Some(e.to_string())),
            resolution => (resolution.processed(), None),
        };

        // Stage 2: candidates
        self.progress.report(IngestProgressEvent::Discovering {
            collection: collection.to_string(),
        });
        let candidates = list_candidates(source)?;

        // Stage 3: diff
        let (mut work, already_processed) = diff(&candidates, &processed);
        if let Some(limit) = request.limit {
            work.truncate(limit);
        }
        info!(
            candidates = candidates.len(),
            already_processed,
            work_items = work.len(),
            "computed work list"
        );

        let mut report = IngestReport {
            run_id,
            profile: request.profile.clone(),
            collection: collection.to_string(),
            candidates: candidates.len(),
            already_processed,
            work_items: work.len(),
            items: Vec::new(),
            added_sources: Vec::new(),
            resolve_warning,
            outcome: RunOutcome::NothingToDo,
        };

        if work.is_empty() {
            info!("nothing to do");
            self.finish(&report, request, started_at).await;
            return Ok(report);
        }

        // Stage 4: transform and enrich
        let transformer = Transformer::new(
            self.parser,
            self.chunker,
            TableColumns {
                question: source.question_column.clone(),
                answer: source.answer_column.clone(),
            },
        );
        let enricher = Enricher::from_source(source);
        let mut batch: Vec<Chunk> = Vec::new();
        let total = work.len() as u64;

        for (i, candidate) in work.iter().enumerate() {
            let mut contributed = false;

            for transformed in transformer.transform(candidate) {
                let item = transformed.item;
                match transformed.outcome {
                    ItemOutcome::Chunked(mut chunks) => {
                        for chunk in &mut chunks {
                            enricher.enrich(chunk, &candidate.id);
                        }
                        info!(item = %item, chunks = chunks.len(), "item chunked");
                        report.items.push(ItemReport {
                            item,
                            status: ItemStatus::Chunked,
                            chunks: chunks.len(),
                            detail: None,
                        });
                        batch.extend(chunks);
                        contributed = true;
                    }
                    ItemOutcome::Skipped(reason) => {
                        info!(item = %item, reason = %reason, "item skipped");
                        report.items.push(ItemReport {
                            item,
                            status: ItemStatus::Skipped,
                            chunks: 0,
                            detail: Some(reason),
                        });
                    }
                    ItemOutcome::Failed(cause) => {
                        warn!(item = %item, error = %cause, "item failed");
                        report.items.push(ItemReport {
                            item,
                            status: ItemStatus::Failed,
                            chunks: 0,
                            detail: Some(cause),
                        });
                    }
                }
            }

            if contributed {
                report.added_sources.push(candidate.id.clone());
            }
            self.progress.report(IngestProgressEvent::Transforming {
                collection: collection.to_string(),
                n: i as u64 + 1,
                total,
            });
        }

        // Stage 5: commit
        report.outcome = if batch.is_empty() {
            warn!(work_items = work.len(), "no chunks produced");
            RunOutcome::NothingCommitted
        } else if request.dry_run {
            info!(chunks = batch.len(), "dry run, skipping commit");
            RunOutcome::DryRun {
                chunks: batch.len(),
            }
        } else {
            self.progress.report(IngestProgressEvent::Committing {
                collection: collection.to_string(),
                chunks: batch.len() as u64,
            });
            match commit(self.store, collection, &batch, &self.commit_policy).await {
                Ok(chunks) => {
                    info!(chunks, sources = report.added_sources.len(), "committed");
                    RunOutcome::Committed { chunks }
                }
                Err(e) => {
                    warn!(error = %e, "commit failed");
                    RunOutcome::CommitFailed(e.to_string())
                }
            }
        };

        self.finish(&report, request, started_at).await;
        Ok(report)
    }

    /// Append the run to the audit log. Dry runs are not recorded.
    async fn finish(&self, report: &IngestReport, request: &IngestRequest, started_at: i64) {
        if request.dry_run {
            return;
        }
        let record = RunRecord {
            id: report.run_id.clone(),
            collection: report.collection.clone(),
            started_at,
            finished_at: chrono::Utc::now().timestamp(),
            candidates: report.candidates,
            already_processed: report.already_processed,
            work_items: report.work_items,
            chunks_added: report.chunks_committed(),
            added_sources: if report.chunks_committed() > 0 {
                report.added_sources.clone()
            } else {
                Vec::new()
            },
            outcome: report.outcome.label().to_string(),
        };
        if let Err(e) = self.store.record_run(&record).await {
            warn!(error = %e, "failed to record ingest run");
        }
    }
}

/// Candidates not in `processed`, first occurrence only, in inventory order.
/// Also returns how many candidates were skipped as already processed.
pub fn diff(candidates: &[Candidate], processed: &BTreeSet<String>) -> (Vec<Candidate>, usize) {
    let mut seen = BTreeSet::new();
    let mut work = Vec::new();
    let mut already_processed = 0;

    for candidate in candidates {
        if processed.contains(&candidate.id) {
            already_processed += 1;
            continue;
        }
        if seen.insert(candidate.id.clone()) {
            work.push(candidate.clone());
        }
    }

    (work, already_processed)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{ParseError, StoreError};
    use crate::metadata::ItemOverrides;
    use crate::models::{source_base_name, Metadata, MetadataValue, PageText, SourceKind};
    use crate::store::memory::InMemoryCollectionStore;
    use crate::store::CollectionSummary;
    use async_trait::async_trait;
    use std::fs;
    use std::path::{Path, PathBuf};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tempfile::TempDir;

    const COLLECTION: &str = "islamic_texts_Agentic_retrieval";

    /// Three pages for every file, except files named `broken*` which fail.
    struct ThreePageParser;

    impl DocumentParser for ThreePageParser {
        fn parse(&self, path: &Path) -> Result<Vec<PageText>, ParseError> {
            let name = path.file_name().unwrap().to_string_lossy();
            if name.starts_with("broken") {
                return Err(ParseError::Pdf("unexpected end of file".into()));
            }
            if name.starts_with("empty") {
                return Ok(vec![]);
            }
            Ok((1..=3)
                .map(|page| PageText {
                    page,
                    text: format!("{} page {}", name, page),
                })
                .collect())
        }
    }

    /// Two chunks for odd pages, one for even pages: 3 pages → 5 chunks.
    struct OddPagesDoubleChunker;

    impl Chunker for OddPagesDoubleChunker {
        fn build_chunks(&self, pages: &[PageText], source: &str) -> Vec<Chunk> {
            let mut out = Vec::new();
            for page in pages {
                let n = if page.page % 2 == 1 { 2 } else { 1 };
                for part in 0..n {
                    let mut c = Chunk::new(
                        format!("{}:{}:{}", source, page.page, part),
                        page.text.clone(),
                    );
                    c.metadata.insert("source".into(), source.into());
                    c.metadata
                        .insert("page".into(), MetadataValue::Int(page.page as i64));
                    out.push(c);
                }
            }
            out
        }
    }

    /// Delegates to the in-memory store but can fail reads or count commits.
    struct ProbeStore {
        inner: InMemoryCollectionStore,
        fail_reads: bool,
        fail_commits: bool,
        commits: AtomicUsize,
    }

    impl ProbeStore {
        fn new() -> Self {
            Self {
                inner: InMemoryCollectionStore::new(),
                fail_reads: false,
                fail_commits: false,
                commits: AtomicUsize::new(0),
            }
        }
    }

    #[async_trait]
    impl CollectionStore for ProbeStore {
        async fn get_metadata(&self, collection: &str) -> Result<Vec<Metadata>, StoreError> {
            if self.fail_reads {
                return Err(StoreError::Unavailable("connection refused".into()));
            }
            self.inner.get_metadata(collection).await
        }

        async fn add_documents(
            &self,
            collection: &str,
            chunks: &[Chunk],
        ) -> Result<usize, StoreError> {
            self.commits.fetch_add(1, Ordering::SeqCst);
            if self.fail_commits {
                return Err(StoreError::Embedding("quota exceeded".into()));
            }
            self.inner.add_documents(collection, chunks).await
        }

        async fn record_run(&self, run: &RunRecord) -> Result<(), StoreError> {
            self.inner.record_run(run).await
        }

        async fn list_collections(&self) -> Result<Vec<CollectionSummary>, StoreError> {
            self.inner.list_collections().await
        }
    }

    fn books_dir(names: &[&str]) -> TempDir {
        let tmp = TempDir::new().unwrap();
        for name in names {
            fs::write(tmp.path().join(name), b"%PDF-1.4").unwrap();
        }
        tmp
    }

    fn books_request(dir: &Path) -> IngestRequest {
        IngestRequest::new(
            "books",
            SourceConfig::new(SourceKind::PdfDir, dir, COLLECTION, "islamic_texts"),
        )
    }

    async fn seed(store: &dyn CollectionStore, source: &str) {
        let mut c = Chunk::new(format!("seed-{}", source), "already here");
        c.metadata.insert("source".into(), source.into());
        store.add_documents(COLLECTION, &[c]).await.unwrap();
    }

    fn candidate(id: &str) -> Candidate {
        Candidate {
            id: id.to_string(),
            path: PathBuf::from(id),
            kind: SourceKind::PdfDir,
        }
    }

    #[test]
    fn diff_skips_processed_and_repeats() {
        let candidates = vec![
            candidate("a.pdf"),
            candidate("b.pdf"),
            candidate("a.pdf"),
            candidate("c.pdf"),
            candidate("b.pdf"),
        ];
        let processed: BTreeSet<String> = ["a.pdf".to_string()].into_iter().collect();
        let (work, already) = diff(&candidates, &processed);
        let ids: Vec<_> = work.iter().map(|c| c.id.as_str()).collect();
        assert_eq!(ids, vec!["b.pdf", "c.pdf"]);
        assert_eq!(already, 2);
    }

    #[tokio::test]
    async fn only_new_book_is_committed() {
        let dir = books_dir(&["a.pdf", "b.pdf"]);
        let store = InMemoryCollectionStore::new();
        seed(&store, "a.pdf").await;

        let ingestor = Ingestor::new(&store, &ThreePageParser, &OddPagesDoubleChunker);
        let report = ingestor.run(&books_request(dir.path())).await.unwrap();

        assert!(report.success());
        assert_eq!(report.candidates, 2);
        assert_eq!(report.already_processed, 1);
        assert_eq!(report.work_items, 1);
        assert_eq!(report.outcome, RunOutcome::Committed { chunks: 5 });
        assert_eq!(report.added_sources, vec!["b.pdf".to_string()]);

        let stored = store.chunks(COLLECTION);
        let added: Vec<_> = stored.iter().skip(1).collect();
        assert_eq!(added.len(), 5);
        for chunk in added {
            let source = chunk.source().unwrap();
            assert_eq!(source_base_name(source).as_deref(), Some("b.pdf"));
            assert_eq!(chunk.metadata["domain"], MetadataValue::from("islamic_texts"));
            assert_eq!(chunk.metadata["book_file"], MetadataValue::from("b.pdf"));
        }
    }

    #[tokio::test]
    async fn second_run_adds_nothing() {
        let dir = books_dir(&["a.pdf", "b.pdf"]);
        let store = InMemoryCollectionStore::new();
        let ingestor = Ingestor::new(&store, &ThreePageParser, &OddPagesDoubleChunker);
        let request = books_request(dir.path());

        let first = ingestor.run(&request).await.unwrap();
        assert_eq!(first.chunks_committed(), 10);

        let second = ingestor.run(&request).await.unwrap();
        assert!(second.success());
        assert_eq!(second.outcome, RunOutcome::NothingToDo);
        assert_eq!(second.already_processed, 2);
        assert_eq!(store.chunks(COLLECTION).len(), 10);

        let runs = store.runs();
        assert_eq!(runs.len(), 2);
        assert_eq!(runs[0].outcome, "committed");
        assert_eq!(runs[0].added_sources, vec!["a.pdf", "b.pdf"]);
        assert_eq!(runs[1].outcome, "nothing_to_do");
    }

    #[tokio::test]
    async fn failing_item_does_not_block_others() {
        let dir = books_dir(&["a.pdf", "broken.pdf", "c.pdf"]);
        let store = InMemoryCollectionStore::new();
        let ingestor = Ingestor::new(&store, &ThreePageParser, &OddPagesDoubleChunker);
        let report = ingestor.run(&books_request(dir.path())).await.unwrap();

        assert!(report.success());
        assert_eq!(report.items_failed(), 1);
        assert_eq!(report.items_chunked(), 2);
        assert_eq!(report.added_sources, vec!["a.pdf", "c.pdf"]);
        assert_eq!(store.chunks(COLLECTION).len(), 10);

        let failed = &report.items[1];
        assert_eq!(failed.item, "broken.pdf");
        assert!(failed.detail.as_deref().unwrap().contains("unexpected end of file"));
    }

    #[tokio::test]
    async fn overrides_win_over_static_fields() {
        let dir = books_dir(&["umdat.pdf"]);
        let store = InMemoryCollectionStore::new();
        let mut request = books_request(dir.path());
        request
            .source
            .static_fields
            .insert("madhab".into(), "unspecified".into());
        request.source.overrides.insert(
            "umdat.pdf".into(),
            ItemOverrides {
                madhab: Some("shafii".into()),
                author: Some("al-Misri".into()),
                ..Default::default()
            },
        );

        let ingestor = Ingestor::new(&store, &ThreePageParser, &OddPagesDoubleChunker);
        ingestor.run(&request).await.unwrap();

        for chunk in store.chunks(COLLECTION) {
            assert_eq!(chunk.metadata["madhab"], MetadataValue::from("shafii"));
            assert_eq!(chunk.metadata["author"], MetadataValue::from("al-Misri"));
        }
    }

    #[tokio::test]
    async fn empty_location_succeeds_without_commit() {
        let dir = books_dir(&["notes.txt"]);
        let store = ProbeStore::new();
        let ingestor = Ingestor::new(&store, &ThreePageParser, &OddPagesDoubleChunker);
        let report = ingestor.run(&books_request(dir.path())).await.unwrap();

        assert!(report.success());
        assert_eq!(report.candidates, 0);
        assert_eq!(report.outcome, RunOutcome::NothingToDo);
        assert_eq!(store.commits.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn no_chunks_from_work_is_failure() {
        let dir = books_dir(&["empty.pdf", "broken.pdf"]);
        let store = ProbeStore::new();
        let ingestor = Ingestor::new(&store, &ThreePageParser, &OddPagesDoubleChunker);
        let report = ingestor.run(&books_request(dir.path())).await.unwrap();

        assert!(!report.success());
        assert_eq!(report.outcome, RunOutcome::NothingCommitted);
        assert_eq!(report.items_skipped(), 1);
        assert_eq!(report.items_failed(), 1);
        assert_eq!(store.commits.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn missing_location_is_fatal() {
        let tmp = TempDir::new().unwrap();
        let store = InMemoryCollectionStore::new();
        let ingestor = Ingestor::new(&store, &ThreePageParser, &OddPagesDoubleChunker);
        let err = ingestor
            .run(&books_request(&tmp.path().join("nope")))
            .await
            .unwrap_err();
        assert!(matches!(err, IngestError::Inventory(_)));
        assert!(store.runs().is_empty());
    }

    #[tokio::test]
    async fn degraded_resolve_is_recorded_or_fatal_when_strict() {
        let dir = books_dir(&["a.pdf"]);
        let mut store = ProbeStore::new();
        store.fail_reads = true;
        let ingestor = Ingestor::new(&store, &ThreePageParser, &OddPagesDoubleChunker);

        let mut request = books_request(dir.path());
        let report = ingestor.run(&request).await.unwrap();
        assert!(report.success());
        assert!(report
            .resolve_warning
            .as_deref()
            .unwrap()
            .contains("connection refused"));
        assert_eq!(report.chunks_committed(), 5);

        request.source.strict_resolve = true;
        let err = ingestor.run(&request).await.unwrap_err();
        assert!(matches!(err, IngestError::Resolve { .. }));
    }

    #[tokio::test]
    async fn commit_failure_is_reported() {
        let dir = books_dir(&["a.pdf"]);
        let mut store = ProbeStore::new();
        store.fail_commits = true;
        let ingestor = Ingestor::new(&store, &ThreePageParser, &OddPagesDoubleChunker);
        let report = ingestor.run(&books_request(dir.path())).await.unwrap();

        assert!(!report.success());
        assert!(matches!(report.outcome, RunOutcome::CommitFailed(ref c) if c.contains("quota")));
        assert_eq!(store.commits.load(Ordering::SeqCst), 1);
        assert_eq!(store.inner.runs()[0].outcome, "commit_failed");
        assert!(store.inner.runs()[0].added_sources.is_empty());
    }

    #[tokio::test]
    async fn dry_run_commits_nothing() {
        let dir = books_dir(&["a.pdf", "b.pdf"]);
        let store = ProbeStore::new();
        let ingestor = Ingestor::new(&store, &ThreePageParser, &OddPagesDoubleChunker);
        let mut request = books_request(dir.path());
        request.dry_run = true;

        let report = ingestor.run(&request).await.unwrap();
        assert!(report.success());
        assert_eq!(report.outcome, RunOutcome::DryRun { chunks: 10 });
        assert_eq!(store.commits.load(Ordering::SeqCst), 0);
        assert!(store.inner.runs().is_empty());
        assert!(report
            .summary_lines()
            .iter()
            .any(|l| l == "  would add: a.pdf, b.pdf"));
    }

    #[tokio::test]
    async fn limit_truncates_work_list() {
        let dir = books_dir(&["a.pdf", "b.pdf", "c.pdf"]);
        let store = InMemoryCollectionStore::new();
        let ingestor = Ingestor::new(&store, &ThreePageParser, &OddPagesDoubleChunker);
        let mut request = books_request(dir.path());
        request.limit = Some(2);

        let report = ingestor.run(&request).await.unwrap();
        assert_eq!(report.work_items, 2);
        assert_eq!(report.added_sources, vec!["a.pdf", "b.pdf"]);
    }

    #[tokio::test]
    async fn csv_rows_become_chunks() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("medqa.csv");
        fs::write(
            &path,
            "question,answer\nWhat causes anemia?,Iron deficiency is common.\nIs fever serious?,It depends on the cause.\n",
        )
        .unwrap();

        let mut source = SourceConfig::new(
            SourceKind::Csv,
            &path,
            "medical_csv_Agentic_retrieval",
            "medical",
        );
        source
            .static_fields
            .insert("focus_area".into(), "medical".into());
        let request = IngestRequest::new("medical", source);

        let store = InMemoryCollectionStore::new();
        let ingestor = Ingestor::new(&store, &ThreePageParser, &OddPagesDoubleChunker);
        let report = ingestor.run(&request).await.unwrap();
        assert_eq!(report.outcome, RunOutcome::Committed { chunks: 2 });

        let chunks = store.chunks("medical_csv_Agentic_retrieval");
        assert_eq!(chunks.len(), 2);
        assert_eq!(chunks[0].content, "Iron deficiency is common.");
        assert_eq!(
            chunks[0].metadata["question"],
            MetadataValue::from("What causes anemia?")
        );
        assert_eq!(chunks[1].content, "It depends on the cause.");
        assert_eq!(chunks[1].source(), Some("medqa.csv"));
        assert_eq!(chunks[1].metadata["domain"], MetadataValue::from("medical"));
        assert_eq!(chunks[1].metadata["focus_area"], MetadataValue::from("medical"));

        let again = ingestor.run(&request).await.unwrap();
        assert_eq!(again.outcome, RunOutcome::NothingToDo);
    }
}
