//! Per-item transformation: one source item in, zero or more chunks out.
//!
//! Every item produces an explicit [`ItemOutcome`]; nothing here returns
//! early for the whole batch. A PDF is one item. A CSV file expands into
//! one item per data row, identified as `<file>#row<N>`.

use std::path::Path;

use tracing::debug;

use crate::chunk::{derive_id, Chunker};
use crate::models::{Candidate, Chunk, MetadataValue, SourceKind, SOURCE_KEY};
use crate::parse::DocumentParser;

/// Result of transforming a single item.
#[derive(Debug, Clone, PartialEq)]
pub enum ItemOutcome {
    /// The item produced at least one chunk.
    Chunked(Vec<Chunk>),
    /// The item produced nothing to ingest; not a failure.
    Skipped(String),
    /// The item could not be transformed.
    Failed(String),
}

/// An item identifier paired with its outcome.
#[derive(Debug, Clone, PartialEq)]
pub struct TransformedItem {
    pub item: String,
    pub outcome: ItemOutcome,
}

impl TransformedItem {
    fn new(item: impl Into<String>, outcome: ItemOutcome) -> Self {
        Self {
            item: item.into(),
            outcome,
        }
    }
}

/// Column names read from question/answer tables.
#[derive(Debug, Clone)]
pub struct TableColumns {
    pub question: String,
    pub answer: String,
}

impl Default for TableColumns {
    fn default() -> Self {
        Self {
            question: "question".to_string(),
            answer: "answer".to_string(),
        }
    }
}

pub struct Transformer<'a> {
    parser: &'a dyn DocumentParser,
    chunker: &'a dyn Chunker,
    columns: TableColumns,
}

impl<'a> Transformer<'a> {
    pub fn new(
        parser: &'a dyn DocumentParser,
        chunker: &'a dyn Chunker,
        columns: TableColumns,
    ) -> Self {
        Self {
            parser,
            chunker,
            columns,
        }
    }

    /// Transform every item of a candidate.
    pub fn transform(&self, candidate: &Candidate) -> Vec<TransformedItem> {
        match candidate.kind {
            SourceKind::PdfDir => vec![TransformedItem::new(
                candidate.id.clone(),
                self.transform_document(&candidate.path),
            )],
            SourceKind::Csv => self.transform_table(candidate),
        }
    }

    /// Parse and chunk one document. The chunks' `source` is the path as
    /// it was listed (location joined with the file name).
    pub fn transform_document(&self, path: &Path) -> ItemOutcome {
        let pages = match self.parser.parse(path) {
            Ok(pages) => pages,
            Err(e) => return ItemOutcome::Failed(e.to_string()),
        };
        if pages.is_empty() {
            return ItemOutcome::Skipped("no content".to_string());
        }
        debug!(path = %path.display(), pages = pages.len(), "parsed document");

        let source = path.to_string_lossy();
        let chunks = self.chunker.build_chunks(&pages, &source);
        if chunks.is_empty() {
            return ItemOutcome::Skipped("no chunks".to_string());
        }
        ItemOutcome::Chunked(chunks)
    }

    /// One chunk per data row: the answer is the content, the question is
    /// metadata, and the CSV file name is the `source`.
    pub fn transform_table(&self, candidate: &Candidate) -> Vec<TransformedItem> {
        let mut reader = match csv::Reader::from_path(&candidate.path) {
            Ok(r) => r,
            Err(e) => {
                return vec![TransformedItem::new(
                    candidate.id.clone(),
                    ItemOutcome::Failed(e.to_string()),
                )]
            }
        };

        let headers = match reader.headers() {
            Ok(h) => h.clone(),
            Err(e) => {
                return vec![TransformedItem::new(
                    candidate.id.clone(),
                    ItemOutcome::Failed(e.to_string()),
                )]
            }
        };
        let (question_idx, answer_idx) = match (
            headers.iter().position(|h| h == self.columns.question),
            headers.iter().position(|h| h == self.columns.answer),
        ) {
            (Some(q), Some(a)) => (q, a),
            _ => {
                return vec![TransformedItem::new(
                    candidate.id.clone(),
                    ItemOutcome::Failed(format!(
                        "missing '{}' or '{}' column",
                        self.columns.question, self.columns.answer
                    )),
                )]
            }
        };

        let mut items = Vec::new();
        for (i, record) in reader.records().enumerate() {
            let row = i + 1;
            let item = format!("{}#row{}", candidate.id, row);

            let record = match record {
                Ok(r) => r,
                Err(e) => {
                    items.push(TransformedItem::new(item, ItemOutcome::Failed(e.to_string())));
                    continue;
                }
            };

            let answer = record.get(answer_idx).unwrap_or_default().trim();
            if answer.is_empty() {
                items.push(TransformedItem::new(
                    item,
                    ItemOutcome::Skipped("empty answer".to_string()),
                ));
                continue;
            }
            let question = record.get(question_idx).unwrap_or_default().trim();

            let mut chunk = Chunk::new(
                derive_id(&candidate.id, &format!("row{}", row), answer),
                answer,
            );
            chunk
                .metadata
                .insert(SOURCE_KEY.to_string(), MetadataValue::from(candidate.id.as_str()));
            chunk
                .metadata
                .insert("question".to_string(), MetadataValue::from(question));
            chunk
                .metadata
                .insert("row".to_string(), MetadataValue::Int(row as i64));

            items.push(TransformedItem::new(item, ItemOutcome::Chunked(vec![chunk])));
        }

        items
    }
}
