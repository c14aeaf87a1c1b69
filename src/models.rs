//! Core data models used throughout the ingestion pipeline.
//!
//! These types represent the candidates, pages, and chunks that flow from
//! the source inventory through transformation into a collection.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::path::{Path, PathBuf};

/// Metadata key carrying the provenance identifier used for deduplication.
pub const SOURCE_KEY: &str = "source";
/// Metadata key carrying the coarse topical partition.
pub const DOMAIN_KEY: &str = "domain";

/// A scalar metadata value.
///
/// Collections only store flat scalar metadata, so nested values are not
/// representable by construction.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum MetadataValue {
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(String),
}

impl MetadataValue {
    pub fn as_str(&self) -> Option<&str> {
        match self {
            MetadataValue::Str(s) => Some(s),
            _ => None,
        }
    }
}

impl fmt::Display for MetadataValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MetadataValue::Bool(b) => write!(f, "{}", b),
            MetadataValue::Int(i) => write!(f, "{}", i),
            MetadataValue::Float(x) => write!(f, "{}", x),
            MetadataValue::Str(s) => f.write_str(s),
        }
    }
}

impl From<&str> for MetadataValue {
    fn from(s: &str) -> Self {
        MetadataValue::Str(s.to_string())
    }
}

impl From<String> for MetadataValue {
    fn from(s: String) -> Self {
        MetadataValue::Str(s)
    }
}

impl From<i64> for MetadataValue {
    fn from(i: i64) -> Self {
        MetadataValue::Int(i)
    }
}

/// Chunk metadata. Ordered so that stored JSON is stable across runs.
pub type Metadata = BTreeMap<String, MetadataValue>;

/// The kind of input a source profile points at.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SourceKind {
    /// A directory of PDF books; one candidate per file.
    PdfDir,
    /// A question/answer CSV file; one candidate per file, one item per row.
    Csv,
}

impl fmt::Display for SourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SourceKind::PdfDir => f.write_str("pdf_dir"),
            SourceKind::Csv => f.write_str("csv"),
        }
    }
}

/// A deduplication unit produced by the source inventory.
///
/// `id` is the file name and is compared against the processed set.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Candidate {
    pub id: String,
    pub path: PathBuf,
    pub kind: SourceKind,
}

/// Text of a single parsed page (1-based page number).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageText {
    pub page: u32,
    pub text: String,
}

/// The atomic retrievable unit stored in a collection.
#[derive(Debug, Clone, PartialEq)]
pub struct Chunk {
    pub id: String,
    pub content: String,
    pub metadata: Metadata,
}

impl Chunk {
    /// Create a chunk with empty metadata.
    pub fn new(id: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            content: content.into(),
            metadata: Metadata::new(),
        }
    }

    /// The raw `source` metadata value, if present and a string.
    pub fn source(&self) -> Option<&str> {
        self.metadata.get(SOURCE_KEY).and_then(MetadataValue::as_str)
    }
}

/// Project a stored `source` value onto its file-name component.
///
/// `"islamic_texts/b.pdf"` and `"b.pdf"` both resolve to `"b.pdf"`.
pub fn source_base_name(source: &str) -> Option<String> {
    Path::new(source)
        .file_name()
        .map(|n| n.to_string_lossy().to_string())
}
