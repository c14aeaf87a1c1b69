//! Ingest progress reporting.
//!
//! Reports observable progress during `shelf ingest` so users see which
//! stage a run is in and how many items are left. Progress is emitted on
//! **stderr** so stdout remains parseable for scripts.

use std::io::Write;

/// A single progress event for an ingestion run.
#[derive(Clone, Debug, PartialEq)]
pub enum IngestProgressEvent {
    /// Reading the processed set of the target collection.
    Resolving { collection: String },
    /// Listing candidates at the source location. Total unknown.
    Discovering { collection: String },
    /// Transforming items: n done out of total.
    Transforming {
        collection: String,
        n: u64,
        total: u64,
    },
    /// Writing the batch to the collection.
    Committing { collection: String, chunks: u64 },
}

/// Reports ingest progress. Implementations write to stderr (human or JSON).
pub trait IngestProgressReporter: Send + Sync {
    /// Emit a progress event. Called from the coordinator.
    fn report(&self, event: IngestProgressEvent);
}

/// Human-friendly progress on stderr: "ingest books  transforming  12 / 40 items".
pub struct StderrProgress;

impl IngestProgressReporter for StderrProgress {
    fn report(&self, event: IngestProgressEvent) {
        let line = match &event {
            IngestProgressEvent::Resolving { collection } => {
                format!("ingest {}  resolving processed set...\n", collection)
            }
            IngestProgressEvent::Discovering { collection } => {
                format!("ingest {}  discovering...\n", collection)
            }
            IngestProgressEvent::Transforming {
                collection,
                n,
                total,
            } => format!(
                "ingest {}  transforming  {} / {} items\n",
                collection,
                format_number(*n),
                format_number(*total)
            ),
            IngestProgressEvent::Committing { collection, chunks } => format!(
                "ingest {}  committing  {} chunks\n",
                collection,
                format_number(*chunks)
            ),
        };
        let _ = std::io::stderr().lock().write_all(line.as_bytes());
        let _ = std::io::stderr().lock().flush();
    }
}

/// Machine-readable progress: one JSON object per line on stderr.
pub struct JsonProgress;

impl IngestProgressReporter for JsonProgress {
    fn report(&self, event: IngestProgressEvent) {
        let obj = match &event {
            IngestProgressEvent::Resolving { collection } => serde_json::json!({
                "event": "progress",
                "collection": collection,
                "phase": "resolving"
            }),
            IngestProgressEvent::Discovering { collection } => serde_json::json!({
                "event": "progress",
                "collection": collection,
                "phase": "discovering"
            }),
            IngestProgressEvent::Transforming {
                collection,
                n,
                total,
            } => serde_json::json!({
                "event": "progress",
                "collection": collection,
                "phase": "transforming",
                "n": n,
                "total": total
            }),
            IngestProgressEvent::Committing { collection, chunks } => serde_json::json!({
                "event": "progress",
                "collection": collection,
                "phase": "committing",
                "chunks": chunks
            }),
        };
        if let Ok(line) = serde_json::to_string(&obj) {
            let _ = writeln!(std::io::stderr().lock(), "{}", line);
            let _ = std::io::stderr().lock().flush();
        }
    }
}

/// No-op reporter when progress is disabled.
pub struct NoProgress;

impl IngestProgressReporter for NoProgress {
    fn report(&self, _event: IngestProgressEvent) {}
}

pub fn format_number(n: u64) -> String {
    let s = n.to_string();
    let mut result = String::with_capacity(s.len() + (s.len() - 1) / 3);
    let chars: Vec<char> = s.chars().rev().collect();
    for (i, c) in chars.iter().enumerate() {
        if i > 0 && i % 3 == 0 {
            result.push(',');
        }
        result.push(*c);
    }
    result.chars().rev().collect()
}

/// Progress mode for the CLI: off, human (stderr), or JSON (stderr).
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum ProgressMode {
    Off,
    Human,
    Json,
}

impl ProgressMode {
    /// Default: human progress when stderr is a TTY, otherwise off.
    pub fn default_for_tty() -> Self {
        if atty::is(atty::Stream::Stderr) {
            ProgressMode::Human
        } else {
            ProgressMode::Off
        }
    }

    /// Parse a `--progress` value. `None` for anything unrecognised.
    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "off" | "none" => Some(ProgressMode::Off),
            "human" => Some(ProgressMode::Human),
            "json" => Some(ProgressMode::Json),
            _ => None,
        }
    }

    /// Build a reporter for this mode.
    pub fn reporter(&self) -> Box<dyn IngestProgressReporter> {
        match self {
            ProgressMode::Off => Box::new(NoProgress),
            ProgressMode::Human => Box::new(StderrProgress),
            ProgressMode::Json => Box::new(JsonProgress),
        }
    }
}
