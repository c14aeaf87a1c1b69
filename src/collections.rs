//! Collection overview and processed-set listing.
//!
//! `shelf collections` prints chunk counts, distinct sources, embedding
//! coverage and the last recorded run per collection. `shelf processed`
//! prints the processed set exactly as the next ingestion run would see it.

use anyhow::{bail, Result};

use crate::config::Config;
use crate::resolve::{resolve, Resolution};
use crate::store::sqlite::SqliteCollectionStore;
use crate::store::{CollectionStore, CollectionSummary};

/// Run the collections command: query the store and print a table.
pub async fn run_collections(config: &Config) -> Result<()> {
    let store = SqliteCollectionStore::open(config).await?;
    let summaries = store.list_collections().await?;
    store.close().await;

    let db_size = std::fs::metadata(&config.db.path)
        .map(|m| m.len())
        .unwrap_or(0);

    println!("  Database:    {}", config.db.path.display());
    println!("  Size:        {}", format_bytes(db_size));
    println!();

    if summaries.is_empty() {
        println!("  No collections yet. Run `shelf ingest <profile>` first.");
        return Ok(());
    }

    for line in collection_table(&summaries) {
        println!("{}", line);
    }
    println!();
    Ok(())
}

/// Run the processed command: print one source identifier per line.
pub async fn run_processed(config: &Config, collection: &str) -> Result<()> {
    let store = SqliteCollectionStore::open(config).await?;
    let resolution = resolve(&store, collection).await;
    store.close().await;

    match resolution {
        Resolution::Found(set) => {
            for source in &set {
                println!("{}", source);
            }
            eprintln!("{} source(s) in {}", set.len(), collection);
        }
        Resolution::Missing => {
            eprintln!("collection '{}' does not exist yet", collection);
        }
        Resolution::Degraded(e) => bail!("could not read collection '{}': {}", collection, e),
    }
    Ok(())
}

fn collection_table(summaries: &[CollectionSummary]) -> Vec<String> {
    let mut lines = vec![
        format!(
            "  {:<32} {:>8} {:>8} {:>10}   {}",
            "COLLECTION", "CHUNKS", "SOURCES", "EMBEDDED", "LAST RUN"
        ),
        format!("  {}", "-".repeat(84)),
    ];
    for s in summaries {
        let last_run = match (s.last_run_at, &s.last_outcome) {
            (Some(ts), Some(outcome)) => format!("{} ({})", format_ts_relative(ts), outcome),
            (Some(ts), None) => format_ts_relative(ts),
            _ => "never".to_string(),
        };
        lines.push(format!(
            "  {:<32} {:>8} {:>8} {:>10}   {}",
            s.name, s.chunk_count, s.source_count, s.embedded_count, last_run
        ));
    }
    lines
}

/// Format a byte count as a human-readable string.
fn format_bytes(bytes: u64) -> String {
    if bytes < 1024 {
        format!("{} B", bytes)
    } else if bytes < 1024 * 1024 {
        format!("{:.1} KB", bytes as f64 / 1024.0)
    } else if bytes < 1024 * 1024 * 1024 {
        format!("{:.1} MB", bytes as f64 / (1024.0 * 1024.0))
    } else {
        format!("{:.2} GB", bytes as f64 / (1024.0 * 1024.0 * 1024.0))
    }
}

/// Format a Unix timestamp as a relative time string (e.g. "3 hours ago").
fn format_ts_relative(ts: i64) -> String {
    let now = chrono::Utc::now().timestamp();
    let delta = now - ts;

    if delta < 0 {
        return format_ts_iso(ts);
    }

    if delta < 60 {
        "just now".to_string()
    } else if delta < 3600 {
        let mins = delta / 60;
        format!("{} min{} ago", mins, if mins == 1 { "" } else { "s" })
    } else if delta < 86400 {
        let hours = delta / 3600;
        format!("{} hour{} ago", hours, if hours == 1 { "" } else { "s" })
    } else if delta < 86400 * 30 {
        let days = delta / 86400;
        format!("{} day{} ago", days, if days == 1 { "" } else { "s" })
    } else {
        format_ts_iso(ts)
    }
}

fn format_ts_iso(ts: i64) -> String {
    chrono::DateTime::from_timestamp(ts, 0)
        .map(|dt| dt.format("%Y-%m-%d %H:%M").to_string())
        .unwrap_or_else(|| ts.to_string())
}
