//! `shelf sources`: configured profiles and whether their locations exist.

use anyhow::Result;

use crate::config::{Config, SourceConfig};
use crate::models::SourceKind;

pub fn list_sources(config: &Config) -> Result<()> {
    if config.sources.is_empty() {
        println!("No sources configured. Add a [sources.<name>] table to the config.");
        return Ok(());
    }

    println!(
        "{:<16} {:<8} {:<36} {:<12} HEALTHY",
        "PROFILE", "KIND", "COLLECTION", "STATUS"
    );
    for (name, source) in &config.sources {
        let (status, healthy) = location_status(source);
        println!(
            "{:<16} {:<8} {:<36} {:<12} {}",
            name,
            source.kind.to_string(),
            source.collection,
            status,
            healthy
        );
    }

    Ok(())
}

/// Health of a profile's location without reading its contents.
pub fn location_status(source: &SourceConfig) -> (&'static str, bool) {
    let location = &source.location;
    match source.kind {
        SourceKind::PdfDir if location.is_dir() => ("OK", true),
        SourceKind::Csv if location.is_file() => ("OK", true),
        _ if !location.exists() => ("MISSING", false),
        SourceKind::PdfDir => ("NOT A DIR", false),
        SourceKind::Csv => ("NOT A FILE", false),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn reports_location_health() {
        let tmp = TempDir::new().unwrap();
        let csv = tmp.path().join("qa.csv");
        std::fs::write(&csv, "question,answer\n").unwrap();

        let dir = SourceConfig::new(SourceKind::PdfDir, tmp.path(), "books", "islamic_texts");
        assert_eq!(location_status(&dir), ("OK", true));

        let file = SourceConfig::new(SourceKind::Csv, &csv, "qa", "medical");
        assert_eq!(location_status(&file), ("OK", true));

        let wrong = SourceConfig::new(SourceKind::PdfDir, &csv, "books", "islamic_texts");
        assert_eq!(location_status(&wrong), ("NOT A DIR", false));

        let gone = SourceConfig::new(SourceKind::Csv, tmp.path().join("x.csv"), "qa", "medical");
        assert_eq!(location_status(&gone), ("MISSING", false));
    }
}
