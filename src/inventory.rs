//! Source inventory: enumerate candidate files for a source profile.
//!
//! Directory sources list files directly inside the location whose name
//! ends with the configured extension (case-sensitive). Tabular sources
//! validate the CSV header and yield the file itself as the only candidate.

use globset::{Glob, GlobSet, GlobSetBuilder};
use std::path::Path;
use walkdir::WalkDir;

use crate::config::SourceConfig;
use crate::error::InventoryError;
use crate::models::{source_base_name, Candidate, SourceKind};

/// List the candidates for a configured source, in deterministic order.
pub fn list_candidates(source: &SourceConfig) -> Result<Vec<Candidate>, InventoryError> {
    match source.kind {
        SourceKind::PdfDir => {
            list_directory(&source.location, &source.extension, &source.exclude_globs)
        }
        SourceKind::Csv => {
            let required = [source.question_column.as_str(), source.answer_column.as_str()];
            inspect_table(&source.location, &required).map(|c| vec![c])
        }
    }
}

/// List files in `dir` (non-recursive) whose names end with `extension`.
pub fn list_directory(
    dir: &Path,
    extension: &str,
    exclude_globs: &[String],
) -> Result<Vec<Candidate>, InventoryError> {
    if !dir.exists() {
        return Err(InventoryError::Missing(dir.to_path_buf()));
    }
    if !dir.is_dir() {
        return Err(InventoryError::NotADirectory(dir.to_path_buf()));
    }

    let exclude_set = build_globset(exclude_globs)?;
    let mut candidates = Vec::new();

    let walker = WalkDir::new(dir)
        .min_depth(1)
        .max_depth(1)
        .sort_by_file_name();
    for entry in walker {
        let entry = entry.map_err(|e| InventoryError::Unreadable {
            path: dir.to_path_buf(),
            source: e.into(),
        })?;
        // Follows symlinks so a linked book counts like a regular file.
        if !entry.path().is_file() {
            continue;
        }

        let name = entry.file_name().to_string_lossy().to_string();
        if !name.ends_with(extension) {
            continue;
        }
        if exclude_set.is_match(&name) {
            continue;
        }

        candidates.push(Candidate {
            id: name,
            path: entry.path().to_path_buf(),
            kind: SourceKind::PdfDir,
        });
    }

    Ok(candidates)
}

/// Validate a CSV header and return the file as a single candidate.
pub fn inspect_table(path: &Path, required: &[&str]) -> Result<Candidate, InventoryError> {
    if !path.exists() {
        return Err(InventoryError::Missing(path.to_path_buf()));
    }
    if path.is_dir() {
        return Err(InventoryError::Unreadable {
            path: path.to_path_buf(),
            source: std::io::Error::new(std::io::ErrorKind::InvalidInput, "is a directory"),
        });
    }

    let mut reader = csv::Reader::from_path(path).map_err(|e| InventoryError::Csv {
        path: path.to_path_buf(),
        source: e,
    })?;
    let found: Vec<String> = reader
        .headers()
        .map_err(|e| InventoryError::Csv {
            path: path.to_path_buf(),
            source: e,
        })?
        .iter()
        .map(|h| h.to_string())
        .collect();

    let missing: Vec<String> = required
        .iter()
        .filter(|col| !found.iter().any(|h| h == *col))
        .map(|col| col.to_string())
        .collect();
    if !missing.is_empty() {
        return Err(InventoryError::MissingColumns {
            path: path.to_path_buf(),
            missing,
            found,
        });
    }

    let id = source_base_name(&path.to_string_lossy()).unwrap_or_default();
    Ok(Candidate {
        id,
        path: path.to_path_buf(),
        kind: SourceKind::Csv,
    })
}

fn build_globset(patterns: &[String]) -> Result<GlobSet, InventoryError> {
    let mut builder = GlobSetBuilder::new();
    for pattern in patterns {
        builder.add(Glob::new(pattern)?);
    }
    Ok(builder.build()?)
}
