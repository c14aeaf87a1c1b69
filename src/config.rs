use anyhow::{bail, Context, Result};
use serde::Deserialize;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use crate::metadata::ItemOverrides;
use crate::models::{Metadata, SourceKind, DOMAIN_KEY, SOURCE_KEY};

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    pub db: DbConfig,
    #[serde(default)]
    pub chunking: ChunkingConfig,
    #[serde(default)]
    pub embedding: EmbeddingConfig,
    #[serde(default)]
    pub commit: CommitConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
    #[serde(default)]
    pub sources: BTreeMap<String, SourceConfig>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct DbConfig {
    pub path: PathBuf,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ChunkingConfig {
    #[serde(default = "default_max_chars")]
    pub max_chars: usize,
    #[serde(default = "default_overlap_chars")]
    pub overlap_chars: usize,
}

impl Default for ChunkingConfig {
    fn default() -> Self {
        Self {
            max_chars: default_max_chars(),
            overlap_chars: default_overlap_chars(),
        }
    }
}

fn default_max_chars() -> usize {
    2000
}
fn default_overlap_chars() -> usize {
    200
}

#[derive(Debug, Deserialize, Clone)]
pub struct EmbeddingConfig {
    #[serde(default = "default_provider")]
    pub provider: String,
    #[serde(default)]
    pub model: Option<String>,
    #[serde(default)]
    pub dims: Option<usize>,
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            provider: "disabled".to_string(),
            model: None,
            dims: None,
            batch_size: 64,
            max_retries: 5,
            timeout_secs: 30,
        }
    }
}

fn default_provider() -> String {
    "disabled".to_string()
}
fn default_batch_size() -> usize {
    64
}
fn default_max_retries() -> u32 {
    5
}
fn default_timeout_secs() -> u64 {
    30
}

impl EmbeddingConfig {
    pub fn is_enabled(&self) -> bool {
        self.provider != "disabled"
    }
}

/// Timeout and retry policy for the single commit call of a run.
#[derive(Debug, Deserialize, Clone)]
pub struct CommitConfig {
    #[serde(default = "default_commit_timeout_secs")]
    pub timeout_secs: u64,
    #[serde(default = "default_retry_transient")]
    pub retry_transient: bool,
}

impl Default for CommitConfig {
    fn default() -> Self {
        Self {
            timeout_secs: default_commit_timeout_secs(),
            retry_transient: default_retry_transient(),
        }
    }
}

fn default_commit_timeout_secs() -> u64 {
    300
}
fn default_retry_transient() -> bool {
    true
}

#[derive(Debug, Deserialize, Clone)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

/// A named ingestion profile: one location feeding one collection.
#[derive(Debug, Deserialize, Clone)]
pub struct SourceConfig {
    pub kind: SourceKind,
    pub location: PathBuf,
    pub collection: String,
    pub domain: String,
    #[serde(default = "default_extension")]
    pub extension: String,
    #[serde(default)]
    pub identity_field: Option<String>,
    #[serde(default)]
    pub exclude_globs: Vec<String>,
    #[serde(default = "default_question_column")]
    pub question_column: String,
    #[serde(default = "default_answer_column")]
    pub answer_column: String,
    #[serde(default)]
    pub strict_resolve: bool,
    #[serde(default)]
    pub static_fields: Metadata,
    #[serde(default)]
    pub overrides: BTreeMap<String, ItemOverrides>,
}

fn default_extension() -> String {
    ".pdf".to_string()
}
fn default_question_column() -> String {
    "question".to_string()
}
fn default_answer_column() -> String {
    "answer".to_string()
}

impl SourceConfig {
    /// A profile with every optional setting at its default.
    pub fn new(
        kind: SourceKind,
        location: impl Into<PathBuf>,
        collection: impl Into<String>,
        domain: impl Into<String>,
    ) -> Self {
        Self {
            kind,
            location: location.into(),
            collection: collection.into(),
            domain: domain.into(),
            extension: default_extension(),
            identity_field: None,
            exclude_globs: Vec::new(),
            question_column: default_question_column(),
            answer_column: default_answer_column(),
            strict_resolve: false,
            static_fields: Metadata::new(),
            overrides: BTreeMap::new(),
        }
    }

    /// Metadata key that receives the item's file name during enrichment.
    pub fn identity_field(&self) -> &str {
        match (&self.identity_field, self.kind) {
            (Some(field), _) => field,
            (None, SourceKind::PdfDir) => "book_file",
            (None, SourceKind::Csv) => "source",
        }
    }
}

pub fn load_config(path: &Path) -> Result<Config> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;

    parse_config(&content)
}

pub fn parse_config(content: &str) -> Result<Config> {
    let config: Config = toml::from_str(content).with_context(|| "Failed to parse config file")?;

    // Validate chunking
    if config.chunking.max_chars == 0 {
        bail!("chunking.max_chars must be > 0");
    }
    if config.chunking.overlap_chars >= config.chunking.max_chars {
        bail!("chunking.overlap_chars must be smaller than chunking.max_chars");
    }

    // Validate commit
    if config.commit.timeout_secs == 0 {
        bail!("commit.timeout_secs must be > 0");
    }

    // Validate embedding
    if config.embedding.is_enabled() {
        if config.embedding.dims.is_none() || config.embedding.dims == Some(0) {
            bail!(
                "embedding.dims must be > 0 when provider is '{}'",
                config.embedding.provider
            );
        }
        if config.embedding.model.is_none() {
            bail!(
                "embedding.model must be specified when provider is '{}'",
                config.embedding.provider
            );
        }
        if config.embedding.batch_size == 0 {
            bail!("embedding.batch_size must be > 0");
        }
    }

    match config.embedding.provider.as_str() {
        "disabled" | "openai" => {}
        other => bail!(
            "Unknown embedding provider: '{}'. Must be disabled or openai.",
            other
        ),
    }

    // Validate sources
    for (name, source) in &config.sources {
        if source.collection.trim().is_empty() {
            bail!("sources.{}.collection must not be empty", name);
        }
        if source.domain.trim().is_empty() {
            bail!("sources.{}.domain must not be empty", name);
        }
        // `source` feeds the processed set and `domain` is set from the profile.
        for key in [SOURCE_KEY, DOMAIN_KEY] {
            if source.static_fields.contains_key(key) {
                bail!("sources.{}.static_fields must not set '{}'", name, key);
            }
        }
        if source.identity_field() == DOMAIN_KEY {
            bail!("sources.{}.identity_field must not be '{}'", name, DOMAIN_KEY);
        }
        match source.kind {
            SourceKind::PdfDir if source.extension.is_empty() => {
                bail!("sources.{}.extension must not be empty", name);
            }
            SourceKind::Csv
                if source.question_column.is_empty() || source.answer_column.is_empty() =>
            {
                bail!(
                    "sources.{}.question_column and answer_column must not be empty",
                    name
                );
            }
            _ => {}
        }
    }

    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::MetadataValue;

    const BASE: &str = r#"
[db]
path = "./data/shelf.sqlite"
"#;

    #[test]
    fn defaults_apply() {
        let cfg = parse_config(BASE).unwrap();
        assert_eq!(cfg.chunking.max_chars, 2000);
        assert_eq!(cfg.chunking.overlap_chars, 200);
        assert!(!cfg.embedding.is_enabled());
        assert_eq!(cfg.commit.timeout_secs, 300);
        assert!(cfg.commit.retry_transient);
        assert_eq!(cfg.logging.level, "info");
        assert!(cfg.sources.is_empty());
    }

    #[test]
    fn parses_source_profiles() {
        let toml = format!(
            r#"{}
[sources.books]
kind = "pdf_dir"
location = "islamic_texts"
collection = "islamic_texts_Agentic_retrieval"
domain = "islamic_texts"

[sources.books.overrides."umdat_al-salik.pdf"]
madhab = "shafii"
type = "fiqh"
author = "Ahmad ibn Naqib al-Misri"

[sources.medical]
kind = "csv"
location = "medical_dataset/medqa.csv"
collection = "medical_csv_Agentic_retrieval"
domain = "medical"

[sources.medical.static_fields]
focus_area = "medical"
condition = "general_medical"
"#,
            BASE
        );
        let cfg = parse_config(&toml).unwrap();

        let books = &cfg.sources["books"];
        assert_eq!(books.kind, SourceKind::PdfDir);
        assert_eq!(books.extension, ".pdf");
        assert_eq!(books.identity_field(), "book_file");
        let ov = &books.overrides["umdat_al-salik.pdf"];
        assert_eq!(ov.madhab.as_deref(), Some("shafii"));
        assert_eq!(ov.doc_type.as_deref(), Some("fiqh"));

        let medical = &cfg.sources["medical"];
        assert_eq!(medical.kind, SourceKind::Csv);
        assert_eq!(medical.identity_field(), "source");
        assert_eq!(medical.question_column, "question");
        assert_eq!(
            medical.static_fields["condition"],
            MetadataValue::Str("general_medical".into())
        );
    }

    #[test]
    fn rejects_overlap_not_smaller_than_max() {
        let toml = format!("{}\n[chunking]\nmax_chars = 100\noverlap_chars = 100\n", BASE);
        assert!(parse_config(&toml).is_err());
    }

    #[test]
    fn rejects_enabled_embedding_without_model() {
        let toml = format!("{}\n[embedding]\nprovider = \"openai\"\ndims = 8\n", BASE);
        let err = parse_config(&toml).unwrap_err();
        assert!(err.to_string().contains("embedding.model"));
    }

    #[test]
    fn rejects_unknown_provider() {
        let toml = format!(
            "{}\n[embedding]\nprovider = \"magic\"\nmodel = \"m\"\ndims = 8\n",
            BASE
        );
        assert!(parse_config(&toml).is_err());
    }

    #[test]
    fn rejects_unknown_override_field() {
        let toml = format!(
            r#"{}
[sources.books]
kind = "pdf_dir"
location = "x"
collection = "c"
domain = "d"
[sources.books.overrides."a.pdf"]
colour = "blue"
"#,
            BASE
        );
        assert!(parse_config(&toml).is_err());
    }

    fn books_with(extra: &str) -> String {
        format!(
            r#"{}
[sources.books]
kind = "pdf_dir"
location = "x"
collection = "c"
domain = "d"
{}
"#,
            BASE, extra
        )
    }

    #[test]
    fn rejects_static_source_field() {
        let err = parse_config(&books_with("[sources.books.static_fields]\nsource = \"library\"\n"))
            .unwrap_err();
        assert!(err.to_string().contains("must not set 'source'"));
    }

    #[test]
    fn rejects_static_domain_field() {
        let err = parse_config(&books_with("[sources.books.static_fields]\ndomain = \"other\"\n"))
            .unwrap_err();
        assert!(err.to_string().contains("must not set 'domain'"));
    }

    #[test]
    fn rejects_domain_as_identity_field() {
        let err = parse_config(&books_with("identity_field = \"domain\"\n")).unwrap_err();
        assert!(err.to_string().contains("identity_field"));
    }

    #[test]
    fn source_as_identity_field_is_allowed() {
        let cfg = parse_config(&books_with("identity_field = \"source\"\n")).unwrap();
        assert_eq!(cfg.sources["books"].identity_field(), "source");
    }
}
