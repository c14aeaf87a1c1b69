//! Metadata enrichment applied to every chunk before it is committed.
//!
//! Precedence, lowest to highest: static profile fields (including
//! `domain`), the item's identity field, then the per-item override record.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::config::SourceConfig;
use crate::models::{Chunk, Metadata, MetadataValue, DOMAIN_KEY};

/// Per-item metadata overrides, keyed by source identifier in the profile.
///
/// The set of fields is fixed; unknown keys are rejected when the
/// configuration is parsed.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ItemOverrides {
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub author: Option<String>,
    #[serde(default, rename = "type")]
    pub doc_type: Option<String>,
    #[serde(default)]
    pub madhab: Option<String>,
    #[serde(default)]
    pub collection: Option<String>,
    #[serde(default)]
    pub category: Option<String>,
    #[serde(default)]
    pub classification: Option<String>,
    #[serde(default)]
    pub condition: Option<String>,
    #[serde(default)]
    pub focus_area: Option<String>,
}

impl ItemOverrides {
    /// The fields that are set, as `(metadata key, value)` pairs.
    pub fn fields(&self) -> Vec<(&'static str, &str)> {
        [
            ("title", &self.title),
            ("author", &self.author),
            ("type", &self.doc_type),
            ("madhab", &self.madhab),
            ("collection", &self.collection),
            ("category", &self.category),
            ("classification", &self.classification),
            ("condition", &self.condition),
            ("focus_area", &self.focus_area),
        ]
        .into_iter()
        .filter_map(|(key, value)| value.as_deref().map(|v| (key, v)))
        .collect()
    }
}

/// Applies a profile's metadata to chunks.
#[derive(Debug, Clone, Default)]
pub struct Enricher {
    static_fields: Metadata,
    identity_field: String,
    overrides: BTreeMap<String, ItemOverrides>,
}

impl Enricher {
    pub fn new(
        static_fields: Metadata,
        identity_field: impl Into<String>,
        overrides: BTreeMap<String, ItemOverrides>,
    ) -> Self {
        Self {
            static_fields,
            identity_field: identity_field.into(),
            overrides,
        }
    }

    /// Build the enricher for a configured source profile.
    pub fn from_source(source: &SourceConfig) -> Self {
        let mut static_fields = source.static_fields.clone();
        static_fields.insert(DOMAIN_KEY.to_string(), source.domain.clone().into());
        Self::new(
            static_fields,
            source.identity_field(),
            source.overrides.clone(),
        )
    }

    /// Enrich `chunk` in place for the item identified by `item_id`.
    pub fn enrich(&self, chunk: &mut Chunk, item_id: &str) {
        enrich(
            &mut chunk.metadata,
            &self.static_fields,
            (&self.identity_field, item_id),
            self.overrides.get(item_id),
        );
    }
}

/// Apply static fields, then the identity field, then the override record.
pub fn enrich(
    metadata: &mut Metadata,
    static_fields: &Metadata,
    identity: (&str, &str),
    overrides: Option<&ItemOverrides>,
) {
    for (key, value) in static_fields {
        metadata.insert(key.clone(), value.clone());
    }

    let (field, item_id) = identity;
    metadata.insert(field.to_string(), MetadataValue::from(item_id));

    if let Some(overrides) = overrides {
        for (key, value) in overrides.fields() {
            metadata.insert(key.to_string(), MetadataValue::from(value));
        }
    }
}
