use std::collections::BTreeMap;
use std::path::Path;

use chrono::Utc;
use serde::{Deserialize, Serialize};

use crate::model::{CollectedFile, FeatureRecord, IntentCategory, TrainingExample};
use crate::store::{read_artifact, write_artifact, StoreResult};

fn now() -> String {
    Utc::now().to_rfc3339()
}

/// Discovery output: `data/collected_binaries.json`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CollectionArtifact {
    pub collection_date: String,
    pub total_files: usize,
    pub files: Vec<CollectedFile>,
}

impl CollectionArtifact {
    pub fn new(files: Vec<CollectedFile>) -> Self {
        Self { collection_date: now(), total_files: files.len(), files }
    }

    pub fn load(path: &Path) -> StoreResult<Self> {
        read_artifact(path)
    }

    pub fn save(&self, path: &Path) -> StoreResult<()> {
        write_artifact(path, self)
    }
}

/// Feature-extraction output: `data/binary_features.json`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeatureArtifact {
    pub analysis_date: String,
    pub total_binaries: usize,
    pub successful_analyses: usize,
    pub binaries: Vec<FeatureRecord>,
}

impl FeatureArtifact {
    pub fn new(binaries: Vec<FeatureRecord>) -> Self {
        let mut artifact =
            Self { analysis_date: now(), total_binaries: 0, successful_analyses: 0, binaries };
        artifact.refresh_counts();
        artifact
    }

    pub fn load(path: &Path) -> StoreResult<Self> {
        read_artifact(path)
    }

    pub fn save(&self, path: &Path) -> StoreResult<()> {
        write_artifact(path, self)
    }

    pub fn contains(&self, content_hash: &str) -> bool {
        self.binaries.iter().any(|b| b.content_hash == content_hash)
    }

    pub fn get(&self, content_hash: &str) -> Option<&FeatureRecord> {
        self.binaries.iter().find(|b| b.content_hash == content_hash)
    }

    /// Insert or replace the record for its content hash, keeping position on replace.
    pub fn upsert(&mut self, record: FeatureRecord) {
        match self.binaries.iter_mut().find(|b| b.content_hash == record.content_hash) {
            Some(slot) => *slot = record,
            None => self.binaries.push(record),
        }
        self.refresh_counts();
    }

    fn refresh_counts(&mut self) {
        self.total_binaries = self.binaries.len();
        self.successful_analyses = self.binaries.iter().filter(|b| b.extraction_succeeded).count();
    }
}

/// Persisted label store envelope: `data/labels.json`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LabelArtifact {
    pub last_updated: String,
    /// Size of the pool being labeled, as known at save time.
    pub total_binaries: usize,
    pub labeled_count: usize,
    pub labels: Vec<crate::model::LabelEntry>,
}

/// Dataset-builder output: `data/training_dataset.json`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrainingArtifact {
    pub created_at: String,
    pub total_examples: usize,
    pub label_distribution: BTreeMap<String, usize>,
    pub examples: Vec<TrainingExample>,
}

impl TrainingArtifact {
    pub fn new(examples: Vec<TrainingExample>) -> Self {
        Self {
            created_at: now(),
            total_examples: examples.len(),
            label_distribution: label_distribution(&examples),
            examples,
        }
    }

    pub fn load(path: &Path) -> StoreResult<Self> {
        read_artifact(path)
    }

    pub fn save(&self, path: &Path) -> StoreResult<()> {
        write_artifact(path, self)
    }
}

/// Per-category example counts, keyed by category name.
pub fn label_distribution(examples: &[TrainingExample]) -> BTreeMap<String, usize> {
    category_counts(examples.iter().map(|ex| ex.intent_category))
}

/// Count occurrences per category name, sorted by name.
pub fn category_counts(
    categories: impl IntoIterator<Item = IntentCategory>,
) -> BTreeMap<String, usize> {
    let mut counts = BTreeMap::new();
    for category in categories {
        *counts.entry(category.as_str().to_string()).or_insert(0) += 1;
    }
    counts
}
