//! Join feature records with labels into training examples.

use std::collections::{BTreeMap, HashMap, HashSet};
use std::path::PathBuf;

use serde::Serialize;
use thiserror::Error;
use tracing::warn;

use crate::config::{DuplicatePolicy, PipelineLayout};
use crate::model::{FeatureRecord, TrainingExample};
use crate::services::discovery::{find_duplicate_hashes, DuplicateHash};
use crate::store::{
    label_distribution, read_optional_artifact, CollectionArtifact, FeatureArtifact, LabelSet,
    LabelStore, StoreError,
};

#[derive(Debug, Error)]
pub enum DatasetError {
    /// A required input artifact is absent; nothing is built.
    #[error("Missing {what} at {path}. Run `{stage}` first.")]
    MissingInput { what: &'static str, stage: &'static str, path: PathBuf },
    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Diagnostics produced alongside the examples.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct DatasetReport {
    pub total_labels: usize,
    pub matched: usize,
    /// Label hashes with no feature record, in label order.
    pub unmatched_labels: Vec<String>,
    /// Hashes collected at more than one path.
    pub duplicate_hashes: Vec<DuplicateHash>,
    /// Label hashes left out under `DuplicatePolicy::Exclude`.
    pub excluded_duplicates: Vec<String>,
    pub label_distribution: BTreeMap<String, usize>,
}

#[derive(Debug, Clone, Default)]
pub struct DatasetBuild {
    pub examples: Vec<TrainingExample>,
    pub report: DatasetReport,
}

/// Joins on content hash. Output order follows label order.
#[derive(Debug, Clone, Default)]
pub struct DatasetBuilder {
    pub duplicate_policy: DuplicatePolicy,
    /// Duplicate hashes known from discovery.
    pub duplicates: Vec<DuplicateHash>,
}

impl DatasetBuilder {
    pub fn new(duplicate_policy: DuplicatePolicy) -> Self {
        Self { duplicate_policy, duplicates: Vec::new() }
    }

    pub fn with_duplicates(mut self, duplicates: Vec<DuplicateHash>) -> Self {
        self.duplicates = duplicates;
        self
    }

    pub fn build(&self, features: &[FeatureRecord], labels: &LabelSet) -> DatasetBuild {
        let mut by_hash: HashMap<&str, &FeatureRecord> = HashMap::with_capacity(features.len());
        for record in features {
            if by_hash.insert(record.content_hash.as_str(), record).is_some() {
                warn!(hash = %record.content_hash, "hash appears twice in features; last one wins");
            }
        }

        for dup in &self.duplicates {
            warn!(
                hash = %dup.content_hash,
                paths = ?dup.paths,
                policy = ?self.duplicate_policy,
                "content hash collected at multiple paths"
            );
        }
        let duplicate_set: HashSet<&str> =
            self.duplicates.iter().map(|d| d.content_hash.as_str()).collect();

        let mut report = DatasetReport {
            total_labels: labels.len(),
            duplicate_hashes: self.duplicates.clone(),
            ..DatasetReport::default()
        };
        let mut examples = Vec::new();
        for label in labels.iter() {
            let Some(record) = by_hash.get(label.content_hash.as_str()) else {
                warn!(hash = %label.content_hash, "label has no matching feature record");
                report.unmatched_labels.push(label.content_hash.clone());
                continue;
            };
            if self.duplicate_policy == DuplicatePolicy::Exclude
                && duplicate_set.contains(label.content_hash.as_str())
            {
                report.excluded_duplicates.push(label.content_hash.clone());
                continue;
            }
            examples.push(TrainingExample::join(record, label));
        }

        report.matched = examples.len();
        report.label_distribution = label_distribution(&examples);
        DatasetBuild { examples, report }
    }

    /// Load inputs from `layout`, checking they exist, then build.
    ///
    /// The collection artifact is optional and only feeds duplicate detection.
    pub fn build_from_layout(&self, layout: &PipelineLayout) -> Result<DatasetBuild, DatasetError> {
        if !layout.features_path.is_file() {
            return Err(DatasetError::MissingInput {
                what: "feature artifact",
                stage: "extract",
                path: layout.features_path.clone(),
            });
        }
        if !layout.labels_path.is_file() {
            return Err(DatasetError::MissingInput {
                what: "label artifact",
                stage: "label",
                path: layout.labels_path.clone(),
            });
        }
        let features = FeatureArtifact::load(&layout.features_path)?;
        let labels = LabelStore::new(&layout.labels_path).load()?;

        let mut builder = self.clone();
        if builder.duplicates.is_empty() {
            if let Some(collection) =
                read_optional_artifact::<CollectionArtifact>(&layout.collection_path)?
            {
                builder.duplicates = find_duplicate_hashes(&collection.files);
            }
        }
        Ok(builder.build(&features.binaries, &labels))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Confidence, IntentCategory, LabelEntry};

    fn record(hash: &str) -> FeatureRecord {
        FeatureRecord {
            content_hash: hash.into(),
            path: format!("/bin/{hash}"),
            imported_symbols: vec!["fopen".into()],
            extracted_strings: vec![],
            function_count: 1,
            instruction_count: 10,
            extraction_succeeded: true,
            error: None,
        }
    }

    #[test]
    fn output_follows_label_order() {
        let features = vec![record("a"), record("b")];
        let labels = LabelSet::from_entries([
            LabelEntry::new("b", IntentCategory::FileWriter, Confidence::High),
            LabelEntry::new("a", IntentCategory::FileReader, Confidence::High),
        ]);
        let build = DatasetBuilder::default().build(&features, &labels);
        let hashes: Vec<&str> = build.examples.iter().map(|e| e.content_hash.as_str()).collect();
        assert_eq!(hashes, vec!["b", "a"]);
        assert_eq!(build.report.label_distribution.get("file_writer"), Some(&1));
    }

    #[test]
    fn exclude_policy_drops_duplicated_hashes() {
        let features = vec![record("a"), record("b")];
        let labels = LabelSet::from_entries([
            LabelEntry::new("a", IntentCategory::FileReader, Confidence::High),
            LabelEntry::new("b", IntentCategory::FileReader, Confidence::Low),
        ]);
        let dup =
            DuplicateHash { content_hash: "a".into(), paths: vec!["/x/a".into(), "/y/a".into()] };

        let keep = DatasetBuilder::new(DuplicatePolicy::Keep)
            .with_duplicates(vec![dup.clone()])
            .build(&features, &labels);
        assert_eq!(keep.examples.len(), 2);
        assert_eq!(keep.report.duplicate_hashes.len(), 1);

        let exclude = DatasetBuilder::new(DuplicatePolicy::Exclude)
            .with_duplicates(vec![dup])
            .build(&features, &labels);
        assert_eq!(exclude.examples.len(), 1);
        assert_eq!(exclude.report.excluded_duplicates, vec!["a".to_string()]);
    }
}
