use std::collections::{BTreeMap, HashMap};
use std::path::{Path, PathBuf};

use chrono::Utc;

use crate::model::LabelEntry;
use crate::store::{
    category_counts, read_optional_artifact, write_artifact, LabelArtifact, StoreResult,
};

/// Labels keyed by content hash, in first-labeled order.
///
/// Upserting an existing hash replaces the whole entry in place, so the
/// iteration order is stable across sessions.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LabelSet {
    entries: Vec<LabelEntry>,
    index: HashMap<String, usize>,
    /// Size of the pool being labeled; persisted as `total_binaries`.
    pub total_binaries: usize,
}

impl LabelSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build from entries; later entries for the same hash win.
    pub fn from_entries(entries: impl IntoIterator<Item = LabelEntry>) -> Self {
        let mut set = Self::new();
        for entry in entries {
            set.upsert(entry);
        }
        set
    }

    /// Insert or replace the entry for its hash. Returns the replaced entry.
    pub fn upsert(&mut self, entry: LabelEntry) -> Option<LabelEntry> {
        match self.index.get(&entry.content_hash) {
            Some(&i) => Some(std::mem::replace(&mut self.entries[i], entry)),
            None => {
                self.index.insert(entry.content_hash.clone(), self.entries.len());
                self.entries.push(entry);
                None
            }
        }
    }

    pub fn get(&self, content_hash: &str) -> Option<&LabelEntry> {
        self.index.get(content_hash).map(|&i| &self.entries[i])
    }

    pub fn contains(&self, content_hash: &str) -> bool {
        self.index.contains_key(content_hash)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &LabelEntry> {
        self.entries.iter()
    }

    pub fn entries(&self) -> &[LabelEntry] {
        &self.entries
    }

    /// Labels per category name.
    pub fn category_counts(&self) -> BTreeMap<String, usize> {
        category_counts(self.entries.iter().map(|e| e.intent_category))
    }
}

/// JSON-backed label store at a fixed path.
#[derive(Debug, Clone)]
pub struct LabelStore {
    path: PathBuf,
}

impl LabelStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Load the store. A missing file is an empty set, not an error.
    pub fn load(&self) -> StoreResult<LabelSet> {
        let Some(artifact) = read_optional_artifact::<LabelArtifact>(&self.path)? else {
            return Ok(LabelSet::new());
        };
        let mut set = LabelSet::from_entries(artifact.labels);
        set.total_binaries = artifact.total_binaries;
        Ok(set)
    }

    /// Key-wise merge: `incoming` entries replace `existing` ones wholesale,
    /// entries only in `existing` are kept.
    pub fn merge(existing: &LabelSet, incoming: &LabelSet) -> LabelSet {
        let mut merged = existing.clone();
        for entry in incoming.iter() {
            merged.upsert(entry.clone());
        }
        merged.total_binaries = existing.total_binaries.max(incoming.total_binaries);
        merged
    }

    /// Write a full snapshot of `labels`.
    pub fn save(&self, labels: &LabelSet) -> StoreResult<()> {
        let artifact = LabelArtifact {
            last_updated: Utc::now().to_rfc3339(),
            total_binaries: labels.total_binaries.max(labels.len()),
            labeled_count: labels.len(),
            labels: labels.entries().to_vec(),
        };
        write_artifact(&self.path, &artifact)
    }

    /// Load, merge `incoming` over what is on disk, and save.
    ///
    /// Entries written by other sessions since this one loaded are preserved.
    pub fn merge_and_save(&self, incoming: &LabelSet) -> StoreResult<LabelSet> {
        let on_disk = self.load()?;
        let merged = Self::merge(&on_disk, incoming);
        self.save(&merged)?;
        Ok(merged)
    }
}
