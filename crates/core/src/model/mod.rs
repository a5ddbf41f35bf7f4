//! Core data model for collected binaries, feature records, labels, and
//! training examples.
//!
//! These are plain serde types. Every artifact written by the pipeline is
//! built from them, so field names here are the on-disk schema.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Coarse classification of a discovered binary.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BinaryKind {
    Executable,
    SharedLibrary,
}

impl BinaryKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            BinaryKind::Executable => "executable",
            BinaryKind::SharedLibrary => "shared_library",
        }
    }
}

/// A binary accepted by a discovery scan.
///
/// Created once per accepted file and never updated afterwards. The content
/// hash is the identity; the path is only where it was found this time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CollectedFile {
    /// Absolute location at discovery time.
    pub path: String,
    /// Lowercase hex SHA-256 of the file bytes.
    pub content_hash: String,
    pub size_bytes: u64,
    pub kind: BinaryKind,
    /// Target CPU tag, or `"unknown"`.
    pub architecture: String,
}

impl CollectedFile {
    /// File name component of `path`, or the whole path if it has none.
    pub fn file_name(&self) -> &str {
        std::path::Path::new(&self.path).file_name().and_then(|n| n.to_str()).unwrap_or(&self.path)
    }
}

/// Tool-derived summary of a single binary.
///
/// Exactly one record exists per collected content hash. A failed extraction
/// still produces a record, with `extraction_succeeded = false` and the
/// diagnostic in `error`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeatureRecord {
    pub content_hash: String,
    #[serde(default)]
    pub path: String,
    /// Undefined symbols with mangling prefixes stripped, sorted and deduplicated.
    pub imported_symbols: Vec<String>,
    /// Printable fragments in first-seen order, bounded in count and length.
    pub extracted_strings: Vec<String>,
    pub function_count: u64,
    pub instruction_count: u64,
    pub extraction_succeeded: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl FeatureRecord {
    /// An empty, failed record for `file`. Extraction fills it in.
    pub fn empty_for(file: &CollectedFile) -> Self {
        Self {
            content_hash: file.content_hash.clone(),
            path: file.path.clone(),
            imported_symbols: Vec::new(),
            extracted_strings: Vec::new(),
            function_count: 0,
            instruction_count: 0,
            extraction_succeeded: false,
            error: None,
        }
    }
}

/// Fixed set of intent labels a reviewer can assign.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IntentCategory {
    FileReader,
    FileWriter,
    DirectoryOps,
    FileManipulator,
    ArchiveTool,
    SystemUtility,
    Unknown,
}

impl IntentCategory {
    /// All categories in menu order.
    pub const ALL: [IntentCategory; 7] = [
        IntentCategory::FileReader,
        IntentCategory::FileWriter,
        IntentCategory::DirectoryOps,
        IntentCategory::FileManipulator,
        IntentCategory::ArchiveTool,
        IntentCategory::SystemUtility,
        IntentCategory::Unknown,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            IntentCategory::FileReader => "file_reader",
            IntentCategory::FileWriter => "file_writer",
            IntentCategory::DirectoryOps => "directory_ops",
            IntentCategory::FileManipulator => "file_manipulator",
            IntentCategory::ArchiveTool => "archive_tool",
            IntentCategory::SystemUtility => "system_utility",
            IntentCategory::Unknown => "unknown",
        }
    }

    /// Short description shown next to the category in the labeling menu.
    pub fn description(&self) -> &'static str {
        match self {
            IntentCategory::FileReader => "reads file contents (cat, head, less)",
            IntentCategory::FileWriter => "creates or writes files (touch, tee)",
            IntentCategory::DirectoryOps => "lists or walks directories (ls, find)",
            IntentCategory::FileManipulator => "copies, moves, or removes files (cp, mv, rm)",
            IntentCategory::ArchiveTool => "packs or compresses data (tar, gzip)",
            IntentCategory::SystemUtility => "system administration and inspection",
            IntentCategory::Unknown => "none of the above or unclear",
        }
    }
}

impl fmt::Display for IntentCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error returned when parsing a category or confidence from text.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("Invalid {field} '{value}'")]
pub struct ParseLabelError {
    pub field: &'static str,
    pub value: String,
}

impl FromStr for IntentCategory {
    type Err = ParseLabelError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let needle = s.trim().to_ascii_lowercase();
        IntentCategory::ALL.into_iter().find(|c| c.as_str() == needle).ok_or(ParseLabelError {
            field: "intent category",
            value: s.to_string(),
        })
    }
}

/// How sure the reviewer was about a label.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Confidence {
    High,
    Medium,
    Low,
}

impl Confidence {
    pub fn as_str(&self) -> &'static str {
        match self {
            Confidence::High => "high",
            Confidence::Medium => "medium",
            Confidence::Low => "low",
        }
    }
}

impl fmt::Display for Confidence {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Confidence {
    type Err = ParseLabelError;

    /// Accepts the full word or its first letter.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "h" | "high" => Ok(Confidence::High),
            "m" | "medium" => Ok(Confidence::Medium),
            "l" | "low" => Ok(Confidence::Low),
            _ => Err(ParseLabelError { field: "confidence", value: s.to_string() }),
        }
    }
}

/// A human-assigned label for one content hash.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LabelEntry {
    pub content_hash: String,
    pub intent_category: IntentCategory,
    pub confidence: Confidence,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
    /// Name of the binary when it was labeled, for human readers of the artifact.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub binary_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub labeled_at: Option<String>,
}

impl LabelEntry {
    pub fn new(
        content_hash: impl Into<String>,
        intent_category: IntentCategory,
        confidence: Confidence,
    ) -> Self {
        Self {
            content_hash: content_hash.into(),
            intent_category,
            confidence,
            notes: None,
            binary_name: None,
            labeled_at: None,
        }
    }

    /// Builder-style helper to attach notes.
    pub fn with_notes(mut self, notes: Option<String>) -> Self {
        self.notes = notes.filter(|n| !n.trim().is_empty());
        self
    }
}

/// Joined feature record and label: one row of the training set.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrainingExample {
    pub content_hash: String,
    pub path: String,
    pub imported_symbols: Vec<String>,
    pub extracted_strings: Vec<String>,
    pub function_count: u64,
    pub instruction_count: u64,
    pub extraction_succeeded: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub intent_category: IntentCategory,
    pub confidence: Confidence,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
}

impl TrainingExample {
    pub fn join(features: &FeatureRecord, label: &LabelEntry) -> Self {
        Self {
            content_hash: features.content_hash.clone(),
            path: features.path.clone(),
            imported_symbols: features.imported_symbols.clone(),
            extracted_strings: features.extracted_strings.clone(),
            function_count: features.function_count,
            instruction_count: features.instruction_count,
            extraction_succeeded: features.extraction_succeeded,
            error: features.error.clone(),
            intent_category: label.intent_category,
            confidence: label.confidence,
            notes: label.notes.clone(),
        }
    }
}
