//! Advisory category suggestions from imported symbols.
//!
//! Pure scoring over a `FeatureRecord`. A suggestion is only ever shown to the
//! reviewer; it is never written to the label store on its own.

use serde::Serialize;

use crate::model::{FeatureRecord, IntentCategory};

/// Symbols (after normalization) that hint at each category.
const KEYWORDS: &[(IntentCategory, &[&str])] = &[
    (
        IntentCategory::FileReader,
        &["fopen", "fread", "fgets", "getline", "read", "pread", "mmap", "open", "openat"],
    ),
    (
        IntentCategory::FileWriter,
        &["fwrite", "fputs", "fprintf", "write", "pwrite", "creat", "ftruncate", "fsync"],
    ),
    (
        IntentCategory::DirectoryOps,
        &[
            "opendir", "readdir", "closedir", "fts_open", "fts_read", "nftw", "scandir", "mkdir",
            "rmdir",
        ],
    ),
    (
        IntentCategory::FileManipulator,
        &[
            "rename", "renameat", "unlink", "unlinkat", "link", "symlink", "chmod", "fchmod",
            "chown", "utimensat",
        ],
    ),
    (
        IntentCategory::ArchiveTool,
        &[
            "deflate",
            "inflate",
            "gzopen",
            "BZ2_bzCompress",
            "lzma_code",
            "archive_read_new",
            "ZSTD_compress",
        ],
    ),
    (
        IntentCategory::SystemUtility,
        &[
            "sysconf", "uname", "getpwuid", "ioctl", "mount", "kill", "setuid", "sysctl",
            "getrlimit",
        ],
    ),
];

/// One ranked suggestion.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Suggestion {
    pub category: IntentCategory,
    pub score: usize,
    pub matched: Vec<String>,
}

/// Score every category by keyword overlap, highest first. Categories without
/// any hit are left out; ties keep menu order.
pub fn suggest_categories(record: &FeatureRecord) -> Vec<Suggestion> {
    let mut ranked: Vec<Suggestion> = KEYWORDS
        .iter()
        .filter_map(|(category, keywords)| {
            let matched: Vec<String> = record
                .imported_symbols
                .iter()
                .filter(|sym| keywords.contains(&sym.as_str()))
                .cloned()
                .collect();
            (!matched.is_empty()).then(|| Suggestion {
                category: *category,
                score: matched.len(),
                matched,
            })
        })
        .collect();
    ranked.sort_by(|a, b| b.score.cmp(&a.score));
    ranked
}

/// Best suggestion, if any symbol matched at all.
pub fn suggest_category(record: &FeatureRecord) -> Option<Suggestion> {
    suggest_categories(record).into_iter().next()
}
