//! Per-binary feature extraction over external tool output.
//!
//! Three sub-extractions run for every file: undefined symbols, printable
//! strings, and disassembly line statistics. Each is independently fallible.
//! A record is always produced; it is marked successful only if all three
//! completed, and whatever did complete stays attached.

use std::collections::{BTreeSet, HashSet};
use std::convert::Infallible;
use std::path::Path;
use std::sync::OnceLock;

use regex::Regex;
use tracing::{debug, warn};

use crate::config::ExtractionConfig;
use crate::model::{CollectedFile, FeatureRecord};
use crate::services::tools::{Tool, ToolRunner};

/// Bounds applied to extracted strings.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StringLimits {
    pub min_len: usize,
    pub max_len: usize,
    pub max_count: usize,
}

impl StringLimits {
    pub fn from_config(config: &ExtractionConfig) -> Self {
        Self {
            min_len: config.min_string_len,
            max_len: config.max_string_len,
            max_count: config.max_strings,
        }
    }
}

impl Default for StringLimits {
    fn default() -> Self {
        Self::from_config(&ExtractionConfig::default())
    }
}

/// Line counts from a disassembly listing.
///
/// These are pattern heuristics over text output, not a semantic disassembly.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ListingStats {
    pub function_count: u64,
    pub instruction_count: u64,
}

/// Drives a `ToolRunner` to turn a collected file into a feature record.
pub struct FeatureExtractor<'a> {
    pub runner: &'a dyn ToolRunner,
    pub limits: StringLimits,
}

impl<'a> FeatureExtractor<'a> {
    pub fn new(runner: &'a dyn ToolRunner, limits: StringLimits) -> Self {
        Self { runner, limits }
    }

    /// Extract features for one file. Never fails; failures land in the record.
    pub fn extract(&self, file: &CollectedFile) -> FeatureRecord {
        let path = Path::new(&file.path);
        let mut record = FeatureRecord::empty_for(file);
        let mut errors: Vec<String> = Vec::new();

        match self.runner.run(Tool::Symbols, path) {
            Ok(out) => record.imported_symbols = parse_symbols(&out),
            Err(err) => errors.push(err.to_string()),
        }
        match self.runner.run(Tool::Strings, path) {
            Ok(out) => record.extracted_strings = filter_strings(&out, &self.limits),
            Err(err) => errors.push(err.to_string()),
        }
        match self.runner.run(Tool::Disassembly, path) {
            Ok(out) => {
                let stats = count_listing(&out);
                record.function_count = stats.function_count;
                record.instruction_count = stats.instruction_count;
            }
            Err(err) => errors.push(err.to_string()),
        }

        if errors.is_empty() {
            record.extraction_succeeded = true;
            debug!(
                path = %file.path,
                symbols = record.imported_symbols.len(),
                functions = record.function_count,
                "extracted features"
            );
        } else {
            let message = errors.join("; ");
            warn!(path = %file.path, error = %message, "feature extraction incomplete");
            record.error = Some(message);
        }
        record
    }

    /// Extract every distinct content hash in `files` once, in input order.
    ///
    /// Hashes in `skip` are not re-extracted. `on_record` sees each new record
    /// as it is produced, with its 1-based position among the files processed.
    pub fn extract_all<F>(
        &self,
        files: &[CollectedFile],
        skip: &HashSet<String>,
        mut on_record: F,
    ) -> Vec<FeatureRecord>
    where
        F: FnMut(usize, usize, &FeatureRecord),
    {
        let result = self.try_extract_all(files, skip, |i, total, record| {
            on_record(i, total, record);
            Ok::<(), Infallible>(())
        });
        match result {
            Ok(records) => records,
            Err(never) => match never {},
        }
    }

    /// Like `extract_all`, but stops at the first error returned by
    /// `on_record`; no further tools are run.
    pub fn try_extract_all<F, E>(
        &self,
        files: &[CollectedFile],
        skip: &HashSet<String>,
        mut on_record: F,
    ) -> Result<Vec<FeatureRecord>, E>
    where
        F: FnMut(usize, usize, &FeatureRecord) -> Result<(), E>,
    {
        let mut seen: HashSet<&str> = HashSet::new();
        let pending: Vec<&CollectedFile> = files
            .iter()
            .filter(|f| !skip.contains(&f.content_hash))
            .filter(|f| seen.insert(f.content_hash.as_str()))
            .collect();

        let total = pending.len();
        let mut records = Vec::with_capacity(total);
        for (i, file) in pending.into_iter().enumerate() {
            let record = self.extract(file);
            on_record(i + 1, total, &record)?;
            records.push(record);
        }
        Ok(records)
    }
}

/// Parse undefined-symbol listing lines into a sorted, deduplicated set.
///
/// The symbol is the last field of each line. Version suffixes (`@GLIBC_2.2.5`)
/// and one leading underscore are stripped so listings from different
/// platforms compare equal.
pub fn parse_symbols(listing: &str) -> Vec<String> {
    listing
        .lines()
        .filter_map(|line| line.split_whitespace().last())
        .filter(|token| !token.ends_with(':'))
        .map(normalize_symbol)
        .filter(|s| !s.is_empty())
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect()
}

pub fn normalize_symbol(raw: &str) -> String {
    let unversioned = raw.split('@').next().unwrap_or(raw);
    unversioned.strip_prefix('_').unwrap_or(unversioned).to_string()
}

/// Keep fragments whose trimmed length (in chars) is within the limits, first
/// `max_count` in order.
pub fn filter_strings(listing: &str, limits: &StringLimits) -> Vec<String> {
    listing
        .lines()
        .map(str::trim)
        .filter(|s| {
            let len = s.chars().count();
            len >= limits.min_len && len <= limits.max_len
        })
        .take(limits.max_count)
        .map(str::to_string)
        .collect()
}

fn function_label_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^[0-9A-Fa-f]+ <[^>]+>:\s*$").expect("valid regex"))
}

fn instruction_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^\s+[0-9A-Fa-f]+:\s").expect("valid regex"))
}

/// Count `0000000000001139 <main>:` labels and `    1139:\t55 ...` instruction lines.
pub fn count_listing(listing: &str) -> ListingStats {
    let mut stats = ListingStats::default();
    for line in listing.lines() {
        if function_label_re().is_match(line) {
            stats.function_count += 1;
        } else if instruction_re().is_match(line) {
            stats.instruction_count += 1;
        }
    }
    stats
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn symbols_are_normalized_and_deduplicated() {
        let listing = concat!(
            "                 U fopen@GLIBC_2.2.5\n",
            "                 U fclose@@GLIBC_2.2.5\n",
            "                 w __gmon_start__\n",
            "                 U _fopen\n\n",
        );
        assert_eq!(parse_symbols(listing), vec!["_gmon_start__", "fclose", "fopen"]);
    }

    #[test]
    fn symbol_listing_ignores_file_headers() {
        let listing = "/bin/ls:\n                 U opendir\n";
        assert_eq!(parse_symbols(listing), vec!["opendir"]);
    }

    #[test]
    fn strings_are_windowed_and_capped() {
        let limits = StringLimits { min_len: 4, max_len: 8, max_count: 2 };
        let listing = "abc\n  /etc/passwd  \nvalid\ntoo-long-fragment\nlater\n";
        // "/etc/passwd" is 11 chars, over the max.
        assert_eq!(filter_strings(listing, &limits), vec!["valid", "later"]);
    }

    #[test]
    fn listing_counts_labels_and_instructions() {
        let listing = "\n/bin/true:     file format elf64-x86-64\n\n\
Disassembly of section .text:\n\n\
0000000000001139 <main>:\n    1139:\t55                   \tpush   %rbp\n    113a:\t48 89 e5             \tmov    %rsp,%rbp\n\n\
0000000000001140 <helper>:\n    1140:\tc3                   \tret\n";
        let stats = count_listing(listing);
        assert_eq!(stats, ListingStats { function_count: 2, instruction_count: 3 });
    }
}
