//! Interactive labeling session.
//!
//! An explicit state machine over any `BufRead`/`Write` pair:
//!
//! ```text
//! Prompting -> AwaitingCategory -> AwaitingConfidence -> (save) -> Prompting
//!     |               |                   |
//!     +---- quit / end of queue ----------+--> Reviewing -> Done
//! ```
//!
//! The label set is saved as a full snapshot after every confirmed
//! assignment. Quitting before a confidence is chosen records nothing for the
//! current item.

use std::io::{self, BufRead, Write};

use chrono::Utc;
use thiserror::Error;
use tracing::info;

use crate::model::{Confidence, FeatureRecord, IntentCategory, LabelEntry};
use crate::services::suggest::suggest_category;
use crate::store::{LabelSet, LabelStore, StoreError};

/// How many symbols and strings to show per item.
const PREVIEW_LEN: usize = 12;

#[derive(Debug, Error)]
pub enum LabelingError {
    #[error("Console I/O failed: {0}")]
    Io(#[from] io::Error),
    #[error(transparent)]
    Store(#[from] StoreError),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    /// Showing the current item and waiting for label/skip/quit.
    Prompting,
    AwaitingCategory,
    AwaitingConfidence(IntentCategory),
    /// Printing the end-of-session summary.
    Reviewing,
    Done,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SessionSummary {
    pub labeled: usize,
    pub skipped: usize,
    /// Queue items never reached.
    pub remaining: usize,
    pub total_labels: usize,
    pub quit_early: bool,
}

/// Options controlling which records are queued.
#[derive(Debug, Clone, Copy, Default)]
pub struct SessionOptions {
    /// Queue hashes that already have a label.
    pub relabel: bool,
}

pub struct LabelSession<'a, R, W> {
    input: R,
    output: W,
    store: &'a LabelStore,
    labels: LabelSet,
    queue: Vec<&'a FeatureRecord>,
    position: usize,
    state: SessionState,
    summary: SessionSummary,
}

impl<'a, R: BufRead, W: Write> LabelSession<'a, R, W> {
    /// Load existing labels from `store` and queue `records` for review.
    pub fn new(
        store: &'a LabelStore,
        records: &'a [FeatureRecord],
        options: SessionOptions,
        input: R,
        output: W,
    ) -> Result<Self, LabelingError> {
        let mut labels = store.load()?;
        labels.total_binaries = labels.total_binaries.max(records.len());
        let queue = records
            .iter()
            .filter(|r| options.relabel || !labels.contains(&r.content_hash))
            .collect();
        Ok(Self {
            input,
            output,
            store,
            labels,
            queue,
            position: 0,
            state: SessionState::Prompting,
            summary: SessionSummary::default(),
        })
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn labels(&self) -> &LabelSet {
        &self.labels
    }

    pub fn queued(&self) -> usize {
        self.queue.len()
    }

    /// Drive the machine until `Done`.
    pub fn run(&mut self) -> Result<SessionSummary, LabelingError> {
        while self.state != SessionState::Done {
            self.state = self.step()?;
        }
        Ok(self.summary.clone())
    }

    /// Perform one transition.
    pub fn step(&mut self) -> Result<SessionState, LabelingError> {
        match self.state {
            SessionState::Prompting => self.on_prompting(),
            SessionState::AwaitingCategory => self.on_awaiting_category(),
            SessionState::AwaitingConfidence(category) => self.on_awaiting_confidence(category),
            SessionState::Reviewing => self.on_reviewing(),
            SessionState::Done => Ok(SessionState::Done),
        }
    }

    fn current(&self) -> Option<&'a FeatureRecord> {
        self.queue.get(self.position).copied()
    }

    fn on_prompting(&mut self) -> Result<SessionState, LabelingError> {
        let Some(record) = self.current() else {
            return Ok(SessionState::Reviewing);
        };
        self.show_record(record)?;
        loop {
            write!(self.output, "[l]abel, [s]kip, [q]uit (default: label): ")?;
            self.output.flush()?;
            let Some(line) = self.read_line()? else {
                return Ok(self.quit());
            };
            match line.as_str() {
                "" | "l" | "label" => return Ok(SessionState::AwaitingCategory),
                "s" | "skip" => {
                    self.summary.skipped += 1;
                    self.position += 1;
                    return Ok(SessionState::Prompting);
                }
                "q" | "quit" => return Ok(self.quit()),
                other => writeln!(self.output, "Unrecognized choice '{other}'.")?,
            }
        }
    }

    fn on_awaiting_category(&mut self) -> Result<SessionState, LabelingError> {
        writeln!(self.output, "Categories:")?;
        for (i, category) in IntentCategory::ALL.iter().enumerate() {
            let (name, description) = (category.as_str(), category.description());
            writeln!(self.output, "  {}. {name:<17} {description}", i + 1)?;
        }
        loop {
            write!(self.output, "Category [1-{}] or name, q to quit: ", IntentCategory::ALL.len())?;
            self.output.flush()?;
            let Some(line) = self.read_line()? else {
                return Ok(self.quit());
            };
            if line == "q" || line == "quit" {
                return Ok(self.quit());
            }
            match parse_category_choice(&line) {
                Some(category) => return Ok(SessionState::AwaitingConfidence(category)),
                None => writeln!(self.output, "Unrecognized category '{line}'.")?,
            }
        }
    }

    fn on_awaiting_confidence(
        &mut self,
        category: IntentCategory,
    ) -> Result<SessionState, LabelingError> {
        loop {
            write!(self.output, "Confidence [h/m/l] and optional notes, q to quit: ")?;
            self.output.flush()?;
            let Some(line) = self.read_line()? else {
                return Ok(self.quit());
            };
            if line == "q" || line == "quit" {
                return Ok(self.quit());
            }
            let (head, rest) = line.split_once(char::is_whitespace).unwrap_or((line.as_str(), ""));
            let Ok(confidence) = head.parse::<Confidence>() else {
                writeln!(self.output, "Unrecognized confidence '{head}'.")?;
                continue;
            };
            let notes = Some(rest.trim().to_string());
            self.commit(category, confidence, notes)?;
            return Ok(SessionState::Prompting);
        }
    }

    fn on_reviewing(&mut self) -> Result<SessionState, LabelingError> {
        self.summary.remaining = self.queue.len().saturating_sub(self.position);
        self.summary.total_labels = self.labels.len();

        writeln!(self.output)?;
        writeln!(self.output, "Session summary")?;
        writeln!(self.output, "  Labeled this session: {}", self.summary.labeled)?;
        writeln!(self.output, "  Skipped: {}", self.summary.skipped)?;
        writeln!(self.output, "  Remaining: {}", self.summary.remaining)?;
        writeln!(self.output, "  Total labels: {}", self.summary.total_labels)?;
        for (category, count) in self.labels.category_counts() {
            writeln!(self.output, "    {category}: {count}")?;
        }
        writeln!(self.output, "  Store: {}", self.store.path().display())?;
        Ok(SessionState::Done)
    }

    /// Record a confirmed label and persist it before moving on.
    ///
    /// The entry is merged over the store's current contents, so labels saved
    /// by another session since this one started survive.
    fn commit(
        &mut self,
        category: IntentCategory,
        confidence: Confidence,
        notes: Option<String>,
    ) -> Result<(), LabelingError> {
        let Some(record) = self.current() else {
            return Ok(());
        };
        let mut entry =
            LabelEntry::new(record.content_hash.clone(), category, confidence).with_notes(notes);
        entry.binary_name = std::path::Path::new(&record.path)
            .file_name()
            .map(|n| n.to_string_lossy().to_string());
        entry.labeled_at = Some(Utc::now().to_rfc3339());

        let mut incoming = LabelSet::from_entries([entry]);
        incoming.total_binaries = self.labels.total_binaries;
        self.labels = self.store.merge_and_save(&incoming)?;
        info!(hash = %record.content_hash, %category, %confidence, "label saved");

        self.summary.labeled += 1;
        self.position += 1;
        writeln!(self.output, "Saved {category} ({confidence}).")?;
        Ok(())
    }

    fn quit(&mut self) -> SessionState {
        self.summary.quit_early = self.position < self.queue.len();
        SessionState::Reviewing
    }

    fn show_record(&mut self, record: &FeatureRecord) -> io::Result<()> {
        let name = std::path::Path::new(&record.path)
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_else(|| record.path.clone());
        writeln!(self.output)?;
        writeln!(self.output, "[{}/{}] {}", self.position + 1, self.queue.len(), name)?;
        writeln!(self.output, "  Path: {}", record.path)?;
        writeln!(self.output, "  Hash: {}", record.content_hash)?;
        if !record.extraction_succeeded {
            let reason = record.error.as_deref().unwrap_or("unknown error");
            writeln!(self.output, "  Extraction incomplete: {reason}")?;
        }
        writeln!(
            self.output,
            "  Functions: {}  Instructions: {}",
            record.function_count, record.instruction_count
        )?;
        writeln!(self.output, "  Imported symbols ({}):", record.imported_symbols.len())?;
        for sym in record.imported_symbols.iter().take(PREVIEW_LEN) {
            writeln!(self.output, "    {sym}")?;
        }
        writeln!(self.output, "  Strings ({}):", record.extracted_strings.len())?;
        for s in record.extracted_strings.iter().take(PREVIEW_LEN) {
            writeln!(self.output, "    {s}")?;
        }
        if let Some(current) = self.labels.get(&record.content_hash) {
            writeln!(
                self.output,
                "  Current label: {} ({})",
                current.intent_category, current.confidence
            )?;
        }
        if let Some(suggestion) = suggest_category(record) {
            writeln!(
                self.output,
                "  Suggested: {} (matched {})",
                suggestion.category,
                suggestion.matched.join(", ")
            )?;
        }
        Ok(())
    }

    /// Next trimmed line, or `None` at end of input.
    fn read_line(&mut self) -> io::Result<Option<String>> {
        let mut line = String::new();
        if self.input.read_line(&mut line)? == 0 {
            return Ok(None);
        }
        Ok(Some(line.trim().to_string()))
    }
}

/// A 1-based menu number or a category name.
pub fn parse_category_choice(input: &str) -> Option<IntentCategory> {
    if let Ok(n) = input.parse::<usize>() {
        return n.checked_sub(1).and_then(|i| IntentCategory::ALL.get(i).copied());
    }
    input.parse().ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn category_choice_accepts_numbers_and_names() {
        assert_eq!(parse_category_choice("1"), Some(IntentCategory::FileReader));
        assert_eq!(parse_category_choice("7"), Some(IntentCategory::Unknown));
        assert_eq!(parse_category_choice("0"), None);
        assert_eq!(parse_category_choice("8"), None);
        assert_eq!(parse_category_choice("archive_tool"), Some(IntentCategory::ArchiveTool));
    }
}
