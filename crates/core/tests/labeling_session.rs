mod support;

use std::io::Cursor;

use intent_core::labeling::{LabelSession, SessionOptions, SessionState};
use intent_core::model::{Confidence, IntentCategory, LabelEntry};
use intent_core::store::{LabelSet, LabelStore};
use support::feature;
use tempfile::tempdir;

fn run_session(
    store: &LabelStore,
    records: &[intent_core::model::FeatureRecord],
    options: SessionOptions,
    script: &str,
) -> (intent_core::labeling::SessionSummary, String) {
    let mut output = Vec::new();
    let summary = {
        let mut session =
            LabelSession::new(store, records, options, Cursor::new(script.to_string()), &mut output)
                .expect("session");
        session.run().expect("run")
    };
    (summary, String::from_utf8(output).unwrap())
}

#[test]
fn labels_every_item_and_persists_each_one() {
    let dir = tempdir().unwrap();
    let store = LabelStore::new(dir.path().join("labels.json"));
    let records = vec![feature("a"), feature("b")];

    // a: label as 1 (file_reader), high, with notes. b: name, medium.
    let script = "l\n1\nh reads config files\n\nfile_writer\nm\n";
    let (summary, output) = run_session(&store, &records, SessionOptions::default(), script);

    assert_eq!(summary.labeled, 2);
    assert!(!summary.quit_early);
    assert!(output.contains("Suggested: file_reader"), "suggestion shown:\n{output}");

    let labels = store.load().unwrap();
    assert_eq!(labels.len(), 2);
    let a = labels.get("a").unwrap();
    assert_eq!(a.intent_category, IntentCategory::FileReader);
    assert_eq!(a.confidence, Confidence::High);
    assert_eq!(a.notes.as_deref(), Some("reads config files"));
    assert_eq!(a.binary_name.as_deref(), Some("a"));
    assert_eq!(labels.get("b").unwrap().intent_category, IntentCategory::FileWriter);
}

#[test]
fn quitting_mid_entry_keeps_confirmed_labels_only() {
    let dir = tempdir().unwrap();
    let store = LabelStore::new(dir.path().join("labels.json"));
    let records = vec![feature("a"), feature("b"), feature("c")];

    // a is confirmed; b gets a category but the user quits at the confidence prompt.
    let script = "l\n3\nl\nl\n2\nq\n";
    let (summary, _) = run_session(&store, &records, SessionOptions::default(), script);

    assert_eq!(summary.labeled, 1);
    assert!(summary.quit_early);
    assert_eq!(summary.remaining, 2);
    let labels = store.load().unwrap();
    assert_eq!(labels.len(), 1);
    assert_eq!(labels.get("a").unwrap().intent_category, IntentCategory::DirectoryOps);
    assert!(!labels.contains("b"));
}

#[test]
fn end_of_input_behaves_like_quit() {
    let dir = tempdir().unwrap();
    let store = LabelStore::new(dir.path().join("labels.json"));
    let records = vec![feature("a"), feature("b")];

    let (summary, output) = run_session(&store, &records, SessionOptions::default(), "s\n");

    assert_eq!(summary.skipped, 1);
    assert_eq!(summary.labeled, 0);
    assert!(output.contains("Session summary"));
    assert!(!store.path().exists(), "nothing confirmed, nothing written");
}

#[test]
fn invalid_answers_reprompt_without_recording() {
    let dir = tempdir().unwrap();
    let store = LabelStore::new(dir.path().join("labels.json"));
    let records = vec![feature("a")];

    let script = "x\nl\n42\nnot_a_category\nsystem_utility\nsure\nl\n";
    let (summary, output) = run_session(&store, &records, SessionOptions::default(), script);

    assert_eq!(summary.labeled, 1);
    assert!(output.contains("Unrecognized choice 'x'"));
    assert!(output.contains("Unrecognized category '42'"));
    assert!(output.contains("Unrecognized confidence 'sure'"));
    let entry = store.load().unwrap().get("a").cloned().unwrap();
    assert_eq!(entry.intent_category, IntentCategory::SystemUtility);
    assert_eq!(entry.confidence, Confidence::Low);
    assert_eq!(entry.notes, None);
}

#[test]
fn labeled_hashes_are_skipped_unless_relabeling() {
    let dir = tempdir().unwrap();
    let store = LabelStore::new(dir.path().join("labels.json"));
    store
        .save(&LabelSet::from_entries([LabelEntry::new(
            "a",
            IntentCategory::FileReader,
            Confidence::Low,
        )]))
        .unwrap();
    let records = vec![feature("a"), feature("b")];

    let mut sink = Vec::new();
    let session = LabelSession::new(
        &store,
        &records,
        SessionOptions::default(),
        Cursor::new(String::new()),
        &mut sink,
    )
    .unwrap();
    assert_eq!(session.queued(), 1);
    assert_eq!(session.state(), SessionState::Prompting);
    drop(session);

    let (summary, output) =
        run_session(&store, &records, SessionOptions { relabel: true }, "l\n5\nh\nq\n");
    assert_eq!(summary.labeled, 1);
    assert!(output.contains("[1/2] a"));
    let labels = store.load().unwrap();
    assert_eq!(labels.len(), 1);
    assert_eq!(labels.get("a").unwrap().intent_category, IntentCategory::ArchiveTool);
}

#[test]
fn failed_extraction_is_visible_to_the_reviewer() {
    let dir = tempdir().unwrap();
    let store = LabelStore::new(dir.path().join("labels.json"));
    let mut broken = feature("z");
    broken.extraction_succeeded = false;
    broken.error = Some("failed to spawn objdump".into());

    let (_, output) = run_session(&store, &[broken], SessionOptions::default(), "q\n");
    assert!(output.contains("Extraction incomplete: failed to spawn objdump"));
}

#[test]
fn labels_saved_by_another_session_are_not_overwritten() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("labels.json");
    let store = LabelStore::new(&path);
    let records = vec![feature("a")];

    let mut output = Vec::new();
    let mut session = LabelSession::new(
        &store,
        &records,
        SessionOptions::default(),
        Cursor::new("l\n2\nm\n".to_string()),
        &mut output,
    )
    .unwrap();

    // Another reviewer saves after this session loaded the store.
    LabelStore::new(&path)
        .save(&LabelSet::from_entries([LabelEntry::new(
            "elsewhere",
            IntentCategory::SystemUtility,
            Confidence::High,
        )]))
        .unwrap();

    let summary = session.run().unwrap();
    assert_eq!(summary.labeled, 1);
    assert_eq!(summary.total_labels, 2);

    let labels = store.load().unwrap();
    assert_eq!(labels.len(), 2);
    assert_eq!(labels.get("a").unwrap().intent_category, IntentCategory::FileWriter);
    assert!(labels.contains("elsewhere"));
}
