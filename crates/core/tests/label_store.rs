use intent_core::model::{Confidence, IntentCategory, LabelEntry};
use intent_core::store::{LabelArtifact, LabelSet, LabelStore};
use tempfile::tempdir;

fn read_artifact(store: &LabelStore) -> LabelArtifact {
    let body = std::fs::read_to_string(store.path()).expect("read labels");
    serde_json::from_str(&body).expect("labels parse")
}

#[test]
fn relabeling_in_a_later_session_overwrites() {
    let dir = tempdir().unwrap();
    let store = LabelStore::new(dir.path().join("labels.json"));

    // Session one.
    let mut first = store.load().unwrap();
    first.upsert(LabelEntry::new("h1", IntentCategory::FileReader, Confidence::Low));
    first.upsert(LabelEntry::new("h2", IntentCategory::ArchiveTool, Confidence::High));
    store.save(&first).unwrap();

    // Session two relabels h1.
    let mut second = store.load().unwrap();
    second.upsert(
        LabelEntry::new("h1", IntentCategory::FileWriter, Confidence::High)
            .with_notes(Some("writes via fwrite".into())),
    );
    store.save(&second).unwrap();

    let artifact = read_artifact(&store);
    let h1: Vec<&LabelEntry> = artifact.labels.iter().filter(|l| l.content_hash == "h1").collect();
    assert_eq!(h1.len(), 1);
    assert_eq!(h1[0].intent_category, IntentCategory::FileWriter);
    assert_eq!(h1[0].notes.as_deref(), Some("writes via fwrite"));
    assert_eq!(artifact.labeled_count, 2);
    assert_eq!(artifact.labels[0].content_hash, "h1", "relabel keeps original position");
}

#[test]
fn each_save_leaves_a_complete_parseable_snapshot() {
    let dir = tempdir().unwrap();
    let store = LabelStore::new(dir.path().join("data").join("labels.json"));
    let mut labels = LabelSet::new();

    for (i, category) in IntentCategory::ALL.iter().enumerate() {
        let hash = format!("hash-{i}");
        labels.upsert(LabelEntry::new(hash.clone(), *category, Confidence::Medium));
        store.save(&labels).unwrap();

        // Simulate a crash right after this save: a fresh reader sees every
        // completed assignment, including the one just made.
        let artifact = read_artifact(&store);
        assert_eq!(artifact.labels.len(), i + 1);
        assert!(artifact.labels.iter().any(|l| l.content_hash == hash));
        let reloaded = store.load().unwrap();
        assert_eq!(reloaded.len(), i + 1);
    }

    let leftovers: Vec<_> = std::fs::read_dir(dir.path().join("data"))
        .unwrap()
        .filter_map(|e| e.ok())
        .map(|e| e.file_name().to_string_lossy().to_string())
        .filter(|n| n != "labels.json")
        .collect();
    assert!(leftovers.is_empty(), "unexpected files: {leftovers:?}");
}

#[test]
fn stale_temp_file_does_not_affect_load() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("labels.json");
    let store = LabelStore::new(&path);
    store
        .save(&LabelSet::from_entries([LabelEntry::new(
            "kept",
            IntentCategory::SystemUtility,
            Confidence::High,
        )]))
        .unwrap();
    // A write that died before its rename.
    std::fs::write(dir.path().join("labels.json.tmp"), "{\"labels\": [").unwrap();

    let labels = store.load().unwrap();
    assert_eq!(labels.len(), 1);
    assert!(labels.contains("kept"));
}

#[test]
fn merge_and_save_preserves_entries_written_elsewhere() {
    let dir = tempdir().unwrap();
    let store = LabelStore::new(dir.path().join("labels.json"));
    store
        .save(&LabelSet::from_entries([LabelEntry::new(
            "other-machine",
            IntentCategory::DirectoryOps,
            Confidence::Low,
        )]))
        .unwrap();

    let incoming = LabelSet::from_entries([LabelEntry::new(
        "local",
        IntentCategory::FileReader,
        Confidence::High,
    )]);
    let merged = store.merge_and_save(&incoming).unwrap();

    assert_eq!(merged.len(), 2);
    let reloaded = store.load().unwrap();
    assert!(reloaded.contains("other-machine"));
    assert!(reloaded.contains("local"));
}

#[test]
fn total_binaries_tracks_the_labeling_pool() {
    let dir = tempdir().unwrap();
    let store = LabelStore::new(dir.path().join("labels.json"));
    let mut labels = LabelSet::new();
    labels.total_binaries = 12;
    labels.upsert(LabelEntry::new("x", IntentCategory::Unknown, Confidence::Low));
    store.save(&labels).unwrap();

    let artifact = read_artifact(&store);
    assert_eq!(artifact.total_binaries, 12);
    assert_eq!(artifact.labeled_count, 1);
    assert_eq!(store.load().unwrap().total_binaries, 12);
}
