use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

use anyhow::{anyhow, Context, Result};
use intent_core::config::{PipelineConfig, PipelineLayout};
use intent_core::store::{
    read_optional_artifact, CollectionArtifact, FeatureArtifact, LabelStore, TrainingArtifact,
};
use serde::Serialize;

use crate::commands::util::{canonicalize_or_current, load_context, print_distribution};

/// Create `.intent/` and `data/` under `root` and write the default config.
pub fn init_command(root: &str, force: bool) -> Result<()> {
    let root_path = canonicalize_or_current(root)?;
    let layout = PipelineLayout::new(&root_path);

    if let Some(existing) = layout.existing_config_path() {
        if !force {
            return Err(anyhow!(
                "Pipeline config already exists at {} (use --force to overwrite)",
                existing.display()
            ));
        }
    }

    fs::create_dir_all(&layout.meta_dir)
        .with_context(|| format!("Failed to create meta dir: {}", layout.meta_dir.display()))?;
    fs::create_dir_all(&layout.data_dir)
        .with_context(|| format!("Failed to create data dir: {}", layout.data_dir.display()))?;

    let json = serde_json::to_string_pretty(&PipelineConfig::default())?;
    fs::write(&layout.config_path, json).with_context(|| {
        format!("Failed to write pipeline config: {}", layout.config_path.display())
    })?;

    println!("Initialized pipeline workspace:");
    println!("  Root: {}", layout.root.display());
    println!("  Config: {}", layout.config_path.display());
    println!("  Data dir: {}", layout.data_dir.display());

    Ok(())
}

#[derive(Debug, Serialize)]
pub struct StatusSnapshot {
    pub root: String,
    pub config_file: Option<String>,
    pub collected: Option<usize>,
    pub extracted: Option<usize>,
    pub extraction_succeeded: Option<usize>,
    pub labeled: Option<usize>,
    pub training_examples: Option<usize>,
    /// Category counts over the label store.
    pub label_distribution: BTreeMap<String, usize>,
}

/// Gather counts from every artifact present under `root`.
pub fn collect_status(root: &str) -> Result<StatusSnapshot> {
    let ctx = load_context(root)?;
    let layout = &ctx.layout;

    let collection: Option<CollectionArtifact> = read_optional_artifact(&layout.collection_path)
        .context("Failed to read collection artifact")?;
    let features: Option<FeatureArtifact> = read_optional_artifact(&layout.features_path)
        .context("Failed to read feature artifact")?;
    let training: Option<TrainingArtifact> = read_optional_artifact(&layout.training_path)
        .context("Failed to read training artifact")?;

    let (labeled, label_distribution) = if layout.labels_path.exists() {
        let labels = LabelStore::new(&layout.labels_path)
            .load()
            .context("Failed to read label store")?;
        (Some(labels.len()), labels.category_counts())
    } else {
        (None, BTreeMap::new())
    };

    Ok(StatusSnapshot {
        root: layout.root.display().to_string(),
        config_file: layout.existing_config_path().map(|p| p.display().to_string()),
        collected: collection.as_ref().map(|c| c.files.len()),
        extracted: features.as_ref().map(|f| f.binaries.len()),
        extraction_succeeded: features.as_ref().map(|f| f.successful_analyses),
        labeled,
        training_examples: training.as_ref().map(|t| t.examples.len()),
        label_distribution,
    })
}

/// Print what each pipeline stage has produced so far.
pub fn status_command(root: &str, json: bool) -> Result<()> {
    let snapshot = collect_status(root)?;

    if json {
        println!("{}", serde_json::to_string_pretty(&snapshot)?);
        return Ok(());
    }

    println!("Pipeline Status");
    println!("===============");
    println!("Root: {}", snapshot.root);
    println!("Config: {}", snapshot.config_file.as_deref().unwrap_or("(defaults)"));
    println!();
    print_stage("Collected binaries", snapshot.collected, "collect");
    print_stage("Feature records", snapshot.extracted, "extract");
    if let (Some(ok), Some(total)) = (snapshot.extraction_succeeded, snapshot.extracted) {
        println!("  {:<20} {ok}/{total}", "Extraction succeeded");
    }
    print_stage("Labels", snapshot.labeled, "label");
    print_stage("Training examples", snapshot.training_examples, "build");

    if snapshot.labeled.is_some() {
        println!();
        println!("Label distribution:");
        print_distribution(&snapshot.label_distribution);
    }

    Ok(())
}

fn print_stage(name: &str, count: Option<usize>, stage: &str) {
    match count {
        Some(n) => println!("  {name:<20} {n}"),
        None => println!("  {name:<20} - (run `{stage}`)"),
    }
}

/// Whether `path` names an artifact that exists; used by preconditions.
pub(crate) fn require_artifact(path: &Path, what: &str, stage: &str) -> Result<()> {
    if path.exists() {
        Ok(())
    } else {
        Err(anyhow!("Missing {what} at {}. Run `{stage}` first.", path.display()))
    }
}
