use anyhow::{Context, Result};
use intent_core::services::dataset::DatasetBuilder;
use intent_core::store::TrainingArtifact;

use crate::commands::util::{load_context, print_distribution};

/// Join features with labels and write the training artifact.
pub fn build_command(root: &str, json: bool) -> Result<()> {
    let ctx = load_context(root)?;
    let layout = &ctx.layout;

    let builder = DatasetBuilder::new(ctx.config.dataset.duplicate_policy);
    let build = builder.build_from_layout(layout)?;

    let artifact = TrainingArtifact::new(build.examples);
    artifact.save(&layout.training_path).with_context(|| {
        format!("Failed to write training artifact: {}", layout.training_path.display())
    })?;

    if json {
        println!("{}", serde_json::to_string_pretty(&build.report)?);
        return Ok(());
    }

    let report = &build.report;
    println!("Built training dataset:");
    println!("  Labels: {}", report.total_labels);
    println!("  Examples: {}", artifact.total_examples);
    println!("  Unmatched labels: {}", report.unmatched_labels.len());
    if !report.duplicate_hashes.is_empty() {
        println!("  Duplicate hashes: {}", report.duplicate_hashes.len());
    }
    if !report.excluded_duplicates.is_empty() {
        println!("  Excluded as duplicates: {}", report.excluded_duplicates.len());
    }
    println!();
    println!("Label distribution:");
    print_distribution(&artifact.label_distribution);
    println!("Saved: {}", layout.training_path.display());

    Ok(())
}
