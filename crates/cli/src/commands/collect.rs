use anyhow::{Context, Result};
use intent_core::model::CollectedFile;
use intent_core::services::discovery::{
    discover_with_progress, find_duplicate_hashes, DiscoveryOptions, DiscoveryOutcome,
    SkipReason,
};
use intent_core::services::tools::SystemToolRunner;
use intent_core::store::CollectionArtifact;
use tracing::warn;

use crate::commands::util::{format_size, load_context};

/// Per-invocation overrides for the discovery config.
#[derive(Debug, Clone, Default)]
pub struct CollectArgs {
    /// Overrides `discovery.max_count`.
    pub count: Option<usize>,
    /// Replaces `discovery.roots` when non-empty.
    pub dirs: Vec<String>,
    pub json: bool,
}

/// Scan the configured roots and write the collection artifact.
pub fn collect_command(root: &str, args: CollectArgs) -> Result<()> {
    let ctx = load_context(root)?;
    let mut discovery = ctx.config.discovery.clone();
    if let Some(count) = args.count {
        discovery.max_count = count;
    }
    if !args.dirs.is_empty() {
        discovery.roots = args.dirs.clone();
    }

    let options =
        DiscoveryOptions::from_config(&discovery).context("Invalid discovery.skip_patterns")?;
    let runner = SystemToolRunner::from_config(&ctx.config.extraction);

    if !args.json {
        println!("Collecting up to {} binaries from:", options.max_count);
        for dir in &options.roots {
            println!("  {}", dir.display());
        }
    }

    let max = options.max_count;
    let quiet = args.json;
    let mut report = |i: usize, file: &CollectedFile| {
        if !quiet {
            println!(
                "[{i}/{max}] {} ({}, {}, {})",
                file.file_name(),
                file.kind.as_str(),
                file.architecture,
                format_size(file.size_bytes)
            );
        }
    };
    let outcome = discover_with_progress(&options, &runner, &mut report);

    let duplicates = find_duplicate_hashes(&outcome.files);
    for dup in &duplicates {
        warn!(hash = %dup.content_hash, paths = ?dup.paths, "same content collected twice");
    }

    let DiscoveryOutcome { files, skipped, unreadable_roots } = outcome;
    let skipped_count = |reason: SkipReason| skipped.get(&reason).copied().unwrap_or(0);
    let artifact = CollectionArtifact::new(files);
    artifact.save(&ctx.layout.collection_path).with_context(|| {
        format!("Failed to write collection artifact: {}", ctx.layout.collection_path.display())
    })?;

    if args.json {
        println!("{}", serde_json::to_string_pretty(&artifact)?);
        return Ok(());
    }

    println!();
    println!("Collected {} binaries", artifact.total_files);
    println!("  Skipped (pattern):    {}", skipped_count(SkipReason::Pattern));
    println!("  Skipped (too small):  {}", skipped_count(SkipReason::TooSmall));
    println!("  Skipped (too large):  {}", skipped_count(SkipReason::TooLarge));
    println!("  Skipped (not binary): {}", skipped_count(SkipReason::NotBinary));
    let other = skipped_count(SkipReason::NotAFile) + skipped_count(SkipReason::Unreadable);
    println!("  Skipped (other):      {other}");
    if !unreadable_roots.is_empty() {
        println!("  Unreadable dirs:      {}", unreadable_roots.len());
    }
    if !duplicates.is_empty() {
        println!("  Duplicate hashes:     {}", duplicates.len());
    }
    println!("Saved: {}", ctx.layout.collection_path.display());

    Ok(())
}
