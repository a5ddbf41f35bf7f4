use std::collections::HashSet;

use anyhow::{Context, Result};
use chrono::Utc;
use intent_core::services::features::{FeatureExtractor, StringLimits};
use intent_core::services::tools::SystemToolRunner;
use intent_core::store::{read_optional_artifact, CollectionArtifact, FeatureArtifact};

use crate::commands::project::require_artifact;
use crate::commands::util::load_context;

/// Run the external tools over every collected binary and merge the results
/// into the feature artifact.
///
/// Hashes already present are left alone unless `force` is set. The artifact
/// is rewritten after each record so an interrupted run keeps its progress;
/// a failed write stops the run before any further binary is processed.
pub fn extract_command(root: &str, force: bool, timeout_secs: Option<u64>) -> Result<()> {
    let ctx = load_context(root)?;
    let layout = &ctx.layout;
    require_artifact(&layout.collection_path, "collection artifact", "collect")?;

    let collection = CollectionArtifact::load(&layout.collection_path).with_context(|| {
        format!("Failed to read collection artifact: {}", layout.collection_path.display())
    })?;

    let mut extraction = ctx.config.extraction.clone();
    if let Some(secs) = timeout_secs {
        extraction.tool_timeout_secs = secs;
    }
    let runner = SystemToolRunner::from_config(&extraction);
    let extractor = FeatureExtractor::new(&runner, StringLimits::from_config(&extraction));

    let existing: Option<FeatureArtifact> = read_optional_artifact(&layout.features_path)
        .context("Failed to read existing feature artifact")?;
    let mut artifact = existing.unwrap_or_else(|| FeatureArtifact::new(Vec::new()));

    let skip: HashSet<String> = if force {
        HashSet::new()
    } else {
        artifact.binaries.iter().map(|b| b.content_hash.clone()).collect()
    };
    let already = collection.files.iter().filter(|f| skip.contains(&f.content_hash)).count();

    println!("Extracting features from {} collected binaries", collection.files.len());

    let mut succeeded = 0usize;
    let mut failed = 0usize;
    let records = extractor.try_extract_all(&collection.files, &skip, |i, total, record| {
        let status = if record.extraction_succeeded {
            succeeded += 1;
            "ok"
        } else {
            failed += 1;
            "incomplete"
        };
        println!(
            "[{i}/{total}] {} ({} symbols, {} strings, {} functions) {status}",
            file_name(&record.path),
            record.imported_symbols.len(),
            record.extracted_strings.len(),
            record.function_count
        );

        artifact.upsert(record.clone());
        artifact.analysis_date = Utc::now().to_rfc3339();
        artifact.save(&layout.features_path)
    });
    let records = records.with_context(|| {
        format!("Failed to write feature artifact: {}", layout.features_path.display())
    })?;
    if records.is_empty() {
        // Nothing new; still leave a well-formed artifact behind.
        artifact.save(&layout.features_path).with_context(|| {
            format!("Failed to write feature artifact: {}", layout.features_path.display())
        })?;
    }

    println!();
    println!("Extracted {} binaries", records.len());
    println!("  Succeeded: {succeeded}");
    println!("  Incomplete: {failed}");
    println!("  Already extracted: {already}");
    println!(
        "Feature artifact: {} records ({} complete)",
        artifact.total_binaries, artifact.successful_analyses
    );
    println!("Saved: {}", layout.features_path.display());

    Ok(())
}

fn file_name(path: &str) -> &str {
    std::path::Path::new(path).file_name().and_then(|n| n.to_str()).unwrap_or(path)
}
