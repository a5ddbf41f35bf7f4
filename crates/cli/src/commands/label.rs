use std::io;

use anyhow::{Context, Result};
use intent_core::labeling::{LabelSession, SessionOptions};
use intent_core::store::{FeatureArtifact, LabelStore};

use crate::commands::project::require_artifact;
use crate::commands::util::load_context;

/// Interactive labeling over stdin/stdout.
pub fn label_command(root: &str, relabel: bool) -> Result<()> {
    let ctx = load_context(root)?;
    let layout = &ctx.layout;
    require_artifact(&layout.features_path, "feature artifact", "extract")?;

    let features = FeatureArtifact::load(&layout.features_path).with_context(|| {
        format!("Failed to read feature artifact: {}", layout.features_path.display())
    })?;
    let store = LabelStore::new(&layout.labels_path);

    let stdin = io::stdin();
    let stdout = io::stdout();
    let mut session = LabelSession::new(
        &store,
        &features.binaries,
        SessionOptions { relabel },
        stdin.lock(),
        stdout.lock(),
    )
    .with_context(|| format!("Failed to open label store: {}", store.path().display()))?;

    if session.queued() == 0 {
        println!("Nothing to label: every extracted binary already has a label.");
        println!("Use --relabel to review existing labels.");
        return Ok(());
    }

    let summary = session.run().context("Labeling session failed")?;
    tracing::debug!(?summary, "labeling session finished");

    Ok(())
}
