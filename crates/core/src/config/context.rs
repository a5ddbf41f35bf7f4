use std::path::Path;

use anyhow::{Context, Result};

use crate::config::{PipelineConfig, PipelineLayout};

/// Convenience wrapper bundling layout and loaded config.
#[derive(Debug, Clone)]
pub struct PipelineContext {
    pub layout: PipelineLayout,
    pub config: PipelineConfig,
}

impl PipelineContext {
    /// Load the pipeline config for a given root (defaults if none is present).
    pub fn from_root(root: impl AsRef<Path>) -> Result<Self> {
        let layout = PipelineLayout::new(root);
        let config = PipelineConfig::load(&layout).with_context(|| {
            format!("Failed to load pipeline config under {}", layout.meta_dir.display())
        })?;
        Ok(Self { layout, config })
    }
}
