//! Pipeline configuration and on-disk layout.
//!
//! - `PipelineConfig`: serializable tunables for discovery, extraction, and
//!   dataset building. Read from `.intent/pipeline.json` (or `.yaml`/`.yml`).
//! - `PipelineLayout`: computed artifact paths for a pipeline root.
//! - `PipelineContext`: layout plus loaded config.

mod context;
mod layout;

pub use context::PipelineContext;
pub use layout::PipelineLayout;

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Error type for configuration loading.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read pipeline config at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("Failed to parse pipeline config JSON at {path}: {source}")]
    Json {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
    #[error("Failed to parse pipeline config YAML at {path}: {source}")]
    Yaml {
        path: PathBuf,
        #[source]
        source: serde_yaml::Error,
    },
    #[error("Invalid pipeline config: {0}")]
    Invalid(String),
}

/// Discovery tunables.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DiscoveryConfig {
    /// Directories scanned (top level only), in priority order.
    pub roots: Vec<String>,
    /// Global cap on accepted files across all roots.
    pub max_count: usize,
    pub min_size_bytes: u64,
    pub max_size_bytes: u64,
    /// File name patterns to exclude; `*` and `?` wildcards.
    pub skip_patterns: Vec<String>,
}

impl Default for DiscoveryConfig {
    fn default() -> Self {
        Self {
            roots: vec!["/usr/bin".into(), "/bin".into(), "/usr/sbin".into(), "/sbin".into()],
            max_count: 100,
            min_size_bytes: 1024,
            max_size_bytes: 10 * 1024 * 1024,
            skip_patterns: vec![
                "api-ms-win-*".into(),
                "ext-ms-*".into(),
                "python*".into(),
                "perl*".into(),
                "ruby*".into(),
                "bash".into(),
                "sh".into(),
            ],
        }
    }
}

/// External tool program names.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ToolPaths {
    pub symbols: String,
    pub strings: String,
    pub disassembly: String,
    pub format: String,
}

impl Default for ToolPaths {
    fn default() -> Self {
        Self {
            symbols: "nm".into(),
            strings: "strings".into(),
            disassembly: "objdump".into(),
            format: "file".into(),
        }
    }
}

/// Feature-extraction tunables.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExtractionConfig {
    pub min_string_len: usize,
    pub max_string_len: usize,
    pub max_strings: usize,
    /// Cap on captured stdout per tool invocation.
    pub max_output_bytes: usize,
    /// Per-invocation timeout; `0` waits forever.
    pub tool_timeout_secs: u64,
    pub tools: ToolPaths,
}

impl Default for ExtractionConfig {
    fn default() -> Self {
        Self {
            min_string_len: 4,
            max_string_len: 100,
            max_strings: 50,
            max_output_bytes: 8 * 1024 * 1024,
            tool_timeout_secs: 30,
            tools: ToolPaths::default(),
        }
    }
}

impl ExtractionConfig {
    pub fn tool_timeout(&self) -> Option<Duration> {
        (self.tool_timeout_secs > 0).then(|| Duration::from_secs(self.tool_timeout_secs))
    }
}

/// What to do with a content hash discovered at more than one path.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DuplicatePolicy {
    /// Warn and keep the single joined example.
    #[default]
    Keep,
    /// Warn and leave duplicated hashes out of the training set.
    Exclude,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DatasetConfig {
    pub duplicate_policy: DuplicatePolicy,
}

/// Full pipeline configuration. Missing sections fall back to defaults.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    pub discovery: DiscoveryConfig,
    pub extraction: ExtractionConfig,
    pub dataset: DatasetConfig,
}

impl PipelineConfig {
    /// Load from a JSON or YAML file, chosen by extension.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let body = std::fs::read_to_string(path)
            .map_err(|source| ConfigError::Io { path: path.to_path_buf(), source })?;
        let ext = path.extension().and_then(|e| e.to_str()).unwrap_or_default();
        let config: PipelineConfig = if matches!(ext, "yaml" | "yml") {
            serde_yaml::from_str(&body)
                .map_err(|source| ConfigError::Yaml { path: path.to_path_buf(), source })?
        } else {
            serde_json::from_str(&body)
                .map_err(|source| ConfigError::Json { path: path.to_path_buf(), source })?
        };
        config.validate()?;
        Ok(config)
    }

    /// Load the first config file present in `layout`, or defaults if none exists.
    pub fn load(layout: &PipelineLayout) -> Result<Self, ConfigError> {
        match layout.existing_config_path() {
            Some(path) => Self::from_file(&path),
            None => Ok(Self::default()),
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let d = &self.discovery;
        if d.min_size_bytes > d.max_size_bytes {
            return Err(ConfigError::Invalid(format!(
                "discovery.min_size_bytes ({}) exceeds discovery.max_size_bytes ({})",
                d.min_size_bytes, d.max_size_bytes
            )));
        }
        let e = &self.extraction;
        if e.min_string_len > e.max_string_len {
            return Err(ConfigError::Invalid(format!(
                "extraction.min_string_len ({}) exceeds extraction.max_string_len ({})",
                e.min_string_len, e.max_string_len
            )));
        }
        if e.max_output_bytes == 0 {
            return Err(ConfigError::Invalid("extraction.max_output_bytes must be > 0".into()));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partial_json_fills_defaults() {
        let body = r#"{"discovery":{"max_count":5},"dataset":{"duplicate_policy":"exclude"}}"#;
        let cfg: PipelineConfig = serde_json::from_str(body).unwrap();
        assert_eq!(cfg.discovery.max_count, 5);
        assert_eq!(cfg.discovery.min_size_bytes, 1024);
        assert_eq!(cfg.extraction.max_strings, 50);
        assert_eq!(cfg.dataset.duplicate_policy, DuplicatePolicy::Exclude);
    }

    #[test]
    fn zero_timeout_disables_it() {
        let mut cfg = ExtractionConfig::default();
        assert_eq!(cfg.tool_timeout(), Some(Duration::from_secs(30)));
        cfg.tool_timeout_secs = 0;
        assert_eq!(cfg.tool_timeout(), None);
    }

    #[test]
    fn rejects_inverted_size_window() {
        let mut cfg = PipelineConfig::default();
        cfg.discovery.min_size_bytes = 10;
        cfg.discovery.max_size_bytes = 5;
        let err = cfg.validate().unwrap_err();
        assert!(err.to_string().contains("min_size_bytes"));
    }
}
