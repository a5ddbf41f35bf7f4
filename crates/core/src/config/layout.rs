use std::path::{Path, PathBuf};

/// Logical layout of a pipeline workspace on disk.
///
/// This is derived from a chosen root path. It does *not* perform any IO itself.
#[derive(Debug, Clone)]
pub struct PipelineLayout {
    /// Root directory of the pipeline workspace.
    pub root: PathBuf,
    /// Directory for internal metadata (.intent).
    pub meta_dir: PathBuf,
    /// Default path of the pipeline config (JSON).
    pub config_path: PathBuf,
    /// Directory holding the JSON artifacts (data).
    pub data_dir: PathBuf,
    /// Discovery output.
    pub collection_path: PathBuf,
    /// Feature-extraction output.
    pub features_path: PathBuf,
    /// Label store.
    pub labels_path: PathBuf,
    /// Dataset-builder output.
    pub training_path: PathBuf,
}

impl PipelineLayout {
    /// Compute the default layout for a workspace rooted at `root`.
    pub fn new(root: impl AsRef<Path>) -> Self {
        let root = root.as_ref().to_path_buf();
        let meta_dir = root.join(".intent");
        let config_path = meta_dir.join("pipeline.json");
        let data_dir = root.join("data");
        let collection_path = data_dir.join("collected_binaries.json");
        let features_path = data_dir.join("binary_features.json");
        let labels_path = data_dir.join("labels.json");
        let training_path = data_dir.join("training_dataset.json");

        Self {
            root,
            meta_dir,
            config_path,
            data_dir,
            collection_path,
            features_path,
            labels_path,
            training_path,
        }
    }

    /// Candidate config files in lookup order.
    pub fn config_candidates(&self) -> [PathBuf; 3] {
        [
            self.config_path.clone(),
            self.meta_dir.join("pipeline.yaml"),
            self.meta_dir.join("pipeline.yml"),
        ]
    }

    /// First config candidate that exists on disk.
    pub fn existing_config_path(&self) -> Option<PathBuf> {
        self.config_candidates().into_iter().find(|p| p.is_file())
    }
}
