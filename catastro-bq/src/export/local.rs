//! Dépôt local : copie des CSV dans un répertoire

use std::path::{Path, PathBuf};

use crate::error::PipelineError;
use crate::pipeline::ArtifactSink;

/// Copie les artefacts dans `root`, en conservant le préfixe comme sous-répertoire
#[derive(Debug, Clone)]
pub struct DirectorySink {
    root: PathBuf,
}

impl DirectorySink {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }
}

impl ArtifactSink for DirectorySink {
    fn upload(&self, path: &Path, object_name: &str) -> Result<String, PipelineError> {
        let upload_error = |reason: String| PipelineError::Upload {
            file: path.display().to_string(),
            reason,
        };

        let target = self.root.join(object_name);
        if let Some(parent) = target.parent() {
            std::fs::create_dir_all(parent).map_err(|e| upload_error(e.to_string()))?;
        }
        std::fs::copy(path, &target).map_err(|e| upload_error(e.to_string()))?;

        Ok(target.display().to_string())
    }
}
