//! Model artifact loader

use crate::config::ArtifactFormat;
use crate::error::{LoanError, Result};
use crate::models::artifact::{ForestPipeline, ModelArtifact};
use crate::models::inference::LoanClassifier;
use std::path::Path;
use tracing::info;

/// Loader for fitted scaler + classifier artifacts
#[derive(Debug, Clone)]
pub struct ModelLoader {
    /// Number of threads for ONNX inference
    onnx_threads: usize,
}

impl ModelLoader {
    /// Create a new model loader with default settings (1 thread)
    pub fn new() -> Self {
        Self::with_threads(1)
    }

    /// Create a new model loader with specified number of ONNX threads
    pub fn with_threads(onnx_threads: usize) -> Self {
        Self {
            onnx_threads: onnx_threads.max(1),
        }
    }

    /// Load an artifact in the given format
    pub fn load<P: AsRef<Path>>(
        &self,
        path: P,
        format: ArtifactFormat,
    ) -> Result<Box<dyn LoanClassifier>> {
        let path = path.as_ref();

        info!(path = %path.display(), format = ?format, "Loading model artifact");

        match format {
            ArtifactFormat::Native => Ok(Box::new(self.load_native(path)?)),
            ArtifactFormat::Onnx => self.load_onnx(path),
        }
    }

    /// Load a native JSON forest artifact
    pub fn load_native<P: AsRef<Path>>(&self, path: P) -> Result<ForestPipeline> {
        let path = path.as_ref();
        let artifact = ModelArtifact::load(path)?;

        info!(
            path = %path.display(),
            trees = artifact.forest.n_estimators(),
            features = artifact.feature_names.len(),
            trained_at = ?artifact.metadata.trained_at,
            "Forest artifact loaded successfully"
        );

        ForestPipeline::new(artifact).map_err(|reason| LoanError::model_load(path, reason))
    }

    #[cfg(feature = "onnx")]
    fn load_onnx(&self, path: &Path) -> Result<Box<dyn LoanClassifier>> {
        let pipeline = crate::models::onnx::OnnxPipeline::load(path, self.onnx_threads)?;
        Ok(Box::new(pipeline))
    }

    #[cfg(not(feature = "onnx"))]
    fn load_onnx(&self, path: &Path) -> Result<Box<dyn LoanClassifier>> {
        Err(LoanError::model_load(
            path,
            format!(
                "ONNX artifacts need the `onnx` feature (configured threads: {})",
                self.onnx_threads
            ),
        ))
    }
}

impl Default for ModelLoader {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_threads_clamped() {
        let loader = ModelLoader::with_threads(0);
        assert_eq!(loader.onnx_threads, 1);
    }

    #[test]
    fn test_unreadable_artifact() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("rf_pipeline.json");
        std::fs::write(&path, b"\x80not json").unwrap();

        let err = ModelLoader::new()
            .load(&path, ArtifactFormat::Native)
            .err()
            .unwrap();
        assert_eq!(err.kind(), "model_load");
    }

    #[cfg(not(feature = "onnx"))]
    #[test]
    fn test_onnx_requires_feature() {
        let err = ModelLoader::new()
            .load("models/rf_pipeline.onnx", ArtifactFormat::Onnx)
            .err()
            .unwrap();
        assert_eq!(err.kind(), "model_load");
    }
}
