//! Native composite model artifact: fitted scaler + random forest in one versioned document

use crate::error::{LoanError, Result};
use crate::models::forest::{RandomForest, StandardScaler};
use crate::models::inference::LoanClassifier;
use crate::preprocess::MODEL_COLUMNS;
use crate::types::decision::Decision;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::io::{BufWriter, Write};
use std::path::Path;

/// Artifact layout version understood by this build
pub const ARTIFACT_FORMAT_VERSION: u32 = 1;

/// Provenance recorded by the training job
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ArtifactMetadata {
    #[serde(default)]
    pub trained_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub training_rows: Option<usize>,
    #[serde(default)]
    pub description: Option<String>,
}

/// Scaler and classifier fitted together and applied as one unit
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelArtifact {
    pub format_version: u32,
    /// Columns the pipeline was fitted on, in order
    pub feature_names: Vec<String>,
    pub scaler: StandardScaler,
    pub forest: RandomForest,
    #[serde(default)]
    pub metadata: ArtifactMetadata,
}

impl ModelArtifact {
    /// Create an artifact over the current model columns
    pub fn new(scaler: StandardScaler, forest: RandomForest) -> Self {
        Self {
            format_version: ARTIFACT_FORMAT_VERSION,
            feature_names: MODEL_COLUMNS.iter().map(|c| c.to_string()).collect(),
            scaler,
            forest,
            metadata: ArtifactMetadata::default(),
        }
    }

    /// Read and validate an artifact from disk
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        if !path.exists() {
            return Err(LoanError::model_load(path, "file not found"));
        }

        let text = std::fs::read_to_string(path)
            .map_err(|e| LoanError::model_load(path, format!("unreadable: {e}")))?;
        let artifact: ModelArtifact = serde_json::from_str(&text)
            .map_err(|e| LoanError::model_load(path, format!("malformed artifact: {e}")))?;

        artifact
            .validate()
            .map_err(|reason| LoanError::model_load(path, reason))?;

        Ok(artifact)
    }

    /// Write the artifact as pretty JSON
    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let file = std::fs::File::create(path)?;
        let mut writer = BufWriter::new(file);
        serde_json::to_writer_pretty(&mut writer, self)?;
        writer.flush()?;
        Ok(())
    }

    /// Check version, schema and internal consistency
    pub fn validate(&self) -> std::result::Result<(), String> {
        if self.format_version != ARTIFACT_FORMAT_VERSION {
            return Err(format!(
                "unsupported format_version {} (expected {})",
                self.format_version, ARTIFACT_FORMAT_VERSION
            ));
        }
        if self.feature_names != MODEL_COLUMNS {
            return Err(format!(
                "artifact was fitted on columns {:?}, expected {:?}",
                self.feature_names, MODEL_COLUMNS
            ));
        }
        let n_features = self.feature_names.len();
        self.scaler.validate(n_features)?;
        self.forest.validate(n_features)?;
        Ok(())
    }
}

/// Classifier backed by a native artifact
#[derive(Debug, Clone)]
pub struct ForestPipeline {
    artifact: ModelArtifact,
}

impl ForestPipeline {
    /// Wrap an artifact, validating it first
    pub fn new(artifact: ModelArtifact) -> std::result::Result<Self, String> {
        artifact.validate()?;
        Ok(Self { artifact })
    }

    pub fn artifact(&self) -> &ModelArtifact {
        &self.artifact
    }
}

impl LoanClassifier for ForestPipeline {
    fn name(&self) -> &str {
        "random_forest"
    }

    fn feature_names(&self) -> &[String] {
        &self.artifact.feature_names
    }

    fn predict_rows(&self, rows: &[Vec<f64>]) -> Result<Vec<Decision>> {
        rows.iter()
            .map(|row| {
                let scaled = self.artifact.scaler.transform(row);
                let label = self.artifact.forest.predict(&scaled);
                Decision::from_label(label)
                    .ok_or_else(|| LoanError::Inference(format!("unexpected label {label}")))
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::forest::{DecisionTree, TreeNode};

    fn identity_artifact() -> ModelArtifact {
        ModelArtifact::new(
            StandardScaler {
                mean: vec![0.0; 10],
                scale: vec![1.0; 10],
            },
            RandomForest {
                trees: vec![DecisionTree {
                    nodes: vec![
                        TreeNode::Split {
                            feature: 1,
                            threshold: 100f64.ln(),
                            left: 1,
                            right: 2,
                        },
                        TreeNode::Leaf {
                            probabilities: [0.9, 0.1],
                        },
                        TreeNode::Leaf {
                            probabilities: [0.2, 0.8],
                        },
                    ],
                }],
            },
        )
    }

    #[test]
    fn test_save_and_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("rf_pipeline.json");

        let artifact = identity_artifact();
        artifact.save(&path).unwrap();
        let loaded = ModelArtifact::load(&path).unwrap();

        assert_eq!(loaded, artifact);
        assert_eq!(loaded.forest.n_estimators(), 1);
    }

    #[test]
    fn test_load_missing_file() {
        let err = ModelArtifact::load("/nonexistent/rf_pipeline.json").unwrap_err();
        assert_eq!(err.kind(), "model_load");
    }

    #[test]
    fn test_load_rejects_other_versions() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("rf_pipeline.json");

        let mut artifact = identity_artifact();
        artifact.format_version = 2;
        artifact.save(&path).unwrap();

        match ModelArtifact::load(&path) {
            Err(LoanError::ModelLoad { reason, .. }) => assert!(reason.contains("format_version")),
            other => panic!("expected ModelLoad, got {:?}", other),
        }
    }

    #[test]
    fn test_validate_rejects_skewed_schema() {
        let mut artifact = identity_artifact();
        artifact.feature_names.swap(1, 3);
        assert!(artifact.validate().is_err());

        let mut artifact = identity_artifact();
        artifact.feature_names.push("Mortgage".to_string());
        assert!(artifact.validate().is_err());
    }

    #[test]
    fn test_pipeline_predicts_rows() {
        let pipeline = ForestPipeline::new(identity_artifact()).unwrap();
        let mut low = vec![0.0; 10];
        low[1] = 51f64.ln();
        let mut high = vec![0.0; 10];
        high[1] = 151f64.ln();

        let decisions = pipeline.predict_rows(&[low, high]).unwrap();
        assert_eq!(decisions, vec![Decision::Decline, Decision::Accept]);
    }
}
