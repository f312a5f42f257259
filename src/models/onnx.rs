//! ONNX Runtime backend for scaler + forest pipelines exported from training

use crate::error::{LoanError, Result};
use crate::models::inference::LoanClassifier;
use crate::preprocess::MODEL_COLUMNS;
use crate::types::decision::Decision;
use ort::session::{builder::GraphOptimizationLevel, Session};
use ort::value::Tensor;
use std::path::Path;
use std::sync::Mutex;
use tracing::{debug, info};

/// Fitted pipeline executed by ONNX Runtime.
///
/// `Session::run` needs exclusive access, so concurrent callers serialize on
/// the session lock.
pub struct OnnxPipeline {
    session: Mutex<Session>,
    input_name: String,
    label_name: String,
    feature_names: Vec<String>,
}

impl OnnxPipeline {
    /// Load an exported pipeline from file
    pub fn load(path: &Path, onnx_threads: usize) -> Result<Self> {
        if !path.exists() {
            return Err(LoanError::model_load(path, "file not found"));
        }

        info!(path = %path.display(), threads = onnx_threads, "Loading ONNX pipeline");

        let session = build_session(path, onnx_threads)
            .map_err(|e| LoanError::model_load(path, e.to_string()))?;

        let input_name = session
            .inputs
            .first()
            .map(|i| i.name.clone())
            .ok_or_else(|| LoanError::model_load(path, "model declares no inputs"))?;

        // skl2onnx names the class output "output_label" (or "label")
        let label_name = session
            .outputs
            .iter()
            .find(|o| o.name.contains("label"))
            .map(|o| o.name.clone())
            .ok_or_else(|| LoanError::model_load(path, "model declares no label output"))?;

        info!(
            input = %input_name,
            output = %label_name,
            "ONNX pipeline loaded successfully"
        );

        Ok(Self {
            session: Mutex::new(session),
            input_name,
            label_name,
            feature_names: MODEL_COLUMNS.iter().map(|c| c.to_string()).collect(),
        })
    }

    fn run(&self, rows: &[Vec<f64>]) -> ort::Result<Vec<i64>> {
        let width = self.feature_names.len();
        let data: Vec<f32> = rows
            .iter()
            .flat_map(|row| row.iter().map(|&v| v as f32))
            .collect();
        let shape = vec![rows.len() as i64, width as i64];
        let input_tensor = Tensor::from_array((shape, data))?;

        let mut session = match self.session.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        let outputs = session.run(ort::inputs![&self.input_name => input_tensor])?;

        let (_, labels) = outputs[self.label_name.as_str()].try_extract_tensor::<i64>()?;
        Ok(labels.to_vec())
    }
}

fn build_session(path: &Path, onnx_threads: usize) -> ort::Result<Session> {
    ort::init().commit()?;
    Session::builder()?
        .with_optimization_level(GraphOptimizationLevel::Level3)?
        .with_intra_threads(onnx_threads)?
        .commit_from_file(path)
}

impl LoanClassifier for OnnxPipeline {
    fn name(&self) -> &str {
        "onnx_pipeline"
    }

    fn feature_names(&self) -> &[String] {
        &self.feature_names
    }

    fn predict_rows(&self, rows: &[Vec<f64>]) -> Result<Vec<Decision>> {
        let labels = self
            .run(rows)
            .map_err(|e| LoanError::Inference(e.to_string()))?;

        debug!(rows = rows.len(), labels = labels.len(), "ONNX inference complete");

        labels
            .into_iter()
            .map(|label| {
                Decision::from_label(label)
                    .ok_or_else(|| LoanError::Inference(format!("unexpected label {label}")))
            })
            .collect()
    }
}
