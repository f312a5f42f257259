//! Prediction service wrapping the loaded loan acceptance classifier

use crate::config::{AppConfig, ModelConfig};
use crate::error::{LoanError, Result};
use crate::models::loader::ModelLoader;
use crate::preprocess::{FeatureFrame, FeaturePreprocessor, ModelInput};
use crate::types::application::{LoanApplication, RawRecord};
use crate::types::decision::{Decision, DecisionMessage};
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// A fitted scaler + classifier applied as one unit.
///
/// Implementations receive rows whose width already matches
/// [`LoanClassifier::feature_names`].
pub trait LoanClassifier: Send + Sync {
    /// Short backend name for logs
    fn name(&self) -> &str;

    /// Columns the classifier was fitted on, in order
    fn feature_names(&self) -> &[String];

    /// One decision per row, same order
    fn predict_rows(&self, rows: &[Vec<f64>]) -> Result<Vec<Decision>>;
}

/// Loan acceptance prediction service.
///
/// Constructing the service loads the model artifact; a value of this type is
/// always ready to predict. The classifier is never mutated after load, so one
/// instance can be shared behind an `Arc` by any number of callers. Reloading
/// a model means constructing a new service.
pub struct PredictionService {
    classifier: Box<dyn LoanClassifier>,
    preprocessor: FeaturePreprocessor,
    artifact_path: PathBuf,
}

impl PredictionService {
    /// Create the service from application configuration
    pub fn new(config: &AppConfig) -> Result<Self> {
        Self::load(&config.model)
    }

    /// Load the artifact described by the model configuration
    pub fn load(model: &ModelConfig) -> Result<Self> {
        let loader = ModelLoader::with_threads(model.onnx_threads);
        let classifier = loader.load(&model.artifact_path, model.format)?;

        info!(
            model = %classifier.name(),
            path = %model.artifact_path.display(),
            features = classifier.feature_names().len(),
            "Prediction service ready"
        );

        Ok(Self {
            classifier,
            preprocessor: FeaturePreprocessor::new(),
            artifact_path: model.artifact_path.clone(),
        })
    }

    /// Wrap an already constructed classifier
    pub fn from_classifier(classifier: Box<dyn LoanClassifier>) -> Self {
        Self {
            classifier,
            preprocessor: FeaturePreprocessor::new(),
            artifact_path: PathBuf::new(),
        }
    }

    /// Path the artifact was loaded from (empty for injected classifiers)
    pub fn artifact_path(&self) -> &Path {
        &self.artifact_path
    }

    pub fn model_name(&self) -> &str {
        self.classifier.name()
    }

    pub fn feature_names(&self) -> &[String] {
        self.classifier.feature_names()
    }

    pub fn preprocessor(&self) -> &FeaturePreprocessor {
        &self.preprocessor
    }

    /// Predict preprocessed records
    pub fn predict(&self, inputs: &[ModelInput]) -> Result<Vec<Decision>> {
        self.predict_frame(&FeatureFrame::from_inputs(inputs))
    }

    /// Predict a preprocessed frame.
    ///
    /// The frame's columns must equal the fitted columns, in order. Any bad
    /// row fails the whole batch.
    pub fn predict_frame(&self, frame: &FeatureFrame) -> Result<Vec<Decision>> {
        let expected = self.classifier.feature_names();
        if frame.columns() != expected {
            return Err(LoanError::schema_mismatch(format!(
                "columns {:?} do not match fitted columns {:?}",
                frame.columns(),
                expected
            )));
        }

        for (i, row) in frame.rows().iter().enumerate() {
            if row.len() != expected.len() {
                return Err(LoanError::schema_mismatch(format!(
                    "row {} has {} values, expected {}",
                    i + 1,
                    row.len(),
                    expected.len()
                )));
            }
            if let Some(j) = row.iter().position(|v| !v.is_finite()) {
                return Err(LoanError::schema_mismatch(format!(
                    "row {} column {} is not a finite number",
                    i + 1,
                    expected[j]
                )));
            }
        }

        if frame.is_empty() {
            return Ok(Vec::new());
        }

        let decisions = self.classifier.predict_rows(frame.rows())?;
        if decisions.len() != frame.len() {
            return Err(LoanError::Inference(format!(
                "classifier returned {} labels for {} rows",
                decisions.len(),
                frame.len()
            )));
        }

        debug!(
            model = %self.classifier.name(),
            rows = frame.len(),
            accepted = decisions.iter().filter(|d| **d == Decision::Accept).count(),
            "Batch prediction complete"
        );

        Ok(decisions)
    }

    /// Preprocess then predict raw records
    pub fn predict_records(&self, records: &[RawRecord]) -> Result<Vec<Decision>> {
        let inputs = self.preprocessor.preprocess_batch(records)?;
        self.predict(&inputs)
    }

    /// Score one application from the single-record interface
    pub fn score_application(&self, application: LoanApplication) -> Result<DecisionMessage> {
        let legacy = application.uses_legacy_mortgage_default();
        let record = application.into_raw_record()?;
        let input = self.preprocessor.preprocess(&record)?;

        let decision = self
            .predict(std::slice::from_ref(&input))?
            .into_iter()
            .next()
            .ok_or_else(|| LoanError::Inference("no decision for application".to_string()))?;

        Ok(DecisionMessage::new(record.id, decision).with_legacy_mortgage_default(legacy))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::preprocess::MODEL_COLUMNS;

    /// Accepts when income feature exceeds a cutoff
    struct IncomeCutoff {
        names: Vec<String>,
        cutoff: f64,
    }

    impl IncomeCutoff {
        fn new(cutoff: f64) -> Self {
            Self {
                names: MODEL_COLUMNS.iter().map(|c| c.to_string()).collect(),
                cutoff,
            }
        }
    }

    impl LoanClassifier for IncomeCutoff {
        fn name(&self) -> &str {
            "income_cutoff"
        }

        fn feature_names(&self) -> &[String] {
            &self.names
        }

        fn predict_rows(&self, rows: &[Vec<f64>]) -> Result<Vec<Decision>> {
            Ok(rows
                .iter()
                .map(|r| {
                    if r[1] > self.cutoff {
                        Decision::Accept
                    } else {
                        Decision::Decline
                    }
                })
                .collect())
        }
    }

    fn service() -> PredictionService {
        PredictionService::from_classifier(Box::new(IncomeCutoff::new(100f64.ln())))
    }

    #[test]
    fn test_batch_order_preserved() {
        let svc = service();
        let incomes = [20.0, 180.0, 45.0, 120.0, 99.0];
        let records: Vec<RawRecord> = incomes
            .iter()
            .map(|&inc| RawRecord::new(40, inc, 2, 1.0, 1, 0.0))
            .collect();

        let decisions = svc.predict_records(&records).unwrap();
        assert_eq!(decisions.len(), incomes.len());
        for (decision, income) in decisions.iter().zip(incomes) {
            let expected = if income > 99.0 {
                Decision::Accept
            } else {
                Decision::Decline
            };
            assert_eq!(*decision, expected);
        }
    }

    #[test]
    fn test_empty_batch() {
        assert!(service().predict(&[]).unwrap().is_empty());
    }

    #[test]
    fn test_frame_column_mismatch() {
        let mut columns: Vec<String> = MODEL_COLUMNS.iter().map(|c| c.to_string()).collect();
        columns[9] = "Mortgage".to_string();
        let frame = FeatureFrame::new(columns, vec![vec![0.0; 10]]);

        let err = service().predict_frame(&frame).unwrap_err();
        assert_eq!(err.kind(), "schema_mismatch");
    }

    #[test]
    fn test_frame_row_width_mismatch_fails_whole_batch() {
        let columns: Vec<String> = MODEL_COLUMNS.iter().map(|c| c.to_string()).collect();
        let frame = FeatureFrame::new(columns, vec![vec![0.0; 10], vec![0.0; 9]]);

        match service().predict_frame(&frame) {
            Err(LoanError::SchemaMismatch { reason }) => assert!(reason.contains("row 2")),
            other => panic!("expected SchemaMismatch, got {:?}", other.map(|d| d.len())),
        }
    }

    #[test]
    fn test_frame_non_finite_value() {
        let columns: Vec<String> = MODEL_COLUMNS.iter().map(|c| c.to_string()).collect();
        let mut row = vec![0.0; 10];
        row[3] = f64::NAN;
        let frame = FeatureFrame::new(columns, vec![row]);

        let err = service().predict_frame(&frame).unwrap_err();
        assert!(err.to_string().contains("CCAvg"));
    }

    #[test]
    fn test_score_application() {
        let app = LoanApplication {
            application_id: Some("web_1".to_string()),
            age: Some(52),
            income: Some(160.0),
            family: Some(1),
            ccavg: Some(3.2),
            education: Some(3),
            securities_account: Some(0),
            cd_account: Some(0),
            online: Some(1),
            credit_card: Some(1),
            mortgage: None,
            ..Default::default()
        };

        let msg = service().score_application(app).unwrap();
        assert_eq!(msg.decision, Decision::Accept);
        assert_eq!(msg.label, 1);
        assert_eq!(msg.application_id.as_deref(), Some("web_1"));
        assert!(msg.legacy_mortgage_default);
    }

    #[test]
    fn test_load_missing_artifact_fails_fast() {
        let config = ModelConfig {
            artifact_path: PathBuf::from("/nonexistent/rf_pipeline.json"),
            format: crate::config::ArtifactFormat::Native,
            onnx_threads: 1,
        };
        match PredictionService::load(&config) {
            Err(LoanError::ModelLoad { .. }) => {}
            Err(other) => panic!("expected ModelLoad, got {other}"),
            Ok(_) => panic!("service must not become ready without a model"),
        }
    }
}
