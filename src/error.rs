//! Error taxonomy for the loan acceptance pipeline

use std::path::PathBuf;
use thiserror::Error;

/// Result alias used throughout the library
pub type Result<T> = std::result::Result<T, LoanError>;

/// Errors raised by preprocessing, inference and result storage.
///
/// Callers at a request boundary match on the variant (or on [`LoanError::kind`])
/// to decide how to surface the failure. Only [`LoanError::ModelLoad`] is fatal,
/// and only at startup.
#[derive(Debug, Error)]
pub enum LoanError {
    /// A required input column or field is absent
    #[error("missing required field '{field}'")]
    MissingField { field: String },

    /// Input has the wrong column set, width or value types
    #[error("schema mismatch: {reason}")]
    SchemaMismatch { reason: String },

    /// The model artifact is absent, unreadable or inconsistent
    #[error("failed to load model from {}: {reason}", path.display())]
    ModelLoad { path: PathBuf, reason: String },

    /// A log1p transform produced a non-finite value
    #[error("numeric domain error: {field} = {value} is outside the log1p domain")]
    NumericDomain { field: &'static str, value: f64 },

    /// A requested result does not exist
    #[error("result '{id}' not found")]
    NotFound { id: String },

    /// A download name tried to escape the result directory
    #[error("invalid result file name '{name}'")]
    InvalidFileName { name: String },

    /// Inference backend failure after a successful load
    #[error("inference failed: {0}")]
    Inference(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Csv(#[from] csv::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

impl LoanError {
    pub fn missing_field(field: impl Into<String>) -> Self {
        LoanError::MissingField {
            field: field.into(),
        }
    }

    pub fn schema_mismatch(reason: impl Into<String>) -> Self {
        LoanError::SchemaMismatch {
            reason: reason.into(),
        }
    }

    pub fn model_load(path: impl Into<PathBuf>, reason: impl Into<String>) -> Self {
        LoanError::ModelLoad {
            path: path.into(),
            reason: reason.into(),
        }
    }

    /// Stable snake_case name of the error kind, used in replies and metrics
    pub fn kind(&self) -> &'static str {
        match self {
            LoanError::MissingField { .. } => "missing_field",
            LoanError::SchemaMismatch { .. } => "schema_mismatch",
            LoanError::ModelLoad { .. } => "model_load",
            LoanError::NumericDomain { .. } => "numeric_domain",
            LoanError::NotFound { .. } => "not_found",
            LoanError::InvalidFileName { .. } => "invalid_file_name",
            LoanError::Inference(_) => "inference",
            LoanError::Io(_) => "io",
            LoanError::Csv(_) => "csv",
            LoanError::Json(_) => "json",
        }
    }

    /// Whether the error was caused by the caller's input rather than the service
    pub fn is_client_error(&self) -> bool {
        matches!(
            self,
            LoanError::MissingField { .. }
                | LoanError::SchemaMismatch { .. }
                | LoanError::NumericDomain { .. }
                | LoanError::NotFound { .. }
                | LoanError::InvalidFileName { .. }
                | LoanError::Csv(_)
                | LoanError::Json(_)
        )
    }
}
