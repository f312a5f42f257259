//! Model loading and inference components

pub mod artifact;
pub mod forest;
pub mod inference;
pub mod loader;
#[cfg(feature = "onnx")]
pub mod onnx;

pub use artifact::{ForestPipeline, ModelArtifact};
pub use inference::{LoanClassifier, PredictionService};
pub use loader::ModelLoader;
