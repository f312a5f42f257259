//! Loan Acceptance Pipeline Library
//!
//! Predicts whether a bank customer will accept a personal-loan offer.
//! All front ends share one feature preprocessor and one loaded classifier.

pub mod bulk;
pub mod config;
pub mod consumer;
pub mod error;
pub mod logging;
pub mod metrics;
pub mod models;
pub mod preprocess;
pub mod producer;
pub mod store;
pub mod types;
pub mod workers;

pub use config::AppConfig;
pub use consumer::ApplicationConsumer;
pub use error::{LoanError, Result};
pub use models::inference::PredictionService;
pub use preprocess::{FeatureFrame, FeaturePreprocessor, ModelInput};
pub use producer::DecisionProducer;
pub use store::ResultStore;
pub use types::{Decision, DecisionMessage, LoanApplication, RawRecord};
