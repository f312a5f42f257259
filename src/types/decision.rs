//! Loan decision data structures

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Binary outcome predicted for an applicant
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Decision {
    /// Will not accept the loan offer (label 0)
    Decline,
    /// Will accept the loan offer (label 1)
    Accept,
}

impl Decision {
    /// Build a decision from a classifier label
    pub fn from_label(label: i64) -> Option<Self> {
        match label {
            0 => Some(Decision::Decline),
            1 => Some(Decision::Accept),
            _ => None,
        }
    }

    /// Label written to the `Prediction` column
    pub fn label(self) -> u8 {
        match self {
            Decision::Decline => 0,
            Decision::Accept => 1,
        }
    }

    /// Human-readable outcome shown to form users
    pub fn message(self) -> &'static str {
        match self {
            Decision::Accept => "Likely to accept Personal Loan",
            Decision::Decline => "Not likely to accept Personal Loan",
        }
    }
}

/// Decision published for a single scored application
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DecisionMessage {
    /// Unique decision identifier
    pub decision_id: String,

    /// Identifier supplied with the application, if any
    pub application_id: Option<String>,

    /// Classifier label (0 or 1)
    pub label: u8,

    pub decision: Decision,

    /// Human-readable outcome
    pub message: String,

    /// Whether HasMortgage came from the legacy default instead of a Mortgage value
    #[serde(default)]
    pub legacy_mortgage_default: bool,

    /// Decision timestamp
    pub timestamp: DateTime<Utc>,
}

impl DecisionMessage {
    /// Create a new decision message
    pub fn new(application_id: Option<String>, decision: Decision) -> Self {
        Self {
            decision_id: uuid::Uuid::new_v4().to_string(),
            application_id,
            label: decision.label(),
            decision,
            message: decision.message().to_string(),
            legacy_mortgage_default: false,
            timestamp: Utc::now(),
        }
    }

    /// Mark the decision as produced through the legacy HasMortgage default
    pub fn with_legacy_mortgage_default(mut self, legacy: bool) -> Self {
        self.legacy_mortgage_default = legacy;
        self
    }
}

/// Reply sent after a bulk upload has been scored and stored
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BulkReply {
    pub result_id: String,
    pub file_name: String,
    pub rows: usize,
    pub accepted: usize,
}

/// Error body returned on a reply subject
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorReply {
    pub error: ErrorBody,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorBody {
    pub kind: String,
    pub message: String,
}

impl ErrorReply {
    pub fn new(kind: &str, message: impl Into<String>) -> Self {
        Self {
            error: ErrorBody {
                kind: kind.to_string(),
                message: message.into(),
            },
        }
    }
}

impl From<&crate::error::LoanError> for ErrorReply {
    fn from(err: &crate::error::LoanError) -> Self {
        ErrorReply::new(err.kind(), err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::LoanError;

    #[test]
    fn test_decision_from_label() {
        assert_eq!(Decision::from_label(0), Some(Decision::Decline));
        assert_eq!(Decision::from_label(1), Some(Decision::Accept));
        assert_eq!(Decision::from_label(2), None);
        assert_eq!(Decision::Accept.label(), 1);
    }

    #[test]
    fn test_decision_message_serialization() {
        let msg = DecisionMessage::new(Some("app_9".to_string()), Decision::Accept);

        let json = serde_json::to_string(&msg).unwrap();
        assert!(json.contains("\"decision\":\"accept\""));

        let deserialized: DecisionMessage = serde_json::from_str(&json).unwrap();
        assert_eq!(deserialized.application_id.as_deref(), Some("app_9"));
        assert_eq!(deserialized.label, 1);
        assert_eq!(deserialized.message, "Likely to accept Personal Loan");
    }

    #[test]
    fn test_error_reply_from_error() {
        let err = LoanError::missing_field("Mortgage");
        let reply = ErrorReply::from(&err);
        assert_eq!(reply.error.kind, "missing_field");
        assert!(reply.error.message.contains("Mortgage"));
    }
}
