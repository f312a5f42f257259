//! Type definitions for the loan acceptance pipeline

pub mod application;
pub mod decision;

pub use application::{columns, LoanApplication, RawRecord};
pub use decision::{BulkReply, Decision, DecisionMessage, ErrorReply};
