//! Feature preprocessing for loan acceptance model inference.
//!
//! This is the one place where raw applicant data is turned into the feature
//! layout the classifier was fitted on. Every front end (message bus, bulk
//! CSV, command line) goes through [`FeaturePreprocessor`], so the training
//! transforms are applied exactly once and identically everywhere:
//!
//! - `Income` and `CCAvg` are replaced by `ln(1 + x)`
//! - `HasMortgage` is 1 when `Mortgage > 0`, else 0
//! - `ID`, `ZIP Code`, `Experience` and `Mortgage` are dropped
//!
//! `ln(1 + x)` is not idempotent. A [`ModelInput`] is a different type from a
//! [`RawRecord`] so it cannot be fed back through the preprocessor by accident;
//! copying transformed values back into a raw record and preprocessing again
//! silently shifts the decision boundary.

use crate::error::{LoanError, Result};
use crate::types::application::{columns, flag, RawRecord};
use csv::StringRecord;
use serde::Serialize;

/// Number of features the classifier consumes
pub const FEATURE_COUNT: usize = 10;

/// Model columns in the order the classifier was fitted on
pub const MODEL_COLUMNS: [&str; FEATURE_COUNT] = [
    columns::AGE,
    columns::INCOME,
    columns::FAMILY,
    columns::CCAVG,
    columns::EDUCATION,
    columns::SECURITIES_ACCOUNT,
    columns::CD_ACCOUNT,
    columns::ONLINE,
    columns::CREDIT_CARD,
    columns::HAS_MORTGAGE,
];

/// One preprocessed record, ready for the classifier
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ModelInput {
    pub age: i64,
    /// `ln(1 + Income)`
    pub income: f64,
    pub family: i64,
    /// `ln(1 + CCAvg)`
    pub ccavg: f64,
    pub education: i64,
    pub securities_account: bool,
    pub cd_account: bool,
    pub online: bool,
    pub credit_card: bool,
    pub has_mortgage: bool,
}

impl ModelInput {
    /// Feature vector in [`MODEL_COLUMNS`] order
    pub fn to_features(&self) -> [f64; FEATURE_COUNT] {
        [
            self.age as f64,
            self.income,
            self.family as f64,
            self.ccavg,
            self.education as f64,
            bool_feature(self.securities_account),
            bool_feature(self.cd_account),
            bool_feature(self.online),
            bool_feature(self.credit_card),
            bool_feature(self.has_mortgage),
        ]
    }
}

fn bool_feature(value: bool) -> f64 {
    if value {
        1.0
    } else {
        0.0
    }
}

/// Named columns plus numeric rows, the tabular form handed to the classifier
#[derive(Debug, Clone, PartialEq)]
pub struct FeatureFrame {
    columns: Vec<String>,
    rows: Vec<Vec<f64>>,
}

impl FeatureFrame {
    /// Build a frame from arbitrary columns and rows; validated at prediction time
    pub fn new(columns: Vec<String>, rows: Vec<Vec<f64>>) -> Self {
        Self { columns, rows }
    }

    /// Build a frame in model column order from preprocessed records
    pub fn from_inputs(inputs: &[ModelInput]) -> Self {
        Self {
            columns: MODEL_COLUMNS.iter().map(|c| c.to_string()).collect(),
            rows: inputs.iter().map(|i| i.to_features().to_vec()).collect(),
        }
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn rows(&self) -> &[Vec<f64>] {
        &self.rows
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

/// `ln(1 + value)`, failing when the result leaves the real line
pub fn log1p_feature(field: &'static str, value: f64) -> Result<f64> {
    let transformed = value.ln_1p();
    if transformed.is_finite() {
        Ok(transformed)
    } else {
        Err(LoanError::NumericDomain { field, value })
    }
}

/// Binarized mortgage indicator; zero and negative balances map to false
pub fn has_mortgage(mortgage: f64) -> bool {
    mortgage > 0.0
}

/// Positions of the columns of interest in a CSV header row
#[derive(Debug, Clone)]
pub struct ColumnIndex {
    required: [usize; 10],
    id: Option<usize>,
    zip_code: Option<usize>,
    experience: Option<usize>,
}

impl ColumnIndex {
    /// Locate columns, reporting the first missing required one
    pub fn from_headers(headers: &StringRecord) -> Result<Self> {
        let position = |name: &str| headers.iter().position(|h| h.trim() == name);

        let mut required = [0usize; 10];
        for (slot, name) in required.iter_mut().zip(columns::REQUIRED) {
            *slot = position(name).ok_or_else(|| LoanError::missing_field(name))?;
        }

        Ok(Self {
            required,
            id: position(columns::ID),
            zip_code: position(columns::ZIP_CODE),
            experience: position(columns::EXPERIENCE),
        })
    }

    /// Parse one data row (1-based `row_no` for messages) into a raw record
    pub fn parse_row(&self, row: &StringRecord, row_no: usize) -> Result<RawRecord> {
        let [age, income, family, ccavg, education, securities, cd, online, credit_card, mortgage] =
            self.required;

        let optional_text = |idx: Option<usize>| {
            idx.and_then(|i| row.get(i))
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(str::to_string)
        };

        // Experience is dropped; unreadable values are kept only as "unknown"
        let experience = self
            .experience
            .and_then(|i| row.get(i))
            .and_then(|text| text.trim().parse::<i64>().ok());

        Ok(RawRecord {
            id: optional_text(self.id),
            age: parse_integer(row_no, columns::AGE, cell(row, age, columns::AGE)?)?,
            experience,
            income: parse_float(row_no, columns::INCOME, cell(row, income, columns::INCOME)?)?,
            zip_code: optional_text(self.zip_code),
            family: parse_integer(row_no, columns::FAMILY, cell(row, family, columns::FAMILY)?)?,
            ccavg: parse_float(row_no, columns::CCAVG, cell(row, ccavg, columns::CCAVG)?)?,
            education: parse_integer(
                row_no,
                columns::EDUCATION,
                cell(row, education, columns::EDUCATION)?,
            )?,
            mortgage: parse_float(
                row_no,
                columns::MORTGAGE,
                cell(row, mortgage, columns::MORTGAGE)?,
            )?,
            securities_account: parse_flag(
                row_no,
                columns::SECURITIES_ACCOUNT,
                cell(row, securities, columns::SECURITIES_ACCOUNT)?,
            )?,
            cd_account: parse_flag(row_no, columns::CD_ACCOUNT, cell(row, cd, columns::CD_ACCOUNT)?)?,
            online: parse_flag(row_no, columns::ONLINE, cell(row, online, columns::ONLINE)?)?,
            credit_card: parse_flag(
                row_no,
                columns::CREDIT_CARD,
                cell(row, credit_card, columns::CREDIT_CARD)?,
            )?,
        })
    }
}

fn cell<'a>(row: &'a StringRecord, idx: usize, column: &str) -> Result<&'a str> {
    match row.get(idx).map(str::trim) {
        Some(text) if !text.is_empty() => Ok(text),
        _ => Err(LoanError::missing_field(column)),
    }
}

fn parse_float(row_no: usize, column: &str, text: &str) -> Result<f64> {
    text.parse::<f64>().map_err(|_| {
        LoanError::schema_mismatch(format!(
            "row {row_no}: {column} value '{text}' is not a number"
        ))
    })
}

fn parse_integer(row_no: usize, column: &str, text: &str) -> Result<i64> {
    if let Ok(value) = text.parse::<i64>() {
        return Ok(value);
    }
    // Exports that went through a float column write "2.0"
    let value = parse_float(row_no, column, text)?;
    if value.is_finite() && value.fract() == 0.0 {
        Ok(value as i64)
    } else {
        Err(LoanError::schema_mismatch(format!(
            "row {row_no}: {column} value '{text}' is not an integer"
        )))
    }
}

fn parse_flag(row_no: usize, column: &str, text: &str) -> Result<bool> {
    let value = parse_integer(row_no, column, text)?;
    flag(column, value).map_err(|_| {
        LoanError::schema_mismatch(format!(
            "row {row_no}: {column} value '{text}' must be 0 or 1"
        ))
    })
}

/// Feature preprocessor that transforms raw records into model input.
///
/// Stateless; share one instance or create them freely.
#[derive(Debug, Clone, Copy, Default)]
pub struct FeaturePreprocessor;

impl FeaturePreprocessor {
    /// Create a new feature preprocessor.
    pub fn new() -> Self {
        Self
    }

    /// Preprocess a single raw record.
    pub fn preprocess(&self, record: &RawRecord) -> Result<ModelInput> {
        Ok(ModelInput {
            age: record.age,
            income: log1p_feature(columns::INCOME, record.income)?,
            family: record.family,
            ccavg: log1p_feature(columns::CCAVG, record.ccavg)?,
            education: record.education,
            securities_account: record.securities_account,
            cd_account: record.cd_account,
            online: record.online,
            credit_card: record.credit_card,
            has_mortgage: has_mortgage(record.mortgage),
        })
    }

    /// Preprocess records, preserving order. Fails on the first bad record.
    pub fn preprocess_batch(&self, records: &[RawRecord]) -> Result<Vec<ModelInput>> {
        records.iter().map(|r| self.preprocess(r)).collect()
    }

    /// Parse a raw CSV table into records.
    ///
    /// Required headers are checked before any row is read.
    pub fn parse_table(&self, headers: &StringRecord, rows: &[StringRecord]) -> Result<Vec<RawRecord>> {
        let index = ColumnIndex::from_headers(headers)?;
        rows.iter()
            .enumerate()
            .map(|(i, row)| index.parse_row(row, i + 1))
            .collect()
    }

    /// Parse and preprocess a raw CSV table into a frame in model column order.
    pub fn preprocess_table(&self, headers: &StringRecord, rows: &[StringRecord]) -> Result<FeatureFrame> {
        let records = self.parse_table(headers, rows)?;
        let inputs = self.preprocess_batch(&records)?;
        Ok(FeatureFrame::from_inputs(&inputs))
    }

    /// Get the number of features produced.
    pub fn feature_count(&self) -> usize {
        FEATURE_COUNT
    }

    /// Get feature names in model order.
    pub fn feature_names(&self) -> &'static [&'static str] {
        &MODEL_COLUMNS
    }
}
