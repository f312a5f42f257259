//! Loan application data structures

use crate::error::{LoanError, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::warn;

/// Column names as they appear in the bank's tabular exports
pub mod columns {
    pub const ID: &str = "ID";
    pub const AGE: &str = "Age";
    pub const EXPERIENCE: &str = "Experience";
    pub const INCOME: &str = "Income";
    pub const ZIP_CODE: &str = "ZIP Code";
    pub const FAMILY: &str = "Family";
    pub const CCAVG: &str = "CCAvg";
    pub const EDUCATION: &str = "Education";
    pub const MORTGAGE: &str = "Mortgage";
    pub const PERSONAL_LOAN: &str = "Personal Loan";
    pub const SECURITIES_ACCOUNT: &str = "Securities Account";
    pub const CD_ACCOUNT: &str = "CD Account";
    pub const ONLINE: &str = "Online";
    pub const CREDIT_CARD: &str = "CreditCard";
    pub const HAS_MORTGAGE: &str = "HasMortgage";
    pub const PREDICTION: &str = "Prediction";

    /// Columns every raw record must carry, in the order they are checked
    pub const REQUIRED: [&str; 10] = [
        AGE,
        INCOME,
        FAMILY,
        CCAVG,
        EDUCATION,
        SECURITIES_ACCOUNT,
        CD_ACCOUNT,
        ONLINE,
        CREDIT_CARD,
        MORTGAGE,
    ];

    /// Columns removed by preprocessing when present
    pub const DROPPED: [&str; 4] = [ID, ZIP_CODE, EXPERIENCE, MORTGAGE];
}

/// A raw applicant record as exported by the bank, before preprocessing
#[derive(Debug, Clone, PartialEq)]
pub struct RawRecord {
    /// Customer identifier, never used by the model
    pub id: Option<String>,

    /// Age in years
    pub age: i64,

    /// Years of professional experience (negative values are invalid, unused by the model)
    pub experience: Option<i64>,

    /// Annual income in thousands
    pub income: f64,

    /// ZIP code, unused by the model
    pub zip_code: Option<String>,

    /// Family size
    pub family: i64,

    /// Average monthly credit card spend in thousands
    pub ccavg: f64,

    /// Education level (1 = undergrad, 2 = graduate, 3 = advanced/professional)
    pub education: i64,

    /// Mortgage value in thousands, zero when the customer has none
    pub mortgage: f64,

    /// Has a securities account with the bank
    pub securities_account: bool,

    /// Has a certificate of deposit account with the bank
    pub cd_account: bool,

    /// Uses internet banking
    pub online: bool,

    /// Uses a credit card issued by the bank
    pub credit_card: bool,
}

impl RawRecord {
    /// Create a record with the fields the model needs and no optional metadata
    pub fn new(age: i64, income: f64, family: i64, ccavg: f64, education: i64, mortgage: f64) -> Self {
        Self {
            id: None,
            age,
            experience: None,
            income,
            zip_code: None,
            family,
            ccavg,
            education,
            mortgage,
            securities_account: false,
            cd_account: false,
            online: false,
            credit_card: false,
        }
    }

    /// Set the four account flags
    pub fn with_flags(
        mut self,
        securities_account: bool,
        cd_account: bool,
        online: bool,
        credit_card: bool,
    ) -> Self {
        self.securities_account = securities_account;
        self.cd_account = cd_account;
        self.online = online;
        self.credit_card = credit_card;
        self
    }

    /// Experience below zero is a data-entry error in the bank's exports
    pub fn has_invalid_experience(&self) -> bool {
        self.experience.is_some_and(|years| years < 0)
    }
}

/// Single application submitted through the scriptable interface.
///
/// Every field is optional on the wire so that an absent field is reported
/// as a missing field by name rather than as a generic parse failure.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LoanApplication {
    /// Caller-supplied identifier echoed in the decision
    #[serde(default, alias = "ID")]
    pub application_id: Option<String>,

    #[serde(rename = "Age")]
    pub age: Option<i64>,

    #[serde(rename = "Income")]
    pub income: Option<f64>,

    #[serde(rename = "Family")]
    pub family: Option<i64>,

    #[serde(rename = "CCAvg")]
    pub ccavg: Option<f64>,

    #[serde(rename = "Education")]
    pub education: Option<i64>,

    #[serde(rename = "Securities Account", alias = "Securities_Account")]
    pub securities_account: Option<i64>,

    #[serde(rename = "CD Account", alias = "CD_Account")]
    pub cd_account: Option<i64>,

    #[serde(rename = "Online")]
    pub online: Option<i64>,

    #[serde(rename = "CreditCard")]
    pub credit_card: Option<i64>,

    /// When absent the legacy form behavior applies and HasMortgage is 0
    #[serde(rename = "Mortgage", default)]
    pub mortgage: Option<f64>,

    /// Submission time (defaults to receipt time)
    #[serde(default = "Utc::now")]
    pub submitted_at: DateTime<Utc>,
}

impl LoanApplication {
    /// Convert into a raw record, checking required fields in column order
    pub fn into_raw_record(self) -> Result<RawRecord> {
        let age = required(self.age, columns::AGE)?;
        let income = required(self.income, columns::INCOME)?;
        let family = required(self.family, columns::FAMILY)?;
        let ccavg = required(self.ccavg, columns::CCAVG)?;
        let education = required(self.education, columns::EDUCATION)?;
        let securities_account = flag(
            columns::SECURITIES_ACCOUNT,
            required(self.securities_account, columns::SECURITIES_ACCOUNT)?,
        )?;
        let cd_account = flag(
            columns::CD_ACCOUNT,
            required(self.cd_account, columns::CD_ACCOUNT)?,
        )?;
        let online = flag(columns::ONLINE, required(self.online, columns::ONLINE)?)?;
        let credit_card = flag(
            columns::CREDIT_CARD,
            required(self.credit_card, columns::CREDIT_CARD)?,
        )?;

        let mortgage = match self.mortgage {
            Some(mortgage) => mortgage,
            None => {
                warn!(
                    application_id = ?self.application_id,
                    "Mortgage not supplied, using legacy HasMortgage=0 default"
                );
                0.0
            }
        };

        Ok(RawRecord {
            id: self.application_id,
            age,
            experience: None,
            income,
            zip_code: None,
            family,
            ccavg,
            education,
            mortgage,
            securities_account,
            cd_account,
            online,
            credit_card,
        })
    }

    /// Whether this application relies on the legacy HasMortgage default
    pub fn uses_legacy_mortgage_default(&self) -> bool {
        self.mortgage.is_none()
    }
}

fn required<T>(value: Option<T>, field: &str) -> Result<T> {
    value.ok_or_else(|| LoanError::missing_field(field))
}

/// Interpret a 0/1 encoded account flag
pub fn flag(field: &str, value: i64) -> Result<bool> {
    match value {
        0 => Ok(false),
        1 => Ok(true),
        other => Err(LoanError::schema_mismatch(format!(
            "{field} must be 0 or 1, got {other}"
        ))),
    }
}
