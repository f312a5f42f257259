//! Bulk CSV scoring: every input column is echoed and a `Prediction` column is appended

use crate::error::{LoanError, Result};
use crate::models::inference::PredictionService;
use crate::preprocess::ColumnIndex;
use crate::store::ResultStore;
use crate::types::application::columns;
use crate::types::decision::{BulkReply, Decision};
use csv::StringRecord;
use serde::Serialize;
use std::io::{Read, Write};
use std::sync::Arc;
use tracing::{info, warn};

/// Outcome counts for one scored file
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct BulkSummary {
    pub rows: usize,
    pub accepted: usize,
}

impl BulkSummary {
    fn from_decisions(decisions: &[Decision]) -> Self {
        Self {
            rows: decisions.len(),
            accepted: decisions.iter().filter(|d| **d == Decision::Accept).count(),
        }
    }
}

/// Score a CSV stream and write the annotated CSV.
///
/// Nothing is written unless the whole file preprocesses and predicts; there
/// is no partial output. An existing `Prediction` column is overwritten in
/// place instead of duplicated.
pub fn score_csv<R: Read, W: Write>(
    service: &PredictionService,
    input: R,
    output: W,
) -> Result<BulkSummary> {
    let mut reader = csv::Reader::from_reader(input);
    let headers = reader.headers()?.clone();

    let index = ColumnIndex::from_headers(&headers)?;
    let rows = reader
        .records()
        .collect::<std::result::Result<Vec<StringRecord>, csv::Error>>()
        .map_err(ragged_row)?;

    let records = rows
        .iter()
        .enumerate()
        .map(|(i, row)| index.parse_row(row, i + 1))
        .collect::<Result<Vec<_>>>()?;

    let invalid_experience = records.iter().filter(|r| r.has_invalid_experience()).count();
    if invalid_experience > 0 {
        warn!(
            rows = invalid_experience,
            "Rows with negative Experience scored; training excluded such rows"
        );
    }

    let decisions = service.predict_records(&records)?;

    let prediction_idx = headers.iter().position(|h| h.trim() == columns::PREDICTION);
    let mut writer = csv::Writer::from_writer(output);

    let mut out_headers = headers.clone();
    if prediction_idx.is_none() {
        out_headers.push_field(columns::PREDICTION);
    }
    writer.write_record(&out_headers)?;

    for (row, decision) in rows.iter().zip(&decisions) {
        let label = decision.label().to_string();
        let out = match prediction_idx {
            Some(idx) => row
                .iter()
                .enumerate()
                .map(|(i, field)| if i == idx { label.as_str() } else { field })
                .collect::<StringRecord>(),
            None => {
                let mut out = row.clone();
                out.push_field(&label);
                out
            }
        };
        writer.write_record(&out)?;
    }
    writer.flush()?;

    let summary = BulkSummary::from_decisions(&decisions);
    info!(
        rows = summary.rows,
        accepted = summary.accepted,
        "Bulk file scored"
    );

    Ok(summary)
}

/// Rows wider or narrower than the header are a schema problem, not a CSV syntax one
fn ragged_row(err: csv::Error) -> LoanError {
    let reason = match err.kind() {
        csv::ErrorKind::UnequalLengths {
            pos,
            expected_len,
            len,
        } => {
            let row = pos
                .as_ref()
                .map_or_else(|| "?".to_string(), |p| p.record().to_string());
            Some(format!("row {row} has {len} fields, header has {expected_len}"))
        }
        _ => None,
    };
    match reason {
        Some(reason) => LoanError::schema_mismatch(reason),
        None => err.into(),
    }
}

/// Score an in-memory CSV upload, returning the annotated file
pub fn score_csv_bytes(service: &PredictionService, input: &[u8]) -> Result<(Vec<u8>, BulkSummary)> {
    let mut output = Vec::new();
    let summary = score_csv(service, input, &mut output)?;
    Ok((output, summary))
}

/// Score an upload and persist the annotated file in the result store
pub fn score_and_store(
    service: &PredictionService,
    store: &ResultStore,
    input: &[u8],
) -> Result<BulkReply> {
    let (output, summary) = score_csv_bytes(service, input)?;
    let id = store.save(&output)?;

    Ok(BulkReply {
        file_name: id.file_name(),
        result_id: id.to_string(),
        rows: summary.rows,
        accepted: summary.accepted,
    })
}

/// Score and store an upload on the blocking thread pool.
///
/// CSV parsing and file writes are synchronous, so async callers go through here.
pub async fn score_and_store_blocking(
    service: Arc<PredictionService>,
    store: Arc<ResultStore>,
    input: Vec<u8>,
) -> Result<BulkReply> {
    tokio::task::spawn_blocking(move || score_and_store(&service, &store, &input))
        .await
        .map_err(|e| LoanError::Inference(format!("bulk scoring task failed: {e}")))?
}
