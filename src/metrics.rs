//! Performance metrics and outcome tracking for the loan acceptance pipeline.

use crate::types::decision::Decision;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, PoisonError, RwLock};
use std::time::{Duration, Instant};
use tracing::info;

/// Processing-time samples kept before the oldest half is discarded
const MAX_SAMPLES: usize = 10_000;

/// Metrics collector for pipeline performance
pub struct PipelineMetrics {
    /// Single applications scored
    pub applications_scored: AtomicU64,
    /// Applications predicted to accept
    pub accepted: AtomicU64,
    /// Bulk files scored
    pub bulk_batches: AtomicU64,
    /// Rows across all bulk files
    pub bulk_rows: AtomicU64,
    /// Applications that relied on the legacy HasMortgage default
    pub legacy_mortgage_defaults: AtomicU64,
    /// Failures by error kind
    errors_by_kind: RwLock<HashMap<String, u64>>,
    /// Processing times (in microseconds)
    processing_times: RwLock<Vec<u64>>,
    /// Start time for rate calculation
    start_time: Instant,
}

impl PipelineMetrics {
    /// Create a new metrics collector
    pub fn new() -> Self {
        Self {
            applications_scored: AtomicU64::new(0),
            accepted: AtomicU64::new(0),
            bulk_batches: AtomicU64::new(0),
            bulk_rows: AtomicU64::new(0),
            legacy_mortgage_defaults: AtomicU64::new(0),
            errors_by_kind: RwLock::new(HashMap::new()),
            processing_times: RwLock::new(Vec::with_capacity(1000)),
            start_time: Instant::now(),
        }
    }

    /// Record a scored single application
    pub fn record_application(&self, processing_time: Duration, decision: Decision, legacy: bool) {
        self.applications_scored.fetch_add(1, Ordering::Relaxed);
        if decision == Decision::Accept {
            self.accepted.fetch_add(1, Ordering::Relaxed);
        }
        if legacy {
            self.legacy_mortgage_defaults.fetch_add(1, Ordering::Relaxed);
        }
        self.record_time(processing_time);
    }

    /// Record a scored bulk file
    pub fn record_bulk(&self, processing_time: Duration, rows: usize, accepted: usize) {
        self.bulk_batches.fetch_add(1, Ordering::Relaxed);
        self.bulk_rows.fetch_add(rows as u64, Ordering::Relaxed);
        self.accepted.fetch_add(accepted as u64, Ordering::Relaxed);
        self.record_time(processing_time);
    }

    /// Record a failed request
    pub fn record_error(&self, kind: &str) {
        let mut by_kind = self
            .errors_by_kind
            .write()
            .unwrap_or_else(PoisonError::into_inner);
        *by_kind.entry(kind.to_string()).or_insert(0) += 1;
    }

    fn record_time(&self, processing_time: Duration) {
        let mut times = self
            .processing_times
            .write()
            .unwrap_or_else(PoisonError::into_inner);
        times.push(processing_time.as_micros() as u64);
        if times.len() > MAX_SAMPLES {
            times.drain(0..MAX_SAMPLES / 2);
        }
    }

    /// Get processing time statistics
    pub fn get_processing_stats(&self) -> ProcessingStats {
        let times = self
            .processing_times
            .read()
            .unwrap_or_else(PoisonError::into_inner);
        if times.is_empty() {
            return ProcessingStats::default();
        }

        let mut sorted = times.to_vec();
        sorted.sort_unstable();
        let total: u64 = sorted.iter().sum();

        ProcessingStats {
            count: sorted.len() as u64,
            mean_us: total / sorted.len() as u64,
            p50_us: percentile(&sorted, 0.50),
            p95_us: percentile(&sorted, 0.95),
            p99_us: percentile(&sorted, 0.99),
            max_us: sorted.last().copied().unwrap_or_default(),
        }
    }

    /// Get errors by kind
    pub fn get_errors_by_kind(&self) -> HashMap<String, u64> {
        self.errors_by_kind
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Total rows scored, single and bulk
    pub fn total_scored(&self) -> u64 {
        self.applications_scored.load(Ordering::Relaxed) + self.bulk_rows.load(Ordering::Relaxed)
    }

    /// Fraction of scored rows predicted to accept
    pub fn acceptance_rate(&self) -> f64 {
        let total = self.total_scored();
        if total == 0 {
            return 0.0;
        }
        self.accepted.load(Ordering::Relaxed) as f64 / total as f64
    }

    /// Get current throughput (rows per second)
    pub fn get_throughput(&self) -> f64 {
        let elapsed = self.start_time.elapsed().as_secs_f64();
        if elapsed > 0.0 {
            self.total_scored() as f64 / elapsed
        } else {
            0.0
        }
    }

    /// Print summary statistics
    pub fn print_summary(&self) {
        let applications = self.applications_scored.load(Ordering::Relaxed);
        let batches = self.bulk_batches.load(Ordering::Relaxed);
        let bulk_rows = self.bulk_rows.load(Ordering::Relaxed);
        let legacy = self.legacy_mortgage_defaults.load(Ordering::Relaxed);
        let processing = self.get_processing_stats();

        info!("==================== LOAN PIPELINE METRICS ====================");
        info!(
            "Applications: {:>8}  Bulk files: {:>6} ({} rows)  Throughput: {:.1} rows/s",
            applications,
            batches,
            bulk_rows,
            self.get_throughput()
        );
        info!(
            "Acceptance rate: {:>5.1}%  Legacy HasMortgage defaults: {}",
            self.acceptance_rate() * 100.0,
            legacy
        );
        info!(
            "Processing time (us): mean={} p50={} p95={} p99={} max={}",
            processing.mean_us,
            processing.p50_us,
            processing.p95_us,
            processing.p99_us,
            processing.max_us
        );
        let errors = self.get_errors_by_kind();
        if !errors.is_empty() {
            info!("Errors by kind:");
            for (kind, count) in &errors {
                info!("  {:18} {:>6}", kind, count);
            }
        }
        info!("===============================================================");
    }
}

impl Default for PipelineMetrics {
    fn default() -> Self {
        Self::new()
    }
}

/// Nearest-rank percentile of an ascending, non-empty slice
fn percentile(sorted: &[u64], q: f64) -> u64 {
    let rank = ((sorted.len() as f64 * q) as usize).min(sorted.len() - 1);
    sorted[rank]
}

/// Processing time statistics
#[derive(Debug, Default)]
pub struct ProcessingStats {
    pub count: u64,
    pub mean_us: u64,
    pub p50_us: u64,
    pub p95_us: u64,
    pub p99_us: u64,
    pub max_us: u64,
}

/// Real-time metrics reporter that prints periodic summaries
pub struct MetricsReporter {
    metrics: Arc<PipelineMetrics>,
    interval_secs: u64,
}

impl MetricsReporter {
    pub fn new(metrics: Arc<PipelineMetrics>, interval_secs: u64) -> Self {
        Self {
            metrics,
            interval_secs: interval_secs.max(1),
        }
    }

    /// Start the periodic reporting task
    pub async fn start(self) {
        let mut interval = tokio::time::interval(Duration::from_secs(self.interval_secs));
        // First tick completes immediately
        interval.tick().await;
        loop {
            interval.tick().await;
            self.metrics.print_summary();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_metrics_recording() {
        let metrics = PipelineMetrics::new();

        metrics.record_application(Duration::from_micros(100), Decision::Accept, false);
        metrics.record_application(Duration::from_micros(200), Decision::Decline, true);
        metrics.record_bulk(Duration::from_micros(900), 8, 3);

        assert_eq!(metrics.applications_scored.load(Ordering::Relaxed), 2);
        assert_eq!(metrics.legacy_mortgage_defaults.load(Ordering::Relaxed), 1);
        assert_eq!(metrics.total_scored(), 10);
        assert!((metrics.acceptance_rate() - 0.4).abs() < 1e-9);
        assert_eq!(metrics.get_processing_stats().count, 3);
        assert_eq!(metrics.get_processing_stats().max_us, 900);
    }

    #[test]
    fn test_errors_by_kind() {
        let metrics = PipelineMetrics::new();
        metrics.record_error("missing_field");
        metrics.record_error("missing_field");
        metrics.record_error("schema_mismatch");

        let errors = metrics.get_errors_by_kind();
        assert_eq!(errors.get("missing_field"), Some(&2));
        assert_eq!(errors.get("schema_mismatch"), Some(&1));
    }

    #[test]
    fn test_percentile_bounds() {
        let samples: Vec<u64> = (1..=100).collect();
        assert_eq!(percentile(&samples, 0.50), 51);
        assert_eq!(percentile(&samples, 0.99), 100);
        assert_eq!(percentile(&[7], 0.95), 7);
    }

    #[test]
    fn test_empty_stats() {
        let metrics = PipelineMetrics::new();
        assert_eq!(metrics.get_processing_stats().count, 0);
        assert_eq!(metrics.acceptance_rate(), 0.0);
    }
}
