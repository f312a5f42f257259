//! Test Application Producer
//!
//! Generates and publishes synthetic loan applications to NATS for pipeline testing.

use chrono::Utc;
use loan_acceptance_pipeline::LoanApplication;
use rand::Rng;
use std::time::Duration;
use tracing::{info, warn};

/// Application generator for testing
struct ApplicationGenerator {
    rng: rand::rngs::ThreadRng,
    application_counter: u64,
}

impl ApplicationGenerator {
    fn new() -> Self {
        Self {
            rng: rand::thread_rng(),
            application_counter: 0,
        }
    }

    /// Generate a typical customer, most of whom decline loan offers
    fn generate_typical(&mut self) -> LoanApplication {
        self.application_counter += 1;

        LoanApplication {
            application_id: Some(format!("app_{:012}", self.application_counter)),
            age: Some(self.rng.gen_range(23..67)),
            income: Some(self.rng.gen_range(8.0..100.0_f64).round()),
            family: Some(self.rng.gen_range(1..=4)),
            ccavg: Some((self.rng.gen_range(0.0..2.5_f64) * 10.0).round() / 10.0),
            education: Some(self.rng.gen_range(1..=3)),
            securities_account: Some(self.flag(0.1)),
            cd_account: Some(self.flag(0.03)),
            online: Some(self.flag(0.6)),
            credit_card: Some(self.flag(0.3)),
            mortgage: Some(self.mortgage(0.3, 75.0..300.0)),
            submitted_at: Utc::now(),
        }
    }

    /// Generate a high-income, high-spend customer likely to accept
    fn generate_likely_acceptor(&mut self) -> LoanApplication {
        self.application_counter += 1;

        LoanApplication {
            application_id: Some(format!("app_{:012}", self.application_counter)),
            age: Some(self.rng.gen_range(30..60)),
            income: Some(self.rng.gen_range(120.0..225.0_f64).round()),
            family: Some(self.rng.gen_range(3..=4)),
            ccavg: Some((self.rng.gen_range(3.0..8.0_f64) * 10.0).round() / 10.0),
            education: Some(self.rng.gen_range(2..=3)),
            securities_account: Some(self.flag(0.15)),
            cd_account: Some(self.flag(0.3)),
            online: Some(self.flag(0.6)),
            credit_card: Some(self.flag(0.3)),
            mortgage: Some(self.mortgage(0.4, 100.0..600.0)),
            submitted_at: Utc::now(),
        }
    }

    fn flag(&mut self, probability: f64) -> i64 {
        i64::from(self.rng.gen_bool(probability))
    }

    fn mortgage(&mut self, probability: f64, range: std::ops::Range<f64>) -> f64 {
        if self.rng.gen_bool(probability) {
            self.rng.gen_range(range).round()
        } else {
            0.0
        }
    }
}

/// Parse a rate argument, clamped into [0, 1]; unparsable or NaN values use the default
fn probability_arg(arg: Option<&String>, default: f64) -> f64 {
    let value = arg
        .and_then(|s| s.parse::<f64>().ok())
        .filter(|v| !v.is_nan())
        .unwrap_or(default);
    if !(0.0..=1.0).contains(&value) {
        warn!(value, "Rate outside [0, 1], clamping");
    }
    value.clamp(0.0, 1.0)
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("test_producer=info".parse()?),
        )
        .init();

    info!("Starting Test Application Producer");

    // Parse arguments
    let args: Vec<String> = std::env::args().collect();
    let nats_url = args.get(1).map(|s| s.as_str()).unwrap_or("nats://localhost:4222");
    let subject = args.get(2).map(|s| s.as_str()).unwrap_or("loan.applications");
    let count: u64 = args.get(3).and_then(|s| s.parse().ok()).unwrap_or(100);
    let acceptor_rate = probability_arg(args.get(4), 0.1);
    let delay_ms: u64 = args.get(5).and_then(|s| s.parse().ok()).unwrap_or(100);
    // Share of applications sent without Mortgage to exercise the legacy default
    let legacy_rate = probability_arg(args.get(6), 0.0);

    info!(
        nats_url = %nats_url,
        subject = %subject,
        count = count,
        acceptor_rate = acceptor_rate,
        legacy_rate = legacy_rate,
        delay_ms = delay_ms,
        "Configuration loaded"
    );

    // Connect to NATS
    let client = match async_nats::connect(nats_url).await {
        Ok(c) => {
            info!("Connected to NATS");
            c
        }
        Err(e) => {
            warn!(error = %e, "Failed to connect to NATS. Running in dry-run mode.");
            return run_dry_mode(count, acceptor_rate, legacy_rate, delay_ms).await;
        }
    };

    let mut generator = ApplicationGenerator::new();
    let mut rng = rand::thread_rng();

    info!("Starting to publish {} applications...", count);

    let mut typical_count = 0;
    let mut acceptor_count = 0;

    for i in 0..count {
        let mut application = if rng.gen_bool(acceptor_rate) {
            acceptor_count += 1;
            generator.generate_likely_acceptor()
        } else {
            typical_count += 1;
            generator.generate_typical()
        };
        if rng.gen_bool(legacy_rate) {
            application.mortgage = None;
        }

        let payload = serde_json::to_vec(&application)?;

        client.publish(subject.to_string(), payload.into()).await?;

        if (i + 1) % 10 == 0 {
            info!(
                "Published {}/{} applications ({} typical, {} likely acceptors)",
                i + 1,
                count,
                typical_count,
                acceptor_count
            );
        }

        tokio::time::sleep(Duration::from_millis(delay_ms)).await;
    }

    info!(
        "Completed! Published {} applications ({} typical, {} likely acceptors)",
        count, typical_count, acceptor_count
    );

    Ok(())
}

async fn run_dry_mode(
    count: u64,
    acceptor_rate: f64,
    legacy_rate: f64,
    delay_ms: u64,
) -> anyhow::Result<()> {
    info!("Running in dry-run mode (no NATS connection)");

    let mut generator = ApplicationGenerator::new();
    let mut rng = rand::thread_rng();

    for i in 0..count {
        let mut application = if rng.gen_bool(acceptor_rate) {
            generator.generate_likely_acceptor()
        } else {
            generator.generate_typical()
        };
        if rng.gen_bool(legacy_rate) {
            application.mortgage = None;
        }

        let json = serde_json::to_string_pretty(&application)?;

        if (i + 1) % 10 == 0 || i == 0 {
            info!("Sample application {}:\n{}", i + 1, json);
        }

        tokio::time::sleep(Duration::from_millis(delay_ms)).await;
    }

    Ok(())
}
