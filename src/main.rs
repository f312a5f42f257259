//! Loan Acceptance Pipeline - Main Entry Point
//!
//! Consumes loan applications and bulk CSV uploads from NATS, scores them with
//! the loaded classifier, and publishes decisions.

use anyhow::{Context, Result};
use async_nats::Message;
use futures::StreamExt;
use loan_acceptance_pipeline::{
    bulk,
    config::AppConfig,
    consumer::ApplicationConsumer,
    logging,
    metrics::{MetricsReporter, PipelineMetrics},
    producer::DecisionProducer,
    store::ResultStore,
    types::decision::ErrorReply,
    workers::WorkerPool,
    LoanApplication, LoanError, PredictionService,
};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Instant;
use tracing::{error, info, warn};

/// Message received on one of the service subjects
enum Inbound {
    Application(Message),
    Bulk(Message),
}

/// Shared state handed to every message task
#[derive(Clone)]
struct Shared {
    service: Arc<PredictionService>,
    store: Arc<ResultStore>,
    producer: Arc<DecisionProducer>,
    metrics: Arc<PipelineMetrics>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let config_path =
        std::env::var("LOAN_CONFIG").unwrap_or_else(|_| "config/config.toml".to_string());
    let config = AppConfig::load_from_path(&config_path)?;

    logging::init(&config.logging)?;

    info!("Starting Loan Acceptance Pipeline");
    info!(path = %config_path, "Configuration loaded successfully");

    let metrics = Arc::new(PipelineMetrics::new());

    // The service never starts without a model
    let service = Arc::new(
        PredictionService::new(&config).context("Model load failed, refusing to start")?,
    );
    info!(
        model = %service.model_name(),
        features = ?service.feature_names(),
        "Prediction service initialized"
    );

    let store = Arc::new(ResultStore::new(&config.results.dir));
    info!(dir = %store.dir().display(), "Result store ready");

    let client = async_nats::connect(&config.nats.url).await?;
    info!("Connected to NATS at {}", config.nats.url);

    let consumer = ApplicationConsumer::new(
        client.clone(),
        &config.nats.application_subject,
        &config.nats.bulk_subject,
    );
    let producer = Arc::new(DecisionProducer::new(
        client.clone(),
        &config.nats.decision_subject,
    ));
    info!("Publishing decisions to: {}", producer.subject());

    let workers = WorkerPool::new(config.pipeline.workers);
    info!(
        "Starting processing loop with {} parallel workers",
        workers.size()
    );

    let processed_count = Arc::new(AtomicU64::new(0));

    let metrics_clone = metrics.clone();
    let interval = config.pipeline.metrics_interval_secs;
    tokio::spawn(async move {
        let reporter = MetricsReporter::new(metrics_clone, interval);
        reporter.start().await;
    });

    let applications = consumer
        .subscribe_applications()
        .await?
        .map(Inbound::Application);
    let bulk_uploads = consumer.subscribe_bulk().await?.map(Inbound::Bulk);
    let mut inbound = futures::stream::select(applications, bulk_uploads).boxed();

    let ctx = Shared {
        service,
        store,
        producer,
        metrics: metrics.clone(),
    };

    loop {
        let message = tokio::select! {
            message = inbound.next() => match message {
                Some(message) => message,
                None => break,
            },
            _ = tokio::signal::ctrl_c() => {
                info!("Interrupt received");
                break;
            }
        };

        let ctx = ctx.clone();
        let processed_count = processed_count.clone();

        workers.spawn(async move {
            match message {
                Inbound::Application(message) => handle_application(&ctx, message).await,
                Inbound::Bulk(message) => handle_bulk(&ctx, message).await,
            }

            let count = processed_count.fetch_add(1, Ordering::Relaxed) + 1;
            if count % 100 == 0 {
                let stats = ctx.metrics.get_processing_stats();
                info!(
                    processed = count,
                    throughput = format!("{:.1} rows/s", ctx.metrics.get_throughput()),
                    avg_latency_us = stats.mean_us,
                    "Processing milestone"
                );
            }
        })
        .await?;
    }

    info!("Pipeline shutting down, waiting for in-flight messages...");
    workers.shutdown().await?;
    metrics.print_summary();

    Ok(())
}

async fn handle_application(ctx: &Shared, message: Message) {
    let start_time = Instant::now();

    let outcome = serde_json::from_slice::<LoanApplication>(&message.payload)
        .map_err(LoanError::from)
        .and_then(|application| ctx.service.score_application(application));

    match outcome {
        Ok(decision) => {
            let processing_time = start_time.elapsed();
            ctx.metrics.record_application(
                processing_time,
                decision.decision,
                decision.legacy_mortgage_default,
            );

            if let Err(e) = ctx.producer.publish(&decision).await {
                error!(
                    decision_id = %decision.decision_id,
                    error = %e,
                    "Failed to publish loan decision"
                );
            }
            if let Some(reply_to) = message.reply {
                if let Err(e) = ctx.producer.reply(reply_to, &decision).await {
                    error!(error = %e, "Failed to reply with loan decision");
                }
            }

            info!(
                application_id = ?decision.application_id,
                label = decision.label,
                processing_time_us = processing_time.as_micros(),
                "Application scored"
            );
        }
        Err(e) => reject(ctx, message, e).await,
    }
}

async fn handle_bulk(ctx: &Shared, message: Message) {
    let start_time = Instant::now();

    let upload = bulk::score_and_store_blocking(
        ctx.service.clone(),
        ctx.store.clone(),
        message.payload.to_vec(),
    )
    .await;

    match upload {
        Ok(reply) => {
            let processing_time = start_time.elapsed();
            ctx.metrics
                .record_bulk(processing_time, reply.rows, reply.accepted);

            info!(
                result_id = %reply.result_id,
                rows = reply.rows,
                accepted = reply.accepted,
                processing_time_us = processing_time.as_micros(),
                "Bulk upload scored"
            );

            match message.reply {
                Some(reply_to) => {
                    if let Err(e) = ctx.producer.reply(reply_to, &reply).await {
                        error!(result_id = %reply.result_id, error = %e, "Failed to reply to bulk upload");
                    }
                }
                None => warn!(
                    result_id = %reply.result_id,
                    "Bulk upload had no reply subject; result stored only"
                ),
            }
        }
        Err(e) => reject(ctx, message, e).await,
    }
}

/// Log a failed request and return the error to the caller when it asked for a reply
async fn reject(ctx: &Shared, message: Message, err: LoanError) {
    ctx.metrics.record_error(err.kind());

    if err.is_client_error() {
        warn!(subject = %message.subject, kind = err.kind(), error = %err, "Rejected request");
    } else {
        error!(subject = %message.subject, kind = err.kind(), error = %err, "Request failed");
    }

    if let Some(reply_to) = message.reply {
        if let Err(e) = ctx.producer.reply(reply_to, &ErrorReply::from(&err)).await {
            error!(error = %e, "Failed to send error reply");
        }
    }
}
