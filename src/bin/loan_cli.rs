//! Loan CLI
//!
//! Scores bulk CSV files and single applications with the same preprocessing
//! and model as the NATS service, and reads back stored bulk results.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use loan_acceptance_pipeline::{
    bulk, config::AppConfig, logging, LoanApplication, PredictionService, ResultStore,
};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use tracing::info;

#[derive(Parser)]
#[command(author, version, about = "Personal loan acceptance predictions", long_about = None)]
struct Cli {
    /// Configuration file (defaults are used when absent)
    #[arg(long, default_value = "config/config.toml")]
    config: PathBuf,
    /// Override the model artifact path
    #[arg(long)]
    model: Option<PathBuf>,
    /// Override the result store directory
    #[arg(long)]
    results_dir: Option<PathBuf>,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Score a CSV file and append a Prediction column
    Predict {
        /// Input CSV with a header row
        #[arg(long)]
        input: PathBuf,
        /// Write the scored CSV here instead of the result store
        #[arg(long)]
        output: Option<PathBuf>,
    },
    /// Print a stored result to stdout
    Show {
        /// Result identifier printed by `predict`
        result_id: String,
    },
    /// Copy a stored result file out of the result store
    Download {
        /// File name such as predictions_<id>.csv
        file_name: String,
        /// Destination path
        #[arg(long)]
        dest: PathBuf,
    },
    /// Score one application given as individual fields
    Score {
        #[arg(long)]
        age: i64,
        #[arg(long)]
        income: f64,
        #[arg(long)]
        family: i64,
        #[arg(long)]
        ccavg: f64,
        #[arg(long)]
        education: i64,
        #[arg(long)]
        securities_account: i64,
        #[arg(long)]
        cd_account: i64,
        #[arg(long)]
        online: i64,
        #[arg(long)]
        credit_card: i64,
        /// Mortgage value; when omitted the legacy HasMortgage=0 default applies
        #[arg(long)]
        mortgage: Option<f64>,
        /// Identifier echoed in the decision
        #[arg(long)]
        id: Option<String>,
    },
}

fn load_config(cli: &Cli) -> Result<AppConfig> {
    let mut config = if cli.config.exists() {
        AppConfig::load_from_path(&cli.config)?
    } else {
        AppConfig::default()
    };
    if let Some(model) = &cli.model {
        config.model.artifact_path = model.clone();
    }
    if let Some(dir) = &cli.results_dir {
        config.results.dir = dir.clone();
    }
    Ok(config)
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    let config = load_config(&cli)?;
    logging::init(&config.logging)?;

    let store = ResultStore::new(&config.results.dir);

    match cli.command {
        Commands::Predict { input, output } => {
            let service = PredictionService::new(&config).context("Failed to load model")?;
            predict(&service, &store, &input, output.as_deref())
        }
        Commands::Show { result_id } => {
            let contents = store.load(&result_id)?;
            io::stdout().write_all(&contents)?;
            Ok(())
        }
        Commands::Download { file_name, dest } => {
            let source = store.resolve_download(&file_name)?;
            std::fs::copy(&source, &dest)
                .with_context(|| format!("copying {} to {}", source.display(), dest.display()))?;
            info!(from = %source.display(), to = %dest.display(), "Result downloaded");
            Ok(())
        }
        Commands::Score {
            age,
            income,
            family,
            ccavg,
            education,
            securities_account,
            cd_account,
            online,
            credit_card,
            mortgage,
            id,
        } => {
            let service = PredictionService::new(&config).context("Failed to load model")?;
            let application = LoanApplication {
                application_id: id,
                age: Some(age),
                income: Some(income),
                family: Some(family),
                ccavg: Some(ccavg),
                education: Some(education),
                securities_account: Some(securities_account),
                cd_account: Some(cd_account),
                online: Some(online),
                credit_card: Some(credit_card),
                mortgage,
                submitted_at: chrono::Utc::now(),
            };
            let decision = service.score_application(application)?;
            println!("{}", serde_json::to_string_pretty(&decision)?);
            Ok(())
        }
    }
}

fn predict(
    service: &PredictionService,
    store: &ResultStore,
    input: &Path,
    output: Option<&Path>,
) -> Result<()> {
    let contents = std::fs::read(input).with_context(|| format!("reading {}", input.display()))?;
    match output {
        Some(path) => {
            // Scored in memory so a failed file leaves no partial output behind
            let (scored, summary) = bulk::score_csv_bytes(service, &contents)?;
            std::fs::write(path, scored).with_context(|| format!("writing {}", path.display()))?;
            info!(output = %path.display(), "Scored file written");
            println!("{}", serde_json::to_string_pretty(&summary)?);
        }
        None => {
            let reply = bulk::score_and_store(service, store, &contents)?;
            println!("{}", serde_json::to_string_pretty(&reply)?);
        }
    }
    Ok(())
}
