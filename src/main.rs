//! Bank Term Deposit Predictor - Main Entry Point
//!
//! `predict` scores one customer entered on the command line (or read from a
//! JSON file) and prints the result panel; `serve` answers prediction
//! requests over NATS.

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use deposit_predictor::{
    config::{AppConfig, LoggingConfig, DEFAULT_CONFIG_PATH},
    models::{inference::InferenceEngine, loader::ArtifactCache, loader::ArtifactLoader},
    report::{self, OutputFormat},
    service,
    types::{
        prediction::{ErrorBody, PredictionResponse},
        record::{
            Answer, Contact, CustomerRecord, DayOfWeek, Education, Job, Marital, Month,
            PreviousOutcome,
        },
    },
};
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use tracing::{error, info, warn};

#[derive(Parser)]
#[command(name = "deposit-predictor")]
#[command(about = "Predicts whether a bank customer subscribes to a term deposit")]
struct Cli {
    /// Path to the configuration file
    #[arg(short, long, global = true, default_value = DEFAULT_CONFIG_PATH)]
    config: PathBuf,

    /// Model artifact to use instead of the configured one
    #[arg(short, long, global = true)]
    artifact: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Predict a single customer
    Predict(PredictArgs),
    /// Answer prediction requests over NATS
    Serve,
}

#[derive(Args)]
struct PredictArgs {
    #[command(flatten)]
    form: FormArgs,

    /// Read the customer record from a JSON file instead of the flags
    #[arg(long, conflicts_with = "FormArgs")]
    record: Option<PathBuf>,

    /// Output format
    #[arg(short, long, default_value = "text")]
    format: OutputFormat,

    /// Print the input summary before the result
    #[arg(long)]
    show_input: bool,
}

#[derive(Args)]
struct FormArgs {
    #[arg(long, default_value_t = 35, value_parser = clap::value_parser!(u32).range(17..=100), help_heading = "Profile")]
    age: u32,

    #[arg(long, default_value = "admin.", help_heading = "Profile")]
    job: Job,

    #[arg(long, default_value = "married", help_heading = "Profile")]
    marital: Marital,

    #[arg(long, default_value = "basic", help_heading = "Profile")]
    education: Education,

    /// Has credit in default?
    #[arg(long = "default", default_value = "no", help_heading = "Profile")]
    credit_default: Answer,

    /// Has housing loan?
    #[arg(long, default_value = "no", help_heading = "Profile")]
    housing: Answer,

    /// Has personal loan?
    #[arg(long, default_value = "no", help_heading = "Profile")]
    loan: Answer,

    #[arg(long, default_value = "cellular", help_heading = "Contact & Campaign")]
    contact: Contact,

    #[arg(long, default_value = "jan", help_heading = "Contact & Campaign")]
    month: Month,

    #[arg(long, default_value = "mon", help_heading = "Contact & Campaign")]
    day_of_week: DayOfWeek,

    /// Number of contacts during this campaign
    #[arg(long, default_value_t = 1, value_parser = clap::value_parser!(u32).range(1..), help_heading = "Contact & Campaign")]
    campaign: u32,

    /// Days since last contact
    #[arg(long, default_value_t = 0, help_heading = "Contact & Campaign")]
    pdays: u32,

    /// Contacts before this campaign
    #[arg(long, default_value_t = 0, help_heading = "Contact & Campaign")]
    previous: u32,

    /// Outcome of the previous campaign
    #[arg(long, default_value = "nonexistent", help_heading = "Contact & Campaign")]
    poutcome: PreviousOutcome,

    /// Consumer price index
    #[arg(long = "cons-price-idx", default_value_t = 93.994, allow_negative_numbers = true, help_heading = "Macro Indicators")]
    cons_price_idx: f64,

    /// Consumer confidence index
    #[arg(long = "cons-conf-idx", default_value_t = -36.4, allow_negative_numbers = true, help_heading = "Macro Indicators")]
    cons_conf_idx: f64,

    /// Euribor 3 month rate
    #[arg(long, default_value_t = 4.857, allow_negative_numbers = true, help_heading = "Macro Indicators")]
    euribor3m: f64,
}

impl From<FormArgs> for CustomerRecord {
    fn from(form: FormArgs) -> Self {
        Self {
            age: form.age,
            job: form.job,
            marital: form.marital,
            education: form.education,
            credit_default: form.credit_default,
            housing: form.housing,
            loan: form.loan,
            contact: form.contact,
            month: form.month,
            day_of_week: form.day_of_week,
            campaign: form.campaign,
            pdays: form.pdays,
            previous: form.previous,
            poutcome: form.poutcome,
            cons_price_idx: form.cons_price_idx,
            cons_conf_idx: form.cons_conf_idx,
            euribor3m: form.euribor3m,
        }
    }
}

/// Initialize logging on stderr so prediction output stays clean.
fn init_tracing(logging: &LoggingConfig) -> Result<()> {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env().or_else(|_| {
        tracing_subscriber::EnvFilter::try_new(format!("deposit_predictor={}", logging.level))
    })?;

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr);

    if logging.format.eq_ignore_ascii_case("json") {
        builder.json().init();
    } else {
        builder.init();
    }
    Ok(())
}

fn read_record(args: PredictArgs) -> Result<(CustomerRecord, OutputFormat, bool)> {
    let format = args.format;
    let show_input = args.show_input;
    let record = match args.record {
        Some(path) => {
            let bytes = std::fs::read(&path)
                .context(format!("Failed to read record from {:?}", path))?;
            serde_json::from_slice(&bytes)
                .context(format!("Failed to parse record from {:?}", path))?
        }
        None => CustomerRecord::from(args.form),
    };
    Ok((record, format, show_input))
}

fn run_predict(engine: &InferenceEngine, args: PredictArgs) -> Result<ExitCode> {
    let (record, format, show_input) = read_record(args)?;
    if let Err(message) = record.check_form_bounds() {
        anyhow::bail!("Invalid input: {}", message);
    }

    if show_input && format == OutputFormat::Text {
        println!("{}", report::render_input_summary(&record));
    }

    let degraded = engine.artifact().is_degraded();
    let (response, code) = match engine.predict(&record) {
        Ok(result) => (
            PredictionResponse::success(
                None,
                &result,
                engine.threshold(),
                engine.describe(),
                degraded,
            ),
            ExitCode::SUCCESS,
        ),
        Err(e) => {
            error!(error = %e, "Prediction failed");
            (
                PredictionResponse::failure(
                    None,
                    ErrorBody::from(&e),
                    engine.threshold(),
                    engine.describe(),
                    degraded,
                ),
                ExitCode::FAILURE,
            )
        }
    };

    report::print_prediction(&response, format)?;
    Ok(code)
}

#[tokio::main]
async fn main() -> Result<ExitCode> {
    let cli = Cli::parse();

    // Only the default location may be absent
    let config_found = cli.config.exists();
    if !config_found && cli.config != Path::new(DEFAULT_CONFIG_PATH) {
        anyhow::bail!("Configuration file {:?} not found", cli.config);
    }

    // Load configuration
    let mut config = AppConfig::load_or_default(&cli.config)?;
    if let Some(artifact) = cli.artifact {
        config.artifact.path = artifact;
    }

    init_tracing(&config.logging)?;
    if config_found {
        info!(config = %cli.config.display(), "Configuration loaded");
    } else {
        warn!(config = %cli.config.display(), "Configuration file not found, using defaults");
    }

    // Load the model artifact once for the whole process
    let cache = ArtifactCache::install_global(ArtifactLoader::with_threads(
        config.artifact.onnx_threads,
    ));
    let artifact = cache.get_or_load(&config.artifact.path).context(format!(
        "Cannot start without a usable model artifact ({})",
        config.artifact.path.display()
    ))?;
    let engine = InferenceEngine::new(artifact);

    info!(
        model = %engine.describe(),
        threshold = engine.threshold(),
        degraded = engine.artifact().is_degraded(),
        "Inference engine initialized"
    );

    match cli.command {
        Command::Predict(args) => run_predict(&engine, args),
        Command::Serve => {
            service::run(&config, engine).await?;
            Ok(ExitCode::SUCCESS)
        }
    }
}
