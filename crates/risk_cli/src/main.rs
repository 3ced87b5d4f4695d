//! Credit default risk CLI
//!
//! Scores one customer from the five form fields and prints the default
//! probability, the risk tier and the feature contributions.

use anyhow::{Context, Result};
use clap::Parser;
use credit_risk_core::{BackendKind, FormInput, Report, RiskConfig, RiskService};
use std::path::PathBuf;
use tracing::info;
use tracing_subscriber::{EnvFilter, FmtSubscriber};

#[derive(Parser, Debug)]
#[command(name = "risk-predict")]
#[command(author = "Credit Risk Contributors")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Credit card default risk prediction", long_about = None)]
struct Args {
    /// TOML configuration file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Model artifact, overrides the configured path
    #[arg(short, long)]
    model: Option<PathBuf>,

    /// Inference backend (classifier | booster)
    #[arg(long)]
    backend: Option<BackendKind>,

    /// Credit limit
    #[arg(long, default_value = "200000")]
    limit_bal: f64,

    /// Age in years
    #[arg(long, default_value = "35")]
    age: f64,

    /// Last payment delay code (-2..=4)
    #[arg(long, default_value = "0", allow_hyphen_values = true)]
    pay_0: i32,

    /// Last bill amount
    #[arg(long, default_value = "50000")]
    bill_amt1: f64,

    /// Last payment amount
    #[arg(long, default_value = "10000")]
    pay_amt1: f64,

    /// Skip feature contributions
    #[arg(long)]
    no_explain: bool,

    /// Print the report as JSON
    #[arg(long)]
    json: bool,

    /// Verbose logging
    #[arg(short, long)]
    verbose: bool,
}

fn init_logging(verbose: bool, default_level: &str) -> Result<()> {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(if verbose { "debug" } else { default_level }))
        .context("Invalid log filter")?;

    let subscriber = FmtSubscriber::builder()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .finish();

    tracing::subscriber::set_global_default(subscriber)
        .context("Failed to set tracing subscriber")
}

/// Command-line flags win over the environment and the file
fn apply_cli_overrides(args: &Args, config: &mut RiskConfig) {
    if let Some(model) = &args.model {
        config.model.path = model.clone();
        // the configured format belonged to the configured path
        config.model.format = None;
    }
    if let Some(backend) = args.backend {
        config.model.backend = backend;
    }
    if args.no_explain {
        config.explain.enabled = false;
    }
}

fn main() -> Result<()> {
    let args = Args::parse();

    let mut config = RiskConfig::from_path_or_default(args.config.as_deref())
        .context("Failed to load configuration")?;

    init_logging(args.verbose, &config.effective_log_level())?;
    info!("Credit default risk predictor v{}", credit_risk_core::VERSION);

    config.apply_env_overrides();
    apply_cli_overrides(&args, &mut config);

    let service = RiskService::from_config(&config).context("Invalid configuration")?;
    let model = service.warm_up().with_context(|| {
        format!("Failed to load model artifact {}", config.model.path.display())
    })?;
    info!(backend = %model.backend().kind(), hash = %model.hash(), "ready");

    let form = FormInput {
        limit_bal: args.limit_bal,
        age: args.age,
        pay_0: args.pay_0,
        bill_amt1: args.bill_amt1,
        pay_amt1: args.pay_amt1,
    };
    let partial = form.to_partial().context("Invalid form input")?;

    let assessment = service.assess(&partial).context("Prediction failed")?;
    let report = Report::from_assessment(&assessment);

    if args.json {
        println!("{}", report.to_json_pretty()?);
    } else {
        print!("{report}");
    }

    Ok(())
}
