mod commands;
mod input;
mod output;

use clap::{Parser, Subcommand, ValueEnum};
use colored::Colorize;
use std::process;
use tracing_subscriber::EnvFilter;

use commands::covenants::{EvaluateArgs, TestBatchArgs, TestRunArgs};
use commands::risk::{BorrowerRiskArgs, PortfolioRiskArgs, RiskScoreArgs};

/// Loan covenant monitoring
#[derive(Parser)]
#[command(
    name = "covmon",
    version,
    about = "Loan covenant compliance testing and borrower risk scoring",
    long_about = "A CLI for testing loan covenants against financial periods with \
                  decimal precision, raising breach and warning alerts, and scoring \
                  borrower and portfolio risk from covenant test history."
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Output format
    #[arg(long, default_value = "json", global = true)]
    output: OutputFormat,
}

#[derive(Subcommand)]
enum Commands {
    /// Evaluate one covenant against one financial period
    Evaluate(EvaluateArgs),
    /// Test every covenant of a loan against its latest financial period
    TestRun(TestRunArgs),
    /// Run covenant tests for several loans in one pass
    TestBatch(TestBatchArgs),
    /// Score pre-aggregated borrower risk factors
    RiskScore(RiskScoreArgs),
    /// Score a borrower from covenant test history
    BorrowerRisk(BorrowerRiskArgs),
    /// Rank every borrower in a portfolio by risk score
    PortfolioRisk(PortfolioRiskArgs),
    /// Print version information
    Version,
}

#[derive(Debug, Clone, ValueEnum)]
pub enum OutputFormat {
    Json,
    Table,
    Csv,
    Minimal,
}

/// Diagnostics go to stderr so stdout stays machine-readable.
/// Level comes from RUST_LOG (default: warn).
fn init_logging() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .try_init();
}

fn main() {
    let cli = Cli::parse();
    init_logging();

    let result: Result<serde_json::Value, Box<dyn std::error::Error>> = match cli.command {
        Commands::Evaluate(args) => commands::covenants::run_evaluate(args),
        Commands::TestRun(args) => commands::covenants::run_test_run(args),
        Commands::TestBatch(args) => commands::covenants::run_test_batch(args),
        Commands::RiskScore(args) => commands::risk::run_risk_score(args),
        Commands::BorrowerRisk(args) => commands::risk::run_borrower_risk(args),
        Commands::PortfolioRisk(args) => commands::risk::run_portfolio_risk(args),
        Commands::Version => {
            println!("covmon {}", env!("CARGO_PKG_VERSION"));
            return;
        }
    };

    match result {
        Ok(value) => {
            output::format_output(&cli.output, &value);
            process::exit(0);
        }
        Err(e) => {
            tracing::debug!(error = %e, "command failed");
            eprintln!("{}: {}", "error".red().bold(), e);
            process::exit(1);
        }
    }
}
