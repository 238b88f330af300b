use chrono::{DateTime, Utc};
use clap::Args;
use serde_json::Value;

use covenant_monitor_core::covenants::evaluator::{self, CovenantEvaluationInput};
use covenant_monitor_core::covenants::orchestrator::{self, TestRunInput};

use crate::input;

/// Arguments for evaluating a single covenant against one financial period
#[derive(Args)]
pub struct EvaluateArgs {
    /// Path to JSON/YAML input file ({ covenant, snapshot, tested_at? })
    #[arg(long)]
    pub input: Option<String>,

    /// Test timestamp (RFC 3339); defaults to now
    #[arg(long)]
    pub tested_at: Option<DateTime<Utc>>,
}

/// Arguments for a full covenant test run on one loan
#[derive(Args)]
pub struct TestRunArgs {
    /// Path to JSON/YAML input file ({ loan, covenants, financial_periods })
    #[arg(long)]
    pub input: Option<String>,

    /// Timestamp shared by every result of the run (RFC 3339); defaults to now
    #[arg(long)]
    pub tested_at: Option<DateTime<Utc>>,
}

/// Arguments for running several loans in one pass
#[derive(Args)]
pub struct TestBatchArgs {
    /// Path to JSON/YAML input file (array of test-run documents)
    #[arg(long)]
    pub input: Option<String>,

    /// Timestamp applied to every run that does not carry its own (RFC 3339)
    #[arg(long)]
    pub tested_at: Option<DateTime<Utc>>,
}

pub fn run_evaluate(args: EvaluateArgs) -> Result<Value, Box<dyn std::error::Error>> {
    let mut eval_input: CovenantEvaluationInput =
        input::read_input(args.input.as_deref(), "covenant evaluation")?;
    if args.tested_at.is_some() {
        eval_input.tested_at = args.tested_at;
    }

    let result = evaluator::evaluate_covenant(&eval_input)?;
    Ok(serde_json::to_value(result)?)
}

pub fn run_test_run(args: TestRunArgs) -> Result<Value, Box<dyn std::error::Error>> {
    let mut run_input: TestRunInput = input::read_input(args.input.as_deref(), "a test run")?;
    if args.tested_at.is_some() {
        run_input.tested_at = args.tested_at;
    }

    let result = orchestrator::run_tests(&run_input)?;
    Ok(serde_json::to_value(result)?)
}

pub fn run_test_batch(args: TestBatchArgs) -> Result<Value, Box<dyn std::error::Error>> {
    let mut runs: Vec<TestRunInput> = input::read_input(args.input.as_deref(), "a test batch")?;
    // One pass, one timestamp, unless a run pins its own
    let tested_at = args.tested_at.unwrap_or_else(Utc::now);
    for run in runs.iter_mut() {
        run.tested_at.get_or_insert(tested_at);
    }

    let result = orchestrator::run_test_batch(&runs)?;
    Ok(serde_json::to_value(result)?)
}
