use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::RoundingStrategy;
use serde::{Deserialize, Serialize};
use std::time::Instant;

use super::evaluator::{
    self, ComplianceStatus, Covenant, CovenantOperator, CovenantTestResult, FinancialSnapshot,
};
use crate::{types::*, CovenantMonitorError, CovenantMonitorResult};

// ---------------------------------------------------------------------------
// Input / Output types
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Loan {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub borrower_id: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TestRunInput {
    pub loan: Loan,
    pub covenants: Vec<Covenant>,
    /// Candidate financial periods; only the latest by `period_end_date` is tested.
    pub financial_periods: Vec<FinancialSnapshot>,
    /// Timestamp shared by every result of the run. Defaults to now.
    #[serde(default)]
    pub tested_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AlertSeverity {
    Critical,
    Warning,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Alert {
    pub loan_id: String,
    pub covenant_id: String,
    pub severity: AlertSeverity,
    pub title: String,
    pub message: String,
    pub acknowledged: bool,
    pub created_at: DateTime<Utc>,
}

/// A covenant that could not be evaluated during a run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CovenantFailure {
    pub covenant_id: String,
    pub covenant_name: String,
    pub reason: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TestRunOutput {
    pub loan_id: String,
    pub period_end_date: NaiveDate,
    pub tested_at: DateTime<Utc>,
    pub results: Vec<CovenantTestResult>,
    pub alerts: Vec<Alert>,
    pub failures: Vec<CovenantFailure>,
    pub compliant_count: u32,
    pub warning_count: u32,
    pub breach_count: u32,
    pub all_compliant: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoanRunOutcome {
    pub loan_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub run: Option<TestRunOutput>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TestBatchOutput {
    pub runs: Vec<LoanRunOutcome>,
    pub loans_tested: u32,
    pub loans_failed: u32,
    pub total_alerts: u32,
}

// ---------------------------------------------------------------------------
// Public API
// ---------------------------------------------------------------------------

/// Test every covenant of a loan against its most recent financial period and
/// raise an alert for each warning or breach.
///
/// A covenant that fails to evaluate is recorded in `failures` and the run
/// carries on with the remaining covenants.
pub fn run_tests(
    input: &TestRunInput,
) -> CovenantMonitorResult<ComputationOutput<TestRunOutput>> {
    let start = Instant::now();

    let (output, warnings) = execute_run(input)?;

    let elapsed = start.elapsed().as_micros() as u64;
    let assumptions = serde_json::json!({
        "covenant_count": input.covenants.len(),
        "periods_supplied": input.financial_periods.len(),
        "period_tested": output.period_end_date,
        "warning_headroom_pct": evaluator::WARNING_HEADROOM_PCT.to_string(),
    });

    Ok(with_metadata(
        "Covenant Test Run",
        &assumptions,
        warnings,
        elapsed,
        output,
    ))
}

/// Run several loans independently. A loan whose run cannot start (no
/// covenants, no financial data) is reported alongside the successful runs.
pub fn run_test_batch(
    inputs: &[TestRunInput],
) -> CovenantMonitorResult<ComputationOutput<TestBatchOutput>> {
    let start = Instant::now();
    let mut warnings: Vec<String> = Vec::new();

    if inputs.is_empty() {
        return Err(CovenantMonitorError::InsufficientData(
            "At least one loan test run must be provided.".into(),
        ));
    }

    let mut runs: Vec<LoanRunOutcome> = Vec::with_capacity(inputs.len());
    for input in inputs {
        match execute_run(input) {
            Ok((output, run_warnings)) => {
                warnings.extend(
                    run_warnings
                        .into_iter()
                        .map(|w| format!("Loan '{}': {}", input.loan.id, w)),
                );
                runs.push(LoanRunOutcome {
                    loan_id: input.loan.id.clone(),
                    run: Some(output),
                    error: None,
                });
            }
            Err(e) => {
                tracing::warn!(loan_id = %input.loan.id, error = %e, "loan test run failed");
                runs.push(LoanRunOutcome {
                    loan_id: input.loan.id.clone(),
                    run: None,
                    error: Some(e.to_string()),
                });
            }
        }
    }

    let loans_failed = runs.iter().filter(|r| r.error.is_some()).count() as u32;
    let total_alerts = runs
        .iter()
        .filter_map(|r| r.run.as_ref())
        .map(|r| r.alerts.len() as u32)
        .sum();

    let output = TestBatchOutput {
        loans_tested: runs.len() as u32 - loans_failed,
        loans_failed,
        total_alerts,
        runs,
    };

    let elapsed = start.elapsed().as_micros() as u64;
    let assumptions = serde_json::json!({
        "loan_count": inputs.len(),
    });

    Ok(with_metadata(
        "Covenant Test Batch",
        &assumptions,
        warnings,
        elapsed,
        output,
    ))
}

/// Build the alert for a non-compliant result. Compliant results yield `None`.
pub fn build_alert(
    loan_id: &str,
    result: &CovenantTestResult,
    created_at: DateTime<Utc>,
) -> Option<Alert> {
    let (severity, label, wording) = match result.status {
        ComplianceStatus::Compliant => return None,
        ComplianceStatus::Breach => (AlertSeverity::Critical, "Breach", "in breach"),
        ComplianceStatus::Warning => (AlertSeverity::Warning, "Warning", "at warning level"),
    };

    let qualifier = match (result.status, result.operator) {
        (ComplianceStatus::Breach, CovenantOperator::Max) => "over the limit",
        (ComplianceStatus::Breach, CovenantOperator::Min) => "under the limit",
        _ => "headroom remaining",
    };

    // Decimal's precision formatting truncates; round half away from zero first.
    let value = result
        .calculated_value
        .round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero);
    let headroom = result
        .headroom_percentage
        .abs()
        .round_dp_with_strategy(1, RoundingStrategy::MidpointAwayFromZero);

    let message = format!(
        "{} is {}: calculated value {:.2} against a covenant of {} {} ({:.1}% {}).",
        result.covenant_name,
        wording,
        value,
        result.operator.symbol(),
        result.threshold_at_test,
        headroom,
        qualifier,
    );

    Some(Alert {
        loan_id: loan_id.to_string(),
        covenant_id: result.covenant_id.clone(),
        severity,
        title: format!("{} {}", result.covenant_name, label),
        message,
        acknowledged: false,
        created_at,
    })
}

// ---------------------------------------------------------------------------
// Internal helpers
// ---------------------------------------------------------------------------

fn execute_run(input: &TestRunInput) -> CovenantMonitorResult<(TestRunOutput, Vec<String>)> {
    let mut warnings: Vec<String> = Vec::new();

    if input.covenants.is_empty() {
        return Err(CovenantMonitorError::InsufficientData(format!(
            "Loan '{}' has no covenants to test.",
            input.loan.id
        )));
    }

    let snapshot = latest_snapshot(&input.financial_periods).ok_or_else(|| {
        CovenantMonitorError::NoFinancialData {
            loan_id: input.loan.id.clone(),
        }
    })?;

    let tested_at = input.tested_at.unwrap_or_else(Utc::now);
    tracing::debug!(
        loan_id = %input.loan.id,
        period_end_date = %snapshot.period_end_date,
        covenants = input.covenants.len(),
        "running covenant tests"
    );

    let mut results: Vec<CovenantTestResult> = Vec::with_capacity(input.covenants.len());
    let mut failures: Vec<CovenantFailure> = Vec::new();

    for cov in &input.covenants {
        match evaluator::evaluate(cov, snapshot, tested_at) {
            Ok(result) => {
                if result.denominator_defaulted {
                    warnings.push(evaluator::zero_denominator_warning(&result));
                }
                results.push(result);
            }
            Err(e) => {
                tracing::warn!(
                    loan_id = %input.loan.id,
                    covenant_id = %cov.id,
                    error = %e,
                    "covenant evaluation failed; continuing with remaining covenants"
                );
                warnings.push(format!("Covenant '{}' skipped: {}", cov.name, e));
                failures.push(CovenantFailure {
                    covenant_id: cov.id.clone(),
                    covenant_name: cov.name.clone(),
                    reason: e.to_string(),
                });
            }
        }
    }

    let alerts: Vec<Alert> = results
        .iter()
        .filter_map(|r| build_alert(&input.loan.id, r, tested_at))
        .collect();

    let count = |status: ComplianceStatus| {
        results.iter().filter(|r| r.status == status).count() as u32
    };
    let compliant_count = count(ComplianceStatus::Compliant);
    let warning_count = count(ComplianceStatus::Warning);
    let breach_count = count(ComplianceStatus::Breach);
    let all_compliant = failures.is_empty() && compliant_count as usize == results.len();

    let output = TestRunOutput {
        loan_id: input.loan.id.clone(),
        period_end_date: snapshot.period_end_date,
        tested_at,
        results,
        alerts,
        failures,
        compliant_count,
        warning_count,
        breach_count,
        all_compliant,
    };

    Ok((output, warnings))
}

fn latest_snapshot(periods: &[FinancialSnapshot]) -> Option<&FinancialSnapshot> {
    periods.iter().max_by_key(|p| p.period_end_date)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
