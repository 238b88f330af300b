use napi::Result as NapiResult;
use napi_derive::napi;

use covenant_monitor_core::covenants::{evaluator, orchestrator};
use covenant_monitor_core::risk::{factors, portfolio, scoring};

/// Convert any Display error into a napi::Error.
fn to_napi_error(e: impl std::fmt::Display) -> napi::Error {
    napi::Error::from_reason(e.to_string())
}

// ---------------------------------------------------------------------------
// Covenant testing
// ---------------------------------------------------------------------------

#[napi]
pub fn evaluate_covenant(input_json: String) -> NapiResult<String> {
    let input: evaluator::CovenantEvaluationInput =
        serde_json::from_str(&input_json).map_err(to_napi_error)?;
    let output = evaluator::evaluate_covenant(&input).map_err(to_napi_error)?;
    serde_json::to_string(&output).map_err(to_napi_error)
}

#[napi]
pub fn run_covenant_tests(input_json: String) -> NapiResult<String> {
    let input: orchestrator::TestRunInput =
        serde_json::from_str(&input_json).map_err(to_napi_error)?;
    let output = orchestrator::run_tests(&input).map_err(to_napi_error)?;
    serde_json::to_string(&output).map_err(to_napi_error)
}

#[napi]
pub fn run_covenant_test_batch(input_json: String) -> NapiResult<String> {
    let input: Vec<orchestrator::TestRunInput> =
        serde_json::from_str(&input_json).map_err(to_napi_error)?;
    let output = orchestrator::run_test_batch(&input).map_err(to_napi_error)?;
    serde_json::to_string(&output).map_err(to_napi_error)
}

// ---------------------------------------------------------------------------
// Risk scoring
// ---------------------------------------------------------------------------

#[napi]
pub fn risk_score(input_json: String) -> NapiResult<String> {
    let input: factors::RiskFactors = serde_json::from_str(&input_json).map_err(to_napi_error)?;
    let output = scoring::score_risk_factors(&input);
    serde_json::to_string(&output).map_err(to_napi_error)
}

#[napi]
pub fn borrower_risk(input_json: String) -> NapiResult<String> {
    let input: scoring::BorrowerRiskInput =
        serde_json::from_str(&input_json).map_err(to_napi_error)?;
    let output = scoring::score_borrower(&input).map_err(to_napi_error)?;
    serde_json::to_string(&output).map_err(to_napi_error)
}

#[napi]
pub fn portfolio_risk(input_json: String) -> NapiResult<String> {
    let input: portfolio::PortfolioRiskInput =
        serde_json::from_str(&input_json).map_err(to_napi_error)?;
    let output = portfolio::score_portfolio(&input).map_err(to_napi_error)?;
    serde_json::to_string(&output).map_err(to_napi_error)
}
