use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::time::Instant;

use super::factors::build_risk_factors;
use super::scoring::{calculate_risk_score, BorrowerRiskInput, RiskLevel, RiskScore};
use crate::{types::*, CovenantMonitorError, CovenantMonitorResult};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PortfolioRiskInput {
    pub borrowers: Vec<BorrowerRiskInput>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BorrowerRanking {
    pub rank: u32,
    pub borrower_id: String,
    pub score: u32,
    pub level: RiskLevel,
    pub breach_count: u32,
    pub warning_count: u32,
    pub risk: RiskScore,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PortfolioRiskOutput {
    /// Riskiest first; ties keep input order.
    pub rankings: Vec<BorrowerRanking>,
    pub average_score: Decimal,
    pub high_count: u32,
    pub medium_count: u32,
    pub low_count: u32,
}

/// Score every borrower in a portfolio and rank them by descending risk.
pub fn score_portfolio(
    input: &PortfolioRiskInput,
) -> CovenantMonitorResult<ComputationOutput<PortfolioRiskOutput>> {
    let start = Instant::now();
    let mut warnings: Vec<String> = Vec::new();

    if input.borrowers.is_empty() {
        return Err(CovenantMonitorError::InsufficientData(
            "At least one borrower must be provided.".into(),
        ));
    }

    let mut rankings: Vec<BorrowerRanking> = Vec::with_capacity(input.borrowers.len());
    for borrower in &input.borrowers {
        if borrower.history.is_empty() {
            warnings.push(format!(
                "Borrower '{}' has no covenant test history.",
                borrower.borrower_id
            ));
        }
        let factors = build_risk_factors(&borrower.history, borrower.credit_rating.as_deref());
        let risk = calculate_risk_score(&factors);
        rankings.push(BorrowerRanking {
            rank: 0,
            borrower_id: borrower.borrower_id.clone(),
            score: risk.score,
            level: risk.level,
            breach_count: factors.breach_count,
            warning_count: factors.warning_count,
            risk,
        });
    }

    rankings.sort_by(|a, b| b.score.cmp(&a.score));
    for (i, r) in rankings.iter_mut().enumerate() {
        r.rank = i as u32 + 1;
    }

    let count = |level: RiskLevel| rankings.iter().filter(|r| r.level == level).count() as u32;
    let high_count = count(RiskLevel::High);
    let medium_count = count(RiskLevel::Medium);
    let low_count = count(RiskLevel::Low);

    let total: u32 = rankings.iter().map(|r| r.score).sum();
    let average_score =
        (Decimal::from(total) / Decimal::from(rankings.len() as u64)).round_dp(2);

    let output = PortfolioRiskOutput {
        rankings,
        average_score,
        high_count,
        medium_count,
        low_count,
    };

    let elapsed = start.elapsed().as_micros() as u64;
    let assumptions = serde_json::json!({
        "borrower_count": input.borrowers.len(),
    });

    Ok(with_metadata(
        "Portfolio Covenant Risk Ranking",
        &assumptions,
        warnings,
        elapsed,
        output,
    ))
}
