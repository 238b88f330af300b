//! Borrower risk scoring.
//!
//! Five weighted factors (breaches, warnings, lowest headroom, credit rating
//! and headroom trend) each produce an impact on a 0-100 scale. The score is
//! the weighted average of the impacts, rounded half away from zero. Scoring
//! is total: absent inputs degrade to fixed default impacts, never to errors.

use rust_decimal::prelude::ToPrimitive;
use rust_decimal::{Decimal, RoundingStrategy};
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};
use std::time::Instant;

use super::factors::{build_risk_factors, HeadroomTrend, RiskFactors};
use super::rating::{rating_impact, CreditRating};
use crate::covenants::evaluator::{CovenantTestResult, WARNING_HEADROOM_PCT};
use crate::{types::*, CovenantMonitorResult};

pub const BREACH_WEIGHT: Decimal = dec!(30);
pub const WARNING_WEIGHT: Decimal = dec!(20);
pub const HEADROOM_WEIGHT: Decimal = dec!(20);
pub const RATING_WEIGHT: Decimal = dec!(15);
pub const TREND_WEIGHT: Decimal = dec!(15);

/// Headroom below which a refreshed stress test is recommended.
pub const LOW_HEADROOM_PCT: Percent = dec!(10);

const MAX_RECOMMENDATIONS: usize = 5;

// ---------------------------------------------------------------------------
// Output types
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RiskLevel {
    Low,
    Medium,
    High,
}

impl RiskLevel {
    pub fn from_score(score: u32) -> Self {
        if score > 60 {
            Self::High
        } else if score > 30 {
            Self::Medium
        } else {
            Self::Low
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RiskFactorImpact {
    pub name: String,
    pub impact: Decimal,
    pub weight: Decimal,
    pub description: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RiskScore {
    pub score: u32,
    pub level: RiskLevel,
    pub factors: Vec<RiskFactorImpact>,
    pub recommendations: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BorrowerRiskInput {
    pub borrower_id: String,
    #[serde(default)]
    pub credit_rating: Option<String>,
    /// Covenant test results across all of the borrower's loans.
    #[serde(default)]
    pub history: Vec<CovenantTestResult>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BorrowerRiskOutput {
    pub borrower_id: String,
    pub factors: RiskFactors,
    pub risk: RiskScore,
}

// ---------------------------------------------------------------------------
// Public API
// ---------------------------------------------------------------------------

/// Score a borrower from pre-aggregated risk factors.
pub fn calculate_risk_score(factors: &RiskFactors) -> RiskScore {
    let breach = breach_impact(factors.breach_count);
    let warning = warning_impact(factors.warning_count);
    let headroom = headroom_impact(factors.lowest_headroom);
    let rating = rating_impact(factors.credit_rating.as_deref());
    let trend = trend_impact(factors.headroom_trend);

    let weighted = breach * BREACH_WEIGHT
        + warning * WARNING_WEIGHT
        + headroom * HEADROOM_WEIGHT
        + rating * RATING_WEIGHT
        + trend * TREND_WEIGHT;
    let score = (weighted / dec!(100))
        .round_dp_with_strategy(0, RoundingStrategy::MidpointAwayFromZero)
        .to_u32()
        .unwrap_or(0)
        .min(100);
    let level = RiskLevel::from_score(score);

    // The display list is a transparency aid; every contribution above is
    // scored whether or not it is listed here.
    let mut listed: Vec<RiskFactorImpact> = Vec::new();
    if factors.breach_count > 0 {
        listed.push(RiskFactorImpact {
            name: "Covenant breaches".into(),
            impact: breach,
            weight: BREACH_WEIGHT,
            description: format!("{} covenant(s) currently in breach", factors.breach_count),
        });
    }
    if factors.warning_count > 0 {
        listed.push(RiskFactorImpact {
            name: "Covenant warnings".into(),
            impact: warning,
            weight: WARNING_WEIGHT,
            description: format!(
                "{} covenant(s) within {}% of threshold",
                factors.warning_count, WARNING_HEADROOM_PCT
            ),
        });
    }
    if let Some(lowest) = factors.lowest_headroom {
        listed.push(RiskFactorImpact {
            name: "Headroom".into(),
            impact: headroom,
            weight: HEADROOM_WEIGHT,
            description: format!("Lowest covenant headroom is {:.1}%", lowest),
        });
    }
    if let Some(code) = factors.credit_rating.as_deref() {
        let description = match code.parse::<CreditRating>() {
            Ok(r) if r.is_investment_grade() => format!("Rated {r} (investment grade)"),
            Ok(r) => format!("Rated {r} (sub-investment grade)"),
            Err(_) => format!("Rating '{code}' not recognized; treated as moderate risk"),
        };
        listed.push(RiskFactorImpact {
            name: "Credit rating".into(),
            impact: rating,
            weight: RATING_WEIGHT,
            description,
        });
    }
    if factors.headroom_trend != HeadroomTrend::Unknown {
        let direction = match factors.headroom_trend {
            HeadroomTrend::Improving => "improving",
            HeadroomTrend::Deteriorating => "deteriorating",
            _ => "stable",
        };
        listed.push(RiskFactorImpact {
            name: "Headroom trend".into(),
            impact: trend,
            weight: TREND_WEIGHT,
            description: format!("Headroom {direction} across the two most recent tests"),
        });
    }
    listed.sort_by(|a, b| b.impact.cmp(&a.impact));

    RiskScore {
        score,
        level,
        factors: listed,
        recommendations: recommendations(factors, level),
    }
}

/// Score pre-aggregated factors and wrap the result in the standard envelope.
pub fn score_risk_factors(factors: &RiskFactors) -> ComputationOutput<RiskScore> {
    let start = Instant::now();
    let mut warnings: Vec<String> = Vec::new();

    if let Some(code) = factors.credit_rating.as_deref() {
        if code.parse::<CreditRating>().is_err() {
            warnings.push(format!(
                "Credit rating '{code}' not recognized; midpoint impact applied."
            ));
        }
    }

    let risk = calculate_risk_score(factors);
    tracing::debug!(score = risk.score, level = ?risk.level, "risk score calculated");

    let elapsed = start.elapsed().as_micros() as u64;
    with_metadata(
        "Weighted Covenant Risk Score",
        &weights_assumptions(),
        warnings,
        elapsed,
        risk,
    )
}

/// Derive a borrower's risk factors from test history and score them.
pub fn score_borrower(
    input: &BorrowerRiskInput,
) -> CovenantMonitorResult<ComputationOutput<BorrowerRiskOutput>> {
    let start = Instant::now();
    let mut warnings: Vec<String> = Vec::new();

    if input.history.is_empty() {
        warnings.push(format!(
            "Borrower '{}' has no covenant test history; only rating and trend defaults apply.",
            input.borrower_id
        ));
    }

    let factors = build_risk_factors(&input.history, input.credit_rating.as_deref());
    let risk = calculate_risk_score(&factors);
    tracing::debug!(
        borrower_id = %input.borrower_id,
        score = risk.score,
        level = ?risk.level,
        "borrower risk scored"
    );

    let output = BorrowerRiskOutput {
        borrower_id: input.borrower_id.clone(),
        factors,
        risk,
    };

    let elapsed = start.elapsed().as_micros() as u64;
    Ok(with_metadata(
        "Weighted Covenant Risk Score",
        &weights_assumptions(),
        warnings,
        elapsed,
        output,
    ))
}

// ---------------------------------------------------------------------------
// Factor impacts
// ---------------------------------------------------------------------------

fn breach_impact(count: u32) -> Decimal {
    (Decimal::from(count) * dec!(20)).min(dec!(100))
}

fn warning_impact(count: u32) -> Decimal {
    (Decimal::from(count) * dec!(15)).min(dec!(80))
}

fn headroom_impact(lowest: Option<Percent>) -> Decimal {
    match lowest {
        None => Decimal::ZERO,
        Some(h) if h < Decimal::ZERO => dec!(100),
        Some(h) if h < dec!(5) => dec!(80),
        Some(h) if h < dec!(10) => dec!(60),
        Some(h) if h < dec!(15) => dec!(40),
        Some(h) if h < dec!(25) => dec!(20),
        Some(_) => Decimal::ZERO,
    }
}

fn trend_impact(trend: HeadroomTrend) -> Decimal {
    match trend {
        HeadroomTrend::Improving => dec!(0),
        HeadroomTrend::Stable => dec!(20),
        HeadroomTrend::Deteriorating => dec!(80),
        HeadroomTrend::Unknown => dec!(30),
    }
}

/// Independent conditions, kept in this order.
fn recommendations(factors: &RiskFactors, level: RiskLevel) -> Vec<String> {
    let mut recs: Vec<String> = Vec::new();

    if factors.breach_count > 0 {
        recs.push(format!(
            "Open remediation discussions on {} breached covenant(s) and assess waiver or amendment options.",
            factors.breach_count
        ));
    }
    if factors.warning_count > 0 {
        recs.push(format!(
            "Increase monitoring frequency for {} covenant(s) at warning level.",
            factors.warning_count
        ));
    }
    if factors
        .lowest_headroom
        .is_some_and(|h| h < LOW_HEADROOM_PCT)
    {
        recs.push(
            "Request updated projections and stress-test covenants with headroom below 10%."
                .into(),
        );
    }
    if factors.headroom_trend == HeadroomTrend::Deteriorating {
        recs.push(
            "Headroom is deteriorating between tests; review recent performance drivers with the borrower."
                .into(),
        );
    }
    if level == RiskLevel::High {
        recs.push("Escalate to credit committee for a full relationship review.".into());
    }

    recs.truncate(MAX_RECOMMENDATIONS);
    recs
}

fn weights_assumptions() -> serde_json::Value {
    serde_json::json!({
        "weights": {
            "breach": BREACH_WEIGHT.to_string(),
            "warning": WARNING_WEIGHT.to_string(),
            "headroom": HEADROOM_WEIGHT.to_string(),
            "rating": RATING_WEIGHT.to_string(),
            "trend": TREND_WEIGHT.to_string(),
        },
        "rounding": "half_away_from_zero",
    })
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    fn distressed() -> RiskFactors {
        RiskFactors {
            breach_count: 1,
            warning_count: 0,
            average_headroom: Some(dec!(-4)),
            lowest_headroom: Some(dec!(-4)),
            credit_rating: Some("BB".into()),
            headroom_trend: HeadroomTrend::Deteriorating,
        }
    }

    #[test]
    fn test_weights_sum_to_hundred() {
        assert_eq!(
            BREACH_WEIGHT + WARNING_WEIGHT + HEADROOM_WEIGHT + RATING_WEIGHT + TREND_WEIGHT,
            dec!(100)
        );
    }

    #[test]
    fn test_distressed_borrower_scenario() {
        // 600 + 0 + 2000 + 780 + 1200 = 4580 => 45.8 => 46
        let risk = calculate_risk_score(&distressed());
        assert_eq!(risk.score, 46);
        assert_eq!(risk.level, RiskLevel::Medium);
    }

    #[test]
    fn test_factors_sorted_by_impact() {
        let risk = calculate_risk_score(&distressed());
        let names: Vec<&str> = risk.factors.iter().map(|f| f.name.as_str()).collect();
        assert_eq!(
            names,
            vec!["Headroom", "Headroom trend", "Credit rating", "Covenant breaches"]
        );
    }

    #[test]
    fn test_unknown_trend_scored_but_not_listed() {
        let factors = RiskFactors::default();
        let risk = calculate_risk_score(&factors);
        // rating 50 * 15 + trend 30 * 15 = 1200 => 12
        assert_eq!(risk.score, 12);
        assert_eq!(risk.level, RiskLevel::Low);
        assert!(risk.factors.is_empty());
        assert!(risk.recommendations.is_empty());
    }

    #[test]
    fn test_caps_on_counts() {
        assert_eq!(breach_impact(7), dec!(100));
        assert_eq!(warning_impact(4), dec!(60));
        assert_eq!(warning_impact(6), dec!(80));
    }

    #[test]
    fn test_headroom_bands() {
        assert_eq!(headroom_impact(Some(dec!(-0.1))), dec!(100));
        assert_eq!(headroom_impact(Some(dec!(0))), dec!(80));
        assert_eq!(headroom_impact(Some(dec!(5))), dec!(60));
        assert_eq!(headroom_impact(Some(dec!(10))), dec!(40));
        assert_eq!(headroom_impact(Some(dec!(15))), dec!(20));
        assert_eq!(headroom_impact(Some(dec!(25))), dec!(0));
        assert_eq!(headroom_impact(None), dec!(0));
    }

    #[test]
    fn test_worst_case_is_high_and_bounded() {
        let factors = RiskFactors {
            breach_count: 10,
            warning_count: 10,
            average_headroom: Some(dec!(-50)),
            lowest_headroom: Some(dec!(-50)),
            credit_rating: Some("D".into()),
            headroom_trend: HeadroomTrend::Deteriorating,
        };
        let risk = calculate_risk_score(&factors);
        // 3000 + 1600 + 2000 + 1500 + 1200 = 9300 => 93
        assert_eq!(risk.score, 93);
        assert_eq!(risk.level, RiskLevel::High);
        assert_eq!(risk.recommendations.len(), 5);
        assert!(risk.recommendations[0].contains("breached"));
        assert!(risk.recommendations[4].contains("credit committee"));
    }

    #[test]
    fn test_recommendation_order() {
        let risk = calculate_risk_score(&distressed());
        assert_eq!(risk.recommendations.len(), 3);
        assert!(risk.recommendations[0].contains("breached"));
        assert!(risk.recommendations[1].contains("below 10%"));
        assert!(risk.recommendations[2].contains("deteriorating"));
    }

    #[test]
    fn test_level_boundaries() {
        assert_eq!(RiskLevel::from_score(30), RiskLevel::Low);
        assert_eq!(RiskLevel::from_score(31), RiskLevel::Medium);
        assert_eq!(RiskLevel::from_score(60), RiskLevel::Medium);
        assert_eq!(RiskLevel::from_score(61), RiskLevel::High);
    }

    #[test]
    fn test_unrecognized_rating_warns() {
        let factors = RiskFactors {
            credit_rating: Some("NR".into()),
            ..RiskFactors::default()
        };
        let out = score_risk_factors(&factors);
        assert!(out.warnings.iter().any(|w| w.contains("NR")));
        assert_eq!(out.result.factors[0].impact, dec!(50));
    }
}
