use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

use crate::covenants::evaluator::{ComplianceStatus, CovenantTestResult};
use crate::types::Percent;

/// Minimum move in headroom percentage points between the two most recent
/// tests before the trend counts as improving or deteriorating.
pub const TREND_BAND: Percent = dec!(5);

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HeadroomTrend {
    Improving,
    Stable,
    Deteriorating,
    #[default]
    Unknown,
}

impl HeadroomTrend {
    /// Compare the latest headroom percentage with the one before it.
    pub fn from_recent(latest: Percent, previous: Percent) -> Self {
        let change = latest - previous;
        if change > TREND_BAND {
            Self::Improving
        } else if change < -TREND_BAND {
            Self::Deteriorating
        } else {
            Self::Stable
        }
    }
}

/// Aggregated scoring inputs for one borrower.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RiskFactors {
    #[serde(default)]
    pub breach_count: u32,
    #[serde(default)]
    pub warning_count: u32,
    #[serde(default)]
    pub average_headroom: Option<Percent>,
    #[serde(default)]
    pub lowest_headroom: Option<Percent>,
    #[serde(default)]
    pub credit_rating: Option<String>,
    #[serde(default)]
    pub headroom_trend: HeadroomTrend,
}

/// Derive risk factors from a borrower's test history across all loans.
///
/// Counts and headroom statistics use the latest result of each covenant.
/// The trend compares the two most recent results overall, regardless of
/// covenant. Every result of one test run shares its `tested_at`, so after a
/// multi-covenant run the two most recent results are usually two different
/// covenants from that same run, compared in input order.
pub fn build_risk_factors(
    history: &[CovenantTestResult],
    credit_rating: Option<&str>,
) -> RiskFactors {
    let mut ordered: Vec<&CovenantTestResult> = history.iter().collect();
    ordered.sort_by(|a, b| b.tested_at.cmp(&a.tested_at));

    let mut seen: HashSet<&str> = HashSet::new();
    let mut current: Vec<&CovenantTestResult> = Vec::new();
    for &r in &ordered {
        if seen.insert(r.covenant_id.as_str()) {
            current.push(r);
        }
    }

    let breach_count = current
        .iter()
        .filter(|r| r.status == ComplianceStatus::Breach)
        .count() as u32;
    let warning_count = current
        .iter()
        .filter(|r| r.status == ComplianceStatus::Warning)
        .count() as u32;

    let lowest_headroom = current.iter().map(|r| r.headroom_percentage).min();
    let average_headroom = if current.is_empty() {
        None
    } else {
        let total: Decimal = current.iter().map(|r| r.headroom_percentage).sum();
        Some(total / Decimal::from(current.len() as u64))
    };

    let headroom_trend = match ordered.as_slice() {
        [latest, previous, ..] => {
            HeadroomTrend::from_recent(latest.headroom_percentage, previous.headroom_percentage)
        }
        _ => HeadroomTrend::Unknown,
    };

    RiskFactors {
        breach_count,
        warning_count,
        average_headroom,
        lowest_headroom,
        credit_rating: credit_rating.map(str::to_string),
        headroom_trend,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::covenants::evaluator::{CovenantOperator, CovenantType};
    use chrono::{NaiveDate, TimeZone, Utc};

    fn result(covenant_id: &str, day: u32, headroom: Decimal) -> CovenantTestResult {
        CovenantTestResult {
            covenant_id: covenant_id.into(),
            covenant_name: covenant_id.to_uppercase(),
            covenant_type: CovenantType::Leverage,
            operator: CovenantOperator::Max,
            period_end_date: NaiveDate::from_ymd_opt(2024, 3, 31).unwrap(),
            calculated_value: dec!(4),
            threshold_at_test: dec!(5),
            status: ComplianceStatus::from_headroom(headroom),
            headroom_absolute: dec!(1),
            headroom_percentage: headroom,
            tested_at: Utc.with_ymd_and_hms(2024, 4, day, 9, 0, 0).unwrap(),
            denominator_defaulted: false,
        }
    }

    #[test]
    fn test_trend_band() {
        assert_eq!(HeadroomTrend::from_recent(dec!(20), dec!(14)), HeadroomTrend::Improving);
        assert_eq!(HeadroomTrend::from_recent(dec!(20), dec!(15)), HeadroomTrend::Stable);
        assert_eq!(HeadroomTrend::from_recent(dec!(10), dec!(15)), HeadroomTrend::Stable);
        assert_eq!(HeadroomTrend::from_recent(dec!(9.9), dec!(15)), HeadroomTrend::Deteriorating);
    }

    #[test]
    fn test_single_result_trend_unknown() {
        let f = build_risk_factors(&[result("lev", 1, dec!(30))], None);
        assert_eq!(f.headroom_trend, HeadroomTrend::Unknown);
        assert_eq!(f.lowest_headroom, Some(dec!(30)));
    }

    #[test]
    fn test_empty_history() {
        let f = build_risk_factors(&[], Some("BBB"));
        assert_eq!(f.breach_count, 0);
        assert_eq!(f.lowest_headroom, None);
        assert_eq!(f.average_headroom, None);
        assert_eq!(f.headroom_trend, HeadroomTrend::Unknown);
        assert_eq!(f.credit_rating.as_deref(), Some("BBB"));
    }

    #[test]
    fn test_trend_across_covenants_of_one_run() {
        let history = vec![
            result("icr", 2, dec!(40)),
            result("lev", 2, dec!(10)),
            result("lev", 1, dec!(12)),
        ];
        // icr (40) against lev (10) from the same run, not lev against itself
        let f = build_risk_factors(&history, None);
        assert_eq!(f.headroom_trend, HeadroomTrend::Improving);

        let swapped = vec![history[1].clone(), history[0].clone(), history[2].clone()];
        let f = build_risk_factors(&swapped, None);
        assert_eq!(f.headroom_trend, HeadroomTrend::Deteriorating);
    }

    #[test]
    fn test_latest_result_per_covenant_counts() {
        let history = vec![
            result("lev", 1, dec!(-4)),  // superseded
            result("lev", 10, dec!(12)), // warning
            result("icr", 5, dec!(-8)),  // breach
        ];
        let f = build_risk_factors(&history, None);
        assert_eq!(f.breach_count, 1);
        assert_eq!(f.warning_count, 1);
        assert_eq!(f.lowest_headroom, Some(dec!(-8)));
        assert_eq!(f.average_headroom, Some(dec!(2)));
        // latest 12 vs previous -8 => +20
        assert_eq!(f.headroom_trend, HeadroomTrend::Improving);
    }
}
