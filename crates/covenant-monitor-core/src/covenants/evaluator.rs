use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::time::Instant;

use crate::{types::*, CovenantMonitorError, CovenantMonitorResult};

/// Headroom percentage below which a non-breached covenant is flagged as a
/// warning. Contractual constant, not tunable per covenant.
pub const WARNING_HEADROOM_PCT: Percent = dec!(15);

// ---------------------------------------------------------------------------
// Covenant definition
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Covenant {
    pub id: String,
    pub name: String,
    #[serde(rename = "type")]
    pub covenant_type: CovenantType,
    pub operator: CovenantOperator,
    pub threshold: Decimal,
    #[serde(default)]
    pub testing_frequency: TestingFrequency,
}

/// The financial measure a covenant constrains.
///
/// Deserialises from the snake_case strings stored by the host. Any other
/// string is kept as `Unrecognized` so evaluation can reject it by name
/// instead of failing the whole document at parse time.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum CovenantType {
    Leverage,
    InterestCoverage,
    FixedChargeCoverage,
    CurrentRatio,
    MinNetWorth,
    Custom,
    Unrecognized(String),
}

impl CovenantType {
    pub fn as_str(&self) -> &str {
        match self {
            Self::Leverage => "leverage",
            Self::InterestCoverage => "interest_coverage",
            Self::FixedChargeCoverage => "fixed_charge_coverage",
            Self::CurrentRatio => "current_ratio",
            Self::MinNetWorth => "min_net_worth",
            Self::Custom => "custom",
            Self::Unrecognized(s) => s.as_str(),
        }
    }
}

impl From<String> for CovenantType {
    fn from(s: String) -> Self {
        match s.as_str() {
            "leverage" => Self::Leverage,
            "interest_coverage" => Self::InterestCoverage,
            "fixed_charge_coverage" => Self::FixedChargeCoverage,
            "current_ratio" => Self::CurrentRatio,
            "min_net_worth" => Self::MinNetWorth,
            "custom" => Self::Custom,
            _ => Self::Unrecognized(s),
        }
    }
}

impl From<CovenantType> for String {
    fn from(t: CovenantType) -> Self {
        t.as_str().to_string()
    }
}

impl fmt::Display for CovenantType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CovenantOperator {
    /// Value must not exceed threshold.
    Max,
    /// Value must not fall below threshold.
    Min,
}

impl CovenantOperator {
    pub fn symbol(&self) -> &'static str {
        match self {
            Self::Max => "≤",
            Self::Min => "≥",
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TestingFrequency {
    Monthly,
    #[default]
    Quarterly,
    SemiAnnually,
    Annually,
}

// ---------------------------------------------------------------------------
// Financial snapshot
// ---------------------------------------------------------------------------

/// One financial period's figures. Missing numeric fields read as zero.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FinancialSnapshot {
    pub period_end_date: NaiveDate,
    #[serde(default)]
    pub ebitda: Option<Money>,
    #[serde(default)]
    pub adjusted_ebitda: Option<Money>,
    #[serde(default)]
    pub total_debt: Money,
    #[serde(default)]
    pub interest_expense: Money,
    #[serde(default)]
    pub fixed_charges: Option<Money>,
    #[serde(default)]
    pub current_assets: Money,
    #[serde(default)]
    pub current_liabilities: Money,
    #[serde(default)]
    pub net_worth: Money,
    /// Pre-computed values for `custom` covenants, keyed by covenant id.
    #[serde(default)]
    pub custom_metrics: BTreeMap<String, Decimal>,
}

impl FinancialSnapshot {
    /// Adjusted EBITDA when present and non-zero, otherwise reported EBITDA.
    pub fn effective_ebitda(&self) -> Money {
        self.adjusted_ebitda
            .filter(|v| !v.is_zero())
            .or(self.ebitda)
            .unwrap_or(Decimal::ZERO)
    }

    /// Fixed charges, falling back to interest expense when absent or zero.
    pub fn effective_fixed_charges(&self) -> Money {
        self.fixed_charges
            .filter(|v| !v.is_zero())
            .unwrap_or(self.interest_expense)
    }

    /// Current liabilities with a floor of 1 in place of zero.
    pub fn effective_current_liabilities(&self) -> Money {
        if self.current_liabilities.is_zero() {
            Decimal::ONE
        } else {
            self.current_liabilities
        }
    }
}

// ---------------------------------------------------------------------------
// Test result
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ComplianceStatus {
    Compliant,
    Warning,
    Breach,
}

impl ComplianceStatus {
    pub fn from_headroom(headroom_pct: Percent) -> Self {
        if headroom_pct < Decimal::ZERO {
            Self::Breach
        } else if headroom_pct < WARNING_HEADROOM_PCT {
            Self::Warning
        } else {
            Self::Compliant
        }
    }
}

impl fmt::Display for ComplianceStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Compliant => "compliant",
            Self::Warning => "warning",
            Self::Breach => "breach",
        };
        write!(f, "{}", s)
    }
}

/// Outcome of testing one covenant against one financial period. Immutable
/// history: the threshold is captured as it stood at test time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CovenantTestResult {
    pub covenant_id: String,
    pub covenant_name: String,
    pub covenant_type: CovenantType,
    pub operator: CovenantOperator,
    pub period_end_date: NaiveDate,
    pub calculated_value: Decimal,
    pub threshold_at_test: Decimal,
    pub status: ComplianceStatus,
    pub headroom_absolute: Decimal,
    pub headroom_percentage: Percent,
    pub tested_at: DateTime<Utc>,
    /// Set when a zero denominator forced the calculated value to zero.
    #[serde(default)]
    pub denominator_defaulted: bool,
}

// ---------------------------------------------------------------------------
// Public API
// ---------------------------------------------------------------------------

/// Evaluate one covenant against one financial snapshot.
///
/// A zero denominator yields a calculated value of zero, flagged on the
/// result via `denominator_defaulted`.
/// Unrecognized covenant types (checked first), custom covenants without a
/// supplied value, zero thresholds and arithmetic that overflows `Decimal` are
/// rejected with [`CovenantMonitorError::Configuration`].
pub fn evaluate(
    covenant: &Covenant,
    snapshot: &FinancialSnapshot,
    tested_at: DateTime<Utc>,
) -> CovenantMonitorResult<CovenantTestResult> {
    let (calculated_value, denominator_defaulted) = calculate_value(covenant, snapshot)?;

    if covenant.threshold.is_zero() {
        return Err(CovenantMonitorError::Configuration {
            covenant: covenant_label(covenant),
            reason: "threshold is zero; headroom percentage is undefined".into(),
        });
    }

    let headroom_absolute = match covenant.operator {
        CovenantOperator::Max => covenant.threshold.checked_sub(calculated_value),
        CovenantOperator::Min => calculated_value.checked_sub(covenant.threshold),
    }
    .ok_or_else(|| overflow(covenant, "headroom"))?;
    let headroom_percentage = headroom_absolute
        .checked_div(covenant.threshold)
        .and_then(|h| h.checked_mul(dec!(100)))
        .ok_or_else(|| overflow(covenant, "headroom percentage"))?;

    Ok(CovenantTestResult {
        covenant_id: covenant.id.clone(),
        covenant_name: covenant.name.clone(),
        covenant_type: covenant.covenant_type.clone(),
        operator: covenant.operator,
        period_end_date: snapshot.period_end_date,
        calculated_value,
        threshold_at_test: covenant.threshold,
        status: ComplianceStatus::from_headroom(headroom_percentage),
        headroom_absolute,
        headroom_percentage,
        tested_at,
        denominator_defaulted,
    })
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CovenantEvaluationInput {
    pub covenant: Covenant,
    pub snapshot: FinancialSnapshot,
    #[serde(default)]
    pub tested_at: Option<DateTime<Utc>>,
}

/// Evaluate a single covenant and wrap the result in the standard envelope.
pub fn evaluate_covenant(
    input: &CovenantEvaluationInput,
) -> CovenantMonitorResult<ComputationOutput<CovenantTestResult>> {
    let start = Instant::now();
    let mut warnings: Vec<String> = Vec::new();

    let tested_at = input.tested_at.unwrap_or_else(Utc::now);
    let result = evaluate(&input.covenant, &input.snapshot, tested_at)?;

    if result.denominator_defaulted {
        warnings.push(zero_denominator_warning(&result));
    }

    let ebitda_basis = if input.snapshot.adjusted_ebitda.is_some_and(|v| !v.is_zero()) {
        "adjusted"
    } else {
        "reported"
    };

    let elapsed = start.elapsed().as_micros() as u64;
    let assumptions = serde_json::json!({
        "warning_headroom_pct": WARNING_HEADROOM_PCT.to_string(),
        "ebitda_basis": ebitda_basis,
    });

    Ok(with_metadata(
        "Covenant Test Evaluation",
        &assumptions,
        warnings,
        elapsed,
        result,
    ))
}

// ---------------------------------------------------------------------------
// Internal helpers
// ---------------------------------------------------------------------------

pub(crate) fn covenant_label(covenant: &Covenant) -> String {
    format!("{} ({})", covenant.name, covenant.id)
}

pub(crate) fn zero_denominator_warning(result: &CovenantTestResult) -> String {
    format!(
        "Covenant '{}': {} denominator is zero for period {}; calculated value defaulted to 0.",
        result.covenant_name, result.covenant_type, result.period_end_date
    )
}

/// Returns the calculated value and whether a zero denominator was replaced.
fn calculate_value(
    covenant: &Covenant,
    snapshot: &FinancialSnapshot,
) -> CovenantMonitorResult<(Decimal, bool)> {
    let ebitda = snapshot.effective_ebitda();
    let value = match &covenant.covenant_type {
        CovenantType::Leverage => ratio(covenant, snapshot.total_debt, ebitda)?,
        CovenantType::InterestCoverage => ratio(covenant, ebitda, snapshot.interest_expense)?,
        CovenantType::FixedChargeCoverage => {
            ratio(covenant, ebitda, snapshot.effective_fixed_charges())?
        }
        CovenantType::CurrentRatio => ratio(
            covenant,
            snapshot.current_assets,
            snapshot.effective_current_liabilities(),
        )?,
        CovenantType::MinNetWorth => (snapshot.net_worth, false),
        CovenantType::Custom => match snapshot.custom_metrics.get(&covenant.id) {
            Some(v) => (*v, false),
            None => {
                return Err(CovenantMonitorError::Configuration {
                    covenant: covenant_label(covenant),
                    reason: "custom covenant has no supplied value for this period".into(),
                })
            }
        },
        CovenantType::Unrecognized(t) => {
            return Err(CovenantMonitorError::Configuration {
                covenant: covenant_label(covenant),
                reason: format!("unrecognized covenant type '{t}'"),
            })
        }
    };
    Ok(value)
}

/// Conservative-zero division: a zero denominator reads as 0. A quotient
/// that overflows `Decimal` is a configuration error, never a zero.
fn ratio(
    covenant: &Covenant,
    numerator: Decimal,
    denominator: Decimal,
) -> CovenantMonitorResult<(Decimal, bool)> {
    if denominator.is_zero() {
        return Ok((Decimal::ZERO, true));
    }
    numerator
        .checked_div(denominator)
        .map(|v| (v, false))
        .ok_or_else(|| overflow(covenant, "ratio"))
}

fn overflow(covenant: &Covenant, what: &str) -> CovenantMonitorError {
    CovenantMonitorError::Configuration {
        covenant: covenant_label(covenant),
        reason: format!("{what} overflows decimal range for threshold {}", covenant.threshold),
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn run_time() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 4, 15, 9, 0, 0).unwrap()
    }

    fn covenant(covenant_type: &str, operator: CovenantOperator, threshold: Decimal) -> Covenant {
        Covenant {
            id: "cov-1".into(),
            name: "Test Covenant".into(),
            covenant_type: CovenantType::from(covenant_type.to_string()),
            operator,
            threshold,
            testing_frequency: TestingFrequency::Quarterly,
        }
    }

    fn snapshot() -> FinancialSnapshot {
        FinancialSnapshot {
            period_end_date: NaiveDate::from_ymd_opt(2024, 3, 31).unwrap(),
            ebitda: Some(dec!(50)),
            adjusted_ebitda: None,
            total_debt: dec!(250),
            interest_expense: dec!(40),
            fixed_charges: None,
            current_assets: dec!(300),
            current_liabilities: dec!(200),
            net_worth: dec!(1_000),
            custom_metrics: BTreeMap::new(),
        }
    }

    #[test]
    fn test_leverage_at_threshold_is_warning() {
        let cov = covenant("leverage", CovenantOperator::Max, dec!(5.0));
        let r = evaluate(&cov, &snapshot(), run_time()).unwrap();
        assert_eq!(r.calculated_value, dec!(5));
        assert_eq!(r.headroom_percentage, Decimal::ZERO);
        assert_eq!(r.status, ComplianceStatus::Warning);
    }

    #[test]
    fn test_leverage_over_threshold_is_breach() {
        let cov = covenant("leverage", CovenantOperator::Max, dec!(5.0));
        let mut snap = snapshot();
        snap.total_debt = dec!(260);
        let r = evaluate(&cov, &snap, run_time()).unwrap();
        assert_eq!(r.calculated_value, dec!(5.2));
        assert_eq!(r.headroom_percentage, dec!(-4));
        assert_eq!(r.headroom_absolute, dec!(-0.2));
        assert_eq!(r.status, ComplianceStatus::Breach);
    }

    #[test]
    fn test_interest_coverage_compliant() {
        let cov = covenant("interest_coverage", CovenantOperator::Min, dec!(2.0));
        let mut snap = snapshot();
        snap.ebitda = Some(dec!(100));
        let r = evaluate(&cov, &snap, run_time()).unwrap();
        assert_eq!(r.calculated_value, dec!(2.5));
        assert_eq!(r.headroom_percentage, dec!(25));
        assert_eq!(r.headroom_absolute, dec!(0.5));
        assert_eq!(r.status, ComplianceStatus::Compliant);
    }

    #[test]
    fn test_adjusted_ebitda_preferred() {
        let cov = covenant("leverage", CovenantOperator::Max, dec!(5.0));
        let mut snap = snapshot();
        snap.adjusted_ebitda = Some(dec!(100));
        let r = evaluate(&cov, &snap, run_time()).unwrap();
        // 250 / 100
        assert_eq!(r.calculated_value, dec!(2.5));
    }

    #[test]
    fn test_fixed_charges_fall_back_to_interest() {
        let cov = covenant("fixed_charge_coverage", CovenantOperator::Min, dec!(1.0));
        let r = evaluate(&cov, &snapshot(), run_time()).unwrap();
        // 50 / 40
        assert_eq!(r.calculated_value, dec!(1.25));

        let mut snap = snapshot();
        snap.fixed_charges = Some(dec!(25));
        let r = evaluate(&cov, &snap, run_time()).unwrap();
        assert_eq!(r.calculated_value, dec!(2));
    }

    #[test]
    fn test_current_ratio_floors_zero_liabilities() {
        let cov = covenant("current_ratio", CovenantOperator::Min, dec!(1.2));
        let mut snap = snapshot();
        snap.current_liabilities = Decimal::ZERO;
        let r = evaluate(&cov, &snap, run_time()).unwrap();
        assert_eq!(r.calculated_value, dec!(300));
        assert!(!r.denominator_defaulted);
    }

    #[test]
    fn test_min_net_worth_uses_raw_figure() {
        let cov = covenant("min_net_worth", CovenantOperator::Min, dec!(800));
        let r = evaluate(&cov, &snapshot(), run_time()).unwrap();
        assert_eq!(r.calculated_value, dec!(1_000));
        assert_eq!(r.headroom_absolute, dec!(200));
        assert_eq!(r.headroom_percentage, dec!(25));
    }

    #[test]
    fn test_custom_value_supplied_by_caller() {
        let cov = covenant("custom", CovenantOperator::Max, dec!(0.60));
        let mut snap = snapshot();
        snap.custom_metrics.insert("cov-1".into(), dec!(0.55));
        let r = evaluate(&cov, &snap, run_time()).unwrap();
        assert_eq!(r.calculated_value, dec!(0.55));
        assert_eq!(r.status, ComplianceStatus::Warning);
    }

    #[test]
    fn test_custom_without_value_rejected() {
        let cov = covenant("custom", CovenantOperator::Max, dec!(0.60));
        let err = evaluate(&cov, &snapshot(), run_time()).unwrap_err();
        assert!(matches!(err, CovenantMonitorError::Configuration { .. }));
    }

    #[test]
    fn test_zero_ebitda_leverage_defaults_to_zero() {
        let cov = covenant("leverage", CovenantOperator::Max, dec!(5.0));
        let mut snap = snapshot();
        snap.ebitda = Some(Decimal::ZERO);
        let r = evaluate(&cov, &snap, run_time()).unwrap();
        assert_eq!(r.calculated_value, Decimal::ZERO);
        assert!(r.denominator_defaulted);
    }

    #[test]
    fn test_unrecognized_type_names_offender() {
        let cov = covenant("debt_yield", CovenantOperator::Min, dec!(0.1));
        let err = evaluate(&cov, &snapshot(), run_time()).unwrap_err();
        match err {
            CovenantMonitorError::Configuration { reason, .. } => {
                assert!(reason.contains("debt_yield"))
            }
            other => panic!("Expected Configuration, got {other:?}"),
        }
    }

    #[test]
    fn test_zero_threshold_rejected() {
        let cov = covenant("leverage", CovenantOperator::Max, Decimal::ZERO);
        let err = evaluate(&cov, &snapshot(), run_time()).unwrap_err();
        assert!(matches!(err, CovenantMonitorError::Configuration { .. }));
    }

    #[test]
    fn test_unrecognized_type_named_before_zero_threshold() {
        let cov = covenant("debt_yield", CovenantOperator::Min, Decimal::ZERO);
        match evaluate(&cov, &snapshot(), run_time()).unwrap_err() {
            CovenantMonitorError::Configuration { reason, .. } => {
                assert!(reason.contains("debt_yield"))
            }
            other => panic!("Expected Configuration, got {other:?}"),
        }
    }

    #[test]
    fn test_headroom_overflow_is_configuration_error() {
        // 1e10 above a 1e-19 floor is a headroom of ~1e31 %, past Decimal::MAX
        let cov = covenant("min_net_worth", CovenantOperator::Min, dec!(0.0000000000000000001));
        let mut snap = snapshot();
        snap.net_worth = dec!(10_000_000_000);
        match evaluate(&cov, &snap, run_time()).unwrap_err() {
            CovenantMonitorError::Configuration { reason, .. } => {
                assert!(reason.contains("overflows"))
            }
            other => panic!("Expected Configuration, got {other:?}"),
        }
    }

    #[test]
    fn test_overflowing_ratio_is_not_conservative_zero() {
        let cov = covenant("leverage", CovenantOperator::Max, dec!(5.0));
        let mut snap = snapshot();
        snap.total_debt = Decimal::MAX;
        snap.ebitda = Some(dec!(0.5));
        let err = evaluate(&cov, &snap, run_time()).unwrap_err();
        assert!(matches!(err, CovenantMonitorError::Configuration { .. }));
    }

    #[test]
    fn test_status_cutoffs() {
        assert_eq!(ComplianceStatus::from_headroom(dec!(-0.01)), ComplianceStatus::Breach);
        assert_eq!(ComplianceStatus::from_headroom(dec!(0)), ComplianceStatus::Warning);
        assert_eq!(ComplianceStatus::from_headroom(dec!(14.99)), ComplianceStatus::Warning);
        assert_eq!(ComplianceStatus::from_headroom(dec!(15)), ComplianceStatus::Compliant);
    }

    #[test]
    fn test_covenant_type_parsing() {
        let cov: Covenant = serde_json::from_str(
            r#"{"id":"c","name":"n","type":"fixed_charge_coverage","operator":"min","threshold":"1.1"}"#,
        )
        .unwrap();
        assert_eq!(cov.covenant_type, CovenantType::FixedChargeCoverage);
        assert_eq!(cov.testing_frequency, TestingFrequency::Quarterly);

        let cov: Covenant = serde_json::from_str(
            r#"{"id":"c","name":"n","type":"capex_limit","operator":"max","threshold":"10"}"#,
        )
        .unwrap();
        assert_eq!(cov.covenant_type, CovenantType::Unrecognized("capex_limit".into()));
    }

    #[test]
    fn test_envelope_warns_on_zero_denominator() {
        let mut snap = snapshot();
        snap.interest_expense = Decimal::ZERO;
        let input = CovenantEvaluationInput {
            covenant: covenant("interest_coverage", CovenantOperator::Min, dec!(2.0)),
            snapshot: snap,
            tested_at: Some(run_time()),
        };
        let out = evaluate_covenant(&input).unwrap();
        assert_eq!(out.result.calculated_value, Decimal::ZERO);
        assert_eq!(out.result.status, ComplianceStatus::Breach);
        assert!(out.warnings.iter().any(|w| w.contains("denominator")));
        assert_eq!(out.metadata.precision, "rust_decimal_128bit");
    }
}
