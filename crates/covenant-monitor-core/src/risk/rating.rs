use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};
use std::str::FromStr;

/// Risk impact applied when a borrower has no rating or an unparseable one.
/// Unknown is treated as moderately risky, not safe.
pub const UNRATED_RISK_IMPACT: Decimal = dec!(50);

/// Agency-style long-term credit rating.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CreditRating {
    AAA,
    #[serde(rename = "AA+")]
    AAp,
    AA,
    #[serde(rename = "AA-")]
    AAm,
    #[serde(rename = "A+")]
    Ap,
    A,
    #[serde(rename = "A-")]
    Am,
    #[serde(rename = "BBB+")]
    BBBp,
    BBB,
    #[serde(rename = "BBB-")]
    BBBm,
    #[serde(rename = "BB+")]
    BBp,
    BB,
    #[serde(rename = "BB-")]
    BBm,
    #[serde(rename = "B+")]
    Bp,
    B,
    #[serde(rename = "B-")]
    Bm,
    #[serde(rename = "CCC+")]
    CCCp,
    CCC,
    #[serde(rename = "CCC-")]
    CCCm,
    CC,
    C,
    D,
}

impl CreditRating {
    /// Fixed risk impact on the 0 (AAA) to 100 (D) scale.
    pub fn risk_impact(&self) -> Decimal {
        match self {
            Self::AAA => dec!(0),
            Self::AAp => dec!(4),
            Self::AA => dec!(8),
            Self::AAm => dec!(12),
            Self::Ap => dec!(16),
            Self::A => dec!(20),
            Self::Am => dec!(24),
            Self::BBBp => dec!(28),
            Self::BBB => dec!(32),
            Self::BBBm => dec!(36),
            Self::BBp => dec!(44),
            Self::BB => dec!(52),
            Self::BBm => dec!(58),
            Self::Bp => dec!(64),
            Self::B => dec!(70),
            Self::Bm => dec!(76),
            Self::CCCp => dec!(82),
            Self::CCC => dec!(86),
            Self::CCCm => dec!(90),
            Self::CC => dec!(94),
            Self::C => dec!(97),
            Self::D => dec!(100),
        }
    }

    pub fn is_investment_grade(&self) -> bool {
        self.risk_impact() <= dec!(36)
    }
}

impl std::fmt::Display for CreditRating {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::AAA => "AAA",
            Self::AAp => "AA+",
            Self::AA => "AA",
            Self::AAm => "AA-",
            Self::Ap => "A+",
            Self::A => "A",
            Self::Am => "A-",
            Self::BBBp => "BBB+",
            Self::BBB => "BBB",
            Self::BBBm => "BBB-",
            Self::BBp => "BB+",
            Self::BB => "BB",
            Self::BBm => "BB-",
            Self::Bp => "B+",
            Self::B => "B",
            Self::Bm => "B-",
            Self::CCCp => "CCC+",
            Self::CCC => "CCC",
            Self::CCCm => "CCC-",
            Self::CC => "CC",
            Self::C => "C",
            Self::D => "D",
        };
        write!(f, "{}", s)
    }
}

impl FromStr for CreditRating {
    type Err = String;

    /// Case-insensitive; surrounding whitespace is ignored.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let rating = match s.trim().to_ascii_uppercase().as_str() {
            "AAA" => Self::AAA,
            "AA+" => Self::AAp,
            "AA" => Self::AA,
            "AA-" => Self::AAm,
            "A+" => Self::Ap,
            "A" => Self::A,
            "A-" => Self::Am,
            "BBB+" => Self::BBBp,
            "BBB" => Self::BBB,
            "BBB-" => Self::BBBm,
            "BB+" => Self::BBp,
            "BB" => Self::BB,
            "BB-" => Self::BBm,
            "B+" => Self::Bp,
            "B" => Self::B,
            "B-" => Self::Bm,
            "CCC+" => Self::CCCp,
            "CCC" => Self::CCC,
            "CCC-" => Self::CCCm,
            "CC" => Self::CC,
            "C" => Self::C,
            "D" => Self::D,
            other => return Err(format!("unrecognized credit rating '{other}'")),
        };
        Ok(rating)
    }
}

/// Risk impact for a raw rating code as stored by the host.
pub fn rating_impact(code: Option<&str>) -> Decimal {
    code.and_then(|c| c.parse::<CreditRating>().ok())
        .map(|r| r.risk_impact())
        .unwrap_or(UNRATED_RISK_IMPACT)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scale_endpoints() {
        assert_eq!(CreditRating::AAA.risk_impact(), dec!(0));
        assert_eq!(CreditRating::BB.risk_impact(), dec!(52));
        assert_eq!(CreditRating::D.risk_impact(), dec!(100));
    }

    #[test]
    fn test_parse_is_case_insensitive() {
        assert_eq!(" bbb- ".parse::<CreditRating>(), Ok(CreditRating::BBBm));
        assert_eq!("Aa+".parse::<CreditRating>(), Ok(CreditRating::AAp));
        assert!("Baa2".parse::<CreditRating>().is_err());
    }

    #[test]
    fn test_unknown_and_missing_default_to_midpoint() {
        assert_eq!(rating_impact(None), dec!(50));
        assert_eq!(rating_impact(Some("NR")), dec!(50));
        assert_eq!(rating_impact(Some("B")), dec!(70));
    }

    #[test]
    fn test_display_round_trips_through_parse() {
        for r in [CreditRating::AAm, CreditRating::BBBp, CreditRating::CCCm, CreditRating::D] {
            assert_eq!(r.to_string().parse::<CreditRating>(), Ok(r));
        }
    }

    #[test]
    fn test_investment_grade_cutoff() {
        assert!(CreditRating::BBBm.is_investment_grade());
        assert!(!CreditRating::BBp.is_investment_grade());
    }
}
