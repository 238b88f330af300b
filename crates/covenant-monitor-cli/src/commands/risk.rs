use clap::{Args, ValueEnum};
use rust_decimal::Decimal;
use serde_json::Value;

use covenant_monitor_core::risk::factors::{HeadroomTrend, RiskFactors};
use covenant_monitor_core::risk::portfolio::{self, PortfolioRiskInput};
use covenant_monitor_core::risk::scoring::{self, BorrowerRiskInput};

use crate::input;

#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum TrendArg {
    Improving,
    Stable,
    Deteriorating,
    Unknown,
}

impl From<TrendArg> for HeadroomTrend {
    fn from(t: TrendArg) -> Self {
        match t {
            TrendArg::Improving => HeadroomTrend::Improving,
            TrendArg::Stable => HeadroomTrend::Stable,
            TrendArg::Deteriorating => HeadroomTrend::Deteriorating,
            TrendArg::Unknown => HeadroomTrend::Unknown,
        }
    }
}

/// Arguments for scoring pre-aggregated risk factors
#[derive(Args)]
#[command(allow_hyphen_values = true)]
pub struct RiskScoreArgs {
    /// Path to JSON/YAML input file (overrides individual flags)
    #[arg(long)]
    pub input: Option<String>,

    /// Covenants currently in breach
    #[arg(long, default_value_t = 0)]
    pub breach_count: u32,

    /// Covenants currently at warning level
    #[arg(long, default_value_t = 0)]
    pub warning_count: u32,

    /// Average headroom percentage across active covenants
    #[arg(long)]
    pub average_headroom: Option<Decimal>,

    /// Lowest headroom percentage across active covenants
    #[arg(long)]
    pub lowest_headroom: Option<Decimal>,

    /// Agency-style credit rating (e.g. BBB-)
    #[arg(long)]
    pub credit_rating: Option<String>,

    /// Headroom trend between the two most recent tests
    #[arg(long, value_enum, default_value = "unknown")]
    pub trend: TrendArg,
}

/// Arguments for scoring a borrower from covenant test history
#[derive(Args)]
pub struct BorrowerRiskArgs {
    /// Path to JSON/YAML input file ({ borrower_id, credit_rating?, history })
    #[arg(long)]
    pub input: Option<String>,
}

/// Arguments for ranking every borrower in a portfolio
#[derive(Args)]
pub struct PortfolioRiskArgs {
    /// Path to JSON/YAML input file ({ borrowers: [...] })
    #[arg(long)]
    pub input: Option<String>,
}

pub fn run_risk_score(args: RiskScoreArgs) -> Result<Value, Box<dyn std::error::Error>> {
    let factors: RiskFactors = if let Some(ref path) = args.input {
        input::file::read_document(path)?
    } else if let Some(data) = input::stdin::read_stdin()? {
        serde_json::from_value(data)?
    } else {
        RiskFactors {
            breach_count: args.breach_count,
            warning_count: args.warning_count,
            average_headroom: args.average_headroom,
            lowest_headroom: args.lowest_headroom,
            credit_rating: args.credit_rating,
            headroom_trend: args.trend.into(),
        }
    };

    let result = scoring::score_risk_factors(&factors);
    Ok(serde_json::to_value(result)?)
}

pub fn run_borrower_risk(args: BorrowerRiskArgs) -> Result<Value, Box<dyn std::error::Error>> {
    let borrower: BorrowerRiskInput =
        input::read_input(args.input.as_deref(), "borrower risk scoring")?;
    let result = scoring::score_borrower(&borrower)?;
    Ok(serde_json::to_value(result)?)
}

pub fn run_portfolio_risk(args: PortfolioRiskArgs) -> Result<Value, Box<dyn std::error::Error>> {
    let portfolio_input: PortfolioRiskInput =
        input::read_input(args.input.as_deref(), "portfolio risk ranking")?;
    let result = portfolio::score_portfolio(&portfolio_input)?;
    Ok(serde_json::to_value(result)?)
}
