use thiserror::Error;

#[derive(Debug, Error)]
pub enum CovenantMonitorError {
    /// A covenant definition that cannot be evaluated (unrecognized type,
    /// zero threshold, missing custom value). Fatal for that covenant only.
    #[error("Configuration error for covenant '{covenant}': {reason}")]
    Configuration { covenant: String, reason: String },

    /// No financial period exists for the loan under test. Fatal for the run.
    #[error("No financial data available for loan '{loan_id}'")]
    NoFinancialData { loan_id: String },

    #[error("Insufficient data: {0}")]
    InsufficientData(String),

    #[error("Serialization error: {0}")]
    SerializationError(String),
}

impl From<serde_json::Error> for CovenantMonitorError {
    fn from(e: serde_json::Error) -> Self {
        CovenantMonitorError::SerializationError(e.to_string())
    }
}
