pub mod error;
pub mod types;

#[cfg(feature = "covenants")]
pub mod covenants;

#[cfg(feature = "risk")]
pub mod risk;

pub use error::CovenantMonitorError;
pub use types::*;

/// Standard result type for all covenant-monitor operations
pub type CovenantMonitorResult<T> = Result<T, CovenantMonitorError>;
