pub mod covenants;
pub mod risk;
