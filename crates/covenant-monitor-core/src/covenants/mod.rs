//! Covenant compliance testing: single-covenant evaluation and per-loan
//! test runs with alert synthesis.

pub mod evaluator;
pub mod orchestrator;
