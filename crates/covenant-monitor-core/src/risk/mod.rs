//! Borrower risk scoring built on accumulated covenant test history.

pub mod factors;
pub mod portfolio;
pub mod rating;
pub mod scoring;
