//! Run orchestration and reporting.

pub mod report;
pub mod runner;
