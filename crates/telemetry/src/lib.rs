//! Token budget enforcement and usage reporting for ironloop.
//!
//! The [`TokenBudgetTracker`] evaluates a run's cumulative token usage
//! against an optional limit at every iteration boundary: under the
//! `warn` strategy it only ever emits warnings, under `halt` it stops the
//! run once the limit is reached. [`UsageReport`] summarises what a run
//! consumed.

pub mod budget;
pub mod usage;

pub use budget::{
    BudgetCheck, BudgetConfig, BudgetStrategy, DEFAULT_WARN_THRESHOLD, TokenBudgetTracker,
    check_limit,
};
pub use usage::UsageReport;

/// Errors from the telemetry subsystem.
#[derive(Debug, thiserror::Error)]
pub enum TelemetryError {
    #[error("unknown budget strategy: {0} (expected \"warn\" or \"halt\")")]
    UnknownStrategy(String),
}
