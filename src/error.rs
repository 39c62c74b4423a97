//! Error taxonomy for the pairs-trading engine.
//!
//! Statistical failures are per-tick and recoverable: the affected pair is
//! skipped and retried once more data accumulates. Execution failures are
//! surfaced to the position lifecycle, where a failed exit leaves the
//! position in a reconciliation-required state rather than silently retrying.

use std::time::Duration;
use thiserror::Error;

/// Failures produced by the statistical layer.
///
/// Both variants mark the pair non-tradable for the current tick only.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum StatsError {
    /// Not enough aligned price history to produce a meaningful estimate.
    ///
    /// Deliberately distinct from any numeric correlation value so a short
    /// series can never be mistaken for a statistically weak relationship.
    #[error("insufficient data: {actual} aligned samples, {required} required")]
    InsufficientData { required: usize, actual: usize },

    /// The input is numerically unusable (zero variance, non-finite values).
    #[error("degenerate series: {0}")]
    DegenerateSeries(&'static str),
}

/// Failures from the trade execution service.
#[derive(Debug, Clone, Error)]
pub enum ExecutionError {
    /// The venue rejected the trade outright. For entries this means the
    /// position is simply not opened; no partial state is kept.
    #[error("trade rejected by venue: {0}")]
    Rejected(String),

    /// The execution call did not resolve within the configured timeout.
    /// The on-chain state is now uncertain and the position moves to FAILED.
    #[error("execution timed out after {0:?}")]
    Timeout(Duration),
}
