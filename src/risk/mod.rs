//! Portfolio risk controls.
//!
//! The gate is the only path to committing capital: every approved entry
//! has passed the emergency-stop, per-pair, position-count and exposure
//! checks against a consistent portfolio snapshot.

mod gate;

pub use gate::{EntryDecision, PortfolioView, RejectReason, RiskGate};
