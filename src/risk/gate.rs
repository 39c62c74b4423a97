//! Portfolio-level entry gating.

use rust_decimal::Decimal;
use std::fmt;
use tracing::debug;

use crate::config::RiskLimits;

/// Why an entry was rejected. Every rejection is logged with its reason.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
pub enum RejectReason {
    /// System-wide emergency stop is engaged.
    EmergencyStop,
    /// The pair already has a non-terminal position.
    PairAlreadyActive,
    /// The pair has a FAILED position awaiting reconciliation.
    PendingReconciliation,
    /// The concurrent-position cap is full.
    PositionLimit,
    /// The allocation would push committed capital past the exposure cap.
    ExposureCap,
}

impl fmt::Display for RejectReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            RejectReason::EmergencyStop => "emergency_stop",
            RejectReason::PairAlreadyActive => "pair_already_active",
            RejectReason::PendingReconciliation => "pending_reconciliation",
            RejectReason::PositionLimit => "position_limit",
            RejectReason::ExposureCap => "exposure_cap",
        };
        write!(f, "{s}")
    }
}

/// Verdict for one proposed entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntryDecision {
    Approved,
    Rejected(RejectReason),
}

impl EntryDecision {
    pub fn is_approved(&self) -> bool {
        matches!(self, EntryDecision::Approved)
    }
}

/// Portfolio state at the moment of the check, assembled by the caller
/// within the tick so the numbers cannot drift mid-decision.
#[derive(Debug, Clone, Copy)]
pub struct PortfolioView {
    /// Positions currently in OPEN state.
    pub open_positions: usize,
    /// Capital committed by every non-terminal position, FAILED included.
    pub committed_capital: Decimal,
    pub total_capital: Decimal,
    /// The candidate pair already has a non-terminal position.
    pub pair_active: bool,
    /// The candidate pair has a FAILED position awaiting reconciliation.
    pub pending_reconciliation: bool,
    pub emergency_stop: bool,
}

/// Final arbiter before capital is committed.
///
/// Approval is only valid for the tick that produced the view; entries are
/// checked one at a time so each approval sees the commitments of the
/// previous one.
pub struct RiskGate {
    limits: RiskLimits,
}

impl RiskGate {
    pub fn new(limits: RiskLimits) -> Self {
        Self { limits }
    }

    /// Check one proposed entry against the portfolio.
    ///
    /// Checks run cheapest-first; the first failure is the recorded reason.
    /// The exposure check uses `<=` so an allocation landing exactly on the
    /// cap is still approved.
    pub fn check_entry(&self, view: &PortfolioView, allocation: Decimal) -> EntryDecision {
        if view.emergency_stop {
            return self.reject(view, RejectReason::EmergencyStop);
        }
        if view.pending_reconciliation {
            return self.reject(view, RejectReason::PendingReconciliation);
        }
        if view.pair_active {
            return self.reject(view, RejectReason::PairAlreadyActive);
        }
        if view.open_positions >= self.limits.max_concurrent_positions {
            return self.reject(view, RejectReason::PositionLimit);
        }

        let cap = view.total_capital * self.limits.max_total_exposure_pct;
        if view.committed_capital + allocation > cap {
            return self.reject(view, RejectReason::ExposureCap);
        }

        EntryDecision::Approved
    }

    fn reject(&self, view: &PortfolioView, reason: RejectReason) -> EntryDecision {
        debug!(
            %reason,
            open_positions = view.open_positions,
            committed = %view.committed_capital,
            "Entry rejected"
        );
        EntryDecision::Rejected(reason)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::{Rng, SeedableRng};
    use rust_decimal::prelude::FromPrimitive;
    use rust_decimal_macros::dec;

    fn gate() -> RiskGate {
        RiskGate::new(RiskLimits::default())
    }

    fn healthy_view() -> PortfolioView {
        PortfolioView {
            open_positions: 0,
            committed_capital: Decimal::ZERO,
            total_capital: dec!(10000),
            pair_active: false,
            pending_reconciliation: false,
            emergency_stop: false,
        }
    }

    #[test]
    fn test_clean_entry_is_approved() {
        assert_eq!(
            gate().check_entry(&healthy_view(), dec!(500)),
            EntryDecision::Approved
        );
    }

    #[test]
    fn test_emergency_stop_rejects_everything() {
        let view = PortfolioView {
            emergency_stop: true,
            ..healthy_view()
        };
        assert_eq!(
            gate().check_entry(&view, dec!(1)),
            EntryDecision::Rejected(RejectReason::EmergencyStop)
        );
    }

    #[test]
    fn test_failed_position_blocks_its_pair() {
        let view = PortfolioView {
            pending_reconciliation: true,
            pair_active: true,
            ..healthy_view()
        };
        // Reconciliation outranks the generic already-active reason
        assert_eq!(
            gate().check_entry(&view, dec!(100)),
            EntryDecision::Rejected(RejectReason::PendingReconciliation)
        );
    }

    #[test]
    fn test_sixth_entry_rejected_at_position_cap() {
        // Default cap is 5 concurrent positions
        let view = PortfolioView {
            open_positions: 5,
            committed_capital: dec!(500),
            ..healthy_view()
        };
        assert_eq!(
            gate().check_entry(&view, dec!(100)),
            EntryDecision::Rejected(RejectReason::PositionLimit)
        );

        let fifth = PortfolioView {
            open_positions: 4,
            ..view
        };
        assert!(gate().check_entry(&fifth, dec!(100)).is_approved());
    }

    #[test]
    fn test_exposure_cap_boundary_is_inclusive() {
        let g = gate();
        // Cap: 10000 * 0.20 = 2000 committed
        let view = PortfolioView {
            committed_capital: dec!(1500),
            open_positions: 3,
            ..healthy_view()
        };
        assert!(g.check_entry(&view, dec!(500)).is_approved());
        assert_eq!(
            g.check_entry(&view, dec!(500.01)),
            EntryDecision::Rejected(RejectReason::ExposureCap)
        );
    }

    #[test]
    fn test_exposure_invariant_under_random_portfolios() {
        let g = gate();
        let limits = RiskLimits::default();
        let mut rng = StdRng::seed_from_u64(7);
        let total = dec!(10000);
        let cap = total * limits.max_total_exposure_pct;

        for _ in 0..500 {
            let n = rng.gen_range(0..=limits.max_concurrent_positions);
            let committed: Decimal = (0..n)
                .map(|_| Decimal::from_f64(rng.gen_range(10.0..600.0)).unwrap())
                .sum();
            let allocation = Decimal::from_f64(rng.gen_range(1.0..900.0)).unwrap();

            let view = PortfolioView {
                open_positions: n,
                committed_capital: committed,
                total_capital: total,
                pair_active: false,
                pending_reconciliation: false,
                emergency_stop: false,
            };

            if g.check_entry(&view, allocation).is_approved() {
                assert!(
                    committed + allocation <= cap,
                    "approved entry breaches exposure cap: {committed} + {allocation} > {cap}"
                );
                assert!(n < limits.max_concurrent_positions);
            }
        }
    }
}
