//! Hedged position lifecycle.
//!
//! A position is two equal-notional legs on one pair. Its lifecycle is
//! `OPENING -> OPEN -> {CLOSING -> CLOSED | STOPPED | FAILED}`; the transient
//! states are bounded by the execution timeout and a timeout lands in
//! `FAILED`, which requires external reconciliation — never a silent revert.

mod manager;

use chrono::{DateTime, Duration, Utc};
use rust_decimal::Decimal;
use serde::Serialize;
use std::fmt;

use crate::strategy::SpreadDirection;

pub use manager::{AggregateStats, MarkInput, PositionManager, ReconcileOutcome, SizedEntry};

/// Why a position was closed (or is being closed).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum CloseReason {
    /// The spread reverted into the exit band.
    MeanReversion,
    /// The spread blew through the stop threshold.
    StopLoss,
    /// Rolling correlation stayed below the minimum for too many ticks.
    CorrelationBreakdown,
    /// The position aged past the maximum holding period.
    MaxHoldingPeriod,
    /// System-wide emergency stop.
    EmergencyStop,
    /// No fresh prices within the staleness window.
    StaleData,
    /// Resolved externally after a FAILED transition.
    Reconciled,
}

impl fmt::Display for CloseReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            CloseReason::MeanReversion => "mean_reversion",
            CloseReason::StopLoss => "stop_loss",
            CloseReason::CorrelationBreakdown => "correlation_breakdown",
            CloseReason::MaxHoldingPeriod => "max_holding_period",
            CloseReason::EmergencyStop => "emergency_stop",
            CloseReason::StaleData => "stale_data",
            CloseReason::Reconciled => "reconciled",
        };
        write!(f, "{s}")
    }
}

/// Lifecycle state; each variant carries only the fields valid for it.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum PositionState {
    /// Entry legs submitted, awaiting fills.
    Opening { started_at: DateTime<Utc> },
    /// Both legs filled; marked to market every tick.
    Open {
        current_z: f64,
        unrealized_pnl: Decimal,
        marked_at: DateTime<Utc>,
        /// Consecutive ticks with correlation below the minimum.
        breakdown_ticks: u32,
    },
    /// Exit legs submitted, awaiting fills.
    Closing {
        reason: CloseReason,
        started_at: DateTime<Utc>,
    },
    /// Terminal: closed normally.
    Closed {
        reason: CloseReason,
        realized_pnl: Decimal,
        closed_at: DateTime<Utc>,
    },
    /// Terminal: closed by stop-loss.
    Stopped {
        realized_pnl: Decimal,
        closed_at: DateTime<Utc>,
    },
    /// Execution outcome unknown; excluded from automation until the ledger
    /// is reconciled against actual holdings.
    Failed {
        detail: String,
        at: DateTime<Utc>,
    },
}

impl PositionState {
    pub fn label(&self) -> &'static str {
        match self {
            PositionState::Opening { .. } => "opening",
            PositionState::Open { .. } => "open",
            PositionState::Closing { .. } => "closing",
            PositionState::Closed { .. } => "closed",
            PositionState::Stopped { .. } => "stopped",
            PositionState::Failed { .. } => "failed",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            PositionState::Closed { .. } | PositionState::Stopped { .. }
        )
    }
}

/// A hedged two-leg position on one pair.
#[derive(Debug, Clone, Serialize)]
pub struct Position {
    pub id: u64,
    pub pair_id: String,
    pub direction: SpreadDirection,
    pub token_a: String,
    pub token_b: String,
    pub leg_a_amount: Decimal,
    pub leg_b_amount: Decimal,
    pub entry_price_a: Decimal,
    pub entry_price_b: Decimal,
    /// Capital committed at entry; counts against the exposure cap.
    pub allocated_capital: Decimal,
    pub entry_z_score: f64,
    pub entry_timestamp: DateTime<Utc>,
    pub state: PositionState,
}

impl Position {
    pub fn is_open(&self) -> bool {
        matches!(self.state, PositionState::Open { .. })
    }

    /// Mark-to-market PnL of both legs at the given prices.
    ///
    /// A short spread sold A and bought B; a long spread the reverse. At
    /// entry prices this is exactly zero.
    pub fn unrealized_pnl(&self, price_a: Decimal, price_b: Decimal) -> Decimal {
        let pnl_a = self.leg_a_amount * (price_a - self.entry_price_a);
        let pnl_b = self.leg_b_amount * (price_b - self.entry_price_b);
        match self.direction {
            SpreadDirection::LongSpread => pnl_a - pnl_b,
            SpreadDirection::ShortSpread => pnl_b - pnl_a,
        }
    }

    pub fn holding_period(&self, now: DateTime<Utc>) -> Duration {
        now - self.entry_timestamp
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use rust_decimal_macros::dec;

    fn ts(secs: i64) -> DateTime<Utc> {
        Utc.timestamp_opt(1_700_000_000 + secs, 0).unwrap()
    }

    fn position(direction: SpreadDirection) -> Position {
        Position {
            id: 1,
            pair_id: "SOL/RAY".to_string(),
            direction,
            token_a: "SOL".to_string(),
            token_b: "RAY".to_string(),
            leg_a_amount: dec!(10),
            leg_b_amount: dec!(200),
            entry_price_a: dec!(40),
            entry_price_b: dec!(2),
            allocated_capital: dec!(800),
            entry_z_score: 2.2,
            entry_timestamp: ts(0),
            state: PositionState::Open {
                current_z: 2.2,
                unrealized_pnl: Decimal::ZERO,
                marked_at: ts(0),
                breakdown_ticks: 0,
            },
        }
    }

    #[test]
    fn test_pnl_zero_at_entry_prices() {
        for direction in [SpreadDirection::LongSpread, SpreadDirection::ShortSpread] {
            let p = position(direction);
            assert_eq!(p.unrealized_pnl(dec!(40), dec!(2)), Decimal::ZERO);
        }
    }

    #[test]
    fn test_short_spread_profits_from_convergence() {
        // Short spread: sold A at 40, bought B at 2. A falls, B rises.
        let p = position(SpreadDirection::ShortSpread);
        let pnl = p.unrealized_pnl(dec!(38), dec!(2.1));
        // 10*(40-38) + 200*(2.1-2) = 20 + 20
        assert_eq!(pnl, dec!(40));

        let long = position(SpreadDirection::LongSpread);
        assert_eq!(long.unrealized_pnl(dec!(38), dec!(2.1)), dec!(-40));
    }

    #[test]
    fn test_terminal_states() {
        assert!(!PositionState::Opening { started_at: ts(0) }.is_terminal());
        assert!(PositionState::Stopped {
            realized_pnl: Decimal::ZERO,
            closed_at: ts(0)
        }
        .is_terminal());
        assert!(!PositionState::Failed {
            detail: "timeout".to_string(),
            at: ts(0)
        }
        .is_terminal());
    }
}
