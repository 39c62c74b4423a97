//! Position sizing, lifecycle transitions and exit evaluation.

use chrono::{DateTime, Duration, Utc};
use rust_decimal::prelude::FromPrimitive;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration as StdDuration;
use tracing::{debug, info, warn};

use crate::config::{ExecutionConfig, PairSpec, RiskLimits};
use crate::error::ExecutionError;
use crate::market::{LegOrder, OrderSide, PairTradeOrder, TradeExecutionService};
use crate::strategy::{Signal, SpreadDirection};

use super::{CloseReason, Position, PositionState};

/// Leg amounts and capital for an approved entry.
#[derive(Debug, Clone)]
pub struct SizedEntry {
    pub allocation: Decimal,
    pub leg_a_amount: Decimal,
    pub leg_b_amount: Decimal,
}

/// Fresh market state used to mark an open position on one tick.
#[derive(Debug, Clone, Copy)]
pub struct MarkInput {
    pub price_a: Decimal,
    pub price_b: Decimal,
    pub z_score: f64,
    pub correlation: f64,
}

/// External resolution of a FAILED position against actual holdings.
#[derive(Debug, Clone)]
pub enum ReconcileOutcome {
    /// The legs were in fact unwound on-chain.
    ConfirmedClosed { realized_pnl: Decimal },
    /// The legs are still held; the position resumes automation.
    ConfirmedOpen {
        current_z: f64,
        unrealized_pnl: Decimal,
    },
}

/// Lifetime statistics over terminal positions.
#[derive(Debug, Clone, Copy, serde::Serialize)]
pub struct AggregateStats {
    pub total_trades: usize,
    pub win_rate: f64,
    pub avg_holding_period_hours: f64,
}

/// Owns every position and serializes all mutations.
///
/// The manager is the single logical mutator from the concurrency model:
/// all lifecycle transitions go through `&mut self`, which keeps the capital
/// and concurrency invariants enforceable in one place.
pub struct PositionManager {
    /// Non-terminal positions by pair id; at most one per pair.
    active: HashMap<String, Position>,
    /// Terminal positions, in close order.
    history: Vec<Position>,
    next_id: u64,
    limits: RiskLimits,
    execution: Arc<dyn TradeExecutionService>,
    execution_timeout: StdDuration,
    expected_return_weight: f64,
}

impl PositionManager {
    pub fn new(
        limits: RiskLimits,
        execution: Arc<dyn TradeExecutionService>,
        execution_cfg: &ExecutionConfig,
    ) -> Self {
        Self {
            active: HashMap::new(),
            history: Vec::new(),
            next_id: 1,
            limits,
            execution,
            execution_timeout: StdDuration::from_secs(execution_cfg.execution_timeout_secs),
            expected_return_weight: execution_cfg.expected_return_weight,
        }
    }

    pub fn position(&self, pair_id: &str) -> Option<&Position> {
        self.active.get(pair_id)
    }

    pub fn open_positions(&self) -> Vec<&Position> {
        self.active.values().filter(|p| p.is_open()).collect()
    }

    pub fn open_count(&self) -> usize {
        self.active.values().filter(|p| p.is_open()).count()
    }

    /// Capital committed by every non-terminal position, FAILED included —
    /// until reconciliation the legs may still be deployed on-chain.
    pub fn committed_capital(&self) -> Decimal {
        self.active.values().map(|p| p.allocated_capital).sum()
    }

    /// True when any non-terminal position exists for the pair.
    pub fn has_active(&self, pair_id: &str) -> bool {
        self.active.contains_key(pair_id)
    }

    pub fn pending_reconciliation(&self, pair_id: &str) -> bool {
        matches!(
            self.active.get(pair_id).map(|p| &p.state),
            Some(PositionState::Failed { .. })
        )
    }

    pub fn history(&self) -> &[Position] {
        &self.history
    }

    /// Size an entry from the signal and available capital.
    ///
    /// `allocation = total_capital * max_capital_per_pair_pct *
    /// clamp(confidence * expected_return_weight, 0, 1)`, split 50/50 by
    /// notional. Returns `None` when a leg would fall below the venue
    /// minimum — a gating decision, not an error.
    pub fn size_entry(
        &self,
        signal: &Signal,
        total_capital: Decimal,
        price_a: Decimal,
        price_b: Decimal,
    ) -> Option<SizedEntry> {
        if price_a <= Decimal::ZERO || price_b <= Decimal::ZERO {
            return None;
        }

        let scale = (signal.confidence * self.expected_return_weight).clamp(0.0, 1.0);
        let scale = Decimal::from_f64(scale)?;
        let base = total_capital * self.limits.max_capital_per_pair_pct;
        let allocation = base * scale;

        let leg_notional = allocation / dec!(2);
        if leg_notional < self.execution.min_trade_size() {
            debug!(
                pair_id = %signal.pair_id,
                %leg_notional,
                min = %self.execution.min_trade_size(),
                "Entry below minimum tradable size"
            );
            return None;
        }

        Some(SizedEntry {
            allocation,
            leg_a_amount: leg_notional / price_a,
            leg_b_amount: leg_notional / price_b,
        })
    }

    /// Open a position for an approved entry signal.
    ///
    /// A rejected submission leaves no state behind; a timed-out one leaves
    /// the position in FAILED for reconciliation.
    pub async fn open_entry(
        &mut self,
        spec: &PairSpec,
        signal: &Signal,
        sizing: SizedEntry,
        price_a: Decimal,
        price_b: Decimal,
        now: DateTime<Utc>,
    ) -> Result<u64, ExecutionError> {
        let pair_id = spec.id();
        debug_assert!(!self.active.contains_key(&pair_id));

        let (side_a, side_b) = entry_sides(signal.direction);
        let order = PairTradeOrder {
            pair_id: pair_id.clone(),
            leg_a: LegOrder::new(&spec.token_a, side_a, sizing.leg_a_amount),
            leg_b: LegOrder::new(&spec.token_b, side_b, sizing.leg_b_amount),
        };

        let id = self.next_id;
        self.next_id += 1;
        let position = Position {
            id,
            pair_id: pair_id.clone(),
            direction: signal.direction,
            token_a: spec.token_a.clone(),
            token_b: spec.token_b.clone(),
            leg_a_amount: sizing.leg_a_amount,
            leg_b_amount: sizing.leg_b_amount,
            entry_price_a: price_a,
            entry_price_b: price_b,
            allocated_capital: sizing.allocation,
            entry_z_score: signal.z_score,
            entry_timestamp: now,
            state: PositionState::Opening { started_at: now },
        };
        self.active.insert(pair_id.clone(), position);

        match self.submit_with_timeout(&order).await {
            Ok(receipt) => {
                let position = self.active.get_mut(&pair_id).expect("just inserted");
                position.state = PositionState::Open {
                    current_z: signal.z_score,
                    unrealized_pnl: Decimal::ZERO,
                    marked_at: now,
                    breakdown_ticks: 0,
                };
                info!(
                    %pair_id,
                    id,
                    direction = %signal.direction,
                    z = signal.z_score,
                    allocation = %sizing.allocation,
                    fills = ?receipt.tx_ids,
                    "Position opened"
                );
                Ok(id)
            }
            Err(ExecutionError::Rejected(message)) => {
                // Clean rejection: nothing on-chain, drop all state
                self.active.remove(&pair_id);
                warn!(%pair_id, %message, "Entry rejected by venue");
                Err(ExecutionError::Rejected(message))
            }
            Err(err @ ExecutionError::Timeout(_)) => {
                let position = self.active.get_mut(&pair_id).expect("just inserted");
                position.state = PositionState::Failed {
                    detail: format!("entry: {err}"),
                    at: now,
                };
                warn!(%pair_id, %err, "Entry timed out; position requires reconciliation");
                Err(err)
            }
        }
    }

    /// Per-tick maintenance of an OPEN position: mark to market, then
    /// evaluate exit triggers in strict priority order.
    ///
    /// First match wins: stop-loss, correlation breakdown, max holding
    /// period, mean-reversion exit.
    pub fn maintain(
        &mut self,
        pair_id: &str,
        mark: MarkInput,
        now: DateTime<Utc>,
    ) -> Option<CloseReason> {
        let position = self.active.get_mut(pair_id)?;
        let pnl = position.unrealized_pnl(mark.price_a, mark.price_b);
        let held = position.holding_period(now);

        let breakdown_ticks = match &mut position.state {
            PositionState::Open {
                current_z,
                unrealized_pnl,
                marked_at,
                breakdown_ticks,
            } => {
                *current_z = mark.z_score;
                *unrealized_pnl = pnl;
                *marked_at = now;
                if mark.correlation < self.limits.min_correlation {
                    *breakdown_ticks += 1;
                } else {
                    *breakdown_ticks = 0;
                }
                *breakdown_ticks
            }
            _ => return None,
        };

        let az = mark.z_score.abs();
        if az >= self.limits.stop_z {
            Some(CloseReason::StopLoss)
        } else if breakdown_ticks >= self.limits.breakdown_ticks {
            Some(CloseReason::CorrelationBreakdown)
        } else if held > Duration::hours(self.limits.max_holding_period_hours) {
            Some(CloseReason::MaxHoldingPeriod)
        } else if az <= self.limits.exit_z {
            Some(CloseReason::MeanReversion)
        } else {
            None
        }
    }

    /// Close an OPEN position, recording the triggering reason.
    ///
    /// A failed or timed-out exit moves the position to FAILED — its
    /// on-chain state is uncertain and must be reconciled externally.
    pub async fn close(
        &mut self,
        pair_id: &str,
        reason: CloseReason,
        price_a: Decimal,
        price_b: Decimal,
        now: DateTime<Utc>,
    ) -> Result<Decimal, ExecutionError> {
        let position = match self.active.get_mut(pair_id) {
            Some(p) if p.is_open() => p,
            _ => return Err(ExecutionError::Rejected("no open position".to_string())),
        };
        position.state = PositionState::Closing {
            reason,
            started_at: now,
        };

        let (entry_a, entry_b) = entry_sides(position.direction);
        let order = PairTradeOrder {
            pair_id: pair_id.to_string(),
            leg_a: LegOrder::new(&position.token_a, entry_a.opposite(), position.leg_a_amount),
            leg_b: LegOrder::new(&position.token_b, entry_b.opposite(), position.leg_b_amount),
        };

        match self.submit_with_timeout(&order).await {
            Ok(_receipt) => {
                let mut position = self.active.remove(pair_id).expect("checked above");
                let realized = position.unrealized_pnl(price_a, price_b);
                position.state = if reason == CloseReason::StopLoss {
                    PositionState::Stopped {
                        realized_pnl: realized,
                        closed_at: now,
                    }
                } else {
                    PositionState::Closed {
                        reason,
                        realized_pnl: realized,
                        closed_at: now,
                    }
                };
                info!(
                    %pair_id,
                    id = position.id,
                    %reason,
                    %realized,
                    "Position closed"
                );
                self.history.push(position);
                Ok(realized)
            }
            Err(err) => {
                let position = self.active.get_mut(pair_id).expect("checked above");
                position.state = PositionState::Failed {
                    detail: format!("exit ({reason}): {err}"),
                    at: now,
                };
                warn!(%pair_id, %err, "Exit failed; position requires reconciliation");
                Err(err)
            }
        }
    }

    /// Resolve a FAILED position against actual on-chain holdings.
    pub fn reconcile(
        &mut self,
        pair_id: &str,
        outcome: ReconcileOutcome,
        now: DateTime<Utc>,
    ) -> anyhow::Result<()> {
        match self.active.get(pair_id).map(|p| &p.state) {
            Some(PositionState::Failed { .. }) => {}
            _ => anyhow::bail!("no position pending reconciliation for pair {pair_id}"),
        }

        match outcome {
            ReconcileOutcome::ConfirmedClosed { realized_pnl } => {
                let mut position = self.active.remove(pair_id).expect("checked above");
                position.state = PositionState::Closed {
                    reason: CloseReason::Reconciled,
                    realized_pnl,
                    closed_at: now,
                };
                info!(%pair_id, id = position.id, %realized_pnl, "Reconciled as closed");
                self.history.push(position);
            }
            ReconcileOutcome::ConfirmedOpen {
                current_z,
                unrealized_pnl,
            } => {
                let position = self.active.get_mut(pair_id).expect("checked above");
                position.state = PositionState::Open {
                    current_z,
                    unrealized_pnl,
                    marked_at: now,
                    breakdown_ticks: 0,
                };
                info!(%pair_id, id = position.id, "Reconciled as still open");
            }
        }
        Ok(())
    }

    /// Lifetime statistics over terminal positions.
    pub fn aggregate_stats(&self) -> AggregateStats {
        let total = self.history.len();
        if total == 0 {
            return AggregateStats {
                total_trades: 0,
                win_rate: 0.0,
                avg_holding_period_hours: 0.0,
            };
        }

        let mut wins = 0usize;
        let mut held_hours = 0.0;
        for p in &self.history {
            let (pnl, closed_at) = match &p.state {
                PositionState::Closed {
                    realized_pnl,
                    closed_at,
                    ..
                } => (*realized_pnl, *closed_at),
                PositionState::Stopped {
                    realized_pnl,
                    closed_at,
                } => (*realized_pnl, *closed_at),
                _ => continue,
            };
            if pnl > Decimal::ZERO {
                wins += 1;
            }
            held_hours += (closed_at - p.entry_timestamp).num_seconds() as f64 / 3600.0;
        }

        AggregateStats {
            total_trades: total,
            win_rate: wins as f64 / total as f64,
            avg_holding_period_hours: held_hours / total as f64,
        }
    }

    async fn submit_with_timeout(
        &self,
        order: &PairTradeOrder,
    ) -> Result<crate::market::PairTradeReceipt, ExecutionError> {
        match tokio::time::timeout(self.execution_timeout, self.execution.submit_pair_trade(order))
            .await
        {
            Ok(result) => result,
            Err(_) => Err(ExecutionError::Timeout(self.execution_timeout)),
        }
    }
}

/// Entry leg sides for a direction; exits use the opposites.
fn entry_sides(direction: SpreadDirection) -> (OrderSide, OrderSide) {
    match direction {
        // Long spread: buy A, sell B
        SpreadDirection::LongSpread => (OrderSide::Buy, OrderSide::Sell),
        // Short spread: sell A, buy B
        SpreadDirection::ShortSpread => (OrderSide::Sell, OrderSide::Buy),
    }
}
