//! Venue-agnostic traits for the engine's external collaborators.
//!
//! The strategy core never talks to a DEX directly. Market data, trade
//! execution and capital/emergency state all arrive through these traits so
//! the same engine runs against a live venue adapter or the in-memory
//! [`PaperVenue`](super::paper::PaperVenue).

use crate::error::ExecutionError;
use async_trait::async_trait;
use chrono::Duration;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;

use super::series::PricePoint;

/// Order side for a single leg.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum OrderSide {
    Buy,
    Sell,
}

impl OrderSide {
    pub fn opposite(self) -> Self {
        match self {
            OrderSide::Buy => OrderSide::Sell,
            OrderSide::Sell => OrderSide::Buy,
        }
    }
}

impl fmt::Display for OrderSide {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OrderSide::Buy => write!(f, "buy"),
            OrderSide::Sell => write!(f, "sell"),
        }
    }
}

/// One leg of a hedged pair trade.
#[derive(Debug, Clone)]
pub struct LegOrder {
    pub token: String,
    pub side: OrderSide,
    pub amount: Decimal,
}

impl LegOrder {
    pub fn new(token: impl Into<String>, side: OrderSide, amount: Decimal) -> Self {
        Self {
            token: token.into(),
            side,
            amount,
        }
    }
}

/// A two-leg hedged trade, submitted atomically from the engine's point of
/// view. Used for both entries and exits.
#[derive(Debug, Clone)]
pub struct PairTradeOrder {
    pub pair_id: String,
    pub leg_a: LegOrder,
    pub leg_b: LegOrder,
}

/// Fills and transaction ids reported back by the execution service.
#[derive(Debug, Clone)]
pub struct PairTradeReceipt {
    pub fill_a: Decimal,
    pub fill_b: Decimal,
    pub tx_ids: Vec<String>,
}

/// Source of historical and latest prices per token.
#[async_trait]
pub trait MarketDataFeed: Send + Sync {
    /// Ordered (timestamp, price) history for a token within the lookback
    /// window. The feed decides granularity; the series layer dedups and
    /// bounds the result.
    async fn price_series(&self, token: &str, lookback: Duration)
        -> anyhow::Result<Vec<PricePoint>>;

    /// Most recent observed price for a token.
    async fn latest_price(&self, token: &str) -> anyhow::Result<PricePoint>;
}

/// Swap submission for hedged pair trades.
#[async_trait]
pub trait TradeExecutionService: Send + Sync {
    /// Submit both legs. A clean failure returns [`ExecutionError::Rejected`];
    /// the caller enforces its own timeout on top of this call.
    async fn submit_pair_trade(
        &self,
        order: &PairTradeOrder,
    ) -> Result<PairTradeReceipt, ExecutionError>;

    /// Minimum tradable notional per leg, in quote units. Entries sized
    /// below this are rejected by the position manager before submission.
    fn min_trade_size(&self) -> Decimal;
}

/// Capital and emergency-stop authority for the whole process.
#[async_trait]
pub trait CapitalAuthority: Send + Sync {
    /// Total capital available to the strategy, in quote units.
    async fn available_capital(&self) -> anyhow::Result<Decimal>;

    /// System-wide emergency stop. Checked before any other gate each tick.
    async fn emergency_stop(&self) -> bool;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_order_side_opposite() {
        assert_eq!(OrderSide::Buy.opposite(), OrderSide::Sell);
        assert_eq!(OrderSide::Sell.opposite(), OrderSide::Buy);
        assert_eq!(OrderSide::Buy.to_string(), "buy");
    }
}
