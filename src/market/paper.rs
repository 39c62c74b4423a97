//! In-memory venue for paper trading and tests.

use super::series::{PricePoint, PriceSeries};
use super::traits::{
    CapitalAuthority, MarketDataFeed, PairTradeOrder, PairTradeReceipt, TradeExecutionService,
};
use crate::error::ExecutionError;
use anyhow::anyhow;
use async_trait::async_trait;
use chrono::Duration;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::RwLock;
use std::time::Duration as StdDuration;
use tracing::debug;

/// Simulated venue implementing all three external collaborators.
///
/// Prices are pushed in by the host (tests or the paper-mode CLI loop);
/// trades fill fully and instantly unless a failure or delay is scripted.
pub struct PaperVenue {
    series: RwLock<HashMap<String, PriceSeries>>,
    capital: RwLock<Decimal>,
    emergency: AtomicBool,
    /// Scripted feed outage: every price read errors while set.
    feed_down: AtomicBool,
    /// Pending scripted rejections, consumed one per submission.
    fail_next: RwLock<Vec<String>>,
    /// Artificial latency applied to every submission.
    submit_delay: RwLock<Option<StdDuration>>,
    min_trade_size: Decimal,
    tx_counter: AtomicU64,
    series_capacity: usize,
}

impl PaperVenue {
    pub fn new(capital: Decimal) -> Self {
        Self {
            series: RwLock::new(HashMap::new()),
            capital: RwLock::new(capital),
            emergency: AtomicBool::new(false),
            feed_down: AtomicBool::new(false),
            fail_next: RwLock::new(Vec::new()),
            submit_delay: RwLock::new(None),
            min_trade_size: dec!(10),
            tx_counter: AtomicU64::new(1),
            series_capacity: 4096,
        }
    }

    pub fn with_min_trade_size(mut self, min: Decimal) -> Self {
        self.min_trade_size = min;
        self
    }

    /// Append a price point for a token.
    pub fn push_price(&self, token: &str, point: PricePoint) {
        let mut series = self.series.write().expect("price lock poisoned");
        series
            .entry(token.to_string())
            .or_insert_with(|| PriceSeries::new(self.series_capacity))
            .push(point);
    }

    /// Replace the whole history for a token.
    pub fn set_series(&self, token: &str, points: impl IntoIterator<Item = PricePoint>) {
        let mut series = self.series.write().expect("price lock poisoned");
        series.insert(
            token.to_string(),
            PriceSeries::from_points(points, self.series_capacity),
        );
    }

    pub fn set_emergency(&self, on: bool) {
        self.emergency.store(on, Ordering::SeqCst);
    }

    pub fn set_capital(&self, capital: Decimal) {
        *self.capital.write().expect("capital lock poisoned") = capital;
    }

    /// Script a feed outage; prices stay stored but every read errors.
    pub fn set_feed_down(&self, down: bool) {
        self.feed_down.store(down, Ordering::SeqCst);
    }

    /// Script the next submission to be rejected with the given message.
    pub fn fail_next_trade(&self, message: impl Into<String>) {
        self.fail_next
            .write()
            .expect("fail lock poisoned")
            .push(message.into());
    }

    /// Delay every submission; combine with a short caller-side timeout to
    /// exercise the FAILED transition.
    pub fn set_submit_delay(&self, delay: Option<StdDuration>) {
        *self.submit_delay.write().expect("delay lock poisoned") = delay;
    }
}

#[async_trait]
impl MarketDataFeed for PaperVenue {
    async fn price_series(
        &self,
        token: &str,
        lookback: Duration,
    ) -> anyhow::Result<Vec<PricePoint>> {
        if self.feed_down.load(Ordering::SeqCst) {
            return Err(anyhow!("price feed unavailable"));
        }
        let series = self.series.read().expect("price lock poisoned");
        let s = series
            .get(token)
            .ok_or_else(|| anyhow!("no price history for token {token}"))?;
        let cutoff = s
            .latest()
            .map(|p| p.timestamp - lookback)
            .unwrap_or_default();
        Ok(s.iter().filter(|p| p.timestamp >= cutoff).copied().collect())
    }

    async fn latest_price(&self, token: &str) -> anyhow::Result<PricePoint> {
        if self.feed_down.load(Ordering::SeqCst) {
            return Err(anyhow!("price feed unavailable"));
        }
        let series = self.series.read().expect("price lock poisoned");
        series
            .get(token)
            .and_then(|s| s.latest().copied())
            .ok_or_else(|| anyhow!("no price for token {token}"))
    }
}

#[async_trait]
impl TradeExecutionService for PaperVenue {
    async fn submit_pair_trade(
        &self,
        order: &PairTradeOrder,
    ) -> Result<PairTradeReceipt, ExecutionError> {
        let delay = *self.submit_delay.read().expect("delay lock poisoned");
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }

        let scripted = self.fail_next.write().expect("fail lock poisoned").pop();
        if let Some(message) = scripted {
            return Err(ExecutionError::Rejected(message));
        }

        let id = self.tx_counter.fetch_add(1, Ordering::SeqCst);
        debug!(
            pair_id = %order.pair_id,
            leg_a = %order.leg_a.amount,
            leg_b = %order.leg_b.amount,
            tx = id,
            "Paper fill"
        );
        Ok(PairTradeReceipt {
            fill_a: order.leg_a.amount,
            fill_b: order.leg_b.amount,
            tx_ids: vec![format!("paper-{id}")],
        })
    }

    fn min_trade_size(&self) -> Decimal {
        self.min_trade_size
    }
}

#[async_trait]
impl CapitalAuthority for PaperVenue {
    async fn available_capital(&self) -> anyhow::Result<Decimal> {
        Ok(*self.capital.read().expect("capital lock poisoned"))
    }

    async fn emergency_stop(&self) -> bool {
        self.emergency.load(Ordering::SeqCst)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::market::traits::{LegOrder, OrderSide};
    use chrono::{TimeZone, Utc};

    fn point(secs: i64, price: Decimal) -> PricePoint {
        PricePoint::new(Utc.timestamp_opt(1_700_000_000 + secs, 0).unwrap(), price)
    }

    fn order() -> PairTradeOrder {
        PairTradeOrder {
            pair_id: "SOL/RAY".to_string(),
            leg_a: LegOrder::new("SOL", OrderSide::Sell, dec!(2)),
            leg_b: LegOrder::new("RAY", OrderSide::Buy, dec!(100)),
        }
    }

    #[tokio::test]
    async fn test_price_series_respects_lookback() {
        let venue = PaperVenue::new(dec!(10000));
        venue.set_series(
            "SOL",
            (0..10).map(|i| point(i * 60, dec!(100) + Decimal::from(i))),
        );

        let recent = venue
            .price_series("SOL", Duration::seconds(180))
            .await
            .unwrap();
        assert_eq!(recent.len(), 4, "cutoff is relative to the newest point");

        let latest = venue.latest_price("SOL").await.unwrap();
        assert_eq!(latest.price, dec!(109));
    }

    #[tokio::test]
    async fn test_unknown_token_errors() {
        let venue = PaperVenue::new(dec!(10000));
        assert!(venue.latest_price("BONK").await.is_err());
    }

    #[tokio::test]
    async fn test_scripted_rejection_consumed_once() {
        let venue = PaperVenue::new(dec!(10000));
        venue.fail_next_trade("slippage exceeded");

        let first = venue.submit_pair_trade(&order()).await;
        assert!(matches!(first, Err(ExecutionError::Rejected(_))));

        let second = venue.submit_pair_trade(&order()).await.unwrap();
        assert_eq!(second.fill_a, dec!(2));
        assert_eq!(second.tx_ids.len(), 1);
    }

    #[tokio::test]
    async fn test_feed_outage_errors_every_read_until_cleared() {
        let venue = PaperVenue::new(dec!(10000));
        venue.set_series("SOL", (0..5).map(|i| point(i * 60, dec!(100))));

        venue.set_feed_down(true);
        assert!(venue.latest_price("SOL").await.is_err());
        assert!(venue.price_series("SOL", Duration::seconds(600)).await.is_err());

        // History survives the outage
        venue.set_feed_down(false);
        assert_eq!(venue.latest_price("SOL").await.unwrap().price, dec!(100));
    }

    #[tokio::test]
    async fn test_capital_adjustment_is_visible() {
        let venue = PaperVenue::new(dec!(10000));
        assert_eq!(venue.available_capital().await.unwrap(), dec!(10000));

        venue.set_capital(dec!(2500));
        assert_eq!(venue.available_capital().await.unwrap(), dec!(2500));
    }

    #[tokio::test]
    async fn test_emergency_flag() {
        let venue = PaperVenue::new(dec!(10000));
        assert!(!venue.emergency_stop().await);
        venue.set_emergency(true);
        assert!(venue.emergency_stop().await);
    }
}
