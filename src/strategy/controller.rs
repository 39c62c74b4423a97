//! Tick orchestration.
//!
//! One controller owns the whole pipeline and runs it on a fixed cadence:
//! refresh data, evaluate pairs, maintain open positions, then let entry
//! candidates compete for the remaining risk budget. Ticks never overlap —
//! the loop holds `&mut self` and awaits each tick to completion before
//! scheduling the next.

use anyhow::{Context, Result};
use chrono::{Duration, Utc};
use rust_decimal::Decimal;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, error, info, warn};

use crate::config::{Config, PairSpec};
use crate::market::{CapitalAuthority, MarketDataFeed, PriceSeries, TradeExecutionService};
use crate::position::{CloseReason, MarkInput, Position, PositionManager, ReconcileOutcome};
use crate::risk::{EntryDecision, PortfolioView, RejectReason, RiskGate};
use crate::stats::{CorrelationEngine, PairEvaluation, PairStatistics};
use crate::strategy::{Signal, SignalGenerator, SignalKind};

/// What one tick did, for logging and the paper-run summary.
#[derive(Debug, Default)]
pub struct TickReport {
    pub evaluated: usize,
    /// Pairs skipped this tick, with the reason.
    pub skipped: Vec<(String, String)>,
    pub entries_opened: Vec<String>,
    pub entries_rejected: Vec<(String, RejectReason)>,
    pub closes: Vec<(String, CloseReason)>,
    pub emergency_stop: bool,
}

/// Fresh per-pair data assembled during the evaluation phase and consumed
/// by maintenance and entry within the same tick.
struct PairTickState {
    spec: PairSpec,
    eval: PairEvaluation,
    signal: Signal,
    price_a: Decimal,
    price_b: Decimal,
}

/// Drives the full strategy pipeline.
pub struct StrategyController {
    config: Config,
    engine: CorrelationEngine,
    signals: SignalGenerator,
    gate: RiskGate,
    positions: PositionManager,
    feed: Arc<dyn MarketDataFeed>,
    capital: Arc<dyn CapitalAuthority>,
    /// Last successful evaluation per pair, for status reporting.
    latest_stats: HashMap<String, PairStatistics>,
    /// Consecutive failed fetches per pair; cleared on any success.
    fetch_failures: HashMap<String, u64>,
    /// Failed fetches that add up to the stale-data timeout at tick cadence.
    stale_fetch_limit: u64,
}

impl StrategyController {
    pub fn new(
        config: Config,
        feed: Arc<dyn MarketDataFeed>,
        execution: Arc<dyn TradeExecutionService>,
        capital: Arc<dyn CapitalAuthority>,
    ) -> Self {
        let engine = CorrelationEngine::new(config.stats.clone());
        let signals = SignalGenerator::new(config.limits.clone(), config.stats.target_half_life);
        let gate = RiskGate::new(config.limits.clone());
        let positions = PositionManager::new(config.limits.clone(), execution, &config.execution);
        let stale_fetch_limit = (config.execution.stale_data_timeout_secs
            / config.execution.tick_interval_secs.max(1))
        .max(1);
        Self {
            config,
            engine,
            signals,
            gate,
            positions,
            feed,
            capital,
            latest_stats: HashMap::new(),
            fetch_failures: HashMap::new(),
            stale_fetch_limit,
        }
    }

    pub fn open_positions(&self) -> Vec<&Position> {
        self.positions.open_positions()
    }

    pub fn pair_statistics(&self) -> &HashMap<String, PairStatistics> {
        &self.latest_stats
    }

    /// Latest successful evaluation for one pair, if any tick produced one.
    pub fn pair_statistic(&self, pair_id: &str) -> Option<&PairStatistics> {
        self.latest_stats.get(pair_id)
    }

    pub fn aggregate_stats(&self) -> crate::position::AggregateStats {
        self.positions.aggregate_stats()
    }

    /// Resolve a FAILED position against externally verified holdings.
    pub fn reconcile(&mut self, pair_id: &str, outcome: ReconcileOutcome) -> Result<()> {
        self.positions.reconcile(pair_id, outcome, Utc::now())
    }

    /// Run one full tick.
    ///
    /// Phase order is fixed: emergency stop, evaluation, maintenance of
    /// open positions, then the entry competition. Maintenance runs first
    /// so capital released by closes is visible to this tick's entries.
    pub async fn tick(&mut self) -> Result<TickReport> {
        let now = Utc::now();
        let mut report = TickReport::default();

        if self.capital.emergency_stop().await {
            report.emergency_stop = true;
            self.close_all(CloseReason::EmergencyStop, &mut report).await;
            return Ok(report);
        }

        let states = self.evaluate_pairs(&mut report, now).await;
        self.maintain_positions(&states, &mut report, now).await;
        self.run_entry_competition(states, &mut report, now).await?;

        Ok(report)
    }

    /// Fetch fresh history and evaluate every configured pair.
    ///
    /// A pair that cannot be evaluated this tick is skipped, not faulted;
    /// stale data on a pair with an open position forces a protective close.
    async fn evaluate_pairs(
        &mut self,
        report: &mut TickReport,
        now: chrono::DateTime<Utc>,
    ) -> Vec<PairTickState> {
        let lookback = Duration::seconds(self.config.stats.lookback_window_secs as i64);
        let stale_after = Duration::seconds(self.config.execution.stale_data_timeout_secs as i64);
        let pairs = self.config.pairs.clone();

        let mut states = Vec::with_capacity(pairs.len());
        for spec in pairs {
            let pair_id = spec.id();

            let (series_a, series_b) = match self.fetch_pair_series(&spec, lookback).await {
                Ok(series) => series,
                Err(e) => {
                    warn!(%pair_id, error = ?e, "Price fetch failed; skipping pair");
                    // A sustained outage is stale data by another name: once
                    // the misses span the stale-data timeout, an open
                    // position must not be left unmaintained.
                    let misses = {
                        let m = self.fetch_failures.entry(pair_id.clone()).or_insert(0);
                        *m += 1;
                        *m
                    };
                    if misses >= self.stale_fetch_limit && self.has_open(&pair_id) {
                        self.close_position(&pair_id, CloseReason::StaleData, report, now)
                            .await;
                    }
                    report.skipped.push((pair_id, "fetch_failed".to_string()));
                    continue;
                }
            };
            self.fetch_failures.remove(&pair_id);

            if series_a.is_stale(now, stale_after) || series_b.is_stale(now, stale_after) {
                if self.has_open(&pair_id) {
                    self.close_position(&pair_id, CloseReason::StaleData, report, now)
                        .await;
                }
                report.skipped.push((pair_id, "stale_data".to_string()));
                continue;
            }

            let eval = match self.engine.evaluate(&spec, &series_a, &series_b, now) {
                Ok(eval) => eval,
                Err(e) => {
                    debug!(%pair_id, error = %e, "Pair not evaluable this tick");
                    report.skipped.push((pair_id, e.to_string()));
                    continue;
                }
            };

            // Both series are non-stale, so both have a latest point
            let (Some(last_a), Some(last_b)) = (series_a.latest(), series_b.latest()) else {
                continue;
            };

            let signal = self.signals.generate(&eval, self.has_open(&pair_id), now);
            self.latest_stats.insert(pair_id, eval.stats.clone());
            report.evaluated += 1;
            states.push(PairTickState {
                spec,
                eval,
                signal,
                price_a: last_a.price,
                price_b: last_b.price,
            });
        }
        states
    }

    async fn fetch_pair_series(
        &self,
        spec: &PairSpec,
        lookback: Duration,
    ) -> Result<(PriceSeries, PriceSeries)> {
        let capacity = self.config.stats.lookback_points;
        let points_a = self
            .feed
            .price_series(&spec.token_a, lookback)
            .await
            .with_context(|| format!("fetching history for {}", spec.token_a))?;
        let points_b = self
            .feed
            .price_series(&spec.token_b, lookback)
            .await
            .with_context(|| format!("fetching history for {}", spec.token_b))?;
        Ok((
            PriceSeries::from_points(points_a, capacity),
            PriceSeries::from_points(points_b, capacity),
        ))
    }

    /// Mark every open position and close those that tripped an exit rule.
    async fn maintain_positions(
        &mut self,
        states: &[PairTickState],
        report: &mut TickReport,
        now: chrono::DateTime<Utc>,
    ) {
        for state in states {
            let pair_id = state.spec.id();
            if !self.has_open(&pair_id) {
                continue;
            }

            let mark = MarkInput {
                price_a: state.price_a,
                price_b: state.price_b,
                z_score: state.signal.z_score,
                correlation: state.eval.stats.correlation,
            };
            if let Some(reason) = self.positions.maintain(&pair_id, mark, now) {
                self.close_at(&pair_id, reason, state.price_a, state.price_b, report, now)
                    .await;
            }
        }
    }

    /// Rank entry candidates and admit them greedily through the gate.
    ///
    /// Each approval commits capital before the next candidate is checked,
    /// so a tick can never over-allocate however many signals fire at once.
    async fn run_entry_competition(
        &mut self,
        states: Vec<PairTickState>,
        report: &mut TickReport,
        now: chrono::DateTime<Utc>,
    ) -> Result<()> {
        let mut candidates: Vec<PairTickState> = states
            .into_iter()
            .filter(|s| s.signal.kind == SignalKind::Entry)
            .collect();
        candidates.sort_by(|a, b| {
            b.signal
                .ranking_weight()
                .total_cmp(&a.signal.ranking_weight())
        });

        if candidates.is_empty() {
            return Ok(());
        }

        let total_capital = self
            .capital
            .available_capital()
            .await
            .context("querying total capital")?;

        for state in candidates {
            let pair_id = state.spec.id();

            let Some(sizing) = self.positions.size_entry(
                &state.signal,
                total_capital,
                state.price_a,
                state.price_b,
            ) else {
                report.skipped.push((pair_id, "below_min_size".to_string()));
                continue;
            };

            let view = PortfolioView {
                open_positions: self.positions.open_count(),
                committed_capital: self.positions.committed_capital(),
                total_capital,
                pair_active: self.positions.has_active(&pair_id),
                pending_reconciliation: self.positions.pending_reconciliation(&pair_id),
                emergency_stop: false,
            };
            match self.gate.check_entry(&view, sizing.allocation) {
                EntryDecision::Rejected(reason) => {
                    report.entries_rejected.push((pair_id, reason));
                    continue;
                }
                EntryDecision::Approved => {}
            }

            match self
                .positions
                .open_entry(
                    &state.spec,
                    &state.signal,
                    sizing,
                    state.price_a,
                    state.price_b,
                    now,
                )
                .await
            {
                Ok(_) => report.entries_opened.push(pair_id),
                Err(e) => {
                    // Rejections free the slot; timeouts hold it until
                    // reconciliation. Both were logged by the manager.
                    warn!(pair_id = %state.spec.id(), error = %e, "Entry execution failed");
                }
            }
        }
        Ok(())
    }

    async fn close_all(&mut self, reason: CloseReason, report: &mut TickReport) {
        let now = Utc::now();
        let open: Vec<String> = self
            .positions
            .open_positions()
            .iter()
            .map(|p| p.pair_id.clone())
            .collect();
        warn!(count = open.len(), %reason, "Closing all open positions");
        for pair_id in open {
            self.close_position(&pair_id, reason, report, now).await;
        }
    }

    /// Close at the freshest prices the feed will give; falls back silently
    /// to entry prices only if the feed has nothing, keeping the close going.
    async fn close_position(
        &mut self,
        pair_id: &str,
        reason: CloseReason,
        report: &mut TickReport,
        now: chrono::DateTime<Utc>,
    ) {
        let Some(position) = self.positions.position(pair_id) else {
            return;
        };
        let (token_a, token_b) = (position.token_a.clone(), position.token_b.clone());
        let (entry_a, entry_b) = (position.entry_price_a, position.entry_price_b);

        let price_a = self
            .feed
            .latest_price(&token_a)
            .await
            .map(|p| p.price)
            .unwrap_or(entry_a);
        let price_b = self
            .feed
            .latest_price(&token_b)
            .await
            .map(|p| p.price)
            .unwrap_or(entry_b);

        self.close_at(pair_id, reason, price_a, price_b, report, now)
            .await;
    }

    async fn close_at(
        &mut self,
        pair_id: &str,
        reason: CloseReason,
        price_a: Decimal,
        price_b: Decimal,
        report: &mut TickReport,
        now: chrono::DateTime<Utc>,
    ) {
        match self
            .positions
            .close(pair_id, reason, price_a, price_b, now)
            .await
        {
            Ok(_) => report.closes.push((pair_id.to_string(), reason)),
            Err(e) => {
                error!(%pair_id, %reason, error = %e, "Close failed; position marked for reconciliation")
            }
        }
    }

    fn has_open(&self, pair_id: &str) -> bool {
        self.positions
            .position(pair_id)
            .map(|p| p.is_open())
            .unwrap_or(false)
    }
}

impl TickReport {
    /// One structured log line summarizing the tick.
    pub fn log(&self) {
        if self.emergency_stop {
            warn!(closes = self.closes.len(), "Tick: emergency stop engaged");
            return;
        }
        info!(
            evaluated = self.evaluated,
            skipped = self.skipped.len(),
            opened = self.entries_opened.len(),
            rejected = self.entries_rejected.len(),
            closed = self.closes.len(),
            "Tick complete"
        );
    }
}
