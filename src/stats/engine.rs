//! Per-pair statistical evaluation.
//!
//! One [`CorrelationEngine::evaluate`] call per pair per tick produces the
//! full statistical picture: rolling correlation, cointegration verdict,
//! hedge ratio, spread baseline, half-life and the combined confidence
//! score. Any statistical failure marks the pair non-tradable for this tick
//! only; the engine holds no state between ticks.

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::debug;

use crate::config::{PairSpec, StatsConfig};
use crate::error::StatsError;
use crate::market::{aligned_overlap, PriceSeries};

use super::cointegration::{adf_statistic, log_spread, ols_hedge_ratio};
use super::correlation::pearson;
use super::half_life::estimate_half_life;

/// Statistical snapshot of a trading pair, recomputed every tick.
#[derive(Debug, Clone, Serialize)]
pub struct PairStatistics {
    pub pair_id: String,
    pub token_a: String,
    pub token_b: String,
    pub correlation: f64,
    pub cointegrated: bool,
    /// ADF t-statistic of the residual spread
    pub test_statistic: f64,
    /// Mean-reversion half-life in samples; `None` when trending
    pub half_life: Option<f64>,
    pub hedge_ratio: f64,
    /// Combined quality score in [0, 1]
    pub confidence: f64,
    pub sample_size: usize,
    pub last_updated: DateTime<Utc>,
}

/// Rolling baseline of the log spread, consumed by the signal generator.
#[derive(Debug, Clone, Copy, Serialize)]
pub struct SpreadSnapshot {
    pub mean: f64,
    pub std_dev: f64,
    pub current: f64,
}

/// Full per-pair evaluation for one tick.
#[derive(Debug, Clone)]
pub struct PairEvaluation {
    pub stats: PairStatistics,
    pub spread: SpreadSnapshot,
}

/// Computes the statistical baseline for each configured pair.
pub struct CorrelationEngine {
    cfg: StatsConfig,
}

impl CorrelationEngine {
    pub fn new(cfg: StatsConfig) -> Self {
        Self { cfg }
    }

    /// Evaluate one pair from fresh price history.
    ///
    /// Errors are per-tick conditions, not faults: the pair is skipped and
    /// retried next tick once more data has accumulated.
    pub fn evaluate(
        &self,
        spec: &PairSpec,
        series_a: &PriceSeries,
        series_b: &PriceSeries,
        now: DateTime<Utc>,
    ) -> Result<PairEvaluation, StatsError> {
        let samples = aligned_overlap(series_a, series_b);
        let correlation = pearson(&samples, self.cfg.min_samples)?;

        if samples.iter().any(|&(a, b)| a <= 0.0 || b <= 0.0) {
            return Err(StatsError::DegenerateSeries("non-positive price"));
        }
        let logs: Vec<(f64, f64)> = samples.iter().map(|&(a, b)| (a.ln(), b.ln())).collect();

        let hedge_ratio = ols_hedge_ratio(&logs);
        let spread = log_spread(&logs, hedge_ratio);

        let n = spread.len() as f64;
        let mean = spread.iter().sum::<f64>() / n;
        let var = spread.iter().map(|s| (s - mean).powi(2)).sum::<f64>() / n;
        let std_dev = var.sqrt();
        if std_dev < 1e-12 {
            return Err(StatsError::DegenerateSeries("flat spread"));
        }

        let adf = adf_statistic(&spread)
            .ok_or(StatsError::DegenerateSeries("stationarity test degenerate"))?;
        let cointegrated = adf.p_value <= self.cfg.adf_p_threshold;

        let half_life = estimate_half_life(&spread);
        let confidence = self.confidence(correlation, cointegrated, samples.len(), half_life);

        let current = *spread.last().expect("non-empty spread");

        debug!(
            pair_id = %spec.id(),
            correlation,
            cointegrated,
            t_stat = adf.t_stat,
            half_life = ?half_life,
            confidence,
            samples = samples.len(),
            "Pair evaluated"
        );

        Ok(PairEvaluation {
            stats: PairStatistics {
                pair_id: spec.id(),
                token_a: spec.token_a.clone(),
                token_b: spec.token_b.clone(),
                correlation,
                cointegrated,
                test_statistic: adf.t_stat,
                half_life,
                hedge_ratio,
                confidence,
                sample_size: samples.len(),
                last_updated: now,
            },
            spread: SpreadSnapshot {
                mean,
                std_dev,
                current,
            },
        })
    }

    /// Monotone combination of the quality terms, weighted per config.
    ///
    /// Rewards higher |correlation|, a cointegration pass, a fuller sample
    /// window, and a shorter (but finite) half-life. A trending pair scores
    /// zero on the reversion term.
    fn confidence(
        &self,
        correlation: f64,
        cointegrated: bool,
        sample_size: usize,
        half_life: Option<f64>,
    ) -> f64 {
        let w = &self.cfg.weights;
        let total = w.correlation + w.cointegration + w.sample_size + w.half_life;
        if total <= 0.0 {
            return 0.0;
        }

        let corr_term = correlation.abs();
        let coint_term = if cointegrated { 1.0 } else { 0.0 };
        let sample_term = (sample_size as f64 / self.cfg.target_samples.max(1) as f64).min(1.0);
        let reversion_term = half_life
            .map(|hl| 1.0 / (1.0 + hl / self.cfg.target_half_life))
            .unwrap_or(0.0);

        let score = (w.correlation * corr_term
            + w.cointegration * coint_term
            + w.sample_size * sample_term
            + w.half_life * reversion_term)
            / total;
        score.clamp(0.0, 1.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::market::PricePoint;
    use chrono::TimeZone;
    use rust_decimal::prelude::FromPrimitive;
    use rust_decimal::Decimal;

    fn ts(secs: i64) -> DateTime<Utc> {
        Utc.timestamp_opt(1_700_000_000 + secs, 0).unwrap()
    }

    fn series_from(prices: &[f64]) -> PriceSeries {
        PriceSeries::from_points(
            prices.iter().enumerate().map(|(i, &p)| {
                PricePoint::new(ts(i as i64 * 30), Decimal::from_f64(p).unwrap())
            }),
            512,
        )
    }

    /// Token B random-walks (deterministic wobble), token A tracks it with a
    /// quickly reverting multiplicative spread.
    fn tracking_pair(n: usize) -> (PriceSeries, PriceSeries) {
        let mut resid: f64 = 0.05;
        let mut a = Vec::with_capacity(n);
        let mut b = Vec::with_capacity(n);
        for i in 0..n {
            let log_b = 3.0 + 0.05 * ((i as f64) * 0.37).sin();
            resid = 0.4 * resid + 0.01 * ((i as f64) * 1.17).sin();
            b.push(log_b.exp());
            a.push((1.2 * log_b + resid).exp());
        }
        (series_from(&a), series_from(&b))
    }

    fn engine() -> CorrelationEngine {
        CorrelationEngine::new(StatsConfig::default())
    }

    #[test]
    fn test_tracking_pair_is_tradable() {
        let (a, b) = tracking_pair(200);
        let eval = engine()
            .evaluate(&PairSpec::new("SOL", "RAY"), &a, &b, ts(0))
            .unwrap();

        assert!(eval.stats.correlation > 0.9);
        assert!(eval.stats.cointegrated, "reverting spread must pass ADF");
        assert!(eval.stats.half_life.is_some());
        assert!((eval.stats.hedge_ratio - 1.2).abs() < 0.2);
        assert!(eval.spread.std_dev > 0.0);
        assert_eq!(eval.stats.sample_size, 200);
    }

    #[test]
    fn test_short_history_is_insufficient() {
        let (a, b) = tracking_pair(10);
        let err = engine()
            .evaluate(&PairSpec::new("SOL", "RAY"), &a, &b, ts(0))
            .unwrap_err();
        assert!(matches!(err, StatsError::InsufficientData { .. }));
    }

    #[test]
    fn test_flat_prices_are_degenerate() {
        let a = series_from(&[100.0; 60]);
        let b = series_from(&[50.0; 60]);
        let err = engine()
            .evaluate(&PairSpec::new("SOL", "RAY"), &a, &b, ts(0))
            .unwrap_err();
        assert!(matches!(err, StatsError::DegenerateSeries(_)));
    }

    #[test]
    fn test_confidence_is_monotone_in_each_term() {
        let e = engine();
        let base = e.confidence(0.5, false, 60, Some(30.0));

        assert!(e.confidence(0.9, false, 60, Some(30.0)) > base);
        assert!(e.confidence(0.5, true, 60, Some(30.0)) > base);
        assert!(e.confidence(0.5, false, 120, Some(30.0)) > base);
        assert!(e.confidence(0.5, false, 60, Some(5.0)) > base);
        // Trending pair scores zero on the reversion term
        assert!(e.confidence(0.5, false, 60, None) < base);
    }

    #[test]
    fn test_confidence_bounds() {
        let e = engine();
        let top = e.confidence(1.0, true, 10_000, Some(0.1));
        let bottom = e.confidence(0.0, false, 0, None);
        assert!(top <= 1.0 && top > 0.9);
        assert!((0.0..=0.05).contains(&bottom));
    }

    #[test]
    fn test_negative_correlation_rewarded_by_magnitude() {
        let e = engine();
        assert_eq!(
            e.confidence(-0.8, true, 60, Some(10.0)),
            e.confidence(0.8, true, 60, Some(10.0))
        );
    }
}
