//! Signal generation from the spread baseline.
//!
//! Converts a pair's current spread and statistical baseline into a z-score
//! and classifies it. Signals are transient: one per pair per tick, never
//! persisted beyond the tick that produced them.

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::fmt;

use crate::config::RiskLimits;
use crate::stats::PairEvaluation;

/// Which side of the spread a position takes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum SpreadDirection {
    /// Buy A, sell B — spread below its mean.
    LongSpread,
    /// Sell A, buy B — spread above its mean.
    ShortSpread,
}

impl fmt::Display for SpreadDirection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SpreadDirection::LongSpread => write!(f, "long_spread"),
            SpreadDirection::ShortSpread => write!(f, "short_spread"),
        }
    }
}

/// Signal classification for one pair on one tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum SignalKind {
    Entry,
    Hold,
    Exit,
    Stop,
}

/// A classified signal for one pair.
#[derive(Debug, Clone, Serialize)]
pub struct Signal {
    pub pair_id: String,
    pub z_score: f64,
    pub direction: SpreadDirection,
    pub kind: SignalKind,
    /// Sizing/ranking weight only; never bypasses risk checks.
    pub expected_return: f64,
    pub confidence: f64,
    pub timestamp: DateTime<Utc>,
}

impl Signal {
    /// Entry-competition ranking weight.
    pub fn ranking_weight(&self) -> f64 {
        self.expected_return * self.confidence
    }
}

/// Stateless classifier from spread baseline to signal.
pub struct SignalGenerator {
    limits: RiskLimits,
    /// Half-life (in samples) at which the reversion-speed factor is 0.5.
    target_half_life: f64,
}

impl SignalGenerator {
    pub fn new(limits: RiskLimits, target_half_life: f64) -> Self {
        Self {
            limits,
            target_half_life: target_half_life.max(f64::EPSILON),
        }
    }

    /// Produce the signal for one evaluated pair.
    pub fn generate(
        &self,
        eval: &PairEvaluation,
        has_open_position: bool,
        now: DateTime<Utc>,
    ) -> Signal {
        let z = (eval.spread.current - eval.spread.mean) / eval.spread.std_dev;
        let tradable = eval.stats.half_life.is_some();
        let kind = self.classify(
            z,
            eval.stats.correlation,
            eval.stats.confidence,
            tradable,
            has_open_position,
        );

        Signal {
            pair_id: eval.stats.pair_id.clone(),
            z_score: z,
            direction: direction_of(z),
            kind,
            expected_return: self.expected_return(z.abs(), eval.stats.half_life),
            confidence: eval.stats.confidence,
            timestamp: now,
        }
    }

    /// Classification rules, in order:
    /// - with an open position: stop at `|z| >= stop_z` (priority over exit),
    ///   exit at `|z| <= exit_z`, hold otherwise
    /// - without: entry at `|z| >= entry_z` when correlation, confidence and
    ///   mean-reversion (finite half-life) all qualify; hold otherwise
    pub fn classify(
        &self,
        z: f64,
        correlation: f64,
        confidence: f64,
        tradable: bool,
        has_open_position: bool,
    ) -> SignalKind {
        let az = z.abs();
        if has_open_position {
            if az >= self.limits.stop_z {
                SignalKind::Stop
            } else if az <= self.limits.exit_z {
                SignalKind::Exit
            } else {
                SignalKind::Hold
            }
        } else if tradable
            && az >= self.limits.entry_z
            && correlation >= self.limits.min_correlation
            && confidence >= self.limits.min_confidence
        {
            SignalKind::Entry
        } else {
            SignalKind::Hold
        }
    }

    /// Larger deviation beyond the exit band and faster expected reversion
    /// both increase expected return. A trending pair scores zero.
    fn expected_return(&self, z_abs: f64, half_life: Option<f64>) -> f64 {
        let stretch = (z_abs - self.limits.exit_z).max(0.0);
        let speed = half_life
            .map(|hl| 1.0 / (1.0 + hl / self.target_half_life))
            .unwrap_or(0.0);
        stretch * speed
    }
}

/// `z > 0` means token A is overvalued relative to B, so the spread is
/// shorted; `z <= 0` goes long the spread.
fn direction_of(z: f64) -> SpreadDirection {
    if z > 0.0 {
        SpreadDirection::ShortSpread
    } else {
        SpreadDirection::LongSpread
    }
}
