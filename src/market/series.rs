//! Per-token price history.

use chrono::{DateTime, Duration, Utc};
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;

/// A single observed price for a token.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PricePoint {
    pub timestamp: DateTime<Utc>,
    pub price: Decimal,
}

impl PricePoint {
    pub fn new(timestamp: DateTime<Utc>, price: Decimal) -> Self {
        Self { timestamp, price }
    }
}

/// Ordered, append-only price history for one token.
///
/// Points are deduplicated by timestamp and the buffer is bounded to the
/// configured lookback window; pushing past the bound evicts the oldest
/// point. Out-of-order points are dropped rather than re-sorted.
#[derive(Debug, Clone)]
pub struct PriceSeries {
    points: VecDeque<PricePoint>,
    max_points: usize,
}

impl PriceSeries {
    pub fn new(max_points: usize) -> Self {
        Self {
            points: VecDeque::with_capacity(max_points.min(4096)),
            max_points: max_points.max(1),
        }
    }

    /// Build a series from an already-ordered sequence, applying the same
    /// dedup/bound rules as incremental pushes.
    pub fn from_points(points: impl IntoIterator<Item = PricePoint>, max_points: usize) -> Self {
        let mut series = Self::new(max_points);
        for p in points {
            series.push(p);
        }
        series
    }

    /// Append a point. Returns false if it was dropped as a duplicate or
    /// out-of-order timestamp.
    pub fn push(&mut self, point: PricePoint) -> bool {
        if let Some(last) = self.points.back() {
            if point.timestamp <= last.timestamp {
                return false;
            }
        }
        if self.points.len() == self.max_points {
            self.points.pop_front();
        }
        self.points.push_back(point);
        true
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    pub fn latest(&self) -> Option<&PricePoint> {
        self.points.back()
    }

    /// True when the newest point is older than `max_age` relative to `now`.
    /// An empty series is always stale.
    pub fn is_stale(&self, now: DateTime<Utc>, max_age: Duration) -> bool {
        match self.latest() {
            Some(p) => now - p.timestamp > max_age,
            None => true,
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = &PricePoint> {
        self.points.iter()
    }
}

/// Join two series on exactly matching timestamps, returning price pairs as
/// `f64` for the statistical layer. Both inputs are ordered, so this is a
/// single merge pass.
pub fn aligned_overlap(a: &PriceSeries, b: &PriceSeries) -> Vec<(f64, f64)> {
    let mut out = Vec::with_capacity(a.len().min(b.len()));
    let mut ia = a.iter().peekable();
    let mut ib = b.iter().peekable();

    while let (Some(pa), Some(pb)) = (ia.peek(), ib.peek()) {
        match pa.timestamp.cmp(&pb.timestamp) {
            std::cmp::Ordering::Less => {
                ia.next();
            }
            std::cmp::Ordering::Greater => {
                ib.next();
            }
            std::cmp::Ordering::Equal => {
                if let (Some(xa), Some(xb)) = (pa.price.to_f64(), pb.price.to_f64()) {
                    out.push((xa, xb));
                }
                ia.next();
                ib.next();
            }
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use rust_decimal_macros::dec;

    fn ts(secs: i64) -> DateTime<Utc> {
        Utc.timestamp_opt(1_700_000_000 + secs, 0).unwrap()
    }

    fn series(prices: &[(i64, Decimal)], cap: usize) -> PriceSeries {
        PriceSeries::from_points(
            prices.iter().map(|&(t, p)| PricePoint::new(ts(t), p)),
            cap,
        )
    }

    #[test]
    fn test_push_rejects_duplicate_timestamp() {
        let mut s = PriceSeries::new(10);
        assert!(s.push(PricePoint::new(ts(0), dec!(100))));
        assert!(!s.push(PricePoint::new(ts(0), dec!(101))));
        assert_eq!(s.len(), 1);
        assert_eq!(s.latest().unwrap().price, dec!(100));
    }

    #[test]
    fn test_push_rejects_out_of_order() {
        let mut s = PriceSeries::new(10);
        s.push(PricePoint::new(ts(10), dec!(100)));
        assert!(!s.push(PricePoint::new(ts(5), dec!(99))));
        assert_eq!(s.len(), 1);
    }

    #[test]
    fn test_bounded_to_lookback() {
        let mut s = PriceSeries::new(3);
        for i in 0..5 {
            s.push(PricePoint::new(ts(i), dec!(100) + Decimal::from(i)));
        }
        assert_eq!(s.len(), 3);
        // Oldest two evicted
        assert_eq!(s.iter().next().unwrap().price, dec!(102));
    }

    #[test]
    fn test_staleness() {
        let s = series(&[(0, dec!(100))], 10);
        assert!(!s.is_stale(ts(30), Duration::seconds(60)));
        assert!(s.is_stale(ts(120), Duration::seconds(60)));
        assert!(PriceSeries::new(10).is_stale(ts(0), Duration::seconds(60)));
    }

    #[test]
    fn test_aligned_overlap_skips_unmatched() {
        let a = series(&[(0, dec!(1)), (10, dec!(2)), (20, dec!(3))], 10);
        let b = series(&[(10, dec!(5)), (20, dec!(6)), (30, dec!(7))], 10);
        let joined = aligned_overlap(&a, &b);
        assert_eq!(joined, vec![(2.0, 5.0), (3.0, 6.0)]);
    }
}
