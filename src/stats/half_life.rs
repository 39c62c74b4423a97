//! Mean-reversion half-life from an AR(1) fit of the spread.

/// Fit `Δs(t) = φ·s(t−1) + c` by least squares and convert the slope into a
/// half-life in samples: `−ln2 / ln(1+φ)`.
///
/// Returns `None` when the spread is trending rather than reverting
/// (`φ ≥ 0`) or the fit is degenerate; the pair is non-tradable either way.
pub fn estimate_half_life(spread: &[f64]) -> Option<f64> {
    if spread.len() < 3 {
        return None;
    }

    let n = spread.len() - 1;
    let mut lagged = Vec::with_capacity(n);
    let mut delta = Vec::with_capacity(n);
    for win in spread.windows(2) {
        lagged.push(win[0]);
        delta.push(win[1] - win[0]);
    }

    let mean_x = lagged.iter().sum::<f64>() / n as f64;
    let mean_d = delta.iter().sum::<f64>() / n as f64;
    let mut num = 0.0;
    let mut den = 0.0;
    for i in 0..n {
        let dx = lagged[i] - mean_x;
        num += dx * (delta[i] - mean_d);
        den += dx * dx;
    }
    if den.abs() < 1e-12 {
        return None;
    }

    let phi = num / den;
    let ar_coef = 1.0 + phi;
    if phi >= 0.0 || ar_coef <= 0.0 {
        return None;
    }

    let half_life = -(2.0_f64.ln()) / ar_coef.ln();
    half_life.is_finite().then_some(half_life)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::{Rng, SeedableRng};

    /// Seeded AR(1) series s(t) = rho * s(t-1) + noise.
    fn reverting_series(rho: f64, n: usize, seed: u64) -> Vec<f64> {
        let mut rng = StdRng::seed_from_u64(seed);
        let mut s = vec![10.0];
        for i in 1..n {
            let shock: f64 = rng.gen_range(-0.5..0.5);
            s.push(rho * s[i - 1] + shock);
        }
        s
    }

    #[test]
    fn test_reverting_series_has_finite_half_life() {
        let s = reverting_series(0.8, 500, 42);
        let hl = estimate_half_life(&s).expect("AR(1) with rho<1 must revert");
        // Theoretical half-life for rho=0.8 is ln(2)/-ln(0.8) ~ 3.1 samples
        assert!(hl > 1.0 && hl < 10.0, "half-life {hl} out of expected range");
    }

    #[test]
    fn test_trending_series_is_non_tradable() {
        let s: Vec<f64> = (0..100).map(|i| (i as f64) * (i as f64) * 0.01).collect();
        assert_eq!(estimate_half_life(&s), None);
    }

    #[test]
    fn test_constant_series_is_degenerate() {
        let s = vec![5.0; 50];
        assert_eq!(estimate_half_life(&s), None);
    }

    #[test]
    fn test_too_short_series() {
        assert_eq!(estimate_half_life(&[1.0, 2.0]), None);
    }
}
