//! Cointegration testing for a token pair.
//!
//! Engle-Granger style: regress the log-price of leg A on leg B to get a
//! hedge ratio, then run an ADF-style AR(1) stationarity test on the
//! residual spread. The Dickey-Fuller critical values below assume a
//! constant term and are linearly interpolated by sample size; p-values are
//! bucketed between the tabulated significance levels.

/// Result of the stationarity test on the residual spread.
#[derive(Debug, Clone, Copy)]
pub struct AdfResult {
    /// t-statistic of the AR(1) slope. More negative = stronger reversion.
    pub t_stat: f64,
    /// Bucketed p-value from the interpolated critical-value table.
    pub p_value: f64,
}

/// OLS slope of `log_a` on `log_b` over aligned log-price pairs.
///
/// Clamped to a sane hedge-ratio range; a degenerate fit falls back to 1.0
/// (equal notional), which the downstream ADF test will then fail.
pub fn ols_hedge_ratio(log_pairs: &[(f64, f64)]) -> f64 {
    if log_pairs.len() < 2 {
        return 1.0;
    }
    let n = log_pairs.len() as f64;
    let (sum_a, sum_b) = log_pairs
        .iter()
        .fold((0.0, 0.0), |(sa, sb), (a, b)| (sa + a, sb + b));
    let mean_a = sum_a / n;
    let mean_b = sum_b / n;

    let mut cov = 0.0;
    let mut var_b = 0.0;
    for (a, b) in log_pairs {
        let da = a - mean_a;
        let db = b - mean_b;
        cov += da * db;
        var_b += db * db;
    }
    if var_b.abs() < 1e-9 {
        1.0
    } else {
        (cov / var_b).clamp(0.1, 10.0)
    }
}

/// Residual spread `log_a − β·log_b` for a fitted hedge ratio.
pub fn log_spread(log_pairs: &[(f64, f64)], hedge_ratio: f64) -> Vec<f64> {
    log_pairs
        .iter()
        .map(|(a, b)| a - hedge_ratio * b)
        .collect()
}

/// ADF-style AR(1) test on levels: `Δy(t) = φ·y(t−1) + ε`.
///
/// Returns `None` when the series is too short or has no variance in the
/// lagged regressor.
pub fn adf_statistic(series: &[f64]) -> Option<AdfResult> {
    if series.len() < 5 {
        return None;
    }

    let n = series.len() - 1;
    let mut lagged = Vec::with_capacity(n);
    let mut delta = Vec::with_capacity(n);
    for win in series.windows(2) {
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
    let phi = (num / den).clamp(-0.999, 0.999);

    // Residual variance and standard error of phi
    let mut rss = 0.0;
    for i in 0..n {
        let fit = phi * (lagged[i] - mean_x) + mean_d;
        let err = delta[i] - fit;
        rss += err * err;
    }
    let sigma2 = rss / n.saturating_sub(2).max(1) as f64;
    let se_phi = (sigma2 / den).sqrt();
    let t_stat = if se_phi < 1e-12 { 0.0 } else { phi / se_phi };

    Some(AdfResult {
        t_stat,
        p_value: df_p_value(t_stat, n).clamp(0.0, 1.0),
    })
}

/// Interpolated Dickey-Fuller critical values (with constant), approximate.
const DF_CRITS: &[(usize, f64, f64, f64)] = &[
    (25, -3.75, -3.00, -2.63),
    (50, -3.58, -2.93, -2.60),
    (100, -3.51, -2.89, -2.58),
    (250, -3.46, -2.88, -2.57),
    (500, -3.44, -2.87, -2.57),
];

fn df_p_value(t_stat: f64, n: usize) -> f64 {
    let (c1, c5, c10) = interpolate_crits(n, DF_CRITS);
    if t_stat < c1 {
        0.005
    } else if t_stat < c5 {
        0.025
    } else if t_stat < c10 {
        0.075
    } else {
        0.5
    }
}

fn interpolate_crits(n: usize, table: &[(usize, f64, f64, f64)]) -> (f64, f64, f64) {
    if n <= table[0].0 {
        return (table[0].1, table[0].2, table[0].3);
    }
    for w in table.windows(2) {
        let (n1, c1_1, c5_1, c10_1) = w[0];
        let (n2, c1_2, c5_2, c10_2) = w[1];
        if n >= n1 && n <= n2 {
            let t = (n - n1) as f64 / (n2 - n1) as f64;
            let lerp = |a: f64, b: f64| a + t * (b - a);
            return (lerp(c1_1, c1_2), lerp(c5_1, c5_2), lerp(c10_1, c10_2));
        }
    }
    let last = table.last().unwrap();
    (last.1, last.2, last.3)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cointegrated_pair(n: usize) -> Vec<(f64, f64)> {
        // log_a tracks 1.5 * log_b plus a strongly reverting residual
        let mut pairs = Vec::with_capacity(n);
        let mut resid = 0.1;
        for i in 0..n {
            let log_b = 4.0 + 0.001 * i as f64 + 0.01 * ((i as f64) * 0.7).sin();
            let shock = 0.02 * ((i as f64) * 1.3).sin();
            resid = 0.3 * resid + shock;
            pairs.push((1.5 * log_b + resid, log_b));
        }
        pairs
    }

    fn random_walk_pair(n: usize) -> Vec<(f64, f64)> {
        // Two independent drifting walks; residual inherits the drift
        let mut a = 4.0;
        let mut b = 4.0;
        let mut pairs = Vec::with_capacity(n);
        for i in 0..n {
            a += 0.01 + 0.002 * ((i as f64) * 0.9).sin();
            b += -0.005 + 0.002 * ((i as f64) * 1.1).cos();
            pairs.push((a, b));
        }
        pairs
    }

    #[test]
    fn test_hedge_ratio_recovers_slope() {
        let pairs = cointegrated_pair(200);
        let beta = ols_hedge_ratio(&pairs);
        assert!(
            (beta - 1.5).abs() < 0.2,
            "expected beta near 1.5, got {beta}"
        );
    }

    #[test]
    fn test_reverting_residual_passes_adf() {
        let pairs = cointegrated_pair(200);
        let beta = ols_hedge_ratio(&pairs);
        let spread = log_spread(&pairs, beta);
        let adf = adf_statistic(&spread).unwrap();
        assert!(adf.t_stat < -2.9, "t-stat {} not significant", adf.t_stat);
        assert!(adf.p_value <= 0.05);
    }

    #[test]
    fn test_drifting_residual_fails_adf() {
        let pairs = random_walk_pair(200);
        let beta = ols_hedge_ratio(&pairs);
        let spread = log_spread(&pairs, beta);
        let adf = adf_statistic(&spread).unwrap();
        assert!(adf.p_value > 0.05, "drifting spread must not pass");
    }

    #[test]
    fn test_short_series_returns_none() {
        assert!(adf_statistic(&[1.0, 2.0, 1.5]).is_none());
    }

    #[test]
    fn test_constant_series_returns_none() {
        let s = vec![3.0; 60];
        assert!(adf_statistic(&s).is_none());
    }

    #[test]
    fn test_critical_value_interpolation_is_monotone() {
        let (c1_small, ..) = interpolate_crits(25, DF_CRITS);
        let (c1_mid, ..) = interpolate_crits(75, DF_CRITS);
        let (c1_large, ..) = interpolate_crits(400, DF_CRITS);
        assert!(c1_small < c1_mid && c1_mid < c1_large);
    }
}
