//! Rolling Pearson correlation over an aligned price overlap.

use crate::error::StatsError;

/// Pearson correlation of the aligned sample pairs.
///
/// Returns [`StatsError::InsufficientData`] below `min_samples` so a short
/// series is never reported as a (weak) numeric correlation, and
/// [`StatsError::DegenerateSeries`] when either side has no variance.
pub fn pearson(samples: &[(f64, f64)], min_samples: usize) -> Result<f64, StatsError> {
    if samples.len() < min_samples {
        return Err(StatsError::InsufficientData {
            required: min_samples,
            actual: samples.len(),
        });
    }

    let n = samples.len() as f64;
    let (sum_x, sum_y) = samples
        .iter()
        .fold((0.0, 0.0), |(sx, sy), (x, y)| (sx + x, sy + y));
    let mean_x = sum_x / n;
    let mean_y = sum_y / n;

    let mut cov = 0.0;
    let mut var_x = 0.0;
    let mut var_y = 0.0;
    for (x, y) in samples {
        let dx = x - mean_x;
        let dy = y - mean_y;
        cov += dx * dy;
        var_x += dx * dx;
        var_y += dy * dy;
    }

    if var_x < f64::EPSILON || var_y < f64::EPSILON {
        return Err(StatsError::DegenerateSeries("zero variance"));
    }

    let r = cov / (var_x.sqrt() * var_y.sqrt());
    if !r.is_finite() {
        return Err(StatsError::DegenerateSeries("non-finite correlation"));
    }
    Ok(r.clamp(-1.0, 1.0))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_perfect_positive_correlation() {
        let samples: Vec<(f64, f64)> = (0..40).map(|i| (i as f64, 2.0 * i as f64 + 5.0)).collect();
        let r = pearson(&samples, 30).unwrap();
        assert!((r - 1.0).abs() < 1e-9);
    }

    #[test]
    fn test_perfect_negative_correlation() {
        let samples: Vec<(f64, f64)> = (0..40).map(|i| (i as f64, -3.0 * i as f64)).collect();
        let r = pearson(&samples, 30).unwrap();
        assert!((r + 1.0).abs() < 1e-9);
    }

    #[test]
    fn test_insufficient_data_is_explicit() {
        let samples: Vec<(f64, f64)> = (0..10).map(|i| (i as f64, i as f64)).collect();
        let err = pearson(&samples, 30).unwrap_err();
        assert_eq!(
            err,
            StatsError::InsufficientData {
                required: 30,
                actual: 10
            },
            "short series must be distinguishable from a weak correlation"
        );
    }

    #[test]
    fn test_zero_variance_is_degenerate() {
        let samples: Vec<(f64, f64)> = (0..40).map(|i| (7.0, i as f64)).collect();
        assert!(matches!(
            pearson(&samples, 30),
            Err(StatsError::DegenerateSeries(_))
        ));
    }
}
