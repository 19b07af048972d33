//! Small numeric helpers: quantiles, median, least squares.

use std::cmp::Ordering;

/// Arithmetic mean. Returns NaN for an empty slice.
pub(crate) fn mean(values: &[f64]) -> f64 {
    values.iter().sum::<f64>() / values.len() as f64
}

/// Quantile of already-sorted values with linear interpolation between order statistics.
///
/// `q` is clamped to `[0, 1]`. Panics on an empty slice.
pub(crate) fn quantile_sorted(sorted: &[f64], q: f64) -> f64 {
    assert!(!sorted.is_empty(), "quantile of empty slice");
    let q = q.clamp(0.0, 1.0);
    let pos = q * (sorted.len() - 1) as f64;
    let lo = pos.floor() as usize;
    let hi = pos.ceil() as usize;
    if lo == hi {
        return sorted[lo];
    }
    let frac = pos - lo as f64;
    sorted[lo] + (sorted[hi] - sorted[lo]) * frac
}

/// Median; averages the two middle values for even lengths. NaN when empty.
pub(crate) fn median(values: &[f64]) -> f64 {
    if values.is_empty() {
        return f64::NAN;
    }
    let mut sorted = values.to_vec();
    sorted.sort_by(|a, b| a.partial_cmp(b).unwrap_or(Ordering::Equal));
    quantile_sorted(&sorted, 0.5)
}

/// Result of an ordinary least squares fit `y = slope * x + intercept`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub(crate) struct LinearFit {
    pub slope: f64,
    pub intercept: f64,
    /// Pearson correlation, clamped to `[-1, 1]`.
    pub r: f64,
    /// Standard error of the slope; NaN with fewer than three points.
    pub slope_stderr: f64,
}

/// Ordinary least squares over paired samples.
///
/// Returns `None` when the inputs differ in length, hold fewer than two
/// points, or `x` has zero variance (slope undefined).
pub(crate) fn linear_regression(x: &[f64], y: &[f64]) -> Option<LinearFit> {
    if x.len() != y.len() || x.len() < 2 {
        return None;
    }

    let n = x.len();
    let mean_x = mean(x);
    let mean_y = mean(y);

    let mut sxx = 0.0;
    let mut syy = 0.0;
    let mut sxy = 0.0;
    for (xi, yi) in x.iter().zip(y) {
        let dx = xi - mean_x;
        let dy = yi - mean_y;
        sxx += dx * dx;
        syy += dy * dy;
        sxy += dx * dy;
    }

    if sxx <= 0.0 || !sxx.is_finite() {
        return None;
    }

    let slope = sxy / sxx;
    let intercept = mean_y - slope * mean_x;
    let r = if syy > 0.0 {
        (sxy / (sxx.sqrt() * syy.sqrt())).clamp(-1.0, 1.0)
    } else {
        0.0
    };

    let slope_stderr = if n > 2 {
        (((1.0 - r * r) * syy / sxx) / (n - 2) as f64).max(0.0).sqrt()
    } else {
        f64::NAN
    };

    Some(LinearFit {
        slope,
        intercept,
        r,
        slope_stderr,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn quantile_interpolates() {
        let sorted = [1.0, 2.0, 3.0, 4.0];
        assert_eq!(quantile_sorted(&sorted, 0.0), 1.0);
        assert_eq!(quantile_sorted(&sorted, 1.0), 4.0);
        assert!((quantile_sorted(&sorted, 0.5) - 2.5).abs() < 1e-12);
        assert!((quantile_sorted(&sorted, 0.25) - 1.75).abs() < 1e-12);
    }

    #[test]
    fn median_odd_and_even() {
        assert_eq!(median(&[3.0, 1.0, 2.0]), 2.0);
        assert_eq!(median(&[4.0, 1.0, 3.0, 2.0]), 2.5);
        assert!(median(&[]).is_nan());
    }

    #[test]
    fn regression_recovers_exact_line() {
        let x = [1.0, 2.0, 3.0, 4.0, 5.0];
        let y: Vec<f64> = x.iter().map(|v| 0.5 * v + 1.0).collect();
        let fit = linear_regression(&x, &y).unwrap();
        assert!((fit.slope - 0.5).abs() < 1e-12);
        assert!((fit.intercept - 1.0).abs() < 1e-12);
        assert!((fit.r - 1.0).abs() < 1e-12);
        assert!(fit.slope_stderr.abs() < 1e-9);
    }

    #[test]
    fn regression_negative_correlation() {
        let x = [1.0, 2.0, 3.0];
        let y = [3.0, 2.0, 1.0];
        let fit = linear_regression(&x, &y).unwrap();
        assert!((fit.slope + 1.0).abs() < 1e-12);
        assert!((fit.r + 1.0).abs() < 1e-12);
    }

    #[test]
    fn regression_flat_y_has_zero_r() {
        let fit = linear_regression(&[1.0, 2.0, 3.0], &[5.0, 5.0, 5.0]).unwrap();
        assert_eq!(fit.slope, 0.0);
        assert_eq!(fit.r, 0.0);
    }

    #[test]
    fn regression_rejects_constant_x() {
        assert!(linear_regression(&[2.0, 2.0, 2.0], &[1.0, 2.0, 3.0]).is_none());
    }

    #[test]
    fn regression_rejects_mismatched_lengths() {
        assert!(linear_regression(&[1.0, 2.0], &[1.0]).is_none());
        assert!(linear_regression(&[1.0], &[1.0]).is_none());
    }
}
