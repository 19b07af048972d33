//! Impact-law estimator.
//!
//! Tests the square-root law of market impact: intraday volatility
//! (`high - low`) should scale as `volume^alpha` with `alpha ≈ 0.5`.
//!
//! Pipeline, in a single pass over the input:
//! 1. Drop candles with no price movement (`high - low <= 0`)
//! 2. Take logs: `log_q = ln(volume)`, `log_i = ln(volatility)`
//! 3. Partition by volume quantile (equal-width fallback when quantiles collapse)
//! 4. Average `log_q` / `log_i` per bin
//! 5. Keep the high-volume half ("smart money": bin `log_q` above the median)
//! 6. OLS of `log_i` on `log_q` over that half
//!
//! The estimator is pure: no I/O, no shared state, safe to call from many
//! threads on independent inputs.

mod binning;
mod stats;

pub use binning::BinningMethod;

use crate::domain::ImpactSample;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Default number of volume bins.
pub const DEFAULT_BIN_COUNT: usize = 40;
/// Minimum number of moving candles needed for a stable partition and fit.
pub const MIN_OBSERVATIONS: usize = 100;
/// Minimum number of smart-money bins for a meaningful regression.
pub const MIN_SMART_MONEY: usize = 3;

/// Errors from the estimator.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum EstimateError {
    /// Not enough usable data. Expected for illiquid or short-history tickers.
    #[error("insufficient data: {0}")]
    InsufficientData(InsufficientReason),

    /// A value that must be logged is not strictly positive and finite.
    /// Signals malformed upstream data.
    #[error("domain error at row {row}: {field} = {value} cannot be log-transformed")]
    Domain {
        row: usize,
        field: &'static str,
        value: f64,
    },

    #[error("bin count must be positive")]
    InvalidBinCount,
}

impl EstimateError {
    /// True for the recoverable "skip this ticker" case.
    pub fn is_insufficient(&self) -> bool {
        matches!(self, EstimateError::InsufficientData(_))
    }
}

/// Why the estimator declined to fit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum InsufficientReason {
    /// Fewer moving candles than the configured minimum.
    TooFewObservations { found: usize, required: usize },
    /// Fewer bins above the median than the configured minimum.
    TooFewSmartMoneyBins { found: usize, required: usize },
    /// Smart-money bins share one `log_q`, so the slope is undefined.
    DegenerateVolume,
}

impl std::fmt::Display for InsufficientReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            InsufficientReason::TooFewObservations { found, required } => write!(
                f,
                "{found} candles with non-zero range, need at least {required}"
            ),
            InsufficientReason::TooFewSmartMoneyBins { found, required } => write!(
                f,
                "{found} high-volume bins above the median, need at least {required}"
            ),
            InsufficientReason::DegenerateVolume => {
                write!(f, "high-volume bins have identical mean log volume")
            }
        }
    }
}

/// Estimator parameters.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct EstimatorConfig {
    /// Requested number of volume bins (a ceiling, not a guarantee).
    pub bin_count: usize,
    pub min_observations: usize,
    pub min_smart_money: usize,
}

impl Default for EstimatorConfig {
    fn default() -> Self {
        Self {
            bin_count: DEFAULT_BIN_COUNT,
            min_observations: MIN_OBSERVATIONS,
            min_smart_money: MIN_SMART_MONEY,
        }
    }
}

impl EstimatorConfig {
    pub fn with_bin_count(bin_count: usize) -> Self {
        Self {
            bin_count,
            ..Self::default()
        }
    }
}

/// A retained observation in log space.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LogPoint {
    /// Row position in the estimator input.
    pub index: usize,
    pub volume: f64,
    pub volatility: f64,
    pub log_q: f64,
    pub log_i: f64,
}

/// One volume bin and its representative point.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Bin {
    /// Position of the interval in the partition (ascending volume).
    pub index: usize,
    /// Lower volume edge (exclusive, except for the first interval).
    pub lower: f64,
    /// Upper volume edge (inclusive).
    pub upper: f64,
    pub count: usize,
    /// Mean `ln(volume)` over members.
    pub log_q: f64,
    /// Mean `ln(high - low)` over members.
    pub log_i: f64,
}

/// Result of a successful impact-law fit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FitResult {
    /// Fitted exponent (slope in log-log space).
    pub alpha: f64,
    pub intercept: f64,
    /// Squared Pearson correlation over the smart-money bins.
    pub r2: f64,
    pub slope_stderr: f64,
    /// Median of bin `log_q`; smart money lies strictly above it.
    pub median_log_q: f64,
    pub binning: BinningMethod,
    /// Requested bin count.
    pub requested_bins: usize,
    /// All retained observations, in input order.
    pub observations: Vec<LogPoint>,
    /// Non-empty bins, in ascending volume order.
    pub bins: Vec<Bin>,
    /// Bins used for the regression.
    pub smart_money: Vec<Bin>,
}

impl FitResult {
    /// Fitted `ln(high - low)` at a given `ln(volume)`.
    pub fn fitted(&self, log_q: f64) -> f64 {
        self.alpha * log_q + self.intercept
    }

    /// End points of the fitted line over the smart-money `log_q` range.
    pub fn fit_line(&self) -> ((f64, f64), (f64, f64)) {
        let lo = self
            .smart_money
            .iter()
            .map(|b| b.log_q)
            .fold(f64::INFINITY, f64::min);
        let hi = self
            .smart_money
            .iter()
            .map(|b| b.log_q)
            .fold(f64::NEG_INFINITY, f64::max);
        ((lo, self.fitted(lo)), (hi, self.fitted(hi)))
    }
}

/// Fit the impact law with the default thresholds and `bin_count` bins.
pub fn estimate<S: ImpactSample>(
    samples: &[S],
    bin_count: usize,
) -> Result<FitResult, EstimateError> {
    estimate_with(samples, &EstimatorConfig::with_bin_count(bin_count))
}

/// Fit the impact law with explicit parameters.
pub fn estimate_with<S: ImpactSample>(
    samples: &[S],
    config: &EstimatorConfig,
) -> Result<FitResult, EstimateError> {
    if config.bin_count == 0 {
        return Err(EstimateError::InvalidBinCount);
    }

    // 1. Keep candles that moved. NaN ranges fail the comparison and drop out.
    let moving: Vec<(usize, f64, f64)> = samples
        .iter()
        .enumerate()
        .filter_map(|(i, s)| {
            let volatility = s.volatility();
            (volatility > 0.0).then(|| (i, s.volume(), volatility))
        })
        .collect();

    // An empty partition is undefined, so at least one candle is always required.
    let min_observations = config.min_observations.max(1);
    if moving.len() < min_observations {
        return Err(EstimateError::InsufficientData(
            InsufficientReason::TooFewObservations {
                found: moving.len(),
                required: min_observations,
            },
        ));
    }

    // 2. Log transform.
    let observations = moving
        .into_iter()
        .map(|(index, volume, volatility)| {
            let log_q = checked_ln(index, "volume", volume)?;
            let log_i = checked_ln(index, "volatility", volatility)?;
            Ok(LogPoint {
                index,
                volume,
                volatility,
                log_q,
                log_i,
            })
        })
        .collect::<Result<Vec<_>, EstimateError>>()?;

    // 3. Partition by volume.
    let volumes: Vec<f64> = observations.iter().map(|p| p.volume).collect();
    let partition = binning::partition(&volumes, config.bin_count);

    // 4. Representative point per non-empty bin.
    let intervals = partition.interval_count();
    let mut sums = vec![(0usize, 0.0f64, 0.0f64); intervals];
    for (point, &bin) in observations.iter().zip(&partition.assignments) {
        let slot = &mut sums[bin];
        slot.0 += 1;
        slot.1 += point.log_q;
        slot.2 += point.log_i;
    }

    let bins: Vec<Bin> = sums
        .iter()
        .enumerate()
        .filter(|(_, (count, _, _))| *count > 0)
        .map(|(index, &(count, sum_q, sum_i))| Bin {
            index,
            lower: partition.edges[index],
            upper: partition.edges[index + 1],
            count,
            log_q: sum_q / count as f64,
            log_i: sum_i / count as f64,
        })
        .collect();

    // 5. Smart money: bins strictly above the median log volume.
    let bin_log_q: Vec<f64> = bins.iter().map(|b| b.log_q).collect();
    let median_log_q = stats::median(&bin_log_q);
    let smart_money: Vec<Bin> = bins
        .iter()
        .filter(|b| b.log_q > median_log_q)
        .copied()
        .collect();

    // A line needs two points.
    let min_smart_money = config.min_smart_money.max(2);
    if smart_money.len() < min_smart_money {
        return Err(EstimateError::InsufficientData(
            InsufficientReason::TooFewSmartMoneyBins {
                found: smart_money.len(),
                required: min_smart_money,
            },
        ));
    }

    // 6. OLS in log-log space.
    let x: Vec<f64> = smart_money.iter().map(|b| b.log_q).collect();
    let y: Vec<f64> = smart_money.iter().map(|b| b.log_i).collect();
    let fit = stats::linear_regression(&x, &y).ok_or(EstimateError::InsufficientData(
        InsufficientReason::DegenerateVolume,
    ))?;

    Ok(FitResult {
        alpha: fit.slope,
        intercept: fit.intercept,
        r2: fit.r * fit.r,
        slope_stderr: fit.slope_stderr,
        median_log_q,
        binning: partition.method,
        requested_bins: config.bin_count,
        observations,
        bins,
        smart_money,
    })
}

fn checked_ln(row: usize, field: &'static str, value: f64) -> Result<f64, EstimateError> {
    let ln = value.ln();
    if value > 0.0 && ln.is_finite() {
        Ok(ln)
    } else {
        Err(EstimateError::Domain { row, field, value })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::Observation;

    /// Exact power law `volatility = c * volume^exponent` over spread-out volumes.
    fn power_law(n: usize, exponent: f64) -> Vec<Observation> {
        (0..n)
            .map(|i| {
                let volume = 10.0 + (i as f64) * 37.0;
                let range = 0.01 * volume.powf(exponent);
                Observation::new(100.0 + range, 100.0, volume)
            })
            .collect()
    }

    #[test]
    fn recovers_exact_exponent() {
        let fit = estimate(&power_law(400, 0.5), 40).unwrap();
        assert!((fit.alpha - 0.5).abs() < 1e-6, "alpha = {}", fit.alpha);
        assert!(fit.r2 > 0.999);
        assert_eq!(fit.binning, BinningMethod::Quantile);
        assert_eq!(fit.bins.len(), 40);
        assert_eq!(fit.observations.len(), 400);
    }

    #[test]
    fn zero_bin_count_is_rejected() {
        assert_eq!(
            estimate(&power_law(200, 0.5), 0).unwrap_err(),
            EstimateError::InvalidBinCount
        );
    }

    #[test]
    fn flat_candles_are_discarded() {
        let mut obs = power_law(150, 0.5);
        for o in obs.iter_mut().take(60) {
            o.low = o.high;
        }
        let err = estimate(&obs, 40).unwrap_err();
        assert_eq!(
            err,
            EstimateError::InsufficientData(InsufficientReason::TooFewObservations {
                found: 90,
                required: 100,
            })
        );
    }

    #[test]
    fn zero_volume_with_movement_is_domain_error() {
        let mut obs = power_law(150, 0.5);
        obs[7].volume = 0.0;
        match estimate(&obs, 40) {
            Err(EstimateError::Domain { row, field, .. }) => {
                assert_eq!(row, 7);
                assert_eq!(field, "volume");
            }
            other => panic!("expected domain error, got {other:?}"),
        }
    }

    #[test]
    fn nan_range_is_filtered_not_domain_error() {
        let mut obs = power_law(150, 0.5);
        obs[3].high = f64::NAN;
        let fit = estimate(&obs, 40).unwrap();
        assert_eq!(fit.observations.len(), 149);
        assert!(fit.observations.iter().all(|p| p.index != 3));
    }

    #[test]
    fn fit_line_spans_smart_money() {
        let fit = estimate(&power_law(400, 0.5), 20).unwrap();
        let ((x0, y0), (x1, y1)) = fit.fit_line();
        assert!(x0 < x1);
        assert!((y0 - fit.fitted(x0)).abs() < 1e-12);
        assert!((y1 - fit.fitted(x1)).abs() < 1e-12);
        assert!(fit.smart_money.iter().all(|b| b.log_q >= x0 && b.log_q <= x1));
    }

    #[test]
    fn insufficient_is_recoverable() {
        let err = estimate::<Observation>(&[], 40).unwrap_err();
        assert!(err.is_insufficient());
        let domain = EstimateError::Domain {
            row: 0,
            field: "volume",
            value: 0.0,
        };
        assert!(!domain.is_insufficient());
    }

    #[test]
    fn empty_input_with_zero_minimum_is_insufficient() {
        let config = EstimatorConfig {
            bin_count: 40,
            min_observations: 0,
            min_smart_money: 3,
        };
        assert_eq!(
            estimate_with(&Vec::<Observation>::new(), &config),
            Err(EstimateError::InsufficientData(
                InsufficientReason::TooFewObservations {
                    found: 0,
                    required: 1
                }
            ))
        );
    }

    #[test]
    fn single_smart_money_bin_is_too_few() {
        // Three bins: only the top one lies above the median.
        let config = EstimatorConfig {
            bin_count: 3,
            min_observations: MIN_OBSERVATIONS,
            min_smart_money: 1,
        };
        assert_eq!(
            estimate_with(&power_law(300, 0.5), &config),
            Err(EstimateError::InsufficientData(
                InsufficientReason::TooFewSmartMoneyBins {
                    found: 1,
                    required: 2
                }
            ))
        );
    }
}
