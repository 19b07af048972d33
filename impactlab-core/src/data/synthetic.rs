//! Synthetic candles that obey a chosen impact law.
//!
//! Volumes are drawn uniformly from a positive range and each candle's range is
//! set to `scale * volume^exponent * exp(noise)`, noise uniform in
//! `[-noise, noise]`. Seeds derive from the ticker so the same ticker always
//! produces the same series. Developer-only: results on synthetic data are
//! tagged as such.

use crate::domain::Candle;
use chrono::{DateTime, Duration, TimeZone, Utc};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

/// Parameters for synthetic generation.
#[derive(Debug, Clone, PartialEq)]
pub struct SyntheticSpec {
    pub count: usize,
    /// Impact exponent baked into the data.
    pub exponent: f64,
    /// Half-width of the uniform log-noise.
    pub noise: f64,
    /// Range multiplier: `high - low = scale * volume^exponent * exp(noise)`.
    pub scale: f64,
    pub min_volume: u64,
    pub max_volume: u64,
    pub start: DateTime<Utc>,
    /// Explicit seed; `None` derives one from the ticker.
    pub seed: Option<u64>,
}

impl Default for SyntheticSpec {
    fn default() -> Self {
        Self {
            count: 5_000,
            exponent: 0.5,
            noise: 0.05,
            scale: 0.01,
            min_volume: 1,
            max_volume: 50_000,
            start: Utc
                .with_ymd_and_hms(2024, 12, 2, 7, 0, 0)
                .single()
                .unwrap_or_else(Utc::now),
            seed: None,
        }
    }
}

/// Generate candles for `ticker` following `spec`.
pub fn synthetic_candles(ticker: &str, spec: &SyntheticSpec) -> Vec<Candle> {
    let seed = spec.seed.unwrap_or_else(|| ticker_seed(ticker));
    let mut rng = StdRng::seed_from_u64(seed);

    let lo = spec.min_volume.max(1);
    let hi = spec.max_volume.max(lo);
    let mut price = 100.0_f64;

    (0..spec.count)
        .map(|i| {
            let volume = rng.gen_range(lo..=hi);
            let noise = if spec.noise > 0.0 {
                rng.gen_range(-spec.noise..=spec.noise)
            } else {
                0.0
            };
            let range = spec.scale * (volume as f64).powf(spec.exponent) * noise.exp();

            let low = price;
            let high = low + range;
            let (open, close) = if rng.gen_bool(0.5) {
                (low, high)
            } else {
                (high, low)
            };
            // Random walk, kept well above zero.
            price = (close + rng.gen_range(-0.5 * range..=0.5 * range)).max(1.0);

            Candle {
                time: spec.start + Duration::minutes(i as i64),
                open,
                close,
                high,
                low,
                volume,
                is_complete: true,
            }
        })
        .collect()
}

fn ticker_seed(ticker: &str) -> u64 {
    let hash = blake3::hash(ticker.as_bytes());
    let mut bytes = [0u8; 8];
    bytes.copy_from_slice(&hash.as_bytes()[..8]);
    u64::from_le_bytes(bytes)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn deterministic_per_ticker() {
        let spec = SyntheticSpec {
            count: 50,
            ..SyntheticSpec::default()
        };
        assert_eq!(
            synthetic_candles("SBER", &spec),
            synthetic_candles("SBER", &spec)
        );
        assert_ne!(
            synthetic_candles("SBER", &spec),
            synthetic_candles("FLOT", &spec)
        );
    }

    #[test]
    fn candles_are_positive_and_sane() {
        let spec = SyntheticSpec {
            count: 500,
            ..SyntheticSpec::default()
        };
        for c in synthetic_candles("SELG", &spec) {
            assert!(c.volume >= 1);
            assert!(c.volatility() > 0.0);
            assert!(c.high >= c.open.max(c.close), "{c:?}");
            assert!(c.low <= c.open.min(c.close), "{c:?}");
            assert!(c.low > 0.0, "{c:?}");
        }
    }

    #[test]
    fn noiseless_range_follows_law() {
        let spec = SyntheticSpec {
            count: 20,
            noise: 0.0,
            seed: Some(7),
            ..SyntheticSpec::default()
        };
        for c in synthetic_candles("X", &spec) {
            let expected = 0.01 * (c.volume as f64).sqrt();
            assert!((c.volatility() - expected).abs() < 1e-9);
        }
    }

    #[test]
    fn timestamps_step_one_minute() {
        let spec = SyntheticSpec {
            count: 3,
            ..SyntheticSpec::default()
        };
        let candles = synthetic_candles("X", &spec);
        assert_eq!(candles[1].time - candles[0].time, Duration::minutes(1));
    }
}
