//! Scenario tests for the impact-law estimator.
//!
//! Covers the documented behaviors end to end:
//! - recovery of a known exponent from synthetic square-root-law candles
//! - the 100-row minimum
//! - collapse of quantile bins on identical volumes
//! - domain errors on malformed volume
//! - determinism across calls

use impactlab_core::data::{synthetic_candles, SyntheticSpec};
use impactlab_core::domain::{Candle, Observation};
use impactlab_core::estimator::{
    estimate, estimate_with, BinningMethod, EstimateError, EstimatorConfig, InsufficientReason,
};

/// `n` observations with distinct volumes and a square-root range.
fn spread_observations(n: usize) -> Vec<Observation> {
    (0..n)
        .map(|i| {
            let volume = 50.0 + 13.0 * i as f64;
            let range = 0.02 * volume.sqrt();
            Observation::new(200.0 + range, 200.0, volume)
        })
        .collect()
}

fn flat(volume: f64) -> Observation {
    Observation::new(200.0, 200.0, volume)
}

// ── Synthetic square-root law ────────────────────────────────────────

#[test]
fn synthetic_square_root_law_is_recovered() {
    let spec = SyntheticSpec {
        count: 500,
        exponent: 0.5,
        noise: 0.05,
        seed: Some(20241202),
        ..SyntheticSpec::default()
    };
    let candles = synthetic_candles("SYNTH", &spec);

    let fit = estimate(&candles, 40).unwrap();
    assert!(
        (fit.alpha - 0.5).abs() <= 0.05,
        "alpha {} not within 0.05 of 0.5",
        fit.alpha
    );
    assert!(fit.r2 > 0.9, "r2 {} too low", fit.r2);
    assert_eq!(fit.binning, BinningMethod::Quantile);
    assert_eq!(fit.observations.len(), 500);
}

#[test]
fn other_exponents_are_recovered() {
    for exponent in [0.3, 0.7] {
        let spec = SyntheticSpec {
            count: 2_000,
            exponent,
            noise: 0.02,
            seed: Some(11),
            ..SyntheticSpec::default()
        };
        let fit = estimate(&synthetic_candles("SYNTH", &spec), 40).unwrap();
        assert!(
            (fit.alpha - exponent).abs() < 0.05,
            "exponent {exponent}: alpha {}",
            fit.alpha
        );
    }
}

// ── Minimum sample size ──────────────────────────────────────────────

#[test]
fn ninety_nine_qualifying_rows_are_insufficient() {
    let mut obs = spread_observations(99);
    // Flat candles do not count towards the minimum.
    obs.extend((0..50).map(|i| flat(1_000.0 + i as f64)));

    assert_eq!(
        estimate(&obs, 40).unwrap_err(),
        EstimateError::InsufficientData(InsufficientReason::TooFewObservations {
            found: 99,
            required: 100,
        })
    );
}

#[test]
fn one_hundred_qualifying_rows_fit() {
    let fit = estimate(&spread_observations(100), 40).unwrap();
    assert_eq!(fit.observations.len(), 100);
    assert!(fit.bins.len() <= 40);
    assert!(fit.smart_money.len() >= 3);
    assert!((fit.alpha - 0.5).abs() < 1e-6);
}

#[test]
fn empty_input_is_insufficient() {
    let empty: Vec<Candle> = Vec::new();
    assert!(estimate(&empty, 40).unwrap_err().is_insufficient());
}

#[test]
fn all_flat_input_is_insufficient() {
    let obs: Vec<Observation> = (0..500).map(|i| flat(10.0 + i as f64)).collect();
    assert_eq!(
        estimate(&obs, 40).unwrap_err(),
        EstimateError::InsufficientData(InsufficientReason::TooFewObservations {
            found: 0,
            required: 100,
        })
    );
}

#[test]
fn custom_minimums_are_honoured() {
    let config = EstimatorConfig {
        bin_count: 10,
        min_observations: 20,
        min_smart_money: 2,
    };
    let fit = estimate_with(&spread_observations(30), &config).unwrap();
    assert!(fit.bins.len() <= 10);
    assert_eq!(fit.requested_bins, 10);
}

// ── Degenerate volumes ───────────────────────────────────────────────

#[test]
fn identical_volumes_fall_back_without_panicking() {
    let obs: Vec<Observation> = (0..300)
        .map(|i| Observation::new(100.0 + 0.01 * (1 + i % 17) as f64, 100.0, 750.0))
        .collect();

    match estimate(&obs, 40) {
        Err(EstimateError::InsufficientData(InsufficientReason::TooFewSmartMoneyBins {
            found,
            required,
        })) => {
            assert_eq!(found, 0);
            assert_eq!(required, 3);
        }
        other => panic!("expected smart-money shortfall, got {other:?}"),
    }
}

#[test]
fn skewed_volumes_yield_fewer_bins_than_requested() {
    // Most candles trade the same lot size; a tail trades much more.
    let mut obs: Vec<Observation> = (0..400)
        .map(|i| Observation::new(100.0 + 0.01 * (1 + i % 5) as f64, 100.0, 10.0))
        .collect();
    obs.extend((0..200).map(|i| {
        let volume = 20.0 + 7.0 * i as f64;
        Observation::new(100.0 + 0.02 * volume.sqrt(), 100.0, volume)
    }));

    let fit = estimate(&obs, 40).unwrap();
    assert_eq!(fit.binning, BinningMethod::Quantile);
    assert!(fit.bins.len() < 40, "got {} bins", fit.bins.len());
    assert!(fit.bins.windows(2).all(|w| w[0].upper <= w[1].lower));
}

// ── Domain errors ────────────────────────────────────────────────────

#[test]
fn negative_volume_propagates_domain_error() {
    let mut obs = spread_observations(150);
    obs[42].volume = -3.0;
    match estimate(&obs, 40) {
        Err(EstimateError::Domain { row, field, value }) => {
            assert_eq!(row, 42);
            assert_eq!(field, "volume");
            assert_eq!(value, -3.0);
        }
        other => panic!("expected domain error, got {other:?}"),
    }
}

#[test]
fn infinite_volume_is_domain_error() {
    let mut obs = spread_observations(150);
    obs[0].volume = f64::INFINITY;
    assert!(matches!(
        estimate(&obs, 40),
        Err(EstimateError::Domain { row: 0, .. })
    ));
}

// ── Determinism ──────────────────────────────────────────────────────

#[test]
fn repeated_calls_are_bit_identical() {
    let spec = SyntheticSpec {
        count: 1_000,
        ..SyntheticSpec::default()
    };
    let candles = synthetic_candles("SBER", &spec);

    let a = estimate(&candles, 40).unwrap();
    let b = estimate(&candles, 40).unwrap();
    assert_eq!(a.alpha.to_bits(), b.alpha.to_bits());
    assert_eq!(a.intercept.to_bits(), b.intercept.to_bits());
    assert_eq!(a.r2.to_bits(), b.r2.to_bits());
    assert_eq!(a, b);
}
