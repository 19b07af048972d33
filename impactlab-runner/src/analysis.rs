//! Per-ticker analysis: load candles, fit the impact law, classify.
//!
//! Entry points:
//! - `analyze_candles()`: candles already in memory. No I/O.
//! - `analyze_ticker()`: loads the ticker's CSV from the store first.
//! - `analyze_tickers()`: several stored tickers in parallel (rayon).
//! - `analyze_synthetic()`: generated candles, tagged as synthetic.

use chrono::{DateTime, Utc};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use impactlab_core::data::{
    data_hash, synthetic_candles, CandleStore, DataError, DataSource, SyntheticSpec,
};
use impactlab_core::domain::Candle;
use impactlab_core::estimator::{
    estimate_with, Bin, BinningMethod, EstimateError, EstimatorConfig, FitResult,
    InsufficientReason,
};

use crate::verdict::{ImpactThresholds, Verdict};

/// Current schema version for persisted reports.
pub const SCHEMA_VERSION: u32 = 1;

/// Estimator parameters plus the acceptance band.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct AnalysisConfig {
    pub estimator: EstimatorConfig,
    pub thresholds: ImpactThresholds,
}

/// Errors that stop a ticker's analysis.
///
/// Insufficient data is not an error here; it becomes
/// `TickerOutcome::Insufficient`.
#[derive(Debug, Error)]
pub enum AnalysisError {
    #[error("{ticker}: {source}")]
    Estimate {
        ticker: String,
        #[source]
        source: EstimateError,
    },
    #[error("{ticker}: {source}")]
    Data {
        ticker: String,
        #[source]
        source: DataError,
    },
}

/// What happened to one ticker.
#[derive(Debug, Clone)]
pub enum TickerOutcome {
    Fitted { report: ImpactReport, fit: FitResult },
    /// Too little usable data; skipped.
    Insufficient {
        ticker: String,
        reason: InsufficientReason,
    },
    /// No stored CSV for the ticker.
    Missing { ticker: String },
}

impl TickerOutcome {
    pub fn ticker(&self) -> &str {
        match self {
            TickerOutcome::Fitted { report, .. } => &report.ticker,
            TickerOutcome::Insufficient { ticker, .. } | TickerOutcome::Missing { ticker } => {
                ticker
            }
        }
    }
}

/// Serializable summary of a fit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImpactReport {
    /// Schema version for forward-compatible deserialization.
    #[serde(default = "default_schema_version")]
    pub schema_version: u32,
    pub ticker: String,
    pub alpha: f64,
    pub intercept: f64,
    pub r2: f64,
    pub slope_stderr: f64,
    pub verdict: Verdict,
    pub thresholds: ImpactThresholds,
    /// Candles handed to the estimator, flat ones included.
    pub candle_count: usize,
    /// Candles that moved and entered the fit.
    pub observation_count: usize,
    pub requested_bins: usize,
    pub bin_count: usize,
    pub smart_money_count: usize,
    pub binning: BinningMethod,
    pub median_log_q: f64,
    pub first_time: Option<DateTime<Utc>>,
    pub last_time: Option<DateTime<Utc>>,
    pub dataset_hash: String,
    pub source: DataSource,
    pub synthetic: bool,
    pub bins: Vec<Bin>,
    pub smart_money: Vec<Bin>,
}

fn default_schema_version() -> u32 {
    SCHEMA_VERSION
}

impl ImpactReport {
    pub fn new(
        ticker: &str,
        candles: &[Candle],
        source: DataSource,
        fit: &FitResult,
        thresholds: ImpactThresholds,
        dataset_hash: String,
    ) -> Self {
        Self {
            schema_version: SCHEMA_VERSION,
            ticker: ticker.to_string(),
            alpha: fit.alpha,
            intercept: fit.intercept,
            r2: fit.r2,
            slope_stderr: fit.slope_stderr,
            verdict: thresholds.classify(fit.alpha, fit.r2),
            thresholds,
            candle_count: candles.len(),
            observation_count: fit.observations.len(),
            requested_bins: fit.requested_bins,
            bin_count: fit.bins.len(),
            smart_money_count: fit.smart_money.len(),
            binning: fit.binning,
            median_log_q: fit.median_log_q,
            first_time: candles.first().map(|c| c.time),
            last_time: candles.last().map(|c| c.time),
            dataset_hash,
            source,
            synthetic: source == DataSource::Synthetic,
            bins: fit.bins.clone(),
            smart_money: fit.smart_money.clone(),
        }
    }
}

/// Fit one ticker's candles. No I/O.
pub fn analyze_candles(
    ticker: &str,
    candles: &[Candle],
    source: DataSource,
    config: &AnalysisConfig,
) -> Result<TickerOutcome, AnalysisError> {
    let fit = match estimate_with(candles, &config.estimator) {
        Ok(fit) => fit,
        Err(EstimateError::InsufficientData(reason)) => {
            tracing::warn!(ticker, %reason, "insufficient data, skipping");
            return Ok(TickerOutcome::Insufficient {
                ticker: ticker.to_string(),
                reason,
            });
        }
        Err(e) => {
            tracing::error!(ticker, error = %e, "estimation failed");
            return Err(AnalysisError::Estimate {
                ticker: ticker.to_string(),
                source: e,
            });
        }
    };

    let hash = data_hash(candles).map_err(|e| AnalysisError::Data {
        ticker: ticker.to_string(),
        source: e,
    })?;
    let report = ImpactReport::new(ticker, candles, source, &fit, config.thresholds, hash);

    tracing::info!(
        ticker,
        alpha = report.alpha,
        r2 = report.r2,
        bins = report.bin_count,
        smart_money = report.smart_money_count,
        verdict = %report.verdict,
        "fit complete"
    );
    Ok(TickerOutcome::Fitted { report, fit })
}

/// Load a ticker from the store and fit it.
pub fn analyze_ticker(
    store: &CandleStore,
    ticker: &str,
    config: &AnalysisConfig,
) -> Result<TickerOutcome, AnalysisError> {
    let candles = match store.load(ticker) {
        Ok(candles) => candles,
        Err(DataError::NoStoredData { .. }) => {
            tracing::warn!(ticker, path = %store.candle_path(ticker).display(), "no stored candles");
            return Ok(TickerOutcome::Missing {
                ticker: ticker.to_string(),
            });
        }
        Err(e) => {
            return Err(AnalysisError::Data {
                ticker: ticker.to_string(),
                source: e,
            })
        }
    };

    let source = store
        .meta(ticker)
        .map(|m| m.source)
        .unwrap_or(DataSource::CsvStore);
    analyze_candles(ticker, &candles, source, config)
}

/// Analyze stored tickers in parallel. Results keep the input order.
pub fn analyze_tickers(
    store: &CandleStore,
    tickers: &[String],
    config: &AnalysisConfig,
) -> Vec<Result<TickerOutcome, AnalysisError>> {
    tickers
        .par_iter()
        .map(|ticker| analyze_ticker(store, ticker, config))
        .collect()
}

/// Analyze generated candles for each ticker. Reports are tagged synthetic.
pub fn analyze_synthetic(
    tickers: &[String],
    spec: &SyntheticSpec,
    config: &AnalysisConfig,
) -> Vec<Result<TickerOutcome, AnalysisError>> {
    tickers
        .par_iter()
        .map(|ticker| {
            let candles = synthetic_candles(ticker, spec);
            analyze_candles(ticker, &candles, DataSource::Synthetic, config)
        })
        .collect()
}
