//! ImpactLab Runner: analysis orchestration on top of `impactlab-core`.
//!
//! This crate provides:
//! - TOML configuration with environment-supplied API token
//! - Per-ticker analysis (store → estimator → verdict), parallel across tickers
//! - Verdict classification against an alpha/r² band
//! - JSON/CSV report export and per-ticker artifact bundles
//! - SVG diagnostic plots (feature `plot`)

pub mod analysis;
pub mod config;
#[cfg(feature = "plot")]
pub mod plot;
pub mod report;
pub mod verdict;

pub use analysis::{
    analyze_candles, analyze_synthetic, analyze_ticker, analyze_tickers, AnalysisConfig,
    AnalysisError, ImpactReport, TickerOutcome, SCHEMA_VERSION,
};
pub use config::{api_token, ConfigError, ImpactLabConfig, TOKEN_ENV};
pub use report::{export_bins_csv, export_json, format_summary, import_json, save_artifacts};
pub use verdict::{ImpactThresholds, Verdict};
