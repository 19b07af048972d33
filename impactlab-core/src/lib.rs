//! ImpactLab Core: candle data, storage, and the impact-law estimator.
//!
//! This crate contains:
//! - Domain types (candles, instruments, estimator samples)
//! - The impact-law estimator (binning, smart-money selection, log-log OLS)
//! - Candle provider trait and the T-Bank Invest REST provider
//! - Retry policy for transient network failures
//! - Flat CSV candle store with metadata sidecars
//! - Multi-ticker download orchestrator
//! - Synthetic candle generation

pub mod data;
pub mod domain;
pub mod estimator;

pub use estimator::{estimate, estimate_with, EstimateError, EstimatorConfig, FitResult};
