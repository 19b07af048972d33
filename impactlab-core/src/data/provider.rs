//! Candle provider trait and structured error types.
//!
//! The CandleProvider trait abstracts over candle sources (the T-Bank REST
//! API, synthetic generation) so the download orchestrator can be driven by
//! a mock in tests.

use crate::domain::{Candle, InstrumentInfo};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Structured error types for data operations.
///
/// `is_transient` splits them into failures worth retrying and failures
/// that abort the ticker immediately.
#[derive(Debug, Error)]
pub enum DataError {
    #[error("network unreachable: {0}")]
    NetworkUnreachable(String),

    #[error("rate limited by provider (retry after {retry_after_secs}s)")]
    RateLimited { retry_after_secs: u64 },

    #[error("provider server error: HTTP {status}")]
    ServerError { status: u16 },

    #[error("response format changed: {0}")]
    ResponseFormatChanged(String),

    #[error("authentication required: {0}")]
    AuthenticationRequired(String),

    #[error("instrument not found: {ticker} (class {class_code})")]
    SymbolNotFound { ticker: String, class_code: String },

    #[error("provider returned no candles for {ticker}")]
    EmptyResponse { ticker: String },

    #[error("gave up after {attempts} attempts: {last_error}")]
    RetriesExhausted { attempts: u32, last_error: String },

    #[error("store error: {0}")]
    StoreError(String),

    #[error("validation error: {0}")]
    ValidationError(String),

    #[error("no stored data for ticker '{ticker}': run `download {ticker}` first")]
    NoStoredData { ticker: String },

    #[error("data error: {0}")]
    Other(String),
}

impl DataError {
    /// Whether another attempt may succeed (network hiccup, throttling, 5xx).
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            DataError::NetworkUnreachable(_)
                | DataError::RateLimited { .. }
                | DataError::ServerError { .. }
        )
    }
}

/// Where candles came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DataSource {
    TBank,
    CsvStore,
    Synthetic,
}

impl std::fmt::Display for DataSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DataSource::TBank => write!(f, "tbank"),
            DataSource::CsvStore => write!(f, "csv_store"),
            DataSource::Synthetic => write!(f, "synthetic"),
        }
    }
}

/// Result of a successful fetch for a single ticker.
#[derive(Debug, Clone)]
pub struct FetchResult {
    pub ticker: String,
    pub instrument: Option<InstrumentInfo>,
    pub candles: Vec<Candle>,
    pub source: DataSource,
}

/// Trait for candle providers.
///
/// Providers only fetch; persistence and retries live above this trait.
pub trait CandleProvider: Send + Sync {
    /// Human-readable name of this provider.
    fn name(&self) -> &str;

    /// Fetch one-minute candles for a ticker over `[start, end)`.
    fn fetch(
        &self,
        ticker: &str,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<FetchResult, DataError>;

    /// Whether the provider can currently serve requests (e.g. has credentials).
    fn is_available(&self) -> bool;
}

/// Progress callback for multi-ticker downloads.
pub trait DownloadProgress: Send {
    /// Called when starting to fetch a ticker.
    fn on_start(&self, ticker: &str, index: usize, total: usize);

    /// Called after a transient failure that will be retried.
    fn on_attempt_failed(&self, ticker: &str, attempt: u32, max_attempts: u32, error: &DataError);

    /// Called when a ticker completes (stored, skipped, or failed).
    fn on_complete(
        &self,
        ticker: &str,
        index: usize,
        total: usize,
        result: &Result<DownloadStatus, DataError>,
    );

    /// Called when the entire batch is done.
    fn on_batch_complete(&self, succeeded: usize, skipped: usize, failed: usize, total: usize);
}

/// Outcome of a single ticker that did not fail.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DownloadStatus {
    Stored { candles: usize },
    SkippedExisting,
}

/// Simple progress reporter that prints to stdout.
pub struct StdoutProgress;

impl DownloadProgress for StdoutProgress {
    fn on_start(&self, ticker: &str, index: usize, total: usize) {
        println!("[{}/{}] Fetching {ticker}...", index + 1, total);
    }

    fn on_attempt_failed(&self, ticker: &str, attempt: u32, max_attempts: u32, error: &DataError) {
        println!("  RETRY: {ticker} attempt {attempt}/{max_attempts} failed: {error}");
    }

    fn on_complete(
        &self,
        ticker: &str,
        _index: usize,
        _total: usize,
        result: &Result<DownloadStatus, DataError>,
    ) {
        match result {
            Ok(DownloadStatus::Stored { candles }) => println!("  OK: {ticker} ({candles} candles)"),
            Ok(DownloadStatus::SkippedExisting) => println!("  SKIP: {ticker} already stored"),
            Err(e) => println!("  FAIL: {ticker}: {e}"),
        }
    }

    fn on_batch_complete(&self, succeeded: usize, skipped: usize, failed: usize, total: usize) {
        println!(
            "\nDownload complete: {succeeded}/{total} stored, {skipped} skipped, {failed} failed"
        );
    }
}

/// Progress reporter that stays silent.
pub struct NoProgress;

impl DownloadProgress for NoProgress {
    fn on_start(&self, _ticker: &str, _index: usize, _total: usize) {}

    fn on_attempt_failed(&self, _ticker: &str, _attempt: u32, _max: u32, _error: &DataError) {}

    fn on_complete(
        &self,
        _ticker: &str,
        _index: usize,
        _total: usize,
        _result: &Result<DownloadStatus, DataError>,
    ) {
    }

    fn on_batch_complete(&self, _succeeded: usize, _skipped: usize, _failed: usize, _total: usize) {
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn transient_classification() {
        assert!(DataError::NetworkUnreachable("timeout".into()).is_transient());
        assert!(DataError::RateLimited {
            retry_after_secs: 5
        }
        .is_transient());
        assert!(DataError::ServerError { status: 503 }.is_transient());

        assert!(!DataError::AuthenticationRequired("no token".into()).is_transient());
        assert!(!DataError::SymbolNotFound {
            ticker: "XXXX".into(),
            class_code: "TQBR".into()
        }
        .is_transient());
        assert!(!DataError::ResponseFormatChanged("bad json".into()).is_transient());
    }

    #[test]
    fn data_source_display() {
        assert_eq!(DataSource::TBank.to_string(), "tbank");
        assert_eq!(DataSource::Synthetic.to_string(), "synthetic");
    }
}
