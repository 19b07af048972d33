//! Download orchestrator: fetches several tickers with retries and stores each as CSV.

use super::provider::{CandleProvider, DataError, DownloadProgress, DownloadStatus};
use super::retry::RetryPolicy;
use super::store::CandleStore;
use chrono::{DateTime, Duration, Utc};

/// Time window to download.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DownloadWindow {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

impl DownloadWindow {
    /// `[now - days, now]`.
    pub fn last_days(days: u32) -> Self {
        let end = Utc::now();
        Self {
            start: end - Duration::days(i64::from(days)),
            end,
        }
    }
}

/// What to download.
#[derive(Debug, Clone)]
pub struct DownloadRequest {
    pub tickers: Vec<String>,
    pub window: DownloadWindow,
    /// Keep tickers that already have a stored file instead of refreshing them.
    pub skip_existing: bool,
}

/// Download every requested ticker: fetch (with retry) → store.
///
/// Stored files are overwritten unless `skip_existing` is set. A failing
/// ticker is recorded and the batch moves on. An unavailable provider (no
/// credentials) fails every ticker without a request.
pub fn download_tickers(
    provider: &dyn CandleProvider,
    store: &CandleStore,
    request: &DownloadRequest,
    retry: &RetryPolicy,
    progress: &dyn DownloadProgress,
) -> DownloadSummary {
    let total = request.tickers.len();
    let mut succeeded = 0;
    let mut skipped = 0;
    let mut failed = 0;
    let mut errors: Vec<(String, DataError)> = Vec::new();

    tracing::info!(
        provider = provider.name(),
        tickers = total,
        start = %request.window.start,
        end = %request.window.end,
        "starting download"
    );

    if !provider.is_available() {
        tracing::error!(provider = provider.name(), "provider unavailable, nothing fetched");
        let errors: Vec<(String, DataError)> = request
            .tickers
            .iter()
            .map(|ticker| {
                let err = DataError::AuthenticationRequired(format!(
                    "{} provider is not available",
                    provider.name()
                ));
                (ticker.clone(), err)
            })
            .collect();
        progress.on_batch_complete(0, 0, total, total);
        return DownloadSummary {
            total,
            succeeded: 0,
            skipped: 0,
            failed: total,
            errors,
        };
    }

    for (i, ticker) in request.tickers.iter().enumerate() {
        progress.on_start(ticker, i, total);

        let result = if request.skip_existing && store.exists(ticker) {
            tracing::info!(ticker = %ticker, "already stored, skipping");
            Ok(DownloadStatus::SkippedExisting)
        } else {
            download_single(provider, store, ticker, request.window, retry, progress)
        };
        progress.on_complete(ticker, i, total, &result);

        match result {
            Ok(DownloadStatus::Stored { .. }) => succeeded += 1,
            Ok(DownloadStatus::SkippedExisting) => skipped += 1,
            Err(e) => {
                errors.push((ticker.clone(), e));
                failed += 1;
            }
        }
    }

    progress.on_batch_complete(succeeded, skipped, failed, total);

    DownloadSummary {
        total,
        succeeded,
        skipped,
        failed,
        errors,
    }
}

/// Download a single ticker: retry-wrapped fetch → store.
fn download_single(
    provider: &dyn CandleProvider,
    store: &CandleStore,
    ticker: &str,
    window: DownloadWindow,
    retry: &RetryPolicy,
    progress: &dyn DownloadProgress,
) -> Result<DownloadStatus, DataError> {
    let fetched = retry.run_observed(
        ticker,
        |attempt| {
            tracing::info!(ticker, attempt, max_attempts = retry.max_attempts, "fetching");
            provider.fetch(ticker, window.start, window.end)
        },
        |attempt, e| progress.on_attempt_failed(ticker, attempt, retry.max_attempts, e),
    )?;

    if fetched.candles.is_empty() {
        tracing::warn!(ticker, "provider returned no candles");
        return Err(DataError::EmptyResponse {
            ticker: ticker.to_string(),
        });
    }

    let meta = store.write(ticker, &fetched.candles, fetched.source)?;
    Ok(DownloadStatus::Stored {
        candles: meta.candle_count,
    })
}

/// Summary of a batch download.
#[derive(Debug)]
pub struct DownloadSummary {
    pub total: usize,
    pub succeeded: usize,
    pub skipped: usize,
    pub failed: usize,
    pub errors: Vec<(String, DataError)>,
}

impl DownloadSummary {
    pub fn all_succeeded(&self) -> bool {
        self.failed == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn last_days_spans_requested_length() {
        let w = DownloadWindow::last_days(60);
        assert_eq!(w.end - w.start, Duration::days(60));
    }
}
