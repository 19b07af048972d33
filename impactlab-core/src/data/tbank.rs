//! T-Bank (Tinkoff) Invest API candle provider.
//!
//! Talks to the REST gateway of the Invest API: resolves a ticker to an
//! instrument UID via `InstrumentsService/FindInstrument`, then pulls
//! one-minute candles via `MarketDataService/GetCandles` in one-day windows
//! (the largest window the API serves for minute candles).
//!
//! Retries are not handled here; the download orchestrator wraps `fetch`
//! in a `RetryPolicy`. This provider only classifies failures.

use super::provider::{CandleProvider, DataError, DataSource, FetchResult};
use crate::domain::{Candle, InstrumentInfo};
use chrono::{DateTime, Duration as ChronoDuration, SecondsFormat, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Deserializer, Serialize};
use std::time::Duration;

pub const DEFAULT_BASE_URL: &str = "https://invest-public-api.tbank.ru/rest";
pub const DEFAULT_APP_NAME: &str = "econophysics-research";
pub const DEFAULT_CLASS_CODE: &str = "TQBR";

const FIND_INSTRUMENT: &str = "tinkoff.public.invest.api.contract.v1.InstrumentsService/FindInstrument";
const GET_CANDLES: &str = "tinkoff.public.invest.api.contract.v1.MarketDataService/GetCandles";
const MINUTE_INTERVAL: &str = "CANDLE_INTERVAL_1_MIN";

/// Connection settings for the T-Bank provider.
#[derive(Clone)]
pub struct TBankConfig {
    /// API token; empty means "not configured".
    pub token: String,
    pub base_url: String,
    pub app_name: String,
    /// Trading mode the ticker must belong to (e.g. `TQBR` for MOEX shares).
    pub class_code: String,
    pub timeout: Duration,
}

impl TBankConfig {
    pub fn new(token: impl Into<String>) -> Self {
        Self {
            token: token.into(),
            base_url: DEFAULT_BASE_URL.to_string(),
            app_name: DEFAULT_APP_NAME.to_string(),
            class_code: DEFAULT_CLASS_CODE.to_string(),
            timeout: Duration::from_secs(30),
        }
    }

    pub fn has_token(&self) -> bool {
        !self.token.trim().is_empty()
    }
}

impl std::fmt::Debug for TBankConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TBankConfig")
            .field("token", &if self.has_token() { "<set>" } else { "<empty>" })
            .field("base_url", &self.base_url)
            .field("app_name", &self.app_name)
            .field("class_code", &self.class_code)
            .field("timeout", &self.timeout)
            .finish()
    }
}

// ── Wire types ───────────────────────────────────────────────────────

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct FindInstrumentRequest<'a> {
    query: &'a str,
}

#[derive(Debug, Deserialize)]
struct FindInstrumentResponse {
    #[serde(default)]
    instruments: Vec<InstrumentShort>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct InstrumentShort {
    ticker: String,
    class_code: String,
    #[serde(default)]
    name: String,
    uid: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GetCandlesRequest<'a> {
    instrument_id: &'a str,
    from: String,
    to: String,
    interval: &'static str,
}

#[derive(Debug, Deserialize)]
struct GetCandlesResponse {
    #[serde(default)]
    candles: Vec<HistoricCandle>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct HistoricCandle {
    open: Option<Quotation>,
    high: Option<Quotation>,
    low: Option<Quotation>,
    close: Option<Quotation>,
    #[serde(default, deserialize_with = "de_int64")]
    volume: i64,
    time: Option<DateTime<Utc>>,
    #[serde(default)]
    is_complete: bool,
}

/// Fixed-point price: `units + nano / 1e9`.
#[derive(Debug, Clone, Copy, Deserialize)]
struct Quotation {
    #[serde(default, deserialize_with = "de_int64")]
    units: i64,
    #[serde(default)]
    nano: i32,
}

impl Quotation {
    fn to_f64(self) -> f64 {
        self.units as f64 + self.nano as f64 / 1e9
    }
}

#[derive(Debug, Deserialize)]
struct ApiErrorBody {
    #[serde(default)]
    message: String,
    #[serde(default)]
    description: String,
}

/// int64 fields arrive as JSON strings per the protobuf JSON mapping; accept numbers too.
fn de_int64<'de, D: Deserializer<'de>>(deserializer: D) -> Result<i64, D::Error> {
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Int64Repr {
        Num(i64),
        Str(String),
    }

    match Int64Repr::deserialize(deserializer)? {
        Int64Repr::Num(n) => Ok(n),
        Int64Repr::Str(s) => s.trim().parse().map_err(serde::de::Error::custom),
    }
}

// ── Provider ─────────────────────────────────────────────────────────

/// T-Bank Invest API provider.
pub struct TBankProvider {
    client: reqwest::blocking::Client,
    config: TBankConfig,
}

impl TBankProvider {
    pub fn new(config: TBankConfig) -> Result<Self, DataError> {
        let client = reqwest::blocking::Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| DataError::Other(format!("failed to build HTTP client: {e}")))?;

        if !config.has_token() {
            tracing::warn!("T_BANK_TOKEN is not set; downloads will fail");
        }

        Ok(Self { client, config })
    }

    fn endpoint(&self, method: &str) -> String {
        format!("{}/{method}", self.config.base_url.trim_end_matches('/'))
    }

    /// POST a JSON body to an API method, mapping HTTP failures to `DataError`.
    fn call<Req: Serialize, Resp: DeserializeOwned>(
        &self,
        method: &str,
        body: &Req,
    ) -> Result<Resp, DataError> {
        let resp = self
            .client
            .post(self.endpoint(method))
            .bearer_auth(&self.config.token)
            .header("x-app-name", &self.config.app_name)
            .json(body)
            .send()
            .map_err(|e| {
                if e.is_connect() || e.is_timeout() {
                    DataError::NetworkUnreachable(e.to_string())
                } else {
                    DataError::Other(e.to_string())
                }
            })?;

        let status = resp.status();
        if status.is_success() {
            return resp.json::<Resp>().map_err(|e| {
                DataError::ResponseFormatChanged(format!("failed to decode {method}: {e}"))
            });
        }

        let retry_after = resp
            .headers()
            .get("retry-after")
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.parse::<u64>().ok());
        let detail = resp
            .text()
            .ok()
            .and_then(|t| serde_json::from_str::<ApiErrorBody>(&t).ok())
            .map(|b| format!("{} {}", b.message, b.description).trim().to_string())
            .unwrap_or_default();

        Err(classify_status(status.as_u16(), retry_after, &detail))
    }

    /// Resolve a ticker to an instrument in the configured class code.
    pub fn find_instrument(&self, ticker: &str) -> Result<InstrumentInfo, DataError> {
        let resp: FindInstrumentResponse =
            self.call(FIND_INSTRUMENT, &FindInstrumentRequest { query: ticker })?;

        let found = pick_instrument(resp.instruments, ticker, &self.config.class_code)?;
        tracing::info!(
            ticker,
            name = %found.name,
            uid = %found.uid,
            "instrument found"
        );
        Ok(found)
    }

    /// Fetch one-minute candles for an instrument UID over `[start, end)`.
    pub fn fetch_candles(
        &self,
        uid: &str,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Vec<Candle>, DataError> {
        let mut candles = Vec::new();

        for (from, to) in day_windows(start, end) {
            let resp: GetCandlesResponse = self.call(
                GET_CANDLES,
                &GetCandlesRequest {
                    instrument_id: uid,
                    from: from.to_rfc3339_opts(SecondsFormat::Secs, true),
                    to: to.to_rfc3339_opts(SecondsFormat::Secs, true),
                    interval: MINUTE_INTERVAL,
                },
            )?;
            tracing::debug!(uid, %from, %to, count = resp.candles.len(), "candle window");
            candles.extend(convert_candles(resp.candles)?);
        }

        candles.sort_by_key(|c| c.time);
        candles.dedup_by_key(|c| c.time);
        Ok(candles)
    }
}

impl CandleProvider for TBankProvider {
    fn name(&self) -> &str {
        "tbank"
    }

    fn fetch(
        &self,
        ticker: &str,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<FetchResult, DataError> {
        if !self.config.has_token() {
            return Err(DataError::AuthenticationRequired(
                "T_BANK_TOKEN is not set".into(),
            ));
        }

        let instrument = self.find_instrument(ticker)?;
        let candles = self.fetch_candles(&instrument.uid, start, end)?;
        tracing::info!(ticker, count = candles.len(), "candles fetched");

        Ok(FetchResult {
            ticker: ticker.to_string(),
            instrument: Some(instrument),
            candles,
            source: DataSource::TBank,
        })
    }

    fn is_available(&self) -> bool {
        self.config.has_token()
    }
}

// ── Helpers ──────────────────────────────────────────────────────────

fn classify_status(status: u16, retry_after: Option<u64>, detail: &str) -> DataError {
    match status {
        401 | 403 => DataError::AuthenticationRequired(format!("HTTP {status} {detail}")),
        404 => DataError::ResponseFormatChanged(format!("HTTP 404 {detail}")),
        429 => DataError::RateLimited {
            retry_after_secs: retry_after.unwrap_or(60),
        },
        500..=599 => DataError::ServerError { status },
        _ => DataError::Other(format!("HTTP {status} {detail}")),
    }
}

fn pick_instrument(
    instruments: Vec<InstrumentShort>,
    ticker: &str,
    class_code: &str,
) -> Result<InstrumentInfo, DataError> {
    instruments
        .into_iter()
        .find(|i| i.ticker == ticker && i.class_code == class_code)
        .map(|i| InstrumentInfo {
            ticker: i.ticker,
            class_code: i.class_code,
            name: i.name,
            uid: i.uid,
        })
        .ok_or_else(|| DataError::SymbolNotFound {
            ticker: ticker.to_string(),
            class_code: class_code.to_string(),
        })
}

/// Split `[start, end)` into consecutive windows of at most one day.
fn day_windows(start: DateTime<Utc>, end: DateTime<Utc>) -> Vec<(DateTime<Utc>, DateTime<Utc>)> {
    let mut windows = Vec::new();
    let mut from = start;
    while from < end {
        let to = (from + ChronoDuration::days(1)).min(end);
        windows.push((from, to));
        from = to;
    }
    windows
}

fn convert_candles(raw: Vec<HistoricCandle>) -> Result<Vec<Candle>, DataError> {
    raw.into_iter()
        .map(|c| -> Result<Candle, DataError> {
            let missing = |field: &str| {
                DataError::ResponseFormatChanged(format!("candle without {field}"))
            };
            let volume = u64::try_from(c.volume).map_err(|_| {
                DataError::ResponseFormatChanged(format!("negative volume {}", c.volume))
            })?;
            Ok(Candle {
                time: c.time.ok_or_else(|| missing("time"))?,
                open: c.open.ok_or_else(|| missing("open"))?.to_f64(),
                close: c.close.ok_or_else(|| missing("close"))?.to_f64(),
                high: c.high.ok_or_else(|| missing("high"))?.to_f64(),
                low: c.low.ok_or_else(|| missing("low"))?.to_f64(),
                volume,
                is_complete: c.is_complete,
            })
        })
        .collect()
}
