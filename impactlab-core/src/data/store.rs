//! Flat-file candle store.
//!
//! Layout: `{data_dir}/{TICKER}_1min.csv` plus a `{TICKER}_1min.meta.json`
//! sidecar.
//!
//! CSV columns: `time, open, close, high, low, volume, is_complete, volatility`
//! where `volatility = high - low` is precomputed at write time.
//!
//! Writes are atomic (write to .tmp, rename into place).

use super::provider::{DataError, DataSource};
use crate::domain::Candle;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

const CSV_SUFFIX: &str = "_1min.csv";
const META_SUFFIX: &str = "_1min.meta.json";

/// Metadata sidecar for a stored ticker.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoreMeta {
    pub ticker: String,
    pub first_time: DateTime<Utc>,
    pub last_time: DateTime<Utc>,
    pub candle_count: usize,
    pub data_hash: String,
    pub source: DataSource,
    pub stored_at: DateTime<Utc>,
}

/// One CSV row.
#[derive(Debug, Serialize, Deserialize)]
struct CandleRecord {
    time: DateTime<Utc>,
    open: f64,
    close: f64,
    high: f64,
    low: f64,
    volume: u64,
    #[serde(deserialize_with = "lenient_bool")]
    is_complete: bool,
    #[serde(default)]
    volatility: Option<f64>,
}

/// Accepts `true`/`false` in any case as well as `1`/`0`, so files written
/// by other tools (e.g. `True`/`False`) still load.
fn lenient_bool<'de, D>(deserializer: D) -> Result<bool, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let raw = String::deserialize(deserializer)?;
    match raw.trim().to_ascii_lowercase().as_str() {
        "true" | "1" => Ok(true),
        "false" | "0" => Ok(false),
        other => Err(serde::de::Error::custom(format!(
            "invalid is_complete value `{other}`"
        ))),
    }
}

impl From<&Candle> for CandleRecord {
    fn from(c: &Candle) -> Self {
        Self {
            time: c.time,
            open: c.open,
            close: c.close,
            high: c.high,
            low: c.low,
            volume: c.volume,
            is_complete: c.is_complete,
            volatility: Some(c.volatility()),
        }
    }
}

impl From<CandleRecord> for Candle {
    fn from(r: CandleRecord) -> Self {
        Self {
            time: r.time,
            open: r.open,
            close: r.close,
            high: r.high,
            low: r.low,
            volume: r.volume,
            is_complete: r.is_complete,
        }
    }
}

/// The candle store.
#[derive(Debug, Clone)]
pub struct CandleStore {
    data_dir: PathBuf,
}

impl CandleStore {
    pub fn new(data_dir: impl Into<PathBuf>) -> Self {
        Self {
            data_dir: data_dir.into(),
        }
    }

    /// Root directory of the store.
    pub fn data_dir(&self) -> &Path {
        &self.data_dir
    }

    /// Path to the CSV file for a ticker: `{data_dir}/{TICKER}_1min.csv`
    pub fn candle_path(&self, ticker: &str) -> PathBuf {
        self.data_dir.join(format!("{ticker}{CSV_SUFFIX}"))
    }

    fn meta_path(&self, ticker: &str) -> PathBuf {
        self.data_dir.join(format!("{ticker}{META_SUFFIX}"))
    }

    /// Whether a CSV file exists for the ticker.
    pub fn exists(&self, ticker: &str) -> bool {
        self.candle_path(ticker).is_file()
    }

    /// Write candles for a ticker, replacing any previous file.
    pub fn write(
        &self,
        ticker: &str,
        candles: &[Candle],
        source: DataSource,
    ) -> Result<StoreMeta, DataError> {
        let (first, last) = match (candles.first(), candles.last()) {
            (Some(f), Some(l)) => (f.time, l.time),
            _ => return Err(DataError::StoreError("no candles to store".into())),
        };

        fs::create_dir_all(&self.data_dir)
            .map_err(|e| DataError::StoreError(format!("failed to create dir: {e}")))?;

        let path = self.candle_path(ticker);
        let tmp_path = path.with_extension("csv.tmp");
        write_csv(&tmp_path, candles)?;

        fs::rename(&tmp_path, &path).map_err(|e| {
            let _ = fs::remove_file(&tmp_path);
            DataError::StoreError(format!("atomic rename failed: {e}"))
        })?;

        let meta = StoreMeta {
            ticker: ticker.to_string(),
            first_time: first,
            last_time: last,
            candle_count: candles.len(),
            data_hash: data_hash(candles)?,
            source,
            stored_at: Utc::now(),
        };
        let meta_json = serde_json::to_string_pretty(&meta)
            .map_err(|e| DataError::StoreError(format!("meta serialization: {e}")))?;
        fs::write(self.meta_path(ticker), meta_json)
            .map_err(|e| DataError::StoreError(format!("meta write: {e}")))?;

        tracing::info!(
            ticker,
            path = %path.display(),
            candles = candles.len(),
            "candles stored"
        );
        Ok(meta)
    }

    /// Load all candles for a ticker, in file order.
    pub fn load(&self, ticker: &str) -> Result<Vec<Candle>, DataError> {
        let path = self.candle_path(ticker);
        if !path.is_file() {
            return Err(DataError::NoStoredData {
                ticker: ticker.to_string(),
            });
        }

        let mut reader = csv::Reader::from_path(&path)
            .map_err(|e| DataError::StoreError(format!("open {}: {e}", path.display())))?;

        let candles = reader
            .deserialize::<CandleRecord>()
            .enumerate()
            .map(|(i, row)| {
                row.map(Candle::from).map_err(|e| {
                    DataError::ValidationError(format!(
                        "{}: row {}: {e}",
                        path.display(),
                        i + 1
                    ))
                })
            })
            .collect::<Result<Vec<_>, _>>()?;

        if candles.is_empty() {
            return Err(DataError::ValidationError(format!(
                "{} has no rows",
                path.display()
            )));
        }

        tracing::debug!(ticker, candles = candles.len(), "candles loaded");
        Ok(candles)
    }

    /// Read the metadata sidecar, if present and parseable.
    pub fn meta(&self, ticker: &str) -> Option<StoreMeta> {
        let content = fs::read_to_string(self.meta_path(ticker)).ok()?;
        serde_json::from_str(&content).ok()
    }

    /// Tickers with a CSV file in the store, sorted.
    pub fn list(&self) -> Result<Vec<String>, DataError> {
        if !self.data_dir.exists() {
            return Ok(Vec::new());
        }

        let entries = fs::read_dir(&self.data_dir)
            .map_err(|e| DataError::StoreError(format!("read dir: {e}")))?;

        let mut tickers: Vec<String> = entries
            .flatten()
            .filter_map(|entry| {
                let name = entry.file_name().to_string_lossy().to_string();
                name.strip_suffix(CSV_SUFFIX).map(str::to_string)
            })
            .collect();
        tickers.sort();
        Ok(tickers)
    }
}

fn write_csv(path: &Path, candles: &[Candle]) -> Result<(), DataError> {
    let mut wtr = csv::Writer::from_path(path)
        .map_err(|e| DataError::StoreError(format!("create {}: {e}", path.display())))?;
    for candle in candles {
        wtr.serialize(CandleRecord::from(candle))
            .map_err(|e| DataError::StoreError(format!("csv write: {e}")))?;
    }
    wtr.flush()
        .map_err(|e| DataError::StoreError(format!("csv flush: {e}")))?;
    Ok(())
}

/// Deterministic BLAKE3 hash of a candle series.
pub fn data_hash(candles: &[Candle]) -> Result<String, DataError> {
    let bytes = serde_json::to_vec(candles)
        .map_err(|e| DataError::StoreError(format!("hash serialization: {e}")))?;
    Ok(blake3::hash(&bytes).to_hex().to_string())
}
