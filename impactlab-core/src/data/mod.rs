//! Candle retrieval and flat-file storage

pub mod download;
pub mod provider;
pub mod retry;
pub mod store;
pub mod synthetic;
pub mod tbank;

pub use download::{download_tickers, DownloadRequest, DownloadSummary, DownloadWindow};
pub use provider::{
    CandleProvider, DataError, DataSource, DownloadProgress, DownloadStatus, FetchResult,
    NoProgress, StdoutProgress,
};
pub use retry::RetryPolicy;
pub use store::{data_hash, CandleStore, StoreMeta};
pub use synthetic::{synthetic_candles, SyntheticSpec};
pub use tbank::{TBankConfig, TBankProvider};
