//! Instrument metadata returned by the brokerage lookup.

use serde::{Deserialize, Serialize};

/// An exchange-listed instrument resolved from a ticker.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InstrumentInfo {
    pub ticker: String,
    pub class_code: String,
    pub name: String,
    /// Broker-side unique identifier used to request candles.
    pub uid: String,
}
