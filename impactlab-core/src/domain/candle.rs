//! Candle: one-minute OHLCV market data unit.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// One-minute OHLCV candle for a single ticker.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Candle {
    pub time: DateTime<Utc>,
    pub open: f64,
    pub close: f64,
    pub high: f64,
    pub low: f64,
    pub volume: u64,
    pub is_complete: bool,
}

impl Candle {
    /// Intraday price range of the candle (`high - low`).
    pub fn volatility(&self) -> f64 {
        self.high - self.low
    }
}

/// Anything the impact-law estimator can consume: a price range and a traded volume.
pub trait ImpactSample {
    fn high(&self) -> f64;
    fn low(&self) -> f64;
    fn volume(&self) -> f64;

    fn volatility(&self) -> f64 {
        self.high() - self.low()
    }
}

impl ImpactSample for Candle {
    fn high(&self) -> f64 {
        self.high
    }

    fn low(&self) -> f64 {
        self.low
    }

    fn volume(&self) -> f64 {
        self.volume as f64
    }
}

/// Bare observation without a timestamp.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Observation {
    pub high: f64,
    pub low: f64,
    pub volume: f64,
}

impl Observation {
    pub fn new(high: f64, low: f64, volume: f64) -> Self {
        Self { high, low, volume }
    }
}

impl ImpactSample for Observation {
    fn high(&self) -> f64 {
        self.high
    }

    fn low(&self) -> f64 {
        self.low
    }

    fn volume(&self) -> f64 {
        self.volume
    }
}

impl From<&Candle> for Observation {
    fn from(c: &Candle) -> Self {
        Self {
            high: c.high,
            low: c.low,
            volume: c.volume as f64,
        }
    }
}
