//! Domain types for ImpactLab

pub mod candle;
pub mod instrument;

pub use candle::{Candle, ImpactSample, Observation};
pub use instrument::InstrumentInfo;
