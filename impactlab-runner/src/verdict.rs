//! Pass/fail classification of a fitted exponent.

use serde::{Deserialize, Serialize};

/// Acceptance band for the square-root law.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ImpactThresholds {
    pub alpha_min: f64,
    pub alpha_max: f64,
    /// r² must be strictly greater than this.
    pub r2_min: f64,
}

impl Default for ImpactThresholds {
    fn default() -> Self {
        Self {
            alpha_min: 0.4,
            alpha_max: 0.6,
            r2_min: 0.9,
        }
    }
}

impl ImpactThresholds {
    pub fn classify(&self, alpha: f64, r2: f64) -> Verdict {
        if alpha >= self.alpha_min && alpha <= self.alpha_max && r2 > self.r2_min {
            Verdict::Confirmed
        } else {
            Verdict::Anomaly
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Verdict {
    /// Exponent inside the band with a tight fit.
    Confirmed,
    Anomaly,
}

impl Verdict {
    pub fn is_confirmed(self) -> bool {
        self == Verdict::Confirmed
    }
}

impl std::fmt::Display for Verdict {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Verdict::Confirmed => write!(f, "CONFIRMED"),
            Verdict::Anomaly => write!(f, "ANOMALY"),
        }
    }
}
