//! TOML configuration for downloads and analysis.
//!
//! Every section and field has a default, so an empty file (or no file at
//! all) yields a working setup for the stock ticker list. The API token is
//! never read from TOML; it comes from `T_BANK_TOKEN` in the environment or a
//! `.env` file.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use impactlab_core::data::tbank::{DEFAULT_APP_NAME, DEFAULT_BASE_URL, DEFAULT_CLASS_CODE};
use impactlab_core::data::{CandleStore, RetryPolicy, TBankConfig};
use impactlab_core::estimator::{EstimatorConfig, DEFAULT_BIN_COUNT};

use crate::analysis::AnalysisConfig;
use crate::verdict::ImpactThresholds;

/// Environment variable holding the T-Bank API token.
pub const TOKEN_ENV: &str = "T_BANK_TOKEN";

/// File picked up from the working directory when no path is given.
pub const DEFAULT_CONFIG_FILE: &str = "impactlab.toml";

/// Errors from loading or validating configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config TOML: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("invalid config: {0}")]
    Invalid(String),
}

/// Top-level configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ImpactLabConfig {
    pub data: DataSection,
    pub download: DownloadSection,
    pub analysis: AnalysisSection,
    pub logging: LoggingSection,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DataSection {
    /// Directory holding `{TICKER}_1min.csv` files.
    pub dir: PathBuf,
    pub tickers: Vec<String>,
}

impl Default for DataSection {
    fn default() -> Self {
        Self {
            dir: PathBuf::from("data"),
            tickers: ["SBER", "FLOT", "SELG"].map(String::from).to_vec(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DownloadSection {
    pub days_back: u32,
    pub class_code: String,
    pub base_url: String,
    pub app_name: String,
    pub max_attempts: u32,
    pub retry_delay_secs: u64,
    pub timeout_secs: u64,
}

impl Default for DownloadSection {
    fn default() -> Self {
        Self {
            days_back: 60,
            class_code: DEFAULT_CLASS_CODE.to_string(),
            base_url: DEFAULT_BASE_URL.to_string(),
            app_name: DEFAULT_APP_NAME.to_string(),
            max_attempts: 3,
            retry_delay_secs: 5,
            timeout_secs: 30,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AnalysisSection {
    pub bin_count: usize,
    pub alpha_min: f64,
    pub alpha_max: f64,
    pub r2_min: f64,
    pub output_dir: PathBuf,
    /// Render `impact.svg` next to each report.
    pub plot: bool,
}

impl Default for AnalysisSection {
    fn default() -> Self {
        let thresholds = ImpactThresholds::default();
        Self {
            bin_count: DEFAULT_BIN_COUNT,
            alpha_min: thresholds.alpha_min,
            alpha_max: thresholds.alpha_max,
            r2_min: thresholds.r2_min,
            output_dir: PathBuf::from("output"),
            plot: true,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingSection {
    /// `EnvFilter` directive used when `RUST_LOG` is unset.
    pub level: String,
}

impl Default for LoggingSection {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
        }
    }
}

impl ImpactLabConfig {
    /// Load and validate a config from a TOML file.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml(&content)
    }

    /// Parse and validate a config from a TOML string.
    pub fn from_toml(content: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Explicit path if given, else `impactlab.toml` when present, else defaults.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        match path {
            Some(p) => Self::from_file(p),
            None => {
                let fallback = Path::new(DEFAULT_CONFIG_FILE);
                if fallback.is_file() {
                    Self::from_file(fallback)
                } else {
                    Ok(Self::default())
                }
            }
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.data.tickers.is_empty() {
            return Err(ConfigError::Invalid("data.tickers must not be empty".into()));
        }
        if self.download.max_attempts == 0 {
            return Err(ConfigError::Invalid(
                "download.max_attempts must be at least 1".into(),
            ));
        }
        let a = &self.analysis;
        if a.bin_count == 0 {
            return Err(ConfigError::Invalid(
                "analysis.bin_count must be positive".into(),
            ));
        }
        if !(a.alpha_min <= a.alpha_max) {
            return Err(ConfigError::Invalid(format!(
                "analysis.alpha_min ({}) must not exceed analysis.alpha_max ({})",
                a.alpha_min, a.alpha_max
            )));
        }
        if !(0.0..1.0).contains(&a.r2_min) {
            return Err(ConfigError::Invalid(format!(
                "analysis.r2_min ({}) must be in [0, 1)",
                a.r2_min
            )));
        }
        Ok(())
    }

    pub fn store(&self) -> CandleStore {
        CandleStore::new(&self.data.dir)
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy::new(
            self.download.max_attempts,
            Duration::from_secs(self.download.retry_delay_secs),
        )
    }

    /// Provider settings with the given token.
    pub fn tbank_config(&self, token: impl Into<String>) -> TBankConfig {
        TBankConfig {
            token: token.into(),
            base_url: self.download.base_url.clone(),
            app_name: self.download.app_name.clone(),
            class_code: self.download.class_code.clone(),
            timeout: Duration::from_secs(self.download.timeout_secs),
        }
    }

    pub fn thresholds(&self) -> ImpactThresholds {
        ImpactThresholds {
            alpha_min: self.analysis.alpha_min,
            alpha_max: self.analysis.alpha_max,
            r2_min: self.analysis.r2_min,
        }
    }

    pub fn estimator_config(&self) -> EstimatorConfig {
        EstimatorConfig::with_bin_count(self.analysis.bin_count)
    }

    pub fn analysis_config(&self) -> AnalysisConfig {
        AnalysisConfig {
            estimator: self.estimator_config(),
            thresholds: self.thresholds(),
        }
    }
}

/// API token from `.env` / the environment, if set and non-blank.
pub fn api_token() -> Option<String> {
    dotenvy::dotenv().ok();
    non_blank(std::env::var(TOKEN_ENV).ok())
}

fn non_blank(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}
