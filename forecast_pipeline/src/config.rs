//! Pipeline configuration

use crate::error::{PipelineError, Result};
use crate::models::seasonal::SeasonalityConfig;
use crate::validate::DEFAULT_TARGET_COLUMN;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use std::time::Duration;

/// Settings shared by every request
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Canonical name of the column to forecast
    pub target_column: String,
    /// First day of history requested from the data source
    pub history_start: NaiveDate,
    /// Instruments offered to users. Advisory: any identifier is accepted.
    pub instruments: Vec<String>,
    /// Upper bound on the requested horizon, in years
    pub max_horizon_years: u32,
    /// Probability mass covered by the forecast bounds
    pub interval_width: f64,
    /// Limit on each model call, in seconds; `None` disables the guard
    pub fit_timeout_secs: Option<u64>,
    /// Lifetime of cached fetches, in seconds
    pub cache_ttl_secs: u64,
    /// Seasonal components of the bundled model
    pub seasonality: SeasonalityConfig,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            target_column: DEFAULT_TARGET_COLUMN.to_string(),
            history_start: NaiveDate::from_ymd_opt(2015, 1, 1).unwrap_or_default(),
            instruments: ["GOOG", "AAPL", "MSFT", "GME"]
                .iter()
                .map(|s| s.to_string())
                .collect(),
            max_horizon_years: 4,
            interval_width: 0.8,
            fit_timeout_secs: Some(120),
            cache_ttl_secs: 24 * 60 * 60,
            seasonality: SeasonalityConfig::default(),
        }
    }
}

impl PipelineConfig {
    /// Parse and validate a JSON document
    pub fn from_json_str(json: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Load and validate a JSON file
    pub fn from_json_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let text = fs::read_to_string(path)?;
        Self::from_json_str(&text)
    }

    /// Check value ranges
    pub fn validate(&self) -> Result<()> {
        if self.target_column.trim().is_empty() {
            return Err(PipelineError::InvalidParameter(
                "target_column must not be empty".to_string(),
            ));
        }
        if self.max_horizon_years < 1 {
            return Err(PipelineError::InvalidParameter(
                "max_horizon_years must be at least 1".to_string(),
            ));
        }
        if !(self.interval_width > 0.0 && self.interval_width < 1.0) {
            return Err(PipelineError::InvalidParameter(format!(
                "interval_width must be between 0 and 1, got {}",
                self.interval_width
            )));
        }
        if self.fit_timeout_secs == Some(0) {
            return Err(PipelineError::InvalidParameter(
                "fit_timeout_secs must be positive when set".to_string(),
            ));
        }
        Ok(())
    }

    pub fn fit_timeout(&self) -> Option<Duration> {
        self.fit_timeout_secs.map(Duration::from_secs)
    }

    pub fn cache_ttl(&self) -> Duration {
        Duration::from_secs(self.cache_ttl_secs)
    }

    /// Whether `instrument` is one of the offered instruments
    pub fn is_listed(&self, instrument: &str) -> bool {
        self.instruments.iter().any(|i| i == instrument)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_valid() {
        let config = PipelineConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.target_column, "close");
        assert!(config.is_listed("GME"));
        assert_eq!(config.fit_timeout(), Some(Duration::from_secs(120)));
    }

    #[test]
    fn test_partial_json_uses_defaults() {
        let config =
            PipelineConfig::from_json_str(r#"{"interval_width": 0.95, "instruments": ["TSLA"]}"#)
                .unwrap();
        assert_eq!(config.interval_width, 0.95);
        assert_eq!(config.instruments, vec!["TSLA".to_string()]);
        assert_eq!(config.max_horizon_years, 4);
    }

    #[test]
    fn test_rejects_out_of_range_values() {
        assert!(PipelineConfig::from_json_str(r#"{"interval_width": 1.5}"#).is_err());
        assert!(PipelineConfig::from_json_str(r#"{"max_horizon_years": 0}"#).is_err());
        assert!(PipelineConfig::from_json_str(r#"{"fit_timeout_secs": 0}"#).is_err());
    }
}
