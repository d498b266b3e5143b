//! Canonical forecast records for presentation

use crate::error::{ModelError, PipelineError, Result};
use crate::models::RawPrediction;
use chrono::NaiveDateTime;
use polars::prelude::*;
use serde::{Deserialize, Serialize};

/// One forecast row
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ForecastRecord {
    pub timestamp: NaiveDateTime,
    pub point_estimate: f64,
    pub lower_bound: f64,
    pub upper_bound: f64,
}

/// Forecast over the fitted history and the future horizon, ordered by timestamp
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct ForecastSet {
    records: Vec<ForecastRecord>,
}

impl ForecastSet {
    pub fn records(&self) -> &[ForecastRecord] {
        &self.records
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// The last `n` records
    pub fn tail(&self, n: usize) -> &[ForecastRecord] {
        let start = self.records.len().saturating_sub(n);
        &self.records[start..]
    }

    /// Records strictly after `cutoff`
    pub fn after(&self, cutoff: NaiveDateTime) -> impl Iterator<Item = &ForecastRecord> + '_ {
        self.records.iter().filter(move |r| r.timestamp > cutoff)
    }

    /// Forecast as a DataFrame for presentation
    pub fn to_dataframe(&self) -> Result<DataFrame> {
        let records = &self.records;
        Ok(DataFrame::new(vec![
            timestamp_series(records.iter().map(|r| r.timestamp))?,
            Series::new("point_estimate", project(records, |r| r.point_estimate)),
            Series::new("lower_bound", project(records, |r| r.lower_bound)),
            Series::new("upper_bound", project(records, |r| r.upper_bound)),
        ])?)
    }
}

/// Additive parts of one point estimate: `trend + weekly + yearly`
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ComponentRecord {
    pub timestamp: NaiveDateTime,
    pub trend: f64,
    pub weekly: f64,
    pub yearly: f64,
}

impl ComponentRecord {
    /// Sum of the components
    pub fn total(&self) -> f64 {
        self.trend + self.weekly + self.yearly
    }
}

/// Trend and seasonal components on the same axis as a [`ForecastSet`]
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct ForecastComponents {
    records: Vec<ComponentRecord>,
}

impl ForecastComponents {
    pub fn records(&self) -> &[ComponentRecord] {
        &self.records
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// The last `n` records
    pub fn tail(&self, n: usize) -> &[ComponentRecord] {
        let start = self.records.len().saturating_sub(n);
        &self.records[start..]
    }

    /// Components as a DataFrame for presentation
    pub fn to_dataframe(&self) -> Result<DataFrame> {
        let records = &self.records;
        Ok(DataFrame::new(vec![
            timestamp_series(records.iter().map(|r| r.timestamp))?,
            Series::new("trend", project(records, |r| r.trend)),
            Series::new("weekly", project(records, |r| r.weekly)),
            Series::new("yearly", project(records, |r| r.yearly)),
        ])?)
    }
}

/// Projects raw model output onto [`ForecastRecord`]s
#[derive(Debug)]
pub struct ForecastResultAssembler;

impl ForecastResultAssembler {
    /// Assemble predictions from the model called `model`.
    ///
    /// Values are copied unchanged. Non-finite values or inverted bounds are
    /// a contract violation by the model and fail as `ModelFit`.
    pub fn assemble(model: &str, predictions: Vec<RawPrediction>) -> Result<ForecastSet> {
        if let Some(bad) = predictions.iter().find(|p| !is_well_formed(p)) {
            return Err(PipelineError::model_fit(
                model,
                ModelError::Contract(format!(
                    "prediction at {} is malformed (yhat {}, lower {}, upper {})",
                    bad.ds, bad.yhat, bad.yhat_lower, bad.yhat_upper
                )),
            ));
        }

        let mut records: Vec<ForecastRecord> = predictions
            .into_iter()
            .map(|p| ForecastRecord {
                timestamp: p.ds,
                point_estimate: p.yhat,
                lower_bound: p.yhat_lower,
                upper_bound: p.yhat_upper,
            })
            .collect();
        // Stable, so duplicated timestamps keep model order
        records.sort_by_key(|r| r.timestamp);

        Ok(ForecastSet { records })
    }

    /// Component breakdown of the same predictions, ordered like
    /// [`assemble`](Self::assemble) orders its records
    pub fn components(predictions: &[RawPrediction]) -> ForecastComponents {
        let mut records: Vec<ComponentRecord> = predictions
            .iter()
            .map(|p| ComponentRecord {
                timestamp: p.ds,
                trend: p.trend,
                weekly: p.weekly,
                yearly: p.yearly,
            })
            .collect();
        records.sort_by_key(|r| r.timestamp);

        ForecastComponents { records }
    }
}

fn project<R>(records: &[R], f: impl Fn(&R) -> f64) -> Vec<f64> {
    records.iter().map(f).collect()
}

fn timestamp_series(timestamps: impl Iterator<Item = NaiveDateTime>) -> Result<Series> {
    let millis: Vec<i64> = timestamps
        .map(|ts| ts.and_utc().timestamp_millis())
        .collect();
    Ok(Series::new("timestamp", millis).cast(&DataType::Datetime(TimeUnit::Milliseconds, None))?)
}

fn is_well_formed(p: &RawPrediction) -> bool {
    p.yhat.is_finite()
        && p.yhat_lower.is_finite()
        && p.yhat_upper.is_finite()
        && p.yhat_lower <= p.yhat_upper
}
