//! Forecasting model capability
//!
//! The pipeline only talks to models through [`ForecastModel`] and
//! [`TrainedForecastModel`]; [`seasonal::SeasonalModel`] is the bundled
//! implementation.

use crate::error::ModelError;
use crate::training::TrainingSet;
use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use std::fmt::Debug;

/// Result type for model operations
pub type ModelResult<T> = std::result::Result<T, ModelError>;

/// One row of raw model output
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RawPrediction {
    /// Timestamp predicted for
    pub ds: NaiveDateTime,
    /// Point estimate
    pub yhat: f64,
    /// Lower uncertainty bound
    pub yhat_lower: f64,
    /// Upper uncertainty bound
    pub yhat_upper: f64,
    /// Trend component
    pub trend: f64,
    /// Weekly seasonal component
    pub weekly: f64,
    /// Yearly seasonal component
    pub yearly: f64,
}

/// Trained forecast model
pub trait TrainedForecastModel: Debug + Send + Sync {
    /// Predict one row per timestamp of `axis`, in axis order
    fn predict(&self, axis: &[NaiveDateTime]) -> ModelResult<Vec<RawPrediction>>;

    /// Name of the model
    fn name(&self) -> &str;
}

/// Forecast model that can be fitted to a training set
pub trait ForecastModel: Debug + Clone + Send + Sync + 'static {
    /// The type of trained model produced
    type Trained: TrainedForecastModel + 'static;

    /// Fit the model to the training observations
    fn fit(&self, data: &TrainingSet) -> ModelResult<Self::Trained>;

    /// Get the name of the model
    fn name(&self) -> &str;
}

pub mod seasonal;
