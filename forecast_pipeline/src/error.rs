//! Error types for the forecast_pipeline crate

use forecast_math::MathError;
use polars::prelude::PolarsError;
use std::time::Duration;
use thiserror::Error;

/// Failure kinds surfaced by the ingestion, validation and forecasting stages
#[derive(Debug, Error)]
pub enum PipelineError {
    /// The data source returned no rows
    #[error("No data retrieved for ticker {instrument}")]
    EmptySource { instrument: String },

    /// A required column is absent after normalization
    #[error("'{column}' column not found in data. Available columns: {available:?}")]
    MissingColumn {
        column: String,
        available: Vec<String>,
    },

    /// Every value in the target column failed numeric coercion
    #[error("All '{column}' values are invalid. Sample: {sample:?}")]
    AllValuesInvalid { column: String, sample: Vec<String> },

    /// At least one temporal field could not be parsed
    #[error("{} date(s) could not be converted to timestamps (rows {rows:?}). Sample: {sample:?}", .rows.len())]
    InvalidTimestamp { rows: Vec<usize>, sample: Vec<String> },

    /// Too few usable observations remain to fit a model
    #[error("Not enough valid data points to fit the model: need {required}, found {found}")]
    InsufficientData { required: usize, found: usize },

    /// The model capability rejected the training set or failed internally
    #[error("Error fitting {model} model: {source}")]
    ModelFit {
        model: String,
        #[source]
        source: ModelError,
    },

    /// Error from invalid parameters
    #[error("Invalid parameter: {0}")]
    InvalidParameter(String),

    /// Error raised by a data source while fetching
    #[error("Data source error: {0}")]
    DataSource(String),

    /// Error from IO operations
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    /// Error from CSV parsing
    #[error("CSV error: {0}")]
    CsvError(#[from] csv::Error),

    /// Error from JSON (de)serialization
    #[error("JSON error: {0}")]
    JsonError(#[from] serde_json::Error),

    /// Error from Polars operations
    #[error("Polars error: {0}")]
    PolarsError(String),
}

/// Errors raised by a forecasting model during fit or predict
#[derive(Debug, Error)]
pub enum ModelError {
    #[error("degenerate input: {0}")]
    DegenerateInput(String),

    #[error("fit did not converge: {0}")]
    NonConvergence(String),

    #[error("math error: {0}")]
    Math(#[from] MathError),

    /// The model returned output that breaks its prediction contract
    #[error("malformed model output: {0}")]
    Contract(String),

    #[error("model call exceeded {0:?}")]
    Timeout(Duration),

    #[error("model panicked: {0}")]
    Panicked(String),
}

/// Result type with our custom error
pub type Result<T> = std::result::Result<T, PipelineError>;

impl From<PolarsError> for PipelineError {
    fn from(err: PolarsError) -> Self {
        PipelineError::PolarsError(err.to_string())
    }
}

impl PipelineError {
    /// Wrap a model failure with the name of the model that raised it
    pub fn model_fit(model: impl Into<String>, source: ModelError) -> Self {
        PipelineError::ModelFit {
            model: model.into(),
            source,
        }
    }

    /// Short machine-friendly name of the error kind
    pub fn kind(&self) -> &'static str {
        match self {
            PipelineError::EmptySource { .. } => "EmptySourceError",
            PipelineError::MissingColumn { .. } => "MissingColumnError",
            PipelineError::AllValuesInvalid { .. } => "AllValuesInvalidError",
            PipelineError::InvalidTimestamp { .. } => "InvalidTimestampError",
            PipelineError::InsufficientData { .. } => "InsufficientDataError",
            PipelineError::ModelFit { .. } => "ModelFitError",
            PipelineError::InvalidParameter(_) => "InvalidParameter",
            PipelineError::DataSource(_) => "DataSourceError",
            PipelineError::IoError(_) => "IoError",
            PipelineError::CsvError(_) => "CsvError",
            PipelineError::JsonError(_) => "JsonError",
            PipelineError::PolarsError(_) => "PolarsError",
        }
    }
}
