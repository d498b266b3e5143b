//! # Stock Forecast
//!
//! Workspace facade over the forecasting crates.
//!
//! - [`math`]: least squares, Fourier seasonality and residual statistics
//! - [`pipeline`]: ingestion, validation and the forecasting pipeline
//!
//! ## Example
//!
//! ```
//! use stock_forecast_workspace::pipeline::orchestrator::Horizon;
//!
//! let horizon = Horizon::from_years(2).unwrap();
//! assert_eq!(horizon.days(), 730);
//! ```

pub use forecast_math as math;
pub use forecast_pipeline as pipeline;

pub use forecast_pipeline::{
    ForecastPipeline, ForecastRecord, ForecastRequest, ForecastSet, PipelineError,
    PipelineFailure, PipelineOutput,
};
