//! # Forecast Pipeline
//!
//! Daily price ingestion, validation and seasonal forecasting.
//!
//! ## Stages
//!
//! - **Normalize**: flatten composite headers, canonicalize column names,
//!   promote the date index to a column and coerce it to timestamps
//! - **Validate**: reject empty sources, missing columns, unusable targets and
//!   bad timestamps; keep missing-value markers for inspection
//! - **Train**: project to `(timestamp, value)` pairs, drop missing values,
//!   require at least two observations
//! - **Forecast**: fit a model, predict over history plus `years × 365` days
//! - **Assemble**: canonical `(timestamp, point_estimate, lower_bound, upper_bound)` rows
//!
//! Every stage returns a typed error from [`PipelineError`]; a run either
//! produces a complete [`ForecastSet`] or fails with the stage that broke.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use forecast_pipeline::cache::{CachedDataSource, FetchCache};
//! use forecast_pipeline::config::PipelineConfig;
//! use forecast_pipeline::pipeline::{ForecastPipeline, ForecastRequest};
//! use forecast_pipeline::source::CsvDataSource;
//! use forecast_pipeline::table::CsvLayout;
//!
//! let config = PipelineConfig::default();
//! let source = CachedDataSource::new(
//!     CsvDataSource::new("data", CsvLayout::default()),
//!     FetchCache::new(Some(config.cache_ttl())),
//! );
//! let pipeline = ForecastPipeline::with_seasonal_model(source, config)?;
//!
//! let output = pipeline.run(&ForecastRequest::new("GOOG", 1))?;
//! for record in output.forecast.tail(5) {
//!     println!("{} {:.2}", record.timestamp, record.point_estimate);
//! }
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

pub mod assemble;
pub mod cache;
pub mod config;
pub mod error;
pub mod models;
pub mod normalize;
pub mod orchestrator;
pub mod pipeline;
pub mod source;
pub mod table;
pub mod training;
pub mod validate;

// Re-export commonly used types
pub use crate::assemble::{
    ComponentRecord, ForecastComponents, ForecastRecord, ForecastResultAssembler, ForecastSet,
};
pub use crate::error::{ModelError, PipelineError};
pub use crate::models::{ForecastModel, RawPrediction, TrainedForecastModel};
pub use crate::normalize::{NormalizedTable, RawTableNormalizer};
pub use crate::orchestrator::{ForecastOrchestrator, Horizon};
pub use crate::pipeline::{ForecastPipeline, ForecastRequest, PipelineFailure, PipelineOutput};
pub use crate::table::{Cell, ColumnHeader, RawTable};
pub use crate::training::{TrainingSet, TrainingSetBuilder};
pub use crate::validate::{DataValidator, ValidatedTable};

// Version information
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
pub const NAME: &str = env!("CARGO_PKG_NAME");
