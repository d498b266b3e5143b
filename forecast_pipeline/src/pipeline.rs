//! Request-level pipeline: fetch, normalize, validate, train, fit, predict

use crate::assemble::{ForecastComponents, ForecastResultAssembler, ForecastSet};
use crate::config::PipelineConfig;
use crate::error::{PipelineError, Result};
use crate::models::seasonal::SeasonalModel;
use crate::models::ForecastModel;
use crate::normalize::RawTableNormalizer;
use crate::orchestrator::{ForecastOrchestrator, Horizon};
use crate::source::{DataSource, DateRange};
use crate::table::RawTable;
use crate::training::{TrainingSet, TrainingSetBuilder};
use crate::validate::{DataValidator, ValidatedTable};
use chrono::{Local, NaiveDate};
use log::{debug, error, info, warn};
use std::fmt;
use thiserror::Error;

/// Stages of one pipeline run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PipelineStage {
    Idle,
    Normalizing,
    Validating,
    BuildingTrainingSet,
    Fitting,
    Predicting,
    Assembled,
    Failed,
}

impl PipelineStage {
    /// The stage a successful step advances to
    pub fn next(self) -> Option<Self> {
        use PipelineStage::*;
        match self {
            Idle => Some(Normalizing),
            Normalizing => Some(Validating),
            Validating => Some(BuildingTrainingSet),
            BuildingTrainingSet => Some(Fitting),
            Fitting => Some(Predicting),
            Predicting => Some(Assembled),
            Assembled | Failed => None,
        }
    }

    pub fn is_terminal(self) -> bool {
        matches!(self, PipelineStage::Assembled | PipelineStage::Failed)
    }
}

impl fmt::Display for PipelineStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            PipelineStage::Idle => "idle",
            PipelineStage::Normalizing => "normalizing",
            PipelineStage::Validating => "validating",
            PipelineStage::BuildingTrainingSet => "building training set",
            PipelineStage::Fitting => "fitting",
            PipelineStage::Predicting => "predicting",
            PipelineStage::Assembled => "assembled",
            PipelineStage::Failed => "failed",
        };
        f.write_str(name)
    }
}

/// Non-fatal conditions raised during a run
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PipelineWarning {
    /// Rows dropped because the target value was missing or not numeric
    DroppedInvalidValues { column: String, rows: Vec<usize> },
    /// The instrument is not among the configured instruments
    UnlistedInstrument { instrument: String },
}

impl fmt::Display for PipelineWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PipelineWarning::DroppedInvalidValues { column, rows } => write!(
                f,
                "Some '{}' values are missing or invalid. Dropped {} row(s).",
                column,
                rows.len()
            ),
            PipelineWarning::UnlistedInstrument { instrument } => {
                write!(f, "Instrument {} is not in the configured list", instrument)
            }
        }
    }
}

/// User request: which instrument, how many years ahead
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ForecastRequest {
    pub instrument: String,
    pub years: u32,
    /// Exclusive end of the requested history
    pub as_of: NaiveDate,
}

impl ForecastRequest {
    /// Request as of today
    pub fn new(instrument: impl Into<String>, years: u32) -> Self {
        Self::as_of(instrument, years, Local::now().date_naive())
    }

    pub fn as_of(instrument: impl Into<String>, years: u32, as_of: NaiveDate) -> Self {
        Self {
            instrument: instrument.into(),
            years,
            as_of,
        }
    }
}

/// Everything a presentation layer needs from a successful run
#[derive(Debug, Clone)]
pub struct PipelineOutput {
    pub instrument: String,
    pub history: ValidatedTable,
    pub training: TrainingSet,
    pub forecast: ForecastSet,
    /// Trend and seasonal breakdown of `forecast`, record for record
    pub components: ForecastComponents,
    pub warnings: Vec<PipelineWarning>,
    /// Stages visited, ending in `Assembled`
    pub stages: Vec<PipelineStage>,
}

/// A run that stopped with an error
#[derive(Debug, Error)]
#[error("pipeline failed while {stage}: {error}")]
pub struct PipelineFailure {
    /// Stage that was active when the error occurred
    pub stage: PipelineStage,
    #[source]
    pub error: PipelineError,
    /// Stages visited, ending in `Failed`
    pub stages: Vec<PipelineStage>,
}

/// Records stage transitions and tags errors with the stage they came from
#[derive(Debug)]
struct StageTracker {
    current: PipelineStage,
    visited: Vec<PipelineStage>,
}

impl StageTracker {
    fn new() -> Self {
        Self {
            current: PipelineStage::Idle,
            visited: vec![PipelineStage::Idle],
        }
    }

    /// Run `work` in the current stage
    fn within<T>(&mut self, work: impl FnOnce() -> Result<T>) -> std::result::Result<T, PipelineFailure> {
        work().map_err(|error| self.fail(error))
    }

    /// Advance to the next stage, then run `work` in it
    fn step<T>(&mut self, work: impl FnOnce() -> Result<T>) -> std::result::Result<T, PipelineFailure> {
        self.advance();
        self.within(work)
    }

    fn advance(&mut self) {
        if let Some(next) = self.current.next() {
            debug!("Pipeline stage: {} -> {}", self.current, next);
            self.current = next;
            self.visited.push(next);
        }
    }

    fn fail(&mut self, error: PipelineError) -> PipelineFailure {
        error!("Pipeline failed while {}: {}", self.current, error);
        self.visited.push(PipelineStage::Failed);
        PipelineFailure {
            stage: self.current,
            error,
            stages: std::mem::take(&mut self.visited),
        }
    }
}

/// End-to-end forecasting pipeline over a data source and a model
#[derive(Debug)]
pub struct ForecastPipeline<S, M: ForecastModel> {
    source: S,
    config: PipelineConfig,
    validator: DataValidator,
    orchestrator: ForecastOrchestrator<M>,
}

impl<S: DataSource> ForecastPipeline<S, SeasonalModel> {
    /// Pipeline using the bundled seasonal model configured from `config`
    pub fn with_seasonal_model(source: S, config: PipelineConfig) -> Result<Self> {
        let model = SeasonalModel::new(config.interval_width)?.with_seasonality(config.seasonality);
        Self::new(source, model, config)
    }
}

impl<S: DataSource, M: ForecastModel> ForecastPipeline<S, M> {
    /// Create a pipeline; the configuration is validated first
    pub fn new(source: S, model: M, config: PipelineConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            source,
            validator: DataValidator::new(config.target_column.clone()),
            orchestrator: ForecastOrchestrator::new(model).with_timeout(config.fit_timeout()),
            config,
        })
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    pub fn source(&self) -> &S {
        &self.source
    }

    /// Fetch history for the request and forecast it
    pub fn run(&self, request: &ForecastRequest) -> std::result::Result<PipelineOutput, PipelineFailure> {
        let mut tracker = StageTracker::new();
        info!(
            "Forecasting {} for {} year(s) as of {}",
            request.instrument, request.years, request.as_of
        );

        let horizon = tracker.within(|| self.horizon_for(request.years))?;
        let raw = tracker.within(|| {
            let range = DateRange::new(self.config.history_start, request.as_of)?;
            self.source.fetch(&request.instrument, &range)
        })?;

        let mut output = self.execute(tracker, &request.instrument, &raw, horizon)?;
        if !self.config.is_listed(&request.instrument) {
            output.warnings.insert(
                0,
                PipelineWarning::UnlistedInstrument {
                    instrument: request.instrument.clone(),
                },
            );
        }
        Ok(output)
    }

    /// Forecast an already-fetched table
    pub fn run_table(
        &self,
        instrument: &str,
        raw: &RawTable,
        horizon: Horizon,
    ) -> std::result::Result<PipelineOutput, PipelineFailure> {
        self.execute(StageTracker::new(), instrument, raw, horizon)
    }

    fn execute(
        &self,
        mut tracker: StageTracker,
        instrument: &str,
        raw: &RawTable,
        horizon: Horizon,
    ) -> std::result::Result<PipelineOutput, PipelineFailure> {
        let normalized = tracker.step(|| Ok(RawTableNormalizer::normalize(raw)))?;
        let history = tracker.step(|| self.validator.validate(instrument, &normalized))?;
        let training = tracker.step(|| TrainingSetBuilder::build(&history))?;
        let fitted = tracker.step(|| self.orchestrator.fit(&training))?;
        let (forecast, components) = tracker.step(|| {
            let predictions = self.orchestrator.predict(&fitted, horizon)?;
            let components = ForecastResultAssembler::components(&predictions);
            let forecast =
                ForecastResultAssembler::assemble(self.orchestrator.model().name(), predictions)?;
            Ok((forecast, components))
        })?;
        tracker.advance();

        let mut warnings = Vec::new();
        if !training.dropped_rows().is_empty() {
            let warning = PipelineWarning::DroppedInvalidValues {
                column: history.target_column().to_string(),
                rows: training.dropped_rows().to_vec(),
            };
            warn!("{}", warning);
            warnings.push(warning);
        }

        info!(
            "Forecast for {} ready: {} records ({} history, {} horizon days)",
            instrument,
            forecast.len(),
            training.len(),
            horizon.days()
        );

        Ok(PipelineOutput {
            instrument: instrument.to_string(),
            history,
            training,
            forecast,
            components,
            warnings,
            stages: tracker.visited,
        })
    }

    fn horizon_for(&self, years: u32) -> Result<Horizon> {
        if years > self.config.max_horizon_years {
            return Err(PipelineError::InvalidParameter(format!(
                "Forecast horizon of {} years exceeds the maximum of {}",
                years, self.config.max_horizon_years
            )));
        }
        Horizon::from_years(years)
    }
}
