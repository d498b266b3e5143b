//! Fit/predict orchestration over history plus a future horizon

use crate::assemble::{ForecastResultAssembler, ForecastSet};
use crate::error::{ModelError, PipelineError, Result};
use crate::models::{ForecastModel, ModelResult, RawPrediction, TrainedForecastModel};
use crate::training::TrainingSet;
use chrono::{Duration as ChronoDuration, NaiveDateTime};
use log::{debug, info};
use std::any::Any;
use std::panic::{self, AssertUnwindSafe};
use std::sync::{mpsc, Arc};
use std::thread;
use std::time::Duration;

/// Calendar days per requested year. No leap-year adjustment.
pub const DAYS_PER_YEAR: usize = 365;

/// Forecast horizon in calendar days
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Horizon {
    days: usize,
}

impl Horizon {
    /// `years × 365` days; at least one year is required
    pub fn from_years(years: u32) -> Result<Self> {
        if years < 1 {
            return Err(PipelineError::InvalidParameter(
                "Forecast horizon must be at least 1 year".to_string(),
            ));
        }
        Ok(Self {
            days: years as usize * DAYS_PER_YEAR,
        })
    }

    pub fn from_days(days: usize) -> Self {
        Self { days }
    }

    pub fn days(&self) -> usize {
        self.days
    }
}

/// History timestamps in ascending order followed by `horizon` consecutive
/// days after the latest one. Duplicates are kept.
pub fn extend_axis(history: &[NaiveDateTime], horizon: Horizon) -> Vec<NaiveDateTime> {
    let mut axis = Vec::with_capacity(history.len() + horizon.days());
    axis.extend_from_slice(history);
    axis.sort();

    if let Some(&last) = axis.last() {
        axis.extend((1..=horizon.days() as i64).map(|d| last + ChronoDuration::days(d)));
    }
    axis
}

/// A trained model together with the history it was fitted on
#[derive(Debug)]
pub struct FittedModel<T> {
    trained: Arc<T>,
    history: Vec<NaiveDateTime>,
}

impl<T> FittedModel<T> {
    pub fn trained(&self) -> &T {
        &self.trained
    }

    pub fn history(&self) -> &[NaiveDateTime] {
        &self.history
    }
}

/// Drives the model capability through one fit and one predict
#[derive(Debug, Clone)]
pub struct ForecastOrchestrator<M: ForecastModel> {
    model: M,
    timeout: Option<Duration>,
}

impl<M: ForecastModel> ForecastOrchestrator<M> {
    /// Create an orchestrator with no time limit on model calls
    pub fn new(model: M) -> Self {
        Self {
            model,
            timeout: None,
        }
    }

    /// Bound each model call to `timeout`
    pub fn with_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn model(&self) -> &M {
        &self.model
    }

    /// Fit the model on the training set
    pub fn fit(&self, data: &TrainingSet) -> Result<FittedModel<M::Trained>> {
        let model = self.model.clone();
        let owned = data.clone();
        let trained = run_guarded(self.timeout, move || model.fit(&owned))
            .map_err(|e| PipelineError::model_fit(self.model.name(), e))?;

        info!("Fitted {} on {} observations", self.model.name(), data.len());

        Ok(FittedModel {
            trained: Arc::new(trained),
            history: data.timestamps(),
        })
    }

    /// Predict over the fitted history extended by `horizon`
    pub fn predict(
        &self,
        fitted: &FittedModel<M::Trained>,
        horizon: Horizon,
    ) -> Result<Vec<RawPrediction>> {
        let axis = extend_axis(&fitted.history, horizon);
        let expected = axis.len();
        debug!(
            "Predicting {} points ({} history + {} horizon days)",
            expected,
            fitted.history.len(),
            horizon.days()
        );

        let trained = Arc::clone(&fitted.trained);
        let predictions = run_guarded(self.timeout, move || trained.predict(&axis))
            .map_err(|e| PipelineError::model_fit(self.model.name(), e))?;

        if predictions.len() != expected {
            return Err(PipelineError::model_fit(
                self.model.name(),
                ModelError::Contract(format!(
                    "expected {} predictions, got {}",
                    expected,
                    predictions.len()
                )),
            ));
        }

        Ok(predictions)
    }

    /// Fit, predict and assemble in one call
    pub fn forecast(&self, data: &TrainingSet, horizon: Horizon) -> Result<ForecastSet> {
        let fitted = self.fit(data)?;
        let predictions = self.predict(&fitted, horizon)?;
        ForecastResultAssembler::assemble(self.model.name(), predictions)
    }
}

/// Run a model call, on a worker thread when a timeout is set.
///
/// Panics are caught and reported as [`ModelError::Panicked`]. A call that
/// times out is abandoned; its thread finishes in the background.
fn run_guarded<T, F>(timeout: Option<Duration>, job: F) -> ModelResult<T>
where
    T: Send + 'static,
    F: FnOnce() -> ModelResult<T> + Send + 'static,
{
    let Some(limit) = timeout else {
        return panic::catch_unwind(AssertUnwindSafe(job))
            .unwrap_or_else(|payload| Err(ModelError::Panicked(panic_message(payload))));
    };

    let (tx, rx) = mpsc::channel();
    thread::Builder::new()
        .name("model-call".to_string())
        .spawn(move || {
            let outcome = panic::catch_unwind(AssertUnwindSafe(job));
            // The receiver is gone if the caller already timed out
            let _ = tx.send(outcome);
        })
        .map_err(|e| ModelError::Panicked(format!("could not start model thread: {}", e)))?;

    match rx.recv_timeout(limit) {
        Ok(Ok(result)) => result,
        Ok(Err(payload)) => Err(ModelError::Panicked(panic_message(payload))),
        Err(mpsc::RecvTimeoutError::Timeout) => Err(ModelError::Timeout(limit)),
        Err(mpsc::RecvTimeoutError::Disconnected) => Err(ModelError::Panicked(
            "model thread exited without a result".to_string(),
        )),
    }
}

fn panic_message(payload: Box<dyn Any + Send>) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn day(d: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2024, 1, d)
            .unwrap()
            .and_hms_opt(0, 0, 0)
            .unwrap()
    }

    #[test]
    fn test_horizon_from_years() {
        assert_eq!(Horizon::from_years(1).unwrap().days(), 365);
        assert_eq!(Horizon::from_years(4).unwrap().days(), 1460);
        assert!(Horizon::from_years(0).is_err());
    }

    #[test]
    fn test_extend_axis_sorts_history_and_appends_days() {
        let axis = extend_axis(&[day(3), day(1), day(3)], Horizon::from_days(2));
        assert_eq!(axis, vec![day(1), day(3), day(3), day(4), day(5)]);
    }

    #[test]
    fn test_extend_axis_empty_history() {
        assert!(extend_axis(&[], Horizon::from_days(5)).is_empty());
    }

    #[test]
    fn test_run_guarded_reports_timeout() {
        let result: ModelResult<()> = run_guarded(Some(Duration::from_millis(20)), || {
            thread::sleep(Duration::from_millis(500));
            Ok(())
        });
        assert!(matches!(result, Err(ModelError::Timeout(_))));
    }

    #[test]
    fn test_run_guarded_catches_panics() {
        let inline: ModelResult<()> = run_guarded(None, || panic!("boom"));
        assert!(matches!(inline, Err(ModelError::Panicked(ref m)) if m == "boom"));

        let threaded: ModelResult<()> =
            run_guarded(Some(Duration::from_secs(5)), || panic!("boom"));
        assert!(matches!(threaded, Err(ModelError::Panicked(_))));
    }
}
