//! Additive trend plus Fourier seasonality, fitted by ridge least squares

use crate::error::{ModelError, PipelineError, Result};
use crate::models::{ForecastModel, ModelResult, RawPrediction, TrainedForecastModel};
use crate::training::TrainingSet;
use chrono::NaiveDateTime;
use forecast_math::{predict_row, residual_std_dev, ridge_least_squares, FourierSeasonality};
use forecast_math::MathError;
use log::debug;
use serde::{Deserialize, Serialize};
use statrs::distribution::{ContinuousCDF, Normal};

const SECONDS_PER_DAY: f64 = 86_400.0;

/// Fourier orders of the seasonal components
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SeasonalityConfig {
    pub weekly_order: usize,
    pub yearly_order: usize,
}

impl Default for SeasonalityConfig {
    fn default() -> Self {
        Self {
            weekly_order: 3,
            yearly_order: 10,
        }
    }
}

/// Seasonal trend model
#[derive(Debug, Clone)]
pub struct SeasonalModel {
    /// Name of the model
    name: String,
    /// Seasonal components to include
    seasonality: SeasonalityConfig,
    /// Probability mass covered by the uncertainty interval
    interval_width: f64,
    /// Ridge penalty on the non-intercept coefficients
    ridge: f64,
}

/// Fitted seasonal trend model
#[derive(Debug, Clone)]
pub struct TrainedSeasonalModel {
    name: String,
    /// Day zero of the time axis
    origin: NaiveDateTime,
    /// Span of the training history in days
    span_days: f64,
    /// Values are divided by this before fitting
    y_scale: f64,
    weekly: FourierSeasonality,
    yearly: FourierSeasonality,
    coefficients: Vec<f64>,
    /// Residual standard deviation, in value units
    sigma: f64,
    /// Normal quantile for the interval width
    z: f64,
}

impl SeasonalModel {
    /// Create a new model with the given interval width
    pub fn new(interval_width: f64) -> Result<Self> {
        if !(interval_width > 0.0 && interval_width < 1.0) {
            return Err(PipelineError::InvalidParameter(format!(
                "Interval width must be between 0 and 1, got {}",
                interval_width
            )));
        }

        Ok(Self {
            name: "Seasonal Trend".to_string(),
            seasonality: SeasonalityConfig::default(),
            interval_width,
            ridge: 1e-2,
        })
    }

    pub fn with_seasonality(mut self, seasonality: SeasonalityConfig) -> Self {
        self.seasonality = seasonality;
        self
    }

    pub fn with_ridge(mut self, ridge: f64) -> Self {
        self.ridge = ridge;
        self
    }

    pub fn interval_width(&self) -> f64 {
        self.interval_width
    }
}

impl ForecastModel for SeasonalModel {
    type Trained = TrainedSeasonalModel;

    fn fit(&self, data: &TrainingSet) -> ModelResult<Self::Trained> {
        let points = data.points();
        if points.len() < 2 {
            return Err(ModelError::DegenerateInput(format!(
                "need at least 2 observations, got {}",
                points.len()
            )));
        }
        if let Some(bad) = points.iter().find(|p| !p.y.is_finite()) {
            return Err(ModelError::DegenerateInput(format!(
                "non-finite value {} at {}",
                bad.y, bad.ds
            )));
        }

        let origin = points.iter().map(|p| p.ds).min().unwrap_or(points[0].ds);
        let last = points.iter().map(|p| p.ds).max().unwrap_or(points[0].ds);
        let span_days = days_between(origin, last);
        if span_days <= 0.0 {
            return Err(ModelError::DegenerateInput(
                "all timestamps are identical".to_string(),
            ));
        }

        let y_scale = points
            .iter()
            .map(|p| p.y.abs())
            .fold(0.0, f64::max)
            .max(f64::MIN_POSITIVE);

        let mut trained = TrainedSeasonalModel {
            name: self.name.clone(),
            origin,
            span_days,
            y_scale,
            weekly: FourierSeasonality::weekly(self.seasonality.weekly_order),
            yearly: FourierSeasonality::yearly(self.seasonality.yearly_order),
            coefficients: Vec::new(),
            sigma: 0.0,
            z: normal_quantile(self.interval_width)?,
        };

        let design: Vec<Vec<f64>> = points.iter().map(|p| trained.design_row(p.ds)).collect();
        let target: Vec<f64> = points.iter().map(|p| p.y / y_scale).collect();
        trained.coefficients = ridge_least_squares(&design, &target, self.ridge)?;

        let residuals: Vec<f64> = design
            .iter()
            .zip(target.iter())
            .map(|(row, y)| y - predict_row(row, &trained.coefficients))
            .collect();
        trained.sigma = residual_std_dev(&residuals, trained.coefficients.len())? * y_scale;

        if !trained.sigma.is_finite() {
            return Err(ModelError::NonConvergence(
                "residual spread is not finite".to_string(),
            ));
        }

        debug!(
            "Fitted {} on {} points spanning {:.0} days (sigma {:.4})",
            self.name,
            points.len(),
            span_days,
            trained.sigma
        );

        Ok(trained)
    }

    fn name(&self) -> &str {
        &self.name
    }
}

impl TrainedSeasonalModel {
    /// `[1, trend, weekly.., yearly..]` for one timestamp
    fn design_row(&self, ds: NaiveDateTime) -> Vec<f64> {
        let t = days_between(self.origin, ds);
        let mut row = Vec::with_capacity(2 + self.weekly.len() + self.yearly.len());
        row.push(1.0);
        row.push(t / self.span_days);
        row.extend(self.weekly.terms(t));
        row.extend(self.yearly.terms(t));
        row
    }

    /// Residual standard deviation of the fit
    pub fn sigma(&self) -> f64 {
        self.sigma
    }
}

impl TrainedForecastModel for TrainedSeasonalModel {
    fn predict(&self, axis: &[NaiveDateTime]) -> ModelResult<Vec<RawPrediction>> {
        let weekly_end = 2 + self.weekly.len();
        let coefficients = &self.coefficients;

        let predictions = axis
            .iter()
            .map(|&ds| {
                let row = self.design_row(ds);
                let trend = predict_row(&row[..2], &coefficients[..2]) * self.y_scale;
                let weekly =
                    predict_row(&row[2..weekly_end], &coefficients[2..weekly_end]) * self.y_scale;
                let yearly =
                    predict_row(&row[weekly_end..], &coefficients[weekly_end..]) * self.y_scale;
                let yhat = trend + weekly + yearly;

                // Uncertainty grows with distance past the end of history
                let beyond = (row[1] - 1.0).max(0.0);
                let half_width = self.z * self.sigma * (1.0 + beyond).sqrt();

                RawPrediction {
                    ds,
                    yhat,
                    yhat_lower: yhat - half_width,
                    yhat_upper: yhat + half_width,
                    trend,
                    weekly,
                    yearly,
                }
            })
            .collect();

        Ok(predictions)
    }

    fn name(&self) -> &str {
        &self.name
    }
}

fn days_between(from: NaiveDateTime, to: NaiveDateTime) -> f64 {
    (to - from).num_seconds() as f64 / SECONDS_PER_DAY
}

fn normal_quantile(interval_width: f64) -> ModelResult<f64> {
    let normal = Normal::new(0.0, 1.0)
        .map_err(|e| MathError::CalculationError(e.to_string()))?;
    Ok(normal.inverse_cdf(0.5 + interval_width / 2.0))
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use chrono::{Duration, NaiveDate};

    fn start() -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2023, 1, 1)
            .unwrap()
            .and_hms_opt(0, 0, 0)
            .unwrap()
    }

    fn linear_set(n: i64) -> TrainingSet {
        TrainingSet::from_pairs((0..n).map(|i| (start() + Duration::days(i), 100.0 + 0.5 * i as f64)))
            .unwrap()
    }

    #[test]
    fn test_rejects_bad_interval_width() {
        assert!(SeasonalModel::new(0.0).is_err());
        assert!(SeasonalModel::new(1.0).is_err());
        assert!(SeasonalModel::new(0.8).is_ok());
    }

    #[test]
    fn test_fits_linear_trend() {
        let model = SeasonalModel::new(0.8)
            .unwrap()
            .with_seasonality(SeasonalityConfig {
                weekly_order: 0,
                yearly_order: 0,
            })
            .with_ridge(0.0);
        let trained = model.fit(&linear_set(30)).unwrap();

        let axis = vec![start() + Duration::days(10)];
        let prediction = trained.predict(&axis).unwrap();
        assert_relative_eq!(prediction[0].yhat, 105.0, epsilon = 1e-6);
        assert_relative_eq!(prediction[0].weekly, 0.0);
    }

    #[test]
    fn test_bounds_bracket_estimate_and_widen() {
        let trained = SeasonalModel::new(0.8).unwrap().fit(&linear_set(60)).unwrap();
        let near = start() + Duration::days(61);
        let far = start() + Duration::days(400);
        let predictions = trained.predict(&[near, far]).unwrap();

        for p in &predictions {
            assert!(p.yhat_lower <= p.yhat && p.yhat <= p.yhat_upper);
            assert_relative_eq!(p.trend + p.weekly + p.yearly, p.yhat, epsilon = 1e-9);
        }
        let near_width = predictions[0].yhat_upper - predictions[0].yhat_lower;
        let far_width = predictions[1].yhat_upper - predictions[1].yhat_lower;
        assert!(far_width >= near_width);
    }

    #[test]
    fn test_identical_timestamps_are_degenerate() {
        let set = TrainingSet::from_pairs(vec![(start(), 1.0), (start(), 2.0)]).unwrap();
        let err = SeasonalModel::new(0.8).unwrap().fit(&set).unwrap_err();
        assert!(matches!(err, ModelError::DegenerateInput(_)));
    }

    #[test]
    fn test_two_points_are_enough() {
        let set = TrainingSet::from_pairs(vec![
            (start(), 10.0),
            (start() + Duration::days(1), 11.0),
        ])
        .unwrap();
        let trained = SeasonalModel::new(0.8).unwrap().fit(&set).unwrap();
        let predictions = trained.predict(&set.timestamps()).unwrap();
        assert_eq!(predictions.len(), 2);
        assert!(predictions.iter().all(|p| p.yhat.is_finite()));
    }
}
