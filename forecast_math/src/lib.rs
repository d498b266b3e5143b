//! # Forecast Math
//!
//! Numeric building blocks for additive seasonal trend models.
//! This crate provides ridge-regularised least squares, Fourier seasonality
//! terms and residual statistics.

use thiserror::Error;

pub mod regression;
pub mod seasonality;
pub mod stats;

/// Errors that can occur in forecasting calculations
#[derive(Error, Debug, Clone, PartialEq)]
pub enum MathError {
    #[error("Insufficient data for calculation: {0}")]
    InsufficientData(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Calculation error: {0}")]
    CalculationError(String),
}

/// Result type for forecasting math operations
pub type Result<T> = std::result::Result<T, MathError>;

pub use regression::{predict_row, ridge_least_squares, solve_linear_system};
pub use seasonality::FourierSeasonality;
pub use stats::residual_std_dev;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = MathError::InsufficientData("need 2 points".to_string());
        assert_eq!(
            err.to_string(),
            "Insufficient data for calculation: need 2 points"
        );
    }
}
