//! Summary statistics over residuals

use crate::{MathError, Result};

/// Residual standard deviation with `parameters` degrees of freedom removed.
///
/// Falls back to dividing by `n` when there are no spare degrees of freedom.
pub fn residual_std_dev(residuals: &[f64], parameters: usize) -> Result<f64> {
    if residuals.is_empty() {
        return Err(MathError::InsufficientData(
            "No residuals to summarise".to_string(),
        ));
    }

    let n = residuals.len();
    let denominator = if n > parameters { n - parameters } else { n };
    let sse: f64 = residuals.iter().map(|r| r * r).sum();

    Ok((sse / denominator as f64).sqrt())
}
