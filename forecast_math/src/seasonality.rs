//! Fourier series terms for periodic components

use serde::{Deserialize, Serialize};
use std::f64::consts::PI;

/// A periodic component represented by `order` sine/cosine pairs
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FourierSeasonality {
    /// Period length, in the same unit as the time argument
    period: f64,
    /// Number of harmonics
    order: usize,
}

impl FourierSeasonality {
    /// Weekly seasonality for a time axis measured in days
    pub fn weekly(order: usize) -> Self {
        Self { period: 7.0, order }
    }

    /// Yearly seasonality for a time axis measured in days
    pub fn yearly(order: usize) -> Self {
        Self {
            period: 365.25,
            order,
        }
    }

    /// Number of design columns this component contributes
    pub fn len(&self) -> usize {
        self.order * 2
    }

    pub fn is_empty(&self) -> bool {
        self.order == 0
    }

    /// Terms `[sin(2πkt/P), cos(2πkt/P)]` for `k = 1..=order`
    pub fn terms(&self, t: f64) -> Vec<f64> {
        let mut out = Vec::with_capacity(self.len());
        for k in 1..=self.order {
            let angle = 2.0 * PI * k as f64 * t / self.period;
            out.push(angle.sin());
            out.push(angle.cos());
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_terms_are_periodic() {
        let weekly = FourierSeasonality::weekly(3);
        let a = weekly.terms(2.0);
        let b = weekly.terms(9.0);
        assert_eq!(a.len(), 6);
        for (x, y) in a.iter().zip(b.iter()) {
            assert_relative_eq!(x, y, epsilon = 1e-9);
        }
    }

    #[test]
    fn test_zero_order_is_empty() {
        let none = FourierSeasonality::yearly(0);
        assert!(none.is_empty());
        assert!(none.terms(100.0).is_empty());
    }
}
