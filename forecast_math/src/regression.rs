//! Least squares fitting for linear models
//!
//! The design matrix is supplied row-wise. Column 0 is treated as the
//! intercept and is never penalised by the ridge term.

use crate::{MathError, Result};

/// Pivots smaller than this are treated as zero
const PIVOT_EPSILON: f64 = 1e-12;

/// Fit `target ≈ design · beta` by ridge-regularised least squares.
///
/// Solves `(XᵀX + λI') beta = Xᵀy`, where `I'` is the identity with the
/// intercept entry zeroed. A small positive `ridge` keeps the system
/// solvable when there are more columns than rows.
pub fn ridge_least_squares(design: &[Vec<f64>], target: &[f64], ridge: f64) -> Result<Vec<f64>> {
    if design.is_empty() {
        return Err(MathError::InsufficientData(
            "Design matrix has no rows".to_string(),
        ));
    }
    if design.len() != target.len() {
        return Err(MathError::InvalidInput(format!(
            "Design matrix has {} rows but target has {} values",
            design.len(),
            target.len()
        )));
    }
    if ridge < 0.0 || !ridge.is_finite() {
        return Err(MathError::InvalidInput(format!(
            "Ridge penalty must be a non-negative finite number, got {}",
            ridge
        )));
    }

    let columns = design[0].len();
    if columns == 0 {
        return Err(MathError::InvalidInput(
            "Design matrix has no columns".to_string(),
        ));
    }
    if let Some(bad) = design.iter().position(|row| row.len() != columns) {
        return Err(MathError::InvalidInput(format!(
            "Row {} has {} columns, expected {}",
            bad,
            design[bad].len(),
            columns
        )));
    }

    let mut gram = vec![vec![0.0; columns]; columns];
    let mut rhs = vec![0.0; columns];

    for (row, &y) in design.iter().zip(target.iter()) {
        for i in 0..columns {
            rhs[i] += row[i] * y;
            for j in i..columns {
                gram[i][j] += row[i] * row[j];
            }
        }
    }

    // Mirror the upper triangle and apply the penalty
    for i in 0..columns {
        for j in 0..i {
            gram[i][j] = gram[j][i];
        }
        if i > 0 {
            gram[i][i] += ridge;
        }
    }

    solve_linear_system(gram, rhs)
}

/// Solve `a · x = b` by Gaussian elimination with partial pivoting.
pub fn solve_linear_system(mut a: Vec<Vec<f64>>, mut b: Vec<f64>) -> Result<Vec<f64>> {
    let n = b.len();
    if a.len() != n || a.iter().any(|row| row.len() != n) {
        return Err(MathError::InvalidInput(format!(
            "Expected a {}x{} coefficient matrix",
            n, n
        )));
    }

    for col in 0..n {
        let pivot_row = (col..n)
            .max_by(|&x, &y| a[x][col].abs().total_cmp(&a[y][col].abs()))
            .unwrap_or(col);

        if a[pivot_row][col].abs() < PIVOT_EPSILON {
            return Err(MathError::CalculationError(format!(
                "Singular system: no usable pivot in column {}",
                col
            )));
        }

        a.swap(col, pivot_row);
        b.swap(col, pivot_row);

        for row in (col + 1)..n {
            let factor = a[row][col] / a[col][col];
            if factor == 0.0 {
                continue;
            }
            for k in col..n {
                a[row][k] -= factor * a[col][k];
            }
            b[row] -= factor * b[col];
        }
    }

    let mut x = vec![0.0; n];
    for row in (0..n).rev() {
        let tail: f64 = ((row + 1)..n).map(|k| a[row][k] * x[k]).sum();
        x[row] = (b[row] - tail) / a[row][row];
    }

    if x.iter().any(|v| !v.is_finite()) {
        return Err(MathError::CalculationError(
            "Solution contains non-finite values".to_string(),
        ));
    }

    Ok(x)
}

/// Dot product of a design row with fitted coefficients
pub fn predict_row(row: &[f64], coefficients: &[f64]) -> f64 {
    row.iter().zip(coefficients.iter()).map(|(x, b)| x * b).sum()
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_recovers_exact_line() {
        // y = 2 + 3x
        let design: Vec<Vec<f64>> = (0..5).map(|x| vec![1.0, x as f64]).collect();
        let target: Vec<f64> = (0..5).map(|x| 2.0 + 3.0 * x as f64).collect();

        let beta = ridge_least_squares(&design, &target, 0.0).unwrap();
        assert_relative_eq!(beta[0], 2.0, epsilon = 1e-9);
        assert_relative_eq!(beta[1], 3.0, epsilon = 1e-9);
    }

    #[test]
    fn test_ridge_handles_underdetermined_system() {
        // Two rows, four columns: singular without the penalty
        let design = vec![vec![1.0, 0.0, 0.5, 0.5], vec![1.0, 1.0, -0.5, 0.5]];
        let target = vec![10.0, 12.0];

        assert!(ridge_least_squares(&design, &target, 0.0).is_err());
        let beta = ridge_least_squares(&design, &target, 1e-3).unwrap();
        assert_eq!(beta.len(), 4);
        assert!(beta.iter().all(|b| b.is_finite()));
    }

    #[test]
    fn test_rejects_mismatched_lengths() {
        let design = vec![vec![1.0, 0.0]];
        let result = ridge_least_squares(&design, &[1.0, 2.0], 0.0);
        assert!(matches!(result, Err(MathError::InvalidInput(_))));
    }

    #[test]
    fn test_solve_linear_system_with_pivoting() {
        // Zero in the leading position forces a row swap
        let a = vec![vec![0.0, 1.0], vec![2.0, 1.0]];
        let x = solve_linear_system(a, vec![3.0, 5.0]).unwrap();
        assert_relative_eq!(x[0], 1.0, epsilon = 1e-12);
        assert_relative_eq!(x[1], 3.0, epsilon = 1e-12);
    }

    #[test]
    fn test_predict_row() {
        assert_relative_eq!(predict_row(&[1.0, 2.0], &[0.5, 1.5]), 3.5);
    }
}
