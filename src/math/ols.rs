//! Weighted least squares solver.
//!
//! In this project we repeatedly solve small linear regression problems of the form:
//!
//! ```text
//! minimize Σ w_i (y_i - x_i^T β)^2,   w_i = 1 / σ_i²
//! ```
//!
//! Offsets are modelled as polynomials in stellar parameters, so every model is
//! linear in β and one solve per fit is enough.
//!
//! Implementation choices:
//! - We scale rows by `sqrt(w_i)` and solve an ordinary least squares problem.
//! - We use SVD to solve the least-squares problem robustly even when the design
//!   matrix is tall (more rows than columns).
//!   (Nalgebra's `QR::solve` is intended for square systems and will panic for
//!   non-square matrices.)
//! - Temperatures (~6000 K) and metallicities (~0.1 dex) differ by orders of
//!   magnitude, so callers centre their columns before building the design
//!   matrix; the looser tolerances below catch what remains.

use nalgebra::{DMatrix, DVector};

/// Solve a least squares problem using SVD.
///
/// Returns `None` if the system is too ill-conditioned to solve robustly.
pub fn solve_least_squares(x: &DMatrix<f64>, y: &DVector<f64>) -> Option<DVector<f64>> {
    let svd = x.clone().svd(true, true);

    // Try progressively looser tolerances if strict solve fails.
    for &tol in &[1e-10, 1e-8, 1e-6] {
        if let Ok(beta) = svd.solve(y, tol) {
            if beta.iter().all(|v| v.is_finite()) {
                return Some(beta);
            }
        }
    }

    None
}

/// Solution of a weighted least squares problem.
#[derive(Debug, Clone)]
pub struct WeightedSolution {
    pub beta: DVector<f64>,
    /// Parameter covariance `(XᵀWX)⁻¹`.
    pub covariance: DMatrix<f64>,
    /// Σ w_i r_i²
    pub chi_squared: f64,
}

/// Solve `min Σ (y_i - x_i^T β)² / σ_i²` and return β with its covariance.
///
/// Returns `None` for mismatched shapes, non-positive errors or a singular system.
pub fn solve_weighted_least_squares(
    x: &DMatrix<f64>,
    y: &DVector<f64>,
    sigma: &DVector<f64>,
) -> Option<WeightedSolution> {
    let n = x.nrows();
    if y.len() != n || sigma.len() != n || n == 0 {
        return None;
    }
    if sigma.iter().any(|s| !(s.is_finite() && *s > 0.0)) {
        return None;
    }

    let mut xw = x.clone();
    let mut yw = y.clone();
    for i in 0..n {
        let w = 1.0 / sigma[i];
        xw.row_mut(i).scale_mut(w);
        yw[i] *= w;
    }

    let beta = solve_least_squares(&xw, &yw)?;
    let normal = xw.transpose() * &xw;
    let covariance = normal.try_inverse()?;
    let residuals = &yw - &xw * &beta;
    let chi_squared = residuals.norm_squared();

    Some(WeightedSolution {
        beta,
        covariance,
        chi_squared,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn least_squares_solves_simple_system() {
        // Fit y = 2 + 3x on x = [0,1,2]
        let x = DMatrix::from_row_slice(3, 2, &[1.0, 0.0, 1.0, 1.0, 1.0, 2.0]);
        let y = DVector::from_row_slice(&[2.0, 5.0, 8.0]);

        let beta = solve_least_squares(&x, &y).unwrap();
        assert!((beta[0] - 2.0).abs() < 1e-10);
        assert!((beta[1] - 3.0).abs() < 1e-10);
    }

    #[test]
    fn weighted_mean_is_recovered_with_its_error() {
        // A constant model reduces to the weighted mean with error 1/sqrt(Σw).
        let x = DMatrix::from_element(3, 1, 1.0);
        let y = DVector::from_row_slice(&[1.0, 2.0, 4.0]);
        let sigma = DVector::from_row_slice(&[1.0, 1.0, 2.0]);

        let sol = solve_weighted_least_squares(&x, &y, &sigma).unwrap();
        let weights = [1.0, 1.0, 0.25];
        let wsum: f64 = weights.iter().sum();
        let expected = (1.0 + 2.0 + 4.0 * 0.25) / wsum;
        assert!((sol.beta[0] - expected).abs() < 1e-10);
        assert!((sol.covariance[(0, 0)] - 1.0 / wsum).abs() < 1e-10);
    }

    #[test]
    fn weighted_solve_rejects_bad_errors() {
        let x = DMatrix::from_element(2, 1, 1.0);
        let y = DVector::from_row_slice(&[1.0, 2.0]);
        let sigma = DVector::from_row_slice(&[1.0, 0.0]);
        assert!(solve_weighted_least_squares(&x, &y, &sigma).is_none());
    }
}
