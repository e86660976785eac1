//! Weighted fits of the stellar-parameter models.
//!
//! Given:
//! - stellar parameters for each star
//! - observed offsets `y_i` with errors `σ_i`
//! - a model kind
//!
//! we solve a weighted least squares problem for the coefficients, and return
//! them with their covariance, the residuals and fit diagnostics.
//!
//! Design columns are standardized before solving (temperature and its square
//! are ~1e4 and ~1e7 while metallicity is ~0.1) and the coefficients and
//! covariance are transformed back, so callers always see raw-unit coefficients
//! usable with [`crate::models::predict`].

use nalgebra::{DMatrix, DVector};

use crate::domain::ModelKind;
use crate::fit::FitError;
use crate::math::{chi_squared_nu, solve_weighted_least_squares};
use crate::models::{StellarCoords, fill_design_row, predict};

/// Result of fitting one model to one set of offsets.
#[derive(Debug, Clone)]
pub struct ModelFit {
    pub model: ModelKind,
    pub betas: Vec<f64>,
    pub covariance: DMatrix<f64>,
    pub residuals: Vec<f64>,
    pub chi_squared: f64,
    pub chi_squared_nu: f64,
    /// Bayesian information criterion `χ² + k ln(n)`.
    pub bic: f64,
}

impl ModelFit {
    pub fn predict(&self, s: &StellarCoords) -> f64 {
        predict(self.model, s, &self.betas)
    }
}

/// Fit `model` to `values ± errors` observed for stars at `coords`.
pub fn fit_model(
    model: ModelKind,
    coords: &[StellarCoords],
    values: &[f64],
    errors: &[f64],
) -> Result<ModelFit, FitError> {
    let n = coords.len();
    let k = model.param_count();
    if values.len() != n || errors.len() != n {
        return Err(FitError::Inconsistent(format!(
            "{n} stars, {} values, {} errors",
            values.len(),
            errors.len()
        )));
    }
    if n < k {
        return Err(FitError::TooFewPoints { got: n, needed: k });
    }

    // 1) Raw design matrix.
    let mut x = DMatrix::zeros(n, k);
    let mut row = vec![0.0; k];
    for (i, s) in coords.iter().enumerate() {
        fill_design_row(model, s, &mut row);
        for (j, v) in row.iter().enumerate() {
            x[(i, j)] = *v;
        }
    }

    // 2) Standardize the non-intercept columns.
    let mut centres = vec![0.0; k];
    let mut scales = vec![1.0; k];
    for j in 1..k {
        let col = x.column(j);
        let mean = col.mean();
        let spread = col.iter().map(|v| (v - mean).abs()).fold(0.0, f64::max);
        centres[j] = mean;
        scales[j] = if spread > 0.0 { spread } else { 1.0 };
        for i in 0..n {
            x[(i, j)] = (x[(i, j)] - centres[j]) / scales[j];
        }
    }

    // 3) Solve in standardized space.
    let y = DVector::from_column_slice(values);
    let sigma = DVector::from_column_slice(errors);
    let solution = solve_weighted_least_squares(&x, &y, &sigma)
        .ok_or_else(|| FitError::Singular(format!("{} model with {n} stars", model.name())))?;

    // 4) Back to raw coefficients: β_j = γ_j / s_j, β_0 = γ_0 - Σ γ_j c_j / s_j.
    let mut transform = DMatrix::zeros(k, k);
    transform[(0, 0)] = 1.0;
    for j in 1..k {
        transform[(j, j)] = 1.0 / scales[j];
        transform[(0, j)] = -centres[j] / scales[j];
    }
    let betas = &transform * &solution.beta;
    let covariance = &transform * &solution.covariance * transform.transpose();

    let betas: Vec<f64> = betas.iter().copied().collect();
    let residuals: Vec<f64> = coords
        .iter()
        .zip(values)
        .map(|(s, v)| v - predict(model, s, &betas))
        .collect();

    Ok(ModelFit {
        model,
        chi_squared_nu: chi_squared_nu(&residuals, errors, k),
        bic: solution.chi_squared + k as f64 * (n as f64).ln(),
        chi_squared: solution.chi_squared,
        betas,
        covariance,
        residuals,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand::rngs::StdRng;
    use rand_distr::{Distribution, Normal, Uniform};

    fn random_stars(n: usize, seed: u64) -> Vec<StellarCoords> {
        let mut rng = StdRng::seed_from_u64(seed);
        let t = Uniform::new(5400.0, 6250.0);
        let m = Uniform::new(-0.7, 0.4);
        let g = Uniform::new(4.1, 4.6);
        let v = Uniform::new(3.5, 6.0);
        (0..n)
            .map(|_| StellarCoords {
                temperature: t.sample(&mut rng),
                metallicity: m.sample(&mut rng),
                gravity: g.sample(&mut rng),
                magnitude: v.sample(&mut rng),
            })
            .collect()
    }

    #[test]
    fn recovers_exact_quadratic_coefficients() {
        let stars = random_stars(40, 7);
        let truth = [120.0, -0.05, 30.0, 8.0, 4e-6, -12.0, 1.5];
        let values: Vec<f64> = stars
            .iter()
            .map(|s| predict(ModelKind::Quadratic, s, &truth))
            .collect();
        let errors = vec![1.0; stars.len()];
        let fit = fit_model(ModelKind::Quadratic, &stars, &values, &errors).unwrap();
        for (b, t) in fit.betas.iter().zip(truth) {
            assert!((b - t).abs() <= 1e-6 * t.abs().max(1.0), "{b} vs {t}");
        }
        assert!(fit.residuals.iter().all(|r| r.abs() < 1e-6));
    }

    #[test]
    fn noisy_linear_fit_has_unit_chi_squared() {
        let stars = random_stars(1000, 11);
        let truth = [50.0, -0.01, 20.0, -5.0];
        let noise = Normal::new(0.0, 3.0).unwrap();
        let mut rng = StdRng::seed_from_u64(3);
        let values: Vec<f64> = stars
            .iter()
            .map(|s| predict(ModelKind::Linear, s, &truth) + noise.sample(&mut rng))
            .collect();
        let errors = vec![3.0; stars.len()];
        let fit = fit_model(ModelKind::Linear, &stars, &values, &errors).unwrap();
        assert!((fit.chi_squared_nu - 1.0).abs() < 0.2, "{}", fit.chi_squared_nu);
        let slope_err = fit.covariance[(2, 2)].sqrt();
        assert!((fit.betas[2] - 20.0).abs() < 5.0 * slope_err);
    }

    #[test]
    fn constant_fit_is_weighted_mean() {
        let stars = random_stars(3, 1);
        let fit = fit_model(ModelKind::Constant, &stars, &[1.0, 2.0, 4.0], &[1.0, 1.0, 2.0]).unwrap();
        assert!((fit.betas[0] - 4.0 / 2.25).abs() < 1e-9);
        assert!((fit.covariance[(0, 0)] - 1.0 / 2.25).abs() < 1e-9);
    }

    #[test]
    fn too_few_stars_is_an_error() {
        let stars = random_stars(3, 1);
        let err = fit_model(ModelKind::Quadratic, &stars, &[0.0; 3], &[1.0; 3]).unwrap_err();
        assert!(matches!(err, FitError::TooFewPoints { got: 3, needed: 7 }));
    }
}
