//! Levenberg–Marquardt fitting for small nonlinear models.
//!
//! Absorption features are fitted with a 4-parameter Gaussian over ~15 pixels,
//! so a dense normal-equation solver with a numerical Jacobian is plenty.
//! Errors are treated as absolute: the returned covariance is `(JᵀJ)⁻¹` of the
//! σ-weighted Jacobian, not rescaled by χ²_ν.

use nalgebra::{DMatrix, DVector};

#[derive(Debug, Clone)]
pub struct LmOptions {
    pub max_iterations: usize,
    /// Relative χ² change below which the fit is considered converged.
    pub tolerance: f64,
    pub initial_lambda: f64,
}

impl Default for LmOptions {
    fn default() -> Self {
        Self {
            max_iterations: 200,
            tolerance: 1e-10,
            initial_lambda: 1e-3,
        }
    }
}

#[derive(Debug, Clone)]
pub struct LmFit {
    pub params: DVector<f64>,
    pub covariance: DMatrix<f64>,
    pub chi_squared: f64,
    pub iterations: usize,
}

impl LmFit {
    /// 1σ parameter errors.
    pub fn errors(&self) -> Vec<f64> {
        (0..self.params.len())
            .map(|i| self.covariance[(i, i)].sqrt())
            .collect()
    }
}

fn chi_squared<F>(model: &F, x: &[f64], y: &[f64], sigma: &[f64], p: &[f64]) -> f64
where
    F: Fn(f64, &[f64]) -> f64,
{
    x.iter()
        .zip(y)
        .zip(sigma)
        .map(|((&xi, &yi), &si)| ((yi - model(xi, p)) / si).powi(2))
        .sum()
}

/// σ-weighted residuals and Jacobian (central differences).
fn linearize<F>(model: &F, x: &[f64], y: &[f64], sigma: &[f64], p: &[f64]) -> (DMatrix<f64>, DVector<f64>)
where
    F: Fn(f64, &[f64]) -> f64,
{
    let n = x.len();
    let k = p.len();
    let mut jac = DMatrix::zeros(n, k);
    let mut resid = DVector::zeros(n);
    let mut work = p.to_vec();

    for i in 0..n {
        resid[i] = (y[i] - model(x[i], p)) / sigma[i];
    }
    for j in 0..k {
        let h = 1e-6 * p[j].abs().max(1e-3);
        work[j] = p[j] + h;
        let plus: Vec<f64> = x.iter().map(|&xi| model(xi, &work)).collect();
        work[j] = p[j] - h;
        for i in 0..n {
            let minus = model(x[i], &work);
            jac[(i, j)] = (plus[i] - minus) / (2.0 * h) / sigma[i];
        }
        work[j] = p[j];
    }
    (jac, resid)
}

/// Minimize `Σ ((y_i - f(x_i; p)) / σ_i)²` starting from `p0`.
///
/// Returns `None` if the inputs are inconsistent, the iteration limit is hit
/// or the result is not finite.
pub fn levenberg_marquardt<F>(
    model: F,
    x: &[f64],
    y: &[f64],
    sigma: &[f64],
    p0: &[f64],
    opts: &LmOptions,
) -> Option<LmFit>
where
    F: Fn(f64, &[f64]) -> f64,
{
    let n = x.len();
    let k = p0.len();
    if y.len() != n || sigma.len() != n || n < k || k == 0 {
        return None;
    }
    if sigma.iter().any(|s| !(s.is_finite() && *s > 0.0)) {
        return None;
    }

    let mut p = p0.to_vec();
    let mut chi2 = chi_squared(&model, x, y, sigma, &p);
    if !chi2.is_finite() {
        return None;
    }
    let mut lambda = opts.initial_lambda;
    let mut converged = false;
    let mut iterations = 0;

    while iterations < opts.max_iterations {
        iterations += 1;
        let (jac, resid) = linearize(&model, x, y, sigma, &p);
        let jtj = jac.transpose() * &jac;
        let grad = jac.transpose() * &resid;

        // Inner loop: raise the damping until a step lowers χ².
        let mut improved = false;
        while lambda < 1e12 {
            let mut damped = jtj.clone();
            for d in 0..k {
                damped[(d, d)] += lambda * jtj[(d, d)].max(1e-12);
            }
            let Some(step) = damped.lu().solve(&grad) else {
                lambda *= 10.0;
                continue;
            };
            let trial: Vec<f64> = p.iter().zip(step.iter()).map(|(a, b)| a + b).collect();
            let trial_chi2 = chi_squared(&model, x, y, sigma, &trial);
            if trial_chi2.is_finite() && trial_chi2 <= chi2 {
                let change = chi2 - trial_chi2;
                p = trial;
                chi2 = trial_chi2;
                lambda = (lambda / 10.0).max(1e-12);
                improved = true;
                if change <= opts.tolerance * chi2.max(1e-300) {
                    converged = true;
                }
                break;
            }
            lambda *= 10.0;
        }

        if !improved {
            // No downhill step at any damping: we are at the minimum.
            converged = true;
        }
        if converged {
            break;
        }
    }

    if !converged {
        return None;
    }

    let (jac, _) = linearize(&model, x, y, sigma, &p);
    let covariance = (jac.transpose() * &jac).try_inverse()?;
    let params = DVector::from_vec(p);
    if params.iter().chain(covariance.iter()).any(|v| !v.is_finite()) {
        return None;
    }

    Some(LmFit {
        params,
        covariance,
        chi_squared: chi2,
        iterations,
    })
}
