//! Systematic scatter (`σ_sys`) estimators.
//!
//! `σ_sys` is the extra error, added in quadrature to the measurement errors,
//! that brings the reduced χ² of a set of residuals to 1.

use log::debug;

use crate::domain::{ModelKind, StellarParameter};
use crate::fit::FitError;
use crate::fit::fitter::{ModelFit, fit_model};
use crate::math::{arange, bin_midpoints, chi_squared_nu, nan_std, weighted_mean_and_error};
use crate::models::StellarCoords;

/// Bins with fewer stars than this give NaN.
pub const MIN_BIN_SIZE: usize = 7;

/// Upper limit on walk steps (`σ_sys` up to `step * MAX_WALK_STEPS`).
const MAX_WALK_STEPS: usize = 10_000_000;

const MAX_SCATTER_ITERATIONS: usize = 100;

fn inflate(errors: &[f64], sigma_sys: f64) -> Vec<f64> {
    errors.iter().map(|e| e.hypot(sigma_sys)).collect()
}

/// Walk `σ_sys` up from 0 in steps of `step` until the χ²_ν of the
/// weighted-mean-subtracted residuals drops to 1 or below.
///
/// Non-finite residuals (and their errors) are ignored.
pub fn sigma_sys_walk(residuals: &[f64], errors: &[f64], n_params: usize, step: f64) -> Result<f64, FitError> {
    let (res, err): (Vec<f64>, Vec<f64>) = residuals
        .iter()
        .zip(errors)
        .filter(|(r, e)| r.is_finite() && e.is_finite() && **e > 0.0)
        .map(|(r, e)| (*r, *e))
        .unzip();
    if res.len() < n_params + 1 {
        return Err(FitError::TooFewPoints {
            got: res.len(),
            needed: n_params + 1,
        });
    }
    if !(step > 0.0) {
        return Err(FitError::Inconsistent(format!("walk step {step} must be positive")));
    }

    for i in 0..MAX_WALK_STEPS {
        let sigma_sys = i as f64 * step;
        let inflated = inflate(&err, sigma_sys);
        let Some((mean, _)) = weighted_mean_and_error(&res, &inflated) else {
            break;
        };
        let centred: Vec<f64> = res.iter().map(|r| r - mean).collect();
        if chi_squared_nu(&centred, &inflated, n_params) <= 1.0 {
            return Ok(sigma_sys);
        }
    }
    Err(FitError::NoConvergence(format!(
        "σ_sys walk exceeded {} steps of {step}",
        MAX_WALK_STEPS
    )))
}

/// Outcome of [`find_sys_scatter`].
#[derive(Debug, Clone)]
pub struct SysScatter {
    /// Final fit (errors inflated by the final `σ_sys`, outliers excluded).
    pub fit: ModelFit,
    pub sigma_sys: f64,
    /// `σ_sys` after each iteration.
    pub sys_history: Vec<f64>,
    /// χ²_ν of the fit (before solving for `σ_sys`) after each iteration.
    pub chi_history: Vec<f64>,
    /// `true` for points kept in the final fit.
    pub mask: Vec<bool>,
    /// Residuals of all points (including rejected ones) from the final fit.
    pub residuals: Vec<f64>,
}

/// `σ_sys` making χ²_ν of `residuals` equal to 1, found by bisection.
fn solve_sigma_sys(residuals: &[f64], errors: &[f64], n_params: usize, tolerance: f64) -> f64 {
    let chi = |s: f64| chi_squared_nu(residuals, &inflate(errors, s), n_params);
    if chi(0.0) <= 1.0 {
        return 0.0;
    }
    let mut lo = 0.0;
    let mut hi = residuals.iter().fold(tolerance, |m, r| m.max(r.abs()));
    for _ in 0..64 {
        if chi(hi) <= 1.0 {
            break;
        }
        lo = hi;
        hi *= 2.0;
    }
    while hi - lo > tolerance {
        let mid = 0.5 * (lo + hi);
        if chi(mid) > 1.0 {
            lo = mid;
        } else {
            hi = mid;
        }
    }
    0.5 * (lo + hi)
}

/// Iteratively fit `model`, solve for `σ_sys` and reject outliers beyond
/// `n_sigma` total errors until no point is rejected.
pub fn find_sys_scatter(
    model: ModelKind,
    coords: &[StellarCoords],
    values: &[f64],
    errors: &[f64],
    n_sigma: f64,
    tolerance: f64,
) -> Result<SysScatter, FitError> {
    let n = coords.len();
    if values.len() != n || errors.len() != n {
        return Err(FitError::Inconsistent(format!(
            "{n} stars, {} values, {} errors",
            values.len(),
            errors.len()
        )));
    }
    let k = model.param_count();
    let mut mask: Vec<bool> = values
        .iter()
        .zip(errors)
        .map(|(v, e)| v.is_finite() && e.is_finite() && *e > 0.0)
        .collect();
    let mut sigma_sys = 0.0;
    let mut sys_history = Vec::new();
    let mut chi_history = Vec::new();

    for iteration in 1..=MAX_SCATTER_ITERATIONS {
        let kept: Vec<usize> = (0..n).filter(|&i| mask[i]).collect();
        if kept.len() < k + 1 {
            return Err(FitError::TooFewPoints {
                got: kept.len(),
                needed: k + 1,
            });
        }
        let c: Vec<StellarCoords> = kept.iter().map(|&i| coords[i]).collect();
        let v: Vec<f64> = kept.iter().map(|&i| values[i]).collect();
        let e: Vec<f64> = kept.iter().map(|&i| errors[i]).collect();

        let fit = fit_model(model, &c, &v, &inflate(&e, sigma_sys))?;
        chi_history.push(fit.chi_squared_nu);
        let previous = sigma_sys;
        sigma_sys = solve_sigma_sys(&fit.residuals, &e, k, tolerance);
        sys_history.push(sigma_sys);

        let mut rejected = 0;
        for (j, &i) in kept.iter().enumerate() {
            if fit.residuals[j].abs() > n_sigma * e[j].hypot(sigma_sys) {
                mask[i] = false;
                rejected += 1;
            }
        }
        debug!("σ_sys iteration {iteration}: σ_sys = {sigma_sys:.4}, rejected {rejected}");

        if rejected == 0 && (sigma_sys - previous).abs() <= tolerance {
            let residuals = (0..n).map(|i| values[i] - fit.predict(&coords[i])).collect();
            return Ok(SysScatter {
                fit,
                sigma_sys,
                sys_history,
                chi_history,
                mask,
                residuals,
            });
        }
    }
    Err(FitError::NoConvergence(format!(
        "σ_sys outlier rejection after {MAX_SCATTER_ITERATIONS} iterations"
    )))
}

/// `σ_sys` and residual spread of the stars falling in one bin.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BinStat {
    pub midpoint: f64,
    pub sigma_sys: f64,
    pub std: f64,
    pub n: usize,
}

/// Fixed bin edges used for each stellar parameter.
pub fn default_bin_edges(parameter: StellarParameter) -> Vec<f64> {
    // Close the last edge by stepping half a bin past it.
    match parameter {
        StellarParameter::Temperature => arange(5377.0, 6277.0 + 50.0, 100.0),
        StellarParameter::Metallicity => arange(-0.75, 0.45 + 0.075, 0.15),
        StellarParameter::Gravity => arange(4.04, 4.64 + 0.05, 0.1),
        StellarParameter::Magnitude => arange(3.0, 6.5 + 0.25, 0.5),
    }
}

/// `σ_sys` of model residuals binned by a stellar parameter.
///
/// Bins are closed `[lo, hi]`, so a star sitting on an inner edge counts in
/// both neighbouring bins.
pub fn binned_sigma_sys(parameter_values: &[f64], residuals: &[f64], errors: &[f64], edges: &[f64]) -> Vec<BinStat> {
    let midpoints = bin_midpoints(edges);
    midpoints
        .iter()
        .enumerate()
        .map(|(b, &midpoint)| {
            let (lo, hi) = (edges[b], edges[b + 1]);
            let (res, err): (Vec<f64>, Vec<f64>) = parameter_values
                .iter()
                .zip(residuals.iter().zip(errors))
                .filter(|(p, (r, _))| r.is_finite() && (lo..=hi).contains(*p))
                .map(|(_, (r, e))| (*r, *e))
                .unzip();
            let n = res.len();
            if n < MIN_BIN_SIZE {
                return BinStat {
                    midpoint,
                    sigma_sys: f64::NAN,
                    std: f64::NAN,
                    n,
                };
            }
            BinStat {
                midpoint,
                sigma_sys: sigma_sys_walk(&res, &err, 1, 0.01).unwrap_or(f64::NAN),
                std: nan_std(&res),
                n,
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand::rngs::StdRng;
    use rand_distr::{Distribution, Normal};

    fn noisy(n: usize, scatter: f64, seed: u64) -> Vec<f64> {
        let mut rng = StdRng::seed_from_u64(seed);
        let dist = Normal::new(0.0, scatter).unwrap();
        (0..n).map(|_| dist.sample(&mut rng)).collect()
    }

    fn flat_coords(n: usize) -> Vec<StellarCoords> {
        (0..n)
            .map(|i| StellarCoords {
                temperature: 5500.0 + i as f64,
                metallicity: 0.0,
                gravity: 4.4,
                magnitude: 4.8,
            })
            .collect()
    }

    #[test]
    fn walk_stays_at_zero_for_consistent_data() {
        let res = [0.5, -0.5, 0.2, -0.2];
        assert_eq!(sigma_sys_walk(&res, &[1.0; 4], 1, 0.01).unwrap(), 0.0);
    }

    #[test]
    fn walk_recovers_extra_scatter() {
        let res = noisy(2000, 5.0, 9);
        let sys = sigma_sys_walk(&res, &vec![3.0; res.len()], 1, 0.01).unwrap();
        assert!((sys - 4.0).abs() < 0.4, "{sys}");
    }

    #[test]
    fn walk_needs_enough_points() {
        let err = sigma_sys_walk(&[1.0, f64::NAN], &[1.0, 1.0], 1, 0.01).unwrap_err();
        assert!(matches!(err, FitError::TooFewPoints { got: 1, needed: 2 }));
    }

    #[test]
    fn sys_scatter_rejects_outlier_and_recovers_scatter() {
        let mut values: Vec<f64> = noisy(500, 10.0, 5).iter().map(|v| v + 25.0).collect();
        values[17] = 400.0;
        let coords = flat_coords(values.len());
        let errors = vec![6.0; values.len()];
        let out = find_sys_scatter(ModelKind::Constant, &coords, &values, &errors, 4.0, 1e-4).unwrap();
        assert!(!out.mask[17]);
        assert!((out.fit.betas[0] - 25.0).abs() < 2.0);
        assert!((out.sigma_sys - 8.0).abs() < 1.5, "{}", out.sigma_sys);
        assert_eq!(out.sys_history.len(), out.chi_history.len());
        assert!((out.residuals[17] - (400.0 - out.fit.betas[0])).abs() < 1e-9);
    }

    #[test]
    fn sys_scatter_is_zero_without_extra_noise() {
        let values: Vec<f64> = noisy(300, 1.0, 2);
        let coords = flat_coords(values.len());
        let errors = vec![10.0; values.len()];
        let out = find_sys_scatter(ModelKind::Constant, &coords, &values, &errors, 5.0, 1e-4).unwrap();
        assert_eq!(out.sigma_sys, 0.0);
        assert!(out.mask.iter().all(|&m| m));
    }

    #[test]
    fn default_edges_cover_closed_ranges() {
        let t = default_bin_edges(StellarParameter::Temperature);
        assert_eq!(t.len(), 10);
        assert!((t[9] - 6277.0).abs() < 1e-9);
        let m = default_bin_edges(StellarParameter::Metallicity);
        assert_eq!(m.len(), 9);
        assert!((m[8] - 0.45).abs() < 1e-9);
        assert_eq!(default_bin_edges(StellarParameter::Gravity).len(), 7);
    }

    #[test]
    fn small_bins_are_nan() {
        let params: Vec<f64> = (0..20).map(|i| if i < 15 { 0.5 } else { 1.5 }).collect();
        let res = noisy(20, 1.0, 4);
        let err = vec![1.0; 20];
        let bins = binned_sigma_sys(&params, &res, &err, &[0.0, 1.0, 2.0]);
        assert_eq!(bins.len(), 2);
        assert_eq!(bins[0].n, 15);
        assert!(bins[0].sigma_sys.is_finite());
        assert_eq!(bins[1].n, 5);
        assert!(bins[1].sigma_sys.is_nan());
        assert!((bins[1].midpoint - 1.5).abs() < 1e-12);
    }

    #[test]
    fn stars_on_an_inner_edge_count_in_both_bins() {
        let params: Vec<f64> = (0..10).map(|i| if i < 8 { 1.0 } else { 0.5 }).collect();
        let res = noisy(10, 1.0, 6);
        let err = vec![1.0; 10];
        let bins = binned_sigma_sys(&params, &res, &err, &[0.0, 1.0, 2.0]);
        assert_eq!(bins[0].n, 10);
        assert_eq!(bins[1].n, 8);
        assert!(bins[1].sigma_sys.is_finite());
    }
}
