//! Gaussian fits of single absorption features.
//!
//! The model is `f(λ) = c + a exp(-(λ - μ)² / 2σ²)` with `a < 0`. Wavelengths
//! are centred on the window's central pixel before fitting so the solver works
//! with offsets of a few tenths of an Angstrom.

use log::debug;

use crate::domain::{Transition, TransitionFit};
use crate::fit::FitError;
use crate::math::{LmOptions, levenberg_marquardt};
use crate::obs2d::ScienceFrame;
use crate::spectral::{SPEED_OF_LIGHT, shift_wavelength, wavelength_to_index, wavelength_to_velocity};
use crate::units::{LengthExt, VelocityExt};

/// `FWHM = 2 sqrt(2 ln 2) σ`
const FWHM_PER_SIGMA: f64 = 2.354_820_045_030_949_4;

/// Pixel extents used around a feature.
#[derive(Debug, Clone, Copy)]
pub struct FitWindow {
    /// How far (pixels) from the predicted position to look for the minimum.
    pub search_radius: usize,
    /// Half-width (pixels) of the fitted window around the minimum.
    pub half_width: usize,
}

impl Default for FitWindow {
    fn default() -> Self {
        Self {
            search_radius: 3,
            half_width: 7,
        }
    }
}

/// Best-fit Gaussian parameters and 1σ errors (wavelengths in Angstroms).
#[derive(Debug, Clone, PartialEq)]
pub struct GaussianFit {
    pub amplitude: f64,
    pub amplitude_err: f64,
    pub mean: f64,
    pub mean_err: f64,
    pub sigma: f64,
    pub sigma_err: f64,
    pub continuum: f64,
    pub continuum_err: f64,
    pub chi_squared_nu: f64,
    /// Index of the flux minimum the window was centred on.
    pub centre_pixel: usize,
}

fn gaussian(x: f64, p: &[f64]) -> f64 {
    p[3] + p[0] * (-(x - p[1]).powi(2) / (2.0 * p[2] * p[2])).exp()
}

/// Fit the absorption feature nearest `expected` (Angstroms) in one order.
pub fn fit_absorption_feature(
    wavelengths: &[f64],
    flux: &[f64],
    errors: &[f64],
    expected: f64,
    window: &FitWindow,
) -> Result<GaussianFit, FitError> {
    let n = wavelengths.len();
    if flux.len() != n || errors.len() != n {
        return Err(FitError::Inconsistent(format!(
            "{n} wavelengths, {} flux values, {} errors",
            flux.len(),
            errors.len()
        )));
    }

    // 1) Predicted pixel, then the flux minimum close to it.
    let predicted = wavelength_to_index(expected, wavelengths)?;
    let lo = predicted.saturating_sub(window.search_radius);
    let hi = (predicted + window.search_radius).min(n - 1);
    let centre = (lo..=hi)
        .min_by(|&a, &b| flux[a].total_cmp(&flux[b]))
        .unwrap_or(predicted);

    // 2) Window around the minimum.
    if centre < window.half_width || centre + window.half_width >= n {
        return Err(FitError::OutOfWindow(format!(
            "pixel {centre} is within {} pixels of the order edge",
            window.half_width
        )));
    }
    let range = centre - window.half_width..=centre + window.half_width;
    let x0 = wavelengths[centre];
    let xs: Vec<f64> = wavelengths[range.clone()].iter().map(|w| w - x0).collect();
    let ys = &flux[range.clone()];
    let sigmas = &errors[range];

    // 3) Initial guesses.
    let max = ys.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    let min = ys.iter().copied().fold(f64::INFINITY, f64::min);
    let span = xs[xs.len() - 1] - xs[0];
    let p0 = [min - max, 0.0, span / 6.0, max];

    let fit = levenberg_marquardt(gaussian, &xs, ys, sigmas, &p0, &LmOptions::default())
        .ok_or_else(|| FitError::NoConvergence(format!("Gaussian near {expected:.3} Å")))?;
    let p = &fit.params;
    let err = fit.errors();
    if p.iter().chain(&err).any(|v| !v.is_finite()) {
        return Err(FitError::NoConvergence(format!(
            "non-finite Gaussian parameters near {expected:.3} Å"
        )));
    }
    if p[0] >= 0.0 {
        return Err(FitError::NotAbsorption(p[0]));
    }
    debug!("Gaussian near {expected:.3} Å converged in {} iterations", fit.iterations);

    Ok(GaussianFit {
        amplitude: p[0],
        amplitude_err: err[0],
        mean: p[1] + x0,
        mean_err: err[1],
        sigma: p[2].abs(),
        sigma_err: err[2],
        continuum: p[3],
        continuum_err: err[3],
        chi_squared_nu: fit.chi_squared / (xs.len() - p0.len()) as f64,
        centre_pixel: centre,
    })
}

/// Fit `transition` in `order` of a calibrated frame.
///
/// The expected position is the vacuum wavelength shifted by the target's
/// radial velocity, in the barycentric frame of the calibrated arrays.
pub fn fit_transition(frame: &ScienceFrame, transition: &Transition, order: usize) -> Result<TransitionFit, FitError> {
    if order >= frame.barycentric.nrows() {
        return Err(FitError::OutOfWindow(format!(
            "order {order} not in a frame with {} orders",
            frame.barycentric.nrows()
        )));
    }
    let expected = shift_wavelength(transition.wavelength(), frame.radial_velocity)?.as_angstroms();
    let row = |m: &nalgebra::DMatrix<f64>| -> Vec<f64> { m.row(order).iter().copied().collect() };
    let g = fit_absorption_feature(
        &row(&frame.barycentric),
        &row(&frame.flux),
        &row(&frame.error),
        expected,
        &FitWindow::default(),
    )?;

    let to_velocity = |delta_aa: f64| delta_aa * SPEED_OF_LIGHT / g.mean;
    let mean_err_vel = to_velocity(g.mean_err);
    Ok(TransitionFit {
        observation: frame.file.observation_name(),
        date_obs: frame.file.date_obs()?,
        label: transition.order_label(order),
        order,
        amplitude: g.amplitude,
        amplitude_err: g.amplitude_err,
        mean: g.mean,
        mean_err: g.mean_err,
        mean_err_vel,
        sigma: g.sigma,
        sigma_err: g.sigma_err,
        velocity_offset: wavelength_to_velocity(expected, g.mean),
        velocity_offset_err: mean_err_vel,
        fwhm: to_velocity(FWHM_PER_SIGMA * g.sigma),
        fwhm_err: to_velocity(FWHM_PER_SIGMA * g.sigma_err),
        continuum: g.continuum,
        chi_squared_nu: g.chi_squared_nu,
        airmass: frame.airmass,
        berv: frame.berv.as_meters_per_second(),
    })
}
