//! Fitting.
//!
//! Responsibilities:
//!
//! - fit Gaussian absorption features in calibrated spectra
//! - fit stellar-parameter models to per-star offsets
//! - select the best model using BIC + guardrails
//! - estimate the systematic scatter (`σ_sys`) left after a fit

use thiserror::Error;

use crate::obs2d::SpectrumError;
use crate::spectral::ConversionError;

pub mod fitter;
pub mod gaussian;
pub mod selection;
pub mod sigma_sys;

pub use fitter::*;
pub use gaussian::*;
pub use selection::*;
pub use sigma_sys::*;

#[derive(Debug, Error)]
pub enum FitError {
    #[error("Too few points to fit: got {got}, need at least {needed}.")]
    TooFewPoints { got: usize, needed: usize },
    #[error("Inconsistent fit inputs: {0}")]
    Inconsistent(String),
    #[error("Singular design matrix: {0}")]
    Singular(String),
    #[error("Fit did not converge: {0}")]
    NoConvergence(String),
    #[error("Fitted amplitude {0} is not an absorption feature.")]
    NotAbsorption(f64),
    #[error("Fit window out of range: {0}")]
    OutOfWindow(String),
    #[error(transparent)]
    Spectrum(#[from] SpectrumError),
    #[error(transparent)]
    Conversion(#[from] ConversionError),
}
