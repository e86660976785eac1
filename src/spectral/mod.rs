//! Spectroscopic conversions.
//!
//! - air/vacuum wavelengths (`airvac`)
//! - Doppler shifts and velocity separations (`doppler`)
//! - index lookups in wavelength grids and date lists (`search`)

use thiserror::Error;

pub mod airvac;
pub mod doppler;
pub mod search;

pub use airvac::*;
pub use doppler::*;
pub use search::*;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum ConversionError {
    #[error("Air to vacuum conversion of {wavelength} did not converge after {iterations} iterations.")]
    NoConvergence { wavelength: f64, iterations: usize },
    #[error("Velocity {0} m/s is not below the speed of light.")]
    Superluminal(f64),
    #[error("Value {value} is outside the range ({low}, {high}).")]
    OutOfRange { value: f64, low: f64, high: f64 },
    #[error("Conversion {0} is not supported.")]
    Unsupported(&'static str),
    #[error("Cannot search an empty array.")]
    EmptyArray,
}
