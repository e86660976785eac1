//! HARPS echelle (e2ds) frames.
//!
//! - FITS header cards (`header`)
//! - raw frames (`frame`)
//! - wavelength/flux/error calibration (`science`)
//! - FITS file I/O (`fits`, behind the `fits` feature)

use std::path::PathBuf;

use thiserror::Error;

use crate::spectral::ConversionError;

pub mod frame;
pub mod header;
pub mod science;

#[cfg(feature = "fits")]
pub mod fits;

pub use frame::{DATE_OBS_FORMAT, HarpsFile2D, parse_date_obs};
pub use header::{CardValue, Header};
pub use science::{ScienceFrame, blaze_file_path};

#[derive(Debug, Error)]
pub enum SpectrumError {
    #[error("Header card '{0}' not found.")]
    MissingCard(String),
    #[error("Header card '{key}' should be a {expected}, found a {found}.")]
    WrongCardType {
        key: String,
        expected: &'static str,
        found: &'static str,
    },
    #[error("Invalid observation date: {0}")]
    BadDate(String),
    #[error("Invalid calibration: {0}")]
    BadCalibration(String),
    #[error("{what} array has shape {found:?}, expected {expected:?}.")]
    ShapeMismatch {
        what: String,
        expected: (usize, usize),
        found: (usize, usize),
    },
    #[error("Wavelength {wavelength} is outside the spectrum ({low}, {high}).")]
    WavelengthOutOfRange { wavelength: f64, low: f64, high: f64 },
    #[error("Wavelength {wavelength} found in more than two orders: {orders:?}")]
    TooManyOrders { wavelength: f64, orders: Vec<usize> },
    #[error("Wavelength {0} does not fall in any order.")]
    NotInAnyOrder(f64),
    #[error("Blaze file not found: {}", .0.display())]
    BlazeFileMissing(PathBuf),
    #[error("FITS error in {}: {message}", .path.display())]
    Fits { path: PathBuf, message: String },
    #[error(transparent)]
    Conversion(#[from] ConversionError),
}
