//! FITS I/O for HARPS e2ds and blaze files.
//!
//! Calibrated arrays are cached in the science file itself as three image
//! extensions (`WAVE`, `FLUX`, `ERR`). Opening a file without them, or with
//! `update` set, recomputes the arrays from the raw frame and the blaze file and
//! (re)writes the extensions.

use std::path::Path;

use fitsio::FitsFile;
use fitsio::hdu::{FitsHdu, HduInfo};
use fitsio::images::{ImageDescription, ImageType};
use log::{debug, info};
use nalgebra::DMatrix;

use crate::domain::harps::N_ORDERS;
use crate::obs2d::header::{CardValue, Header};
use crate::obs2d::science::{ScienceFrame, blaze_file_path};
use crate::obs2d::{HarpsFile2D, SpectrumError};

const EXTENSIONS: [&str; 3] = ["WAVE", "FLUX", "ERR"];

const TEXT_KEYS: [&str; 4] = ["OBJECT", "DATE-OBS", "INSTRUME", "ESO DRS BLAZE FILE"];
const INT_KEYS: [&str; 1] = ["ESO DRS CAL TH DEG LL"];
const FLOAT_KEYS: [&str; 5] = [
    "ESO DRS BERV",
    "ESO TEL TARG RADVEL",
    "ESO TEL AIRM START",
    "ESO TEL AIRM END",
    "ESO DRS CCD CONAD",
];

fn fits_error(path: &Path) -> impl Fn(fitsio::errors::Error) -> SpectrumError + '_ {
    move |e| SpectrumError::Fits {
        path: path.to_path_buf(),
        message: e.to_string(),
    }
}

/// Candidate spellings of a keyword: ESO keywords are written with `HIERARCH`.
fn key_spellings(key: &str) -> Vec<String> {
    if key.contains(' ') {
        vec![format!("HIERARCH {key}"), key.to_string()]
    } else {
        vec![key.to_string()]
    }
}

fn read_text(f: &mut FitsFile, hdu: &FitsHdu, key: &str) -> Option<String> {
    key_spellings(key)
        .iter()
        .find_map(|name| hdu.read_key::<String>(f, name).ok())
}

fn read_int(f: &mut FitsFile, hdu: &FitsHdu, key: &str) -> Option<i64> {
    key_spellings(key)
        .iter()
        .find_map(|name| hdu.read_key::<i64>(f, name).ok())
}

fn read_float(f: &mut FitsFile, hdu: &FitsHdu, key: &str) -> Option<f64> {
    key_spellings(key)
        .iter()
        .find_map(|name| hdu.read_key::<f64>(f, name).ok())
}

/// Read the header cards the pipeline uses from an HDU.
///
/// Missing cards are left out; typed getters report them when needed.
fn read_header(f: &mut FitsFile, hdu: &FitsHdu) -> Header {
    let mut header = Header::new();
    for key in TEXT_KEYS {
        if let Some(v) = read_text(f, hdu, key) {
            header.insert(key, CardValue::Text(v));
        }
    }
    for key in INT_KEYS {
        if let Some(v) = read_int(f, hdu, key) {
            header.insert(key, CardValue::Int(v));
        }
    }
    for key in FLOAT_KEYS {
        if let Some(v) = read_float(f, hdu, key) {
            header.insert(key, CardValue::Float(v));
        }
    }
    let degree = header.int("ESO DRS CAL TH DEG LL").unwrap_or(3).max(0) as usize;
    for n in 0..N_ORDERS * (degree + 1) {
        let key = format!("ESO DRS CAL TH COEFF LL{n}");
        if let Some(v) = read_float(f, hdu, &key) {
            header.insert(&key, CardValue::Float(v));
        }
    }
    header
}

fn read_matrix(f: &mut FitsFile, hdu: &FitsHdu, path: &Path) -> Result<DMatrix<f64>, SpectrumError> {
    let (rows, cols) = match &hdu.info {
        HduInfo::ImageInfo { shape, .. } if shape.len() == 2 => (shape[0], shape[1]),
        _ => {
            return Err(SpectrumError::Fits {
                path: path.to_path_buf(),
                message: "HDU is not a 2D image".to_string(),
            });
        }
    };
    let data: Vec<f64> = hdu.read_image(f).map_err(fits_error(path))?;
    if data.len() != rows * cols {
        return Err(SpectrumError::Fits {
            path: path.to_path_buf(),
            message: format!("expected {} pixels, read {}", rows * cols, data.len()),
        });
    }
    // FITS images are stored row-major (one order per row).
    Ok(DMatrix::from_row_slice(rows, cols, &data))
}

fn read_extension(f: &mut FitsFile, path: &Path, name: &str) -> Result<DMatrix<f64>, SpectrumError> {
    let hdu = f.hdu(name).map_err(fits_error(path))?;
    read_matrix(f, &hdu, path)
}

fn write_matrix(
    f: &mut FitsFile,
    path: &Path,
    name: &str,
    matrix: &DMatrix<f64>,
    cards: &[(String, String)],
) -> Result<(), SpectrumError> {
    if let Ok(existing) = f.hdu(name) {
        existing.delete(f).map_err(fits_error(path))?;
    }
    let dimensions = [matrix.nrows(), matrix.ncols()];
    let description = ImageDescription {
        data_type: ImageType::Double,
        dimensions: &dimensions,
    };
    let hdu = f
        .create_image(name.to_string(), &description)
        .map_err(fits_error(path))?;
    let row_major = matrix.transpose();
    hdu.write_image(f, row_major.as_slice())
        .map_err(fits_error(path))?;
    for (key, value) in cards {
        hdu.write_key(f, key, value.as_str()).map_err(fits_error(path))?;
    }
    Ok(())
}

/// Read the primary HDU of an e2ds (or any 2D HARPS) file.
pub fn read_frame(path: &Path) -> Result<HarpsFile2D, SpectrumError> {
    let mut f = FitsFile::open(path).map_err(fits_error(path))?;
    let hdu = f.primary_hdu().map_err(fits_error(path))?;
    let header = read_header(&mut f, &hdu);
    let raw = read_matrix(&mut f, &hdu, path)?;
    Ok(HarpsFile2D::new(path, header, raw))
}

/// Read the blaze function stored in a blaze file's primary HDU.
pub fn read_blaze(path: &Path) -> Result<DMatrix<f64>, SpectrumError> {
    Ok(read_frame(path)?.raw)
}

fn has_calibration(path: &Path) -> Result<bool, SpectrumError> {
    let mut f = FitsFile::open(path).map_err(fits_error(path))?;
    Ok(EXTENSIONS.iter().all(|name| f.hdu(*name).is_ok()))
}

/// Open a science frame, computing and caching its calibrated arrays if needed.
pub fn open_science(path: &Path, blaze_dir: &Path, update: bool) -> Result<ScienceFrame, SpectrumError> {
    let frame = read_frame(path)?;

    if !update && has_calibration(path)? {
        debug!("{frame}: reading cached calibration");
        let mut f = FitsFile::open(path).map_err(fits_error(path))?;
        let wave = read_extension(&mut f, path, "WAVE")?;
        let flux = read_extension(&mut f, path, "FLUX")?;
        let error = read_extension(&mut f, path, "ERR")?;
        return ScienceFrame::from_arrays(frame, wave, flux, error);
    }

    let blaze_name = frame.header.text("ESO DRS BLAZE FILE")?.to_string();
    let blaze_path = blaze_file_path(blaze_dir, &blaze_name)?;
    let blaze = read_blaze(&blaze_path)?;
    let science = ScienceFrame::calibrate(frame, &blaze)?;

    info!("{}: writing calibrated arrays", science.file);
    let mut f = FitsFile::edit(path).map_err(fits_error(path))?;
    write_matrix(&mut f, path, "WAVE", &science.barycentric, &science.order_bound_cards())?;
    write_matrix(&mut f, path, "FLUX", &science.flux, &[])?;
    write_matrix(&mut f, path, "ERR", &science.error, &[])?;
    Ok(science)
}
