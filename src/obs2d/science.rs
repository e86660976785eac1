//! Calibrated science frames: wavelength, flux and error arrays per order.
//!
//! The wavelength solution of an e2ds frame is stored in the header as one
//! polynomial per order:
//!
//! ```text
//! λ_air(o, x) = Σ_{i=0..=deg} C[(deg + 1) o + i] · x^i
//! ```
//!
//! with `C[n]` = `ESO DRS CAL TH COEFF LL<n>`. Air wavelengths are converted to
//! vacuum (Edlen) and shifted by the barycentric Earth radial velocity, which is
//! the frame every line measurement is made in.

use std::path::{Path, PathBuf};

use log::debug;
use nalgebra::DMatrix;

use crate::domain::harps::{NEGATIVE_FLUX_ERROR, READ_NOISE};
use crate::obs2d::SpectrumError;
use crate::obs2d::frame::HarpsFile2D;
use crate::obs2d::header::Header;
use crate::spectral::{air_to_vac_matrix, check_velocity, shift_aa, wavelength_to_index};
use crate::units::{Velocity, VelocityExt};

const DEFAULT_POLY_DEGREE: i64 = 3;

/// Air wavelengths (Angstroms) from the header polynomial coefficients.
pub fn wavelength_array(header: &Header, n_orders: usize, n_pixels: usize) -> Result<DMatrix<f64>, SpectrumError> {
    let degree = if header.contains("ESO DRS CAL TH DEG LL") {
        header.int("ESO DRS CAL TH DEG LL")?
    } else {
        DEFAULT_POLY_DEGREE
    };
    if degree < 0 {
        return Err(SpectrumError::BadCalibration(format!("polynomial degree {degree}")));
    }
    let n_coeffs = degree as usize + 1;

    let mut out = DMatrix::zeros(n_orders, n_pixels);
    let mut coeffs = vec![0.0; n_coeffs];
    for order in 0..n_orders {
        for (i, c) in coeffs.iter_mut().enumerate() {
            *c = header.float(&format!("ESO DRS CAL TH COEFF LL{}", n_coeffs * order + i))?;
        }
        for pixel in 0..n_pixels {
            let x = pixel as f64;
            out[(order, pixel)] = coeffs.iter().rev().fold(0.0, |acc, c| acc * x + c);
        }
    }
    Ok(out)
}

/// Doppler-shift every element of a wavelength array.
pub fn shift_array(wavelengths: &DMatrix<f64>, velocity: Velocity) -> Result<DMatrix<f64>, SpectrumError> {
    let v = velocity.as_meters_per_second();
    check_velocity(v)?;
    Ok(wavelengths.map(|wl| shift_aa(wl, v)))
}

/// Raw counts multiplied by the CCD conversion factor (e-/ADU).
pub fn gain_corrected_flux(raw: &DMatrix<f64>, header: &Header) -> Result<DMatrix<f64>, SpectrumError> {
    let gain = header.strict_float("ESO DRS CCD CONAD")?;
    Ok(raw * gain)
}

fn check_shape(name: &str, a: &DMatrix<f64>, b: &DMatrix<f64>) -> Result<(), SpectrumError> {
    if a.shape() != b.shape() {
        return Err(SpectrumError::ShapeMismatch {
            what: name.to_string(),
            expected: a.shape(),
            found: b.shape(),
        });
    }
    Ok(())
}

/// Gain-corrected flux divided by the blaze function.
pub fn photon_flux(gain_corrected: &DMatrix<f64>, blaze: &DMatrix<f64>) -> Result<DMatrix<f64>, SpectrumError> {
    check_shape("blaze", gain_corrected, blaze)?;
    Ok(gain_corrected.component_div(blaze))
}

/// Photon-noise errors, `sqrt(flux + read_noise²)`, divided by the blaze.
///
/// Pixels with negative flux get a large sentinel error. Returns the error
/// array and the number of such pixels.
pub fn error_array(gain_corrected: &DMatrix<f64>, blaze: &DMatrix<f64>) -> Result<(DMatrix<f64>, usize), SpectrumError> {
    check_shape("blaze", gain_corrected, blaze)?;
    let mut negative = 0usize;
    let errors = gain_corrected.zip_map(blaze, |flux, b| {
        let err = if flux < 0.0 {
            negative += 1;
            NEGATIVE_FLUX_ERROR
        } else {
            (flux + READ_NOISE * READ_NOISE).sqrt()
        };
        err / b
    });
    Ok((errors, negative))
}

/// Location of the blaze file named in a science header.
///
/// Blaze files live under `<blaze_dir>/data/reduced/<night>/<name>`, where the
/// night is the ten characters following `HARPS.` in the name.
pub fn blaze_file_path(blaze_dir: &Path, blaze_name: &str) -> Result<PathBuf, SpectrumError> {
    let night = blaze_name
        .get(6..16)
        .ok_or_else(|| SpectrumError::BadCalibration(format!("blaze file name '{blaze_name}'")))?;
    let path = blaze_dir.join("data").join("reduced").join(night).join(blaze_name);
    if !path.exists() {
        return Err(SpectrumError::BlazeFileMissing(path));
    }
    Ok(path)
}

/// A science frame with calibrated arrays.
#[derive(Debug, Clone)]
pub struct ScienceFrame {
    pub file: HarpsFile2D,
    pub berv: Velocity,
    pub radial_velocity: Velocity,
    pub airmass: f64,
    /// Vacuum wavelengths in the barycentric frame (Angstroms).
    pub barycentric: DMatrix<f64>,
    /// Blaze-corrected photon flux.
    pub flux: DMatrix<f64>,
    pub error: DMatrix<f64>,
}

fn velocity_card(header: &Header, key: &str) -> Result<Velocity, SpectrumError> {
    Ok(Velocity::from_kilometers_per_second(header.float(key)?))
}

fn airmass(header: &Header) -> Result<f64, SpectrumError> {
    let start = header.float("ESO TEL AIRM START")?;
    let end = header.float("ESO TEL AIRM END")?;
    Ok((start + end) / 2.0)
}

impl ScienceFrame {
    /// Compute all arrays from the raw frame and its blaze function.
    pub fn calibrate(file: HarpsFile2D, blaze: &DMatrix<f64>) -> Result<Self, SpectrumError> {
        let header = &file.header;
        let berv = velocity_card(header, "ESO DRS BERV")?;
        let radial_velocity = velocity_card(header, "ESO TEL TARG RADVEL")?;
        let airmass = airmass(header)?;

        let (n_orders, n_pixels) = file.raw.shape();
        let air = wavelength_array(header, n_orders, n_pixels)?;
        let vacuum = air_to_vac_matrix(&air)?;
        let barycentric = shift_array(&vacuum, berv)?;

        let gain_corrected = gain_corrected_flux(&file.raw, header)?;
        let flux = photon_flux(&gain_corrected, blaze)?;
        let (error, negative) = error_array(&gain_corrected, blaze)?;
        if negative > 0 {
            debug!("{file}: {negative} pixels with negative flux");
        }

        Ok(Self {
            file,
            berv,
            radial_velocity,
            airmass,
            barycentric,
            flux,
            error,
        })
    }

    /// Wrap arrays computed earlier (e.g. stored in the file's extensions).
    pub fn from_arrays(
        file: HarpsFile2D,
        barycentric: DMatrix<f64>,
        flux: DMatrix<f64>,
        error: DMatrix<f64>,
    ) -> Result<Self, SpectrumError> {
        check_shape("flux", &barycentric, &flux)?;
        check_shape("error", &barycentric, &error)?;
        let header = &file.header;
        Ok(Self {
            berv: velocity_card(header, "ESO DRS BERV")?,
            radial_velocity: velocity_card(header, "ESO TEL TARG RADVEL")?,
            airmass: airmass(header)?,
            file,
            barycentric,
            flux,
            error,
        })
    }

    pub fn n_pixels(&self) -> usize {
        self.barycentric.ncols()
    }

    /// Barycentric wavelengths shifted into the star's rest frame.
    pub fn rv_corrected_array(&self) -> Result<DMatrix<f64>, SpectrumError> {
        shift_array(&self.barycentric, -self.radial_velocity)
    }

    fn order_row(&self, order: usize) -> Vec<f64> {
        self.barycentric.row(order).iter().copied().collect()
    }

    /// Orders whose barycentric wavelength range contains `wavelength`.
    pub fn find_orders(&self, wavelength: f64) -> Result<Vec<usize>, SpectrumError> {
        let (rows, cols) = self.barycentric.shape();
        if rows == 0 || cols == 0 {
            return Err(SpectrumError::BadCalibration("empty wavelength array".to_string()));
        }
        let low = self.barycentric[(0, 0)];
        let high = self.barycentric[(rows - 1, cols - 1)];
        if !(low..=high).contains(&wavelength) {
            return Err(SpectrumError::WavelengthOutOfRange { wavelength, low, high });
        }
        let orders: Vec<usize> = (0..rows)
            .filter(|&o| {
                let first = self.barycentric[(o, 0)];
                let last = self.barycentric[(o, cols - 1)];
                first <= wavelength && wavelength <= last
            })
            .collect();
        if orders.len() > 2 {
            return Err(SpectrumError::TooManyOrders { wavelength, orders });
        }
        Ok(orders)
    }

    /// The order in which `wavelength` falls closest to the CCD centre.
    pub fn find_mid_most_order(&self, wavelength: f64) -> Result<usize, SpectrumError> {
        let orders = self.find_orders(wavelength)?;
        if let [only] = orders[..] {
            return Ok(only);
        }
        let centre = (self.n_pixels() as f64 - 1.0) / 2.0;
        let mut best: Option<(usize, f64)> = None;
        for order in orders {
            let Ok(idx) = wavelength_to_index(wavelength, &self.order_row(order)) else {
                continue;
            };
            let distance = (idx as f64 - centre).abs();
            if best.is_none_or(|(_, d)| distance < d) {
                best = Some((order, distance));
            }
        }
        best.map(|(order, _)| order)
            .ok_or(SpectrumError::NotInAnyOrder(wavelength))
    }

    /// `ORD<i>MIN` / `ORD<i>MAX` cards with each order's wavelength range.
    pub fn order_bound_cards(&self) -> Vec<(String, String)> {
        let mut cards = Vec::with_capacity(self.barycentric.nrows() * 2);
        for (i, row) in self.barycentric.row_iter().enumerate() {
            let min = row.iter().copied().fold(f64::INFINITY, f64::min);
            let max = row.iter().copied().fold(f64::NEG_INFINITY, f64::max);
            cards.push((format!("ORD{i}MIN"), format!("{min:.3}")));
            cards.push((format!("ORD{i}MAX"), format!("{max:.3}")));
        }
        cards
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::obs2d::header::CardValue;
    use approx::assert_relative_eq;

    /// Header for `n_orders` orders with a linear solution spanning
    /// `start + 40 * order` to `start + 40 * order + 60` Angstroms.
    fn synthetic_header(n_orders: usize, n_pixels: usize, start: f64) -> Header {
        let mut header = Header::new()
            .with("OBJECT", CardValue::Text("HD 1".to_string()))
            .with("DATE-OBS", CardValue::Text("2012-02-26T04:02:48.797".to_string()))
            .with("HIERARCH ESO DRS BERV", CardValue::Float(10.0))
            .with("HIERARCH ESO TEL TARG RADVEL", CardValue::Float(-5.0))
            .with("HIERARCH ESO TEL AIRM START", CardValue::Float(1.1))
            .with("HIERARCH ESO TEL AIRM END", CardValue::Float(1.3))
            .with("HIERARCH ESO DRS CCD CONAD", CardValue::Float(2.0))
            .with("HIERARCH ESO DRS CAL TH DEG LL", CardValue::Int(3));
        let dispersion = 60.0 / (n_pixels as f64 - 1.0);
        for order in 0..n_orders {
            let c = [start + 40.0 * order as f64, dispersion, 0.0, 0.0];
            for (i, value) in c.iter().enumerate() {
                header.insert(
                    &format!("HIERARCH ESO DRS CAL TH COEFF LL{}", 4 * order + i),
                    CardValue::Float(*value),
                );
            }
        }
        header
    }

    fn synthetic_frame(n_orders: usize, n_pixels: usize) -> ScienceFrame {
        let header = synthetic_header(n_orders, n_pixels, 5000.0);
        let raw = DMatrix::from_element(n_orders, n_pixels, 100.0);
        let blaze = DMatrix::from_element(n_orders, n_pixels, 0.5);
        ScienceFrame::calibrate(HarpsFile2D::new("obs.fits", header, raw), &blaze).unwrap()
    }

    #[test]
    fn wavelength_array_evaluates_polynomials() {
        let mut header = synthetic_header(2, 5, 5000.0);
        header.insert("ESO DRS CAL TH COEFF LL2", CardValue::Float(0.5));
        let wl = wavelength_array(&header, 2, 5).unwrap();
        assert_relative_eq!(wl[(0, 0)], 5000.0);
        // 5000 + 15 x + 0.5 x² at x = 2
        assert_relative_eq!(wl[(0, 2)], 5000.0 + 30.0 + 2.0);
        assert_relative_eq!(wl[(1, 4)], 5040.0 + 60.0);
    }

    #[test]
    fn wavelength_array_requires_coefficients() {
        let header = Header::new();
        assert!(matches!(
            wavelength_array(&header, 1, 4),
            Err(SpectrumError::MissingCard(_))
        ));
    }

    #[test]
    fn error_array_flags_negative_flux() {
        let flux = DMatrix::from_row_slice(1, 3, &[-5.0, 0.0, 25.0]);
        let blaze = DMatrix::from_row_slice(1, 3, &[1.0, 2.0, 0.5]);
        let (err, negative) = error_array(&flux, &blaze).unwrap();
        assert_eq!(negative, 1);
        assert_relative_eq!(err[(0, 0)], 1e5);
        assert_relative_eq!(err[(0, 1)], 12.0 / 2.0);
        assert_relative_eq!(err[(0, 2)], (25.0f64 + 144.0).sqrt() / 0.5);
    }

    #[test]
    fn calibration_applies_gain_blaze_and_berv() {
        let frame = synthetic_frame(3, 101);
        assert_relative_eq!(frame.flux[(0, 0)], 100.0 * 2.0 / 0.5);
        assert_relative_eq!(frame.airmass, 1.2);
        let vac = crate::spectral::air_to_vac_eso(5000.0).unwrap();
        assert_relative_eq!(frame.barycentric[(0, 0)], shift_aa(vac, 10_000.0), epsilon = 1e-9);
        let rv = frame.rv_corrected_array().unwrap();
        assert!(rv[(0, 0)] > frame.barycentric[(0, 0)]);
    }

    #[test]
    fn gain_must_be_a_float_card() {
        let header = Header::new().with("ESO DRS CCD CONAD", CardValue::Int(1));
        assert!(gain_corrected_flux(&DMatrix::zeros(1, 1), &header).is_err());
    }

    #[test]
    fn mid_most_order_prefers_ccd_centre() {
        let frame = synthetic_frame(3, 101);
        // Order 0 spans ~5000-5060 and order 1 ~5040-5100 (before the shifts).
        let wl = frame.barycentric[(1, 10)];
        let orders = frame.find_orders(wl).unwrap();
        assert_eq!(orders, vec![0, 1]);
        // Pixel ~77 of order 0 versus pixel 10 of order 1: order 0 is closer to 50.
        assert_eq!(frame.find_mid_most_order(wl).unwrap(), 0);
        let wl = frame.barycentric[(1, 40)];
        assert_eq!(frame.find_mid_most_order(wl).unwrap(), 1);
    }

    #[test]
    fn single_order_edges_need_no_pixel_lookup() {
        let frame = synthetic_frame(3, 101);
        let first = frame.barycentric[(0, 0)];
        let last = frame.barycentric[(2, 100)];
        assert_eq!(frame.find_orders(first).unwrap(), vec![0]);
        assert_eq!(frame.find_mid_most_order(first).unwrap(), 0);
        assert_eq!(frame.find_mid_most_order(last).unwrap(), 2);
    }

    #[test]
    fn out_of_range_wavelengths_are_rejected() {
        let frame = synthetic_frame(3, 101);
        assert!(matches!(
            frame.find_orders(4000.0),
            Err(SpectrumError::WavelengthOutOfRange { .. })
        ));
    }

    #[test]
    fn order_bounds_use_three_decimals() {
        let frame = synthetic_frame(2, 11);
        let cards = frame.order_bound_cards();
        assert_eq!(cards.len(), 4);
        assert_eq!(cards[0].0, "ORD0MIN");
        assert_eq!(cards[3].0, "ORD1MAX");
        assert_eq!(cards[0].1, format!("{:.3}", frame.barycentric[(0, 0)]));
    }

    #[test]
    fn blaze_path_uses_night_directory() {
        let dir = tempfile::tempdir().unwrap();
        let name = "HARPS.2012-02-25T21:07:11.163_blaze_A.fits";
        assert!(matches!(
            blaze_file_path(dir.path(), name),
            Err(SpectrumError::BlazeFileMissing(_))
        ));
        let night = dir.path().join("data/reduced/2012-02-25");
        std::fs::create_dir_all(&night).unwrap();
        std::fs::write(night.join(name), b"").unwrap();
        assert_eq!(blaze_file_path(dir.path(), name).unwrap(), night.join(name));
    }
}
