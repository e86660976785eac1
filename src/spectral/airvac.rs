//! Air/vacuum wavelength conversion.
//!
//! All functions take and return wavelengths in Angstroms.
//!
//! The ESO pipeline uses the Edlen (1953) refractive index of standard air
//! (15 °C, 760 mmHg). Vacuum to air is a direct division by the index; air to
//! vacuum has no closed form and is solved by fixed-point iteration
//! `λ_vac = λ_air · n(λ_vac)`, which converges in a handful of steps because
//! `n - 1 ≈ 3e-4`.

use nalgebra::DMatrix;
use rayon::prelude::*;

use crate::domain::{AirVacFormula, Direction};
use crate::spectral::ConversionError;

/// Standard air temperature (°C) of the ESO calibration.
pub const STANDARD_TEMPERATURE_C: f64 = 15.0;

/// Standard air pressure (mmHg) of the ESO calibration.
pub const STANDARD_PRESSURE_MMHG: f64 = 760.0;

const AIR2VAC_TOLERANCE: f64 = 2e-12;
const AIR2VAC_MAX_ITERATIONS: usize = 100;

/// Edlen (1953) refractive index of air for a vacuum wavelength.
pub fn edlen53_index(vacuum_aa: f64, temperature_c: f64, pressure_mmhg: f64) -> f64 {
    let s2 = (1e4 / vacuum_aa).powi(2);
    let t = temperature_c;
    let p = pressure_mmhg;
    1.0 + 1e-6 * p * (1.0 + (1.049 - 0.0157 * t) * 1e-6 * p) / 720.883 / (1.0 + 0.003661 * t)
        * (64.328 + 29498.1 / (146.0 - s2) + 255.4 / (41.0 - s2))
}

fn edlen_standard(vacuum_aa: f64) -> f64 {
    edlen53_index(vacuum_aa, STANDARD_TEMPERATURE_C, STANDARD_PRESSURE_MMHG)
}

/// Vacuum to air with the Edlen index.
pub fn vac_to_air_eso(vacuum_aa: f64) -> f64 {
    vacuum_aa / edlen_standard(vacuum_aa)
}

/// Air to vacuum with the Edlen index (iterative).
pub fn air_to_vac_eso(air_aa: f64) -> Result<f64, ConversionError> {
    let mut new = air_aa;
    let mut old = 0.0;
    let mut iterations = 0;
    while (new - old).abs() > AIR2VAC_TOLERANCE {
        if iterations >= AIR2VAC_MAX_ITERATIONS {
            return Err(ConversionError::NoConvergence {
                wavelength: air_aa,
                iterations,
            });
        }
        old = new;
        new = air_aa * edlen_standard(old);
        iterations += 1;
    }
    Ok(new)
}

/// Air to vacuum for a whole wavelength grid, preserving its shape.
pub fn air_to_vac_matrix(air: &DMatrix<f64>) -> Result<DMatrix<f64>, ConversionError> {
    let converted: Result<Vec<f64>, ConversionError> =
        air.as_slice().par_iter().map(|&wl| air_to_vac_eso(wl)).collect();
    Ok(DMatrix::from_vec(air.nrows(), air.ncols(), converted?))
}

/// Vacuum to air (Morton 2000), as used by VALD.
pub fn vac_to_air_morton2000(vacuum_aa: f64) -> f64 {
    let s2 = (1e4 / vacuum_aa).powi(2);
    let n = 1.0 + 0.0000834254 + 0.02406147 / (130.0 - s2) + 0.00015998 / (38.9 - s2);
    vacuum_aa / n
}

/// Air to vacuum with the IAU standard formula (Morton 2000 coefficients).
pub fn air_to_vac_morton_iau(air_aa: f64) -> f64 {
    let s2 = (1e4 / air_aa).powi(2);
    let n = 1.0
        + 0.00008336624212083
        + 0.02408926869968 / (130.1065924522 - s2)
        + 0.0001599740894897 / (38.92568793293 - s2);
    air_aa * n
}

/// Vacuum to air (Peck & Reeder 1972).
pub fn vac_to_air_peck_reeder(vacuum_aa: f64) -> f64 {
    let s2 = (1e4 / vacuum_aa).powi(2);
    // Published pole is 39.32957; 39.32457 is a known transcription error.
    let n = 1.0 + (8060.51 + 2_480_990.0 / (132.274 - s2) + 17455.7 / (39.32957 - s2)) / 1e8;
    vacuum_aa / n
}

/// Convert a wavelength with the chosen formula and direction.
pub fn convert(wavelength_aa: f64, formula: AirVacFormula, direction: Direction) -> Result<f64, ConversionError> {
    if !(wavelength_aa.is_finite() && wavelength_aa > 0.0) {
        return Err(ConversionError::OutOfRange {
            value: wavelength_aa,
            low: 0.0,
            high: f64::INFINITY,
        });
    }
    match (formula, direction) {
        (AirVacFormula::Eso, Direction::VacToAir) => Ok(vac_to_air_eso(wavelength_aa)),
        (AirVacFormula::Eso, Direction::AirToVac) => air_to_vac_eso(wavelength_aa),
        (AirVacFormula::Morton, Direction::VacToAir) => Ok(vac_to_air_morton2000(wavelength_aa)),
        (AirVacFormula::Morton, Direction::AirToVac) => Ok(air_to_vac_morton_iau(wavelength_aa)),
        (AirVacFormula::PeckReeder, Direction::VacToAir) => Ok(vac_to_air_peck_reeder(wavelength_aa)),
        (AirVacFormula::PeckReeder, Direction::AirToVac) => {
            Err(ConversionError::Unsupported("Peck & Reeder air to vacuum"))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn edlen_index_has_expected_magnitude() {
        let n = edlen53_index(5000.0, 15.0, 760.0);
        assert!((n - 1.0) > 2.7e-4 && (n - 1.0) < 2.9e-4, "n - 1 = {}", n - 1.0);
        // Dispersion: the index decreases towards the red.
        assert!(edlen53_index(6500.0, 15.0, 760.0) < n);
    }

    #[test]
    fn eso_round_trip_is_tight() {
        for &vac in &[3800.0, 4217.791, 5039.0, 6139.39, 6900.0] {
            let air = vac_to_air_eso(vac);
            assert!(air < vac);
            let back = air_to_vac_eso(air).unwrap();
            assert_relative_eq!(back, vac, epsilon = 1e-8);
        }
    }

    #[test]
    fn formulas_agree_to_a_few_milliangstroms() {
        let vac = 5500.0;
        let eso = vac_to_air_eso(vac);
        assert!((vac_to_air_morton2000(vac) - eso).abs() < 5e-3);
        assert!((vac_to_air_peck_reeder(vac) - eso).abs() < 5e-3);
        assert!((air_to_vac_morton_iau(eso) - vac).abs() < 5e-3);
    }

    #[test]
    fn peck_reeder_uses_published_coefficients() {
        assert_relative_eq!(vac_to_air_peck_reeder(4000.0), 3998.8693258873, epsilon = 1e-9);
        assert_relative_eq!(vac_to_air_peck_reeder(5000.0), 4998.6055927975, epsilon = 1e-9);
    }

    #[test]
    fn matrix_conversion_preserves_shape() {
        let air = DMatrix::from_row_slice(2, 3, &[5000.0, 5001.0, 5002.0, 6000.0, 6001.0, 6002.0]);
        let vac = air_to_vac_matrix(&air).unwrap();
        assert_eq!(vac.shape(), (2, 3));
        assert_relative_eq!(vac[(1, 2)], air_to_vac_eso(6002.0).unwrap());
    }

    #[test]
    fn convert_rejects_bad_input_and_unsupported_direction() {
        assert!(convert(-5.0, AirVacFormula::Eso, Direction::VacToAir).is_err());
        assert!(matches!(
            convert(5000.0, AirVacFormula::PeckReeder, Direction::AirToVac),
            Err(ConversionError::Unsupported(_))
        ));
        assert!(convert(5000.0, AirVacFormula::Morton, Direction::AirToVac).unwrap() > 5000.0);
    }
}
