//! Doppler shifts and velocity separations between wavelengths.

use crate::spectral::ConversionError;
use crate::units::{Length, LengthExt, Velocity, VelocityExt};

/// Speed of light in vacuum (m/s).
pub const SPEED_OF_LIGHT: f64 = 299_792_458.0;

/// Energy of a 1 cm^-1 photon in eV.
const EV_PER_WAVENUMBER: f64 = 1.239_841_984e-4;

/// Shift a wavelength by a velocity (non-relativistic Doppler formula).
pub fn shift_wavelength(wavelength: Length, velocity: Velocity) -> Result<Length, ConversionError> {
    let v = velocity.as_meters_per_second();
    if v.abs() >= SPEED_OF_LIGHT {
        return Err(ConversionError::Superluminal(v));
    }
    Ok(Length::from_angstroms(shift_aa(wavelength.as_angstroms(), v)))
}

/// Shift a wavelength in Angstroms by `v` m/s.
///
/// Callers working on bulk arrays validate `v` once with [`check_velocity`].
pub fn shift_aa(wavelength_aa: f64, v: f64) -> f64 {
    wavelength_aa * (1.0 + v / SPEED_OF_LIGHT)
}

pub fn check_velocity(v: f64) -> Result<(), ConversionError> {
    if v.is_finite() && v.abs() < SPEED_OF_LIGHT {
        Ok(())
    } else {
        Err(ConversionError::Superluminal(v))
    }
}

/// Wavelength offset (Angstroms) equivalent to a velocity at a given wavelength.
pub fn velocity_to_wavelength_offset(velocity: Velocity, wavelength: Length) -> f64 {
    velocity.as_meters_per_second() * wavelength.as_angstroms() / SPEED_OF_LIGHT
}

/// Velocity separation (m/s) of `wl2` relative to `wl1`, both in the same units.
pub fn wavelength_to_velocity(wl1: f64, wl2: f64) -> f64 {
    (wl2 - wl1) * SPEED_OF_LIGHT / ((wl1 + wl2) / 2.0)
}

/// Velocity shift of a line with wavenumber `wavenumber` (cm^-1) and
/// sensitivity coefficient `q` (cm^-1) for a fractional change of α.
pub fn q_alpha_shift(wavenumber: f64, q: f64, alpha_ratio: f64) -> f64 {
    let shifted = wavenumber + q * (alpha_ratio.powi(2) - 1.0);
    wavelength_to_velocity(1e8 / wavenumber, 1e8 / shifted)
}

pub fn wavenumber_to_ev(wavenumber: f64) -> f64 {
    wavenumber * EV_PER_WAVENUMBER
}

pub fn ev_to_wavenumber(ev: f64) -> f64 {
    if ev == 0.0 { 0.0 } else { ev / EV_PER_WAVENUMBER }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn shift_and_separation_are_consistent() {
        let wl = Length::from_angstroms(5000.0);
        let v = Velocity::from_meters_per_second(1000.0);
        let shifted = shift_wavelength(wl, v).unwrap();
        let sep = wavelength_to_velocity(wl.as_angstroms(), shifted.as_angstroms());
        // Midpoint normalization differs from the exact shift by v²/2c.
        assert_relative_eq!(sep, 1000.0, epsilon = 1e-2);
        assert_relative_eq!(
            velocity_to_wavelength_offset(v, wl),
            shifted.as_angstroms() - wl.as_angstroms(),
            epsilon = 1e-9
        );
    }

    #[test]
    fn superluminal_velocities_are_rejected() {
        let wl = Length::from_angstroms(5000.0);
        assert!(shift_wavelength(wl, Velocity::from_meters_per_second(SPEED_OF_LIGHT)).is_err());
        assert!(check_velocity(-3e8).is_err());
        assert!(check_velocity(f64::NAN).is_err());
        assert!(check_velocity(30_000.0).is_ok());
    }

    #[test]
    fn separation_is_antisymmetric() {
        let a = wavelength_to_velocity(6138.313, 6139.390);
        let b = wavelength_to_velocity(6139.390, 6138.313);
        assert!(a > 0.0);
        assert_relative_eq!(a, -b);
        assert_relative_eq!(a, 52_600.0, epsilon = 100.0);
    }

    #[test]
    fn q_alpha_shift_vanishes_without_alpha_change() {
        assert_relative_eq!(q_alpha_shift(20_000.0, 1000.0, 1.0), 0.0);
        // Increasing alpha with positive q raises the wavenumber, shortening the wavelength.
        assert!(q_alpha_shift(20_000.0, 1000.0, 1.0 + 1e-7) < 0.0);
    }

    #[test]
    fn energy_conversions_round_trip() {
        assert_relative_eq!(ev_to_wavenumber(wavenumber_to_ev(12_345.0)), 12_345.0, epsilon = 1e-8);
        assert_eq!(ev_to_wavenumber(0.0), 0.0);
        assert_relative_eq!(wavenumber_to_ev(8065.54), 1.0, epsilon = 1e-4);
    }
}
