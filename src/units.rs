//! Type-safe physical quantities for wavelengths and velocities.
//!
//! Scalar quantities crossing module boundaries (a transition's wavelength, a
//! Doppler velocity, the barycentric correction) use `uom` types. Bulk arrays
//! such as a 72 x 4096 wavelength grid stay plain `f64` Angstroms.

use uom::si::length::{angstrom, centimeter, meter, nanometer};
use uom::si::velocity::{kilometer_per_second, meter_per_second};

/// Length quantity (wavelengths).
pub type Length = uom::si::f64::Length;

/// Velocity quantity (Doppler shifts, separations, BERV).
pub type Velocity = uom::si::f64::Velocity;

/// Extension trait for the wavelength units used in spectroscopy.
pub trait LengthExt {
    /// Create length from Angstroms
    fn from_angstroms(aa: f64) -> Self;

    /// Get length in Angstroms
    fn as_angstroms(&self) -> f64;

    /// Create length from nanometers
    fn from_nanometers(nm: f64) -> Self;

    /// Get length in nanometers
    fn as_nanometers(&self) -> f64;

    /// Get length in centimeters (for wavenumbers)
    fn as_centimeters(&self) -> f64;

    /// Get length in meters
    fn as_meters(&self) -> f64;
}

/// Extension trait for velocity conversions.
pub trait VelocityExt {
    fn from_meters_per_second(mps: f64) -> Self;

    fn as_meters_per_second(&self) -> f64;

    fn from_kilometers_per_second(kmps: f64) -> Self;

    fn as_kilometers_per_second(&self) -> f64;
}

impl LengthExt for Length {
    fn from_angstroms(aa: f64) -> Self {
        Length::new::<angstrom>(aa)
    }

    fn as_angstroms(&self) -> f64 {
        self.get::<angstrom>()
    }

    fn from_nanometers(nm: f64) -> Self {
        Length::new::<nanometer>(nm)
    }

    fn as_nanometers(&self) -> f64 {
        self.get::<nanometer>()
    }

    fn as_centimeters(&self) -> f64 {
        self.get::<centimeter>()
    }

    fn as_meters(&self) -> f64 {
        self.get::<meter>()
    }
}

impl VelocityExt for Velocity {
    fn from_meters_per_second(mps: f64) -> Self {
        Velocity::new::<meter_per_second>(mps)
    }

    fn as_meters_per_second(&self) -> f64 {
        self.get::<meter_per_second>()
    }

    fn from_kilometers_per_second(kmps: f64) -> Self {
        Velocity::new::<kilometer_per_second>(kmps)
    }

    fn as_kilometers_per_second(&self) -> f64 {
        self.get::<kilometer_per_second>()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn angstroms_and_nanometers_agree() {
        let wl = Length::from_angstroms(5039.0);
        assert_relative_eq!(wl.as_nanometers(), 503.9, epsilon = 1e-9);
        assert_relative_eq!(Length::from_nanometers(503.9).as_angstroms(), 5039.0, epsilon = 1e-9);
        assert_relative_eq!(wl.as_centimeters(), 5.039e-5, epsilon = 1e-15);
    }

    #[test]
    fn velocity_units_convert() {
        let v = Velocity::from_kilometers_per_second(-12.5);
        assert_relative_eq!(v.as_meters_per_second(), -12_500.0, epsilon = 1e-9);
        assert_relative_eq!(
            Velocity::from_meters_per_second(800.0).as_kilometers_per_second(),
            0.8,
            epsilon = 1e-12
        );
    }
}
