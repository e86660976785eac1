//! Sky coordinates: ICRS to galactic to galactocentric.

use nalgebra::{Matrix3, Vector3};

/// Distance from the Sun to the Galactic centre (pc).
pub const GALCEN_DISTANCE_PC: f64 = 8300.0;

/// Height of the Sun above the Galactic midplane (pc).
pub const SUN_HEIGHT_PC: f64 = 27.0;

/// Rotation from ICRS equatorial to galactic Cartesian unit vectors (J2000).
fn icrs_to_galactic_matrix() -> Matrix3<f64> {
    Matrix3::new(
        -0.054_875_560_416_215_4,
        -0.873_437_090_234_885_0,
        -0.483_835_015_548_713_2,
        0.494_109_427_875_583_7,
        -0.444_829_629_960_011_2,
        0.746_982_244_497_218_9,
        -0.867_666_149_019_004_7,
        -0.198_076_373_431_201_5,
        0.455_983_776_175_066_9,
    )
}

/// Galactic longitude and latitude (degrees).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Galactic {
    pub l: f64,
    pub b: f64,
}

/// Cartesian galactocentric position (pc). The Sun is at `x < 0`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Galactocentric {
    pub x: f64,
    pub y: f64,
    pub z: f64,
}

impl Galactocentric {
    pub fn distance(&self) -> f64 {
        Vector3::new(self.x, self.y, self.z).norm()
    }
}

/// Galactic coordinates of an ICRS position; RA in hours, Dec in degrees.
pub fn icrs_to_galactic(ra_hours: f64, dec_degrees: f64) -> Galactic {
    let (ra, dec) = ((ra_hours * 15.0).to_radians(), dec_degrees.to_radians());
    let equatorial = Vector3::new(dec.cos() * ra.cos(), dec.cos() * ra.sin(), dec.sin());
    let g = icrs_to_galactic_matrix() * equatorial;
    let l = g.y.atan2(g.x).to_degrees().rem_euclid(360.0);
    let b = g.z.clamp(-1.0, 1.0).asin().to_degrees();
    Galactic { l, b }
}

/// Galactocentric position of a star at `distance_pc` from the Sun.
///
/// The heliocentric position is moved to the Galactic centre, then tilted so
/// the Sun lies `SUN_HEIGHT_PC` above the midplane.
pub fn galactic_to_galactocentric(g: Galactic, distance_pc: f64) -> Galactocentric {
    let (l, b) = (g.l.to_radians(), g.b.to_radians());
    let x = distance_pc * b.cos() * l.cos() - GALCEN_DISTANCE_PC;
    let y = distance_pc * b.cos() * l.sin();
    let z = distance_pc * b.sin();
    let theta = (SUN_HEIGHT_PC / GALCEN_DISTANCE_PC).asin();
    Galactocentric {
        x: x * theta.cos() + z * theta.sin(),
        y,
        z: -x * theta.sin() + z * theta.cos(),
    }
}

/// Distance from the Galactic centre (pc) of an ICRS position.
pub fn galactocentric_distance(ra_hours: f64, dec_degrees: f64, distance_pc: f64) -> f64 {
    galactic_to_galactocentric(icrs_to_galactic(ra_hours, dec_degrees), distance_pc).distance()
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    #[test]
    fn galactic_pole_and_centre() {
        // North galactic pole: RA 12h51m26.3s, Dec +27°07'42".
        let pole = icrs_to_galactic(192.859_48 / 15.0, 27.128_25);
        assert_abs_diff_eq!(pole.b, 90.0, epsilon = 1e-3);

        // Galactic centre direction (l = 0, b = 0).
        let centre = icrs_to_galactic(266.404_99 / 15.0, -28.936_17);
        let l = if centre.l > 180.0 { centre.l - 360.0 } else { centre.l };
        assert_abs_diff_eq!(l, 0.0, epsilon = 1e-3);
        assert_abs_diff_eq!(centre.b, 0.0, epsilon = 1e-3);
    }

    #[test]
    fn sun_sits_above_the_midplane() {
        let sun = galactic_to_galactocentric(Galactic { l: 0.0, b: 0.0 }, 0.0);
        assert_abs_diff_eq!(sun.distance(), GALCEN_DISTANCE_PC, epsilon = 1e-9);
        assert_abs_diff_eq!(sun.z, SUN_HEIGHT_PC, epsilon = 1e-9);
        assert!(sun.x < 0.0);
    }

    #[test]
    fn nearby_star_toward_centre_is_closer() {
        let toward = galactic_to_galactocentric(Galactic { l: 0.0, b: 0.0 }, 100.0);
        let away = galactic_to_galactocentric(Galactic { l: 180.0, b: 0.0 }, 100.0);
        assert_abs_diff_eq!(toward.distance(), GALCEN_DISTANCE_PC - 100.0, epsilon = 1e-6);
        assert_abs_diff_eq!(away.distance(), GALCEN_DISTANCE_PC + 100.0, epsilon = 1e-6);
    }
}
