//! Shared enums and small records used across the pipeline.
//!
//! These types are intentionally kept lightweight and serializable so they can
//! be used as CLI values and stored in JSON/CSV outputs.

use chrono::NaiveDateTime;
use clap::ValueEnum;
use serde::{Deserialize, Serialize};

/// Observations before or after the 2015 fibre change.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum Era {
    Pre,
    Post,
}

impl Era {
    pub const ALL: [Era; 2] = [Era::Pre, Era::Post];

    pub fn as_str(self) -> &'static str {
        match self {
            Era::Pre => "pre",
            Era::Post => "post",
        }
    }
}

impl std::fmt::Display for Era {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Models of transition offsets as a function of stellar parameters.
///
/// All models are linear in their coefficients.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "snake_case")]
pub enum ModelKind {
    /// `a`
    Constant,
    /// `a + bT + cM + dG`
    Linear,
    /// `a + bT + cM + dG + eT² + fM² + gG²`
    Quadratic,
    /// `a + bT + cM + dG + e M/T`
    CrossTerm,
    /// `a + bT + cM + dV + eT² + fM² + gV²` with absolute magnitude `V`.
    QuadraticMagnitude,
}

impl ModelKind {
    pub const ALL: [ModelKind; 5] = [
        ModelKind::Constant,
        ModelKind::Linear,
        ModelKind::Quadratic,
        ModelKind::CrossTerm,
        ModelKind::QuadraticMagnitude,
    ];

    /// Number of coefficients in the model.
    pub fn param_count(self) -> usize {
        match self {
            ModelKind::Constant => 1,
            ModelKind::Linear => 4,
            ModelKind::Quadratic => 7,
            ModelKind::CrossTerm => 5,
            ModelKind::QuadraticMagnitude => 7,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            ModelKind::Constant => "constant",
            ModelKind::Linear => "linear",
            ModelKind::Quadratic => "quadratic",
            ModelKind::CrossTerm => "cross_term",
            ModelKind::QuadraticMagnitude => "quadratic_magnitude",
        }
    }
}

/// Air/vacuum conversion formulae.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "kebab-case")]
pub enum AirVacFormula {
    /// Edlen (1953), as used by the ESO pipeline.
    Eso,
    /// Morton (2000) vacuum to air, and the IAU standard for air to vacuum.
    Morton,
    /// Peck & Reeder (1972); vacuum to air only.
    PeckReeder,
}

/// Direction of a wavelength conversion.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "kebab-case")]
pub enum Direction {
    AirToVac,
    VacToAir,
}

/// Stellar parameters that offsets are compared against.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum StellarParameter {
    Temperature,
    Metallicity,
    Gravity,
    Magnitude,
}

impl StellarParameter {
    pub fn axis_label(self) -> &'static str {
        match self {
            StellarParameter::Temperature => "Temperature (K)",
            StellarParameter::Metallicity => "[Fe/H]",
            StellarParameter::Gravity => "log(g)",
            StellarParameter::Magnitude => "Absolute V magnitude",
        }
    }
}

/// Catalogue properties of one star.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StellarProperties {
    pub name: String,
    pub temperature: f64,
    pub metallicity: f64,
    pub gravity: f64,
    /// Absolute V magnitude.
    pub magnitude: f64,
    /// Right ascension in hours.
    #[serde(default)]
    pub ra_hours: Option<f64>,
    /// Declination in degrees.
    #[serde(default)]
    pub dec_degrees: Option<f64>,
    /// Heliocentric distance in parsecs.
    #[serde(default)]
    pub distance_pc: Option<f64>,
}

impl StellarProperties {
    pub fn get(&self, parameter: StellarParameter) -> f64 {
        match parameter {
            StellarParameter::Temperature => self.temperature,
            StellarParameter::Metallicity => self.metallicity,
            StellarParameter::Gravity => self.gravity,
            StellarParameter::Magnitude => self.magnitude,
        }
    }
}

/// Result of fitting one absorption feature in one observation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TransitionFit {
    pub observation: String,
    pub date_obs: NaiveDateTime,
    /// Transition label with order, e.g. `4217.791Fe1_16`.
    pub label: String,
    pub order: usize,
    pub amplitude: f64,
    pub amplitude_err: f64,
    /// Fitted line centre (Angstroms).
    pub mean: f64,
    pub mean_err: f64,
    /// Error on the centre expressed as a velocity (m/s).
    pub mean_err_vel: f64,
    pub sigma: f64,
    pub sigma_err: f64,
    /// Offset of the fitted centre from the expected position (m/s).
    pub velocity_offset: f64,
    pub velocity_offset_err: f64,
    /// Full width at half maximum (m/s).
    pub fwhm: f64,
    pub fwhm_err: f64,
    pub continuum: f64,
    pub chi_squared_nu: f64,
    pub airmass: f64,
    /// Barycentric Earth radial velocity of the observation (m/s).
    pub berv: f64,
}
