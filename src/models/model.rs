//! Model evaluation for the stellar-parameter models.
//!
//! The fitter relies on two primitive operations:
//! - build a design row for a given star (for weighted least squares)
//! - predict the offset of a star given the coefficients (for residuals/corrections)
//!
//! These are implemented here for each model kind.

use serde::{Deserialize, Serialize};

use crate::domain::{ModelKind, StellarProperties};

/// The stellar parameters a model is evaluated on.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct StellarCoords {
    /// Effective temperature (K).
    pub temperature: f64,
    /// [Fe/H]
    pub metallicity: f64,
    /// log g
    pub gravity: f64,
    /// Absolute V magnitude.
    pub magnitude: f64,
}

impl From<&StellarProperties> for StellarCoords {
    fn from(p: &StellarProperties) -> Self {
        Self {
            temperature: p.temperature,
            metallicity: p.metallicity,
            gravity: p.gravity,
            magnitude: p.magnitude,
        }
    }
}

impl StellarCoords {
    pub fn is_finite(&self) -> bool {
        self.temperature.is_finite()
            && self.metallicity.is_finite()
            && self.gravity.is_finite()
            && self.magnitude.is_finite()
    }
}

/// Fill a design row for the given model kind.
///
/// The row includes the constant term first (intercept).
///
/// # Panics
/// Panics if `out` is shorter than `model.param_count()`. Callers should size
/// these arrays correctly.
pub fn fill_design_row(model: ModelKind, s: &StellarCoords, out: &mut [f64]) {
    let (t, m, g, v) = (s.temperature, s.metallicity, s.gravity, s.magnitude);
    out[0] = 1.0;
    match model {
        ModelKind::Constant => {}
        ModelKind::Linear => {
            out[1] = t;
            out[2] = m;
            out[3] = g;
        }
        ModelKind::Quadratic => {
            out[1] = t;
            out[2] = m;
            out[3] = g;
            out[4] = t * t;
            out[5] = m * m;
            out[6] = g * g;
        }
        ModelKind::CrossTerm => {
            out[1] = t;
            out[2] = m;
            out[3] = g;
            out[4] = m / t;
        }
        ModelKind::QuadraticMagnitude => {
            out[1] = t;
            out[2] = m;
            out[3] = v;
            out[4] = t * t;
            out[5] = m * m;
            out[6] = v * v;
        }
    }
}

/// Predict the offset for the given model kind.
pub fn predict(model: ModelKind, s: &StellarCoords, betas: &[f64]) -> f64 {
    let mut row = [0.0; 7];
    fill_design_row(model, s, &mut row);
    row.iter()
        .zip(betas)
        .take(model.param_count())
        .map(|(x, b)| x * b)
        .sum()
}
