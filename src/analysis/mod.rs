//! Analysis commands built on the per-star aggregates.
//!
//! - pair separations and fit summaries of one star (`separations`)
//! - the stellar database of weighted-mean offsets (`database`)
//! - stellar-parameter model fits (`model_fit`) and their σ_sys dependence
//!   (`dependence`)
//! - per-pair tables across stars (`pair_table`)
//! - trends of pair separations with stellar parameters, distance and BERV
//!   (`trends`, `galactic`, `stability`)
//! - per-star checks of model-corrected pair offsets (`diagnostics`)

pub mod database;
pub mod dependence;
pub mod diagnostics;
pub mod galactic;
pub mod model_fit;
pub mod pair_table;
pub mod separations;
pub mod stability;
pub mod trends;

use crate::math::{chi_squared_nu, error_on_mean, weighted_mean_and_error};

/// Weighted statistics of one column of measurements.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ColumnSummary {
    /// Number of finite measurements.
    pub n: usize,
    pub weighted_mean: f64,
    /// Error on the weighted mean.
    pub eotwm: f64,
    /// Error on the (unweighted) mean.
    pub eotm: f64,
    /// χ²_ν of the measurements about the weighted mean.
    pub chi_squared_nu: f64,
}

/// Summarize `values` with their `errors`; `None` when nothing is usable.
pub fn summarize(values: &[f64], errors: &[f64]) -> Option<ColumnSummary> {
    let (v, e): (Vec<f64>, Vec<f64>) = values
        .iter()
        .zip(errors)
        .filter(|(v, e)| v.is_finite() && e.is_finite() && **e > 0.0)
        .map(|(v, e)| (*v, *e))
        .unzip();
    let (weighted_mean, eotwm) = weighted_mean_and_error(&v, &e)?;
    let residuals: Vec<f64> = v.iter().map(|x| x - weighted_mean).collect();
    Some(ColumnSummary {
        n: v.len(),
        weighted_mean,
        eotwm,
        eotm: error_on_mean(&v),
        chi_squared_nu: chi_squared_nu(&residuals, &e, 1),
    })
}
