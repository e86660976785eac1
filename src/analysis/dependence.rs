//! `sigma-sys`: how the systematic scatter of model residuals depends on
//! stellar parameters.
//!
//! Every label is fitted per era; the residuals are binned by the parameter
//! and `σ_sys` is found per bin. Bins are then averaged across labels.

use log::warn;
use rayon::prelude::*;

use crate::analysis::database::StellarDatabase;
use crate::domain::{Era, ModelKind, StellarParameter};
use crate::fit::{BinStat, binned_sigma_sys, default_bin_edges, fit_model};
use crate::math::{bin_midpoints, nan_mean, nan_std, quantile_bins};
use crate::models::StellarCoords;
use crate::plot::{BLUE_POINTS, Panel, Series, SeriesKind, XyPanel};

/// Parameters shown in the dependence grid.
pub const DEPENDENCE_PARAMETERS: [StellarParameter; 3] = [
    StellarParameter::Temperature,
    StellarParameter::Metallicity,
    StellarParameter::Gravity,
];

/// Mean `σ_sys` per bin across labels for one parameter and era.
#[derive(Debug, Clone)]
pub struct DependenceCurve {
    pub parameter: StellarParameter,
    pub era: Era,
    pub midpoints: Vec<f64>,
    pub mean_sigma_sys: Vec<f64>,
    pub std_sigma_sys: Vec<f64>,
    /// Number of labels contributing.
    pub n_labels: usize,
}

fn coordinate(c: &StellarCoords, parameter: StellarParameter) -> f64 {
    match parameter {
        StellarParameter::Temperature => c.temperature,
        StellarParameter::Metallicity => c.metallicity,
        StellarParameter::Gravity => c.gravity,
        StellarParameter::Magnitude => c.magnitude,
    }
}

/// Bin edges for a parameter: fixed defaults, or `nbins` quantile bins of the
/// stars' values.
pub fn bin_edges(db: &StellarDatabase, parameter: StellarParameter, nbins: Option<usize>) -> Vec<f64> {
    match nbins {
        None => default_bin_edges(parameter),
        Some(n) => {
            let values: Vec<f64> = db
                .stars
                .iter()
                .map(|s| coordinate(&StellarCoords::from(s), parameter))
                .collect();
            quantile_bins(&values, n)
        }
    }
}

fn label_bins(
    db: &StellarDatabase,
    col: usize,
    era: Era,
    model: ModelKind,
    parameter: StellarParameter,
    edges: &[f64],
) -> Option<Vec<BinStat>> {
    let data = db.label_data(era, col);
    let errors = data.fit_errors();
    let fit = match fit_model(model, &data.coords, &data.values, &errors) {
        Ok(fit) => fit,
        Err(e) => {
            warn!("{} {era}: {e}", db.labels[col]);
            return None;
        }
    };
    let param: Vec<f64> = data.coords.iter().map(|c| coordinate(c, parameter)).collect();
    Some(binned_sigma_sys(&param, &fit.residuals, &errors, edges))
}

/// Binned `σ_sys` against `parameter` in `era`, averaged over every label.
pub fn parameter_dependence(
    db: &StellarDatabase,
    model: ModelKind,
    parameter: StellarParameter,
    era: Era,
    nbins: Option<usize>,
) -> DependenceCurve {
    let edges = bin_edges(db, parameter, nbins);
    let midpoints = bin_midpoints(&edges);
    let per_label: Vec<Vec<BinStat>> = (0..db.labels.len())
        .into_par_iter()
        .filter_map(|col| label_bins(db, col, era, model, parameter, &edges))
        .collect();

    let column = |b: usize| -> Vec<f64> { per_label.iter().map(|bins| bins[b].sigma_sys).collect() };
    DependenceCurve {
        parameter,
        era,
        mean_sigma_sys: (0..midpoints.len()).map(|b| nan_mean(&column(b))).collect(),
        std_sigma_sys: (0..midpoints.len()).map(|b| nan_std(&column(b))).collect(),
        n_labels: per_label.len(),
        midpoints,
    }
}

/// One panel per curve; arrange as eras × parameters.
pub fn dependence_panels(curves: &[DependenceCurve]) -> Vec<Panel> {
    curves
        .iter()
        .map(|c| {
            let points = c
                .midpoints
                .iter()
                .zip(c.mean_sigma_sys.iter().zip(&c.std_sigma_sys))
                .map(|(&x, (&y, &e))| (x, y, e))
                .collect();
            Panel::Xy(XyPanel {
                title: format!("{} ({} labels)", c.era, c.n_labels),
                x_label: c.parameter.axis_label().to_string(),
                y_label: "σ_sys (m/s)".to_string(),
                series: vec![Series::new(SeriesKind::ErrorBars, BLUE_POINTS, points)],
                ..XyPanel::default()
            })
        })
        .collect()
}
