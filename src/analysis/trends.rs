//! `pairs`: trends of pair separations across stars.
//!
//! Works on the tables written by `pair-table`. For every pair label and era
//! the separations are plotted against Teff, [Fe/H], log g and the
//! heliocentric and galactocentric distances, with the weighted mean ± EotWM
//! shaded. A last chart compares each pair's `σ_sys` with its mean separation.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use log::{info, warn};
use rayon::prelude::*;

use crate::analysis::galactic::galactocentric_distance;
use crate::analysis::pair_table::{PairTableRow, pair_label_from_path, read_pair_table};
use crate::analysis::summarize;
use crate::domain::{Era, ModelKind, StellarParameter, StellarProperties};
use crate::error::AppError;
use crate::fit::{FitError, find_sys_scatter};
use crate::models::StellarCoords;
use crate::plot::{BLUE_POINTS, GREY_LINE, ORANGE_POINTS, Panel, Series, SeriesKind, XyPanel, render_panels};

/// Which quantity a trend is plotted against.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum TrendAxis {
    Parameter(StellarParameter),
    HeliocentricDistance,
    GalactocentricDistance,
}

impl TrendAxis {
    pub const ALL: [TrendAxis; 5] = [
        TrendAxis::Parameter(StellarParameter::Temperature),
        TrendAxis::Parameter(StellarParameter::Metallicity),
        TrendAxis::Parameter(StellarParameter::Gravity),
        TrendAxis::HeliocentricDistance,
        TrendAxis::GalactocentricDistance,
    ];

    pub fn axis_label(&self) -> &'static str {
        match self {
            TrendAxis::Parameter(p) => p.axis_label(),
            TrendAxis::HeliocentricDistance => "Heliocentric distance (pc)",
            TrendAxis::GalactocentricDistance => "Galactocentric distance (pc)",
        }
    }

    /// Value of this axis for a table row; distances need catalogue positions.
    fn value(&self, row: &PairTableRow, properties: Option<&StellarProperties>) -> Option<f64> {
        match self {
            TrendAxis::Parameter(StellarParameter::Temperature) => Some(row.temperature),
            TrendAxis::Parameter(StellarParameter::Metallicity) => Some(row.metallicity),
            TrendAxis::Parameter(StellarParameter::Gravity) => Some(row.gravity),
            TrendAxis::Parameter(StellarParameter::Magnitude) => Some(row.magnitude),
            TrendAxis::HeliocentricDistance => properties?.distance_pc,
            TrendAxis::GalactocentricDistance => {
                let p = properties?;
                Some(galactocentric_distance(p.ra_hours?, p.dec_degrees?, p.distance_pc?))
            }
        }
    }
}

/// Separations of one pair table against one axis.
#[derive(Debug, Clone)]
pub struct Trend {
    pub axis: TrendAxis,
    /// `(x, separation, stat_err)` for rows with a value on the axis.
    pub points: Vec<(f64, f64, f64)>,
    pub weighted_mean: f64,
    pub eotwm: f64,
}

/// Trend of `rows` against `axis`; `None` when no row has a value on it.
pub fn trend(rows: &[PairTableRow], axis: TrendAxis, properties: &HashMap<&str, &StellarProperties>) -> Option<Trend> {
    let points: Vec<(f64, f64, f64)> = rows
        .iter()
        .filter_map(|r| {
            let x = axis.value(r, properties.get(r.star.as_str()).copied())?;
            Some((x, r.separation, r.stat_err))
        })
        .filter(|(x, y, e)| x.is_finite() && y.is_finite() && e.is_finite())
        .collect();
    let values: Vec<f64> = points.iter().map(|p| p.1).collect();
    let errors: Vec<f64> = points.iter().map(|p| p.2).collect();
    let summary = summarize(&values, &errors)?;
    Some(Trend {
        axis,
        points,
        weighted_mean: summary.weighted_mean,
        eotwm: summary.eotwm,
    })
}

pub fn trend_panel(label: &str, era: Era, t: &Trend) -> Panel {
    Panel::Xy(XyPanel {
        title: format!("{label} {era} ({} stars)", t.points.len()),
        x_label: t.axis.axis_label().to_string(),
        y_label: "Pair separation (m/s)".to_string(),
        series: vec![Series::new(SeriesKind::ErrorBars, BLUE_POINTS, t.points.clone())],
        hlines: vec![(t.weighted_mean, GREY_LINE)],
        band: Some((t.weighted_mean - t.eotwm, t.weighted_mean + t.eotwm)),
        ..XyPanel::default()
    })
}

/// Systematic scatter of one pair across stars.
#[derive(Debug, Clone)]
pub struct SeparationScatter {
    pub label: String,
    pub era: Era,
    pub n_stars: usize,
    pub weighted_mean: f64,
    pub sigma_sys: f64,
}

/// `σ_sys` of the separations in `rows` around a constant.
pub fn separation_scatter(
    label: &str,
    era: Era,
    rows: &[PairTableRow],
    n_sigma: f64,
    tolerance: f64,
) -> Result<SeparationScatter, FitError> {
    let coords: Vec<StellarCoords> = rows
        .iter()
        .map(|r| StellarCoords {
            temperature: r.temperature,
            metallicity: r.metallicity,
            gravity: r.gravity,
            magnitude: r.magnitude,
        })
        .collect();
    let values: Vec<f64> = rows.iter().map(|r| r.separation).collect();
    let errors: Vec<f64> = rows.iter().map(|r| r.stat_err).collect();
    let scatter = find_sys_scatter(ModelKind::Constant, &coords, &values, &errors, n_sigma, tolerance)?;
    Ok(SeparationScatter {
        label: label.to_string(),
        era,
        n_stars: scatter.mask.iter().filter(|k| **k).count(),
        weighted_mean: scatter.fit.betas[0],
        sigma_sys: scatter.sigma_sys,
    })
}

/// `σ_sys` against mean separation, one series per era.
pub fn scatter_panel(scatters: &[SeparationScatter]) -> Panel {
    let series = Era::ALL
        .iter()
        .zip([BLUE_POINTS, ORANGE_POINTS])
        .map(|(era, color)| {
            let points = scatters
                .iter()
                .filter(|s| s.era == *era)
                .map(|s| (s.weighted_mean, s.sigma_sys, 0.0))
                .collect();
            Series::new(SeriesKind::Points, color, points).labelled(era.as_str())
        })
        .collect();
    Panel::Xy(XyPanel {
        title: "Pair scatter".to_string(),
        x_label: "Weighted-mean pair separation (m/s)".to_string(),
        y_label: "σ_sys (m/s)".to_string(),
        series,
        ..XyPanel::default()
    })
}

/// Pair tables under `<table_dir>/<era>/`, as `(label, era, path)`.
pub fn pair_tables(table_dir: &Path) -> Vec<(String, Era, PathBuf)> {
    let mut tables = Vec::new();
    for era in Era::ALL {
        let Ok(entries) = std::fs::read_dir(table_dir.join(era.as_str())) else {
            continue;
        };
        for path in entries.filter_map(|e| e.ok()).map(|e| e.path()) {
            if path.extension().is_some_and(|ext| ext == "csv") {
                if let Some(label) = pair_label_from_path(&path) {
                    tables.push((label, era, path));
                }
            }
        }
    }
    tables.sort_by(|a, b| (&a.0, a.1.as_str()).cmp(&(&b.0, b.1.as_str())));
    tables
}

#[derive(Debug, Clone, Default)]
pub struct TrendSummary {
    pub plots: Vec<PathBuf>,
    pub scatters: Vec<SeparationScatter>,
}

/// Plot every pair table under `table_dir` into `<plot_dir>/<era>/<label>.svg`
/// plus `<plot_dir>/pair_scatter.svg`.
pub fn plot_pair_trends(
    table_dir: &Path,
    properties: &[StellarProperties],
    plot_dir: &Path,
    n_sigma: f64,
    tolerance: f64,
) -> Result<TrendSummary, AppError> {
    let tables = pair_tables(table_dir);
    if tables.is_empty() {
        return Err(AppError::new(3, format!("No pair tables found under '{}'.", table_dir.display())));
    }
    let by_name: HashMap<&str, &StellarProperties> = properties.iter().map(|p| (p.name.as_str(), p)).collect();

    let results: Vec<Result<(PathBuf, Option<SeparationScatter>), AppError>> = tables
        .par_iter()
        .map(|(label, era, path)| {
            let rows = read_pair_table(path)?;
            let panels: Vec<Panel> = TrendAxis::ALL
                .iter()
                .filter_map(|axis| trend(&rows, *axis, &by_name))
                .map(|t| trend_panel(label, *era, &t))
                .collect();
            let out = plot_dir.join(era.as_str()).join(format!("{label}.svg"));
            render_panels(&out, &panels, 2, 3, (1800, 1000))?;
            let scatter = match separation_scatter(label, *era, &rows, n_sigma, tolerance) {
                Ok(s) => Some(s),
                Err(e) => {
                    warn!("{label} {era}: {e}");
                    None
                }
            };
            Ok((out, scatter))
        })
        .collect();

    let mut summary = TrendSummary::default();
    for result in results {
        let (plot, scatter) = result?;
        summary.plots.push(plot);
        summary.scatters.extend(scatter);
    }
    let scatter_plot = plot_dir.join("pair_scatter.svg");
    render_panels(&scatter_plot, &[scatter_panel(&summary.scatters)], 1, 1, (900, 700))?;
    summary.plots.push(scatter_plot);
    info!("Wrote {} trend plots under {}", summary.plots.len(), plot_dir.display());
    Ok(summary)
}
