//! `fit-model`: fit a stellar-parameter model to every column of a database.
//!
//! Each label and era is fitted independently with [`find_sys_scatter`], using
//! the larger of EotWM and EotM as the per-star error. The coefficients and
//! `σ_sys` go into a [`ModelParams`] file.

use log::{debug, warn};
use rayon::prelude::*;

use crate::analysis::database::StellarDatabase;
use crate::domain::{Era, ModelKind};
use crate::error::AppError;
use crate::fit::{FitError, ModelSelection, find_sys_scatter, select_model};
use crate::models::ModelParams;

#[derive(Debug, Clone, Copy)]
pub struct ModelFitOptions {
    pub model: ModelKind,
    /// Outlier rejection threshold in total errors.
    pub n_sigma: f64,
    /// Bisection tolerance on `σ_sys` (m/s).
    pub tolerance: f64,
}

impl Default for ModelFitOptions {
    fn default() -> Self {
        Self {
            model: ModelKind::QuadraticMagnitude,
            n_sigma: 4.0,
            tolerance: 0.001,
        }
    }
}

/// Diagnostics of one label/era fit.
#[derive(Debug, Clone)]
pub struct ColumnFit {
    pub label: String,
    pub era: Era,
    pub n_stars: usize,
    pub n_kept: usize,
    pub sigma_sys: f64,
    pub chi_squared_nu: f64,
    pub iterations: usize,
}

#[derive(Debug, Clone)]
pub struct ModelFitRun {
    pub params: ModelParams,
    pub columns: Vec<ColumnFit>,
    /// Label/era combinations that could not be fitted, with the reason.
    pub failures: Vec<(String, Era, String)>,
}

fn fit_column(
    db: &StellarDatabase,
    col: usize,
    era: Era,
    options: &ModelFitOptions,
) -> Result<(Vec<f64>, ColumnFit), FitError> {
    let data = db.label_data(era, col);
    let scatter = find_sys_scatter(
        options.model,
        &data.coords,
        &data.values,
        &data.fit_errors(),
        options.n_sigma,
        options.tolerance,
    )?;
    let column = ColumnFit {
        label: db.labels[col].clone(),
        era,
        n_stars: data.len(),
        n_kept: scatter.mask.iter().filter(|k| **k).count(),
        sigma_sys: scatter.sigma_sys,
        chi_squared_nu: scatter.chi_history.last().copied().unwrap_or(f64::NAN),
        iterations: scatter.sys_history.len(),
    };
    Ok((scatter.fit.betas, column))
}

/// Fit every label of `db` in both eras.
///
/// Failed fits are logged and listed; having none succeed is an error.
pub fn fit_database(db: &StellarDatabase, options: &ModelFitOptions) -> Result<ModelFitRun, AppError> {
    let jobs: Vec<(usize, Era)> = (0..db.labels.len())
        .flat_map(|col| Era::ALL.into_iter().map(move |era| (col, era)))
        .collect();
    let results: Vec<_> = jobs
        .par_iter()
        .map(|&(col, era)| (col, era, fit_column(db, col, era, options)))
        .collect();

    let mut run = ModelFitRun {
        params: ModelParams::new(options.model),
        columns: Vec::new(),
        failures: Vec::new(),
    };
    for (col, era, result) in results {
        let label = &db.labels[col];
        match result {
            Ok((betas, column)) => {
                debug!("{label} {era}: σ_sys = {:.3} m/s from {} stars", column.sigma_sys, column.n_kept);
                run.params.insert(label, era, betas, column.sigma_sys);
                run.columns.push(column);
            }
            Err(e) => {
                warn!("{label} {era}: {e}");
                run.failures.push((label.clone(), era, e.to_string()));
            }
        }
    }
    if run.columns.is_empty() {
        return Err(AppError::new(
            3,
            format!("No column could be fitted with the {} model.", options.model.name()),
        ));
    }
    Ok(run)
}

/// Compare `candidates` by BIC on one label and era.
pub fn compare_models(
    db: &StellarDatabase,
    label: &str,
    era: Era,
    candidates: &[ModelKind],
) -> Result<ModelSelection, AppError> {
    let col = db
        .label_index(label)
        .ok_or_else(|| AppError::new(2, format!("Unknown label in database: {label}")))?;
    let data = db.label_data(era, col);
    Ok(select_model(candidates, &data.coords, &data.values, &data.fit_errors())?)
}
