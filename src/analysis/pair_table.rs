//! `pair-table`: one table per pair column and era with a row per star.
//!
//! Rows hold the weighted-mean pair separation, its statistical error (EotWM),
//! the systematic error of the pair from the model's `σ_sys` of both
//! transitions, and the model-corrected offsets of both transitions.

use std::collections::HashMap;
use std::fs::File;
use std::path::{Path, PathBuf};

use log::{info, warn};

use crate::analysis::summarize;
use crate::domain::{Era, StellarProperties};
use crate::error::AppError;
use crate::io::write_pair_table_csv;
use crate::models::ModelParams;
use crate::star::Star;

#[derive(Debug, Clone, PartialEq)]
pub struct PairTableRow {
    pub star: String,
    pub n_obs: usize,
    pub temperature: f64,
    pub metallicity: f64,
    pub gravity: f64,
    pub magnitude: f64,
    /// Weighted-mean pair separation (m/s).
    pub separation: f64,
    pub stat_err: f64,
    pub sys_err: f64,
    /// Weighted-mean model-corrected offset of the higher-energy transition.
    pub higher_offset: f64,
    pub lower_offset: f64,
}

/// `<out>/<era>/<label>_pair_separations_<era>.csv`
pub fn pair_table_path(out_dir: &Path, label: &str, era: Era) -> PathBuf {
    out_dir.join(era.as_str()).join(format!("{label}_pair_separations_{era}.csv"))
}

fn corrected_mean(star: &Star, t_label: &str, era: Era) -> f64 {
    let (Some(corrected), Ok(col)) = (&star.corrected_offsets, star.t_index(t_label)) else {
        return f64::NAN;
    };
    let values = star.era_column(corrected, col, era);
    let errors = star.era_column(&star.transition_errors, col, era);
    summarize(&values, &errors).map_or(f64::NAN, |s| s.weighted_mean)
}

/// Row of one star for pair column `p_col` in `era`; `None` without data.
///
/// The model must already be applied to `star` for the offsets to be finite.
pub fn pair_table_row(
    star: &Star,
    properties: &StellarProperties,
    params: &ModelParams,
    p_col: usize,
    era: Era,
) -> Option<PairTableRow> {
    if !star.has_obs(era) {
        return None;
    }
    let values = star.era_column(&star.pair_separations, p_col, era);
    let errors = star.era_column(&star.pair_errors, p_col, era);
    let summary = summarize(&values, &errors)?;
    let (higher, lower) = star.pair_members(p_col)?;
    let sys = |label: &str| params.sigma_sys_for(label, era).unwrap_or(f64::NAN);
    Some(PairTableRow {
        star: star.name.clone(),
        n_obs: summary.n,
        temperature: properties.temperature,
        metallicity: properties.metallicity,
        gravity: properties.gravity,
        magnitude: properties.magnitude,
        separation: summary.weighted_mean,
        stat_err: summary.eotwm,
        sys_err: sys(higher).hypot(sys(lower)),
        higher_offset: corrected_mean(star, higher, era),
        lower_offset: corrected_mean(star, lower, era),
    })
}

/// Apply the model to every star with properties, then write one table per
/// pair label and era. Returns the paths written.
pub fn write_pair_tables(
    out_dir: &Path,
    stars: &mut [Star],
    properties: &[StellarProperties],
    params: &ModelParams,
) -> Result<Vec<PathBuf>, AppError> {
    let by_name: HashMap<&str, &StellarProperties> = properties.iter().map(|p| (p.name.as_str(), p)).collect();
    for star in stars.iter_mut() {
        match by_name.get(star.name.as_str()) {
            Some(p) => star.apply_model(params, p),
            None => warn!("{}: no stellar properties, skipping", star.name),
        }
    }
    let with_props: Vec<(&Star, &StellarProperties)> = stars
        .iter()
        .filter_map(|s| by_name.get(s.name.as_str()).map(|p| (s, *p)))
        .collect();
    let Some((first, _)) = with_props.first() else {
        return Err(AppError::new(3, "No stars with stellar properties for the pair tables."));
    };
    let labels = first.pair_labels().to_vec();

    let mut written = Vec::new();
    for label in &labels {
        for era in Era::ALL {
            let rows: Vec<PairTableRow> = with_props
                .iter()
                .filter_map(|(star, props)| {
                    let p_col = star.p_index(label).ok()?;
                    pair_table_row(star, props, params, p_col, era)
                })
                .collect();
            if rows.is_empty() {
                continue;
            }
            let path = pair_table_path(out_dir, label, era);
            write_pair_table_csv(&path, &rows)?;
            written.push(path);
        }
    }
    info!("Wrote {} pair tables under {}", written.len(), out_dir.display());
    Ok(written)
}

fn parse_cell(record: &csv::StringRecord, idx: usize, line: u64) -> Result<f64, AppError> {
    let raw = record.get(idx).unwrap_or("");
    raw.parse::<f64>()
        .map_err(|_| AppError::new(2, format!("Pair table line {line}: invalid number '{raw}' in column {}", idx + 1)))
}

/// Read a table written by [`write_pair_tables`].
pub fn read_pair_table(path: &Path) -> Result<Vec<PairTableRow>, AppError> {
    let file = File::open(path)
        .map_err(|e| AppError::new(2, format!("Failed to open pair table '{}': {e}", path.display())))?;
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .trim(csv::Trim::All)
        .from_reader(file);

    let mut rows = Vec::new();
    for (idx, record) in reader.records().enumerate() {
        let line = idx as u64 + 2;
        let record = record.map_err(|e| AppError::new(2, format!("Pair table line {line}: {e}")))?;
        if record.len() < 11 {
            return Err(AppError::new(
                2,
                format!("Pair table line {line}: expected 11 columns, found {}", record.len()),
            ));
        }
        let num = |i: usize| parse_cell(&record, i, line);
        rows.push(PairTableRow {
            star: record.get(0).unwrap_or("").to_string(),
            n_obs: num(1)? as usize,
            temperature: num(2)?,
            metallicity: num(3)?,
            gravity: num(4)?,
            magnitude: num(5)?,
            separation: num(6)?,
            stat_err: num(7)?,
            sys_err: num(8)?,
            higher_offset: num(9)?,
            lower_offset: num(10)?,
        });
    }
    Ok(rows)
}

/// Pair label of a table file name `<label>_pair_separations_<era>.csv`.
pub fn pair_label_from_path(path: &Path) -> Option<String> {
    let stem = path.file_stem()?.to_str()?;
    let (label, _) = stem.rsplit_once("_pair_separations_")?;
    Some(label.to_string())
}
