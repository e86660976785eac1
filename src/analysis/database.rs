//! The stellar database: per-star weighted means of every column, split by era.
//!
//! Built from the `star.json` files of many stars plus their catalogue
//! properties. Each era holds stars × labels tables of the weighted mean, the
//! error on the weighted mean (EotWM), the error on the mean (EotM) and the
//! number of observations.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use clap::ValueEnum;
use log::{info, warn};
use nalgebra::DMatrix;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use crate::analysis::summarize;
use crate::domain::{Era, StellarProperties};
use crate::error::AppError;
use crate::models::StellarCoords;
use crate::star::Star;
use crate::star::record::STAR_FILE_NAME;

/// Which columns of the stars a database is built from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum ColumnKind {
    /// Transition offsets.
    Transitions,
    /// Pair separations.
    Pairs,
}

/// Stars × labels tables for one era; `None` where a star has no measurement.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EraTable {
    pub weighted_mean: Vec<Vec<Option<f64>>>,
    pub eotwm: Vec<Vec<Option<f64>>>,
    pub eotm: Vec<Vec<Option<f64>>>,
    pub n_obs: Vec<Vec<usize>>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StellarDatabase {
    pub columns: ColumnKind,
    pub labels: Vec<String>,
    pub stars: Vec<StellarProperties>,
    pub pre: EraTable,
    pub post: EraTable,
}

/// Measurements of one label across the stars of a database.
#[derive(Debug, Clone, Default)]
pub struct LabelData {
    pub stars: Vec<String>,
    pub coords: Vec<StellarCoords>,
    pub values: Vec<f64>,
    pub eotwm: Vec<f64>,
    pub eotm: Vec<f64>,
}

impl LabelData {
    /// Per-star error used in fits: the larger of EotWM and EotM.
    pub fn fit_errors(&self) -> Vec<f64> {
        self.eotwm.iter().zip(&self.eotm).map(|(a, b)| a.max(*b)).collect()
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

/// File name of a database for the given columns.
pub fn database_file_name(columns: ColumnKind) -> &'static str {
    match columns {
        ColumnKind::Transitions => "transition_database.json",
        ColumnKind::Pairs => "pair_database.json",
    }
}

impl StellarDatabase {
    pub fn era(&self, era: Era) -> &EraTable {
        match era {
            Era::Pre => &self.pre,
            Era::Post => &self.post,
        }
    }

    pub fn label_index(&self, label: &str) -> Option<usize> {
        self.labels.iter().position(|l| l == label)
    }

    /// Stars with a measurement of column `col` in `era`.
    pub fn label_data(&self, era: Era, col: usize) -> LabelData {
        let table = self.era(era);
        let mut out = LabelData::default();
        for (row, star) in self.stars.iter().enumerate() {
            let cell = |t: &Vec<Vec<Option<f64>>>| t.get(row).and_then(|r| r.get(col)).copied().flatten();
            let (Some(v), Some(wm_err), Some(m_err)) =
                (cell(&table.weighted_mean), cell(&table.eotwm), cell(&table.eotm))
            else {
                continue;
            };
            let coords = StellarCoords::from(star);
            if !coords.is_finite() {
                continue;
            }
            out.stars.push(star.name.clone());
            out.coords.push(coords);
            out.values.push(v);
            out.eotwm.push(wm_err);
            out.eotm.push(m_err);
        }
        out
    }
}

fn column_matrices(star: &Star, columns: ColumnKind) -> (&DMatrix<f64>, &DMatrix<f64>, &[String]) {
    match columns {
        ColumnKind::Transitions => (&star.transition_offsets, &star.transition_errors, star.transition_labels()),
        ColumnKind::Pairs => (&star.pair_separations, &star.pair_errors, star.pair_labels()),
    }
}

type StarRow = (Vec<Option<f64>>, Vec<Option<f64>>, Vec<Option<f64>>, Vec<usize>);

fn star_row(star: &Star, columns: ColumnKind, labels: &[String], era: Era) -> StarRow {
    let (values, errors, star_labels) = column_matrices(star, columns);
    let n = labels.len();
    let mut row: StarRow = (vec![None; n], vec![None; n], vec![None; n], vec![0; n]);
    if !star.has_obs(era) {
        return row;
    }
    for (j, label) in labels.iter().enumerate() {
        let Some(col) = star_labels.iter().position(|l| l == label) else {
            continue;
        };
        let v = star.era_column(values, col, era);
        let e = star.era_column(errors, col, era);
        if let Some(s) = summarize(&v, &e) {
            row.0[j] = Some(s.weighted_mean);
            row.1[j] = Some(s.eotwm);
            row.2[j] = Some(s.eotm);
            row.3[j] = s.n;
        }
    }
    row
}

fn era_table(stars: &[&Star], columns: ColumnKind, labels: &[String], era: Era) -> EraTable {
    let rows: Vec<StarRow> = stars.par_iter().map(|s| star_row(s, columns, labels, era)).collect();
    let mut table = EraTable::default();
    for (wm, wm_err, m_err, n) in rows {
        table.weighted_mean.push(wm);
        table.eotwm.push(wm_err);
        table.eotm.push(m_err);
        table.n_obs.push(n);
    }
    table
}

/// Build the database from loaded stars and their properties.
///
/// Stars without catalogue properties are skipped with a warning. Labels are
/// taken from the first star; other stars are matched by label.
pub fn build_database(
    stars: &[Star],
    properties: &[StellarProperties],
    columns: ColumnKind,
) -> Result<StellarDatabase, AppError> {
    let by_name: HashMap<&str, &StellarProperties> = properties.iter().map(|p| (p.name.as_str(), p)).collect();

    let mut kept: Vec<&Star> = Vec::new();
    let mut props = Vec::new();
    for star in stars {
        match by_name.get(star.name.as_str()) {
            Some(p) => {
                kept.push(star);
                props.push((*p).clone());
            }
            None => warn!("{}: no stellar properties, skipping", star.name),
        }
    }
    let Some(first) = kept.first() else {
        return Err(AppError::new(3, "No stars with stellar properties to build a database from."));
    };
    let labels = column_matrices(first, columns).2.to_vec();

    Ok(StellarDatabase {
        columns,
        pre: era_table(&kept, columns, &labels, Era::Pre),
        post: era_table(&kept, columns, &labels, Era::Post),
        labels,
        stars: props,
    })
}

/// `star.json` paths of every star directory under `dir`, sorted.
pub fn star_files(dir: &Path) -> Result<Vec<PathBuf>, AppError> {
    let entries = std::fs::read_dir(dir)
        .map_err(|e| AppError::new(2, format!("Failed to list '{}': {e}", dir.display())))?;
    let mut files: Vec<PathBuf> = entries
        .filter_map(|e| e.ok())
        .map(|e| e.path().join(STAR_FILE_NAME))
        .filter(|p| p.is_file())
        .collect();
    files.sort();
    Ok(files)
}

/// Load every star under `dir`; unreadable star files are skipped.
pub fn load_stars(dir: &Path) -> Result<Vec<Star>, AppError> {
    let files = star_files(dir)?;
    let stars: Vec<Star> = files
        .par_iter()
        .filter_map(|path| match Star::load(path) {
            Ok(star) => Some(star),
            Err(e) => {
                warn!("{}: {e}", path.display());
                None
            }
        })
        .collect();
    if stars.is_empty() {
        return Err(AppError::new(3, format!("No star files found under '{}'.", dir.display())));
    }
    info!("Loaded {} stars from {}", stars.len(), dir.display());
    Ok(stars)
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::star::ObservationFits;
    use crate::star::load::tests::{fit, test_pair};

    pub(crate) fn props(name: &str, temperature: f64) -> StellarProperties {
        StellarProperties {
            name: name.to_string(),
            temperature,
            metallicity: 0.0,
            gravity: 4.4,
            magnitude: 4.8,
            ra_hours: None,
            dec_degrees: None,
            distance_pc: None,
        }
    }

    /// Constant model: +1 m/s for the iron line, -1 m/s for the vanadium line.
    pub(crate) fn params() -> crate::models::ModelParams {
        let mut params = crate::models::ModelParams::new(crate::domain::ModelKind::Constant);
        for era in crate::domain::Era::ALL {
            params.insert("4217.791Fe1_16", era, vec![1.0], 3.0);
            params.insert("4219.893V1_16", era, vec![-1.0], 4.0);
        }
        params
    }

    pub(crate) fn star(name: &str, offsets: &[(&str, f64)]) -> Star {
        let observations: Vec<ObservationFits> = offsets
            .iter()
            .enumerate()
            .map(|(i, (d, off))| {
                ObservationFits::from_fits(
                    &format!("{name}.{i}"),
                    vec![fit("4217.791Fe1_16", d, 4217.791, *off), fit("4219.893V1_16", d, 4219.893, 0.0)],
                )
                .unwrap()
            })
            .collect();
        let pair = test_pair();
        let transitions = vec![pair.higher_energy().clone(), pair.lower_energy().clone()];
        Star::from_observations(name, &observations, &transitions, &[pair]).unwrap()
    }

    #[test]
    fn weighted_means_are_split_by_era() {
        let stars = vec![
            star("HD1", &[("2012-01-01T00:00:00.000", 2.0), ("2013-01-01T00:00:00.000", 4.0), ("2016-01-01T00:00:00.000", 10.0)]),
            star("HD2", &[("2016-02-01T00:00:00.000", -3.0)]),
            star("HD3", &[("2012-01-01T00:00:00.000", 1.0)]),
        ];
        let properties = vec![props("HD1", 5700.0), props("HD2", 5900.0)];
        let db = build_database(&stars, &properties, ColumnKind::Transitions).unwrap();
        assert_eq!(db.stars.len(), 2);
        assert_eq!(db.labels, vec!["4217.791Fe1_16", "4219.893V1_16"]);
        assert_eq!(db.pre.weighted_mean[0][0], Some(3.0));
        assert_eq!(db.pre.n_obs[0][0], 2);
        assert_eq!(db.pre.eotm[0][0], Some(1.0 / 2f64.sqrt()));
        assert_eq!(db.post.weighted_mean[0][0], Some(10.0));
        assert_eq!(db.pre.weighted_mean[1][0], None);
        assert_eq!(db.post.weighted_mean[1][0], Some(-3.0));

        let data = db.label_data(Era::Post, 0);
        assert_eq!(data.stars, vec!["HD1", "HD2"]);
        // Single observations have EotM = 0, so the fit error is EotWM.
        assert_eq!(data.fit_errors(), vec![4.0, 4.0]);
    }

    #[test]
    fn database_round_trips_through_json() {
        let stars = vec![star("HD1", &[("2012-01-01T00:00:00.000", 2.0)])];
        let db = build_database(&stars, &[props("HD1", 5700.0)], ColumnKind::Pairs).unwrap();
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(database_file_name(ColumnKind::Pairs));
        crate::io::write_json(&path, &db, "database").unwrap();
        let back: StellarDatabase = crate::io::read_json(&path, "database").unwrap();
        assert_eq!(back, db);
        assert_eq!(back.labels, vec!["4217.791Fe1_4219.893V1_16"]);
    }

    #[test]
    fn no_matching_properties_is_no_data() {
        let stars = vec![star("HD1", &[("2012-01-01T00:00:00.000", 2.0)])];
        let err = build_database(&stars, &[props("HD9", 5700.0)], ColumnKind::Transitions).unwrap_err();
        assert_eq!(err.exit_code(), 3);
    }
}
