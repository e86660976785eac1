//! `star.json`: the serialized form of a [`Star`].
//!
//! Matrices are stored row by row with missing values as `null`.

use std::path::Path;

use chrono::NaiveDateTime;
use nalgebra::DMatrix;
use serde::{Deserialize, Serialize};

use crate::io::{read_json, write_json};
use crate::star::{Star, StarError};

/// File name used for a persisted star.
pub const STAR_FILE_NAME: &str = "star.json";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StarRecord {
    pub name: String,
    pub observations: Vec<String>,
    pub dates: Vec<NaiveDateTime>,
    pub berv: Vec<f64>,
    pub transition_labels: Vec<String>,
    pub pair_labels: Vec<String>,
    pub pair_members: Vec<(String, String)>,
    pub transition_offsets: Vec<Vec<Option<f64>>>,
    pub transition_errors: Vec<Vec<Option<f64>>>,
    pub pair_separations: Vec<Vec<Option<f64>>>,
    pub pair_errors: Vec<Vec<Option<f64>>>,
    #[serde(default)]
    pub corrected_offsets: Option<Vec<Vec<Option<f64>>>>,
    #[serde(default)]
    pub pair_model_offsets: Option<Vec<Vec<Option<f64>>>>,
    #[serde(default)]
    pub pair_model_errors: Option<Vec<Vec<Option<f64>>>>,
}

fn to_rows(m: &DMatrix<f64>) -> Vec<Vec<Option<f64>>> {
    m.row_iter()
        .map(|row| row.iter().map(|v| v.is_finite().then_some(*v)).collect())
        .collect()
}

fn from_rows(rows: &[Vec<Option<f64>>], ncols: usize, what: &str) -> Result<DMatrix<f64>, StarError> {
    if let Some(bad) = rows.iter().position(|r| r.len() != ncols) {
        return Err(StarError::Io(format!(
            "{what}: row {bad} has {} values, expected {ncols}",
            rows[bad].len()
        )));
    }
    Ok(DMatrix::from_fn(rows.len(), ncols, |r, c| rows[r][c].unwrap_or(f64::NAN)))
}

impl From<&Star> for StarRecord {
    fn from(s: &Star) -> Self {
        Self {
            name: s.name.clone(),
            observations: s.obs_names.clone(),
            dates: s.obs_dates.clone(),
            berv: s.berv.clone(),
            transition_labels: s.t_labels.clone(),
            pair_labels: s.p_labels.clone(),
            pair_members: s.p_members.clone(),
            transition_offsets: to_rows(&s.transition_offsets),
            transition_errors: to_rows(&s.transition_errors),
            pair_separations: to_rows(&s.pair_separations),
            pair_errors: to_rows(&s.pair_errors),
            corrected_offsets: s.corrected_offsets.as_ref().map(to_rows),
            pair_model_offsets: s.pair_model_offsets.as_ref().map(to_rows),
            pair_model_errors: s.pair_model_errors.as_ref().map(to_rows),
        }
    }
}

impl TryFrom<StarRecord> for Star {
    type Error = StarError;

    fn try_from(r: StarRecord) -> Result<Self, Self::Error> {
        let n_obs = r.observations.len();
        if r.dates.len() != n_obs || r.berv.len() != n_obs {
            return Err(StarError::Io(format!(
                "{}: {n_obs} observations, {} dates, {} BERVs",
                r.name,
                r.dates.len(),
                r.berv.len()
            )));
        }
        if r.pair_members.len() != r.pair_labels.len() {
            return Err(StarError::Io(format!("{}: pair members do not match pair labels", r.name)));
        }
        let (nt, np) = (r.transition_labels.len(), r.pair_labels.len());
        let check_rows = |rows: &[Vec<Option<f64>>], what: &str| {
            if rows.len() == n_obs {
                Ok(())
            } else {
                Err(StarError::Io(format!("{what}: {} rows, expected {n_obs}", rows.len())))
            }
        };
        for (rows, what) in [
            (&r.transition_offsets, "transition offsets"),
            (&r.transition_errors, "transition errors"),
            (&r.pair_separations, "pair separations"),
            (&r.pair_errors, "pair errors"),
        ] {
            check_rows(rows, what)?;
        }

        let corrected_offsets = match &r.corrected_offsets {
            Some(rows) => {
                check_rows(rows, "corrected offsets")?;
                Some(from_rows(rows, nt, "corrected offsets")?)
            }
            None => None,
        };
        let pair_model_offsets = match &r.pair_model_offsets {
            Some(rows) => {
                check_rows(rows, "pair model offsets")?;
                Some(from_rows(rows, np, "pair model offsets")?)
            }
            None => None,
        };
        let pair_model_errors = match &r.pair_model_errors {
            Some(rows) => {
                check_rows(rows, "pair model errors")?;
                Some(from_rows(rows, np, "pair model errors")?)
            }
            None => None,
        };

        let o_map = r
            .dates
            .iter()
            .enumerate()
            .map(|(i, d)| (d.format(crate::obs2d::DATE_OBS_FORMAT).to_string(), i))
            .collect();
        Ok(Star {
            transition_offsets: from_rows(&r.transition_offsets, nt, "transition offsets")?,
            transition_errors: from_rows(&r.transition_errors, nt, "transition errors")?,
            pair_separations: from_rows(&r.pair_separations, np, "pair separations")?,
            pair_errors: from_rows(&r.pair_errors, np, "pair errors")?,
            corrected_offsets,
            pair_model_offsets,
            pair_model_errors,
            t_map: r.transition_labels.iter().enumerate().map(|(i, l)| (l.clone(), i)).collect(),
            p_map: r.pair_labels.iter().enumerate().map(|(i, l)| (l.clone(), i)).collect(),
            o_map,
            name: r.name,
            obs_names: r.observations,
            obs_dates: r.dates,
            berv: r.berv,
            t_labels: r.transition_labels,
            p_labels: r.pair_labels,
            p_members: r.pair_members,
        })
    }
}

impl Star {
    pub fn save(&self, path: &Path) -> Result<(), StarError> {
        write_json(path, &StarRecord::from(self), "star file").map_err(|e| StarError::Io(e.message().to_string()))
    }

    pub fn load(path: &Path) -> Result<Self, StarError> {
        let record: StarRecord = read_json(path, "star file").map_err(|e| StarError::Io(e.message().to_string()))?;
        Star::try_from(record)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::star::ObservationFits;
    use crate::star::load::tests::{fit, test_pair};

    #[test]
    fn star_file_round_trip_keeps_nans() {
        let d0 = "2012-01-01T00:00:00.000";
        let d1 = "2016-01-01T00:00:00.000";
        let observations = vec![
            ObservationFits::from_fits("a", vec![fit("4217.791Fe1_16", d0, 4217.79, 3.0)]).unwrap(),
            ObservationFits::from_fits(
                "b",
                vec![fit("4217.791Fe1_16", d1, 4217.79, 4.0), fit("4219.893V1_16", d1, 4219.89, 1.0)],
            )
            .unwrap(),
        ];
        let pair = test_pair();
        let transitions = vec![pair.higher_energy().clone(), pair.lower_energy().clone()];
        let star = Star::from_observations("HD1", &observations, &transitions, &[pair]).unwrap();

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(STAR_FILE_NAME);
        star.save(&path).unwrap();
        let text = std::fs::read_to_string(&path).unwrap();
        assert!(text.contains("null"));

        let back = Star::load(&path).unwrap();
        assert_eq!(back.n_obs(), 2);
        assert!(back.transition_offsets[(0, 1)].is_nan());
        assert_eq!(back.transition_offsets[(1, 0)], 4.0);
        assert_eq!(back.o_index_str(d1).unwrap(), 1);
        assert_eq!(back.fiber_split_index(), 1);
        assert!(back.corrected_offsets.is_none());
    }

    #[test]
    fn ragged_rows_are_rejected() {
        let record = StarRecord {
            name: "X".to_string(),
            observations: vec!["a".to_string()],
            dates: vec![crate::obs2d::parse_date_obs("2012-01-01T00:00:00.000").unwrap()],
            berv: vec![0.0],
            transition_labels: vec!["t".to_string()],
            pair_labels: vec![],
            pair_members: vec![],
            transition_offsets: vec![vec![Some(1.0), Some(2.0)]],
            transition_errors: vec![vec![Some(1.0)]],
            pair_separations: vec![vec![]],
            pair_errors: vec![vec![]],
            corrected_offsets: None,
            pair_model_offsets: None,
            pair_model_errors: None,
        };
        assert!(matches!(Star::try_from(record), Err(StarError::Io(_))));
    }
}
