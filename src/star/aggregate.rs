//! The [`Star`] aggregate: per-observation offsets and pair separations.
//!
//! Matrices are observations × columns with NaN marking missing values.
//! Transition columns are labelled `<transition label>_<order>` and pair
//! columns `<pair label>_<order>`.

use std::collections::HashMap;
use std::ops::Range;
use std::path::Path;

use chrono::NaiveDateTime;
use log::{info, warn};
use nalgebra::DMatrix;

use crate::domain::harps::fiber_change;
use crate::domain::{Era, StellarProperties, Transition, TransitionPair};
use crate::models::{ModelParams, StellarCoords, predict};
use crate::obs2d::{DATE_OBS_FORMAT, parse_date_obs};
use crate::star::StarError;
use crate::star::load::{ObservationFits, pair_separation, read_observations};

#[derive(Debug, Clone)]
pub struct Star {
    pub name: String,
    pub(crate) obs_names: Vec<String>,
    pub(crate) obs_dates: Vec<NaiveDateTime>,
    pub(crate) berv: Vec<f64>,
    pub(crate) t_labels: Vec<String>,
    pub(crate) p_labels: Vec<String>,
    /// Transition columns (higher, lower) making up each pair column.
    pub(crate) p_members: Vec<(String, String)>,
    pub(crate) t_map: HashMap<String, usize>,
    pub(crate) p_map: HashMap<String, usize>,
    pub(crate) o_map: HashMap<String, usize>,
    /// Offsets of fitted centres from expected positions (m/s).
    pub transition_offsets: DMatrix<f64>,
    pub transition_errors: DMatrix<f64>,
    /// Pair separations (m/s).
    pub pair_separations: DMatrix<f64>,
    pub pair_errors: DMatrix<f64>,
    /// Transition offsets with the stellar-parameter model subtracted.
    pub corrected_offsets: Option<DMatrix<f64>>,
    /// `corrected(lower) - corrected(higher)` per pair column.
    pub pair_model_offsets: Option<DMatrix<f64>>,
    /// Statistical errors of `pair_model_offsets`.
    pub pair_model_errors: Option<DMatrix<f64>>,
}

fn index_map(labels: &[String]) -> HashMap<String, usize> {
    labels.iter().enumerate().map(|(i, l)| (l.clone(), i)).collect()
}

impl Star {
    /// Aggregate the fits of `observations` (sorted by date) for the given
    /// transitions and pairs.
    pub fn from_observations(
        name: &str,
        observations: &[ObservationFits],
        transitions: &[Transition],
        pairs: &[TransitionPair],
    ) -> Result<Self, StarError> {
        if observations.is_empty() {
            return Err(StarError::NotLoaded(name.to_string()));
        }

        let t_labels: Vec<String> = transitions
            .iter()
            .flat_map(|t| t.orders_to_fit_in.iter().map(move |&o| t.order_label(o)))
            .collect();
        let mut p_columns = Vec::new();
        for pair in pairs {
            for &order in &pair.orders_to_measure_in {
                p_columns.push((pair, order));
            }
        }
        let p_labels: Vec<String> = p_columns.iter().map(|(p, o)| p.order_label(*o)).collect();
        let p_members = p_columns
            .iter()
            .map(|(p, o)| (p.higher_energy().order_label(*o), p.lower_energy().order_label(*o)))
            .collect();

        let n_obs = observations.len();
        let mut transition_offsets = DMatrix::from_element(n_obs, t_labels.len(), f64::NAN);
        let mut transition_errors = transition_offsets.clone();
        let mut pair_separations = DMatrix::from_element(n_obs, p_labels.len(), f64::NAN);
        let mut pair_errors = pair_separations.clone();

        for (row, obs) in observations.iter().enumerate() {
            for (col, label) in t_labels.iter().enumerate() {
                if let Some(fit) = obs.get(label) {
                    transition_offsets[(row, col)] = fit.velocity_offset;
                    transition_errors[(row, col)] = fit.velocity_offset_err;
                }
            }
            for (col, (pair, order)) in p_columns.iter().enumerate() {
                if let Some((sep, err)) = pair_separation(obs, pair, *order) {
                    pair_separations[(row, col)] = sep;
                    pair_errors[(row, col)] = err;
                }
            }
        }

        let obs_dates: Vec<NaiveDateTime> = observations.iter().map(|o| o.date).collect();
        let o_map = obs_dates
            .iter()
            .enumerate()
            .map(|(i, d)| (d.format(DATE_OBS_FORMAT).to_string(), i))
            .collect();
        Ok(Self {
            name: name.to_string(),
            obs_names: observations.iter().map(|o| o.name.clone()).collect(),
            berv: observations.iter().map(|o| o.berv).collect(),
            t_map: index_map(&t_labels),
            p_map: index_map(&p_labels),
            o_map,
            obs_dates,
            t_labels,
            p_labels,
            p_members,
            transition_offsets,
            transition_errors,
            pair_separations,
            pair_errors,
            corrected_offsets: None,
            pair_model_offsets: None,
            pair_model_errors: None,
        })
    }

    /// Read a star directory and aggregate it.
    pub fn from_directory(
        dir: &Path,
        suffix: &str,
        transitions: &[Transition],
        pairs: &[TransitionPair],
    ) -> Result<Self, StarError> {
        let name = dir
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| dir.display().to_string());
        let observations = read_observations(dir, suffix)?;
        info!("{name}: {} observations", observations.len());
        Self::from_observations(&name, &observations, transitions, pairs)
    }

    pub fn n_obs(&self) -> usize {
        self.obs_names.len()
    }

    pub fn obs_names(&self) -> &[String] {
        &self.obs_names
    }

    pub fn obs_dates(&self) -> &[NaiveDateTime] {
        &self.obs_dates
    }

    /// Barycentric Earth radial velocity per observation (m/s).
    pub fn berv(&self) -> &[f64] {
        &self.berv
    }

    pub fn transition_labels(&self) -> &[String] {
        &self.t_labels
    }

    pub fn pair_labels(&self) -> &[String] {
        &self.p_labels
    }

    /// Transition column labels (higher, lower) of a pair column.
    pub fn pair_members(&self, p_col: usize) -> Option<&(String, String)> {
        self.p_members.get(p_col)
    }

    fn ensure_loaded(&self) -> Result<(), StarError> {
        if self.obs_names.is_empty() {
            Err(StarError::NotLoaded(self.name.clone()))
        } else {
            Ok(())
        }
    }

    pub fn t_index(&self, label: &str) -> Result<usize, StarError> {
        self.ensure_loaded()?;
        self.t_map
            .get(label)
            .copied()
            .ok_or_else(|| StarError::UnknownTransition(label.to_string()))
    }

    pub fn p_index(&self, label: &str) -> Result<usize, StarError> {
        self.ensure_loaded()?;
        self.p_map
            .get(label)
            .copied()
            .ok_or_else(|| StarError::UnknownPair(label.to_string()))
    }

    pub fn o_index(&self, date: NaiveDateTime) -> Result<usize, StarError> {
        self.ensure_loaded()?;
        let key = date.format(DATE_OBS_FORMAT).to_string();
        self.o_map
            .get(&key)
            .copied()
            .ok_or(StarError::UnknownObservation(key))
    }

    /// Observation index from a timestamp such as `2005-05-02T03:49:08.735`.
    pub fn o_index_str(&self, timestamp: &str) -> Result<usize, StarError> {
        let date = parse_date_obs(timestamp).map_err(|_| StarError::UnknownObservation(timestamp.to_string()))?;
        self.o_index(date)
    }

    /// Index of the first observation on or after the fibre change.
    pub fn fiber_split_index(&self) -> usize {
        let change = fiber_change();
        self.obs_dates.partition_point(|d| d.date() < change)
    }

    pub fn has_obs_pre(&self) -> bool {
        self.fiber_split_index() > 0
    }

    pub fn has_obs_post(&self) -> bool {
        self.fiber_split_index() < self.n_obs()
    }

    pub fn has_obs(&self, era: Era) -> bool {
        match era {
            Era::Pre => self.has_obs_pre(),
            Era::Post => self.has_obs_post(),
        }
    }

    /// Observation rows belonging to an era.
    pub fn era_rows(&self, era: Era) -> Range<usize> {
        let split = self.fiber_split_index();
        match era {
            Era::Pre => 0..split,
            Era::Post => split..self.n_obs(),
        }
    }

    /// Column `col` of `matrix` restricted to the rows of `era`.
    pub fn era_column(&self, matrix: &DMatrix<f64>, col: usize, era: Era) -> Vec<f64> {
        self.era_rows(era).map(|r| matrix[(r, col)]).collect()
    }

    /// Model-corrected pair offsets and their errors.
    pub fn pair_model(&self) -> Result<(&DMatrix<f64>, &DMatrix<f64>), StarError> {
        match (&self.pair_model_offsets, &self.pair_model_errors) {
            (Some(offsets), Some(errors)) => Ok((offsets, errors)),
            _ => Err(StarError::ModelNotApplied(self.name.clone())),
        }
    }

    /// Subtract each transition's model prediction for this star.
    ///
    /// Columns without coefficients for an era are left NaN.
    pub fn apply_model(&mut self, params: &ModelParams, properties: &StellarProperties) {
        let coords = StellarCoords::from(properties);
        let mut corrected = DMatrix::from_element(self.n_obs(), self.t_labels.len(), f64::NAN);
        let mut missing = 0usize;
        for (col, label) in self.t_labels.iter().enumerate() {
            for era in Era::ALL {
                let rows = self.era_rows(era);
                if rows.is_empty() {
                    continue;
                }
                let Some(betas) = params.coefficients_for(label, era) else {
                    missing += 1;
                    continue;
                };
                let prediction = predict(params.model, &coords, betas);
                for r in rows {
                    corrected[(r, col)] = self.transition_offsets[(r, col)] - prediction;
                }
            }
        }
        if missing > 0 {
            warn!("{}: no model coefficients for {missing} column/era combinations", self.name);
        }

        let mut pair_offsets = DMatrix::from_element(self.n_obs(), self.p_labels.len(), f64::NAN);
        let mut pair_errors = pair_offsets.clone();
        for (p_col, (higher, lower)) in self.p_members.iter().enumerate() {
            let (Some(&h), Some(&l)) = (self.t_map.get(higher), self.t_map.get(lower)) else {
                continue;
            };
            for r in 0..self.n_obs() {
                let offset = corrected[(r, l)] - corrected[(r, h)];
                if offset.is_finite() {
                    pair_offsets[(r, p_col)] = offset;
                    pair_errors[(r, p_col)] = self.transition_errors[(r, l)].hypot(self.transition_errors[(r, h)]);
                }
            }
        }
        self.corrected_offsets = Some(corrected);
        self.pair_model_offsets = Some(pair_offsets);
        self.pair_model_errors = Some(pair_errors);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::ModelKind;
    use crate::star::load::tests::{fit, test_pair};

    fn star() -> Star {
        let dates = ["2010-03-01T01:00:00.000", "2014-12-31T23:59:59.999", "2015-06-01T00:00:00.000"];
        let observations: Vec<ObservationFits> = dates
            .iter()
            .enumerate()
            .map(|(i, d)| {
                let mut rows = vec![fit("4217.791Fe1_16", d, 4217.791 + 1e-3 * i as f64, 10.0 * i as f64)];
                if i != 1 {
                    rows.push(fit("4219.893V1_16", d, 4219.893, -5.0));
                }
                ObservationFits::from_fits(&format!("obs{i}"), rows).unwrap()
            })
            .collect();
        let pair = test_pair();
        let transitions = vec![pair.higher_energy().clone(), pair.lower_energy().clone()];
        Star::from_observations("HD1", &observations, &transitions, &[pair]).unwrap()
    }

    #[test]
    fn lookups_by_label_and_date() {
        let s = star();
        assert_eq!(s.t_index("4219.893V1_16").unwrap(), 1);
        assert_eq!(s.p_index("4217.791Fe1_4219.893V1_16").unwrap(), 0);
        assert_eq!(s.o_index_str("2014-12-31T23:59:59.999").unwrap(), 1);
        assert!(matches!(s.t_index("4217.791Fe1_17"), Err(StarError::UnknownTransition(_))));
        assert!(matches!(s.o_index_str("2001-01-01T00:00:00.000"), Err(StarError::UnknownObservation(_))));
    }

    #[test]
    fn missing_fits_are_nan() {
        let s = star();
        assert_eq!(s.transition_offsets[(2, 0)], 20.0);
        assert!(s.transition_offsets[(1, 1)].is_nan());
        assert!(s.pair_separations[(1, 0)].is_nan());
        assert!(s.pair_separations[(0, 0)] > 0.0);
    }

    #[test]
    fn fiber_split_uses_change_date() {
        let s = star();
        assert_eq!(s.fiber_split_index(), 2);
        assert!(s.has_obs_pre() && s.has_obs_post());
        assert_eq!(s.era_rows(Era::Pre), 0..2);
        assert_eq!(s.era_rows(Era::Post), 2..3);
    }

    #[test]
    fn no_observations_means_not_loaded() {
        let err = Star::from_observations("HD2", &[], &[], &[]).unwrap_err();
        assert!(matches!(err, StarError::NotLoaded(_)));
    }

    #[test]
    fn model_correction_per_era() {
        let mut s = star();
        assert!(matches!(s.pair_model(), Err(StarError::ModelNotApplied(_))));
        let mut params = ModelParams::new(ModelKind::Constant);
        params.insert("4217.791Fe1_16", Era::Pre, vec![1.0], 0.0);
        params.insert("4217.791Fe1_16", Era::Post, vec![2.0], 0.0);
        params.insert("4219.893V1_16", Era::Pre, vec![-1.0], 0.0);
        let props = StellarProperties {
            name: "HD1".to_string(),
            temperature: 5800.0,
            metallicity: 0.0,
            gravity: 4.4,
            magnitude: 4.8,
            ra_hours: None,
            dec_degrees: None,
            distance_pc: None,
        };
        s.apply_model(&params, &props);
        let corrected = s.corrected_offsets.as_ref().unwrap();
        assert_eq!(corrected[(0, 0)], -1.0);
        assert_eq!(corrected[(2, 0)], 18.0);
        assert!(corrected[(2, 1)].is_nan());
        let pairs = s.pair_model_offsets.as_ref().unwrap();
        assert_eq!(pairs[(0, 0)], -4.0 - (-1.0));
        let errors = s.pair_model_errors.as_ref().unwrap();
        assert_eq!(errors[(0, 0)], 32f64.sqrt());
        assert!(pairs[(1, 0)].is_nan() && errors[(1, 0)].is_nan());
    }
}
