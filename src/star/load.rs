//! Reading a star's observations from `<dir>/<obs>/fits_<suffix>.csv`.

use std::collections::HashMap;
use std::path::Path;

use chrono::NaiveDateTime;
use log::{debug, warn};

use crate::domain::{TransitionFit, TransitionPair};
use crate::io::{fit_table_path, read_fit_table};
use crate::spectral::wavelength_to_velocity;
use crate::star::StarError;

/// All fits made in one observation.
#[derive(Debug, Clone)]
pub struct ObservationFits {
    pub name: String,
    pub date: NaiveDateTime,
    /// m/s
    pub berv: f64,
    /// Keyed by `<transition label>_<order>`.
    pub fits: HashMap<String, TransitionFit>,
}

impl ObservationFits {
    /// Build from fit rows; `None` if there are none.
    pub fn from_fits(name: &str, rows: Vec<TransitionFit>) -> Option<Self> {
        let first = rows.first()?;
        let date = first.date_obs;
        let berv = first.berv;
        Some(Self {
            name: name.to_string(),
            date,
            berv,
            fits: rows.into_iter().map(|f| (f.label.clone(), f)).collect(),
        })
    }

    pub fn get(&self, label: &str) -> Option<&TransitionFit> {
        self.fits.get(label)
    }
}

/// Read every observation of a star, sorted by date.
///
/// Subdirectories without a fit table (or with an empty one) are skipped.
pub fn read_observations(dir: &Path, suffix: &str) -> Result<Vec<ObservationFits>, StarError> {
    if !dir.is_dir() {
        return Err(StarError::MissingDirectory(dir.to_path_buf()));
    }
    let entries = std::fs::read_dir(dir)
        .map_err(|e| StarError::Io(format!("Failed to list '{}': {e}", dir.display())))?;

    let mut observations = Vec::new();
    for entry in entries {
        let entry = entry.map_err(|e| StarError::Io(format!("Failed to list '{}': {e}", dir.display())))?;
        if !entry.path().is_dir() {
            continue;
        }
        let name = entry.file_name().to_string_lossy().into_owned();
        let path = fit_table_path(dir, &name, suffix);
        if !path.is_file() {
            debug!("{name}: no fit table '{}'", path.display());
            continue;
        }
        let rows = read_fit_table(&path).map_err(|e| StarError::Io(e.message().to_string()))?;
        match ObservationFits::from_fits(&name, rows) {
            Some(obs) => observations.push(obs),
            None => warn!("{name}: fit table is empty, skipping"),
        }
    }
    observations.sort_by(|a, b| a.date.cmp(&b.date).then_with(|| a.name.cmp(&b.name)));
    Ok(observations)
}

/// Separation (m/s) and error of a pair in one order of one observation.
///
/// `None` when either transition was not fitted; NaN when a fit is NaN.
pub fn pair_separation(obs: &ObservationFits, pair: &TransitionPair, order: usize) -> Option<(f64, f64)> {
    let higher = obs.get(&pair.higher_energy().order_label(order))?;
    let lower = obs.get(&pair.lower_energy().order_label(order))?;
    Some((
        wavelength_to_velocity(higher.mean, lower.mean),
        higher.mean_err_vel.hypot(lower.mean_err_vel),
    ))
}
