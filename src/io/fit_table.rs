//! Per-observation fit tables (`<obs>/fits_<suffix>.csv`).
//!
//! One row per fitted transition. Columns follow [`TransitionFit`]'s field
//! names; dates use the `DATE-OBS` format.

use std::fs::File;
use std::path::{Path, PathBuf};

use crate::domain::TransitionFit;
use crate::error::AppError;

/// File name of the fit table for a given suffix.
pub fn fit_table_name(suffix: &str) -> String {
    format!("fits_{suffix}.csv")
}

/// `<dir>/<observation>/fits_<suffix>.csv`
pub fn fit_table_path(dir: &Path, observation: &str, suffix: &str) -> PathBuf {
    dir.join(observation).join(fit_table_name(suffix))
}

pub fn write_fit_table(path: &Path, fits: &[TransitionFit]) -> Result<(), AppError> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)
            .map_err(|e| AppError::new(2, format!("Failed to create directory '{}': {e}", parent.display())))?;
    }
    let file = File::create(path)
        .map_err(|e| AppError::new(2, format!("Failed to create fit table '{}': {e}", path.display())))?;
    let mut writer = csv::Writer::from_writer(file);
    for fit in fits {
        writer
            .serialize(fit)
            .map_err(|e| AppError::new(2, format!("Failed to write fit table row: {e}")))?;
    }
    writer
        .flush()
        .map_err(|e| AppError::new(2, format!("Failed to flush fit table '{}': {e}", path.display())))
}

pub fn read_fit_table(path: &Path) -> Result<Vec<TransitionFit>, AppError> {
    let file = File::open(path)
        .map_err(|e| AppError::new(2, format!("Failed to open fit table '{}': {e}", path.display())))?;
    let mut reader = csv::ReaderBuilder::new().trim(csv::Trim::All).from_reader(file);
    reader
        .deserialize()
        .enumerate()
        .map(|(i, row)| {
            row.map_err(|e| AppError::new(2, format!("{}: bad row {}: {e}", path.display(), i + 2)))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::obs2d::parse_date_obs;

    fn sample_fit(label: &str, mean: f64) -> TransitionFit {
        TransitionFit {
            observation: "HARPS.2012-02-26T04:02:48.797_e2ds_A".to_string(),
            date_obs: parse_date_obs("2012-02-26T04:02:48.797").unwrap(),
            label: label.to_string(),
            order: 16,
            amplitude: -4000.0,
            amplitude_err: 20.0,
            mean,
            mean_err: 1e-4,
            mean_err_vel: 7.1,
            sigma: 0.04,
            sigma_err: 3e-4,
            velocity_offset: 12.5,
            velocity_offset_err: 7.1,
            fwhm: 6600.0,
            fwhm_err: 40.0,
            continuum: 9000.0,
            chi_squared_nu: f64::NAN,
            airmass: 1.12,
            berv: -15321.0,
        }
    }

    #[test]
    fn fit_table_survives_a_file_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = fit_table_path(dir.path(), "obs1", "int");
        let fits = vec![sample_fit("4217.791Fe1_16", 4217.79), sample_fit("4219.893V1_16", 4219.89)];
        write_fit_table(&path, &fits).unwrap();
        let back = read_fit_table(&path).unwrap();
        assert_eq!(back.len(), 2);
        assert_eq!(back[1].label, "4219.893V1_16");
        assert_eq!(back[0].date_obs, fits[0].date_obs);
        assert!(back[0].chi_squared_nu.is_nan());
        assert_eq!(back[0].berv, -15321.0);
    }

    #[test]
    fn missing_table_is_an_input_error() {
        let err = read_fit_table(Path::new("/nonexistent/fits_int.csv")).unwrap_err();
        assert_eq!(err.exit_code(), 2);
    }
}
