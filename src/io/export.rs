//! Export analysis results to CSV.
//!
//! The exports are meant to be easy to consume in spreadsheets or downstream scripts.

use std::fs::File;
use std::io::Write;
use std::path::Path;

use crate::analysis::pair_table::PairTableRow;
use crate::domain::{TransitionFit, TransitionPair};
use crate::error::AppError;
use crate::obs2d::DATE_OBS_FORMAT;
use crate::star::{ObservationFits, pair_separation};

fn create(path: &Path, what: &str) -> Result<File, AppError> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)
            .map_err(|e| AppError::new(2, format!("Failed to create directory '{}': {e}", parent.display())))?;
    }
    File::create(path).map_err(|e| AppError::new(2, format!("Failed to create {what} '{}': {e}", path.display())))
}

fn write_err(what: &'static str) -> impl Fn(std::io::Error) -> AppError {
    move |e| AppError::new(2, format!("Failed to write {what}: {e}"))
}

/// `N/A` for a missing measurement, `NaN` for a failed one.
fn cell(value: Option<f64>) -> String {
    match value {
        None => "N/A".to_string(),
        Some(v) if v.is_nan() => "NaN".to_string(),
        Some(v) => format!("{v:.4}"),
    }
}

/// Write `pair_separations_<star>.csv`: one row per observation, two columns
/// (separation, error) per pair and order.
pub fn write_pair_separations_csv(
    path: &Path,
    observations: &[ObservationFits],
    pairs: &[TransitionPair],
) -> Result<(), AppError> {
    let mut file = create(path, "pair separations CSV")?;
    let columns: Vec<(&TransitionPair, usize)> = pairs
        .iter()
        .flat_map(|p| p.orders_to_measure_in.iter().map(move |&o| (p, o)))
        .collect();

    let mut header = vec!["Observation".to_string(), "Time".to_string()];
    for (pair, order) in &columns {
        let label = pair.order_label(*order);
        let err_label = format!("{label}_err");
        header.push(label);
        header.push(err_label);
    }
    writeln!(file, "{}", header.join(",")).map_err(write_err("pair separations CSV header"))?;

    for obs in observations {
        let mut row = vec![obs.name.clone(), obs.date.format(DATE_OBS_FORMAT).to_string()];
        for (pair, order) in &columns {
            let measured = pair_separation(obs, pair, *order);
            row.push(cell(measured.map(|m| m.0)));
            row.push(cell(measured.map(|m| m.1)));
        }
        writeln!(file, "{}", row.join(",")).map_err(write_err("pair separations CSV row"))?;
    }
    Ok(())
}

/// Write the fit details of one transition column across observations.
pub fn write_fits_info_csv(path: &Path, fits: &[&TransitionFit]) -> Result<(), AppError> {
    let mut file = create(path, "fit info CSV")?;
    writeln!(
        file,
        "ObsDate,Amplitude,Amplitude_err (A),Mean (A),Mean_err (A),Mean_err_vel (m/s),Sigma (A),Sigma_err (A),\
         Offset (m/s),Offset_err (m/s),FWHM (m/s),FWHM_err (m/s),Chi-squared-nu,Order,Mean_airmass"
    )
    .map_err(write_err("fit info CSV header"))?;

    for f in fits {
        writeln!(
            file,
            "{},{:.4},{:.4},{:.6},{:.6},{:.4},{:.6},{:.6},{:.4},{:.4},{:.4},{:.4},{:.4},{},{:.4}",
            f.date_obs.format(DATE_OBS_FORMAT),
            f.amplitude,
            f.amplitude_err,
            f.mean,
            f.mean_err,
            f.mean_err_vel,
            f.sigma,
            f.sigma_err,
            f.velocity_offset,
            f.velocity_offset_err,
            f.fwhm,
            f.fwhm_err,
            f.chi_squared_nu,
            f.order,
            f.airmass,
        )
        .map_err(write_err("fit info CSV row"))?;
    }
    Ok(())
}

/// Write one pair's per-star table.
pub fn write_pair_table_csv(path: &Path, rows: &[PairTableRow]) -> Result<(), AppError> {
    let mut file = create(path, "pair table CSV")?;
    writeln!(
        file,
        "star_name,Nobs,Teff,[Fe/H],logg,M_V,delta(v)_pair (m/s),err_stat_pair (m/s),err_sys_pair (m/s),\
         transition1 (m/s),transition2 (m/s)"
    )
    .map_err(write_err("pair table CSV header"))?;

    for r in rows {
        writeln!(
            file,
            "{},{},{:.0},{:.3},{:.3},{:.3},{:.3},{:.3},{:.3},{:.3},{:.3}",
            r.star,
            r.n_obs,
            r.temperature,
            r.metallicity,
            r.gravity,
            r.magnitude,
            r.separation,
            r.stat_err,
            r.sys_err,
            r.higher_offset,
            r.lower_offset,
        )
        .map_err(write_err("pair table CSV row"))?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::star::load::tests::{fit, test_pair};

    #[test]
    fn separations_mark_missing_and_nan_differently() {
        let d = "2012-01-01T00:00:00.000";
        let mut lower = fit("4219.893V1_16", d, 4219.893, 0.0);
        lower.mean = f64::NAN;
        let observations = vec![
            ObservationFits::from_fits("a", vec![fit("4217.791Fe1_16", d, 4217.791, 0.0)]).unwrap(),
            ObservationFits::from_fits("b", vec![fit("4217.791Fe1_16", d, 4217.791, 0.0), lower]).unwrap(),
        ];
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out/pair_separations_HD1.csv");
        write_pair_separations_csv(&path, &observations, &[test_pair()]).unwrap();
        let text = std::fs::read_to_string(&path).unwrap();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(
            lines[0],
            "Observation,Time,4217.791Fe1_4219.893V1_16,4217.791Fe1_4219.893V1_16_err"
        );
        assert_eq!(lines[1], "a,2012-01-01T00:00:00.000,N/A,N/A");
        assert!(lines[2].starts_with("b,2012-01-01T00:00:00.000,NaN,"));
    }

    #[test]
    fn fits_info_has_one_row_per_fit() {
        let d = "2012-01-01T00:00:00.000";
        let a = fit("4217.791Fe1_16", d, 4217.791, 1.5);
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("fits_info_csv/4217.791Fe1_16_HD1.csv");
        write_fits_info_csv(&path, &[&a, &a]).unwrap();
        let text = std::fs::read_to_string(&path).unwrap();
        assert_eq!(text.lines().count(), 3);
        assert!(text.lines().nth(1).unwrap().contains(",1.5000,"));
    }
}
