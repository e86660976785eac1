//! `analyze`: aggregate one star's fit tables.
//!
//! Reads every observation under the star directory, builds the [`Star`]
//! matrices and writes the requested outputs next to the observations:
//! `pair_separations_<star>.csv`, `fits_info_csv/<label>_<star>.csv`, per-pair
//! offset plots under `plots/`, and `star.json`.

use std::path::{Path, PathBuf};

use chrono::NaiveDate;
use log::{info, warn};

use crate::analysis::{ColumnSummary, summarize};
use crate::domain::harps::{fiber_change, flat_field_lamp_change, secondary_mirror_change};
use crate::domain::{Transition, TransitionFit, TransitionPair};
use crate::error::AppError;
use crate::io::{write_fits_info_csv, write_pair_separations_csv};
use crate::math::decimal_year;
use crate::plot::{
    BLUE_POINTS, GREEN_LINE, GREY_LINE, HistogramPanel, Panel, RED_LINE, Series, SeriesKind, XyPanel, render_panels,
};
use crate::star::record::STAR_FILE_NAME;
use crate::star::{ObservationFits, Star, read_observations};

#[derive(Debug, Clone)]
pub struct AnalyzeOptions {
    pub suffix: String,
    pub write_csv: bool,
    pub write_fit_info: bool,
    pub plot: bool,
}

/// Statistics of one pair column of a star.
#[derive(Debug, Clone)]
pub struct PairColumnStats {
    pub label: String,
    pub summary: Option<ColumnSummary>,
}

#[derive(Debug, Clone)]
pub struct AnalyzeSummary {
    pub star: String,
    pub n_obs: usize,
    pub n_pre: usize,
    pub pairs: Vec<PairColumnStats>,
    pub star_file: PathBuf,
}

fn star_name(dir: &Path) -> String {
    dir.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| dir.display().to_string())
}

/// Fits of one transition column across observations, in date order.
fn column_fits<'a>(observations: &'a [ObservationFits], label: &str) -> Vec<&'a TransitionFit> {
    observations.iter().filter_map(|o| o.get(label)).collect()
}

pub fn analyze_star(
    dir: &Path,
    transitions: &[Transition],
    pairs: &[TransitionPair],
    options: &AnalyzeOptions,
) -> Result<AnalyzeSummary, AppError> {
    let name = star_name(dir);

    // 1) Observations and the aggregate.
    let observations = read_observations(dir, &options.suffix)?;
    if observations.is_empty() {
        return Err(AppError::new(
            3,
            format!("{name}: no fit tables 'fits_{}.csv' found.", options.suffix),
        ));
    }
    let star = Star::from_observations(&name, &observations, transitions, pairs)?;
    info!("{name}: {} observations, {} pre-change", star.n_obs(), star.fiber_split_index());

    // 2) Tables.
    if options.write_csv {
        let path = dir.join(format!("pair_separations_{name}.csv"));
        write_pair_separations_csv(&path, &observations, pairs)?;
        info!("Wrote {}", path.display());
    }
    if options.write_fit_info {
        let info_dir = dir.join("fits_info_csv");
        for label in star.transition_labels() {
            let fits = column_fits(&observations, label);
            if fits.is_empty() {
                continue;
            }
            write_fits_info_csv(&info_dir.join(format!("{label}_{name}.csv")), &fits)?;
        }
    }

    // 3) Per-pair statistics and plots.
    let mut stats = Vec::with_capacity(star.pair_labels().len());
    for (col, label) in star.pair_labels().iter().enumerate() {
        let values: Vec<f64> = star.pair_separations.column(col).iter().copied().collect();
        let errors: Vec<f64> = star.pair_errors.column(col).iter().copied().collect();
        let summary = summarize(&values, &errors);
        if summary.is_none() {
            warn!("{name}: no measurements of {label}");
        }
        if let (true, Some(s)) = (options.plot, &summary) {
            let path = dir.join("plots").join(format!("{label}.svg"));
            render_panels(&path, &offset_panels(&star, label, &values, &errors, s), 2, 2, (1400, 1000))?;
        }
        stats.push(PairColumnStats {
            label: label.clone(),
            summary,
        });
    }

    // 4) Persist.
    let star_file = dir.join(STAR_FILE_NAME);
    star.save(&star_file)?;
    info!("Wrote {}", star_file.display());

    Ok(AnalyzeSummary {
        star: name,
        n_obs: star.n_obs(),
        n_pre: star.fiber_split_index(),
        pairs: stats,
        star_file,
    })
}

fn instrument_changes() -> [NaiveDate; 3] {
    [secondary_mirror_change(), flat_field_lamp_change(), fiber_change()]
}

fn date_marker(date: NaiveDate) -> f64 {
    decimal_year(date.and_time(chrono::NaiveTime::MIN))
}

/// Four panels of a pair column's offsets from its weighted mean: by index,
/// histogram, by date and folded by year.
pub fn offset_panels(star: &Star, label: &str, values: &[f64], errors: &[f64], s: &ColumnSummary) -> Vec<Panel> {
    let offsets: Vec<f64> = values.iter().map(|v| v - s.weighted_mean).collect();
    let years: Vec<f64> = star.obs_dates().iter().map(|d| decimal_year(*d)).collect();
    let stats = format!(
        "{label}: mean {:.1} ± {:.1} m/s, χ²_ν {:.2}",
        s.weighted_mean, s.eotwm, s.chi_squared_nu
    );
    let y_label = "Offset from weighted mean (m/s)".to_string();
    let hlines = vec![(0.0, RED_LINE)];
    let band = Some((-s.eotwm, s.eotwm));
    let points = |xs: &[f64]| -> Vec<(f64, f64, f64)> {
        xs.iter()
            .zip(offsets.iter().zip(errors))
            .map(|(&x, (&y, &e))| (x, y, e))
            .collect()
    };

    let index: Vec<f64> = (0..values.len()).map(|i| i as f64).collect();
    let folded: Vec<f64> = years.iter().map(|y| y - y.floor()).collect();
    let split = star.fiber_split_index() as f64 - 0.5;
    let change_markers: Vec<(f64, _)> = instrument_changes().iter().map(|d| (date_marker(*d), GREY_LINE)).collect();

    vec![
        Panel::Xy(XyPanel {
            title: stats,
            x_label: "Observation index".to_string(),
            y_label: y_label.clone(),
            series: vec![Series::new(SeriesKind::ErrorBars, BLUE_POINTS, points(&index))],
            hlines: hlines.clone(),
            vlines: if split > 0.0 { vec![(split, GREEN_LINE)] } else { vec![] },
            band,
        }),
        Panel::Histogram(HistogramPanel {
            title: format!("{} observations", s.n),
            x_label: y_label.clone(),
            values: offsets.clone(),
            bins: 20,
            vlines: vec![(0.0, RED_LINE)],
        }),
        Panel::Xy(XyPanel {
            title: "By date".to_string(),
            x_label: "Year".to_string(),
            y_label: y_label.clone(),
            series: vec![Series::new(SeriesKind::ErrorBars, BLUE_POINTS, points(&years))],
            hlines: hlines.clone(),
            vlines: change_markers,
            band,
        }),
        Panel::Xy(XyPanel {
            title: "Folded by year".to_string(),
            x_label: "Fraction of year".to_string(),
            y_label,
            series: vec![Series::new(SeriesKind::ErrorBars, BLUE_POINTS, points(&folded))],
            hlines,
            vlines: vec![],
            band,
        }),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::io::{fit_table_path, write_fit_table};
    use crate::star::load::tests::{fit, test_pair};

    fn write_star(dir: &Path) {
        let dates = ["2012-01-01T00:00:00.000", "2013-01-01T00:00:00.000", "2016-01-01T00:00:00.000"];
        for (i, d) in dates.iter().enumerate() {
            let obs = format!("HARPS.{i}");
            let rows = vec![
                fit("4217.791Fe1_16", d, 4217.791, 1.0 + i as f64),
                fit("4219.893V1_16", d, 4219.893 + 1e-4 * i as f64, -1.0),
            ];
            write_fit_table(&fit_table_path(dir, &obs, "gaussian"), &rows).unwrap();
        }
    }

    #[test]
    fn analyze_writes_tables_and_star_file() {
        let root = tempfile::tempdir().unwrap();
        let dir = root.path().join("HD1");
        write_star(&dir);
        let pair = test_pair();
        let transitions = vec![pair.higher_energy().clone(), pair.lower_energy().clone()];
        let options = AnalyzeOptions {
            suffix: "gaussian".to_string(),
            write_csv: true,
            write_fit_info: true,
            plot: true,
        };
        let summary = analyze_star(&dir, &transitions, &[pair], &options).unwrap();
        assert_eq!(summary.star, "HD1");
        assert_eq!(summary.n_obs, 3);
        assert_eq!(summary.n_pre, 2);
        assert_eq!(summary.pairs[0].summary.unwrap().n, 3);
        assert!(dir.join("pair_separations_HD1.csv").is_file());
        assert!(dir.join("fits_info_csv/4219.893V1_16_HD1.csv").is_file());
        assert!(dir.join("plots/4217.791Fe1_4219.893V1_16.svg").is_file());

        let star = Star::load(&summary.star_file).unwrap();
        assert_eq!(star.n_obs(), 3);
    }

    #[test]
    fn star_without_fit_tables_has_no_data() {
        let root = tempfile::tempdir().unwrap();
        std::fs::create_dir_all(root.path().join("HD2/obs")).unwrap();
        let options = AnalyzeOptions {
            suffix: "gaussian".to_string(),
            write_csv: false,
            write_fit_info: false,
            plot: false,
        };
        let err = analyze_star(&root.path().join("HD2"), &[], &[], &options).unwrap_err();
        assert_eq!(err.exit_code(), 3);
    }

    #[test]
    fn missing_directory_is_an_input_error() {
        let root = tempfile::tempdir().unwrap();
        let options = AnalyzeOptions {
            suffix: "gaussian".to_string(),
            write_csv: false,
            write_fit_info: false,
            plot: false,
        };
        let err = analyze_star(&root.path().join("nope"), &[], &[], &options).unwrap_err();
        assert_eq!(err.exit_code(), 2);
    }
}
