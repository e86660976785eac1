//! Per-star checks of model-corrected pair offsets.
//!
//! Each check takes one era of a star whose model has been applied and looks
//! for structure the model should have removed:
//!
//! - offsets against the velocity separation of the pair (`separation_check`)
//! - the same pair measured in two orders (`duplicate_check`)
//! - offsets against the depth difference of the members (`depth_check`)

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use log::warn;
use nalgebra::DMatrix;

use crate::analysis::{ColumnSummary, summarize};
use crate::domain::{Era, TransitionPair};
use crate::error::AppError;
use crate::math::{arange, chi_squared_nu, nan_std};
use crate::models::ModelParams;
use crate::plot::{BLUE_POINTS, GREEN_LINE, GREY_LINE, ORANGE_POINTS, Panel, Series, SeriesKind, XyPanel, render_panels};
use crate::star::Star;

/// Weighted means of one pair column in one era.
#[derive(Debug, Clone, PartialEq)]
pub struct PairOffset {
    pub label: String,
    /// Weighted-mean raw separation (km/s).
    pub separation: f64,
    /// Weighted-mean model offset (m/s).
    pub offset: f64,
    pub stat_err: f64,
    /// σ_sys of both members in quadrature.
    pub sys_err: f64,
}

impl PairOffset {
    pub fn full_err(&self) -> f64 {
        self.stat_err.hypot(self.sys_err)
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct OffsetBin {
    pub midpoint: f64,
    pub n: usize,
    pub weighted_mean: f64,
    pub eotwm: f64,
    pub chi_squared_nu: f64,
}

fn column_summary(
    star: &Star,
    values: &DMatrix<f64>,
    errors: &DMatrix<f64>,
    p_col: usize,
    era: Era,
) -> Option<ColumnSummary> {
    summarize(&star.era_column(values, p_col, era), &star.era_column(errors, p_col, era))
}

fn pair_sys_err(star: &Star, params: &ModelParams, p_col: usize, era: Era) -> f64 {
    let sys = |label: &str| params.sigma_sys_for(label, era).unwrap_or(f64::NAN);
    star.pair_members(p_col)
        .map_or(f64::NAN, |(higher, lower)| sys(higher).hypot(sys(lower)))
}

/// χ²_ν of values about zero, skipping non-finite entries.
fn chi_squared_about_zero(values: &[f64], errors: &[f64]) -> f64 {
    let (v, e): (Vec<f64>, Vec<f64>) = values
        .iter()
        .zip(errors)
        .filter(|(v, e)| v.is_finite() && e.is_finite() && **e > 0.0)
        .map(|(v, e)| (*v, *e))
        .unzip();
    chi_squared_nu(&v, &e, 1)
}

/// Weighted means of `values` in `[lo, hi)` bins of `xs`; empty bins are dropped.
fn bin_offsets(xs: &[f64], values: &[f64], errors: &[f64], edges: &[f64]) -> Vec<OffsetBin> {
    edges
        .windows(2)
        .filter_map(|w| {
            let (v, e): (Vec<f64>, Vec<f64>) = xs
                .iter()
                .zip(values.iter().zip(errors))
                .filter(|(x, _)| **x >= w[0] && **x < w[1])
                .map(|(_, (v, e))| (*v, *e))
                .unzip();
            summarize(&v, &e).map(|s| OffsetBin {
                midpoint: 0.5 * (w[0] + w[1]),
                n: s.n,
                weighted_mean: s.weighted_mean,
                eotwm: s.eotwm,
                chi_squared_nu: s.chi_squared_nu,
            })
        })
        .collect()
}

/// Weighted-mean model offset of every pair column with data in `era`.
pub fn pair_offsets(star: &Star, params: &ModelParams, era: Era) -> Result<Vec<PairOffset>, AppError> {
    let (offsets, errors) = star.pair_model()?;
    let mut out = Vec::new();
    for (p_col, label) in star.pair_labels().iter().enumerate() {
        let Some(raw) = column_summary(star, &star.pair_separations, &star.pair_errors, p_col, era) else {
            continue;
        };
        let Some(model) = column_summary(star, offsets, errors, p_col, era) else {
            continue;
        };
        out.push(PairOffset {
            label: label.clone(),
            separation: raw.weighted_mean / 1000.0,
            offset: model.weighted_mean,
            stat_err: model.eotwm,
            sys_err: pair_sys_err(star, params, p_col, era),
        });
    }
    Ok(out)
}

/// Separation bin edges (km/s).
pub fn separation_bin_edges() -> Vec<f64> {
    arange(0.0, 801.0, 100.0)
}

#[derive(Debug, Clone)]
pub struct SeparationCheck {
    pub star: String,
    pub era: Era,
    pub n_obs: usize,
    pub points: Vec<PairOffset>,
    /// χ²_ν of the offsets about zero with full errors.
    pub chi_squared_nu: f64,
    pub weighted_mean: f64,
    pub eotwm: f64,
    pub bins: Vec<OffsetBin>,
}

/// Model offsets of every pair against its velocity separation.
pub fn separation_check(star: &Star, params: &ModelParams, era: Era) -> Result<SeparationCheck, AppError> {
    let points = pair_offsets(star, params, era)?;
    let xs: Vec<f64> = points.iter().map(|p| p.separation).collect();
    let values: Vec<f64> = points.iter().map(|p| p.offset).collect();
    let errors: Vec<f64> = points.iter().map(PairOffset::full_err).collect();
    let Some(overall) = summarize(&values, &errors) else {
        return Err(AppError::new(3, format!("{}: no {era} model offsets", star.name)));
    };
    Ok(SeparationCheck {
        star: star.name.clone(),
        era,
        n_obs: star.era_rows(era).len(),
        chi_squared_nu: chi_squared_about_zero(&values, &errors),
        weighted_mean: overall.weighted_mean,
        eotwm: overall.eotwm,
        bins: bin_offsets(&xs, &values, &errors, &separation_bin_edges()),
        points,
    })
}

pub fn separation_panel(c: &SeparationCheck) -> Panel {
    let points = c.points.iter().map(|p| (p.separation, p.offset, p.full_err())).collect();
    let binned = c.bins.iter().map(|b| (b.midpoint, b.weighted_mean, b.eotwm)).collect();
    Panel::Xy(XyPanel {
        title: format!(
            "{} {} (χ²_ν = {:.2}, {} obs, {:.2} ± {:.2} m/s)",
            c.star, c.era, c.chi_squared_nu, c.n_obs, c.weighted_mean, c.eotwm
        ),
        x_label: "Weighted mean pair separation (km/s)".to_string(),
        y_label: "Offset from model (m/s)".to_string(),
        series: vec![
            Series::new(SeriesKind::ErrorBars, BLUE_POINTS, points).labelled("pairs"),
            Series::new(SeriesKind::ErrorBars, ORANGE_POINTS, binned).labelled("100 km/s bins"),
        ],
        hlines: vec![(0.0, GREY_LINE)],
        ..XyPanel::default()
    })
}

/// A pair measured in two orders; differences are second order minus first.
#[derive(Debug, Clone, PartialEq)]
pub struct DuplicatePair {
    /// Pair label without the order suffix.
    pub label: String,
    pub orders: (usize, usize),
    /// Difference of the raw separations (m/s).
    pub separation_diff: f64,
    pub separation_err: f64,
    /// Difference of the model offsets (m/s).
    pub offset_diff: f64,
    pub offset_err: f64,
}

#[derive(Debug, Clone)]
pub struct DuplicateCheck {
    pub star: String,
    pub era: Era,
    pub n_obs: usize,
    pub pairs: Vec<DuplicatePair>,
    pub separation_chi_squared_nu: f64,
    pub offset_chi_squared_nu: f64,
    pub separation_rms: f64,
    pub offset_rms: f64,
}

/// Pair labels measured in exactly two orders, with the `(order, column)` of
/// the lower order first.
pub fn duplicate_columns(star: &Star) -> Vec<(String, (usize, usize), (usize, usize))> {
    let mut groups: Vec<(String, Vec<(usize, usize)>)> = Vec::new();
    let mut index: HashMap<String, usize> = HashMap::new();
    for (p_col, label) in star.pair_labels().iter().enumerate() {
        let Some((base, order)) = label.rsplit_once('_') else {
            continue;
        };
        let Ok(order) = order.parse::<usize>() else {
            continue;
        };
        let slot = *index.entry(base.to_string()).or_insert_with(|| {
            groups.push((base.to_string(), Vec::new()));
            groups.len() - 1
        });
        groups[slot].1.push((order, p_col));
    }
    groups
        .into_iter()
        .filter_map(|(label, mut columns)| match columns.len() {
            2 => {
                columns.sort_unstable();
                Some((label, columns[0], columns[1]))
            }
            _ => None,
        })
        .collect()
}

/// Compare each pair measured in two orders with itself.
pub fn duplicate_check(star: &Star, era: Era) -> Result<DuplicateCheck, AppError> {
    let (offsets, errors) = star.pair_model()?;
    let mut pairs = Vec::new();
    for (label, (order1, col1), (order2, col2)) in duplicate_columns(star) {
        let raw = |col| column_summary(star, &star.pair_separations, &star.pair_errors, col, era);
        let model = |col| column_summary(star, offsets, errors, col, era);
        let (Some(r1), Some(r2), Some(m1), Some(m2)) = (raw(col1), raw(col2), model(col1), model(col2)) else {
            continue;
        };
        pairs.push(DuplicatePair {
            label,
            orders: (order1, order2),
            separation_diff: r2.weighted_mean - r1.weighted_mean,
            separation_err: r1.eotwm.hypot(r2.eotwm),
            offset_diff: m2.weighted_mean - m1.weighted_mean,
            offset_err: m1.eotwm.hypot(m2.eotwm),
        });
    }
    if pairs.is_empty() {
        return Err(AppError::new(3, format!("{}: no {era} pairs measured in two orders", star.name)));
    }
    let sep: Vec<f64> = pairs.iter().map(|p| p.separation_diff).collect();
    let sep_err: Vec<f64> = pairs.iter().map(|p| p.separation_err).collect();
    let off: Vec<f64> = pairs.iter().map(|p| p.offset_diff).collect();
    let off_err: Vec<f64> = pairs.iter().map(|p| p.offset_err).collect();
    Ok(DuplicateCheck {
        star: star.name.clone(),
        era,
        n_obs: star.era_rows(era).len(),
        separation_chi_squared_nu: chi_squared_about_zero(&sep, &sep_err),
        offset_chi_squared_nu: chi_squared_about_zero(&off, &off_err),
        separation_rms: nan_std(&sep),
        offset_rms: nan_std(&off),
        pairs,
    })
}

pub fn duplicate_panel(c: &DuplicateCheck) -> Panel {
    let raw = c
        .pairs
        .iter()
        .enumerate()
        .map(|(i, p)| (i as f64, p.separation_diff, p.separation_err))
        .collect();
    let model = c
        .pairs
        .iter()
        .enumerate()
        .map(|(i, p)| (i as f64 + 0.2, p.offset_diff, p.offset_err))
        .collect();
    // Dashed boundaries where the pairs move to the next order.
    let boundaries = c
        .pairs
        .windows(2)
        .enumerate()
        .filter(|(_, w)| w[0].orders.1 != w[1].orders.1)
        .map(|(i, _)| (i as f64 + 0.5, GREY_LINE))
        .collect();
    Panel::Xy(XyPanel {
        title: format!("{} {}, {} obs (second - first order)", c.star, c.era, c.n_obs),
        x_label: "Pair index".to_string(),
        y_label: "Difference (m/s)".to_string(),
        series: vec![
            Series::new(SeriesKind::ErrorBars, BLUE_POINTS, raw).labelled(format!(
                "pairs χ²_ν {:.2}, RMS {:.2}",
                c.separation_chi_squared_nu, c.separation_rms
            )),
            Series::new(SeriesKind::ErrorBars, ORANGE_POINTS, model).labelled(format!(
                "model χ²_ν {:.2}, RMS {:.2}",
                c.offset_chi_squared_nu, c.offset_rms
            )),
        ],
        hlines: vec![(0.0, GREY_LINE)],
        vlines: boundaries,
        band: None,
    })
}

#[derive(Debug, Clone, PartialEq)]
pub struct DepthPoint {
    pub label: String,
    /// |depth(lower) - depth(higher)| in the normalized solar spectrum.
    pub depth_difference: f64,
    pub mean_depth: f64,
    pub offset: f64,
    pub stat_err: f64,
    pub sys_err: f64,
}

#[derive(Debug, Clone)]
pub struct DepthCheck {
    pub star: String,
    pub era: Era,
    pub n_obs: usize,
    pub points: Vec<DepthPoint>,
    pub chi_squared_nu: f64,
    /// Binned on statistical errors only.
    pub bins: Vec<OffsetBin>,
}

/// Depth difference bin edges, 0 to 0.2 in eight bins.
pub fn depth_bin_edges() -> Vec<f64> {
    (0..=8).map(|i| i as f64 * 0.025).collect()
}

/// Model offsets against the depth difference of the pair members.
///
/// Pairs whose members carry no normalized depth are skipped.
pub fn depth_check(star: &Star, params: &ModelParams, pairs: &[TransitionPair], era: Era) -> Result<DepthCheck, AppError> {
    let (offsets, errors) = star.pair_model()?;
    let mut points = Vec::new();
    for pair in pairs {
        let (Some(h_d), Some(l_d)) = (pair.higher_energy().normalized_depth, pair.lower_energy().normalized_depth)
        else {
            continue;
        };
        for &order in &pair.orders_to_measure_in {
            let label = pair.order_label(order);
            let Ok(p_col) = star.p_index(&label) else {
                continue;
            };
            let Some(model) = column_summary(star, offsets, errors, p_col, era) else {
                continue;
            };
            points.push(DepthPoint {
                label,
                depth_difference: (l_d - h_d).abs(),
                mean_depth: 0.5 * (l_d + h_d),
                offset: model.weighted_mean,
                stat_err: model.eotwm,
                sys_err: pair_sys_err(star, params, p_col, era),
            });
        }
    }
    if points.is_empty() {
        return Err(AppError::new(3, format!("{}: no {era} pairs with known depths", star.name)));
    }
    let xs: Vec<f64> = points.iter().map(|p| p.depth_difference).collect();
    let values: Vec<f64> = points.iter().map(|p| p.offset).collect();
    let stat: Vec<f64> = points.iter().map(|p| p.stat_err).collect();
    let full: Vec<f64> = points.iter().map(|p| p.stat_err.hypot(p.sys_err)).collect();
    Ok(DepthCheck {
        star: star.name.clone(),
        era,
        n_obs: star.era_rows(era).len(),
        chi_squared_nu: chi_squared_about_zero(&values, &full),
        bins: bin_offsets(&xs, &values, &stat, &depth_bin_edges()),
        points,
    })
}

pub fn depth_panel(c: &DepthCheck) -> Panel {
    let points = c
        .points
        .iter()
        .map(|p| (p.depth_difference, p.offset, p.stat_err.hypot(p.sys_err)))
        .collect();
    let binned = c.bins.iter().map(|b| (b.midpoint, b.weighted_mean, b.eotwm)).collect();
    Panel::Xy(XyPanel {
        title: format!("{} {} (χ²_ν = {:.2}, {} obs)", c.star, c.era, c.chi_squared_nu, c.n_obs),
        x_label: "Pair normalized depth difference".to_string(),
        y_label: "Model-corrected pair offset (m/s)".to_string(),
        series: vec![
            Series::new(SeriesKind::ErrorBars, BLUE_POINTS, points).labelled("pairs"),
            Series::new(SeriesKind::Line, GREEN_LINE, binned).labelled("weighted mean per bin"),
        ],
        hlines: vec![(0.0, GREY_LINE)],
        ..XyPanel::default()
    })
}

/// All checks of one star, one entry per era with usable data.
#[derive(Debug, Clone, Default)]
pub struct StarDiagnostics {
    pub separation: Vec<SeparationCheck>,
    pub duplicates: Vec<DuplicateCheck>,
    pub depth: Vec<DepthCheck>,
}

/// Run every check in both eras; checks without data are logged and skipped.
pub fn star_diagnostics(star: &Star, params: &ModelParams, pairs: &[TransitionPair]) -> StarDiagnostics {
    let mut out = StarDiagnostics::default();
    for era in Era::ALL {
        if !star.has_obs(era) {
            continue;
        }
        match separation_check(star, params, era) {
            Ok(c) => out.separation.push(c),
            Err(e) => warn!("{e}"),
        }
        match duplicate_check(star, era) {
            Ok(c) => out.duplicates.push(c),
            Err(e) => warn!("{e}"),
        }
        match depth_check(star, params, pairs, era) {
            Ok(c) => out.depth.push(c),
            Err(e) => warn!("{e}"),
        }
    }
    out
}

/// Write one SVG per check under `dir`, one row per era. Returns the paths written.
pub fn render_star_diagnostics(dir: &Path, d: &StarDiagnostics) -> Result<Vec<PathBuf>, AppError> {
    let plots: [(&str, Vec<Panel>); 3] = [
        ("model_offsets.svg", d.separation.iter().map(separation_panel).collect()),
        ("duplicate_pairs.svg", d.duplicates.iter().map(duplicate_panel).collect()),
        ("depth_differences.svg", d.depth.iter().map(depth_panel).collect()),
    ];
    let mut written = Vec::new();
    for (name, panels) in plots {
        if panels.is_empty() {
            continue;
        }
        let path = dir.join(name);
        render_panels(&path, &panels, panels.len(), 1, (1200, 500 * panels.len() as u32))?;
        written.push(path);
    }
    Ok(written)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::database::tests::{params, props, star};
    use crate::domain::Transition;
    use crate::star::ObservationFits;
    use crate::star::load::tests::fit;
    use approx::assert_relative_eq;

    const PRE: [&str; 2] = ["2012-01-01T00:00:00.000", "2013-01-01T00:00:00.000"];

    fn corrected(offsets: &[(&str, f64)]) -> Star {
        let mut s = star("HD1", offsets);
        s.apply_model(&params(), &props("HD1", 5800.0));
        s
    }

    /// Fe I / V I pair measured in orders 16 and 17, the V line offset by
    /// `shift` m/s in order 17 only, with a constant model applied.
    fn two_order_star(shift: f64) -> (Star, TransitionPair, ModelParams) {
        let mut fe = Transition::parse(4217.791, "Fe", "1").unwrap();
        fe.orders_to_fit_in = vec![16, 17];
        fe.normalized_depth = Some(0.40);
        let mut v = Transition::parse(4219.893, "V", "1").unwrap();
        v.orders_to_fit_in = vec![16, 17];
        v.normalized_depth = Some(0.52);
        let mut pair = TransitionPair::new(fe.clone(), v.clone()).unwrap();
        pair.orders_to_measure_in = vec![16, 17];

        let observations: Vec<ObservationFits> = PRE
            .iter()
            .enumerate()
            .map(|(i, d)| {
                let mut rows = Vec::new();
                for order in [16, 17] {
                    let v_offset = if order == 17 { shift } else { 0.0 };
                    for (label, mean, offset) in [("4217.791Fe1", 4217.791, 2.0), ("4219.893V1", 4219.893, v_offset)] {
                        let mut row = fit(&format!("{label}_{order}"), d, mean, offset);
                        row.order = order;
                        rows.push(row);
                    }
                }
                ObservationFits::from_fits(&format!("obs{i}"), rows).unwrap()
            })
            .collect();
        let mut s = Star::from_observations("HD2", &observations, &[fe, v], &[pair.clone()]).unwrap();
        let mut model = ModelParams::new(crate::domain::ModelKind::Constant);
        for order in [16, 17] {
            model.insert(&format!("4217.791Fe1_{order}"), Era::Pre, vec![1.0], 3.0);
            model.insert(&format!("4219.893V1_{order}"), Era::Pre, vec![-1.0], 4.0);
        }
        s.apply_model(&model, &props("HD2", 5800.0));
        (s, pair, model)
    }

    #[test]
    fn offsets_use_model_corrected_values() {
        let s = corrected(&[(PRE[0], 3.0), (PRE[1], 5.0)]);
        let points = pair_offsets(&s, &params(), Era::Pre).unwrap();
        assert_eq!(points.len(), 1);
        // (0 + 1) - (offset - 1), averaged over -1 and -3.
        assert_relative_eq!(points[0].offset, -2.0, epsilon = 1e-9);
        assert_relative_eq!(points[0].stat_err, 4.0, epsilon = 1e-12);
        assert_relative_eq!(points[0].sys_err, 5.0, epsilon = 1e-12);
        assert!(points[0].separation > 100.0 && points[0].separation < 200.0);
    }

    #[test]
    fn separation_check_bins_by_hundred_kilometres_per_second() {
        let s = corrected(&[(PRE[0], 3.0), (PRE[1], 5.0)]);
        let check = separation_check(&s, &params(), Era::Pre).unwrap();
        assert_eq!(check.n_obs, 2);
        assert_eq!(separation_bin_edges().len(), 9);
        assert_eq!(check.bins.len(), 1);
        assert_eq!(check.bins[0].midpoint, 150.0);
        assert_relative_eq!(check.weighted_mean, -2.0, epsilon = 1e-9);
        // One point: no degrees of freedom left.
        assert!(check.chi_squared_nu.is_nan());
        assert!(matches!(separation_panel(&check), Panel::Xy(_)));
    }

    #[test]
    fn checks_need_an_applied_model() {
        let s = star("HD1", &[(PRE[0], 3.0)]);
        assert_eq!(separation_check(&s, &params(), Era::Pre).unwrap_err().exit_code(), 3);
        assert_eq!(duplicate_check(&s, Era::Pre).unwrap_err().exit_code(), 3);
    }

    #[test]
    fn duplicate_pairs_compare_the_two_orders() {
        let (s, _, _) = two_order_star(6.0);
        let columns = duplicate_columns(&s);
        assert_eq!(columns.len(), 1);
        assert_eq!(columns[0].0, "4217.791Fe1_4219.893V1");
        assert_eq!((columns[0].1.0, columns[0].2.0), (16, 17));

        let check = duplicate_check(&s, Era::Pre).unwrap();
        assert_eq!(check.pairs.len(), 1);
        let p = &check.pairs[0];
        assert_eq!(p.orders, (16, 17));
        assert_relative_eq!(p.offset_diff, 6.0, epsilon = 1e-9);
        assert_relative_eq!(p.offset_err, 32f64.sqrt(), epsilon = 1e-12);
        // Same fitted centres in both orders.
        assert_relative_eq!(p.separation_diff, 0.0, epsilon = 1e-6);
        assert!(matches!(duplicate_panel(&check), Panel::Xy(_)));
    }

    #[test]
    fn single_order_pairs_have_no_duplicates() {
        let s = corrected(&[(PRE[0], 3.0)]);
        assert!(duplicate_columns(&s).is_empty());
        assert_eq!(duplicate_check(&s, Era::Pre).unwrap_err().exit_code(), 3);
    }

    #[test]
    fn depth_check_uses_member_depths() {
        let (s, pair, model) = two_order_star(6.0);
        let check = depth_check(&s, &model, &[pair], Era::Pre).unwrap();
        assert_eq!(check.points.len(), 2);
        assert_relative_eq!(check.points[0].depth_difference, 0.12, epsilon = 1e-12);
        assert_relative_eq!(check.points[0].mean_depth, 0.46, epsilon = 1e-12);
        // Fe corrected to 1, V to 1 and 7.
        assert_relative_eq!(check.points[0].offset, 0.0, epsilon = 1e-9);
        assert_relative_eq!(check.points[1].offset, 6.0, epsilon = 1e-9);
        assert_relative_eq!(check.points[0].sys_err, 5.0, epsilon = 1e-12);
        assert_eq!(depth_bin_edges().len(), 9);
        assert_eq!(check.bins.len(), 1);
        assert_eq!(check.bins[0].n, 2);
        assert_relative_eq!(check.bins[0].midpoint, 0.1125, epsilon = 1e-12);

        let mut bare = TransitionPair::new(
            Transition::parse(4217.791, "Fe", "1").unwrap(),
            Transition::parse(4219.893, "V", "1").unwrap(),
        )
        .unwrap();
        bare.orders_to_measure_in = vec![16, 17];
        assert_eq!(depth_check(&s, &model, &[bare], Era::Pre).unwrap_err().exit_code(), 3);
    }

    #[test]
    fn diagnostics_render_one_file_per_check() {
        let (s, pair, model) = two_order_star(6.0);
        let d = star_diagnostics(&s, &model, &[pair]);
        assert_eq!(d.separation.len(), 1);
        assert_eq!(d.duplicates.len(), 1);
        assert_eq!(d.depth.len(), 1);
        let dir = tempfile::tempdir().unwrap();
        let written = render_star_diagnostics(&dir.path().join("HD2"), &d).unwrap();
        assert_eq!(written.len(), 3);
        assert!(written.iter().all(|p| p.exists()));
    }
}
