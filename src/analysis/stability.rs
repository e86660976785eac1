//! Stability of one star's model-corrected pair offsets against BERV.
//!
//! Observations are binned by barycentric Earth radial velocity in 5 km/s
//! bins; an offset that depends on where the lines fall on the detector
//! shows up as a trend across bins.

use crate::analysis::summarize;
use crate::domain::{Era, ModelKind};
use crate::error::AppError;
use crate::fit::find_sys_scatter;
use crate::math::arange;
use crate::models::StellarCoords;
use crate::plot::{BLUE_POINTS, GREY_LINE, ORANGE_POINTS, Panel, Series, SeriesKind, XyPanel};
use crate::star::Star;

/// Outlier cut used for the σ_sys of BERV-binned offsets.
pub const BERV_N_SIGMA: f64 = 3.0;

/// BERV bin edges from -25 to +25 km/s (in m/s).
pub fn berv_bin_edges() -> Vec<f64> {
    arange(-25_000.0, 25_001.0, 5_000.0)
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BervBin {
    /// Bin centre (m/s).
    pub centre: f64,
    pub n: usize,
    pub weighted_mean: f64,
    pub eotwm: f64,
}

#[derive(Debug, Clone)]
pub struct BervStability {
    pub star: String,
    pub label: String,
    pub era: Era,
    /// `(berv, model offset, error)` of every observation used.
    pub points: Vec<(f64, f64, f64)>,
    /// Non-empty bins only.
    pub bins: Vec<BervBin>,
    /// Scatter beyond the formal errors around a constant separation.
    pub sigma_sys: f64,
    pub weighted_mean: f64,
}

/// Bin the model offsets of pair column `p_col` of `star` in `era` by BERV.
///
/// The model must already be applied to `star`.
pub fn berv_stability(
    star: &Star,
    p_col: usize,
    era: Era,
    n_sigma: f64,
    tolerance: f64,
) -> Result<BervStability, AppError> {
    let label = star
        .pair_labels()
        .get(p_col)
        .ok_or_else(|| AppError::new(2, format!("{}: no pair column {p_col}", star.name)))?
        .clone();
    let (offsets, errors) = star.pair_model()?;
    let rows = star.era_rows(era);
    let points: Vec<(f64, f64, f64)> = rows
        .map(|r| (star.berv()[r], offsets[(r, p_col)], errors[(r, p_col)]))
        .filter(|(b, v, e)| b.is_finite() && v.is_finite() && e.is_finite())
        .collect();
    if points.is_empty() {
        return Err(AppError::new(3, format!("{}: no {era} observations of {label}", star.name)));
    }

    let edges = berv_bin_edges();
    let mut bins = Vec::new();
    for w in edges.windows(2) {
        let (values, errors): (Vec<f64>, Vec<f64>) = points
            .iter()
            .filter(|(b, _, _)| *b >= w[0] && *b < w[1])
            .map(|&(_, v, e)| (v, e))
            .unzip();
        if let Some(s) = summarize(&values, &errors) {
            bins.push(BervBin {
                centre: 0.5 * (w[0] + w[1]),
                n: s.n,
                weighted_mean: s.weighted_mean,
                eotwm: s.eotwm,
            });
        }
    }

    let coords = vec![
        StellarCoords {
            temperature: 0.0,
            metallicity: 0.0,
            gravity: 0.0,
            magnitude: 0.0,
        };
        points.len()
    ];
    let values: Vec<f64> = points.iter().map(|p| p.1).collect();
    let errors: Vec<f64> = points.iter().map(|p| p.2).collect();
    let scatter = find_sys_scatter(ModelKind::Constant, &coords, &values, &errors, n_sigma, tolerance)?;

    Ok(BervStability {
        star: star.name.clone(),
        label,
        era,
        points,
        bins,
        sigma_sys: scatter.sigma_sys,
        weighted_mean: scatter.fit.betas[0],
    })
}

pub fn stability_panel(s: &BervStability) -> Panel {
    let km = |v: f64| v / 1000.0;
    let points = s.points.iter().map(|&(b, v, e)| (km(b), v, e)).collect();
    let binned = s.bins.iter().map(|b| (km(b.centre), b.weighted_mean, b.eotwm)).collect();
    Panel::Xy(XyPanel {
        title: format!("{} {} {} (σ_sys = {:.2} m/s)", s.star, s.label, s.era, s.sigma_sys),
        x_label: "BERV (km/s)".to_string(),
        y_label: "Offset from model (m/s)".to_string(),
        series: vec![
            Series::new(SeriesKind::ErrorBars, BLUE_POINTS, points).labelled("observations"),
            Series::new(SeriesKind::ErrorBars, ORANGE_POINTS, binned).labelled("5 km/s bins"),
        ],
        hlines: vec![(s.weighted_mean, GREY_LINE)],
        band: Some((s.weighted_mean - s.sigma_sys, s.weighted_mean + s.sigma_sys)),
        ..XyPanel::default()
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::database::tests::{params, props, star};

    const DATES: [&str; 3] = ["2012-01-01T00:00:00.000", "2012-02-01T00:00:00.000", "2012-03-01T00:00:00.000"];

    fn corrected(offsets: &[f64]) -> Star {
        let rows: Vec<(&str, f64)> = DATES.iter().copied().zip(offsets.iter().copied()).collect();
        let mut s = star("HD1", &rows);
        s.apply_model(&params(), &props("HD1", 5800.0));
        s
    }

    #[test]
    fn edges_span_fifty_kilometres_per_second() {
        let edges = berv_bin_edges();
        assert_eq!(edges.len(), 11);
        assert_eq!(edges[0], -25_000.0);
        assert_eq!(edges[10], 25_000.0);
    }

    #[test]
    fn observations_fall_in_their_berv_bin() {
        let stability = berv_stability(&corrected(&[2.0, 2.0, 2.0]), 0, Era::Pre, BERV_N_SIGMA, 0.001).unwrap();
        assert_eq!(stability.points.len(), 3);
        // Every test observation has BERV = 1 km/s.
        assert_eq!(stability.bins.len(), 1);
        assert_eq!(stability.bins[0].centre, 2_500.0);
        assert_eq!(stability.bins[0].n, 3);
        assert_eq!(stability.sigma_sys, 0.0);
        assert!((stability.weighted_mean - stability.bins[0].weighted_mean).abs() < 1e-9);
        assert!(matches!(stability_panel(&stability), Panel::Xy(_)));
    }

    #[test]
    fn bins_follow_model_offsets_not_raw_separations() {
        let s = corrected(&[3.0, 5.0, 7.0]);
        let stability = berv_stability(&s, 0, Era::Pre, BERV_N_SIGMA, 0.001).unwrap();
        // (0 + 1) - (offset - 1) for the V - Fe pair.
        let expected = [-1.0, -3.0, -5.0];
        for (point, want) in stability.points.iter().zip(expected) {
            assert!((point.1 - want).abs() < 1e-9);
            assert!((point.2 - 32f64.sqrt()).abs() < 1e-12);
        }
        assert!((stability.bins[0].weighted_mean + 3.0).abs() < 1e-9);
        let raw = s.pair_separations[(0, 0)];
        assert!(raw > 100_000.0);
        assert!(stability.points.iter().all(|p| (p.1 - raw).abs() > 1.0));
    }

    #[test]
    fn uncorrected_star_is_rejected() {
        let s = star("HD1", &[(DATES[0], 2.0)]);
        let err = berv_stability(&s, 0, Era::Pre, BERV_N_SIGMA, 0.001).unwrap_err();
        assert_eq!(err.exit_code(), 3);
        assert!(err.message().contains("apply a model"));
    }

    #[test]
    fn empty_era_is_no_data() {
        let s = corrected(&[2.0]);
        assert_eq!(berv_stability(&s, 0, Era::Post, BERV_N_SIGMA, 0.001).unwrap_err().exit_code(), 3);
        assert_eq!(berv_stability(&s, 5, Era::Pre, BERV_N_SIGMA, 0.001).unwrap_err().exit_code(), 2);
    }
}
