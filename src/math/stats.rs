//! Descriptive statistics with explicit NaN handling.
//!
//! Missing measurements are stored as NaN throughout the crate, so the helpers
//! here either skip NaNs (`nan_*`) or report them through a mask.

use chrono::{Datelike, NaiveDate, NaiveDateTime};

/// Weighted mean of `values` with weights `1/σ²`, and its error `1/sqrt(Σw)`.
///
/// Pairs with a non-finite value or a non-positive error are ignored. Returns
/// `None` when nothing usable remains.
pub fn weighted_mean_and_error(values: &[f64], errors: &[f64]) -> Option<(f64, f64)> {
    let mut wsum = 0.0;
    let mut acc = 0.0;
    for (&v, &e) in values.iter().zip(errors) {
        if !(v.is_finite() && e.is_finite() && e > 0.0) {
            continue;
        }
        let w = 1.0 / (e * e);
        wsum += w;
        acc += w * v;
    }
    if wsum > 0.0 {
        Some((acc / wsum, 1.0 / wsum.sqrt()))
    } else {
        None
    }
}

/// Reduced chi-squared `Σ(r/σ)² / (n - n_params)`; NaN without degrees of freedom.
pub fn chi_squared_nu(residuals: &[f64], errors: &[f64], n_params: usize) -> f64 {
    let n = residuals.len().min(errors.len());
    if n <= n_params {
        return f64::NAN;
    }
    let chi2: f64 = residuals
        .iter()
        .zip(errors)
        .map(|(r, e)| (r / e).powi(2))
        .sum();
    chi2 / (n - n_params) as f64
}

fn finite(values: &[f64]) -> impl Iterator<Item = f64> + '_ {
    values.iter().copied().filter(|v| v.is_finite())
}

pub fn nan_mean(values: &[f64]) -> f64 {
    let (sum, n) = finite(values).fold((0.0, 0usize), |(s, n), v| (s + v, n + 1));
    if n == 0 { f64::NAN } else { sum / n as f64 }
}

/// Population standard deviation (ddof = 0) of the finite values.
pub fn nan_std(values: &[f64]) -> f64 {
    let mean = nan_mean(values);
    if !mean.is_finite() {
        return f64::NAN;
    }
    let (ss, n) = finite(values).fold((0.0, 0usize), |(s, n), v| (s + (v - mean).powi(2), n + 1));
    (ss / n as f64).sqrt()
}

pub fn nan_median(values: &[f64]) -> f64 {
    let mut sorted: Vec<f64> = finite(values).collect();
    if sorted.is_empty() {
        return f64::NAN;
    }
    sorted.sort_by(f64::total_cmp);
    let mid = sorted.len() / 2;
    if sorted.len() % 2 == 0 {
        (sorted[mid - 1] + sorted[mid]) / 2.0
    } else {
        sorted[mid]
    }
}

/// Error on the mean, `std / sqrt(n)`, over the finite values.
pub fn error_on_mean(values: &[f64]) -> f64 {
    let n = finite(values).count();
    if n == 0 {
        return f64::NAN;
    }
    nan_std(values) / (n as f64).sqrt()
}

/// Finite values plus a mask telling which input positions were kept.
pub fn remove_nans(values: &[f64]) -> (Vec<f64>, Vec<bool>) {
    let mask: Vec<bool> = values.iter().map(|v| v.is_finite()).collect();
    (finite(values).collect(), mask)
}

/// Bin edges at evenly spaced quantiles of `values` (nearest-rank).
///
/// Returns `nbins + 1` edges; fewer than two finite values give an empty list.
pub fn quantile_bins(values: &[f64], nbins: usize) -> Vec<f64> {
    let mut sorted: Vec<f64> = finite(values).collect();
    if sorted.len() < 2 || nbins == 0 {
        return Vec::new();
    }
    sorted.sort_by(f64::total_cmp);
    let last = (sorted.len() - 1) as f64;
    (0..=nbins)
        .map(|i| {
            let q = i as f64 / nbins as f64;
            sorted[(q * last).round() as usize]
        })
        .collect()
}

/// Evenly stepped values in `[start, stop)`, like a half-open range.
pub fn arange(start: f64, stop: f64, step: f64) -> Vec<f64> {
    if !(step > 0.0) || stop <= start {
        return Vec::new();
    }
    let n = ((stop - start) / step - 1e-9).ceil() as usize;
    (0..n).map(|i| start + i as f64 * step).collect()
}

pub fn bin_midpoints(edges: &[f64]) -> Vec<f64> {
    edges.windows(2).map(|w| (w[0] + w[1]) / 2.0).collect()
}

/// Fractional year, e.g. 2015-07-02T12:00 -> ~2015.5.
pub fn decimal_year(date: NaiveDateTime) -> f64 {
    let year = date.year();
    let (Some(start), Some(end)) = (
        NaiveDate::from_ymd_opt(year, 1, 1).and_then(|d| d.and_hms_opt(0, 0, 0)),
        NaiveDate::from_ymd_opt(year + 1, 1, 1).and_then(|d| d.and_hms_opt(0, 0, 0)),
    ) else {
        return year as f64;
    };
    let elapsed = (date - start).num_seconds() as f64;
    let length = (end - start).num_seconds() as f64;
    year as f64 + elapsed / length
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn weighted_mean_ignores_unusable_points() {
        let (mean, err) =
            weighted_mean_and_error(&[1.0, 3.0, f64::NAN, 100.0], &[1.0, 1.0, 1.0, 0.0]).unwrap();
        assert_relative_eq!(mean, 2.0);
        assert_relative_eq!(err, 1.0 / 2f64.sqrt());
        assert!(weighted_mean_and_error(&[], &[]).is_none());
    }

    #[test]
    fn chi_squared_nu_uses_degrees_of_freedom() {
        let chi = chi_squared_nu(&[1.0, -1.0, 2.0], &[1.0, 1.0, 2.0], 1);
        assert_relative_eq!(chi, 1.5);
        assert!(chi_squared_nu(&[1.0], &[1.0], 1).is_nan());
    }

    #[test]
    fn nan_aware_moments() {
        let values = [1.0, f64::NAN, 3.0, 5.0];
        assert_relative_eq!(nan_mean(&values), 3.0);
        assert_relative_eq!(nan_std(&values), (8.0f64 / 3.0).sqrt());
        assert_relative_eq!(nan_median(&values), 3.0);
        assert_relative_eq!(nan_median(&[4.0, 1.0, 2.0, 3.0]), 2.5);
        assert!(nan_mean(&[f64::NAN]).is_nan());
        assert_relative_eq!(error_on_mean(&values), (8.0f64 / 3.0).sqrt() / 3f64.sqrt());
    }

    #[test]
    fn remove_nans_reports_mask() {
        let (kept, mask) = remove_nans(&[1.0, f64::NAN, 2.0]);
        assert_eq!(kept, vec![1.0, 2.0]);
        assert_eq!(mask, vec![true, false, true]);
    }

    #[test]
    fn quantile_bins_cover_the_data() {
        let values: Vec<f64> = (0..=100).map(f64::from).collect();
        let edges = quantile_bins(&values, 4);
        assert_eq!(edges, vec![0.0, 25.0, 50.0, 75.0, 100.0]);
        assert_eq!(bin_midpoints(&edges), vec![12.5, 37.5, 62.5, 87.5]);
        assert!(quantile_bins(&[1.0], 3).is_empty());
    }

    #[test]
    fn arange_is_half_open() {
        assert_eq!(arange(-25.0, 30.0, 5.0).len(), 11);
        assert_eq!(arange(0.0, 1.0, 0.25), vec![0.0, 0.25, 0.5, 0.75]);
        assert!(arange(1.0, 0.0, 0.1).is_empty());
    }

    #[test]
    fn decimal_year_is_fractional() {
        let date = NaiveDate::from_ymd_opt(2015, 1, 1).unwrap().and_hms_opt(0, 0, 0).unwrap();
        assert_relative_eq!(decimal_year(date), 2015.0);
        let mid = NaiveDate::from_ymd_opt(2015, 7, 2).unwrap().and_hms_opt(12, 0, 0).unwrap();
        assert!((decimal_year(mid) - 2015.5).abs() < 0.01);
    }
}
