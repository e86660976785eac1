//! Index lookups in sorted wavelength grids and observation dates.

use chrono::{NaiveDate, NaiveDateTime};

use crate::spectral::ConversionError;

/// Index of the grid element closest to `wavelength`.
///
/// The grid must be increasing and `wavelength` must lie strictly inside it.
/// When the wavelength is exactly halfway between two elements the upper one
/// is returned.
pub fn wavelength_to_index(wavelength: f64, grid: &[f64]) -> Result<usize, ConversionError> {
    let (&first, &last) = match (grid.first(), grid.last()) {
        (Some(f), Some(l)) => (f, l),
        _ => return Err(ConversionError::EmptyArray),
    };
    if !(first < wavelength && wavelength < last) {
        return Err(ConversionError::OutOfRange {
            value: wavelength,
            low: first,
            high: last,
        });
    }
    // First index with grid[i] >= wavelength; exists and is >= 1 given the bounds check.
    let upper = grid.partition_point(|&wl| wl < wavelength);
    let lower = upper - 1;
    if wavelength - grid[lower] < grid[upper] - wavelength {
        Ok(lower)
    } else {
        Ok(upper)
    }
}

/// Same as [`wavelength_to_index`] for a decreasing grid; the returned index
/// refers to the grid as given.
pub fn wavelength_to_index_rev(wavelength: f64, grid: &[f64]) -> Result<usize, ConversionError> {
    let reversed: Vec<f64> = grid.iter().rev().copied().collect();
    let idx = wavelength_to_index(wavelength, &reversed)?;
    Ok(grid.len() - 1 - idx)
}

/// Floor-style lookup of a timestamp in a sorted list of observation dates.
///
/// - at or before the first date: `Some(0)`
/// - at or after the last date: `None`
/// - otherwise the index of the first date later than `date`
pub fn date_to_index(date: NaiveDateTime, dates: &[NaiveDateTime]) -> Option<usize> {
    let first = dates.first()?;
    let last = dates.last()?;
    if date <= *first {
        return Some(0);
    }
    if date >= *last {
        return None;
    }
    Some(dates.partition_point(|d| *d <= date))
}

/// [`date_to_index`] for a calendar date, treated as midnight.
pub fn day_to_index(day: NaiveDate, dates: &[NaiveDateTime]) -> Option<usize> {
    date_to_index(day.and_hms_opt(0, 0, 0)?, dates)
}
