//! Spectral masks: wavelength ranges to avoid (telluric bands, CCD gaps).

use std::path::Path;

use crate::error::AppError;

/// A masked wavelength range, in the units of the mask file.
pub type MaskRegion = (f64, f64);

/// Parse `start,end` lines; lines containing `#` and blank lines are skipped.
pub fn parse_spectral_mask(text: &str) -> Result<Vec<MaskRegion>, AppError> {
    let mut regions = Vec::new();
    for (idx, line) in text.lines().enumerate() {
        let line = line.trim();
        if line.is_empty() || line.contains('#') {
            continue;
        }
        let parsed = line.split_once(',').and_then(|(start, end)| {
            Some((start.trim().parse::<f64>().ok()?, end.trim().parse::<f64>().ok()?))
        });
        match parsed {
            Some(region) => regions.push(region),
            None => {
                return Err(AppError::new(
                    2,
                    format!("Invalid mask line {}: '{line}' (expected `start,end`)", idx + 1),
                ));
            }
        }
    }
    Ok(regions)
}

pub fn read_spectral_mask(path: &Path) -> Result<Vec<MaskRegion>, AppError> {
    let text = std::fs::read_to_string(path)
        .map_err(|e| AppError::new(2, format!("Failed to read mask '{}': {e}", path.display())))?;
    parse_spectral_mask(&text)
}

/// Whether `wavelength` lies strictly inside any masked region.
pub fn line_is_masked(wavelength: f64, mask: &[MaskRegion]) -> bool {
    mask.iter().any(|&(start, end)| start < wavelength && wavelength < end)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn comments_are_skipped() {
        let mask = parse_spectral_mask("# telluric\n500.0,501.5\n\n630.0, 631.2\n").unwrap();
        assert_eq!(mask, vec![(500.0, 501.5), (630.0, 631.2)]);
    }

    #[test]
    fn region_bounds_are_open() {
        let mask = [(500.0, 501.0)];
        assert!(line_is_masked(500.5, &mask));
        assert!(!line_is_masked(500.0, &mask));
        assert!(!line_is_masked(501.0, &mask));
    }

    #[test]
    fn malformed_line_is_an_input_error() {
        let err = parse_spectral_mask("500.0;501.0\n").unwrap_err();
        assert_eq!(err.exit_code(), 2);
    }
}
