//! Kurucz `gfall` atomic line data.
//!
//! Records are fixed width. Only the first nine fields are used:
//! wavelength (nm, vacuum), log gf, element code (`26.01` = Fe II), then
//! energy (cm^-1), J and configuration label of each level.

use std::path::Path;

use log::warn;

use crate::domain::Element;
use crate::error::AppError;
use crate::io::LineRecord;
use crate::spectral::{ev_to_wavenumber, vac_to_air_peck_reeder};

const FIELD_WIDTHS: [usize; 9] = [11, 7, 6, 12, 5, 11, 12, 5, 11];

/// Maximum lower-level energy mismatch accepted when matching (cm^-1).
pub const ENERGY_TOLERANCE: f64 = 1.0;

/// Default wavelength tolerance when matching (nm).
pub const DEFAULT_WAVELENGTH_TOLERANCE: f64 = 0.003;

#[derive(Debug, Clone, PartialEq)]
pub struct KuruczLine {
    /// Vacuum wavelength (nm).
    pub wavelength: f64,
    pub log_gf: f64,
    /// Element code such as `26.01`.
    pub code: f64,
    pub energy1: f64,
    pub j1: f64,
    pub label1: String,
    pub energy2: f64,
    pub j2: f64,
    pub label2: String,
}

impl KuruczLine {
    /// Atomic number from the integer part of the code.
    pub fn atomic_number(&self) -> u8 {
        self.code.trunc() as u8
    }

    /// Ionization state (1 = neutral) from the fractional part of the code.
    pub fn ionization(&self) -> u8 {
        ((self.code - self.code.trunc()) * 100.0).round() as u8 + 1
    }
}

fn split_fields(record: &str) -> Option<Vec<&str>> {
    let mut fields = Vec::with_capacity(FIELD_WIDTHS.len());
    let mut start = 0;
    for width in FIELD_WIDTHS {
        let end = start + width;
        fields.push(record.get(start..end)?.trim());
        start = end;
    }
    Some(fields)
}

/// Parse one `gfall` record; `None` if it is too short or malformed.
pub fn parse_gfall_record(record: &str) -> Option<KuruczLine> {
    let f = split_fields(record)?;
    let num = |i: usize| f[i].parse::<f64>().ok();
    Some(KuruczLine {
        wavelength: num(0)?,
        log_gf: num(1)?,
        code: num(2)?,
        energy1: num(3)?,
        j1: num(4)?,
        label1: f[5].to_string(),
        energy2: num(6)?,
        j2: num(7)?,
        label2: f[8].to_string(),
    })
}

pub fn read_gfall(path: &Path) -> Result<Vec<KuruczLine>, AppError> {
    let text = std::fs::read_to_string(path)
        .map_err(|e| AppError::new(2, format!("Failed to read Kurucz list '{}': {e}", path.display())))?;
    let mut lines = Vec::new();
    let mut skipped = 0usize;
    for record in text.lines().filter(|l| !l.trim().is_empty()) {
        match parse_gfall_record(record) {
            Some(line) => lines.push(line),
            None => skipped += 1,
        }
    }
    if skipped > 0 {
        warn!("{}: skipped {skipped} malformed records", path.display());
    }
    if lines.is_empty() {
        return Err(AppError::new(
            3,
            format!("No Kurucz lines in '{}'.", path.display()),
        ));
    }
    Ok(lines)
}

/// Level data of a matched Kurucz line, with the lower level first.
#[derive(Debug, Clone, PartialEq)]
pub struct KuruczMatch {
    /// Vacuum wavelength, or the Peck & Reeder air wavelength (nm).
    pub wavelength: f64,
    /// Vacuum wavenumber (cm^-1).
    pub wavenumber: f64,
    pub lower_energy: f64,
    pub lower_j: f64,
    pub lower_orbital: String,
    pub higher_energy: f64,
    pub higher_j: f64,
    pub higher_orbital: String,
}

/// Find the Kurucz line matching a measured line.
///
/// Candidates lie within `tolerance` (nm) of the line, have the same element
/// and ionization, and a lower-level energy within [`ENERGY_TOLERANCE`] of the
/// line's. The wavelength offset of every candidate within tolerance is pushed
/// to `offsets`.
pub fn match_kurucz_line(
    line: &LineRecord,
    kurucz: &[KuruczLine],
    tolerance: f64,
    vacuum: bool,
    offsets: &mut Vec<f64>,
) -> Option<KuruczMatch> {
    let lower_wavenumber = ev_to_wavenumber(line.lower_energy);
    let element = line.element;
    for k in kurucz {
        let offset = (k.wavelength - line.wavelength).abs();
        if offset >= tolerance {
            continue;
        }
        offsets.push(offset);
        if k.atomic_number() != element.atomic_number() || k.ionization() != line.ionization {
            continue;
        }
        let (low, high) = if k.energy1 < k.energy2 {
            ((k.energy1, k.j1, &k.label1), (k.energy2, k.j2, &k.label2))
        } else {
            ((k.energy2, k.j2, &k.label2), (k.energy1, k.j1, &k.label1))
        };
        if (lower_wavenumber - low.0).abs() >= ENERGY_TOLERANCE {
            continue;
        }
        let wavelength = if vacuum {
            k.wavelength
        } else {
            // Peck & Reeder takes Angstroms.
            (vac_to_air_peck_reeder(k.wavelength * 10.0) / 10.0 * 1e4).round() / 1e4
        };
        return Some(KuruczMatch {
            wavelength,
            wavenumber: (1e7 / k.wavelength * 1e3).round() / 1e3,
            lower_energy: low.0,
            lower_j: low.1,
            lower_orbital: low.2.clone(),
            higher_energy: high.0,
            higher_j: high.1,
            higher_orbital: high.2.clone(),
        });
    }
    None
}
