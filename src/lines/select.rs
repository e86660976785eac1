//! Line-pair selection from a solar line list.
//!
//! For each line within the depth limits, partners are searched among the
//! other lines of the same species that are close in wavelength and similar in
//! depth. Matched lines are identified in the Kurucz list to get their level
//! data, then written to a line-pair file and collected as [`TransitionPair`]s.

use std::collections::{BTreeSet, HashSet};
use std::fs::File;
use std::io::Write;
use std::path::Path;

use log::{debug, warn};

use crate::domain::{Transition, TransitionPair};
use crate::error::AppError;
use crate::io::LineRecord;
use crate::lines::kurucz::{DEFAULT_WAVELENGTH_TOLERANCE, KuruczLine, KuruczMatch, match_kurucz_line};
use crate::lines::mask::{MaskRegion, line_is_masked};
use crate::plot::{HistogramPanel, Panel, render_panels};
use crate::spectral::velocity_to_wavelength_offset;
use crate::units::{Length, LengthExt, Velocity, VelocityExt};

#[derive(Debug, Clone)]
pub struct SelectionParams {
    pub min_depth: f64,
    pub max_depth: f64,
    /// Largest velocity separation between partners.
    pub velocity_separation: Velocity,
    /// Largest depth difference between partners.
    pub depth_difference: f64,
    /// Report vacuum (true) or Peck & Reeder air (false) wavelengths.
    pub vacuum: bool,
    /// Kurucz wavelength matching tolerance (nm).
    pub tolerance: f64,
}

impl Default for SelectionParams {
    fn default() -> Self {
        Self {
            min_depth: 0.15,
            max_depth: 0.9,
            velocity_separation: Velocity::from_meters_per_second(800_000.0),
            depth_difference: 0.2,
            vacuum: true,
            tolerance: DEFAULT_WAVELENGTH_TOLERANCE,
        }
    }
}

/// Outcome of a selection run.
#[derive(Debug, Clone, Default)]
pub struct PairSelection {
    /// One block per primary line: the primary followed by its partners.
    pub blocks: Vec<Vec<String>>,
    pub pairs: Vec<TransitionPair>,
    pub n_matches: usize,
    pub n_iron: usize,
    pub n_unmatchable: usize,
    pub elements: BTreeSet<String>,
    /// Wavelength offsets (nm) of all Kurucz candidates within tolerance.
    pub offsets: Vec<f64>,
}

/// Float formatted as a decimal with at least one fractional digit.
fn decimal(v: f64) -> String {
    let s = v.to_string();
    if s.contains('.') || s.contains('e') || !v.is_finite() { s } else { format!("{s}.0") }
}

/// One line of the line-pair file.
pub fn format_line(line: &LineRecord, m: &KuruczMatch) -> String {
    format!(
        "{:0<8} {:0<9} {}{} {:0<9} {} {:10} {:0<9} {} {:10}",
        decimal(m.wavelength),
        decimal(m.wavenumber),
        line.element,
        line.ionization,
        decimal(m.lower_energy),
        decimal(m.lower_j),
        m.lower_orbital,
        decimal(m.higher_energy),
        decimal(m.higher_j),
        m.higher_orbital,
    )
}

fn to_transition(line: &LineRecord, m: &KuruczMatch) -> Result<Transition, AppError> {
    let mut t = Transition::new(Length::from_nanometers(m.wavelength), line.element, line.ionization)
        .map_err(|e| AppError::new(2, e.to_string()))?;
    t.lower_energy = Some(m.lower_energy);
    t.lower_j = Some(m.lower_j);
    t.lower_orbital = Some(m.lower_orbital.clone());
    t.higher_energy = Some(m.higher_energy);
    t.higher_j = Some(m.higher_j);
    t.higher_orbital = Some(m.higher_orbital.clone());
    t.normalized_depth = Some(line.depth);
    Ok(t)
}

fn within_depth(depth: f64, params: &SelectionParams) -> bool {
    (params.min_depth..=params.max_depth).contains(&depth)
}

/// Tag used to remember matched primaries (0.1 nm resolution).
fn tag(wavelength: f64) -> i64 {
    (wavelength * 10.0).trunc() as i64
}

/// Search `lines` for pairs; `mask` regions are skipped.
pub fn select_pairs(
    lines: &[LineRecord],
    kurucz: &[KuruczLine],
    mask: &[MaskRegion],
    params: &SelectionParams,
) -> Result<PairSelection, AppError> {
    let mut out = PairSelection::default();
    let mut prematched: HashSet<i64> = HashSet::new();

    for primary in lines {
        if line_is_masked(primary.wavelength, mask) || !within_depth(primary.depth, params) {
            continue;
        }
        let delta = Length::from_angstroms(velocity_to_wavelength_offset(
            params.velocity_separation,
            Length::from_nanometers(primary.wavelength),
        ))
        .as_nanometers();

        let mut block: Option<(Vec<String>, Transition)> = None;
        for partner in lines {
            if line_is_masked(partner.wavelength, mask) || prematched.contains(&tag(partner.wavelength)) {
                continue;
            }
            let separation = (partner.wavelength - primary.wavelength).abs();
            if !(0.0 < separation && separation < delta) {
                continue;
            }
            if !within_depth(partner.depth, params)
                || (primary.depth - partner.depth).abs() >= params.depth_difference
                || primary.element != partner.element
                || primary.ionization != partner.ionization
            {
                continue;
            }

            if block.is_none() {
                let Some(m) = match_kurucz_line(primary, kurucz, params.tolerance, params.vacuum, &mut out.offsets)
                else {
                    warn!(
                        "Couldn't find orbital info for {} {}{} {}eV",
                        primary.wavelength, primary.element, primary.ionization, primary.lower_energy
                    );
                    // Retried, and counted again, for each remaining partner.
                    out.n_unmatchable += 1;
                    continue;
                };
                block = Some((vec![format_line(primary, &m)], to_transition(primary, &m)?));
                prematched.insert(tag(primary.wavelength));
                out.elements.insert(primary.element.to_string());
            }
            let Some((text, anchor)) = block.as_mut() else {
                continue;
            };

            match match_kurucz_line(partner, kurucz, params.tolerance, params.vacuum, &mut out.offsets) {
                Some(m) => {
                    text.push(format_line(partner, &m));
                    let other = to_transition(partner, &m)?;
                    match TransitionPair::new(anchor.clone(), other) {
                        Ok(pair) => out.pairs.push(pair),
                        Err(e) => debug!("Skipping pair: {e}"),
                    }
                }
                None => warn!(
                    "Couldn't find orbital info for {} {}{} {}eV",
                    partner.wavelength, partner.element, partner.ionization, partner.lower_energy
                ),
            }
            out.n_matches += 1;
            if primary.element.symbol() == "Fe" && primary.ionization == 1 {
                out.n_iron += 1;
            }
        }
        if let Some((text, _)) = block {
            out.blocks.push(text);
        }
    }
    Ok(out)
}

/// Write the line-pair file: a header then one blank-line separated block per
/// primary line.
pub fn write_line_pair_file(path: &Path, selection: &PairSelection, vacuum: bool) -> Result<(), AppError> {
    let mut file = File::create(path)
        .map_err(|e| AppError::new(2, format!("Failed to create line file '{}': {e}", path.display())))?;
    let map = |e: std::io::Error| AppError::new(2, format!("Failed to write line file '{}': {e}", path.display()));
    writeln!(
        file,
        "#wl({})   wave#   ion    eL     JL     orbL       eH     JH    orbH",
        if vacuum { "vac" } else { "air" }
    )
    .map_err(map)?;
    for block in &selection.blocks {
        writeln!(file).map_err(map)?;
        for line in block {
            writeln!(file, "{line}").map_err(map)?;
        }
    }
    Ok(())
}

/// Histogram of the Kurucz candidate offsets, for choosing a matching tolerance.
pub fn write_offset_histogram(path: &Path, selection: &PairSelection) -> Result<(), AppError> {
    let panel = Panel::Histogram(HistogramPanel {
        title: format!("{} Kurucz candidates", selection.offsets.len()),
        x_label: "Δ(λ - λ0) (nm)".to_string(),
        values: selection.offsets.clone(),
        bins: 20,
        vlines: vec![],
    });
    render_panels(path, &[panel], 1, 1, (800, 800))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::Element;
    use crate::lines::kurucz::parse_gfall_record;
    use crate::spectral::wavenumber_to_ev;

    const E_LOW: f64 = 7955.299;

    fn line(wl: f64, element: &str, ion: u8, depth: f64) -> LineRecord {
        LineRecord {
            wavelength: wl,
            element: Element::parse(element).unwrap(),
            ionization: ion,
            lower_energy: wavenumber_to_ev(E_LOW),
            depth,
        }
    }

    fn kurucz_for(lines: &[LineRecord]) -> Vec<KuruczLine> {
        lines
            .iter()
            .map(|l| {
                let code = l.element.atomic_number() as f64 + (l.ionization - 1) as f64 / 100.0;
                let record = format!(
                    "{:>11.4}{:>7.3}{:>6.2}{:>12.3}{:>5.1}{:>11}{:>12.3}{:>5.1}{:>11}",
                    l.wavelength, -1.0, code, E_LOW, 2.0, "a5D", 27943.0, 3.0, "z7F"
                );
                parse_gfall_record(&record).unwrap()
            })
            .collect()
    }

    #[test]
    fn partners_must_share_species_depth_and_separation() {
        let lines = vec![
            line(500.000, "Fe", 1, 0.50),
            line(500.500, "Fe", 1, 0.55),  // partner
            line(500.600, "Ti", 1, 0.50),  // wrong element
            line(500.700, "Fe", 1, 0.95),  // too deep
            line(500.800, "Fe", 2, 0.50),  // wrong ionization
            line(510.000, "Fe", 1, 0.50),  // too far (800 km/s ~ 1.33 nm)
        ];
        let kurucz = kurucz_for(&lines);
        let out = select_pairs(&lines, &kurucz, &[], &SelectionParams::default()).unwrap();
        assert_eq!(out.n_matches, 1);
        assert_eq!(out.n_iron, 1);
        assert_eq!(out.blocks.len(), 1);
        assert_eq!(out.blocks[0].len(), 2);
        assert_eq!(out.pairs.len(), 1);
        assert!((out.pairs[0].higher_energy().wavelength_aa() - 5000.0).abs() < 1e-9);
        assert_eq!(out.pairs[0].lower_energy().normalized_depth, Some(0.55));
    }

    #[test]
    fn masked_lines_are_skipped() {
        let lines = vec![line(500.000, "Fe", 1, 0.50), line(500.500, "Fe", 1, 0.55)];
        let kurucz = kurucz_for(&lines);
        let out = select_pairs(&lines, &kurucz, &[(500.4, 500.6)], &SelectionParams::default()).unwrap();
        assert_eq!(out.n_matches, 0);
        assert!(out.blocks.is_empty());
    }

    #[test]
    fn unmatchable_primary_is_counted() {
        let lines = vec![line(500.000, "Fe", 1, 0.50), line(500.500, "Fe", 1, 0.55)];
        let out = select_pairs(&lines, &[], &[], &SelectionParams::default()).unwrap();
        assert_eq!(out.n_unmatchable, 2);
        assert!(out.pairs.is_empty());
    }

    #[test]
    fn unmatchable_primary_is_counted_per_partner() {
        let lines = vec![
            line(500.000, "Fe", 1, 0.50),
            line(500.300, "Fe", 1, 0.55),
            line(500.600, "Fe", 1, 0.45),
        ];
        let out = select_pairs(&lines, &[], &[], &SelectionParams::default()).unwrap();
        assert_eq!(out.n_unmatchable, 6);
        assert_eq!(out.n_matches, 0);
        assert!(out.blocks.is_empty());
    }

    #[test]
    fn line_file_has_header_and_blocks() {
        let lines = vec![line(500.000, "Fe", 1, 0.50), line(500.500, "Fe", 1, 0.55)];
        let kurucz = kurucz_for(&lines);
        let out = select_pairs(&lines, &kurucz, &[], &SelectionParams::default()).unwrap();
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("pairs.txt");
        write_line_pair_file(&path, &out, true).unwrap();
        let text = std::fs::read_to_string(&path).unwrap();
        let rows: Vec<&str> = text.lines().collect();
        assert_eq!(rows[0], "#wl(vac)   wave#   ion    eL     JL     orbL       eH     JH    orbH");
        assert_eq!(rows[1], "");
        assert!(rows[2].starts_with("500.0000 20000.000 Fe1 7955.2990 2.0 a5D"));
    }

    #[test]
    fn offset_histogram_is_written() {
        let lines = vec![line(500.000, "Fe", 1, 0.50), line(500.500, "Fe", 1, 0.55)];
        let kurucz = kurucz_for(&lines);
        let out = select_pairs(&lines, &kurucz, &[], &SelectionParams::default()).unwrap();
        assert!(!out.offsets.is_empty());
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("plots").join("kurucz_offsets.svg");
        write_offset_histogram(&path, &out).unwrap();
        let text = std::fs::read_to_string(&path).unwrap();
        assert!(text.contains("<svg"));
        assert!(text.contains("Kurucz candidates"));
    }
}
