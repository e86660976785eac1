//! CSV ingest and validation.
//!
//! This module turns external CSV tables into clean records:
//!
//! - BRASS solar line lists (`load_line_list`)
//! - star property catalogues (`load_star_properties`)
//!
//! Design goals:
//! - **Strict schema** for required fields (clear errors + exit code 2)
//! - **Row-level validation** (skip bad rows, but report what happened)
//! - **Separation of concerns**: no selection or fitting logic here

use std::collections::HashMap;
use std::fs::File;
use std::path::Path;

use csv::StringRecord;

use crate::domain::element::parse_ionization;
use crate::domain::{Element, StellarProperties};
use crate::error::AppError;

/// A row-level error encountered during ingest.
#[derive(Debug, Clone)]
pub struct RowError {
    pub line: usize,
    pub id: Option<String>,
    pub message: String,
}

/// Ingest output: parsed records + row errors.
#[derive(Debug, Clone)]
pub struct Ingested<T> {
    pub records: Vec<T>,
    pub row_errors: Vec<RowError>,
    pub rows_read: usize,
    pub rows_used: usize,
}

/// One absorption line from a BRASS line list.
#[derive(Debug, Clone, PartialEq)]
pub struct LineRecord {
    /// Vacuum wavelength (nm).
    pub wavelength: f64,
    pub element: Element,
    pub ionization: u8,
    /// Lower-level energy (eV).
    pub lower_energy: f64,
    /// Measured normalized depth in the solar spectrum.
    pub depth: f64,
}

fn open_reader(path: &Path, what: &str) -> Result<csv::Reader<File>, AppError> {
    let file = File::open(path)
        .map_err(|e| AppError::new(2, format!("Failed to open {what} '{}': {e}", path.display())))?;
    Ok(csv::ReaderBuilder::new()
        .flexible(true)
        .trim(csv::Trim::All)
        .from_reader(file))
}

fn ingest_rows<T>(
    reader: &mut csv::Reader<File>,
    mut parse: impl FnMut(&StringRecord) -> Result<T, (Option<String>, String)>,
) -> Ingested<T> {
    let mut records = Vec::new();
    let mut row_errors = Vec::new();
    let mut rows_read = 0usize;

    for (idx, result) in reader.records().enumerate() {
        // +2 because:
        // - records() starts at line 1 after headers
        // - CSV is 1-based line numbers
        let line = idx + 2;
        rows_read += 1;

        match result {
            Ok(record) => match parse(&record) {
                Ok(r) => records.push(r),
                Err((id, message)) => row_errors.push(RowError { line, id, message }),
            },
            Err(e) => row_errors.push(RowError {
                line,
                id: None,
                message: format!("CSV parse error: {e}"),
            }),
        }
    }

    let rows_used = records.len();
    Ingested {
        records,
        row_errors,
        rows_read,
        rows_used,
    }
}

/// Load a BRASS line list.
///
/// Columns are positional (the header line is skipped): wavelength (nm,
/// vacuum), element, ionization, lower-level energy (eV), log gf, depth.
pub fn load_line_list(path: &Path) -> Result<Ingested<LineRecord>, AppError> {
    let mut reader = open_reader(path, "line list")?;
    let ingested = ingest_rows(&mut reader, |record| {
        parse_line_record(record).map_err(|message| (record.get(0).map(str::to_string), message))
    });
    if ingested.rows_used == 0 {
        return Err(AppError::new(
            3,
            format!("No valid lines in line list '{}'.", path.display()),
        ));
    }
    Ok(ingested)
}

fn parse_line_record(record: &StringRecord) -> Result<LineRecord, String> {
    let field = |idx: usize, name: &str| -> Result<&str, String> {
        record
            .get(idx)
            .filter(|s| !s.is_empty())
            .ok_or_else(|| format!("Missing required value: `{name}`"))
    };
    let number = |idx: usize, name: &str| -> Result<f64, String> {
        let s = field(idx, name)?;
        s.parse::<f64>()
            .ok()
            .filter(|v| v.is_finite())
            .ok_or_else(|| format!("Invalid `{name}` value '{s}'."))
    };
    let element = Element::parse(field(1, "element")?).map_err(|e| e.to_string())?;
    let ionization = parse_ionization(field(2, "ionization")?).map_err(|e| e.to_string())?;
    Ok(LineRecord {
        wavelength: number(0, "wavelength")?,
        element,
        ionization,
        lower_energy: number(3, "lower energy")?,
        depth: number(5, "depth")?,
    })
}

/// Load star properties from a catalogue CSV.
///
/// Required columns: `name`, `teff`, `feh`, `logg`, `mv`; optional: `ra`
/// (hours), `dec` (degrees), `distance` (pc). A few common aliases are
/// accepted for each.
pub fn load_star_properties(path: &Path) -> Result<Ingested<StellarProperties>, AppError> {
    let mut reader = open_reader(path, "star properties")?;
    let headers = reader
        .headers()
        .map_err(|e| AppError::new(2, format!("Failed to read CSV headers: {e}")))?
        .clone();
    let header_map = build_header_map(&headers);

    for aliases in REQUIRED_PROPERTY_COLUMNS {
        if resolve_column(&header_map, aliases).is_none() {
            return Err(AppError::new(
                2,
                format!("Missing required column: `{}`", aliases[0]),
            ));
        }
    }

    let ingested = ingest_rows(&mut reader, |record| {
        let name = get_optional(record, &header_map, NAME_COLUMNS).map(str::to_string);
        parse_star_row(record, &header_map).map_err(|message| (name, message))
    });
    if ingested.rows_used == 0 {
        return Err(AppError::new(
            3,
            format!("No valid stars in '{}'.", path.display()),
        ));
    }
    Ok(ingested)
}

const NAME_COLUMNS: &[&str] = &["name", "star", "star_name"];
const TEFF_COLUMNS: &[&str] = &["teff", "temperature"];
const FEH_COLUMNS: &[&str] = &["feh", "[fe/h]", "metallicity"];
const LOGG_COLUMNS: &[&str] = &["logg", "log g", "gravity"];
const MV_COLUMNS: &[&str] = &["mv", "m_v", "absolute_magnitude", "magnitude"];
const REQUIRED_PROPERTY_COLUMNS: [&[&str]; 5] = [NAME_COLUMNS, TEFF_COLUMNS, FEH_COLUMNS, LOGG_COLUMNS, MV_COLUMNS];

fn parse_star_row(record: &StringRecord, header_map: &HashMap<String, usize>) -> Result<StellarProperties, String> {
    let name = get_required(record, header_map, NAME_COLUMNS)?.to_string();
    let number = |aliases: &[&str]| -> Result<f64, String> {
        let s = get_required(record, header_map, aliases)?;
        parse_opt_f64(Some(s)).ok_or_else(|| format!("Invalid `{}` value '{s}'.", aliases[0]))
    };
    Ok(StellarProperties {
        name,
        temperature: number(TEFF_COLUMNS)?,
        metallicity: number(FEH_COLUMNS)?,
        gravity: number(LOGG_COLUMNS)?,
        magnitude: number(MV_COLUMNS)?,
        ra_hours: parse_opt_f64(get_optional(record, header_map, &["ra", "ra_hours"])),
        dec_degrees: parse_opt_f64(get_optional(record, header_map, &["dec", "dec_degrees"])),
        distance_pc: parse_opt_f64(get_optional(record, header_map, &["distance", "distance_pc"])),
    })
}

fn build_header_map(headers: &StringRecord) -> HashMap<String, usize> {
    headers
        .iter()
        .enumerate()
        .map(|(idx, name)| (normalize_header_name(name), idx))
        .collect()
}

fn normalize_header_name(name: &str) -> String {
    // Excel and other tools sometimes emit UTF-8 CSVs with a BOM prefix on the
    // first header. If we don't strip it, schema validation will incorrectly
    // report missing columns.
    let name = name.trim().trim_start_matches('\u{feff}');
    name.to_ascii_lowercase()
}

fn resolve_column(header_map: &HashMap<String, usize>, aliases: &[&str]) -> Option<usize> {
    aliases.iter().find_map(|a| header_map.get(*a).copied())
}

fn get_required<'a>(
    record: &'a StringRecord,
    header_map: &HashMap<String, usize>,
    aliases: &[&str],
) -> Result<&'a str, String> {
    let idx = resolve_column(header_map, aliases)
        .ok_or_else(|| format!("Missing required column: `{}`", aliases[0]))?;
    record
        .get(idx)
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .ok_or_else(|| format!("Missing required value: `{}`", aliases[0]))
}

fn get_optional<'a>(record: &'a StringRecord, header_map: &HashMap<String, usize>, aliases: &[&str]) -> Option<&'a str> {
    let idx = resolve_column(header_map, aliases)?;
    record.get(idx).map(str::trim).filter(|s| !s.is_empty())
}

fn parse_opt_f64(s: Option<&str>) -> Option<f64> {
    let s = s?;
    let v = s.parse::<f64>().ok()?;
    if v.is_finite() { Some(v) } else { None }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn write(dir: &tempfile::TempDir, name: &str, text: &str) -> std::path::PathBuf {
        let path = dir.path().join(name);
        std::fs::write(&path, text).unwrap();
        path
    }

    #[test]
    fn line_list_skips_bad_rows() {
        let dir = tempfile::tempdir().unwrap();
        let path = write(
            &dir,
            "brass.csv",
            "wl,elem,ion,elow,loggf,depth\n\
             500.1234,Fe,1,2.45,-1.2,0.55\n\
             500.2000,Xx,1,2.45,-1.2,0.55\n\
             500.3000,Ti,2,1.10,-0.5,abc\n\
             501.0000,Ni,1,3.60,-2.0,0.31\n",
        );
        let out = load_line_list(&path).unwrap();
        assert_eq!(out.rows_read, 4);
        assert_eq!(out.rows_used, 2);
        assert_eq!(out.row_errors.len(), 2);
        assert_eq!(out.row_errors[0].line, 3);
        assert_eq!(out.row_errors[1].id.as_deref(), Some("500.3000"));
        assert_eq!(out.records[1].element.symbol(), "Ni");
        assert_eq!(out.records[0].depth, 0.55);
    }

    #[test]
    fn star_properties_accept_aliases_and_bom() {
        let dir = tempfile::tempdir().unwrap();
        let path = write(
            &dir,
            "stars.csv",
            "\u{feff}Star,Teff,[Fe/H],logg,M_V,ra,dec\n\
             HD1581,5977,-0.18,4.39,4.55,0.34,-64.87\n\
             HD190248,5604,0.33,4.26,4.62,,\n\
             Bad,hot,0.0,4.4,4.8,,\n",
        );
        let out = load_star_properties(&path).unwrap();
        assert_eq!(out.rows_used, 2);
        assert_eq!(out.row_errors[0].id.as_deref(), Some("Bad"));
        assert_eq!(out.records[0].name, "HD1581");
        assert_eq!(out.records[0].ra_hours, Some(0.34));
        assert_eq!(out.records[1].dec_degrees, None);
    }

    #[test]
    fn missing_required_column_is_an_input_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = write(&dir, "stars.csv", "name,teff,feh,logg\nA,5800,0,4.4\n");
        let err = load_star_properties(&path).unwrap_err();
        assert_eq!(err.exit_code(), 2);
        assert!(err.message().contains("mv"));
    }

    #[test]
    fn empty_catalogue_has_no_data() {
        let dir = tempfile::tempdir().unwrap();
        let path = write(&dir, "stars.csv", "name,teff,feh,logg,mv\n");
        assert_eq!(load_star_properties(&path).unwrap_err().exit_code(), 3);
    }
}
