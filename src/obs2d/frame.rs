//! A raw HARPS 2D frame: header plus the primary image.

use std::path::{Path, PathBuf};

use chrono::NaiveDateTime;
use nalgebra::DMatrix;

use crate::obs2d::SpectrumError;
use crate::obs2d::header::{CardValue, Header};

/// Timestamp format of `DATE-OBS` and of observation labels.
pub const DATE_OBS_FORMAT: &str = "%Y-%m-%dT%H:%M:%S%.3f";

#[derive(Debug, Clone)]
pub struct HarpsFile2D {
    pub path: PathBuf,
    pub header: Header,
    /// Primary image, one row per order.
    pub raw: DMatrix<f64>,
}

impl HarpsFile2D {
    pub fn new(path: impl Into<PathBuf>, header: Header, raw: DMatrix<f64>) -> Self {
        Self {
            path: path.into(),
            header,
            raw,
        }
    }

    pub fn header_card(&self, key: &str) -> Result<&CardValue, SpectrumError> {
        self.header.card(key)
    }

    pub fn object_name(&self) -> Result<&str, SpectrumError> {
        self.header.text("OBJECT")
    }

    pub fn date_obs(&self) -> Result<NaiveDateTime, SpectrumError> {
        parse_date_obs(self.header.text("DATE-OBS")?)
    }

    /// File name without the `.fits` extension, used as the observation name.
    pub fn observation_name(&self) -> String {
        file_stem(&self.path)
    }
}

impl std::fmt::Display for HarpsFile2D {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let object = self.object_name().unwrap_or("unknown");
        write!(f, "{object}, {}", self.observation_name())
    }
}

pub fn parse_date_obs(text: &str) -> Result<NaiveDateTime, SpectrumError> {
    NaiveDateTime::parse_from_str(text.trim(), "%Y-%m-%dT%H:%M:%S%.f")
        .map_err(|e| SpectrumError::BadDate(format!("{text}: {e}")))
}

fn file_stem(path: &Path) -> String {
    path.file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Datelike, Timelike};

    #[test]
    fn header_accessors_and_display() {
        let header = Header::new()
            .with("OBJECT", CardValue::Text("HD117618".to_string()))
            .with("DATE-OBS", CardValue::Text("2012-02-26T04:02:48.797".to_string()));
        let frame = HarpsFile2D::new(
            "/data/HARPS.2012-02-26T04:02:48.797_e2ds_A.fits",
            header,
            DMatrix::zeros(2, 2),
        );
        assert_eq!(frame.object_name().unwrap(), "HD117618");
        let date = frame.date_obs().unwrap();
        assert_eq!(date.year(), 2012);
        assert_eq!(date.nanosecond(), 797_000_000);
        assert_eq!(frame.to_string(), "HD117618, HARPS.2012-02-26T04:02:48.797_e2ds_A");
        assert_eq!(date.format(DATE_OBS_FORMAT).to_string(), "2012-02-26T04:02:48.797");
    }

    #[test]
    fn bad_dates_are_reported() {
        assert!(matches!(parse_date_obs("yesterday"), Err(SpectrumError::BadDate(_))));
    }
}
