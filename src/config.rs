//! Runtime settings: data, output and blaze directories.
//!
//! Read from the environment (and a `.env` file if present). CLI flags
//! override these where both exist.

use std::path::{Path, PathBuf};

#[derive(Debug, Clone, PartialEq)]
pub struct Settings {
    pub data_dir: PathBuf,
    pub output_dir: PathBuf,
    pub blaze_dir: PathBuf,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("data"),
            output_dir: PathBuf::from("output"),
            blaze_dir: PathBuf::from("data").join("blaze"),
        }
    }
}

impl Settings {
    pub fn from_env() -> Self {
        dotenvy::dotenv().ok();
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build settings from a variable lookup; missing or empty values fall
    /// back to the defaults.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let defaults = Self::default();
        let path = |key: &str, default: PathBuf| {
            lookup(key)
                .filter(|v| !v.trim().is_empty())
                .map(PathBuf::from)
                .unwrap_or(default)
        };
        Self {
            data_dir: path("VARCON_DATA_DIR", defaults.data_dir),
            output_dir: path("VARCON_OUTPUT_DIR", defaults.output_dir),
            blaze_dir: path("VARCON_BLAZE_DIR", defaults.blaze_dir),
        }
    }

    /// Selected transitions (JSON).
    pub fn transitions_file(&self) -> PathBuf {
        self.data_dir.join("transitions.json")
    }

    /// Selected pairs (JSON).
    pub fn pairs_file(&self) -> PathBuf {
        self.data_dir.join("pairs.json")
    }

    pub fn databases_dir(&self) -> PathBuf {
        self.output_dir.join("databases")
    }

    pub fn pair_separations_dir(&self) -> PathBuf {
        self.output_dir.join("pair_separation_files")
    }

    pub fn plots_dir(&self) -> PathBuf {
        self.output_dir.join("plots")
    }
}

/// `flag` if given, otherwise `fallback`.
pub fn or_setting(flag: Option<&Path>, fallback: PathBuf) -> PathBuf {
    flag.map(Path::to_path_buf).unwrap_or(fallback)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn defaults_without_variables() {
        let settings = Settings::from_lookup(|_| None);
        assert_eq!(settings, Settings::default());
        assert_eq!(settings.transitions_file(), PathBuf::from("data/transitions.json"));
        assert_eq!(settings.databases_dir(), PathBuf::from("output/databases"));
    }

    #[test]
    fn variables_override_defaults() {
        let vars: HashMap<&str, &str> = [("VARCON_OUTPUT_DIR", "/tmp/out"), ("VARCON_DATA_DIR", " ")].into();
        let settings = Settings::from_lookup(|k| vars.get(k).map(|v| v.to_string()));
        assert_eq!(settings.output_dir, PathBuf::from("/tmp/out"));
        assert_eq!(settings.data_dir, PathBuf::from("data"));
        assert_eq!(settings.pair_separations_dir(), PathBuf::from("/tmp/out/pair_separation_files"));
        assert_eq!(or_setting(Some(Path::new("x")), settings.plots_dir()), PathBuf::from("x"));
    }
}
