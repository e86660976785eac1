//! JSON files: transition and pair lists, stellar databases, model parameters.

use std::fs::File;
use std::io::{BufReader, BufWriter};
use std::path::Path;

use serde::Serialize;
use serde::de::DeserializeOwned;

use crate::domain::{Transition, TransitionPair};
use crate::error::AppError;

/// Read any JSON document; `what` names it in error messages.
pub fn read_json<T: DeserializeOwned>(path: &Path, what: &str) -> Result<T, AppError> {
    let file = File::open(path)
        .map_err(|e| AppError::new(2, format!("Failed to open {what} '{}': {e}", path.display())))?;
    serde_json::from_reader(BufReader::new(file))
        .map_err(|e| AppError::new(2, format!("Failed to parse {what} '{}': {e}", path.display())))
}

/// Write any value as pretty-printed JSON, creating parent directories.
pub fn write_json<T: Serialize>(path: &Path, value: &T, what: &str) -> Result<(), AppError> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)
            .map_err(|e| AppError::new(2, format!("Failed to create directory '{}': {e}", parent.display())))?;
    }
    let file = File::create(path)
        .map_err(|e| AppError::new(2, format!("Failed to create {what} '{}': {e}", path.display())))?;
    serde_json::to_writer_pretty(BufWriter::new(file), value)
        .map_err(|e| AppError::new(2, format!("Failed to write {what} '{}': {e}", path.display())))
}

pub fn read_transitions(path: &Path) -> Result<Vec<Transition>, AppError> {
    read_json(path, "transition list")
}

pub fn read_pairs(path: &Path) -> Result<Vec<TransitionPair>, AppError> {
    read_json(path, "pair list")
}
