//! Per-star aggregation of transition fits.
//!
//! - reading the fit tables of every observation of a star (`load`)
//! - the [`Star`] matrices and their lookups (`aggregate`)
//! - JSON persistence (`record`)

use std::path::PathBuf;

use thiserror::Error;

pub mod aggregate;
pub mod load;
pub mod record;

pub use load::{ObservationFits, pair_separation, read_observations};
pub use aggregate::Star;

#[derive(Debug, Error)]
pub enum StarError {
    #[error("Star '{0}' has no loaded observations.")]
    NotLoaded(String),
    #[error("Unknown transition label: {0}")]
    UnknownTransition(String),
    #[error("Unknown pair label: {0}")]
    UnknownPair(String),
    #[error("Unknown observation: {0}")]
    UnknownObservation(String),
    #[error("Star '{0}' has no model-corrected offsets; apply a model first.")]
    ModelNotApplied(String),
    #[error("Star directory does not exist: {}", .0.display())]
    MissingDirectory(PathBuf),
    #[error("{0}")]
    Io(String),
}
