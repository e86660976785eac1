//! Domain types used throughout the pipeline.
//!
//! This module defines:
//!
//! - chemical elements and ionization states (`element`)
//! - atomic transitions and transition pairs (`transition`, `pair`)
//! - HARPS instrument constants and order numbering (`harps`)
//! - shared enums and records (`types`)

use thiserror::Error;

pub mod element;
pub mod harps;
pub mod pair;
pub mod transition;
pub mod types;

pub use element::Element;
pub use pair::{TransitionPair, format_pair_label, parse_pair_label};
pub use transition::Transition;
pub use types::*;

/// Invalid domain values (labels, elements, orders, ...).
#[derive(Debug, Clone, PartialEq, Error)]
pub enum DomainError {
    #[error("Unknown element: {0}")]
    UnknownElement(String),
    #[error("Invalid ionization state: {0}")]
    InvalidIonization(String),
    #[error("Invalid wavelength: {0}")]
    InvalidWavelength(f64),
    #[error("Both transitions of a pair have the same wavelength ({0}).")]
    SameWavelengths(String),
    #[error("Blendedness is not known for both transitions of {0}.")]
    UnknownBlendedness(String),
    #[error("Cannot parse label: {0}")]
    BadLabel(String),
    #[error("Unknown HARPS order: {0}")]
    UnknownOrder(String),
}
