//! Input/output helpers.
//!
//! - CSV ingest + validation (`ingest`)
//! - per-observation fit tables (`fit_table`)
//! - result exports (CSV) (`export`)
//! - JSON read/write (`json`)

pub mod export;
pub mod fit_table;
pub mod ingest;
pub mod json;

pub use export::*;
pub use fit_table::*;
pub use ingest::*;
pub use json::*;
