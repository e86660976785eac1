//! `varcon` library crate.
//!
//! Measures velocity separations between pairs of stellar absorption lines in
//! HARPS spectra and looks for systematic trends across stars. The binaries
//! (`varcon`, and `varcon-e2ds` with the `fits` feature) are thin wrappers
//! around this library so that:
//!
//! - core logic is testable without spawning processes
//! - the FITS-dependent calibration stays optional

pub mod analysis;
pub mod app;
pub mod cli;
pub mod config;
pub mod domain;
pub mod error;
pub mod fit;
pub mod io;
pub mod lines;
pub mod math;
pub mod models;
pub mod obs2d;
pub mod plot;
pub mod report;
pub mod spectral;
pub mod star;
pub mod units;
