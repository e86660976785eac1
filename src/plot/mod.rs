//! Plot rendering.

pub mod charts;

pub use charts::*;
