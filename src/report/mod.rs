//! Terminal reports for each command.

pub mod format;

pub use format::*;
