//! Models of transition offsets as functions of stellar parameters.
//!
//! Models are implemented as small, pure functions so that fitting code can
//! stay generic.

pub mod model;
pub mod params;

pub use model::*;
pub use params::ModelParams;
