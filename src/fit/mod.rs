//! Curve fitting orchestration.
//!
//! Responsibilities:
//!
//! - fit one model to one sample with bounded LM (`fitter`)
//! - apply parameter overrides and seed values between stages
//! - run the two-stage protocol over a batch with per-sample failure isolation (`stages`)

pub mod fitter;
pub mod stages;

pub use fitter::*;
pub use stages::*;
