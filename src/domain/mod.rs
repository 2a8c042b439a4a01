//! Domain types used throughout the pipeline.
//!
//! This module defines:
//!
//! - input enums (`CurveMode`, `FitStage`, `ParamAttr`)
//! - raw and segmented curves (`Curve`, `Sample`)
//! - fit outputs (`SampleFit`, `FitParam`, `FitFailure`)

pub mod types;

pub use types::*;
