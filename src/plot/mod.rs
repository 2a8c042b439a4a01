//! SVG plots of raw curves, fits and fitted parameters.
//!
//! Data preparation (log transform, fitted grids, sample selection) is kept
//! separate from drawing so it can be tested without inspecting SVG output.

pub mod svg;

pub use svg::*;
