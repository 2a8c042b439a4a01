//! Input/output helpers.
//!
//! - curve container ingest (`ingest`, Bluelake `.h5` in `h5`)
//! - extension/retraction segmentation (`segment`)
//! - result tables and raw dumps (`export`)
//! - JSON run manifest (`manifest`)

pub mod export;
#[cfg(feature = "hdf5")]
pub mod h5;
pub mod ingest;
pub mod manifest;
pub mod segment;

pub use export::*;
pub use ingest::*;
pub use manifest::*;
pub use segment::*;
