//! JSON run manifest.
//!
//! `run.json` records what a run did so a results directory can be traced back
//! to its inputs: the resolved configuration, sample counts, every final fit
//! (values, standard errors, convergence) and every failure.
//!
//! The manifest is written for humans and scripts; nothing in this crate reads
//! it back except tests.

use std::fs::File;
use std::path::Path;

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::config::RunConfig;
use crate::domain::{FitFailure, SampleFit};
use crate::error::AppError;

pub const MANIFEST_FILE: &str = "run.json";

#[derive(Debug, Clone, Serialize)]
pub struct RunCounts {
    pub curves: usize,
    pub samples: usize,
    pub fitted: usize,
    pub failed: usize,
}

#[derive(Debug, Clone, Serialize)]
pub struct RunManifest<'a> {
    pub tool: &'static str,
    pub version: &'static str,
    pub timestamp: DateTime<Utc>,
    pub config: &'a RunConfig,
    pub counts: RunCounts,
    pub fits: &'a [SampleFit],
    pub failures: &'a [FitFailure],
}

impl<'a> RunManifest<'a> {
    pub fn new(config: &'a RunConfig, counts: RunCounts, fits: &'a [SampleFit], failures: &'a [FitFailure]) -> Self {
        Self {
            tool: "fdfit",
            version: env!("CARGO_PKG_VERSION"),
            timestamp: Utc::now(),
            config,
            counts,
            fits,
            failures,
        }
    }
}

/// Write the manifest as pretty JSON.
pub fn write_manifest(path: &Path, manifest: &RunManifest<'_>) -> Result<(), AppError> {
    let file = File::create(path)
        .map_err(|e| AppError::config(format!("Failed to create run manifest '{}': {e}", path.display())))?;

    serde_json::to_writer_pretty(file, manifest)
        .map_err(|e| AppError::config(format!("Failed to write run manifest: {e}")))?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ParameterTable;
    use crate::domain::{CurveMode, FitStage};

    #[test]
    fn manifest_is_valid_json_with_rfc3339_timestamp() {
        let dir = tempfile::tempdir().unwrap();
        let config = RunConfig {
            input_dir: "in".into(),
            output_dir: dir.path().to_path_buf(),
            mode: CurveMode::Both,
            log_scale: false,
            plots: true,
            progress: false,
            params: ParameterTable::default(),
        };
        let failures = vec![FitFailure {
            sample: "a_retraction".into(),
            stage: FitStage::Initial,
            reason: "insufficient data: 2 points, need at least 6".into(),
        }];
        let counts = RunCounts {
            curves: 1,
            samples: 2,
            fitted: 0,
            failed: 1,
        };
        let path = dir.path().join(MANIFEST_FILE);
        write_manifest(&path, &RunManifest::new(&config, counts, &[], &failures)).unwrap();

        let text = std::fs::read_to_string(&path).unwrap();
        let json: serde_json::Value = serde_json::from_str(&text).unwrap();
        assert_eq!(json["tool"], "fdfit");
        assert_eq!(json["config"]["mode"], "both");
        assert_eq!(json["counts"]["failed"], 1);
        assert_eq!(json["failures"][0]["stage"], "initial");

        let ts = json["timestamp"].as_str().unwrap();
        assert!(DateTime::parse_from_rfc3339(ts).is_ok(), "{ts}");
    }
}
