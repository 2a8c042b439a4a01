//! The analysis pipeline behind `fdfit run`.
//!
//! load -> segment -> raw dumps -> two-stage fit -> tables -> plots -> manifest
//!
//! Every artifact is written before the all-samples-failed check so a failed
//! batch can still be inspected.

use std::path::PathBuf;

use crate::config::RunConfig;
use crate::domain::Sample;
use crate::error::AppError;
use crate::fit::{BatchOutcome, StageOptions, run_two_stage};
use crate::io::{
    FAILED_FILE, MANIFEST_FILE, RunCounts, RunManifest, STDERR_FILE, VALUES_FILE, load_curves, segment_curves,
    write_all_force_distance, write_failures, write_manifest, write_stderr_summary, write_values_summary,
};
use crate::plot::{FIT_PLOT, PARAM_PLOT, RAW_PLOT, render_fits, render_param_summary, render_raw, summary_fits};

/// All computed outputs of a single run.
#[derive(Debug, Clone)]
pub struct RunOutput {
    pub n_curves: usize,
    pub samples: Vec<Sample>,
    pub outcome: BatchOutcome,
    /// Every file written, in write order.
    pub artifacts: Vec<PathBuf>,
}

/// Execute the full pipeline for `config`.
///
/// Returns an exit-code-4 error when samples exist but none could be fitted.
pub fn run_pipeline(config: &RunConfig) -> Result<RunOutput, AppError> {
    let out_dir = &config.output_dir;
    std::fs::create_dir_all(out_dir).map_err(|e| {
        AppError::config(format!("Failed to create output directory '{}': {e}", out_dir.display()))
    })?;

    let curves = load_curves(&config.input_dir)?;
    let samples = segment_curves(&curves, config.mode);
    log::info!(
        "Loaded {} curve(s) -> {} sample(s) ({} mode)",
        curves.len(),
        samples.len(),
        config.mode.as_str()
    );

    let mut artifacts = write_all_force_distance(out_dir, &samples)?;

    let opts = StageOptions {
        progress: config.progress,
        ..StageOptions::default()
    };
    let outcome = run_two_stage(&samples, &config.params, &opts);

    let values = out_dir.join(VALUES_FILE);
    write_values_summary(&values, &outcome.fits)?;
    artifacts.push(values);
    let stderr = out_dir.join(STDERR_FILE);
    write_stderr_summary(&stderr, &outcome.fits)?;
    artifacts.push(stderr);
    if !outcome.failures.is_empty() {
        let failed = out_dir.join(FAILED_FILE);
        write_failures(&failed, &outcome.failures)?;
        artifacts.push(failed);
    }

    if config.plots {
        let raw = out_dir.join(RAW_PLOT);
        render_raw(&raw, &samples, config.log_scale)?;
        artifacts.push(raw);

        let fit = out_dir.join(FIT_PLOT);
        render_fits(&fit, &samples, &outcome.fits, config.log_scale)?;
        artifacts.push(fit);

        let summary = out_dir.join(PARAM_PLOT);
        render_param_summary(&summary, &summary_fits(&outcome.fits, &samples, config.mode))?;
        artifacts.push(summary);
    }

    let counts = RunCounts {
        curves: curves.len(),
        samples: samples.len(),
        fitted: outcome.fits.len(),
        failed: outcome.failures.len(),
    };
    let manifest = out_dir.join(MANIFEST_FILE);
    write_manifest(&manifest, &RunManifest::new(config, counts, &outcome.fits, &outcome.failures))?;
    artifacts.push(manifest);

    for path in &artifacts {
        log::info!("wrote {}", path.display());
    }
    log::info!("Results written to {}", out_dir.display());

    if outcome.fits.is_empty() && !samples.is_empty() {
        return Err(AppError::fit(format!(
            "All {} sample(s) failed to fit; see {}.",
            samples.len(),
            out_dir.join(FAILED_FILE).display()
        )));
    }

    Ok(RunOutput {
        n_curves: curves.len(),
        samples,
        outcome,
        artifacts,
    })
}
