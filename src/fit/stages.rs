//! Two-stage fitting protocol over a batch of samples.
//!
//! 1. Initial guess: Odijk eWLC on points with `F < 30 pN`, initial-stage
//!    overrides applied.
//! 2. Final fit: tWLC on the full branch, values seeded from the sample's
//!    initial guess by name, then final-stage overrides applied.
//!
//! Samples are independent: each one is fitted on its own and failures are
//! recorded per sample instead of aborting the batch. A sample whose initial
//! guess failed is not attempted in the final stage.

use indicatif::{ProgressBar, ProgressDrawTarget, ProgressStyle};
use rayon::prelude::*;

use crate::config::ParameterTable;
use crate::domain::{FitFailure, FitStage, Sample, SampleFit};
use crate::fit::fitter::{apply_overrides, fit_sample, seed_values};
use crate::math::LmOptions;
use crate::models::ModelKind;

/// Forces at or above this value (pN) are excluded from the initial guess.
pub const INITIAL_FORCE_LIMIT: f64 = 30.0;

#[derive(Debug, Clone, Default)]
pub struct StageOptions {
    pub lm: LmOptions,
    /// Draw progress bars on stderr.
    pub progress: bool,
}

/// Result of running both stages over a batch.
#[derive(Debug, Clone, Default)]
pub struct BatchOutcome {
    /// Initial guesses of samples that passed stage 1, in input order.
    pub initial: Vec<SampleFit>,
    /// Final fits, in input order.
    pub fits: Vec<SampleFit>,
    pub failures: Vec<FitFailure>,
}

impl BatchOutcome {
    pub fn final_fit(&self, sample: &str) -> Option<&SampleFit> {
        self.fits.iter().find(|f| f.sample == sample)
    }
}

/// Keep the points with force strictly below `limit`.
pub fn low_force_subset(sample: &Sample, limit: f64) -> (Vec<f64>, Vec<f64>) {
    sample
        .force
        .iter()
        .zip(sample.distance.iter())
        .filter(|(f, _)| **f < limit)
        .map(|(&f, &d)| (f, d))
        .unzip()
}

/// Run the initial-guess stage over every sample.
pub fn fit_initial_guesses(
    samples: &[Sample],
    table: &ParameterTable,
    opts: &StageOptions,
) -> Vec<Result<SampleFit, FitFailure>> {
    let model = ModelKind::Odijk;
    let mut params = model.default_params();
    apply_overrides(&mut params, table.for_stage(FitStage::Initial));

    log::info!("Finding initial guesses with the {} model", model.display_name());
    let pb = progress_bar(samples.len(), "initial guess", opts.progress);

    let results = samples
        .par_iter()
        .map(|sample| {
            let (force, distance) = low_force_subset(sample, INITIAL_FORCE_LIMIT);
            let result = fit_sample(
                model,
                &sample.name,
                FitStage::Initial,
                &force,
                &distance,
                &params,
                &opts.lm,
            )
            .map_err(|e| failure(sample, FitStage::Initial, e.to_string()));
            pb.inc(1);
            result
        })
        .collect();

    pb.finish_and_clear();
    results
}

/// Run the final stage for every sample that has an initial guess.
///
/// `guesses` must be aligned with `samples`.
pub fn fit_final(
    samples: &[Sample],
    guesses: &[Result<SampleFit, FitFailure>],
    table: &ParameterTable,
    opts: &StageOptions,
) -> Vec<Result<SampleFit, FitFailure>> {
    let model = ModelKind::Twlc;
    let defaults = model.default_params();
    let overrides: Vec<_> = table.for_stage(FitStage::Final).collect();

    let todo = guesses.iter().filter(|g| g.is_ok()).count();
    log::info!("Fitting the {} model", model.display_name());
    let pb = progress_bar(todo, "final fit", opts.progress);

    let results = samples
        .par_iter()
        .zip(guesses.par_iter())
        .map(|(sample, guess)| {
            let guess = guess.as_ref().map_err(Clone::clone)?;

            let mut params = defaults.clone();
            seed_values(&mut params, guess);
            apply_overrides(&mut params, overrides.iter().copied());

            let result = fit_sample(
                model,
                &sample.name,
                FitStage::Final,
                &sample.force,
                &sample.distance,
                &params,
                &opts.lm,
            )
            .map_err(|e| failure(sample, FitStage::Final, e.to_string()));
            pb.inc(1);
            result
        })
        .collect();

    pb.finish_and_clear();
    results
}

/// Run both stages and split results into successes and failures.
pub fn run_two_stage(samples: &[Sample], table: &ParameterTable, opts: &StageOptions) -> BatchOutcome {
    let guesses = fit_initial_guesses(samples, table, opts);
    let finals = fit_final(samples, &guesses, table, opts);

    let mut outcome = BatchOutcome::default();
    for guess in &guesses {
        match guess {
            Ok(fit) => outcome.initial.push(fit.clone()),
            Err(f) => outcome.failures.push(f.clone()),
        }
    }
    for (guess, result) in guesses.iter().zip(finals) {
        match result {
            Ok(fit) => outcome.fits.push(fit),
            // Initial-stage failures were already recorded above.
            Err(f) if guess.is_ok() => outcome.failures.push(f),
            Err(_) => {}
        }
    }

    for f in &outcome.failures {
        log::warn!("{}: {} stage failed: {}", f.sample, f.stage.as_str(), f.reason);
    }
    if !outcome.failures.is_empty() {
        log::warn!(
            "{} of {} samples failed to fit: {}",
            outcome.failures.len(),
            samples.len(),
            outcome
                .failures
                .iter()
                .map(|f| f.sample.as_str())
                .collect::<Vec<_>>()
                .join(", ")
        );
    }

    outcome
}

fn failure(sample: &Sample, stage: FitStage, reason: String) -> FitFailure {
    FitFailure {
        sample: sample.name.clone(),
        stage,
        reason,
    }
}

fn progress_bar(len: usize, label: &'static str, visible: bool) -> ProgressBar {
    if !visible {
        return ProgressBar::hidden();
    }
    let pb = ProgressBar::new(len as u64);
    pb.set_draw_target(ProgressDrawTarget::stderr());
    let style = ProgressStyle::with_template("{msg:>13} [{bar:40.cyan/blue}] {pos}/{len} ({eta})")
        .unwrap_or_else(|_| ProgressStyle::default_bar())
        .progress_chars("=> ");
    pb.set_style(style);
    pb.set_message(label);
    pb
}
