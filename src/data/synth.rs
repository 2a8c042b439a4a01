//! Synthetic pulling cycles generated from the tWLC model.
//!
//! Each cycle ramps the force linearly from `f_min` to `f_max` (extension) and
//! back down (retraction). Distances come from the model; Gaussian noise is
//! added to the recorded force only, as with a force-clamped trap. Per-curve
//! Lp, Lc and St are drawn around the base parameters so a batch is not a set of
//! identical copies.

use std::path::Path;

use rand::prelude::*;
use rand::rngs::StdRng;
use rand_distr::Normal;

use crate::domain::Curve;
use crate::error::AppError;
use crate::models::{Chain, ModelKind};

/// Reference tWLC parameters in model order.
pub const REFERENCE_TWLC: [f64; 10] = [0.0, 50.0, 2.85, 1500.0, 440.0, -637.0, 17.0, 30.6, 4.11, 0.0];

#[derive(Debug, Clone)]
pub struct SynthConfig {
    pub curves: usize,
    /// Points per branch.
    pub points: usize,
    /// Force noise standard deviation (pN).
    pub noise: f64,
    pub seed: u64,
    pub f_min: f64,
    pub f_max: f64,
    /// Relative standard deviation of per-curve Lp/Lc/St.
    pub spread: f64,
    /// Base parameters (tWLC model order).
    pub params: [f64; 10],
}

impl Default for SynthConfig {
    fn default() -> Self {
        Self {
            curves: 3,
            points: 200,
            noise: 0.1,
            seed: 42,
            f_min: 0.5,
            f_max: 60.0,
            spread: 0.02,
            params: REFERENCE_TWLC,
        }
    }
}

/// A generated cycle and the parameters it was drawn from.
#[derive(Debug, Clone)]
pub struct SynthCurve {
    pub curve: Curve,
    pub truth: Vec<f64>,
}

pub fn generate_cycles(config: &SynthConfig) -> Result<Vec<SynthCurve>, AppError> {
    if config.curves == 0 {
        return Err(AppError::config("Curve count must be > 0."));
    }
    if config.points < 2 {
        return Err(AppError::config("Need at least 2 points per branch."));
    }
    if !(config.f_min.is_finite() && config.f_max.is_finite() && config.f_min > 0.0 && config.f_max > config.f_min) {
        return Err(AppError::config("Invalid force range for simulation."));
    }
    if !(config.noise.is_finite() && config.noise >= 0.0 && config.spread.is_finite() && config.spread >= 0.0) {
        return Err(AppError::config("Noise and spread must be finite and >= 0."));
    }

    let mut rng = StdRng::seed_from_u64(config.seed);
    let noise = Normal::new(0.0, config.noise)
        .map_err(|e| AppError::config(format!("Noise distribution error: {e}")))?;
    let jitter = Normal::new(1.0, config.spread)
        .map_err(|e| AppError::config(format!("Parameter distribution error: {e}")))?;

    let n = config.points;
    let ramp: Vec<f64> = (0..n)
        .map(|i| config.f_min + (config.f_max - config.f_min) * i as f64 / (n - 1) as f64)
        .collect();

    let mut out = Vec::with_capacity(config.curves);
    for k in 0..config.curves {
        let mut truth = config.params.to_vec();
        // Lp, Lc, St
        for idx in [1, 2, 3] {
            truth[idx] *= rng.sample(jitter).max(0.5);
        }
        let chain = Chain::from_values(ModelKind::Twlc, &truth);

        let forces = ramp.iter().chain(ramp.iter().rev());
        let mut curve = Curve {
            key: format!("curve_{}", k + 1),
            force: Vec::with_capacity(2 * n),
            distance: Vec::with_capacity(2 * n),
        };
        for &f in forces {
            let d = chain.distance(f) + chain.d_offset;
            if !d.is_finite() {
                return Err(AppError::config(format!(
                    "Model has no extension at {f} pN; lower --f-max."
                )));
            }
            curve.distance.push(d);
            curve.force.push(f + chain.f_offset + rng.sample(noise));
        }

        log::debug!(
            "{}: Lp={:.3} Lc={:.4} St={:.1}",
            curve.key,
            truth[1],
            truth[2],
            truth[3]
        );
        out.push(SynthCurve { curve, truth });
    }
    Ok(out)
}

/// Write curves as one long-format CSV (`curve,force,distance`).
pub fn write_synthetic_csv(path: &Path, curves: &[SynthCurve]) -> Result<(), AppError> {
    let mut writer = csv::Writer::from_path(path)
        .map_err(|e| AppError::config(format!("Failed to create '{}': {e}", path.display())))?;
    let write_err = |e: csv::Error| AppError::config(format!("Failed to write '{}': {e}", path.display()));

    writer.write_record(["curve", "force", "distance"]).map_err(write_err)?;
    for s in curves {
        let c = &s.curve;
        for (f, d) in c.force.iter().zip(&c.distance) {
            writer
                .write_record([c.key.clone(), f.to_string(), d.to_string()])
                .map_err(write_err)?;
        }
    }
    writer
        .flush()
        .map_err(|e| AppError::config(format!("Failed to write '{}': {e}", path.display())))?;
    Ok(())
}
