//! Low-level fitting routine for a single sample and model.
//!
//! Given:
//! - measured forces `F_i` and distances `d_i`
//! - a model kind and its parameter list (values, bounds, fixed flags)
//!
//! we run bounded Levenberg-Marquardt over the free parameters on the
//! residuals `F_model(d_i) - F_i` and return the updated parameter list with
//! standard errors.

use crate::config::ParamOverride;
use crate::domain::{FitParam, FitQuality, FitStage, ParamAttr, SampleFit};
use crate::math::{LmError, LmOptions, levenberg_marquardt};
use crate::models::{Chain, ModelKind};

/// Why a single fit could not produce parameters.
#[derive(Debug, Clone, PartialEq)]
pub enum FitError {
    /// Not enough points for the number of free parameters.
    InsufficientData { n: usize, needed: usize },
    /// Force/distance arrays contain NaN or infinity.
    NonFiniteData,
    Solver(LmError),
}

impl std::fmt::Display for FitError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FitError::InsufficientData { n, needed } => {
                write!(f, "insufficient data: {n} points, need at least {needed}")
            }
            FitError::NonFiniteData => write!(f, "data contains non-finite values"),
            FitError::Solver(e) => write!(f, "{e}"),
        }
    }
}

impl std::error::Error for FitError {}

impl From<LmError> for FitError {
    fn from(e: LmError) -> Self {
        FitError::Solver(e)
    }
}

/// Apply override rows to a parameter list, matching by name.
///
/// Rows naming parameters that are not in `params` are ignored here; the
/// parameter table is validated against the stage model before fitting.
pub fn apply_overrides<'a>(params: &mut [FitParam], overrides: impl IntoIterator<Item = &'a ParamOverride>) {
    for row in overrides {
        let Some(p) = params.iter_mut().find(|p| p.name == row.name) else {
            continue;
        };
        match row.attr {
            ParamAttr::Value => p.value = row.value,
            ParamAttr::LowerBound => p.lower_bound = row.value,
            ParamAttr::UpperBound => p.upper_bound = row.value,
            ParamAttr::Fixed => p.fixed = row.value != 0.0,
        }
    }
}

/// Copy values from an earlier fit into `params` for every shared name.
///
/// Bounds and fixed flags are left alone.
pub fn seed_values(params: &mut [FitParam], guess: &SampleFit) {
    for p in params.iter_mut() {
        if let Some(v) = guess.value(&p.name) {
            p.value = v;
        }
    }
}

/// Fit `model` to one sample.
pub fn fit_sample(
    model: ModelKind,
    sample: &str,
    stage: FitStage,
    force: &[f64],
    distance: &[f64],
    params: &[FitParam],
    opts: &LmOptions,
) -> Result<SampleFit, FitError> {
    debug_assert_eq!(force.len(), distance.len());

    let free: Vec<usize> = params
        .iter()
        .enumerate()
        .filter(|(_, p)| !p.fixed)
        .map(|(i, _)| i)
        .collect();

    let n = force.len().min(distance.len());
    let needed = free.len() + 1;
    if n < needed {
        return Err(FitError::InsufficientData { n, needed });
    }
    if force.iter().chain(distance.iter()).any(|v| !v.is_finite()) {
        return Err(FitError::NonFiniteData);
    }

    let base: Vec<f64> = params.iter().map(|p| p.value).collect();
    let x0: Vec<f64> = free.iter().map(|&i| base[i]).collect();
    let lower: Vec<f64> = free.iter().map(|&i| params[i].lower_bound).collect();
    let upper: Vec<f64> = free.iter().map(|&i| params[i].upper_bound).collect();

    let residuals = |x: &[f64]| -> Vec<f64> {
        let mut values = base.clone();
        for (k, &i) in free.iter().enumerate() {
            values[i] = x[k];
        }
        let chain = Chain::from_values(model, &values);
        distance
            .iter()
            .zip(force.iter())
            .map(|(&d, &f)| chain.observed_force(d) - f)
            .collect()
    };

    let solution = levenberg_marquardt(residuals, &x0, &lower, &upper, opts)?;

    let mut fitted = params.to_vec();
    for p in fitted.iter_mut() {
        p.stderr = f64::NAN;
    }
    for (k, &i) in free.iter().enumerate() {
        fitted[i].value = solution.x[k];
        fitted[i].stderr = solution.stderr[k];
    }

    let rms = (solution.ssr / solution.n_residuals as f64).sqrt();
    log::debug!(
        "{sample}: {} converged after {} iterations (rms {rms:.4e} pN)",
        model.display_name(),
        solution.iterations,
    );

    Ok(SampleFit {
        sample: sample.to_string(),
        stage,
        params: fitted,
        quality: FitQuality {
            n_points: n,
            n_free: free.len(),
            iterations: solution.iterations,
            rms,
        },
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{D_OFFSET, F_OFFSET, LC, LP, ST, predict_forces};

    fn synthetic(model: ModelKind, values: &[f64], forces: &[f64]) -> (Vec<f64>, Vec<f64>) {
        let chain = Chain::from_values(model, values);
        let distance: Vec<f64> = forces.iter().map(|&f| chain.distance(f) + chain.d_offset).collect();
        let force: Vec<f64> = forces.iter().map(|&f| f + chain.f_offset).collect();
        (force, distance)
    }

    const ODIJK_TRUTH: [f64; 6] = [0.02, 45.0, 2.9, 1300.0, 4.11, 0.03];

    fn odijk_data() -> (Vec<f64>, Vec<f64>) {
        let forces: Vec<f64> = (1..=40).map(|i| 0.7 * i as f64).collect();
        synthetic(ModelKind::Odijk, &ODIJK_TRUTH, &forces)
    }

    #[test]
    fn odijk_fit_recovers_known_parameters() {
        let (force, distance) = odijk_data();

        let mut params = ModelKind::Odijk.default_params();
        params[2].value = 3.0; // Lc start near the data
        // Lc and d_offset only enter as Lc + d_offset at this order.
        params[0].value = ODIJK_TRUTH[0];
        params[0].fixed = true;

        let fit = fit_sample(
            ModelKind::Odijk,
            "s1",
            FitStage::Initial,
            &force,
            &distance,
            &params,
            &LmOptions::default(),
        )
        .unwrap();

        assert!((fit.value(LP).unwrap() - 45.0).abs() < 0.05, "Lp {}", fit.value(LP).unwrap());
        assert!((fit.value(LC).unwrap() - 2.9).abs() < 1e-4, "Lc {}", fit.value(LC).unwrap());
        assert!((fit.value(ST).unwrap() - 1300.0).abs() < 2.0, "St {}", fit.value(ST).unwrap());
        assert!((fit.value(F_OFFSET).unwrap() - 0.03).abs() < 1e-6);
        assert!(fit.param("kT").unwrap().stderr.is_nan());
        assert!(fit.param(D_OFFSET).unwrap().stderr.is_nan());
        assert_eq!(fit.quality.n_free, 4);
        assert!(fit.quality.rms < 1e-6);

        let predicted = predict_forces(ModelKind::Odijk, &fit.params.iter().map(|p| p.value).collect::<Vec<_>>(), &distance);
        for (p, f) in predicted.iter().zip(&force) {
            assert!((p - f).abs() < 1e-4);
        }
    }

    #[test]
    fn free_distance_offset_still_pins_the_identifiable_combinations() {
        let (force, distance) = odijk_data();
        let mut params = ModelKind::Odijk.default_params();
        params[2].value = 3.0;

        let fit = fit_sample(
            ModelKind::Odijk,
            "s1",
            FitStage::Initial,
            &force,
            &distance,
            &params,
            &LmOptions::default(),
        )
        .unwrap();
        assert!(fit.quality.rms < 1e-6, "rms {}", fit.quality.rms);

        let v = |name: &str| fit.value(name).unwrap();
        let [d0, lp, lc, st, _, _] = ODIJK_TRUTH;
        // Contour end, entropic amplitude and stretch compliance.
        let rel = |a: f64, b: f64| (a - b).abs() / b.abs();
        assert!(rel(v(LC) + v(D_OFFSET), lc + d0) < 1e-6);
        assert!(rel(v(LC) / v(LP).sqrt(), lc / lp.sqrt()) < 1e-5);
        assert!(rel(v(LC) / v(ST), lc / st) < 1e-5);
    }

    #[test]
    fn empty_or_short_data_is_insufficient() {
        let params = ModelKind::Odijk.default_params();
        let err = fit_sample(
            ModelKind::Odijk,
            "s",
            FitStage::Initial,
            &[],
            &[],
            &params,
            &LmOptions::default(),
        )
        .unwrap_err();
        assert_eq!(err, FitError::InsufficientData { n: 0, needed: 6 });
        assert!(err.to_string().contains("insufficient data"));

        let err = fit_sample(
            ModelKind::Odijk,
            "s",
            FitStage::Initial,
            &[1.0, 2.0, 3.0],
            &[2.0, 2.5, 2.7],
            &params,
            &LmOptions::default(),
        )
        .unwrap_err();
        assert!(matches!(err, FitError::InsufficientData { n: 3, .. }));
    }

    #[test]
    fn overrides_set_every_attribute() {
        let mut params = ModelKind::Twlc.default_params();
        let rows = vec![
            ParamOverride {
                name: "DNA/Lc".into(),
                value: 2.8,
                attr: ParamAttr::Value,
                stage: FitStage::Final,
                line: 1,
            },
            ParamOverride {
                name: "DNA/St".into(),
                value: 800.0,
                attr: ParamAttr::LowerBound,
                stage: FitStage::Final,
                line: 2,
            },
            ParamOverride {
                name: "DNA/Lp".into(),
                value: 70.0,
                attr: ParamAttr::UpperBound,
                stage: FitStage::Final,
                line: 3,
            },
            ParamOverride {
                name: "DNA/Fc".into(),
                value: 1.0,
                attr: ParamAttr::Fixed,
                stage: FitStage::Final,
                line: 4,
            },
            ParamOverride {
                name: "kT".into(),
                value: 0.0,
                attr: ParamAttr::Fixed,
                stage: FitStage::Final,
                line: 5,
            },
        ];
        apply_overrides(&mut params, &rows);

        let get = |n: &str| params.iter().find(|p| p.name == n).unwrap().clone();
        assert_eq!(get("DNA/Lc").value, 2.8);
        assert_eq!(get("DNA/St").lower_bound, 800.0);
        assert_eq!(get("DNA/Lp").upper_bound, 70.0);
        assert!(get("DNA/Fc").fixed);
        assert!(!get("kT").fixed);
    }

    #[test]
    fn seeding_copies_shared_values_only() {
        let guess = SampleFit {
            sample: "s".into(),
            stage: FitStage::Initial,
            params: {
                let mut p = ModelKind::Odijk.default_params();
                p[1].value = 42.0; // Lp
                p[1].upper_bound = 60.0;
                p
            },
            quality: FitQuality {
                n_points: 10,
                n_free: 5,
                iterations: 3,
                rms: 0.0,
            },
        };
        let mut params = ModelKind::Twlc.default_params();
        seed_values(&mut params, &guess);

        let lp = params.iter().find(|p| p.name == LP).unwrap();
        assert_eq!(lp.value, 42.0);
        assert_eq!(lp.upper_bound, 100.0);
        let c = params.iter().find(|p| p.name == "DNA/C").unwrap();
        assert_eq!(c.value, 440.0);
    }
}
