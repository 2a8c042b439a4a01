//! Worm-like-chain force models for DNA.
//!
//! Both models are written as distance-of-force relations and turned into
//! force-of-distance models by a root solve in `ln F`:
//!
//! - Odijk extensible WLC:
//!   `d(F) = Lc (1 - ½ √(kT / (F Lp)) + F / St)`
//! - twistable WLC:
//!   `d(F) = Lc (1 - ½ √(kT / (F Lp)) + C F / (St C - g(F)²))`,
//!   `g(F) = g0 + g1 Fc` below the critical force `Fc`, `g0 + g1 F` above it.
//!
//! The composite models used for fitting add an independent distance offset
//! and a force offset: `F_obs(d) = F(d - d_offset) + f_offset`.
//!
//! Units: distance and `Lc` in micron, force and `St` in pN, `Lp` in nm,
//! `kT` in pN·nm, `C` in pN·nm², `g0` in pN·nm, `g1` in nm, `Fc` in pN.

use serde::{Deserialize, Serialize};

use crate::domain::{FitParam, FitStage};
use crate::math::solve_increasing;

/// Force bracket for the root solve (pN).
const F_MIN: f64 = 1e-9;
const F_MAX: f64 = 1e4;
/// Tolerance in `ln F`.
const LN_F_TOL: f64 = 1e-14;
const ROOT_MAX_ITER: usize = 200;

/// Static description of one model parameter.
#[derive(Debug, Clone, Copy)]
pub struct ParamSpec {
    pub name: &'static str,
    pub value: f64,
    pub lower: f64,
    pub upper: f64,
    pub fixed: bool,
    pub unit: &'static str,
}

const fn spec(name: &'static str, value: f64, lower: f64, upper: f64, fixed: bool, unit: &'static str) -> ParamSpec {
    ParamSpec {
        name,
        value,
        lower,
        upper,
        fixed,
        unit,
    }
}

pub const D_OFFSET: &str = "DNA/d_offset";
pub const LP: &str = "DNA/Lp";
pub const LC: &str = "DNA/Lc";
pub const ST: &str = "DNA/St";
pub const C: &str = "DNA/C";
pub const G0: &str = "DNA/g0";
pub const G1: &str = "DNA/g1";
pub const FC: &str = "DNA/Fc";
pub const KT: &str = "kT";
pub const F_OFFSET: &str = "DNA/f_offset";

const ODIJK_PARAMS: [ParamSpec; 6] = [
    spec(D_OFFSET, 0.01, -0.1, 0.1, false, "micron"),
    spec(LP, 40.0, 0.0, 100.0, false, "nm"),
    spec(LC, 16.0, 0.0, f64::INFINITY, false, "micron"),
    spec(ST, 1500.0, 0.0, f64::INFINITY, false, "pN"),
    spec(KT, 4.11, 0.0, 8.0, true, "pN*nm"),
    spec(F_OFFSET, 0.01, -0.1, 0.1, false, "pN"),
];

const TWLC_PARAMS: [ParamSpec; 10] = [
    spec(D_OFFSET, 0.01, -0.1, 0.1, false, "micron"),
    spec(LP, 50.0, 0.0, 100.0, false, "nm"),
    spec(LC, 16.0, 0.0, f64::INFINITY, false, "micron"),
    spec(ST, 1500.0, 0.0, f64::INFINITY, false, "pN"),
    spec(C, 440.0, 50.0, 5000.0, false, "pN*nm^2"),
    spec(G0, -637.0, -5000.0, 5000.0, false, "pN*nm"),
    spec(G1, 17.0, 0.0, 1000.0, false, "nm"),
    spec(FC, 30.6, 0.0, 50.0, false, "pN"),
    spec(KT, 4.11, 0.0, 8.0, true, "pN*nm"),
    spec(F_OFFSET, 0.01, -0.1, 0.1, false, "pN"),
];

/// The two composite models of the fitting protocol.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ModelKind {
    /// Odijk eWLC + distance offset + force offset.
    Odijk,
    /// Twistable WLC + distance offset + force offset.
    Twlc,
}

impl ModelKind {
    pub fn for_stage(stage: FitStage) -> Self {
        match stage {
            FitStage::Initial => ModelKind::Odijk,
            FitStage::Final => ModelKind::Twlc,
        }
    }

    pub fn display_name(self) -> &'static str {
        match self {
            ModelKind::Odijk => "Odijk eWLC",
            ModelKind::Twlc => "tWLC",
        }
    }

    /// Parameters in model order.
    pub fn param_specs(self) -> &'static [ParamSpec] {
        match self {
            ModelKind::Odijk => &ODIJK_PARAMS,
            ModelKind::Twlc => &TWLC_PARAMS,
        }
    }

    pub fn param_names(self) -> Vec<&'static str> {
        self.param_specs().iter().map(|p| p.name).collect()
    }

    pub fn has_param(self, name: &str) -> bool {
        self.param_specs().iter().any(|p| p.name == name)
    }

    /// Default parameter set (no standard errors yet).
    pub fn default_params(self) -> Vec<FitParam> {
        self.param_specs()
            .iter()
            .map(|s| FitParam {
                name: s.name.to_string(),
                value: s.value,
                stderr: f64::NAN,
                lower_bound: s.lower,
                upper_bound: s.upper,
                fixed: s.fixed,
                unit: s.unit.to_string(),
            })
            .collect()
    }
}

/// Chain parameters unpacked from a model-ordered value slice.
#[derive(Debug, Clone, Copy)]
pub struct Chain {
    pub d_offset: f64,
    pub lp: f64,
    pub lc: f64,
    pub st: f64,
    pub kt: f64,
    pub f_offset: f64,
    pub twist: Option<Twist>,
}

/// Twist-stretch coupling parameters of the tWLC model.
#[derive(Debug, Clone, Copy)]
pub struct Twist {
    pub c: f64,
    pub g0: f64,
    pub g1: f64,
    pub fc: f64,
}

impl Chain {
    /// Unpack `values` (model order, see [`ModelKind::param_specs`]).
    ///
    /// # Panics
    /// Panics if `values` is shorter than the model's parameter list.
    pub fn from_values(model: ModelKind, values: &[f64]) -> Self {
        match model {
            ModelKind::Odijk => Chain {
                d_offset: values[0],
                lp: values[1],
                lc: values[2],
                st: values[3],
                kt: values[4],
                f_offset: values[5],
                twist: None,
            },
            ModelKind::Twlc => Chain {
                d_offset: values[0],
                lp: values[1],
                lc: values[2],
                st: values[3],
                twist: Some(Twist {
                    c: values[4],
                    g0: values[5],
                    g1: values[6],
                    fc: values[7],
                }),
                kt: values[8],
                f_offset: values[9],
            },
        }
    }

    fn is_physical(&self) -> bool {
        let base = self.lp > 0.0 && self.lc > 0.0 && self.st > 0.0 && self.kt >= 0.0;
        let twist_ok = match self.twist {
            None => true,
            Some(t) => {
                let g = t.g0 + t.g1 * t.fc;
                t.c > 0.0 && self.st * t.c - g * g > 0.0
            }
        };
        base && twist_ok && self.is_finite()
    }

    fn is_finite(&self) -> bool {
        let base = [self.d_offset, self.lp, self.lc, self.st, self.kt, self.f_offset]
            .iter()
            .all(|v| v.is_finite());
        match self.twist {
            None => base,
            Some(t) => base && [t.c, t.g0, t.g1, t.fc].iter().all(|v| v.is_finite()),
        }
    }

    /// Chain extension at force `f` (no offsets) and its derivative `dd/dF`.
    pub fn distance_and_slope(&self, f: f64) -> (f64, f64) {
        let s = (self.kt / (f * self.lp)).sqrt();
        let entropic = -0.5 * s;
        let d_entropic = 0.25 * s / f;

        let (enthalpic, d_enthalpic) = match self.twist {
            None => (f / self.st, 1.0 / self.st),
            Some(t) => {
                if f < t.fc {
                    let g = t.g0 + t.g1 * t.fc;
                    let den = self.st * t.c - g * g;
                    (t.c * f / den, t.c / den)
                } else {
                    let g = t.g0 + t.g1 * f;
                    let den = self.st * t.c - g * g;
                    let value = t.c * f / den;
                    let slope = (t.c * den + 2.0 * t.c * f * g * t.g1) / (den * den);
                    (value, slope)
                }
            }
        };

        (
            self.lc * (1.0 + entropic + enthalpic),
            self.lc * (d_entropic + d_enthalpic),
        )
    }

    /// Chain extension at force `f` (no offsets).
    pub fn distance(&self, f: f64) -> f64 {
        self.distance_and_slope(f).0
    }

    /// Largest force for which the tWLC denominator stays positive.
    fn force_ceiling(&self) -> f64 {
        let Some(t) = self.twist else {
            return F_MAX;
        };
        if t.g1 == 0.0 {
            return F_MAX;
        }
        let root = (self.st * t.c).sqrt();
        // g(F) = ±root above Fc
        let candidates = [(root - t.g0) / t.g1, (-root - t.g0) / t.g1];
        let singular = candidates
            .iter()
            .copied()
            .filter(|&f| f.is_finite() && f > t.fc)
            .fold(f64::INFINITY, f64::min);
        if singular.is_finite() {
            F_MAX.min(singular * (1.0 - 1e-9))
        } else {
            F_MAX
        }
    }

    /// Chain force (no offsets) producing extension `d`.
    ///
    /// Returns `NaN` for unphysical parameters.
    pub fn force(&self, d: f64) -> f64 {
        if !self.is_physical() || !d.is_finite() {
            return f64::NAN;
        }
        let hi = self.force_ceiling();
        if hi <= F_MIN {
            return f64::NAN;
        }

        let root = solve_increasing(
            |u| {
                let f = u.exp();
                let (dist, slope) = self.distance_and_slope(f);
                (dist - d, slope * f)
            },
            F_MIN.ln(),
            hi.ln(),
            LN_F_TOL,
            ROOT_MAX_ITER,
        );
        match root {
            Some(u) => u.exp(),
            None => f64::NAN,
        }
    }

    /// Observed force at measured distance `d`, offsets included.
    pub fn observed_force(&self, d: f64) -> f64 {
        self.force(d - self.d_offset) + self.f_offset
    }
}

/// Predict the observed force at each distance for a model-ordered value slice.
pub fn predict_forces(model: ModelKind, values: &[f64], distances: &[f64]) -> Vec<f64> {
    let chain = Chain::from_values(model, values);
    distances.iter().map(|&d| chain.observed_force(d)).collect()
}
