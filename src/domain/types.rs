//! Shared domain types.
//!
//! These types are intentionally kept lightweight and serializable so they can be:
//!
//! - passed between pipeline stages without hidden state
//! - exported to the JSON run manifest
//! - reused by tests to build synthetic inputs

use clap::ValueEnum;
use serde::{Deserialize, Serialize};

/// Which branch(es) of each pulling cycle to analyze.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum CurveMode {
    /// Only the samples recorded before the peak distance.
    Extension,
    /// Only the samples from the peak distance onwards.
    Retraction,
    /// Both branches, keyed with `_extension` / `_retraction` suffixes.
    Both,
}

impl CurveMode {
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "extension" => Some(CurveMode::Extension),
            "retraction" => Some(CurveMode::Retraction),
            "both" => Some(CurveMode::Both),
            _ => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            CurveMode::Extension => "extension",
            CurveMode::Retraction => "retraction",
            CurveMode::Both => "both",
        }
    }
}

/// One phase of a pulling cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Branch {
    Extension,
    Retraction,
}

impl Branch {
    /// Suffix appended to the curve key when both branches are produced.
    pub fn suffix(self) -> &'static str {
        match self {
            Branch::Extension => "_extension",
            Branch::Retraction => "_retraction",
        }
    }
}

/// A raw force-distance curve as read from a container file.
#[derive(Debug, Clone, PartialEq)]
pub struct Curve {
    pub key: String,
    /// Force in pN.
    pub force: Vec<f64>,
    /// Distance in micron.
    pub distance: Vec<f64>,
}

impl Curve {
    pub fn len(&self) -> usize {
        self.distance.len()
    }

    pub fn is_empty(&self) -> bool {
        self.distance.is_empty()
    }
}

/// A segmented branch of a curve; the unit that gets fitted.
///
/// Every distance value is strictly greater than the segmentation threshold.
#[derive(Debug, Clone, PartialEq)]
pub struct Sample {
    pub name: String,
    pub branch: Branch,
    pub force: Vec<f64>,
    pub distance: Vec<f64>,
}

impl Sample {
    pub fn len(&self) -> usize {
        self.force.len()
    }

    pub fn is_empty(&self) -> bool {
        self.force.is_empty()
    }
}

/// Which round of the two-stage protocol a fit or override belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FitStage {
    /// Odijk eWLC on low-force data (initial guess).
    Initial,
    /// tWLC on the full branch, seeded from the initial guess.
    Final,
}

impl FitStage {
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "initial" => Some(FitStage::Initial),
            "final" => Some(FitStage::Final),
            _ => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            FitStage::Initial => "initial",
            FitStage::Final => "final",
        }
    }
}

/// Which attribute of a parameter an override row sets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ParamAttr {
    Value,
    LowerBound,
    UpperBound,
    Fixed,
}

impl ParamAttr {
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "value" => Some(ParamAttr::Value),
            "lower_bound" => Some(ParamAttr::LowerBound),
            "upper_bound" => Some(ParamAttr::UpperBound),
            "fixed" => Some(ParamAttr::Fixed),
            _ => None,
        }
    }
}

/// A single named model parameter, before or after fitting.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FitParam {
    pub name: String,
    pub value: f64,
    /// Standard error; `NaN` when not estimated (fixed, or before fitting).
    pub stderr: f64,
    pub lower_bound: f64,
    pub upper_bound: f64,
    pub fixed: bool,
    pub unit: String,
}

/// Convergence diagnostics of one fit.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FitQuality {
    pub n_points: usize,
    pub n_free: usize,
    pub iterations: usize,
    pub rms: f64,
}

/// Output of one stage for one sample.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SampleFit {
    pub sample: String,
    pub stage: FitStage,
    /// Parameters in model order.
    pub params: Vec<FitParam>,
    pub quality: FitQuality,
}

impl SampleFit {
    pub fn param(&self, name: &str) -> Option<&FitParam> {
        self.params.iter().find(|p| p.name == name)
    }

    pub fn value(&self, name: &str) -> Option<f64> {
        self.param(name).map(|p| p.value)
    }

    pub fn param_names(&self) -> Vec<&str> {
        self.params.iter().map(|p| p.name.as_str()).collect()
    }
}

/// A sample that could not be fitted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FitFailure {
    pub sample: String,
    pub stage: FitStage,
    pub reason: String,
}
