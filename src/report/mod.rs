//! Reporting utilities: per-parameter batch statistics and terminal output.

pub mod format;

pub use format::*;

use crate::domain::SampleFit;

/// Mean and spread of one parameter across fitted samples.
#[derive(Debug, Clone, PartialEq)]
pub struct ParamStats {
    pub name: String,
    pub n: usize,
    pub mean: f64,
    /// Sample standard deviation; `NaN` for fewer than two values.
    pub std_dev: f64,
    pub min: f64,
    pub max: f64,
}

/// Statistics of `names` over `fits`, skipping non-finite values.
pub fn param_stats(fits: &[SampleFit], names: &[&str]) -> Vec<ParamStats> {
    names
        .iter()
        .map(|&name| {
            let values: Vec<f64> = fits
                .iter()
                .filter_map(|f| f.value(name))
                .filter(|v| v.is_finite())
                .collect();
            let n = values.len();
            let mean = if n == 0 { f64::NAN } else { values.iter().sum::<f64>() / n as f64 };
            let std_dev = if n < 2 {
                f64::NAN
            } else {
                (values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / (n - 1) as f64).sqrt()
            };
            let min = values.iter().copied().fold(f64::NAN, f64::min);
            let max = values.iter().copied().fold(f64::NAN, f64::max);
            ParamStats {
                name: name.to_string(),
                n,
                mean,
                std_dev,
                min,
                max,
            }
        })
        .collect()
}
