//! Split raw curves into extension and retraction branches.
//!
//! The split point is the peak: the first index of the largest finite
//! distance. Original indices before the peak form the extension, the peak and
//! everything after it the retraction. Within each branch only samples with
//! `distance > MIN_DISTANCE` are kept.

use crate::domain::{Branch, Curve, CurveMode, Sample};

/// Distances at or below this value (micron) are dropped.
pub const MIN_DISTANCE: f64 = 1e-6;

/// Index of the first maximum finite distance.
pub fn peak_index(distance: &[f64]) -> Option<usize> {
    let mut best: Option<(usize, f64)> = None;
    for (i, &d) in distance.iter().enumerate() {
        if !d.is_finite() {
            continue;
        }
        match best {
            Some((_, v)) if d <= v => {}
            _ => best = Some((i, d)),
        }
    }
    best.map(|(i, _)| i)
}

/// Indices of each branch after filtering, in original order.
///
/// Returns `(extension, retraction)`. Empty curves give two empty branches.
pub fn branch_indices(distance: &[f64]) -> (Vec<usize>, Vec<usize>) {
    let Some(peak) = peak_index(distance) else {
        return (Vec::new(), Vec::new());
    };
    let keep = |i: &usize| distance[*i] > MIN_DISTANCE;
    let extension = (0..peak).filter(keep).collect();
    let retraction = (peak..distance.len()).filter(keep).collect();
    (extension, retraction)
}

/// Segment every curve according to `mode`.
pub fn segment_curves(curves: &[Curve], mode: CurveMode) -> Vec<Sample> {
    let mut samples = Vec::new();
    for curve in curves {
        samples.extend(segment_curve(curve, mode));
    }
    samples
}

/// Segment a single curve.
pub fn segment_curve(curve: &Curve, mode: CurveMode) -> Vec<Sample> {
    if curve.distance.iter().any(|&d| d < 0.0) {
        log::warn!(
            "Curve {} has negative distance values; they are filtered out (this cannot be disabled).",
            curve.key
        );
    }

    let (extension, retraction) = branch_indices(&curve.distance);
    let take = |branch: Branch, idx: &[usize], name: String| Sample {
        name,
        branch,
        force: idx.iter().map(|&i| curve.force[i]).collect(),
        distance: idx.iter().map(|&i| curve.distance[i]).collect(),
    };

    match mode {
        CurveMode::Extension => vec![take(Branch::Extension, &extension, curve.key.clone())],
        CurveMode::Retraction => vec![take(Branch::Retraction, &retraction, curve.key.clone())],
        CurveMode::Both => vec![
            take(
                Branch::Extension,
                &extension,
                format!("{}{}", curve.key, Branch::Extension.suffix()),
            ),
            take(
                Branch::Retraction,
                &retraction,
                format!("{}{}", curve.key, Branch::Retraction.suffix()),
            ),
        ],
    }
}
