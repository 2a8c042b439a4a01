//! Plotters SVG rendering.
//!
//! Three figures are produced per run:
//! - `rawdata.svg`: every sample's force-distance points
//! - `fit.svg`: points plus the fitted tWLC curve of every fitted sample
//! - `DNA_Lp_Lc_St.svg`: Lp, Lc and St per sample with standard-error bars
//!
//! With the log toggle the force axis shows `log10(F)`; non-positive forces
//! cannot be shown and are dropped from the figure (not from the fit).

use std::ops::Range;
use std::path::Path;

use plotters::prelude::*;

use crate::domain::{CurveMode, Branch, Sample, SampleFit};
use crate::error::AppError;
use crate::models::{LC, LP, ModelKind, ST, predict_forces};

pub const RAW_PLOT: &str = "rawdata.svg";
pub const FIT_PLOT: &str = "fit.svg";
pub const PARAM_PLOT: &str = "DNA_Lp_Lc_St.svg";

/// Points on each fitted curve.
pub const CURVE_POINTS: usize = 200;

const SIZE: (u32, u32) = (1024, 768);
const PANEL_SIZE: (u32, u32) = (1500, 520);

/// Parameters shown in the summary figure, with their panel titles.
pub const SUMMARY_PARAMS: [(&str, &str); 3] = [
    (LP, "DNA/Lp (nm)"),
    (LC, "DNA/Lc (micron)"),
    (ST, "DNA/St (pN)"),
];

type DrawResult = Result<(), Box<dyn std::error::Error>>;

/// A named set of `(distance, force-axis)` points.
#[derive(Debug, Clone)]
pub struct Series {
    pub label: Option<String>,
    pub points: Vec<(f64, f64)>,
}

/// Convert force/distance arrays to plot coordinates.
pub fn to_points(force: &[f64], distance: &[f64], log_scale: bool) -> Vec<(f64, f64)> {
    force
        .iter()
        .zip(distance)
        .filter_map(|(&f, &d)| force_axis(f, log_scale).map(|y| (d, y)))
        .filter(|(d, _)| d.is_finite())
        .collect()
}

fn force_axis(f: f64, log_scale: bool) -> Option<f64> {
    if !f.is_finite() {
        return None;
    }
    if log_scale {
        (f > 0.0).then(|| f.log10())
    } else {
        Some(f)
    }
}

/// Evaluate a final fit over the sample's distance range.
///
/// Returns `(distance, force)` pairs in model units; points where the model has
/// no solution are skipped.
pub fn fitted_curve(fit: &SampleFit, sample: &Sample, n: usize) -> Vec<(f64, f64)> {
    let finite = sample.distance.iter().copied().filter(|d| d.is_finite());
    let (lo, hi) = finite.fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), d| (lo.min(d), hi.max(d)));
    if !(lo.is_finite() && hi.is_finite()) {
        return Vec::new();
    }
    let n = n.max(2);
    let grid: Vec<f64> = (0..n)
        .map(|i| lo + (hi - lo) * i as f64 / (n - 1) as f64)
        .collect();

    let values: Vec<f64> = fit.params.iter().map(|p| p.value).collect();
    let forces = predict_forces(ModelKind::Twlc, &values, &grid);
    grid.into_iter()
        .zip(forces)
        .filter(|(_, f)| f.is_finite())
        .collect()
}

/// Final fits shown in the parameter summary.
///
/// In `both` mode only extension samples are kept, so the x labels always match
/// the plotted values.
pub fn summary_fits<'a>(fits: &'a [SampleFit], samples: &[Sample], mode: CurveMode) -> Vec<&'a SampleFit> {
    fits.iter()
        .filter(|fit| match mode {
            CurveMode::Both => samples
                .iter()
                .any(|s| s.name == fit.sample && s.branch == Branch::Extension),
            _ => true,
        })
        .collect()
}

/// `rawdata.svg`.
pub fn render_raw(path: &Path, samples: &[Sample], log_scale: bool) -> Result<(), AppError> {
    let scatter: Vec<Series> = samples
        .iter()
        .map(|s| Series {
            label: Some(s.name.clone()),
            points: to_points(&s.force, &s.distance, log_scale),
        })
        .collect();
    draw_force_distance(path, "Raw data", &scatter, &[], log_scale).map_err(|e| plot_err(path, e))
}

/// `fit.svg`.
pub fn render_fits(path: &Path, samples: &[Sample], fits: &[SampleFit], log_scale: bool) -> Result<(), AppError> {
    let mut scatter = Vec::with_capacity(fits.len());
    let mut lines = Vec::with_capacity(fits.len());
    for fit in fits {
        let Some(sample) = samples.iter().find(|s| s.name == fit.sample) else {
            continue;
        };
        scatter.push(Series {
            label: None,
            points: to_points(&sample.force, &sample.distance, log_scale),
        });
        let curve = fitted_curve(fit, sample, CURVE_POINTS);
        let (d, f): (Vec<f64>, Vec<f64>) = curve.into_iter().unzip();
        lines.push(Series {
            label: Some(fit.sample.clone()),
            points: to_points(&f, &d, log_scale),
        });
    }
    draw_force_distance(path, "tWLC fit", &scatter, &lines, log_scale).map_err(|e| plot_err(path, e))
}

/// `DNA_Lp_Lc_St.svg`.
pub fn render_param_summary(path: &Path, fits: &[&SampleFit]) -> Result<(), AppError> {
    draw_param_summary(path, fits).map_err(|e| plot_err(path, e))
}

fn draw_force_distance(path: &Path, caption: &str, scatter: &[Series], lines: &[Series], log_scale: bool) -> DrawResult {
    let root = SVGBackend::new(path, SIZE).into_drawing_area();
    root.fill(&WHITE)?;

    let all = scatter.iter().chain(lines).flat_map(|s| s.points.iter().copied());
    let (xs, ys): (Vec<f64>, Vec<f64>) = all.unzip();
    let x_range = padded_range(&xs);
    let y_range = padded_range(&ys);

    let mut chart = ChartBuilder::on(&root)
        .margin(15)
        .caption(caption, ("sans-serif", 24))
        .set_label_area_size(LabelAreaPosition::Left, 60)
        .set_label_area_size(LabelAreaPosition::Bottom, 45)
        .build_cartesian_2d(x_range, y_range)?;

    let y_desc = if log_scale { "Log Force (pN)" } else { "Force (pN)" };
    let fmt_y = |v: &f64| {
        if log_scale {
            format!("{:.3}", 10f64.powf(*v))
        } else {
            format!("{v:.1}")
        }
    };
    chart
        .configure_mesh()
        .x_desc("Distance (micron)")
        .y_desc(y_desc)
        .y_label_formatter(&fmt_y)
        .light_line_style(&BLACK.mix(0.05))
        .draw()?;

    let mut labelled = false;
    for (i, s) in scatter.iter().enumerate() {
        let color = Palette99::pick(i).to_rgba();
        let anno = chart.draw_series(s.points.iter().map(|&p| Circle::new(p, 2, color.filled())))?;
        if let Some(label) = &s.label {
            anno.label(label.as_str())
                .legend(move |(x, y)| Circle::new((x + 10, y), 3, color.filled()));
            labelled = true;
        }
    }
    for (i, s) in lines.iter().enumerate() {
        let color = Palette99::pick(i).to_rgba();
        let anno = chart.draw_series(LineSeries::new(s.points.iter().copied(), color.stroke_width(2)))?;
        if let Some(label) = &s.label {
            anno.label(label.as_str())
                .legend(move |(x, y)| PathElement::new(vec![(x, y), (x + 20, y)], color.stroke_width(2)));
            labelled = true;
        }
    }

    if labelled {
        chart
            .configure_series_labels()
            .position(SeriesLabelPosition::UpperLeft)
            .background_style(&WHITE.mix(0.8))
            .border_style(&BLACK)
            .draw()?;
    }

    root.present()?;
    Ok(())
}

fn draw_param_summary(path: &Path, fits: &[&SampleFit]) -> DrawResult {
    let root = SVGBackend::new(path, PANEL_SIZE).into_drawing_area();
    root.fill(&WHITE)?;
    let panels = root.split_evenly((1, 3));

    let names: Vec<&str> = fits.iter().map(|f| f.sample.as_str()).collect();
    let n = names.len().max(1) as i32;

    for (panel, (param, title)) in panels.iter().zip(SUMMARY_PARAMS) {
        // (index, value, stderr); a missing stderr draws a bar of zero height.
        let rows: Vec<(i32, f64, f64)> = fits
            .iter()
            .enumerate()
            .filter_map(|(i, fit)| {
                let p = fit.param(param)?;
                let err = if p.stderr.is_finite() { p.stderr } else { 0.0 };
                p.value.is_finite().then_some((i as i32, p.value, err))
            })
            .collect();
        let extent: Vec<f64> = rows.iter().flat_map(|&(_, v, e)| [v - e, v + e]).collect();

        let mut chart = ChartBuilder::on(panel)
            .margin(12)
            .caption(title, ("sans-serif", 20))
            .set_label_area_size(LabelAreaPosition::Left, 60)
            .set_label_area_size(LabelAreaPosition::Bottom, 60)
            .build_cartesian_2d((0..n).into_segmented(), padded_range(&extent))?;

        let fmt_x = |v: &SegmentValue<i32>| match v {
            SegmentValue::CenterOf(i) => names.get(*i as usize).map(|s| s.to_string()).unwrap_or_default(),
            _ => String::new(),
        };
        chart
            .configure_mesh()
            .disable_x_mesh()
            .x_labels(names.len().max(1))
            .x_label_formatter(&fmt_x)
            .light_line_style(&BLACK.mix(0.05))
            .draw()?;

        chart.draw_series(rows.iter().map(|&(i, v, e)| {
            ErrorBar::new_vertical(SegmentValue::CenterOf(i), v - e, v, v + e, BLUE.filled(), 10)
        }))?;
    }

    root.present()?;
    Ok(())
}

/// Data range with 5% padding; degenerate or empty input gets a unit range.
fn padded_range(values: &[f64]) -> Range<f64> {
    let (lo, hi) = values
        .iter()
        .filter(|v| v.is_finite())
        .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), &v| (lo.min(v), hi.max(v)));
    if !(lo.is_finite() && hi.is_finite()) {
        return 0.0..1.0;
    }
    if hi - lo < 1e-12 {
        let pad = (lo.abs() * 0.05).max(0.5);
        return (lo - pad)..(hi + pad);
    }
    let pad = 0.05 * (hi - lo);
    (lo - pad)..(hi + pad)
}

fn plot_err(path: &Path, e: Box<dyn std::error::Error>) -> AppError {
    AppError::config(format!("Failed to render plot '{}': {e}", path.display()))
}
