//! Formatted terminal output.
//!
//! We keep formatting code in one place so the fitting code stays free of
//! presentation concerns and output changes stay localized.

use crate::domain::{FitFailure, SampleFit};
use crate::models::{LC, LP, ST};
use crate::report::{ParamStats, param_stats};

const SUMMARY: [(&str, &str); 3] = [(LP, "Lp (nm)"), (LC, "Lc (um)"), (ST, "St (pN)")];

/// Format the run summary: counts, per-sample table and batch statistics.
pub fn format_batch_summary(n_curves: usize, n_samples: usize, fits: &[SampleFit], failures: &[FitFailure]) -> String {
    let mut out = String::new();

    out.push_str("=== fdfit - force-distance tWLC fit ===\n");
    out.push_str(&format!(
        "Curves: {n_curves} | samples: {n_samples} | fitted: {} | failed: {}\n\n",
        fits.len(),
        failures.len()
    ));

    if fits.is_empty() {
        out.push_str("No sample was fitted.\n");
    } else {
        out.push_str(&format_fit_table(fits));
        out.push('\n');
        out.push_str(&format_stats(&param_stats(fits, &SUMMARY.map(|(n, _)| n))));
    }

    if !failures.is_empty() {
        out.push('\n');
        out.push_str(&format_failures(failures));
    }

    out
}

/// Format the failed samples, one per line.
pub fn format_failures(failures: &[FitFailure]) -> String {
    let mut out = String::from("Failed samples:\n");
    for f in failures {
        out.push_str(&format!("- {} ({}): {}\n", f.sample, f.stage.as_str(), f.reason));
    }
    out
}

fn format_fit_table(fits: &[SampleFit]) -> String {
    let mut out = String::new();
    out.push_str(
        format!(
            "{:<28} {:>20} {:>20} {:>20} {:>10}\n",
            "sample", SUMMARY[0].1, SUMMARY[1].1, SUMMARY[2].1, "rms (pN)"
        )
        .trim_end(),
    );
    out.push('\n');
    out.push_str(format!("{:-<28} {:-<20} {:-<20} {:-<20} {:-<10}", "", "", "", "", "").trim_end());
    out.push('\n');

    for fit in fits {
        let cells: Vec<String> = SUMMARY
            .iter()
            .map(|(name, _)| match fit.param(name) {
                Some(p) => fmt_value_err(p.value, p.stderr),
                None => "-".to_string(),
            })
            .collect();
        out.push_str(
            format!(
                "{:<28} {:>20} {:>20} {:>20} {:>10.4}\n",
                truncate(&fit.sample, 28),
                cells[0],
                cells[1],
                cells[2],
                fit.quality.rms
            )
            .trim_end(),
        );
        out.push('\n');
    }
    out
}

fn format_stats(stats: &[ParamStats]) -> String {
    let mut out = String::from("Batch statistics:\n");
    for s in stats {
        out.push_str(&format!(
            "- {:<8} n={:<4} mean={} sd={} range=[{}, {}]\n",
            s.name,
            s.n,
            fmt_num(s.mean),
            fmt_num(s.std_dev),
            fmt_num(s.min),
            fmt_num(s.max)
        ));
    }
    out
}

fn fmt_value_err(value: f64, stderr: f64) -> String {
    if stderr.is_finite() {
        format!("{} ± {}", fmt_num(value), fmt_num(stderr))
    } else {
        fmt_num(value)
    }
}

fn fmt_num(v: f64) -> String {
    if !v.is_finite() {
        return "n/a".to_string();
    }
    let a = v.abs();
    if a != 0.0 && !(1e-3..1e5).contains(&a) {
        format!("{v:.3e}")
    } else {
        format!("{v:.4}")
    }
}

fn truncate(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        return s.to_string();
    }
    let mut out: String = s.chars().take(max.saturating_sub(1)).collect();
    out.push('.');
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{FitQuality, FitStage};
    use crate::models::ModelKind;

    fn fit(name: &str, lp: f64, lc: f64) -> SampleFit {
        let mut params = ModelKind::Twlc.default_params();
        for p in params.iter_mut() {
            match p.name.as_str() {
                LP => {
                    p.value = lp;
                    p.stderr = 0.25;
                }
                LC => p.value = lc,
                _ => {}
            }
        }
        SampleFit {
            sample: name.into(),
            stage: FitStage::Final,
            params,
            quality: FitQuality {
                n_points: 100,
                n_free: 5,
                iterations: 9,
                rms: 0.0125,
            },
        }
    }

    #[test]
    fn stats_over_fitted_samples() {
        let fits = vec![fit("a", 40.0, 2.8), fit("b", 50.0, 2.9)];
        let stats = param_stats(&fits, &[LP, LC, "missing"]);
        assert_eq!(stats[0].n, 2);
        assert!((stats[0].mean - 45.0).abs() < 1e-12);
        assert!((stats[0].std_dev - 50f64.sqrt()).abs() < 1e-12);
        assert_eq!(stats[0].min, 40.0);
        assert_eq!(stats[0].max, 50.0);
        assert_eq!(stats[2].n, 0);
        assert!(stats[2].mean.is_nan());

        let one = param_stats(&fits[..1], &[LP]);
        assert!(one[0].std_dev.is_nan());
    }

    #[test]
    fn summary_lists_samples_and_failures() {
        let fits = vec![fit("curve_1_extension", 48.0, 2.85)];
        let failures = vec![FitFailure {
            sample: "curve_1_retraction".into(),
            stage: FitStage::Final,
            reason: "did not converge within 200 iterations".into(),
        }];
        let text = format_batch_summary(1, 2, &fits, &failures);

        assert!(text.contains("Curves: 1 | samples: 2 | fitted: 1 | failed: 1"));
        assert!(text.contains("curve_1_extension"));
        assert!(text.contains("48.0000 ± 0.2500"));
        assert!(text.contains("- curve_1_retraction (final): did not converge"));
        // Fixed parameters carry no error.
        assert!(!text.contains("2.8500 ±"));
        assert!(text.lines().all(|l| l == l.trim_end()));
    }

    #[test]
    fn empty_batch_is_reported() {
        let text = format_batch_summary(3, 0, &[], &[]);
        assert!(text.contains("No sample was fitted."));
        assert!(!text.contains("Failed samples"));
    }

    #[test]
    fn numbers_switch_to_scientific_outside_display_range() {
        assert_eq!(fmt_num(1500.0), "1500.0000");
        assert_eq!(fmt_num(2.5e-5), "2.500e-5");
        assert_eq!(fmt_num(f64::NAN), "n/a");
        assert_eq!(truncate("abcdef", 4), "abc.");
    }
}
