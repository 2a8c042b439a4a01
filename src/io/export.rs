//! Write fit results and per-sample data to plain-text tables.
//!
//! All files are comma separated with a single `#` header line so they load
//! directly into spreadsheets or `numpy.loadtxt(..., delimiter=",")`. Floats
//! use Rust's shortest round-trip formatting. Sample names and failure reasons
//! are free text and are quoted whenever they contain a comma, quote, newline
//! or `#`.

use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use crate::domain::{FitFailure, Sample, SampleFit};
use crate::error::AppError;

pub const VALUES_FILE: &str = "values.txt";
pub const STDERR_FILE: &str = "stderr.txt";
pub const FAILED_FILE: &str = "failed.txt";

/// File name for a sample's raw dump; path separators are replaced.
pub fn sample_file_name(sample: &str) -> String {
    let safe: String = sample
        .chars()
        .map(|c| if matches!(c, '/' | '\\') { '_' } else { c })
        .collect();
    format!("{safe}.txt")
}

/// Write one sample's force/distance pairs.
pub fn write_force_distance(path: &Path, force: &[f64], distance: &[f64]) -> Result<(), AppError> {
    let mut out = create(path)?;
    let res = (|| -> std::io::Result<()> {
        writeln!(out, "# Force,Distance")?;
        for (f, d) in force.iter().zip(distance) {
            writeln!(out, "{f},{d}")?;
        }
        out.flush()
    })();
    res.map_err(|e| write_err(path, e))
}

/// Write every sample's raw dump into `dir`. Returns the written paths.
pub fn write_all_force_distance(dir: &Path, samples: &[Sample]) -> Result<Vec<PathBuf>, AppError> {
    let mut written = Vec::with_capacity(samples.len());
    for s in samples {
        let path = dir.join(sample_file_name(&s.name));
        write_force_distance(&path, &s.force, &s.distance)?;
        written.push(path);
    }
    Ok(written)
}

/// Read a file written by [`write_force_distance`].
pub fn read_force_distance(path: &Path) -> Result<(Vec<f64>, Vec<f64>), AppError> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(false)
        .comment(Some(b'#'))
        .trim(csv::Trim::All)
        .from_path(path)
        .map_err(|e| AppError::config(format!("Failed to open '{}': {e}", path.display())))?;

    let mut force = Vec::new();
    let mut distance = Vec::new();
    for (idx, rec) in reader.records().enumerate() {
        let rec = rec.map_err(|e| AppError::config(format!("{}: {e}", path.display())))?;
        let parse = |col: usize| -> Result<f64, AppError> {
            rec.get(col)
                .and_then(|v| v.parse::<f64>().ok())
                .ok_or_else(|| AppError::config(format!("{}: bad row {}", path.display(), idx + 1)))
        };
        force.push(parse(0)?);
        distance.push(parse(1)?);
    }
    Ok((force, distance))
}

/// Write final-stage values, one row per fitted sample.
pub fn write_values_summary(path: &Path, fits: &[SampleFit]) -> Result<(), AppError> {
    write_param_table(path, fits, |p| p.value)
}

/// Write final-stage standard errors (`NaN` for fixed parameters).
pub fn write_stderr_summary(path: &Path, fits: &[SampleFit]) -> Result<(), AppError> {
    write_param_table(path, fits, |p| p.stderr)
}

/// Write the failed samples. Does nothing when `failures` is empty.
pub fn write_failures(path: &Path, failures: &[FitFailure]) -> Result<(), AppError> {
    if failures.is_empty() {
        return Ok(());
    }
    let mut out = table_writer(path, &["Sample Name", "Stage", "Reason"])?;
    for f in failures {
        out.write_record([f.sample.as_str(), f.stage.as_str(), f.reason.as_str()])
            .map_err(|e| csv_err(path, e))?;
    }
    out.flush().map_err(|e| write_err(path, e))
}

fn write_param_table(
    path: &Path,
    fits: &[SampleFit],
    pick: impl Fn(&crate::domain::FitParam) -> f64,
) -> Result<(), AppError> {
    let names: Vec<&str> = fits.first().map(|f| f.param_names()).unwrap_or_default();
    let header: Vec<&str> = std::iter::once("Sample Name").chain(names.iter().copied()).collect();
    let mut out = table_writer(path, &header)?;

    for fit in fits {
        let mut row = Vec::with_capacity(header.len());
        row.push(fit.sample.clone());
        for n in &names {
            row.push(fit.param(n).map(&pick).unwrap_or(f64::NAN).to_string());
        }
        out.write_record(&row).map_err(|e| csv_err(path, e))?;
    }
    out.flush().map_err(|e| write_err(path, e))
}

/// CSV writer over `path` whose first line is `# ` followed by `header`.
fn table_writer(path: &Path, header: &[&str]) -> Result<csv::Writer<BufWriter<File>>, AppError> {
    let mut out = create(path)?;
    writeln!(out, "# {}", header.join(",")).map_err(|e| write_err(path, e))?;
    Ok(csv::WriterBuilder::new().comment(Some(b'#')).from_writer(out))
}

fn create(path: &Path) -> Result<BufWriter<File>, AppError> {
    File::create(path)
        .map(BufWriter::new)
        .map_err(|e| AppError::config(format!("Failed to create '{}': {e}", path.display())))
}

fn write_err(path: &Path, e: std::io::Error) -> AppError {
    AppError::config(format!("Failed to write '{}': {e}", path.display()))
}

fn csv_err(path: &Path, e: csv::Error) -> AppError {
    AppError::config(format!("Failed to write '{}': {e}", path.display()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{FitQuality, FitStage};
    use crate::models::ModelKind;

    fn fit(name: &str, lp: f64) -> SampleFit {
        let mut params = ModelKind::Odijk.default_params();
        params[1].value = lp;
        params[1].stderr = 0.5;
        SampleFit {
            sample: name.into(),
            stage: FitStage::Final,
            params,
            quality: FitQuality {
                n_points: 10,
                n_free: 5,
                iterations: 4,
                rms: 0.01,
            },
        }
    }

    #[test]
    fn force_distance_round_trips_exactly() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("s.txt");
        let force = vec![0.1, 1.0 / 3.0, 12.5, 1e-12];
        let distance = vec![2.0, 2.718281828459045, 3.0000001, 1e5];
        write_force_distance(&path, &force, &distance).unwrap();

        let text = std::fs::read_to_string(&path).unwrap();
        assert!(text.starts_with("# Force,Distance\n"));

        let (f, d) = read_force_distance(&path).unwrap();
        assert_eq!(f, force);
        assert_eq!(d, distance);
    }

    #[test]
    fn values_and_stderr_share_layout() {
        let dir = tempfile::tempdir().unwrap();
        let fits = vec![fit("a", 48.0), fit("b", 51.5)];
        let values = dir.path().join(VALUES_FILE);
        let stderr = dir.path().join(STDERR_FILE);
        write_values_summary(&values, &fits).unwrap();
        write_stderr_summary(&stderr, &fits).unwrap();

        let v = std::fs::read_to_string(&values).unwrap();
        let mut lines = v.lines();
        assert_eq!(
            lines.next().unwrap(),
            "# Sample Name,DNA/d_offset,DNA/Lp,DNA/Lc,DNA/St,kT,DNA/f_offset"
        );
        let row: Vec<&str> = lines.next().unwrap().split(',').collect();
        assert_eq!(row[0], "a");
        assert_eq!(row[2], "48");
        assert_eq!(v.lines().count(), 3);

        let s = std::fs::read_to_string(&stderr).unwrap();
        let row: Vec<&str> = s.lines().nth(2).unwrap().split(',').collect();
        assert_eq!(row[0], "b");
        assert_eq!(row[2], "0.5");
        assert_eq!(row[1], "NaN");
    }

    fn read_table(path: &Path) -> (String, Vec<csv::StringRecord>) {
        let text = std::fs::read_to_string(path).unwrap();
        let header = text.lines().next().unwrap().to_string();
        let rows = csv::ReaderBuilder::new()
            .has_headers(false)
            .comment(Some(b'#'))
            .from_path(path)
            .unwrap()
            .records()
            .collect::<Result<Vec<_>, _>>()
            .unwrap();
        (header, rows)
    }

    #[test]
    fn failures_file_only_when_needed() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(FAILED_FILE);
        write_failures(&path, &[]).unwrap();
        assert!(!path.exists());

        let failures = vec![
            FitFailure {
                sample: "x_retraction".into(),
                stage: FitStage::Initial,
                reason: "insufficient data: 0 points, need at least 6".into(),
            },
            FitFailure {
                sample: "y".into(),
                stage: FitStage::Final,
                reason: "line one\nline two".into(),
            },
        ];
        write_failures(&path, &failures).unwrap();
        let (header, rows) = read_table(&path);
        assert_eq!(header, "# Sample Name,Stage,Reason");
        assert_eq!(rows.len(), 2);
        assert!(rows.iter().all(|r| r.len() == 3));
        assert_eq!(&rows[0][0], "x_retraction");
        assert_eq!(&rows[0][1], "initial");
        assert_eq!(&rows[0][2], "insufficient data: 0 points, need at least 6");
        assert_eq!(&rows[1][2], "line one\nline two");
    }

    #[test]
    fn sample_names_with_commas_keep_rows_aligned() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(VALUES_FILE);
        let fits = vec![fit("bead 1, run 2", 48.0), fit("#3 \"slow\"", 50.0)];
        write_values_summary(&path, &fits).unwrap();

        let (header, rows) = read_table(&path);
        let columns = header.trim_start_matches("# ").split(',').count();
        assert_eq!(columns, 7);
        assert_eq!(rows.len(), 2);
        for row in &rows {
            assert_eq!(row.len(), columns, "{row:?}");
        }
        assert_eq!(&rows[0][0], "bead 1, run 2");
        assert_eq!(&rows[0][2], "48");
        assert_eq!(&rows[1][0], "#3 \"slow\"");
    }

    #[test]
    fn sample_names_never_escape_the_output_dir() {
        assert_eq!(sample_file_name("FD Curve/1"), "FD Curve_1.txt");
        assert_eq!(sample_file_name("a_extension"), "a_extension.txt");
    }
}
