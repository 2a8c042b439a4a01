//! Curve container ingest.
//!
//! This module turns the files of an input directory into an ordered list of
//! labeled raw curves. It does no filtering or segmentation; that happens in
//! `io::segment`.
//!
//! Supported containers:
//! - `.csv`: a header with `force` and `distance` columns (any case) and an
//!   optional `curve` column. Rows of one curve need not be contiguous; curves
//!   keep the order of their first row. Without a `curve` column, the file stem
//!   names the single curve. `#` lines are comments.
//! - `.h5` (feature `hdf5` only, see `io::h5`): Bluelake containers, one curve
//!   per `FD Curve` marker. Default builds skip `.h5` files with a warning and
//!   say so when nothing else was found.
//!
//! Files are visited in sorted path order so runs are reproducible.

use std::collections::{HashMap, HashSet};
use std::fs::File;
use std::path::{Path, PathBuf};

use csv::StringRecord;

use crate::domain::Curve;
use crate::error::AppError;

/// Container files found in an input directory.
#[derive(Debug, Clone, Default)]
pub struct InputFiles {
    pub csv: Vec<PathBuf>,
    pub h5: Vec<PathBuf>,
}

/// Load every curve from every supported container in `dir`.
pub fn load_curves(dir: &Path) -> Result<Vec<Curve>, AppError> {
    let files = list_input_files(dir)?;

    let mut curves = Vec::new();
    for path in &files.csv {
        let loaded = read_csv_curves(path)?;
        log::info!("{}: {} curve(s)", path.display(), loaded.len());
        curves.extend(loaded);
    }
    for path in &files.h5 {
        let loaded = read_h5_curves(path)?;
        log::info!("{}: {} curve(s)", path.display(), loaded.len());
        curves.extend(loaded);
    }

    ensure_unique_keys(&curves)?;

    if curves.is_empty() {
        let hint = if !files.h5.is_empty() && !cfg!(feature = "hdf5") {
            format!(
                "; {} .h5 file(s) skipped because this build lacks the `hdf5` feature",
                files.h5.len()
            )
        } else {
            String::new()
        };
        return Err(AppError::no_data(format!(
            "No curves found in '{}' (expected .csv or .h5 files){hint}.",
            dir.display()
        )));
    }
    Ok(curves)
}

/// List `.csv` and `.h5` files (non-recursive), sorted by path.
pub fn list_input_files(dir: &Path) -> Result<InputFiles, AppError> {
    let entries = std::fs::read_dir(dir)
        .map_err(|e| AppError::config(format!("Failed to read input directory '{}': {e}", dir.display())))?;

    let mut files = InputFiles::default();
    for entry in entries {
        let entry = entry.map_err(|e| AppError::config(format!("Failed to list '{}': {e}", dir.display())))?;
        let path = entry.path();
        if !path.is_file() {
            continue;
        }
        let ext = path
            .extension()
            .and_then(|e| e.to_str())
            .unwrap_or("")
            .to_ascii_lowercase();
        match ext.as_str() {
            "csv" => files.csv.push(path),
            "h5" => files.h5.push(path),
            _ => {}
        }
    }
    files.csv.sort();
    files.h5.sort();
    Ok(files)
}

/// Read all curves from one CSV container.
pub fn read_csv_curves(path: &Path) -> Result<Vec<Curve>, AppError> {
    let file = File::open(path)
        .map_err(|e| AppError::config(format!("Failed to open CSV '{}': {e}", path.display())))?;

    let mut reader = csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .comment(Some(b'#'))
        .from_reader(file);

    let headers = reader
        .headers()
        .map_err(|e| AppError::config(format!("{}: failed to read CSV headers: {e}", path.display())))?
        .clone();
    let header_map = build_header_map(&headers);

    let force_col = required_column(&header_map, "force", path)?;
    let distance_col = required_column(&header_map, "distance", path)?;
    let curve_col = header_map.get("curve").copied();

    let default_key = path
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or("curve")
        .to_string();

    let mut order: Vec<String> = Vec::new();
    let mut by_key: HashMap<String, Curve> = HashMap::new();

    for (idx, result) in reader.records().enumerate() {
        // Line numbers are approximate when comment lines are present.
        let line = idx + 2;
        let record = result.map_err(|e| {
            AppError::config(format!("{}:{line}: CSV parse error: {e}", path.display()))
        })?;

        let force = parse_f64(&record, force_col, "force", path, line)?;
        let distance = parse_f64(&record, distance_col, "distance", path, line)?;
        let key = match curve_col {
            Some(col) => match record.get(col) {
                Some(k) if !k.is_empty() => k.to_string(),
                _ => {
                    return Err(AppError::config(format!(
                        "{}:{line}: missing curve label.",
                        path.display()
                    )));
                }
            },
            None => default_key.clone(),
        };

        let curve = by_key.entry(key.clone()).or_insert_with(|| {
            order.push(key.clone());
            Curve {
                key,
                force: Vec::new(),
                distance: Vec::new(),
            }
        });
        curve.force.push(force);
        curve.distance.push(distance);
    }

    Ok(order
        .into_iter()
        .filter_map(|k| by_key.remove(&k))
        .collect())
}

#[cfg(feature = "hdf5")]
pub use crate::io::h5::read_h5_curves;

#[cfg(not(feature = "hdf5"))]
pub fn read_h5_curves(path: &Path) -> Result<Vec<Curve>, AppError> {
    log::warn!(
        "{}: skipped; rebuild with `--features hdf5` to read .h5 containers.",
        path.display()
    );
    Ok(Vec::new())
}

fn ensure_unique_keys(curves: &[Curve]) -> Result<(), AppError> {
    let mut seen = HashSet::new();
    for c in curves {
        if !seen.insert(c.key.as_str()) {
            return Err(AppError::config(format!(
                "Curve '{}' appears in more than one input file.",
                c.key
            )));
        }
    }
    Ok(())
}

fn build_header_map(headers: &StringRecord) -> HashMap<String, usize> {
    headers
        .iter()
        .enumerate()
        .map(|(idx, name)| (normalize_header_name(name), idx))
        .collect()
}

fn normalize_header_name(name: &str) -> String {
    // Spreadsheet exports sometimes prefix the first header with a BOM.
    let name = name.trim().trim_start_matches('\u{feff}');
    name.to_ascii_lowercase()
}

fn required_column(header_map: &HashMap<String, usize>, name: &str, path: &Path) -> Result<usize, AppError> {
    header_map.get(name).copied().ok_or_else(|| {
        AppError::config(format!("{}: missing required column '{name}'.", path.display()))
    })
}

fn parse_f64(record: &StringRecord, col: usize, name: &str, path: &Path, line: usize) -> Result<f64, AppError> {
    let raw = record.get(col).unwrap_or("");
    raw.parse::<f64>().map_err(|_| {
        AppError::config(format!(
            "{}:{line}: invalid {name} value '{raw}'.",
            path.display()
        ))
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn write(dir: &Path, name: &str, text: &str) -> PathBuf {
        let path = dir.join(name);
        let mut f = File::create(&path).unwrap();
        f.write_all(text.as_bytes()).unwrap();
        path
    }

    #[test]
    fn long_format_groups_rows_by_curve() {
        let dir = tempfile::tempdir().unwrap();
        let path = write(
            dir.path(),
            "cycles.csv",
            "Curve,Force,Distance\nb,1.0,2.0\na,3.0,4.0\nb,5.0,6.0\n",
        );
        let curves = read_csv_curves(&path).unwrap();
        assert_eq!(curves.len(), 2);
        assert_eq!(curves[0].key, "b");
        assert_eq!(curves[0].force, vec![1.0, 5.0]);
        assert_eq!(curves[0].distance, vec![2.0, 6.0]);
        assert_eq!(curves[1].key, "a");
    }

    #[test]
    fn file_stem_names_single_curve_files() {
        let dir = tempfile::tempdir().unwrap();
        let path = write(dir.path(), "fd_7.csv", "\u{feff}force,distance\n# comment\n0.5,1.5\n");
        let curves = read_csv_curves(&path).unwrap();
        assert_eq!(curves.len(), 1);
        assert_eq!(curves[0].key, "fd_7");
        assert_eq!(curves[0].len(), 1);
    }

    #[test]
    fn malformed_values_are_fatal() {
        let dir = tempfile::tempdir().unwrap();
        let path = write(dir.path(), "bad.csv", "force,distance\n1.0,abc\n");
        let err = read_csv_curves(&path).unwrap_err();
        assert_eq!(err.exit_code(), 2);
        assert!(err.message().contains("invalid distance"));

        let path = write(dir.path(), "nocol.csv", "force,extension\n1.0,2.0\n");
        assert!(read_csv_curves(&path).is_err());
    }

    #[test]
    fn directory_load_is_sorted_and_rejects_duplicates() {
        let dir = tempfile::tempdir().unwrap();
        write(dir.path(), "b.csv", "force,distance\n1,2\n");
        write(dir.path(), "a.csv", "force,distance\n3,4\n");
        write(dir.path(), "notes.txt", "ignored");
        let curves = load_curves(dir.path()).unwrap();
        let keys: Vec<&str> = curves.iter().map(|c| c.key.as_str()).collect();
        assert_eq!(keys, vec!["a", "b"]);

        write(dir.path(), "c.csv", "curve,force,distance\na,1,2\n");
        let err = load_curves(dir.path()).unwrap_err();
        assert!(err.message().contains("more than one"));
    }

    #[test]
    fn empty_directory_is_no_data() {
        let dir = tempfile::tempdir().unwrap();
        let err = load_curves(dir.path()).unwrap_err();
        assert_eq!(err.exit_code(), 3);
    }

    #[cfg(not(feature = "hdf5"))]
    #[test]
    fn h5_only_directory_names_the_missing_feature() {
        let dir = tempfile::tempdir().unwrap();
        write(dir.path(), "run.h5", "not read");
        let err = load_curves(dir.path()).unwrap_err();
        assert_eq!(err.exit_code(), 3);
        assert!(err.message().contains("1 .h5 file(s) skipped"), "{}", err.message());
    }
}
