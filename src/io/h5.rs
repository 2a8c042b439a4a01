//! Bluelake `.h5` containers (feature `hdf5`).
//!
//! An FD curve is a marker dataset under `FD Curve/` whose `Start time (ns)`
//! and `Stop time (ns)` attributes select a window of two low-frequency
//! channels:
//!
//! - force: `Force LF/Force 2`, or the magnitude of `Force 2x` and `Force 2y`
//!   when the file only has the components
//! - distance: `Distance/Distance 1`
//!
//! Both channels are time series of `(Timestamp, Value)` records. Samples with
//! `start <= t < stop` are kept and paired by timestamp, in force order.

use std::collections::HashMap;
use std::path::Path;

use hdf5::{Dataset, File, Group, H5Type};

use crate::domain::Curve;
use crate::error::AppError;

pub const FD_CURVE_GROUP: &str = "FD Curve";
pub const START_ATTR: &str = "Start time (ns)";
pub const STOP_ATTR: &str = "Stop time (ns)";
pub const FORCE_GROUP: &str = "Force LF";
pub const FORCE_CHANNEL: &str = "Force 2";
pub const DISTANCE_GROUP: &str = "Distance";
pub const DISTANCE_CHANNEL: &str = "Distance 1";

/// One record of a low-frequency channel.
#[derive(H5Type, Debug, Clone, Copy, PartialEq)]
#[repr(C)]
pub struct TimeSeriesPoint {
    #[hdf5(rename = "Timestamp")]
    pub timestamp: i64,
    #[hdf5(rename = "Value")]
    pub value: f64,
}

/// Read every FD curve of one container, sorted by name.
pub fn read_h5_curves(path: &Path) -> Result<Vec<Curve>, AppError> {
    let h5_err = |e: hdf5::Error| AppError::config(format!("{}: {e}", path.display()));

    let file = File::open(path).map_err(h5_err)?;
    if !file.link_exists(FD_CURVE_GROUP) {
        log::warn!("{}: no '{FD_CURVE_GROUP}' group.", path.display());
        return Ok(Vec::new());
    }
    let markers = file.group(FD_CURVE_GROUP).map_err(h5_err)?;
    let mut names = markers.member_names().map_err(h5_err)?;
    names.sort();
    if names.is_empty() {
        return Ok(Vec::new());
    }

    let force = read_force(&file).map_err(h5_err)?;
    let distance = file
        .group(DISTANCE_GROUP)
        .and_then(|g| read_series(&g, DISTANCE_CHANNEL))
        .map_err(h5_err)?;

    let mut curves = Vec::with_capacity(names.len());
    for name in names {
        let marker = markers.dataset(&name).map_err(h5_err)?;
        let start = time_attr(&marker, START_ATTR).map_err(h5_err)?;
        let stop = time_attr(&marker, STOP_ATTR).map_err(h5_err)?;

        let (f, d) = window(&force, &distance, start, stop);
        if f.is_empty() {
            log::warn!(
                "{}: curve '{name}' has no samples between {start} and {stop} ns.",
                path.display()
            );
        }
        curves.push(Curve {
            key: name,
            force: f,
            distance: d,
        });
    }
    Ok(curves)
}

fn read_force(file: &File) -> hdf5::Result<Vec<TimeSeriesPoint>> {
    let group = file.group(FORCE_GROUP)?;
    if group.link_exists(FORCE_CHANNEL) {
        return read_series(&group, FORCE_CHANNEL);
    }
    let x = read_series(&group, &format!("{FORCE_CHANNEL}x"))?;
    let y = read_series(&group, &format!("{FORCE_CHANNEL}y"))?;
    if x.len() != y.len() {
        return Err(format!("'{FORCE_CHANNEL}x' and '{FORCE_CHANNEL}y' differ in length").into());
    }
    Ok(x.iter()
        .zip(&y)
        .map(|(a, b)| TimeSeriesPoint {
            timestamp: a.timestamp,
            value: a.value.hypot(b.value),
        })
        .collect())
}

fn read_series(group: &Group, name: &str) -> hdf5::Result<Vec<TimeSeriesPoint>> {
    group.dataset(name)?.read_raw::<TimeSeriesPoint>()
}

fn time_attr(marker: &Dataset, name: &str) -> hdf5::Result<i64> {
    marker
        .attr(name)?
        .read_raw::<i64>()?
        .first()
        .copied()
        .ok_or_else(|| format!("attribute '{name}' is empty").into())
}

/// Force/distance pairs with `start <= t < stop`.
fn window(
    force: &[TimeSeriesPoint],
    distance: &[TimeSeriesPoint],
    start: i64,
    stop: i64,
) -> (Vec<f64>, Vec<f64>) {
    let inside = |p: &&TimeSeriesPoint| p.timestamp >= start && p.timestamp < stop;
    let by_time: HashMap<i64, f64> = distance
        .iter()
        .filter(inside)
        .map(|p| (p.timestamp, p.value))
        .collect();
    force
        .iter()
        .filter(inside)
        .filter_map(|p| by_time.get(&p.timestamp).map(|&d| (p.value, d)))
        .unzip()
}

#[cfg(test)]
mod tests {
    use super::*;

    const STEP_NS: i64 = 100;

    fn series(values: &[f64]) -> Vec<TimeSeriesPoint> {
        values
            .iter()
            .enumerate()
            .map(|(i, &value)| TimeSeriesPoint {
                timestamp: 1_000 + i as i64 * STEP_NS,
                value,
            })
            .collect()
    }

    fn add_marker(group: &Group, name: &str, start: i64, stop: i64) -> hdf5::Result<()> {
        let marker = group.new_dataset::<u8>().shape(1).create(name)?;
        marker.new_attr::<i64>().shape(()).create(START_ATTR)?.write_scalar(&start)?;
        marker.new_attr::<i64>().shape(()).create(STOP_ATTR)?.write_scalar(&stop)?;
        Ok(())
    }

    /// Ten samples; curve `b` covers the first six, `a` the last four.
    fn write_fixture(path: &Path, split_force: bool) -> hdf5::Result<()> {
        let file = File::create(path)?;

        let force: Vec<f64> = (0..10).map(|i| 0.5 + i as f64).collect();
        let forces = file.create_group(FORCE_GROUP)?;
        if split_force {
            // 3-4-5 triangles: magnitude is the force above.
            let x: Vec<f64> = force.iter().map(|f| 0.6 * f).collect();
            let y: Vec<f64> = force.iter().map(|f| 0.8 * f).collect();
            forces
                .new_dataset_builder()
                .with_data(series(&x).as_slice())
                .create(format!("{FORCE_CHANNEL}x").as_str())?;
            forces
                .new_dataset_builder()
                .with_data(series(&y).as_slice())
                .create(format!("{FORCE_CHANNEL}y").as_str())?;
        } else {
            forces
                .new_dataset_builder()
                .with_data(series(&force).as_slice())
                .create(FORCE_CHANNEL)?;
        }

        let distance: Vec<f64> = (0..10).map(|i| 2.0 + 0.1 * i as f64).collect();
        file.create_group(DISTANCE_GROUP)?
            .new_dataset_builder()
            .with_data(series(&distance).as_slice())
            .create(DISTANCE_CHANNEL)?;

        let markers = file.create_group(FD_CURVE_GROUP)?;
        add_marker(&markers, "b", 1_000, 1_000 + 6 * STEP_NS)?;
        add_marker(&markers, "a", 1_000 + 6 * STEP_NS, 1_000 + 10 * STEP_NS)?;
        Ok(())
    }

    #[test]
    fn markers_slice_the_low_frequency_channels() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("run.h5");
        write_fixture(&path, false).unwrap();

        let curves = read_h5_curves(&path).unwrap();
        let keys: Vec<&str> = curves.iter().map(|c| c.key.as_str()).collect();
        assert_eq!(keys, vec!["a", "b"]);

        assert_eq!(curves[1].force, vec![0.5, 1.5, 2.5, 3.5, 4.5, 5.5]);
        assert_eq!(curves[1].distance.len(), 6);
        assert!((curves[1].distance[5] - 2.5).abs() < 1e-12);
        assert_eq!(curves[0].force, vec![6.5, 7.5, 8.5, 9.5]);
        assert!((curves[0].distance[0] - 2.6).abs() < 1e-12);
    }

    #[test]
    fn force_components_are_combined_into_a_magnitude() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("split.h5");
        write_fixture(&path, true).unwrap();

        let curves = read_h5_curves(&path).unwrap();
        for (got, want) in curves[0].force.iter().zip([6.5, 7.5, 8.5, 9.5]) {
            assert!((got - want).abs() < 1e-12, "{got} vs {want}");
        }
    }

    #[test]
    fn directory_load_reads_h5_containers() {
        let dir = tempfile::tempdir().unwrap();
        write_fixture(&dir.path().join("run.h5"), false).unwrap();
        let curves = crate::io::load_curves(dir.path()).unwrap();
        assert_eq!(curves.len(), 2);
    }

    #[test]
    fn window_pairs_by_timestamp() {
        let force = series(&[1.0, 2.0, 3.0]);
        let mut distance = series(&[10.0, 20.0, 30.0]);
        distance.remove(1);
        let (f, d) = window(&force, &distance, 0, i64::MAX);
        assert_eq!(f, vec![1.0, 3.0]);
        assert_eq!(d, vec![10.0, 30.0]);
    }
}
