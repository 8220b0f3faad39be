//! Bringing the reference dataset into line with the predicted one: same variable names, same
//! grid.
//!
use std::collections::HashMap;

use ndarray::{Array1, ArrayD, ArrayView1, ArrayViewMut1, Axis};
use tracing::{debug, info, warn};

use crate::{
    dataset::{Coordinate, Dataset},
    errors::{Error, Result},
    helpers::close_enough,
    load::LoadedDataset,
};

/// Rename reference variables with its `variable_mapping`, keep only the variables both datasets
/// have, then interpolate the reference onto the predicted grid if they differ.
///
/// Returns the aligned predicted and reference datasets, in that order.
///
pub fn align_datasets(
    predicted: &LoadedDataset,
    reference: &LoadedDataset,
) -> Result<(LoadedDataset, LoadedDataset)> {
    let renamed = match &reference.config.variable_mapping {
        Some(mapping) => rename_present(&reference.data, mapping)?,
        None => reference.data.clone(),
    };

    let common: Vec<String> = predicted
        .data
        .variables
        .keys()
        .filter(|name| renamed.variables.contains_key(*name))
        .cloned()
        .collect();
    if common.is_empty() {
        return Err(Error::NoCommonVariables);
    }
    info!(variables = ?common, "Aligning datasets");

    let pred = predicted.data.select(&common)?;
    let mut refr = renamed.select(&common)?;
    if already_aligned(&pred, &refr) {
        debug!("Datasets share a grid");
    } else {
        refr = interpolate_onto(&refr, &pred)?;
    }

    Ok((
        LoadedDataset {
            data: pred,
            ..predicted.clone()
        },
        LoadedDataset {
            data: refr,
            ..reference.clone()
        },
    ))
}

/// Apply the renames whose source variable was loaded
fn rename_present(dataset: &Dataset, mapping: &HashMap<String, String>) -> Result<Dataset> {
    let present: HashMap<String, String> = mapping
        .iter()
        .filter(|(old, _)| dataset.variables.contains_key(*old))
        .map(|(old, new)| (old.clone(), new.clone()))
        .collect();
    if present.len() < mapping.len() {
        debug!("Some variable_mapping entries name variables that weren't loaded");
    }

    dataset.rename_variables(&present)
}

fn same_values(a: &Coordinate, b: &Coordinate) -> bool {
    a.len() == b.len()
        && a
            .values
            .iter()
            .zip(&b.values)
            .all(|(&x, &y)| close_enough(x, y))
}

fn already_aligned(predicted: &Dataset, reference: &Dataset) -> bool {
    let pred_sizes = predicted.sizes();
    let ref_sizes = reference.sizes();
    if pred_sizes.keys().ne(ref_sizes.keys()) {
        return false;
    }

    pred_sizes.iter().all(|(dim, len)| {
        ref_sizes[dim] == *len
            && match (predicted.coords.get(dim), reference.coords.get(dim)) {
                (Some(a), Some(b)) => same_values(a, b),
                _ => true,
            }
    })
}

/// Linearly interpolate every variable of `source` onto the coordinates of `target`, one
/// dimension at a time.
///
pub fn interpolate_onto(source: &Dataset, target: &Dataset) -> Result<Dataset> {
    let mut result = source.clone();
    let target_sizes = target.sizes();
    for (dim, len) in source.sizes() {
        if !target_sizes.contains_key(&dim) {
            warn!(%dim, "Dimension is missing from the predicted dataset, leaving it as it is");
            continue;
        }
        let (Some(from), Some(to)) = (source.coords.get(&dim), target.coords.get(&dim)) else {
            warn!(%dim, "Dimension has no coordinate values, can't interpolate along it");
            continue;
        };
        if same_values(from, to) {
            continue;
        }
        debug!(%dim, from = len, to = to.len(), "Interpolating");

        for variable in result.variables.values_mut() {
            if let Some(axis) = variable.axis(&dim) {
                variable.data = interpolate_axis(&variable.data, axis, &from.values, &to.values)?;
            }
        }
        result.coords.insert(
            dim.clone(),
            Coordinate {
                values: to.values.clone(),
                ..from.clone()
            },
        );
    }

    Ok(result)
}

/// Interpolate along `axis` from positions `from` to positions `to`.
///
/// `from` may be ascending or descending. Positions outside its range come out as NaN.
///
pub fn interpolate_axis(
    data: &ArrayD<f64>,
    axis: Axis,
    from: &Array1<f64>,
    to: &Array1<f64>,
) -> Result<ArrayD<f64>> {
    if data.len_of(axis) != from.len() {
        return Err(Error::Misaligned(format!(
            "axis of length {} has {} coordinate values",
            data.len_of(axis),
            from.len()
        )));
    }
    let descending = from.len() > 1 && from[0] > from[from.len() - 1];
    let mut positions = from.to_vec();
    if descending {
        positions.reverse();
    }

    let mut shape = data.shape().to_vec();
    shape[axis.index()] = to.len();
    let mut out = ArrayD::from_elem(shape, f64::NAN);
    for (lane, out_lane) in data.lanes(axis).into_iter().zip(out.lanes_mut(axis)) {
        interpolate_lane(lane, out_lane, &positions, to, descending);
    }

    Ok(out)
}

fn interpolate_lane(
    lane: ArrayView1<f64>,
    mut out: ArrayViewMut1<f64>,
    positions: &[f64],
    to: &Array1<f64>,
    descending: bool,
) {
    let mut values = lane.to_vec();
    if descending {
        values.reverse();
    }
    let (Some(&first), Some(&last)) = (positions.first(), positions.last()) else {
        return;
    };

    for (x, slot) in to.iter().zip(out.iter_mut()) {
        if !(first..=last).contains(x) {
            *slot = f64::NAN;
            continue;
        }
        let upper = positions.partition_point(|&p| p < *x);
        *slot = if positions[upper] == *x {
            values[upper]
        } else {
            let lower = upper - 1;
            let weight = (x - positions[lower]) / (positions[upper] - positions[lower]);
            values[lower] + weight * (values[upper] - values[lower])
        };
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{DatasetConfig, Format};
    use crate::dataset::Variable;
    use crate::load::DatasetKind;
    use crate::testing::{grid_dataset, strings};
    use approx::assert_relative_eq;
    use ndarray::{array, Array3};

    fn loaded(data: Dataset, kind: DatasetKind) -> LoadedDataset {
        LoadedDataset {
            data,
            config: DatasetConfig {
                path: "unused".into(),
                format: Format::Netcdf,
                variables: vec![],
                variable_mapping: None,
                ensemble_method: None,
            },
            kind,
        }
    }

    #[test]
    fn test_interpolate_axis() -> Result<()> {
        let data = array![[0.0, 10.0, 20.0], [1.0, 1.0, f64::NAN]].into_dyn();
        let from = array![0.0, 1.0, 2.0];
        let to = array![-1.0, 0.0, 0.25, 1.5, 2.0, 3.0];
        let out = interpolate_axis(&data, Axis(1), &from, &to)?;
        assert_eq!(out.shape(), &[2, 6]);
        assert!(out[[0, 0]].is_nan());
        assert_eq!(out[[0, 1]], 0.0);
        assert_relative_eq!(out[[0, 2]], 2.5);
        assert_relative_eq!(out[[0, 3]], 15.0);
        assert_eq!(out[[0, 4]], 20.0);
        assert!(out[[0, 5]].is_nan());
        assert_eq!(out[[1, 2]], 1.0);
        assert!(out[[1, 3]].is_nan());

        // Descending positions
        let data = array![30.0, 20.0, 10.0].into_dyn();
        let from = array![60.0, 50.0, 40.0];
        let out = interpolate_axis(&data, Axis(0), &from, &array![45.0, 55.0])?;
        assert_relative_eq!(out[[0]], 15.0);
        assert_relative_eq!(out[[1]], 25.0);

        assert!(interpolate_axis(&data, Axis(0), &array![1.0], &array![1.0]).is_err());

        Ok(())
    }

    #[test]
    fn test_align_same_grid() -> Result<()> {
        let predicted = grid_dataset(&["tas", "pr"], 3, 2, 2, |t, _, _| t as f64)?;
        let reference = grid_dataset(&["temperature", "huss"], 3, 2, 2, |_, _, _| 1.0)?;
        let mut reference = loaded(reference, DatasetKind::Reference);
        reference.config.variable_mapping = Some(HashMap::from([
            ("temperature".to_string(), "tas".to_string()),
            ("absent".to_string(), "pr".to_string()),
        ]));

        let predicted_loaded = loaded(predicted.clone(), DatasetKind::Predicted);
        let (pred, refr) = align_datasets(&predicted_loaded, &reference)?;
        assert_eq!(pred.data.variable_names(), strings(&["tas"]));
        assert_eq!(refr.data.variable_names(), strings(&["tas"]));
        assert_eq!(refr.data.coords, predicted.coords);
        assert_eq!(refr.kind, DatasetKind::Reference);

        Ok(())
    }

    #[test]
    fn test_align_regrids() -> Result<()> {
        // Predicted at 30, 35, .. 50 and 0, 5, .. 20; reference at 30, 40, 50 and 0, 10, 20
        let mut predicted = Dataset::new();
        predicted.insert_coord(Coordinate::new("lat", Array1::range(30.0, 51.0, 5.0)))?;
        predicted.insert_coord(Coordinate::new("lon", Array1::range(0.0, 21.0, 5.0)))?;
        predicted.insert_variable(Variable::new(
            "tas",
            strings(&["time", "lat", "lon"]),
            Array3::zeros((2, 5, 5)).into_dyn(),
        )?)?;
        let reference = grid_dataset(&["tas"], 2, 3, 3, |t, row, col| {
            (t * 100 + row * 10 + col) as f64
        })?;

        let (_, refr) = align_datasets(
            &loaded(predicted, DatasetKind::Predicted),
            &loaded(reference, DatasetKind::Reference),
        )?;
        let tas = refr.variable("tas")?;
        assert_eq!(tas.data.shape(), &[2, 5, 5]);
        assert_relative_eq!(tas.data[[0, 1, 0]], 5.0);
        assert_relative_eq!(tas.data[[1, 2, 3]], 111.5);
        assert_relative_eq!(tas.data[[1, 4, 4]], 122.0);
        assert_eq!(refr.data.coords["lat"].values, Array1::range(30.0, 51.0, 5.0));
        // No time coordinate on the predicted side, so time is left alone
        assert_eq!(refr.data.sizes()["time"], 2);

        Ok(())
    }

    #[test]
    fn test_mapping_onto_existing_variable() -> Result<()> {
        let predicted = grid_dataset(&["tas"], 2, 2, 2, |_, _, _| 0.0)?;
        let mut reference = grid_dataset(&["tas"], 2, 2, 2, |_, _, _| 99.0)?;
        let temperature = grid_dataset(&["temperature"], 2, 2, 2, |_, _, _| 1.0)?;
        reference.insert_variable(temperature.variables["temperature"].clone())?;
        let mut reference = loaded(reference, DatasetKind::Reference);
        reference.config.variable_mapping = Some(HashMap::from([(
            "temperature".to_string(),
            "tas".to_string(),
        )]));

        assert!(matches!(
            align_datasets(&loaded(predicted, DatasetKind::Predicted), &reference),
            Err(Error::Config(_))
        ));

        Ok(())
    }

    #[test]
    fn test_align_shifted_grid() -> Result<()> {
        // Same number of latitudes, but the reference's sit 5 degrees further north
        let predicted = grid_dataset(&["tas"], 2, 3, 2, |_, _, _| 0.0)?;
        let mut reference = grid_dataset(&["tas"], 2, 3, 2, |_, row, _| (row * 10) as f64)?;
        reference.insert_coord(Coordinate::new("lat", array![35.0, 45.0, 55.0]))?;

        let (_, refr) = align_datasets(
            &loaded(predicted.clone(), DatasetKind::Predicted),
            &loaded(reference, DatasetKind::Reference),
        )?;
        let tas = refr.variable("tas")?;
        assert_eq!(refr.data.coords["lat"], predicted.coords["lat"]);
        assert!(tas.data[[0, 0, 0]].is_nan());
        assert_relative_eq!(tas.data[[0, 1, 0]], 5.0);
        assert_relative_eq!(tas.data[[1, 2, 1]], 15.0);

        Ok(())
    }

    #[test]
    fn test_no_common_variables() -> Result<()> {
        let predicted = grid_dataset(&["tas"], 2, 2, 2, |_, _, _| 0.0)?;
        let reference = grid_dataset(&["pr"], 2, 2, 2, |_, _, _| 0.0)?;
        assert!(matches!(
            align_datasets(
                &loaded(predicted, DatasetKind::Predicted),
                &loaded(reference, DatasetKind::Reference)
            ),
            Err(Error::NoCommonVariables)
        ));

        Ok(())
    }
}
