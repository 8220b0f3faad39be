use ndarray::{Array1, Array2, ArrayD, Axis, IxDyn};

use super::{new_coordinate, reduce_lanes, require_dim, MetricParams, Operands};
use crate::{
    dataset::Variable,
    dims::{LAT_NAMES, LON_NAMES},
    errors::{Error, Result},
    results::{Field, MetricValue, Table},
    stats,
};

pub const DEFAULT_QUANTILES: [f64; 7] = [0.01, 0.05, 0.25, 0.5, 0.75, 0.95, 0.99];

/// Mean difference between predicted and reference values.
///
/// Averages over `params.dims`, or over every dimension if none are given, in which case the
/// result is a single number.
///
pub fn bias(operands: &Operands, params: &MetricParams) -> Result<MetricValue> {
    let predicted = operands.predicted;
    let dims = match &params.dims {
        Some(dims) => {
            let mut unique: Vec<String> = vec![];
            for dim in dims {
                require_dim(predicted, dim)?;
                if !unique.contains(dim) {
                    unique.push(dim.clone());
                }
            }
            unique
        }
        None => predicted.dims.clone(),
    };

    let mut difference = predicted.clone();
    difference.data = &predicted.data - &operands.reference.data;
    let lanes = difference.lanes(&dims)?;

    reduce_lanes(&lanes, operands.coords, stats::nanmean)
}

/// Dimensions whose values make up the distribution: time and the spatial dimensions, or
/// everything when none of those are present.
///
fn distribution_dims(dims: &[String]) -> Vec<String> {
    let is_distribution_dim = |dim: &&String| {
        dim.as_str() == "time"
            || LAT_NAMES.contains(&dim.as_str())
            || LON_NAMES.contains(&dim.as_str())
    };
    let time = dims.iter().filter(|dim| dim.as_str() == "time");
    let spatial = dims.iter().filter(|dim| dim.as_str() != "time");
    let found: Vec<String> = time
        .chain(spatial)
        .filter(is_distribution_dim)
        .cloned()
        .collect();

    if found.is_empty() {
        dims.to_vec()
    } else {
        found
    }
}

/// Quantiles of `variable` folded along `dims`, as an array over
/// `[quantile, remaining dimensions...]`.
///
fn quantiles_along(
    variable: &Variable,
    dims: &[String],
    quantiles: &[f64],
) -> Result<(Vec<String>, ArrayD<f64>)> {
    let lanes = variable.lanes(dims)?;
    let mut by_row = Array2::from_elem((quantiles.len(), lanes.rows.nrows()), f64::NAN);
    for (i, row) in lanes.rows.rows().into_iter().enumerate() {
        let values = stats::nanquantiles(&row.to_vec(), quantiles);
        by_row.index_axis_mut(Axis(1), i).assign(&Array1::from(values));
    }

    let mut shape = vec![quantiles.len()];
    shape.extend(&lanes.shape);
    let data = by_row.into_shape(IxDyn(&shape))?;
    let mut result_dims = vec!["quantile".to_string()];
    result_dims.extend(lanes.dims);

    Ok((result_dims, data))
}

/// Compare the distributions of predicted and reference values at a set of quantiles.
///
pub fn quantile_comparison(operands: &Operands, params: &MetricParams) -> Result<MetricValue> {
    let quantiles = params
        .quantiles
        .clone()
        .unwrap_or_else(|| DEFAULT_QUANTILES.to_vec());
    if let Some(q) = quantiles.iter().find(|q| !(0.0..=1.0).contains(*q)) {
        return Err(Error::InvalidParameter(format!(
            "quantile {q} is outside of [0, 1]"
        )));
    }

    let dims = distribution_dims(&operands.predicted.dims);
    let (result_dims, predicted) = quantiles_along(operands.predicted, &dims, &quantiles)?;
    let (_, reference) = quantiles_along(operands.reference, &dims, &quantiles)?;
    let difference = &predicted - &reference;

    let quantile = new_coordinate("quantile", quantiles);
    let field = |name: &str, data: ArrayD<f64>| {
        Field::new(name, result_dims.clone(), data, operands.coords).with_coord(quantile.clone())
    };

    Ok(MetricValue::Table(Table {
        fields: vec![
            field("predicted", predicted),
            field("reference", reference),
            field("difference", difference),
        ],
    }))
}
