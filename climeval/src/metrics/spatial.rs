use ndarray::{concatenate, Axis};

use super::{reduce_lanes, require_dim, MetricParams, Operands};
use crate::{dataset::Lanes, errors::Result, results::MetricValue, stats};

/// Pearson correlation between predicted and reference values along `params.dim` (default
/// "time"), at every point of the remaining dimensions.
///
pub fn spatial_correlation(operands: &Operands, params: &MetricParams) -> Result<MetricValue> {
    let dim = params.dim.clone().unwrap_or_else(|| "time".to_string());
    require_dim(operands.predicted, &dim)?;

    let dims = [dim];
    let predicted = operands.predicted.lanes(&dims)?;
    let reference = operands.reference.lanes(&dims)?;

    // Pair the rows up side by side so the shared reducer sees both series at once
    let len = predicted.rows.ncols();
    let rows = concatenate(Axis(1), &[predicted.rows.view(), reference.rows.view()])?;
    let paired = Lanes { rows, ..predicted };

    reduce_lanes(&paired, operands.coords, |row| {
        stats::pearson(&row[..len], &row[len..])
    })
}
