use super::{expand_lanes, new_coordinate, require_dim, MetricParams, Operands};
use crate::{
    errors::{Error, Result},
    results::{Field, MetricValue, Table},
    stats,
};

pub const DEFAULT_MAX_LAG: usize = 30;

/// Autocorrelation function along `params.dim` (default "time") for lags 0 through
/// `params.max_lag`, of both predicted and reference values.
///
pub fn temporal_autocorrelation(
    operands: &Operands,
    params: &MetricParams,
) -> Result<MetricValue> {
    let max_lag = params.max_lag.unwrap_or(DEFAULT_MAX_LAG);
    if max_lag == 0 {
        return Err(Error::InvalidParameter("max_lag must be at least 1".into()));
    }
    let dim = params.dim.clone().unwrap_or_else(|| "time".to_string());
    require_dim(operands.predicted, &dim)?;

    let dims = [dim];
    let acf = |series: &[f64]| stats::autocorrelation(series, max_lag);
    let predicted = operands.predicted.lanes(&dims)?;
    let reference = operands.reference.lanes(&dims)?;
    let mut result_dims = predicted.dims.clone();
    result_dims.push("lag".to_string());

    let predicted = expand_lanes(&predicted, max_lag + 1, acf)?;
    let reference = expand_lanes(&reference, max_lag + 1, acf)?;
    let difference = &predicted - &reference;

    let lag = new_coordinate("lag", (0..=max_lag).map(|lag| lag as f64).collect());
    let field = |name: &str, data| {
        Field::new(name, result_dims.clone(), data, operands.coords).with_coord(lag.clone())
    };

    Ok(MetricValue::Table(Table {
        fields: vec![
            field("predicted", predicted),
            field("reference", reference),
            field("difference", difference),
        ],
    }))
}
