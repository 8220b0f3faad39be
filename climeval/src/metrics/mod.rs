//! Metrics comparing a predicted variable to a reference variable.
//!
//! Every metric is registered under a name and a category. Metrics receive both variables on the
//! same grid, with the same dimensions in the same order, and skip missing (NaN) values.
//!
mod marginal;
mod spatial;
mod temporal;

use std::{collections::BTreeMap, fmt};

use ndarray::{Array1, ArrayD, IxDyn};
use serde::{Deserialize, Serialize};

use crate::{
    dataset::{Coordinate, Lanes, Variable},
    errors::{Error, Result},
    results::{Field, MetricValue},
};

pub use marginal::{bias, quantile_comparison, DEFAULT_QUANTILES};
pub use spatial::spatial_correlation;
pub use temporal::{temporal_autocorrelation, DEFAULT_MAX_LAG};

#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Category {
    /// Statistics of the distribution of values
    Marginal,

    /// Spatial structure
    Spatial,

    /// Time series behavior
    Temporal,

    /// Relationships between variables
    Multivariate,
}

impl Category {
    pub const ALL: [Category; 4] = [
        Category::Marginal,
        Category::Spatial,
        Category::Temporal,
        Category::Multivariate,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            Self::Marginal => "marginal",
            Self::Spatial => "spatial",
            Self::Temporal => "temporal",
            Self::Multivariate => "multivariate",
        }
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

/// Optional parameters of a metric. Each metric reads the ones it understands.
///
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct MetricParams {
    /// Dimensions to reduce over (bias)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dims: Option<Vec<String>>,

    /// Quantiles to compare, between 0 and 1 (quantile_comparison)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub quantiles: Option<Vec<f64>>,

    /// Largest lag, in time steps (temporal_autocorrelation)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_lag: Option<usize>,

    /// Dimension to correlate along (spatial_correlation, temporal_autocorrelation)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dim: Option<String>,
}

impl MetricParams {
    pub fn is_empty(&self) -> bool {
        self == &Self::default()
    }
}

/// A predicted and reference variable on the same grid, and the coordinates of that grid
///
pub struct Operands<'a> {
    pub predicted: &'a Variable,
    pub reference: &'a Variable,
    pub coords: &'a BTreeMap<String, Coordinate>,
}

type MetricFn = fn(&Operands, &MetricParams) -> Result<MetricValue>;

struct Metric {
    name: &'static str,
    category: Category,
    compute: MetricFn,
}

static REGISTRY: [Metric; 4] = [
    Metric {
        name: "bias",
        category: Category::Marginal,
        compute: bias,
    },
    Metric {
        name: "quantile_comparison",
        category: Category::Marginal,
        compute: quantile_comparison,
    },
    Metric {
        name: "spatial_correlation",
        category: Category::Spatial,
        compute: spatial_correlation,
    },
    Metric {
        name: "temporal_autocorrelation",
        category: Category::Temporal,
        compute: temporal_autocorrelation,
    },
];

fn lookup(name: &str) -> Result<&'static Metric> {
    REGISTRY
        .iter()
        .find(|metric| metric.name == name)
        .ok_or_else(|| Error::UnknownMetric(name.to_string()))
}

/// The category a metric is registered under, or `None` if there's no such metric
pub fn category_of(name: &str) -> Option<Category> {
    lookup(name).ok().map(|metric| metric.category)
}

/// Names of every registered metric in a category
pub fn registered(category: Category) -> Vec<&'static str> {
    REGISTRY
        .iter()
        .filter(|metric| metric.category == category)
        .map(|metric| metric.name)
        .collect()
}

/// Compute the named metric.
///
/// The reference is first brought into the dimension order of the predicted variable. Variables
/// with different dimensions, or different lengths along them, can't be compared.
///
pub fn compute(name: &str, operands: &Operands, params: &MetricParams) -> Result<MetricValue> {
    let metric = lookup(name)?;
    let reference = conform(operands.predicted, operands.reference)?;
    let operands = Operands {
        reference: &reference,
        ..*operands
    };

    (metric.compute)(&operands, params)
}

fn conform(predicted: &Variable, reference: &Variable) -> Result<Variable> {
    let reference = reference.transpose_to(&predicted.dims)?;
    if reference.data.shape() != predicted.data.shape() {
        return Err(Error::Misaligned(format!(
            "{} has shape {:?} in predicted data but {:?} in reference data",
            predicted.name,
            predicted.data.shape(),
            reference.data.shape()
        )));
    }

    Ok(reference)
}

/// Make sure a dimension named in a metric's parameters exists
fn require_dim(variable: &Variable, dim: &str) -> Result<()> {
    if variable.has_dim(dim) {
        Ok(())
    } else {
        Err(Error::missing_dimension(dim, format!("variable {}", variable.name)))
    }
}

/// Reduce each row of some lanes to a single value, giving a field over the remaining
/// dimensions, or a scalar if no dimensions remain.
///
fn reduce_lanes<F>(
    lanes: &Lanes,
    coords: &BTreeMap<String, Coordinate>,
    reduce: F,
) -> Result<MetricValue>
where
    F: Fn(&[f64]) -> f64,
{
    let values: Vec<f64> = lanes
        .rows
        .rows()
        .into_iter()
        .map(|row| reduce(&row.to_vec()))
        .collect();

    if lanes.dims.is_empty() {
        return Ok(MetricValue::Scalar(values.first().copied().unwrap_or(f64::NAN)));
    }

    let data = ArrayD::from_shape_vec(IxDyn(&lanes.shape), values)?;
    Ok(MetricValue::Field(Field::new(
        "value",
        lanes.dims.clone(),
        data,
        coords,
    )))
}

/// Apply a vector valued function to each row of some lanes, giving an array over the remaining
/// dimensions plus one new trailing dimension of length `len`.
///
fn expand_lanes<F>(lanes: &Lanes, len: usize, expand: F) -> Result<ArrayD<f64>>
where
    F: Fn(&[f64]) -> Vec<f64>,
{
    let mut values = Vec::with_capacity(lanes.rows.nrows() * len);
    for row in lanes.rows.rows() {
        values.extend(expand(&row.to_vec()));
    }
    let mut shape = lanes.shape.clone();
    shape.push(len);

    Ok(ArrayD::from_shape_vec(IxDyn(&shape), values)?)
}

/// A coordinate for a dimension that a metric adds to its result
fn new_coordinate(name: &str, values: Vec<f64>) -> Coordinate {
    Coordinate::new(name, Array1::from(values))
}
