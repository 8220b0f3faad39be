use std::fmt;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::{
    dataset::{Dataset, Reduction},
    errors::Result,
};

/// What to do with the ensemble member dimension of a dataset
///
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EnsembleMethod {
    /// Average over members
    #[default]
    Mean,

    /// Median over members
    Median,

    /// Keep only the first member
    Select,

    /// Leave the dimension as it is
    Keep,
}

impl fmt::Display for EnsembleMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Mean => "mean",
            Self::Median => "median",
            Self::Select => "select",
            Self::Keep => "keep",
        };
        write!(f, "{name}")
    }
}

/// Collapse the ensemble dimension `dim` of a dataset according to `method`.
///
/// A dataset without the dimension is returned unchanged.
///
pub fn handle_ensemble_dimension(
    dataset: &Dataset,
    method: EnsembleMethod,
    dim: &str,
) -> Result<Dataset> {
    if !dataset.has_dim(dim) {
        return Ok(dataset.clone());
    }
    debug!(%dim, %method, "Handling ensemble dimension");

    match method {
        EnsembleMethod::Mean => dataset.reduce_dim(dim, Reduction::Mean),
        EnsembleMethod::Median => dataset.reduce_dim(dim, Reduction::Median),
        EnsembleMethod::Select => dataset.index_dim(dim, 0),
        EnsembleMethod::Keep => Ok(dataset.clone()),
    }
}
