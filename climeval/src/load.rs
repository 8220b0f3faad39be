//! Loading the predicted and reference datasets, and cutting them down to the domain of interest.
//!
use std::{
    fmt, io,
    ops::Index,
    path::Path,
};

use tracing::{debug, info};

use crate::{
    config::{ComputeConfig, DatasetConfig, DomainConfig, Format},
    dataset::{Dataset, Variable},
    dims::{standardize_dimension_names, ENSEMBLE, LAT, LON, TIME},
    ensemble::handle_ensemble_dimension,
    errors::{Error, Result},
    netcdf::NetcdfFile,
    source::Source,
    zarr::ZarrGroup,
};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DatasetKind {
    Predicted,
    Reference,
}

impl fmt::Display for DatasetKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Predicted => "predicted",
            Self::Reference => "reference",
        };
        write!(f, "{name}")
    }
}

/// A dataset along with the configuration it was loaded from
///
#[derive(Clone, Debug)]
pub struct LoadedDataset {
    pub data: Dataset,
    pub config: DatasetConfig,
    pub kind: DatasetKind,
}

impl LoadedDataset {
    pub fn variable(&self, name: &str) -> Result<&Variable> {
        self.data.variable(name)
    }
}

impl Index<&str> for LoadedDataset {
    type Output = Variable;

    fn index(&self, name: &str) -> &Variable {
        &self.data.variables[name]
    }
}

impl fmt::Display for LoadedDataset {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} dataset ({}): {}", self.kind, self.config.format, self.data)
    }
}

/// Tell a dataset's format from its path: directories are Zarr stores, ".nc" and similar files
/// are NetCDF.
///
pub fn guess_format(path: &Path) -> Result<Format> {
    if path.is_dir() {
        return Ok(Format::Zarr);
    }
    let extension = path
        .extension()
        .and_then(|extension| extension.to_str())
        .map(str::to_ascii_lowercase);
    match extension.as_deref() {
        Some("zarr") => Ok(Format::Zarr),
        Some("nc") | Some("nc4") | Some("cdf") | Some("netcdf") => Ok(Format::Netcdf),
        Some("pt") => Ok(Format::Pt),
        _ => Err(Error::Unsupported(format!(
            "can't tell the format of {}",
            path.display()
        ))),
    }
}

/// Read variables from a dataset on disk. All data variables are read when `variables` is empty.
///
pub async fn open_dataset(
    path: &Path,
    format: Format,
    variables: &[String],
    compute: &ComputeConfig,
) -> Result<Dataset> {
    if !path.exists() {
        return Err(Error::IO(io::Error::new(
            io::ErrorKind::NotFound,
            format!("{} not found", path.display()),
        )));
    }

    let source: Box<dyn Source> = match format {
        Format::Zarr => Box::new(ZarrGroup::open_dir(
            path,
            compute.cache_bytes,
            compute.n_workers,
        )?),
        Format::Netcdf => Box::new(NetcdfFile::open(path)?),
        Format::Pt => {
            return Err(Error::Unsupported(
                "loading pt (PyTorch tensor) datasets".into(),
            ))
        }
    };

    source.read_dataset(variables).await
}

/// Load one side of the comparison: read the configured variables, standardize dimension names
/// and collapse the ensemble dimension.
///
pub async fn load_dataset(
    config: &DatasetConfig,
    kind: DatasetKind,
    compute: &ComputeConfig,
) -> Result<LoadedDataset> {
    info!(%kind, path = %config.path.display(), format = %config.format, "Loading dataset");
    let data = open_dataset(&config.path, config.format, &config.variables, compute).await?;
    let data = standardize_dimension_names(&data);
    let data = handle_ensemble_dimension(&data, config.ensemble_method(), ENSEMBLE)?;

    let loaded = LoadedDataset {
        data,
        config: config.clone(),
        kind,
    };
    info!("Loaded {loaded}");

    Ok(loaded)
}

/// Cut a dataset down to the configured domain.
///
/// Ranges are inclusive and bounds may come in either order. Times are read in the calendar of
/// the dataset's time coordinate.
///
pub fn subset_domain(dataset: &Dataset, domain: &DomainConfig) -> Result<Dataset> {
    if !domain.is_subset() {
        return Ok(dataset.clone());
    }

    let mut subset = dataset.clone();
    for (dim, range) in [(LAT, domain.lat_range), (LON, domain.lon_range)] {
        if let Some((lower, upper)) = range {
            if !subset.has_dim(dim) {
                return Err(Error::missing_dimension(dim, "dataset being subset"));
            }
            subset = subset.sel_between(dim, lower, upper)?;
        }
    }

    if let Some((start, end)) = &domain.time_range {
        let coord = subset
            .coords
            .get(TIME)
            .ok_or_else(|| Error::missing_dimension(TIME, "dataset being subset"))?;
        if !coord.is_time() {
            return Err(Error::Time(
                "time coordinate has no units, can't compare it to dates".into(),
            ));
        }
        let calendar = coord.calendar()?;
        let start = calendar.parse_datetime(start)?;
        let end = calendar.parse_datetime(end)?;
        subset = subset.sel_between(TIME, start, end)?;
    }
    debug!("Subset to {subset}");

    Ok(subset)
}
