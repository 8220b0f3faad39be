//! Evaluation configuration, read from YAML.
//!
use std::{
    collections::HashMap,
    fmt,
    path::{Path, PathBuf},
};

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::{
    ensemble::EnsembleMethod,
    errors::{Error, Result},
    metrics::{self, Category, MetricParams},
    time::Calendar,
};

const DEFAULT_N_WORKERS: usize = 4;
const DEFAULT_CACHE_BYTES: u64 = 256 * 1024 * 1024;
const DEFAULT_OUTPUT_DIR: &str = "./results";

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct EvaluationConfig {
    pub project_name: String,

    #[serde(default)]
    pub description: String,

    pub data: DataConfig,

    #[serde(default)]
    pub domain: DomainConfig,

    #[serde(default)]
    pub metrics: MetricsConfig,

    #[serde(default)]
    pub compute: ComputeConfig,

    #[serde(default)]
    pub output: OutputConfig,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct DataConfig {
    pub predicted: DatasetConfig,
    pub reference: DatasetConfig,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Format {
    Zarr,
    Netcdf,

    /// Directories of PyTorch tensors
    Pt,
}

impl fmt::Display for Format {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Zarr => "zarr",
            Self::Netcdf => "netcdf",
            Self::Pt => "pt",
        };
        write!(f, "{name}")
    }
}

/// Where to find one of the datasets being compared and what to take from it
///
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct DatasetConfig {
    pub path: PathBuf,
    pub format: Format,

    /// Variables to load. All data variables are loaded when empty.
    #[serde(default)]
    pub variables: Vec<String>,

    /// Renames applied to this dataset's variables, from its own name to the name used in the
    /// other dataset
    #[serde(default)]
    pub variable_mapping: Option<HashMap<String, String>>,

    #[serde(default)]
    pub ensemble_method: Option<EnsembleMethod>,
}

impl DatasetConfig {
    pub fn ensemble_method(&self) -> EnsembleMethod {
        self.ensemble_method.unwrap_or_default()
    }
}

/// Bounds to subset both datasets to, inclusive and in either order
///
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct DomainConfig {
    #[serde(default)]
    pub lat_range: Option<(f64, f64)>,

    #[serde(default)]
    pub lon_range: Option<(f64, f64)>,

    /// Dates, eg "2000-01-01" or "2000-01-01 12:00:00"
    #[serde(default)]
    pub time_range: Option<(String, String)>,
}

impl DomainConfig {
    pub fn is_subset(&self) -> bool {
        self.lat_range.is_some() || self.lon_range.is_some() || self.time_range.is_some()
    }

    fn validate(&self) -> Result<()> {
        for (name, range) in [("lat_range", self.lat_range), ("lon_range", self.lon_range)] {
            if let Some((lower, upper)) = range {
                if !lower.is_finite() || !upper.is_finite() {
                    return Err(Error::Config(format!("{name} bounds must be finite")));
                }
            }
        }
        if let Some((start, end)) = &self.time_range {
            for bound in [start, end] {
                // 360 day dates like Feb 30 are legitimate, so accept a bound any calendar can read
                let readable = [Calendar::Standard, Calendar::Day360]
                    .iter()
                    .any(|calendar| calendar.parse_datetime(bound).is_ok());
                if !readable {
                    return Err(Error::Config(format!("can't read time_range bound '{bound}'")));
                }
            }
        }

        Ok(())
    }
}

/// A metric to compute, by name, with optional parameters.
///
/// In YAML either a bare name, `bias`, or a map, `{name: bias, dims: [time]}`.
///
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(from = "MetricEntry")]
pub struct MetricSpec {
    pub name: String,

    #[serde(flatten)]
    pub params: MetricParams,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum MetricEntry {
    Name(String),
    Detailed {
        name: String,

        #[serde(flatten)]
        params: MetricParams,
    },
}

impl From<MetricEntry> for MetricSpec {
    fn from(entry: MetricEntry) -> Self {
        match entry {
            MetricEntry::Name(name) => Self {
                name,
                params: MetricParams::default(),
            },
            MetricEntry::Detailed { name, params } => Self { name, params },
        }
    }
}

impl MetricSpec {
    pub fn new<S: Into<String>>(name: S) -> Self {
        Self {
            name: name.into(),
            params: MetricParams::default(),
        }
    }
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct MetricsConfig {
    #[serde(default)]
    pub marginal: Vec<MetricSpec>,

    #[serde(default)]
    pub spatial: Vec<MetricSpec>,

    #[serde(default)]
    pub temporal: Vec<MetricSpec>,

    #[serde(default)]
    pub multivariate: Vec<MetricSpec>,
}

impl MetricsConfig {
    pub fn category(&self, category: Category) -> &[MetricSpec] {
        match category {
            Category::Marginal => &self.marginal,
            Category::Spatial => &self.spatial,
            Category::Temporal => &self.temporal,
            Category::Multivariate => &self.multivariate,
        }
    }

    /// Every configured metric with the category it was listed under, marginal metrics first,
    /// then spatial, temporal and multivariate.
    ///
    pub fn by_category(&self) -> Vec<(Category, &MetricSpec)> {
        Category::ALL
            .iter()
            .flat_map(|&category| self.category(category).iter().map(move |m| (category, m)))
            .collect()
    }

    pub fn all_metrics(&self) -> Vec<&MetricSpec> {
        self.by_category().into_iter().map(|(_, m)| m).collect()
    }

    fn validate(&self) -> Result<()> {
        for (listed, metric) in self.by_category() {
            let registered = metrics::category_of(&metric.name).ok_or_else(|| {
                Error::Config(format!("unknown {listed} metric '{}'", metric.name))
            })?;
            if registered != listed {
                warn!(
                    metric = %metric.name,
                    %listed,
                    %registered,
                    "Metric listed under another category"
                );
            }

            let params = &metric.params;
            if let Some(q) = params
                .quantiles
                .iter()
                .flatten()
                .find(|q| !(0.0..=1.0).contains(*q))
            {
                return Err(Error::Config(format!(
                    "quantile {q} of metric '{}' is outside of [0, 1]",
                    metric.name
                )));
            }
            if params.max_lag == Some(0) {
                return Err(Error::Config(format!(
                    "max_lag of metric '{}' must be at least 1",
                    metric.name
                )));
            }
        }

        Ok(())
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ComputeConfig {
    /// How many chunk loads to have in flight at once
    #[serde(default = "default_n_workers")]
    pub n_workers: usize,

    /// Size limit of the decoded chunk cache, in bytes
    #[serde(default = "default_cache_bytes")]
    pub cache_bytes: u64,
}

impl Default for ComputeConfig {
    fn default() -> Self {
        Self {
            n_workers: DEFAULT_N_WORKERS,
            cache_bytes: DEFAULT_CACHE_BYTES,
        }
    }
}

fn default_n_workers() -> usize {
    DEFAULT_N_WORKERS
}

fn default_cache_bytes() -> u64 {
    DEFAULT_CACHE_BYTES
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct OutputConfig {
    #[serde(default = "default_output_dir")]
    pub dir: PathBuf,

    /// Also write the aligned datasets the metrics were computed from
    #[serde(default = "default_true")]
    pub save_intermediate: bool,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            dir: default_output_dir(),
            save_intermediate: true,
        }
    }
}

fn default_output_dir() -> PathBuf {
    PathBuf::from(DEFAULT_OUTPUT_DIR)
}

fn default_true() -> bool {
    true
}

impl EvaluationConfig {
    /// Read a configuration from a YAML file
    ///
    pub fn from_yaml<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        info!(path = %path.display(), "Loading configuration");
        let text = std::fs::read_to_string(path)?;

        Self::from_yaml_str(&text)
    }

    pub fn from_yaml_str(text: &str) -> Result<Self> {
        let config: Self = serde_yaml::from_str(text)?;
        info!(
            project = %config.project_name,
            metrics = config.metrics.all_metrics().len(),
            "Configured evaluation"
        );

        Ok(config)
    }

    /// Check the configuration for problems that would otherwise only surface partway through an
    /// evaluation.
    ///
    pub fn validate(&self) -> Result<()> {
        let name = &self.project_name;
        if name.trim().is_empty() {
            return Err(Error::Config("project_name must not be empty".into()));
        }
        if name.contains(['/', '\\']) || name == "." || name == ".." {
            return Err(Error::Config(format!(
                "project_name '{name}' must not be a path"
            )));
        }
        if self.compute.n_workers == 0 {
            return Err(Error::Config("compute.n_workers must be at least 1".into()));
        }

        self.domain.validate()?;
        self.metrics.validate()
    }

    /// Directory results are written to
    pub fn output_dir(&self) -> PathBuf {
        self.output.dir.join(&self.project_name)
    }
}

/// Read and validate a configuration file.
///
pub fn load_config<P: AsRef<Path>>(path: P) -> Result<EvaluationConfig> {
    let config = EvaluationConfig::from_yaml(path)?;
    config.validate()?;

    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;

    const CONFIG: &str = r#"
project_name: wgan_eval
description: Downscaled temperature against observations
data:
  predicted:
    path: /data/predicted.zarr
    format: zarr
    variables: [tas, pr]
    ensemble_method: null
  reference:
    path: /data/reference.nc
    format: netcdf
    variables: [temperature, precipitation]
    variable_mapping:
      temperature: tas
      precipitation: pr
    ensemble_method: select
domain:
  lat_range: [60, 40]
  time_range: ["2000-01-01", "2000-12-31"]
metrics:
  marginal:
    - bias
    - name: quantile_comparison
      quantiles: [0.1, 0.9]
  spatial: [spatial_correlation]
  temporal:
    - name: temporal_autocorrelation
      max_lag: 10
compute:
  use_dask: true
  n_workers: 2
output:
  dir: /tmp/results
  formats: [png]
  dpi: 300
"#;

    #[test]
    fn test_parse() -> Result<()> {
        let config = EvaluationConfig::from_yaml_str(CONFIG)?;
        config.validate()?;

        assert_eq!(config.project_name, "wgan_eval");
        assert_eq!(config.data.predicted.format, Format::Zarr);
        assert_eq!(config.data.predicted.variables, vec!["tas", "pr"]);
        assert_eq!(config.data.predicted.ensemble_method(), EnsembleMethod::Mean);
        assert_eq!(
            config.data.reference.ensemble_method(),
            EnsembleMethod::Select
        );
        let mapping = config.data.reference.variable_mapping.as_ref().unwrap();
        assert_eq!(mapping["temperature"], "tas");

        assert!(config.domain.is_subset());
        assert_eq!(config.domain.lat_range, Some((60.0, 40.0)));
        assert_eq!(config.domain.lon_range, None);

        let all = config.metrics.all_metrics();
        assert_eq!(all.len(), 4);
        assert_eq!(all[0], &MetricSpec::new("bias"));
        assert_eq!(all[1].params.quantiles, Some(vec![0.1, 0.9]));
        assert_eq!(all[3].params.max_lag, Some(10));

        assert_eq!(config.compute.n_workers, 2);
        assert_eq!(config.compute.cache_bytes, DEFAULT_CACHE_BYTES);
        assert_eq!(config.output.dir, PathBuf::from("/tmp/results"));
        assert!(config.output.save_intermediate);
        assert_eq!(config.output_dir(), PathBuf::from("/tmp/results/wgan_eval"));

        Ok(())
    }

    #[test]
    fn test_defaults() -> Result<()> {
        let config = EvaluationConfig::from_yaml_str(concat!(
            "project_name: p\n",
            "data:\n",
            "  predicted: {path: a.zarr, format: zarr}\n",
            "  reference: {path: b.nc, format: netcdf}\n",
        ))?;
        config.validate()?;

        assert_eq!(config.description, "");
        assert!(!config.domain.is_subset());
        assert!(config.metrics.all_metrics().is_empty());
        assert_eq!(config.compute, ComputeConfig::default());
        assert_eq!(config.output.dir, PathBuf::from("./results"));
        assert!(config.data.predicted.variables.is_empty());
        assert_eq!(config.data.predicted.variable_mapping, None);

        Ok(())
    }

    #[test]
    fn test_missing_required() {
        assert!(matches!(
            EvaluationConfig::from_yaml_str("project_name: p\n"),
            Err(Error::Yaml(_))
        ));
        assert!(EvaluationConfig::from_yaml_str(concat!(
            "project_name: p\n",
            "data:\n",
            "  predicted: {path: a, format: grib}\n",
            "  reference: {path: b, format: netcdf}\n",
        ))
        .is_err());
    }

    fn invalid(edit: impl FnOnce(&mut EvaluationConfig)) -> bool {
        let mut config = EvaluationConfig::from_yaml_str(CONFIG).unwrap();
        edit(&mut config);
        matches!(config.validate(), Err(Error::Config(_)))
    }

    #[test]
    fn test_validate() {
        assert!(invalid(|c| c.project_name = "".into()));
        assert!(invalid(|c| c.project_name = "../elsewhere".into()));
        assert!(invalid(|c| c.compute.n_workers = 0));
        assert!(invalid(|c| c.metrics.marginal.push(MetricSpec::new("rmse"))));
        assert!(invalid(|c| c.metrics.multivariate.push(MetricSpec::new("copula"))));
        assert!(invalid(|c| c.metrics.temporal[0].params.max_lag = Some(0)));
        assert!(invalid(|c| c.metrics.marginal[1].params.quantiles = Some(vec![1.5])));
        assert!(invalid(|c| c.domain.lon_range = Some((f64::NAN, 10.0))));
        assert!(invalid(|c| c.domain.time_range = Some(("soon".into(), "later".into()))));

        // Listed under the wrong category is only worth a warning
        assert!(!invalid(|c| c.metrics.spatial.push(MetricSpec::new("bias"))));
        assert!(!invalid(|c| {
            c.domain.time_range = Some(("2000-02-30".into(), "2000-03-01".into()))
        }));
    }

    #[test]
    fn test_load_config() -> Result<()> {
        let dir = tempfile::tempdir()?;
        let path = dir.path().join("config.yaml");
        std::fs::write(&path, CONFIG)?;
        let config = load_config(&path)?;
        assert_eq!(config.project_name, "wgan_eval");

        assert!(matches!(
            load_config(dir.path().join("nope.yaml")),
            Err(Error::IO(_))
        ));

        Ok(())
    }
}
