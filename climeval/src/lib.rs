pub mod align;
mod cache;
pub mod config;
pub mod dataset;
pub mod dims;
mod engine;
pub mod ensemble;
mod errors;
mod helpers;
pub mod load;
pub mod metrics;
pub mod netcdf;
pub mod report;
pub mod results;
pub mod source;
pub mod stats;
pub mod time;
pub mod zarr;

#[cfg(test)]
mod testing;

pub use cache::{Cache, Cacheable};
pub use config::{load_config, EvaluationConfig, Format};
pub use dataset::{AttrValue, Coordinate, Dataset, Variable};
pub use engine::Evaluation;
pub use errors::{Error, Result};
pub use load::{guess_format, load_dataset, open_dataset, DatasetKind, LoadedDataset};
pub use report::{render_table, save_results};
pub use results::{EvaluationResults, MetricResult, MetricValue};
pub use source::Source;
