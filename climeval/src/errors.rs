use std::fmt;
use std::io;
use std::result;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("i/o error: {0}")]
    IO(#[from] io::Error),

    #[error("unable to parse YAML: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("unable to parse JSON metadata: {0}")]
    Json(#[from] serde_json::Error),

    #[error("invalid configuration: {0}")]
    Config(String),

    #[error("no such variable or result: {0}")]
    BadName(String),

    #[error("netcdf error: {0}")]
    Netcdf(#[from] netcdf::Error),

    #[error("zarr error: {0}")]
    Zarr(String),

    #[error("dimension '{dim}' not found in {context}")]
    MissingDimension { dim: String, context: String },

    #[error("malformed {format} data: {message}")]
    Format {
        format: &'static str,
        message: String,
    },

    #[error("unsupported: {0}")]
    Unsupported(String),

    #[error("unknown metric: {0}")]
    UnknownMetric(String),

    #[error("invalid parameter: {0}")]
    InvalidParameter(String),

    #[error("predicted and reference data are not aligned: {0}")]
    Misaligned(String),

    #[error("predicted and reference datasets have no variables in common")]
    NoCommonVariables,

    #[error("unable to interpret time: {0}")]
    Time(String),

    #[error("array shape error: {0}")]
    Shape(#[from] ndarray::ShapeError),

    #[error("object could not be loaded from the store")]
    Load,
}

impl Error {
    pub(crate) fn format<S: Into<String>>(format: &'static str, message: S) -> Self {
        Self::Format {
            format,
            message: message.into(),
        }
    }

    pub(crate) fn zarr<E: fmt::Display>(err: E) -> Self {
        Self::Zarr(err.to_string())
    }

    pub(crate) fn missing_dimension<D, C>(dim: D, context: C) -> Self
    where
        D: Into<String>,
        C: Into<String>,
    {
        Self::MissingDimension {
            dim: dim.into(),
            context: context.into(),
        }
    }
}

pub type Result<T> = result::Result<T, Error>;
