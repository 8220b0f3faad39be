//! Fixtures shared by the unit tests.
//!
use std::{fs, path::Path, sync::Arc};

use ndarray::{Array1, Array3, ArrayD, Dimension, IxDyn, Slice};
use serde_json::{json, Map, Value};
use zarrs::{
    array::{
        codec::{
            bytes_to_bytes::blosc::{
                BloscCodec, BloscCompressionLevel, BloscCompressor, BloscShuffleMode,
            },
            BytesToBytesCodecTraits, Crc32cCodec, GzipCodec,
        },
        ArrayBuilder, DataType, FillValue,
    },
    filesystem::FilesystemStore,
    group::GroupBuilder,
    storage::{store::MemoryStore, ReadableListableStorage, ReadableWritableListableStorage},
};

use crate::{
    config::EvaluationConfig,
    dataset::{Coordinate, Dataset, Variable},
    errors::{Error, Result},
    time::EPOCH_UNITS,
};

pub(crate) fn strings(names: &[&str]) -> Vec<String> {
    names.iter().map(|name| name.to_string()).collect()
}

/// A dataset of variables over (time, lat, lon) with daily times starting at the epoch,
/// latitudes 30, 40, ... and longitudes 0, 10, ...
///
pub(crate) fn grid_dataset<F>(
    names: &[&str],
    nt: usize,
    nlat: usize,
    nlon: usize,
    f: F,
) -> Result<Dataset>
where
    F: Fn(usize, usize, usize) -> f64,
{
    let mut dataset = Dataset::new();
    dataset.insert_coord(
        Coordinate::new("time", Array1::from_shape_fn(nt, |t| t as f64 * 86400.0))
            .with_attr("units", EPOCH_UNITS),
    )?;
    dataset.insert_coord(Coordinate::new(
        "lat",
        Array1::from_shape_fn(nlat, |row| 30.0 + 10.0 * row as f64),
    ))?;
    dataset.insert_coord(Coordinate::new(
        "lon",
        Array1::from_shape_fn(nlon, |col| 10.0 * col as f64),
    ))?;

    for name in names {
        let data = Array3::from_shape_fn((nt, nlat, nlon), |(t, row, col)| f(t, row, col));
        dataset.insert_variable(Variable::new(
            *name,
            strings(&["time", "lat", "lon"]),
            data.into_dyn(),
        )?)?;
    }

    Ok(dataset)
}

pub(crate) fn minimal_config() -> EvaluationConfig {
    EvaluationConfig::from_yaml_str(concat!(
        "project_name: test\n",
        "data:\n",
        "  predicted: {path: predicted.zarr, format: zarr}\n",
        "  reference: {path: reference.nc, format: netcdf}\n",
    ))
    .expect("minimal configuration parses")
}

/// How a fixture array's chunks are encoded
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum Codec {
    Raw,
    Gzip,
    Crc32c,
    Blosc,
}

impl Codec {
    fn build(&self) -> Result<Vec<Arc<dyn BytesToBytesCodecTraits>>> {
        let codec: Arc<dyn BytesToBytesCodecTraits> = match self {
            Self::Raw => return Ok(vec![]),
            Self::Gzip => Arc::new(GzipCodec::new(5).map_err(Error::zarr)?),
            Self::Crc32c => Arc::new(Crc32cCodec::new()),
            Self::Blosc => Arc::new(
                BloscCodec::new(
                    BloscCompressor::LZ4,
                    BloscCompressionLevel::try_from(5).expect("valid blosc level"),
                    None,
                    BloscShuffleMode::Shuffle,
                    Some(8),
                )
                .map_err(Error::zarr)?,
            ),
        };

        Ok(vec![codec])
    }
}

struct FixtureArray {
    name: String,
    dims: Vec<String>,
    data: ArrayD<f64>,
    chunks: Vec<u64>,
    int16: bool,
    codec: Codec,
    fill_value: f64,
    attrs: Map<String, Value>,

    /// Chunks left unwritten
    missing: Vec<Vec<u64>>,
}

impl FixtureArray {
    fn write(&self, storage: &ReadableWritableListableStorage) -> Result<()> {
        let shape: Vec<u64> = self.data.shape().iter().map(|&n| n as u64).collect();
        let (data_type, fill_value) = if self.int16 {
            (DataType::Int16, FillValue::from(self.fill_value as i16))
        } else {
            (DataType::Float64, FillValue::from(self.fill_value))
        };
        let chunk_grid = self.chunks.clone().try_into().map_err(Error::zarr)?;
        let array = ArrayBuilder::new(shape, data_type, chunk_grid, fill_value)
            .bytes_to_bytes_codecs(self.codec.build()?)
            .dimension_names(Some(self.dims.iter().map(String::as_str).collect::<Vec<_>>()))
            .attributes(self.attrs.clone())
            .build(Arc::clone(storage), &format!("/{}", self.name))
            .map_err(Error::zarr)?;
        array.store_metadata().map_err(Error::zarr)?;

        let grid: Vec<usize> = array
            .chunk_grid_shape()
            .unwrap_or_default()
            .iter()
            .map(|&n| n as usize)
            .collect();
        for index in ndarray::indices(IxDyn(&grid)) {
            let index: Vec<u64> = index.slice().iter().map(|&i| i as u64).collect();
            if self.missing.contains(&index) {
                continue;
            }
            let subset = array.chunk_subset_bounded(&index).map_err(Error::zarr)?;
            let values: Vec<f64> = self
                .data
                .slice_each_axis(|axis| {
                    let start = subset.start()[axis.axis.index()] as usize;
                    let len = subset.shape()[axis.axis.index()] as usize;
                    Slice::from(start..start + len)
                })
                .iter()
                .copied()
                .collect();
            let stored = if self.int16 {
                let values: Vec<i16> = values.iter().map(|&v| v as i16).collect();
                array.store_array_subset_elements(&subset, &values)
            } else {
                array.store_array_subset_elements(&subset, &values)
            };
            stored.map_err(Error::zarr)?;
        }

        Ok(())
    }
}

/// Builds small Zarr groups, in memory or on disk.
///
pub(crate) struct ZarrFixture {
    arrays: Vec<FixtureArray>,
    group_attrs: Map<String, Value>,
}

impl ZarrFixture {
    pub(crate) fn new() -> Self {
        Self {
            arrays: vec![],
            group_attrs: Map::new(),
        }
    }

    /// A float64 array stored as a single uncompressed chunk
    pub(crate) fn array(self, name: &str, dims: &[&str], data: ArrayD<f64>) -> Self {
        let chunks: Vec<u64> = data.shape().iter().map(|&n| n.max(1) as u64).collect();
        self.chunked(name, dims, data, &chunks, Codec::Raw)
    }

    pub(crate) fn chunked(
        mut self,
        name: &str,
        dims: &[&str],
        data: ArrayD<f64>,
        chunks: &[u64],
        codec: Codec,
    ) -> Self {
        self.arrays.push(FixtureArray {
            name: name.to_string(),
            dims: strings(dims),
            data,
            chunks: chunks.to_vec(),
            int16: false,
            codec,
            fill_value: f64::NAN,
            attrs: Map::new(),
            missing: vec![],
        });
        self
    }

    /// An int16 array, compressed with gzip
    pub(crate) fn int16(
        self,
        name: &str,
        dims: &[&str],
        data: ArrayD<f64>,
        chunks: &[u64],
    ) -> Self {
        let mut fixture = self.chunked(name, dims, data, chunks, Codec::Gzip);
        let array = fixture.array_mut(name);
        array.int16 = true;
        array.fill_value = 0.0;
        fixture
    }

    fn array_mut(&mut self, name: &str) -> &mut FixtureArray {
        self.arrays
            .iter_mut()
            .find(|array| array.name == name)
            .expect("no such fixture array")
    }

    pub(crate) fn attr(mut self, name: &str, key: &str, value: &str) -> Self {
        self.array_mut(name).attrs.insert(key.to_string(), json!(value));
        self
    }

    pub(crate) fn attr_number(mut self, name: &str, key: &str, value: f64) -> Self {
        self.array_mut(name).attrs.insert(key.to_string(), json!(value));
        self
    }

    pub(crate) fn fill_value(mut self, name: &str, value: f64) -> Self {
        self.array_mut(name).fill_value = value;
        self
    }

    pub(crate) fn group_attr(mut self, key: &str, value: &str) -> Self {
        self.group_attrs.insert(key.to_string(), json!(value));
        self
    }

    /// Leave a chunk of an array unwritten
    pub(crate) fn without(mut self, name: &str, chunk: &[u64]) -> Self {
        self.array_mut(name).missing.push(chunk.to_vec());
        self
    }

    fn write(&self, storage: ReadableWritableListableStorage) -> Result<()> {
        GroupBuilder::new()
            .attributes(self.group_attrs.clone())
            .build(Arc::clone(&storage), "/")
            .map_err(Error::zarr)?
            .store_metadata()
            .map_err(Error::zarr)?;
        for array in &self.arrays {
            array.write(&storage)?;
        }

        Ok(())
    }

    pub(crate) fn memory_store(&self) -> Result<ReadableListableStorage> {
        let store = Arc::new(MemoryStore::new());
        self.write(store.clone())?;

        Ok(store)
    }

    pub(crate) fn write_dir(&self, dir: &Path) -> Result<()> {
        fs::create_dir_all(dir)?;
        let store = FilesystemStore::new(dir).map_err(Error::zarr)?;

        self.write(Arc::new(store))
    }
}
