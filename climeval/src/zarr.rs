//! Reading Zarr (v2 and v3) groups.
//!
//! A group's arrays become the variables and coordinates of a `Dataset`, following the xarray
//! conventions for naming dimensions. Decoded chunks are kept in a shared LRU cache, and the
//! chunks of an array are loaded concurrently.
//!
use std::{collections::BTreeMap, path::Path, sync::Arc};

use async_trait::async_trait;
use futures::{
    stream::{self, StreamExt, TryStreamExt},
    FutureExt,
};
use ndarray::{ArrayD, ArrayView, Dimension, IxDyn, Slice};
use serde_json::{Map, Value};
use tracing::{debug, info};
use zarrs::{
    array::{Array, DataType},
    array_subset::ArraySubset,
    filesystem::FilesystemStore,
    group::Group,
    node::{Node, NodeMetadata},
    storage::{
        ListableStorageTraits, ReadableListableStorage, ReadableListableStorageTraits,
        StorePrefix,
    },
};

use crate::{
    cache::{Cache, Cacheable},
    dataset::{AttrValue, Attributes, Variable},
    errors::{Error, Result},
    source::Source,
};

const FORMAT: &str = "zarr";

/// Attribute xarray uses to name the dimensions of a v2 array
const DIMENSIONS: &str = "_ARRAY_DIMENSIONS";

/// Run `$body` with `$t` naming the element type of a numeric zarr data type, or evaluate
/// `$otherwise` for any other data type.
macro_rules! numeric {
    ($data_type:expr, $t:ident => $body:expr, _ => $otherwise:expr) => {
        match $data_type {
            DataType::Int8 => {
                type $t = i8;
                $body
            }
            DataType::Int16 => {
                type $t = i16;
                $body
            }
            DataType::Int32 => {
                type $t = i32;
                $body
            }
            DataType::Int64 => {
                type $t = i64;
                $body
            }
            DataType::UInt8 => {
                type $t = u8;
                $body
            }
            DataType::UInt16 => {
                type $t = u16;
                $body
            }
            DataType::UInt32 => {
                type $t = u32;
                $body
            }
            DataType::UInt64 => {
                type $t = u64;
                $body
            }
            DataType::Float32 => {
                type $t = f32;
                $body
            }
            DataType::Float64 => {
                type $t = f64;
                $body
            }
            _ => $otherwise,
        }
    };
}

type ZarrArray = Array<dyn ReadableListableStorageTraits>;

/// Cache key for a chunk: the index of its array in the group and its index in the chunk grid,
/// flattened.
type ChunkKey = (usize, usize);

/// The decoded values of one chunk, cut down to the part inside the array
pub(crate) struct Chunk {
    start: Vec<usize>,
    shape: Vec<usize>,
    values: Vec<f64>,
}

impl Cacheable for Chunk {
    fn size(&self) -> u64 {
        (self.values.len() * std::mem::size_of::<f64>()) as u64
    }
}

struct Member {
    array: Arc<ZarrArray>,
    dims: Vec<String>,
    attrs: Attributes,
    fill_value: Option<f64>,
}

impl Member {
    fn new(name: &str, array: ZarrArray) -> Result<Self> {
        let ndim = array.shape().len();
        let dims = array_dimensions(array.attributes())
            .or_else(|| {
                array
                    .dimension_names()
                    .as_ref()?
                    .iter()
                    .map(|dim| dim.as_str().map(str::to_string))
                    .collect()
            })
            .unwrap_or_else(|| (0..ndim).map(|axis| format!("{name}_dim_{axis}")).collect());
        if dims.len() != ndim {
            return Err(Error::format(
                FORMAT,
                format!("array {name} names {} dimensions but has {ndim}", dims.len()),
            ));
        }

        Ok(Self {
            dims,
            attrs: attributes(array.attributes()),
            fill_value: fill_value(&array),
            array: Arc::new(array),
        })
    }

    fn is_numeric(&self) -> bool {
        matches!(
            self.array.data_type(),
            DataType::Int8
                | DataType::Int16
                | DataType::Int32
                | DataType::Int64
                | DataType::UInt8
                | DataType::UInt16
                | DataType::UInt32
                | DataType::UInt64
                | DataType::Float32
                | DataType::Float64
        )
    }
}

/// An open Zarr group
///
pub struct ZarrGroup {
    attrs: Attributes,
    arrays: BTreeMap<String, Member>,
    cache: Cache<ChunkKey, Chunk>,
    n_workers: usize,
}

impl ZarrGroup {
    /// Open the group at the root of `storage` and read the metadata of its arrays.
    ///
    /// * `cache_bytes` - Size limit of the decoded chunk cache
    /// * `n_workers` - Number of chunk loads allowed in flight at once
    ///
    pub fn open(
        storage: ReadableListableStorage,
        cache_bytes: u64,
        n_workers: usize,
    ) -> Result<Self> {
        let root = storage.list_dir(&StorePrefix::root()).map_err(Error::zarr)?;
        let has_group = root
            .keys()
            .iter()
            .any(|key| matches!(key.as_str(), "zarr.json" | ".zgroup"));
        if !has_group {
            return Err(Error::format(FORMAT, "no zarr group found at root of store"));
        }

        let group = Group::open(Arc::clone(&storage), "/").map_err(Error::zarr)?;
        let node = Node::open(&storage, "/").map_err(Error::zarr)?;
        let mut arrays = BTreeMap::new();
        for child in node.children() {
            if !matches!(child.metadata(), NodeMetadata::Array(_)) {
                continue;
            }
            let path = child.path().as_str();
            let name = path.trim_start_matches('/');
            let array = Array::open(Arc::clone(&storage), path).map_err(Error::zarr)?;
            arrays.insert(name.to_string(), Member::new(name, array)?);
        }
        info!(arrays = arrays.len(), "Opened zarr group");

        Ok(Self {
            attrs: attributes(group.attributes()),
            arrays,
            cache: Cache::new(cache_bytes),
            n_workers: n_workers.max(1),
        })
    }

    /// Open a group kept in a directory of the local filesystem
    pub fn open_dir<P: AsRef<Path>>(path: P, cache_bytes: u64, n_workers: usize) -> Result<Self> {
        let store = FilesystemStore::new(path.as_ref()).map_err(Error::zarr)?;

        Self::open(Arc::new(store), cache_bytes, n_workers)
    }

    fn member(&self, name: &str) -> Result<(usize, &Member)> {
        self.arrays
            .iter()
            .enumerate()
            .find(|(_, (key, _))| *key == name)
            .map(|(id, (_, member))| (id, member))
            .ok_or_else(|| Error::BadName(name.to_string()))
    }

    async fn load_chunk(
        &self,
        id: usize,
        member: &Member,
        index: Vec<u64>,
        linear: usize,
    ) -> Result<Arc<Chunk>> {
        let array = Arc::clone(&member.array);
        let load = move |_| {
            async move {
                let subset = array.chunk_subset_bounded(&index).map_err(Error::zarr)?;
                let values = retrieve(&array, &subset)?;

                Ok(Some(Chunk {
                    start: subset.start().iter().map(|&i| i as usize).collect(),
                    shape: subset.shape().iter().map(|&n| n as usize).collect(),
                    values,
                }))
            }
            .boxed()
        };

        self.cache.get(&(id, linear), load).await
    }
}

#[async_trait]
impl Source for ZarrGroup {
    fn attrs(&self) -> &Attributes {
        &self.attrs
    }

    fn names(&self) -> Vec<String> {
        self.arrays
            .iter()
            .filter(|(_, member)| member.is_numeric())
            .map(|(name, _)| name.clone())
            .collect()
    }

    fn dims(&self, name: &str) -> Result<Vec<String>> {
        Ok(self.member(name)?.1.dims.clone())
    }

    async fn read_variable(&self, name: &str) -> Result<Variable> {
        let (id, member) = self.member(name)?;
        let shape: Vec<usize> = member.array.shape().iter().map(|&n| n as usize).collect();
        let grid: Vec<usize> = member
            .array
            .chunk_grid_shape()
            .ok_or_else(|| Error::Unsupported(format!("irregular chunk grid of array {name}")))?
            .iter()
            .map(|&n| n as usize)
            .collect();
        debug!(array = name, chunks = grid.iter().product::<usize>(), "Reading array");

        let chunks: Vec<Arc<Chunk>> = stream::iter(ndarray::indices(IxDyn(&grid)).into_iter())
            .enumerate()
            .map(|(linear, index)| {
                let index: Vec<u64> = index.slice().iter().map(|&i| i as u64).collect();
                self.load_chunk(id, member, index, linear)
            })
            .buffered(self.n_workers)
            .try_collect()
            .await?;

        let mut data = ArrayD::from_elem(IxDyn(&shape), f64::NAN);
        for chunk in chunks {
            let values = ArrayView::from_shape(IxDyn(&chunk.shape), &chunk.values)?;
            data.slice_each_axis_mut(|axis| {
                let axis = axis.axis.index();
                Slice::from(chunk.start[axis]..chunk.start[axis] + chunk.shape[axis])
            })
            .assign(&values);
        }

        let variable =
            Variable::new(name, member.dims.clone(), data)?.with_attrs(member.attrs.clone());

        // A zero fill value can't be told apart from an unset one
        Ok(variable.decode_cf(member.fill_value.filter(|&fill| fill != 0.0)))
    }
}

fn retrieve(array: &ZarrArray, subset: &ArraySubset) -> Result<Vec<f64>> {
    numeric!(
        array.data_type(),
        T => Ok(array
            .retrieve_array_subset_elements::<T>(subset)
            .map_err(Error::zarr)?
            .into_iter()
            .map(|value| value as f64)
            .collect()),
        _ => Err(Error::Unsupported(format!(
            "reading zarr data type {:?} as numbers",
            array.data_type()
        )))
    )
}

fn fill_value(array: &ZarrArray) -> Option<f64> {
    let bytes = array.fill_value().as_ne_bytes();
    numeric!(
        array.data_type(),
        T => Some(T::from_ne_bytes(bytes.try_into().ok()?) as f64),
        _ => None
    )
}

fn array_dimensions(attrs: &Map<String, Value>) -> Option<Vec<String>> {
    match attrs.get(DIMENSIONS)? {
        Value::Array(dims) => dims
            .iter()
            .map(|dim| dim.as_str().map(str::to_string))
            .collect(),
        _ => None,
    }
}

/// Convert JSON attributes to dataset attributes. Values that aren't text or numbers are skipped.
///
fn attributes(attrs: &Map<String, Value>) -> Attributes {
    attrs
        .iter()
        .filter_map(|(name, value)| attribute(value).map(|value| (name.clone(), value)))
        .collect()
}

fn number(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::Bool(b) => Some(if *b { 1.0 } else { 0.0 }),
        Value::String(s) => match s.as_str() {
            "NaN" => Some(f64::NAN),
            "Infinity" => Some(f64::INFINITY),
            "-Infinity" => Some(f64::NEG_INFINITY),
            _ => None,
        },
        _ => None,
    }
}

fn attribute(value: &Value) -> Option<AttrValue> {
    match value {
        Value::String(s) => Some(number(value).map_or_else(
            || AttrValue::Text(s.clone()),
            |n| AttrValue::Numbers(vec![n]),
        )),
        Value::Array(items) => items
            .iter()
            .map(number)
            .collect::<Option<Vec<f64>>>()
            .map(AttrValue::Numbers),
        _ => number(value).map(|n| AttrValue::Numbers(vec![n])),
    }
}
