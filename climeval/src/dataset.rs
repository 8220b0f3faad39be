use std::{
    collections::{BTreeMap, BTreeSet, HashMap},
    fmt,
    ops::Range,
};

use ndarray::{Array1, Array2, ArrayD, Axis, IxDyn, Slice};
use serde::Serialize;
use tracing::warn;

use crate::{
    errors::{Error, Result},
    helpers::rearrange,
    stats,
    time::{Calendar, TimeUnits, EPOCH_UNITS},
};

/// The value of a variable, coordinate or dataset attribute
///
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(untagged)]
pub enum AttrValue {
    Text(String),
    Numbers(Vec<f64>),
}

impl AttrValue {
    pub fn as_text(&self) -> Option<&str> {
        match self {
            Self::Text(text) => Some(text),
            Self::Numbers(_) => None,
        }
    }

    /// The first number, if this is a numeric attribute
    pub fn as_number(&self) -> Option<f64> {
        match self {
            Self::Numbers(numbers) => numbers.first().copied(),
            Self::Text(_) => None,
        }
    }
}

impl From<&str> for AttrValue {
    fn from(text: &str) -> Self {
        Self::Text(text.to_string())
    }
}

impl From<f64> for AttrValue {
    fn from(number: f64) -> Self {
        Self::Numbers(vec![number])
    }
}

pub type Attributes = BTreeMap<String, AttrValue>;

pub(crate) fn text_attr<'a>(attrs: &'a Attributes, name: &str) -> Option<&'a str> {
    attrs.get(name).and_then(AttrValue::as_text)
}

pub(crate) fn number_attr(attrs: &Attributes, name: &str) -> Option<f64> {
    attrs.get(name).and_then(AttrValue::as_number)
}

/// How to collapse a dimension
///
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Reduction {
    Mean,
    Median,
}

impl Reduction {
    fn apply(&self, values: &[f64]) -> f64 {
        match self {
            Self::Mean => stats::nanmean(values),
            Self::Median => stats::nanmedian(values),
        }
    }
}

/// A dimension coordinate: the labels along one dimension of a dataset.
///
#[derive(Clone, Debug, PartialEq)]
pub struct Coordinate {
    pub name: String,
    pub values: Array1<f64>,
    pub attrs: Attributes,
}

impl Coordinate {
    pub fn new<S: Into<String>>(name: S, values: Array1<f64>) -> Self {
        Self {
            name: name.into(),
            values,
            attrs: Attributes::new(),
        }
    }

    pub fn with_attr<S: Into<String>, V: Into<AttrValue>>(mut self, name: S, value: V) -> Self {
        self.attrs.insert(name.into(), value.into());
        self
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Whether this coordinate holds decoded or encoded times
    pub fn is_time(&self) -> bool {
        text_attr(&self.attrs, "units").map_or(false, |units| units.contains(" since "))
    }

    pub fn calendar(&self) -> Result<Calendar> {
        match text_attr(&self.attrs, "calendar") {
            Some(name) => name.parse(),
            None => Ok(Calendar::Standard),
        }
    }

    /// Index range of the labels falling between `lower` and `upper` inclusive.
    ///
    /// Labels are expected to be monotonic, either ascending or descending.
    ///
    pub fn range_between(&self, lower: f64, upper: f64) -> Range<usize> {
        let inside: Vec<usize> = self
            .values
            .iter()
            .enumerate()
            .filter(|(_, &v)| lower <= v && v <= upper)
            .map(|(i, _)| i)
            .collect();

        match (inside.first(), inside.last()) {
            (Some(&first), Some(&last)) => first..last + 1,
            _ => 0..0,
        }
    }

    /// Rewrite CF encoded times as seconds since 1970-01-01 in the coordinate's calendar.
    ///
    pub(crate) fn decode_time(mut self) -> Self {
        let Some(units) = text_attr(&self.attrs, "units").map(str::to_string) else {
            return self;
        };
        let parsed = self
            .calendar()
            .and_then(|calendar| TimeUnits::parse(&units, calendar));
        match parsed {
            Ok(Some(time_units)) => {
                self.values.mapv_inplace(|v| time_units.decode(v));
                self.attrs
                    .insert("units".to_string(), AttrValue::from(EPOCH_UNITS));
            }
            Ok(None) => {}
            Err(err) => {
                warn!(coordinate = %self.name, %units, error = %err, "Leaving time undecoded");
            }
        }

        self
    }
}

/// A named N dimensional array of values with named dimensions.
///
#[derive(Clone, Debug, PartialEq)]
pub struct Variable {
    pub name: String,
    pub dims: Vec<String>,
    pub data: ArrayD<f64>,
    pub attrs: Attributes,
}

/// The values of a variable rearranged so that each row holds every value along a set of
/// dimensions, for one position in the remaining dimensions.
///
pub struct Lanes {
    /// The dimensions that weren't folded into the rows
    pub dims: Vec<String>,

    /// Shape of the remaining dimensions
    pub shape: Vec<usize>,

    pub rows: Array2<f64>,
}

impl Variable {
    pub fn new<S: Into<String>>(name: S, dims: Vec<String>, data: ArrayD<f64>) -> Result<Self> {
        let name = name.into();
        if dims.len() != data.ndim() {
            return Err(Error::format(
                "dataset",
                format!(
                    "variable {name} has {} dimension names for {} dimensions",
                    dims.len(),
                    data.ndim()
                ),
            ));
        }

        Ok(Self {
            name,
            dims,
            data,
            attrs: Attributes::new(),
        })
    }

    pub fn with_attrs(mut self, attrs: Attributes) -> Self {
        self.attrs = attrs;
        self
    }

    pub fn axis(&self, dim: &str) -> Option<Axis> {
        self.dims.iter().position(|d| d == dim).map(Axis)
    }

    fn require_axis(&self, dim: &str) -> Result<Axis> {
        self.axis(dim)
            .ok_or_else(|| Error::missing_dimension(dim, format!("variable {}", self.name)))
    }

    pub fn has_dim(&self, dim: &str) -> bool {
        self.axis(dim).is_some()
    }

    /// Length of each dimension, by name
    pub fn sizes(&self) -> Vec<(String, usize)> {
        self.dims
            .iter()
            .cloned()
            .zip(self.data.shape().iter().copied())
            .collect()
    }

    /// Keep only `range` along `dim`
    pub fn slice_dim(&self, dim: &str, range: Range<usize>) -> Result<Self> {
        let axis = self.require_axis(dim)?;
        let data = self
            .data
            .slice_axis(axis, Slice::from(range))
            .to_owned();

        Ok(Self { data, ..self.clone() })
    }

    /// Select a single index along `dim`, dropping the dimension
    pub fn index_dim(&self, dim: &str, index: usize) -> Result<Self> {
        let axis = self.require_axis(dim)?;
        let len = self.data.len_of(axis);
        if index >= len {
            return Err(Error::InvalidParameter(format!(
                "index {index} out of bounds for dimension {dim} of length {len}"
            )));
        }
        let data = self.data.index_axis(axis, index).to_owned();
        let mut dims = self.dims.clone();
        dims.remove(axis.index());

        Ok(Self {
            data,
            dims,
            ..self.clone()
        })
    }

    /// Collapse `dim`, skipping missing values
    pub fn reduce_dim(&self, dim: &str, reduction: Reduction) -> Result<Self> {
        let axis = self.require_axis(dim)?;
        let data = self.data.map_axis(axis, |lane| {
            let values: Vec<f64> = lane.iter().copied().collect();
            reduction.apply(&values)
        });
        let mut dims = self.dims.clone();
        dims.remove(axis.index());

        Ok(Self {
            data,
            dims,
            ..self.clone()
        })
    }

    /// Reorder the axes to match `dims`, which must name the same set of dimensions.
    ///
    pub fn transpose_to(&self, dims: &[String]) -> Result<Self> {
        if self.dims == dims {
            return Ok(self.clone());
        }
        let same_set = dims.len() == self.dims.len()
            && dims.iter().collect::<BTreeSet<_>>() == self.dims.iter().collect::<BTreeSet<_>>();
        if !same_set {
            return Err(Error::Misaligned(format!(
                "variable {} has dimensions {:?}, expected {:?}",
                self.name, self.dims, dims
            )));
        }

        let order: Vec<usize> = dims
            .iter()
            .filter_map(|d| self.dims.iter().position(|own| own == d))
            .collect();
        let data = self
            .data
            .view()
            .permuted_axes(IxDyn(&order))
            .as_standard_layout()
            .into_owned();

        Ok(Self {
            data,
            dims: dims.to_vec(),
            ..self.clone()
        })
    }

    /// Fold the given dimensions into rows, one row per position in the other dimensions.
    ///
    pub fn lanes(&self, dims: &[String]) -> Result<Lanes> {
        let mut folded = vec![];
        for dim in dims {
            folded.push(self.require_axis(dim)?.index());
        }
        let kept: Vec<usize> = (0..self.dims.len())
            .filter(|axis| !folded.contains(axis))
            .collect();

        let shape: Vec<usize> = kept.iter().map(|&axis| self.data.len_of(Axis(axis))).collect();
        let row_len: usize = folded.iter().map(|&axis| self.data.len_of(Axis(axis))).product();
        let order: Vec<usize> = kept.iter().chain(folded.iter()).copied().collect();

        let values: Vec<f64> = self
            .data
            .view()
            .permuted_axes(IxDyn(&order))
            .iter()
            .copied()
            .collect();
        let rows = Array2::from_shape_vec((shape.iter().product::<usize>(), row_len), values)?;

        Ok(Lanes {
            dims: kept.iter().map(|&axis| self.dims[axis].clone()).collect(),
            shape,
            rows,
        })
    }

    /// Mask fill values and apply `scale_factor` and `add_offset`, per the CF conventions.
    ///
    /// `fill_value` is the store level fill value, used when the attributes don't name one.
    ///
    pub(crate) fn decode_cf(mut self, fill_value: Option<f64>) -> Self {
        let mut missing: Vec<f64> = vec![];
        for name in ["_FillValue", "missing_value"] {
            if let Some(AttrValue::Numbers(values)) = self.attrs.get(name) {
                missing.extend(values);
            }
        }
        if missing.is_empty() {
            missing.extend(fill_value);
        }
        missing.retain(|v| !v.is_nan());

        let scale = number_attr(&self.attrs, "scale_factor");
        let offset = number_attr(&self.attrs, "add_offset");

        self.data.mapv_inplace(|v| {
            if missing.contains(&v) {
                return f64::NAN;
            }
            let v = scale.map_or(v, |scale| v * scale);
            offset.map_or(v, |offset| v + offset)
        });
        for name in ["_FillValue", "missing_value", "scale_factor", "add_offset"] {
            self.attrs.remove(name);
        }

        self
    }
}

/// A collection of variables sharing a set of named dimensions and their coordinates.
///
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Dataset {
    pub coords: BTreeMap<String, Coordinate>,
    pub variables: BTreeMap<String, Variable>,
    pub attrs: Attributes,
}

impl Dataset {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a dataset from the raw arrays of a file or store.
    ///
    /// One dimensional arrays named after their only dimension become coordinates, and times
    /// among them are decoded. Arrays referenced by another array's `coordinates` or `bounds`
    /// attribute are auxiliary and dropped. Everything else is a data variable.
    ///
    pub fn from_arrays(arrays: Vec<Variable>, attrs: Attributes) -> Result<Self> {
        let auxiliary = auxiliary_names(&arrays);
        let mut dataset = Self {
            attrs,
            ..Self::default()
        };

        for array in arrays {
            if is_dimension_coordinate(&array.name, &array.dims) {
                let coord = Coordinate {
                    values: array.data.iter().copied().collect(),
                    name: array.name,
                    attrs: array.attrs,
                };
                dataset.insert_coord(coord.decode_time())?;
            } else if !auxiliary.contains(&array.name) {
                dataset.insert_variable(array)?;
            }
        }

        Ok(dataset)
    }

    pub fn insert_coord(&mut self, coord: Coordinate) -> Result<()> {
        self.check_size(&coord.name, coord.len())?;
        self.coords.insert(coord.name.clone(), coord);

        Ok(())
    }

    pub fn insert_variable(&mut self, variable: Variable) -> Result<()> {
        for (dim, len) in variable.sizes() {
            self.check_size(&dim, len)?;
        }
        self.variables.insert(variable.name.clone(), variable);

        Ok(())
    }

    fn check_size(&self, dim: &str, len: usize) -> Result<()> {
        match self.sizes().get(dim) {
            Some(&existing) if existing != len => Err(Error::format(
                "dataset",
                format!("dimension {dim} has conflicting lengths {existing} and {len}"),
            )),
            _ => Ok(()),
        }
    }

    /// Length of every dimension in the dataset
    pub fn sizes(&self) -> BTreeMap<String, usize> {
        let mut sizes = BTreeMap::new();
        for coord in self.coords.values() {
            sizes.insert(coord.name.clone(), coord.len());
        }
        for variable in self.variables.values() {
            for (dim, len) in variable.sizes() {
                sizes.insert(dim, len);
            }
        }

        sizes
    }

    pub fn has_dim(&self, dim: &str) -> bool {
        self.sizes().contains_key(dim)
    }

    pub fn variable(&self, name: &str) -> Result<&Variable> {
        self.variables
            .get(name)
            .ok_or_else(|| Error::BadName(name.to_string()))
    }

    pub fn variable_names(&self) -> Vec<String> {
        self.variables.keys().cloned().collect()
    }

    /// Keep only the named variables and the coordinates they use.
    ///
    pub fn select(&self, names: &[String]) -> Result<Self> {
        let mut variables = BTreeMap::new();
        for name in names {
            let variable = self.variable(name)?;
            variables.insert(name.clone(), variable.clone());
        }
        let used: BTreeSet<&String> = variables.values().flat_map(|v| v.dims.iter()).collect();
        let coords = self
            .coords
            .iter()
            .filter(|(name, _)| used.contains(name))
            .map(|(name, coord)| (name.clone(), coord.clone()))
            .collect();

        Ok(Self {
            coords,
            variables,
            attrs: self.attrs.clone(),
        })
    }

    /// Rename variables, `mapping` going from old name to new name.
    ///
    /// A new name may not be shared by two variables, or taken by a variable that keeps its
    /// name.
    ///
    pub fn rename_variables(&self, mapping: &HashMap<String, String>) -> Result<Self> {
        for old in mapping.keys() {
            if !self.variables.contains_key(old) {
                return Err(Error::BadName(old.clone()));
            }
        }
        let mut taken: HashMap<&String, &String> = self
            .variables
            .keys()
            .filter(|name| !mapping.contains_key(*name))
            .map(|name| (name, name))
            .collect();
        for (old, new) in mapping {
            match taken.insert(new, old) {
                Some(kept) if kept == new => {
                    return Err(Error::Config(format!(
                        "can't rename {old} to {new}, there is already a variable called {new}"
                    )))
                }
                Some(other) => {
                    return Err(Error::Config(format!(
                        "can't rename both {other} and {old} to {new}"
                    )))
                }
                None => {}
            }
        }
        let variables = self
            .variables
            .values()
            .map(|variable| {
                let name = mapping.get(&variable.name).unwrap_or(&variable.name).clone();
                (
                    name.clone(),
                    Variable {
                        name,
                        ..variable.clone()
                    },
                )
            })
            .collect();

        Ok(Self {
            variables,
            coords: self.coords.clone(),
            attrs: self.attrs.clone(),
        })
    }

    /// Rename dimensions, and the coordinates that label them, from old name to new name.
    ///
    pub fn rename_dims(&self, mapping: &HashMap<String, String>) -> Self {
        let rename = |dim: &String| mapping.get(dim).unwrap_or(dim).clone();
        let coords = self
            .coords
            .values()
            .map(|coord| {
                let name = rename(&coord.name);
                (
                    name.clone(),
                    Coordinate {
                        name,
                        ..coord.clone()
                    },
                )
            })
            .collect();
        let variables = self
            .variables
            .iter()
            .map(|(name, variable)| {
                let dims = variable.dims.iter().map(rename).collect();
                (
                    name.clone(),
                    Variable {
                        dims,
                        ..variable.clone()
                    },
                )
            })
            .collect();

        Self {
            coords,
            variables,
            attrs: self.attrs.clone(),
        }
    }

    fn require_dim(&self, dim: &str) -> Result<()> {
        if self.has_dim(dim) {
            Ok(())
        } else {
            Err(Error::missing_dimension(dim, "dataset"))
        }
    }

    /// Keep only `range` of indices along `dim`
    pub fn slice_dim(&self, dim: &str, range: Range<usize>) -> Result<Self> {
        self.require_dim(dim)?;
        let mut dataset = self.clone();
        if let Some(coord) = dataset.coords.get_mut(dim) {
            coord.values = coord.values.slice_axis(Axis(0), Slice::from(range.clone())).to_owned();
        }
        for variable in dataset.variables.values_mut() {
            if variable.has_dim(dim) {
                *variable = variable.slice_dim(dim, range.clone())?;
            }
        }

        Ok(dataset)
    }

    /// Select a single index along `dim`, dropping the dimension and its coordinate
    pub fn index_dim(&self, dim: &str, index: usize) -> Result<Self> {
        self.require_dim(dim)?;
        let mut dataset = self.clone();
        dataset.coords.remove(dim);
        for variable in dataset.variables.values_mut() {
            if variable.has_dim(dim) {
                *variable = variable.index_dim(dim, index)?;
            }
        }

        Ok(dataset)
    }

    /// Collapse `dim` in every variable that has it
    pub fn reduce_dim(&self, dim: &str, reduction: Reduction) -> Result<Self> {
        self.require_dim(dim)?;
        let mut dataset = self.clone();
        dataset.coords.remove(dim);
        for variable in dataset.variables.values_mut() {
            if variable.has_dim(dim) {
                *variable = variable.reduce_dim(dim, reduction)?;
            }
        }

        Ok(dataset)
    }

    /// Label based selection of the values of `dim` between two bounds, inclusive.
    ///
    pub fn sel_between(&self, dim: &str, lower: f64, upper: f64) -> Result<Self> {
        let coord = self
            .coords
            .get(dim)
            .ok_or_else(|| Error::missing_dimension(dim, "dataset coordinates"))?;
        let (lower, upper) = rearrange(lower, upper);
        let range = coord.range_between(lower, upper);

        self.slice_dim(dim, range)
    }
}

impl fmt::Display for Dataset {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let sizes: Vec<String> = self
            .sizes()
            .iter()
            .map(|(dim, len)| format!("{dim}: {len}"))
            .collect();
        let variables: Vec<&str> = self.variables.keys().map(String::as_str).collect();
        write!(
            f,
            "variables=[{}], sizes={{{}}}",
            variables.join(", "),
            sizes.join(", ")
        )
    }
}

fn is_dimension_coordinate(name: &str, dims: &[String]) -> bool {
    dims.len() == 1 && dims[0] == name
}

fn auxiliary_names(arrays: &[Variable]) -> BTreeSet<String> {
    let mut names = BTreeSet::new();
    for array in arrays {
        if let Some(coordinates) = text_attr(&array.attrs, "coordinates") {
            names.extend(coordinates.split_whitespace().map(str::to_string));
        }
        if let Some(bounds) = text_attr(&array.attrs, "bounds") {
            names.insert(bounds.to_string());
        }
    }

    // A dimension coordinate stays a coordinate even if something lists it
    names.retain(|name| {
        !arrays
            .iter()
            .any(|a| &a.name == name && is_dimension_coordinate(&a.name, &a.dims))
    });

    names
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{grid_dataset, strings};
    use ndarray::{array, Array3};

    #[test]
    fn test_from_arrays() -> Result<()> {
        let time = Variable::new("time", strings(&["time"]), array![0.0, 1.0].into_dyn())?
            .with_attrs(Attributes::from([(
                "units".to_string(),
                AttrValue::from("days since 1970-01-02"),
            )]));
        let lat = Variable::new("lat", strings(&["lat"]), array![10.0, 20.0, 30.0].into_dyn())?;
        let tas = Variable::new(
            "tas",
            strings(&["time", "lat"]),
            Array2::from_elem((2, 3), 280.0).into_dyn(),
        )?
        .with_attrs(Attributes::from([(
            "coordinates".to_string(),
            AttrValue::from("height"),
        )]));
        let height = Variable::new("height", vec![], ArrayD::from_elem(IxDyn(&[]), 2.0))?;

        let dataset = Dataset::from_arrays(vec![time, lat, tas, height], Attributes::new())?;
        assert_eq!(dataset.variable_names(), vec!["tas"]);
        assert_eq!(dataset.coords["time"].values, array![86400.0, 172800.0]);
        assert_eq!(
            text_attr(&dataset.coords["time"].attrs, "units"),
            Some(EPOCH_UNITS)
        );
        assert_eq!(dataset.sizes()["lat"], 3);

        Ok(())
    }

    #[test]
    fn test_conflicting_sizes() -> Result<()> {
        let mut dataset = Dataset::new();
        dataset.insert_coord(Coordinate::new("lat", array![1.0, 2.0]))?;
        let tas = Variable::new("tas", strings(&["lat"]), array![1.0, 2.0, 3.0].into_dyn())?;
        assert!(matches!(
            dataset.insert_variable(tas),
            Err(Error::Format { .. })
        ));

        Ok(())
    }

    #[test]
    fn test_decode_cf() -> Result<()> {
        let packed = Variable::new("pr", strings(&["x"]), array![-1.0, 10.0, 20.0].into_dyn())?
            .with_attrs(Attributes::from([
                ("_FillValue".to_string(), AttrValue::from(-1.0)),
                ("scale_factor".to_string(), AttrValue::from(0.5)),
                ("add_offset".to_string(), AttrValue::from(1.0)),
            ]));
        let decoded = packed.decode_cf(None);
        assert!(decoded.data[[0]].is_nan());
        assert_eq!(decoded.data[[1]], 6.0);
        assert_eq!(decoded.data[[2]], 11.0);
        assert!(decoded.attrs.is_empty());

        let raw = Variable::new("pr", strings(&["x"]), array![0.0, 5.0].into_dyn())?;
        let decoded = raw.decode_cf(Some(0.0));
        assert!(decoded.data[[0]].is_nan());
        assert_eq!(decoded.data[[1]], 5.0);

        Ok(())
    }

    #[test]
    fn test_select_and_rename() -> Result<()> {
        let dataset = grid_dataset(&["tas", "pr"], 4, 3, 2, |t, _, _| t as f64)?;
        let selected = dataset.select(&strings(&["pr"]))?;
        assert_eq!(selected.variable_names(), vec!["pr"]);
        assert_eq!(selected.coords.len(), 3);
        assert!(matches!(
            dataset.select(&strings(&["huss"])),
            Err(Error::BadName(_))
        ));

        let mapping = HashMap::from([("pr".to_string(), "precip".to_string())]);
        let renamed = dataset.rename_variables(&mapping)?;
        assert_eq!(renamed.variable_names(), vec!["precip", "tas"]);
        assert_eq!(renamed.variables["precip"].name, "precip");

        let swapped = dataset.rename_variables(&HashMap::from([
            ("pr".to_string(), "tas".to_string()),
            ("tas".to_string(), "pr".to_string()),
        ]))?;
        assert_eq!(swapped.variable_names(), vec!["pr", "tas"]);

        let clash = HashMap::from([("pr".to_string(), "tas".to_string())]);
        assert!(matches!(dataset.rename_variables(&clash), Err(Error::Config(_))));
        let shared = HashMap::from([
            ("pr".to_string(), "huss".to_string()),
            ("tas".to_string(), "huss".to_string()),
        ]);
        assert!(matches!(dataset.rename_variables(&shared), Err(Error::Config(_))));

        let mapping = HashMap::from([("lat".to_string(), "y".to_string())]);
        let renamed = dataset.rename_dims(&mapping);
        assert!(renamed.coords.contains_key("y"));
        assert_eq!(renamed.variables["tas"].dims, strings(&["time", "y", "lon"]));

        Ok(())
    }

    #[test]
    fn test_slice_and_reduce() -> Result<()> {
        let dataset = grid_dataset(&["tas"], 4, 3, 2, |t, row, _| (t * 10 + row) as f64)?;

        let sliced = dataset.sel_between("lat", 40.0, 30.0)?;
        assert_eq!(sliced.sizes()["lat"], 2);
        assert_eq!(sliced.sizes()["time"], 4);

        let reduced = dataset.reduce_dim("time", Reduction::Mean)?;
        assert!(!reduced.has_dim("time"));
        assert_eq!(reduced.variables["tas"].data[[1, 0]], 16.0);

        let median = dataset.reduce_dim("time", Reduction::Median)?;
        assert_eq!(median.variables["tas"].data[[2, 1]], 17.0);

        let first = dataset.index_dim("time", 0)?;
        assert_eq!(first.variables["tas"].dims, strings(&["lat", "lon"]));
        assert!(dataset.index_dim("time", 4).is_err());

        Ok(())
    }

    #[test]
    fn test_transpose_and_lanes() -> Result<()> {
        let data = Array3::from_shape_fn((2, 3, 4), |(a, b, c)| (a * 100 + b * 10 + c) as f64);
        let variable = Variable::new("v", strings(&["time", "lat", "lon"]), data.into_dyn())?;

        let transposed = variable.transpose_to(&strings(&["lon", "time", "lat"]))?;
        assert_eq!(transposed.data.shape(), &[4, 2, 3]);
        assert_eq!(transposed.data[[3, 1, 2]], 123.0);
        assert!(variable.transpose_to(&strings(&["lon", "lat"])).is_err());

        let lanes = variable.lanes(&strings(&["time"]))?;
        assert_eq!(lanes.dims, strings(&["lat", "lon"]));
        assert_eq!(lanes.shape, vec![3, 4]);
        assert_eq!(lanes.rows.shape(), &[12, 2]);
        assert_eq!(lanes.rows.row(5).to_vec(), vec![11.0, 111.0]);

        let all = variable.lanes(&strings(&["time", "lat", "lon"]))?;
        assert_eq!(all.rows.shape(), &[1, 24]);

        Ok(())
    }
}
