use std::path::Path;

use netcdf::FileMut;
use tracing::debug;

use crate::{
    dataset::{AttrValue, Attributes, Dataset},
    errors::{Error, Result},
};

/// Write a dataset as a NetCDF-4 file.
///
/// Coordinates are written before data variables, all as doubles. Text attributes are written
/// as strings, numeric ones as doubles. Zero length dimensions are written as unlimited
/// dimensions.
///
pub fn write_netcdf_file<P: AsRef<Path>>(path: P, dataset: &Dataset) -> Result<()> {
    let path = path.as_ref();
    debug!(path = %path.display(), "Writing netcdf file");
    let mut file = netcdf::create(path)?;

    for (name, len) in dataset.sizes() {
        file.add_dimension(&name, len)?;
    }
    for (name, value) in &dataset.attrs {
        match value {
            AttrValue::Text(text) => file.add_attribute(name, text.as_str())?,
            AttrValue::Numbers(numbers) => file.add_attribute(name, numbers.clone())?,
        };
    }

    for coord in dataset.coords.values() {
        let values: Vec<f64> = coord.values.iter().copied().collect();
        add_variable(&mut file, &coord.name, &[coord.name.as_str()], &coord.attrs, &values)?;
    }
    for variable in dataset.variables.values() {
        for dim in &variable.dims {
            if !dataset.sizes().contains_key(dim) {
                return Err(Error::missing_dimension(dim, &variable.name));
            }
        }
        let dims: Vec<&str> = variable.dims.iter().map(String::as_str).collect();
        let values: Vec<f64> = variable.data.iter().copied().collect();
        add_variable(&mut file, &variable.name, &dims, &variable.attrs, &values)?;
    }

    Ok(())
}

fn add_variable(
    file: &mut FileMut,
    name: &str,
    dims: &[&str],
    attrs: &Attributes,
    values: &[f64],
) -> Result<()> {
    let mut var = file.add_variable::<f64>(name, dims)?;
    for (attr, value) in attrs {
        match value {
            AttrValue::Text(text) => var.put_attribute(attr, text.as_str())?,
            AttrValue::Numbers(numbers) => var.put_attribute(attr, numbers.clone())?,
        };
    }
    // Nothing to write along an unlimited dimension still of length zero
    if !values.is_empty() {
        var.put_values(values, ..)?;
    }

    Ok(())
}
