use async_trait::async_trait;

use crate::{
    dataset::{Attributes, Dataset, Variable},
    errors::Result,
};

/// A trait for reading named, labelled arrays out of a file or store on disk.
///
/// Implemented for Zarr groups and NetCDF files, so that loading doesn't care which format a
/// dataset is kept in.
///
#[async_trait]
pub trait Source: Send + Sync {
    /// Attributes of the group or file as a whole
    fn attrs(&self) -> &Attributes;

    /// Names of the arrays that can be read as numbers, sorted.
    ///
    fn names(&self) -> Vec<String>;

    /// Names of the dimensions of an array
    fn dims(&self, name: &str) -> Result<Vec<String>>;

    /// Read the whole of an array, with fill values masked and CF scaling applied.
    ///
    async fn read_variable(&self, name: &str) -> Result<Variable>;

    /// Read arrays into a dataset.
    ///
    /// With no names given every array is read. Otherwise the named arrays are read along with
    /// the coordinates of their dimensions.
    ///
    async fn read_dataset(&self, names: &[String]) -> Result<Dataset> {
        let available = self.names();
        let wanted = if names.is_empty() {
            available
        } else {
            let mut wanted: Vec<String> = vec![];
            for name in names {
                for dim in self.dims(name)? {
                    if available.contains(&dim) && !wanted.contains(&dim) {
                        wanted.push(dim);
                    }
                }
                if !wanted.contains(name) {
                    wanted.push(name.clone());
                }
            }
            wanted
        };

        let mut arrays = vec![];
        for name in &wanted {
            arrays.push(self.read_variable(name).await?);
        }

        Dataset::from_arrays(arrays, self.attrs().clone())
    }
}
