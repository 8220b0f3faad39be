//! NetCDF files, classic and NetCDF-4, read and written through the netCDF C library.
//!
mod reader;
mod writer;

pub use reader::NetcdfFile;
pub use writer::write_netcdf_file;
