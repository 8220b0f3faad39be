//! Recognising and standardising the names of latitude, longitude and time dimensions.
//!
use std::collections::HashMap;

use tracing::debug;

use crate::dataset::Dataset;

pub const LAT: &str = "lat";
pub const LON: &str = "lon";
pub const TIME: &str = "time";
pub const ENSEMBLE: &str = "realization";

pub(crate) const LAT_NAMES: [&str; 4] = ["lat", "latitude", "y", "rlat"];
pub(crate) const LON_NAMES: [&str; 4] = ["lon", "longitude", "x", "rlon"];
pub(crate) const TIME_NAMES: [&str; 3] = ["time", "t", "date"];

/// The names a dataset uses for its latitude, longitude and time dimensions, where it has them.
///
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct DimensionNames {
    pub lat: Option<String>,
    pub lon: Option<String>,
    pub time: Option<String>,
}

impl DimensionNames {
    /// Detected names, latitude then longitude then time
    pub fn present(&self) -> Vec<String> {
        [&self.lat, &self.lon, &self.time]
            .into_iter()
            .flatten()
            .cloned()
            .collect()
    }

    pub fn spatial(&self) -> Vec<String> {
        [&self.lat, &self.lon].into_iter().flatten().cloned().collect()
    }
}

fn first_present(dataset: &Dataset, candidates: &[&str]) -> Option<String> {
    let sizes = dataset.sizes();
    candidates
        .iter()
        .find(|name| sizes.contains_key(**name))
        .map(|name| name.to_string())
}

/// Find which of the commonly used names a dataset uses for each kind of dimension.
///
/// When several candidates are present the first in order of preference wins, eg "lat" is
/// preferred to "latitude".
///
pub fn detect_dimension_names(dataset: &Dataset) -> DimensionNames {
    DimensionNames {
        lat: first_present(dataset, &LAT_NAMES),
        lon: first_present(dataset, &LON_NAMES),
        time: first_present(dataset, &TIME_NAMES),
    }
}

/// Rename the detected latitude, longitude and time dimensions to "lat", "lon" and "time".
///
pub fn standardize_dimension_names(dataset: &Dataset) -> Dataset {
    let detected = detect_dimension_names(dataset);
    let mapping: HashMap<String, String> = [
        (detected.lat, LAT),
        (detected.lon, LON),
        (detected.time, TIME),
    ]
    .into_iter()
    .filter_map(|(found, standard)| found.map(|found| (found, standard.to_string())))
    .filter(|(found, standard)| found != standard)
    .collect();

    if mapping.is_empty() {
        return dataset.clone();
    }
    debug!(?mapping, "Standardizing dimension names");

    dataset.rename_dims(&mapping)
}
