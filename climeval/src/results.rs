use std::collections::BTreeMap;

use ndarray::ArrayD;
use tracing::info;

use crate::{
    config::EvaluationConfig,
    dataset::{Coordinate, Dataset, Variable},
    errors::{Error, Result},
};

const SPATIAL_DIMS: [&str; 4] = ["lat", "lon", "latitude", "longitude"];

/// A gridded metric value, with the coordinates of whichever of its dimensions have them
///
#[derive(Clone, Debug, PartialEq)]
pub struct Field {
    pub name: String,
    pub dims: Vec<String>,
    pub data: ArrayD<f64>,
    pub coords: Vec<Coordinate>,
}

impl Field {
    /// Make a field, picking the coordinates of its dimensions out of `coords`.
    ///
    pub fn new<S: Into<String>>(
        name: S,
        dims: Vec<String>,
        data: ArrayD<f64>,
        coords: &BTreeMap<String, Coordinate>,
    ) -> Self {
        let coords = dims
            .iter()
            .filter_map(|dim| coords.get(dim))
            .cloned()
            .collect();

        Self {
            name: name.into(),
            dims,
            data,
            coords,
        }
    }

    pub fn with_coord(mut self, coord: Coordinate) -> Self {
        self.coords.retain(|c| c.name != coord.name);
        self.coords.push(coord);
        self
    }

    pub fn renamed<S: Into<String>>(self, name: S) -> Self {
        Self {
            name: name.into(),
            ..self
        }
    }

    pub fn is_spatial(&self) -> bool {
        self.dims.iter().any(|dim| SPATIAL_DIMS.contains(&dim.as_str()))
    }

    pub fn shape(&self) -> &[usize] {
        self.data.shape()
    }
}

/// Several fields over the same dimensions, eg predicted, reference and their difference
///
#[derive(Clone, Debug, PartialEq)]
pub struct Table {
    pub fields: Vec<Field>,
}

impl Table {
    pub fn field(&self, name: &str) -> Option<&Field> {
        self.fields.iter().find(|field| field.name == name)
    }
}

#[derive(Clone, Debug, PartialEq)]
pub enum MetricValue {
    Scalar(f64),
    Field(Field),
    Table(Table),
}

impl MetricValue {
    pub fn as_scalar(&self) -> Option<f64> {
        match self {
            Self::Scalar(value) => Some(*value),
            _ => None,
        }
    }

    pub fn as_field(&self) -> Option<&Field> {
        match self {
            Self::Field(field) => Some(field),
            _ => None,
        }
    }

    pub fn as_table(&self) -> Option<&Table> {
        match self {
            Self::Table(table) => Some(table),
            _ => None,
        }
    }

    fn fields(&self) -> Vec<&Field> {
        match self {
            Self::Scalar(_) => vec![],
            Self::Field(field) => vec![field],
            Self::Table(table) => table.fields.iter().collect(),
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            Self::Scalar(_) => "scalar",
            Self::Field(_) => "field",
            Self::Table(_) => "table",
        }
    }

    /// Gridded values as a dataset that can be written to a file. Scalars have no gridded form.
    ///
    pub fn to_dataset(&self) -> Result<Option<Dataset>> {
        let fields = self.fields();
        if fields.is_empty() {
            return Ok(None);
        }

        let mut dataset = Dataset::new();
        for field in fields {
            for coord in &field.coords {
                dataset.insert_coord(coord.clone())?;
            }
            let variable = Variable::new(&field.name, field.dims.clone(), field.data.clone())?;
            dataset.insert_variable(variable)?;
        }

        Ok(Some(dataset))
    }
}

/// The outcome of computing one metric for one variable
///
#[derive(Clone, Debug, PartialEq)]
pub struct MetricResult {
    pub name: String,
    pub value: MetricValue,

    /// Category, variable and parameters the metric was computed with
    pub metadata: BTreeMap<String, String>,
}

impl MetricResult {
    /// Whether any part of the value lies on a latitude or longitude dimension
    pub fn is_spatial(&self) -> bool {
        self.value.fields().iter().any(|field| field.is_spatial())
    }

    pub fn is_scalar(&self) -> bool {
        matches!(self.value, MetricValue::Scalar(_))
    }
}

pub struct EvaluationResults {
    pub config: EvaluationConfig,
    pub results: BTreeMap<String, MetricResult>,
}

impl EvaluationResults {
    pub fn new(config: EvaluationConfig) -> Self {
        Self {
            config,
            results: BTreeMap::new(),
        }
    }

    /// Record a result, replacing any earlier result with the same name
    pub fn add_result<S: Into<String>>(
        &mut self,
        name: S,
        value: MetricValue,
        metadata: BTreeMap<String, String>,
    ) {
        let name = name.into();
        info!(metric = %name, kind = value.kind(), "Computed metric");
        self.results.insert(
            name.clone(),
            MetricResult {
                name,
                value,
                metadata,
            },
        );
    }

    pub fn get_result(&self, name: &str) -> Result<&MetricResult> {
        self.results
            .get(name)
            .ok_or_else(|| Error::BadName(name.to_string()))
    }

    /// Every scalar result, by name
    pub fn summary(&self) -> BTreeMap<String, f64> {
        self.results
            .iter()
            .filter_map(|(name, result)| result.value.as_scalar().map(|v| (name.clone(), v)))
            .collect()
    }

    pub fn spatial_results(&self) -> BTreeMap<&str, &MetricResult> {
        self.results
            .iter()
            .filter(|(_, result)| result.is_spatial())
            .map(|(name, result)| (name.as_str(), result))
            .collect()
    }

    pub fn len(&self) -> usize {
        self.results.len()
    }

    pub fn is_empty(&self) -> bool {
        self.results.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{minimal_config, strings};
    use ndarray::array;

    fn lat_field() -> Field {
        let coords = BTreeMap::from([(
            "lat".to_string(),
            Coordinate::new("lat", array![10.0, 20.0]),
        )]);
        Field::new("value", strings(&["lat"]), array![0.5, 1.5].into_dyn(), &coords)
    }

    #[test]
    fn test_results() -> Result<()> {
        let mut results = EvaluationResults::new(minimal_config());
        assert!(results.is_empty());

        results.add_result("bias_tas", MetricValue::Scalar(-0.5), BTreeMap::new());
        results.add_result("bias_pr", MetricValue::Scalar(2.0), BTreeMap::new());
        results.add_result(
            "spatial_correlation_tas",
            MetricValue::Field(lat_field()),
            BTreeMap::new(),
        );
        assert_eq!(results.len(), 3);

        assert_eq!(
            results.summary(),
            BTreeMap::from([("bias_pr".to_string(), 2.0), ("bias_tas".to_string(), -0.5)])
        );
        assert_eq!(
            results.spatial_results().keys().copied().collect::<Vec<_>>(),
            vec!["spatial_correlation_tas"]
        );
        assert!(results.get_result("bias_tas")?.is_scalar());
        assert!(!results.get_result("bias_tas")?.is_spatial());
        assert!(matches!(
            results.get_result("rmse_tas"),
            Err(Error::BadName(_))
        ));

        Ok(())
    }

    #[test]
    fn test_to_dataset() -> Result<()> {
        assert_eq!(MetricValue::Scalar(1.0).to_dataset()?, None);

        let field = lat_field();
        let table = MetricValue::Table(Table {
            fields: vec![
                field.clone().renamed("predicted"),
                field.clone().renamed("reference"),
            ],
        });
        let dataset = table.to_dataset()?.unwrap();
        assert_eq!(dataset.variable_names(), strings(&["predicted", "reference"]));
        assert_eq!(dataset.coords["lat"].values, array![10.0, 20.0]);

        Ok(())
    }
}
