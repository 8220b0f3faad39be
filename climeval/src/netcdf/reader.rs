use std::path::Path;

use async_trait::async_trait;
use ndarray::{ArrayD, IxDyn};
use netcdf::{
    types::{FloatType, IntType, NcVariableType},
    Attribute, AttributeValue,
};
use tracing::{debug, info};

use crate::{
    dataset::{AttrValue, Attributes, Variable},
    errors::{Error, Result},
    source::Source,
};

/// Run `$body` with `$t` naming the element type of a numeric NetCDF variable type, or evaluate
/// `$otherwise` for any other type.
macro_rules! numeric {
    ($vartype:expr, $t:ident => $body:expr, _ => $otherwise:expr) => {
        match $vartype {
            NcVariableType::Int(IntType::I8) => {
                type $t = i8;
                $body
            }
            NcVariableType::Int(IntType::U8) => {
                type $t = u8;
                $body
            }
            NcVariableType::Int(IntType::I16) => {
                type $t = i16;
                $body
            }
            NcVariableType::Int(IntType::U16) => {
                type $t = u16;
                $body
            }
            NcVariableType::Int(IntType::I32) => {
                type $t = i32;
                $body
            }
            NcVariableType::Int(IntType::U32) => {
                type $t = u32;
                $body
            }
            NcVariableType::Int(IntType::I64) => {
                type $t = i64;
                $body
            }
            NcVariableType::Int(IntType::U64) => {
                type $t = u64;
                $body
            }
            NcVariableType::Float(FloatType::F32) => {
                type $t = f32;
                $body
            }
            NcVariableType::Float(FloatType::F64) => {
                type $t = f64;
                $body
            }
            _ => $otherwise,
        }
    };
}

/// An open NetCDF file, classic or NetCDF-4.
///
/// Variable data is read on request.
///
pub struct NetcdfFile {
    file: netcdf::File,
    attrs: Attributes,
}

impl NetcdfFile {
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        info!(path = %path.display(), "Opening netcdf file");
        let file = netcdf::open(path)?;
        let attrs = attributes(file.attributes())?;

        Ok(Self { file, attrs })
    }

    fn variable(&self, name: &str) -> Result<netcdf::Variable<'_>> {
        self.file
            .variable(name)
            .ok_or_else(|| Error::BadName(name.to_string()))
    }

    fn read(&self, name: &str) -> Result<Variable> {
        let var = self.variable(name)?;
        let shape: Vec<usize> = var.dimensions().iter().map(|dim| dim.len()).collect();
        let values: Vec<f64> = numeric!(
            var.vartype(),
            T => var
                .get_values::<T, _>(..)?
                .into_iter()
                .map(|value| value as f64)
                .collect(),
            _ => {
                return Err(Error::Unsupported(format!(
                    "reading variable {name} of type {:?} as numbers",
                    var.vartype()
                )))
            }
        );
        debug!(variable = name, values = values.len(), "Read netcdf variable");

        let data = ArrayD::from_shape_vec(IxDyn(&shape), values)?;
        let variable = Variable::new(name, self.dims(name)?, data)?
            .with_attrs(attributes(var.attributes())?);

        Ok(variable.decode_cf(None))
    }
}

#[async_trait]
impl Source for NetcdfFile {
    fn attrs(&self) -> &Attributes {
        &self.attrs
    }

    /// Character and string variables are left out.
    ///
    fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self
            .file
            .variables()
            .filter(|var| {
                matches!(var.vartype(), NcVariableType::Int(_) | NcVariableType::Float(_))
            })
            .map(|var| var.name())
            .collect();
        names.sort();

        names
    }

    fn dims(&self, name: &str) -> Result<Vec<String>> {
        Ok(self
            .variable(name)?
            .dimensions()
            .iter()
            .map(|dim| dim.name())
            .collect())
    }

    async fn read_variable(&self, name: &str) -> Result<Variable> {
        self.read(name)
    }
}

fn attributes<'a, I>(attrs: I) -> Result<Attributes>
where
    I: Iterator<Item = Attribute<'a>>,
{
    let mut converted = Attributes::new();
    for attr in attrs {
        if let Some(value) = attr_value(attr.value()?) {
            converted.insert(attr.name().to_string(), value);
        }
    }

    Ok(converted)
}

fn numbers<T: Into<f64>>(values: Vec<T>) -> Option<AttrValue> {
    Some(AttrValue::Numbers(values.into_iter().map(Into::into).collect()))
}

/// Convert an attribute's value. Text has any trailing NULs removed. 64-bit integers may lose
/// precision. Other values, string arrays included, are skipped.
///
fn attr_value(value: AttributeValue) -> Option<AttrValue> {
    match value {
        AttributeValue::Str(text) => {
            Some(AttrValue::Text(text.trim_end_matches('\0').to_string()))
        }
        AttributeValue::Uchar(v) => numbers(vec![v]),
        AttributeValue::Uchars(v) => numbers(v),
        AttributeValue::Schar(v) => numbers(vec![v]),
        AttributeValue::Schars(v) => numbers(v),
        AttributeValue::Ushort(v) => numbers(vec![v]),
        AttributeValue::Ushorts(v) => numbers(v),
        AttributeValue::Short(v) => numbers(vec![v]),
        AttributeValue::Shorts(v) => numbers(v),
        AttributeValue::Uint(v) => numbers(vec![v]),
        AttributeValue::Uints(v) => numbers(v),
        AttributeValue::Int(v) => numbers(vec![v]),
        AttributeValue::Ints(v) => numbers(v),
        AttributeValue::Ulonglong(v) => numbers(vec![v as f64]),
        AttributeValue::Ulonglongs(v) => numbers(v.into_iter().map(|v| v as f64).collect()),
        AttributeValue::Longlong(v) => numbers(vec![v as f64]),
        AttributeValue::Longlongs(v) => numbers(v.into_iter().map(|v| v as f64).collect()),
        AttributeValue::Float(v) => numbers(vec![v]),
        AttributeValue::Floats(v) => numbers(v),
        AttributeValue::Double(v) => numbers(vec![v]),
        AttributeValue::Doubles(v) => numbers(v),
        _ => None,
    }
}
