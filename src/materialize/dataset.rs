//! In-memory model of a gridded dataset: dimensions, attributes and variables.
//!
//! A [`Dataset`] can be handed to an invocation as input; it is written to a
//! NetCDF classic scratch file first and that path is passed to the tool.

use crate::materialize::error::MaterializeError;
use ndarray::ArrayD;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

/// Name of the attribute that carries a variable's fill value.
pub const FILL_VALUE_ATTRIBUTE: &str = "_FillValue";

/// External data types of the NetCDF classic format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum NcType {
    Byte,
    Char,
    Short,
    Int,
    Float,
    Double,
}

impl NcType {
    /// Size of one element on disk, in bytes.
    pub fn size(self) -> usize {
        match self {
            NcType::Byte | NcType::Char => 1,
            NcType::Short => 2,
            NcType::Int | NcType::Float => 4,
            NcType::Double => 8,
        }
    }
}

/// Value of an attribute. Text attributes are stored as `Char` on disk.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum AttrValue {
    Text(String),
    Numbers { nc_type: NcType, values: Vec<f64> },
}

impl AttrValue {
    pub fn text(value: impl Into<String>) -> Self {
        AttrValue::Text(value.into())
    }

    pub fn double(value: f64) -> Self {
        AttrValue::Numbers {
            nc_type: NcType::Double,
            values: vec![value],
        }
    }

    pub fn float(value: f32) -> Self {
        AttrValue::Numbers {
            nc_type: NcType::Float,
            values: vec![value as f64],
        }
    }

    pub fn int(value: i32) -> Self {
        AttrValue::Numbers {
            nc_type: NcType::Int,
            values: vec![value as f64],
        }
    }

    /// First numeric value, if this is a numeric attribute.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            AttrValue::Numbers { values, .. } => values.first().copied(),
            AttrValue::Text(_) => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            AttrValue::Text(s) => Some(s),
            AttrValue::Numbers { .. } => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Attribute {
    pub name: String,
    pub value: AttrValue,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Dimension {
    pub name: String,
    pub len: usize,
    /// The record dimension. At most one per dataset.
    pub unlimited: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Variable {
    pub name: String,
    pub dimensions: Vec<String>,
    pub nc_type: NcType,
    pub attributes: Vec<Attribute>,
    pub data: ArrayD<f64>,
}

impl Variable {
    pub fn new(name: impl Into<String>, dimensions: &[&str], nc_type: NcType, data: ArrayD<f64>) -> Self {
        Self {
            name: name.into(),
            dimensions: dimensions.iter().map(|d| d.to_string()).collect(),
            nc_type,
            attributes: Vec::new(),
            data,
        }
    }

    pub fn with_attribute(mut self, name: impl Into<String>, value: AttrValue) -> Self {
        self.attributes.push(Attribute {
            name: name.into(),
            value,
        });
        self
    }

    pub fn attribute(&self, name: &str) -> Option<&AttrValue> {
        find_attribute(&self.attributes, name)
    }

    pub fn fill_value(&self) -> Option<f64> {
        self.attribute(FILL_VALUE_ATTRIBUTE).and_then(AttrValue::as_f64)
    }
}

/// A complete dataset held in memory.
///
/// # Examples
///
/// ```
/// use cdo::{Dataset, NcType, Variable};
/// use ndarray::{ArrayD, IxDyn};
///
/// let pressure = ArrayD::from_shape_vec(IxDyn(&[2]), vec![1013.25, 898.7]).unwrap();
/// let dataset = Dataset::new()
///     .with_dimension("lev", 2)
///     .with_variable(Variable::new("P", &["lev"], NcType::Double, pressure));
///
/// assert!(dataset.validate().is_ok());
/// assert_eq!(dataset.variable("P").unwrap().data.len(), 2);
/// ```
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Dataset {
    pub dimensions: Vec<Dimension>,
    pub attributes: Vec<Attribute>,
    pub variables: Vec<Variable>,
}

impl Dataset {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_dimension(mut self, name: impl Into<String>, len: usize) -> Self {
        self.dimensions.push(Dimension {
            name: name.into(),
            len,
            unlimited: false,
        });
        self
    }

    /// Adds the record dimension, currently holding `len` records.
    pub fn with_unlimited_dimension(mut self, name: impl Into<String>, len: usize) -> Self {
        self.dimensions.push(Dimension {
            name: name.into(),
            len,
            unlimited: true,
        });
        self
    }

    pub fn with_attribute(mut self, name: impl Into<String>, value: AttrValue) -> Self {
        self.attributes.push(Attribute {
            name: name.into(),
            value,
        });
        self
    }

    pub fn with_variable(mut self, variable: Variable) -> Self {
        self.variables.push(variable);
        self
    }

    pub fn dimension(&self, name: &str) -> Option<&Dimension> {
        self.dimensions.iter().find(|d| d.name == name)
    }

    pub fn variable(&self, name: &str) -> Option<&Variable> {
        self.variables.iter().find(|v| v.name == name)
    }

    pub fn attribute(&self, name: &str) -> Option<&AttrValue> {
        find_attribute(&self.attributes, name)
    }

    pub fn variable_names(&self) -> Vec<String> {
        self.variables.iter().map(|v| v.name.clone()).collect()
    }

    /// The record dimension, if any.
    pub fn unlimited_dimension(&self) -> Option<&Dimension> {
        self.dimensions.iter().find(|d| d.unlimited)
    }

    /// Checks that names are unique, every variable refers to declared
    /// dimensions, the record dimension only appears first, and each data
    /// array has the declared shape.
    pub fn validate(&self) -> Result<(), MaterializeError> {
        let mut names = HashSet::new();
        for dim in &self.dimensions {
            if !names.insert(dim.name.as_str()) {
                return Err(MaterializeError::InvalidDataset(format!(
                    "duplicate dimension '{}'",
                    dim.name
                )));
            }
        }
        if self.dimensions.iter().filter(|d| d.unlimited).count() > 1 {
            return Err(MaterializeError::InvalidDataset(
                "more than one unlimited dimension".to_string(),
            ));
        }

        let mut var_names = HashSet::new();
        for var in &self.variables {
            if !var_names.insert(var.name.as_str()) {
                return Err(MaterializeError::InvalidDataset(format!(
                    "duplicate variable '{}'",
                    var.name
                )));
            }
            let mut shape = Vec::with_capacity(var.dimensions.len());
            for (i, dim_name) in var.dimensions.iter().enumerate() {
                let dim = self.dimension(dim_name).ok_or_else(|| {
                    MaterializeError::InvalidDataset(format!(
                        "variable '{}' uses undeclared dimension '{}'",
                        var.name, dim_name
                    ))
                })?;
                if dim.unlimited && i != 0 {
                    return Err(MaterializeError::InvalidDataset(format!(
                        "record dimension '{}' must come first in variable '{}'",
                        dim_name, var.name
                    )));
                }
                shape.push(dim.len);
            }
            if var.data.shape() != shape.as_slice() {
                return Err(MaterializeError::InvalidDataset(format!(
                    "variable '{}' has shape {:?}, dimensions declare {:?}",
                    var.name,
                    var.data.shape(),
                    shape
                )));
            }
        }
        Ok(())
    }
}

pub(crate) fn find_attribute<'a>(attributes: &'a [Attribute], name: &str) -> Option<&'a AttrValue> {
    attributes.iter().find(|a| a.name == name).map(|a| &a.value)
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::IxDyn;

    fn array(shape: &[usize], values: Vec<f64>) -> ArrayD<f64> {
        ArrayD::from_shape_vec(IxDyn(shape), values).unwrap()
    }

    #[test]
    fn test_fill_value_lookup() {
        let var = Variable::new("T", &["x"], NcType::Float, array(&[2], vec![1.0, -9e33]))
            .with_attribute(FILL_VALUE_ATTRIBUTE, AttrValue::float(-9e33));
        assert_eq!(var.fill_value(), Some(-9e33f32 as f64));

        let plain = Variable::new("P", &["x"], NcType::Double, array(&[1], vec![1.0]));
        assert_eq!(plain.fill_value(), None);
    }

    #[test]
    fn test_validate_rejects_shape_mismatch() {
        let dataset = Dataset::new()
            .with_dimension("x", 3)
            .with_variable(Variable::new("P", &["x"], NcType::Double, array(&[2], vec![1.0, 2.0])));
        assert!(matches!(
            dataset.validate(),
            Err(MaterializeError::InvalidDataset(_))
        ));
    }

    #[test]
    fn test_validate_rejects_inner_record_dimension() {
        let dataset = Dataset::new()
            .with_dimension("x", 2)
            .with_unlimited_dimension("time", 1)
            .with_variable(Variable::new(
                "T",
                &["x", "time"],
                NcType::Double,
                array(&[2, 1], vec![1.0, 2.0]),
            ));
        assert!(dataset.validate().is_err());
    }

    #[test]
    fn test_validate_rejects_unknown_dimension() {
        let dataset = Dataset::new().with_variable(Variable::new(
            "T",
            &["lat"],
            NcType::Double,
            array(&[1], vec![1.0]),
        ));
        let err = dataset.validate().unwrap_err();
        assert!(err.to_string().contains("undeclared dimension 'lat'"));
    }
}
