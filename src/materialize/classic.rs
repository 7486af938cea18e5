//! NetCDF classic and 64-bit offset files through the pure-Rust `netcdf3` crate.
//!
//! Opening a file only decodes the header; variable data is read on request.

use crate::materialize::dataset::{
    find_attribute, AttrValue, Attribute, Dataset, Dimension, NcType, Variable, FILL_VALUE_ATTRIBUTE,
};
use crate::materialize::error::MaterializeError;
use log::debug;
use ndarray::{ArrayD, IxDyn};
use netcdf3::{DataSet, DataType, DataVector, FileReader, FileWriter, Version};
use std::fmt::Debug;
use std::path::{Path, PathBuf};

const CLASSIC_DATA_LIMIT: usize = (i32::MAX as usize) - (1 << 20);

/// On-disk variant of the classic format.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Format {
    Classic,
    Offset64,
}

impl From<Version> for Format {
    fn from(version: Version) -> Self {
        match version {
            Version::Classic => Format::Classic,
            Version::Offset64Bit => Format::Offset64,
        }
    }
}

impl From<Format> for Version {
    fn from(format: Format) -> Self {
        match format {
            Format::Classic => Version::Classic,
            Format::Offset64 => Version::Offset64Bit,
        }
    }
}

fn nc_type(data_type: DataType) -> NcType {
    match data_type {
        DataType::I8 => NcType::Byte,
        DataType::U8 => NcType::Char,
        DataType::I16 => NcType::Short,
        DataType::I32 => NcType::Int,
        DataType::F32 => NcType::Float,
        DataType::F64 => NcType::Double,
    }
}

fn data_type(nc_type: NcType) -> DataType {
    match nc_type {
        NcType::Byte => DataType::I8,
        NcType::Char => DataType::U8,
        NcType::Short => DataType::I16,
        NcType::Int => DataType::I32,
        NcType::Float => DataType::F32,
        NcType::Double => DataType::F64,
    }
}

fn file_error(path: &Path, e: impl Debug) -> MaterializeError {
    MaterializeError::Classic {
        path: path.to_path_buf(),
        message: format!("{:?}", e),
    }
}

fn invalid(e: impl Debug) -> MaterializeError {
    MaterializeError::InvalidDataset(format!("{:?}", e))
}

fn numbers<T: Copy + Into<f64>>(nc_type: NcType, values: Option<&[T]>) -> AttrValue {
    AttrValue::Numbers {
        nc_type,
        values: values
            .unwrap_or_default()
            .iter()
            .map(|&v| v.into())
            .collect(),
    }
}

fn convert_attribute(attr: &netcdf3::Attribute) -> Attribute {
    let value = match attr.data_type() {
        DataType::U8 => {
            let bytes = attr.get_u8().unwrap_or_default();
            AttrValue::Text(
                String::from_utf8_lossy(bytes)
                    .trim_end_matches('\0')
                    .to_string(),
            )
        }
        DataType::I8 => numbers(NcType::Byte, attr.get_i8()),
        DataType::I16 => numbers(NcType::Short, attr.get_i16()),
        DataType::I32 => numbers(NcType::Int, attr.get_i32()),
        DataType::F32 => numbers(NcType::Float, attr.get_f32()),
        DataType::F64 => numbers(NcType::Double, attr.get_f64()),
    };
    Attribute {
        name: attr.name().to_string(),
        value,
    }
}

#[derive(Debug, Clone)]
struct VariableHeader {
    name: String,
    dimensions: Vec<String>,
    nc_type: NcType,
    attributes: Vec<Attribute>,
}

/// Header of a NetCDF classic file. Variable data is read from disk on each request.
#[derive(Debug, Clone)]
pub struct ClassicFile {
    path: PathBuf,
    format: Format,
    dimensions: Vec<Dimension>,
    attributes: Vec<Attribute>,
    variables: Vec<VariableHeader>,
}

impl ClassicFile {
    pub fn open(path: &Path) -> Result<Self, MaterializeError> {
        let reader = FileReader::open(path).map_err(|e| file_error(path, e))?;
        let format = Format::from(reader.version());
        let data_set = reader.data_set();

        let dimensions = data_set
            .get_dims()
            .iter()
            .map(|d| Dimension {
                name: d.name().to_string(),
                len: d.size(),
                unlimited: d.is_unlimited(),
            })
            .collect();
        let attributes = data_set
            .get_global_attrs()
            .into_iter()
            .map(convert_attribute)
            .collect();
        let variables = data_set
            .get_vars()
            .into_iter()
            .map(|v| VariableHeader {
                name: v.name().to_string(),
                dimensions: v.dim_names().into_iter().map(|n| n.to_string()).collect(),
                nc_type: nc_type(v.data_type()),
                attributes: v.get_attrs().into_iter().map(convert_attribute).collect(),
            })
            .collect::<Vec<_>>();

        debug!(
            "Opened {:?} ({:?}, {} variables)",
            path,
            format,
            variables.len()
        );
        Ok(Self {
            path: path.to_path_buf(),
            format,
            dimensions,
            attributes,
            variables,
        })
    }

    fn variable(&self, name: &str) -> Result<&VariableHeader, MaterializeError> {
        self.variables
            .iter()
            .find(|v| v.name == name)
            .ok_or_else(|| MaterializeError::VariableNotFound {
                variable: name.to_string(),
                path: self.path.clone(),
            })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn format(&self) -> Format {
        self.format
    }

    /// Current length of the record dimension, or zero without one.
    pub fn record_count(&self) -> usize {
        self.dimensions
            .iter()
            .find(|d| d.unlimited)
            .map_or(0, |d| d.len)
    }

    pub fn dimensions(&self) -> &[Dimension] {
        &self.dimensions
    }

    pub fn global_attributes(&self) -> &[Attribute] {
        &self.attributes
    }

    pub fn global_attribute(&self, name: &str) -> Option<&AttrValue> {
        find_attribute(&self.attributes, name)
    }

    pub fn variable_names(&self) -> Vec<String> {
        self.variables.iter().map(|v| v.name.clone()).collect()
    }

    pub fn has_variable(&self, name: &str) -> bool {
        self.variables.iter().any(|v| v.name == name)
    }

    pub fn variable_attributes(&self, name: &str) -> Result<&[Attribute], MaterializeError> {
        Ok(&self.variable(name)?.attributes)
    }

    pub fn variable_dimensions(&self, name: &str) -> Result<Vec<String>, MaterializeError> {
        Ok(self.variable(name)?.dimensions.clone())
    }

    pub fn shape(&self, name: &str) -> Result<Vec<usize>, MaterializeError> {
        self.variable(name)?
            .dimensions
            .iter()
            .map(|dim| {
                self.dimensions
                    .iter()
                    .find(|d| &d.name == dim)
                    .map(|d| d.len)
                    .ok_or_else(|| MaterializeError::Classic {
                        path: self.path.clone(),
                        message: format!("variable '{}' uses unknown dimension '{}'", name, dim),
                    })
            })
            .collect()
    }

    pub fn fill_value(&self, name: &str) -> Result<Option<f64>, MaterializeError> {
        Ok(find_attribute(&self.variable(name)?.attributes, FILL_VALUE_ATTRIBUTE)
            .and_then(AttrValue::as_f64))
    }

    /// Reads a whole variable, converted to `f64`, in its declared shape.
    pub fn read_variable(&self, name: &str) -> Result<ArrayD<f64>, MaterializeError> {
        let shape = self.shape(name)?;
        let mut reader = FileReader::open(&self.path).map_err(|e| file_error(&self.path, e))?;
        let values: Vec<f64> = match reader
            .read_var(name)
            .map_err(|e| file_error(&self.path, e))?
        {
            DataVector::I8(v) => v.into_iter().map(f64::from).collect(),
            DataVector::U8(v) => v.into_iter().map(f64::from).collect(),
            DataVector::I16(v) => v.into_iter().map(f64::from).collect(),
            DataVector::I32(v) => v.into_iter().map(f64::from).collect(),
            DataVector::F32(v) => v.into_iter().map(f64::from).collect(),
            DataVector::F64(v) => v,
        };
        ArrayD::from_shape_vec(IxDyn(&shape), values).map_err(|e| MaterializeError::Classic {
            path: self.path.clone(),
            message: format!("variable '{}': {}", name, e),
        })
    }

    /// Loads the whole file into memory.
    pub fn to_dataset(&self) -> Result<Dataset, MaterializeError> {
        let mut dataset = Dataset {
            dimensions: self.dimensions.clone(),
            attributes: self.attributes.clone(),
            variables: Vec::with_capacity(self.variables.len()),
        };
        for var in &self.variables {
            dataset.variables.push(Variable {
                name: var.name.clone(),
                dimensions: var.dimensions.clone(),
                nc_type: var.nc_type,
                attributes: var.attributes.clone(),
                data: self.read_variable(&var.name)?,
            });
        }
        Ok(dataset)
    }
}

fn add_global_attribute(definition: &mut DataSet, attr: &Attribute) -> Result<(), MaterializeError> {
    let name = attr.name.as_str();
    match &attr.value {
        AttrValue::Text(text) => definition.add_global_attr_string(name, text),
        AttrValue::Numbers { nc_type, values } => match nc_type {
            NcType::Byte => definition.add_global_attr_i8(name, cast(values, |v| v as i8)),
            NcType::Char => definition.add_global_attr_u8(name, cast(values, |v| v as u8)),
            NcType::Short => definition.add_global_attr_i16(name, cast(values, |v| v as i16)),
            NcType::Int => definition.add_global_attr_i32(name, cast(values, |v| v as i32)),
            NcType::Float => definition.add_global_attr_f32(name, cast(values, |v| v as f32)),
            NcType::Double => definition.add_global_attr_f64(name, values.clone()),
        },
    }
    .map_err(invalid)
}

fn add_variable_attribute(
    definition: &mut DataSet,
    variable: &str,
    attr: &Attribute,
) -> Result<(), MaterializeError> {
    let name = attr.name.as_str();
    match &attr.value {
        AttrValue::Text(text) => definition.add_var_attr_string(variable, name, text),
        AttrValue::Numbers { nc_type, values } => match nc_type {
            NcType::Byte => definition.add_var_attr_i8(variable, name, cast(values, |v| v as i8)),
            NcType::Char => definition.add_var_attr_u8(variable, name, cast(values, |v| v as u8)),
            NcType::Short => definition.add_var_attr_i16(variable, name, cast(values, |v| v as i16)),
            NcType::Int => definition.add_var_attr_i32(variable, name, cast(values, |v| v as i32)),
            NcType::Float => definition.add_var_attr_f32(variable, name, cast(values, |v| v as f32)),
            NcType::Double => definition.add_var_attr_f64(variable, name, values.clone()),
        },
    }
    .map_err(invalid)
}

fn cast<T>(values: &[f64], convert: impl Fn(f64) -> T) -> Vec<T> {
    values.iter().map(|&v| convert(v)).collect()
}

fn definition(dataset: &Dataset) -> Result<DataSet, MaterializeError> {
    let mut definition = DataSet::new();
    for dim in &dataset.dimensions {
        if dim.unlimited {
            definition.set_unlimited_dim(&dim.name, dim.len)
        } else {
            definition.add_fixed_dim(&dim.name, dim.len)
        }
        .map_err(invalid)?;
    }
    for attr in &dataset.attributes {
        add_global_attribute(&mut definition, attr)?;
    }
    for var in &dataset.variables {
        definition
            .add_var(&var.name, var.dimensions.as_slice(), data_type(var.nc_type))
            .map_err(invalid)?;
        for attr in &var.attributes {
            add_variable_attribute(&mut definition, &var.name, attr)?;
        }
    }
    Ok(definition)
}

/// Writes `dataset` to `path`, replacing any existing file.
///
/// The classic variant is used unless the data would not fit its 2 GiB offsets.
pub fn write_dataset(dataset: &Dataset, path: &Path) -> Result<(), MaterializeError> {
    dataset.validate()?;
    let definition = definition(dataset)?;
    let data_size: usize = dataset
        .variables
        .iter()
        .map(|v| v.data.len() * v.nc_type.size())
        .sum();
    let format = if data_size > CLASSIC_DATA_LIMIT {
        Format::Offset64
    } else {
        Format::Classic
    };

    let mut writer = FileWriter::open(path).map_err(|e| file_error(path, e))?;
    writer
        .set_def(&definition, format.into(), 0)
        .map_err(|e| file_error(path, e))?;
    for var in &dataset.variables {
        let name = var.name.as_str();
        let values = var.data.iter().copied();
        match var.nc_type {
            NcType::Byte => writer.write_var_i8(name, &values.map(|v| v as i8).collect::<Vec<_>>()),
            NcType::Char => writer.write_var_u8(name, &values.map(|v| v as u8).collect::<Vec<_>>()),
            NcType::Short => writer.write_var_i16(name, &values.map(|v| v as i16).collect::<Vec<_>>()),
            NcType::Int => writer.write_var_i32(name, &values.map(|v| v as i32).collect::<Vec<_>>()),
            NcType::Float => writer.write_var_f32(name, &values.map(|v| v as f32).collect::<Vec<_>>()),
            NcType::Double => writer.write_var_f64(name, &values.collect::<Vec<_>>()),
        }
        .map_err(|e| file_error(path, e))?;
    }
    writer.close().map_err(|e| file_error(path, e))?;

    debug!("Wrote {:?} ({:?})", path, format);
    Ok(())
}
