//! Dataset access through libnetcdf, for NetCDF-4/HDF5 output.

use crate::materialize::dataset::{AttrValue, NcType, FILL_VALUE_ATTRIBUTE};
use crate::materialize::error::MaterializeError;
use ndarray::ArrayD;
use netcdf::AttributeValue;
use std::path::{Path, PathBuf};

#[derive(Debug)]
pub struct NetCdfFile {
    path: PathBuf,
    file: netcdf::File,
}

impl NetCdfFile {
    pub fn open(path: &Path) -> Result<Self, MaterializeError> {
        let file =
            netcdf::open(path).map_err(|e| MaterializeError::NetCdf(path.to_path_buf(), e))?;
        Ok(Self {
            path: path.to_path_buf(),
            file,
        })
    }

    fn variable(&self, name: &str) -> Result<netcdf::Variable<'_>, MaterializeError> {
        self.file
            .variable(name)
            .ok_or_else(|| MaterializeError::VariableNotFound {
                variable: name.to_string(),
                path: self.path.clone(),
            })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn variable_names(&self) -> Vec<String> {
        self.file.variables().map(|v| v.name()).collect()
    }

    pub fn shape(&self, name: &str) -> Result<Vec<usize>, MaterializeError> {
        Ok(self
            .variable(name)?
            .dimensions()
            .iter()
            .map(|d| d.len())
            .collect())
    }

    pub fn read_variable(&self, name: &str) -> Result<ArrayD<f64>, MaterializeError> {
        self.variable(name)?
            .get::<f64, _>(..)
            .map_err(|e| MaterializeError::NetCdf(self.path.clone(), e))
    }

    pub fn fill_value(&self, name: &str) -> Result<Option<f64>, MaterializeError> {
        match self.variable(name)?.attribute_value(FILL_VALUE_ATTRIBUTE) {
            None => Ok(None),
            Some(value) => {
                let value = value.map_err(|e| MaterializeError::NetCdf(self.path.clone(), e))?;
                Ok(convert_attribute(value).and_then(|v| v.as_f64()))
            }
        }
    }

    pub fn global_attribute(&self, name: &str) -> Option<AttrValue> {
        self.file
            .attribute(name)
            .and_then(|a| a.value().ok())
            .and_then(convert_attribute)
    }
}

fn numbers<T: Into<f64>>(nc_type: NcType, values: impl IntoIterator<Item = T>) -> AttrValue {
    AttrValue::Numbers {
        nc_type,
        values: values.into_iter().map(Into::into).collect(),
    }
}

/// Types without a classic counterpart are widened to one that holds every value.
fn convert_attribute(value: AttributeValue) -> Option<AttrValue> {
    Some(match value {
        AttributeValue::Uchar(v) => numbers(NcType::Short, [v]),
        AttributeValue::Uchars(v) => numbers(NcType::Short, v),
        AttributeValue::Schar(v) => numbers(NcType::Byte, [v]),
        AttributeValue::Schars(v) => numbers(NcType::Byte, v),
        AttributeValue::Ushort(v) => numbers(NcType::Int, [v]),
        AttributeValue::Ushorts(v) => numbers(NcType::Int, v),
        AttributeValue::Short(v) => numbers(NcType::Short, [v]),
        AttributeValue::Shorts(v) => numbers(NcType::Short, v),
        AttributeValue::Uint(v) => numbers(NcType::Double, [v]),
        AttributeValue::Uints(v) => numbers(NcType::Double, v),
        AttributeValue::Int(v) => numbers(NcType::Int, [v]),
        AttributeValue::Ints(v) => numbers(NcType::Int, v),
        AttributeValue::Ulonglong(v) => numbers(NcType::Double, [v as f64]),
        AttributeValue::Ulonglongs(v) => numbers(NcType::Double, v.into_iter().map(|x| x as f64)),
        AttributeValue::Longlong(v) => numbers(NcType::Double, [v as f64]),
        AttributeValue::Longlongs(v) => numbers(NcType::Double, v.into_iter().map(|x| x as f64)),
        AttributeValue::Float(v) => numbers(NcType::Float, [v]),
        AttributeValue::Floats(v) => numbers(NcType::Float, v),
        AttributeValue::Double(v) => numbers(NcType::Double, [v]),
        AttributeValue::Doubles(v) => numbers(NcType::Double, v),
        AttributeValue::Str(s) => AttrValue::Text(s),
        AttributeValue::Strs(s) => AttrValue::Text(s.join("\n")),
        #[allow(unreachable_patterns)]
        _ => return None,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::materialize::classic::write_dataset;
    use crate::materialize::dataset::{Dataset, Variable};
    use ndarray::IxDyn;
    use tempfile::tempdir;

    #[test]
    fn test_reads_classic_output() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("stdatm.nc");
        let pressure = ArrayD::from_shape_vec(IxDyn(&[2]), vec![1013.25, -1.0]).unwrap();
        let dataset = Dataset::new()
            .with_dimension("lev", 2)
            .with_attribute("CDI", AttrValue::text("Climate Data Interface"))
            .with_variable(
                Variable::new("P", &["lev"], NcType::Double, pressure)
                    .with_attribute(FILL_VALUE_ATTRIBUTE, AttrValue::double(-1.0)),
            );
        write_dataset(&dataset, &path).unwrap();

        let file = NetCdfFile::open(&path).unwrap();
        assert_eq!(file.variable_names(), vec!["P"]);
        assert_eq!(file.shape("P").unwrap(), vec![2]);
        assert_eq!(file.fill_value("P").unwrap(), Some(-1.0));
        assert_eq!(
            file.read_variable("P").unwrap().iter().copied().collect::<Vec<_>>(),
            vec![1013.25, -1.0]
        );
        assert_eq!(
            file.global_attribute("CDI").as_ref().and_then(AttrValue::as_str),
            Some("Climate Data Interface")
        );
        assert!(matches!(
            file.read_variable("T"),
            Err(MaterializeError::VariableNotFound { .. })
        ));
    }
}
