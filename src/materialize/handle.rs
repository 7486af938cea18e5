use crate::materialize::backend::Backend;
use crate::materialize::classic::ClassicFile;
use crate::materialize::dataset::AttrValue;
use crate::materialize::error::MaterializeError;
use crate::materialize::masked::MaskedArray;
#[cfg(feature = "netcdf4")]
use crate::materialize::netcdf4::NetCdfFile;
use ndarray::ArrayD;
use std::path::Path;

/// Read access to an opened data file, independent of the backend.
pub trait DataSource {
    fn path(&self) -> &Path;

    fn variable_names(&self) -> Vec<String>;

    fn has_variable(&self, name: &str) -> bool {
        self.variable_names().iter().any(|v| v == name)
    }

    fn shape(&self, name: &str) -> Result<Vec<usize>, MaterializeError>;

    fn read_variable(&self, name: &str) -> Result<ArrayD<f64>, MaterializeError>;

    fn fill_value(&self, name: &str) -> Result<Option<f64>, MaterializeError>;

    fn global_attribute(&self, name: &str) -> Option<AttrValue>;

    /// Reads a variable and masks elements equal to its fill value.
    fn read_masked(&self, name: &str) -> Result<MaskedArray, MaterializeError> {
        let data = self.read_variable(name)?;
        Ok(MaskedArray::new(data, self.fill_value(name)?))
    }
}

impl DataSource for ClassicFile {
    fn path(&self) -> &Path {
        ClassicFile::path(self)
    }

    fn variable_names(&self) -> Vec<String> {
        ClassicFile::variable_names(self)
    }

    fn has_variable(&self, name: &str) -> bool {
        ClassicFile::has_variable(self, name)
    }

    fn shape(&self, name: &str) -> Result<Vec<usize>, MaterializeError> {
        ClassicFile::shape(self, name)
    }

    fn read_variable(&self, name: &str) -> Result<ArrayD<f64>, MaterializeError> {
        ClassicFile::read_variable(self, name)
    }

    fn fill_value(&self, name: &str) -> Result<Option<f64>, MaterializeError> {
        ClassicFile::fill_value(self, name)
    }

    fn global_attribute(&self, name: &str) -> Option<AttrValue> {
        ClassicFile::global_attribute(self, name).cloned()
    }
}

#[cfg(feature = "netcdf4")]
impl DataSource for NetCdfFile {
    fn path(&self) -> &Path {
        NetCdfFile::path(self)
    }

    fn variable_names(&self) -> Vec<String> {
        NetCdfFile::variable_names(self)
    }

    fn shape(&self, name: &str) -> Result<Vec<usize>, MaterializeError> {
        NetCdfFile::shape(self, name)
    }

    fn read_variable(&self, name: &str) -> Result<ArrayD<f64>, MaterializeError> {
        NetCdfFile::read_variable(self, name)
    }

    fn fill_value(&self, name: &str) -> Result<Option<f64>, MaterializeError> {
        NetCdfFile::fill_value(self, name)
    }

    fn global_attribute(&self, name: &str) -> Option<AttrValue> {
        NetCdfFile::global_attribute(self, name)
    }
}

/// A live handle over a produced file.
#[derive(Debug)]
pub enum DatasetHandle {
    Classic(ClassicFile),
    #[cfg(feature = "netcdf4")]
    NetCdf(NetCdfFile),
}

impl DatasetHandle {
    /// Opens `path` with `backend`. Only headers are read.
    pub fn open(path: &Path, backend: Backend) -> Result<Self, MaterializeError> {
        backend.ensure_available("open dataset handles")?;
        match backend {
            Backend::Classic => Ok(DatasetHandle::Classic(ClassicFile::open(path)?)),
            #[cfg(feature = "netcdf4")]
            Backend::NetCdf => Ok(DatasetHandle::NetCdf(NetCdfFile::open(path)?)),
            #[cfg(not(feature = "netcdf4"))]
            Backend::NetCdf => Err(MaterializeError::DependencyMissing {
                feature: "netcdf4",
                purpose: "open dataset handles",
            }),
        }
    }

    pub fn backend(&self) -> Backend {
        match self {
            DatasetHandle::Classic(_) => Backend::Classic,
            #[cfg(feature = "netcdf4")]
            DatasetHandle::NetCdf(_) => Backend::NetCdf,
        }
    }

    fn source(&self) -> &dyn DataSource {
        match self {
            DatasetHandle::Classic(file) => file,
            #[cfg(feature = "netcdf4")]
            DatasetHandle::NetCdf(file) => file,
        }
    }

    /// The `netcdf3` reader, when this handle uses it.
    pub fn as_classic(&self) -> Option<&ClassicFile> {
        match self {
            DatasetHandle::Classic(file) => Some(file),
            #[cfg(feature = "netcdf4")]
            _ => None,
        }
    }
}

impl DataSource for DatasetHandle {
    fn path(&self) -> &Path {
        self.source().path()
    }

    fn variable_names(&self) -> Vec<String> {
        self.source().variable_names()
    }

    fn has_variable(&self, name: &str) -> bool {
        self.source().has_variable(name)
    }

    fn shape(&self, name: &str) -> Result<Vec<usize>, MaterializeError> {
        self.source().shape(name)
    }

    fn read_variable(&self, name: &str) -> Result<ArrayD<f64>, MaterializeError> {
        self.source().read_variable(name)
    }

    fn fill_value(&self, name: &str) -> Result<Option<f64>, MaterializeError> {
        self.source().fill_value(name)
    }

    fn global_attribute(&self, name: &str) -> Option<AttrValue> {
        self.source().global_attribute(name)
    }
}
