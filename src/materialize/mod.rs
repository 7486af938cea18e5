//! Turns the files a successful invocation produced into the shape the caller asked for.

pub mod backend;
pub mod classic;
pub mod dataset;
pub mod error;
pub mod handle;
#[cfg(feature = "polars")]
pub mod lazy;
pub mod masked;
#[cfg(feature = "netcdf4")]
pub mod netcdf4;

use crate::command::request::ResultShape;
use crate::error::CdoError;
use crate::materialize::backend::{Backend, BackendAvailability};
use crate::materialize::error::MaterializeError;
use crate::materialize::handle::{DataSource, DatasetHandle};
use crate::operators::descriptor::OperatorDescriptor;
use crate::output::CdoOutput;
use log::debug;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Copy)]
pub(crate) struct Materializer {
    pub backends: BackendAvailability,
    pub backend: Backend,
    pub return_dataset: bool,
}

impl Materializer {
    /// Applies the intents in precedence order. Split operators always yield the
    /// files found under the output prefix.
    pub fn materialize(
        &self,
        operator: &OperatorDescriptor,
        outputs: &[PathBuf],
        shape: &ResultShape,
    ) -> Result<CdoOutput, CdoError> {
        if operator.is_split() {
            let prefix = outputs.first().ok_or_else(|| {
                CdoError::InvalidRequest(format!("'{}' needs an output prefix", operator.name))
            })?;
            return Ok(CdoOutput::Paths(glob_prefix(prefix)?));
        }

        if shape.wants_single_variable() && outputs.len() != 1 {
            return Err(CdoError::InvalidRequest(format!(
                "'{}' writes {} files; array results need exactly one",
                operator.name,
                outputs.len()
            )));
        }

        if let Some(variable) = &shape.array {
            let handle = self.open(&outputs[0], self.backend)?;
            return Ok(CdoOutput::Array(handle.read_variable(variable)?));
        }

        if let Some(variable) = &shape.masked_array {
            let handle = self.open(&outputs[0], self.backend)?;
            return Ok(CdoOutput::MaskedArray(handle.read_masked(variable)?));
        }

        let dataset_backend = shape
            .dataset
            .or((self.return_dataset && !shape.path).then_some(self.backend));
        if let Some(backend) = dataset_backend {
            let mut handles = outputs
                .iter()
                .map(|p| self.open(p, backend))
                .collect::<Result<Vec<_>, _>>()?;
            return Ok(match handles.len() {
                1 => CdoOutput::Dataset(handles.remove(0)),
                _ => CdoOutput::Datasets(handles),
            });
        }

        if shape.lazy {
            return self.lazy(outputs);
        }

        Ok(match outputs {
            [single] => CdoOutput::Path(single.clone()),
            many => CdoOutput::Paths(many.to_vec()),
        })
    }

    fn open(&self, path: &Path, backend: Backend) -> Result<DatasetHandle, MaterializeError> {
        if !self.backends.supports(backend) {
            return Err(MaterializeError::DependencyMissing {
                feature: backend.feature(),
                purpose: "open dataset handles",
            });
        }
        DatasetHandle::open(path, backend)
    }

    #[cfg(feature = "polars")]
    fn lazy(&self, outputs: &[PathBuf]) -> Result<CdoOutput, CdoError> {
        use crate::materialize::lazy::LazyDataset;

        let mut wrappers = outputs
            .iter()
            .map(|p| LazyDataset::open(p, self.backend))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(match wrappers.len() {
            1 => CdoOutput::Lazy(wrappers.remove(0)),
            _ => CdoOutput::LazyDatasets(wrappers),
        })
    }

    #[cfg(not(feature = "polars"))]
    fn lazy(&self, _outputs: &[PathBuf]) -> Result<CdoOutput, CdoError> {
        Err(MaterializeError::DependencyMissing {
            feature: "polars",
            purpose: "return lazily-opened datasets",
        }
        .into())
    }
}

/// Files next to `prefix` whose names start with its file name, sorted.
/// The prefix path itself is left out.
pub(crate) fn glob_prefix(prefix: &Path) -> Result<Vec<PathBuf>, MaterializeError> {
    let stem = prefix
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    let parent = prefix.parent().unwrap_or_else(|| Path::new(""));
    let search_dir = if parent.as_os_str().is_empty() {
        Path::new(".")
    } else {
        parent
    };
    let entries = std::fs::read_dir(search_dir)
        .map_err(|e| MaterializeError::Glob(prefix.to_string_lossy().into_owned(), e))?;

    let mut found: Vec<PathBuf> = entries
        .flatten()
        .filter(|entry| entry.file_type().is_ok_and(|t| t.is_file()))
        .map(|entry| entry.file_name().to_string_lossy().into_owned())
        .filter(|name| name.starts_with(&stem) && *name != stem)
        .map(|name| parent.join(name))
        .collect();
    found.sort();
    debug!("Prefix {:?} matched {} files", prefix, found.len());
    Ok(found)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::materialize::classic::write_dataset;
    use crate::materialize::dataset::{AttrValue, Dataset, NcType, Variable, FILL_VALUE_ATTRIBUTE};
    use crate::operators::descriptor::Arity;
    use ndarray::{ArrayD, IxDyn};
    use tempfile::tempdir;

    fn materializer() -> Materializer {
        Materializer {
            backends: BackendAvailability::detect(),
            backend: Backend::Classic,
            return_dataset: false,
        }
    }

    fn write_sample(path: &Path) {
        let data = ArrayD::from_shape_vec(IxDyn(&[3]), vec![1.0, -1.0, 3.0]).unwrap();
        let dataset = Dataset::new().with_dimension("x", 3).with_variable(
            Variable::new("T", &["x"], NcType::Double, data)
                .with_attribute(FILL_VALUE_ATTRIBUTE, AttrValue::double(-1.0)),
        );
        write_dataset(&dataset, path).unwrap();
    }

    #[test]
    fn test_masked_array_wins_over_path() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("out.nc");
        write_sample(&path);

        let shape = ResultShape::path().with_masked_array("T");
        let out = materializer()
            .materialize(&OperatorDescriptor::new("copy", Arity::One), &[path], &shape)
            .unwrap();
        let masked = out.into_masked_array().unwrap();
        assert_eq!(masked.valid_values(), vec![1.0, 3.0]);
    }

    #[test]
    fn test_array_wins_over_masked_array() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("out.nc");
        write_sample(&path);

        let shape = ResultShape::masked_array("T").with_array("T");
        let out = materializer()
            .materialize(&OperatorDescriptor::new("copy", Arity::One), &[path], &shape)
            .unwrap();
        assert_eq!(out.into_array().unwrap().len(), 3);
    }

    #[test]
    fn test_missing_variable_is_lookup_error() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("out.nc");
        write_sample(&path);

        let err = materializer()
            .materialize(
                &OperatorDescriptor::new("copy", Arity::One),
                &[path],
                &ResultShape::array("Q"),
            )
            .unwrap_err();
        assert!(err.is_lookup());
        assert!(!err.is_dependency_missing());
    }

    #[test]
    fn test_session_dataset_default_and_explicit_path() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("out.nc");
        write_sample(&path);
        let op = OperatorDescriptor::new("copy", Arity::One);
        let m = Materializer {
            return_dataset: true,
            ..materializer()
        };

        let out = m.materialize(&op, &[path.clone()], &ResultShape::default()).unwrap();
        assert!(matches!(out, CdoOutput::Dataset(_)));
        let out = m.materialize(&op, &[path.clone()], &ResultShape::path()).unwrap();
        assert_eq!(out.into_path(), Some(path));
    }

    #[test]
    fn test_multiple_outputs_keep_order() {
        let dir = tempdir().unwrap();
        let a = dir.path().join("a.nc");
        let b = dir.path().join("b.nc");
        write_sample(&a);
        write_sample(&b);
        let op = OperatorDescriptor::new("trend", Arity::Fixed(2));

        let out = materializer()
            .materialize(&op, &[a.clone(), b.clone()], &ResultShape::default())
            .unwrap();
        assert_eq!(out.into_paths(), Some(vec![a.clone(), b.clone()]));

        let err = materializer()
            .materialize(&op, &[a, b], &ResultShape::array("T"))
            .unwrap_err();
        assert!(matches!(err, CdoError::InvalidRequest(_)));
    }

    #[cfg(not(feature = "netcdf4"))]
    #[test]
    fn test_unavailable_backend_is_dependency_missing() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("out.nc");
        write_sample(&path);
        let err = materializer()
            .materialize(
                &OperatorDescriptor::new("copy", Arity::One),
                &[path],
                &ResultShape::dataset(Backend::NetCdf),
            )
            .unwrap_err();
        assert!(err.is_dependency_missing());
    }

    #[test]
    fn test_split_globs_prefix_regardless_of_intent() {
        let dir = tempdir().unwrap();
        let prefix = dir.path().join("lev");
        for name in ["lev000001.nc", "lev010000.nc", "other.nc"] {
            std::fs::write(dir.path().join(name), b"").unwrap();
        }
        let op = OperatorDescriptor::new("splitlevel", Arity::Dynamic);
        let out = materializer()
            .materialize(&op, &[prefix], &ResultShape::array("T"))
            .unwrap();
        let paths = out.into_paths().unwrap();
        assert_eq!(paths.len(), 2);
        assert!(paths
            .iter()
            .all(|p| p.file_name().unwrap().to_string_lossy().starts_with("lev")));
    }
}
