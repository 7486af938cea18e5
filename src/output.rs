use crate::materialize::handle::DatasetHandle;
#[cfg(feature = "polars")]
use crate::materialize::lazy::LazyDataset;
use crate::materialize::masked::MaskedArray;
use ndarray::ArrayD;
use std::path::PathBuf;

/// Result of an invocation, shaped by the request's [`ResultShape`](crate::ResultShape).
#[derive(Debug)]
pub enum CdoOutput {
    /// Text output of an operator that writes no file.
    Lines(Vec<String>),
    /// Text output split on the requested separator.
    Fields(Vec<Vec<String>>),
    Path(PathBuf),
    Paths(Vec<PathBuf>),
    Array(ArrayD<f64>),
    MaskedArray(MaskedArray),
    Dataset(DatasetHandle),
    Datasets(Vec<DatasetHandle>),
    #[cfg(feature = "polars")]
    Lazy(LazyDataset),
    #[cfg(feature = "polars")]
    LazyDatasets(Vec<LazyDataset>),
    /// The tool failed and the session suppresses invocation errors.
    NoResult,
}

impl CdoOutput {
    pub fn is_no_result(&self) -> bool {
        matches!(self, CdoOutput::NoResult)
    }

    pub fn as_path(&self) -> Option<&PathBuf> {
        match self {
            CdoOutput::Path(p) => Some(p),
            _ => None,
        }
    }

    pub fn into_path(self) -> Option<PathBuf> {
        match self {
            CdoOutput::Path(p) => Some(p),
            _ => None,
        }
    }

    /// All produced paths; a single path becomes a one-element list.
    pub fn into_paths(self) -> Option<Vec<PathBuf>> {
        match self {
            CdoOutput::Path(p) => Some(vec![p]),
            CdoOutput::Paths(p) => Some(p),
            _ => None,
        }
    }

    pub fn into_lines(self) -> Option<Vec<String>> {
        match self {
            CdoOutput::Lines(l) => Some(l),
            _ => None,
        }
    }

    pub fn into_fields(self) -> Option<Vec<Vec<String>>> {
        match self {
            CdoOutput::Fields(f) => Some(f),
            _ => None,
        }
    }

    pub fn into_array(self) -> Option<ArrayD<f64>> {
        match self {
            CdoOutput::Array(a) => Some(a),
            _ => None,
        }
    }

    pub fn into_masked_array(self) -> Option<MaskedArray> {
        match self {
            CdoOutput::MaskedArray(m) => Some(m),
            _ => None,
        }
    }

    pub fn into_dataset(self) -> Option<DatasetHandle> {
        match self {
            CdoOutput::Dataset(d) => Some(d),
            _ => None,
        }
    }

    pub fn into_datasets(self) -> Option<Vec<DatasetHandle>> {
        match self {
            CdoOutput::Dataset(d) => Some(vec![d]),
            CdoOutput::Datasets(d) => Some(d),
            _ => None,
        }
    }

    #[cfg(feature = "polars")]
    pub fn into_lazy(self) -> Option<LazyDataset> {
        match self {
            CdoOutput::Lazy(l) => Some(l),
            _ => None,
        }
    }
}
