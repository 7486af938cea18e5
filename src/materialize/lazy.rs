//! Lazily-opened dataset wrapper that exposes variables as Polars frames.

use crate::materialize::backend::Backend;
use crate::materialize::error::MaterializeError;
use crate::materialize::handle::{DataSource, DatasetHandle};
use polars::prelude::{Column, DataFrame, IntoLazy, LazyFrame};
use std::path::Path;

/// A dataset whose header has been read but whose variables have not.
///
/// Variable data is only loaded when a frame is requested. Each requested
/// variable becomes one column, flattened in row-major order, with elements
/// equal to the variable's fill value turned into nulls.
///
/// # Examples
///
/// ```no_run
/// # use cdo::{Backend, LazyDataset};
/// # use polars::prelude::{col, lit};
/// # fn run() -> Result<(), Box<dyn std::error::Error>> {
/// let lazy = LazyDataset::open("stdatm.nc".as_ref(), Backend::Classic)?;
/// let high = lazy.frame(&["P"])?.filter(col("P").gt(lit(900.0))).collect()?;
/// # Ok(())
/// # }
/// ```
#[derive(Debug)]
pub struct LazyDataset {
    handle: DatasetHandle,
}

impl LazyDataset {
    pub fn open(path: &Path, backend: Backend) -> Result<Self, MaterializeError> {
        Ok(Self {
            handle: DatasetHandle::open(path, backend)?,
        })
    }

    pub fn path(&self) -> &Path {
        self.handle.path()
    }

    pub fn handle(&self) -> &DatasetHandle {
        &self.handle
    }

    pub fn into_handle(self) -> DatasetHandle {
        self.handle
    }

    pub fn variable_names(&self) -> Vec<String> {
        self.handle.variable_names()
    }

    /// Builds a frame with one column per variable. All variables must have the
    /// same number of elements.
    pub fn frame(&self, variables: &[&str]) -> Result<LazyFrame, MaterializeError> {
        let mut columns = Vec::with_capacity(variables.len());
        let mut height = None;
        for &name in variables {
            let data = self.handle.read_variable(name)?;
            let fill = self.handle.fill_value(name)?;
            if let Some(expected) = height {
                if expected != data.len() {
                    return Err(MaterializeError::InvalidDataset(format!(
                        "variable '{}' has {} elements, expected {}",
                        name,
                        data.len(),
                        expected
                    )));
                }
            }
            height = Some(data.len());
            let values: Vec<Option<f64>> = data
                .iter()
                .map(|&v| match fill {
                    Some(f) if v == f || (f.is_nan() && v.is_nan()) => None,
                    _ => Some(v),
                })
                .collect();
            columns.push(Column::new(name.into(), values));
        }
        let frame = DataFrame::new(columns)
            .map_err(|e| MaterializeError::Frame(self.path().to_path_buf(), e))?;
        Ok(frame.lazy())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::materialize::classic::write_dataset;
    use crate::materialize::dataset::{AttrValue, Dataset, NcType, Variable, FILL_VALUE_ATTRIBUTE};
    use ndarray::{ArrayD, IxDyn};
    use polars::prelude::{col, lit};
    use tempfile::tempdir;

    #[test]
    fn test_frame_turns_fill_values_into_nulls() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("t.nc");
        let temps = ArrayD::from_shape_vec(IxDyn(&[3]), vec![280.0, -999.0, 290.0]).unwrap();
        let dataset = Dataset::new().with_dimension("x", 3).with_variable(
            Variable::new("T", &["x"], NcType::Double, temps)
                .with_attribute(FILL_VALUE_ATTRIBUTE, AttrValue::double(-999.0)),
        );
        write_dataset(&dataset, &path).unwrap();

        let lazy = LazyDataset::open(&path, Backend::Classic).unwrap();
        let df = lazy.frame(&["T"]).unwrap().collect().unwrap();
        assert_eq!(df.height(), 3);
        assert_eq!(df.column("T").unwrap().null_count(), 1);

        let warm = lazy
            .frame(&["T"])
            .unwrap()
            .filter(col("T").gt(lit(285.0)))
            .collect()
            .unwrap();
        assert_eq!(warm.height(), 1);
    }
}
