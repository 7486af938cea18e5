use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum MaterializeError {
    #[error("Cannot find variable '{variable}' in '{path}'")]
    VariableNotFound { variable: String, path: PathBuf },

    #[error("{feature} is required to {purpose}, but this build does not include it")]
    DependencyMissing {
        feature: &'static str,
        purpose: &'static str,
    },

    #[error("Failed to open '{0}'")]
    Open(PathBuf, #[source] std::io::Error),

    #[error("I/O error while reading '{0}'")]
    Read(PathBuf, #[source] std::io::Error),

    #[error("Failed to write '{0}'")]
    Write(PathBuf, #[source] std::io::Error),

    #[error("Cannot read '{path}' as a NetCDF classic file: {message}")]
    Classic { path: PathBuf, message: String },

    #[error("Invalid dataset: {0}")]
    InvalidDataset(String),

    #[error("Failed to search for split output files with prefix '{0}'")]
    Glob(String, #[source] std::io::Error),

    #[cfg(feature = "netcdf4")]
    #[error("libnetcdf failed on '{0}'")]
    NetCdf(PathBuf, #[source] netcdf::Error),

    #[cfg(feature = "polars")]
    #[error("Failed to build a frame from '{0}'")]
    Frame(PathBuf, #[source] polars::error::PolarsError),
}
