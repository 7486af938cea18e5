use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum TempStoreError {
    #[error("Failed to create temp directory '{0}'")]
    DirCreation(PathBuf, #[source] std::io::Error),

    #[error("Temp path exists but is not a directory: '{0}'")]
    NotADirectory(PathBuf),

    #[error("Failed to allocate a scratch file in '{0}'")]
    Allocation(PathBuf, #[source] std::io::Error),

    #[error("Failed to read temp directory '{0}'")]
    DirRead(PathBuf, #[source] std::io::Error),

    #[error("Failed to delete scratch file '{0}'")]
    Deletion(PathBuf, #[source] std::io::Error),
}
