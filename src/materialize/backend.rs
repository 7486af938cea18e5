use crate::materialize::error::MaterializeError;
use serde::{Deserialize, Serialize};

/// Numeric-array backend used to open produced files.
///
/// Defaults to [`Backend::NetCdf`] when the `netcdf4` feature is enabled, which it is
/// by default, and to [`Backend::Classic`] otherwise.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Backend {
    /// Pure-Rust reader for NetCDF classic and 64-bit offset files (`netcdf3` crate).
    Classic,
    /// libnetcdf through the `netcdf` crate. Reads every format the tool writes,
    /// NetCDF-4/HDF5 included. Needs the `netcdf4` cargo feature.
    NetCdf,
}

impl Default for Backend {
    fn default() -> Self {
        if cfg!(feature = "netcdf4") {
            Backend::NetCdf
        } else {
            Backend::Classic
        }
    }
}

impl Backend {
    pub fn is_available(self) -> bool {
        match self {
            Backend::Classic => true,
            Backend::NetCdf => cfg!(feature = "netcdf4"),
        }
    }

    /// Cargo feature that enables this backend.
    pub fn feature(self) -> &'static str {
        match self {
            Backend::Classic => "netcdf3",
            Backend::NetCdf => "netcdf4",
        }
    }

    pub(crate) fn ensure_available(self, purpose: &'static str) -> Result<(), MaterializeError> {
        if self.is_available() {
            Ok(())
        } else {
            Err(MaterializeError::DependencyMissing {
                feature: self.feature(),
                purpose,
            })
        }
    }
}

/// Which result backends this build can serve. Computed once per session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BackendAvailability {
    pub classic: bool,
    pub netcdf: bool,
    pub lazy: bool,
}

impl BackendAvailability {
    pub fn detect() -> Self {
        Self {
            classic: Backend::Classic.is_available(),
            netcdf: Backend::NetCdf.is_available(),
            lazy: cfg!(feature = "polars"),
        }
    }

    pub fn supports(&self, backend: Backend) -> bool {
        match backend {
            Backend::Classic => self.classic,
            Backend::NetCdf => self.netcdf,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_prefers_libnetcdf() {
        let expected = if cfg!(feature = "netcdf4") {
            Backend::NetCdf
        } else {
            Backend::Classic
        };
        assert_eq!(Backend::default(), expected);
        assert!(Backend::default().is_available());
    }

    #[test]
    fn test_classic_is_always_available() {
        let availability = BackendAvailability::detect();
        assert!(availability.classic);
        assert!(Backend::Classic.ensure_available("open datasets").is_ok());
        assert_eq!(availability.netcdf, cfg!(feature = "netcdf4"));
    }

    #[cfg(not(feature = "netcdf4"))]
    #[test]
    fn test_missing_backend_is_dependency_error() {
        let err = Backend::NetCdf.ensure_available("open datasets").unwrap_err();
        assert!(matches!(
            err,
            MaterializeError::DependencyMissing {
                feature: "netcdf4",
                ..
            }
        ));
    }
}
