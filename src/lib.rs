mod cdo;
mod command;
mod config;
mod error;
mod logging;
mod materialize;
mod operators;
mod output;
mod temp_store;

pub use crate::cdo::*;
pub use config::{CdoConfig, CDO_ENV, DEBUG_ENV, DEFAULT_TOOL};
pub use error::CdoError;
pub use logging::LogTarget;
pub use output::CdoOutput;

pub use command::builder::{CommandLine, OVERWRITE_FLAG};
pub use command::outcome::{ComparisonExit, InvocationError, InvocationResult};
pub use command::request::{Input, Invocation, Operator, OperatorChain, Output, ResultShape};

pub use operators::descriptor::{Arity, OperatorDescriptor};
pub use operators::discovery::{DiscoveryStrategy, ToolInfo};
pub use operators::error::DiscoveryError;
pub use operators::lists::{is_comparison, is_split_family, COMPARISON_OPERATORS, DIFFERENCES_FOUND_EXIT_CODE};
pub use operators::registry::{OperatorRegistry, Resolution};
pub use operators::version::CdoVersion;

pub use materialize::backend::{Backend, BackendAvailability};
pub use materialize::classic::{write_dataset, ClassicFile, Format};
pub use materialize::dataset::{
    AttrValue, Attribute, Dataset, Dimension, NcType, Variable, FILL_VALUE_ATTRIBUTE,
};
pub use materialize::error::MaterializeError;
pub use materialize::handle::{DataSource, DatasetHandle};
#[cfg(feature = "polars")]
pub use materialize::lazy::LazyDataset;
pub use materialize::masked::MaskedArray;
#[cfg(feature = "netcdf4")]
pub use materialize::netcdf4::NetCdfFile;

pub use temp_store::error::TempStoreError;
pub use temp_store::{TempStore, TEMP_PREFIX};
