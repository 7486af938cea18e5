use crate::command::outcome::InvocationError;
use crate::materialize::error::MaterializeError;
use crate::operators::error::DiscoveryError;
use crate::temp_store::error::TempStoreError;
use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum CdoError {
    #[error(transparent)]
    Invocation(#[from] InvocationError),

    #[error(transparent)]
    Materialize(#[from] MaterializeError),

    #[error(transparent)]
    Discovery(#[from] DiscoveryError),

    #[error(transparent)]
    TempStore(#[from] TempStoreError),

    #[error("Unknown operator '{0}'")]
    UnknownOperator(String),

    #[error("Operator '{name}' is not known, but is a prefix of: {}", candidates.join(", "))]
    IncompleteOperator {
        name: String,
        candidates: Vec<String>,
    },

    #[error("Operator '{operator}' writes {expected} output file(s), but {found} were given")]
    OutputCountMismatch {
        operator: String,
        expected: usize,
        found: usize,
    },

    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    #[error("Failed to spawn '{0}'")]
    Spawn(String, #[source] std::io::Error),

    #[error("Failed to write session log '{0}'")]
    Log(PathBuf, #[source] std::io::Error),
}

impl CdoError {
    /// `true` when the caller asked for a backend or feature this build does not carry.
    pub fn is_dependency_missing(&self) -> bool {
        matches!(
            self,
            CdoError::Materialize(MaterializeError::DependencyMissing { .. })
        )
    }

    /// `true` when a requested variable was absent from the produced file.
    pub fn is_lookup(&self) -> bool {
        matches!(
            self,
            CdoError::Materialize(MaterializeError::VariableNotFound { .. })
        )
    }

    pub fn is_unknown_operator(&self) -> bool {
        matches!(self, CdoError::UnknownOperator(_))
    }

    /// The captured process result, if this error came from a failed tool run.
    pub fn invocation(&self) -> Option<&InvocationError> {
        match self {
            CdoError::Invocation(e) => Some(e),
            _ => None,
        }
    }
}
