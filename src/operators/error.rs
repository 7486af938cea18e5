use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum DiscoveryError {
    #[error("Failed to run '{tool}' for capability query '{query}'")]
    QueryFailed {
        tool: PathBuf,
        query: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Could not find a version string in the output of '{tool} -V'")]
    VersionNotFound { tool: PathBuf },

    #[error("Failed to parse version '{0}'")]
    VersionParse(String),

    #[error("Operators could not be listed by running '{tool}': {message}")]
    ListingUnavailable { tool: PathBuf, message: String },

    #[error("Malformed operator listing line: '{0}'")]
    MalformedListing(String),

    #[error("Failed to parse configuration JSON from '{tool} --config all'")]
    ConfigParse {
        tool: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("'{tool}' has no support for library '{library}'")]
    LibraryMissing { tool: PathBuf, library: String },
}
