use crate::command::outcome::ComparisonExit;
use crate::logging::LogTarget;
use crate::materialize::backend::Backend;
use bon::Builder;
use std::collections::HashMap;
use std::path::PathBuf;

/// Environment variable naming the tool binary.
pub const CDO_ENV: &str = "CDO";
/// Environment variable that turns on debug echo when present.
pub const DEBUG_ENV: &str = "DEBUG";
pub const DEFAULT_TOOL: &str = "cdo";

/// Session configuration.
///
/// # Examples
///
/// ```
/// use cdo::{Backend, CdoConfig, LogTarget};
///
/// let config = CdoConfig::builder()
///     .tool("/opt/cdo/bin/cdo")
///     .return_none_on_error(true)
///     .logging(true)
///     .log_target(LogTarget::File("cdo.log".into()))
///     .backend(Backend::Classic)
///     .build();
///
/// assert!(config.force_output);
/// assert!(config.return_none_on_error);
/// ```
#[derive(Debug, Clone, Builder)]
pub struct CdoConfig {
    /// Path or name of the binary. Falls back to `$CDO`, then `cdo` on `PATH`.
    #[builder(into)]
    pub tool: Option<PathBuf>,

    /// Overwrite existing outputs unless a call says otherwise.
    #[builder(default = true)]
    pub force_output: bool,

    /// Return [`CdoOutput::NoResult`](crate::CdoOutput::NoResult) instead of failing when the tool fails.
    #[builder(default)]
    pub return_none_on_error: bool,

    /// Return dataset handles unless a call asks for something else.
    #[builder(default)]
    pub return_dataset: bool,

    #[builder(default)]
    pub backend: Backend,

    /// Echo every command, its environment and its output.
    #[builder(default)]
    pub debug: bool,

    /// Keep a session log of executed commands.
    #[builder(default)]
    pub logging: bool,

    #[builder(default)]
    pub log_target: LogTarget,

    /// Directory for scratch files. Defaults to the system temp directory.
    #[builder(into)]
    pub temp_dir: Option<PathBuf>,

    /// Environment for every call, below per-call overrides.
    #[builder(default)]
    pub env: HashMap<String, String>,

    /// Options placed before per-call options on every call.
    #[builder(into)]
    pub options: Option<String>,

    #[builder(default)]
    pub comparison_exit: ComparisonExit,

    /// Remove scratch files when the process receives SIGINT, SIGTERM or SIGHUP.
    ///
    /// One listener serves every session in the process. After cleanup it
    /// re-raises the signal with its default disposition, which ends the process.
    /// Applications that handle these signals themselves should turn this off
    /// and call [`Cdo::cleanup`](crate::Cdo::cleanup) instead.
    #[builder(default = true)]
    pub cleanup_on_signal: bool,

    #[builder(default)]
    pub keep_temp_files: bool,
}

impl Default for CdoConfig {
    fn default() -> Self {
        Self::builder().build()
    }
}

impl CdoConfig {
    /// Tool path as configured, or from `$CDO`, or the default name.
    pub fn tool_path(&self) -> PathBuf {
        self.tool
            .clone()
            .or_else(|| std::env::var_os(CDO_ENV).map(PathBuf::from))
            .unwrap_or_else(|| PathBuf::from(DEFAULT_TOOL))
    }

    pub fn debug_enabled(&self) -> bool {
        self.debug || std::env::var_os(DEBUG_ENV).is_some()
    }
}

/// Resolves a bare program name through `PATH`; paths are returned unchanged.
pub(crate) fn resolve_tool(tool: PathBuf) -> PathBuf {
    if tool.components().count() == 1 {
        if let Ok(found) = which::which(&tool) {
            return found;
        }
    }
    tool
}
