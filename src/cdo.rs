//! The main entry point: a session bound to one tool binary.
//!
//! A [`Cdo`] session discovers the operators the binary offers, builds and runs
//! command lines for them, and hands the produced files to the materializer.

use crate::command::builder::{quote_path, split_options, CommandLine};
use crate::command::outcome::InvocationResult;
use crate::command::request::{Input, Invocation, OperatorChain, Output, ResultShape};
use crate::command::runner::execute;
use crate::config::{resolve_tool, CdoConfig};
use crate::error::CdoError;
use crate::logging::SessionLog;
use crate::materialize::backend::BackendAvailability;
use crate::materialize::classic::write_dataset;
use crate::materialize::Materializer;
use crate::operators::descriptor::OperatorDescriptor;
use crate::operators::discovery::{discover, query_config, query_tool, ToolInfo};
use crate::operators::registry::{OperatorRegistry, Resolution};
use crate::operators::version::CdoVersion;
use crate::output::CdoOutput;
use crate::temp_store::{install_signal_cleanup, TempStore};
use bon::bon;
use log::{debug, info, warn};
use std::collections::{BTreeMap, HashMap};
use std::future::Future;
use std::path::{Path, PathBuf};
use std::pin::Pin;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::Mutex;

/// Resolved input words, or `None` when an input invocation failed and errors are suppressed.
type InputFuture<'a> =
    Pin<Box<dyn Future<Output = Result<Option<Vec<String>>, CdoError>> + Send + 'a>>;

/// A session driving one CDO binary.
///
/// Creating a session runs `cdo -V` and lists the binary's operators once; the
/// list only changes through [`Cdo::set_cdo`]. Calls within one session run one
/// at a time, in program order. Independent sessions do not share any state and
/// can be used concurrently.
///
/// Scratch files for outputs that were not named explicitly live in the
/// session's [`TempStore`] and are removed when the session is dropped.
///
/// # Examples
///
/// ```no_run
/// # use cdo::{Cdo, CdoError, ResultShape};
/// # async fn run() -> Result<(), CdoError> {
/// let cdo = Cdo::new().await?;
///
/// // Text operators return their stdout lines.
/// let info = cdo.operator("sinfov").input("era5.nc").call().await?;
///
/// // File operators return a path, or an array when asked for one.
/// let pressure = cdo
///     .operator("stdatm,0")
///     .options("-f nc")
///     .returns(ResultShape::array("P"))
///     .call()
///     .await?
///     .into_array()
///     .unwrap();
/// assert_eq!(pressure.iter().cloned().fold(f64::INFINITY, f64::min), 1013.25);
/// # Ok(())
/// # }
/// ```
#[derive(Debug)]
pub struct Cdo {
    config: CdoConfig,
    tool: PathBuf,
    info: ToolInfo,
    registry: OperatorRegistry,
    backends: BackendAvailability,
    return_dataset: AtomicBool,
    debug: AtomicBool,
    temp: Arc<TempStore>,
    log: Option<SessionLog>,
    lock: Mutex<()>,
}

#[bon]
impl Cdo {
    /// Creates a session from defaults and the environment (`$CDO`, `$DEBUG`).
    ///
    /// # Errors
    ///
    /// Returns [`CdoError::Discovery`] if the binary cannot be run or its
    /// operators cannot be listed, and [`CdoError::TempStore`] if the scratch
    /// directory cannot be created.
    pub async fn new() -> Result<Self, CdoError> {
        Self::with_config(CdoConfig::default()).await
    }

    /// Creates a session with an explicit configuration.
    ///
    /// # Examples
    ///
    /// ```no_run
    /// # use cdo::{Cdo, CdoConfig, CdoError};
    /// # async fn run() -> Result<(), CdoError> {
    /// let config = CdoConfig::builder()
    ///     .tool("/opt/cdo/bin/cdo")
    ///     .temp_dir("/scratch/cdo")
    ///     .return_none_on_error(true)
    ///     .build();
    /// let cdo = Cdo::with_config(config).await?;
    /// println!("Using CDO {}", cdo.version());
    /// # Ok(())
    /// # }
    /// ```
    pub async fn with_config(config: CdoConfig) -> Result<Self, CdoError> {
        let tool = resolve_tool(config.tool_path());
        let discovery = discover(&tool, &config.env).await?;

        let temp = match &config.temp_dir {
            Some(dir) => TempStore::new(dir.clone())?,
            None => TempStore::in_system_temp()?,
        };
        let temp = Arc::new(temp.keep_files(config.keep_temp_files));
        if config.cleanup_on_signal {
            install_signal_cleanup(&temp);
        }
        let log = config
            .logging
            .then(|| SessionLog::new(config.log_target.clone()));

        Ok(Self {
            tool,
            info: discovery.info,
            registry: OperatorRegistry::new(discovery.descriptors),
            backends: BackendAvailability::detect(),
            return_dataset: AtomicBool::new(config.return_dataset),
            debug: AtomicBool::new(config.debug_enabled()),
            temp,
            log,
            lock: Mutex::new(()),
            config,
        })
    }

    /// Runs one invocation.
    ///
    /// The leading operator must be known to the binary. Its arity decides what
    /// happens next:
    ///
    /// * text operators return [`CdoOutput::Lines`] (or [`CdoOutput::Fields`] when
    ///   a split separator was given);
    /// * file operators get their output path(s) from the request or from the
    ///   temp store, and the result is shaped by the request's [`ResultShape`].
    ///
    /// With `force` off and explicit outputs that already exist, the tool is not
    /// run and the existing files are used.
    ///
    /// # Errors
    ///
    /// * [`CdoError::UnknownOperator`] / [`CdoError::IncompleteOperator`] for names
    ///   the binary does not offer.
    /// * [`CdoError::OutputCountMismatch`] when explicit outputs do not match the
    ///   operator's arity.
    /// * [`CdoError::Invocation`] when the tool fails, unless the session returns
    ///   [`CdoOutput::NoResult`] instead.
    /// * [`CdoError::Materialize`] when the requested result cannot be built.
    ///
    /// # Examples
    ///
    /// ```no_run
    /// # use cdo::{Cdo, CdoError, Invocation, ResultShape};
    /// # async fn run() -> Result<(), CdoError> {
    /// let cdo = Cdo::new().await?;
    /// let request = Invocation::builder("fldmean")
    ///     .input("-selname,T era5.nc")
    ///     .returns(ResultShape::masked_array("T"))
    ///     .build();
    /// let mean = cdo.invoke(request).await?.into_masked_array().unwrap();
    /// println!("{:?}", mean.valid_values());
    /// # Ok(())
    /// # }
    /// ```
    pub async fn invoke(&self, invocation: Invocation) -> Result<CdoOutput, CdoError> {
        let _guard = self.lock.lock().await;
        self.invoke_locked(&invocation).await
    }

    /// Builds and runs an invocation of `chain`; the same as [`Cdo::invoke`] with a
    /// fluent interface.
    ///
    /// The chain is an operator string such as `"remapbil,r360x180"`, an
    /// [`Operator`](crate::Operator) or an [`OperatorChain`]. Optional settings:
    /// `.input(..)`, `.output(..)`, `.options("-f nc4")`, `.force(bool)`,
    /// `.env(HashMap)`, `.returns(ResultShape)` and `.split(" ")` for text output.
    /// Finish with `.call().await`.
    ///
    /// # Examples
    ///
    /// ```no_run
    /// # use cdo::{Cdo, CdoError};
    /// # async fn run() -> Result<(), CdoError> {
    /// let cdo = Cdo::new().await?;
    /// let levels = cdo
    ///     .operator("showlevel")
    ///     .input("stdatm.nc")
    ///     .split(" ")
    ///     .call()
    ///     .await?
    ///     .into_fields()
    ///     .unwrap();
    /// # Ok(())
    /// # }
    /// ```
    #[builder(start_fn = operator)]
    #[doc(hidden)]
    #[allow(clippy::too_many_arguments)]
    pub async fn build_operator(
        &self,
        #[builder(start_fn, into)] chain: OperatorChain,
        #[builder(into)] input: Option<Input>,
        #[builder(into)] output: Option<Output>,
        #[builder(into)] options: Option<String>,
        force: Option<bool>,
        env: Option<HashMap<String, String>>,
        returns: Option<ResultShape>,
        #[builder(into)] split: Option<String>,
    ) -> Result<CdoOutput, CdoError> {
        self.invoke(Invocation {
            chain,
            input,
            output,
            options,
            force,
            env: env.unwrap_or_default(),
            returns: returns.unwrap_or_default(),
            split,
        })
        .await
    }

    async fn invoke_locked(&self, invocation: &Invocation) -> Result<CdoOutput, CdoError> {
        let leading = invocation
            .chain
            .leading()
            .ok_or_else(|| CdoError::InvalidRequest("operator chain is empty".to_string()))?;
        let descriptor = self.registry.require(&leading.name)?.clone();
        let options = split_options(self.config.options.as_deref(), invocation.options.as_deref())?;
        let inputs = match &invocation.input {
            Some(input) => match self.resolve_input(input).await? {
                Some(words) => words,
                None => {
                    warn!("An input of '{}' failed, not running it", descriptor.name);
                    return Ok(CdoOutput::NoResult);
                }
            },
            None => Vec::new(),
        };
        let env = self.merged_env(&invocation.env);

        if !descriptor.arity.writes_files() {
            if invocation.output.is_some() {
                debug!("'{}' writes no file, ignoring the given output", descriptor.name);
            }
            let line = CommandLine::assemble(&self.tool, &options, &invocation.chain, &inputs, &[])?;
            let result = self.run(&line, &env).await?;
            if !self.succeeded(&descriptor, &result) {
                return self.fail(result).await;
            }
            return Ok(match &invocation.split {
                Some(separator) => CdoOutput::Fields(result.fields(separator)),
                None => CdoOutput::Lines(result.lines()),
            });
        }

        let slots = descriptor.arity.output_slots();
        let (outputs, explicit) = match &invocation.output {
            Some(output) => (output.paths(), true),
            None => (
                (0..slots)
                    .map(|_| self.temp.allocate())
                    .collect::<Result<Vec<_>, _>>()?,
                false,
            ),
        };
        if outputs.len() != slots {
            return Err(CdoError::OutputCountMismatch {
                operator: descriptor.name.clone(),
                expected: slots,
                found: outputs.len(),
            });
        }
        if invocation.returns.wants_single_variable() && !descriptor.is_split() && slots > 1 {
            return Err(CdoError::InvalidRequest(format!(
                "'{}' writes {} files; array results need exactly one",
                descriptor.name, slots
            )));
        }

        let force = invocation.force.unwrap_or(self.config.force_output);
        if !force && explicit && outputs.iter().all(|p| p.exists()) {
            info!("Output of '{}' already exists, not running it again: {:?}", descriptor.name, outputs);
        } else {
            let line = CommandLine::assemble(&self.tool, &options, &invocation.chain, &inputs, &outputs)?;
            let result = self.run(&line, &env).await?;
            if !self.succeeded(&descriptor, &result) {
                return self.fail(result).await;
            }
        }

        let output = self
            .materializer()
            .materialize(&descriptor, &outputs, &invocation.returns)?;
        if !explicit && descriptor.is_split() {
            if let CdoOutput::Paths(paths) = &output {
                self.temp.track(paths.iter().cloned());
            }
        }
        Ok(output)
    }

    fn resolve_input<'a>(&'a self, input: &'a Input) -> InputFuture<'a> {
        Box::pin(async move {
            Ok::<_, CdoError>(Some(match input {
                Input::Path(path) => vec![quote_path(path)],
                Input::Paths(paths) => paths.iter().map(|p| quote_path(p)).collect(),
                Input::Raw(raw) => vec![raw.clone()],
                Input::Piped { operator, input } => {
                    let mut words = vec![format!("-{}", operator.render())];
                    if let Some(inner) = input {
                        let Some(inner) = self.resolve_input(inner).await? else {
                            return Ok(None);
                        };
                        words.extend(inner);
                    }
                    words
                }
                Input::Invocation(nested) => {
                    let mut nested = (**nested).clone();
                    nested.returns = ResultShape::path();
                    match self.invoke_locked(&nested).await? {
                        CdoOutput::Path(path) => vec![quote_path(&path)],
                        CdoOutput::Paths(paths) => paths.iter().map(|p| quote_path(p)).collect(),
                        CdoOutput::NoResult => return Ok(None),
                        _ => {
                            return Err(CdoError::InvalidRequest(format!(
                                "input invocation {:?} produced no file",
                                nested.chain.render()
                            )))
                        }
                    }
                }
                Input::Dataset(dataset) => {
                    let path = self.temp.allocate_with_suffix(".nc")?;
                    write_dataset(dataset, &path)?;
                    vec![quote_path(&path)]
                }
                Input::Many(inputs) => {
                    let mut words = Vec::new();
                    for input in inputs {
                        let Some(resolved) = self.resolve_input(input).await? else {
                            return Ok(None);
                        };
                        words.extend(resolved);
                    }
                    words
                }
            }))
        })
    }

    fn merged_env(&self, call: &HashMap<String, String>) -> HashMap<String, String> {
        let mut env = self.config.env.clone();
        env.extend(call.iter().map(|(k, v)| (k.clone(), v.clone())));
        env
    }

    async fn run(
        &self,
        line: &CommandLine,
        env: &HashMap<String, String>,
    ) -> Result<InvocationResult, CdoError> {
        if let Some(log) = &self.log {
            log.info(&line.render()).await?;
        }
        execute(line, env, self.debug()).await
    }

    fn succeeded(&self, descriptor: &OperatorDescriptor, result: &InvocationResult) -> bool {
        self.config
            .comparison_exit
            .is_success(&descriptor.name, result.returncode, self.info.version)
    }

    async fn fail(&self, result: InvocationResult) -> Result<CdoOutput, CdoError> {
        warn!(
            "Error in calling operator with: >>> {} <<< (returncode:{})",
            result.command, result.returncode
        );
        if let Some(log) = &self.log {
            log.error(&format!("{} with:{}", result.command, result.stderr))
                .await?;
        }
        if self.config.return_none_on_error {
            return Ok(CdoOutput::NoResult);
        }
        Err(result.into_error().into())
    }

    fn materializer(&self) -> Materializer {
        Materializer {
            backends: self.backends,
            backend: self.config.backend,
            return_dataset: self.return_dataset(),
        }
    }

    /// The operators offered by the binary.
    pub fn operators(&self) -> &OperatorRegistry {
        &self.registry
    }

    /// Whether the binary offers an operator with exactly this name.
    pub fn has_operator(&self, name: &str) -> bool {
        self.registry.contains(name)
    }

    /// Operator names starting with `prefix`. Nothing is executed.
    pub fn complete(&self, prefix: &str) -> Vec<&str> {
        self.registry.complete(prefix)
    }

    /// Exact match, or the operators `name` is a prefix of.
    ///
    /// # Errors
    ///
    /// [`CdoError::UnknownOperator`] if `name` matches nothing at all.
    pub fn resolve(&self, name: &str) -> Result<Resolution<'_>, CdoError> {
        self.registry.resolve(name)
    }

    /// Version reported by `cdo -V`.
    pub fn version(&self) -> CdoVersion {
        self.info.version
    }

    /// Everything learned from the binary at discovery: path, version,
    /// linked libraries and the strategy used to list operators.
    pub fn info(&self) -> &ToolInfo {
        &self.info
    }

    /// Whether the binary was built with `library` (case-insensitive, e.g. `"netcdf"`).
    pub fn has_lib(&self, library: &str) -> bool {
        self.info.has_lib(library)
    }

    /// Version of a library linked into the binary; `None` when it is supported
    /// but no version is reported.
    pub fn lib_version(&self, library: &str) -> Result<Option<&str>, CdoError> {
        Ok(self.info.lib_version(library)?)
    }

    /// `--config all` of the binary: which file formats and features it supports.
    /// Empty for binaries up to version 1.9.3.
    pub async fn config(&self) -> Result<BTreeMap<String, bool>, CdoError> {
        Ok(query_config(&self.tool, self.info.version, &self.config.env).await?)
    }

    /// Path of the binary this session runs.
    pub fn cdo_path(&self) -> &Path {
        &self.tool
    }

    /// Switches to another binary and lists its operators again.
    ///
    /// On error the session keeps using the previous binary.
    pub async fn set_cdo(&mut self, tool: impl Into<PathBuf>) -> Result<(), CdoError> {
        let tool = resolve_tool(tool.into());
        let discovery = discover(&tool, &self.config.env).await?;
        info!("Switched from {:?} to {:?}", self.tool, tool);
        self.tool = tool;
        self.info = discovery.info;
        self.registry = OperatorRegistry::new(discovery.descriptors);
        Ok(())
    }

    /// Whether `tool` names an executable, either as a path or on `PATH`.
    pub fn has_cdo(tool: impl AsRef<Path>) -> bool {
        which::which(tool.as_ref()).is_ok()
    }

    /// Help text of one operator. Not written to the session log.
    pub async fn help(&self, operator: &str) -> Result<String, CdoError> {
        let descriptor = self.registry.require(operator)?;
        let output = query_tool(&self.tool, &["-h", descriptor.name.as_str()], &self.config.env).await?;
        Ok(format!("{}{}", output.stdout, output.stderr))
    }

    /// Layer boundaries derived from the levels of `input`, starting at 0.
    ///
    /// Each level is assumed to sit in the middle of its layer.
    pub async fn boundary_levels(&self, input: impl Into<Input>) -> Result<Vec<f64>, CdoError> {
        let output = self
            .invoke(Invocation::builder("showlevel").input(input).build())
            .await?;
        let lines = match output {
            CdoOutput::Lines(lines) => lines,
            _ => {
                return Err(CdoError::InvalidRequest(
                    "showlevel printed no levels".to_string(),
                ))
            }
        };
        let levels = lines
            .first()
            .map(|line| {
                line.split_whitespace()
                    .map(str::parse::<f64>)
                    .collect::<Result<Vec<_>, _>>()
            })
            .transpose()
            .map_err(|e| CdoError::InvalidRequest(format!("unexpected showlevel output: {}", e)))?
            .unwrap_or_default();
        Ok(boundaries_from_levels(&levels))
    }

    /// Thickness of each layer, from [`Cdo::boundary_levels`].
    pub async fn thickness_of_levels(&self, input: impl Into<Input>) -> Result<Vec<f64>, CdoError> {
        let boundaries = self.boundary_levels(input).await?;
        Ok(thickness_from_boundaries(&boundaries))
    }

    /// Whether calls without an explicit result shape return dataset handles.
    pub fn return_dataset(&self) -> bool {
        self.return_dataset.load(Ordering::Relaxed)
    }

    /// Changes the session default for returning dataset handles.
    pub fn set_return_dataset(&self, value: bool) {
        self.return_dataset.store(value, Ordering::Relaxed);
    }

    /// Whether commands, their environment and their output are echoed.
    pub fn debug(&self) -> bool {
        self.debug.load(Ordering::Relaxed)
    }

    /// Turns debug echo on or off for the following calls.
    pub fn set_debug(&self, value: bool) {
        self.debug.store(value, Ordering::Relaxed);
    }

    /// Full text of the session log. Empty when logging is off.
    pub async fn collect_logs(&self) -> Result<String, CdoError> {
        match &self.log {
            Some(log) => log.collect().await,
            None => Ok(String::new()),
        }
    }

    /// Which result backends this build supports.
    pub fn backends(&self) -> BackendAvailability {
        self.backends
    }

    /// The store that owns this session's scratch files.
    pub fn temp_store(&self) -> &TempStore {
        &self.temp
    }

    /// Removes all scratch files allocated so far.
    pub fn cleanup(&self) -> Result<usize, CdoError> {
        Ok(self.temp.reclaim_all()?)
    }

    /// Removes every scratch file of the current user from the temp directory,
    /// including those left behind by sessions that were killed.
    pub fn sweep_temp_dir(&self) -> Result<usize, CdoError> {
        Ok(self.temp.sweep_directory()?)
    }
}

/// `b[0] = 0`, `b[i] = b[i-1] + 2 * (l[i-1] - b[i-1])`.
pub(crate) fn boundaries_from_levels(levels: &[f64]) -> Vec<f64> {
    let mut boundaries = Vec::with_capacity(levels.len() + 1);
    boundaries.push(0.0);
    for (i, level) in levels.iter().enumerate() {
        let previous = boundaries[i];
        boundaries.push(previous + 2.0 * (level - previous));
    }
    boundaries
}

pub(crate) fn thickness_from_boundaries(boundaries: &[f64]) -> Vec<f64> {
    boundaries.windows(2).map(|w| w[1] - w[0]).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_boundaries_from_levels() {
        let boundaries = boundaries_from_levels(&[10.0, 30.0, 60.0]);
        assert_eq!(boundaries, vec![0.0, 20.0, 40.0, 80.0]);
        assert_eq!(thickness_from_boundaries(&boundaries), vec![20.0, 20.0, 40.0]);
        assert_eq!(boundaries_from_levels(&[]), vec![0.0]);
        assert!(thickness_from_boundaries(&[0.0]).is_empty());
    }
}
