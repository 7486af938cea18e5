//! Capability discovery: asks the tool for its version, libraries and operators.
//!
//! How operators are listed depends on the tool version. Each listing method is a
//! [`DiscoveryStrategy`]; all of them produce the same `Vec<OperatorDescriptor>`.

use crate::operators::descriptor::{Arity, OperatorDescriptor};
use crate::operators::error::DiscoveryError;
use crate::operators::lists::UNDOCUMENTED_OPERATORS;
use crate::operators::version::CdoVersion;
use log::{debug, info, warn};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::sync::LazyLock;
use tokio::process::Command;

static WITH_LINE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?:with|Features): (.*)").expect("valid features regex"));

static LIBRARY_VERSION: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(\w+) library version : (\d+\.\S+)").expect("valid library regex")
});

/// Captured output of a capability query.
#[derive(Debug, Clone)]
pub(crate) struct QueryOutput {
    pub stdout: String,
    pub stderr: String,
}

impl QueryOutput {
    fn combined(&self) -> String {
        format!("{}{}", self.stdout, self.stderr)
    }

    /// stdout, or stderr when the tool wrote its listing there.
    fn listing(&self) -> &str {
        if self.stdout.trim().is_empty() {
            &self.stderr
        } else {
            &self.stdout
        }
    }
}

/// Runs `tool args...` directly, without a shell. The exit code is not checked:
/// several queries exit non-zero while still printing what was asked for.
pub(crate) async fn query_tool(
    tool: &Path,
    args: &[&str],
    env: &HashMap<String, String>,
) -> Result<QueryOutput, DiscoveryError> {
    debug!("Querying {:?} {}", tool, args.join(" "));
    let output = Command::new(tool)
        .args(args)
        .envs(env)
        .stdin(Stdio::null())
        .output()
        .await
        .map_err(|source| DiscoveryError::QueryFailed {
            tool: tool.to_path_buf(),
            query: args.join(" "),
            source,
        })?;
    Ok(QueryOutput {
        stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
        stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
    })
}

/// Version-dependent way of listing operators.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DiscoveryStrategy {
    /// Parse the `Operators:` section of `-h`, plus the undocumented list.
    HelpText,
    /// First word of each `--operators` line; arity from the static lists.
    OperatorList,
    /// `--operators` plus `--operators_no_output` for text-only operators.
    OperatorListWithNoOutput,
    /// `--operators` reports `(inputs|outputs)` per operator.
    OperatorListWithArity,
}

impl DiscoveryStrategy {
    pub fn for_version(version: CdoVersion) -> Self {
        // --operators_no_output exists in 1.8.x, is broken in 1.9.0 and works again from 1.9.1.
        if version < CdoVersion::new(1, 7, 2) {
            DiscoveryStrategy::HelpText
        } else if version < CdoVersion::new(1, 8, 0) || version == CdoVersion::new(1, 9, 0) {
            DiscoveryStrategy::OperatorList
        } else if version < CdoVersion::new(1, 9, 3) {
            DiscoveryStrategy::OperatorListWithNoOutput
        } else {
            DiscoveryStrategy::OperatorListWithArity
        }
    }

    pub(crate) async fn run(
        self,
        tool: &Path,
        env: &HashMap<String, String>,
    ) -> Result<Vec<OperatorDescriptor>, DiscoveryError> {
        match self {
            DiscoveryStrategy::HelpText => {
                let help = query_tool(tool, &["-h"], env).await?;
                let mut names = parse_help_operators(&help.combined()).map_err(|message| {
                    DiscoveryError::ListingUnavailable {
                        tool: tool.to_path_buf(),
                        message,
                    }
                })?;
                names.extend(UNDOCUMENTED_OPERATORS.iter().map(|s| s.to_string()));
                Ok(unique(names)
                    .iter()
                    .map(|n| OperatorDescriptor::from_builtin_lists(n))
                    .collect())
            }
            DiscoveryStrategy::OperatorList => {
                let listing = query_tool(tool, &["--operators"], env).await?;
                let names = first_tokens(listing.listing());
                ensure_listed(tool, &names)?;
                Ok(unique(names)
                    .iter()
                    .map(|n| OperatorDescriptor::from_builtin_lists(n))
                    .collect())
            }
            DiscoveryStrategy::OperatorListWithNoOutput => {
                let listing = query_tool(tool, &["--operators"], env).await?;
                let no_output = query_tool(tool, &["--operators_no_output"], env).await?;
                let mut names = first_tokens(listing.listing());
                ensure_listed(tool, &names)?;
                let no_output = first_tokens(no_output.listing());
                names.extend(no_output.iter().cloned());
                let no_output: Vec<&str> = no_output.iter().map(String::as_str).collect();
                Ok(unique(names)
                    .iter()
                    .map(|n| OperatorDescriptor::from_static_lists(n, &no_output))
                    .collect())
            }
            DiscoveryStrategy::OperatorListWithArity => {
                let listing = query_tool(tool, &["--operators"], env).await?;
                let descriptors = parse_arity_listing(listing.listing())?;
                if descriptors.is_empty() {
                    return Err(DiscoveryError::ListingUnavailable {
                        tool: tool.to_path_buf(),
                        message: "'--operators' printed nothing".to_string(),
                    });
                }
                Ok(descriptors)
            }
        }
    }
}

fn ensure_listed(tool: &Path, names: &[String]) -> Result<(), DiscoveryError> {
    if names.is_empty() {
        return Err(DiscoveryError::ListingUnavailable {
            tool: tool.to_path_buf(),
            message: "'--operators' printed nothing".to_string(),
        });
    }
    Ok(())
}

fn unique(names: Vec<String>) -> BTreeSet<String> {
    names.into_iter().collect()
}

/// Operator names from the `Operators:` block of the help text.
pub(crate) fn parse_help_operators(help: &str) -> Result<Vec<String>, String> {
    let lines: Vec<&str> = help.lines().map(str::trim).collect();
    if lines.len() <= 5 {
        return Err(format!("help output has only {} lines", lines.len()));
    }
    let start = lines
        .iter()
        .position(|l| *l == "Operators:")
        .ok_or_else(|| "help output has no 'Operators:' section".to_string())?;
    Ok(lines[start + 1..]
        .iter()
        .take_while(|l| !l.is_empty() && !l.contains("CDO version"))
        .flat_map(|l| l.split_whitespace())
        .map(str::to_string)
        .collect())
}

pub(crate) fn first_tokens(listing: &str) -> Vec<String> {
    listing
        .lines()
        .filter_map(|l| l.split_whitespace().next())
        .map(str::to_string)
        .collect()
}

/// Parses `name  description  (i|o)` lines.
pub(crate) fn parse_arity_listing(listing: &str) -> Result<Vec<OperatorDescriptor>, DiscoveryError> {
    let mut descriptors = BTreeMap::new();
    for line in listing.lines().filter(|l| !l.trim().is_empty()) {
        let mut words = line.split_whitespace();
        let name = words.next().unwrap_or_default();
        let counts = words.next_back().unwrap_or_default();
        let outputs = counts
            .strip_prefix('(')
            .and_then(|c| c.strip_suffix(')'))
            .and_then(|c| c.split('|').nth(1))
            .and_then(|o| o.trim().parse::<i64>().ok())
            .ok_or_else(|| DiscoveryError::MalformedListing(line.to_string()))?;
        descriptors.insert(
            name.to_string(),
            OperatorDescriptor::new(name, Arity::from_count(outputs)),
        );
    }
    Ok(descriptors.into_values().collect())
}

/// Library support reported by `-V`: `None` when no version is printed.
pub(crate) fn parse_libraries(text: &str) -> BTreeMap<String, Option<String>> {
    let mut libraries = BTreeMap::new();
    if let Some(features) = WITH_LINE.captures(text).and_then(|c| c.get(1)) {
        for name in features
            .as_str()
            .split(' ')
            .flat_map(|w| w.split('/'))
            .filter(|w| !w.is_empty())
        {
            libraries.insert(name.to_lowercase(), None);
        }
    }
    for capture in LIBRARY_VERSION.captures_iter(text) {
        libraries.insert(capture[1].to_lowercase(), Some(capture[2].to_string()));
    }
    libraries
}

/// What the tool reports about itself.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolInfo {
    pub path: PathBuf,
    pub version: CdoVersion,
    /// Version as printed, e.g. `2.4.0rc1`.
    pub version_string: String,
    pub libraries: BTreeMap<String, Option<String>>,
    pub strategy: DiscoveryStrategy,
}

impl ToolInfo {
    pub fn has_lib(&self, name: &str) -> bool {
        self.libraries.contains_key(&name.to_lowercase())
    }

    /// Version of a linked library. `Ok(None)` when the tool supports it without
    /// saying which version.
    pub fn lib_version(&self, name: &str) -> Result<Option<&str>, DiscoveryError> {
        match self.libraries.get(&name.to_lowercase()) {
            None => Err(DiscoveryError::LibraryMissing {
                tool: self.path.clone(),
                library: name.to_string(),
            }),
            Some(None) => {
                warn!("No version information available about '{}'", name);
                Ok(None)
            }
            Some(Some(version)) => Ok(Some(version)),
        }
    }
}

/// Result of probing a tool binary.
#[derive(Debug, Clone)]
pub(crate) struct Discovery {
    pub info: ToolInfo,
    pub descriptors: Vec<OperatorDescriptor>,
}

pub(crate) async fn discover(
    tool: &Path,
    env: &HashMap<String, String>,
) -> Result<Discovery, DiscoveryError> {
    let banner = query_tool(tool, &["-V"], env).await?.combined();
    let (version, version_string) =
        CdoVersion::from_banner(&banner).ok_or_else(|| DiscoveryError::VersionNotFound {
            tool: tool.to_path_buf(),
        })?;
    let strategy = DiscoveryStrategy::for_version(version);
    let descriptors = strategy.run(tool, env).await?;
    info!(
        "Found {} operators in {:?} version {} ({:?})",
        descriptors.len(),
        tool,
        version_string,
        strategy
    );
    Ok(Discovery {
        info: ToolInfo {
            path: tool.to_path_buf(),
            version,
            version_string,
            libraries: parse_libraries(&banner),
            strategy,
        },
        descriptors,
    })
}

/// `--config all` as a map of feature to availability. Tools up to 1.9.3 cannot
/// report it and yield an empty map.
pub(crate) async fn query_config(
    tool: &Path,
    version: CdoVersion,
    env: &HashMap<String, String>,
) -> Result<BTreeMap<String, bool>, DiscoveryError> {
    if version <= CdoVersion::new(1, 9, 3) {
        warn!("Cannot check configuration of the binary! Please check manually with '{} -V'", tool.display());
        return Ok(BTreeMap::new());
    }
    let output = query_tool(tool, &["--config", "all"], env).await?;
    parse_config(tool, &output.stdout)
}

pub(crate) fn parse_config(tool: &Path, json: &str) -> Result<BTreeMap<String, bool>, DiscoveryError> {
    let raw: BTreeMap<String, serde_json::Value> =
        serde_json::from_str(json.trim()).map_err(|source| DiscoveryError::ConfigParse {
            tool: tool.to_path_buf(),
            source,
        })?;
    Ok(raw
        .into_iter()
        .map(|(k, v)| (k, v.as_str() == Some("yes")))
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_strategy_by_version() {
        let s = |a, b, c| DiscoveryStrategy::for_version(CdoVersion::new(a, b, c));
        assert_eq!(s(1, 6, 4), DiscoveryStrategy::HelpText);
        assert_eq!(s(1, 7, 2), DiscoveryStrategy::OperatorList);
        assert_eq!(s(1, 8, 2), DiscoveryStrategy::OperatorListWithNoOutput);
        assert_eq!(s(1, 9, 0), DiscoveryStrategy::OperatorList);
        assert_eq!(s(1, 9, 1), DiscoveryStrategy::OperatorListWithNoOutput);
        assert_eq!(s(1, 9, 3), DiscoveryStrategy::OperatorListWithArity);
        assert_eq!(s(2, 4, 0), DiscoveryStrategy::OperatorListWithArity);
    }

    #[test]
    fn test_arity_listing() {
        let listing = "\
abs              Absolute value                                (1|1)
sinfov           Short information                             (1|0)
trend            Trend                                         (1|2)
splitlevel       Split levels                                  (1|-1)
";
        let ops = parse_arity_listing(listing).unwrap();
        let arity = |n: &str| ops.iter().find(|d| d.name == n).unwrap().arity;
        assert_eq!(arity("abs"), Arity::One);
        assert_eq!(arity("sinfov"), Arity::NoOutput);
        assert_eq!(arity("trend"), Arity::Fixed(2));
        assert_eq!(arity("splitlevel"), Arity::Dynamic);

        assert!(matches!(
            parse_arity_listing("abs Absolute value\n"),
            Err(DiscoveryError::MalformedListing(_))
        ));
    }

    #[test]
    fn test_help_operators_section() {
        let help = "\
usage : cdo  [Options]  Operator1  [-Operator2  [-OperatorN]]

  Options:
    -a             Generate an absolute time axis
    -O             Overwrite existing output file

  Operators:
    abs           acos          add           addc
    sinfo         splitlevel    trend

  CDO version 1.6.4, Copyright (C) 2003-2014 Uwe Schulzweida
";
        let names = parse_help_operators(help).unwrap();
        assert_eq!(names, vec!["abs", "acos", "add", "addc", "sinfo", "splitlevel", "trend"]);
        assert!(parse_help_operators("cdo: command not found").is_err());
    }

    #[test]
    fn test_libraries_from_version_output() {
        let text = "\
Climate Data Operators version 1.9.10 (https://mpimet.mpg.de/cdo)
Features: 16GB 8threads C++14 Fortran DATA PTHREADS OpenMP HDF5 NC4/HDF5/threadsafe OPeNDAP SZ UDUNITS2
CDI data types: SizeType=size_t
HDF5 library version : 1.10.6
netCDF library version : 4.7.4 of Jan 1 2021
";
        let libs = parse_libraries(text);
        assert_eq!(libs.get("hdf5"), Some(&Some("1.10.6".to_string())));
        assert_eq!(libs.get("netcdf"), Some(&Some("4.7.4".to_string())));
        assert_eq!(libs.get("threadsafe"), Some(&None));
        assert_eq!(libs.get("nc4"), Some(&None));
        assert!(libs.contains_key("udunits2"));
    }

    #[test]
    fn test_config_json() {
        let config = parse_config(
            Path::new("cdo"),
            r#"{"has-cgribex":"yes","has-nc4":"yes","has-magics":"no"}"#,
        )
        .unwrap();
        assert_eq!(config.get("has-nc4"), Some(&true));
        assert_eq!(config.get("has-magics"), Some(&false));
        assert!(parse_config(Path::new("cdo"), "not json").is_err());
    }

    #[test]
    fn test_lib_version_distinguishes_missing_and_unversioned() {
        let info = ToolInfo {
            path: PathBuf::from("cdo"),
            version: CdoVersion::new(2, 0, 0),
            version_string: "2.0.0".to_string(),
            libraries: parse_libraries("with: PTHREADS NC4\nHDF5 library version : 1.12.1 \n"),
            strategy: DiscoveryStrategy::OperatorListWithArity,
        };
        assert!(info.has_lib("HDF5"));
        assert_eq!(info.lib_version("hdf5").unwrap(), Some("1.12.1"));
        assert_eq!(info.lib_version("nc4").unwrap(), None);
        assert!(matches!(
            info.lib_version("grib_api"),
            Err(DiscoveryError::LibraryMissing { .. })
        ));
    }
}
