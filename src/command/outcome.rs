use crate::operators::lists::{is_comparison, DIFFERENCES_FOUND_EXIT_CODE};
use crate::operators::version::CdoVersion;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Raw outcome of one tool run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InvocationResult {
    pub command: String,
    pub stdout: String,
    pub stderr: String,
    /// Exit code, or `-1` when the process was killed by a signal.
    pub returncode: i32,
}

impl InvocationResult {
    /// Stdout split into stripped lines, without the trailing empty line.
    pub fn lines(&self) -> Vec<String> {
        let mut lines: Vec<String> = self
            .stdout
            .split('\n')
            .map(|l| l.trim().to_string())
            .collect();
        if lines.last().is_some_and(|l| l.is_empty()) {
            lines.pop();
        }
        lines
    }

    /// [`lines`](Self::lines), each further split on `separator`. Empty fields are dropped.
    pub fn fields(&self, separator: &str) -> Vec<Vec<String>> {
        self.lines()
            .iter()
            .map(|line| {
                line.split(separator)
                    .map(str::trim)
                    .filter(|f| !f.is_empty())
                    .map(str::to_string)
                    .collect()
            })
            .collect()
    }

    pub(crate) fn into_error(self) -> InvocationError {
        InvocationError {
            command: self.command,
            stdout: self.stdout,
            stderr: self.stderr,
            returncode: self.returncode,
        }
    }
}

/// The tool exited with a code that does not count as success.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("(returncode:{returncode}) {stderr}")]
pub struct InvocationError {
    pub command: String,
    pub stdout: String,
    pub stderr: String,
    pub returncode: i32,
}

/// How the "differences found" exit code of comparison operators is classified.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum ComparisonExit {
    /// Only `0` is success.
    Strict,
    /// The differences-found code is success for comparison operators.
    AllowDifferences,
    /// Like `AllowDifferences` from tool version 2.0.0 on, `Strict` before.
    #[default]
    ByVersion,
}

impl ComparisonExit {
    pub const DIFFERENCES_FROM: CdoVersion = CdoVersion::new(2, 0, 0);

    pub fn is_success(self, operator: &str, returncode: i32, version: CdoVersion) -> bool {
        if returncode == 0 {
            return true;
        }
        if returncode != DIFFERENCES_FOUND_EXIT_CODE || !is_comparison(operator) {
            return false;
        }
        match self {
            ComparisonExit::Strict => false,
            ComparisonExit::AllowDifferences => true,
            ComparisonExit::ByVersion => version >= Self::DIFFERENCES_FROM,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn result(stdout: &str) -> InvocationResult {
        InvocationResult {
            command: "cdo -O showlevel in.nc".to_string(),
            stdout: stdout.to_string(),
            stderr: String::new(),
            returncode: 0,
        }
    }

    #[test]
    fn test_lines_are_stripped_and_trailing_line_dropped() {
        let r = result("  File format : NetCDF  \n   -1 : Institut Source\n");
        assert_eq!(r.lines(), vec!["File format : NetCDF", "-1 : Institut Source"]);
        assert_eq!(result("42").lines(), vec!["42"]);
        assert!(result("").lines().is_empty());
    }

    #[test]
    fn test_fields_split_each_line() {
        let r = result(" 0 10000 20000 \n");
        assert_eq!(r.fields(" "), vec![vec!["0", "10000", "20000"]]);
    }

    #[test]
    fn test_error_message_carries_code_and_stderr() {
        let mut r = result("");
        r.stderr = "cdo sinfov: Open failed on >nofile.nc<".to_string();
        r.returncode = 1;
        let err = r.into_error();
        assert_eq!(err.to_string(), "(returncode:1) cdo sinfov: Open failed on >nofile.nc<");
    }

    #[test]
    fn test_comparison_exit_classification() {
        let old = CdoVersion::new(1, 9, 10);
        let new = CdoVersion::new(2, 1, 0);
        assert!(ComparisonExit::ByVersion.is_success("diffn", 1, new));
        assert!(!ComparisonExit::ByVersion.is_success("diffn", 1, old));
        assert!(ComparisonExit::AllowDifferences.is_success("diff", 1, old));
        assert!(!ComparisonExit::Strict.is_success("diff", 1, new));
        assert!(!ComparisonExit::AllowDifferences.is_success("fldmean", 1, new));
        assert!(!ComparisonExit::AllowDifferences.is_success("diff", 2, new));
        assert!(ComparisonExit::Strict.is_success("fldmean", 0, old));
    }
}
