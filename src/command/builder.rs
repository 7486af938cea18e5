use crate::command::request::OperatorChain;
use crate::error::CdoError;
use std::path::{Path, PathBuf};

/// Overwrite flag passed on every call.
pub const OVERWRITE_FLAG: &str = "-O";

/// A shell-ready command line, in the order the tool expects:
/// tool, `-O`, options, operator chain, inputs, outputs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandLine {
    args: Vec<String>,
}

impl CommandLine {
    /// `inputs` are taken as already rendered shell words; paths are quoted here.
    pub fn assemble(
        tool: &Path,
        options: &[String],
        chain: &OperatorChain,
        inputs: &[String],
        outputs: &[PathBuf],
    ) -> Result<Self, CdoError> {
        if chain.is_empty() {
            return Err(CdoError::InvalidRequest("operator chain is empty".to_string()));
        }
        let mut args = Vec::with_capacity(2 + options.len() + chain.len() + inputs.len() + outputs.len());
        args.push(quote_path(tool));
        args.push(OVERWRITE_FLAG.to_string());
        args.extend(options.iter().map(|o| shell_words::quote(o).into_owned()));
        args.extend(chain.render());
        args.extend(inputs.iter().cloned());
        args.extend(outputs.iter().map(|p| quote_path(p)));
        Ok(Self { args })
    }

    pub fn args(&self) -> &[String] {
        &self.args
    }

    pub fn render(&self) -> String {
        self.args.join(" ")
    }
}

pub(crate) fn quote_path(path: &Path) -> String {
    shell_words::quote(&path.to_string_lossy()).into_owned()
}

/// Splits session and call options like a shell would, session options first.
pub(crate) fn split_options(session: Option<&str>, call: Option<&str>) -> Result<Vec<String>, CdoError> {
    let mut options = Vec::new();
    for raw in [session, call].into_iter().flatten() {
        options.extend(
            shell_words::split(raw)
                .map_err(|e| CdoError::InvalidRequest(format!("cannot parse options '{}': {}", raw, e)))?,
        );
    }
    Ok(options)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::command::request::Operator;

    #[test]
    fn test_fixed_argument_order() {
        let chain = OperatorChain::new(Operator::new("remapbil").param("r360x180")).then("selname,T");
        let line = CommandLine::assemble(
            Path::new("/usr/bin/cdo"),
            &["-f".to_string(), "nc4".to_string()],
            &chain,
            &["'in put.nc'".to_string()],
            &[PathBuf::from("/tmp/out.nc")],
        )
        .unwrap();
        assert_eq!(
            line.render(),
            "/usr/bin/cdo -O -f nc4 remapbil,r360x180 -selname,T 'in put.nc' /tmp/out.nc"
        );
    }

    #[test]
    fn test_paths_with_spaces_are_quoted() {
        let line = CommandLine::assemble(
            Path::new("/opt/my tools/cdo"),
            &[],
            &OperatorChain::new("sinfov"),
            &[],
            &[],
        )
        .unwrap();
        assert_eq!(line.args()[0], "'/opt/my tools/cdo'");
    }

    #[test]
    fn test_empty_chain_is_rejected() {
        let err = CommandLine::assemble(Path::new("cdo"), &[], &OperatorChain::default(), &[], &[]);
        assert!(matches!(err, Err(CdoError::InvalidRequest(_))));
    }

    #[test]
    fn test_options_merge_session_first() {
        let options = split_options(Some("-s"), Some("-f nc4 -z zip")).unwrap();
        assert_eq!(options, vec!["-s", "-f", "nc4", "-z", "zip"]);
        assert!(split_options(None, Some("-f 'nc4")).is_err());
    }
}
