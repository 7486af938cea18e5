//! Types describing one call of the tool.

use crate::materialize::backend::Backend;
use crate::materialize::dataset::Dataset;
use bon::Builder;
use std::collections::HashMap;
use std::fmt;
use std::path::{Path, PathBuf};

/// One operator with its literal parameters, rendered as `name,p1,p2`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Operator {
    pub name: String,
    pub params: Vec<String>,
}

impl Operator {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            params: Vec::new(),
        }
    }

    pub fn param(mut self, param: impl ToString) -> Self {
        self.params.push(param.to_string());
        self
    }

    pub fn params<T: ToString>(mut self, params: impl IntoIterator<Item = T>) -> Self {
        self.params.extend(params.into_iter().map(|p| p.to_string()));
        self
    }

    pub fn render(&self) -> String {
        std::iter::once(self.name.as_str())
            .chain(self.params.iter().map(String::as_str))
            .collect::<Vec<_>>()
            .join(",")
    }
}

/// Parses `"name,p1,p2"`.
impl From<&str> for Operator {
    fn from(value: &str) -> Self {
        let mut pieces = value.split(',');
        let name = pieces.next().unwrap_or_default().trim_start_matches('-');
        Operator::new(name).params(pieces)
    }
}

impl From<String> for Operator {
    fn from(value: String) -> Self {
        Operator::from(value.as_str())
    }
}

impl fmt::Display for Operator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.render())
    }
}

/// Operators applied in one tool call. The first one is the leading operator;
/// the rest are piped into it and rendered with a leading `-`.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct OperatorChain(pub Vec<Operator>);

impl OperatorChain {
    pub fn new(leading: impl Into<Operator>) -> Self {
        Self(vec![leading.into()])
    }

    pub fn then(mut self, operator: impl Into<Operator>) -> Self {
        self.0.push(operator.into());
        self
    }

    pub fn leading(&self) -> Option<&Operator> {
        self.0.first()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn render(&self) -> Vec<String> {
        self.0
            .iter()
            .enumerate()
            .map(|(i, op)| {
                if i == 0 {
                    op.render()
                } else {
                    format!("-{}", op.render())
                }
            })
            .collect()
    }
}

impl From<Operator> for OperatorChain {
    fn from(value: Operator) -> Self {
        Self(vec![value])
    }
}

impl From<&str> for OperatorChain {
    fn from(value: &str) -> Self {
        Self(vec![value.into()])
    }
}

impl From<String> for OperatorChain {
    fn from(value: String) -> Self {
        Self(vec![value.into()])
    }
}

impl From<Vec<Operator>> for OperatorChain {
    fn from(value: Vec<Operator>) -> Self {
        Self(value)
    }
}

/// Where an invocation reads from.
#[derive(Debug, Clone)]
pub enum Input {
    /// A file, quoted on the command line.
    Path(PathBuf),
    Paths(Vec<PathBuf>),
    /// Passed through verbatim, e.g. `"-topo"` or `"-selname,T in.nc"`.
    Raw(String),
    /// An operator applied to another input inside the same tool call.
    Piped {
        operator: Operator,
        input: Option<Box<Input>>,
    },
    /// Another invocation, run first; its output path becomes this input.
    Invocation(Box<Invocation>),
    /// An in-memory dataset, written to a scratch file first.
    Dataset(Box<Dataset>),
    Many(Vec<Input>),
}

impl Input {
    pub fn piped(operator: impl Into<Operator>, input: impl Into<Input>) -> Self {
        Input::Piped {
            operator: operator.into(),
            input: Some(Box::new(input.into())),
        }
    }

    /// An input-less generator operator such as `-topo` or `-stdatm,0`.
    pub fn generator(operator: impl Into<Operator>) -> Self {
        Input::Piped {
            operator: operator.into(),
            input: None,
        }
    }
}

impl From<&str> for Input {
    fn from(value: &str) -> Self {
        Input::Raw(value.to_string())
    }
}

impl From<String> for Input {
    fn from(value: String) -> Self {
        Input::Raw(value)
    }
}

impl From<PathBuf> for Input {
    fn from(value: PathBuf) -> Self {
        Input::Path(value)
    }
}

impl From<&Path> for Input {
    fn from(value: &Path) -> Self {
        Input::Path(value.to_path_buf())
    }
}

impl From<&PathBuf> for Input {
    fn from(value: &PathBuf) -> Self {
        Input::Path(value.clone())
    }
}

impl From<Vec<PathBuf>> for Input {
    fn from(value: Vec<PathBuf>) -> Self {
        Input::Paths(value)
    }
}

impl From<Dataset> for Input {
    fn from(value: Dataset) -> Self {
        Input::Dataset(Box::new(value))
    }
}

impl From<Invocation> for Input {
    fn from(value: Invocation) -> Self {
        Input::Invocation(Box::new(value))
    }
}

impl From<Vec<Input>> for Input {
    fn from(value: Vec<Input>) -> Self {
        Input::Many(value)
    }
}

/// Explicit output location(s). A single path doubles as the prefix for split operators.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Output {
    Path(PathBuf),
    Paths(Vec<PathBuf>),
}

impl Output {
    pub fn paths(&self) -> Vec<PathBuf> {
        match self {
            Output::Path(p) => vec![p.clone()],
            Output::Paths(p) => p.clone(),
        }
    }
}

impl From<&str> for Output {
    fn from(value: &str) -> Self {
        Output::Path(PathBuf::from(value))
    }
}

impl From<String> for Output {
    fn from(value: String) -> Self {
        Output::Path(PathBuf::from(value))
    }
}

impl From<PathBuf> for Output {
    fn from(value: PathBuf) -> Self {
        Output::Path(value)
    }
}

impl From<&Path> for Output {
    fn from(value: &Path) -> Self {
        Output::Path(value.to_path_buf())
    }
}

impl From<&PathBuf> for Output {
    fn from(value: &PathBuf) -> Self {
        Output::Path(value.clone())
    }
}

impl From<Vec<PathBuf>> for Output {
    fn from(value: Vec<PathBuf>) -> Self {
        Output::Paths(value)
    }
}

/// What the caller wants back from a file-producing invocation.
///
/// Several intents may be set; the first of these wins: `array`, `masked_array`,
/// `dataset`, `lazy`, then plain path(s). Split operators always return the
/// globbed file list.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ResultShape {
    pub array: Option<String>,
    pub masked_array: Option<String>,
    pub dataset: Option<Backend>,
    pub lazy: bool,
    /// Explicitly ask for path(s), overriding the session's dataset default.
    pub path: bool,
}

impl ResultShape {
    pub fn path() -> Self {
        Self {
            path: true,
            ..Self::default()
        }
    }

    pub fn array(variable: impl Into<String>) -> Self {
        Self::default().with_array(variable)
    }

    pub fn masked_array(variable: impl Into<String>) -> Self {
        Self::default().with_masked_array(variable)
    }

    pub fn dataset(backend: Backend) -> Self {
        Self::default().with_dataset(backend)
    }

    pub fn lazy() -> Self {
        Self::default().with_lazy()
    }

    pub fn with_array(mut self, variable: impl Into<String>) -> Self {
        self.array = Some(variable.into());
        self
    }

    pub fn with_masked_array(mut self, variable: impl Into<String>) -> Self {
        self.masked_array = Some(variable.into());
        self
    }

    pub fn with_dataset(mut self, backend: Backend) -> Self {
        self.dataset = Some(backend);
        self
    }

    pub fn with_lazy(mut self) -> Self {
        self.lazy = true;
        self
    }

    pub fn with_path(mut self) -> Self {
        self.path = true;
        self
    }

    pub(crate) fn wants_single_variable(&self) -> bool {
        self.array.is_some() || self.masked_array.is_some()
    }
}

/// One call of the tool.
///
/// # Examples
///
/// ```
/// use cdo::{Input, Invocation, Operator, ResultShape};
///
/// let request = Invocation::builder(Operator::new("sellonlatbox").params([0, 30, 40, 60]))
///     .input(Input::piped("selname,T", "era5.nc"))
///     .output("europe.nc")
///     .options("-f nc4")
///     .returns(ResultShape::array("T"))
///     .build();
///
/// assert_eq!(request.chain.render(), vec!["sellonlatbox,0,30,40,60"]);
/// ```
#[derive(Debug, Clone, Builder)]
pub struct Invocation {
    #[builder(start_fn, into)]
    pub chain: OperatorChain,

    #[builder(into)]
    pub input: Option<Input>,

    #[builder(into)]
    pub output: Option<Output>,

    /// Extra tool options, split like a shell would, e.g. `"-f nc4 -z zip"`.
    #[builder(into)]
    pub options: Option<String>,

    /// Overwrite policy; `None` uses the session default.
    pub force: Option<bool>,

    /// Environment overrides for this call only.
    #[builder(default)]
    pub env: HashMap<String, String>,

    #[builder(default)]
    pub returns: ResultShape,

    /// Split each line of text output on this separator.
    #[builder(into)]
    pub split: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_operator_rendering() {
        assert_eq!(Operator::new("sinfov").render(), "sinfov");
        assert_eq!(Operator::new("stdatm").param(0).render(), "stdatm,0");
        assert_eq!(
            Operator::from("-sellonlatbox,0,10,0,10"),
            Operator::new("sellonlatbox").params(["0", "10", "0", "10"])
        );
    }

    #[test]
    fn test_chain_prefixes_piped_operators() {
        let chain = OperatorChain::new("sub").then("selname,T").then(Operator::new("timmean"));
        assert_eq!(chain.render(), vec!["sub", "-selname,T", "-timmean"]);
        assert_eq!(chain.leading().unwrap().name, "sub");
    }

    #[test]
    fn test_builder_defaults() {
        let request = Invocation::builder("stdatm,0").build();
        assert!(request.input.is_none());
        assert!(request.force.is_none());
        assert!(request.env.is_empty());
        assert_eq!(request.returns, ResultShape::default());
    }
}
