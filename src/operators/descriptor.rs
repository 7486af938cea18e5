use crate::operators::lists::{is_split_family, MORE_OUTPUT_OPERATORS, NO_OUTPUT_OPERATORS, TWO_OUTPUT_OPERATORS};
use serde::{Deserialize, Serialize};

/// How many files an operator writes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Arity {
    /// Prints text to stdout.
    NoOutput,
    One,
    /// A fixed number of files, always more than one.
    Fixed(usize),
    /// Any number of files sharing one output prefix.
    Dynamic,
}

impl Arity {
    /// Maps the tool's self-reported output count: `0`, `1`, `n > 1` or `-1`.
    pub fn from_count(count: i64) -> Arity {
        match count {
            0 => Arity::NoOutput,
            1 => Arity::One,
            n if n > 1 => Arity::Fixed(n as usize),
            _ => Arity::Dynamic,
        }
    }

    /// Number of output locations the command line takes. A dynamic operator
    /// takes a single prefix.
    pub fn output_slots(self) -> usize {
        match self {
            Arity::NoOutput => 0,
            Arity::One | Arity::Dynamic => 1,
            Arity::Fixed(n) => n,
        }
    }

    pub fn writes_files(self) -> bool {
        self != Arity::NoOutput
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct OperatorDescriptor {
    pub name: String,
    pub arity: Arity,
}

impl OperatorDescriptor {
    pub fn new(name: impl Into<String>, arity: Arity) -> Self {
        Self {
            name: name.into(),
            arity,
        }
    }

    /// Whether results are found by globbing the output prefix.
    pub fn is_split(&self) -> bool {
        self.arity == Arity::Dynamic || is_split_family(&self.name)
    }

    /// Arity from the static lists, defaulting to one output file.
    pub(crate) fn from_static_lists(name: &str, no_output: &[&str]) -> Self {
        let mut arity = Arity::One;
        if no_output.contains(&name) {
            arity = Arity::NoOutput;
        }
        if TWO_OUTPUT_OPERATORS.contains(&name) {
            arity = Arity::Fixed(2);
        }
        if MORE_OUTPUT_OPERATORS.contains(&name) {
            arity = Arity::Dynamic;
        }
        Self::new(name, arity)
    }

    pub(crate) fn from_builtin_lists(name: &str) -> Self {
        Self::from_static_lists(name, NO_OUTPUT_OPERATORS)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_arity_from_reported_count() {
        assert_eq!(Arity::from_count(0), Arity::NoOutput);
        assert_eq!(Arity::from_count(1), Arity::One);
        assert_eq!(Arity::from_count(2), Arity::Fixed(2));
        assert_eq!(Arity::from_count(-1), Arity::Dynamic);
        assert_eq!(Arity::Dynamic.output_slots(), 1);
        assert_eq!(Arity::Fixed(3).output_slots(), 3);
    }

    #[test]
    fn test_static_lists_override_default() {
        assert_eq!(OperatorDescriptor::from_builtin_lists("sinfov").arity, Arity::NoOutput);
        assert_eq!(OperatorDescriptor::from_builtin_lists("trend").arity, Arity::Fixed(2));
        assert_eq!(OperatorDescriptor::from_builtin_lists("splitlevel").arity, Arity::Dynamic);
        assert_eq!(OperatorDescriptor::from_builtin_lists("fldmean").arity, Arity::One);
        assert!(OperatorDescriptor::from_builtin_lists("splitlevel").is_split());
    }
}
