use crate::error::CdoError;
use crate::operators::descriptor::OperatorDescriptor;
use std::collections::BTreeMap;
use std::ops::Bound;

/// How a requested name matched the registry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Resolution<'a> {
    Exact(&'a OperatorDescriptor),
    /// No exact match; these operators start with the requested name.
    Prefix(Vec<&'a str>),
}

/// All operators offered by one tool binary, keyed by name.
#[derive(Debug, Clone, Default)]
pub struct OperatorRegistry {
    operators: BTreeMap<String, OperatorDescriptor>,
}

impl OperatorRegistry {
    pub fn new(descriptors: impl IntoIterator<Item = OperatorDescriptor>) -> Self {
        Self {
            operators: descriptors
                .into_iter()
                .map(|d| (d.name.clone(), d))
                .collect(),
        }
    }

    pub fn len(&self) -> usize {
        self.operators.len()
    }

    pub fn is_empty(&self) -> bool {
        self.operators.is_empty()
    }

    pub fn get(&self, name: &str) -> Option<&OperatorDescriptor> {
        self.operators.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.operators.contains_key(name)
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.operators.keys().map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = &OperatorDescriptor> {
        self.operators.values()
    }

    /// Names starting with `prefix`, in sorted order. Nothing is executed.
    pub fn complete(&self, prefix: &str) -> Vec<&str> {
        self.operators
            .range::<str, _>((Bound::Included(prefix), Bound::Unbounded))
            .take_while(|(name, _)| name.starts_with(prefix))
            .map(|(name, _)| name.as_str())
            .collect()
    }

    /// Resolves a name for discovery purposes: an exact match, or the operators it
    /// is a prefix of. Fails only when the name matches nothing at all.
    pub fn resolve(&self, name: &str) -> Result<Resolution<'_>, CdoError> {
        if let Some(descriptor) = self.get(name) {
            return Ok(Resolution::Exact(descriptor));
        }
        let candidates = self.complete(name);
        if name.is_empty() || candidates.is_empty() {
            return Err(CdoError::UnknownOperator(name.to_string()));
        }
        Ok(Resolution::Prefix(candidates))
    }

    /// Resolves a name for execution, which needs an exact match.
    pub fn require(&self, name: &str) -> Result<&OperatorDescriptor, CdoError> {
        match self.resolve(name)? {
            Resolution::Exact(descriptor) => Ok(descriptor),
            Resolution::Prefix(candidates) => Err(CdoError::IncompleteOperator {
                name: name.to_string(),
                candidates: candidates.into_iter().map(str::to_string).collect(),
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::operators::descriptor::Arity;

    fn registry() -> OperatorRegistry {
        OperatorRegistry::new(
            ["sinfo", "sinfov", "splitlevel", "stdatm", "fldmean"]
                .into_iter()
                .map(OperatorDescriptor::from_builtin_lists),
        )
    }

    #[test]
    fn test_exact_match_wins_over_prefix() {
        let registry = registry();
        match registry.resolve("sinfo").unwrap() {
            Resolution::Exact(d) => assert_eq!(d.arity, Arity::NoOutput),
            other => panic!("expected exact match, got {:?}", other),
        }
    }

    #[test]
    fn test_prefix_lists_candidates_without_error() {
        let registry = registry();
        assert_eq!(
            registry.resolve("s").unwrap(),
            Resolution::Prefix(vec!["sinfo", "sinfov", "splitlevel", "stdatm"])
        );
        assert_eq!(registry.complete("spl"), vec!["splitlevel"]);
        assert_eq!(registry.complete("fld"), vec!["fldmean"]);
        assert!(registry.complete("z").is_empty());
        assert_eq!(registry.complete("").len(), registry.len());
    }

    #[test]
    fn test_unknown_and_incomplete_names() {
        let registry = registry();
        assert!(registry.resolve("nonexisting").unwrap_err().is_unknown_operator());
        assert!(registry.resolve("").unwrap_err().is_unknown_operator());
        match registry.require("split") {
            Err(CdoError::IncompleteOperator { candidates, .. }) => {
                assert_eq!(candidates, vec!["splitlevel"])
            }
            other => panic!("expected incomplete operator, got {:?}", other),
        }
    }
}
