//! Name filtering for benchmark selection.

use regex::Regex;
use thiserror::Error;

/// Errors that can occur when compiling a benchmark filter.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum FilterError {
    /// The filter expression is not a valid regular expression.
    #[error("could not compile benchmark filter: {0}")]
    InvalidExpression(#[from] regex::Error),
}

/// A predicate over expanded instance names.
///
/// The filter expression is a regular expression; a leading `-` negates the
/// match, and an empty expression or the literal `all` matches everything.
#[derive(Clone, Debug)]
pub struct BenchmarkFilter {
    expression: Regex,
    negated: bool,
}

impl BenchmarkFilter {
    /// Compiles a filter expression.
    pub fn compile(spec: &str) -> Result<Self, FilterError> {
        let spec = if spec.is_empty() || spec == "all" {
            "."
        } else {
            spec
        };

        let (spec, negated) = match spec.strip_prefix('-') {
            Some(rest) => (rest, true),
            None => (spec, false),
        };

        Ok(Self {
            expression: Regex::new(spec)?,
            negated,
        })
    }

    /// A filter matching every benchmark.
    #[must_use]
    pub fn match_all() -> Self {
        Self::compile(".").expect("the match-all expression always compiles")
    }

    /// Whether the named instance passes the filter.
    #[must_use]
    pub fn matches(&self, name: &str) -> bool {
        self.expression.is_match(name) != self.negated
    }
}
