//! Matching strategies for object queries
//!
//! A [`Matcher`] is a plain value chosen by the caller. It is compiled
//! against one needle at a time; exact matching compares strings directly
//! and never builds a regular expression.

use regex::{Regex, RegexBuilder};

use crate::error::Result;

/// How a query string is compared against object types and names
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Matcher {
    /// Literal, case-sensitive equality
    Exact,
    /// Case-insensitive regular expression anchored at the start
    #[default]
    Pattern,
}

impl Matcher {
    /// Prepare this strategy for `needle`
    pub fn compile(self, needle: &str) -> Result<CompiledMatcher> {
        match self {
            Self::Exact => Ok(CompiledMatcher::Exact(needle.to_string())),
            Self::Pattern => {
                let regex = RegexBuilder::new(&format!("^(?:{needle})"))
                    .case_insensitive(true)
                    .build()?;
                Ok(CompiledMatcher::Pattern(regex))
            }
        }
    }
}

/// A matcher bound to one needle
#[derive(Debug, Clone)]
pub enum CompiledMatcher {
    /// Literal needle
    Exact(String),
    /// Compiled pattern
    Pattern(Regex),
}

impl CompiledMatcher {
    /// Whether `candidate` matches
    pub fn matches(&self, candidate: &str) -> bool {
        match self {
            Self::Exact(needle) => needle == candidate,
            Self::Pattern(regex) => regex.is_match(candidate),
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn exact_is_case_sensitive() {
        let m = Matcher::Exact.compile("GR").unwrap();
        assert!(m.matches("GR"));
        assert!(!m.matches("gr"));
        assert!(!m.matches("GRX"));
    }

    #[test]
    fn pattern_is_case_insensitive_and_start_anchored() {
        let m = Matcher::Pattern.compile("gr").unwrap();
        assert!(m.matches("GR"));
        assert!(m.matches("GRX"));
        assert!(!m.matches("XGR"));

        let m = Matcher::Pattern.compile("GR$").unwrap();
        assert!(!m.matches("GRX"));
    }

    #[test]
    fn alternation_stays_anchored() {
        let m = Matcher::Pattern.compile("A|B").unwrap();
        assert!(m.matches("BX"));
        assert!(!m.matches("XB"));
    }

    #[test]
    fn invalid_pattern_is_an_error() {
        assert!(Matcher::Pattern.compile("(").is_err());
        assert!(Matcher::Exact.compile("(").is_ok());
    }
}
