use regex::{Regex, RegexBuilder};
use thiserror::Error;

pub const DEFAULT_CONTEXT_LINES: usize = 5;

#[derive(Debug, Error)]
pub enum MatcherError {
    #[error("search pattern is empty")]
    EmptyPattern,

    #[error("invalid regex {pattern}: {source}")]
    InvalidPattern {
        pattern: String,
        #[source]
        source: regex::Error,
    },
}

#[derive(Debug, Error, Eq, PartialEq)]
pub enum ContextError {
    #[error("cannot combine --surround with --ahead or --behind")]
    Conflicting,
}

/// Line matcher for content search. Literal patterns are escaped and share
/// the regex engine so case folding behaves the same in both modes.
#[derive(Clone, Debug)]
pub struct ContentMatcher {
    regex: Regex,
}

impl ContentMatcher {
    pub fn new(pattern: &str, is_regex: bool, ignore_case: bool) -> Result<Self, MatcherError> {
        if pattern.is_empty() {
            return Err(MatcherError::EmptyPattern);
        }

        let source = if is_regex {
            pattern.to_string()
        } else {
            regex::escape(pattern)
        };
        let regex = RegexBuilder::new(&source)
            .case_insensitive(ignore_case)
            .build()
            .map_err(|source| MatcherError::InvalidPattern {
                pattern: pattern.to_string(),
                source,
            })?;

        Ok(Self { regex })
    }

    pub fn is_match(&self, line: &str) -> bool {
        self.regex.is_match(line)
    }
}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct ContextLines {
    pub behind: usize,
    pub ahead: usize,
}

impl Default for ContextLines {
    fn default() -> Self {
        Self {
            behind: DEFAULT_CONTEXT_LINES,
            ahead: DEFAULT_CONTEXT_LINES,
        }
    }
}

impl ContextLines {
    /// Combines the per-side counts with the symmetric `surround` count.
    /// Only explicitly supplied values are passed in; the two modes are exclusive.
    pub fn resolve(
        ahead: Option<usize>,
        behind: Option<usize>,
        surround: Option<usize>,
    ) -> Result<Self, ContextError> {
        if let Some(surround) = surround {
            if ahead.is_some() || behind.is_some() {
                return Err(ContextError::Conflicting);
            }
            return Ok(Self {
                behind: surround,
                ahead: surround,
            });
        }

        let defaults = Self::default();
        Ok(Self {
            behind: behind.unwrap_or(defaults.behind),
            ahead: ahead.unwrap_or(defaults.ahead),
        })
    }
}
