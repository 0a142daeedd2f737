//! Statements excluded from comparison.
//!
//! A statement is filtered when its output depends on the environment rather
//! than on engine behavior, or when the corpus holds nothing to compare.

use std::fmt;

use crate::corpus::{ExpectedOutcome, StatementRecord};

/// Lower-case substrings whose presence anywhere in the source filters it.
pub const DEFAULT_DENY_LIST: &[&str] = &[
    "show databases",
    "select version()",
    "schema",
    "database",
    "use mysql",
    "desc",
    "select now()",
    "explain",
];

/// Why a statement was filtered.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FilterReason {
    /// The source contains a deny-list pattern.
    DenyList(String),
    /// The reference engine timed out.
    Timeout,
    /// Neither an output nor a known outcome was recorded.
    Unrecorded,
}

impl fmt::Display for FilterReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FilterReason::DenyList(pattern) => write!(f, "matches '{}'", pattern),
            FilterReason::Timeout => f.write_str("expected outcome is timeout"),
            FilterReason::Unrecorded => f.write_str("no expected output or outcome recorded"),
        }
    }
}

/// Case-insensitive substring deny-list plus the "nothing to compare" rules.
#[derive(Debug, Clone)]
pub struct StatementFilter {
    patterns: Vec<String>,
}

impl Default for StatementFilter {
    fn default() -> Self {
        Self::new(&[])
    }
}

impl StatementFilter {
    /// Build a filter from the default deny-list and `extra` patterns.
    pub fn new(extra: &[String]) -> Self {
        let mut patterns: Vec<String> = DEFAULT_DENY_LIST.iter().map(|p| p.to_string()).collect();
        for pattern in extra {
            let pattern = pattern.trim().to_lowercase();
            if !pattern.is_empty() && !patterns.contains(&pattern) {
                patterns.push(pattern);
            }
        }
        Self { patterns }
    }

    pub fn patterns(&self) -> &[String] {
        &self.patterns
    }

    /// First deny-list pattern contained in `source`, ignoring case.
    pub fn denied_by(&self, source: &str) -> Option<&str> {
        let lower = source.to_lowercase();
        self.patterns
            .iter()
            .find(|p| lower.contains(p.as_str()))
            .map(String::as_str)
    }

    /// Reason to filter `record`, if any. The deny-list is checked first.
    pub fn check(&self, record: &StatementRecord) -> Option<FilterReason> {
        if let Some(pattern) = self.denied_by(&record.source) {
            return Some(FilterReason::DenyList(pattern.to_string()));
        }

        match record.expected_outcome {
            ExpectedOutcome::Timeout => Some(FilterReason::Timeout),
            ExpectedOutcome::Unknown(_) if record.expected_output.is_empty() => {
                Some(FilterReason::Unrecorded)
            }
            _ => None,
        }
    }
}
