//! Per-statement verdicts.
//!
//! A record goes through four steps, any of which may settle its verdict:
//! pre-filter, schema reset, line-by-line replay, output comparison.

use serde::{Deserialize, Serialize};
use std::fmt;
use tracing::{debug, trace};

use super::filter::{FilterReason, StatementFilter};
use super::normalize::normalize_all;
use crate::config::{EmptyOutputPolicy, ReplayConfig};
use crate::corpus::{ExpectedOutcome, StatementRecord};
use crate::target::TargetSession;

/// Final three-way classification of a statement.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Classification {
    Consistent,
    Inconsistent,
    Filtered,
}

/// Why a statement is consistent.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Agreement {
    /// Output equals the expected output byte for byte.
    OutputMatched,
    /// Nothing was expected, so nothing was compared.
    NoAssertion,
    /// A line failed and failure was the expected outcome.
    ExpectedFailure { line: String },
}

/// Why a statement is inconsistent.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Divergence {
    /// The isolated schema could not be reset.
    SchemaReset { message: String },
    /// A line failed although failure was not expected.
    UnexpectedError { line: String, message: String },
    /// Every line ran but the output differs.
    OutputMismatch { expected: String, actual: String },
}

impl fmt::Display for Divergence {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Divergence::SchemaReset { message } => write!(f, "schema reset failed: {}", message),
            Divergence::UnexpectedError { line, message } => {
                write!(f, "unexpected error on `{}`: {}", line, message)
            }
            Divergence::OutputMismatch { expected, actual } => {
                write!(f, "output mismatch: expected {:?}, got {:?}", expected, actual)
            }
        }
    }
}

/// Verdict for one statement record, with the evidence behind it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Verdict {
    Consistent(Agreement),
    Inconsistent(Divergence),
    Filtered(FilterReason),
}

impl Verdict {
    pub fn classification(&self) -> Classification {
        match self {
            Verdict::Consistent(_) => Classification::Consistent,
            Verdict::Inconsistent(_) => Classification::Inconsistent,
            Verdict::Filtered(_) => Classification::Filtered,
        }
    }

    /// True when the schema reset failed, which is the only verdict that
    /// says something about the session rather than about the statement.
    pub fn is_reset_failure(&self) -> bool {
        matches!(self, Verdict::Inconsistent(Divergence::SchemaReset { .. }))
    }
}

/// Executable lines of a raw source: trimmed, without blanks and `--` comments.
pub fn split_statements(source: &str) -> impl Iterator<Item = &str> {
    source
        .split('\n')
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with("--"))
}

/// Classifies statement records against a live target session.
#[derive(Debug, Clone, Default)]
pub struct Classifier {
    filter: StatementFilter,
    empty_output: EmptyOutputPolicy,
}

impl Classifier {
    pub fn new(filter: StatementFilter, empty_output: EmptyOutputPolicy) -> Self {
        Self {
            filter,
            empty_output,
        }
    }

    pub fn from_config(config: &ReplayConfig) -> Self {
        Self::new(
            StatementFilter::new(&config.extra_filters),
            config.empty_output,
        )
    }

    /// Classify `record` on `session`, using `schema` as the scratch schema.
    ///
    /// Never fails: every problem, including a broken session, ends up in the
    /// returned verdict.
    pub async fn classify(
        &self,
        record: &StatementRecord,
        session: &mut dyn TargetSession,
        schema: &str,
    ) -> Verdict {
        if let Some(reason) = self.filter.check(record) {
            trace!("record {} filtered: {}", record.id, reason);
            return Verdict::Filtered(reason);
        }

        if let Err(e) = session.reset_schema(schema).await {
            debug!("record {}: resetting {} failed: {}", record.id, schema, e);
            return Verdict::Inconsistent(Divergence::SchemaReset {
                message: e.to_string(),
            });
        }

        let mut actual = String::new();
        for line in split_statements(&record.source) {
            match session.execute(line).await {
                Ok(results) => actual.push_str(&normalize_all(&results)),
                Err(e) if record.expected_outcome == ExpectedOutcome::Failure => {
                    trace!("record {}: expected failure on `{}`: {}", record.id, line, e);
                    return Verdict::Consistent(Agreement::ExpectedFailure {
                        line: line.to_string(),
                    });
                }
                Err(e) => {
                    return Verdict::Inconsistent(Divergence::UnexpectedError {
                        line: line.to_string(),
                        message: e.to_string(),
                    });
                }
            }
        }

        self.compare(&record.expected_output, actual)
    }

    fn compare(&self, expected: &str, actual: String) -> Verdict {
        if expected.is_empty() && self.empty_output == EmptyOutputPolicy::NoAssertion {
            return Verdict::Consistent(Agreement::NoAssertion);
        }

        if expected == actual {
            Verdict::Consistent(Agreement::OutputMatched)
        } else {
            Verdict::Inconsistent(Divergence::OutputMismatch {
                expected: expected.to_string(),
                actual,
            })
        }
    }
}
