//! Corpus store: the captured statements and their expected behavior.
//!
//! The corpus is a relation `(id, uid, result, source, stdout)` held by the
//! reference engine. The engine only needs two operations from it: the row
//! count, and bounded range reads in a stable row order.

mod mysql;

pub use mysql::MysqlCorpus;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::{ReplayError, Result};

/// Outcome the reference engine produced for a record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ExpectedOutcome {
    Success,
    Failure,
    Timeout,
    /// Anything else, including an empty value.
    Unknown(String),
}

impl ExpectedOutcome {
    /// Parse the corpus `result` column. Matching is exact, as captured.
    pub fn parse(raw: &str) -> Self {
        match raw {
            "success" => ExpectedOutcome::Success,
            "failure" => ExpectedOutcome::Failure,
            "timeout" => ExpectedOutcome::Timeout,
            other => ExpectedOutcome::Unknown(other.to_string()),
        }
    }
}

impl fmt::Display for ExpectedOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ExpectedOutcome::Success => f.write_str("success"),
            ExpectedOutcome::Failure => f.write_str("failure"),
            ExpectedOutcome::Timeout => f.write_str("timeout"),
            ExpectedOutcome::Unknown(raw) => f.write_str(raw),
        }
    }
}

/// One captured statement record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatementRecord {
    /// Corpus row id.
    pub id: i64,
    /// Capture identifier.
    pub uid: String,
    /// Raw SQL text, possibly several statements on separate lines.
    pub source: String,
    /// Canonical text of the expected output, possibly empty.
    pub expected_output: String,
    /// Outcome class recorded on the reference engine.
    pub expected_outcome: ExpectedOutcome,
}

impl StatementRecord {
    /// Build a record from the raw corpus columns.
    pub fn new(id: i64, uid: impl Into<String>, result: &str, source: impl Into<String>, stdout: impl Into<String>) -> Self {
        Self {
            id,
            uid: uid.into(),
            source: source.into(),
            expected_output: stdout.into(),
            expected_outcome: ExpectedOutcome::parse(result),
        }
    }
}

/// Read access to the statement corpus.
///
/// Shared read-only by every batch, so implementations must be `Send + Sync`.
#[async_trait]
pub trait CorpusStore: Send + Sync {
    /// Number of records in the corpus.
    async fn count(&self) -> Result<u64>;

    /// Records `[offset, offset + limit)` in stable row order.
    async fn fetch(&self, offset: u64, limit: u64) -> Result<Vec<StatementRecord>>;

    /// Test the connection.
    async fn test_connection(&self) -> Result<()>;

    /// Close the connection pool.
    async fn close(&self) {}
}

/// Corpus held in memory. Used by dry runs and tests.
#[derive(Debug, Clone, Default)]
pub struct MemoryCorpus {
    records: Vec<StatementRecord>,
}

impl MemoryCorpus {
    pub fn new(records: Vec<StatementRecord>) -> Self {
        Self { records }
    }
}

#[async_trait]
impl CorpusStore for MemoryCorpus {
    async fn count(&self) -> Result<u64> {
        Ok(self.records.len() as u64)
    }

    async fn fetch(&self, offset: u64, limit: u64) -> Result<Vec<StatementRecord>> {
        let len = self.records.len();
        let start = (offset as usize).min(len);
        let end = start.saturating_add(limit as usize).min(len);
        Ok(self.records[start..end].to_vec())
    }

    async fn test_connection(&self) -> Result<()> {
        Ok(())
    }
}

/// Stand-in for a corpus store that could not be reached.
///
/// Every operation fails with `reason`.
#[derive(Debug, Clone)]
pub struct DetachedCorpus {
    reason: String,
}

impl DetachedCorpus {
    pub fn new(reason: impl Into<String>) -> Self {
        Self {
            reason: reason.into(),
        }
    }
}

#[async_trait]
impl CorpusStore for DetachedCorpus {
    async fn count(&self) -> Result<u64> {
        Err(ReplayError::source_pool(&self.reason, "counting corpus"))
    }

    async fn fetch(&self, _offset: u64, _limit: u64) -> Result<Vec<StatementRecord>> {
        Err(ReplayError::source_pool(&self.reason, "fetching corpus rows"))
    }

    async fn test_connection(&self) -> Result<()> {
        Err(ReplayError::source_pool(
            &self.reason,
            "testing corpus store connection",
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_outcome() {
        assert_eq!(ExpectedOutcome::parse("success"), ExpectedOutcome::Success);
        assert_eq!(ExpectedOutcome::parse("failure"), ExpectedOutcome::Failure);
        assert_eq!(ExpectedOutcome::parse("timeout"), ExpectedOutcome::Timeout);
        assert_eq!(ExpectedOutcome::parse(""), ExpectedOutcome::Unknown(String::new()));
        // Captured values are compared exactly
        assert_eq!(
            ExpectedOutcome::parse("Failure"),
            ExpectedOutcome::Unknown("Failure".into())
        );
        assert_eq!(ExpectedOutcome::parse("weird").to_string(), "weird");
    }

    #[tokio::test]
    async fn test_detached_corpus_fails_as_source() {
        let corpus = DetachedCorpus::new("Connection refused");
        let err = corpus.count().await.err().unwrap();
        assert_eq!(err.exit_code(), crate::error::EXIT_SOURCE_ERROR);
        assert!(corpus.fetch(0, 10).await.is_err());
        assert!(corpus.test_connection().await.is_err());
    }

    #[tokio::test]
    async fn test_memory_corpus_ranges() {
        let records: Vec<_> = (0..7)
            .map(|i| StatementRecord::new(i, format!("u{}", i), "success", "select 1;", "1\n"))
            .collect();
        let corpus = MemoryCorpus::new(records);

        assert_eq!(corpus.count().await.unwrap(), 7);
        let first = corpus.fetch(0, 5).await.unwrap();
        assert_eq!(first.len(), 5);
        assert_eq!(first[0].id, 0);
        let rest = corpus.fetch(5, 5).await.unwrap();
        assert_eq!(rest.iter().map(|r| r.id).collect::<Vec<_>>(), vec![5, 6]);
        assert!(corpus.fetch(10, 5).await.unwrap().is_empty());
    }
}
