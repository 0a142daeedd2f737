//! Target database: the engine under test.
//!
//! - [`SessionProvider`]: hands out one dedicated session per batch
//! - [`TargetSession`]: executes statements on that session
//!
//! A session is owned by exactly one batch for its whole lifetime, so
//! implementations only need to be `Send`, not `Sync`.

mod mysql;

pub use mysql::{MysqlSession, MysqlTarget};

use async_trait::async_trait;

use crate::error::{ReplayError, Result};

/// One tabular result produced by a statement.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ResultSet {
    /// Column names, in result order.
    pub columns: Vec<String>,
    /// Rows of nullable raw column values.
    pub rows: Vec<Vec<Option<Vec<u8>>>>,
}

impl ResultSet {
    /// Build a result set from text values. Convenient for tests and fakes.
    pub fn from_text(columns: &[&str], rows: &[Vec<Option<&str>>]) -> Self {
        Self {
            columns: columns.iter().map(|c| c.to_string()).collect(),
            rows: rows
                .iter()
                .map(|row| {
                    row.iter()
                        .map(|v| v.map(|s| s.as_bytes().to_vec()))
                        .collect()
                })
                .collect(),
        }
    }
}

/// Quote a MySQL identifier.
pub fn quote_ident(name: &str) -> String {
    format!("`{}`", name.replace('`', "``"))
}

/// A live session on the target database.
#[async_trait]
pub trait TargetSession: Send {
    /// Execute one statement and return every result set it produced.
    ///
    /// Statements without a tabular result yield empty result sets.
    async fn execute(&mut self, sql: &str) -> Result<Vec<ResultSet>>;

    /// Drop-if-exists, recreate and switch to `schema`.
    ///
    /// Template method: the three steps are plain statements, executed in
    /// order, stopping at the first failure.
    async fn reset_schema(&mut self, schema: &str) -> Result<()> {
        let quoted = quote_ident(schema);
        self.execute(&format!("DROP DATABASE IF EXISTS {}", quoted))
            .await?;
        self.execute(&format!("CREATE DATABASE {}", quoted)).await?;
        self.execute(&format!("USE {}", quoted)).await?;
        Ok(())
    }

    /// Close the session. Further `execute` calls fail.
    async fn close(&mut self) -> Result<()>;
}

/// Source of dedicated target sessions.
#[async_trait]
pub trait SessionProvider: Send + Sync {
    /// Acquire a session owned exclusively by the caller.
    async fn acquire(&self) -> Result<Box<dyn TargetSession>>;

    /// Test the connection.
    async fn test_connection(&self) -> Result<()>;

    /// Close all connections.
    async fn close(&self) {}
}

/// Provider for runs that must not reach the target, or cannot.
///
/// Every acquisition and connection test fails with `reason`.
#[derive(Debug, Clone)]
pub struct DetachedTarget {
    reason: String,
}

impl DetachedTarget {
    pub fn new(reason: impl Into<String>) -> Self {
        Self {
            reason: reason.into(),
        }
    }
}

#[async_trait]
impl SessionProvider for DetachedTarget {
    async fn acquire(&self) -> Result<Box<dyn TargetSession>> {
        Err(ReplayError::pool(&self.reason, "acquiring target session"))
    }

    async fn test_connection(&self) -> Result<()> {
        Err(ReplayError::pool(&self.reason, "testing target connection"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Recorder {
        executed: Vec<String>,
        fail_on: Option<&'static str>,
    }

    #[async_trait]
    impl TargetSession for Recorder {
        async fn execute(&mut self, sql: &str) -> Result<Vec<ResultSet>> {
            self.executed.push(sql.to_string());
            match self.fail_on {
                Some(prefix) if sql.starts_with(prefix) => {
                    Err(crate::error::ReplayError::Execution("denied".into()))
                }
                _ => Ok(vec![]),
            }
        }

        async fn close(&mut self) -> Result<()> {
            Ok(())
        }
    }

    #[tokio::test]
    async fn test_detached_target_refuses_sessions() {
        let target = DetachedTarget::new("not connected");
        let err = target.acquire().await.err().unwrap();
        assert_eq!(err.exit_code(), crate::error::EXIT_TARGET_ERROR);
        assert!(err.to_string().contains("not connected"));
        assert!(target.test_connection().await.is_err());
    }

    #[test]
    fn test_quote_ident() {
        assert_eq!(quote_ident("playground0"), "`playground0`");
        assert_eq!(quote_ident("a`b"), "`a``b`");
    }

    #[tokio::test]
    async fn test_reset_schema_order() {
        let mut session = Recorder {
            executed: vec![],
            fail_on: None,
        };
        session.reset_schema("playground5000").await.unwrap();
        assert_eq!(
            session.executed,
            vec![
                "DROP DATABASE IF EXISTS `playground5000`",
                "CREATE DATABASE `playground5000`",
                "USE `playground5000`",
            ]
        );
    }

    #[tokio::test]
    async fn test_reset_schema_stops_at_failure() {
        let mut session = Recorder {
            executed: vec![],
            fail_on: Some("CREATE"),
        };
        assert!(session.reset_schema("playground0").await.is_err());
        assert_eq!(session.executed.len(), 2);
    }

    #[test]
    fn test_result_set_from_text() {
        let rs = ResultSet::from_text(&["a", "b"], &[vec![Some("x"), None]]);
        assert_eq!(rs.columns, vec!["a", "b"]);
        assert_eq!(rs.rows[0][0].as_deref(), Some(&b"x"[..]));
        assert_eq!(rs.rows[0][1], None);
    }
}
