//! MySQL-protocol target (MySQL, TiDB, MariaDB, ...).
//!
//! Uses mysql_async for connection pooling. Statements go through the text
//! protocol, so every non-NULL value arrives as raw bytes, which is exactly
//! what the row normalizer compares.

use async_trait::async_trait;
use mysql_async::prelude::*;
use mysql_async::{Conn, Opts, OptsBuilder, Pool, PoolConstraints, PoolOpts, SslOpts, Value};
use tracing::{debug, info, warn};

use super::{ResultSet, SessionProvider, TargetSession};
use crate::config::{ReplayConfig, TargetConfig};
use crate::connect;
use crate::error::{ReplayError, Result};

/// Pool of sessions on the target engine.
pub struct MysqlTarget {
    pool: Pool,
}

impl MysqlTarget {
    /// Connect to the target, retrying per the replay configuration.
    ///
    /// The pool is sized to the number of concurrently replayed batches.
    pub async fn connect(config: &TargetConfig, replay: &ReplayConfig) -> Result<Self> {
        let what = format!("target {}", config.address());
        let max_conns = replay.get_workers().max(1);

        let pool = connect::with_retry(
            &what,
            replay.connect_retries,
            replay.connect_retry_delay(),
            || Self::open_pool(config, max_conns),
        )
        .await?;

        info!("Connected to target: {}", config.address());

        Ok(Self { pool })
    }

    async fn open_pool(config: &TargetConfig, max_conns: usize) -> Result<Pool> {
        let ssl_opts = match config.ssl_mode.to_lowercase().as_str() {
            "disable" => None,
            "prefer" | "require" => Some(SslOpts::default().with_danger_accept_invalid_certs(true)),
            "verify-ca" | "verify_ca" | "verify-full" | "verify_identity" => Some(SslOpts::default()),
            _ => {
                warn!(
                    "Unknown ssl_mode '{}', defaulting to Preferred",
                    config.ssl_mode
                );
                Some(SslOpts::default().with_danger_accept_invalid_certs(true))
            }
        };

        let mut builder = OptsBuilder::default()
            .ip_or_hostname(&config.host)
            .tcp_port(config.port)
            .user(Some(&config.user))
            .pass(Some(&config.password))
            // Use utf8mb4 for full Unicode support
            .init(vec!["SET NAMES utf8mb4"]);

        if let Some(ssl) = ssl_opts {
            builder = builder.ssl_opts(ssl);
        }

        let constraints = PoolConstraints::new(0, max_conns)
            .ok_or_else(|| ReplayError::pool("invalid pool size", "creating target pool"))?;
        let pool_opts = PoolOpts::new().with_constraints(constraints);

        let opts: Opts = builder.pool_opts(pool_opts).into();
        let pool = Pool::new(opts);

        // Test connection
        let mut conn = pool
            .get_conn()
            .await
            .map_err(|e| ReplayError::pool(e, "creating target pool"))?;

        conn.query_drop("SELECT 1")
            .await
            .map_err(|e| ReplayError::pool(e, "testing target connection"))?;

        drop(conn);

        Ok(pool)
    }
}

#[async_trait]
impl SessionProvider for MysqlTarget {
    async fn acquire(&self) -> Result<Box<dyn TargetSession>> {
        let conn = self
            .pool
            .get_conn()
            .await
            .map_err(|e| ReplayError::pool(e, "acquiring target session"))?;
        debug!("Acquired target session {}", conn.id());
        Ok(Box::new(MysqlSession { conn: Some(conn) }))
    }

    async fn test_connection(&self) -> Result<()> {
        let mut conn = self
            .pool
            .get_conn()
            .await
            .map_err(|e| ReplayError::pool(e, "testing target connection"))?;
        conn.query_drop("SELECT 1")
            .await
            .map_err(|e| ReplayError::pool(e, "testing target connection"))?;
        Ok(())
    }

    async fn close(&self) {
        if let Err(e) = self.pool.clone().disconnect().await {
            warn!("Failed to disconnect target pool: {}", e);
        }
    }
}

/// One dedicated connection to the target.
pub struct MysqlSession {
    conn: Option<Conn>,
}

#[async_trait]
impl TargetSession for MysqlSession {
    async fn execute(&mut self, sql: &str) -> Result<Vec<ResultSet>> {
        let conn = self
            .conn
            .as_mut()
            .ok_or_else(|| ReplayError::Execution("session is closed".into()))?;

        let mut result = conn.query_iter(sql).await?;
        let mut sets = Vec::new();

        while !result.is_empty() {
            let columns = result
                .columns_ref()
                .iter()
                .map(|c| c.name_str().into_owned())
                .collect();
            let rows: Vec<mysql_async::Row> = result.collect().await?;
            sets.push(ResultSet {
                columns,
                rows: rows.into_iter().map(row_values).collect(),
            });
        }

        Ok(sets)
    }

    async fn close(&mut self) -> Result<()> {
        if let Some(conn) = self.conn.take() {
            conn.disconnect().await?;
        }
        Ok(())
    }
}

fn row_values(row: mysql_async::Row) -> Vec<Option<Vec<u8>>> {
    row.unwrap().into_iter().map(value_bytes).collect()
}

/// Text protocol values are NULL or raw bytes; anything else is rendered
/// through its SQL literal form.
fn value_bytes(value: Value) -> Option<Vec<u8>> {
    match value {
        Value::NULL => None,
        Value::Bytes(bytes) => Some(bytes),
        other => Some(other.as_sql(true).into_bytes()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_value_bytes() {
        assert_eq!(value_bytes(Value::NULL), None);
        assert_eq!(value_bytes(Value::Bytes(b"abc".to_vec())), Some(b"abc".to_vec()));
        assert_eq!(value_bytes(Value::Int(42)), Some(b"42".to_vec()));
    }
}
