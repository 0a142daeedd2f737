//! MySQL corpus store.
//!
//! Uses SQLx for connection pooling and async query execution.

use std::time::Duration;

use async_trait::async_trait;
use sqlx::mysql::{MySqlConnectOptions, MySqlPool, MySqlPoolOptions, MySqlRow, MySqlSslMode};
use sqlx::Row;
use tracing::{debug, info, warn};

use super::{CorpusStore, StatementRecord};
use crate::config::{ReplayConfig, SourceConfig};
use crate::connect;
use crate::error::{ReplayError, Result};
use crate::target::quote_ident;

/// Connection pool timeout.
const POOL_CONNECTION_TIMEOUT: Duration = Duration::from_secs(30);

/// Corpus store backed by a MySQL table.
pub struct MysqlCorpus {
    pool: MySqlPool,
    table: String,
}

impl MysqlCorpus {
    /// Connect to the corpus store, retrying per the replay configuration.
    pub async fn connect(config: &SourceConfig, replay: &ReplayConfig) -> Result<Self> {
        let max_conns = replay.get_workers().clamp(1, 32) as u32;
        let what = format!("corpus store {}", config.address());

        let pool = connect::with_retry(
            &what,
            replay.connect_retries,
            replay.connect_retry_delay(),
            || Self::open_pool(config, max_conns),
        )
        .await?;

        info!(
            "Connected to corpus store: {}/{} (table {})",
            config.address(),
            config.database,
            config.table
        );

        Ok(Self {
            pool,
            table: config.table.clone(),
        })
    }

    async fn open_pool(config: &SourceConfig, max_conns: u32) -> Result<MySqlPool> {
        let options = MySqlConnectOptions::new()
            .host(&config.host)
            .port(config.port)
            .database(&config.database)
            .username(&config.user)
            .password(&config.password)
            .ssl_mode(ssl_mode(&config.ssl_mode));

        let pool = MySqlPoolOptions::new()
            .max_connections(max_conns)
            .acquire_timeout(POOL_CONNECTION_TIMEOUT)
            .connect_with(options)
            .await
            .map_err(|e| ReplayError::source_pool(e, "creating corpus store pool"))?;

        sqlx::query("SELECT 1")
            .fetch_one(&pool)
            .await
            .map_err(|e| ReplayError::source_pool(e, "testing corpus store connection"))?;

        Ok(pool)
    }

    fn row_to_record(row: &MySqlRow) -> Result<StatementRecord> {
        let id: i64 = row.try_get("id")?;
        let uid: Option<String> = row.try_get("uid")?;
        let result: Option<String> = row.try_get("result")?;
        let source: Option<String> = row.try_get("source")?;
        let stdout: Option<String> = row.try_get("stdout")?;

        Ok(StatementRecord::new(
            id,
            uid.unwrap_or_default(),
            result.as_deref().unwrap_or_default(),
            source.unwrap_or_default(),
            stdout.unwrap_or_default(),
        ))
    }
}

fn ssl_mode(mode: &str) -> MySqlSslMode {
    match mode.to_lowercase().as_str() {
        "disable" | "disabled" => MySqlSslMode::Disabled,
        "prefer" | "preferred" => MySqlSslMode::Preferred,
        "require" | "required" => MySqlSslMode::Required,
        "verify-ca" | "verify_ca" => MySqlSslMode::VerifyCa,
        "verify-full" | "verify_identity" => MySqlSslMode::VerifyIdentity,
        other => {
            warn!("Unknown ssl_mode '{}', defaulting to Preferred", other);
            MySqlSslMode::Preferred
        }
    }
}

#[async_trait]
impl CorpusStore for MysqlCorpus {
    async fn count(&self) -> Result<u64> {
        let query = format!("SELECT COUNT(*) AS cnt FROM {}", quote_ident(&self.table));
        let row = sqlx::query(&query).fetch_one(&self.pool).await?;
        let count: i64 = row.try_get("cnt")?;
        Ok(count.max(0) as u64)
    }

    async fn fetch(&self, offset: u64, limit: u64) -> Result<Vec<StatementRecord>> {
        // CAST to CHAR so BLOB/TEXT columns decode as strings regardless of collation
        let query = format!(
            r#"
            SELECT
                CAST(id AS SIGNED) AS id,
                CAST(uid AS CHAR) AS uid,
                CAST(result AS CHAR) AS result,
                CAST(source AS CHAR) AS source,
                CAST(stdout AS CHAR) AS stdout
            FROM {}
            ORDER BY id
            LIMIT ? OFFSET ?
            "#,
            quote_ident(&self.table)
        );

        let rows: Vec<MySqlRow> = sqlx::query(&query)
            .bind(limit)
            .bind(offset)
            .fetch_all(&self.pool)
            .await?;

        debug!("Fetched {} corpus rows at offset {}", rows.len(), offset);

        rows.iter().map(Self::row_to_record).collect()
    }

    async fn test_connection(&self) -> Result<()> {
        sqlx::query("SELECT 1")
            .fetch_one(&self.pool)
            .await
            .map_err(|e| ReplayError::source_pool(e, "testing corpus store connection"))?;
        Ok(())
    }

    async fn close(&self) {
        self.pool.close().await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ssl_mode_mapping() {
        assert!(matches!(ssl_mode("disable"), MySqlSslMode::Disabled));
        assert!(matches!(ssl_mode("REQUIRE"), MySqlSslMode::Required));
        assert!(matches!(ssl_mode("bogus"), MySqlSslMode::Preferred));
    }
}
