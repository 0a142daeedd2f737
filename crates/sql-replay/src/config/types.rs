//! Configuration type definitions with auto-tuning based on system resources.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use std::time::Duration;
use sysinfo::System;
use tracing::info;

/// System resource information for auto-tuning.
#[derive(Debug, Clone)]
pub struct SystemResources {
    /// Total RAM in GB.
    pub total_memory_gb: f64,
    /// Number of CPU cores.
    pub cpu_cores: usize,
}

impl SystemResources {
    /// Detect system resources.
    pub fn detect() -> Self {
        let mut sys = System::new_all();
        sys.refresh_all();

        let total_memory_gb = sys.total_memory() as f64 / (1024.0 * 1024.0 * 1024.0);
        let cpu_cores = sys.cpus().len();

        Self {
            total_memory_gb,
            cpu_cores,
        }
    }

    /// Log detected system resources.
    pub fn log(&self) {
        info!(
            "System resources: {:.1} GB RAM, {} CPU cores",
            self.total_memory_gb, self.cpu_cores
        );
    }
}

/// Root configuration structure.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// Corpus store (reference engine) configuration.
    #[serde(default)]
    pub source: SourceConfig,

    /// Engine under test configuration.
    #[serde(default)]
    pub target: TargetConfig,

    /// Replay behavior configuration.
    #[serde(default)]
    pub replay: ReplayConfig,
}

impl Config {
    /// Apply auto-tuned defaults based on system resources.
    /// Only fills in values that weren't explicitly set in the config file.
    pub fn with_auto_tuning(mut self) -> Self {
        let resources = SystemResources::detect();
        resources.log();
        self.replay = self.replay.with_auto_tuning(&resources);
        self
    }
}

/// Corpus store configuration (MySQL holding the captured statements).
#[derive(Clone, Serialize, Deserialize)]
pub struct SourceConfig {
    /// Database host.
    #[serde(default = "default_localhost")]
    pub host: String,

    /// Database port (default: 3306).
    #[serde(default = "default_mysql_port")]
    pub port: u16,

    /// Database name (default: "crawl").
    #[serde(default = "default_corpus_database")]
    pub database: String,

    /// Table holding the statement records (default: "stmts").
    #[serde(default = "default_corpus_table")]
    pub table: String,

    /// Username.
    #[serde(default = "default_root")]
    pub user: String,

    /// Password.
    #[serde(default)]
    pub password: String,

    /// SSL mode: disable, prefer, require (default: "prefer").
    #[serde(default = "default_prefer")]
    pub ssl_mode: String,
}

impl Default for SourceConfig {
    fn default() -> Self {
        Self {
            host: default_localhost(),
            port: default_mysql_port(),
            database: default_corpus_database(),
            table: default_corpus_table(),
            user: default_root(),
            password: String::new(),
            ssl_mode: default_prefer(),
        }
    }
}

impl fmt::Debug for SourceConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SourceConfig")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("database", &self.database)
            .field("table", &self.table)
            .field("user", &self.user)
            .field("password", &"[REDACTED]")
            .field("ssl_mode", &self.ssl_mode)
            .finish()
    }
}

/// Target (engine under test) configuration. No database is selected up
/// front: every batch creates and switches to its own schema.
#[derive(Clone, Serialize, Deserialize)]
pub struct TargetConfig {
    /// Database host.
    #[serde(default = "default_localhost")]
    pub host: String,

    /// Database port (default: 4000).
    #[serde(default = "default_target_port")]
    pub port: u16,

    /// Username.
    #[serde(default = "default_root")]
    pub user: String,

    /// Password.
    #[serde(default)]
    pub password: String,

    /// SSL mode: disable, prefer, require (default: "disable").
    #[serde(default = "default_disable")]
    pub ssl_mode: String,
}

impl Default for TargetConfig {
    fn default() -> Self {
        Self {
            host: default_localhost(),
            port: default_target_port(),
            user: default_root(),
            password: String::new(),
            ssl_mode: default_disable(),
        }
    }
}

impl fmt::Debug for TargetConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TargetConfig")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("user", &self.user)
            .field("password", &"[REDACTED]")
            .field("ssl_mode", &self.ssl_mode)
            .finish()
    }
}

/// How an empty expected output is interpreted when the statement did not fail.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EmptyOutputPolicy {
    /// Nothing was recorded, so any output is accepted.
    #[default]
    NoAssertion,

    /// The target must produce no output at all.
    ExpectEmpty,
}

/// Replay behavior configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReplayConfig {
    /// Statements per batch (default: 5000).
    #[serde(default = "default_batch_size")]
    pub batch_size: u64,

    /// Batches replayed concurrently. Auto-tuned based on CPU cores if not set.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub workers: Option<usize>,

    /// Prefix of the per-batch schema name (default: "playground").
    #[serde(default = "default_playground")]
    pub schema_prefix: String,

    /// Directory for per-batch log files. `None` disables them.
    #[serde(default = "default_log_dir")]
    pub log_dir: Option<PathBuf>,

    /// File name prefix of per-batch log files (default: "playground").
    #[serde(default = "default_playground")]
    pub log_prefix: String,

    /// Additional case-insensitive substrings that filter a statement.
    #[serde(default)]
    pub extra_filters: Vec<String>,

    /// Interpretation of an empty expected output (default: no_assertion).
    #[serde(default)]
    pub empty_output: EmptyOutputPolicy,

    /// Stop a batch after its first schema-reset failure (default: true).
    #[serde(default = "default_true")]
    pub abort_batch_on_reset_failure: bool,

    /// Connection attempts before giving up (default: 10).
    #[serde(default = "default_connect_retries")]
    pub connect_retries: u32,

    /// Delay between connection attempts in milliseconds (default: 500).
    #[serde(default = "default_connect_retry_delay_ms")]
    pub connect_retry_delay_ms: u64,
}

impl Default for ReplayConfig {
    fn default() -> Self {
        Self {
            batch_size: default_batch_size(),
            workers: None,
            schema_prefix: default_playground(),
            log_dir: default_log_dir(),
            log_prefix: default_playground(),
            extra_filters: Vec::new(),
            empty_output: EmptyOutputPolicy::default(),
            abort_batch_on_reset_failure: true,
            connect_retries: default_connect_retries(),
            connect_retry_delay_ms: default_connect_retry_delay_ms(),
        }
    }
}

impl ReplayConfig {
    /// Apply auto-tuned defaults based on system resources.
    /// Only fills in values that are None (not explicitly set).
    pub fn with_auto_tuning(mut self, resources: &SystemResources) -> Self {
        // Batches are bound by target round trips, not CPU: 2 per core, 4..=64
        if self.workers.is_none() {
            let workers = (resources.cpu_cores * 2).clamp(4, 64);
            self.workers = Some(workers);
        }

        info!(
            "Auto-tuned config: workers={}, batch_size={}",
            self.get_workers(),
            self.batch_size
        );

        self
    }

    pub fn get_workers(&self) -> usize {
        self.workers.unwrap_or(8)
    }

    pub fn connect_retry_delay(&self) -> Duration {
        Duration::from_millis(self.connect_retry_delay_ms)
    }
}

// Default value functions for serde
fn default_localhost() -> String {
    "localhost".to_string()
}

fn default_root() -> String {
    "root".to_string()
}

fn default_mysql_port() -> u16 {
    3306
}

fn default_target_port() -> u16 {
    4000
}

fn default_corpus_database() -> String {
    "crawl".to_string()
}

fn default_corpus_table() -> String {
    "stmts".to_string()
}

fn default_prefer() -> String {
    "prefer".to_string()
}

fn default_disable() -> String {
    "disable".to_string()
}

fn default_batch_size() -> u64 {
    5000
}

fn default_playground() -> String {
    "playground".to_string()
}

fn default_log_dir() -> Option<PathBuf> {
    Some(PathBuf::from("."))
}

fn default_true() -> bool {
    true
}

fn default_connect_retries() -> u32 {
    10
}

fn default_connect_retry_delay_ms() -> u64 {
    500
}
