//! # sql-replay
//!
//! Differential replay of captured SQL statements against a
//! MySQL-compatible engine under test.
//!
//! A corpus of statements, each with the output and outcome recorded on a
//! reference engine, is replayed against a target engine and every statement
//! is classified as consistent, inconsistent or filtered:
//!
//! - **Batch partitioning** of the corpus into contiguous, disjoint slices
//! - **Schema isolation** with one scratch schema and one session per batch
//! - **Bounded concurrency** with a configurable worker pool
//! - **Per-batch logs** with the source text of every inconsistent statement
//!
//! ## Example
//!
//! ```rust,no_run
//! use sql_replay::{Config, Orchestrator};
//!
//! #[tokio::main]
//! async fn main() -> sql_replay::Result<()> {
//!     let config = Config::load("config.yaml")?.with_auto_tuning();
//!     let orchestrator = Orchestrator::new(config).await?;
//!     let summary = orchestrator.run().await?;
//!     println!("{} of {} statements inconsistent", summary.inconsistent, summary.total);
//!     Ok(())
//! }
//! ```

pub mod config;
pub mod connect;
pub mod corpus;
pub mod error;
pub mod orchestrator;
pub mod replay;
pub mod target;

// Re-exports for convenient access
pub use config::{Config, EmptyOutputPolicy, ReplayConfig, SourceConfig, TargetConfig};
pub use corpus::{
    CorpusStore, DetachedCorpus, ExpectedOutcome, MemoryCorpus, MysqlCorpus, StatementRecord,
};
pub use error::{ReplayError, Result};
pub use orchestrator::{BatchSpec, HealthCheckResult, Orchestrator, RunPlan, RunSummary};
pub use replay::{BatchTally, Classification, Classifier, StatementFilter, Verdict};
pub use target::{DetachedTarget, MysqlTarget, ResultSet, SessionProvider, TargetSession};
