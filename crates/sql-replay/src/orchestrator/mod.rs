//! Replay orchestrator - main workflow coordinator.
//!
//! Counts the corpus, partitions it, dispatches one worker per batch through
//! a bounded pool and aggregates the batch tallies into a [`RunSummary`].

mod aggregate;
mod dispatch;
mod plan;

pub use aggregate::{aggregate, RunTotals};
pub use dispatch::{spawn_dispatcher, DispatchContext};
pub use plan::{plan_batches, BatchSpec, RunPlan};

use crate::config::Config;
use crate::corpus::{CorpusStore, DetachedCorpus, MysqlCorpus};
use crate::error::{ReplayError, Result, EXIT_SOURCE_ERROR, EXIT_TARGET_ERROR};
use crate::replay::{BatchLogFactory, Classifier, FileBatchLogFactory, NoOpBatchLogFactory};
use crate::target::{DetachedTarget, MysqlTarget, SessionProvider};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::{mpsc, watch};
use tracing::{error, info, warn};

/// Replay orchestrator.
pub struct Orchestrator {
    config: Config,
    corpus: Arc<dyn CorpusStore>,
    target: Arc<dyn SessionProvider>,
    logs: Arc<dyn BatchLogFactory>,
}

/// Result of a replay run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunSummary {
    /// Unique run identifier.
    pub run_id: String,

    /// Fingerprint of the effective configuration.
    pub config_hash: String,

    /// When the run started.
    pub started_at: DateTime<Utc>,

    /// When the run completed.
    pub completed_at: DateTime<Utc>,

    /// Total duration in seconds.
    pub duration_seconds: f64,

    /// Corpus size counted at the start of the run.
    pub corpus_size: u64,

    /// Number of batches replayed.
    pub batches: usize,

    /// Statements classified.
    pub total: u64,

    pub consistent: u64,

    pub inconsistent: u64,

    pub filtered: u64,

    /// Statements never replayed because their batch stopped early.
    pub skipped: u64,
}

impl RunSummary {
    /// True when every corpus record was either classified or skipped.
    pub fn is_complete(&self) -> bool {
        self.total + self.skipped == self.corpus_size
    }

    /// Convert to JSON string.
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}

/// Outcome of [`Orchestrator::health_check`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthCheckResult {
    pub source_connected: bool,
    pub source_latency_ms: u64,
    pub source_error: Option<String>,
    pub target_connected: bool,
    pub target_latency_ms: u64,
    pub target_error: Option<String>,
    /// Corpus size, when the source is reachable.
    pub corpus_size: Option<u64>,
    pub healthy: bool,
}

impl HealthCheckResult {
    /// Process exit code: 0 when healthy, otherwise the code of the first
    /// unreachable side.
    pub fn exit_code(&self) -> u8 {
        if !self.source_connected {
            EXIT_SOURCE_ERROR
        } else if !self.target_connected {
            EXIT_TARGET_ERROR
        } else {
            0
        }
    }
}

impl Orchestrator {
    /// Create a new orchestrator connected to both databases.
    pub async fn new(config: Config) -> Result<Self> {
        let corpus = MysqlCorpus::connect(&config.source, &config.replay).await?;
        let target = MysqlTarget::connect(&config.target, &config.replay).await?;
        let logs = log_factory(&config)?;

        Ok(Self::with_parts(
            config,
            Arc::new(corpus),
            Arc::new(target),
            logs,
        ))
    }

    /// Create an orchestrator connected to the corpus store only.
    ///
    /// Enough for [`Orchestrator::plan`]; any attempt to replay fails at
    /// session acquisition.
    pub async fn for_plan(config: Config) -> Result<Self> {
        let corpus = MysqlCorpus::connect(&config.source, &config.replay).await?;
        Ok(Self::with_corpus(config, Arc::new(corpus)))
    }

    /// Create an orchestrator over `corpus` with a detached target.
    pub fn with_corpus(config: Config, corpus: Arc<dyn CorpusStore>) -> Self {
        Self::with_parts(
            config,
            corpus,
            Arc::new(DetachedTarget::new("target not connected in plan mode")),
            Arc::new(NoOpBatchLogFactory),
        )
    }

    /// Create an orchestrator for [`Orchestrator::health_check`].
    ///
    /// Connection failures do not fail construction: an unreachable side is
    /// replaced by a detached stand-in that reports the failure.
    pub async fn for_health_check(config: Config) -> Self {
        let corpus: Arc<dyn CorpusStore> =
            match MysqlCorpus::connect(&config.source, &config.replay).await {
                Ok(corpus) => Arc::new(corpus),
                Err(e) => {
                    warn!("Corpus store unreachable: {}", e);
                    Arc::new(DetachedCorpus::new(e.to_string()))
                }
            };
        let target: Arc<dyn SessionProvider> =
            match MysqlTarget::connect(&config.target, &config.replay).await {
                Ok(target) => Arc::new(target),
                Err(e) => {
                    warn!("Target unreachable: {}", e);
                    Arc::new(DetachedTarget::new(e.to_string()))
                }
            };

        Self::with_parts(config, corpus, target, Arc::new(NoOpBatchLogFactory))
    }

    /// Create an orchestrator over already connected collaborators.
    pub fn with_parts(
        config: Config,
        corpus: Arc<dyn CorpusStore>,
        target: Arc<dyn SessionProvider>,
        logs: Arc<dyn BatchLogFactory>,
    ) -> Self {
        Self {
            config,
            corpus,
            target,
            logs,
        }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    async fn corpus_size(&self) -> Result<u64> {
        self.corpus
            .count()
            .await
            .map_err(|e| ReplayError::CorpusCount(e.to_string()))
    }

    /// Count the corpus and compute the batch plan without touching the target.
    pub async fn plan(&self) -> Result<RunPlan> {
        let corpus_size = self.corpus_size().await?;
        let replay = &self.config.replay;
        Ok(RunPlan {
            corpus_size,
            batch_size: replay.batch_size,
            workers: replay.get_workers(),
            schema_prefix: replay.schema_prefix.clone(),
            batches: plan_batches(corpus_size, replay.batch_size),
        })
    }

    /// Run the replay.
    ///
    /// Returns the summary of a complete run, or the first fatal error. No
    /// partial summary is ever returned.
    pub async fn run(&self) -> Result<RunSummary> {
        let started_at = Utc::now();
        let start = Instant::now();
        let run_id = uuid::Uuid::new_v4().to_string();
        let replay = &self.config.replay;

        info!("Starting replay run: {}", run_id);

        let corpus_size = self.corpus_size().await?;
        let batches = plan_batches(corpus_size, replay.batch_size);
        let num_batches = batches.len();
        let workers = replay.get_workers();

        info!(
            "Replaying {} statements in {} batches of {} ({} workers)",
            corpus_size, num_batches, replay.batch_size, workers
        );

        let ctx = Arc::new(DispatchContext {
            corpus: self.corpus.clone(),
            target: self.target.clone(),
            logs: self.logs.clone(),
            classifier: Arc::new(Classifier::from_config(replay)),
            schema_prefix: replay.schema_prefix.clone(),
            abort_on_reset_failure: replay.abort_batch_on_reset_failure,
        });

        let (tally_tx, mut tally_rx) = mpsc::channel(num_batches.max(1));
        let (abort_tx, abort_rx) = watch::channel(false);
        let dispatcher = spawn_dispatcher(ctx, batches, workers, tally_tx, abort_rx);

        let totals = aggregate(&mut tally_rx, num_batches).await;
        if totals.is_err() {
            let _ = abort_tx.send(true);
        }
        drop(tally_rx);

        if let Err(e) = dispatcher.await {
            error!("Dispatcher task failed: {}", e);
        }

        let totals = totals?;
        let completed_at = Utc::now();

        let summary = RunSummary {
            run_id,
            config_hash: self.config.hash(),
            started_at,
            completed_at,
            duration_seconds: start.elapsed().as_secs_f64(),
            corpus_size,
            batches: num_batches,
            total: totals.total,
            consistent: totals.consistent,
            inconsistent: totals.inconsistent,
            filtered: totals.filtered,
            skipped: totals.skipped,
        };

        info!(
            "Replay complete: total {}, success {}, fail {}, filtered {} in {:.1}s",
            summary.total,
            summary.consistent,
            summary.inconsistent,
            summary.filtered,
            summary.duration_seconds
        );
        if summary.skipped > 0 {
            warn!(
                "{} statements skipped after schema reset failures",
                summary.skipped
            );
        }
        if !summary.is_complete() {
            warn!(
                "Summary covers {} of {} corpus records",
                summary.total + summary.skipped,
                summary.corpus_size
            );
        }

        Ok(summary)
    }

    /// Test both connections and report latency.
    pub async fn health_check(&self) -> Result<HealthCheckResult> {
        let start = Instant::now();
        let source = self.corpus.test_connection().await;
        let source_latency_ms = start.elapsed().as_millis() as u64;

        let corpus_size = match source {
            Ok(()) => self.corpus.count().await.ok(),
            Err(_) => None,
        };

        let start = Instant::now();
        let target = self.target.test_connection().await;
        let target_latency_ms = start.elapsed().as_millis() as u64;

        let source_connected = source.is_ok();
        let target_connected = target.is_ok();

        Ok(HealthCheckResult {
            source_connected,
            source_latency_ms,
            source_error: source.err().map(|e| e.to_string()),
            target_connected,
            target_latency_ms,
            target_error: target.err().map(|e| e.to_string()),
            corpus_size,
            healthy: source_connected && target_connected,
        })
    }

    /// Close both connection pools.
    pub async fn close(&self) {
        self.corpus.close().await;
        self.target.close().await;
    }
}

/// Per-batch log sink for `config`: files under `log_dir`, or nothing.
fn log_factory(config: &Config) -> Result<Arc<dyn BatchLogFactory>> {
    Ok(match &config.replay.log_dir {
        Some(dir) => {
            std::fs::create_dir_all(dir)?;
            Arc::new(FileBatchLogFactory::new(dir, &config.replay.log_prefix))
        }
        None => Arc::new(NoOpBatchLogFactory),
    })
}
