//! Batch dispatch: one worker per batch, at most `workers` at a time.
//!
//! Each worker owns one target session and one schema for the whole batch,
//! and reports exactly one [`BatchTally`] on the completion channel, fatal
//! errors included.

use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use futures::FutureExt;
use tokio::sync::{mpsc, watch, Semaphore};
use tokio::task::{JoinHandle, JoinSet};
use tracing::{debug, info, warn};

use super::plan::BatchSpec;
use crate::corpus::CorpusStore;
use crate::error::ReplayError;
use crate::replay::{BatchLogFactory, BatchReplayer, BatchTally, Classifier};
use crate::target::SessionProvider;

/// Everything a batch worker needs, shared by all workers.
pub struct DispatchContext {
    pub corpus: Arc<dyn CorpusStore>,
    pub target: Arc<dyn SessionProvider>,
    pub logs: Arc<dyn BatchLogFactory>,
    pub classifier: Arc<Classifier>,
    pub schema_prefix: String,
    pub abort_on_reset_failure: bool,
}

/// Launch every batch of `batches` in the background.
///
/// Stops launching and aborts in-flight workers once `abort` turns true.
/// The returned handle completes when every launched worker has finished.
pub fn spawn_dispatcher(
    ctx: Arc<DispatchContext>,
    batches: Vec<BatchSpec>,
    workers: usize,
    tally_tx: mpsc::Sender<BatchTally>,
    mut abort: watch::Receiver<bool>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let semaphore = Arc::new(Semaphore::new(workers.max(1)));
        let mut running = JoinSet::new();
        let total = batches.len();
        let mut launched = 0usize;

        for batch in batches {
            if *abort.borrow() {
                break;
            }

            let permit = tokio::select! {
                permit = semaphore.clone().acquire_owned() => match permit {
                    Ok(permit) => permit,
                    Err(_) => break,
                },
                Ok(()) = abort.changed() => break,
            };
            if *abort.borrow() {
                break;
            }

            let ctx = ctx.clone();
            let tx = tally_tx.clone();
            running.spawn(async move {
                let tally = match AssertUnwindSafe(replay_batch(&ctx, batch))
                    .catch_unwind()
                    .await
                {
                    Ok(tally) => tally,
                    Err(_) => BatchTally::failed(
                        batch.offset,
                        ReplayError::Aggregation(format!(
                            "batch at offset {} panicked",
                            batch.offset
                        )),
                    ),
                };
                drop(permit);
                if tx.send(tally).await.is_err() {
                    debug!("Batch at offset {}: completion channel closed", batch.offset);
                }
            });
            launched += 1;
        }
        drop(tally_tx);

        if launched < total {
            info!("Dispatch stopped after {} of {} batches", launched, total);
        }

        let mut aborted = *abort.borrow();
        if aborted {
            running.abort_all();
        }

        loop {
            tokio::select! {
                joined = running.join_next() => match joined {
                    None => break,
                    Some(Ok(())) => {}
                    Some(Err(e)) if e.is_cancelled() => {}
                    Some(Err(e)) => warn!("Batch worker failed: {}", e),
                },
                Ok(()) = abort.changed(), if !aborted => {
                    aborted = true;
                    running.abort_all();
                }
            }
        }
    })
}

/// Run one batch from session acquisition to tally.
async fn replay_batch(ctx: &DispatchContext, batch: BatchSpec) -> BatchTally {
    let offset = batch.offset;

    let mut session = match ctx.target.acquire().await {
        Ok(session) => session,
        Err(e) => return BatchTally::failed(offset, ReplayError::session_acquire(offset, e)),
    };

    let records = match ctx.corpus.fetch(offset, batch.size).await {
        Ok(records) => records,
        Err(e) => {
            close_session(session.as_mut(), offset).await;
            return BatchTally::failed(offset, ReplayError::batch_fetch(offset, e));
        }
    };

    let mut log = match ctx.logs.open(offset) {
        Ok(log) => log,
        Err(source) => {
            close_session(session.as_mut(), offset).await;
            return BatchTally::failed(offset, ReplayError::BatchLog { offset, source });
        }
    };

    let schema = batch.schema_name(&ctx.schema_prefix);
    debug!(
        "Batch {} at offset {}: {} records on schema {}",
        batch.index,
        offset,
        records.len(),
        schema
    );

    let replayer = BatchReplayer::new(&ctx.classifier, ctx.abort_on_reset_failure);
    let tally = replayer
        .replay(offset, &records, session.as_mut(), &schema, log.as_mut())
        .await;

    close_session(session.as_mut(), offset).await;

    info!(
        "Batch at offset {} done: {} consistent, {} inconsistent, {} filtered",
        offset, tally.consistent, tally.inconsistent, tally.filtered
    );
    tally
}

async fn close_session(session: &mut dyn crate::target::TargetSession, offset: u64) {
    if let Err(e) = session.close().await {
        warn!("Batch at offset {}: closing session failed: {}", offset, e);
    }
}
