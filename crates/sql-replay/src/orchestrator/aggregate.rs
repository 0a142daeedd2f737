//! Result aggregation: sums batch tallies in completion order.

use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tracing::{debug, error};

use crate::error::{ReplayError, Result};
use crate::replay::BatchTally;

/// Sum of every batch tally of a run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunTotals {
    pub total: u64,
    pub consistent: u64,
    pub inconsistent: u64,
    pub filtered: u64,
    pub skipped: u64,
}

impl RunTotals {
    fn add(&mut self, tally: &BatchTally) {
        self.total += tally.processed;
        self.consistent += tally.consistent;
        self.inconsistent += tally.inconsistent;
        self.filtered += tally.filtered;
        self.skipped += tally.skipped;
    }
}

/// Consume exactly `num_batches` tallies from `rx` and sum them.
///
/// The first tally carrying an error ends aggregation with that error;
/// partial sums are discarded.
pub async fn aggregate(rx: &mut mpsc::Receiver<BatchTally>, num_batches: usize) -> Result<RunTotals> {
    let mut totals = RunTotals::default();

    for received in 0..num_batches {
        let Some(mut tally) = rx.recv().await else {
            return Err(ReplayError::Aggregation(format!(
                "completion channel closed after {} of {} batches",
                received, num_batches
            )));
        };

        if let Some(e) = tally.error.take() {
            error!("Batch at offset {} failed: {}", tally.offset, e);
            return Err(e);
        }

        debug!(
            "Batch at offset {} collected ({}/{})",
            tally.offset,
            received + 1,
            num_batches
        );
        totals.add(&tally);
    }

    Ok(totals)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tally(offset: u64, consistent: u64, inconsistent: u64, filtered: u64) -> BatchTally {
        BatchTally {
            consistent,
            inconsistent,
            filtered,
            processed: consistent + inconsistent + filtered,
            ..BatchTally::new(offset)
        }
    }

    #[tokio::test]
    async fn test_sums_in_any_order() {
        let (tx, mut rx) = mpsc::channel(4);
        tx.send(tally(5000, 1, 2, 3)).await.unwrap();
        tx.send(tally(0, 4, 0, 1)).await.unwrap();

        let totals = aggregate(&mut rx, 2).await.unwrap();
        assert_eq!(
            totals,
            RunTotals {
                total: 11,
                consistent: 5,
                inconsistent: 2,
                filtered: 4,
                skipped: 0,
            }
        );
    }

    #[tokio::test]
    async fn test_fatal_tally_discards_partial_sums() {
        let (tx, mut rx) = mpsc::channel(4);
        tx.send(tally(0, 10, 0, 0)).await.unwrap();
        tx.send(BatchTally::failed(5000, ReplayError::batch_fetch(5000, "lost connection")))
            .await
            .unwrap();
        tx.send(tally(10000, 1, 0, 0)).await.unwrap();

        let err = aggregate(&mut rx, 3).await.unwrap_err();
        assert!(matches!(err, ReplayError::BatchFetch { offset: 5000, .. }));
    }

    #[tokio::test]
    async fn test_closed_channel() {
        let (tx, mut rx) = mpsc::channel(4);
        tx.send(tally(0, 1, 0, 0)).await.unwrap();
        drop(tx);

        let err = aggregate(&mut rx, 2).await.unwrap_err();
        assert!(err.to_string().contains("after 1 of 2 batches"));
    }

    #[tokio::test]
    async fn test_no_batches() {
        let (_tx, mut rx) = mpsc::channel::<BatchTally>(1);
        assert_eq!(aggregate(&mut rx, 0).await.unwrap(), RunTotals::default());
    }
}
