//! Sequential replay of one batch on its own session and schema.

use tracing::{debug, warn};

use super::classify::{Classification, Classifier, Verdict};
use super::log::BatchLog;
use crate::corpus::StatementRecord;
use crate::error::ReplayError;
use crate::target::TargetSession;

/// Counters of one batch. Write-once from the caller's point of view.
#[derive(Debug)]
pub struct BatchTally {
    /// Offset of the batch in the corpus.
    pub offset: u64,
    pub consistent: u64,
    pub inconsistent: u64,
    pub filtered: u64,
    /// Records that received a classification.
    pub processed: u64,
    /// Records never replayed because the batch stopped early.
    pub skipped: u64,
    /// Fatal error of the batch, if any.
    pub error: Option<ReplayError>,
}

impl BatchTally {
    pub fn new(offset: u64) -> Self {
        Self {
            offset,
            consistent: 0,
            inconsistent: 0,
            filtered: 0,
            processed: 0,
            skipped: 0,
            error: None,
        }
    }

    /// Tally of a batch that failed before replaying anything.
    pub fn failed(offset: u64, error: ReplayError) -> Self {
        Self {
            error: Some(error),
            ..Self::new(offset)
        }
    }

    pub fn record(&mut self, classification: Classification) {
        match classification {
            Classification::Consistent => self.consistent += 1,
            Classification::Inconsistent => self.inconsistent += 1,
            Classification::Filtered => self.filtered += 1,
        }
        self.processed += 1;
    }

    pub fn is_fatal(&self) -> bool {
        self.error.is_some()
    }
}

/// Replays the records of one batch in row order.
#[derive(Debug, Clone, Copy)]
pub struct BatchReplayer<'a> {
    classifier: &'a Classifier,
    abort_on_reset_failure: bool,
}

impl<'a> BatchReplayer<'a> {
    pub fn new(classifier: &'a Classifier, abort_on_reset_failure: bool) -> Self {
        Self {
            classifier,
            abort_on_reset_failure,
        }
    }

    /// Classify every record on `session` and return the batch tally.
    ///
    /// Statement problems never stop the batch. Only a failed schema reset
    /// does, when configured to, and the remaining records are then counted
    /// as skipped.
    pub async fn replay(
        &self,
        offset: u64,
        records: &[StatementRecord],
        session: &mut dyn TargetSession,
        schema: &str,
        log: &mut dyn BatchLog,
    ) -> BatchTally {
        let mut tally = BatchTally::new(offset);

        for (index, record) in records.iter().enumerate() {
            let row_num = offset + index as u64;
            log.line(&format!("starting execute {} sql", row_num));

            let verdict = self.classifier.classify(record, session, schema).await;
            match &verdict {
                Verdict::Filtered(reason) => {
                    log.line(&format!("{} sql filtered", row_num));
                    debug!("{} sql filtered: {}", row_num, reason);
                }
                Verdict::Consistent(_) => {
                    log.line(&format!("{} sql compare end, success", row_num));
                }
                Verdict::Inconsistent(divergence) => {
                    log.line("result not consistent sqls:");
                    log.line(&record.source);
                    log.line(&format!("reason: {}", divergence));
                    log.line(&format!("{} sql compare end, fail", row_num));
                }
            }
            tally.record(verdict.classification());

            if verdict.is_reset_failure() && self.abort_on_reset_failure {
                tally.skipped = (records.len() - index - 1) as u64;
                warn!(
                    "Batch at offset {}: schema {} unusable, skipping {} remaining statements",
                    offset, schema, tally.skipped
                );
                log.line(&format!(
                    "schema {} unusable, {} statements skipped",
                    schema, tally.skipped
                ));
                break;
            }
        }

        log.line(&format!("playground test offset {} ok", offset));
        log.line("Summary:");
        log.line(&format!("\tsuccess count: {}", tally.consistent));
        log.line(&format!("\tfail count: {}", tally.inconsistent));
        log.line(&format!("\tfiltered count: {}", tally.filtered));
        if tally.skipped > 0 {
            log.line(&format!("\tskipped count: {}", tally.skipped));
        }
        log.finish();

        tally
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Result;
    use crate::replay::log::{BatchLogFactory, MemoryBatchLogFactory};
    use crate::target::ResultSet;
    use async_trait::async_trait;

    /// Answers `select 1;` with one row and rejects anything containing "missing".
    #[derive(Default)]
    struct FakeSession {
        resets: u32,
        fail_reset_at: Option<u32>,
    }

    #[async_trait]
    impl TargetSession for FakeSession {
        async fn execute(&mut self, sql: &str) -> Result<Vec<ResultSet>> {
            if sql.starts_with("DROP DATABASE") {
                self.resets += 1;
                if self.fail_reset_at == Some(self.resets) {
                    return Err(ReplayError::Execution("connection reset".into()));
                }
                return Ok(vec![]);
            }
            if sql.contains("missing") {
                return Err(ReplayError::Execution("no such table".into()));
            }
            if sql == "select 1;" {
                return Ok(vec![ResultSet::from_text(&["1"], &[vec![Some("1")]])]);
            }
            Ok(vec![])
        }

        async fn close(&mut self) -> Result<()> {
            Ok(())
        }
    }

    fn records() -> Vec<StatementRecord> {
        vec![
            StatementRecord::new(1, "a", "success", "select 1;", "1\n"),
            StatementRecord::new(2, "b", "success", "select 1;", "2\n"),
            StatementRecord::new(3, "c", "success", "show databases;", "x\n"),
            StatementRecord::new(4, "d", "failure", "select * from missing;", ""),
        ]
    }

    #[tokio::test]
    async fn test_tally_and_log_lines() {
        let classifier = Classifier::default();
        let replayer = BatchReplayer::new(&classifier, true);
        let logs = MemoryBatchLogFactory::new();
        let mut log = logs.open(5000).unwrap();
        let mut session = FakeSession::default();

        let tally = replayer
            .replay(5000, &records(), &mut session, "playground5000", log.as_mut())
            .await;

        assert_eq!(tally.consistent, 2);
        assert_eq!(tally.inconsistent, 1);
        assert_eq!(tally.filtered, 1);
        assert_eq!(tally.processed, 4);
        assert_eq!(tally.skipped, 0);
        assert!(!tally.is_fatal());

        let lines = logs.lines(5000);
        assert_eq!(lines[0], "starting execute 5000 sql");
        assert_eq!(lines[1], "5000 sql compare end, success");
        assert!(lines.contains(&"result not consistent sqls:".to_string()));
        assert!(lines.contains(&"5001 sql compare end, fail".to_string()));
        assert!(lines.contains(&"5002 sql filtered".to_string()));
        assert!(lines.contains(&"5003 sql compare end, success".to_string()));
        assert!(lines.contains(&"playground test offset 5000 ok".to_string()));
        assert!(lines.contains(&"\tfail count: 1".to_string()));
    }

    #[tokio::test]
    async fn test_inconsistent_dumps_source() {
        let classifier = Classifier::default();
        let replayer = BatchReplayer::new(&classifier, true);
        let logs = MemoryBatchLogFactory::new();
        let mut log = logs.open(0).unwrap();
        let mut session = FakeSession::default();
        let batch = vec![StatementRecord::new(
            1,
            "a",
            "success",
            "create table t(a int);\nselect * from missing;",
            "",
        )];

        replayer
            .replay(0, &batch, &mut session, "playground0", log.as_mut())
            .await;

        let lines = logs.lines(0);
        let at = lines
            .iter()
            .position(|l| l == "result not consistent sqls:")
            .unwrap();
        assert_eq!(lines[at + 1], "create table t(a int);\nselect * from missing;");
    }

    #[tokio::test]
    async fn test_reset_failure_skips_rest() {
        let classifier = Classifier::default();
        let replayer = BatchReplayer::new(&classifier, true);
        let logs = MemoryBatchLogFactory::new();
        let mut log = logs.open(0).unwrap();
        let mut session = FakeSession {
            fail_reset_at: Some(1),
            ..Default::default()
        };

        let tally = replayer
            .replay(0, &records(), &mut session, "playground0", log.as_mut())
            .await;

        assert_eq!(tally.inconsistent, 1);
        assert_eq!(tally.processed, 1);
        assert_eq!(tally.skipped, 3);
        assert_eq!(session.resets, 1);
    }

    #[tokio::test]
    async fn test_reset_failure_continues_when_configured() {
        let classifier = Classifier::default();
        let replayer = BatchReplayer::new(&classifier, false);
        let logs = MemoryBatchLogFactory::new();
        let mut log = logs.open(0).unwrap();
        let mut session = FakeSession {
            fail_reset_at: Some(1),
            ..Default::default()
        };

        let tally = replayer
            .replay(0, &records(), &mut session, "playground0", log.as_mut())
            .await;

        assert_eq!(tally.processed, 4);
        assert_eq!(tally.skipped, 0);
        assert_eq!(
            tally.consistent + tally.inconsistent + tally.filtered,
            tally.processed
        );
    }

    #[test]
    fn test_failed_tally() {
        let tally = BatchTally::failed(10, ReplayError::batch_fetch(10, "gone"));
        assert!(tally.is_fatal());
        assert_eq!(tally.processed, 0);
    }
}
