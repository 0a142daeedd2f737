//! Partitioning of the corpus into batches.

use serde::{Deserialize, Serialize};

/// One contiguous slice `[offset, offset + size)` of the corpus.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatchSpec {
    /// Position of the batch in the plan.
    pub index: usize,
    pub offset: u64,
    pub size: u64,
}

impl BatchSpec {
    /// Isolated schema of this batch. Distinct offsets give distinct names.
    pub fn schema_name(&self, prefix: &str) -> String {
        format!("{}{}", prefix, self.offset)
    }

    /// First offset past this batch.
    pub fn end(&self) -> u64 {
        self.offset + self.size
    }
}

/// Split `corpus_size` records into `ceil(corpus_size / batch_size)` batches.
///
/// Every batch but the last holds exactly `batch_size` records. A zero
/// `batch_size` is treated as one.
pub fn plan_batches(corpus_size: u64, batch_size: u64) -> Vec<BatchSpec> {
    let batch_size = batch_size.max(1);
    let count = corpus_size.div_ceil(batch_size);
    (0..count)
        .map(|i| {
            let offset = i * batch_size;
            BatchSpec {
                index: i as usize,
                offset,
                size: batch_size.min(corpus_size - offset),
            }
        })
        .collect()
}

/// Dry-run result: what a run would do, without touching the target.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunPlan {
    pub corpus_size: u64,
    pub batch_size: u64,
    pub workers: usize,
    pub schema_prefix: String,
    pub batches: Vec<BatchSpec>,
}

impl RunPlan {
    pub fn schemas(&self) -> impl Iterator<Item = String> + '_ {
        self.batches
            .iter()
            .map(|b| b.schema_name(&self.schema_prefix))
    }

    /// Convert to JSON string.
    pub fn to_json(&self) -> crate::error::Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn test_exact_cover() {
        for (size, batch) in [(0, 5000), (1, 5000), (5000, 5000), (5001, 5000), (12345, 1000), (7, 1)] {
            let plan = plan_batches(size, batch);
            assert_eq!(plan.len() as u64, (size + batch - 1) / batch);

            let mut next = 0;
            for (i, spec) in plan.iter().enumerate() {
                assert_eq!(spec.index, i);
                assert_eq!(spec.offset, next);
                assert!(spec.size >= 1 && spec.size <= batch);
                next = spec.end();
            }
            assert_eq!(next, size);
        }
    }

    #[test]
    fn test_last_batch_shorter() {
        let plan = plan_batches(10001, 5000);
        assert_eq!(
            plan.iter().map(|b| (b.offset, b.size)).collect::<Vec<_>>(),
            vec![(0, 5000), (5000, 5000), (10000, 1)]
        );
    }

    #[test]
    fn test_schema_names_distinct() {
        let plan = plan_batches(20000, 5000);
        let names: HashSet<_> = plan.iter().map(|b| b.schema_name("playground")).collect();
        assert_eq!(names.len(), plan.len());
        assert!(names.contains("playground0"));
        assert!(names.contains("playground5000"));
    }

    #[test]
    fn test_zero_batch_size() {
        assert_eq!(plan_batches(3, 0).len(), 3);
    }
}
