//! Statement replay: normalization, filtering, classification and the
//! per-batch replay loop.

pub mod batch;
pub mod classify;
pub mod filter;
pub mod log;
pub mod normalize;

pub use batch::{BatchReplayer, BatchTally};
pub use classify::{split_statements, Agreement, Classification, Classifier, Divergence, Verdict};
pub use filter::{FilterReason, StatementFilter, DEFAULT_DENY_LIST};
pub use log::{
    BatchLog, BatchLogFactory, FileBatchLog, FileBatchLogFactory, MemoryBatchLogFactory,
    NoOpBatchLogFactory,
};
pub use normalize::{normalize_all, normalize_result_set, NULL_TEXT};
