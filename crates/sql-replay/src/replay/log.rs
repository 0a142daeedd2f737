//! Per-batch log destinations.
//!
//! Every batch writes its own line-oriented log, keyed by offset, so that the
//! source text of inconsistent statements can be inspected after a run.

use std::collections::HashMap;
use std::fs::{File, OpenOptions};
use std::io::{self, BufWriter, Write};
use std::path::PathBuf;
use std::sync::{Arc, Mutex};

use tracing::warn;

/// Timestamp prefix of file log lines.
const TIMESTAMP_FORMAT: &str = "%Y/%m/%d %H:%M:%S";

/// Line sink owned by one batch.
pub trait BatchLog: Send {
    /// Append one line. Write failures are reported but never stop a batch.
    fn line(&mut self, line: &str);

    /// Flush buffered lines.
    fn finish(&mut self) {}
}

/// Opens one [`BatchLog`] per batch offset.
pub trait BatchLogFactory: Send + Sync {
    fn open(&self, offset: u64) -> io::Result<Box<dyn BatchLog>>;
}

/// Writes `<dir>/<prefix>-<offset>.log`, truncating any previous run's file.
#[derive(Debug, Clone)]
pub struct FileBatchLogFactory {
    dir: PathBuf,
    prefix: String,
}

impl FileBatchLogFactory {
    pub fn new(dir: impl Into<PathBuf>, prefix: impl Into<String>) -> Self {
        Self {
            dir: dir.into(),
            prefix: prefix.into(),
        }
    }

    /// Path of the log for the batch at `offset`.
    pub fn path_for(&self, offset: u64) -> PathBuf {
        self.dir.join(format!("{}-{}.log", self.prefix, offset))
    }
}

impl BatchLogFactory for FileBatchLogFactory {
    fn open(&self, offset: u64) -> io::Result<Box<dyn BatchLog>> {
        let path = self.path_for(offset);
        let file = OpenOptions::new()
            .create(true)
            .write(true)
            .truncate(true)
            .open(&path)?;
        Ok(Box::new(FileBatchLog {
            path,
            writer: BufWriter::new(file),
            failed: false,
        }))
    }
}

/// File-backed batch log with timestamped lines.
pub struct FileBatchLog {
    path: PathBuf,
    writer: BufWriter<File>,
    failed: bool,
}

impl FileBatchLog {
    fn report(&mut self, e: io::Error) {
        // One warning per file is enough
        if !self.failed {
            self.failed = true;
            warn!("Writing batch log {:?} failed: {}", self.path, e);
        }
    }
}

impl BatchLog for FileBatchLog {
    fn line(&mut self, line: &str) {
        let now = chrono::Local::now();
        if let Err(e) = writeln!(self.writer, "{} {}", now.format(TIMESTAMP_FORMAT), line) {
            self.report(e);
        }
    }

    fn finish(&mut self) {
        if let Err(e) = self.writer.flush() {
            self.report(e);
        }
    }
}

impl Drop for FileBatchLog {
    fn drop(&mut self) {
        let _ = self.writer.flush();
    }
}

/// Keeps every batch's lines in memory, without timestamps.
#[derive(Debug, Clone, Default)]
pub struct MemoryBatchLogFactory {
    lines: Arc<Mutex<HashMap<u64, Vec<String>>>>,
}

impl MemoryBatchLogFactory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Lines written so far by the batch at `offset`.
    pub fn lines(&self, offset: u64) -> Vec<String> {
        self.lines
            .lock()
            .map(|map| map.get(&offset).cloned().unwrap_or_default())
            .unwrap_or_default()
    }

    /// Offsets of every batch that opened a log.
    pub fn offsets(&self) -> Vec<u64> {
        let mut offsets: Vec<u64> = self
            .lines
            .lock()
            .map(|map| map.keys().copied().collect())
            .unwrap_or_default();
        offsets.sort_unstable();
        offsets
    }
}

impl BatchLogFactory for MemoryBatchLogFactory {
    fn open(&self, offset: u64) -> io::Result<Box<dyn BatchLog>> {
        if let Ok(mut map) = self.lines.lock() {
            map.insert(offset, Vec::new());
        }
        Ok(Box::new(MemoryBatchLog {
            offset,
            lines: self.lines.clone(),
        }))
    }
}

struct MemoryBatchLog {
    offset: u64,
    lines: Arc<Mutex<HashMap<u64, Vec<String>>>>,
}

impl BatchLog for MemoryBatchLog {
    fn line(&mut self, line: &str) {
        if let Ok(mut map) = self.lines.lock() {
            map.entry(self.offset).or_default().push(line.to_string());
        }
    }
}

/// Discards everything. Used when per-batch logs are disabled.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoOpBatchLogFactory;

struct NoOpBatchLog;

impl BatchLog for NoOpBatchLog {
    fn line(&mut self, _line: &str) {}
}

impl BatchLogFactory for NoOpBatchLogFactory {
    fn open(&self, _offset: u64) -> io::Result<Box<dyn BatchLog>> {
        Ok(Box::new(NoOpBatchLog))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_file_log_truncates_and_prefixes() {
        let dir = tempfile::tempdir().unwrap();
        let factory = FileBatchLogFactory::new(dir.path(), "playground");
        let path = factory.path_for(5000);
        assert!(path.ends_with("playground-5000.log"));

        std::fs::write(&path, "stale line\n").unwrap();

        let mut log = factory.open(5000).unwrap();
        log.line("5000 sql compare end, success");
        log.finish();
        drop(log);

        let content = std::fs::read_to_string(&path).unwrap();
        assert!(!content.contains("stale"));
        let line = content.lines().next().unwrap();
        assert!(line.ends_with(" 5000 sql compare end, success"));
        // "YYYY/MM/DD HH:MM:SS " prefix
        assert_eq!(&line[4..5], "/");
        assert_eq!(&line[10..11], " ");
    }

    #[test]
    fn test_open_in_missing_dir_fails() {
        let dir = tempfile::tempdir().unwrap();
        let factory = FileBatchLogFactory::new(dir.path().join("missing"), "playground");
        assert!(factory.open(0).is_err());
    }

    #[test]
    fn test_memory_log_per_offset() {
        let factory = MemoryBatchLogFactory::new();
        let mut a = factory.open(0).unwrap();
        let mut b = factory.open(5000).unwrap();
        a.line("a1");
        b.line("b1");
        a.line("a2");
        assert_eq!(factory.lines(0), vec!["a1", "a2"]);
        assert_eq!(factory.lines(5000), vec!["b1"]);
        assert_eq!(factory.offsets(), vec![0, 5000]);
    }
}
