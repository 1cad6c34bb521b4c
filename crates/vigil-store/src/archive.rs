//! Durable snapshot archive.
//!
//! Every accepted snapshot is appended here before it touches the cache or
//! alert evaluation; an append failure fails the whole ingest. The format
//! is JSON lines: one snapshot per line, append-only.

use std::collections::VecDeque;
use std::fs::{self, File, OpenOptions};
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};

use parking_lot::{Mutex, RwLock};
use tracing::warn;

use vigil_proto::{MetricSnapshot, ServerId};

use crate::error::Result;

/// Append-only archive of accepted metric snapshots.
///
/// Implementations must be safe to share across threads; reads return
/// snapshots in arrival order, oldest first.
pub trait SnapshotArchive: Send + Sync {
    /// Durably record a snapshot. Must not return until the record is
    /// written out.
    ///
    /// # Errors
    ///
    /// Returns an error if the record could not be written; the caller is
    /// expected to fail its ingest.
    fn append(&self, snapshot: &MetricSnapshot) -> Result<()>;

    /// Up to `limit` most recent snapshots for one server, oldest first.
    ///
    /// # Errors
    ///
    /// Returns an error if the archive could not be read.
    fn recent(&self, server_id: &ServerId, limit: usize) -> Result<Vec<MetricSnapshot>>;

    /// Total number of archived snapshots across all servers.
    ///
    /// # Errors
    ///
    /// Returns an error if the archive could not be read.
    fn len(&self) -> Result<usize>;

    /// Whether the archive holds no snapshots.
    ///
    /// # Errors
    ///
    /// Returns an error if the archive could not be read.
    fn is_empty(&self) -> Result<bool> {
        Ok(self.len()? == 0)
    }
}

/// File-backed archive writing JSON lines to `snapshots.jsonl`.
///
/// Appends hold a writer lock and flush before returning. Reads share the
/// same lock, so a scan never observes a torn record from a concurrent
/// append; unparseable lines (crash debris) are skipped with a warning.
pub struct FileSnapshotArchive {
    path: PathBuf,
    writer: Mutex<BufWriter<File>>,
}

impl FileSnapshotArchive {
    /// Open (or create) the archive under `state_dir`.
    ///
    /// # Errors
    ///
    /// Returns an error if the directory or file cannot be created.
    pub fn open(state_dir: &Path) -> Result<Self> {
        fs::create_dir_all(state_dir)?;
        let path = state_dir.join("snapshots.jsonl");
        let file = OpenOptions::new().create(true).append(true).open(&path)?;
        Ok(Self {
            path,
            writer: Mutex::new(BufWriter::new(file)),
        })
    }

    /// Path of the backing file.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn scan<F>(&self, mut visit: F) -> Result<()>
    where
        F: FnMut(MetricSnapshot),
    {
        // Hold the writer lock across the scan so appends cannot interleave.
        let mut writer = self.writer.lock();
        writer.flush()?;

        let file = match File::open(&self.path) {
            Ok(file) => file,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(()),
            Err(e) => return Err(e.into()),
        };

        for line in BufReader::new(file).lines() {
            let line = line?;
            if line.trim().is_empty() {
                continue;
            }
            match serde_json::from_str::<MetricSnapshot>(&line) {
                Ok(snapshot) => visit(snapshot),
                Err(e) => warn!(error = %e, "skipping unparseable archive line"),
            }
        }
        Ok(())
    }
}

impl SnapshotArchive for FileSnapshotArchive {
    fn append(&self, snapshot: &MetricSnapshot) -> Result<()> {
        let line = serde_json::to_string(snapshot)?;
        let mut writer = self.writer.lock();
        writer.write_all(line.as_bytes())?;
        writer.write_all(b"\n")?;
        writer.flush()?;
        Ok(())
    }

    fn recent(&self, server_id: &ServerId, limit: usize) -> Result<Vec<MetricSnapshot>> {
        if limit == 0 {
            return Ok(Vec::new());
        }

        let mut tail: VecDeque<MetricSnapshot> = VecDeque::with_capacity(limit.min(1024));
        self.scan(|snapshot| {
            if snapshot.server_id == *server_id {
                if tail.len() == limit {
                    tail.pop_front();
                }
                tail.push_back(snapshot);
            }
        })?;
        Ok(tail.into_iter().collect())
    }

    fn len(&self) -> Result<usize> {
        let mut count = 0;
        self.scan(|_| count += 1)?;
        Ok(count)
    }
}

/// In-memory archive for tests and ephemeral deployments.
#[derive(Default)]
pub struct MemorySnapshotArchive {
    records: RwLock<Vec<MetricSnapshot>>,
}

impl MemorySnapshotArchive {
    /// Create an empty archive.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

impl SnapshotArchive for MemorySnapshotArchive {
    fn append(&self, snapshot: &MetricSnapshot) -> Result<()> {
        self.records.write().push(snapshot.clone());
        Ok(())
    }

    fn recent(&self, server_id: &ServerId, limit: usize) -> Result<Vec<MetricSnapshot>> {
        let records = self.records.read();
        let matching: Vec<&MetricSnapshot> = records
            .iter()
            .filter(|s| s.server_id == *server_id)
            .collect();
        let start = matching.len().saturating_sub(limit);
        Ok(matching[start..].iter().map(|s| (*s).clone()).collect())
    }

    fn len(&self) -> Result<usize> {
        Ok(self.records.read().len())
    }
}
