//! File-backed append-only journal.

use std::fs::{File, OpenOptions};
use std::io::{BufRead, BufReader, ErrorKind, Write};
use std::path::{Path, PathBuf};

use tracing::{debug, warn};

use crate::error::{JournalError, JournalResult};
use crate::records::{HealthRecord, MetricsRecord};

pub const HEALTH_HEADER: &str = "timestamp,timestamp_unix,status,response_time_ms,error";
pub const METRICS_HEADER: &str = "timestamp,timestamp_unix,cpu_percent,memory_usage,memory_percent,network_io,block_io,db_size,node_count,relationship_count";

/// Health and metrics logs for one instance.
///
/// Cheap to clone; holds paths only and opens files per append.
#[derive(Debug, Clone)]
pub struct Journal {
    dir: PathBuf,
    health_path: PathBuf,
    metrics_path: PathBuf,
}

impl Journal {
    /// Open (creating the directory if needed) the journal for `instance`.
    pub fn open(dir: impl AsRef<Path>, instance: &str) -> JournalResult<Self> {
        let dir = dir.as_ref().to_path_buf();
        std::fs::create_dir_all(&dir).map_err(|e| JournalError::io(&dir, e))?;
        Ok(Self {
            health_path: dir.join(format!("{instance}-health.log")),
            metrics_path: dir.join(format!("{instance}-metrics.log")),
            dir,
        })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn health_path(&self) -> &Path {
        &self.health_path
    }

    pub fn metrics_path(&self) -> &Path {
        &self.metrics_path
    }

    pub fn append_health(&self, record: &HealthRecord) -> JournalResult<()> {
        append_line(&self.health_path, HEALTH_HEADER, &record.to_line())?;
        debug!(status = %record.status, path = ?self.health_path, "health record appended");
        Ok(())
    }

    pub fn append_metrics(&self, record: &MetricsRecord) -> JournalResult<()> {
        append_line(&self.metrics_path, METRICS_HEADER, &record.to_line())?;
        debug!(path = ?self.metrics_path, "metrics record appended");
        Ok(())
    }

    /// Last `n` health records, oldest first. Malformed lines are skipped.
    pub fn tail_health(&self, n: usize) -> JournalResult<Vec<HealthRecord>> {
        tail(&self.health_path, n, HealthRecord::from_line)
    }

    /// Last `n` metrics records, oldest first. Malformed lines are skipped.
    pub fn tail_metrics(&self, n: usize) -> JournalResult<Vec<MetricsRecord>> {
        tail(&self.metrics_path, n, MetricsRecord::from_line)
    }
}

/// Append one line, writing the header first if this call created the file.
///
/// Header and record go out in one `write_all` so a concurrent reader never
/// sees a header-only file followed by someone else's record.
fn append_line(path: &Path, header: &str, line: &str) -> JournalResult<()> {
    let (mut file, buf) = match OpenOptions::new().append(true).create_new(true).open(path) {
        Ok(file) => (file, format!("{header}\n{line}\n")),
        Err(e) if e.kind() == ErrorKind::AlreadyExists => {
            let file = OpenOptions::new()
                .append(true)
                .open(path)
                .map_err(|e| JournalError::io(path, e))?;
            (file, format!("{line}\n"))
        }
        Err(e) => return Err(JournalError::io(path, e)),
    };
    file.write_all(buf.as_bytes())
        .map_err(|e| JournalError::io(path, e))
}

fn tail<T>(
    path: &Path,
    n: usize,
    parse: impl Fn(&str) -> JournalResult<T>,
) -> JournalResult<Vec<T>> {
    let file = match File::open(path) {
        Ok(f) => f,
        Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
        Err(e) => return Err(JournalError::io(path, e)),
    };

    let mut records = Vec::new();
    for line in BufReader::new(file).lines().skip(1) {
        let line = line.map_err(|e| JournalError::io(path, e))?;
        if line.trim().is_empty() {
            continue;
        }
        match parse(&line) {
            Ok(record) => records.push(record),
            Err(e) => warn!(error = %e, path = ?path, "skipping malformed journal line"),
        }
    }

    let skip = records.len().saturating_sub(n);
    Ok(records.split_off(skip))
}
