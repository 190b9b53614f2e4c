//! Append-only cost ledgers.
//!
//! Concurrent runs share one ledger; the only operation that mutates it is
//! `append`, and records are never rewritten.

use crate::TelemetryError;
use crate::model::{CostRecord, CostSummary};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, PoisonError, RwLock};
use tracing::{debug, warn};

/// A sink of [`CostRecord`]s.
///
/// The methods are synchronous and may block on file I/O. Async callers run
/// them on the blocking pool (see the gateway's `log_call`).
pub trait CostLedger: Send + Sync {
    /// Append one record.
    fn append(&self, record: CostRecord) -> Result<(), TelemetryError>;

    /// All records, oldest first.
    fn records(&self) -> Result<Vec<CostRecord>, TelemetryError>;

    /// Aggregate the whole ledger.
    fn summary(&self) -> Result<CostSummary, TelemetryError> {
        Ok(CostSummary::from_records(&self.records()?))
    }
}

/// Process-local ledger.
#[derive(Default)]
pub struct InMemoryLedger {
    records: RwLock<Vec<CostRecord>>,
}

impl InMemoryLedger {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.records.read().unwrap_or_else(PoisonError::into_inner).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl CostLedger for InMemoryLedger {
    fn append(&self, record: CostRecord) -> Result<(), TelemetryError> {
        self.records
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .push(record);
        Ok(())
    }

    fn records(&self) -> Result<Vec<CostRecord>, TelemetryError> {
        Ok(self
            .records
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone())
    }
}

/// File ledger: one JSON object per line.
pub struct JsonlLedger {
    path: PathBuf,
    write_lock: Mutex<()>,
}

impl JsonlLedger {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            write_lock: Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn io_error(&self, e: std::io::Error) -> TelemetryError {
        TelemetryError::Io {
            path: self.path.display().to_string(),
            reason: e.to_string(),
        }
    }
}

impl CostLedger for JsonlLedger {
    fn append(&self, record: CostRecord) -> Result<(), TelemetryError> {
        let line = serde_json::to_string(&record)?;
        let _guard = self.write_lock.lock().unwrap_or_else(PoisonError::into_inner);

        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(|e| self.io_error(e))?;
        }

        let mut file = std::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .map_err(|e| self.io_error(e))?;
        writeln!(file, "{line}").map_err(|e| self.io_error(e))?;

        debug!(path = %self.path.display(), model = %record.model, "Ledger record appended");
        Ok(())
    }

    fn records(&self) -> Result<Vec<CostRecord>, TelemetryError> {
        if !self.path.exists() {
            return Ok(Vec::new());
        }
        let content = std::fs::read_to_string(&self.path).map_err(|e| self.io_error(e))?;

        let mut records = Vec::new();
        for (n, line) in content.lines().enumerate() {
            if line.trim().is_empty() {
                continue;
            }
            match serde_json::from_str::<CostRecord>(line) {
                Ok(record) => records.push(record),
                Err(e) => warn!(line = n + 1, error = %e, "Skipping malformed ledger line"),
            }
        }
        Ok(records)
    }
}
