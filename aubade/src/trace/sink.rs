//! Trace sink trait and implementations.

use super::{TraceEntry, TraceKind};
use parking_lot::{Mutex, RwLock};
use std::fs::{File, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use tracing::warn;

/// Destination for trace entries.
///
/// Recording never fails from the caller's point of view; sinks log their own
/// I/O problems and carry on.
pub trait TraceSink: Send + Sync {
    /// Appends an entry.
    fn record(&self, entry: &TraceEntry);
}

/// A sink that discards everything.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoOpTraceSink;

impl TraceSink for NoOpTraceSink {
    fn record(&self, _entry: &TraceEntry) {}
}

/// Appends entries to a JSON Lines file, one flushed line per entry.
#[derive(Debug)]
pub struct JsonlTraceSink {
    path: PathBuf,
    file: Mutex<File>,
}

impl JsonlTraceSink {
    /// Opens (or creates) the trace file in append mode.
    pub fn open(path: impl AsRef<Path>) -> io::Result<Self> {
        let path = path.as_ref().to_path_buf();
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let file = OpenOptions::new().create(true).append(true).open(&path)?;
        Ok(Self {
            path,
            file: Mutex::new(file),
        })
    }

    /// Returns the trace file path.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl TraceSink for JsonlTraceSink {
    fn record(&self, entry: &TraceEntry) {
        let line = match serde_json::to_string(entry) {
            Ok(line) => line,
            Err(e) => {
                warn!(error = %e, kind = %entry.kind, "Failed to serialize trace entry");
                return;
            }
        };

        let mut file = self.file.lock();
        if let Err(e) = writeln!(file, "{line}").and_then(|()| file.flush()) {
            warn!(error = %e, path = %self.path.display(), "Failed to append trace entry");
        }
    }
}

/// A collecting sink for tests.
#[derive(Debug, Default)]
pub struct CollectingTraceSink {
    entries: RwLock<Vec<TraceEntry>>,
}

impl CollectingTraceSink {
    /// Creates a new collecting sink.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns all collected entries.
    #[must_use]
    pub fn entries(&self) -> Vec<TraceEntry> {
        self.entries.read().clone()
    }

    /// Returns entries of one kind.
    #[must_use]
    pub fn of_kind(&self, kind: TraceKind) -> Vec<TraceEntry> {
        self.entries
            .read()
            .iter()
            .filter(|e| e.kind == kind)
            .cloned()
            .collect()
    }

    /// Returns the number of collected entries.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    /// Returns true if nothing has been collected.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }
}

impl TraceSink for CollectingTraceSink {
    fn record(&self, entry: &TraceEntry) {
        self.entries.write().push(entry.clone());
    }
}
