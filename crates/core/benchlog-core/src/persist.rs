//! Durable storage collaborators.
//!
//! The store calls [`HistorySink::persist`] synchronously after every
//! in-memory change. A change counts as committed only when the sink
//! returns `Ok`; otherwise the store rolls it back.

use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use log::debug;
use parking_lot::Mutex;
use tempfile::NamedTempFile;
use thiserror::Error;

use crate::format::{FormatError, HistoryDocument};

/// Errors reported by a sink.
#[derive(Debug, Error)]
pub enum PersistError {
    #[error("I/O error on {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("serialization failed: {0}")]
    Serialize(#[from] serde_json::Error),

    #[error("sink rejected write: {0}")]
    Rejected(String),
}

/// Durable storage for the history document.
pub trait HistorySink: Send + Sync {
    /// Writes the full document. Must not return `Ok` unless the write is durable.
    fn persist(&self, document: &HistoryDocument) -> Result<(), PersistError>;
}

/// Keeps nothing. Used when the caller persists on its own schedule.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullSink;

impl HistorySink for NullSink {
    fn persist(&self, _document: &HistoryDocument) -> Result<(), PersistError> {
        Ok(())
    }
}

/// In-memory sink for tests and dry runs. Can be told to fail.
#[derive(Debug, Default)]
pub struct MemorySink {
    last: Mutex<Option<HistoryDocument>>,
    writes: AtomicUsize,
    failing: AtomicBool,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes every following write fail until reset.
    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    /// Number of successful writes.
    pub fn writes(&self) -> usize {
        self.writes.load(Ordering::SeqCst)
    }

    pub fn last_document(&self) -> Option<HistoryDocument> {
        self.last.lock().clone()
    }
}

impl HistorySink for MemorySink {
    fn persist(&self, document: &HistoryDocument) -> Result<(), PersistError> {
        if self.failing.load(Ordering::SeqCst) {
            return Err(PersistError::Rejected("memory sink set to fail".to_string()));
        }
        *self.last.lock() = Some(document.clone());
        self.writes.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

/// On-disk representation of the document.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileLayout {
    /// Bare pretty-printed JSON.
    Json,
    /// `window.BENCHMARK_DATA = {...}` script.
    DataJs,
}

impl FileLayout {
    /// `.js` files use the script form, everything else bare JSON.
    pub fn for_path(path: &Path) -> Self {
        match path.extension().and_then(|ext| ext.to_str()) {
            Some("js") => FileLayout::DataJs,
            _ => FileLayout::Json,
        }
    }
}

/// Writes the document to a file, replacing it atomically.
#[derive(Debug, Clone)]
pub struct DataFileSink {
    path: PathBuf,
    layout: FileLayout,
}

impl DataFileSink {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let layout = FileLayout::for_path(&path);
        Self { path, layout }
    }

    pub fn with_layout(path: impl Into<PathBuf>, layout: FileLayout) -> Self {
        Self {
            path: path.into(),
            layout,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Reads the current document, or `None` if the file does not exist yet.
    pub fn load(&self) -> Result<Option<HistoryDocument>, LoadError> {
        if !self.path.exists() {
            return Ok(None);
        }
        let text = std::fs::read_to_string(&self.path).map_err(|source| PersistError::Io {
            path: self.path.clone(),
            source,
        })?;
        Ok(Some(HistoryDocument::from_data_js(&text)?))
    }

    fn render(&self, document: &HistoryDocument) -> Result<String, serde_json::Error> {
        match self.layout {
            FileLayout::Json => document.to_json(),
            FileLayout::DataJs => document.to_data_js(),
        }
    }

    fn io_error(&self, source: std::io::Error) -> PersistError {
        PersistError::Io {
            path: self.path.clone(),
            source,
        }
    }
}

impl HistorySink for DataFileSink {
    fn persist(&self, document: &HistoryDocument) -> Result<(), PersistError> {
        let text = self.render(document)?;
        let dir = match self.path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
            _ => PathBuf::from("."),
        };
        std::fs::create_dir_all(&dir).map_err(|e| self.io_error(e))?;

        let mut file = NamedTempFile::new_in(&dir).map_err(|e| self.io_error(e))?;
        file.write_all(text.as_bytes())
            .and_then(|()| file.as_file().sync_all())
            .map_err(|e| self.io_error(e))?;
        file.persist(&self.path).map_err(|e| self.io_error(e.error))?;

        debug!(
            "wrote {} entries to {}",
            document.entry_count(),
            self.path.display()
        );
        Ok(())
    }
}

/// Errors reading a persisted file.
#[derive(Debug, Error)]
pub enum LoadError {
    #[error(transparent)]
    Io(#[from] PersistError),
    #[error(transparent)]
    Format(#[from] FormatError),
}
