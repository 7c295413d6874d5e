use std::fs::{self, File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};

use parking_lot::Mutex;
use thiserror::Error;

use crate::model::RunRecord;

/// Errors from appending to a journal sink.
#[derive(Debug, Error)]
pub enum JournalError {
    #[error("journal io: {0}")]
    Io(#[from] std::io::Error),

    #[error("journal serialization: {0}")]
    Serialize(#[from] serde_json::Error),
}

/// Sink for run records. Appends must be durable in order; readers replay
/// the file line by line.
pub trait RunJournal: Send + Sync {
    fn append(&self, record: &RunRecord) -> Result<(), JournalError>;
}

/// File-backed journal writing one JSON object per line.
pub struct JsonlJournal {
    path: PathBuf,
    file: Mutex<File>,
}

impl JsonlJournal {
    /// Open (or create) the journal file in append mode, creating parent
    /// directories as needed.
    pub fn create(path: impl Into<PathBuf>) -> Result<Self, JournalError> {
        let path = path.into();
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        let file = OpenOptions::new().create(true).append(true).open(&path)?;
        Ok(Self {
            path,
            file: Mutex::new(file),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl RunJournal for JsonlJournal {
    fn append(&self, record: &RunRecord) -> Result<(), JournalError> {
        let line = serde_json::to_vec(record)?;
        let mut file = self.file.lock();
        file.write_all(&line)?;
        file.write_all(b"\n")?;
        file.flush()?;
        Ok(())
    }
}

/// In-memory journal for tests and offline development.
#[derive(Default)]
pub struct MemoryJournal {
    records: Mutex<Vec<RunRecord>>,
}

impl MemoryJournal {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn records(&self) -> Vec<RunRecord> {
        self.records.lock().clone()
    }
}

impl RunJournal for MemoryJournal {
    fn append(&self, record: &RunRecord) -> Result<(), JournalError> {
        self.records.lock().push(record.clone());
        Ok(())
    }
}
