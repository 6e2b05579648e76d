//! Persistence boundary for timers and completed-timer records
//!
//! The engine only talks to the [`TimerStore`] and [`CompletedArchive`]
//! traits. Two implementations ship with the crate: in-memory stores and
//! JSON files under a data directory.

pub mod archive;
pub mod json_file;
pub mod memory;

use std::path::{Path, PathBuf};

use thiserror::Error;

use crate::state::{Timer, TimerStatus};

pub use archive::{ArchiveQuery, ArchiveSort, CompletedTimerRecord, SortOrder};
pub use json_file::{JsonFileArchive, JsonFileTimerStore};
pub use memory::{MemoryArchive, MemoryTimerStore};

/// Failures of the persistence layer, distinct from command validation
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("I/O error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Malformed data in {path}: {source}")]
    Serialization {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("Store lock poisoned")]
    Poisoned,
}

impl StoreError {
    pub(crate) fn io(path: &Path, source: std::io::Error) -> Self {
        Self::Io {
            path: path.to_path_buf(),
            source,
        }
    }

    pub(crate) fn serialization(path: &Path, source: serde_json::Error) -> Self {
        Self::Serialization {
            path: path.to_path_buf(),
            source,
        }
    }
}

/// The live timer collection
pub trait TimerStore: Send {
    /// All timers in insertion order
    fn list(&self) -> Result<Vec<Timer>, StoreError>;

    fn get(&self, id: &str) -> Result<Option<Timer>, StoreError>;

    /// Insert a new timer or replace the one with the same id
    fn put(&mut self, timer: Timer) -> Result<(), StoreError>;

    /// Replace several timers as one write
    fn put_many(&mut self, timers: &[Timer]) -> Result<(), StoreError> {
        for timer in timers {
            self.put(timer.clone())?;
        }
        Ok(())
    }

    fn remove(&mut self, id: &str) -> Result<Option<Timer>, StoreError>;

    fn list_by_status(&self, status: TimerStatus) -> Result<Vec<Timer>, StoreError> {
        Ok(self
            .list()?
            .into_iter()
            .filter(|timer| timer.status() == status)
            .collect())
    }

    fn flush(&mut self) -> Result<(), StoreError> {
        Ok(())
    }
}

/// Append-only record of timers that ran to completion
pub trait CompletedArchive: Send {
    fn append(&mut self, record: CompletedTimerRecord) -> Result<(), StoreError>;

    /// All records in insertion order
    fn list_all(&self) -> Result<Vec<CompletedTimerRecord>, StoreError>;

    /// Records written for one originating timer
    fn by_timer(&self, id: &str) -> Result<Vec<CompletedTimerRecord>, StoreError> {
        Ok(self
            .list_all()?
            .into_iter()
            .filter(|record| record.id == id)
            .collect())
    }

    fn query(&self, query: &ArchiveQuery) -> Result<Vec<CompletedTimerRecord>, StoreError> {
        Ok(query.apply(self.list_all()?))
    }

    fn flush(&mut self) -> Result<(), StoreError> {
        Ok(())
    }
}

/// Open the stores for a deployment: JSON files under `data_dir`, or memory
pub fn open(
    data_dir: Option<&Path>,
) -> Result<(Box<dyn TimerStore>, Box<dyn CompletedArchive>), StoreError> {
    match data_dir {
        Some(dir) => {
            std::fs::create_dir_all(dir).map_err(|e| StoreError::io(dir, e))?;
            let timers = JsonFileTimerStore::open(dir.join("timers.json"))?;
            let archive = JsonFileArchive::open(dir.join("completed.jsonl"))?;
            Ok((Box::new(timers), Box::new(archive)))
        }
        None => Ok((
            Box::new(MemoryTimerStore::new()),
            Box::new(MemoryArchive::new()),
        )),
    }
}
