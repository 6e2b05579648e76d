//! JSON file stores
//!
//! Timers live in a single JSON snapshot that is rewritten through a
//! temporary file and renamed into place, so a reader never sees a partial
//! write. Completed records are appended one JSON document per line.

use std::{
    fs::{self, OpenOptions},
    io::{ErrorKind, Write},
    path::{Path, PathBuf},
};

use tracing::{debug, info, warn};

use crate::state::Timer;

use super::{
    CompletedArchive, CompletedTimerRecord, MemoryArchive, MemoryTimerStore, StoreError,
    TimerStore,
};

#[derive(Debug)]
pub struct JsonFileTimerStore {
    path: PathBuf,
    inner: MemoryTimerStore,
}

impl JsonFileTimerStore {
    /// Open the snapshot at `path`, starting empty when the file does not exist
    pub fn open(path: impl Into<PathBuf>) -> Result<Self, StoreError> {
        let path = path.into();
        let timers: Vec<Timer> = match fs::read(&path) {
            Ok(bytes) => serde_json::from_slice(&bytes)
                .map_err(|e| StoreError::serialization(&path, e))?,
            Err(e) if e.kind() == ErrorKind::NotFound => Vec::new(),
            Err(e) => return Err(StoreError::io(&path, e)),
        };

        info!("Loaded {} timers from {}", timers.len(), path.display());
        Ok(Self {
            path,
            inner: MemoryTimerStore::with_timers(timers),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn persist(&self, timers: &[Timer]) -> Result<(), StoreError> {
        let bytes = serde_json::to_vec_pretty(timers)
            .map_err(|e| StoreError::serialization(&self.path, e))?;

        let tmp = self.path.with_extension("json.tmp");
        fs::write(&tmp, bytes).map_err(|e| StoreError::io(&tmp, e))?;
        fs::rename(&tmp, &self.path).map_err(|e| StoreError::io(&self.path, e))?;

        debug!("Wrote {} timers to {}", timers.len(), self.path.display());
        Ok(())
    }

    /// Write `next` to disk and only then make it the in-memory state
    fn commit(&mut self, next: MemoryTimerStore) -> Result<(), StoreError> {
        self.persist(next.timers())?;
        self.inner = next;
        Ok(())
    }
}

impl TimerStore for JsonFileTimerStore {
    fn list(&self) -> Result<Vec<Timer>, StoreError> {
        self.inner.list()
    }

    fn get(&self, id: &str) -> Result<Option<Timer>, StoreError> {
        self.inner.get(id)
    }

    fn put(&mut self, timer: Timer) -> Result<(), StoreError> {
        let mut next = self.inner.clone();
        next.put(timer)?;
        self.commit(next)
    }

    fn put_many(&mut self, timers: &[Timer]) -> Result<(), StoreError> {
        let mut next = self.inner.clone();
        next.put_many(timers)?;
        self.commit(next)
    }

    fn remove(&mut self, id: &str) -> Result<Option<Timer>, StoreError> {
        let mut next = self.inner.clone();
        let removed = next.remove(id)?;
        if removed.is_some() {
            self.commit(next)?;
        }
        Ok(removed)
    }

    fn flush(&mut self) -> Result<(), StoreError> {
        self.persist(self.inner.timers())
    }
}

#[derive(Debug)]
pub struct JsonFileArchive {
    path: PathBuf,
    inner: MemoryArchive,
    /// The file ends in a partial line that the next append must not extend
    torn_tail: bool,
}

impl JsonFileArchive {
    /// Open the JSON-lines archive at `path`, starting empty when it does not exist
    ///
    /// Lines that fail to parse, such as one cut short by an interrupted
    /// append, are logged and skipped.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self, StoreError> {
        let path = path.into();
        let bytes = match fs::read(&path) {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == ErrorKind::NotFound => Vec::new(),
            Err(e) => return Err(StoreError::io(&path, e)),
        };

        let mut records = Vec::new();
        for (number, line) in bytes.split(|b| *b == b'\n').enumerate() {
            if line.iter().all(u8::is_ascii_whitespace) {
                continue;
            }
            match serde_json::from_slice::<CompletedTimerRecord>(line) {
                Ok(record) => records.push(record),
                Err(e) => warn!(
                    "Skipping malformed line {} in {}: {}",
                    number + 1,
                    path.display(),
                    e
                ),
            }
        }

        let torn_tail = bytes.last().is_some_and(|b| *b != b'\n');
        info!("Loaded {} completed records from {}", records.len(), path.display());
        Ok(Self {
            path,
            inner: MemoryArchive::with_records(records),
            torn_tail,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl CompletedArchive for JsonFileArchive {
    fn append(&mut self, record: CompletedTimerRecord) -> Result<(), StoreError> {
        let mut line = if self.torn_tail { String::from("\n") } else { String::new() };
        line.push_str(
            &serde_json::to_string(&record)
                .map_err(|e| StoreError::serialization(&self.path, e))?,
        );
        line.push('\n');

        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .map_err(|e| StoreError::io(&self.path, e))?;
        // A failed write may leave part of the line behind
        self.torn_tail = true;
        file.write_all(line.as_bytes())
            .map_err(|e| StoreError::io(&self.path, e))?;
        self.torn_tail = false;

        self.inner.append(record)
    }

    fn list_all(&self) -> Result<Vec<CompletedTimerRecord>, StoreError> {
        Ok(self.inner.records().to_vec())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::TimerStatus;
    use chrono::{Duration, FixedOffset, TimeZone, Utc};

    #[test]
    fn timers_survive_reopen_with_history_and_status() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("timers.json");
        let start = Utc.with_ymd_and_hms(2024, 3, 10, 9, 0, 0).unwrap() + Duration::milliseconds(7);

        let mut timer = Timer::new("t-1".into(), "A15".into(), 1_800_000, start);
        timer.begin_block(start);
        timer.close_block(start + Duration::milliseconds(1_234));
        timer.status = TimerStatus::Paused;
        timer.begin_block(start + Duration::milliseconds(5_000));

        {
            let mut store = JsonFileTimerStore::open(&path).unwrap();
            store.put(timer.clone()).unwrap();
        }

        let reopened = JsonFileTimerStore::open(&path).unwrap();
        let loaded = reopened.get("t-1").unwrap().unwrap();
        assert_eq!(loaded, timer);
        assert_eq!(loaded.status(), TimerStatus::Running);
        assert_eq!(loaded.history()[0].elapsed, 1_234);
        assert!(loaded.open_block().is_some());
    }

    #[test]
    fn archive_appends_lines_and_reloads_in_order() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("completed.jsonl");
        let start = Utc.with_ymd_and_hms(2024, 3, 10, 9, 0, 0).unwrap();

        let mut first = Timer::new("a".into(), "A1".into(), 60_000, start);
        first.begin_block(start);
        first.complete();
        let mut second = Timer::new("b".into(), "B2".into(), 120_000, start);
        second.begin_block(start);
        second.complete();

        let utc = FixedOffset::east_opt(0).unwrap();
        {
            let mut archive = JsonFileArchive::open(&path).unwrap();
            archive.append(CompletedTimerRecord::from_timer(&first, start, utc)).unwrap();
            archive.append(CompletedTimerRecord::from_timer(&second, start, utc)).unwrap();
        }

        let reopened = JsonFileArchive::open(&path).unwrap();
        let ids: Vec<_> = reopened.list_all().unwrap().into_iter().map(|r| r.id).collect();
        assert_eq!(ids, ["a", "b"]);
        assert_eq!(reopened.by_timer("b").unwrap()[0].total_elapsed_minutes, 2);
    }

    #[test]
    fn malformed_snapshot_is_a_serialization_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("timers.json");
        fs::write(&path, b"{not json").unwrap();

        let err = JsonFileTimerStore::open(&path).unwrap_err();
        assert!(matches!(err, StoreError::Serialization { .. }));
    }

    #[test]
    fn failed_snapshot_write_leaves_memory_unchanged() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("timers.json");
        let start = Utc.with_ymd_and_hms(2024, 3, 10, 9, 0, 0).unwrap();
        let timer = Timer::new("t-1".into(), "A15".into(), 60_000, start);

        let mut store = JsonFileTimerStore::open(&path).unwrap();
        store.put(timer.clone()).unwrap();

        // A directory in place of the temp file makes every write fail
        fs::create_dir(dir.path().join("timers.json.tmp")).unwrap();

        let mut running = timer.clone();
        running.begin_block(start);
        let err = store.put(running.clone()).unwrap_err();
        assert!(matches!(err, StoreError::Io { .. }));
        assert_eq!(store.get("t-1").unwrap(), Some(timer.clone()));

        let other = Timer::new("t-2".into(), "B2".into(), 60_000, start);
        assert!(store.put_many(&[running, other]).is_err());
        assert_eq!(store.list().unwrap(), vec![timer.clone()]);

        assert!(store.remove("t-1").is_err());
        assert_eq!(store.get("t-1").unwrap(), Some(timer.clone()));

        let reopened = JsonFileTimerStore::open(&path).unwrap();
        assert_eq!(reopened.list().unwrap(), vec![timer]);
    }

    #[test]
    fn torn_archive_tail_is_skipped_and_not_extended() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("completed.jsonl");
        let start = Utc.with_ymd_and_hms(2024, 3, 10, 9, 0, 0).unwrap();
        let utc = FixedOffset::east_opt(0).unwrap();

        let mut first = Timer::new("a".into(), "A1".into(), 60_000, start);
        first.begin_block(start);
        first.complete();
        let mut line = serde_json::to_string(&CompletedTimerRecord::from_timer(&first, start, utc)).unwrap();
        line.push_str("\n{\"id\":\"b\",\"bad");
        fs::write(&path, line).unwrap();

        let mut archive = JsonFileArchive::open(&path).unwrap();
        assert_eq!(archive.list_all().unwrap().len(), 1);

        let mut second = Timer::new("c".into(), "C3".into(), 120_000, start);
        second.begin_block(start);
        second.complete();
        archive.append(CompletedTimerRecord::from_timer(&second, start, utc)).unwrap();

        let reopened = JsonFileArchive::open(&path).unwrap();
        let ids: Vec<_> = reopened.list_all().unwrap().into_iter().map(|r| r.id).collect();
        assert_eq!(ids, ["a", "c"]);
    }
}
