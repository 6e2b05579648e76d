//! In-memory stores

use crate::state::Timer;

use super::{CompletedArchive, CompletedTimerRecord, StoreError, TimerStore};

#[derive(Debug, Clone, Default)]
pub struct MemoryTimerStore {
    timers: Vec<Timer>,
}

impl MemoryTimerStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_timers(timers: Vec<Timer>) -> Self {
        Self { timers }
    }

    pub(crate) fn timers(&self) -> &[Timer] {
        &self.timers
    }

    fn upsert(&mut self, timer: Timer) {
        match self.timers.iter_mut().find(|t| t.id() == timer.id()) {
            Some(slot) => *slot = timer,
            None => self.timers.push(timer),
        }
    }
}

impl TimerStore for MemoryTimerStore {
    fn list(&self) -> Result<Vec<Timer>, StoreError> {
        Ok(self.timers.clone())
    }

    fn get(&self, id: &str) -> Result<Option<Timer>, StoreError> {
        Ok(self.timers.iter().find(|t| t.id() == id).cloned())
    }

    fn put(&mut self, timer: Timer) -> Result<(), StoreError> {
        self.upsert(timer);
        Ok(())
    }

    fn put_many(&mut self, timers: &[Timer]) -> Result<(), StoreError> {
        for timer in timers {
            self.upsert(timer.clone());
        }
        Ok(())
    }

    fn remove(&mut self, id: &str) -> Result<Option<Timer>, StoreError> {
        Ok(self
            .timers
            .iter()
            .position(|t| t.id() == id)
            .map(|index| self.timers.remove(index)))
    }
}

#[derive(Debug, Clone, Default)]
pub struct MemoryArchive {
    records: Vec<CompletedTimerRecord>,
}

impl MemoryArchive {
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) fn with_records(records: Vec<CompletedTimerRecord>) -> Self {
        Self { records }
    }

    pub(crate) fn records(&self) -> &[CompletedTimerRecord] {
        &self.records
    }
}

impl CompletedArchive for MemoryArchive {
    fn append(&mut self, record: CompletedTimerRecord) -> Result<(), StoreError> {
        self.records.push(record);
        Ok(())
    }

    fn list_all(&self) -> Result<Vec<CompletedTimerRecord>, StoreError> {
        Ok(self.records.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::TimerStatus;
    use chrono::{TimeZone, Utc};

    fn timer(id: &str) -> Timer {
        let created = Utc.with_ymd_and_hms(2024, 3, 10, 9, 0, 0).unwrap();
        Timer::new(id.to_string(), "A15".to_string(), 60_000, created)
    }

    #[test]
    fn put_replaces_in_place_and_keeps_insertion_order() {
        let mut store = MemoryTimerStore::new();
        store.put(timer("a")).unwrap();
        store.put(timer("b")).unwrap();

        let mut updated = timer("a");
        updated.status = TimerStatus::Canceled;
        store.put(updated).unwrap();

        let ids: Vec<_> = store.list().unwrap().iter().map(|t| t.id().to_string()).collect();
        assert_eq!(ids, ["a", "b"]);
        assert_eq!(store.get("a").unwrap().unwrap().status(), TimerStatus::Canceled);
        assert_eq!(store.list_by_status(TimerStatus::Created).unwrap().len(), 1);
    }

    #[test]
    fn remove_returns_the_timer_once() {
        let mut store = MemoryTimerStore::new();
        store.put(timer("a")).unwrap();

        assert!(store.remove("a").unwrap().is_some());
        assert!(store.remove("a").unwrap().is_none());
        assert!(store.list().unwrap().is_empty());
    }
}
