//! Timer lifecycle engine
//!
//! ## State Transitions
//!
//! ```text
//! CREATED -> RUNNING <-> PAUSED
//! RUNNING | PAUSED -> COMPLETED (duration exhausted) | CANCELED (stop)
//! CANCELED -> RUNNING
//! any -> CREATED (reset)
//! ```
//!
//! Every command and every tick runs under one lock over the store and the
//! archive. That linearizes operations on the same timer and lets a tick
//! replace the whole running population in one write. Sinks are called
//! while the lock is held, so subscribers see events in mutation order.

use std::sync::{Arc, Mutex, MutexGuard};

use chrono::{DateTime, FixedOffset, Offset, Utc};
use serde::Serialize;
use tracing::{debug, info, warn};
use uuid::Uuid;

use super::{Command, EngineError, EventSink, TimerEvent};
use crate::{
    state::{StatsSnapshot, Timer, TimerStatus},
    store::{
        ArchiveQuery, CompletedArchive, CompletedTimerRecord, MemoryArchive, MemoryTimerStore,
        StoreError, TimerStore,
    },
    utils::Clock,
};

/// Outcome of one tick pass
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct TickReport {
    /// Running timers whose elapsed time was refreshed
    pub advanced: usize,
    /// Running timers that reached their duration
    pub completed: usize,
    /// Running timers left untouched because they were inconsistent
    pub skipped: usize,
}

/// What a command did to a timer
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Transition {
    Started,
    Resumed,
    Paused,
    Stopped,
    Completed,
    Reset,
}

impl Transition {
    fn into_event(self, timer: Timer) -> TimerEvent {
        match self {
            Transition::Started => TimerEvent::Started(timer),
            Transition::Resumed => TimerEvent::Resumed(timer),
            Transition::Paused => TimerEvent::Paused(timer),
            Transition::Stopped => TimerEvent::Stopped(timer),
            Transition::Completed => TimerEvent::Completed(timer),
            Transition::Reset => TimerEvent::Reset(timer),
        }
    }
}

struct Stores {
    timers: Box<dyn TimerStore>,
    archive: Box<dyn CompletedArchive>,
}

/// The single authority over timer mutation
pub struct Engine {
    stores: Mutex<Stores>,
    clock: Arc<dyn Clock>,
    sink: Arc<dyn EventSink>,
    report_offset: FixedOffset,
}

impl Engine {
    /// Create an engine over the given store and archive
    pub fn new(
        timers: Box<dyn TimerStore>,
        archive: Box<dyn CompletedArchive>,
        clock: Arc<dyn Clock>,
        sink: Arc<dyn EventSink>,
    ) -> Self {
        Self {
            stores: Mutex::new(Stores { timers, archive }),
            clock,
            sink,
            report_offset: Utc.fix(),
        }
    }

    /// Engine over in-memory stores
    pub fn in_memory(clock: Arc<dyn Clock>, sink: Arc<dyn EventSink>) -> Self {
        Self::new(
            Box::new(MemoryTimerStore::new()),
            Box::new(MemoryArchive::new()),
            clock,
            sink,
        )
    }

    /// Offset used to derive the calendar date of archived records
    pub fn with_report_offset(mut self, offset: FixedOffset) -> Self {
        self.report_offset = offset;
        self
    }

    fn lock(&self) -> Result<MutexGuard<'_, Stores>, EngineError> {
        self.stores
            .lock()
            .map_err(|_| EngineError::Store(StoreError::Poisoned))
    }

    // ── Lifecycle ───────────────────────────────────────────────────

    /// Inspect the stored population before serving commands
    ///
    /// Running timers keep their open block and resume accounting from
    /// `lastStartedAt` on the next tick. Returns the population size.
    pub fn init(&self) -> Result<usize, EngineError> {
        let stores = self.lock()?;
        let timers = stores.timers.list()?;

        for timer in &timers {
            if let Err(anomaly) = timer.check_consistency() {
                warn!("Stored timer {} (badge {}) is inconsistent: {}", timer.id(), timer.badge(), anomaly);
            } else if let (TimerStatus::Running, Some(since)) = (timer.status(), timer.last_started_at()) {
                info!("Resuming timer {} (badge {}) running since {}", timer.id(), timer.badge(), since);
            }
        }

        info!("Engine initialized with {} timers", timers.len());
        Ok(timers.len())
    }

    /// Flush both stores; open blocks stay open
    pub fn close(&self) -> Result<(), EngineError> {
        let mut stores = self.lock()?;
        stores.timers.flush()?;
        stores.archive.flush()?;
        info!("Engine closed");
        Ok(())
    }

    // ── Commands ────────────────────────────────────────────────────

    pub fn create(&self, badge: &str, duration_ms: u64) -> Result<Timer, EngineError> {
        let badge = badge.trim();
        if badge.is_empty() {
            return Err(EngineError::InvalidBadge);
        }
        if duration_ms == 0 {
            return Err(EngineError::InvalidDuration);
        }

        let mut stores = self.lock()?;
        let timer = Timer::new(
            Uuid::new_v4().to_string(),
            badge.to_string(),
            duration_ms,
            self.clock.now(),
        );
        stores.timers.put(timer.clone())?;

        info!("Created timer {} for badge {} ({}ms)", timer.id(), timer.badge(), duration_ms);
        self.sink.publish(&TimerEvent::Created(timer.clone()));
        Ok(timer)
    }

    pub fn start(&self, id: &str) -> Result<Timer, EngineError> {
        self.apply(id, |timer, now| {
            if timer.duration == 0 {
                return Err(EngineError::InvalidDuration);
            }
            if timer.elapsed >= timer.duration {
                return Err(EngineError::AlreadyExpired(timer.id.clone()));
            }

            let transition = match timer.status() {
                TimerStatus::Created | TimerStatus::Canceled => Transition::Started,
                TimerStatus::Paused => Transition::Resumed,
                from @ (TimerStatus::Running | TimerStatus::Completed) => {
                    return Err(EngineError::InvalidTransition {
                        from,
                        command: Command::Start,
                    })
                }
            };
            if timer.open_block().is_some() {
                return Err(EngineError::InvalidTransition {
                    from: timer.status,
                    command: Command::Start,
                });
            }

            timer.begin_block(now);
            Ok(transition)
        })
    }

    pub fn pause(&self, id: &str) -> Result<Timer, EngineError> {
        self.apply(id, |timer, now| {
            if timer.status != TimerStatus::Running || timer.open_block().is_none() {
                return Err(EngineError::InvalidTransition {
                    from: timer.status,
                    command: Command::Pause,
                });
            }

            if timer.live_elapsed(now) >= timer.duration {
                timer.complete();
                return Ok(Transition::Completed);
            }

            timer.close_block(now);
            timer.status = TimerStatus::Paused;
            Ok(Transition::Paused)
        })
    }

    /// Cancel a running or paused timer; no archive record is written
    pub fn stop(&self, id: &str) -> Result<Timer, EngineError> {
        self.apply(id, |timer, now| {
            match timer.status() {
                TimerStatus::Running if timer.open_block().is_some() => {
                    if timer.live_elapsed(now) >= timer.duration {
                        timer.complete();
                        return Ok(Transition::Completed);
                    }
                    timer.close_block(now);
                }
                TimerStatus::Paused => {
                    if timer.open_block().is_some() {
                        timer.close_block(now);
                    }
                }
                from => {
                    return Err(EngineError::InvalidTransition {
                        from,
                        command: Command::Stop,
                    })
                }
            }

            timer.status = TimerStatus::Canceled;
            Ok(Transition::Stopped)
        })
    }

    /// Discard all progress; confirmation belongs to the caller
    pub fn reset(&self, id: &str) -> Result<Timer, EngineError> {
        self.apply(id, |timer, _now| {
            timer.reset();
            Ok(Transition::Reset)
        })
    }

    pub fn delete(&self, id: &str) -> Result<Timer, EngineError> {
        let mut stores = self.lock()?;
        let removed = stores
            .timers
            .remove(id)?
            .ok_or_else(|| EngineError::NotFound(id.to_string()))?;

        info!("Deleted timer {} (badge {})", removed.id(), removed.badge());
        self.sink.publish(&TimerEvent::Deleted(removed.clone()));
        Ok(removed)
    }

    /// Remove every COMPLETED timer from the live store; the archive keeps its records
    pub fn clear_completed(&self) -> Result<usize, EngineError> {
        let mut stores = self.lock()?;
        let completed = stores.timers.list_by_status(TimerStatus::Completed)?;

        for timer in &completed {
            if let Some(removed) = stores.timers.remove(timer.id())? {
                self.sink.publish(&TimerEvent::Deleted(removed));
            }
        }

        info!("Cleared {} completed timers", completed.len());
        Ok(completed.len())
    }

    /// Load a timer, mutate a copy, persist, archive on completion, publish
    fn apply<F>(&self, id: &str, mutate: F) -> Result<Timer, EngineError>
    where
        F: FnOnce(&mut Timer, DateTime<Utc>) -> Result<Transition, EngineError>,
    {
        let mut stores = self.lock()?;
        let mut timer = stores
            .timers
            .get(id)?
            .ok_or_else(|| EngineError::NotFound(id.to_string()))?;

        let now = self.clock.now();
        self.warn_on_clock_skew(&timer, now);
        let transition = mutate(&mut timer, now)?;

        // Timer first: a failed save must not leave an archive record behind
        stores.timers.put(timer.clone())?;
        if transition == Transition::Completed {
            let record = CompletedTimerRecord::from_timer(&timer, now, self.report_offset);
            stores.archive.append(record)?;
        }

        info!("Timer {} (badge {}) {:?} -> {}", timer.id(), timer.badge(), transition, timer.status());
        self.sink.publish(&transition.into_event(timer.clone()));
        Ok(timer)
    }

    // ── Tick ────────────────────────────────────────────────────────

    /// Advance every running timer and complete the ones that ran out
    ///
    /// Inconsistent timers are logged and skipped so the rest of the
    /// population is still processed.
    pub fn tick(&self) -> Result<TickReport, EngineError> {
        let mut stores = self.lock()?;
        let now = self.clock.now();
        let mut population = stores.timers.list()?;

        let mut report = TickReport::default();
        let mut changed = Vec::new();
        let mut completed = Vec::new();

        for timer in population.iter_mut() {
            if timer.status() != TimerStatus::Running {
                continue;
            }
            if let Err(anomaly) = timer.check_consistency() {
                warn!("Skipping timer {} (badge {}) during tick: {}", timer.id(), timer.badge(), anomaly);
                report.skipped += 1;
                continue;
            }
            self.warn_on_clock_skew(timer, now);

            if timer.live_elapsed(now) >= timer.duration() {
                timer.complete();
                report.completed += 1;
                completed.push(timer.clone());
            } else {
                timer.refresh(now);
                report.advanced += 1;
            }
            changed.push(timer.clone());
        }

        if changed.is_empty() {
            return Ok(report);
        }

        stores.timers.put_many(&changed)?;
        for timer in &completed {
            let record = CompletedTimerRecord::from_timer(timer, now, self.report_offset);
            stores.archive.append(record)?;
        }

        for timer in completed {
            info!("Timer {} (badge {}) completed", timer.id(), timer.badge());
            self.sink.publish(&TimerEvent::Completed(timer));
        }
        self.sink.publish(&TimerEvent::Tick(population));

        debug!(
            "Tick: {} advanced, {} completed, {} skipped",
            report.advanced, report.completed, report.skipped
        );
        Ok(report)
    }

    fn warn_on_clock_skew(&self, timer: &Timer, now: DateTime<Utc>) {
        if let Some(since) = timer.last_started_at().filter(|since| *since > now) {
            warn!("Clock is behind timer {} start ({} > {}), counting no time", timer.id(), since, now);
        }
    }

    // ── Queries ─────────────────────────────────────────────────────

    pub fn list(&self) -> Result<Vec<Timer>, EngineError> {
        Ok(self.lock()?.timers.list()?)
    }

    pub fn get(&self, id: &str) -> Result<Timer, EngineError> {
        self.lock()?
            .timers
            .get(id)?
            .ok_or_else(|| EngineError::NotFound(id.to_string()))
    }

    pub fn stats(&self) -> Result<StatsSnapshot, EngineError> {
        Ok(StatsSnapshot::from_timers(&self.list()?))
    }

    pub fn archive_query(&self, query: &ArchiveQuery) -> Result<Vec<CompletedTimerRecord>, EngineError> {
        Ok(self.lock()?.archive.query(query)?)
    }

    pub fn archived(&self) -> Result<Vec<CompletedTimerRecord>, EngineError> {
        Ok(self.lock()?.archive.list_all()?)
    }
}
