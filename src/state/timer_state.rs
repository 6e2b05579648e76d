//! Timer entity, history blocks and status vocabulary
//!
//! Elapsed time is always derived from block timestamps, never from a
//! decremented countdown, so accounting stays correct across suspended
//! execution and irregular tick spacing.

use std::fmt;

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Opaque timer identifier
pub type TimerId = String;

/// Lifecycle status of a timer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TimerStatus {
    Created,
    Running,
    Paused,
    Completed,
    Canceled,
}

impl TimerStatus {
    pub const ALL: [TimerStatus; 5] = [
        TimerStatus::Created,
        TimerStatus::Running,
        TimerStatus::Paused,
        TimerStatus::Completed,
        TimerStatus::Canceled,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            TimerStatus::Created => "CREATED",
            TimerStatus::Running => "RUNNING",
            TimerStatus::Paused => "PAUSED",
            TimerStatus::Completed => "COMPLETED",
            TimerStatus::Canceled => "CANCELED",
        }
    }

    /// COMPLETED and CANCELED end a session
    pub fn is_terminal(&self) -> bool {
        matches!(self, TimerStatus::Completed | TimerStatus::Canceled)
    }
}

impl fmt::Display for TimerStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One contiguous interval during which a timer was running
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HistoryBlock {
    pub started_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ended_at: Option<DateTime<Utc>>,
    /// Active milliseconds in this block; a snapshot while the block is open
    pub elapsed: u64,
}

impl HistoryBlock {
    /// Create an open block starting at the given instant
    pub fn open(started_at: DateTime<Utc>) -> Self {
        Self {
            started_at,
            ended_at: None,
            elapsed: 0,
        }
    }

    pub fn is_open(&self) -> bool {
        self.ended_at.is_none()
    }
}

/// Structural problems a stored timer can carry
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TimerAnomaly {
    #[error("duration is zero")]
    ZeroDuration,
    #[error("elapsed {elapsed}ms exceeds duration {duration}ms")]
    ElapsedOverflow { elapsed: u64, duration: u64 },
    #[error("history has {0} open blocks")]
    MultipleOpenBlocks(usize),
    #[error("open block is not the last history entry")]
    OpenBlockNotLast,
    #[error("status is RUNNING but no history block is open")]
    RunningWithoutOpenBlock,
    #[error("status is {0} but a history block is still open")]
    OpenBlockWhileIdle(TimerStatus),
    #[error("lastStartedAt does not match the open block")]
    StartMismatch,
}

/// A per-badge countdown timer
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Timer {
    pub(crate) id: TimerId,
    pub(crate) badge: String,
    pub(crate) duration: u64,
    pub(crate) elapsed: u64,
    pub(crate) status: TimerStatus,
    #[serde(default)]
    pub(crate) history: Vec<HistoryBlock>,
    pub(crate) created_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub(crate) started_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub(crate) last_started_at: Option<DateTime<Utc>>,
}

impl Timer {
    /// Create a fresh timer in the CREATED state
    pub(crate) fn new(id: TimerId, badge: String, duration: u64, created_at: DateTime<Utc>) -> Self {
        Self {
            id,
            badge,
            duration,
            elapsed: 0,
            status: TimerStatus::Created,
            history: Vec::new(),
            created_at,
            started_at: None,
            last_started_at: None,
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn badge(&self) -> &str {
        &self.badge
    }

    /// Allotted time in milliseconds
    pub fn duration(&self) -> u64 {
        self.duration
    }

    /// Consumed time in milliseconds as of the last mutation or tick
    pub fn elapsed(&self) -> u64 {
        self.elapsed
    }

    pub fn remaining(&self) -> u64 {
        self.duration.saturating_sub(self.elapsed)
    }

    pub fn status(&self) -> TimerStatus {
        self.status
    }

    pub fn history(&self) -> &[HistoryBlock] {
        &self.history
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    pub fn started_at(&self) -> Option<DateTime<Utc>> {
        self.started_at
    }

    pub fn last_started_at(&self) -> Option<DateTime<Utc>> {
        self.last_started_at
    }

    /// The currently open block, if any
    pub fn open_block(&self) -> Option<&HistoryBlock> {
        self.history.last().filter(|block| block.is_open())
    }

    /// Sum of elapsed time over closed blocks
    pub fn closed_elapsed(&self) -> u64 {
        self.history
            .iter()
            .filter(|block| !block.is_open())
            .map(|block| block.elapsed)
            .sum()
    }

    /// Sum of elapsed time over every block, as recorded
    pub fn history_elapsed(&self) -> u64 {
        self.history.iter().map(|block| block.elapsed).sum()
    }

    /// Elapsed time at `now`, unclamped
    pub fn live_elapsed(&self, now: DateTime<Utc>) -> u64 {
        let open = self
            .open_block()
            .map(|block| millis_between(block.started_at, now))
            .unwrap_or(0);
        self.closed_elapsed().saturating_add(open)
    }

    /// Check the structural invariants between status, history and counters
    pub fn check_consistency(&self) -> Result<(), TimerAnomaly> {
        if self.duration == 0 {
            return Err(TimerAnomaly::ZeroDuration);
        }
        if self.elapsed > self.duration {
            return Err(TimerAnomaly::ElapsedOverflow {
                elapsed: self.elapsed,
                duration: self.duration,
            });
        }

        let open_count = self.history.iter().filter(|block| block.is_open()).count();
        if open_count > 1 {
            return Err(TimerAnomaly::MultipleOpenBlocks(open_count));
        }
        if open_count == 1 && self.open_block().is_none() {
            return Err(TimerAnomaly::OpenBlockNotLast);
        }

        match (self.status, self.open_block()) {
            (TimerStatus::Running, None) => Err(TimerAnomaly::RunningWithoutOpenBlock),
            (TimerStatus::Running, Some(block)) => {
                if self.last_started_at != Some(block.started_at) {
                    Err(TimerAnomaly::StartMismatch)
                } else {
                    Ok(())
                }
            }
            (status, Some(_)) => Err(TimerAnomaly::OpenBlockWhileIdle(status)),
            (_, None) => Ok(()),
        }
    }

    /// Open a new block and mark the timer running
    pub(crate) fn begin_block(&mut self, now: DateTime<Utc>) {
        self.history.push(HistoryBlock::open(now));
        self.started_at.get_or_insert(now);
        self.last_started_at = Some(now);
        self.status = TimerStatus::Running;
    }

    /// Refresh the open block's snapshot and the timer's elapsed counter
    pub(crate) fn refresh(&mut self, now: DateTime<Utc>) {
        let closed = self.closed_elapsed();
        if let Some(block) = self.history.last_mut().filter(|block| block.is_open()) {
            block.elapsed = millis_between(block.started_at, now);
            self.elapsed = closed.saturating_add(block.elapsed).min(self.duration);
        }
    }

    /// Close the open block at `now`; the caller sets the resulting status
    pub(crate) fn close_block(&mut self, now: DateTime<Utc>) {
        let closed = self.closed_elapsed();
        if let Some(block) = self.history.last_mut().filter(|block| block.is_open()) {
            block.elapsed = millis_between(block.started_at, now);
            block.ended_at = Some(now);
            self.elapsed = closed.saturating_add(block.elapsed).min(self.duration);
        }
        self.last_started_at = None;
    }

    /// Close the open block at the exact expiry instant and mark the timer completed
    ///
    /// The closing block is clamped so the whole history sums to `duration`.
    pub(crate) fn complete(&mut self) {
        let closed = self.closed_elapsed();
        let allowance = self.duration.saturating_sub(closed);
        if let Some(block) = self.history.last_mut().filter(|block| block.is_open()) {
            block.elapsed = allowance;
            block.ended_at = Some(block.started_at + millis(allowance));
        }
        self.elapsed = self.duration;
        self.last_started_at = None;
        self.status = TimerStatus::Completed;
    }

    /// Back to CREATED with no history; duration is kept
    pub(crate) fn reset(&mut self) {
        self.elapsed = 0;
        self.history.clear();
        self.started_at = None;
        self.last_started_at = None;
        self.status = TimerStatus::Created;
    }
}

/// Milliseconds from `from` to `to`, zero when the clock went backwards
pub fn millis_between(from: DateTime<Utc>, to: DateTime<Utc>) -> u64 {
    u64::try_from((to - from).num_milliseconds()).unwrap_or(0)
}

fn millis(ms: u64) -> Duration {
    Duration::milliseconds(i64::try_from(ms).unwrap_or(i64::MAX))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn at(ms: i64) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 3, 10, 9, 0, 0).unwrap() + Duration::milliseconds(ms)
    }

    fn timer(duration: u64) -> Timer {
        Timer::new("t-1".to_string(), "A15".to_string(), duration, at(0))
    }

    #[test]
    fn status_serializes_as_upper_case_name() {
        for status in TimerStatus::ALL {
            let json = serde_json::to_string(&status).unwrap();
            assert_eq!(json, format!("\"{}\"", status.as_str()));
            let back: TimerStatus = serde_json::from_str(&json).unwrap();
            assert_eq!(back, status);
        }
    }

    #[test]
    fn live_elapsed_adds_open_block_to_closed_sum() {
        let mut t = timer(10_000);
        t.begin_block(at(0));
        t.close_block(at(1_000));
        t.begin_block(at(5_000));

        assert_eq!(t.closed_elapsed(), 1_000);
        assert_eq!(t.live_elapsed(at(5_500)), 1_500);
    }

    #[test]
    fn backwards_clock_yields_zero_delta() {
        let mut t = timer(10_000);
        t.begin_block(at(1_000));
        assert_eq!(t.live_elapsed(at(0)), 0);
        t.refresh(at(0));
        assert_eq!(t.elapsed(), 0);
    }

    #[test]
    fn complete_clamps_to_duration_and_ends_at_expiry() {
        let mut t = timer(5_000);
        t.begin_block(at(0));
        t.close_block(at(4_000));
        t.begin_block(at(10_000));
        t.complete();

        assert_eq!(t.status(), TimerStatus::Completed);
        assert_eq!(t.elapsed(), 5_000);
        assert_eq!(t.history_elapsed(), 5_000);
        assert_eq!(t.history()[1].ended_at, Some(at(11_000)));
        assert!(t.open_block().is_none());
        assert!(t.check_consistency().is_ok());
    }

    #[test]
    fn consistency_flags_running_without_block() {
        let mut t = timer(5_000);
        t.status = TimerStatus::Running;
        assert_eq!(t.check_consistency(), Err(TimerAnomaly::RunningWithoutOpenBlock));

        let mut t = timer(5_000);
        t.history.push(HistoryBlock::open(at(0)));
        assert_eq!(
            t.check_consistency(),
            Err(TimerAnomaly::OpenBlockWhileIdle(TimerStatus::Created))
        );
    }

    #[test]
    fn timer_round_trips_through_json_with_millisecond_timestamps() {
        let mut t = timer(60_000);
        t.begin_block(at(123));
        t.close_block(at(4_567));
        t.status = TimerStatus::Paused;

        let json = serde_json::to_string(&t).unwrap();
        assert!(json.contains("\"status\":\"PAUSED\""));
        let back: Timer = serde_json::from_str(&json).unwrap();
        assert_eq!(back, t);
        assert_eq!(back.history()[0].ended_at, Some(at(4_567)));
    }
}
