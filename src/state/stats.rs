//! Live statistics over the current timer population

use serde::{Deserialize, Serialize};

use super::{Timer, TimerStatus};

/// Counts by status and duration aggregates
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StatsSnapshot {
    pub created: usize,
    pub running: usize,
    pub paused: usize,
    pub completed: usize,
    pub canceled: usize,
    /// CREATED plus CANCELED, the dashboard's "stopped" counter
    pub stopped: usize,
    pub total: usize,
    /// Sum of all durations in hours, one decimal
    pub total_time_hours: f64,
    /// Mean duration in whole minutes, 0 for an empty population
    pub average_time: u64,
}

impl StatsSnapshot {
    /// Aggregate a timer population without touching it
    pub fn from_timers(timers: &[Timer]) -> Self {
        let mut stats = Self {
            total: timers.len(),
            ..Self::default()
        };

        let mut duration_ms: u64 = 0;
        for timer in timers {
            match timer.status() {
                TimerStatus::Created => stats.created += 1,
                TimerStatus::Running => stats.running += 1,
                TimerStatus::Paused => stats.paused += 1,
                TimerStatus::Completed => stats.completed += 1,
                TimerStatus::Canceled => stats.canceled += 1,
            }
            duration_ms = duration_ms.saturating_add(timer.duration());
        }
        stats.stopped = stats.created + stats.canceled;

        let total_minutes = duration_ms as f64 / 60_000.0;
        stats.total_time_hours = (total_minutes / 60.0 * 10.0).round() / 10.0;
        if stats.total > 0 {
            stats.average_time = (total_minutes / stats.total as f64).round() as u64;
        }

        stats
    }

    pub fn count(&self, status: TimerStatus) -> usize {
        match status {
            TimerStatus::Created => self.created,
            TimerStatus::Running => self.running,
            TimerStatus::Paused => self.paused,
            TimerStatus::Completed => self.completed,
            TimerStatus::Canceled => self.canceled,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};

    fn timer(id: &str, minutes: u64, status: TimerStatus) -> Timer {
        let created = Utc.with_ymd_and_hms(2024, 3, 10, 9, 0, 0).unwrap();
        let mut timer = Timer::new(id.to_string(), id.to_string(), minutes * 60_000, created);
        timer.status = status;
        timer
    }

    #[test]
    fn empty_population_is_all_zero() {
        let stats = StatsSnapshot::from_timers(&[]);
        assert_eq!(stats, StatsSnapshot::default());
        assert_eq!(stats.average_time, 0);
        assert_eq!(stats.total_time_hours, 0.0);
    }

    #[test]
    fn counts_and_duration_aggregates() {
        let timers = vec![
            timer("a", 30, TimerStatus::Running),
            timer("b", 45, TimerStatus::Paused),
            timer("c", 20, TimerStatus::Completed),
            timer("d", 10, TimerStatus::Created),
            timer("e", 15, TimerStatus::Canceled),
        ];
        let stats = StatsSnapshot::from_timers(&timers);

        assert_eq!(stats.total, 5);
        assert_eq!(stats.running, 1);
        assert_eq!(stats.paused, 1);
        assert_eq!(stats.completed, 1);
        assert_eq!(stats.stopped, 2);
        for status in TimerStatus::ALL {
            assert_eq!(stats.count(status), 1);
        }
        // 120 minutes in total
        assert_eq!(stats.total_time_hours, 2.0);
        assert_eq!(stats.average_time, 24);
    }

    #[test]
    fn hours_round_to_one_decimal_and_average_to_nearest_minute() {
        let timers = vec![
            timer("a", 25, TimerStatus::Created),
            timer("b", 20, TimerStatus::Created),
        ];
        let stats = StatsSnapshot::from_timers(&timers);

        // 45 minutes = 0.75h
        assert_eq!(stats.total_time_hours, 0.8);
        assert_eq!(stats.average_time, 23);
    }
}
