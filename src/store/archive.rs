//! Completed-timer records and report queries over them

use std::cmp::Ordering;

use chrono::{DateTime, FixedOffset, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use crate::state::{Timer, TimerId};

/// Immutable summary of a timer that ran to completion
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CompletedTimerRecord {
    pub id: TimerId,
    pub badge: String,
    /// Allotted time in milliseconds
    pub duration: u64,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    pub total_elapsed_minutes: u64,
    /// Calendar date of `start_time`, used for report grouping
    pub date: NaiveDate,
    pub archived_at: DateTime<Utc>,
}

impl CompletedTimerRecord {
    /// Summarize a completed timer
    ///
    /// `offset` decides which calendar day `start_time` falls on.
    pub fn from_timer(timer: &Timer, archived_at: DateTime<Utc>, offset: FixedOffset) -> Self {
        let history = timer.history();
        let start_time = history
            .first()
            .map(|block| block.started_at)
            .unwrap_or_else(|| timer.created_at());
        let end_time = history
            .last()
            .and_then(|block| block.ended_at)
            .unwrap_or(archived_at);

        Self {
            id: timer.id().to_string(),
            badge: timer.badge().to_string(),
            duration: timer.duration(),
            start_time,
            end_time,
            total_elapsed_minutes: timer.history_elapsed() / 60_000,
            date: start_time.with_timezone(&offset).date_naive(),
            archived_at,
        }
    }
}

/// Sort key for report listings
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ArchiveSort {
    Date,
    Badge,
    Duration,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortOrder {
    Asc,
    /// Newest or largest first, as report listings show by default
    #[default]
    Desc,
}

/// Report filter over archived records
///
/// Field names double as HTTP query parameters (`badge`, `from`, `to`,
/// `sort`, `order`).
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ArchiveQuery {
    /// Case-insensitive badge substring
    pub badge: Option<String>,
    /// Inclusive lower bound on the record's calendar date
    #[serde(rename = "from")]
    pub date_from: Option<NaiveDate>,
    /// Inclusive upper bound on the record's calendar date
    #[serde(rename = "to")]
    pub date_to: Option<NaiveDate>,
    /// Insertion order is kept when unset
    pub sort: Option<ArchiveSort>,
    pub order: SortOrder,
}

impl ArchiveQuery {
    pub fn badge(mut self, badge: impl Into<String>) -> Self {
        self.badge = Some(badge.into());
        self
    }

    pub fn between(mut self, from: Option<NaiveDate>, to: Option<NaiveDate>) -> Self {
        self.date_from = from;
        self.date_to = to;
        self
    }

    pub fn sorted_by(mut self, sort: ArchiveSort, order: SortOrder) -> Self {
        self.sort = Some(sort);
        self.order = order;
        self
    }

    pub fn matches(&self, record: &CompletedTimerRecord) -> bool {
        let badge_ok = match self.badge.as_deref().map(str::trim) {
            Some(needle) if !needle.is_empty() => record
                .badge
                .to_lowercase()
                .contains(&needle.to_lowercase()),
            _ => true,
        };
        let from_ok = self.date_from.map_or(true, |from| record.date >= from);
        let to_ok = self.date_to.map_or(true, |to| record.date <= to);

        badge_ok && from_ok && to_ok
    }

    /// Filter then sort a record listing
    pub fn apply(&self, records: Vec<CompletedTimerRecord>) -> Vec<CompletedTimerRecord> {
        let mut selected: Vec<_> = records.into_iter().filter(|r| self.matches(r)).collect();

        if let Some(sort) = self.sort {
            selected.sort_by(|a, b| {
                let ordering = compare(sort, a, b);
                match self.order {
                    SortOrder::Asc => ordering,
                    SortOrder::Desc => ordering.reverse(),
                }
            });
        }

        selected
    }
}

fn compare(sort: ArchiveSort, a: &CompletedTimerRecord, b: &CompletedTimerRecord) -> Ordering {
    match sort {
        ArchiveSort::Date => a.date.cmp(&b.date).then(a.start_time.cmp(&b.start_time)),
        ArchiveSort::Badge => a.badge.to_lowercase().cmp(&b.badge.to_lowercase()),
        ArchiveSort::Duration => a.total_elapsed_minutes.cmp(&b.total_elapsed_minutes),
    }
}
