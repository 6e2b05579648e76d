//! Lifecycle events and the sinks that receive them

use serde::Serialize;
use tokio::sync::broadcast;
use tracing::debug;

use crate::state::Timer;

/// A state change published by the engine
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "event", content = "data")]
pub enum TimerEvent {
    #[serde(rename = "timer.created")]
    Created(Timer),
    #[serde(rename = "timer.started")]
    Started(Timer),
    #[serde(rename = "timer.paused")]
    Paused(Timer),
    #[serde(rename = "timer.resumed")]
    Resumed(Timer),
    #[serde(rename = "timer.stopped")]
    Stopped(Timer),
    #[serde(rename = "timer.completed")]
    Completed(Timer),
    #[serde(rename = "timer.reset")]
    Reset(Timer),
    #[serde(rename = "timer.deleted")]
    Deleted(Timer),
    /// Full population after a tick pass
    #[serde(rename = "timers.tick")]
    Tick(Vec<Timer>),
}

impl TimerEvent {
    /// Wire name of the event
    pub fn name(&self) -> &'static str {
        match self {
            TimerEvent::Created(_) => "timer.created",
            TimerEvent::Started(_) => "timer.started",
            TimerEvent::Paused(_) => "timer.paused",
            TimerEvent::Resumed(_) => "timer.resumed",
            TimerEvent::Stopped(_) => "timer.stopped",
            TimerEvent::Completed(_) => "timer.completed",
            TimerEvent::Reset(_) => "timer.reset",
            TimerEvent::Deleted(_) => "timer.deleted",
            TimerEvent::Tick(_) => "timers.tick",
        }
    }

    /// The affected timer, or `None` for a tick
    pub fn timer(&self) -> Option<&Timer> {
        match self {
            TimerEvent::Created(t)
            | TimerEvent::Started(t)
            | TimerEvent::Paused(t)
            | TimerEvent::Resumed(t)
            | TimerEvent::Stopped(t)
            | TimerEvent::Completed(t)
            | TimerEvent::Reset(t)
            | TimerEvent::Deleted(t) => Some(t),
            TimerEvent::Tick(_) => None,
        }
    }

    /// JSON payload without the event name
    pub fn data(&self) -> serde_json::Result<String> {
        match self {
            TimerEvent::Tick(timers) => serde_json::to_string(timers),
            other => serde_json::to_string(&other.timer()),
        }
    }
}

/// Receives events synchronously, in mutation order
///
/// `publish` runs while the engine holds its lock. An implementation must
/// not call back into the `Engine` that owns it or the call deadlocks.
/// Hand the event to a channel instead, as `BroadcastSink` does, and react
/// to it on another task.
pub trait EventSink: Send + Sync {
    fn publish(&self, event: &TimerEvent);
}

impl<F> EventSink for F
where
    F: Fn(&TimerEvent) + Send + Sync,
{
    fn publish(&self, event: &TimerEvent) {
        self(event)
    }
}

/// Discards every event
#[derive(Debug, Clone, Copy, Default)]
pub struct NullSink;

impl EventSink for NullSink {
    fn publish(&self, _event: &TimerEvent) {}
}

/// Fans events out to transport subscribers
#[derive(Debug, Clone)]
pub struct BroadcastSink {
    tx: broadcast::Sender<TimerEvent>,
}

impl BroadcastSink {
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity.max(1));
        Self { tx }
    }

    pub fn sender(&self) -> broadcast::Sender<TimerEvent> {
        self.tx.clone()
    }

    pub fn subscribe(&self) -> broadcast::Receiver<TimerEvent> {
        self.tx.subscribe()
    }
}

impl EventSink for BroadcastSink {
    fn publish(&self, event: &TimerEvent) {
        // No subscribers is the normal idle case
        if self.tx.send(event.clone()).is_err() {
            debug!("No subscribers for {}", event.name());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};

    fn timer() -> Timer {
        let created = Utc.with_ymd_and_hms(2024, 3, 10, 9, 0, 0).unwrap();
        Timer::new("t-1".into(), "A15".into(), 60_000, created)
    }

    #[test]
    fn serialized_tag_matches_wire_name() {
        let events = [
            TimerEvent::Created(timer()),
            TimerEvent::Completed(timer()),
            TimerEvent::Tick(vec![timer()]),
        ];
        for event in events {
            let value = serde_json::to_value(&event).unwrap();
            assert_eq!(value["event"], event.name());
        }
    }

    #[test]
    fn tick_payload_is_the_population() {
        let data = TimerEvent::Tick(vec![timer(), timer()]).data().unwrap();
        let value: serde_json::Value = serde_json::from_str(&data).unwrap();
        assert_eq!(value.as_array().map(Vec::len), Some(2));
    }

    #[tokio::test]
    async fn broadcast_sink_delivers_to_subscribers() {
        let sink = BroadcastSink::new(8);
        let mut rx = sink.subscribe();

        sink.publish(&TimerEvent::Started(timer()));
        let received = rx.recv().await.unwrap();
        assert_eq!(received.name(), "timer.started");
        assert_eq!(received.timer().map(|t| t.id()), Some("t-1"));
    }
}
