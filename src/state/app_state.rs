//! Main application state management

use std::{
    sync::Arc,
    time::Instant,
};
use tokio::sync::broadcast;

use crate::engine::{Engine, TimerEvent};

/// Shared state handed to every HTTP handler
pub struct AppState {
    /// The timer lifecycle engine
    pub engine: Arc<Engine>,
    /// Sender side of the engine's broadcast sink
    pub events_tx: broadcast::Sender<TimerEvent>,
    /// Server metadata
    pub start_time: Instant,
    pub port: u16,
    pub host: String,
}

impl AppState {
    /// Create a new AppState around a running engine
    pub fn new(
        engine: Arc<Engine>,
        events_tx: broadcast::Sender<TimerEvent>,
        port: u16,
        host: String,
    ) -> Self {
        Self {
            engine,
            events_tx,
            start_time: Instant::now(),
            port,
            host,
        }
    }

    /// Subscribe to engine events
    pub fn subscribe(&self) -> broadcast::Receiver<TimerEvent> {
        self.events_tx.subscribe()
    }

    /// Calculate server uptime as a formatted string
    pub fn get_uptime(&self) -> String {
        let duration = self.start_time.elapsed();
        let hours = duration.as_secs() / 3600;
        let minutes = (duration.as_secs() % 3600) / 60;
        let seconds = duration.as_secs() % 60;
        
        if hours > 0 {
            format!("{}h {}m {}s", hours, minutes, seconds)
        } else if minutes > 0 {
            format!("{}m {}s", minutes, seconds)
        } else {
            format!("{}s", seconds)
        }
    }
}
