//! Badge Timers - A state-managed HTTP server for per-badge countdown timers
//! 
//! This library provides the timer lifecycle engine (state machine, history
//! accounting, periodic tick), live statistics, the completed-timer archive
//! and a thin HTTP surface over them.

pub mod config;
pub mod engine;
pub mod state;
pub mod store;
pub mod api;
pub mod tasks;
pub mod utils;

// Re-export commonly used types
pub use config::Config;
pub use engine::{Engine, EngineError, EventSink, TickReport, TimerEvent};
pub use state::{AppState, StatsSnapshot, Timer, TimerStatus};
pub use store::{ArchiveQuery, CompletedTimerRecord};
pub use api::create_router;
pub use utils::signals::shutdown_signal;
