//! State management module
//! 
//! This module contains the timer entity, live statistics and the shared
//! application state handed to the HTTP layer.

pub mod app_state;
pub mod stats;
pub mod timer_state;

// Re-export main types
pub use app_state::AppState;
pub use stats::StatsSnapshot;
pub use timer_state::{HistoryBlock, Timer, TimerAnomaly, TimerId, TimerStatus};
