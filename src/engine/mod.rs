//! Timer lifecycle engine module
//! 
//! This module contains the state machine, its error taxonomy and the
//! event interface consumed by delivery transports.

pub mod error;
pub mod events;
pub mod lifecycle;

// Re-export main types
pub use error::{Command, EngineError};
pub use events::{BroadcastSink, EventSink, NullSink, TimerEvent};
pub use lifecycle::{Engine, TickReport};
