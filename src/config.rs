//! Configuration and CLI argument handling

use std::{path::PathBuf, time::Duration};

use chrono::FixedOffset;
use clap::Parser;

/// CLI argument parsing structure
#[derive(Debug, Parser)]
#[command(name = "badge-timers")]
#[command(about = "A state-managed HTTP server tracking per-badge countdown timers")]
#[command(version)]
pub struct Config {
    /// Port to bind the server to
    #[arg(short, long, default_value = "20554")]
    pub port: u16,

    /// Host address to bind to
    #[arg(long, default_value = "0.0.0.0")]
    pub host: String,

    /// Tick period in milliseconds
    #[arg(long = "tick-ms", default_value = "1000", value_parser = clap::value_parser!(u64).range(1..))]
    pub tick_ms: u64,

    /// Directory for timers.json and completed.jsonl; timers are kept in memory when unset
    #[arg(short, long)]
    pub data_dir: Option<PathBuf>,

    /// Offset from UTC, in minutes, used to date completed-timer records
    #[arg(long, default_value = "0", allow_negative_numbers = true)]
    pub utc_offset_minutes: i32,

    /// Capacity of the event broadcast channel
    #[arg(long, default_value = "256")]
    pub event_buffer: usize,

    /// Enable verbose logging
    #[arg(short, long)]
    pub verbose: bool,
}

impl Config {
    /// Parse configuration from command line arguments
    pub fn parse() -> Self {
        Parser::parse()
    }

    /// Get the server address as a formatted string
    pub fn address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// Get the appropriate log level based on verbose flag
    pub fn log_level(&self) -> &'static str {
        if self.verbose { "debug" } else { "info" }
    }

    pub fn tick_interval(&self) -> Duration {
        Duration::from_millis(self.tick_ms)
    }

    /// Report offset, `None` when out of chrono's ±24h range
    pub fn report_offset(&self) -> Option<FixedOffset> {
        self.utc_offset_minutes
            .checked_mul(60)
            .and_then(FixedOffset::east_opt)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_use_memory_stores_and_one_second_ticks() {
        let config = Config::try_parse_from(["badge-timers"]).unwrap();
        assert_eq!(config.address(), "0.0.0.0:20554");
        assert_eq!(config.tick_interval(), Duration::from_secs(1));
        assert!(config.data_dir.is_none());
        assert_eq!(config.report_offset(), FixedOffset::east_opt(0));
        assert_eq!(config.log_level(), "info");
    }

    #[test]
    fn negative_offset_and_zero_tick_handling() {
        let config =
            Config::try_parse_from(["badge-timers", "--utc-offset-minutes", "-180", "-v"]).unwrap();
        assert_eq!(config.report_offset(), FixedOffset::west_opt(3 * 3600));
        assert_eq!(config.log_level(), "debug");

        assert!(Config::try_parse_from(["badge-timers", "--tick-ms", "0"]).is_err());
    }
}
