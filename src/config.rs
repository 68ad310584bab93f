//! Configuration and CLI argument handling

use std::time::Duration;
use clap::Parser;

use crate::{
    error::ConfigError,
    state::{parse_stage_list, Stage, TimerOptions},
};

/// CLI argument parsing structure
#[derive(Parser, Debug)]
#[command(name = "stage-timer")]
#[command(about = "A staged interval timer server with shared status boards")]
#[command(version)]
pub struct Config {
    /// Port to bind the server to
    #[arg(short, long, default_value = "20553")]
    pub port: u16,

    /// Host address to bind to
    #[arg(long, default_value = "0.0.0.0")]
    pub host: String,

    /// Default stage cycle for new timers, as NAME:MINUTES pairs
    #[arg(short, long, default_value = "Work:25,Break:5")]
    pub stages: String,

    /// Timer loop tick in milliseconds
    #[arg(long, default_value = "1000", value_parser = clap::value_parser!(u64).range(1..))]
    pub tick_ms: u64,

    /// Minimum seconds between clock title updates
    #[arg(long, default_value = "5")]
    pub clock_period: u64,

    /// Do not maintain the clock title
    #[arg(long)]
    pub no_clock_title: bool,

    /// Seconds between status board refreshes
    #[arg(long, default_value = "5", value_parser = clap::value_parser!(u64).range(1..))]
    pub refresh_secs: u64,

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

    /// The default stage cycle
    pub fn stages(&self) -> Result<Vec<Stage>, ConfigError> {
        parse_stage_list(&self.stages)
    }

    pub fn timer_options(&self) -> TimerOptions {
        TimerOptions {
            tick: Duration::from_millis(self.tick_ms),
            clock_period: Duration::from_secs(self.clock_period),
            clock_title: !self.no_clock_title,
        }
    }

    pub fn refresh_interval(&self) -> Duration {
        Duration::from_secs(self.refresh_secs)
    }
}
