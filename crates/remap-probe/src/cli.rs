//! Command-line interface definitions for remap-probe.

use std::time::Duration;

use clap::Parser;
use logging::LogArgs;

/// Command-line interface for the `remap-probe` binary.
#[derive(Parser, Debug)]
#[command(
    name = "remap-probe",
    about = "Run the shared dispatcher with a heartbeat timer and report how often it fired",
    version
)]
pub struct Cli {
    /// Logging controls shared across remapd binaries.
    #[command(flatten)]
    pub log: LogArgs,

    /// Heartbeat interval.
    #[arg(
        long,
        value_parser = humantime::parse_duration,
        default_value = "100ms",
        value_name = "DURATION"
    )]
    pub interval: Duration,

    /// How long to keep the dispatcher running before tearing down.
    #[arg(
        long,
        value_parser = humantime::parse_duration,
        default_value = "1s",
        value_name = "DURATION"
    )]
    pub run_for: Duration,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let cli = Cli::parse_from(["remap-probe"]);
        assert_eq!(cli.interval, Duration::from_millis(100));
        assert_eq!(cli.run_for, Duration::from_secs(1));
        assert!(!cli.log.debug);
    }

    #[test]
    fn parses_human_durations() {
        let cli = Cli::parse_from(["remap-probe", "--interval", "250ms", "--run-for", "3s", "--debug"]);
        assert_eq!(cli.interval, Duration::from_millis(250));
        assert_eq!(cli.run_for, Duration::from_secs(3));
        assert!(cli.log.debug);
    }
}
