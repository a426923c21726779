//! Command-line arguments of the demo binary.

use clap::{Parser, ValueEnum};
use herald_logger::LevelFilter;
use std::path::PathBuf;

#[derive(Debug, Parser)]
#[command(name = "herald-demo")]
#[command(author = env!("CARGO_PKG_AUTHORS"))]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Walks through the Herald dispatcher delivery modes")]
pub(crate) struct Cli {
    /// Scenario to run
    #[arg(short, long, value_enum, default_value_t = Scenario::Basic, env = "HERALD_SCENARIO")]
    pub(crate) scenario: Scenario,

    /// Minimum log level
    #[arg(short, long, default_value = "info", env = "HERALD_LOG_LEVEL")]
    pub(crate) level: LevelFilter,

    /// Filter directives, e.g. `herald_dispatcher=trace,info`. Overrides --level
    #[arg(long, env = "HERALD_LOG_FILTER")]
    pub(crate) env_filter: Option<String>,

    /// Emit JSON lines instead of compact text
    #[arg(long, env = "HERALD_LOG_JSON")]
    pub(crate) json: bool,

    /// Also write rolling log files into this directory
    #[arg(long, env = "HERALD_LOG_DIR")]
    pub(crate) log_dir: Option<PathBuf>,

    /// Number of publisher threads in the concurrent scenario
    #[arg(long, default_value_t = 4, value_parser = clap::value_parser!(u16).range(1..=64))]
    pub(crate) publishers: u16,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub(crate) enum Scenario {
    /// Inline, once and unsubscribe on a string channel
    Basic,
    /// Five once-only transactional handlers delivered in order
    Transactional,
    /// Several publisher threads feeding detached handlers
    Concurrent,
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_is_well_formed() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_defaults() {
        let cli = Cli::try_parse_from(["herald-demo"]).unwrap();
        assert_eq!(cli.scenario, Scenario::Basic);
        assert_eq!(cli.level, LevelFilter::INFO);
        assert_eq!(cli.publishers, 4);
        assert!(cli.log_dir.is_none());
    }

    #[test]
    fn test_scenario_and_level_parse() {
        let cli = Cli::try_parse_from(["herald-demo", "-s", "transactional", "--level", "debug", "--json"])
            .unwrap();
        assert_eq!(cli.scenario, Scenario::Transactional);
        assert_eq!(cli.level, LevelFilter::DEBUG);
        assert!(cli.json);
    }

    #[test]
    fn test_publishers_out_of_range_is_rejected() {
        assert!(Cli::try_parse_from(["herald-demo", "--publishers", "0"]).is_err());
    }
}
