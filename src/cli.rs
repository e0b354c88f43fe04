//! Command-line interface definitions.

use clap::Parser;
use std::path::PathBuf;

/// Host-level security audit agent for Linux servers
#[derive(Debug, Parser)]
#[command(name = "hostaudit", version, about, long_about = None)]
pub struct Cli {
    /// Path to a configuration file (overrides the default search)
    #[arg(short, long, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Write the report to a file instead of stdout
    #[arg(short, long, value_name = "FILE")]
    pub output: Option<PathBuf>,

    /// Pretty-print the JSON report
    #[arg(long)]
    pub pretty: bool,

    /// Check worker pool size (minimum 1)
    #[arg(long, value_name = "N")]
    pub workers: Option<usize>,

    /// Per-probe timeout in seconds
    #[arg(long, value_name = "SECONDS")]
    pub timeout: Option<u64>,

    /// Overall audit deadline in seconds
    #[arg(long, value_name = "SECONDS")]
    pub deadline: Option<u64>,

    /// Increase log verbosity (-v info, -vv debug, -vvv trace)
    #[arg(short, long, action = clap::ArgAction::Count)]
    pub verbose: u8,
}

impl Cli {
    pub fn parse_args() -> Self {
        Self::parse()
    }

    pub fn verbosity(&self) -> u8 {
        self.verbose
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_parses() {
        let cli = Cli::parse_from(["hostaudit", "-vv", "--pretty", "--workers", "8"]);
        assert_eq!(cli.verbosity(), 2);
        assert!(cli.pretty);
        assert_eq!(cli.workers, Some(8));
        assert!(cli.config.is_none());
    }

    #[test]
    fn test_cli_defaults() {
        let cli = Cli::parse_from(["hostaudit"]);
        assert_eq!(cli.verbosity(), 0);
        assert!(!cli.pretty);
        assert!(cli.output.is_none());
    }
}
