//! Command-line argument definitions using clap.

use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

use crate::output::OutputFormat;

/// Local security posture auditor
///
/// Runs a catalogue of security checks against this machine, remembers the
/// outcome of each, and delegates checks that need root to a socket-activated
/// helper.
#[derive(Parser, Debug)]
#[command(name = "posture")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Output format
    #[arg(short, long, global = true, value_enum)]
    pub output: Option<OutputFormat>,

    /// Increase verbosity
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Disable colored output
    #[arg(long, global = true, env = "NO_COLOR")]
    pub no_color: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run every check and record the results
    Check(CheckArgs),

    /// Show the last recorded result of every check without running anything
    Status,

    /// Serve one delegated request as root (started by the service manager)
    Helper(HelperArgs),

    /// Manage CLI configuration
    Config(ConfigArgs),
}

// ============================================================================
// Check command
// ============================================================================

#[derive(Args, Debug)]
pub struct CheckArgs {
    /// Print the check catalogue with its messages instead of running it
    #[arg(long, conflicts_with = "report")]
    pub schema: bool,

    /// Print the aggregate posture report after the run
    #[arg(long)]
    pub report: bool,

    /// Deadline for the whole run in seconds (overrides config)
    #[arg(short, long)]
    pub timeout: Option<u64>,
}

// ============================================================================
// Helper command
// ============================================================================

#[derive(Args, Debug)]
pub struct HelperArgs {
    /// Bind this socket path instead of using the one inherited on stdin
    #[arg(long)]
    pub socket: Option<PathBuf>,
}

// ============================================================================
// Config command
// ============================================================================

#[derive(Args, Debug)]
pub struct ConfigArgs {
    #[command(subcommand)]
    pub command: ConfigCommands,
}

#[derive(Subcommand, Debug)]
pub enum ConfigCommands {
    /// Show current configuration
    Show,

    /// Set a configuration value
    Set {
        /// Configuration key
        key: String,

        /// Configuration value
        value: String,
    },

    /// Show configuration file path
    Path,
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn parses_check_flags() {
        let cli = Cli::try_parse_from(["posture", "-o", "json", "check", "--report", "-t", "5"]).unwrap();
        assert_eq!(cli.output, Some(OutputFormat::Json));
        match cli.command {
            Commands::Check(args) => {
                assert!(args.report);
                assert!(!args.schema);
                assert_eq!(args.timeout, Some(5));
            }
            other => panic!("unexpected command {other:?}"),
        }
    }

    #[test]
    fn schema_and_report_conflict() {
        assert!(Cli::try_parse_from(["posture", "check", "--schema", "--report"]).is_err());
    }
}
