//! CLI argument parsing using clap derive API
//!
//! This module defines the command-line interface structure using clap's
//! derive macros. It is purely declarative with no side effects or I/O.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, ValueEnum};

/// Runpost -- run a command under supervision, classifying its output.
///
/// Use `runpost <COMMAND> --help` for subcommand details.
#[derive(Parser, Debug)]
#[command(name = "runpost", version, about, long_about = None)]
pub struct Cli {
    /// Path to the runpost.toml configuration file.
    #[arg(short, long, default_value = "runpost.toml")]
    pub config: PathBuf,

    /// Override log level (trace, debug, info, warn, error).
    #[arg(long, global = true)]
    pub log_level: Option<String>,

    /// Override log format (json, pretty).
    #[arg(long, global = true)]
    pub log_format: Option<String>,

    /// Output format for the run summary.
    #[arg(long, global = true, default_value = "text")]
    pub output: OutputFormat,

    #[command(subcommand)]
    pub command: Commands,
}

/// Supported output formats.
#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum OutputFormat {
    /// Human-readable text output.
    Text,
    /// Machine-readable JSON.
    Json,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run a command under supervision.
    Run(RunArgs),

    /// Inspect and validate rule files.
    Rules(RulesArgs),
}

// ---- run ----

/// Run a command, classify its output, and enforce timeouts.
#[derive(Args, Debug)]
pub struct RunArgs {
    /// Interpret the command as a single shell line.
    #[arg(long)]
    pub shell: bool,

    /// Working directory for the command (must exist).
    #[arg(long)]
    pub cwd: Option<PathBuf>,

    /// Environment overrides (repeatable).
    #[arg(long = "env", value_name = "KEY=VALUE")]
    pub env: Vec<String>,

    /// Rule file (YAML) for output classification.
    #[arg(long)]
    pub rules: Option<PathBuf>,

    /// Skip invalid rules instead of failing.
    #[arg(long)]
    pub lenient: bool,

    /// Maximum allowed silence (no output) in seconds.
    #[arg(long)]
    pub idle_timeout: Option<u64>,

    /// Maximum total runtime in seconds.
    #[arg(long)]
    pub max_runtime: Option<u64>,

    /// Classify unmatched stderr lines as errors.
    #[arg(long)]
    pub separate_stderr: bool,

    /// Treat any failure (bad exit, timeout) as fatal.
    #[arg(long)]
    pub halt_on_failure: bool,

    /// The command to run (use `--` before it to stop flag parsing).
    #[arg(trailing_var_arg = true, required = true)]
    pub command: Vec<String>,
}

// ---- rules ----

/// Inspect and validate rule files.
#[derive(Args, Debug)]
pub struct RulesArgs {
    #[command(subcommand)]
    pub command: RulesCommands,
}

#[derive(Subcommand, Debug)]
pub enum RulesCommands {
    /// Validate a rule file and print its context windows.
    Check {
        /// Rule file to validate.
        file: PathBuf,

        /// Report invalid rules as warnings instead of failing.
        #[arg(long)]
        lenient: bool,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_run_command() {
        let cli = Cli::try_parse_from([
            "runpost",
            "run",
            "--idle-timeout",
            "30",
            "--",
            "make",
            "test",
        ])
        .unwrap();
        match cli.command {
            Commands::Run(args) => {
                assert_eq!(args.idle_timeout, Some(30));
                assert_eq!(args.command, vec!["make", "test"]);
                assert!(!args.shell);
            }
            other => panic!("expected run command, got {other:?}"),
        }
    }

    #[test]
    fn parse_run_requires_command() {
        assert!(Cli::try_parse_from(["runpost", "run"]).is_err());
    }

    #[test]
    fn parse_rules_check() {
        let cli =
            Cli::try_parse_from(["runpost", "rules", "check", "rules.yml", "--lenient"]).unwrap();
        match cli.command {
            Commands::Rules(args) => match args.command {
                RulesCommands::Check { file, lenient } => {
                    assert_eq!(file, PathBuf::from("rules.yml"));
                    assert!(lenient);
                }
            },
            other => panic!("expected rules command, got {other:?}"),
        }
    }

    #[test]
    fn global_flags_accepted_after_subcommand() {
        let cli = Cli::try_parse_from([
            "runpost",
            "run",
            "--log-level",
            "debug",
            "--",
            "true",
        ])
        .unwrap();
        assert_eq!(cli.log_level.as_deref(), Some("debug"));
    }
}
