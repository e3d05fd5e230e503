//! `runpost run` -- run a command under supervision.

use std::path::PathBuf;
use std::sync::Arc;

use colored::Colorize;
use tokio_util::sync::CancellationToken;
use tracing::{error, warn};

use runpost_core::config::RunpostConfig;
use runpost_core::sink::TracingSink;
use runpost_core::types::{CommandLine, RunReport, RunStatus};
use runpost_supervisor::{
    CommandConfigBuilder, CommandRunner, RuleLoader, RuleSet, ValidationMode,
};

use crate::cli::{OutputFormat, RunArgs};
use crate::error::CliError;

/// Execute the `run` subcommand.
pub async fn execute(
    args: RunArgs,
    config: &RunpostConfig,
    output: OutputFormat,
) -> Result<(), CliError> {
    let command = if args.shell {
        CommandLine::Shell(args.command.join(" "))
    } else {
        CommandLine::Argv(args.command.clone())
    };

    let rules = load_rules(&args, config).await?;

    let mut builder = CommandConfigBuilder::new(command)
        .poll_interval_ms(config.command.poll_interval_ms)
        .kill_grace_secs(config.command.kill_grace_secs)
        .merge_stderr(config.command.merge_stderr && !args.separate_stderr);

    if let Some(cwd) = &args.cwd {
        builder = builder.cwd(cwd);
    }
    for pair in &args.env {
        let (key, value) = parse_env_pair(pair)?;
        builder = builder.env(key, value);
    }
    if let Some(secs) = args.idle_timeout.or(config.command.idle_timeout_secs) {
        builder = builder.idle_timeout_secs(secs);
    }
    if let Some(secs) = args.max_runtime.or(config.command.max_runtime_secs) {
        builder = builder.max_runtime_secs(secs);
    }
    let command_config = builder.build()?;

    // Forward Ctrl-C as a cancellation request so the child is torn down
    // through the same path as a timeout.
    let cancel_token = CancellationToken::new();
    let signal_token = cancel_token.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("interrupt received, cancelling run");
            signal_token.cancel();
        }
    });

    let mut runner = CommandRunner::builder()
        .config(command_config)
        .rules(Arc::new(rules))
        .sink(Arc::new(TracingSink::new()))
        .cancel_token(cancel_token)
        .build()?;

    match runner.run().await {
        Ok(report) => {
            render_report(&report, output)?;
            Ok(())
        }
        Err(e) => {
            let cli_err = CliError::from(e);
            if args.halt_on_failure {
                error!("fatal: {cli_err}");
            }
            Err(cli_err)
        }
    }
}

/// Parse a `KEY=VALUE` environment override.
fn parse_env_pair(pair: &str) -> Result<(&str, &str), CliError> {
    pair.split_once('=')
        .filter(|(key, _)| !key.is_empty())
        .ok_or_else(|| CliError::Config(format!("invalid --env '{pair}': expected KEY=VALUE")))
}

/// Build the rule set from `--rules` or the config file default.
async fn load_rules(args: &RunArgs, config: &RunpostConfig) -> Result<RuleSet, CliError> {
    let lenient = args.lenient || config.rules.mode == "lenient";
    let mode = if lenient {
        ValidationMode::Lenient
    } else {
        ValidationMode::Strict
    };

    let path: Option<PathBuf> = args
        .rules
        .clone()
        .or_else(|| config.rules.path.as_ref().map(PathBuf::from));

    match path {
        Some(path) => Ok(RuleLoader::load_rule_set(&path, mode).await?),
        None => Ok(RuleSet::new()),
    }
}

/// Print the run summary in the requested format.
fn render_report(report: &RunReport, output: OutputFormat) -> Result<(), CliError> {
    match output {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(report)?),
        OutputFormat::Text => {
            let status = match report.status {
                RunStatus::Success => report.status.to_string().green(),
                _ => report.status.to_string().red(),
            };
            let return_code = report
                .return_code
                .map_or_else(|| "-".to_owned(), |c| c.to_string());
            println!(
                "{status} return_code={return_code} elapsed={:.2}s",
                report.elapsed_secs
            );
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_env_pair_accepts_key_value() {
        assert_eq!(parse_env_pair("CI=1").unwrap(), ("CI", "1"));
        assert_eq!(
            parse_env_pair("PATH=/usr/bin:/bin").unwrap(),
            ("PATH", "/usr/bin:/bin")
        );
    }

    #[test]
    fn parse_env_pair_rejects_missing_separator() {
        assert!(parse_env_pair("JUSTAKEY").is_err());
    }

    #[test]
    fn parse_env_pair_rejects_empty_key() {
        assert!(parse_env_pair("=value").is_err());
    }

    #[tokio::test]
    async fn load_rules_defaults_to_empty_set() {
        let args = sample_args();
        let config = RunpostConfig::default();
        let rules = load_rules(&args, &config).await.unwrap();
        assert!(rules.is_empty());
    }

    #[tokio::test]
    async fn load_rules_reads_file_from_args() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("rules.yml");
        std::fs::write(&path, "- substr: \"ERROR\"\n  severity: error\n").unwrap();

        let mut args = sample_args();
        args.rules = Some(path);
        let rules = load_rules(&args, &RunpostConfig::default()).await.unwrap();
        assert_eq!(rules.rule_count(), 1);
    }

    #[tokio::test]
    async fn config_lenient_mode_applies_without_flag() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("rules.yml");
        // severity 누락 규칙은 lenient 모드에서 스킵됨
        std::fs::write(&path, "- substr: \"oops\"\n").unwrap();

        let mut args = sample_args();
        args.rules = Some(path);
        let mut config = RunpostConfig::default();
        config.rules.mode = "lenient".to_owned();
        let rules = load_rules(&args, &config).await.unwrap();
        assert!(rules.is_empty());
    }

    fn sample_args() -> RunArgs {
        RunArgs {
            shell: false,
            cwd: None,
            env: vec![],
            rules: None,
            lenient: false,
            idle_timeout: None,
            max_runtime: None,
            separate_stderr: false,
            halt_on_failure: false,
            command: vec!["true".to_owned()],
        }
    }
}
