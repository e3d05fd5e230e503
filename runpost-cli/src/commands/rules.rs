//! `runpost rules` -- inspect and validate rule files.

use std::path::Path;

use colored::Colorize;

use runpost_core::config::RunpostConfig;
use runpost_supervisor::{RuleLoader, RuleSet, ValidationMode};

use crate::cli::{OutputFormat, RulesArgs, RulesCommands};
use crate::error::CliError;

/// Execute the `rules` subcommand.
pub async fn execute(
    args: RulesArgs,
    config: &RunpostConfig,
    output: OutputFormat,
) -> Result<(), CliError> {
    match args.command {
        RulesCommands::Check { file, lenient } => {
            let lenient = lenient || config.rules.mode == "lenient";
            check(&file, lenient, output).await
        }
    }
}

/// Validate a rule file and print its aggregate context windows.
async fn check(file: &Path, lenient: bool, output: OutputFormat) -> Result<(), CliError> {
    let specs = RuleLoader::load_file(file).await?;
    let mode = if lenient {
        ValidationMode::Lenient
    } else {
        ValidationMode::Strict
    };
    let set = RuleSet::from_specs(&specs, mode)?;

    match output {
        OutputFormat::Json => println!(
            "{}",
            serde_json::json!({
                "rules": set.rule_count(),
                "pre_context_lines": set.pre_context_lines(),
                "post_context_lines": set.post_context_lines(),
            })
        ),
        OutputFormat::Text => println!(
            "{} {} rules (pre_context={}, post_context={})",
            "ok".green(),
            set.rule_count(),
            set.pre_context_lines(),
            set.post_context_lines(),
        ),
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn check_valid_rule_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("rules.yml");
        std::fs::write(
            &path,
            "- substr: \"ERROR\"\n  severity: error\n  pre_context_lines: 2\n",
        )
        .unwrap();
        check(&path, false, OutputFormat::Text).await.unwrap();
    }

    #[tokio::test]
    async fn check_invalid_rule_file_fails_in_strict_mode() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("rules.yml");
        std::fs::write(&path, "- substr: \"oops\"\n").unwrap();

        let err = check(&path, false, OutputFormat::Text).await.unwrap_err();
        assert_eq!(err.exit_code(), 2);

        // lenient 모드에서는 통과
        check(&path, true, OutputFormat::Text).await.unwrap();
    }

    #[tokio::test]
    async fn check_missing_file_fails() {
        let err = check(Path::new("/nonexistent/rules.yml"), false, OutputFormat::Text)
            .await
            .unwrap_err();
        assert_eq!(err.exit_code(), 2);
    }
}
