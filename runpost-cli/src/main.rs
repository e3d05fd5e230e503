use clap::Parser;

mod cli;
mod commands;
mod error;
mod logging;

use cli::{Cli, Commands};
use error::CliError;
use runpost_core::config::RunpostConfig;

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let exit_code = match run_main(cli).await {
        Ok(()) => 0,
        Err(e) => {
            // 로깅 초기화 전에 실패했을 수 있으므로 stderr에 직접 출력
            eprintln!("runpost: {e}");
            e.exit_code()
        }
    };

    std::process::exit(exit_code);
}

async fn run_main(cli: Cli) -> Result<(), CliError> {
    // 설정 파일이 없으면 기본값 + 환경변수 오버라이드로 동작
    let mut config = if cli.config.exists() {
        RunpostConfig::load(&cli.config).await?
    } else {
        let mut config = RunpostConfig::default();
        config.apply_env_overrides();
        config
    };

    // CLI 인자가 최우선
    if let Some(level) = &cli.log_level {
        config.general.log_level = level.clone();
    }
    if let Some(format) = &cli.log_format {
        config.general.log_format = format.clone();
    }
    config.validate()?;

    logging::init_tracing(&config.general)?;

    match cli.command {
        Commands::Run(args) => commands::run::execute(args, &config, cli.output).await,
        Commands::Rules(args) => commands::rules::execute(args, &config, cli.output).await,
    }
}
