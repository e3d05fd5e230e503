//! 감독 실행 설정
//!
//! [`CommandConfig`]는 한 번의 감독 실행에 필요한 모든 파라미터를 담습니다.
//! CLI가 `runpost.toml`의 기본값과 CLI 인자를 병합하여 만들어 전달합니다.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use runpost_core::types::CommandLine;

use crate::error::SupervisorError;

/// 감독 실행 설정
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CommandConfig {
    /// 실행할 명령
    pub command: CommandLine,
    /// 작업 디렉토리 (지정 시 존재해야 함)
    pub cwd: Option<PathBuf>,
    /// 환경변수 오버라이드 (기존 환경에 추가/덮어쓰기)
    #[serde(default)]
    pub env: Vec<(String, String)>,
    /// 출력 없이 허용되는 최대 시간 (초, 없으면 비활성)
    pub idle_timeout_secs: Option<u64>,
    /// 총 실행 허용 시간 (초, 없으면 비활성)
    pub max_runtime_secs: Option<u64>,
    /// 타임아웃 감시 폴링 주기 (밀리초)
    pub poll_interval_ms: u64,
    /// graceful terminate 후 강제 종료까지의 유예 시간 (초)
    pub kill_grace_secs: u64,
    /// stderr를 stdout과 동일하게 분류할지 여부
    ///
    /// `false`이면 규칙에 매칭되지 않은 stderr 라인은 `error` 심각도를 받습니다.
    pub merge_stderr: bool,
}

impl CommandConfig {
    /// 기본 파라미터로 설정을 생성합니다.
    pub fn new(command: CommandLine) -> Self {
        Self {
            command,
            cwd: None,
            env: Vec::new(),
            idle_timeout_secs: None,
            max_runtime_secs: None,
            poll_interval_ms: 250,
            kill_grace_secs: 5,
            merge_stderr: true,
        }
    }

    /// 설정값의 유효성을 검증합니다.
    pub fn validate(&self) -> Result<(), SupervisorError> {
        if self.command.is_empty() {
            return Err(SupervisorError::Config {
                field: "command".to_owned(),
                reason: "command must not be empty".to_owned(),
            });
        }

        if self.poll_interval_ms == 0 {
            return Err(SupervisorError::Config {
                field: "poll_interval_ms".to_owned(),
                reason: "must be greater than 0".to_owned(),
            });
        }

        if self.idle_timeout_secs == Some(0) {
            return Err(SupervisorError::Config {
                field: "idle_timeout_secs".to_owned(),
                reason: "must be greater than 0 when set".to_owned(),
            });
        }

        if self.max_runtime_secs == Some(0) {
            return Err(SupervisorError::Config {
                field: "max_runtime_secs".to_owned(),
                reason: "must be greater than 0 when set".to_owned(),
            });
        }

        Ok(())
    }
}

/// 감독 실행 설정 빌더
#[derive(Debug, Clone)]
pub struct CommandConfigBuilder {
    config: CommandConfig,
}

impl CommandConfigBuilder {
    /// 실행할 명령으로 새 빌더를 생성합니다.
    pub fn new(command: CommandLine) -> Self {
        Self {
            config: CommandConfig::new(command),
        }
    }

    /// 작업 디렉토리를 설정합니다.
    pub fn cwd(mut self, cwd: impl Into<PathBuf>) -> Self {
        self.config.cwd = Some(cwd.into());
        self
    }

    /// 환경변수 오버라이드를 추가합니다.
    pub fn env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.config.env.push((key.into(), value.into()));
        self
    }

    /// 출력 없음 타임아웃(초)을 설정합니다.
    pub fn idle_timeout_secs(mut self, secs: u64) -> Self {
        self.config.idle_timeout_secs = Some(secs);
        self
    }

    /// 총 실행 타임아웃(초)을 설정합니다.
    pub fn max_runtime_secs(mut self, secs: u64) -> Self {
        self.config.max_runtime_secs = Some(secs);
        self
    }

    /// 타임아웃 감시 폴링 주기(밀리초)를 설정합니다.
    pub fn poll_interval_ms(mut self, ms: u64) -> Self {
        self.config.poll_interval_ms = ms;
        self
    }

    /// 강제 종료 유예 시간(초)을 설정합니다.
    pub fn kill_grace_secs(mut self, secs: u64) -> Self {
        self.config.kill_grace_secs = secs;
        self
    }

    /// stderr 병합 여부를 설정합니다.
    pub fn merge_stderr(mut self, merge: bool) -> Self {
        self.config.merge_stderr = merge;
        self
    }

    /// 설정을 검증하고 `CommandConfig`를 생성합니다.
    pub fn build(self) -> Result<CommandConfig, SupervisorError> {
        self.config.validate()?;
        Ok(self.config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn echo() -> CommandLine {
        CommandLine::Argv(vec!["echo".to_owned(), "hi".to_owned()])
    }

    #[test]
    fn new_config_is_valid() {
        CommandConfig::new(echo()).validate().unwrap();
    }

    #[test]
    fn empty_command_rejected() {
        let config = CommandConfig::new(CommandLine::Argv(vec![]));
        assert!(config.validate().is_err());
    }

    #[test]
    fn zero_poll_interval_rejected() {
        let mut config = CommandConfig::new(echo());
        config.poll_interval_ms = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn zero_timeouts_rejected() {
        let mut config = CommandConfig::new(echo());
        config.idle_timeout_secs = Some(0);
        assert!(config.validate().is_err());

        let mut config = CommandConfig::new(echo());
        config.max_runtime_secs = Some(0);
        assert!(config.validate().is_err());
    }

    #[test]
    fn builder_sets_fields() {
        let config = CommandConfigBuilder::new(echo())
            .cwd("/tmp")
            .env("CI", "1")
            .idle_timeout_secs(30)
            .max_runtime_secs(600)
            .poll_interval_ms(100)
            .kill_grace_secs(2)
            .merge_stderr(false)
            .build()
            .unwrap();
        assert_eq!(config.cwd, Some(PathBuf::from("/tmp")));
        assert_eq!(config.env, vec![("CI".to_owned(), "1".to_owned())]);
        assert_eq!(config.idle_timeout_secs, Some(30));
        assert_eq!(config.max_runtime_secs, Some(600));
        assert_eq!(config.poll_interval_ms, 100);
        assert_eq!(config.kill_grace_secs, 2);
        assert!(!config.merge_stderr);
    }

    #[test]
    fn builder_rejects_invalid_config() {
        let result = CommandConfigBuilder::new(echo()).poll_interval_ms(0).build();
        assert!(result.is_err());
    }
}
