//! 설정 관리 — runpost.toml 파싱 및 런타임 설정
//!
//! [`RunpostConfig`]는 CLI와 감독 실행기가 공유하는 최상위 설정 구조체입니다.
//!
//! # 설정 로딩 우선순위
//! 1. CLI 인자 (최고 우선)
//! 2. 환경변수 (`RUNPOST_COMMAND_KILL_GRACE_SECS=10` 형식)
//! 3. 설정 파일 (`runpost.toml`)
//! 4. 기본값 (`Default` 구현)
//!
//! # 사용 예시
//! ```no_run
//! # async fn example() -> Result<(), runpost_core::error::RunpostError> {
//! use runpost_core::config::RunpostConfig;
//!
//! // 파일에서 로드 + 환경변수 오버라이드
//! let config = RunpostConfig::load("runpost.toml").await?;
//!
//! // TOML 문자열에서 직접 파싱
//! let config = RunpostConfig::parse("[general]\nlog_level = \"debug\"")?;
//! # Ok(())
//! # }
//! ```

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{ConfigError, RunpostError};

/// Runpost 통합 설정
///
/// `runpost.toml` 파일의 최상위 구조를 나타냅니다.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RunpostConfig {
    /// 일반 설정
    #[serde(default)]
    pub general: GeneralConfig,
    /// 명령 실행 기본값
    #[serde(default)]
    pub command: CommandDefaults,
    /// 규칙 파일 설정
    #[serde(default)]
    pub rules: RulesConfig,
}

/// 일반 설정
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneralConfig {
    /// 로그 레벨 (trace, debug, info, warn, error)
    pub log_level: String,
    /// 로그 포맷 (json, pretty)
    pub log_format: String,
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_owned(),
            log_format: "pretty".to_owned(),
        }
    }
}

/// 명령 실행 기본값
///
/// CLI 인자로 지정하지 않은 실행 파라미터의 기본값입니다.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CommandDefaults {
    /// 타임아웃 감시 폴링 주기 (밀리초)
    pub poll_interval_ms: u64,
    /// graceful terminate 후 강제 종료까지의 유예 시간 (초)
    pub kill_grace_secs: u64,
    /// stderr를 stdout과 동일한 스트림으로 취급할지 여부
    pub merge_stderr: bool,
    /// 출력 없이 허용되는 최대 시간 (초, 없으면 비활성)
    pub idle_timeout_secs: Option<u64>,
    /// 총 실행 허용 시간 (초, 없으면 비활성)
    pub max_runtime_secs: Option<u64>,
}

impl Default for CommandDefaults {
    fn default() -> Self {
        Self {
            poll_interval_ms: 250,
            kill_grace_secs: 5,
            merge_stderr: true,
            idle_timeout_secs: None,
            max_runtime_secs: None,
        }
    }
}

/// 규칙 파일 설정
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RulesConfig {
    /// 규칙 파일 경로 (없으면 규칙 없이 실행)
    pub path: Option<String>,
    /// 규칙 검증 모드 (strict, lenient)
    pub mode: String,
}

impl Default for RulesConfig {
    fn default() -> Self {
        Self {
            path: None,
            mode: "strict".to_owned(),
        }
    }
}

impl RunpostConfig {
    /// TOML 파일에서 설정을 로드하고 환경변수 오버라이드를 적용합니다.
    pub async fn load(path: impl AsRef<Path>) -> Result<Self, RunpostError> {
        let mut config = Self::from_file(path).await?;
        config.apply_env_overrides();
        config.validate()?;
        Ok(config)
    }

    /// TOML 파일에서 설정을 로드합니다 (환경변수 오버라이드 없음).
    pub async fn from_file(path: impl AsRef<Path>) -> Result<Self, RunpostError> {
        let path = path.as_ref();
        let content = tokio::fs::read_to_string(path).await.map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                RunpostError::Config(ConfigError::FileNotFound {
                    path: path.display().to_string(),
                })
            } else {
                RunpostError::Io(e)
            }
        })?;
        let config = Self::parse(&content)?;
        config.validate()?;
        Ok(config)
    }

    /// TOML 문자열에서 설정을 파싱합니다.
    pub fn parse(toml_str: &str) -> Result<Self, RunpostError> {
        toml::from_str(toml_str).map_err(|e| {
            RunpostError::Config(ConfigError::ParseFailed {
                reason: e.to_string(),
            })
        })
    }

    /// 환경변수로 설정값을 오버라이드합니다.
    ///
    /// 환경변수 네이밍 규칙: `RUNPOST_{SECTION}_{FIELD}`
    /// 예: `RUNPOST_COMMAND_KILL_GRACE_SECS=10`
    pub fn apply_env_overrides(&mut self) {
        // General
        override_string(&mut self.general.log_level, "RUNPOST_GENERAL_LOG_LEVEL");
        override_string(&mut self.general.log_format, "RUNPOST_GENERAL_LOG_FORMAT");

        // Command
        override_u64(
            &mut self.command.poll_interval_ms,
            "RUNPOST_COMMAND_POLL_INTERVAL_MS",
        );
        override_u64(
            &mut self.command.kill_grace_secs,
            "RUNPOST_COMMAND_KILL_GRACE_SECS",
        );
        override_bool(&mut self.command.merge_stderr, "RUNPOST_COMMAND_MERGE_STDERR");
        override_opt_u64(
            &mut self.command.idle_timeout_secs,
            "RUNPOST_COMMAND_IDLE_TIMEOUT_SECS",
        );
        override_opt_u64(
            &mut self.command.max_runtime_secs,
            "RUNPOST_COMMAND_MAX_RUNTIME_SECS",
        );

        // Rules
        override_opt_string(&mut self.rules.path, "RUNPOST_RULES_PATH");
        override_string(&mut self.rules.mode, "RUNPOST_RULES_MODE");
    }

    /// 설정값의 유효성을 검증합니다.
    pub fn validate(&self) -> Result<(), RunpostError> {
        const MAX_POLL_INTERVAL_MS: u64 = 60_000;
        const MAX_KILL_GRACE_SECS: u64 = 300;

        let valid_levels = ["trace", "debug", "info", "warn", "error"];
        if !valid_levels.contains(&self.general.log_level.as_str()) {
            return Err(ConfigError::InvalidValue {
                field: "general.log_level".to_owned(),
                reason: format!("must be one of: {}", valid_levels.join(", ")),
            }
            .into());
        }

        let valid_formats = ["json", "pretty"];
        if !valid_formats.contains(&self.general.log_format.as_str()) {
            return Err(ConfigError::InvalidValue {
                field: "general.log_format".to_owned(),
                reason: format!("must be one of: {}", valid_formats.join(", ")),
            }
            .into());
        }

        if self.command.poll_interval_ms == 0
            || self.command.poll_interval_ms > MAX_POLL_INTERVAL_MS
        {
            return Err(ConfigError::InvalidValue {
                field: "command.poll_interval_ms".to_owned(),
                reason: format!("must be 1-{MAX_POLL_INTERVAL_MS}"),
            }
            .into());
        }

        if self.command.kill_grace_secs > MAX_KILL_GRACE_SECS {
            return Err(ConfigError::InvalidValue {
                field: "command.kill_grace_secs".to_owned(),
                reason: format!("must be at most {MAX_KILL_GRACE_SECS}"),
            }
            .into());
        }

        let valid_modes = ["strict", "lenient"];
        if !valid_modes.contains(&self.rules.mode.as_str()) {
            return Err(ConfigError::InvalidValue {
                field: "rules.mode".to_owned(),
                reason: format!("must be one of: {}", valid_modes.join(", ")),
            }
            .into());
        }

        Ok(())
    }
}

fn override_string(field: &mut String, var: &str) {
    if let Ok(value) = std::env::var(var) {
        *field = value;
    }
}

fn override_opt_string(field: &mut Option<String>, var: &str) {
    if let Ok(value) = std::env::var(var) {
        *field = Some(value);
    }
}

fn override_u64(field: &mut u64, var: &str) {
    if let Ok(value) = std::env::var(var) {
        match value.parse() {
            Ok(parsed) => *field = parsed,
            Err(_) => tracing::warn!(var, value, "ignoring unparseable env override"),
        }
    }
}

fn override_opt_u64(field: &mut Option<u64>, var: &str) {
    if let Ok(value) = std::env::var(var) {
        match value.parse() {
            Ok(parsed) => *field = Some(parsed),
            Err(_) => tracing::warn!(var, value, "ignoring unparseable env override"),
        }
    }
}

fn override_bool(field: &mut bool, var: &str) {
    if let Ok(value) = std::env::var(var) {
        match value.to_lowercase().as_str() {
            "true" | "1" | "yes" => *field = true,
            "false" | "0" | "no" => *field = false,
            _ => tracing::warn!(var, value, "ignoring unparseable env override"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_is_valid() {
        let config = RunpostConfig::default();
        config.validate().unwrap();
    }

    #[test]
    fn parse_minimal_toml() {
        let config = RunpostConfig::parse(
            r#"
[general]
log_level = "debug"

[command]
kill_grace_secs = 10
idle_timeout_secs = 60
"#,
        )
        .unwrap();
        assert_eq!(config.general.log_level, "debug");
        assert_eq!(config.command.kill_grace_secs, 10);
        assert_eq!(config.command.idle_timeout_secs, Some(60));
        // 지정하지 않은 필드는 기본값
        assert_eq!(config.command.poll_interval_ms, 250);
        assert!(config.command.merge_stderr);
    }

    #[test]
    fn parse_rejects_invalid_toml() {
        assert!(RunpostConfig::parse("not [valid toml").is_err());
    }

    #[test]
    fn validate_rejects_bad_log_level() {
        let mut config = RunpostConfig::default();
        config.general.log_level = "verbose".to_owned();
        assert!(config.validate().is_err());
    }

    #[test]
    fn validate_rejects_zero_poll_interval() {
        let mut config = RunpostConfig::default();
        config.command.poll_interval_ms = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn validate_rejects_unknown_rules_mode() {
        let mut config = RunpostConfig::default();
        config.rules.mode = "permissive".to_owned();
        assert!(config.validate().is_err());
    }

    #[tokio::test]
    async fn from_file_missing_returns_file_not_found() {
        let err = RunpostConfig::from_file("/nonexistent/runpost.toml")
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            RunpostError::Config(ConfigError::FileNotFound { .. })
        ));
    }

    #[tokio::test]
    async fn from_file_reads_toml() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("runpost.toml");
        std::fs::write(&path, "[rules]\nmode = \"lenient\"\n").unwrap();
        let config = RunpostConfig::from_file(&path).await.unwrap();
        assert_eq!(config.rules.mode, "lenient");
    }
}
