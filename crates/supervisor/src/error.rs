//! 감독 실행기 에러 타입
//!
//! [`SupervisorError`]는 규칙 검증, 프로세스 실행, 타임아웃 등
//! 감독 실행 내부에서 발생하는 모든 에러를 표현합니다.
//! `From<SupervisorError> for RunpostError` 변환이 구현되어 있어
//! 상위 레이어에서 `?` 연산자로 자연스럽게 전파할 수 있습니다.

use runpost_core::error::{CommandError, ConfigError, RunpostError, TimeoutError};
use runpost_core::types::TimeoutKind;

/// 감독 실행기 도메인 에러
#[derive(Debug, thiserror::Error)]
pub enum SupervisorError {
    /// 규칙 유효성 검증 실패
    #[error("rule validation error: rule #{index}: {reason}")]
    RuleValidation {
        /// 문제가 된 규칙의 인덱스 (파일 내 순서)
        index: usize,
        /// 검증 실패 사유
        reason: String,
    },

    /// 규칙 파일 로딩 실패
    #[error("rule load error: {path}: {reason}")]
    RuleLoad {
        /// 규칙 파일 경로
        path: String,
        /// 로딩 실패 사유
        reason: String,
    },

    /// 실행 설정 에러
    #[error("config error: {field}: {reason}")]
    Config {
        /// 설정 필드명
        field: String,
        /// 에러 사유
        reason: String,
    },

    /// 작업 디렉토리가 존재하지 않음 (프로세스 시작 전 검증)
    #[error("cannot run command {command} in non-existent directory {cwd}")]
    MissingWorkDir { cwd: String, command: String },

    /// 프로세스 시작 실패
    #[error("failed to spawn command {command}: {reason}")]
    Spawn { command: String, reason: String },

    /// 타임아웃 발생 (프로세스는 이미 종료됨)
    #[error("command {command} timed out after {elapsed_secs:.1} seconds ({kind})")]
    Timeout {
        command: String,
        kind: TimeoutKind,
        elapsed_secs: f64,
        limit_secs: u64,
    },

    /// 프로세스는 완료했지만 실패로 판정됨
    #[error("command {command} failed (return code: {return_code:?})")]
    CommandFailed {
        command: String,
        return_code: Option<i32>,
    },

    /// 외부 요청으로 실행이 취소됨 (프로세스는 이미 종료됨)
    #[error("command {command} was cancelled")]
    Cancelled { command: String },

    /// 내부 채널 통신 에러
    #[error("channel error: {0}")]
    Channel(String),

    /// I/O 에러
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<SupervisorError> for RunpostError {
    fn from(err: SupervisorError) -> Self {
        match err {
            SupervisorError::RuleValidation { index, reason } => {
                RunpostError::Config(ConfigError::InvalidValue {
                    field: format!("rules[{index}]"),
                    reason,
                })
            }
            SupervisorError::RuleLoad { path, reason } => {
                RunpostError::Config(ConfigError::InvalidValue {
                    field: "rules".to_owned(),
                    reason: format!("{path}: {reason}"),
                })
            }
            SupervisorError::Config { field, reason } => {
                RunpostError::Config(ConfigError::InvalidValue { field, reason })
            }
            SupervisorError::MissingWorkDir { cwd, command } => {
                RunpostError::Config(ConfigError::MissingWorkDir { cwd, command })
            }
            SupervisorError::Spawn { command, reason } => {
                RunpostError::Command(CommandError::Spawn { command, reason })
            }
            SupervisorError::Timeout {
                command,
                kind,
                elapsed_secs,
                limit_secs,
            } => RunpostError::Timeout(match kind {
                TimeoutKind::Idle => TimeoutError::Idle {
                    command,
                    elapsed_secs,
                    limit_secs,
                },
                TimeoutKind::Run => TimeoutError::Run {
                    command,
                    elapsed_secs,
                    limit_secs,
                },
            }),
            SupervisorError::CommandFailed {
                command,
                return_code,
            } => RunpostError::Command(CommandError::Failed {
                command,
                return_code,
            }),
            SupervisorError::Cancelled { command } => {
                RunpostError::Command(CommandError::Cancelled { command })
            }
            SupervisorError::Channel(reason) => RunpostError::Io(std::io::Error::other(reason)),
            SupervisorError::Io(e) => RunpostError::Io(e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rule_validation_display() {
        let err = SupervisorError::RuleValidation {
            index: 2,
            reason: "severity is required".to_owned(),
        };
        let msg = err.to_string();
        assert!(msg.contains("rule #2"));
        assert!(msg.contains("severity is required"));
    }

    #[test]
    fn timeout_converts_to_core_timeout() {
        let err = SupervisorError::Timeout {
            command: "sleep 10".to_owned(),
            kind: TimeoutKind::Idle,
            elapsed_secs: 2.5,
            limit_secs: 2,
        };
        let core: RunpostError = err.into();
        match core {
            RunpostError::Timeout(t) => assert_eq!(t.kind(), TimeoutKind::Idle),
            other => panic!("expected timeout error, got {other:?}"),
        }
    }

    #[test]
    fn missing_work_dir_converts_to_config_error() {
        let err = SupervisorError::MissingWorkDir {
            cwd: "/nope".to_owned(),
            command: "ls".to_owned(),
        };
        let core: RunpostError = err.into();
        assert!(matches!(
            core,
            RunpostError::Config(ConfigError::MissingWorkDir { .. })
        ));
    }

    #[test]
    fn command_failed_converts_to_command_error() {
        let err = SupervisorError::CommandFailed {
            command: "false".to_owned(),
            return_code: Some(1),
        };
        let core: RunpostError = err.into();
        assert!(matches!(
            core,
            RunpostError::Command(CommandError::Failed {
                return_code: Some(1),
                ..
            })
        ));
    }
}
