//! 에러 타입 — 도메인별 에러 정의

use crate::types::TimeoutKind;

/// Runpost 최상위 에러 타입
#[derive(Debug, thiserror::Error)]
pub enum RunpostError {
    /// 설정 관련 에러
    #[error("config error: {0}")]
    Config(#[from] ConfigError),

    /// 타임아웃 에러
    #[error("timeout error: {0}")]
    Timeout(#[from] TimeoutError),

    /// 명령 실행 에러
    #[error("command error: {0}")]
    Command(#[from] CommandError),

    /// I/O 에러
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

/// 설정 관련 에러
///
/// 프로세스가 시작되기 전에 동기적으로 발생하며, 재시도하지 않습니다.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// 설정 파일을 찾을 수 없음
    #[error("config file not found: {path}")]
    FileNotFound { path: String },

    /// 설정 파싱 실패
    #[error("failed to parse config: {reason}")]
    ParseFailed { reason: String },

    /// 유효하지 않은 설정 값
    #[error("invalid config value for '{field}': {reason}")]
    InvalidValue { field: String, reason: String },

    /// 작업 디렉토리가 존재하지 않음
    #[error("cannot run command {command} in non-existent directory {cwd}")]
    MissingWorkDir { cwd: String, command: String },
}

/// 타임아웃 에러
///
/// 타임아웃이 감지되면 프로세스를 먼저 종료한 뒤 이 에러를 surface합니다.
/// 치명 여부 판단은 호출자의 몫입니다.
#[derive(Debug, thiserror::Error)]
pub enum TimeoutError {
    /// 출력 없이 허용 시간을 초과함
    #[error("command {command} timed out after {elapsed_secs:.1} seconds without output (limit: {limit_secs}s)")]
    Idle {
        command: String,
        elapsed_secs: f64,
        limit_secs: u64,
    },

    /// 총 실행 시간을 초과함
    #[error("command {command} timed out after {elapsed_secs:.1} seconds (limit: {limit_secs}s)")]
    Run {
        command: String,
        elapsed_secs: f64,
        limit_secs: u64,
    },
}

impl TimeoutError {
    /// 어떤 타임아웃이 발생했는지 반환합니다.
    pub fn kind(&self) -> TimeoutKind {
        match self {
            Self::Idle { .. } => TimeoutKind::Idle,
            Self::Run { .. } => TimeoutKind::Run,
        }
    }

    /// 타임아웃 시점까지의 경과 시간을 반환합니다.
    pub fn elapsed_secs(&self) -> f64 {
        match self {
            Self::Idle { elapsed_secs, .. } | Self::Run { elapsed_secs, .. } => *elapsed_secs,
        }
    }
}

/// 명령 실행 에러
#[derive(Debug, thiserror::Error)]
pub enum CommandError {
    /// 프로세스는 완료했지만 실패로 판정됨
    #[error("command {command} failed (return code: {return_code:?})")]
    Failed {
        command: String,
        return_code: Option<i32>,
    },

    /// 프로세스를 시작하지 못함
    #[error("failed to spawn command {command}: {reason}")]
    Spawn { command: String, reason: String },

    /// 외부 요청으로 실행이 취소됨
    #[error("command {command} was cancelled")]
    Cancelled { command: String },
}
