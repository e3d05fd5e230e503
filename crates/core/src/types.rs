//! 도메인 타입 — 시스템 전역에서 사용되는 공통 타입
//!
//! 모든 크레이트가 공유하는 데이터 구조를 정의합니다.
//! 감독 실행(supervised run)의 결과와 출력 라인 분류에 사용됩니다.

use std::fmt;

use serde::{Deserialize, Serialize};

/// 출력 라인 심각도
///
/// 규칙 매칭으로 각 출력 라인에 부여되는 등급입니다.
/// `Ord` 구현으로 심각도 비교가 가능합니다 (`Ignore < Info < Warning < Error < Fatal`).
/// 컨텍스트 승격(promotion)은 항상 `max` 방향으로만 일어납니다.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    /// 무시 — 싱크에서 출력하지 않음
    Ignore,
    /// 정보성 라인 (기본값)
    #[default]
    Info,
    /// 경고
    Warning,
    /// 에러
    Error,
    /// 치명적 — 실행 전체를 실패로 간주
    Fatal,
}

impl Severity {
    /// 문자열에서 심각도를 파싱합니다.
    ///
    /// 대소문자를 구분하지 않습니다.
    pub fn from_str_loose(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "ignore" => Some(Self::Ignore),
            "info" | "informational" => Some(Self::Info),
            "warning" | "warn" => Some(Self::Warning),
            "error" | "err" => Some(Self::Error),
            "fatal" | "critical" | "crit" => Some(Self::Fatal),
            _ => None,
        }
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Ignore => write!(f, "ignore"),
            Self::Info => write!(f, "info"),
            Self::Warning => write!(f, "warning"),
            Self::Error => write!(f, "error"),
            Self::Fatal => write!(f, "fatal"),
        }
    }
}

/// 실행 결과 상태
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RunStatus {
    /// 정상 완료
    Success,
    /// 완료했지만 실패로 판정됨
    Error,
    /// 타임아웃으로 중단됨
    Timeout,
}

impl fmt::Display for RunStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Success => write!(f, "success"),
            Self::Error => write!(f, "error"),
            Self::Timeout => write!(f, "timeout"),
        }
    }
}

/// 타임아웃 종류
///
/// 두 타임아웃 정책은 서로 독립적으로 동작합니다.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TimeoutKind {
    /// 일정 시간 동안 출력이 없음
    Idle,
    /// 총 실행 시간 초과
    Run,
}

impl fmt::Display for TimeoutKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Idle => write!(f, "idle timeout"),
            Self::Run => write!(f, "run timeout"),
        }
    }
}

/// 감독 실행 결과 리포트
///
/// 한 번의 `run` 호출이 끝난 뒤의 최종 상태를 담습니다.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunReport {
    /// 프로세스 종료 코드 (타임아웃 등으로 수확하지 못한 경우 None)
    pub return_code: Option<i32>,
    /// 실행 결과 상태
    pub status: RunStatus,
    /// 타임아웃이 발생한 경우 그 종류
    #[serde(skip_serializing_if = "Option::is_none")]
    pub timeout_kind: Option<TimeoutKind>,
    /// 시작부터 종료까지의 경과 시간 (초)
    pub elapsed_secs: f64,
}

impl fmt::Display for RunReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "status={} elapsed={:.2}s", self.status, self.elapsed_secs)?;
        if let Some(code) = self.return_code {
            write!(f, " return_code={code}")?;
        }
        if let Some(kind) = self.timeout_kind {
            write!(f, " ({kind})")?;
        }
        Ok(())
    }
}

/// 실행할 명령줄 표현
///
/// 인자 벡터 형식은 셸 해석 없이 직접 실행되고,
/// 단일 문자열 형식은 셸을 통해 해석됩니다.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum CommandLine {
    /// 인자 벡터 (셸 해석 없음)
    Argv(Vec<String>),
    /// 셸 문자열 (셸 해석 사용)
    Shell(String),
}

impl CommandLine {
    /// 셸 해석이 필요한 형식인지 확인합니다.
    pub fn is_shell(&self) -> bool {
        matches!(self, Self::Shell(_))
    }

    /// 명령줄이 비어있는지 확인합니다.
    pub fn is_empty(&self) -> bool {
        match self {
            Self::Argv(argv) => argv.is_empty(),
            Self::Shell(s) => s.trim().is_empty(),
        }
    }
}

impl fmt::Display for CommandLine {
    /// 복사/붙여넣기 가능한 한 줄로 렌더링합니다.
    ///
    /// 공백이 포함된 인자는 작은따옴표로 감쌉니다.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Shell(s) => write!(f, "{s}"),
            Self::Argv(argv) => {
                let mut first = true;
                for arg in argv {
                    if !first {
                        write!(f, " ")?;
                    }
                    first = false;
                    if arg.is_empty() || arg.contains(char::is_whitespace) {
                        write!(f, "'{arg}'")?;
                    } else {
                        write!(f, "{arg}")?;
                    }
                }
                Ok(())
            }
        }
    }
}
