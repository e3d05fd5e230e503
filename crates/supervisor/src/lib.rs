#![doc = include_str!("../README.md")]
//!
//! # 모듈 구성
//!
//! - [`rule`]: 순서 있는 매칭 규칙 엔진 (부분 문자열/정규식, 첫 매칭 우선)
//! - [`buffer`]: 컨텍스트 승격 슬라이딩 윈도우
//! - [`command`]: 프로세스 실행/출력 펌프/타임아웃 감시
//! - [`config`]: 감독 실행 설정
//! - [`error`]: 도메인 에러 타입
//!
//! # 아키텍처
//!
//! ```text
//! CommandRunner -> reader tasks -> RuleSet.classify -> OutputBuffer -> OutputSink
//!       |
//!  poll tick -> idle/run timeout -> terminate -> escalate
//! ```

pub mod buffer;
pub mod command;
pub mod config;
pub mod error;
pub mod rule;

// --- 주요 타입 re-export ---

// 실행기
pub use command::{CommandRunner, CommandRunnerBuilder, RunHistory, default_detect_error};

// 설정
pub use config::{CommandConfig, CommandConfigBuilder};

// 에러
pub use error::SupervisorError;

// 규칙 엔진
pub use rule::{LineClass, RuleLoader, RuleSet, RuleSpec, ValidationMode};

// 버퍼
pub use buffer::OutputBuffer;
