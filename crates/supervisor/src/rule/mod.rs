//! 매칭 규칙 엔진 -- 출력 라인 분류
//!
//! 순서 있는 규칙 목록을 평가하여 각 출력 라인에
//! 심각도와 컨텍스트 윈도우를 부여합니다.
//!
//! # 아키텍처
//! - [`RuleSet`]: 검증된 규칙의 순서 있는 컬렉션 (첫 매칭 우선)
//! - [`loader`]: YAML 규칙 파일 로딩
//! - [`types`]: 규칙 데이터 구조 및 검증

pub mod loader;
pub mod types;

pub use loader::RuleLoader;
pub use types::{Matcher, Rule, RuleSpec};

use runpost_core::types::Severity;

use crate::error::SupervisorError;

/// 규칙 검증 모드
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ValidationMode {
    /// 유효하지 않은 규칙이 하나라도 있으면 전체 구성 실패 (기본값)
    #[default]
    Strict,
    /// 유효하지 않은 규칙은 경고 로그를 남기고 건너뜀
    Lenient,
}

/// 라인 분류 결과
///
/// 매칭된 규칙의 심각도와 요청한 컨텍스트 윈도우입니다.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LineClass {
    /// 부여할 심각도
    pub severity: Severity,
    /// 이전 라인 승격 범위
    pub pre_context: usize,
    /// 이후 라인 승격 범위
    pub post_context: usize,
}

/// 규칙 세트 -- 순서 있는 검증된 규칙 컬렉션
///
/// 규칙 순서가 평가 우선순위입니다 (라인당 첫 매칭 우선).
/// 감독 실행이 시작되기 전에 한 번 구성되고, 실행 중에는 읽기 전용입니다.
/// 분류 결과는 규칙 내용과 라인 텍스트에만 의존합니다.
#[derive(Debug, Clone, Default)]
pub struct RuleSet {
    /// 규칙 목록 (순서 = 우선순위)
    rules: Vec<Rule>,
    /// 전체 규칙 중 최대 pre 컨텍스트 (캐시)
    pre_context_lines: usize,
    /// 전체 규칙 중 최대 post 컨텍스트 (캐시)
    post_context_lines: usize,
}

impl RuleSet {
    /// 규칙이 없는 빈 세트를 생성합니다.
    ///
    /// 모든 라인이 기본 심각도로 통과하며 버퍼링 지연이 없습니다.
    pub fn new() -> Self {
        Self::default()
    }

    /// 규칙 명세 목록에서 규칙 세트를 구성합니다.
    ///
    /// `Strict` 모드에서는 유효하지 않은 규칙이 있으면 전체 구성이 실패하고,
    /// `Lenient` 모드에서는 해당 규칙을 건너뛰고 경고를 남깁니다.
    pub fn from_specs(
        specs: &[RuleSpec],
        mode: ValidationMode,
    ) -> Result<Self, SupervisorError> {
        let mut rules = Vec::with_capacity(specs.len());

        for (index, spec) in specs.iter().enumerate() {
            match Rule::compile(index, spec) {
                Ok(rule) => rules.push(rule),
                Err(e) => match mode {
                    ValidationMode::Strict => return Err(e),
                    ValidationMode::Lenient => {
                        tracing::warn!(index, error = %e, "skipping invalid rule");
                    }
                },
            }
        }

        let pre_context_lines = rules.iter().map(|r| r.pre_context).max().unwrap_or(0);
        let post_context_lines = rules.iter().map(|r| r.post_context).max().unwrap_or(0);

        Ok(Self {
            rules,
            pre_context_lines,
            post_context_lines,
        })
    }

    /// 라인을 분류합니다.
    ///
    /// 규칙을 순서대로 평가하여 첫 매칭의 결과를 반환합니다.
    /// 어떤 규칙에도 매칭되지 않으면 `None`을 반환합니다
    /// (기본 심각도, 컨텍스트 없음은 호출자가 적용합니다).
    pub fn classify(&self, line: &str) -> Option<LineClass> {
        self.rules.iter().find(|rule| rule.matches(line)).map(|rule| LineClass {
            severity: rule.severity,
            pre_context: rule.pre_context,
            post_context: rule.post_context,
        })
    }

    /// 로드된 규칙 수를 반환합니다.
    pub fn rule_count(&self) -> usize {
        self.rules.len()
    }

    /// 규칙이 하나도 없는지 확인합니다.
    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    /// 전체 규칙 중 최대 pre 컨텍스트를 반환합니다.
    pub fn pre_context_lines(&self) -> usize {
        self.pre_context_lines
    }

    /// 전체 규칙 중 최대 post 컨텍스트를 반환합니다.
    pub fn post_context_lines(&self) -> usize {
        self.post_context_lines
    }
}
