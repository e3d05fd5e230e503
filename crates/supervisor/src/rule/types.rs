//! 매칭 규칙 데이터 타입
//!
//! YAML 규칙 파일에서 역직렬화되는 [`RuleSpec`]과
//! 검증/컴파일을 거친 [`Rule`]을 정의합니다.

use regex::Regex;
use serde::{Deserialize, Serialize};

use runpost_core::types::Severity;

use crate::error::SupervisorError;

/// 규칙 명세 -- YAML 규칙 파일의 항목 하나에 대응합니다.
///
/// `substr`와 `regex` 중 정확히 하나만 설정해야 합니다.
/// 컨텍스트 카운트는 검증 단계에서 음수를 거부하기 위해
/// 부호 있는 정수로 역직렬화합니다.
///
/// # YAML 스키마
/// ```yaml
/// - substr: "error:"
///   severity: error
///   pre_context_lines: 2
///   post_context_lines: 5
/// - regex: "^warning\\b"
///   severity: warning
/// ```
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RuleSpec {
    /// 부분 문자열 매처
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub substr: Option<String>,
    /// 정규식 매처
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub regex: Option<String>,
    /// 심각도 (필수)
    #[serde(default)]
    pub severity: Option<String>,
    /// 매칭 라인 이전에 함께 승격할 컨텍스트 라인 수
    #[serde(default)]
    pub pre_context_lines: Option<i64>,
    /// 매칭 라인 이후에 함께 승격할 컨텍스트 라인 수
    #[serde(default)]
    pub post_context_lines: Option<i64>,
}

/// 컴파일된 매처 -- 매칭 방식을 결정하는 태그된 variant
///
/// 정규식은 규칙 구성 시 한 번만 컴파일됩니다.
#[derive(Debug, Clone)]
pub enum Matcher {
    /// 부분 문자열 포함
    Substring(String),
    /// 정규식 매칭
    Pattern(Regex),
}

impl Matcher {
    /// 라인이 이 매처에 해당하는지 평가합니다.
    pub fn matches(&self, line: &str) -> bool {
        match self {
            Self::Substring(s) => line.contains(s.as_str()),
            Self::Pattern(re) => re.is_match(line),
        }
    }
}

/// 컴파일된 매칭 규칙
///
/// 구성 이후 불변이며, 자신을 생성한 `RuleSet`이 소유합니다.
#[derive(Debug, Clone)]
pub struct Rule {
    /// 매처
    pub matcher: Matcher,
    /// 매칭 시 부여할 심각도
    pub severity: Severity,
    /// 매칭 라인 이전의 승격 대상 라인 수
    pub pre_context: usize,
    /// 매칭 라인 이후의 승격 대상 라인 수
    pub post_context: usize,
}

impl Rule {
    /// 규칙 명세를 검증하고 컴파일합니다.
    ///
    /// # 검증 규칙
    /// - `substr`와 `regex` 중 정확히 하나만 설정
    /// - `severity`는 필수이며 인식 가능한 레벨이어야 함
    /// - 컨텍스트 카운트는 음수 불가
    /// - `ignore` 레벨 규칙은 컨텍스트를 요청할 수 없음
    /// - 정규식은 컴파일 가능해야 함
    pub fn compile(index: usize, spec: &RuleSpec) -> Result<Self, SupervisorError> {
        let invalid = |reason: String| SupervisorError::RuleValidation { index, reason };

        let matcher = match (&spec.substr, &spec.regex) {
            (Some(_), Some(_)) => {
                return Err(invalid(
                    "exactly one of 'substr' and 'regex' must be set (got both)".to_owned(),
                ));
            }
            (None, None) => {
                return Err(invalid(
                    "exactly one of 'substr' and 'regex' must be set (got neither)".to_owned(),
                ));
            }
            (Some(substr), None) => {
                if substr.is_empty() {
                    return Err(invalid("substr must not be empty".to_owned()));
                }
                Matcher::Substring(substr.clone())
            }
            (None, Some(pattern)) => {
                if pattern.is_empty() {
                    return Err(invalid("regex must not be empty".to_owned()));
                }
                let re = Regex::new(pattern)
                    .map_err(|e| invalid(format!("invalid regex '{pattern}': {e}")))?;
                Matcher::Pattern(re)
            }
        };

        let severity = match &spec.severity {
            None => return Err(invalid("severity is required".to_owned())),
            Some(s) => Severity::from_str_loose(s)
                .ok_or_else(|| invalid(format!("unrecognized severity '{s}'")))?,
        };

        let pre_context = context_count(spec.pre_context_lines, "pre_context_lines")
            .map_err(&invalid)?;
        let post_context = context_count(spec.post_context_lines, "post_context_lines")
            .map_err(&invalid)?;

        if severity == Severity::Ignore && (pre_context > 0 || post_context > 0) {
            return Err(invalid(
                "ignore-level rules cannot request context lines".to_owned(),
            ));
        }

        Ok(Self {
            matcher,
            severity,
            pre_context,
            post_context,
        })
    }

    /// 라인이 이 규칙에 매칭되는지 평가합니다.
    pub fn matches(&self, line: &str) -> bool {
        self.matcher.matches(line)
    }
}

/// 컨텍스트 카운트를 검증하고 usize로 변환합니다.
fn context_count(value: Option<i64>, field: &str) -> Result<usize, String> {
    match value {
        None => Ok(0),
        Some(n) if n < 0 => Err(format!("{field} must be non-negative (got {n})")),
        Some(n) => usize::try_from(n).map_err(|_| format!("{field} out of range (got {n})")),
    }
}
