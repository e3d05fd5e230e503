//! 규칙 파일 로더 -- YAML 규칙 파일을 디스크에서 로드합니다.
//!
//! 규칙 파일은 [`RuleSpec`] 목록을 담는 단일 YAML 문서입니다.
//! 명세의 유효성 검증은 [`RuleSet`](crate::rule::RuleSet) 구성 시점에 수행됩니다.

use std::path::Path;

use crate::error::SupervisorError;
use crate::rule::{RuleSet, ValidationMode};

use super::types::RuleSpec;

const MAX_RULE_FILE_SIZE: u64 = 10 * 1024 * 1024; // 10MB

/// 규칙 파일 로더
pub struct RuleLoader;

impl RuleLoader {
    /// YAML 파일에서 규칙 명세 목록을 로드합니다.
    ///
    /// # Errors
    /// - 파일을 읽을 수 없는 경우
    /// - 파일이 `MAX_RULE_FILE_SIZE`를 초과하는 경우
    /// - YAML이 `RuleSpec` 목록이 아닌 경우
    pub async fn load_file(path: impl AsRef<Path>) -> Result<Vec<RuleSpec>, SupervisorError> {
        let path = path.as_ref();

        let metadata =
            tokio::fs::metadata(path)
                .await
                .map_err(|e| SupervisorError::RuleLoad {
                    path: path.display().to_string(),
                    reason: format!("failed to read file metadata: {e}"),
                })?;

        if metadata.len() > MAX_RULE_FILE_SIZE {
            return Err(SupervisorError::RuleLoad {
                path: path.display().to_string(),
                reason: format!(
                    "file too large: {} bytes (max: {MAX_RULE_FILE_SIZE})",
                    metadata.len()
                ),
            });
        }

        let content =
            tokio::fs::read_to_string(path)
                .await
                .map_err(|e| SupervisorError::RuleLoad {
                    path: path.display().to_string(),
                    reason: format!("failed to read file: {e}"),
                })?;

        let specs = Self::parse_yaml(&content, &path.display().to_string())?;

        tracing::info!(
            path = %path.display(),
            count = specs.len(),
            "loaded rule specs"
        );

        Ok(specs)
    }

    /// YAML 파일을 로드하고 곧바로 규칙 세트를 구성합니다.
    pub async fn load_rule_set(
        path: impl AsRef<Path>,
        mode: ValidationMode,
    ) -> Result<RuleSet, SupervisorError> {
        let specs = Self::load_file(path).await?;
        RuleSet::from_specs(&specs, mode)
    }

    /// YAML 문자열을 규칙 명세 목록으로 파싱합니다.
    pub fn parse_yaml(yaml_str: &str, source: &str) -> Result<Vec<RuleSpec>, SupervisorError> {
        serde_yaml::from_str(yaml_str).map_err(|e| SupervisorError::RuleLoad {
            path: source.to_owned(),
            reason: format!("YAML parse error: {e}"),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_valid_yaml() {
        let yaml = r#"
- substr: "error:"
  severity: error
  post_context_lines: 5
- regex: "^warn"
  severity: warning
"#;
        let specs = RuleLoader::parse_yaml(yaml, "rules.yml").unwrap();
        assert_eq!(specs.len(), 2);
        assert_eq!(specs[0].post_context_lines, Some(5));
    }

    #[test]
    fn parse_invalid_yaml_returns_error() {
        let result = RuleLoader::parse_yaml("not: [valid: yaml: {{{", "bad.yml");
        assert!(result.is_err());
    }

    #[test]
    fn parse_non_list_yaml_returns_error() {
        let result = RuleLoader::parse_yaml("substr: foo\nseverity: error", "scalar.yml");
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn load_nonexistent_file_returns_error() {
        let result = RuleLoader::load_file("/nonexistent/rules.yml").await;
        assert!(matches!(result, Err(SupervisorError::RuleLoad { .. })));
    }

    #[tokio::test]
    async fn load_file_reads_specs() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("rules.yml");
        std::fs::write(
            &path,
            "- substr: \"FAIL\"\n  severity: error\n  pre_context_lines: 2\n",
        )
        .unwrap();
        let specs = RuleLoader::load_file(&path).await.unwrap();
        assert_eq!(specs.len(), 1);
        assert_eq!(specs[0].substr.as_deref(), Some("FAIL"));
    }

    #[tokio::test]
    async fn load_rule_set_strict_fails_on_invalid_spec() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("rules.yml");
        // severity 누락
        std::fs::write(&path, "- substr: \"FAIL\"\n").unwrap();
        let result = RuleLoader::load_rule_set(&path, ValidationMode::Strict).await;
        assert!(result.is_err());

        let set = RuleLoader::load_rule_set(&path, ValidationMode::Lenient)
            .await
            .unwrap();
        assert!(set.is_empty());
    }
}
