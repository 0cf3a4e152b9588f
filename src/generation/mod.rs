//! 답변 생성 모듈 - 우선순위 프로바이더 체인
//!
//! 생성 백엔드를 순서대로 시도합니다: Gemini → OpenAI 호환 → 고정 답변.
//! 각 백엔드 실패는 로그만 남기고 다음으로 넘어갑니다.

mod gemini;
mod openai;

pub use gemini::GeminiGenerator;
pub use openai::OpenAiGenerator;

use anyhow::Result;
use async_trait::async_trait;

use crate::config::GenerationConfig;

/// 모든 프로바이더 실패 시 고정 답변
pub const CANNED_ANSWER: &str = "현재 자동 답변을 생성할 수 없습니다. \
관련 공문서를 확인하시거나 담당 부서로 문의해 주시기 바랍니다.";

// ============================================================================
// Types
// ============================================================================

/// 생성 입력
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GenerationPrompt {
    pub system: String,
    pub user: String,
}

/// 생성 결과
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Generated {
    pub text: String,
    /// 실제로 답을 만든 백엔드 이름
    pub provider: String,
}

// ============================================================================
// AnswerGenerator Trait
// ============================================================================

/// 답변 생성 백엔드 트레이트
#[async_trait]
pub trait AnswerGenerator: Send + Sync {
    async fn generate(&self, prompt: &GenerationPrompt) -> Result<String>;

    fn name(&self) -> &str;
}

// ============================================================================
// CannedGenerator
// ============================================================================

/// 고정 답변 백엔드 (순수, 항상 성공)
#[derive(Debug, Clone)]
pub struct CannedGenerator {
    text: String,
}

impl CannedGenerator {
    pub fn new(text: impl Into<String>) -> Self {
        Self { text: text.into() }
    }
}

impl Default for CannedGenerator {
    fn default() -> Self {
        Self::new(CANNED_ANSWER)
    }
}

#[async_trait]
impl AnswerGenerator for CannedGenerator {
    async fn generate(&self, _prompt: &GenerationPrompt) -> Result<String> {
        Ok(self.text.clone())
    }

    fn name(&self) -> &str {
        "canned"
    }
}

// ============================================================================
// GeneratorChain
// ============================================================================

/// 우선순위 생성 체인
pub struct GeneratorChain {
    backends: Vec<Box<dyn AnswerGenerator>>,
}

impl GeneratorChain {
    /// 백엔드 목록으로 생성 (앞쪽이 우선)
    pub fn new(backends: Vec<Box<dyn AnswerGenerator>>) -> Self {
        Self { backends }
    }

    /// 고정 답변만 쓰는 체인
    pub fn canned_only() -> Self {
        Self::new(vec![Box::new(CannedGenerator::default())])
    }

    /// 설정에서 생성: Gemini → OpenAI → 고정 답변 (키 없는 백엔드는 제외)
    pub fn from_config(config: &GenerationConfig) -> Result<Self> {
        let mut backends: Vec<Box<dyn AnswerGenerator>> = Vec::new();

        if let Some(ref key) = config.gemini_api_key {
            backends.push(Box::new(GeminiGenerator::new(
                key.clone(),
                config.gemini_model.clone(),
                config.timeout,
            )?));
        }

        if let Some(ref key) = config.openai_api_key {
            backends.push(Box::new(OpenAiGenerator::new(
                key.clone(),
                &config.openai_base_url,
                config.openai_model.clone(),
                config.timeout,
            )?));
        }

        if backends.is_empty() {
            tracing::warn!("No generation API key configured; answers will use canned text");
        }

        backends.push(Box::new(CannedGenerator::default()));
        Ok(Self::new(backends))
    }

    /// 백엔드 이름 목록 (우선순위 순)
    pub fn backend_names(&self) -> Vec<&str> {
        self.backends.iter().map(|b| b.name()).collect()
    }

    /// 순서대로 시도해서 첫 성공 결과 반환
    pub async fn generate(&self, prompt: &GenerationPrompt) -> Result<Generated> {
        let mut last_error: Option<anyhow::Error> = None;

        for (idx, backend) in self.backends.iter().enumerate() {
            match backend.generate(prompt).await {
                Ok(text) => {
                    if idx > 0 {
                        tracing::info!("Generation fell through to {}", backend.name());
                    }
                    return Ok(Generated {
                        text,
                        provider: backend.name().to_string(),
                    });
                }
                Err(e) => {
                    tracing::warn!("Generation backend {} failed: {:#}", backend.name(), e);
                    last_error = Some(e);
                }
            }
        }

        Err(last_error.unwrap_or_else(|| anyhow::anyhow!("No generation backends configured")))
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    struct FailingGenerator;

    #[async_trait]
    impl AnswerGenerator for FailingGenerator {
        async fn generate(&self, _prompt: &GenerationPrompt) -> Result<String> {
            anyhow::bail!("backend down")
        }

        fn name(&self) -> &str {
            "failing"
        }
    }

    struct EchoGenerator;

    #[async_trait]
    impl AnswerGenerator for EchoGenerator {
        async fn generate(&self, prompt: &GenerationPrompt) -> Result<String> {
            Ok(format!("echo: {}", prompt.user))
        }

        fn name(&self) -> &str {
            "echo"
        }
    }

    fn prompt() -> GenerationPrompt {
        GenerationPrompt {
            system: "system".to_string(),
            user: "질문".to_string(),
        }
    }

    #[tokio::test]
    async fn test_first_success_wins() {
        let chain = GeneratorChain::new(vec![
            Box::new(EchoGenerator),
            Box::new(CannedGenerator::default()),
        ]);
        let result = chain.generate(&prompt()).await.unwrap();
        assert_eq!(result.provider, "echo");
        assert_eq!(result.text, "echo: 질문");
    }

    #[tokio::test]
    async fn test_failures_fall_through_to_canned() {
        let chain = GeneratorChain::new(vec![
            Box::new(FailingGenerator),
            Box::new(FailingGenerator),
            Box::new(CannedGenerator::default()),
        ]);
        let result = chain.generate(&prompt()).await.unwrap();
        assert_eq!(result.provider, "canned");
        assert_eq!(result.text, CANNED_ANSWER);
    }

    #[tokio::test]
    async fn test_all_exhausted_is_error() {
        let chain = GeneratorChain::new(vec![Box::new(FailingGenerator)]);
        assert!(chain.generate(&prompt()).await.is_err());

        let empty = GeneratorChain::new(Vec::new());
        assert!(empty.generate(&prompt()).await.is_err());
    }

    #[test]
    fn test_from_config_without_keys() {
        let chain = GeneratorChain::from_config(&GenerationConfig::default()).unwrap();
        assert_eq!(chain.backend_names(), vec!["canned"]);
    }

    #[test]
    fn test_from_config_priority_order() {
        let config = GenerationConfig {
            gemini_api_key: Some("g".to_string()),
            openai_api_key: Some("o".to_string()),
            ..Default::default()
        };
        let chain = GeneratorChain::from_config(&config).unwrap();
        let names = chain.backend_names();
        assert_eq!(names.len(), 3);
        assert!(names[0].starts_with("gemini"));
        assert_eq!(names[2], "canned");
    }
}
