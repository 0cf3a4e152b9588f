//! OpenAI 호환 임베딩 프로바이더
//!
//! ref: https://platform.openai.com/docs/api-reference/embeddings
//!
//! 요청 `{input, model}` → 응답 `data[0].embedding`.
//! 2xx가 아닌 응답은 모두 실패로 처리하며, 429만 지수 백오프로 재시도합니다.

use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use super::{EmbeddingProvider, DEFAULT_DIMENSION};
use crate::config::EmbeddingConfig;

/// 429 에러 시 최대 재시도 횟수
const MAX_RETRIES: u32 = 2;
/// 재시도 시 초기 백오프 (ms)
const INITIAL_BACKOFF_MS: u64 = 1000;

/// 모델별 기본 임베딩 차원
pub fn model_dimension(model: &str) -> Option<usize> {
    match model {
        "text-embedding-3-large" => Some(3072),
        "text-embedding-3-small" | "text-embedding-ada-002" => Some(1536),
        _ => None,
    }
}

/// OpenAI 호환 임베딩 구현체
#[derive(Debug)]
pub struct OpenAiEmbedding {
    api_key: String,
    endpoint: String,
    model: String,
    dimension: usize,
    /// 요청에 `dimensions`로 실어 보낼 차원 (명시적으로 지정한 경우만)
    requested_dimension: Option<usize>,
    client: reqwest::Client,
}

impl OpenAiEmbedding {
    /// 새 임베딩 인스턴스 생성
    ///
    /// # Arguments
    /// * `api_key` - API 키
    /// * `base_url` - API 기본 URL (예: `https://api.openai.com/v1`)
    /// * `model` - 임베딩 모델 이름
    pub fn new(api_key: String, base_url: &str, model: String) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .context("Failed to create HTTP client")?;

        Ok(Self {
            api_key,
            endpoint: format!("{}/embeddings", base_url.trim_end_matches('/')),
            dimension: model_dimension(&model).unwrap_or(DEFAULT_DIMENSION),
            requested_dimension: None,
            model,
            client,
        })
    }

    /// 출력 차원 지정 (text-embedding-3 계열의 `dimensions` 파라미터)
    pub fn with_dimension(mut self, dimension: usize) -> Self {
        self.dimension = dimension;
        self.requested_dimension = Some(dimension);
        self
    }

    /// 설정에서 생성 (API 키가 없으면 None)
    pub fn from_config(config: &EmbeddingConfig) -> Result<Option<Self>> {
        let key = match config.api_key {
            Some(ref key) => key.clone(),
            None => return Ok(None),
        };

        let embedding = Self::new(key, &config.base_url, config.model.clone())?;
        Ok(Some(match config.dimension {
            Some(dimension) => embedding.with_dimension(dimension),
            None => embedding,
        }))
    }

    /// 요청 엔드포인트
    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }
}

#[derive(Debug, Serialize)]
struct EmbedRequest<'a> {
    input: &'a str,
    model: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    dimensions: Option<usize>,
}

#[derive(Debug, Deserialize)]
struct EmbedResponse {
    data: Vec<EmbedData>,
}

#[derive(Debug, Deserialize)]
struct EmbedData {
    embedding: Vec<f32>,
}

#[derive(Debug, Deserialize)]
struct ApiError {
    error: ApiErrorDetail,
}

#[derive(Debug, Deserialize)]
struct ApiErrorDetail {
    message: String,
}

#[async_trait]
impl EmbeddingProvider for OpenAiEmbedding {
    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        let request = EmbedRequest {
            input: text,
            model: &self.model,
            dimensions: self.requested_dimension,
        };

        for attempt in 0..=MAX_RETRIES {
            let response = self
                .client
                .post(&self.endpoint)
                .bearer_auth(&self.api_key)
                .json(&request)
                .send()
                .await
                .context("Failed to send embedding request")?;

            let status = response.status();
            let body = response
                .text()
                .await
                .context("Failed to read response body")?;

            if status.is_success() {
                let parsed: EmbedResponse =
                    serde_json::from_str(&body).context("Failed to parse embedding response")?;
                return parsed
                    .data
                    .into_iter()
                    .next()
                    .map(|d| d.embedding)
                    .ok_or_else(|| anyhow::anyhow!("Embedding response contained no data"));
            }

            if status.as_u16() == 429 && attempt < MAX_RETRIES {
                let backoff = Duration::from_millis(INITIAL_BACKOFF_MS * 2u64.pow(attempt));
                tracing::warn!(
                    "Rate limit hit (429), backing off {:?} (attempt {}/{})",
                    backoff,
                    attempt + 1,
                    MAX_RETRIES
                );
                tokio::time::sleep(backoff).await;
                continue;
            }

            if let Ok(error) = serde_json::from_str::<ApiError>(&body) {
                anyhow::bail!("Embedding API error ({}): {}", status, error.error.message);
            }
            anyhow::bail!("Embedding API error ({}): {}", status, body);
        }

        anyhow::bail!("Embedding failed after {} retries", MAX_RETRIES)
    }

    fn dimension(&self) -> usize {
        self.dimension
    }

    fn name(&self) -> &str {
        &self.model
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    const DEFAULT_BASE: &str = "https://api.openai.com/v1";

    #[test]
    fn test_endpoint_joins_base_url() {
        let embedder = OpenAiEmbedding::new(
            "fake_key".to_string(),
            "https://api.example.com/v1/",
            "text-embedding-3-small".to_string(),
        )
        .unwrap();
        assert_eq!(embedder.endpoint(), "https://api.example.com/v1/embeddings");
        assert_eq!(embedder.name(), "text-embedding-3-small");
    }

    #[test]
    fn test_from_config_without_key() {
        let config = EmbeddingConfig::default();
        assert!(OpenAiEmbedding::from_config(&config).unwrap().is_none());
    }

    #[test]
    fn test_request_shape() {
        let request = EmbedRequest {
            input: "대상자 기준",
            model: "text-embedding-3-small",
            dimensions: None,
        };
        let json = serde_json::to_value(&request).unwrap();
        assert_eq!(json["input"], "대상자 기준");
        assert_eq!(json["model"], "text-embedding-3-small");
        assert!(json.get("dimensions").is_none());
    }

    #[test]
    fn test_dimension_follows_model() {
        let large = OpenAiEmbedding::new(
            "fake_key".to_string(),
            DEFAULT_BASE,
            "text-embedding-3-large".to_string(),
        )
        .unwrap();
        assert_eq!(large.dimension(), 3072);

        let unknown =
            OpenAiEmbedding::new("fake_key".to_string(), DEFAULT_BASE, "custom".to_string())
                .unwrap();
        assert_eq!(unknown.dimension(), DEFAULT_DIMENSION);
    }

    #[test]
    fn test_from_config_dimension_override() {
        let config = EmbeddingConfig {
            api_key: Some("fake_key".to_string()),
            model: "text-embedding-3-large".to_string(),
            dimension: Some(256),
            ..Default::default()
        };
        let embedder = OpenAiEmbedding::from_config(&config).unwrap().unwrap();
        assert_eq!(embedder.dimension(), 256);
        assert_eq!(embedder.requested_dimension, Some(256));
    }

    #[test]
    fn test_response_parsing() {
        let body = r#"{"object":"list","data":[{"object":"embedding","index":0,"embedding":[0.1,0.2]}]}"#;
        let parsed: EmbedResponse = serde_json::from_str(body).unwrap();
        assert_eq!(parsed.data[0].embedding, vec![0.1, 0.2]);
    }

    #[tokio::test]
    async fn test_unreachable_endpoint_is_error() {
        let embedder = OpenAiEmbedding::new(
            "fake_key".to_string(),
            "http://127.0.0.1:9",
            "text-embedding-3-small".to_string(),
        )
        .unwrap();
        assert!(embedder.embed("hello").await.is_err());
    }
}
