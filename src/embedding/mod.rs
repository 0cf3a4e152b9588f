//! 임베딩 모듈 - 텍스트 벡터화
//!
//! 텍스트를 고정 길이 벡터로 변환합니다.
//! 외부 프로바이더가 설정되어 있으면 순서대로 시도하고, 모두 실패하면
//! 텍스트 길이만으로 만든 결정적 폴백 벡터를 반환합니다.
//!
//! 폴백 벡터는 의미 정보가 전혀 없습니다. 길이가 같은 두 텍스트는 같은 벡터를
//! 받으므로, 폴백 상태의 유사도 검색 결과는 신뢰할 수 없습니다.
//!
//! ## 사용법
//! ```rust,ignore
//! let embedder = Embedder::from_config(&config.embedding)?;
//! let embedding = embedder.embed("Hello, world!").await;
//! ```

mod openai;

pub use openai::OpenAiEmbedding;

use std::time::Duration;

use anyhow::Result;
use async_trait::async_trait;

use crate::config::EmbeddingConfig;

/// 임베딩 차원 (외부 프로바이더와 폴백이 동일해야 서로 교체 가능)
pub const DEFAULT_DIMENSION: usize = 1536;

// ============================================================================
// EmbeddingProvider Trait
// ============================================================================

/// 임베딩 프로바이더 트레이트
///
/// 텍스트를 벡터로 변환하는 인터페이스입니다.
#[async_trait]
pub trait EmbeddingProvider: Send + Sync {
    /// 단일 텍스트 임베딩
    async fn embed(&self, text: &str) -> Result<Vec<f32>>;

    /// 임베딩 차원 수
    fn dimension(&self) -> usize;

    /// 프로바이더 이름
    fn name(&self) -> &str;
}

// ============================================================================
// Length Fallback
// ============================================================================

/// 길이 기반 폴백 임베딩
///
/// `v[i] = sin(len(text) + i)` (len = 문자 수). 네트워크 없이 동작하지만
/// 의미적이지 않습니다.
#[derive(Debug, Clone, Copy)]
pub struct LengthFallbackEmbedding {
    dimension: usize,
}

impl LengthFallbackEmbedding {
    pub fn new(dimension: usize) -> Self {
        Self { dimension }
    }

    /// 폴백 벡터 계산 (순수 함수)
    pub fn vector(&self, text: &str) -> Vec<f32> {
        let len = text.chars().count() as f64;
        (0..self.dimension)
            .map(|i| (len + i as f64).sin() as f32)
            .collect()
    }
}

impl Default for LengthFallbackEmbedding {
    fn default() -> Self {
        Self::new(DEFAULT_DIMENSION)
    }
}

#[async_trait]
impl EmbeddingProvider for LengthFallbackEmbedding {
    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        Ok(self.vector(text))
    }

    fn dimension(&self) -> usize {
        self.dimension
    }

    fn name(&self) -> &str {
        "length-fallback"
    }
}

// ============================================================================
// Embedder
// ============================================================================

/// 임베딩 출처
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EmbeddingSource {
    /// 외부 프로바이더 (이름)
    Provider(String),
    /// 길이 기반 폴백
    Fallback,
}

/// 출처가 붙은 임베딩 결과
#[derive(Debug, Clone)]
pub struct Embedded {
    pub vector: Vec<f32>,
    pub source: EmbeddingSource,
}

impl Embedded {
    pub fn is_fallback(&self) -> bool {
        self.source == EmbeddingSource::Fallback
    }
}

/// 임베더 - 호출자에게 절대 실패를 돌려주지 않는 임베딩 단계
///
/// 프로바이더를 우선순위대로 시도합니다. 전송 오류, 2xx 외 응답, 파싱 실패,
/// 타임아웃은 모두 경고 로그 후 다음 단계로 넘어갑니다.
pub struct Embedder {
    providers: Vec<Box<dyn EmbeddingProvider>>,
    fallback: LengthFallbackEmbedding,
    timeout: Duration,
}

impl Embedder {
    /// 프로바이더 목록으로 생성
    ///
    /// 폴백 벡터 차원은 1순위 프로바이더의 차원을 따릅니다.
    pub fn new(providers: Vec<Box<dyn EmbeddingProvider>>, timeout: Duration) -> Self {
        let dimension = providers
            .first()
            .map_or(DEFAULT_DIMENSION, |p| p.dimension());

        Self {
            providers,
            fallback: LengthFallbackEmbedding::new(dimension),
            timeout,
        }
    }

    /// 외부 프로바이더 없이 폴백만 사용
    pub fn offline() -> Self {
        Self::new(Vec::new(), Duration::from_secs(30))
    }

    /// 설정에서 생성
    ///
    /// API 키가 없으면 오프라인 임베더를 만들고 경고를 남깁니다.
    pub fn from_config(config: &EmbeddingConfig) -> Result<Self> {
        let mut providers: Vec<Box<dyn EmbeddingProvider>> = Vec::new();

        if let Some(provider) = OpenAiEmbedding::from_config(config)? {
            tracing::info!(
                "Using embedding provider {} (dimension: {})",
                provider.name(),
                provider.dimension()
            );
            providers.push(Box::new(provider));
        } else {
            tracing::warn!(
                "No embedding API key configured; using length-based fallback embeddings. \
                 Similarity results will be unreliable."
            );
        }

        Ok(Self::new(providers, config.timeout))
    }

    /// 실제 프로바이더가 하나도 없는지 여부
    ///
    /// true면 모든 임베딩이 폴백이므로 검색 결과를 신뢰할 수 없습니다.
    pub fn is_offline(&self) -> bool {
        self.providers.is_empty()
    }

    /// 임베딩 차원
    pub fn dimension(&self) -> usize {
        self.fallback.dimension()
    }

    /// 텍스트 임베딩 (실패하지 않음)
    pub async fn embed(&self, text: &str) -> Vec<f32> {
        self.embed_tagged(text).await.vector
    }

    /// 출처 정보와 함께 임베딩
    pub async fn embed_tagged(&self, text: &str) -> Embedded {
        for provider in &self.providers {
            match tokio::time::timeout(self.timeout, provider.embed(text)).await {
                Ok(Ok(vector)) => {
                    return Embedded {
                        vector,
                        source: EmbeddingSource::Provider(provider.name().to_string()),
                    };
                }
                Ok(Err(e)) => {
                    tracing::warn!("Embedding provider {} failed: {:#}", provider.name(), e);
                }
                Err(_) => {
                    tracing::warn!(
                        "Embedding provider {} timed out after {:?}",
                        provider.name(),
                        self.timeout
                    );
                }
            }
        }

        tracing::warn!(
            "Using length-based fallback embedding ({} chars); retrieval quality is degraded",
            text.chars().count()
        );

        Embedded {
            vector: self.fallback.vector(text),
            source: EmbeddingSource::Fallback,
        }
    }
}

impl std::fmt::Debug for Embedder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let names: Vec<&str> = self.providers.iter().map(|p| p.name()).collect();
        f.debug_struct("Embedder")
            .field("providers", &names)
            .field("timeout", &self.timeout)
            .finish()
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct FailingProvider;

    #[async_trait]
    impl EmbeddingProvider for FailingProvider {
        async fn embed(&self, _text: &str) -> Result<Vec<f32>> {
            anyhow::bail!("provider down")
        }

        fn dimension(&self) -> usize {
            DEFAULT_DIMENSION
        }

        fn name(&self) -> &str {
            "failing"
        }
    }

    struct SlowProvider;

    #[async_trait]
    impl EmbeddingProvider for SlowProvider {
        async fn embed(&self, _text: &str) -> Result<Vec<f32>> {
            tokio::time::sleep(Duration::from_secs(5)).await;
            Ok(vec![1.0; DEFAULT_DIMENSION])
        }

        fn dimension(&self) -> usize {
            DEFAULT_DIMENSION
        }

        fn name(&self) -> &str {
            "slow"
        }
    }

    struct FixedProvider(Vec<f32>);

    #[async_trait]
    impl EmbeddingProvider for FixedProvider {
        async fn embed(&self, _text: &str) -> Result<Vec<f32>> {
            Ok(self.0.clone())
        }

        fn dimension(&self) -> usize {
            self.0.len()
        }

        fn name(&self) -> &str {
            "fixed"
        }
    }

    /// 첫 호출만 성공하고 이후 실패하는 프로바이더
    struct FlakyProvider {
        calls: AtomicUsize,
        dimension: usize,
    }

    #[async_trait]
    impl EmbeddingProvider for FlakyProvider {
        async fn embed(&self, _text: &str) -> Result<Vec<f32>> {
            if self.calls.fetch_add(1, Ordering::SeqCst) == 0 {
                Ok(vec![0.5; self.dimension])
            } else {
                anyhow::bail!("transient failure")
            }
        }

        fn dimension(&self) -> usize {
            self.dimension
        }

        fn name(&self) -> &str {
            "flaky"
        }
    }

    #[test]
    fn test_fallback_depends_only_on_length() {
        let fallback = LengthFallbackEmbedding::default();
        let a = fallback.vector("abcde");
        let b = fallback.vector("vwxyz");
        assert_eq!(a.len(), DEFAULT_DIMENSION);
        assert_eq!(
            a.iter().map(|x| x.to_bits()).collect::<Vec<_>>(),
            b.iter().map(|x| x.to_bits()).collect::<Vec<_>>()
        );
    }

    #[test]
    fn test_fallback_differs_by_length() {
        let fallback = LengthFallbackEmbedding::default();
        assert_ne!(fallback.vector("abc"), fallback.vector("abcd"));
    }

    #[test]
    fn test_fallback_formula() {
        let fallback = LengthFallbackEmbedding::new(3);
        let v = fallback.vector("안녕"); // 2 chars
        assert!((v[0] - 2f64.sin() as f32).abs() < 1e-6);
        assert!((v[2] - 4f64.sin() as f32).abs() < 1e-6);
    }

    #[tokio::test]
    async fn test_offline_embedder_uses_fallback() {
        let embedder = Embedder::offline();
        assert!(embedder.is_offline());

        let embedded = embedder.embed_tagged("요양보호사 배치 기준").await;
        assert!(embedded.is_fallback());
        assert_eq!(embedded.vector.len(), DEFAULT_DIMENSION);
    }

    #[tokio::test]
    async fn test_provider_error_falls_back() {
        let embedder = Embedder::new(vec![Box::new(FailingProvider)], Duration::from_secs(1));
        assert!(!embedder.is_offline());

        let embedded = embedder.embed_tagged("hello").await;
        assert!(embedded.is_fallback());
        assert_eq!(
            embedded.vector,
            LengthFallbackEmbedding::default().vector("hello")
        );
    }

    #[tokio::test]
    async fn test_timeout_treated_as_failure() {
        let embedder = Embedder::new(vec![Box::new(SlowProvider)], Duration::from_millis(20));
        let embedded = embedder.embed_tagged("hello").await;
        assert!(embedded.is_fallback());
    }

    #[tokio::test]
    async fn test_provider_vector_returned_verbatim() {
        let embedder = Embedder::new(
            vec![
                Box::new(FailingProvider),
                Box::new(FixedProvider(vec![0.5, -0.25])),
            ],
            Duration::from_secs(1),
        );
        let embedded = embedder.embed_tagged("hello").await;
        assert_eq!(embedded.vector, vec![0.5, -0.25]);
        assert_eq!(
            embedded.source,
            EmbeddingSource::Provider("fixed".to_string())
        );
    }

    #[tokio::test]
    async fn test_fallback_matches_provider_dimension() {
        let embedder = Embedder::new(
            vec![Box::new(FlakyProvider {
                calls: AtomicUsize::new(0),
                dimension: 3072,
            })],
            Duration::from_secs(1),
        );
        assert_eq!(embedder.dimension(), 3072);

        let first = embedder.embed_tagged("first chunk").await;
        let second = embedder.embed_tagged("second chunk").await;
        assert!(!first.is_fallback());
        assert!(second.is_fallback());
        assert_eq!(first.vector.len(), second.vector.len());
    }

    #[test]
    fn test_from_config_without_key_is_offline() {
        let embedder = Embedder::from_config(&EmbeddingConfig::default()).unwrap();
        assert!(embedder.is_offline());
    }
}
