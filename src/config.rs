//! 설정 모듈 - 환경변수 기반 설정
//!
//! 데이터 디렉토리, 임베딩 프로바이더, 답변 생성 프로바이더 설정을 모읍니다.
//! API 키가 하나도 없으면 오프라인 모드(폴백 임베딩 + 고정 답변)로 동작합니다.

use std::path::PathBuf;
use std::time::Duration;

// ============================================================================
// Constants
// ============================================================================

/// 데이터 디렉토리 오버라이드 환경변수
pub const DATA_DIR_ENV: &str = "ELDERCARE_RAG_DATA_DIR";

/// OpenAI 호환 API 기본 URL
pub const DEFAULT_OPENAI_BASE_URL: &str = "https://api.openai.com/v1";

/// 기본 임베딩 모델 (1536 차원)
/// ref: https://platform.openai.com/docs/guides/embeddings
pub const DEFAULT_EMBEDDING_MODEL: &str = "text-embedding-3-small";

/// 기본 채팅 모델
pub const DEFAULT_CHAT_MODEL: &str = "gpt-4o-mini";

/// 기본 Gemini 생성 모델
pub const DEFAULT_GEMINI_MODEL: &str = "gemini-2.0-flash";

/// 외부 호출 기본 타임아웃
const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

// ============================================================================
// Data Directory
// ============================================================================

/// 데이터 디렉토리 경로 (~/.eldercare-rag/)
///
/// `ELDERCARE_RAG_DATA_DIR`이 설정되어 있으면 그 경로를 사용합니다.
pub fn get_data_dir() -> PathBuf {
    if let Some(dir) = env_non_empty(DATA_DIR_ENV) {
        return PathBuf::from(dir);
    }

    dirs::data_local_dir()
        .or_else(dirs::home_dir)
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".eldercare-rag")
}

/// 비어있지 않은 환경변수 값
pub fn env_non_empty(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|v| !v.trim().is_empty())
}

// ============================================================================
// Config Types
// ============================================================================

/// 임베딩 프로바이더 설정
#[derive(Debug, Clone)]
pub struct EmbeddingConfig {
    /// OpenAI 호환 API 키 (없으면 폴백 임베딩만 사용)
    pub api_key: Option<String>,
    pub base_url: String,
    pub model: String,
    /// 출력 차원 지정 (없으면 모델 기본값)
    pub dimension: Option<usize>,
    /// 호출당 타임아웃 (초과 시 프로바이더 오류와 동일하게 처리)
    pub timeout: Duration,
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            base_url: DEFAULT_OPENAI_BASE_URL.to_string(),
            model: DEFAULT_EMBEDDING_MODEL.to_string(),
            dimension: None,
            timeout: DEFAULT_TIMEOUT,
        }
    }
}

/// 답변 생성 프로바이더 설정
#[derive(Debug, Clone)]
pub struct GenerationConfig {
    /// Gemini API 키 (1순위)
    pub gemini_api_key: Option<String>,
    pub gemini_model: String,
    /// OpenAI 호환 API 키 (2순위)
    pub openai_api_key: Option<String>,
    pub openai_base_url: String,
    pub openai_model: String,
    pub timeout: Duration,
}

impl Default for GenerationConfig {
    fn default() -> Self {
        Self {
            gemini_api_key: None,
            gemini_model: DEFAULT_GEMINI_MODEL.to_string(),
            openai_api_key: None,
            openai_base_url: DEFAULT_OPENAI_BASE_URL.to_string(),
            openai_model: DEFAULT_CHAT_MODEL.to_string(),
            timeout: Duration::from_secs(60),
        }
    }
}

/// 전체 설정
#[derive(Debug, Clone)]
pub struct RagConfig {
    pub data_dir: PathBuf,
    pub embedding: EmbeddingConfig,
    pub generation: GenerationConfig,
}

impl Default for RagConfig {
    fn default() -> Self {
        Self {
            data_dir: get_data_dir(),
            embedding: EmbeddingConfig::default(),
            generation: GenerationConfig::default(),
        }
    }
}

impl RagConfig {
    /// 환경변수에서 설정 로드
    ///
    /// - `OPENAI_API_KEY`, `OPENAI_BASE_URL`, `EMBEDDING_MODEL`, `EMBEDDING_DIMENSION`, `OPENAI_CHAT_MODEL`
    /// - `GEMINI_API_KEY` > `GOOGLE_AI_API_KEY`, `GEMINI_MODEL`
    pub fn from_env() -> Self {
        let mut config = Self::default();

        let openai_key = env_non_empty("OPENAI_API_KEY");
        let base_url = env_non_empty("OPENAI_BASE_URL")
            .map(|url| url.trim_end_matches('/').to_string())
            .unwrap_or_else(|| DEFAULT_OPENAI_BASE_URL.to_string());

        config.embedding.api_key = openai_key.clone();
        config.embedding.base_url = base_url.clone();
        if let Some(model) = env_non_empty("EMBEDDING_MODEL") {
            config.embedding.model = model;
        }
        match env_non_empty("EMBEDDING_DIMENSION").map(|v| v.trim().parse::<usize>()) {
            Some(Ok(dimension)) if dimension > 0 => config.embedding.dimension = Some(dimension),
            Some(_) => tracing::warn!("Ignoring invalid EMBEDDING_DIMENSION"),
            None => {}
        }

        config.generation.openai_api_key = openai_key;
        config.generation.openai_base_url = base_url;
        if let Some(model) = env_non_empty("OPENAI_CHAT_MODEL") {
            config.generation.openai_model = model;
        }

        config.generation.gemini_api_key =
            env_non_empty("GEMINI_API_KEY").or_else(|| env_non_empty("GOOGLE_AI_API_KEY"));
        if let Some(model) = env_non_empty("GEMINI_MODEL") {
            config.generation.gemini_model = model;
        }

        config
    }

    /// 벡터 스토어 스냅샷 경로
    pub fn vector_store_path(&self) -> PathBuf {
        self.data_dir.join("vector_store.json")
    }

    /// 공문서/FAQ DB 경로
    pub fn documents_db_path(&self) -> PathBuf {
        self.data_dir.join("documents.db")
    }

    /// 실제 임베딩 프로바이더 설정 여부
    pub fn has_embedding_key(&self) -> bool {
        self.embedding.api_key.is_some()
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_is_offline() {
        let config = RagConfig {
            data_dir: PathBuf::from("/tmp/rag"),
            ..Default::default()
        };
        assert!(!config.has_embedding_key());
        assert!(config.generation.gemini_api_key.is_none());
        assert_eq!(config.embedding.model, DEFAULT_EMBEDDING_MODEL);
    }

    #[test]
    fn test_artifact_paths() {
        let config = RagConfig {
            data_dir: PathBuf::from("/tmp/rag"),
            ..Default::default()
        };
        assert_eq!(
            config.vector_store_path(),
            PathBuf::from("/tmp/rag/vector_store.json")
        );
        assert_eq!(
            config.documents_db_path(),
            PathBuf::from("/tmp/rag/documents.db")
        );
    }

    #[test]
    fn test_env_non_empty_missing() {
        assert!(env_non_empty("ELDERCARE_RAG_SURELY_UNSET_VARIABLE").is_none());
    }
}
