//! Vector Store - JSON 스냅샷 기반 벡터 저장소
//!
//! 청크 전체를 메모리에 두고, `save()` 때마다 단일 JSON 파일로 통째로 씁니다.
//! 검색은 모든 청크를 훑는 코사인 유사도 완전 탐색입니다.
//! 저장 위치: ~/.eldercare-rag/vector_store.json

use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use serde::Serialize;
use thiserror::Error;

use crate::embedding::Embedder;

use super::vector::{compare_similarity_desc, cosine_similarity, Chunk, ChunkMetadata, SearchResult};

/// 기본 검색 결과 수
pub const DEFAULT_TOP_K: usize = 3;

// ============================================================================
// Errors
// ============================================================================

/// 벡터 스토어 오류
#[derive(Debug, Error)]
pub enum StoreError {
    /// 파일 I/O 실패
    #[error("vector store I/O error at {path:?}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// 스냅샷이 존재하지만 읽을 수 없음 (조용히 비우지 않음)
    #[error("vector store snapshot at {path:?} is corrupt: {reason}")]
    Corrupt { path: PathBuf, reason: String },

    #[error("failed to serialize vector store: {0}")]
    Serialize(#[from] serde_json::Error),

    /// 기존 청크와 임베딩 차원이 다름
    #[error("embedding dimension mismatch: store has {expected}, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },

    #[error("chunk text must not be empty")]
    EmptyText,
}

// ============================================================================
// Types
// ============================================================================

/// 검색 결과와 쿼리 임베딩 출처
#[derive(Debug, Clone, Default)]
pub struct SearchOutcome {
    pub results: Vec<SearchResult>,
    /// 쿼리가 폴백 임베딩으로 계산됨 (유사도 순위 신뢰 불가)
    pub fallback_query: bool,
}

/// 저장소 통계
#[derive(Debug, Clone, Serialize)]
pub struct StoreStats {
    pub chunk_count: usize,
    pub source_count: usize,
    pub dimension: Option<usize>,
    pub path: PathBuf,
}

// ============================================================================
// VectorStore
// ============================================================================

/// 벡터 저장소
///
/// 명시적으로 생성해서 사용하는 쪽에 넘겨 주는 객체입니다. `load`/`save`는
/// 소유한 프로세스가 직접 호출합니다. 변경은 `&mut self`로만 가능하므로
/// 한 번에 하나의 작성자만 존재합니다.
pub struct VectorStore {
    path: PathBuf,
    chunks: Vec<Chunk>,
    loaded: bool,
    embedder: Arc<Embedder>,
}

impl VectorStore {
    /// 저장소 생성 (아직 로드하지 않음)
    ///
    /// # Arguments
    /// * `path` - JSON 스냅샷 파일 경로
    /// * `embedder` - 삽입/검색에 사용할 임베더
    pub fn new(path: impl Into<PathBuf>, embedder: Arc<Embedder>) -> Self {
        Self {
            path: path.into(),
            chunks: Vec::new(),
            loaded: false,
            embedder,
        }
    }

    /// 스냅샷 경로
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// 사용 중인 임베더
    pub fn embedder(&self) -> &Embedder {
        &self.embedder
    }

    pub fn is_loaded(&self) -> bool {
        self.loaded
    }

    pub fn len(&self) -> usize {
        self.chunks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.chunks.is_empty()
    }

    /// 삽입 순서대로의 청크
    pub fn chunks(&self) -> &[Chunk] {
        &self.chunks
    }

    /// 저장된 임베딩 차원 (비어 있으면 None)
    pub fn dimension(&self) -> Option<usize> {
        self.chunks.first().map(|c| c.embedding.len())
    }

    /// 스냅샷을 메모리로 읽기
    ///
    /// 파일이 없으면 빈 저장소로 시작합니다. 파일이 있는데 파싱할 수 없으면
    /// `StoreError::Corrupt`를 반환하고 메모리 상태는 그대로 둡니다.
    pub async fn load(&mut self) -> Result<(), StoreError> {
        let bytes = match tokio::fs::read(&self.path).await {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::info!("No vector store at {:?}; starting empty", self.path);
                self.chunks.clear();
                self.loaded = true;
                return Ok(());
            }
            Err(e) => {
                return Err(StoreError::Io {
                    path: self.path.clone(),
                    source: e,
                })
            }
        };

        let chunks: Vec<Chunk> =
            serde_json::from_slice(&bytes).map_err(|e| StoreError::Corrupt {
                path: self.path.clone(),
                reason: e.to_string(),
            })?;

        if let Some(first) = chunks.first() {
            let expected = first.embedding.len();
            if let Some(bad) = chunks.iter().find(|c| c.embedding.len() != expected) {
                return Err(StoreError::Corrupt {
                    path: self.path.clone(),
                    reason: format!(
                        "chunk {} has dimension {}, expected {}",
                        bad.id,
                        bad.embedding.len(),
                        expected
                    ),
                });
            }
        }

        tracing::info!("Loaded {} chunks from {:?}", chunks.len(), self.path);
        self.chunks = chunks;
        self.loaded = true;
        Ok(())
    }

    /// 아직 로드하지 않았다면 로드
    pub async fn ensure_loaded(&mut self) -> Result<(), StoreError> {
        if !self.loaded {
            self.load().await?;
        }
        Ok(())
    }

    /// 메모리 상태를 스냅샷으로 저장 (전체 덮어쓰기)
    ///
    /// 임시 파일에 쓴 뒤 rename하므로 중간에 실패해도 이전 스냅샷이 남습니다.
    pub async fn save(&mut self) -> Result<(), StoreError> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                tokio::fs::create_dir_all(parent)
                    .await
                    .map_err(|e| StoreError::Io {
                        path: parent.to_path_buf(),
                        source: e,
                    })?;
            }
        }

        let bytes = serde_json::to_vec(&self.chunks)?;

        let tmp_path = self.path.with_extension("json.tmp");
        tokio::fs::write(&tmp_path, &bytes)
            .await
            .map_err(|e| StoreError::Io {
                path: tmp_path.clone(),
                source: e,
            })?;
        tokio::fs::rename(&tmp_path, &self.path)
            .await
            .map_err(|e| StoreError::Io {
                path: self.path.clone(),
                source: e,
            })?;

        self.loaded = true;
        tracing::info!("Saved {} chunks to {:?}", self.chunks.len(), self.path);
        Ok(())
    }

    /// 청크 추가 (임베딩 후 메모리에 append, 저장은 하지 않음)
    ///
    /// 임베딩이 폴백으로 떨어져도 성공합니다. 중복 제거는 하지 않습니다.
    pub async fn add_document(
        &mut self,
        text: &str,
        metadata: ChunkMetadata,
    ) -> Result<&Chunk, StoreError> {
        if text.trim().is_empty() {
            return Err(StoreError::EmptyText);
        }

        let embedding = self.embedder.embed(text).await;

        if let Some(expected) = self.dimension() {
            if embedding.len() != expected {
                return Err(StoreError::DimensionMismatch {
                    expected,
                    actual: embedding.len(),
                });
            }
        }

        let chunk = Chunk {
            id: uuid::Uuid::new_v4().to_string(),
            text: text.to_string(),
            metadata,
            embedding,
        };

        tracing::debug!(
            "Added chunk {} (source={}, section={})",
            chunk.id,
            chunk.metadata.source,
            chunk.metadata.section
        );

        self.chunks.push(chunk);
        let index = self.chunks.len() - 1;
        Ok(&self.chunks[index])
    }

    /// 쿼리와 가장 유사한 청크 top_k개 검색
    ///
    /// 유사도 내림차순, 동점은 삽입 순서, 계산 불가(NaN)는 맨 뒤.
    pub async fn search(&self, query: &str, top_k: usize) -> Vec<SearchResult> {
        self.search_tagged(query, top_k).await.results
    }

    /// `search`와 같지만 쿼리 임베딩이 폴백이었는지도 함께 반환
    pub async fn search_tagged(&self, query: &str, top_k: usize) -> SearchOutcome {
        if self.chunks.is_empty() || top_k == 0 {
            return SearchOutcome::default();
        }

        let embedded = self.embedder.embed_tagged(query).await;
        if embedded.is_fallback() {
            tracing::warn!("Query embedded with fallback; similarity ranking is unreliable");
        }

        SearchOutcome {
            results: self.search_by_embedding(&embedded.vector, top_k),
            fallback_query: embedded.is_fallback(),
        }
    }

    /// 미리 계산된 쿼리 벡터로 검색
    pub fn search_by_embedding(&self, query_embedding: &[f32], top_k: usize) -> Vec<SearchResult> {
        let mut scored: Vec<(usize, f32)> = self
            .chunks
            .iter()
            .enumerate()
            .map(|(i, c)| (i, cosine_similarity(query_embedding, &c.embedding)))
            .collect();

        // stable sort: 동점은 삽입 순서 유지
        scored.sort_by(|a, b| compare_similarity_desc(a.1, b.1));
        scored.truncate(top_k);

        scored
            .into_iter()
            .map(|(i, similarity)| SearchResult {
                chunk: self.chunks[i].clone(),
                similarity,
            })
            .collect()
    }

    /// 저장소 통계
    pub fn stats(&self) -> StoreStats {
        let sources: HashSet<&str> = self
            .chunks
            .iter()
            .map(|c| c.metadata.source.as_str())
            .collect();

        StoreStats {
            chunk_count: self.chunks.len(),
            source_count: sources.len(),
            dimension: self.dimension(),
            path: self.path.clone(),
        }
    }
}

impl std::fmt::Debug for VectorStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("VectorStore")
            .field("path", &self.path)
            .field("chunks", &self.chunks.len())
            .field("loaded", &self.loaded)
            .finish()
    }
}

// ============================================================================
// Tests
// ============================================================================
