//! Vector Types - 청크 타입 및 유사도 유틸리티
//!
//! 벡터 스토어에 저장되는 청크, 메타데이터, 검색 결과 타입과
//! 코사인 유사도 계산을 제공합니다.

use std::cmp::Ordering;
use std::collections::BTreeMap;
use std::path::Path;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

// ============================================================================
// Types
// ============================================================================

/// 원본 파일 형식 (닫힌 집합)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FileType {
    /// Markdown 문서 (헤더 구조 청킹)
    Markdown,
    /// 일반 텍스트 (문단 청킹)
    Text,
}

impl FileType {
    /// 확장자로 파일 타입 결정
    pub fn from_extension(ext: &str) -> Option<Self> {
        match ext.to_lowercase().as_str() {
            "md" | "markdown" => Some(Self::Markdown),
            "txt" => Some(Self::Text),
            _ => None,
        }
    }

    /// 파일 경로에서 타입 결정
    pub fn from_path(path: &Path) -> Option<Self> {
        path.extension()
            .and_then(|ext| ext.to_str())
            .and_then(Self::from_extension)
    }

    /// 청킹에 사용할 문서 형식
    pub fn format(self) -> super::chunker::DocumentFormat {
        match self {
            Self::Markdown => super::chunker::DocumentFormat::Structured,
            Self::Text => super::chunker::DocumentFormat::Plain,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Markdown => "markdown",
            Self::Text => "text",
        }
    }
}

/// 항상 존재하는 메타데이터 키 (직렬화 이름)
const RESERVED_METADATA_KEYS: &[&str] = &["source", "section", "fileType", "ingestedAt"];

/// 청크 출처 메타데이터
///
/// `source`, `section`, `fileType`, `ingestedAt`은 항상 존재하며,
/// 그 외 키는 `extra`에 그대로 보존됩니다.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChunkMetadata {
    /// 원본 문서 이름
    pub source: String,
    /// 추론된 섹션 제목
    pub section: String,
    pub file_type: FileType,
    /// 수집 시각 (생성 후 변경되지 않음)
    pub ingested_at: DateTime<Utc>,
    #[serde(flatten)]
    extra: BTreeMap<String, serde_json::Value>,
}

impl ChunkMetadata {
    /// 현재 시각으로 메타데이터 생성
    pub fn new(source: impl Into<String>, section: impl Into<String>, file_type: FileType) -> Self {
        Self {
            source: source.into(),
            section: section.into(),
            file_type,
            ingested_at: Utc::now(),
            extra: BTreeMap::new(),
        }
    }

    /// 추가 메타데이터 키 설정
    ///
    /// 고정 키(`source`, `section`, `fileType`, `ingestedAt`)는 무시됩니다.
    pub fn with_extra(mut self, key: impl Into<String>, value: impl Into<serde_json::Value>) -> Self {
        let key = key.into();
        if RESERVED_METADATA_KEYS.contains(&key.as_str()) {
            tracing::warn!("Ignoring extra metadata key {:?}: reserved", key);
            return self;
        }
        self.extra.insert(key, value.into());
        self
    }

    /// 추가 메타데이터 조회
    pub fn extra(&self, key: &str) -> Option<&serde_json::Value> {
        self.extra.get(key)
    }
}

/// 저장된 청크
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Chunk {
    /// 불변 고유 ID (UUID v4)
    pub id: String,
    /// 청크 텍스트
    pub text: String,
    pub metadata: ChunkMetadata,
    /// 임베딩 벡터 (삽입 시 한 번만 계산)
    pub embedding: Vec<f32>,
}

/// 검색 결과 (유사도는 저장되지 않음)
#[derive(Debug, Clone)]
pub struct SearchResult {
    pub chunk: Chunk,
    /// 코사인 유사도 (-1.0 ~ 1.0, 계산 불가 시 NaN)
    pub similarity: f32,
}

impl SearchResult {
    /// 유사도가 정의된 값인지 여부
    pub fn is_valid(&self) -> bool {
        !self.similarity.is_nan()
    }
}

// ============================================================================
// Utility Functions
// ============================================================================

/// 코사인 유사도 계산
///
/// `dot(a, b) / (|a| * |b|)`. 길이가 다르거나 비어 있거나 크기가 0인 벡터가
/// 있으면 NaN을 반환합니다. 결과는 -1.0 ~ 1.0 범위로 고정됩니다.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() || a.is_empty() {
        return f32::NAN;
    }

    let (mut dot, mut norm_a, mut norm_b) = (0.0f64, 0.0f64, 0.0f64);
    for (x, y) in a.iter().zip(b.iter()) {
        let (x, y) = (f64::from(*x), f64::from(*y));
        dot += x * y;
        norm_a += x * x;
        norm_b += y * y;
    }

    if norm_a == 0.0 || norm_b == 0.0 {
        return f32::NAN;
    }

    let similarity = dot / (norm_a.sqrt() * norm_b.sqrt());
    if similarity.is_nan() {
        return f32::NAN;
    }
    similarity.clamp(-1.0, 1.0) as f32
}

/// 유사도 내림차순 비교 (NaN은 항상 뒤로)
pub fn compare_similarity_desc(a: f32, b: f32) -> Ordering {
    match (a.is_nan(), b.is_nan()) {
        (true, true) => Ordering::Equal,
        (true, false) => Ordering::Greater,
        (false, true) => Ordering::Less,
        (false, false) => b.partial_cmp(&a).unwrap_or(Ordering::Equal),
    }
}

// ============================================================================
// Tests
// ============================================================================
