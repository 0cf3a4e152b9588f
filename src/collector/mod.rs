//! 수집/적재 모듈
//!
//! 로컬 파일 및 폴더에서 원문 문서를 모아 청킹 → 임베딩 → 벡터 저장소에
//! 적재합니다. .gitignore 패턴을 존중하고, 지원하는 확장자(md, txt)만 수집합니다.
//! 저장은 실행이 끝날 때 한 번만 합니다.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use ignore::WalkBuilder;

use crate::knowledge::{chunk_document, ChunkMetadata, FileType, VectorStore};

/// 최대 파일 크기 (10MB)
pub const MAX_FILE_SIZE: u64 = 10 * 1024 * 1024;

// ============================================================================
// Collected File
// ============================================================================

/// 수집된 원문 파일
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CollectedFile {
    pub path: PathBuf,
    pub file_type: FileType,
    /// 파일 크기 (바이트)
    pub size: u64,
}

impl CollectedFile {
    /// 경로에서 생성 (지원하지 않는 확장자나 파일이 아니면 None)
    pub fn from_path(path: PathBuf) -> Result<Option<Self>> {
        let file_type = match FileType::from_path(&path) {
            Some(ft) => ft,
            None => return Ok(None),
        };

        let metadata = std::fs::metadata(&path)
            .with_context(|| format!("Failed to read metadata: {:?}", path))?;

        if !metadata.is_file() {
            return Ok(None);
        }

        Ok(Some(Self {
            path,
            file_type,
            size: metadata.len(),
        }))
    }

    /// 메타데이터 source로 쓰는 파일 이름
    pub fn source_name(&self) -> String {
        self.path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| self.path.display().to_string())
    }
}

// ============================================================================
// Collection
// ============================================================================

/// 단일 파일 또는 폴더(재귀)에서 원문 파일 수집
///
/// 숨김 파일과 .gitignore 대상은 건너뜁니다. 결과는 경로 순으로 정렬됩니다.
pub fn collect_sources(path: &Path) -> Result<Vec<CollectedFile>> {
    let abs_path = if path.is_absolute() {
        path.to_path_buf()
    } else {
        std::env::current_dir()?.join(path)
    };

    if !abs_path.exists() {
        anyhow::bail!("Path not found: {:?}", abs_path);
    }

    if abs_path.is_file() {
        return match CollectedFile::from_path(abs_path.clone())? {
            Some(file) if is_within_limit(&file) => Ok(vec![file]),
            Some(_) => Ok(Vec::new()),
            None => anyhow::bail!("Unsupported file type: {:?}", abs_path),
        };
    }

    let mut files = Vec::new();

    let walker = WalkBuilder::new(&abs_path)
        .hidden(true)
        .git_ignore(true)
        .git_exclude(true)
        .build();

    for entry in walker {
        let entry = match entry {
            Ok(e) => e,
            Err(e) => {
                tracing::warn!("Failed to read entry: {}", e);
                continue;
            }
        };

        if !entry.file_type().map(|ft| ft.is_file()).unwrap_or(false) {
            continue;
        }

        match CollectedFile::from_path(entry.path().to_path_buf()) {
            Ok(Some(file)) if is_within_limit(&file) => files.push(file),
            Ok(_) => {}
            Err(e) => tracing::warn!("Failed to collect file: {}", e),
        }
    }

    files.sort_by(|a, b| a.path.cmp(&b.path));
    tracing::info!("Collected {} files from {:?}", files.len(), abs_path);
    Ok(files)
}

fn is_within_limit(file: &CollectedFile) -> bool {
    if file.size > MAX_FILE_SIZE {
        tracing::debug!("Skipping large file: {:?} ({} bytes)", file.path, file.size);
        return false;
    }
    true
}

// ============================================================================
// Ingestion
// ============================================================================

/// 적재 결과
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct IngestReport {
    /// 적재된 파일 수
    pub files: usize,
    /// 추가된 청크 수
    pub chunks: usize,
    /// 읽지 못해 건너뛴 파일
    pub skipped: Vec<PathBuf>,
}

/// 파일들을 청킹해서 저장소에 추가하고 한 번 저장
///
/// 읽을 수 없는 파일은 건너뛰고 보고합니다. 저장소 로드/저장 실패는 전체 실패입니다.
pub async fn ingest_paths(store: &mut VectorStore, files: &[CollectedFile]) -> Result<IngestReport> {
    store
        .ensure_loaded()
        .await
        .context("Failed to load vector store")?;

    let mut report = IngestReport::default();

    for file in files {
        let text = match tokio::fs::read_to_string(&file.path).await {
            Ok(text) => text,
            Err(e) => {
                tracing::warn!("Skipping unreadable file {:?}: {}", file.path, e);
                report.skipped.push(file.path.clone());
                continue;
            }
        };

        let source = file.source_name();
        let candidates = chunk_document(&text, file.file_type.format());
        if candidates.is_empty() {
            tracing::debug!("No chunks produced for {}", source);
        }

        for candidate in candidates {
            let metadata = ChunkMetadata::new(source.as_str(), candidate.section, file.file_type);
            store
                .add_document(&candidate.text, metadata)
                .await
                .with_context(|| format!("Failed to add chunk from {}", source))?;
            report.chunks += 1;
        }

        report.files += 1;
        tracing::info!("Ingested {}", source);
    }

    store.save().await.context("Failed to save vector store")?;
    tracing::info!(
        "Ingestion complete: {} files, {} chunks, {} skipped",
        report.files,
        report.chunks,
        report.skipped.len()
    );

    Ok(report)
}

// ============================================================================
// Tests
// ============================================================================
