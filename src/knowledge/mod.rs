//! Knowledge 모듈 - 벡터 검색 기반 지식 저장소
//!
//! - Chunker: 헤딩/문단 단위 텍스트 분할
//! - VectorStore: JSON 스냅샷 + 코사인 top-K 전수 검색
//! - Orchestrator: FAQ 캐시 확인 후 검색 컨텍스트로 답변 생성

mod chunker;
mod orchestrator;
mod store;
mod vector;

// Re-exports
pub use chunker::{
    chunk_document, chunker_for, infer_section, ChunkCandidate, ChunkConfig, Chunker,
    DocumentFormat, PlainChunker, StructuredChunker, DEFAULT_SECTION,
};
pub use orchestrator::{
    AnswerSource, DraftAnswer, DraftRequest, InstantAnswer, PriorQa, RetrievalOrchestrator,
};
pub use store::{SearchOutcome, StoreError, StoreStats, VectorStore, DEFAULT_TOP_K};
pub use vector::{
    compare_similarity_desc, cosine_similarity, Chunk, ChunkMetadata, FileType, SearchResult,
};
