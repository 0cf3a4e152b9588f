//! eldercare-rag - 노인복지 민원 답변 검색 코어
//!
//! 원문 문서를 청킹해서 JSON 벡터 저장소에 적재하고, 질문이 들어오면
//! 승인된 FAQ 캐시를 먼저 확인한 뒤 코사인 top-K 검색 결과로 답변 생성
//! 컨텍스트를 조립합니다.

pub mod cli;
pub mod collector;
pub mod config;
pub mod documents;
pub mod embedding;
pub mod faq;
pub mod generation;
pub mod knowledge;

// Re-exports
pub use collector::{collect_sources, ingest_paths, CollectedFile, IngestReport};
pub use config::{get_data_dir, RagConfig};
pub use documents::{DocumentSource, FaqEntry, FaqStatus, OfficialDocument, SqliteDocumentStore};
pub use embedding::{Embedder, EmbeddingProvider, LengthFallbackEmbedding, OpenAiEmbedding};
pub use faq::{tokenize, FaqMatcher};
pub use generation::{AnswerGenerator, GenerationPrompt, Generated, GeneratorChain};
pub use knowledge::{
    chunk_document, AnswerSource, Chunk, ChunkMetadata, Chunker, DocumentFormat, DraftAnswer,
    DraftRequest, FileType, InstantAnswer, RetrievalOrchestrator, SearchResult, StoreError,
    VectorStore,
};
