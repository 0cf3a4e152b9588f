//! CLI 모듈
//!
//! eldercare-rag CLI 명령어 정의 및 구현

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};

use crate::collector::{collect_sources, ingest_paths};
use crate::config::RagConfig;
use crate::documents::{DocumentSource, FaqEntry, FaqStatus, NewDocument, SqliteDocumentStore};
use crate::embedding::Embedder;
use crate::generation::GeneratorChain;
use crate::knowledge::{AnswerSource, DraftRequest, RetrievalOrchestrator, VectorStore};

// ============================================================================
// CLI Definition
// ============================================================================

#[derive(Parser)]
#[command(name = "eldercare-rag")]
#[command(version, about = "노인복지 민원 답변 검색 코어", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// 파일 또는 폴더를 벡터 저장소에 적재
    Ingest {
        /// 적재할 파일 경로
        #[arg(long)]
        file: Option<PathBuf>,

        /// 적재할 폴더 경로 (재귀)
        #[arg(short, long)]
        dir: Option<PathBuf>,
    },

    /// 벡터 저장소 검색
    Query {
        /// 검색 쿼리
        query: String,

        /// 결과 개수
        #[arg(short = 'k', long, default_value = "3")]
        top_k: usize,
    },

    /// 특정 공문서에 대한 즉시 질의 (FAQ 캐시 우선)
    Ask {
        /// 공문서 ID
        #[arg(short, long)]
        document: i64,

        /// 질문
        question: String,
    },

    /// 검색 컨텍스트로 민원 답변 초안 작성
    Draft {
        /// 질문
        question: String,

        /// 관련 공문서 ID
        #[arg(short, long)]
        document: Option<i64>,
    },

    /// 공문서 관리
    #[command(subcommand)]
    Document(DocumentCommand),

    /// FAQ 관리
    #[command(subcommand)]
    Faq(FaqCommand),

    /// 상태 확인
    Status,
}

#[derive(Subcommand)]
pub enum DocumentCommand {
    /// 공문서 추가
    Add {
        #[arg(short, long)]
        title: String,

        /// 문서 번호 (예: 노인정책과-1234)
        #[arg(short, long)]
        number: String,

        /// 본문 파일
        #[arg(short, long)]
        content: PathBuf,
    },

    /// 공문서 목록
    List {
        #[arg(short, long, default_value = "20")]
        limit: usize,
    },
}

#[derive(Subcommand)]
pub enum FaqCommand {
    /// FAQ 추가
    Add {
        /// 공문서 ID
        #[arg(short, long)]
        document: i64,

        #[arg(short, long)]
        question: String,

        #[arg(short, long)]
        answer: String,

        /// pending | approved | rejected
        #[arg(short, long, default_value = "approved", value_parser = parse_status)]
        status: FaqStatus,
    },
}

fn parse_status(s: &str) -> Result<FaqStatus, String> {
    FaqStatus::parse(s).ok_or_else(|| format!("unknown FAQ status: {}", s))
}

// ============================================================================
// CLI Runner
// ============================================================================

/// CLI 명령어 실행
pub async fn run(cli: Cli) -> Result<()> {
    let config = RagConfig::from_env();

    match cli.command {
        Commands::Ingest { file, dir } => cmd_ingest(&config, file, dir).await,
        Commands::Query { query, top_k } => cmd_query(&config, &query, top_k).await,
        Commands::Ask { document, question } => cmd_ask(&config, document, &question).await,
        Commands::Draft { question, document } => cmd_draft(&config, question, document).await,
        Commands::Document(DocumentCommand::Add {
            title,
            number,
            content,
        }) => cmd_document_add(&config, title, number, &content),
        Commands::Document(DocumentCommand::List { limit }) => cmd_document_list(&config, limit),
        Commands::Faq(FaqCommand::Add {
            document,
            question,
            answer,
            status,
        }) => cmd_faq_add(&config, document, question, answer, status),
        Commands::Status => cmd_status(&config).await,
    }
}

fn open_vector_store(config: &RagConfig) -> Result<VectorStore> {
    let embedder = Embedder::from_config(&config.embedding).context("임베더 생성 실패")?;
    if embedder.is_offline() {
        println!("[!] 임베딩 API 키 미설정: 대체 임베딩을 사용합니다 (검색 품질 저하)");
    }
    Ok(VectorStore::new(config.vector_store_path(), Arc::new(embedder)))
}

fn open_orchestrator(config: &RagConfig) -> Result<RetrievalOrchestrator> {
    let store = open_vector_store(config)?;
    let generator = GeneratorChain::from_config(&config.generation).context("생성 체인 구성 실패")?;
    Ok(RetrievalOrchestrator::new(store, generator))
}

fn open_documents(config: &RagConfig) -> Result<SqliteDocumentStore> {
    SqliteDocumentStore::open(&config.documents_db_path()).context("공문서 저장소 열기 실패")
}

// ============================================================================
// Command Implementations
// ============================================================================

/// 적재 명령어 (ingest)
async fn cmd_ingest(config: &RagConfig, file: Option<PathBuf>, dir: Option<PathBuf>) -> Result<()> {
    let target = match (file, dir) {
        (Some(path), None) | (None, Some(path)) => path,
        _ => bail!("--file 또는 --dir 중 하나만 지정해야 합니다"),
    };

    let files = collect_sources(&target)?;
    if files.is_empty() {
        println!("[!] 적재할 파일이 없습니다.");
        return Ok(());
    }

    let total: u64 = files.iter().map(|f| f.size).sum();
    println!("[*] 적재 대상: {} 파일 ({})", files.len(), format_bytes(total as usize));

    let mut store = open_vector_store(config)?;
    let report = ingest_paths(&mut store, &files).await?;

    println!(
        "[OK] 완료: 파일 {}, 청크 {}, 건너뜀 {}",
        report.files,
        report.chunks,
        report.skipped.len()
    );
    for path in &report.skipped {
        println!("     건너뜀: {}", path.display());
    }

    Ok(())
}

/// 검색 명령어 (query)
async fn cmd_query(config: &RagConfig, query: &str, top_k: usize) -> Result<()> {
    println!("[*] 검색 중: \"{}\"", query);

    let mut store = open_vector_store(config)?;
    store.load().await.context("벡터 저장소 로드 실패")?;

    let results = store.search(query, top_k).await;
    if results.is_empty() {
        println!("\n[!] 검색 결과가 없습니다.");
        return Ok(());
    }

    println!("\n[OK] 검색 결과 ({} 건):\n", results.len());

    for (i, result) in results.iter().enumerate() {
        let meta = &result.chunk.metadata;
        let score = if result.is_valid() {
            format!("{:.4}", result.similarity)
        } else {
            "N/A".to_string()
        };

        println!("{}. [유사도: {}] {} > {}", i + 1, score, meta.source, meta.section);
        println!("   내용: {}", truncate_text(&result.chunk.text, 200));
        println!();
    }

    Ok(())
}

/// 즉시 질의 명령어 (ask)
async fn cmd_ask(config: &RagConfig, document_id: i64, question: &str) -> Result<()> {
    let documents = open_documents(config)?;
    let document = documents
        .get_document(document_id)?
        .ok_or_else(|| anyhow::anyhow!("ID {}인 공문서를 찾을 수 없습니다", document_id))?;

    let orchestrator = open_orchestrator(config)?;
    let answer = orchestrator.instant_answer(&document, question).await?;

    match answer.source {
        AnswerSource::Cache => println!(
            "[OK] FAQ 캐시 답변 (매칭: {})",
            answer.matched_question.as_deref().unwrap_or("-")
        ),
        AnswerSource::Generated => println!(
            "[OK] 생성 답변 ({})",
            answer.provider.as_deref().unwrap_or("-")
        ),
    }
    println!();
    println!("{}", answer.answer);

    Ok(())
}

/// 답변 초안 명령어 (draft)
async fn cmd_draft(config: &RagConfig, question: String, document_id: Option<i64>) -> Result<()> {
    let related_document = match document_id {
        Some(id) => Some(
            open_documents(config)?
                .get_document(id)?
                .ok_or_else(|| anyhow::anyhow!("ID {}인 공문서를 찾을 수 없습니다", id))?,
        ),
        None => None,
    };

    let mut orchestrator = open_orchestrator(config)?;
    let draft = orchestrator
        .draft_answer(DraftRequest {
            question,
            related_document,
            prior_qa: Vec::new(),
        })
        .await?;

    println!("[OK] 답변 초안 ({}, 참고 청크 {}건)", draft.provider, draft.context.len());
    if draft.degraded_retrieval {
        println!("[!] 검색 품질이 저하된 상태에서 작성되었습니다.");
    }
    for result in &draft.context {
        println!("     - {} > {}", result.chunk.metadata.source, result.chunk.metadata.section);
    }
    println!();
    println!("{}", draft.text);

    Ok(())
}

/// 공문서 추가 명령어 (document add)
fn cmd_document_add(config: &RagConfig, title: String, number: String, content: &Path) -> Result<()> {
    let content = std::fs::read_to_string(content)
        .with_context(|| format!("본문 파일 읽기 실패: {:?}", content))?;

    let documents = open_documents(config)?;
    let id = documents.insert_document(NewDocument {
        title,
        document_number: number,
        content,
    })?;

    println!("[OK] 공문서가 추가되었습니다 (ID: {})", id);
    Ok(())
}

/// 공문서 목록 명령어 (document list)
fn cmd_document_list(config: &RagConfig, limit: usize) -> Result<()> {
    let docs = open_documents(config)?
        .list_documents(limit)
        .context("공문서 목록 조회 실패")?;

    if docs.is_empty() {
        println!("[!] 저장된 공문서가 없습니다.");
        return Ok(());
    }

    println!("[OK] 저장된 공문서 ({} 건):\n", docs.len());
    for doc in docs {
        println!(
            "  #{:<4} [{}] {} (FAQ {})",
            doc.id,
            doc.document_number,
            truncate_text(&doc.title, 40),
            doc.faq_count
        );
    }

    Ok(())
}

/// FAQ 추가 명령어 (faq add)
fn cmd_faq_add(
    config: &RagConfig,
    document_id: i64,
    question: String,
    answer: String,
    status: FaqStatus,
) -> Result<()> {
    let documents = open_documents(config)?;
    let id = documents.insert_faq(
        document_id,
        &FaqEntry {
            question,
            answer,
            status,
        },
    )?;

    println!("[OK] FAQ #{} 추가됨 (공문서 #{}, {})", id, document_id, status.as_str());
    Ok(())
}

/// 상태 명령어 (status)
async fn cmd_status(config: &RagConfig) -> Result<()> {
    println!("eldercare-rag v{}", env!("CARGO_PKG_VERSION"));
    println!();

    println!("[*] 데이터 디렉토리: {}", config.data_dir.display());

    if config.has_embedding_key() {
        println!("[OK] 임베딩: {}", config.embedding.model);
    } else {
        println!("[!] 임베딩 API 키: 미설정 (대체 임베딩 사용)");
        println!("    설정: export OPENAI_API_KEY=your-key");
    }

    match GeneratorChain::from_config(&config.generation) {
        Ok(chain) => println!("[OK] 생성 체인: {}", chain.backend_names().join(" -> ")),
        Err(e) => println!("[!] 생성 체인 구성 실패: {}", e),
    }

    let mut store = open_vector_store(config)?;
    match store.load().await {
        Ok(()) => {
            let stats = store.stats();
            println!(
                "[OK] 벡터 저장소: {} 청크, 출처 {} 개",
                stats.chunk_count, stats.source_count
            );
            if let Some(dimension) = stats.dimension {
                println!("     차원: {}", dimension);
            }
            if let Ok(meta) = std::fs::metadata(&stats.path) {
                println!("     파일 크기: {}", format_bytes(meta.len() as usize));
            }
        }
        Err(e) => println!("[!] 벡터 저장소 로드 실패: {}", e),
    }

    match open_documents(config).and_then(|d| d.count_documents()) {
        Ok(count) => println!("[OK] 공문서: {} 건", count),
        Err(e) => println!("[!] 공문서 저장소 열기 실패: {}", e),
    }

    Ok(())
}

// ============================================================================
// Helper Functions
// ============================================================================

/// 텍스트 자르기 (UTF-8 안전)
fn truncate_text(text: &str, max_chars: usize) -> String {
    let cleaned = text.replace('\n', " ").replace('\r', "");
    let cleaned = cleaned.trim();

    if cleaned.chars().count() <= max_chars {
        cleaned.to_string()
    } else {
        let truncated: String = cleaned.chars().take(max_chars).collect();
        format!("{}...", truncated)
    }
}

/// 바이트 크기 포맷팅
fn format_bytes(bytes: usize) -> String {
    const KB: usize = 1024;
    const MB: usize = KB * 1024;

    if bytes >= MB {
        format!("{:.2} MB", bytes as f64 / MB as f64)
    } else if bytes >= KB {
        format!("{:.2} KB", bytes as f64 / KB as f64)
    } else {
        format!("{} B", bytes)
    }
}

// ============================================================================
// Tests
// ============================================================================
