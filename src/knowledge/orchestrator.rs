//! 검색 오케스트레이터 - 생성 컨텍스트 조립
//!
//! 두 가지 요청을 처리합니다.
//!
//! - 답변 초안: 벡터 저장소에서 top-3 청크를 찾고, 관련 공문서와 이전 유사
//!   문답을 합쳐 생성 체인에 넘깁니다. 검색 단계 실패는 "컨텍스트 없음"으로
//!   처리되며 생성을 막지 않습니다.
//! - 문서 즉시 질의: 해당 문서의 승인된 FAQ를 먼저 확인하고(캐시),
//!   없을 때만 문서 본문과 FAQ를 컨텍스트로 생성합니다.

use std::fmt::Write as _;

use anyhow::Result;
use serde::Serialize;

use crate::documents::OfficialDocument;
use crate::faq::FaqMatcher;
use crate::generation::{GenerationPrompt, GeneratorChain};

use super::store::{VectorStore, DEFAULT_TOP_K};
use super::vector::SearchResult;

const SYSTEM_PROMPT: &str = "당신은 노인복지 담당 공무원을 돕는 상담 보조자입니다. \
제공된 공문서와 참고 자료에 근거해서만 정확하고 공손하게 답변하세요. \
자료에 없는 내용은 추측하지 말고 담당 부서 확인이 필요하다고 안내하세요.";

// ============================================================================
// Types
// ============================================================================

/// 이전 유사 문답
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PriorQa {
    pub question: String,
    pub answer: String,
}

/// 답변 초안 요청
#[derive(Debug, Clone, Default)]
pub struct DraftRequest {
    pub question: String,
    pub related_document: Option<OfficialDocument>,
    pub prior_qa: Vec<PriorQa>,
}

impl DraftRequest {
    pub fn new(question: impl Into<String>) -> Self {
        Self {
            question: question.into(),
            ..Default::default()
        }
    }
}

/// 답변 초안
#[derive(Debug, Clone)]
pub struct DraftAnswer {
    pub text: String,
    /// 답을 만든 생성 백엔드
    pub provider: String,
    /// 프롬프트에 들어간 검색 청크
    pub context: Vec<SearchResult>,
    /// 검색이 실패했거나 대체 임베딩만 쓸 수 있었던 경우
    pub degraded_retrieval: bool,
}

/// 즉시 답변 출처
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum AnswerSource {
    Cache,
    Generated,
}

/// 문서 즉시 질의 결과
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InstantAnswer {
    pub answer: String,
    pub source: AnswerSource,
    /// 캐시 적중 시 매칭된 FAQ 질문
    pub matched_question: Option<String>,
    /// 생성된 경우 생성 백엔드 이름
    pub provider: Option<String>,
}

// ============================================================================
// RetrievalOrchestrator
// ============================================================================

pub struct RetrievalOrchestrator {
    store: VectorStore,
    generator: GeneratorChain,
    matcher: FaqMatcher,
}

impl RetrievalOrchestrator {
    pub fn new(store: VectorStore, generator: GeneratorChain) -> Self {
        Self {
            store,
            generator,
            matcher: FaqMatcher::new(),
        }
    }

    pub fn with_matcher(mut self, matcher: FaqMatcher) -> Self {
        self.matcher = matcher;
        self
    }

    pub fn store(&self) -> &VectorStore {
        &self.store
    }

    pub fn store_mut(&mut self) -> &mut VectorStore {
        &mut self.store
    }

    pub fn generator(&self) -> &GeneratorChain {
        &self.generator
    }

    /// 답변 초안 작성
    pub async fn draft_answer(&mut self, request: DraftRequest) -> Result<DraftAnswer> {
        let (context, degraded_retrieval) = self.retrieve_context(&request.question).await;

        let prompt = GenerationPrompt {
            system: SYSTEM_PROMPT.to_string(),
            user: build_draft_prompt(&request, &context),
        };

        let generated = self.generator.generate(&prompt).await?;
        tracing::info!(
            "Drafted answer via {} ({} context chunks{})",
            generated.provider,
            context.len(),
            if degraded_retrieval { ", degraded" } else { "" }
        );

        Ok(DraftAnswer {
            text: generated.text,
            provider: generated.provider,
            context,
            degraded_retrieval,
        })
    }

    /// 검색 컨텍스트 확보. 실패는 빈 컨텍스트로 흡수.
    async fn retrieve_context(&mut self, question: &str) -> (Vec<SearchResult>, bool) {
        if let Err(e) = self.store.ensure_loaded().await {
            tracing::warn!("Vector store unavailable, drafting without context: {}", e);
            return (Vec::new(), true);
        }

        let outcome = self.store.search_tagged(question, DEFAULT_TOP_K).await;
        let degraded = outcome.fallback_query || self.store.embedder().is_offline();
        (outcome.results, degraded)
    }

    /// 특정 공문서에 대한 즉시 질의
    pub async fn instant_answer(
        &self,
        document: &OfficialDocument,
        question: &str,
    ) -> Result<InstantAnswer> {
        if let Some(hit) = self.matcher.find_match(question, &document.faq_items) {
            tracing::info!("Answered from FAQ cache (document {})", document.id);
            return Ok(InstantAnswer {
                answer: hit.answer.clone(),
                source: AnswerSource::Cache,
                matched_question: Some(hit.question.clone()),
                provider: None,
            });
        }

        let prompt = GenerationPrompt {
            system: SYSTEM_PROMPT.to_string(),
            user: build_instant_prompt(document, question),
        };
        let generated = self.generator.generate(&prompt).await?;

        Ok(InstantAnswer {
            answer: generated.text,
            source: AnswerSource::Generated,
            matched_question: None,
            provider: Some(generated.provider),
        })
    }
}

// ============================================================================
// Prompt Builders
// ============================================================================

fn write_document(out: &mut String, document: &OfficialDocument) {
    let _ = writeln!(out, "## 관련 공문서");
    let _ = writeln!(out, "제목: {}", document.title);
    let _ = writeln!(out, "문서번호: {}", document.document_number);
    let _ = writeln!(out, "{}\n", document.content.trim());
}

fn build_draft_prompt(request: &DraftRequest, context: &[SearchResult]) -> String {
    let mut out = String::new();

    if !context.is_empty() {
        let _ = writeln!(out, "## 참고 자료");
        for (i, result) in context.iter().enumerate() {
            let meta = &result.chunk.metadata;
            let _ = writeln!(
                out,
                "[{}] {} > {}\n{}\n",
                i + 1,
                meta.source,
                meta.section,
                result.chunk.text
            );
        }
    }

    if let Some(ref document) = request.related_document {
        write_document(&mut out, document);
    }

    if !request.prior_qa.is_empty() {
        let _ = writeln!(out, "## 이전 유사 문답");
        for qa in &request.prior_qa {
            let _ = writeln!(out, "Q: {}\nA: {}\n", qa.question, qa.answer);
        }
    }

    let _ = writeln!(out, "## 질문\n{}", request.question.trim());
    let _ = write!(out, "\n위 자료를 바탕으로 민원 답변 초안을 작성하세요.");
    out
}

fn build_instant_prompt(document: &OfficialDocument, question: &str) -> String {
    let mut out = String::new();
    write_document(&mut out, document);

    let approved = document.approved_faqs();
    if !approved.is_empty() {
        let _ = writeln!(out, "## 승인된 FAQ");
        for faq in approved {
            let _ = writeln!(out, "Q: {}\nA: {}\n", faq.question, faq.answer);
        }
    }

    let _ = write!(out, "## 질문\n{}", question.trim());
    out
}

// ============================================================================
// Tests
// ============================================================================
