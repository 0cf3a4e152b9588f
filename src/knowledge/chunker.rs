//! Text Chunking Module
//!
//! 문서 형식에 따라 원문을 검색 단위 청크로 나눕니다.
//! - Structured: Markdown 헤더(`#`, `##`, `###`) 경계로 분할
//! - Plain: 빈 줄로 구분된 문단 단위 분할
//!
//! 최소 길이보다 짧은 조각(헤더만 있는 섹션, 공백 등)은 버립니다.
//! 입력과 형식이 같으면 항상 같은 결과를 돌려주는 순수 함수입니다.

use std::sync::OnceLock;

use regex::Regex;

/// 헤더가 없을 때 사용하는 섹션 이름
pub const DEFAULT_SECTION: &str = "General";

// ============================================================================
// Chunk Configuration
// ============================================================================

/// 청킹 설정
#[derive(Debug, Clone)]
pub struct ChunkConfig {
    /// 최소 청크 크기 (문자 수, 미만이면 버림)
    pub min_characters: usize,
}

impl Default for ChunkConfig {
    fn default() -> Self {
        Self { min_characters: 50 }
    }
}

// ============================================================================
// Types
// ============================================================================

/// 문서 형식
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DocumentFormat {
    /// 헤더 구조가 있는 문서 (Markdown)
    Structured,
    /// 일반 텍스트
    Plain,
}

/// 청커가 만든 청크 후보
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChunkCandidate {
    /// 앞뒤 공백이 제거된 청크 텍스트
    pub text: String,
    /// 추론된 섹션 제목
    pub section: String,
}

// ============================================================================
// Chunker Trait
// ============================================================================

/// 텍스트 청킹 전략 트레이트
pub trait Chunker: Send + Sync {
    /// 텍스트를 청크로 분할
    fn chunk(&self, text: &str) -> Vec<ChunkCandidate>;

    /// 청커 이름
    fn name(&self) -> &'static str;
}

fn heading_line_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^#{1,3}\s").expect("valid heading regex"))
}

fn section_title_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?m)^#{1,3}[ \t]+(.+)$").expect("valid section regex"))
}

fn paragraph_break_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\n{2,}").expect("valid paragraph regex"))
}

// ============================================================================
// StructuredChunker
// ============================================================================

/// Markdown 헤더 인식 청커
///
/// 헤더 줄마다 새 섹션을 시작합니다. 첫 헤더 앞의 머리말도 하나의 후보가 됩니다.
pub struct StructuredChunker {
    config: ChunkConfig,
}

impl StructuredChunker {
    pub fn new(config: ChunkConfig) -> Self {
        Self { config }
    }

    pub fn with_defaults() -> Self {
        Self::new(ChunkConfig::default())
    }

    /// 헤더 경계로 섹션 분할
    fn split_sections(text: &str) -> Vec<String> {
        let mut sections = Vec::new();
        let mut current = String::new();

        for line in text.lines() {
            if heading_line_re().is_match(line) && !current.is_empty() {
                sections.push(std::mem::take(&mut current));
            }

            current.push_str(line);
            current.push('\n');
        }

        if !current.is_empty() {
            sections.push(current);
        }

        sections
    }
}

impl Chunker for StructuredChunker {
    fn chunk(&self, text: &str) -> Vec<ChunkCandidate> {
        let normalized = normalize_newlines(text);

        Self::split_sections(&normalized)
            .iter()
            .map(|s| s.trim())
            .filter(|s| long_enough(s, &self.config))
            .map(|s| ChunkCandidate {
                text: s.to_string(),
                section: infer_section(s),
            })
            .collect()
    }

    fn name(&self) -> &'static str {
        "StructuredChunker"
    }
}

// ============================================================================
// PlainChunker
// ============================================================================

/// 문단 청커 - 빈 줄(연속 개행 2개 이상) 기준 분할
pub struct PlainChunker {
    config: ChunkConfig,
}

impl PlainChunker {
    pub fn new(config: ChunkConfig) -> Self {
        Self { config }
    }

    pub fn with_defaults() -> Self {
        Self::new(ChunkConfig::default())
    }
}

impl Chunker for PlainChunker {
    fn chunk(&self, text: &str) -> Vec<ChunkCandidate> {
        let normalized = normalize_newlines(text);

        paragraph_break_re()
            .split(&normalized)
            .map(str::trim)
            .filter(|p| long_enough(p, &self.config))
            .map(|p| ChunkCandidate {
                text: p.to_string(),
                section: DEFAULT_SECTION.to_string(),
            })
            .collect()
    }

    fn name(&self) -> &'static str {
        "PlainChunker"
    }
}

// ============================================================================
// Helper Functions
// ============================================================================

/// CRLF와 단독 CR을 LF로 통일
fn normalize_newlines(text: &str) -> String {
    text.replace("\r\n", "\n").replace('\r', "\n")
}

#[inline]
fn long_enough(text: &str, config: &ChunkConfig) -> bool {
    !text.is_empty() && text.chars().count() >= config.min_characters
}

/// 청크 안의 첫 헤더 줄에서 섹션 제목 추론
pub fn infer_section(chunk: &str) -> String {
    section_title_re()
        .captures(chunk)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str().trim().to_string())
        .filter(|title| !title.is_empty())
        .unwrap_or_else(|| DEFAULT_SECTION.to_string())
}

// ============================================================================
// Factory Functions
// ============================================================================

/// 형식에 맞는 청커 생성
pub fn chunker_for(format: DocumentFormat, config: ChunkConfig) -> Box<dyn Chunker> {
    match format {
        DocumentFormat::Structured => Box::new(StructuredChunker::new(config)),
        DocumentFormat::Plain => Box::new(PlainChunker::new(config)),
    }
}

/// 기본 설정으로 문서 청킹
pub fn chunk_document(text: &str, format: DocumentFormat) -> Vec<ChunkCandidate> {
    chunker_for(format, ChunkConfig::default()).chunk(text)
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_chunker_empty() {
        assert!(chunk_document("", DocumentFormat::Structured).is_empty());
        assert!(chunk_document("   \n\n  ", DocumentFormat::Plain).is_empty());
    }

    #[test]
    fn test_structured_drops_short_intro() {
        let text = format!("# Intro\nShort.\n\n## Details\n{}", "x".repeat(60));
        let chunks = chunk_document(&text, DocumentFormat::Structured);

        assert_eq!(chunks.len(), 1);
        assert_eq!(chunks[0].section, "Details");
        assert!(chunks[0].text.starts_with("## Details"));
    }

    #[test]
    fn test_plain_paragraphs_with_carriage_returns() {
        let p1 = "장기요양 등급 판정은 신청일로부터 30일 이내에 완료되는 것을 원칙으로 합니다. 필요 시 연장됩니다.";
        let p2 = "방문요양 서비스는 수급자의 가정을 방문하여 신체활동 및 가사활동을 지원하는 서비스를 말합니다.";

        for sep in ["\r\r", "\r\n\r\n"] {
            let chunks = chunk_document(&format!("{}{}{}", p1, sep, p2), DocumentFormat::Plain);
            let texts: Vec<&str> = chunks.iter().map(|c| c.text.as_str()).collect();
            assert_eq!(texts, vec![p1, p2]);
        }
    }

    #[test]
    fn test_plain_paragraphs() {
        let p1 = "장기요양 등급 판정은 신청일로부터 30일 이내에 완료되는 것을 원칙으로 합니다. 필요 시 연장됩니다.";
        let p3 = "방문요양 서비스는 수급자의 가정을 방문하여 신체활동 및 가사활동을 지원하는 서비스를 말합니다.";
        let text = format!("{}\n\n0123456789\n\n\n{}", p1, p3);
        let chunks = chunk_document(&text, DocumentFormat::Plain);

        assert_eq!(chunks.len(), 2);
        assert!(chunks.iter().all(|c| c.section == DEFAULT_SECTION));
        assert_eq!(chunks[0].text, p1);
        assert_eq!(chunks[1].text, p3);
    }

    #[test]
    fn test_preamble_is_own_chunk() {
        let preamble = "이 문서는 2024년도 노인맞춤돌봄서비스 사업 안내 지침의 요약본입니다. 세부 내용은 원문을 참고하세요.";
        let body = "서비스 대상은 만 65세 이상 기초생활수급자, 차상위계층 또는 기초연금수급자로서 돌봄이 필요한 어르신입니다.";
        let text = format!("{}\n\n# 대상자\n{}", preamble, body);
        let chunks = chunk_document(&text, DocumentFormat::Structured);

        assert_eq!(chunks.len(), 2);
        assert_eq!(chunks[0].section, DEFAULT_SECTION);
        assert_eq!(chunks[1].section, "대상자");
    }

    #[test]
    fn test_deep_headings_do_not_split() {
        let text = format!(
            "# Top\n{}\n#### Deep\n{}",
            "a".repeat(60),
            "b".repeat(60)
        );
        let chunks = chunk_document(&text, DocumentFormat::Structured);
        assert_eq!(chunks.len(), 1);
        assert!(chunks[0].text.contains("#### Deep"));
    }

    #[test]
    fn test_chunking_is_deterministic() {
        let text = format!("# A\n{}\n\n## B\n{}", "가".repeat(80), "나".repeat(80));
        let first = chunk_document(&text, DocumentFormat::Structured);
        let second = chunk_document(&text, DocumentFormat::Structured);
        assert_eq!(first, second);
    }

    #[test]
    fn test_min_length_counts_characters() {
        // 한글 20자 = 60바이트지만 50자 미만
        let chunks = chunk_document(&"가".repeat(20), DocumentFormat::Plain);
        assert!(chunks.is_empty());

        let chunks = chunk_document(&"가".repeat(50), DocumentFormat::Plain);
        assert_eq!(chunks.len(), 1);
    }

    #[test]
    fn test_custom_min_characters() {
        let chunker = chunker_for(DocumentFormat::Plain, ChunkConfig { min_characters: 5 });
        let chunks = chunker.chunk("hello world\n\nhey");
        assert_eq!(chunks.len(), 1);
        assert_eq!(chunker.name(), "PlainChunker");
    }

    #[test]
    fn test_infer_section() {
        assert_eq!(infer_section("## 신청 방법\n내용"), "신청 방법");
        assert_eq!(infer_section("본문만 있음"), DEFAULT_SECTION);
        assert_eq!(infer_section("#해시태그\n본문"), DEFAULT_SECTION);
    }
}
