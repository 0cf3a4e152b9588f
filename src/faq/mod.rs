//! FAQ 캐시 매처 - 승인된 FAQ 재사용 판정
//!
//! 새 질문과 승인된 FAQ 질문을 토큰 단위로 비교해서, 충분히 비슷한 FAQ가 있으면
//! 생성 단계를 건너뛰고 저장된 답변을 그대로 씁니다.
//!
//! 임계값(기본 0.4) 이상이면서 현재 최고점보다 엄격히 높은 후보만 채택합니다.

use crate::documents::{FaqEntry, FaqStatus};

/// 기본 채택 임계값
pub const DEFAULT_THRESHOLD: f32 = 0.4;

/// 제거할 문장부호
const PUNCTUATION: &[char] = &[
    '?', '？', '!', '！', '.', ',', '，', '。', '~', '"', '\'', '“', '”', '‘', '’', '(', ')',
    '[', ']', ':', ';', '·', '/',
];

/// 토큰 끝에서 제거할 조사/어미 (긴 것부터)
const PARTICLES: &[&str] = &[
    "에서는", "으로는", "에게서", "이라고", "인가요", "한가요", "입니까", "습니까",
    "에서", "으로", "에게", "께서", "이나", "이랑", "까지", "부터", "처럼", "보다",
    "하고", "나요", "가요", "까요", "은", "는", "이", "가", "을", "를", "에", "의",
    "로", "와", "과", "도", "만", "요",
];

// ============================================================================
// Tokenizer
// ============================================================================

/// 질문 토큰화
///
/// 소문자화 → 문장부호 제거 → 공백 분리 → 끝 조사 제거(어간 2자 이상일 때만)
/// → 2자 미만 토큰 제거.
pub fn tokenize(text: &str) -> Vec<String> {
    let cleaned: String = text
        .to_lowercase()
        .chars()
        .map(|c| if PUNCTUATION.contains(&c) { ' ' } else { c })
        .collect();

    cleaned
        .split_whitespace()
        .map(strip_particle)
        .filter(|t| t.chars().count() >= 2)
        .map(str::to_string)
        .collect()
}

fn strip_particle(token: &str) -> &str {
    for particle in PARTICLES {
        if let Some(stem) = token.strip_suffix(particle) {
            if stem.chars().count() >= 2 {
                return stem;
            }
        }
    }
    token
}

// ============================================================================
// FaqMatcher
// ============================================================================

/// FAQ 캐시 매처
#[derive(Debug, Clone)]
pub struct FaqMatcher {
    threshold: f32,
}

impl Default for FaqMatcher {
    fn default() -> Self {
        Self {
            threshold: DEFAULT_THRESHOLD,
        }
    }
}

impl FaqMatcher {
    pub fn new() -> Self {
        Self::default()
    }

    /// 임계값 지정
    pub fn with_threshold(threshold: f32) -> Self {
        Self { threshold }
    }

    pub fn threshold(&self) -> f32 {
        self.threshold
    }

    /// 후보 질문 점수 (0.0 ~ 1.0)
    ///
    /// 후보 토큰 중 쿼리 토큰과 어느 방향으로든 부분 문자열 관계인 토큰의 비율.
    pub fn score(&self, query_tokens: &[String], candidate_question: &str) -> f32 {
        let candidate_tokens = tokenize(candidate_question);
        if candidate_tokens.is_empty() {
            return 0.0;
        }

        let matched = candidate_tokens
            .iter()
            .filter(|c| {
                query_tokens
                    .iter()
                    .any(|q| c.contains(q.as_str()) || q.contains(c.as_str()))
            })
            .count();

        matched as f32 / candidate_tokens.len() as f32
    }

    /// 가장 잘 맞는 승인된 FAQ 하나 (없으면 None)
    pub fn find_match<'a>(&self, question: &str, candidates: &'a [FaqEntry]) -> Option<&'a FaqEntry> {
        let approved: Vec<&FaqEntry> = candidates
            .iter()
            .filter(|c| c.status == FaqStatus::Approved)
            .collect();
        if approved.is_empty() {
            return None;
        }

        let query_tokens = tokenize(question);
        if query_tokens.is_empty() {
            return None;
        }

        let best = self.select_best(
            approved
                .into_iter()
                .map(|c| (c, self.score(&query_tokens, &c.question))),
        );

        if let Some(entry) = best {
            tracing::debug!("FAQ cache hit: {:?}", entry.question);
        }
        best
    }

    /// 점수가 매겨진 후보 중 채택할 하나를 고름
    fn select_best<'a, I>(&self, scored: I) -> Option<&'a FaqEntry>
    where
        I: IntoIterator<Item = (&'a FaqEntry, f32)>,
    {
        let mut best: Option<&'a FaqEntry> = None;
        let mut best_score = 0.0f32;

        for (entry, score) in scored {
            if score > best_score && score >= self.threshold {
                best = Some(entry);
                best_score = score;
            }
        }

        best
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn faq(question: &str, status: FaqStatus) -> FaqEntry {
        FaqEntry {
            question: question.to_string(),
            answer: format!("{} 답변", question),
            status,
        }
    }

    #[test]
    fn test_tokenize_strips_particles_and_punctuation() {
        assert_eq!(tokenize("대상자 기준이 뭔가요?"), vec!["대상자", "기준", "뭔가"]);
        assert_eq!(tokenize("신청은 어디에서 하나요!"), vec!["신청", "어디", "하나"]);
    }

    #[test]
    fn test_tokenize_drops_short_tokens_and_lowercases() {
        assert_eq!(tokenize("a  B  Care 돌봄"), vec!["care", "돌봄"]);
        assert!(tokenize("? ! . 이 가").is_empty());
    }

    #[test]
    fn test_tokenize_keeps_short_stems() {
        // 어간이 1자가 되면 조사를 떼지 않음
        assert_eq!(tokenize("필요"), vec!["필요"]);
        assert_eq!(tokenize("나이"), vec!["나이"]);
    }

    #[test]
    fn test_score_half() {
        let matcher = FaqMatcher::new();
        let query = tokenize("대상자 기준이 뭔가요");
        assert!((matcher.score(&query, "대상자 연락처는?") - 0.5).abs() < 1e-6);
    }

    #[test]
    fn test_match_at_half_score() {
        let matcher = FaqMatcher::new();
        let candidates = vec![faq("대상자 연락처는?", FaqStatus::Approved)];
        let hit = matcher.find_match("대상자 기준이 뭔가요", &candidates);
        assert_eq!(hit.map(|f| f.question.as_str()), Some("대상자 연락처는?"));
    }

    #[test]
    fn test_no_match_below_threshold() {
        let matcher = FaqMatcher::new();
        // 후보 토큰 [대상자, 신청, 서류] 중 1개 일치
        let query = tokenize("대상자 기준이 뭔가요");
        let score = matcher.score(&query, "대상자 신청 서류");
        assert!((score - 1.0 / 3.0).abs() < 1e-6);
        assert!(score < DEFAULT_THRESHOLD);

        let candidates = vec![faq("대상자 신청 서류", FaqStatus::Approved)];
        assert!(matcher.find_match("대상자 기준이 뭔가요", &candidates).is_none());
    }

    #[test]
    fn test_find_match_just_below_threshold() {
        let matcher = FaqMatcher::new();
        // 후보 토큰 5개 중 2개 일치 → 0.4 (채택), 6개 중 2개 → 0.33 (거절)
        let query = tokenize("방문요양 신청");
        let at = faq("방문요양 신청 서류 제출 기한", FaqStatus::Approved);
        let below = faq("방문요양 신청 서류 제출 기한 연장", FaqStatus::Approved);

        assert!((matcher.score(&query, &at.question) - 0.4).abs() < 1e-6);
        assert!(matcher.score(&query, &below.question) < DEFAULT_THRESHOLD);

        assert!(matcher.find_match("방문요양 신청", std::slice::from_ref(&at)).is_some());
        assert!(matcher.find_match("방문요양 신청", std::slice::from_ref(&below)).is_none());
    }

    #[test]
    fn test_threshold_boundary() {
        let matcher = FaqMatcher::new();
        let entry = faq("질문", FaqStatus::Approved);

        assert!(matcher.select_best([(&entry, 0.39)]).is_none());
        assert!(matcher.select_best([(&entry, 0.4)]).is_some());
    }

    #[test]
    fn test_higher_score_wins() {
        let matcher = FaqMatcher::new();
        let low = faq("low", FaqStatus::Approved);
        let high = faq("high", FaqStatus::Approved);

        let best = matcher.select_best([(&low, 0.6), (&high, 0.9)]);
        assert_eq!(best.map(|f| f.question.as_str()), Some("high"));

        let best = matcher.select_best([(&high, 0.9), (&low, 0.6)]);
        assert_eq!(best.map(|f| f.question.as_str()), Some("high"));
    }

    #[test]
    fn test_equal_scores_keep_first() {
        let matcher = FaqMatcher::new();
        let first = faq("first", FaqStatus::Approved);
        let second = faq("second", FaqStatus::Approved);

        let best = matcher.select_best([(&first, 0.7), (&second, 0.7)]);
        assert_eq!(best.map(|f| f.question.as_str()), Some("first"));
    }

    #[test]
    fn test_below_threshold_never_wins() {
        let matcher = FaqMatcher::new();
        let entries: Vec<FaqEntry> = (0..10)
            .map(|i| faq(&format!("q{}", i), FaqStatus::Approved))
            .collect();
        let scored = entries.iter().map(|e| (e, 0.3));
        assert!(matcher.select_best(scored).is_none());
    }

    #[test]
    fn test_only_approved_entries_considered() {
        let matcher = FaqMatcher::new();
        let candidates = vec![
            faq("대상자 기준", FaqStatus::Pending),
            faq("대상자 기준", FaqStatus::Rejected),
        ];
        assert!(matcher.find_match("대상자 기준이 뭔가요", &candidates).is_none());

        let mut candidates = candidates;
        candidates.push(faq("대상자 기준", FaqStatus::Approved));
        let hit = matcher.find_match("대상자 기준이 뭔가요", &candidates);
        assert_eq!(hit.map(|f| f.status), Some(FaqStatus::Approved));
    }

    #[test]
    fn test_empty_query_tokens() {
        let matcher = FaqMatcher::new();
        let candidates = vec![faq("대상자 기준", FaqStatus::Approved)];
        assert!(matcher.find_match("? 이", &candidates).is_none());
    }

    #[test]
    fn test_custom_threshold() {
        let matcher = FaqMatcher::with_threshold(0.3);
        let candidates = vec![faq("대상자 신청 서류", FaqStatus::Approved)];
        assert!(matcher.find_match("대상자 기준이 뭔가요", &candidates).is_some());
    }
}
