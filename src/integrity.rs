//! C6: Integrity Checker.
//!
//! Computes title-body consistency, contamination, and spam sub-scores plus
//! a combined flag set. Ported from
//! `news_collector/integrity/integrity_checker.py::ContentIntegrityChecker`.

use std::collections::{hash_map::DefaultHasher, BTreeSet, HashSet};
use std::hash::{Hash, Hasher};

use once_cell::sync::Lazy;
use regex::Regex;

use crate::core::types::NormalizedArticle;

static AD_KEYWORDS: &[&str] = &[
    "광고", "협찬", "제휴", "할인", "쿠폰", "이벤트 참여", "sponsored", "advertisement",
];

static ILLEGAL_KEYWORDS: &[&str] = &["불법", "마약", "도박", "음란", "illegal content"];

static SENSATIONAL_PATTERNS: Lazy<Vec<Regex>> = Lazy::new(|| {
    vec![
        Regex::new(r"(?i)충격").unwrap(),
        Regex::new(r"(?i)경악").unwrap(),
        Regex::new(r"(?i)단독").unwrap(),
        Regex::new(r"(?i)긴급").unwrap(),
        Regex::new(r"(?i)breaking").unwrap(),
        Regex::new(r"!{2,}|\?{2,}").unwrap(),
    ]
});

static FUNCTION_WORDS: Lazy<HashSet<&'static str>> = Lazy::new(|| {
    [
        "the", "a", "an", "of", "to", "in", "on", "and", "is", "are", "was", "were", "은", "는",
        "이", "가", "을", "를", "에", "의", "도", "로",
    ]
    .into_iter()
    .collect()
});

static ENTITY_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"[A-Z][a-zA-Z]{2,}|[\p{Hangul}]{2,}").unwrap());

#[derive(Debug, Clone)]
pub struct IntegrityAssessment {
    pub integrity_score: f64,
    pub title_body_consistency: f64,
    pub contamination_score: f64,
    pub spam_score: f64,
    pub flags: BTreeSet<String>,
}

fn title_body_consistency(title: &str, body: &str) -> f64 {
    let entities: HashSet<String> = ENTITY_RE
        .find_iter(title)
        .map(|m| m.as_str().to_lowercase())
        .collect();

    if body.trim().is_empty() || title.trim().is_empty() {
        return 0.5;
    }
    if entities.is_empty() {
        return 1.0;
    }

    let body_lower = body.to_lowercase();
    let covered = entities.iter().filter(|e| body_lower.contains(*e)).count();
    let coverage = covered as f64 / entities.len() as f64;

    let paragraphs: Vec<&str> = body.split('\n').filter(|p| !p.trim().is_empty()).take(5).collect();
    if paragraphs.is_empty() {
        return 0.5;
    }

    let mut per_paragraph_counts = Vec::with_capacity(paragraphs.len());
    let mut total_count = 0usize;
    for paragraph in &paragraphs {
        let lower = paragraph.to_lowercase();
        let count = entities.iter().filter(|e| lower.contains(e.as_str())).count();
        per_paragraph_counts.push(count);
        total_count += count;
    }

    if total_count == 0 {
        return coverage * 0.8;
    }

    let max_count = *per_paragraph_counts.iter().max().unwrap_or(&0);
    let max_conc = max_count as f64 / total_count as f64;
    coverage * (1.0 - 0.2 * max_conc)
}

fn content_words(paragraph: &str) -> HashSet<String> {
    paragraph
        .split_whitespace()
        .map(|w| w.to_lowercase())
        .filter(|w| w.chars().count() > 1 && !FUNCTION_WORDS.contains(w.as_str()))
        .collect()
}

fn contamination(body: &str, flags: &mut BTreeSet<String>) -> f64 {
    let paragraphs: Vec<&str> = body
        .split('\n')
        .filter(|p| !p.trim().is_empty())
        .take(10)
        .collect();

    if paragraphs.len() < 2 {
        return 0.0;
    }

    let mut similarities = Vec::new();
    for pair in paragraphs.windows(2) {
        let a = content_words(pair[0]);
        let b = content_words(pair[1]);
        if a.is_empty() || b.is_empty() {
            similarities.push(0.0);
            continue;
        }
        let intersection = a.intersection(&b).count();
        let union = a.union(&b).count();
        similarities.push(intersection as f64 / union as f64);
    }

    let avg = similarities.iter().sum::<f64>() / similarities.len() as f64;
    let low_count = similarities.iter().filter(|&&s| s < 0.2).count();

    if avg < 0.3 {
        flags.insert("unrelated_topics".to_string());
        0.7
    } else if low_count * 2 > similarities.len() {
        flags.insert("inconsistent_topics".to_string());
        0.5
    } else {
        0.0
    }
}

fn is_repetitive(body: &str) -> bool {
    let sentences: Vec<&str> = body.split('.').map(|s| s.trim()).filter(|s| !s.is_empty()).collect();
    if sentences.len() < 3 {
        return false;
    }
    let mut hashes = HashSet::new();
    for sentence in &sentences {
        let mut hasher = DefaultHasher::new();
        sentence.to_lowercase().hash(&mut hasher);
        hashes.insert(hasher.finish());
    }
    (hashes.len() as f64 / sentences.len() as f64) < 0.7
}

fn lexical_density(body: &str) -> f64 {
    let tokens: Vec<String> = body.split_whitespace().map(|w| w.to_lowercase()).collect();
    if tokens.is_empty() {
        return 0.0;
    }
    let content = tokens
        .iter()
        .filter(|w| w.chars().count() > 1 && !FUNCTION_WORDS.contains(w.as_str()))
        .count();
    content as f64 / tokens.len() as f64
}

fn spam(title: &str, body: &str, flags: &mut BTreeSet<String>) -> f64 {
    let mut score = 0.0;
    let lower_body = body.to_lowercase();

    if is_repetitive(body) {
        score += 0.3;
        flags.insert("repetitive_content".to_string());
    }
    if AD_KEYWORDS.iter().any(|kw| lower_body.contains(kw)) {
        score += 0.3;
        flags.insert("ad_keywords".to_string());
    }
    if ILLEGAL_KEYWORDS.iter().any(|kw| lower_body.contains(kw)) {
        score += 0.5;
        flags.insert("illegal_keywords".to_string());
    }
    if lexical_density(body) < 0.4 {
        score += 0.2;
        flags.insert("low_lexical_density".to_string());
    }
    if SENSATIONAL_PATTERNS.iter().any(|re| re.is_match(title)) {
        score += 0.1;
        flags.insert("sensational_title".to_string());
    }

    score.min(1.0)
}

/// Computes the composite integrity score plus the three sub-scores and the
/// union of qualitative flags.
pub fn assess(article: &NormalizedArticle) -> IntegrityAssessment {
    let mut flags = BTreeSet::new();
    let consistency = title_body_consistency(&article.title, &article.body);
    let contamination_score = contamination(&article.body, &mut flags);
    let spam_score = spam(&article.title, &article.body, &mut flags);

    let integrity_score =
        (0.4 * consistency + 0.3 * (1.0 - contamination_score) + 0.3 * (1.0 - spam_score))
            .clamp(0.0, 1.0);

    IntegrityAssessment {
        integrity_score,
        title_body_consistency: consistency,
        contamination_score,
        spam_score,
        flags,
    }
}
