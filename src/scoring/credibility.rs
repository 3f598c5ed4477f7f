//! C7: Credibility & Quality Scorer. Ported from
//! `news_collector/scoring/credibility_scorer.py`.

use once_cell::sync::Lazy;
use regex::Regex;

use crate::core::types::{NormalizedArticle, Tier};
use crate::registry::SourceRegistry;
use crate::scoring::batch::BatchAggregates;

static EVIDENCE_PATTERNS: Lazy<Vec<Regex>> = Lazy::new(|| {
    vec![
        Regex::new(r"\d+%").unwrap(),
        Regex::new(r"\d+억").unwrap(),
        Regex::new(r"\d+만").unwrap(),
        Regex::new(r"\d+조").unwrap(),
        Regex::new(r#""[^"]{5,}""#).unwrap(),
        Regex::new(r"'[^']{5,}'").unwrap(),
        Regex::new(r"(?i)관계자는?\s").unwrap(),
        Regex::new(r"(?i)대변인").unwrap(),
        Regex::new(r"(?i)보고서").unwrap(),
        Regex::new(r"(?i)연구\s결과").unwrap(),
        Regex::new(r"(?i)발표\s자료").unwrap(),
        Regex::new(r"https?://\S+").unwrap(),
    ]
});

static SENSATIONAL_WORDS: &[&str] = &[
    "충격", "경악", "발칵", "폭탄", "대박", "역대급", "초대형", "긴급", "속보", "단독", "breaking",
    "shock",
];

static RUNON_PUNCTUATION_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"[!?]{2,}").unwrap());

#[derive(Debug, Clone)]
pub struct CredibilityAssessment {
    pub credibility_score: f64,
    pub quality_score: f64,
    pub evidence_score: f64,
    pub sensationalism_penalty: f64,
}

/// Tier -> base trust, independent from `Tier::weight()` (see DESIGN.md —
/// two separate mappings, matching the original source's two tables).
fn tier_trust_base(tier: Tier) -> f64 {
    match tier {
        Tier::Whitelist => 0.95,
        Tier::Tier1 => 0.85,
        Tier::Tier2 => 0.65,
        Tier::Tier3 => 0.40,
        Tier::Blacklist => 0.0,
    }
}

async fn source_trust_score(article: &NormalizedArticle, registry: Option<&SourceRegistry>) -> f64 {
    let mut base = tier_trust_base(article.source_tier);
    if let Some(registry) = registry {
        if let Some(source) = registry.get(&article.source_id).await {
            base = source.credibility_base_score / 100.0;
        }
    }
    base
}

fn evidence_score(body: &str) -> f64 {
    if body.is_empty() {
        return 0.3;
    }
    let matches = EVIDENCE_PATTERNS.iter().filter(|re| re.is_match(body)).count();
    let length_bonus = (body.len() as f64 / 5000.0).min(0.2);
    (matches as f64 / EVIDENCE_PATTERNS.len() as f64 + length_bonus).min(1.0)
}

fn sensationalism_penalty(title: &str) -> f64 {
    let lower = title.to_lowercase();
    let word_hits = SENSATIONAL_WORDS.iter().filter(|w| lower.contains(*w)).count();
    let mut penalty = (word_hits as f64 * 0.15).min(0.5);
    let punctuation_hits = RUNON_PUNCTUATION_RE.find_iter(title).count();
    penalty += (punctuation_hits as f64 * 0.1).min(0.2);
    penalty.min(1.0)
}

/// Scores one article. `registry` is optional so the scorer stays pure and
/// testable without a running registry; when present, its fine-grained
/// `credibility_base_score` overrides the tier-table fallback.
pub async fn score(
    article: &NormalizedArticle,
    aggregates: &BatchAggregates,
    registry: Option<&SourceRegistry>,
) -> CredibilityAssessment {
    let trust = source_trust_score(article, registry).await;

    let corroborators = aggregates.corroborator_count(article.id);
    let cross_bonus = if corroborators >= 3 {
        0.15
    } else if corroborators >= 1 {
        0.05
    } else {
        0.0
    };

    let evidence = evidence_score(&article.body);
    let sensationalism = sensationalism_penalty(&article.title);

    let credibility = (trust + cross_bonus).min(1.0);
    let quality = (evidence - sensationalism).clamp(0.0, 1.0);

    CredibilityAssessment {
        credibility_score: credibility,
        quality_score: quality,
        evidence_score: evidence,
        sensationalism_penalty: sensationalism,
    }
}
