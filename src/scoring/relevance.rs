//! C9: Relevance Scorer. Ported from `news_collector/ranking/ranker.py`'s
//! `KEYWORD_SYNONYMS` table and `_calculate_relevance`.

use std::collections::HashMap;

use once_cell::sync::Lazy;

use crate::core::types::NormalizedArticle;

/// Bilingual/domain synonym table. Data, not code (spec.md §9) — extending
/// it never requires touching the scoring formula.
static KEYWORD_SYNONYMS: Lazy<HashMap<&'static str, Vec<&'static str>>> = Lazy::new(|| {
    HashMap::from([
        ("kpop", vec!["k-pop", "케이팝", "아이돌", "idol"]),
        ("semiconductor", vec!["반도체", "chip", "foundry", "파운드리"]),
        ("반도체", vec!["semiconductor", "칩", "chip", "파운드리"]),
        ("ai", vec!["인공지능", "artificial intelligence", "머신러닝"]),
        ("election", vec!["선거", "대선", "총선", "vote"]),
        ("inflation", vec!["물가", "인플레이션", "cpi"]),
        ("climate", vec!["기후", "탄소", "carbon", "온난화"]),
    ])
});

fn expansions(keyword: &str) -> Vec<String> {
    let lower = keyword.to_lowercase();
    let mut terms = vec![lower.clone()];
    if let Some(synonyms) = KEYWORD_SYNONYMS.get(lower.as_str()) {
        terms.extend(synonyms.iter().map(|s| s.to_lowercase()));
    }
    terms
}

fn term_score(term: &str, title_lower: &str, body_lower: &str) -> f64 {
    let mut score = 0.0;
    if title_lower.contains(term) {
        score += 0.6;
    }
    if body_lower.contains(term) {
        score += 0.3;
    }
    let body_count = body_lower.matches(term).count();
    score += (body_count as f64 * 0.05).min(0.3);
    score
}

fn no_keywords_heuristic(article: &NormalizedArticle) -> f64 {
    let mut score = 0.5;
    if article.category.is_some() {
        score += 0.2;
    }
    if !article.tags.is_empty() {
        score += 0.1;
    }
    if article.body.len() > 100 {
        score += 0.1;
    }
    score.min(1.0)
}

/// Given the request's include-keywords, scores topical relevance. An empty
/// keyword list falls back to the category/body-length heuristic.
pub fn score(article: &NormalizedArticle, keywords: &[String]) -> f64 {
    if keywords.is_empty() {
        return no_keywords_heuristic(article);
    }

    let title_lower = article.title.to_lowercase();
    let body_lower = article.body.to_lowercase();

    let per_keyword_best: Vec<f64> = keywords
        .iter()
        .map(|keyword| {
            expansions(keyword)
                .iter()
                .map(|term| term_score(term, &title_lower, &body_lower))
                .fold(0.0_f64, f64::max)
        })
        .collect();

    let mut total = per_keyword_best.iter().sum::<f64>() / keywords.len() as f64;

    let category_str = article.category.map(|c| c.to_string()).unwrap_or_default();
    if !category_str.is_empty()
        && keywords
            .iter()
            .any(|k| category_str.contains(&k.to_lowercase()) || k.to_lowercase().contains(&category_str))
    {
        total += 0.1;
    }

    total.min(1.0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use uuid::Uuid;

    fn article(title: &str, body: &str, category: Option<crate::core::types::Category>) -> NormalizedArticle {
        NormalizedArticle {
            id: Uuid::new_v4(),
            raw_record_id: "r".to_string(),
            source_id: "s".to_string(),
            source_name: "S".to_string(),
            source_tier: crate::core::types::Tier::Tier2,
            title: title.to_string(),
            body: body.to_string(),
            summary: None,
            author: None,
            published_at: Utc::now(),
            language: "en".to_string(),
            country: "US".to_string(),
            category,
            tags: vec![],
            url: "https://example.test/a".to_string(),
            image_urls: vec![],
            view_count: None,
            share_count: None,
            comment_count: None,
            like_count: None,
            crawled_at: Utc::now(),
            normalized_at: Utc::now(),
            cluster_id: None,
        }
    }

    #[test]
    fn no_keywords_uses_category_and_length_heuristic() {
        let a = article("title", &"x".repeat(150), Some(crate::core::types::Category::Economy));
        assert!((score(&a, &[]) - 0.8).abs() < 1e-9);
    }

    #[test]
    fn keyword_match_in_title_scores_higher_than_no_match() {
        let matching = article("Semiconductor demand surges", "body text", None);
        let not_matching = article("Unrelated headline", "body text", None);
        let keywords = vec!["semiconductor".to_string()];
        assert!(score(&matching, &keywords) > score(&not_matching, &keywords));
    }

    #[test]
    fn synonym_expansion_matches_alias() {
        let a = article("케이팝 idol group debuts", "no keyword here", None);
        let keywords = vec!["kpop".to_string()];
        assert!(score(&a, &keywords) > 0.0);
    }

    #[test]
    fn score_is_capped_at_one() {
        let a = article(
            "semiconductor semiconductor semiconductor",
            &"semiconductor ".repeat(50),
            None,
        );
        let keywords = vec!["semiconductor".to_string()];
        assert!(score(&a, &keywords) <= 1.0);
    }
}
