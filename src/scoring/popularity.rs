//! C8: Popularity Scorer. Ported from
//! `news_collector/scoring/popularity_scorer.py::PopularityScorer`.

use chrono::Utc;

use crate::core::types::NormalizedArticle;
use crate::scoring::batch::BatchAggregates;

const VIEW_WEIGHT: f64 = 0.4;
const SHARE_WEIGHT: f64 = 0.35;
const COMMENT_WEIGHT: f64 = 0.25;
const FRESHNESS_HALF_LIFE_HOURS: f64 = 24.0;

#[derive(Debug, Clone, Copy)]
pub struct PopularityAssessment {
    pub popularity_score: f64,
    pub trending_velocity: f64,
}

fn freshness_score(article: &NormalizedArticle) -> f64 {
    let hours_ago = (Utc::now() - article.published_at).num_seconds() as f64 / 3600.0;
    let hours_ago = hours_ago.max(0.0);
    0.5_f64.powf(hours_ago / FRESHNESS_HALF_LIFE_HOURS)
}

fn trending_velocity(article: &NormalizedArticle) -> f64 {
    let hours_ago = ((Utc::now() - article.published_at).num_seconds() as f64 / 3600.0).max(1.0);
    let total_engagement = article.view_count.unwrap_or(0) as f64
        + article.share_count.unwrap_or(0) as f64 * 3.0
        + article.comment_count.unwrap_or(0) as f64 * 2.0;

    if total_engagement == 0.0 {
        return 0.0;
    }
    (total_engagement / hours_ago / 10_000.0).min(1.0)
}

/// Scores one article against the batch's engagement maxima. When all three
/// engagement counts are missing, falls back to the freshness estimate.
pub fn score(article: &NormalizedArticle, aggregates: &BatchAggregates) -> PopularityAssessment {
    let has_metrics = article.view_count.unwrap_or(0) != 0
        || article.share_count.unwrap_or(0) != 0
        || article.comment_count.unwrap_or(0) != 0;

    let popularity = if has_metrics {
        let norm_views = article.view_count.unwrap_or(0) as f64 / aggregates.max_views as f64;
        let norm_shares = article.share_count.unwrap_or(0) as f64 / aggregates.max_shares as f64;
        let norm_comments =
            article.comment_count.unwrap_or(0) as f64 / aggregates.max_comments as f64;
        norm_views * VIEW_WEIGHT + norm_shares * SHARE_WEIGHT + norm_comments * COMMENT_WEIGHT
    } else {
        freshness_score(article)
    };

    PopularityAssessment {
        popularity_score: popularity.min(1.0),
        trending_velocity: trending_velocity(article),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use uuid::Uuid;

    fn article(
        published_at: chrono::DateTime<Utc>,
        views: Option<u64>,
        shares: Option<u64>,
        comments: Option<u64>,
    ) -> NormalizedArticle {
        NormalizedArticle {
            id: Uuid::new_v4(),
            raw_record_id: "r".to_string(),
            source_id: "s".to_string(),
            source_name: "S".to_string(),
            source_tier: crate::core::types::Tier::Tier2,
            title: "t".to_string(),
            body: "b".to_string(),
            summary: None,
            author: None,
            published_at,
            language: "en".to_string(),
            country: "US".to_string(),
            category: None,
            tags: vec![],
            url: "https://example.test/a".to_string(),
            image_urls: vec![],
            view_count: views,
            share_count: shares,
            comment_count: comments,
            like_count: None,
            crawled_at: Utc::now(),
            normalized_at: Utc::now(),
            cluster_id: None,
        }
    }

    #[test]
    fn freshness_fallback_at_half_life_is_approximately_half() {
        let article = article(Utc::now() - Duration::hours(24), None, None, None);
        let aggregates = BatchAggregates::compute(std::slice::from_ref(&article));
        let assessment = score(&article, &aggregates);
        assert!((assessment.popularity_score - 0.5).abs() < 0.01);
        assert_eq!(assessment.trending_velocity, 0.0);
    }

    #[test]
    fn engagement_based_score_uses_batch_maxima() {
        let a = article(Utc::now(), Some(100), Some(10), Some(5));
        let b = article(Utc::now(), Some(50), Some(5), Some(2));
        let articles = vec![a.clone(), b];
        let aggregates = BatchAggregates::compute(&articles);
        let assessment = score(&a, &aggregates);
        assert!((assessment.popularity_score - 1.0).abs() < 1e-9);
    }

    #[test]
    fn missing_timestamp_handled_by_caller_default() {
        // Normalizer always fills published_at; the scorer assumes a value
        // is present. A very old timestamp should decay towards zero.
        let article = article(Utc::now() - Duration::days(365), None, None, None);
        let aggregates = BatchAggregates::compute(std::slice::from_ref(&article));
        let assessment = score(&article, &aggregates);
        assert!(assessment.popularity_score < 0.01);
    }
}
