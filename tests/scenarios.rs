//! End-to-end scenarios driving the dedup/scoring/ranking chain (C4–C10)
//! against in-memory fixtures, no network involved — C1–C3 (registry,
//! connectors, ingestion orchestrator) have their own unit tests covering
//! selection, health tracking, and the fan-out/timeout contract.

use std::collections::BTreeSet;

use chrono::{Duration, Utc};
use uuid::Uuid;

use newscred_pipeline::core::config::ScoringConfig;
use newscred_pipeline::core::types::{NormalizedArticle, RankingPreset, ScoredArticle, Tier};
use newscred_pipeline::scoring::batch::BatchAggregates;
use newscred_pipeline::{dedup, integrity, ranker, scoring};

fn article(source_id: &str, title: &str, published_at: chrono::DateTime<chrono::Utc>) -> NormalizedArticle {
    NormalizedArticle {
        id: Uuid::new_v4(),
        raw_record_id: format!("raw-{}", Uuid::new_v4()),
        source_id: source_id.to_string(),
        source_name: source_id.to_string(),
        source_tier: Tier::Tier2,
        title: title.to_string(),
        body: "Ordinary article body with enough content to pass integrity checks overall.".to_string(),
        summary: None,
        author: None,
        published_at,
        language: "en".to_string(),
        country: "US".to_string(),
        category: None,
        tags: vec![],
        url: format!("https://{source_id}.test/{}", Uuid::new_v4()),
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

async fn score_all(articles: Vec<NormalizedArticle>) -> Vec<ScoredArticle> {
    let aggregates = BatchAggregates::compute(&articles);
    let mut scored = Vec::with_capacity(articles.len());
    for article in articles {
        let integrity_assessment = integrity::assess(&article);
        let credibility_assessment = scoring::credibility::score(&article, &aggregates, None).await;
        let popularity_assessment = scoring::popularity::score(&article, &aggregates);
        let relevance_score = scoring::relevance::score(&article, &[]);

        scored.push(ScoredArticle {
            article,
            integrity_score: integrity_assessment.integrity_score,
            title_body_consistency: integrity_assessment.title_body_consistency,
            contamination_score: integrity_assessment.contamination_score,
            spam_score: integrity_assessment.spam_score,
            integrity_flags: integrity_assessment.flags,
            credibility_score: credibility_assessment.credibility_score,
            quality_score: credibility_assessment.quality_score,
            evidence_score: credibility_assessment.evidence_score,
            sensationalism_penalty: credibility_assessment.sensationalism_penalty,
            popularity_score: popularity_assessment.popularity_score,
            trending_velocity: popularity_assessment.trending_velocity,
            relevance_score,
            final_score: 0.0,
            rank_position: None,
            policy_flags: BTreeSet::new(),
        });
    }
    scored
}

#[tokio::test]
async fn diversity_cap_admits_three_of_seven_same_source_records() {
    let now = Utc::now();
    let mut articles: Vec<NormalizedArticle> = (0..6)
        .map(|i| article("prolific-source", &format!("Distinct headline number {i} today"), now))
        .collect();
    articles.push(article("prolific-source", "Distinct headline number 0 today", now));

    let deduped = dedup::deduplicate(articles);
    assert_eq!(deduped.len(), 6, "title-duplicate should be collapsed by dedup");

    let scored = score_all(deduped).await;
    let config = ScoringConfig::default();
    let ranked = ranker::rank(scored, RankingPreset::Quality, 10, 0, true, 3, &config);

    assert_eq!(ranked.len(), 3);
    for (i, a) in ranked.iter().enumerate() {
        assert_eq!(a.rank_position, Some(i + 1));
    }
}

#[tokio::test]
async fn cross_source_corroboration_bonus_applies_only_to_corroborated_articles() {
    let now = Utc::now();
    let articles = vec![
        article("outlet-a", "central bank raises interest rates sharply today", now),
        article("outlet-b", "central bank raises interest rates sharply again", now),
        article("outlet-c", "central bank raises interest rates sharply once more", now),
        article("outlet-d", "completely unrelated sports recap happened yesterday", now),
    ];

    let aggregates = BatchAggregates::compute(&articles);
    for a in &articles[0..3] {
        assert_eq!(aggregates.corroborator_count(a.id), 2);
    }
    assert_eq!(aggregates.corroborator_count(articles[3].id), 0);

    let corroborated = scoring::credibility::score(&articles[0], &aggregates, None).await;
    let uncorroborated = scoring::credibility::score(&articles[3], &aggregates, None).await;
    assert!(corroborated.credibility_score > uncorroborated.credibility_score);
}

#[tokio::test]
async fn latest_preset_orders_strictly_by_published_at_descending() {
    let now = Utc::now();
    let articles = vec![
        article("a", "Story one", now - Duration::days(6)),
        article("b", "Story two", now - Duration::days(4)),
        article("c", "Story three", now - Duration::days(1)),
        article("d", "Story four", now),
        article("e", "Story five", now - Duration::days(2)),
    ];

    let scored = score_all(articles).await;
    let config = ScoringConfig::default();
    let ranked = ranker::rank(scored, RankingPreset::Latest, 10, 0, false, 3, &config);

    let timestamps: Vec<_> = ranked.iter().map(|a| a.article.published_at).collect();
    let mut sorted = timestamps.clone();
    sorted.sort_by(|a, b| b.cmp(a));
    assert_eq!(timestamps, sorted);
}

#[tokio::test]
async fn spam_article_is_dropped_by_the_policy_filter() {
    let mut spammy = article("spam-source", "충격!! 단독 속보", Utc::now());
    spammy.body = "광고 협찬 이벤트 참여 this text pads out low lexical density words words words words words words words words words words words words words".to_string();

    let clean = article("clean-source", "Ordinary market update", Utc::now());

    let assessment = integrity::assess(&spammy);
    assert!(assessment.spam_score > 0.7, "fixture should actually trip the spam threshold");

    let scored = score_all(vec![spammy, clean]).await;
    let config = ScoringConfig::default();
    let ranked = ranker::rank(scored, RankingPreset::Quality, 10, 0, false, 3, &config);

    assert_eq!(ranked.len(), 1);
    assert_eq!(ranked[0].article.source_id, "clean-source");
}

#[tokio::test]
async fn freshness_fallback_scores_day_old_article_near_half() {
    let day_old = article("wire-service", "Routine economic update", Utc::now() - Duration::hours(24));
    let aggregates = BatchAggregates::compute(std::slice::from_ref(&day_old));
    let assessment = scoring::popularity::score(&day_old, &aggregates);

    assert!((assessment.popularity_score - 0.5).abs() < 0.02);
    assert_eq!(assessment.trending_velocity, 0.0);
}

#[tokio::test]
async fn diversity_falls_back_to_source_name_when_source_id_is_shared() {
    let now = Utc::now();
    let mut articles = Vec::new();
    for i in 0..6 {
        let mut a = article("aggregator", &format!("Unique aggregator story {i}"), now);
        a.source_name = if i % 3 == 0 {
            "Outlet One".to_string()
        } else if i % 3 == 1 {
            "Outlet Two".to_string()
        } else {
            "Outlet Three".to_string()
        };
        articles.push(a);
    }

    let scored = score_all(articles).await;
    let config = ScoringConfig::default();
    let ranked = ranker::rank(scored, RankingPreset::Quality, 10, 0, true, 3, &config);

    assert_eq!(ranked.len(), 6, "two per outlet name is within the cap of three");

    let mut per_name: std::collections::HashMap<String, usize> = std::collections::HashMap::new();
    for a in &ranked {
        *per_name.entry(a.article.source_name.clone()).or_insert(0) += 1;
    }
    assert!(per_name.values().all(|&count| count <= 3));
}
