//! C10: Ranker & Policy Filter. Ported from
//! `news_collector/ranking/ranker.py::Ranker`.

use std::cmp::Ordering;
use std::collections::HashMap;

use chrono::{DateTime, Utc};

use crate::core::config::ScoringConfig;
use crate::core::types::{RankingPreset, ScoredArticle};

#[derive(Debug, Clone, Copy)]
struct Weights {
    popularity: f64,
    relevance: f64,
    quality: f64,
    credibility: f64,
}

fn weights_for(preset: RankingPreset) -> Weights {
    match preset {
        RankingPreset::Quality => Weights {
            popularity: 0.15,
            relevance: 0.30,
            quality: 0.40,
            credibility: 0.15,
        },
        RankingPreset::Trending => Weights {
            popularity: 0.50,
            relevance: 0.10,
            quality: 0.20,
            credibility: 0.20,
        },
        RankingPreset::Credible => Weights {
            popularity: 0.10,
            relevance: 0.20,
            quality: 0.20,
            credibility: 0.50,
        },
        RankingPreset::Latest => Weights {
            popularity: 0.10,
            relevance: 0.20,
            quality: 0.30,
            credibility: 0.40,
        },
    }
}

fn final_score(article: &ScoredArticle, weights: Weights) -> f64 {
    let raw = weights.popularity * article.popularity_score
        + weights.relevance * article.relevance_score
        + weights.quality * article.quality_score
        + weights.credibility * article.credibility_score;
    (raw * 100.0 * 10.0).round() / 10.0
}

/// Drops integrity/spam failures; flags (does not drop) low-credibility
/// articles. Never mutates `rank_position` — that's the ranker's job.
fn apply_policy_filter(mut articles: Vec<ScoredArticle>, config: &ScoringConfig) -> Vec<ScoredArticle> {
    articles.retain(|a| a.integrity_score >= config.integrity_threshold && a.spam_score <= 0.7);

    for article in &mut articles {
        if article.credibility_score < config.credibility_threshold {
            article.policy_flags.insert("suspicious_credibility".to_string());
        }
    }
    articles
}

fn order_latest(articles: &mut [ScoredArticle]) {
    articles.sort_by(|a, b| b.article.published_at.cmp(&a.article.published_at));
}

fn order_by_final_score(articles: &mut [ScoredArticle]) {
    articles.sort_by(|a, b| {
        b.final_score
            .partial_cmp(&a.final_score)
            .unwrap_or(Ordering::Equal)
            .then_with(|| b.article.published_at.cmp(&a.article.published_at))
            .then_with(|| a.article.id.cmp(&b.article.id))
    });
}

/// Walks the sorted list keeping a per-source counter, admitting an article
/// only while its source is under `max_same_source_in_top_n`. Falls back to
/// `source_name` when every remaining candidate shares one `source_id`
/// (e.g. an aggregator re-publishing under one id).
fn apply_diversity_cap(articles: Vec<ScoredArticle>, max_same_source_in_top_n: usize) -> Vec<ScoredArticle> {
    let all_same_source_id = articles.windows(2).all(|w| w[0].article.source_id == w[1].article.source_id);
    let key_of = |a: &ScoredArticle| -> String {
        if all_same_source_id {
            a.article.source_name.clone()
        } else {
            a.article.source_id.clone()
        }
    };

    let mut counts: HashMap<String, usize> = HashMap::new();
    let mut admitted = Vec::with_capacity(articles.len());
    for article in articles {
        let key = key_of(&article);
        let count = counts.entry(key).or_insert(0);
        if *count < max_same_source_in_top_n {
            *count += 1;
            admitted.push(article);
        }
    }
    admitted
}

/// Scores, filters, orders, diversity-caps, and Top-N's a batch. `articles`
/// must already carry their per-axis scores (integrity/credibility/quality/
/// popularity/relevance) — this stage only combines, filters, and orders.
pub fn rank(
    mut articles: Vec<ScoredArticle>,
    preset: RankingPreset,
    limit: usize,
    offset: usize,
    diversity: bool,
    max_same_source_in_top_n: usize,
    config: &ScoringConfig,
) -> Vec<ScoredArticle> {
    let weights = weights_for(preset);
    for article in &mut articles {
        article.final_score = final_score(article, weights);
    }

    let mut articles = apply_policy_filter(articles, config);

    if preset == RankingPreset::Latest {
        order_latest(&mut articles);
    } else {
        order_by_final_score(&mut articles);
    }

    let capped = if diversity {
        apply_diversity_cap(articles, max_same_source_in_top_n)
    } else {
        articles
    };

    let mut top_n: Vec<ScoredArticle> = capped.into_iter().skip(offset).take(limit).collect();
    for (i, article) in top_n.iter_mut().enumerate() {
        article.rank_position = Some(offset + i + 1);
    }
    top_n
}
