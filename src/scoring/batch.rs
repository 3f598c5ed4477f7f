//! Batch-wide aggregates computed once before any per-article scorer runs:
//! engagement maxima (for popularity normalisation) and the cross-source
//! title-Jaccard corroboration count (for the credibility bonus). Spec.md
//! §5/§9 requires these be computed in an explicit pre-pass rather than as
//! hidden state a scorer reaches into mid-fan-out.

use std::collections::HashMap;

use uuid::Uuid;

use crate::core::types::NormalizedArticle;
use crate::dedup::jaccard_similarity;

/// Corroboration bonus requires titles with at least 3 words (spec.md
/// §4.7); independent from `dedup::SIMILARITY_THRESHOLD`.
pub const CORROBORATION_SIMILARITY_THRESHOLD: f64 = 0.5;

pub struct BatchAggregates {
    pub max_views: u64,
    pub max_shares: u64,
    pub max_comments: u64,
    corroboration_counts: HashMap<Uuid, usize>,
}

impl BatchAggregates {
    pub fn compute(articles: &[NormalizedArticle]) -> Self {
        let max_views = articles.iter().filter_map(|a| a.view_count).max().unwrap_or(0).max(1);
        let max_shares = articles.iter().filter_map(|a| a.share_count).max().unwrap_or(0).max(1);
        let max_comments = articles
            .iter()
            .filter_map(|a| a.comment_count)
            .max()
            .unwrap_or(0)
            .max(1);

        let titles_lower: Vec<String> = articles.iter().map(|a| a.title.to_lowercase()).collect();
        let mut corroboration_counts = HashMap::with_capacity(articles.len());

        for (i, article) in articles.iter().enumerate() {
            let word_count = titles_lower[i].split_whitespace().count();
            if word_count < 3 {
                corroboration_counts.insert(article.id, 0);
                continue;
            }
            let count = articles
                .iter()
                .enumerate()
                .filter(|(j, other)| *j != i && other.source_id != article.source_id)
                .filter(|(j, _)| {
                    jaccard_similarity(&titles_lower[i], &titles_lower[*j])
                        >= CORROBORATION_SIMILARITY_THRESHOLD
                })
                .count();
            corroboration_counts.insert(article.id, count);
        }

        BatchAggregates {
            max_views,
            max_shares,
            max_comments,
            corroboration_counts,
        }
    }

    pub fn corroborator_count(&self, article_id: Uuid) -> usize {
        self.corroboration_counts.get(&article_id).copied().unwrap_or(0)
    }
}
