//! C5: Deduplication & Clustering.
//!
//! Three cascaded passes over the batch — URL canonicalization, title-hash
//! collapse, then title-similarity clustering — ported from
//! `news_collector/dedup/dedup_engine.py::DeduplicationEngine`.

use std::collections::hash_map::DefaultHasher;
use std::collections::{HashMap, HashSet};
use std::hash::{Hash, Hasher};

use uuid::Uuid;

use crate::core::types::NormalizedArticle;

/// Independent from `scoring::credibility::CORROBORATION_THRESHOLD` — the
/// two are owned by different modules and kept that way on purpose
/// (spec.md §9's open question on this).
pub const SIMILARITY_THRESHOLD: f64 = 0.6;

/// Lowercases, drops query string and fragment, strips a trailing slash.
/// Idempotent: `canonicalize_url(canonicalize_url(u)) == canonicalize_url(u)`.
pub fn canonicalize_url(url: &str) -> String {
    let lower = url.to_lowercase();
    let without_fragment = lower.split('#').next().unwrap_or("");
    let without_query = without_fragment.split('?').next().unwrap_or("");
    without_query
        .strip_suffix('/')
        .unwrap_or(without_query)
        .to_string()
}

fn title_hash(title: &str) -> u64 {
    let normalized = title.trim().to_lowercase();
    let mut hasher = DefaultHasher::new();
    normalized.hash(&mut hasher);
    hasher.finish()
}

/// Word-level Jaccard over lowercase whitespace-tokenized titles. Symmetric,
/// in `[0, 1]`; identical non-empty word sets give `1.0`, disjoint sets give
/// `0.0`, and an empty side gives `0.0`.
pub fn jaccard_similarity(a: &str, b: &str) -> f64 {
    let set_a: HashSet<&str> = a.split_whitespace().collect();
    let set_b: HashSet<&str> = b.split_whitespace().collect();
    if set_a.is_empty() || set_b.is_empty() {
        return 0.0;
    }
    let intersection = set_a.intersection(&set_b).count();
    let union = set_a.union(&set_b).count();
    intersection as f64 / union as f64
}

fn dedup_by_url(articles: Vec<NormalizedArticle>) -> Vec<NormalizedArticle> {
    let mut seen = HashSet::new();
    articles
        .into_iter()
        .filter(|a| seen.insert(canonicalize_url(&a.url)))
        .collect()
}

fn dedup_by_title_hash(articles: Vec<NormalizedArticle>) -> Vec<NormalizedArticle> {
    let mut seen = HashSet::new();
    articles
        .into_iter()
        .filter(|a| seen.insert(title_hash(&a.title)))
        .collect()
}

fn cluster_similar(articles: Vec<NormalizedArticle>) -> Vec<NormalizedArticle> {
    let titles_lower: Vec<String> = articles.iter().map(|a| a.title.to_lowercase()).collect();
    let n = articles.len();
    let mut assigned = vec![false; n];
    let mut clusters: Vec<Vec<usize>> = Vec::new();

    for seed in 0..n {
        if assigned[seed] {
            continue;
        }
        let mut members = vec![seed];
        assigned[seed] = true;
        for candidate in (seed + 1)..n {
            if assigned[candidate] {
                continue;
            }
            if jaccard_similarity(&titles_lower[seed], &titles_lower[candidate]) >= SIMILARITY_THRESHOLD
            {
                members.push(candidate);
                assigned[candidate] = true;
            }
        }
        clusters.push(members);
    }

    let mut by_index: HashMap<usize, NormalizedArticle> =
        articles.into_iter().enumerate().collect();
    let mut representatives = Vec::with_capacity(clusters.len());

    for members in clusters {
        let cluster_id = if members.len() > 1 {
            Some(Uuid::new_v4())
        } else {
            None
        };
        let representative_idx = *members
            .iter()
            .max_by_key(|&&idx| by_index.get(&idx).map(|a| a.body.len()).unwrap_or(0))
            .unwrap();
        let mut representative = by_index.remove(&representative_idx).unwrap();
        representative.cluster_id = cluster_id;
        representatives.push(representative);
    }

    representatives
}

/// Runs the full cascade. Monotone: removing any article from the input
/// never increases the output length.
pub fn deduplicate(articles: Vec<NormalizedArticle>) -> Vec<NormalizedArticle> {
    let before = articles.len();
    let after_url = dedup_by_url(articles);
    let after_title = dedup_by_title_hash(after_url);
    let clustered = cluster_similar(after_title);
    tracing::info!(
        input = before,
        output = clustered.len(),
        "deduplicated batch"
    );
    clustered
}
