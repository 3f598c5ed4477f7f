//! Ties C1–C10 together into the seven-stage flow: source selection,
//! parallel ingestion, normalization, dedup/clustering, integrity/
//! credibility/popularity/relevance scoring, and ranking.

use std::sync::Arc;

use futures::future::join_all;

use crate::connectors::rss::RssConnector;
use crate::connectors::search_api::SearchApiConnector;
use crate::connectors::Connector;
use crate::core::config::PipelineConfig;
use crate::core::error::{PipelineError, PipelineResult};
use crate::core::types::{IngestionKind, RequestDescriptor, ScoredArticle};
use crate::ingestion::{self, ConnectorJob};
use crate::registry::SourceRegistry;
use crate::{dedup, integrity, normalize, ranker};
use crate::scoring::{batch::BatchAggregates, credibility, popularity, relevance};

/// Builds one connector job per selected, ingestible source. Sources whose
/// `ingestion_kind` is `WebCrawl` have no standing connector — they're
/// reached only via the optional content scraper, never the orchestrator —
/// so they're skipped here rather than erroring.
fn build_jobs(client: &reqwest::Client, sources: Vec<crate::core::types::SourceDescriptor>) -> Vec<ConnectorJob> {
    sources
        .into_iter()
        .filter_map(|source| {
            let connector: Arc<dyn Connector> = match source.ingestion_kind {
                IngestionKind::Rss => Arc::new(RssConnector::new(client.clone(), source.clone())),
                IngestionKind::Api => {
                    let env_key = format!(
                        "NEWSCRED_{}_API_KEY",
                        source.id.to_uppercase().replace(['-', '.'], "_")
                    );
                    let credential_value = std::env::var(&env_key).unwrap_or_default();
                    Arc::new(SearchApiConnector::new(
                        client.clone(),
                        source.clone(),
                        "Authorization",
                        credential_value,
                    ))
                }
                IngestionKind::WebCrawl => return None,
            };
            Some(ConnectorJob { source, connector })
        })
        .collect()
}

fn matches_exclude_keywords(title: &str, body: &str, exclude_keywords: &[String]) -> bool {
    if exclude_keywords.is_empty() {
        return false;
    }
    let haystack = format!("{} {}", title.to_lowercase(), body.to_lowercase());
    exclude_keywords.iter().any(|kw| haystack.contains(&kw.to_lowercase()))
}

/// Runs the full pipeline for one request. Validation failures are reported
/// structurally; connector/ingestion failures never propagate — they're
/// logged and recorded against the offending source instead (spec.md §7).
pub async fn run(
    request: &RequestDescriptor,
    registry: &SourceRegistry,
    config: &PipelineConfig,
) -> PipelineResult<Vec<ScoredArticle>> {
    let violations = request.validate();
    if !violations.is_empty() {
        return Err(PipelineError::InvalidRequest(violations));
    }

    let sources = registry
        .select_sources(&request.category, Some(request.locale.as_str()), request.verified_sources_only, None)
        .await;

    tracing::info!(selected = sources.len(), "selected sources for request");

    let client = reqwest::Client::builder()
        .timeout(std::time::Duration::from_secs(15))
        .build()
        .map_err(|e| PipelineError::Config(e.to_string()))?;

    let jobs = build_jobs(&client, sources);

    let time_window = match (request.date_from, request.date_to) {
        (Some(from), Some(to)) => Some(crate::connectors::TimeWindow { from, to }),
        _ => None,
    };

    let raw_records = ingestion::collect(registry, jobs, &request.keywords, request.limit * 5, time_window, None).await;

    let normalize_options = normalize::NormalizeOptions {
        source_tier: None,
        target_date: None,
        date_tolerance_days: 1,
        default_locale: &request.locale,
        default_country: request.country.as_deref().unwrap_or("US"),
    };
    let (normalized, _stats) = normalize::normalize_batch(&raw_records, &normalize_options);

    let deduped = dedup::deduplicate(normalized);

    let filtered: Vec<_> = deduped
        .into_iter()
        .filter(|a| !matches_exclude_keywords(&a.title, &a.body, &request.exclude_keywords))
        .collect();

    let aggregates = BatchAggregates::compute(&filtered);

    let scored_futures = filtered.into_iter().map(|article| {
        let aggregates = &aggregates;
        let registry = &*registry;
        let keywords = &request.keywords;
        async move {
            let integrity_assessment = integrity::assess(&article);
            let credibility_assessment = credibility::score(&article, aggregates, Some(registry)).await;
            let popularity_assessment = popularity::score(&article, aggregates);
            let relevance_score = relevance::score(&article, keywords);

            ScoredArticle {
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
                policy_flags: Default::default(),
            }
        }
    });

    let scored: Vec<ScoredArticle> = join_all(scored_futures).await;

    let ranked = ranker::rank(
        scored,
        request.preset,
        request.limit,
        request.offset,
        request.diversity,
        config.scoring.source_diversity.max_same_source_in_top_n,
        &config.scoring,
    );

    Ok(ranked)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn exclude_keywords_matches_case_insensitively_across_title_and_body() {
        assert!(matches_exclude_keywords("Breaking Gossip", "celebrity details", &["gossip".to_string()]));
        assert!(matches_exclude_keywords("headline", "full of GOSSIP here", &["gossip".to_string()]));
        assert!(!matches_exclude_keywords("headline", "body", &["gossip".to_string()]));
    }

    #[test]
    fn empty_exclude_list_matches_nothing() {
        assert!(!matches_exclude_keywords("anything", "anything", &[]));
    }
}
